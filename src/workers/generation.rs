use crate::bus::events::{self, InteractionEvent, SynthesisRequestEvent, TriggerEvent};
use crate::bus::{StreamBus, StreamEvent};
use crate::config::{BusConfig, SynthesisConfig, TriggerConfig};
use crate::services::Generator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Consumes trigger events, generates a response with the per-phrase
/// system prompt, records the interaction, and requests synthesis.
/// Generation is best-effort: a failed call abandons the trigger.
pub struct GenerationWorker {
    bus: Arc<StreamBus>,
    generator: Arc<dyn Generator>,
    trigger_cfg: TriggerConfig,
    synthesis_cfg: SynthesisConfig,
    bus_cfg: BusConfig,
}

impl GenerationWorker {
    pub fn new(
        bus: Arc<StreamBus>,
        generator: Arc<dyn Generator>,
        trigger_cfg: TriggerConfig,
        synthesis_cfg: SynthesisConfig,
        bus_cfg: BusConfig,
    ) -> Self {
        Self {
            bus,
            generator,
            trigger_cfg,
            synthesis_cfg,
            bus_cfg,
        }
    }

    pub async fn run(self) {
        let mut cursor = self.bus.tail_cursor(events::TRIGGER_STREAM);
        let block = Duration::from_millis(self.bus_cfg.read_block_ms);
        let backoff = Duration::from_millis(self.bus_cfg.retry_backoff_ms);

        info!("Generation worker started");

        loop {
            let batch = match self
                .bus
                .read(
                    events::TRIGGER_STREAM,
                    cursor,
                    block,
                    self.bus_cfg.read_batch_size,
                )
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Trigger stream read failed, retrying: {}", e);
                    sleep(backoff).await;
                    continue;
                }
            };

            for event in batch {
                cursor = event.id;
                self.process_event(&event).await;
            }
        }
    }

    async fn process_event(&self, event: &StreamEvent) {
        let Some(trigger) = TriggerEvent::from_fields(event) else {
            warn!("Dropping trigger event {} without session_id", event.id);
            return;
        };

        let prompt = self
            .trigger_cfg
            .phrases
            .iter()
            .find(|p| p.phrase == trigger.trigger)
            .map(|p| p.prompt.as_str())
            .unwrap_or(&self.trigger_cfg.default_prompt);

        info!(
            "Generating response to \"{}\" for session {}",
            trigger.trigger, trigger.session_id
        );

        let response = match self.generator.generate(prompt, &trigger.context).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    "Generation failed for session {}, abandoning trigger: {}",
                    trigger.session_id, e
                );
                return;
            }
        };

        let interaction = InteractionEvent {
            session_id: trigger.session_id.clone(),
            trigger: trigger.trigger.clone(),
            user_text: trigger.context.clone(),
            ai_response: response.clone(),
            timestamp: events::now_rfc3339(),
        };
        if let Err(e) = self
            .bus
            .append(events::INTERACTION_STREAM, interaction.to_fields())
        {
            warn!(
                "Failed to record interaction for {}: {}",
                trigger.session_id, e
            );
        }

        let request = SynthesisRequestEvent {
            session_id: trigger.session_id.clone(),
            text: response,
            voice: self.synthesis_cfg.voice.clone(),
            timestamp: events::now_rfc3339(),
        };
        if let Err(e) = self.bus.append(events::SYNTHESIS_STREAM, request.to_fields()) {
            warn!(
                "Failed to request synthesis for {}: {}",
                trigger.session_id, e
            );
        }
    }
}
