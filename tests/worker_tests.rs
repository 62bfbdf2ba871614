// Integration tests for the generation and synthesis workers

use async_trait::async_trait;
use base64::Engine;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voice_companion::bus::events::{
    self, AudioResponseEvent, InteractionEvent, SynthesisRequestEvent, TriggerEvent,
};
use voice_companion::config::{BusConfig, SynthesisConfig, TriggerConfig};
use voice_companion::services::{Generator, ServiceError, Synthesizer};
use voice_companion::{GenerationWorker, StreamBus, SynthesisWorker};

struct RecordingGenerator {
    prompts: Mutex<Vec<(String, String)>>,
    reply: String,
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, system_prompt: &str, context: &str) -> Result<String, ServiceError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), context.to_string()));
        Ok(self.reply.clone())
    }
}

struct FixedSynthesizer {
    audio: Vec<u8>,
}

#[async_trait]
impl Synthesizer for FixedSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>, ServiceError> {
        Ok(self.audio.clone())
    }
}

async fn wait_for_events(bus: &StreamBus, stream: &str, expected: usize) {
    for _ in 0..250 {
        if bus.read_all(stream).unwrap().len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("stream {} never reached {} events", stream, expected);
}

fn append_trigger(bus: &StreamBus, session_id: &str, trigger: &str, context: &str) {
    let event = TriggerEvent {
        session_id: session_id.to_string(),
        trigger: trigger.to_string(),
        context: context.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    bus.append(events::TRIGGER_STREAM, event.to_fields()).unwrap();
}

#[tokio::test]
async fn generation_uses_the_configured_prompt_for_the_phrase() {
    let bus = Arc::new(StreamBus::new(10_000));
    let generator = Arc::new(RecordingGenerator {
        prompts: Mutex::new(Vec::new()),
        reply: "a thoughtful reply".to_string(),
    });
    let trigger_cfg = TriggerConfig::default();
    let expected_prompt = trigger_cfg.phrases[1].prompt.clone(); // "interesting"

    let worker = GenerationWorker::new(
        Arc::clone(&bus),
        Arc::clone(&generator) as Arc<dyn Generator>,
        trigger_cfg,
        SynthesisConfig::default(),
        BusConfig::default(),
    );
    let task = tokio::spawn(worker.run());
    tokio::time::sleep(Duration::from_millis(100)).await;

    append_trigger(&bus, "s1", "interesting", "we were discussing birds");

    wait_for_events(&bus, events::SYNTHESIS_STREAM, 1).await;

    let prompts = generator.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].0, expected_prompt);
    assert_eq!(prompts[0].1, "we were discussing birds");

    // The exchange is recorded for the document renderer.
    let interactions: Vec<InteractionEvent> = bus
        .read_all(events::INTERACTION_STREAM)
        .unwrap()
        .iter()
        .filter_map(InteractionEvent::from_fields)
        .collect();
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].trigger, "interesting");
    assert_eq!(interactions[0].ai_response, "a thoughtful reply");

    // And synthesis is requested with the generated text.
    let requests: Vec<SynthesisRequestEvent> = bus
        .read_all(events::SYNTHESIS_STREAM)
        .unwrap()
        .iter()
        .filter_map(SynthesisRequestEvent::from_fields)
        .collect();
    assert_eq!(requests[0].text, "a thoughtful reply");
    assert_eq!(requests[0].voice, "nova");

    task.abort();
}

#[tokio::test]
async fn unknown_trigger_falls_back_to_the_default_prompt() {
    let bus = Arc::new(StreamBus::new(10_000));
    let generator = Arc::new(RecordingGenerator {
        prompts: Mutex::new(Vec::new()),
        reply: "ok".to_string(),
    });
    let trigger_cfg = TriggerConfig::default();
    let default_prompt = trigger_cfg.default_prompt.clone();

    let worker = GenerationWorker::new(
        Arc::clone(&bus),
        Arc::clone(&generator) as Arc<dyn Generator>,
        trigger_cfg,
        SynthesisConfig::default(),
        BusConfig::default(),
    );
    let task = tokio::spawn(worker.run());
    tokio::time::sleep(Duration::from_millis(100)).await;

    append_trigger(&bus, "s1", "never configured", "context");
    wait_for_events(&bus, events::SYNTHESIS_STREAM, 1).await;

    let prompts = generator.prompts.lock().unwrap().clone();
    assert_eq!(prompts[0].0, default_prompt);

    task.abort();
}

#[tokio::test]
async fn synthesized_audio_is_streamed_in_bounded_chunks() {
    let bus = Arc::new(StreamBus::new(10_000));
    let audio: Vec<u8> = (0..5_000).map(|i| (i % 251) as u8).collect();
    let synthesizer = Arc::new(FixedSynthesizer {
        audio: audio.clone(),
    });

    let cfg = SynthesisConfig {
        voice: "nova".to_string(),
        chunk_chars: 1_000,
    };
    let worker = SynthesisWorker::new(
        Arc::clone(&bus),
        Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
        cfg,
        BusConfig::default(),
    );
    let task = tokio::spawn(worker.run());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let request = SynthesisRequestEvent {
        session_id: "s1".to_string(),
        text: "speak this".to_string(),
        voice: "nova".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    bus.append(events::SYNTHESIS_STREAM, request.to_fields())
        .unwrap();

    // 5000 bytes -> 6668 base64 chars -> 7 chunks of <= 1000 chars.
    wait_for_events(&bus, events::AUDIO_RESPONSE_STREAM, 7).await;

    let chunks: Vec<AudioResponseEvent> = bus
        .read_all(events::AUDIO_RESPONSE_STREAM)
        .unwrap()
        .iter()
        .filter_map(AudioResponseEvent::from_fields)
        .collect();
    assert_eq!(chunks.len(), 7);
    assert!(chunks.iter().all(|c| c.chunk.len() <= 1_000));
    assert!(chunks[..6].iter().all(|c| !c.is_final));
    assert!(chunks[6].is_final);

    // Reassembling the chunks recovers the original audio exactly.
    let reassembled: String = chunks.iter().map(|c| c.chunk.as_str()).collect();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(reassembled)
        .unwrap();
    assert_eq!(decoded, audio);

    task.abort();
}

#[tokio::test]
async fn empty_audio_produces_a_single_final_marker() {
    let bus = Arc::new(StreamBus::new(10_000));
    let synthesizer = Arc::new(FixedSynthesizer { audio: Vec::new() });

    let worker = SynthesisWorker::new(
        Arc::clone(&bus),
        Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
        SynthesisConfig::default(),
        BusConfig::default(),
    );
    let task = tokio::spawn(worker.run());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let request = SynthesisRequestEvent {
        session_id: "s1".to_string(),
        text: "nothing to say".to_string(),
        voice: "nova".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    bus.append(events::SYNTHESIS_STREAM, request.to_fields())
        .unwrap();

    wait_for_events(&bus, events::AUDIO_RESPONSE_STREAM, 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let chunks: Vec<AudioResponseEvent> = bus
        .read_all(events::AUDIO_RESPONSE_STREAM)
        .unwrap()
        .iter()
        .filter_map(AudioResponseEvent::from_fields)
        .collect();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].chunk.is_empty());
    assert!(chunks[0].is_final);

    task.abort();
}
