pub mod aggregator;
pub mod bus;
pub mod config;
pub mod gateway;
pub mod reaper;
pub mod router;
pub mod services;
pub mod session;
pub mod trigger;
pub mod workers;

pub use aggregator::AudioAggregator;
pub use bus::{BusError, EventId, StreamBus, StreamEvent};
pub use config::Config;
pub use gateway::{create_router, AppState};
pub use reaper::SessionReaper;
pub use router::ResponseRouter;
pub use services::{Generator, ServiceError, Synthesizer, Transcriber};
pub use session::{Session, SessionHandle, SessionRegistry, SessionState};
pub use trigger::TriggerDetector;
pub use workers::{DocumentWorker, GenerationWorker, SynthesisWorker};
