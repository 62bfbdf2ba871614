//! Bridge workers between the bus and the external collaborators
//!
//! Each worker is a long-lived consumer loop that reads one request
//! stream, invokes a collaborator capability, and publishes the result
//! back onto the bus:
//! - `GenerationWorker`: trigger events -> LLM response -> synthesis request
//! - `SynthesisWorker`: synthesis requests -> audio response chunks
//! - `DocumentWorker`: document requests -> rendered markdown document

pub mod document;
pub mod generation;
pub mod synthesis;

pub use document::DocumentWorker;
pub use generation::GenerationWorker;
pub use synthesis::SynthesisWorker;
