//! Synthesis jobs: state machine, bounded extraction pool and assembly

pub mod assemble;
pub mod error;
pub mod job;
pub mod orchestrator;

#[cfg(test)]
pub mod tests;

pub use error::{AssemblyError, JobError};
pub use job::{JobId, JobRecord, JobRegistry, JobState, Transition};
pub use orchestrator::{SynthesisRequest, SynthesisResult, Synthesizer};
