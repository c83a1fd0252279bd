pub mod orchestrator;
pub mod pipeline;
pub mod report;

pub use orchestrator::ArbitrageBot;
pub use pipeline::{BlockBroadcast, Submission, SubmissionPipeline};
pub use report::{CandidateOutcome, CandidateRecord, RunReport};
