use async_trait::async_trait;
use thiserror::Error;

use crate::model::RunState;
use crate::records::{JobPosting, OutputArtifact, ResumeProfile, TailoredResume};

#[derive(Debug, Error)]
pub enum StageError {
    /// The simulated validation failure ("Invalid file format detected").
    #[error("invalid file format detected")]
    InvalidFileFormat,
    #[error("the job description is empty after cleanup")]
    EmptyJobText,
    #[error("could not read job file {path}: {source}")]
    JobFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The five pipeline stages behind one seam. The engine drives whatever
/// implementation it is handed; the shipped one simulates each stage with
/// canned records, and a real Groq-backed one can slot in without touching
/// the step runner.
#[async_trait]
pub trait StageServices: Send + Sync {
    /// Sanity-check the documents before any model call is made.
    async fn validate(&self, state: &RunState) -> Result<(), StageError>;

    /// Pull structured data out of the CV.
    async fn extract_resume(&self, state: &RunState) -> Result<ResumeProfile, StageError>;

    /// Resolve the job description (pasted text or file) and parse it.
    async fn analyze_job(&self, state: &RunState) -> Result<JobPosting, StageError>;

    /// Rewrite the resume against the posting and score the result.
    async fn tailor(&self, state: &RunState) -> Result<TailoredResume, StageError>;

    /// Produce the output document and report its metadata.
    async fn generate_output(&self, state: &RunState) -> Result<OutputArtifact, StageError>;
}
