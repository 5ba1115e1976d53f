//! Up-front checks on everything the user hands us. A run never starts with
//! a bad key or a file the pipeline cannot take.

use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::model::{Attachment, JobSource, RunInput};

/// Hard cap on accepted file size (10 MB).
pub const MAX_UPLOAD_BYTES: u64 = 10_485_760;

pub const CV_EXTENSIONS: [&str; 3] = ["pdf", "docx", "doc"];
pub const JOB_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Cv,
    Job,
}

impl UploadKind {
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::Cv => &CV_EXTENSIONS,
            UploadKind::Job => &JOB_EXTENSIONS,
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadKind::Cv => write!(f, "resume"),
            UploadKind::Job => write!(f, "job description"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("a Groq API key is required (pass --api-key or set GROQ_API_KEY)")]
    MissingApiKey,
    #[error("a resume file is required")]
    MissingCv,
    #[error("a job description is required (file or --job-text)")]
    MissingJob,
    #[error("{file_name} is {size_bytes} bytes, over the 10 MB upload limit")]
    FileTooLarge { file_name: String, size_bytes: u64 },
    #[error("{file_name} is not a supported {kind} file (accepted: {accepted})")]
    UnsupportedType {
        file_name: String,
        kind: UploadKind,
        accepted: String,
    },
}

/// Check one attachment against the upload rules. Size is checked before the
/// extension: an oversized file is rejected as oversized no matter what it is
/// named.
pub fn check_attachment(attachment: &Attachment, kind: UploadKind) -> Result<(), InputError> {
    if attachment.size_bytes > MAX_UPLOAD_BYTES {
        return Err(InputError::FileTooLarge {
            file_name: attachment.file_name.clone(),
            size_bytes: attachment.size_bytes,
        });
    }
    let extension = Path::new(&attachment.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !kind.allowed_extensions().contains(&extension.as_str()) {
        return Err(InputError::UnsupportedType {
            file_name: attachment.file_name.clone(),
            kind,
            accepted: kind.allowed_extensions().join(", "),
        });
    }
    Ok(())
}

/// Gate a run on its three prerequisites, reporting the first missing one:
/// API key, then CV, then job description.
pub fn validate_inputs(input: &RunInput) -> Result<(), InputError> {
    if input.api_key.trim().is_empty() {
        return Err(InputError::MissingApiKey);
    }
    if input.cv.is_none() {
        return Err(InputError::MissingCv);
    }
    match &input.job {
        JobSource::File(_) => Ok(()),
        JobSource::Text(text) if !text.trim().is_empty() => Ok(()),
        _ => Err(InputError::MissingJob),
    }
}
