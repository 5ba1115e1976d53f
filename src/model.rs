use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::records::{JobPosting, OutputArtifact, ResumeProfile, TailoredResume};

/// Default Groq model for CV data extraction.
pub const DEFAULT_EXTRACTION_MODEL: &str = "openai/gpt-oss-20b";
/// Default Groq model for tailored-content generation.
pub const DEFAULT_GENERATION_MODEL: &str = "qwen-3-32b";

/// Failure rate rolled by the validation stage when `--simulate-faults` is on.
pub const SIMULATED_VALIDATE_FAILURE_RATE: f64 = 0.05;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub run_id: String,
    pub settings: Settings,
    /// Stem for the generated document name; derived from the CV name when absent.
    #[serde(default)]
    pub output_stem: Option<String>,
    pub pacing: Pacing,
    pub fault: FaultInjection,
}

/// Persisted user preferences. Every field tolerates being absent on disk so
/// settings files written by older builds still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub resume_style: ResumeStyle,
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            resume_style: ResumeStyle::default(),
            extraction_model: default_extraction_model(),
            generation_model: default_generation_model(),
        }
    }
}

fn default_extraction_model() -> String {
    DEFAULT_EXTRACTION_MODEL.to_string()
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Docx,
    Pdf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResumeStyle {
    #[default]
    Modern,
    Classic,
    Compact,
}

/// Per-step delays. The simulated profile mimics real extraction/generation
/// latency; the instant profile keeps tests and scripted runs fast.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pacing {
    #[serde(with = "humantime_serde")]
    pub validate: Duration,
    #[serde(with = "humantime_serde")]
    pub extract: Duration,
    #[serde(with = "humantime_serde")]
    pub analyze: Duration,
    #[serde(with = "humantime_serde")]
    pub tailor: Duration,
    #[serde(with = "humantime_serde")]
    pub generate: Duration,
    /// Pause after each step so the step is seen in its completed state.
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
}

impl Pacing {
    pub fn simulated() -> Self {
        Self {
            validate: Duration::from_millis(1000),
            extract: Duration::from_millis(2000),
            analyze: Duration::from_millis(1500),
            tailor: Duration::from_millis(3000),
            generate: Duration::from_millis(1000),
            settle: Duration::from_millis(500),
        }
    }

    pub fn instant() -> Self {
        Self {
            validate: Duration::ZERO,
            extract: Duration::ZERO,
            analyze: Duration::ZERO,
            tailor: Duration::ZERO,
            generate: Duration::ZERO,
            settle: Duration::ZERO,
        }
    }

    pub fn work_delay(&self, stage: StageKind) -> Duration {
        match stage {
            StageKind::Validate => self.validate,
            StageKind::Extract => self.extract,
            StageKind::Analyze => self.analyze,
            StageKind::Tailor => self.tailor,
            StageKind::Generate => self.generate,
        }
    }
}

/// Controls whether the validation stage rolls a simulated failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FaultInjection {
    Disabled,
    Always,
    Random { probability: f64 },
}

impl FaultInjection {
    pub fn should_fail(&self) -> bool {
        use rand::Rng;
        match self {
            FaultInjection::Disabled => false,
            FaultInjection::Always => true,
            FaultInjection::Random { probability } => {
                // gen_bool panics outside [0, 1], so clamp bad config values.
                rand::thread_rng().gen_bool(probability.clamp(0.0, 1.0))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    Validate,
    Extract,
    Analyze,
    Tailor,
    Generate,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::Validate,
        StageKind::Extract,
        StageKind::Analyze,
        StageKind::Tailor,
        StageKind::Generate,
    ];

    /// Zero-based position in the pipeline.
    pub fn index(self) -> usize {
        match self {
            StageKind::Validate => 0,
            StageKind::Extract => 1,
            StageKind::Analyze => 2,
            StageKind::Tailor => 3,
            StageKind::Generate => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StageKind::Validate => "Validating documents",
            StageKind::Extract => "Extracting resume data",
            StageKind::Analyze => "Analyzing job description",
            StageKind::Tailor => "Tailoring resume",
            StageKind::Generate => "Generating output",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

/// One row of the five-step progress list shown while a run is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub index: usize,
    pub label: String,
    pub status: StepStatus,
}

impl StepDescriptor {
    pub fn pending(stage: StageKind) -> Self {
        Self {
            index: stage.index(),
            label: stage.label().to_string(),
            status: StepStatus::Pending,
        }
    }
}

/// A file the user pointed the run at, with the metadata checked up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
}

/// Where the job description comes from: a file on disk or pasted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobSource {
    None,
    File(Attachment),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInput {
    pub api_key: String,
    pub cv: Option<Attachment>,
    pub job: JobSource,
}

/// Mutable state threaded through the five stages. Each stage reads what the
/// previous ones produced and fills in its own slot.
#[derive(Debug, Clone)]
pub struct RunState {
    pub config: RunConfig,
    pub input: RunInput,
    pub resume: Option<ResumeProfile>,
    pub job: Option<JobPosting>,
    pub tailored: Option<TailoredResume>,
    pub artifact: Option<OutputArtifact>,
}

impl RunState {
    pub fn new(config: RunConfig, input: RunInput) -> Self {
        Self {
            config,
            input,
            resume: None,
            job: None,
            tailored: None,
            artifact: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    StepStarted {
        step: StageKind,
    },
    StepCompleted {
        step: StageKind,
    },
    StepFailed {
        step: StageKind,
        message: String,
    },
    Info(InfoEvent),
    RunCompleted {
        // Box to keep PipelineEvent size small; RunReport is large and would bloat the enum.
        report: Box<RunReport>,
    },
}

/// Structured info events emitted by the engine and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    // UI/CLI messages generated outside the engine.
    Message(String),
    ProfileExtracted { name: String },
    JobAnalyzed { title: String, company: String },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::ProfileExtracted { name } => {
                format!("Extracted resume data for {}", name)
            }
            InfoEvent::JobAnalyzed { title, company } => {
                format!("Job analyzed: {} at {}", title, company)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    #[serde(default)]
    pub started_at: String,
    #[serde(default)]
    pub finished_at: String,
    #[serde(default)]
    pub cv_file_name: String,
    pub resume: ResumeProfile,
    pub job: JobPosting,
    pub tailored: TailoredResume,
    pub artifact: OutputArtifact,
    pub steps: Vec<StepDescriptor>,
}

/// One row of the persisted run log, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Creation time in Unix milliseconds; doubles as the identifier.
    pub id: i64,
    pub timestamp: String,
    pub cv_file_name: String,
    pub job_title: String,
    pub company_name: String,
    pub status: String,
}

impl HistoryEntry {
    pub fn from_report(report: &RunReport) -> Self {
        Self {
            id: unix_millis_now(),
            timestamp: report.finished_at.clone(),
            cv_file_name: report.cv_file_name.clone(),
            job_title: report.job.title.clone(),
            company_name: report.job.company.clone(),
            status: "completed".to_string(),
        }
    }
}

pub(crate) fn unix_millis_now() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn rfc3339_now() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "now".to_string())
}

/// Compact timestamp for file names, e.g. `20250203_100011`.
pub(crate) fn compact_timestamp() -> String {
    const FORMAT: &[FormatItem<'_>] =
        format_description!("[year][month][day]_[hour][minute][second]");
    time::OffsetDateTime::now_utc()
        .format(&FORMAT)
        .unwrap_or_else(|_| "now".to_string())
}
