use crate::engine::MockStages;
use crate::inputs::{self, UploadKind};
use crate::model::{
    Attachment, FaultInjection, JobSource, OutputFormat, Pacing, PipelineEvent, ResumeStyle,
    RunConfig, RunInput, RunReport, Settings, StageKind, SIMULATED_VALIDATE_FAILURE_RATE,
};
use crate::orchestrator::{process_run_completion, SessionController};
use crate::storage::{self, JsonFileStorage, Storage};
use crate::text_summary::{build_history_lines, build_text_summary};
use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
pub(crate) enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
pub(crate) fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "resume-tailor",
    version,
    about = "Tailor a resume to a job description in five simulated steps"
)]
pub struct Cli {
    /// Resume file (.pdf, .docx, .doc)
    pub cv: Option<std::path::PathBuf>,

    /// Job description file (.txt, .md)
    pub job: Option<std::path::PathBuf>,

    /// Pasted job description text, instead of a job file
    #[arg(long, conflicts_with = "job")]
    pub job_text: Option<String>,

    /// Groq API key; falls back to the GROQ_API_KEY environment variable
    #[arg(long)]
    pub api_key: Option<String>,

    /// Output document format (persisted as the new default when given)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Resume style preset (persisted as the new default when given)
    #[arg(long, value_enum)]
    pub style: Option<ResumeStyle>,

    /// Model used for CV extraction (persisted as the new default when given)
    #[arg(long)]
    pub extraction_model: Option<String>,

    /// Model used for content generation (persisted as the new default when given)
    #[arg(long)]
    pub generation_model: Option<String>,

    /// Output file name without the extension; derived from the CV and job when absent
    #[arg(long)]
    pub output: Option<String>,

    /// Print the run report as JSON and exit
    #[arg(long)]
    pub json: bool,

    /// Print the text summary and exit
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long)]
    pub silent: bool,

    /// Skip the simulated per-step delays
    #[arg(long)]
    pub instant: bool,

    /// Pause after each step before the next one starts
    #[arg(long, default_value = "500ms")]
    pub settle: humantime::Duration,

    /// Roll the simulated 5% validation failure, as the real pipeline would
    #[arg(long)]
    pub simulate_faults: bool,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// Export the run report as JSON
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Print the N most recent history entries and exit
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    pub history: Option<usize>,

    /// Directory of resume files; runs every CV against every job (batch mode)
    #[arg(long, requires = "jobs_dir")]
    pub cvs_dir: Option<std::path::PathBuf>,

    /// Directory of job description files (batch mode)
    #[arg(long, requires = "cvs_dir")]
    pub jobs_dir: Option<std::path::PathBuf>,

    /// Where batch reports are written (defaults to the current directory)
    #[arg(long)]
    pub output_dir: Option<std::path::PathBuf>,

    /// Write a per-combination report file after a batch run
    #[arg(long)]
    pub report: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    let store = JsonFileStorage::default_location()?;
    let settings = apply_settings_flags(&args, &store)?;

    if let Some(limit) = args.history {
        return show_history(&store, limit);
    }

    if args.cvs_dir.is_some() {
        return crate::batch::run_batch(&args, &store, &settings).await.map(|_| ());
    }

    // Silent mode takes precedence over other output modes
    if args.silent {
        return run_pipeline(args, &store, settings, true).await;
    }

    if !args.json && !args.text {
        // No mode flag given: text is the default presentation.
        return run_text(args, &store, settings).await;
    }

    if args.json {
        return run_pipeline(args, &store, settings, false).await;
    }

    run_text(args, &store, settings).await
}

/// Generate a random identifier for one tailoring run.
fn gen_run_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    u64::from_le_bytes(b).to_string()
}

/// Build a `RunConfig` from CLI arguments and the effective settings.
pub(crate) fn build_config(args: &Cli, settings: &Settings) -> RunConfig {
    let mut pacing = if args.instant {
        Pacing::instant()
    } else {
        Pacing::simulated()
    };
    if !args.instant {
        pacing.settle = Duration::from(args.settle);
    }
    RunConfig {
        run_id: gen_run_id(),
        settings: settings.clone(),
        output_stem: args.output.clone(),
        pacing,
        fault: if args.simulate_faults {
            FaultInjection::Random {
                probability: SIMULATED_VALIDATE_FAILURE_RATE,
            }
        } else {
            FaultInjection::Disabled
        },
    }
}

/// The key from the flag, then the environment, then empty (which the
/// validator rejects with its own message).
pub(crate) fn resolve_api_key(args: &Cli) -> String {
    args.api_key
        .clone()
        .or_else(|| std::env::var("GROQ_API_KEY").ok())
        .unwrap_or_default()
}

pub(crate) fn load_attachment(path: &Path) -> Result<Attachment> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Attachment {
        path: path.to_path_buf(),
        file_name,
        size_bytes: metadata.len(),
    })
}

/// Assemble the run input from the command line, applying the upload rules
/// to any file before it enters the pipeline.
fn build_input(args: &Cli) -> Result<RunInput> {
    let cv = match &args.cv {
        Some(path) => {
            let attachment = load_attachment(path)?;
            inputs::check_attachment(&attachment, UploadKind::Cv)?;
            Some(attachment)
        }
        None => None,
    };

    let job = if let Some(text) = &args.job_text {
        JobSource::Text(text.clone())
    } else if let Some(path) = &args.job {
        let attachment = load_attachment(path)?;
        inputs::check_attachment(&attachment, UploadKind::Job)?;
        JobSource::File(attachment)
    } else {
        JobSource::None
    };

    Ok(RunInput {
        api_key: resolve_api_key(args),
        cv,
        job,
    })
}

/// Merge settings flags into the persisted settings, writing them back when
/// anything actually changed.
fn apply_settings_flags(args: &Cli, store: &JsonFileStorage) -> Result<Settings> {
    let mut settings = store.load_settings();
    let mut changed = false;
    if let Some(format) = args.format {
        if settings.output_format != format {
            settings.output_format = format;
            changed = true;
        }
    }
    if let Some(style) = args.style {
        if settings.resume_style != style {
            settings.resume_style = style;
            changed = true;
        }
    }
    if let Some(model) = &args.extraction_model {
        if settings.extraction_model != *model {
            settings.extraction_model = model.clone();
            changed = true;
        }
    }
    if let Some(model) = &args.generation_model {
        if settings.generation_model != *model {
            settings.generation_model = model.clone();
            changed = true;
        }
    }
    if changed {
        store
            .save_settings(&settings)
            .context("failed to save settings")?;
    }
    Ok(settings)
}

fn show_history(store: &JsonFileStorage, limit: usize) -> Result<()> {
    let entries: Vec<_> = store.load_history().into_iter().take(limit).collect();
    for line in build_history_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

/// Common function to run the pipeline and process results.
/// `silent` controls whether to consume events and suppress output.
async fn run_pipeline(
    args: Cli,
    store: &JsonFileStorage,
    settings: Settings,
    silent: bool,
) -> Result<()> {
    let cfg = build_config(&args, &settings);
    let input = build_input(&args)?;
    let (out_tx, out_handle) = if silent {
        (None, None)
    } else {
        let (tx, handle) = spawn_output_writer();
        (Some(tx), Some(handle))
    };

    let controller = SessionController::new(Arc::new(MockStages::new()));
    let report = if silent {
        // In silent mode, spawn the run and consume events without output.
        let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<PipelineEvent>();
        let handle = tokio::spawn({
            let controller = controller.clone();
            async move { controller.start_run(cfg, input, evt_tx).await }
        });
        while let Some(_ev) = evt_rx.recv().await {}
        handle
            .await
            .context("pipeline task failed")?
            .context("resume tailoring failed")?
    } else {
        // In JSON mode, directly await the run (no need to consume events).
        let (evt_tx, _evt_rx) = mpsc::unbounded_channel::<PipelineEvent>();
        controller
            .start_run(cfg, input, evt_tx)
            .await
            .context("resume tailoring failed")?
    };

    // Handle exports (errors will propagate)
    handle_exports(&args, &report)?;

    if let Some(tx) = out_tx.as_ref() {
        // Print the JSON report in non-silent mode
        let out = serde_json::to_string_pretty(&report)?;
        let _ = tx.send(OutputLine::Stdout(out));
    }

    let processed = process_run_completion(store, &report, storage::HISTORY_CAP, args.auto_save);
    if silent {
        if args.auto_save && !processed.saved {
            anyhow::bail!("failed to save the run to history");
        }
    } else if processed.saved {
        if let Some(tx) = out_tx.as_ref() {
            let _ = tx.send(OutputLine::Stderr(format!(
                "Saved: {}",
                store.history_path().display()
            )));
        }
    }

    if let Some(tx) = out_tx {
        drop(tx);
    }
    if let Some(handle) = out_handle {
        let _ = handle.await;
    }

    Ok(())
}

async fn run_text(args: Cli, store: &JsonFileStorage, settings: Settings) -> Result<()> {
    let cfg = build_config(&args, &settings);
    let input = build_input(&args)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<PipelineEvent>();

    let controller = SessionController::new(Arc::new(MockStages::new()));
    let handle = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start_run(cfg, input, evt_tx).await }
    });

    let total = StageKind::ALL.len();
    while let Some(ev) = evt_rx.recv().await {
        match ev {
            PipelineEvent::StepStarted { step } => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "== [{}/{}] {} ==",
                    step.index() + 1,
                    total,
                    step.label()
                )));
            }
            PipelineEvent::StepCompleted { step } => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "   [{}/{}] done",
                    step.index() + 1,
                    total
                )));
            }
            PipelineEvent::StepFailed { step, message } => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "   [{}/{}] failed: {}",
                    step.index() + 1,
                    total,
                    message
                )));
            }
            PipelineEvent::Info(info) => {
                let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
            }
            PipelineEvent::RunCompleted { .. } => {}
        }
    }

    let report = handle.await??;

    handle_exports(&args, &report)?;
    let summary = build_text_summary(&report);
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }

    let processed = process_run_completion(store, &report, storage::HISTORY_CAP, args.auto_save);
    if processed.saved {
        let _ = out_tx.send(OutputLine::Stderr(format!(
            "Saved: {} ({} runs in history)",
            store.history_path().display(),
            processed.history.len()
        )));
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Handle the JSON export for both text and JSON modes.
fn handle_exports(args: &Cli, report: &RunReport) -> Result<()> {
    if let Some(path) = args.export_json.as_deref() {
        storage::export_json(path, report)
            .with_context(|| format!("could not export JSON to {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_cv_and_job_parse() {
        let args = Cli::try_parse_from(["resume-tailor", "resume.pdf", "posting.txt"]).unwrap();
        assert_eq!(args.cv.as_deref(), Some(Path::new("resume.pdf")));
        assert_eq!(args.job.as_deref(), Some(Path::new("posting.txt")));
        assert!(args.auto_save);
        assert!(!args.instant);
    }

    #[test]
    fn job_text_conflicts_with_a_job_file() {
        let err = Cli::try_parse_from([
            "resume-tailor",
            "resume.pdf",
            "posting.txt",
            "--job-text",
            "pasted posting",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn batch_dirs_require_each_other() {
        let err =
            Cli::try_parse_from(["resume-tailor", "--cvs-dir", "cvs"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn history_flag_defaults_to_ten_entries() {
        let args = Cli::try_parse_from(["resume-tailor", "--history"]).unwrap();
        assert_eq!(args.history, Some(10));
        let args = Cli::try_parse_from(["resume-tailor", "--history", "3"]).unwrap();
        assert_eq!(args.history, Some(3));
    }

    #[test]
    fn build_config_maps_pacing_and_faults() {
        let args = Cli::try_parse_from(["resume-tailor", "resume.pdf", "--job-text", "x"]).unwrap();
        let cfg = build_config(&args, &Settings::default());
        assert_eq!(cfg.pacing.validate, Duration::from_millis(1000));
        assert_eq!(cfg.pacing.settle, Duration::from_millis(500));
        assert_eq!(cfg.fault, FaultInjection::Disabled);
        assert!(!cfg.run_id.is_empty());

        let args = Cli::try_parse_from([
            "resume-tailor",
            "resume.pdf",
            "--job-text",
            "x",
            "--instant",
            "--simulate-faults",
        ])
        .unwrap();
        let cfg = build_config(&args, &Settings::default());
        assert_eq!(cfg.pacing.tailor, Duration::ZERO);
        assert_eq!(cfg.pacing.settle, Duration::ZERO);
        assert_eq!(
            cfg.fault,
            FaultInjection::Random {
                probability: SIMULATED_VALIDATE_FAILURE_RATE
            }
        );
    }

    #[test]
    fn settle_flag_overrides_the_default_pause() {
        let args = Cli::try_parse_from([
            "resume-tailor",
            "resume.pdf",
            "--job-text",
            "x",
            "--settle",
            "100ms",
        ])
        .unwrap();
        let cfg = build_config(&args, &Settings::default());
        assert_eq!(cfg.pacing.settle, Duration::from_millis(100));
        assert_eq!(cfg.pacing.extract, Duration::from_millis(2000));
    }

    #[test]
    fn run_ids_are_unique_per_config() {
        let args = Cli::try_parse_from(["resume-tailor"]).unwrap();
        let a = build_config(&args, &Settings::default());
        let b = build_config(&args, &Settings::default());
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn build_input_reads_file_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let cv_path = dir.path().join("resume.pdf");
        std::fs::write(&cv_path, vec![0u8; 1024]).unwrap();

        let args = Cli::try_parse_from([
            "resume-tailor",
            cv_path.to_str().unwrap(),
            "--job-text",
            "Full Stack Developer at Acme",
            "--api-key",
            "gsk_0123456789abcdef0123",
        ])
        .unwrap();
        let input = build_input(&args).unwrap();
        let cv = input.cv.expect("cv attachment");
        assert_eq!(cv.file_name, "resume.pdf");
        assert_eq!(cv.size_bytes, 1024);
        assert!(matches!(input.job, JobSource::Text(_)));
        assert_eq!(input.api_key, "gsk_0123456789abcdef0123");
    }

    #[test]
    fn build_input_rejects_unsupported_cv_types() {
        let dir = tempfile::tempdir().unwrap();
        let cv_path = dir.path().join("resume.png");
        std::fs::write(&cv_path, b"png").unwrap();

        let args = Cli::try_parse_from([
            "resume-tailor",
            cv_path.to_str().unwrap(),
            "--job-text",
            "x",
        ])
        .unwrap();
        let err = build_input(&args).unwrap_err();
        assert!(err.to_string().contains("not a supported resume file"));
    }

    // The only test that touches GROQ_API_KEY; other tests either pass
    // --api-key or never reach the key lookup.
    #[test]
    fn api_key_falls_back_to_the_environment() {
        let bare = Cli::try_parse_from(["resume-tailor"]).unwrap();

        std::env::set_var("GROQ_API_KEY", "gsk_from_environment_0123");
        assert_eq!(resolve_api_key(&bare), "gsk_from_environment_0123");

        // An explicit flag wins over the environment.
        let flagged = Cli::try_parse_from([
            "resume-tailor",
            "--api-key",
            "gsk_0123456789abcdef0123",
        ])
        .unwrap();
        assert_eq!(resolve_api_key(&flagged), "gsk_0123456789abcdef0123");

        std::env::remove_var("GROQ_API_KEY");
        assert_eq!(resolve_api_key(&bare), "");
    }

    #[test]
    fn settings_flags_persist_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStorage::new(dir.path().to_path_buf());

        let args = Cli::try_parse_from(["resume-tailor", "--format", "pdf"]).unwrap();
        let settings = apply_settings_flags(&args, &store).unwrap();
        assert_eq!(settings.output_format, OutputFormat::Pdf);
        assert_eq!(store.load_settings().output_format, OutputFormat::Pdf);

        // The persisted value becomes the default for later invocations.
        let args = Cli::try_parse_from(["resume-tailor"]).unwrap();
        let settings = apply_settings_flags(&args, &store).unwrap();
        assert_eq!(settings.output_format, OutputFormat::Pdf);
    }

    #[test]
    fn unchanged_settings_are_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStorage::new(dir.path().to_path_buf());

        let args = Cli::try_parse_from(["resume-tailor"]).unwrap();
        apply_settings_flags(&args, &store).unwrap();
        assert!(!store.settings_path().exists());

        let args = Cli::try_parse_from(["resume-tailor", "--format", "docx"]).unwrap();
        apply_settings_flags(&args, &store).unwrap();
        // docx is already the default, so nothing was written.
        assert!(!store.settings_path().exists());
    }
}
