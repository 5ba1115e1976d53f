//! Batch mode: run every CV in one directory against every job description
//! in another. Combinations run sequentially through the same session
//! controller as single runs; a failure in one combination is recorded and
//! the batch moves on.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cli::{
    build_config, load_attachment, resolve_api_key, spawn_output_writer, Cli, OutputLine,
};
use crate::engine::MockStages;
use crate::inputs::{self, UploadKind, CV_EXTENSIONS, JOB_EXTENSIONS};
use crate::model::{compact_timestamp, rfc3339_now, JobSource, RunInput, RunReport, Settings};
use crate::orchestrator::{process_run_completion, SessionController};
use crate::storage::JsonFileStorage;

#[derive(Debug)]
pub(crate) struct BatchOutcome {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// One line per combination, in run order, for the report file.
    pub lines: Vec<String>,
}

pub(crate) async fn run_batch(
    args: &Cli,
    store: &JsonFileStorage,
    settings: &Settings,
) -> Result<BatchOutcome> {
    let cvs_dir = args
        .cvs_dir
        .as_ref()
        .context("--cvs-dir is required for batch mode")?;
    let jobs_dir = args
        .jobs_dir
        .as_ref()
        .context("--jobs-dir is required for batch mode")?;

    let cvs = find_documents(cvs_dir, &CV_EXTENSIONS)?;
    if cvs.is_empty() {
        bail!("no resume files found in {}", cvs_dir.display());
    }
    let jobs = find_documents(jobs_dir, &JOB_EXTENSIONS)?;
    if jobs.is_empty() {
        bail!("no job description files found in {}", jobs_dir.display());
    }

    let (out_tx, out_handle) = spawn_output_writer();
    let controller = SessionController::new(Arc::new(MockStages::new()));

    let mut outcome = BatchOutcome {
        total: 0,
        completed: 0,
        failed: 0,
        lines: Vec::new(),
    };

    for cv_path in &cvs {
        for job_path in &jobs {
            outcome.total += 1;
            let label = format!("{} x {}", display_name(cv_path), display_name(job_path));
            let _ = out_tx.send(OutputLine::Stderr(format!("[{}] {label}", outcome.total)));

            match run_one(&controller, args, settings, cv_path, job_path).await {
                Ok(report) => {
                    outcome.completed += 1;
                    process_run_completion(store, &report, 1, args.auto_save);
                    let _ = out_tx.send(OutputLine::Stderr(format!(
                        "    done: {}",
                        report.artifact.file_name
                    )));
                    outcome
                        .lines
                        .push(format!("OK   {label} -> {}", report.artifact.file_name));
                }
                Err(err) => {
                    outcome.failed += 1;
                    let _ = out_tx.send(OutputLine::Stderr(format!("    failed: {err:#}")));
                    outcome.lines.push(format!("FAIL {label}: {err:#}"));
                }
            }
        }
    }

    let _ = out_tx.send(OutputLine::Stdout(format!(
        "Batch complete: {} runs, {} completed, {} failed",
        outcome.total, outcome.completed, outcome.failed
    )));

    if args.report {
        let path = write_batch_report(args, &outcome)?;
        let _ = out_tx.send(OutputLine::Stderr(format!("Report: {}", path.display())));
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(outcome)
}

/// Run one CV/job combination through the controller, draining its events.
async fn run_one(
    controller: &SessionController,
    args: &Cli,
    settings: &Settings,
    cv_path: &Path,
    job_path: &Path,
) -> Result<RunReport> {
    let mut cfg = build_config(args, settings);
    // Each combination derives its own artifact name from its CV and job.
    cfg.output_stem = None;

    let cv = load_attachment(cv_path)?;
    inputs::check_attachment(&cv, UploadKind::Cv)?;
    let job = load_attachment(job_path)?;
    inputs::check_attachment(&job, UploadKind::Job)?;

    let input = RunInput {
        api_key: resolve_api_key(args),
        cv: Some(cv),
        job: JobSource::File(job),
    };

    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel();
    let drain = tokio::spawn(async move { while evt_rx.recv().await.is_some() {} });
    let report = controller.start_run(cfg, input, evt_tx).await;
    let _ = drain.await;
    report
}

/// Files in `dir` with one of the given extensions, sorted by name.
fn find_documents(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("could not read {}", dir.display()))?;
    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if extensions.contains(&extension.as_str()) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_batch_report(args: &Cli, outcome: &BatchOutcome) -> Result<PathBuf> {
    let dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("batch_report_{}.txt", compact_timestamp()));
    fs::write(&path, render_batch_report(outcome))
        .with_context(|| format!("could not write {}", path.display()))?;
    Ok(path)
}

fn render_batch_report(outcome: &BatchOutcome) -> String {
    let mut text = String::new();
    text.push_str(&format!("Batch tailoring report ({})\n", rfc3339_now()));
    text.push_str(&format!(
        "Total: {}  Completed: {}  Failed: {}\n\n",
        outcome.total, outcome.completed, outcome.failed
    ));
    for line in &outcome.lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use crate::storage::Storage;

    #[test]
    fn find_documents_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.docx", "notes.txt", "image.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let found = find_documents(dir.path(), &CV_EXTENSIONS).unwrap();
        let names: Vec<String> = found.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["a.docx", "b.pdf"]);
    }

    #[tokio::test]
    async fn batch_runs_every_combination() {
        let dir = tempfile::tempdir().unwrap();
        let cvs = dir.path().join("cvs");
        fs::create_dir(&cvs).unwrap();
        fs::write(cvs.join("resume.pdf"), vec![0u8; 512]).unwrap();
        let jobs = dir.path().join("jobs");
        fs::create_dir(&jobs).unwrap();
        fs::write(
            jobs.join("backend.txt"),
            "Full Stack Developer at Acme Corporation",
        )
        .unwrap();
        fs::write(jobs.join("frontend.md"), "Frontend Engineer opening").unwrap();

        let store = JsonFileStorage::new(dir.path().join("store"));
        let out_dir = dir.path().join("reports");

        let args = Cli::try_parse_from([
            "resume-tailor",
            "--cvs-dir",
            cvs.to_str().unwrap(),
            "--jobs-dir",
            jobs.to_str().unwrap(),
            "--api-key",
            "gsk_0123456789abcdef0123",
            "--instant",
            "--output-dir",
            out_dir.to_str().unwrap(),
            "--report",
        ])
        .unwrap();

        let outcome = run_batch(&args, &store, &Settings::default()).await.unwrap();
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.completed, 2);
        assert_eq!(outcome.failed, 0);
        assert!(outcome.lines.iter().all(|l| l.starts_with("OK")));
        // Each combination's artifact carries its own job stem.
        assert!(outcome.lines[0].contains("resume_tailored_for_backend_"));
        assert!(outcome.lines[1].contains("resume_tailored_for_frontend_"));
        assert_eq!(store.load_history().len(), 2);

        let reports: Vec<_> = fs::read_dir(&out_dir).unwrap().collect();
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn a_failed_combination_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cvs = dir.path().join("cvs");
        fs::create_dir(&cvs).unwrap();
        fs::write(cvs.join("resume.docx"), vec![0u8; 512]).unwrap();
        let jobs = dir.path().join("jobs");
        fs::create_dir(&jobs).unwrap();
        // Cleans down to nothing, so the analyze stage rejects it.
        fs::write(jobs.join("blank.txt"), "<div>   </div>").unwrap();
        fs::write(jobs.join("real.txt"), "Full Stack Developer at Acme").unwrap();

        let store = JsonFileStorage::new(dir.path().join("store"));

        let args = Cli::try_parse_from([
            "resume-tailor",
            "--cvs-dir",
            cvs.to_str().unwrap(),
            "--jobs-dir",
            jobs.to_str().unwrap(),
            "--api-key",
            "gsk_0123456789abcdef0123",
            "--instant",
        ])
        .unwrap();

        let outcome = run_batch(&args, &store, &Settings::default()).await.unwrap();
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(
            outcome.lines.iter().filter(|l| l.starts_with("FAIL")).count(),
            1
        );
        // Only the completed combination landed in history.
        assert_eq!(store.load_history().len(), 1);
    }

    #[tokio::test]
    async fn an_empty_cvs_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cvs = dir.path().join("cvs");
        fs::create_dir(&cvs).unwrap();
        let jobs = dir.path().join("jobs");
        fs::create_dir(&jobs).unwrap();
        fs::write(jobs.join("real.txt"), "posting").unwrap();

        let store = JsonFileStorage::new(dir.path().join("store"));
        let args = Cli::try_parse_from([
            "resume-tailor",
            "--cvs-dir",
            cvs.to_str().unwrap(),
            "--jobs-dir",
            jobs.to_str().unwrap(),
        ])
        .unwrap();

        let err = run_batch(&args, &store, &Settings::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no resume files"));
    }
}
