//! Text summary builder for CLI output.
//!
//! Renders a completed run report and the history listing as human-readable
//! lines for text mode. Rendering is pure and tolerates empty or partially
//! filled records; missing sections are skipped rather than erroring.

use crate::model::{HistoryEntry, RunReport, StepStatus};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from a completed run report.
pub(crate) fn build_text_summary(report: &RunReport) -> TextSummary {
    let mut lines = Vec::new();

    let title = report.job.title.trim();
    let company = report.job.company.trim();
    let mut header = String::from("Tailored");
    if !report.cv_file_name.is_empty() {
        header.push(' ');
        header.push_str(&report.cv_file_name);
    }
    if !title.is_empty() {
        header.push_str(&format!(" for {title}"));
    }
    if !company.is_empty() {
        header.push_str(&format!(" at {company}"));
    }
    lines.push(header);

    let name = report.resume.personal_details.name.trim();
    if !name.is_empty() {
        lines.push(format!("Candidate: {name}"));
    }

    let mut position = Vec::new();
    if !report.job.location.is_empty() {
        position.push(report.job.location.clone());
    }
    if !report.job.employment_type.is_empty() {
        position.push(report.job.employment_type.clone());
    }
    if report.job.remote {
        position.push("remote friendly".to_string());
    }
    if !position.is_empty() {
        lines.push(format!("Position: {}", position.join(", ")));
    }

    if !report.job.required_skills.is_empty() {
        lines.push(format!(
            "Required skills: {}",
            report.job.required_skills.join(", ")
        ));
    }

    if !report.tailored.optimized_summary.is_empty() {
        lines.push(format!("Summary: {}", report.tailored.optimized_summary));
    }

    if !report.tailored.changes.is_empty() {
        lines.push(format!(
            "Changes applied ({}):",
            report.tailored.changes.len()
        ));
        for change in &report.tailored.changes {
            lines.push(format!("  - {change}"));
        }
    }

    lines.push(format!(
        "Scores: keyword optimization {}/100, ATS compatibility {}/100",
        report.tailored.keyword_score, report.tailored.ats_score
    ));

    if !report.artifact.file_name.is_empty() {
        lines.push(format!(
            "Output: {} ({:.1} KB, {})",
            report.artifact.file_name,
            report.artifact.size_bytes as f64 / 1024.0,
            report.artifact.format.extension()
        ));
    }

    if !report.steps.is_empty() {
        let done = report
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        lines.push(format!("Steps: {}/{} completed", done, report.steps.len()));
    }

    TextSummary { lines }
}

/// Render the recent-history listing, newest first.
pub(crate) fn build_history_lines(entries: &[HistoryEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No runs recorded yet.".to_string()];
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {}: {} at {} [{}]",
                entry.timestamp,
                entry.cv_file_name,
                entry.job_title,
                entry.company_name,
                entry.status
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{sample_posting, sample_profile};
    use crate::model::{OutputFormat, StageKind, StepDescriptor};
    use crate::records::{OutputArtifact, TailoredResume};

    fn empty_report() -> RunReport {
        RunReport {
            run_id: String::new(),
            started_at: String::new(),
            finished_at: String::new(),
            cv_file_name: String::new(),
            resume: Default::default(),
            job: Default::default(),
            tailored: Default::default(),
            artifact: Default::default(),
            steps: Vec::new(),
        }
    }

    #[test]
    fn an_empty_report_still_renders() {
        let summary = build_text_summary(&empty_report());
        assert_eq!(summary.lines[0], "Tailored");
        assert!(summary
            .lines
            .iter()
            .any(|l| l.contains("keyword optimization 0/100")));
        // Empty collections render nothing rather than erroring.
        assert!(!summary.lines.iter().any(|l| l.starts_with("Changes")));
        assert!(!summary.lines.iter().any(|l| l.starts_with("Output:")));
    }

    #[test]
    fn a_full_report_renders_every_section() {
        let mut report = empty_report();
        report.cv_file_name = "resume.pdf".to_string();
        report.resume = sample_profile();
        report.job = sample_posting();
        report.tailored = TailoredResume {
            changes: vec!["Reordered skills".to_string(), "Added keywords".to_string()],
            optimized_summary: "Full-stack developer matched to the posting.".to_string(),
            keyword_score: 91,
            ats_score: 95,
        };
        report.artifact = OutputArtifact {
            file_name: "resume_tailored_20250203_100011.docx".to_string(),
            format: OutputFormat::Docx,
            size_bytes: 48_230,
            generated_at: "2025-02-03T10:00:11Z".to_string(),
        };
        report.steps = StageKind::ALL
            .iter()
            .map(|s| {
                let mut step = StepDescriptor::pending(*s);
                step.status = StepStatus::Completed;
                step
            })
            .collect();

        let summary = build_text_summary(&report);
        let text = summary.lines.join("\n");
        assert!(text.starts_with(
            "Tailored resume.pdf for Full Stack Developer at Acme Corporation"
        ));
        assert!(text.contains("Candidate: Alex Morgan"));
        assert!(text.contains("Changes applied (2):"));
        assert!(text.contains("  - Reordered skills"));
        assert!(text.contains("keyword optimization 91/100, ATS compatibility 95/100"));
        assert!(text.contains("Output: resume_tailored_20250203_100011.docx (47.1 KB, docx)"));
        assert!(text.contains("Steps: 5/5 completed"));
    }

    #[test]
    fn history_listing_formats_each_entry() {
        let entries = vec![HistoryEntry {
            id: 1738576811000,
            timestamp: "2025-02-03T10:00:11Z".to_string(),
            cv_file_name: "resume.pdf".to_string(),
            job_title: "Full Stack Developer".to_string(),
            company_name: "Acme Corporation".to_string(),
            status: "completed".to_string(),
        }];
        let lines = build_history_lines(&entries);
        assert_eq!(
            lines,
            vec![
                "2025-02-03T10:00:11Z  resume.pdf: Full Stack Developer at Acme Corporation [completed]"
                    .to_string()
            ]
        );
    }

    #[test]
    fn empty_history_says_so() {
        assert_eq!(build_history_lines(&[]), vec!["No runs recorded yet."]);
    }
}
