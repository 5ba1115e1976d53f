//! Simulated stage implementations. Each stage sleeps on the engine's clock
//! (pacing lives in the step runner, not here) and returns canned records
//! shaped exactly like the real extraction/parsing output, so every layer
//! above sees production-shaped data.

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;

use super::services::{StageError, StageServices};
use crate::model::{compact_timestamp, rfc3339_now, JobSource, OutputFormat, RunState};
use crate::records::{
    Certification, EducationEntry, JobPosting, OutputArtifact, PersonalDetails, Project,
    ResumeProfile, SkillSet, TailoredResume, WorkExperience,
};

#[derive(Debug, Default)]
pub struct MockStages;

impl MockStages {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageServices for MockStages {
    async fn validate(&self, state: &RunState) -> Result<(), StageError> {
        if state.config.fault.should_fail() {
            return Err(StageError::InvalidFileFormat);
        }
        Ok(())
    }

    async fn extract_resume(&self, _state: &RunState) -> Result<ResumeProfile, StageError> {
        Ok(sample_profile())
    }

    async fn analyze_job(&self, state: &RunState) -> Result<JobPosting, StageError> {
        let raw = resolve_job_text(&state.input.job).await?;
        let cleaned = clean_job_text(&raw);
        if cleaned.is_empty() {
            return Err(StageError::EmptyJobText);
        }
        Ok(sample_posting())
    }

    async fn tailor(&self, state: &RunState) -> Result<TailoredResume, StageError> {
        let company = state
            .job
            .as_ref()
            .map(|job| job.company.clone())
            .unwrap_or_else(|| "the target company".to_string());
        let mut rng = rand::thread_rng();
        Ok(TailoredResume {
            changes: vec![
                format!("Rewrote the professional summary around full-stack delivery for {company}"),
                "Reordered technical skills to lead with React, Node.js and PostgreSQL".to_string(),
                "Added 12 keywords from the posting across experience bullets".to_string(),
                "Quantified three achievements with user, latency and uptime figures".to_string(),
                "Moved the Shelfmate project above older roles to show end-to-end ownership"
                    .to_string(),
                "Dropped an unrelated certification to keep the resume on one page".to_string(),
            ],
            optimized_summary: format!(
                "Full-stack developer with seven years of experience shipping React and Node.js \
                 applications at scale, with the PostgreSQL and REST API depth that {company} \
                 is hiring for."
            ),
            keyword_score: rng.gen_range(84..=95),
            ats_score: rng.gen_range(88..=97),
        })
    }

    async fn generate_output(&self, state: &RunState) -> Result<OutputArtifact, StageError> {
        let format = state.config.settings.output_format;
        let size_bytes = match format {
            OutputFormat::Docx => rand::thread_rng().gen_range(18_000..52_000),
            OutputFormat::Pdf => rand::thread_rng().gen_range(46_000..110_000),
        };
        Ok(OutputArtifact {
            file_name: format!("{}.{}", artifact_stem(state), format.extension()),
            format,
            size_bytes,
            generated_at: rfc3339_now(),
        })
    }
}

/// A configured `--output` stem is used verbatim. Otherwise the name is
/// built from the CV stem, the job file stem when there is one, and a
/// timestamp.
fn artifact_stem(state: &RunState) -> String {
    if let Some(stem) = &state.config.output_stem {
        return stem.clone();
    }
    let cv = cv_stem(state).unwrap_or_else(|| "resume".to_string());
    match job_stem(state) {
        Some(job) => format!("{cv}_tailored_for_{job}_{}", compact_timestamp()),
        None => format!("{cv}_tailored_{}", compact_timestamp()),
    }
}

fn cv_stem(state: &RunState) -> Option<String> {
    let cv = state.input.cv.as_ref()?;
    file_stem(&cv.file_name)
}

fn job_stem(state: &RunState) -> Option<String> {
    match &state.input.job {
        JobSource::File(attachment) => file_stem(&attachment.file_name),
        JobSource::Text(_) | JobSource::None => None,
    }
}

fn file_stem(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
}

async fn resolve_job_text(job: &JobSource) -> Result<String, StageError> {
    match job {
        JobSource::Text(text) => Ok(text.clone()),
        JobSource::File(attachment) => tokio::fs::read_to_string(&attachment.path)
            .await
            .map_err(|source| StageError::JobFileRead {
                path: attachment.path.display().to_string(),
                source,
            }),
        JobSource::None => Ok(String::new()),
    }
}

/// Strip complete markup tags, then collapse runs of whitespace. Postings
/// copied out of job boards arrive with both. A stray `<` with no closing
/// `>` is plain text, not a tag, and survives cleanup.
fn clean_job_text(raw: &str) -> String {
    let stripped = match Regex::new(r"<[^>]+>") {
        Ok(tags) => tags.replace_all(raw, "").into_owned(),
        Err(_) => raw.to_string(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn sample_profile() -> ResumeProfile {
    ResumeProfile {
        personal_details: PersonalDetails {
            name: "Alex Morgan".to_string(),
            email: "alex.morgan@example.com".to_string(),
            phone: "+1 (415) 555-0172".to_string(),
            location: "Portland, OR".to_string(),
            linkedin: "linkedin.com/in/alexmorgan-dev".to_string(),
            github: "github.com/alexmorgan-dev".to_string(),
            website: "alexmorgan.dev".to_string(),
        },
        professional_summary: "Software engineer with seven years of experience building web \
                               applications end to end, from React front ends to Node.js and \
                               PostgreSQL back ends."
            .to_string(),
        education: vec![EducationEntry {
            degree: "B.S. Computer Science".to_string(),
            institution: "Oregon State University".to_string(),
            graduation_year: "2017".to_string(),
            gpa: "3.7".to_string(),
            location: "Corvallis, OR".to_string(),
        }],
        work_experience: vec![
            WorkExperience {
                position: "Senior Software Engineer".to_string(),
                company: "Brightline Labs".to_string(),
                start_date: "2021-03".to_string(),
                end_date: "Present".to_string(),
                location: "Portland, OR".to_string(),
                responsibilities: vec![
                    "Lead development of a customer portal serving 40k monthly users".to_string(),
                    "Drove the move from a monolith to service-backed rendering".to_string(),
                    "Review designs and mentor three junior engineers".to_string(),
                ],
                technologies: vec![
                    "TypeScript".to_string(),
                    "React".to_string(),
                    "Node.js".to_string(),
                    "PostgreSQL".to_string(),
                    "AWS".to_string(),
                ],
            },
            WorkExperience {
                position: "Software Engineer".to_string(),
                company: "Nimbus Retail".to_string(),
                start_date: "2017-07".to_string(),
                end_date: "2021-02".to_string(),
                location: "Seattle, WA".to_string(),
                responsibilities: vec![
                    "Built checkout and inventory views in React".to_string(),
                    "Added REST endpoints and background jobs to the Node.js API".to_string(),
                    "Cut page load times by profiling and caching hot queries".to_string(),
                ],
                technologies: vec![
                    "JavaScript".to_string(),
                    "React".to_string(),
                    "Express".to_string(),
                    "Redis".to_string(),
                    "MySQL".to_string(),
                ],
            },
        ],
        skills: SkillSet {
            technical: vec![
                "JavaScript".to_string(),
                "TypeScript".to_string(),
                "React".to_string(),
                "Node.js".to_string(),
                "Express".to_string(),
                "PostgreSQL".to_string(),
                "Redis".to_string(),
                "Docker".to_string(),
                "AWS".to_string(),
                "Git".to_string(),
            ],
            soft: vec![
                "Mentoring".to_string(),
                "Technical writing".to_string(),
                "Cross-team communication".to_string(),
            ],
            languages: vec!["English".to_string(), "Spanish".to_string()],
        },
        projects: vec![Project {
            name: "Shelfmate".to_string(),
            description: "Open-source inventory tracker for small shops".to_string(),
            technologies: vec![
                "React".to_string(),
                "Node.js".to_string(),
                "SQLite".to_string(),
            ],
            url: "github.com/alexmorgan-dev/shelfmate".to_string(),
        }],
        certifications: vec![Certification {
            name: "AWS Certified Developer - Associate".to_string(),
            issuer: "Amazon Web Services".to_string(),
            date: "2023-05".to_string(),
        }],
    }
}

pub(crate) fn sample_posting() -> JobPosting {
    JobPosting {
        title: "Full Stack Developer".to_string(),
        company: "Acme Corporation".to_string(),
        location: "Austin, TX".to_string(),
        employment_type: "Full-time".to_string(),
        remote: true,
        required_skills: vec![
            "JavaScript".to_string(),
            "TypeScript".to_string(),
            "React".to_string(),
            "Node.js".to_string(),
            "PostgreSQL".to_string(),
            "REST APIs".to_string(),
        ],
        preferred_skills: vec![
            "Docker".to_string(),
            "AWS".to_string(),
            "GraphQL".to_string(),
            "CI/CD pipelines".to_string(),
        ],
        responsibilities: vec![
            "Design and ship features across the web stack".to_string(),
            "Build and maintain REST APIs".to_string(),
            "Work with product and design on feature scoping".to_string(),
            "Keep test coverage and review standards high".to_string(),
        ],
        experience_required: "3+ years building production web applications".to_string(),
        benefits: vec![
            "Health, dental and vision coverage".to_string(),
            "Remote-first with quarterly onsites".to_string(),
            "401(k) matching".to_string(),
            "Annual learning budget".to_string(),
        ],
    }
}
