//! Structured records produced by the pipeline stages.
//!
//! Every field defaults when missing so partially-populated JSON (older
//! exports, trimmed fixtures) still deserializes; missing text fields come
//! back as empty strings rather than errors.

use serde::{Deserialize, Serialize};

use crate::model::OutputFormat;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub website: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationEntry {
    pub degree: String,
    pub institution: String,
    pub graduation_year: String,
    pub gpa: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkExperience {
    pub position: String,
    pub company: String,
    pub start_date: String,
    pub end_date: String,
    pub location: String,
    pub responsibilities: Vec<String>,
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillSet {
    pub technical: Vec<String>,
    pub soft: Vec<String>,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub date: String,
}

/// Everything extracted from the CV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeProfile {
    pub personal_details: PersonalDetails,
    pub professional_summary: String,
    pub education: Vec<EducationEntry>,
    pub work_experience: Vec<WorkExperience>,
    pub skills: SkillSet,
    pub projects: Vec<Project>,
    pub certifications: Vec<Certification>,
}

/// Everything parsed out of the job description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub employment_type: String,
    pub remote: bool,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub responsibilities: Vec<String>,
    pub experience_required: String,
    pub benefits: Vec<String>,
}

/// The tailoring stage's output: what changed and how well the result scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailoredResume {
    pub changes: Vec<String>,
    pub optimized_summary: String,
    /// 0-100: share of posting keywords present after tailoring.
    pub keyword_score: u8,
    /// 0-100: how cleanly an applicant tracking system would parse the document.
    pub ats_score: u8,
}

/// Metadata for the generated document. The document itself is simulated, so
/// only its name, format and size are recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputArtifact {
    pub file_name: String,
    pub format: OutputFormat,
    pub size_bytes: u64,
    pub generated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_profile_json_fills_defaults() {
        let json = r#"{
            "personal_details": {"name": "Jane Doe"},
            "work_experience": [{"position": "Engineer", "company": "Initech"}]
        }"#;
        let profile: ResumeProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.personal_details.name, "Jane Doe");
        assert_eq!(profile.personal_details.email, "");
        assert_eq!(profile.work_experience.len(), 1);
        assert!(profile.work_experience[0].responsibilities.is_empty());
        assert!(profile.education.is_empty());
    }

    #[test]
    fn empty_object_is_a_valid_posting() {
        let posting: JobPosting = serde_json::from_str("{}").unwrap();
        assert_eq!(posting.title, "");
        assert!(!posting.remote);
        assert!(posting.required_skills.is_empty());
    }

    #[test]
    fn artifact_round_trips_through_json() {
        let artifact = OutputArtifact {
            file_name: "resume_tailored_20250101_120000.docx".to_string(),
            format: OutputFormat::Docx,
            size_bytes: 48_213,
            generated_at: "2025-01-01T12:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&artifact).unwrap();
        let back: OutputArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, artifact);
    }
}
