//! Internal record shapes plus the upstream wire structs they are mapped from.
//!
//! Wire structs mirror the Harvest-style payloads field-for-field (only the
//! fields we consume); the internal shapes are what the rest of the service
//! and the UI see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Internal shapes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub departments: Vec<String>,
    pub offices: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub name: String,
    pub priority: i64,
}

/// Reference to an application's current stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// An application as listed on a page. The lightweight path fills only
/// fields present in the page payload itself; `email`/`phone` are populated
/// by the per-candidate enrichment fetch.
#[derive(Debug, Clone, Serialize)]
pub struct Application {
    pub id: i64,
    pub candidate_id: i64,
    pub candidate_name: String,
    pub stage: Option<StageRef>,
    pub applied_at: Option<DateTime<Utc>>,
    pub resume_url: Option<String>,
    pub cover_letter_url: Option<String>,
    pub answers: Vec<Answer>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// One page of applications plus a best-effort total count.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationsPage {
    pub applications: Vec<Application>,
    pub total_estimate: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire structs (upstream payloads)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JobWire {
    pub id: i64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub departments: Vec<NamedWire>,
    #[serde(default)]
    pub offices: Vec<NamedWire>,
}

#[derive(Debug, Deserialize)]
pub struct NamedWire {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationWire {
    pub id: i64,
    pub candidate_id: i64,
    #[serde(default)]
    pub candidate: Option<CandidateSummaryWire>,
    #[serde(default)]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_stage: Option<StageRef>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub answers: Vec<AnswerWire>,
}

/// Candidate fields embedded in the applications page payload.
#[derive(Debug, Deserialize)]
pub struct CandidateSummaryWire {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerWire {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

/// Full candidate payload fetched during enrichment.
#[derive(Debug, Deserialize)]
pub struct CandidateWire {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<ContactValueWire>,
    #[serde(default)]
    pub phone_numbers: Vec<ContactValueWire>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
pub struct ContactValueWire {
    #[serde(default)]
    pub value: Option<String>,
}

impl JobWire {
    pub fn into_job(self) -> Job {
        Job {
            id: self.id,
            name: self.name,
            status: self.status,
            departments: named(self.departments),
            offices: named(self.offices),
        }
    }
}

fn named(items: Vec<NamedWire>) -> Vec<String> {
    items.into_iter().filter_map(|n| n.name).collect()
}

impl ApplicationWire {
    /// Maps a page row into the lightweight application shape. Attachment
    /// URLs and the candidate name come from the page payload; contact info
    /// stays empty until enrichment.
    pub fn into_application(self) -> Application {
        let candidate_name = self
            .candidate
            .as_ref()
            .map(|c| {
                format!(
                    "{} {}",
                    c.first_name.as_deref().unwrap_or(""),
                    c.last_name.as_deref().unwrap_or("")
                )
                .trim()
                .to_string()
            })
            .unwrap_or_default();

        let resume_url = attachment_url(&self.attachments, "resume");
        let cover_letter_url = attachment_url(&self.attachments, "cover_letter");

        Application {
            id: self.id,
            candidate_id: self.candidate_id,
            candidate_name,
            stage: self.current_stage,
            applied_at: self.applied_at,
            resume_url,
            cover_letter_url,
            answers: self
                .answers
                .into_iter()
                .map(|a| Answer {
                    question: a.question.unwrap_or_default(),
                    answer: a.answer.unwrap_or_default(),
                })
                .collect(),
            email: None,
            phone: None,
        }
    }
}

pub(crate) fn attachment_url(attachments: &[Attachment], kind: &str) -> Option<String> {
    attachments
        .iter()
        .find(|a| a.kind == kind)
        .map(|a| a.url.clone())
}

/// Locates the "Application Review" stage by case-insensitive substring —
/// stage identifiers carry no stable contract across jobs.
pub fn find_review_stage<'a>(stages: &'a [Stage], needle: &str) -> Option<&'a Stage> {
    let needle = needle.to_lowercase();
    stages
        .iter()
        .find(|s| s.name.to_lowercase().contains(&needle))
}
