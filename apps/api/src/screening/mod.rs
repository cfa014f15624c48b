//! LLM Screening Service — batched candidate screening with calibration
//! feedback.
//!
//! Flow: fetch documents → build system prompt + per-candidate content
//! blocks → one LLM call per batch → parse-and-validate verdicts.

pub mod handlers;
pub mod prompts;
pub mod verdict;

use futures::future::join_all;
use serde::Deserialize;
use tracing::info;

use crate::ats::models::Answer;
use crate::errors::AppError;
use crate::extract::{DocumentExtractor, FetchedDocument};
use crate::llm_client::prompts::CANDIDATE_DELIMITER;
use crate::llm_client::{ContentBlock, LlmClient, BATCH_ATTEMPTS};
use prompts::{CALIBRATION_HEADER, CALIBRATION_LINE_TEMPLATE, SCREENING_SYSTEM_TEMPLATE};
use verdict::{parse_verdicts, ScreeningOutcome};

/// Recommended batch ceiling — keeps one request within model
/// attachment/context limits.
pub const MAX_BATCH: usize = 5;
/// Only the most recent disagreements feed calibration.
const MAX_CALIBRATION_ENTRIES: usize = 10;

/// One candidate submitted for screening.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreeningCandidate {
    pub application_id: i64,
    pub name: String,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub cover_letter_url: Option<String>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

/// A human override of a prior screening verdict, supplied by the caller
/// to bias subsequent judgments. Never persisted here.
#[derive(Debug, Clone, Deserialize)]
pub struct Disagreement {
    pub candidate_name: String,
    pub our_recommendation: String,
    pub human_decision: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Clone)]
pub struct ScreeningService {
    llm: LlmClient,
    extractor: DocumentExtractor,
}

impl ScreeningService {
    pub fn new(llm: LlmClient, extractor: DocumentExtractor) -> Self {
        Self { llm, extractor }
    }

    /// Screens one batch of candidates. Partial results are valid: ids the
    /// model omitted come back in `missing`. A response that is not JSON
    /// after fence unwrapping fails the whole batch.
    pub async fn screen_batch(
        &self,
        job_title: &str,
        requirements: &str,
        candidates: &[ScreeningCandidate],
        disagreements: &[Disagreement],
    ) -> Result<ScreeningOutcome, AppError> {
        if candidates.is_empty() {
            return Err(AppError::Validation("No candidates submitted".to_string()));
        }
        if candidates.len() > MAX_BATCH {
            return Err(AppError::Validation(format!(
                "Batch of {} exceeds the maximum of {MAX_BATCH}",
                candidates.len()
            )));
        }

        let system = build_system_prompt(job_title, requirements, disagreements);
        let content = self.build_content(candidates).await;

        info!(
            "Screening {} candidate(s) for \"{job_title}\"",
            candidates.len()
        );
        let text = self.llm.call_text(&system, content, BATCH_ATTEMPTS).await?;

        let submitted: Vec<i64> = candidates.iter().map(|c| c.application_id).collect();
        parse_verdicts(&text, &submitted).map_err(|e| AppError::Llm(e.to_string()))
    }

    /// Builds the user message: one block run per candidate, separated by
    /// an explicit delimiter. PDF resumes ride along as document blocks so
    /// the model reads them directly; everything else is inlined text.
    async fn build_content(&self, candidates: &[ScreeningCandidate]) -> Vec<ContentBlock> {
        let documents = join_all(candidates.iter().map(|c| self.fetch_documents(c))).await;

        let mut blocks = Vec::new();
        for (candidate, (resume, cover_letter)) in candidates.iter().zip(documents) {
            let mut header = format!(
                "{CANDIDATE_DELIMITER}CANDIDATE {} — {}\n",
                candidate.application_id, candidate.name
            );

            match resume {
                FetchedDocument::Pdf(bytes) => {
                    header.push_str("Resume: attached as PDF document.\n");
                    blocks.push(ContentBlock::text(header));
                    blocks.push(ContentBlock::pdf(&bytes));
                }
                FetchedDocument::Text(text) if !text.trim().is_empty() => {
                    header.push_str("RESUME:\n");
                    header.push_str(text.trim());
                    header.push('\n');
                    blocks.push(ContentBlock::text(header));
                }
                _ => {
                    header.push_str("Resume: none on file.\n");
                    blocks.push(ContentBlock::text(header));
                }
            }

            match cover_letter {
                Some(FetchedDocument::Pdf(bytes)) => {
                    blocks.push(ContentBlock::text("Cover letter: attached as PDF document.\n"));
                    blocks.push(ContentBlock::pdf(&bytes));
                }
                Some(FetchedDocument::Text(text)) if !text.trim().is_empty() => {
                    blocks.push(ContentBlock::text(format!(
                        "COVER LETTER:\n{}\n",
                        text.trim()
                    )));
                }
                _ => {}
            }

            let answers = format_answers(&candidate.answers);
            if !answers.is_empty() {
                blocks.push(ContentBlock::text(answers));
            }
        }
        blocks
    }

    async fn fetch_documents(
        &self,
        candidate: &ScreeningCandidate,
    ) -> (FetchedDocument, Option<FetchedDocument>) {
        let resume = match &candidate.resume_url {
            Some(url) => self.extractor.fetch(url).await,
            None => FetchedDocument::Empty,
        };
        let cover_letter = match &candidate.cover_letter_url {
            Some(url) => {
                let doc = self.extractor.fetch(url).await;
                if doc.is_empty() {
                    None
                } else {
                    Some(doc)
                }
            }
            None => None,
        };
        (resume, cover_letter)
    }
}

fn build_system_prompt(
    job_title: &str,
    requirements: &str,
    disagreements: &[Disagreement],
) -> String {
    let calibration = if disagreements.is_empty() {
        String::new()
    } else {
        let start = disagreements.len().saturating_sub(MAX_CALIBRATION_ENTRIES);
        let mut section = CALIBRATION_HEADER.to_string();
        for d in &disagreements[start..] {
            section.push('\n');
            section.push_str(
                &CALIBRATION_LINE_TEMPLATE
                    .replace("{name}", &d.candidate_name)
                    .replace("{ours}", &d.our_recommendation)
                    .replace("{human}", &d.human_decision)
                    .replace("{reason}", &d.reason),
            );
        }
        section
    };

    SCREENING_SYSTEM_TEMPLATE
        .replace("{job_title}", job_title)
        .replace("{requirements}", requirements)
        .replace("{calibration}", &calibration)
}

fn format_answers(answers: &[Answer]) -> String {
    let lines: Vec<String> = answers
        .iter()
        .filter(|a| !a.answer.trim().is_empty())
        .map(|a| format!("Q: {}\nA: {}", a.question, a.answer))
        .collect();
    if lines.is_empty() {
        String::new()
    } else {
        format!("QUESTION ANSWERS:\n{}\n", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disagreement(name: &str) -> Disagreement {
        Disagreement {
            candidate_name: name.to_string(),
            our_recommendation: "reject".to_string(),
            human_decision: "advance".to_string(),
            reason: "strong referral".to_string(),
        }
    }

    #[test]
    fn test_system_prompt_embeds_job_and_requirements() {
        let prompt = build_system_prompt("Staff Engineer", "Rust, 5+ years", &[]);
        assert!(prompt.contains("Staff Engineer"));
        assert!(prompt.contains("Rust, 5+ years"));
        assert!(!prompt.contains("CALIBRATION"));
        assert!(!prompt.contains("{calibration}"));
    }

    #[test]
    fn test_calibration_section_lists_disagreements() {
        let prompt = build_system_prompt(
            "Staff Engineer",
            "Rust",
            &[disagreement("Ada Lovelace")],
        );
        assert!(prompt.contains("CALIBRATION"));
        assert!(prompt.contains("Ada Lovelace"));
        assert!(prompt.contains("strong referral"));
    }

    #[test]
    fn test_calibration_caps_at_most_recent_entries() {
        let many: Vec<Disagreement> = (0..15).map(|i| disagreement(&format!("C{i}"))).collect();
        let prompt = build_system_prompt("Role", "Reqs", &many);
        // Oldest entries fall off; the most recent ten stay.
        assert!(!prompt.contains("- C4:"));
        assert!(prompt.contains("- C5:"));
        assert!(prompt.contains("- C14:"));
    }

    #[test]
    fn test_format_answers_skips_blanks() {
        let answers = vec![
            Answer {
                question: "Why?".to_string(),
                answer: "Because.".to_string(),
            },
            Answer {
                question: "Blank?".to_string(),
                answer: " ".to_string(),
            },
        ];
        let text = format_answers(&answers);
        assert!(text.contains("Q: Why?"));
        assert!(!text.contains("Blank?"));
        assert_eq!(format_answers(&[]), "");
    }
}
