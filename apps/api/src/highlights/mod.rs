//! LLM Ranking Pipeline ("Highlights") — a two-phase tournament that ranks
//! the top N of a candidate pool too large for one model context.
//!
//! Phase 1 eliminates per batch of 100, sequentially (the rate-limit
//! budget is the scarce resource, and progress must be observably
//! incremental). Phase 2 re-ranks the union of batch winners in a single
//! call.

pub mod handlers;
pub mod prompts;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{
    strip_json_fences, ContentBlock, LlmClient, BATCH_ATTEMPTS, FINAL_ATTEMPTS,
};
use crate::progress::ProgressEvent;
use crate::screening::verdict::coerce_id;
use prompts::{BATCH_SYSTEM_TEMPLATE, FINAL_SYSTEM_TEMPLATE};

/// Candidates per phase-1 elimination batch.
pub const BATCH_SIZE: usize = 100;
pub const DEFAULT_TOP_N: usize = 100;
/// Phase-1 inclusion floor; the model is told not to select below this.
const SCORE_FLOOR: u32 = 70;
/// Per-candidate resume excerpt in a phase-1 batch prompt.
const BATCH_RESUME_CAP: usize = 1_200;
/// Hard ceiling on per-candidate resume text in the final prompt.
const FINAL_RESUME_CAP: usize = 3_000;
/// Total character budget the final prompt divides across winners.
const FINAL_PROMPT_BUDGET: usize = 500_000;

/// Full candidate data fed into the tournament.
#[derive(Debug, Clone)]
pub struct RankingCandidate {
    pub application_id: i64,
    pub candidate_id: i64,
    pub name: String,
    pub resume_text: String,
    pub answers_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Top,
    Strong,
    Good,
}

/// Tier bands come from the final rank alone, never from the score.
pub fn tier_for_rank(rank: u32) -> Tier {
    match rank {
        1..=10 => Tier::Top,
        11..=25 => Tier::Strong,
        _ => Tier::Good,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HighlightedCandidate {
    pub rank: u32,
    pub application_id: i64,
    pub candidate_id: i64,
    pub candidate_name: String,
    pub profile_url: String,
    pub score: u32,
    pub summary: String,
    pub tier: Tier,
}

/// One phase-1 winner (also the shape of a final-ranking entry).
#[derive(Debug, Clone)]
struct ScoredEntry {
    application_id: i64,
    score: u32,
    summary: String,
}

pub struct HighlightsPipeline {
    llm: LlmClient,
    ui_base_url: String,
}

impl HighlightsPipeline {
    pub fn new(llm: LlmClient, ui_base_url: String) -> Self {
        Self { llm, ui_base_url }
    }

    /// Runs the full tournament. `progress` fires after each batch and on
    /// phase transitions. An empty pool or a phase 1 that produces no
    /// winners yields an empty ranking, not an error.
    pub async fn run<P>(
        &self,
        job_title: &str,
        candidates: Vec<RankingCandidate>,
        top_n: usize,
        mut progress: P,
    ) -> Result<Vec<HighlightedCandidate>, AppError>
    where
        P: FnMut(ProgressEvent),
    {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let top_n = if top_n == 0 { DEFAULT_TOP_N } else { top_n };

        let batches: Vec<&[RankingCandidate]> = candidates.chunks(BATCH_SIZE).collect();
        let batch_count = batches.len();
        // 1.5x buffer over an even split, so a weak later drop still
        // leaves enough finalists.
        let per_batch_ask = winners_per_batch(top_n, batch_count);

        progress(ProgressEvent::status(
            "analyzing",
            format!(
                "Ranking {} candidates in {batch_count} batch(es)",
                candidates.len()
            ),
        ));

        // Phase 1 — batch elimination, strictly sequential.
        let mut winners: Vec<ScoredEntry> = Vec::new();
        for (i, batch) in batches.iter().enumerate() {
            match self.run_batch(job_title, batch, per_batch_ask).await {
                Ok(mut batch_winners) => {
                    batch_winners.truncate(per_batch_ask);
                    winners.extend(batch_winners);
                }
                Err(e) => {
                    // A failed batch contributes zero winners; the
                    // tournament keeps going.
                    warn!("Elimination batch {}/{} failed: {e}", i + 1, batch_count);
                }
            }
            progress(ProgressEvent::Batch {
                batch: i + 1,
                total_batches: batch_count,
                winners_so_far: winners.len(),
            });
        }

        if winners.is_empty() {
            warn!("Phase 1 produced no winners; returning empty ranking");
            return Ok(Vec::new());
        }

        info!(
            "Phase 1 complete: {} winner(s) from {batch_count} batch(es)",
            winners.len()
        );
        progress(ProgressEvent::status(
            "ranking",
            format!("Final ranking over {} finalist(s)", winners.len()),
        ));

        // Phase 2 — single final ranking call over the union of winners.
        self.run_final(job_title, &candidates, winners, top_n).await
    }

    async fn run_batch(
        &self,
        job_title: &str,
        batch: &[RankingCandidate],
        per_batch_ask: usize,
    ) -> Result<Vec<ScoredEntry>, AppError> {
        let system = BATCH_SYSTEM_TEMPLATE
            .replace("{job_title}", job_title)
            .replace("{max_winners}", &per_batch_ask.to_string());

        let mut body = String::new();
        for candidate in batch {
            body.push_str(&format_candidate(candidate, BATCH_RESUME_CAP));
        }

        let text = self
            .llm
            .call_text(&system, vec![ContentBlock::text(body)], BATCH_ATTEMPTS)
            .await?;

        let entries = parse_scored_entries(&text)
            .map_err(|reason| AppError::Llm(format!("batch response parse failed: {reason}")))?;
        Ok(entries
            .into_iter()
            .filter(|e| e.score >= SCORE_FLOOR)
            .collect())
    }

    async fn run_final(
        &self,
        job_title: &str,
        candidates: &[RankingCandidate],
        winners: Vec<ScoredEntry>,
        top_n: usize,
    ) -> Result<Vec<HighlightedCandidate>, AppError> {
        let resume_cap = final_resume_cap(winners.len());
        let system = FINAL_SYSTEM_TEMPLATE
            .replace("{job_title}", job_title)
            .replace("{top_n}", &top_n.to_string());

        let mut body = String::new();
        let mut pool = Vec::with_capacity(winners.len());
        for winner in &winners {
            let Some(candidate) = candidates
                .iter()
                .find(|c| c.application_id == winner.application_id)
            else {
                warn!(
                    "Phase 1 selected unknown application {}; dropping",
                    winner.application_id
                );
                continue;
            };
            body.push_str(&format_candidate(candidate, resume_cap));
            pool.push(candidate);
        }
        if pool.is_empty() {
            return Ok(Vec::new());
        }

        let text = self
            .llm
            .call_text(&system, vec![ContentBlock::text(body)], FINAL_ATTEMPTS)
            .await?;

        // The final ranking is the expensive, non-resumable step; a
        // malformed response here fails the whole pipeline.
        let ranked = parse_scored_entries(&text)
            .map_err(|reason| AppError::Llm(format!("final ranking parse failed: {reason}")))?;

        let mut highlights = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for entry in ranked {
            if highlights.len() >= top_n {
                break;
            }
            if !seen.insert(entry.application_id) {
                continue;
            }
            let Some(candidate) = pool
                .iter()
                .find(|c| c.application_id == entry.application_id)
            else {
                warn!(
                    "Final ranking returned unknown application {}; dropping",
                    entry.application_id
                );
                continue;
            };
            let rank = highlights.len() as u32 + 1;
            highlights.push(HighlightedCandidate {
                rank,
                application_id: candidate.application_id,
                candidate_id: candidate.candidate_id,
                candidate_name: candidate.name.clone(),
                profile_url: format!(
                    "{}/people/{}?application_id={}",
                    self.ui_base_url, candidate.candidate_id, candidate.application_id
                ),
                score: entry.score,
                summary: entry.summary,
                tier: tier_for_rank(rank),
            });
        }

        info!("Final ranking produced {} highlight(s)", highlights.len());
        Ok(highlights)
    }
}

/// `ceil(1.5 × top_n / batch_count)` winners requested from each batch.
fn winners_per_batch(top_n: usize, batch_count: usize) -> usize {
    (3 * top_n).div_ceil(2 * batch_count.max(1))
}

/// Per-candidate resume text allowance in the final prompt:
/// `min(3000, 500_000 / winner_count)` characters.
fn final_resume_cap(winner_count: usize) -> usize {
    FINAL_RESUME_CAP.min(FINAL_PROMPT_BUDGET / winner_count.max(1))
}

fn format_candidate(candidate: &RankingCandidate, resume_cap: usize) -> String {
    let resume: String = candidate.resume_text.chars().take(resume_cap).collect();
    let mut block = format!(
        "---\nAPPLICATION {} — {}\n",
        candidate.application_id, candidate.name
    );
    if resume.trim().is_empty() {
        block.push_str("(no resume text)\n");
    } else {
        block.push_str(&resume);
        block.push('\n');
    }
    if !candidate.answers_text.is_empty() {
        block.push_str(&candidate.answers_text);
        block.push('\n');
    }
    block
}

/// Parses `[{application_id, score, summary}, …]` with total per-field
/// coercion. Entries without a usable id are dropped; a top-level value
/// that is not an array (or an object wrapping one) is an error.
fn parse_scored_entries(raw: &str) -> Result<Vec<ScoredEntry>, String> {
    let value: Value =
        serde_json::from_str(strip_json_fences(raw)).map_err(|e| e.to_string())?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(ref map) => match map.get("candidates").or_else(|| map.get("winners")) {
            Some(Value::Array(items)) => items.clone(),
            _ => return Err("expected a JSON array of candidates".to_string()),
        },
        _ => return Err("expected a JSON array of candidates".to_string()),
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in &items {
        let Some(id) = item.get("application_id").and_then(coerce_id) else {
            warn!("Dropping ranked entry without application_id: {item}");
            continue;
        };
        let score = item
            .get("score")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            .min(100) as u32;
        let summary = item
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        entries.push(ScoredEntry {
            application_id: id,
            score,
            summary,
        });
    }
    Ok(entries)
}
