// All LLM prompt constants for the Highlights (ranking) module.

/// System prompt for a phase-1 elimination batch. Replace `{job_title}`
/// and `{max_winners}`.
pub const BATCH_SYSTEM_TEMPLATE: &str = r#"You are ranking job applicants for the role: {job_title}

You will receive one batch of candidates. Select AT MOST {max_winners} candidates from THIS BATCH ONLY who could plausibly be among the strongest applicants for the role. Score each selected candidate 0-100; do not select anyone you would score below 70.

Respond with a JSON array only, one object per selected candidate:
[
  {"application_id": 12345, "score": 85, "summary": "One-sentence reason this candidate stands out"}
]

Use each candidate's application_id verbatim. Select fewer than {max_winners} if the batch is weak — an empty array is a valid answer."#;

/// System prompt for the phase-2 final ranking. Replace `{job_title}` and
/// `{top_n}`.
pub const FINAL_SYSTEM_TEMPLATE: &str = r#"You are producing the final ranking of job applicants for the role: {job_title}

You will receive the shortlisted candidates from earlier elimination rounds. Rank the top {top_n}, best first. Score each 0-100 against the role.

Respond with a JSON array only, ordered best-first:
[
  {"application_id": 12345, "score": 91, "summary": "One-sentence case for this candidate"}
]

Use each candidate's application_id verbatim. Include at most {top_n} entries."#;
