//! ATS Client — the single point of entry for all Harvest-style ATS calls.
//!
//! Owns auth header construction, pagination, rate-limit backoff, and the
//! mapping from wire payloads into internal records. No other module may
//! talk to the ATS directly.

pub mod models;
pub mod pagination;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::{retry_with_backoff, BackoffPolicy, Sleeper};
use crate::settings::SettingsStore;
use models::{
    Application, ApplicationWire, ApplicationsPage, CandidateWire, Job, JobWire, Stage,
};

/// Batch size for per-candidate enrichment fan-out.
const ENRICH_BATCH: usize = 5;
/// Pause between enrichment batches to stay under the upstream rate limit.
const ENRICH_BATCH_DELAY: Duration = Duration::from_millis(300);
/// Single large page for the jobs listing; the jobs collection is small.
const JOBS_PER_PAGE: usize = 500;

#[derive(Debug, Error)]
pub enum AtsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ATS API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Invalid ATS response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl AtsError {
    fn is_rate_limit(&self) -> bool {
        matches!(self, AtsError::Api { status: 429, .. })
    }
}

/// Query options for an applications page.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    pub page: u32,
    pub per_page: usize,
    pub status: Option<String>,
    pub stage_id: Option<i64>,
}

#[derive(Clone)]
pub struct AtsClient {
    http: reqwest::Client,
    base_url: String,
    settings: Arc<SettingsStore>,
    sleeper: Arc<dyn Sleeper>,
    backoff: BackoffPolicy,
}

struct RawPage {
    body: String,
    last_page: Option<u32>,
}

impl AtsClient {
    pub fn new(base_url: String, settings: Arc<SettingsStore>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build ATS HTTP client"),
            base_url,
            settings,
            sleeper,
            backoff: BackoffPolicy::ats(),
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Transport with 429 backoff
    // ────────────────────────────────────────────────────────────────────

    /// One GET with basic auth. 429 responses are retried with exponential
    /// backoff (2s, 4s, … capped at 30s, up to 5 retries); every other
    /// non-success status propagates immediately.
    async fn get_raw(&self, path: &str, query: &[(&str, String)]) -> Result<RawPage, AtsError> {
        let url = format!("{}{path}", self.base_url);
        let url = &url;
        let client = self;
        retry_with_backoff(
            self.backoff,
            self.sleeper.as_ref(),
            AtsError::is_rate_limit,
            move || async move {
                let api_key = client.settings.snapshot().ats_api_key.clone();
                let response = client
                    .http
                    .get(url)
                    .query(query)
                    .basic_auth(&api_key, Some(""))
                    .send()
                    .await?;

                let status = response.status();
                let last_page = response
                    .headers()
                    .get("link")
                    .and_then(|v| v.to_str().ok())
                    .and_then(pagination::parse_last_page);

                let body = response.text().await.unwrap_or_default();
                if !status.is_success() {
                    return Err(AtsError::Api {
                        status: status.as_u16(),
                        message: body,
                    });
                }
                Ok(RawPage { body, last_page })
            },
        )
        .await
        .map_err(|e| {
            if e.is_rate_limit() {
                AtsError::RateLimited {
                    retries: self.backoff.max_retries,
                }
            } else {
                e
            }
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AtsError> {
        let raw = self.get_raw(path, query).await?;
        Ok(serde_json::from_str(&raw.body)?)
    }

    /// POST with basic auth plus the impersonation header. Mutations retry
    /// only on 429 (the request was never applied); everything else is
    /// surfaced untouched so callers never blind-retry a state transition.
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<(), AtsError> {
        let url = format!("{}{path}", self.base_url);
        let url = &url;
        let client = self;
        retry_with_backoff(
            self.backoff,
            self.sleeper.as_ref(),
            AtsError::is_rate_limit,
            move || async move {
                let settings = client.settings.snapshot();
                let response = client
                    .http
                    .post(url)
                    .basic_auth(&settings.ats_api_key, Some(""))
                    .header("On-Behalf-Of", &settings.ats_on_behalf_of)
                    .json(body)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(AtsError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                Ok(())
            },
        )
        .await
        .map_err(|e| {
            if e.is_rate_limit() {
                AtsError::RateLimited {
                    retries: self.backoff.max_retries,
                }
            } else {
                e
            }
        })
    }

    // ────────────────────────────────────────────────────────────────────
    // Read operations
    // ────────────────────────────────────────────────────────────────────

    pub async fn list_jobs(&self) -> Result<Vec<Job>, AtsError> {
        let wires: Vec<JobWire> = self
            .get_json("/jobs", &[("per_page", JOBS_PER_PAGE.to_string())])
            .await?;
        Ok(wires.into_iter().map(JobWire::into_job).collect())
    }

    pub async fn get_job(&self, job_id: i64) -> Result<Job, AtsError> {
        let wire: JobWire = self.get_json(&format!("/jobs/{job_id}"), &[]).await?;
        Ok(wire.into_job())
    }

    pub async fn list_stages(&self, job_id: i64) -> Result<Vec<Stage>, AtsError> {
        self.get_json(&format!("/jobs/{job_id}/stages"), &[]).await
    }

    async fn fetch_applications_wire(
        &self,
        job_id: i64,
        page: u32,
        per_page: usize,
        status: Option<&str>,
    ) -> Result<Vec<ApplicationWire>, AtsError> {
        let mut query = vec![
            ("job_id", job_id.to_string()),
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        self.get_json("/applications", &query).await
    }

    /// Best-effort total count: a one-row probe whose `rel="last"` page
    /// number equals the row count. `None` when metadata is absent.
    async fn estimate_total(&self, job_id: i64, status: Option<&str>) -> Option<usize> {
        let mut query = vec![
            ("job_id", job_id.to_string()),
            ("page", "1".to_string()),
            ("per_page", "1".to_string()),
        ];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        match self.get_raw("/applications", &query).await {
            Ok(raw) => raw.last_page.map(|p| p as usize),
            Err(e) => {
                warn!("Total-count probe failed (continuing without): {e}");
                None
            }
        }
    }

    /// One page of applications without enrichment round-trips. The
    /// upstream stage filter is non-functional server-side, so the stage
    /// filter is always applied client-side after fetching the page.
    pub async fn list_applications_page_lightweight(
        &self,
        job_id: i64,
        opts: &PageOptions,
    ) -> Result<ApplicationsPage, AtsError> {
        let page = if opts.page == 0 { 1 } else { opts.page };
        let per_page = if opts.per_page == 0 { 50 } else { opts.per_page };

        let (page_result, total) = tokio::join!(
            self.fetch_applications_wire(job_id, page, per_page, opts.status.as_deref()),
            self.estimate_total(job_id, opts.status.as_deref()),
        );

        let mut applications: Vec<Application> = page_result?
            .into_iter()
            .map(ApplicationWire::into_application)
            .collect();
        let fetched_count = applications.len();

        if let Some(stage_id) = opts.stage_id {
            applications.retain(|a| a.stage.as_ref().map(|s| s.id) == Some(stage_id));
        }

        // Newest first; sort_by is stable so upstream order breaks ties.
        applications.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));

        debug!(
            "Applications page {page} for job {job_id}: {} rows ({} after stage filter)",
            fetched_count,
            applications.len()
        );

        Ok(ApplicationsPage {
            applications,
            total_estimate: total.unwrap_or(fetched_count),
        })
    }

    /// One page of applications with candidate contact info, obtained by an
    /// additional per-candidate fetch in batches of 5 with a fixed pause
    /// between batches. A failed enrichment leaves that row lightweight.
    pub async fn list_applications_page(
        &self,
        job_id: i64,
        opts: &PageOptions,
    ) -> Result<ApplicationsPage, AtsError> {
        let mut page = self.list_applications_page_lightweight(job_id, opts).await?;

        let batch_count = page.applications.len().div_ceil(ENRICH_BATCH);
        for (i, chunk) in page.applications.chunks_mut(ENRICH_BATCH).enumerate() {
            let fetches = chunk.iter().map(|app| {
                let client = self.clone();
                let candidate_id = app.candidate_id;
                async move {
                    client
                        .get_json::<CandidateWire>(&format!("/candidates/{candidate_id}"), &[])
                        .await
                }
            });
            let results = join_all(fetches).await;

            for (app, result) in chunk.iter_mut().zip(results) {
                match result {
                    Ok(candidate) => apply_enrichment(app, candidate),
                    Err(e) => warn!(
                        "Enrichment failed for candidate {} (application {}): {e}",
                        app.candidate_id, app.id
                    ),
                }
            }
            if i + 1 < batch_count {
                self.sleeper.sleep(ENRICH_BATCH_DELAY).await;
            }
        }

        Ok(page)
    }

    /// Fetches every application for a job through the lightweight path.
    /// `on_page` fires after each page with (page number, running count).
    pub async fn fetch_all_applications<P>(
        &self,
        job_id: i64,
        per_page: usize,
        page_delay: Duration,
        status: Option<String>,
        on_page: P,
    ) -> Result<Vec<Application>, AtsError>
    where
        P: FnMut(u32, usize),
    {
        let client = self.clone();
        let wires = pagination::fetch_all_pages(
            per_page,
            page_delay,
            self.sleeper.as_ref(),
            move |page| {
                let client = client.clone();
                let status = status.clone();
                async move {
                    client
                        .fetch_applications_wire(job_id, page, per_page, status.as_deref())
                        .await
                }
            },
            on_page,
        )
        .await?;

        Ok(wires.into_iter().map(ApplicationWire::into_application).collect())
    }

    // ────────────────────────────────────────────────────────────────────
    // Mutations
    // ────────────────────────────────────────────────────────────────────

    pub async fn reject_application(
        &self,
        application_id: i64,
        reason_id: i64,
        email_template_id: Option<i64>,
    ) -> Result<(), AtsError> {
        let mut body = json!({ "rejection_reason_id": reason_id });
        if let Some(template_id) = email_template_id {
            body["rejection_email"] = json!({ "email_template_id": template_id });
        }
        self.post_json(&format!("/applications/{application_id}/reject"), &body)
            .await
    }

    pub async fn advance_application(
        &self,
        application_id: i64,
        from_stage_id: i64,
    ) -> Result<(), AtsError> {
        self.post_json(
            &format!("/applications/{application_id}/move"),
            &json!({ "from_stage_id": from_stage_id }),
        )
        .await
    }
}

fn apply_enrichment(app: &mut Application, candidate: CandidateWire) {
    app.email = candidate
        .email_addresses
        .into_iter()
        .find_map(|c| c.value);
    app.phone = candidate.phone_numbers.into_iter().find_map(|c| c.value);

    if app.candidate_name.is_empty() {
        app.candidate_name = format!(
            "{} {}",
            candidate.first_name.as_deref().unwrap_or(""),
            candidate.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string();
    }
    if app.resume_url.is_none() {
        app.resume_url = models::attachment_url(&candidate.attachments, "resume");
    }
    if app.cover_letter_url.is_none() {
        app.cover_letter_url = models::attachment_url(&candidate.attachments, "cover_letter");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Attachment, ContactValueWire};

    fn lightweight_app() -> Application {
        Application {
            id: 10,
            candidate_id: 20,
            candidate_name: String::new(),
            stage: None,
            applied_at: None,
            resume_url: None,
            cover_letter_url: None,
            answers: vec![],
            email: None,
            phone: None,
        }
    }

    #[test]
    fn test_apply_enrichment_fills_contact_and_name() {
        let mut app = lightweight_app();
        apply_enrichment(
            &mut app,
            CandidateWire {
                first_name: Some("Grace".to_string()),
                last_name: Some("Hopper".to_string()),
                email_addresses: vec![ContactValueWire {
                    value: Some("grace@navy.mil".to_string()),
                }],
                phone_numbers: vec![],
                attachments: vec![Attachment {
                    filename: "resume.pdf".to_string(),
                    url: "https://files/grace.pdf".to_string(),
                    kind: "resume".to_string(),
                }],
            },
        );

        assert_eq!(app.candidate_name, "Grace Hopper");
        assert_eq!(app.email.as_deref(), Some("grace@navy.mil"));
        assert!(app.phone.is_none());
        assert_eq!(app.resume_url.as_deref(), Some("https://files/grace.pdf"));
    }

    #[test]
    fn test_apply_enrichment_keeps_existing_fields() {
        let mut app = lightweight_app();
        app.candidate_name = "Already Known".to_string();
        app.resume_url = Some("https://files/original.pdf".to_string());
        apply_enrichment(
            &mut app,
            CandidateWire {
                first_name: Some("Other".to_string()),
                last_name: Some("Name".to_string()),
                email_addresses: vec![],
                phone_numbers: vec![],
                attachments: vec![Attachment {
                    filename: "resume.pdf".to_string(),
                    url: "https://files/other.pdf".to_string(),
                    kind: "resume".to_string(),
                }],
            },
        );

        assert_eq!(app.candidate_name, "Already Known");
        assert_eq!(app.resume_url.as_deref(), Some("https://files/original.pdf"));
    }
}
