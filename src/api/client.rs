use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::types::*;
use super::ClaimsBackend;
use crate::error::{AutoGuardError, Result};

/// Default backend location used when no config or env override is set.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

/// HTTP client for the AutoGuard REST backend.
///
/// Every request carries the bearer token when one is set. Non-success
/// responses are mapped onto [`AutoGuardError`] using the status code and
/// the backend's error body.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8000/api/v1`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| AutoGuardError::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AutoGuardError::Config(format!(
                "API base URL must be http(s), got '{}'",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent("AutoGuard/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| AutoGuardError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> String {
        let path: Vec<String> = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!("{}/{}", self.base_url, path.join("/"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and return the raw body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let response = self.authorize(request).send().await.map_err(|e| {
            warn!("Request failed: {}", e);
            if e.is_timeout() || e.is_connect() || e.is_request() {
                AutoGuardError::Network(e.to_string())
            } else {
                AutoGuardError::from(e)
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AutoGuardError::Network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&body)
                .ok()
                .and_then(ApiErrorBody::into_message)
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            warn!("Backend returned {}: {}", status.as_u16(), message);
            return Err(AutoGuardError::from_status(status.as_u16(), message));
        }

        Ok(body.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to decode backend response: {}", e);
            AutoGuardError::Decode(e.to_string())
        })
    }

    // =========================================================================
    // ANALYSIS
    // =========================================================================

    /// Upload a vehicle photo as multipart field `image`.
    ///
    /// Callers should validate the bytes with [`crate::upload::validate_image`]
    /// first; this method sends whatever it is given.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<UploadResponse> {
        info!("Uploading {} ({} bytes)", file_name, bytes.len());
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| AutoGuardError::Validation(format!("Invalid MIME type '{}': {}", mime_type, e)))?;
        let form = Form::new().part("image", part);

        let url = self.endpoint(&["analysis", "upload"]);
        self.send_json(self.client.post(url).multipart(form)).await
    }

    pub async fn get_analysis(&self, analysis_id: &str) -> Result<AnalysisRecord> {
        debug!("Fetching analysis {}", analysis_id);
        let url = self.endpoint(&["analysis", analysis_id]);
        self.send_json(self.client.get(url)).await
    }

    pub async fn get_analysis_status(&self, analysis_id: &str) -> Result<AnalysisProgress> {
        let url = self.endpoint(&["analysis", analysis_id, "status"]);
        self.send_json(self.client.get(url)).await
    }

    // =========================================================================
    // CLAIMS
    // =========================================================================

    pub async fn list_claims(&self, filters: &ClaimFilters) -> Result<Paginated<Claim>> {
        let url = self.endpoint(&["claims"]);
        self.send_json(self.client.get(url).query(&filters.to_query()))
            .await
    }

    pub async fn get_claim(&self, claim_id: &str) -> Result<Claim> {
        let url = self.endpoint(&["claims", claim_id]);
        self.send_json(self.client.get(url)).await
    }

    /// Create (or retrieve) the claim for a completed analysis.
    pub async fn create_claim(&self, analysis_id: &str) -> Result<Claim> {
        info!("Creating claim for analysis {}", analysis_id);
        let url = self.endpoint(&["claims"]);
        self.send_json(self.client.post(url).query(&[("analysis_id", analysis_id)]))
            .await
    }

    pub async fn approve_claim(&self, claim_id: &str, notes: Option<&str>) -> Result<Claim> {
        info!("Approving claim {}", claim_id);
        let url = self.endpoint(&["claims", claim_id, "approve"]);
        let body = serde_json::json!({ "notes": notes });
        self.send_json(self.client.post(url).json(&body)).await
    }

    pub async fn reject_claim(&self, claim_id: &str, reason: &str) -> Result<Claim> {
        info!("Rejecting claim {}", claim_id);
        let url = self.endpoint(&["claims", claim_id, "reject"]);
        let body = serde_json::json!({ "reason": reason });
        self.send_json(self.client.post(url).json(&body)).await
    }

    pub async fn request_review(&self, claim_id: &str, notes: &str) -> Result<Claim> {
        info!("Requesting review for claim {}", claim_id);
        let url = self.endpoint(&["claims", claim_id, "review"]);
        let body = serde_json::json!({ "notes": notes });
        self.send_json(self.client.post(url).json(&body)).await
    }

    // =========================================================================
    // REPORTS
    // =========================================================================

    /// Generate a claim report. Returns the raw report bytes (JSON or PDF).
    pub async fn generate_report(&self, request: &ReportRequest) -> Result<Vec<u8>> {
        info!(
            "Generating {} report for claim {}",
            request.format.extension(),
            request.claim_id
        );
        let url = self.endpoint(&["reports", "generate"]);
        self.send(self.client.post(url).json(request)).await
    }

    pub async fn report_download_url(&self, claim_id: &str) -> Result<String> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct DownloadResponse {
            download_url: String,
        }

        let url = self.endpoint(&["reports", claim_id, "download"]);
        let response: DownloadResponse = self.send_json(self.client.get(url)).await?;
        Ok(response.download_url)
    }

    // =========================================================================
    // ANALYTICS
    // =========================================================================

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let url = self.endpoint(&["analytics", "dashboard"]);
        self.send_json(self.client.get(url)).await
    }

    pub async fn claims_trend(&self, days: u32) -> Result<Vec<TrendPoint>> {
        let url = self.endpoint(&["analytics", "trends"]);
        self.send_json(self.client.get(url).query(&[("days", days)]))
            .await
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken> {
        info!("Logging in as {}", username);
        let url = self.endpoint(&["auth", "login"]);
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.send_json(self.client.post(url).json(&body)).await
    }
}

#[async_trait]
impl ClaimsBackend for ApiClient {
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<UploadResponse> {
        ApiClient::upload_image(self, bytes, file_name, mime_type).await
    }

    async fn fetch_analysis(&self, analysis_id: &str) -> Result<AnalysisRecord> {
        self.get_analysis(analysis_id).await
    }

    async fn create_claim(&self, analysis_id: &str) -> Result<Claim> {
        ApiClient::create_claim(self, analysis_id).await
    }

    async fn get_claim(&self, claim_id: &str) -> Result<Claim> {
        ApiClient::get_claim(self, claim_id).await
    }

    async fn approve_claim(&self, claim_id: &str, notes: Option<&str>) -> Result<Claim> {
        ApiClient::approve_claim(self, claim_id, notes).await
    }

    async fn reject_claim(&self, claim_id: &str, reason: &str) -> Result<Claim> {
        ApiClient::reject_claim(self, claim_id, reason).await
    }

    async fn request_review(&self, claim_id: &str, notes: &str) -> Result<Claim> {
        ApiClient::request_review(self, claim_id, notes).await
    }

    async fn generate_report(&self, request: &ReportRequest) -> Result<Vec<u8>> {
        ApiClient::generate_report(self, request).await
    }
}
