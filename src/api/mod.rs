//! REST client and wire types for the AutoGuard backend.
//!
//! The pipeline talks to the backend through the [`ClaimsBackend`] trait so
//! the poller and materializer can run against in-memory fakes in tests.

mod client;
pub mod types;

use async_trait::async_trait;

pub use client::{ApiClient, DEFAULT_API_BASE_URL};
pub use types::*;

use crate::error::Result;

/// Backend operations the dashboard pipeline depends on.
#[async_trait]
pub trait ClaimsBackend: Send + Sync {
    /// Upload an already validated image; starts a new analysis.
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<UploadResponse>;

    /// Fetch an analysis record. `NotFound` for unknown ids.
    async fn fetch_analysis(&self, analysis_id: &str) -> Result<AnalysisRecord>;

    /// Create the claim for a completed analysis.
    async fn create_claim(&self, analysis_id: &str) -> Result<Claim>;

    async fn get_claim(&self, claim_id: &str) -> Result<Claim>;

    async fn approve_claim(&self, claim_id: &str, notes: Option<&str>) -> Result<Claim>;

    async fn reject_claim(&self, claim_id: &str, reason: &str) -> Result<Claim>;

    async fn request_review(&self, claim_id: &str, notes: &str) -> Result<Claim>;

    async fn generate_report(&self, request: &ReportRequest) -> Result<Vec<u8>>;
}
