#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use autoguard::api::{
    AnalysisRecord, AnalysisStatus, Claim, ClaimStatus, ClaimsBackend, ReportRequest,
    UploadResponse, UploadStatus,
};
use autoguard::{AutoGuardError, Result};

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("Failed to read fixture")
}

/// The completed two-damage fixture with its status replaced.
pub fn analysis(status: AnalysisStatus) -> AnalysisRecord {
    let mut record: AnalysisRecord =
        serde_json::from_str(&fixture("analysis_completed.json")).expect("Bad analysis fixture");
    record.status = status;
    record
}

pub fn pending_claim() -> Claim {
    serde_json::from_str(&fixture("claim_pending.json")).expect("Bad claim fixture")
}

/// Decrements the in-flight counter even when the fetch future is dropped.
struct InFlight<'a>(&'a AtomicU32);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted in-memory backend.
///
/// Analysis fetches return the scripted responses in order; the last one
/// repeats forever, stamped with the requested id. Claims are created as `cl-<analysis id>` and can be
/// fetched by claim id or analysis id.
#[derive(Default)]
pub struct FakeBackend {
    script: Mutex<VecDeque<Result<AnalysisRecord>>>,
    fetch_delay: Duration,

    claims: Mutex<HashMap<String, Claim>>,
    create_errors: Mutex<VecDeque<AutoGuardError>>,
    get_claim_error: Mutex<Option<AutoGuardError>>,
    action_error: Mutex<Option<AutoGuardError>>,

    pub fetches: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    pub creates: AtomicU32,
    pub get_claims: AtomicU32,
    pub uploads: AtomicU32,
    pub actions: AtomicU32,
    pub reports: AtomicU32,
}

impl FakeBackend {
    pub fn new(script: Vec<Result<AnalysisRecord>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    /// Processing `n` times, then the given terminal status.
    pub fn processing_then(n: usize, terminal: AnalysisStatus) -> Self {
        let mut script: Vec<Result<AnalysisRecord>> =
            (0..n).map(|_| Ok(analysis(AnalysisStatus::Processing))).collect();
        script.push(Ok(analysis(terminal)));
        Self::new(script)
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_claim(self, analysis_id: &str, claim: Claim) -> Self {
        self.claims
            .lock()
            .unwrap()
            .insert(analysis_id.to_string(), claim);
        self
    }

    pub fn fail_next_create(&self, error: AutoGuardError) {
        self.create_errors.lock().unwrap().push_back(error);
    }

    pub fn fail_get_claim(&self, error: AutoGuardError) {
        *self.get_claim_error.lock().unwrap() = Some(error);
    }

    pub fn fail_actions(&self, error: Option<AutoGuardError>) {
        *self.action_error.lock().unwrap() = error;
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn find_claim(&self, id: &str) -> Option<Claim> {
        let claims = self.claims.lock().unwrap();
        claims
            .get(id)
            .or_else(|| claims.values().find(|c| c.id == id))
            .cloned()
    }

    fn update_claim(&self, claim_id: &str, status: ClaimStatus, notes: Option<&str>) -> Result<Claim> {
        self.actions.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.action_error.lock().unwrap().clone() {
            return Err(e);
        }
        let mut claims = self.claims.lock().unwrap();
        let claim = claims
            .values_mut()
            .find(|c| c.id == claim_id)
            .ok_or_else(|| AutoGuardError::NotFound("Claim not found".into()))?;
        claim.status = status;
        claim.adjuster_notes = notes.map(str::to_string);
        Ok(claim.clone())
    }
}

#[async_trait]
impl ClaimsBackend for FakeBackend {
    async fn upload_image(
        &self,
        _bytes: Vec<u8>,
        _file_name: &str,
        _mime_type: &str,
    ) -> Result<UploadResponse> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadResponse {
            analysis_id: format!("an-upload-{}", n),
            status: UploadStatus::Queued,
            estimated_time: 30,
        })
    }

    async fn fetch_analysis(&self, analysis_id: &str) -> Result<AnalysisRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Err(AutoGuardError::NotFound("Analysis not found".into())))
        };
        next.map(|mut record| {
            record.id = analysis_id.to_string();
            record
        })
    }

    async fn create_claim(&self, analysis_id: &str) -> Result<Claim> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.create_errors.lock().unwrap().pop_front() {
            return Err(e);
        }
        let mut claims = self.claims.lock().unwrap();
        if claims.contains_key(analysis_id) {
            return Err(AutoGuardError::Conflict(
                "Claim already exists for this analysis".into(),
            ));
        }
        let mut claim = pending_claim();
        claim.id = format!("cl-{}", analysis_id);
        claim.claim_number = format!("CLM-2024-{:06}", claims.len() + 1);
        claims.insert(analysis_id.to_string(), claim.clone());
        Ok(claim)
    }

    async fn get_claim(&self, claim_id: &str) -> Result<Claim> {
        self.get_claims.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.get_claim_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.find_claim(claim_id)
            .ok_or_else(|| AutoGuardError::NotFound("Claim not found".into()))
    }

    async fn approve_claim(&self, claim_id: &str, notes: Option<&str>) -> Result<Claim> {
        self.update_claim(claim_id, ClaimStatus::Approved, notes)
    }

    async fn reject_claim(&self, claim_id: &str, reason: &str) -> Result<Claim> {
        self.update_claim(claim_id, ClaimStatus::Rejected, Some(reason))
    }

    async fn request_review(&self, claim_id: &str, notes: &str) -> Result<Claim> {
        self.update_claim(claim_id, ClaimStatus::UnderReview, Some(notes))
    }

    async fn generate_report(&self, request: &ReportRequest) -> Result<Vec<u8>> {
        self.reports.fetch_add(1, Ordering::SeqCst);
        if self.find_claim(&request.claim_id).is_none() {
            return Err(AutoGuardError::NotFound("Claim not found".into()));
        }
        Ok(format!("{{\"claimId\":\"{}\"}}", request.claim_id).into_bytes())
    }
}
