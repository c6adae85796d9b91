//! The dashboard page for one analysis.
//!
//! [`DashboardController`] wires the pipeline together: it resolves which
//! analysis to show, runs the poller, maps every record it publishes to view
//! models, keeps the shared selection in step, and materializes the claim
//! exactly once when the analysis completes.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::{
    AnalysisRecord, AnalysisStatus, Claim, ClaimStatus, ClaimsBackend, ReportFormat,
    ReportRequest,
};
use crate::error::AutoGuardError;
use crate::materializer::ClaimMaterializer;
use crate::poller::{AnalysisPoller, PollHandle, PollPolicy, PollState};
use crate::selection::SharedSelection;
use crate::session::SessionContext;
use crate::views::{dashboard_view, render, DashboardView};

/// What the page shows.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    Loading,
    /// Analysis still processing; the view shows what is known so far
    Polling(DashboardView),
    Ready(DashboardView),
    /// Full-page error with a way back to upload
    Error(String),
}

impl DashboardState {
    pub fn view(&self) -> Option<&DashboardView> {
        match self {
            DashboardState::Polling(v) | DashboardState::Ready(v) => Some(v),
            DashboardState::Loading | DashboardState::Error(_) => None,
        }
    }

    /// Ready and Error do not change without user action.
    pub fn is_settled(&self) -> bool {
        matches!(self, DashboardState::Ready(_) | DashboardState::Error(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient message for the result of a claim action. Errors here never
/// replace the dashboard state.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

pub const NO_ANALYSIS_MESSAGE: &str = "No analysis selected. Upload a vehicle photo to start.";

pub struct DashboardController {
    backend: Arc<dyn ClaimsBackend>,
    poller: AnalysisPoller,
    materializer: ClaimMaterializer,
    selection: SharedSelection,
    session: SessionContext,
    session_path: Option<PathBuf>,

    analysis_id: Option<String>,
    handle: Option<PollHandle>,
    updates: Option<watch::Receiver<PollState>>,
    record: Option<AnalysisRecord>,
    claim: Option<Claim>,
    state: DashboardState,
    /// Set on the first completed record; never reset for this page.
    materialize_started: bool,
    notices: Vec<Notice>,
}

impl DashboardController {
    pub fn new(
        backend: Arc<dyn ClaimsBackend>,
        policy: PollPolicy,
        materializer: ClaimMaterializer,
        session: SessionContext,
    ) -> Self {
        Self {
            poller: AnalysisPoller::new(backend.clone(), policy),
            backend,
            materializer,
            selection: SharedSelection::new(),
            session,
            session_path: None,
            analysis_id: None,
            handle: None,
            updates: None,
            record: None,
            claim: None,
            state: DashboardState::Loading,
            materialize_started: false,
            notices: Vec::new(),
        }
    }

    /// Save the session here on teardown.
    pub fn with_session_path(mut self, path: PathBuf) -> Self {
        self.session_path = Some(path);
        self
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn analysis_id(&self) -> Option<&str> {
        self.analysis_id.as_deref()
    }

    pub fn record(&self) -> Option<&AnalysisRecord> {
        self.record.as_ref()
    }

    pub fn claim(&self) -> Option<&Claim> {
        self.claim.as_ref()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Handle shared by the overlay and the damage list.
    pub fn selection(&self) -> SharedSelection {
        self.selection.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.handle.as_ref().is_some_and(PollHandle::is_polling)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Open the page. An explicit id wins over the session's last analysis;
    /// with neither the page goes straight to an error state.
    pub fn open(&mut self, explicit_id: Option<&str>) -> &DashboardState {
        let Some(analysis_id) = self.session.resolve_analysis_id(explicit_id) else {
            warn!("Dashboard opened without an analysis id");
            self.state = DashboardState::Error(NO_ANALYSIS_MESSAGE.to_string());
            return &self.state;
        };

        info!("Opening dashboard for analysis {}", analysis_id);
        self.session.remember_analysis(&analysis_id);

        if let Some(previous) = self.handle.take() {
            previous.cancel();
        }
        if self.analysis_id.as_deref() != Some(analysis_id.as_str()) {
            self.reset_analysis();
        }

        let handle = self.poller.start(&analysis_id);
        self.updates = Some(handle.subscribe());
        self.handle = Some(handle);
        self.analysis_id = Some(analysis_id);
        self.state = DashboardState::Loading;
        &self.state
    }

    /// Drop everything tied to the previously shown analysis.
    fn reset_analysis(&mut self) {
        self.record = None;
        self.claim = None;
        self.materialize_started = false;
        self.notices.clear();
        self.selection.clear();
    }

    /// Wait for the next poll update and apply it. Returns false when no
    /// further updates will arrive.
    pub async fn next_update(&mut self) -> bool {
        let changed = match self.updates.as_mut() {
            Some(rx) => rx.changed().await.is_ok(),
            None => return false,
        };
        if !changed {
            self.updates = None;
            return false;
        }
        let state = match self.updates.as_mut() {
            Some(rx) => (*rx.borrow_and_update()).clone(),
            None => return false,
        };
        self.apply(state).await;
        true
    }

    /// Apply updates until the page settles (ready or error) or polling ends.
    pub async fn run_until_settled(&mut self) -> &DashboardState {
        while !self.state.is_settled() {
            if !self.next_update().await {
                break;
            }
        }
        &self.state
    }

    /// Apply one poll state. Safe to call repeatedly with the same state:
    /// the claim is only ever materialized once.
    pub async fn apply(&mut self, state: PollState) {
        match state {
            PollState::Loading => {}
            PollState::Polling(record) => {
                if !self.accept_record(record) {
                    return;
                }
                if let Some(view) = self.current_view() {
                    self.state = DashboardState::Polling(view);
                }
            }
            PollState::Completed(record) => {
                if !self.accept_record(record) {
                    return;
                }
                self.materialize_once().await;
                if let Some(view) = self.current_view() {
                    self.state = DashboardState::Ready(view);
                }
            }
            PollState::Failed(record) => {
                let message = if record.overall_severity.description.is_empty() {
                    format!("Analysis {} failed. Upload a new photo to try again.", record.id)
                } else {
                    format!(
                        "Analysis {} failed: {}",
                        record.id, record.overall_severity.description
                    )
                };
                self.accept_record(record);
                self.state = DashboardState::Error(message);
            }
            PollState::Error(e) => {
                self.state = DashboardState::Error(error_message(&e));
            }
        }
    }

    /// Store a newly fetched record unless it would move a terminal record
    /// back to processing.
    fn accept_record(&mut self, record: AnalysisRecord) -> bool {
        if let Some(ref current) = self.record {
            if current.id == record.id && !current.status.can_transition_to(record.status) {
                warn!(
                    "Ignoring analysis {} going from {} back to {}",
                    record.id,
                    current.status.as_str(),
                    record.status.as_str()
                );
                return false;
            }
        }
        self.selection.on_analysis_loaded(&record);
        self.record = Some(record);
        true
    }

    async fn materialize_once(&mut self) {
        if self.materialize_started {
            return;
        }
        let Some(record) = self.record.clone() else {
            return;
        };
        self.materialize_started = true;

        match self.materializer.materialize(&record).await {
            Ok(outcome) => {
                if let Some(claim) = outcome.into_claim() {
                    self.session.remember_claim(&claim.id);
                    self.claim = Some(claim);
                }
            }
            Err(e) => {
                warn!("Claim creation for analysis {} failed: {}", record.id, e);
                self.notices
                    .push(Notice::error(format!("Could not create claim: {}", e)));
            }
        }
    }

    /// Retry claim creation after a failed attempt.
    pub async fn retry_claim(&mut self) -> Notice {
        if self.claim.is_some() {
            return Notice::success("Claim already created");
        }
        let Some(record) = self
            .record
            .clone()
            .filter(|r| r.status == AnalysisStatus::Completed)
        else {
            return Notice::error("Analysis has not completed yet");
        };
        match self.materializer.materialize(&record).await {
            Ok(outcome) => match outcome.into_claim() {
                Some(claim) => {
                    let notice = Notice::success(format!("Claim {} ready", claim.claim_number));
                    self.session.remember_claim(&claim.id);
                    self.claim = Some(claim);
                    self.refresh_view();
                    notice
                }
                None => Notice::success("A claim already exists for this analysis"),
            },
            Err(e) => Notice::error(format!("Could not create claim: {}", e)),
        }
    }

    fn current_view(&self) -> Option<DashboardView> {
        self.record
            .as_ref()
            .map(|record| dashboard_view(record, self.claim.as_ref()))
    }

    /// Rebuild the shown view after the claim changed.
    fn refresh_view(&mut self) {
        let Some(view) = self.current_view() else {
            return;
        };
        if let DashboardState::Ready(ref mut v) | DashboardState::Polling(ref mut v) = self.state {
            *v = view;
        }
    }

    // ====== Selection ======

    /// Highlight a damage in both the overlay and the list.
    pub fn select(&self, damage_id: &str) {
        self.selection.select(damage_id);
    }

    pub fn selected(&self) -> Option<String> {
        self.selection.selected()
    }

    // ====== Claim actions ======

    fn claim_for(&self, next: ClaimStatus) -> Result<&Claim, Notice> {
        let claim = self
            .claim
            .as_ref()
            .ok_or_else(|| Notice::error("No claim for this analysis yet"))?;
        if !claim.status.can_transition_to(next) {
            return Err(Notice::error(format!(
                "Claim {} is already {}",
                claim.claim_number,
                claim.status.as_str()
            )));
        }
        Ok(claim)
    }

    fn finish_action(&mut self, result: crate::error::Result<Claim>, verb: &str) -> Notice {
        match result {
            Ok(claim) => {
                let notice = Notice::success(format!("Claim {} {}", claim.claim_number, verb));
                self.claim = Some(claim);
                self.refresh_view();
                notice
            }
            Err(e) => {
                warn!("Claim action failed: {}", e);
                Notice::error(error_message(&e))
            }
        }
    }

    pub async fn approve(&mut self, notes: Option<&str>) -> Notice {
        let claim_id = match self.claim_for(ClaimStatus::Approved) {
            Ok(claim) => claim.id.clone(),
            Err(notice) => return notice,
        };
        let result = self.materializer.approve_claim(&claim_id, notes).await;
        self.finish_action(result, "approved")
    }

    pub async fn reject(&mut self, reason: &str) -> Notice {
        let claim_id = match self.claim_for(ClaimStatus::Rejected) {
            Ok(claim) => claim.id.clone(),
            Err(notice) => return notice,
        };
        let result = self.materializer.reject_claim(&claim_id, reason).await;
        self.finish_action(result, "rejected")
    }

    pub async fn request_review(&mut self, notes: &str) -> Notice {
        let claim_id = match self.claim_for(ClaimStatus::UnderReview) {
            Ok(claim) => claim.id.clone(),
            Err(notice) => return notice,
        };
        let result = self.materializer.request_review(&claim_id, notes).await;
        self.finish_action(result, "sent for review")
    }

    /// Generate a report for the current claim.
    pub async fn generate_report(&self, format: ReportFormat) -> Result<Vec<u8>, Notice> {
        let claim = self
            .claim
            .as_ref()
            .ok_or_else(|| Notice::error("No claim for this analysis yet"))?;
        let request = ReportRequest {
            claim_id: claim.id.clone(),
            include_images: true,
            include_confidence_metrics: true,
            format,
        };
        self.backend.generate_report(&request).await.map_err(|e| {
            warn!("Report generation for claim {} failed: {}", claim.id, e);
            Notice::error(format!("Failed to generate report: {}", error_message(&e)))
        })
    }

    // ====== Rendering & teardown ======

    pub fn render(&self, ansi: bool) -> String {
        match self.state {
            DashboardState::Loading => "Loading analysis...\n".to_string(),
            DashboardState::Polling(ref view) => {
                let mut out = render::render_dashboard(view, self.selected().as_deref(), ansi);
                out.push_str("\nAnalysis in progress, refreshing...\n");
                out
            }
            DashboardState::Ready(ref view) => {
                render::render_dashboard(view, self.selected().as_deref(), ansi)
            }
            DashboardState::Error(ref message) => format!(
                "Error: {}\nRun `autoguard upload <FILE>` to start a new analysis.\n",
                message
            ),
        }
    }

    /// Stop polling and persist the session. Nothing is published to this
    /// page after teardown.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        self.updates = None;

        if let Some(ref path) = self.session_path {
            if let Err(e) = self.session.save(path) {
                warn!("Failed to save session: {}", e);
            }
        }
    }
}

fn error_message(e: &AutoGuardError) -> String {
    match e {
        AutoGuardError::NotFound(_) => format!("{}. Check the analysis id or upload again.", e),
        AutoGuardError::Network(_) => {
            format!("{}. Is the AutoGuard backend running?", e)
        }
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_states() {
        assert!(!DashboardState::Loading.is_settled());
        assert!(DashboardState::Error("x".into()).is_settled());
    }

    #[test]
    fn test_error_messages_point_somewhere() {
        let msg = error_message(&AutoGuardError::NotFound("Analysis not found".into()));
        assert!(msg.contains("upload again"));
        let msg = error_message(&AutoGuardError::Conflict("dup".into()));
        assert_eq!(msg, "Conflict: dup");
    }
}
