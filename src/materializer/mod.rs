//! Turning completed analyses into claims, and claim decisions.
//!
//! [`ClaimMaterializer::materialize`] calls the backend's create operation at
//! most once per analysis id for the lifetime of the materializer. With a
//! [`ClaimLedger`] attached the guarantee also holds across restarts.

mod ledger;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

pub use ledger::{ClaimLedger, LedgerEntry};

use crate::api::{AnalysisRecord, AnalysisStatus, Claim, ClaimsBackend};
use crate::error::{AutoGuardError, Result};

/// Outcome of materializing a claim for an analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    /// The backend created a new claim
    Created(Claim),
    /// A claim already existed and was retrieved
    Existing(Claim),
    /// The backend reported a claim exists but it could not be retrieved
    AlreadyExists,
}

impl Materialized {
    pub fn claim(&self) -> Option<&Claim> {
        match self {
            Materialized::Created(c) | Materialized::Existing(c) => Some(c),
            Materialized::AlreadyExists => None,
        }
    }

    pub fn into_claim(self) -> Option<Claim> {
        match self {
            Materialized::Created(c) | Materialized::Existing(c) => Some(c),
            Materialized::AlreadyExists => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Materialized::Created(_))
    }
}

pub struct ClaimMaterializer {
    backend: Arc<dyn ClaimsBackend>,
    /// analysis id -> claim; `None` when a claim is known to exist but
    /// could not be fetched. Held across the backend call so concurrent
    /// callers for the same analysis serialize.
    materialized: AsyncMutex<HashMap<String, Option<Claim>>>,
    ledger: Option<Arc<Mutex<ClaimLedger>>>,
}

impl ClaimMaterializer {
    pub fn new(backend: Arc<dyn ClaimsBackend>) -> Self {
        Self {
            backend,
            materialized: AsyncMutex::new(HashMap::new()),
            ledger: None,
        }
    }

    pub fn with_ledger(mut self, ledger: ClaimLedger) -> Self {
        self.ledger = Some(Arc::new(Mutex::new(ledger)));
        self
    }

    /// Whether `materialize` already ran to completion for this analysis.
    pub async fn is_materialized(&self, analysis_id: &str) -> bool {
        self.materialized.lock().await.contains_key(analysis_id)
    }

    /// Create (or retrieve) the claim for a completed analysis.
    ///
    /// A conflict from the backend means the claim already exists and is
    /// not an error. Network and other failures are returned without retry
    /// and leave the analysis unmaterialized, so an explicit retry can call
    /// again.
    pub async fn materialize(&self, record: &AnalysisRecord) -> Result<Materialized> {
        if record.status != AnalysisStatus::Completed {
            return Err(AutoGuardError::Validation(format!(
                "Analysis {} is {}, claims are only created for completed analyses",
                record.id,
                record.status.as_str()
            )));
        }

        let analysis_id = record.id.as_str();
        let mut materialized = self.materialized.lock().await;

        if let Some(known) = materialized.get(analysis_id) {
            return Ok(match known {
                Some(claim) => Materialized::Existing(claim.clone()),
                None => Materialized::AlreadyExists,
            });
        }

        if let Some(entry) = self.ledger_lookup(analysis_id).await {
            match self.backend.get_claim(&entry.claim_id).await {
                Ok(claim) => {
                    info!(
                        "Claim {} already recorded for analysis {}",
                        claim.claim_number, analysis_id
                    );
                    materialized.insert(analysis_id.to_string(), Some(claim.clone()));
                    return Ok(Materialized::Existing(claim));
                }
                Err(AutoGuardError::NotFound(_)) => {
                    warn!(
                        "Recorded claim {} for analysis {} no longer exists, creating a new one",
                        entry.claim_id, analysis_id
                    );
                    self.ledger_remove(analysis_id).await;
                }
                Err(e) => return Err(e),
            }
        }

        let outcome = match self.backend.create_claim(analysis_id).await {
            Ok(claim) => {
                info!(
                    "Created claim {} for analysis {}",
                    claim.claim_number, analysis_id
                );
                Materialized::Created(claim)
            }
            Err(AutoGuardError::Conflict(message)) => {
                info!(
                    "Claim for analysis {} already exists: {}",
                    analysis_id, message
                );
                match self.backend.get_claim(analysis_id).await {
                    Ok(claim) => Materialized::Existing(claim),
                    Err(e) => {
                        warn!(
                            "Could not fetch existing claim for analysis {}: {}",
                            analysis_id, e
                        );
                        Materialized::AlreadyExists
                    }
                }
            }
            Err(e) => {
                warn!("Failed to create claim for analysis {}: {}", analysis_id, e);
                return Err(e);
            }
        };

        if let Some(claim) = outcome.claim() {
            self.ledger_record(analysis_id, claim).await;
        }
        materialized.insert(analysis_id.to_string(), outcome.claim().cloned());
        Ok(outcome)
    }

    pub async fn approve_claim(&self, claim_id: &str, notes: Option<&str>) -> Result<Claim> {
        let claim = self.backend.approve_claim(claim_id, notes).await?;
        info!("Approved claim {}", claim.claim_number);
        self.remember(&claim).await;
        Ok(claim)
    }

    pub async fn reject_claim(&self, claim_id: &str, reason: &str) -> Result<Claim> {
        if reason.trim().is_empty() {
            return Err(AutoGuardError::Validation(
                "A rejection reason is required".to_string(),
            ));
        }
        let claim = self.backend.reject_claim(claim_id, reason).await?;
        info!("Rejected claim {}", claim.claim_number);
        self.remember(&claim).await;
        Ok(claim)
    }

    pub async fn request_review(&self, claim_id: &str, notes: &str) -> Result<Claim> {
        let claim = self.backend.request_review(claim_id, notes).await?;
        info!("Requested review of claim {}", claim.claim_number);
        self.remember(&claim).await;
        Ok(claim)
    }

    /// Replace a remembered claim with its updated version.
    async fn remember(&self, claim: &Claim) {
        let mut materialized = self.materialized.lock().await;
        for slot in materialized.values_mut() {
            if slot.as_ref().is_some_and(|c| c.id == claim.id) {
                *slot = Some(claim.clone());
            }
        }
    }

    // ====== Ledger (blocking, off the runtime threads) ======

    async fn ledger_lookup(&self, analysis_id: &str) -> Option<LedgerEntry> {
        let ledger = self.ledger.clone()?;
        let id = analysis_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let ledger = ledger.lock().unwrap_or_else(|e| e.into_inner());
            ledger.lookup(&id)
        })
        .await;

        match result {
            Ok(Ok(entry)) => entry,
            Ok(Err(e)) => {
                warn!("Claim ledger lookup failed: {}", e);
                None
            }
            Err(e) => {
                warn!("Claim ledger task failed: {}", e);
                None
            }
        }
    }

    async fn ledger_record(&self, analysis_id: &str, claim: &Claim) {
        let Some(ledger) = self.ledger.clone() else {
            return;
        };
        let (analysis_id, claim_id, claim_number) = (
            analysis_id.to_string(),
            claim.id.clone(),
            claim.claim_number.clone(),
        );
        let result = tokio::task::spawn_blocking(move || {
            let ledger = ledger.lock().unwrap_or_else(|e| e.into_inner());
            ledger.record(&analysis_id, &claim_id, &claim_number)
        })
        .await;

        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to record claim in ledger: {}", e),
            Err(e) => warn!("Claim ledger task failed: {}", e),
        }
    }

    async fn ledger_remove(&self, analysis_id: &str) {
        let Some(ledger) = self.ledger.clone() else {
            return;
        };
        let id = analysis_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let ledger = ledger.lock().unwrap_or_else(|e| e.into_inner());
            ledger.remove(&id)
        })
        .await;

        if let Ok(Err(e)) = result {
            warn!("Failed to remove ledger entry: {}", e);
        }
    }
}
