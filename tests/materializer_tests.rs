mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tempfile::TempDir;

use autoguard::api::AnalysisStatus;
use autoguard::materializer::{ClaimLedger, ClaimMaterializer, Materialized};
use autoguard::AutoGuardError;

use common::{analysis, pending_claim, FakeBackend};

#[tokio::test]
async fn test_creates_claim_once_per_analysis() {
    let backend = Arc::new(FakeBackend::default());
    let materializer = ClaimMaterializer::new(backend.clone());
    let record = analysis(AnalysisStatus::Completed);

    let first = materializer.materialize(&record).await.unwrap();
    assert!(first.is_created());

    let second = materializer.materialize(&record).await.unwrap();
    assert_eq!(second, Materialized::Existing(first.claim().unwrap().clone()));
    assert_eq!(backend.create_count(), 1);
    assert!(materializer.is_materialized(&record.id).await);
}

#[tokio::test]
async fn test_concurrent_calls_create_once() {
    let backend = Arc::new(FakeBackend::default());
    let materializer = ClaimMaterializer::new(backend.clone());
    let record = analysis(AnalysisStatus::Completed);

    let (a, b, c) = tokio::join!(
        materializer.materialize(&record),
        materializer.materialize(&record),
        materializer.materialize(&record),
    );
    let created = [a.unwrap(), b.unwrap(), c.unwrap()]
        .iter()
        .filter(|m| m.is_created())
        .count();

    assert_eq!(created, 1);
    assert_eq!(backend.create_count(), 1);
}

#[tokio::test]
async fn test_only_completed_analyses() {
    let backend = Arc::new(FakeBackend::default());
    let materializer = ClaimMaterializer::new(backend.clone());

    for status in [AnalysisStatus::Processing, AnalysisStatus::Failed] {
        let err = materializer.materialize(&analysis(status)).await.unwrap_err();
        assert!(matches!(err, AutoGuardError::Validation(_)), "got {:?}", err);
    }
    assert_eq!(backend.create_count(), 0);
}

#[tokio::test]
async fn test_conflict_returns_existing_claim() {
    let existing = pending_claim();
    let backend = Arc::new(FakeBackend::default().with_claim("an-7f3c", existing.clone()));
    let materializer = ClaimMaterializer::new(backend.clone());

    let outcome = materializer
        .materialize(&analysis(AnalysisStatus::Completed))
        .await
        .unwrap();

    assert_eq!(outcome, Materialized::Existing(existing));
    assert_eq!(backend.create_count(), 1);
}

#[tokio::test]
async fn test_conflict_without_lookup_is_already_exists() {
    let backend = Arc::new(FakeBackend::default().with_claim("an-7f3c", pending_claim()));
    backend.fail_get_claim(AutoGuardError::Network("timeout".into()));
    let materializer = ClaimMaterializer::new(backend.clone());
    let record = analysis(AnalysisStatus::Completed);

    assert_eq!(
        materializer.materialize(&record).await.unwrap(),
        Materialized::AlreadyExists
    );
    assert_eq!(
        materializer.materialize(&record).await.unwrap(),
        Materialized::AlreadyExists
    );
    assert_eq!(backend.create_count(), 1);
    assert_eq!(backend.get_claims.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_network_error_allows_explicit_retry() {
    let backend = Arc::new(FakeBackend::default());
    backend.fail_next_create(AutoGuardError::Network("connection refused".into()));
    let materializer = ClaimMaterializer::new(backend.clone());
    let record = analysis(AnalysisStatus::Completed);

    let err = materializer.materialize(&record).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(!materializer.is_materialized(&record.id).await);

    assert!(materializer.materialize(&record).await.unwrap().is_created());
    assert_eq!(backend.create_count(), 2);
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("claims.db");
    let backend = Arc::new(FakeBackend::default());
    let record = analysis(AnalysisStatus::Completed);

    let claim = {
        let materializer =
            ClaimMaterializer::new(backend.clone()).with_ledger(ClaimLedger::new(&db_path).unwrap());
        materializer
            .materialize(&record)
            .await
            .unwrap()
            .into_claim()
            .unwrap()
    };

    // A fresh process with the same data dir
    let materializer =
        ClaimMaterializer::new(backend.clone()).with_ledger(ClaimLedger::new(&db_path).unwrap());
    let outcome = materializer.materialize(&record).await.unwrap();

    assert_eq!(outcome, Materialized::Existing(claim));
    assert_eq!(backend.create_count(), 1);
}

#[tokio::test]
async fn test_claim_decisions() {
    let backend = Arc::new(FakeBackend::default());
    let materializer = ClaimMaterializer::new(backend.clone());
    let claim = materializer
        .materialize(&analysis(AnalysisStatus::Completed))
        .await
        .unwrap()
        .into_claim()
        .unwrap();

    let approved = materializer
        .approve_claim(&claim.id, Some("Photos verified"))
        .await
        .unwrap();
    assert_eq!(approved.adjuster_notes.as_deref(), Some("Photos verified"));

    let err = materializer.approve_claim("cl-missing", None).await.unwrap_err();
    assert!(matches!(err, AutoGuardError::NotFound(_)));

    let err = materializer.reject_claim(&claim.id, "  ").await.unwrap_err();
    assert!(matches!(err, AutoGuardError::Validation(_)));
}
