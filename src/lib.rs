pub mod api;
pub mod config;
pub mod credentials;
pub mod dashboard;
mod error;
pub mod materializer;
pub mod poller;
pub mod selection;
pub mod session;
pub mod upload;
pub mod views;

pub use api::{AnalysisRecord, ApiClient, Claim, ClaimsBackend};
pub use config::AppConfig;
pub use dashboard::{DashboardController, DashboardState, Notice};
pub use error::{AutoGuardError, Result};
pub use materializer::{ClaimLedger, ClaimMaterializer, Materialized};
pub use poller::{AnalysisPoller, PollHandle, PollPolicy, PollState};
pub use selection::{SelectionState, SharedSelection};
pub use session::SessionContext;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level; output goes to stderr so it never mixes with rendered
/// dashboards on stdout.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
