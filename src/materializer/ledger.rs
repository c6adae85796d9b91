use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

/// A claim recorded as created for an analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub analysis_id: String,
    pub claim_id: String,
    pub claim_number: String,
    pub created_at: String,
}

/// SQLite record of which analyses already have a claim, so a restarted
/// client never creates a second one.
/// All operations are synchronous (rusqlite is blocking).
/// Callers in async contexts should use `tokio::task::spawn_blocking`.
pub struct ClaimLedger {
    conn: Connection,
}

impl ClaimLedger {
    /// Create or open the ledger database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self, String> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir: {}", e))?;
        }

        let conn =
            Connection::open(db_path).map_err(|e| format!("Failed to open claim ledger: {}", e))?;
        Self::init(conn, db_path)
    }

    /// In-memory ledger, used when no data dir is configured.
    pub fn in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open in-memory ledger: {}", e))?;
        Self::init(conn, Path::new(":memory:"))
    }

    fn init(conn: Connection, db_path: &Path) -> Result<Self, String> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS materialized_claims (
                analysis_id TEXT PRIMARY KEY,
                claim_id TEXT NOT NULL,
                claim_number TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )
        .map_err(|e| format!("Failed to create table: {}", e))?;

        info!("Opened claim ledger at {:?}", db_path);
        Ok(Self { conn })
    }

    /// Record the claim created for an analysis. An existing row for the
    /// same analysis is left untouched; returns whether a row was inserted.
    pub fn record(
        &self,
        analysis_id: &str,
        claim_id: &str,
        claim_number: &str,
    ) -> Result<bool, String> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO materialized_claims (analysis_id, claim_id, claim_number)
             VALUES (?1, ?2, ?3)",
                params![analysis_id, claim_id, claim_number],
            )
            .map_err(|e| format!("Failed to record claim: {}", e))?;

        if inserted > 0 {
            info!(
                "Recorded claim {} ({}) for analysis {}",
                claim_number, claim_id, analysis_id
            );
        }
        Ok(inserted > 0)
    }

    pub fn lookup(&self, analysis_id: &str) -> Result<Option<LedgerEntry>, String> {
        self.conn
            .query_row(
                "SELECT analysis_id, claim_id, claim_number, created_at
             FROM materialized_claims WHERE analysis_id = ?1",
                params![analysis_id],
                |row| {
                    Ok(LedgerEntry {
                        analysis_id: row.get(0)?,
                        claim_id: row.get(1)?,
                        claim_number: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| format!("Failed to query claim ledger: {}", e))
    }

    /// Forget an analysis, e.g. after the backend reports its claim gone.
    pub fn remove(&self, analysis_id: &str) -> Result<(), String> {
        self.conn
            .execute(
                "DELETE FROM materialized_claims WHERE analysis_id = ?1",
                params![analysis_id],
            )
            .map_err(|e| format!("Failed to remove ledger entry: {}", e))?;
        Ok(())
    }
}
