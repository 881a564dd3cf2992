//! Shared application state handed to the HTTP layer and the sweeper.
//!
//! Holds the database location and the in-memory audit buffer. Every
//! caller opens its own connection through [`CoreState::open_db`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{self, AppConfig};
use crate::db::{self, repository::AuditEntry};

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db_path: PathBuf,
    /// Audit entries older than this are pruned on flush.
    pub audit_retention_days: i64,
    audit: AuditLogger,
}

impl CoreState {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            audit_retention_days: config::AUDIT_RETENTION_DAYS,
            audit: AuditLogger::new(),
        }
    }

    /// Prepare the data directory and bring the schema up to date.
    pub fn init(config: &AppConfig) -> Result<Self, CoreError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let state = Self {
            db_path: config.db_path(),
            audit_retention_days: config.audit_retention_days,
            audit: AuditLogger::new(),
        };
        // open_database runs pending migrations
        state.open_db()?;
        tracing::info!(path = %state.db_path.display(), "Database ready");
        Ok(state)
    }

    /// Open a fresh connection to the clinical store.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ── Audit logging ───────────────────────────────────────

    /// Log an access event. Auto-flushes to DB when buffer is full.
    pub fn log_access(&self, entry: AuditEntry) {
        let needs_flush = self.audit.log(entry);
        if needs_flush {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Current audit buffer contents.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush the audit buffer to the database and prune expired rows.
    pub fn flush_and_prune_audit(&self) -> Result<usize, CoreError> {
        let conn = self.open_db()?;
        let flushed = self.audit.flush_to_db(&conn)?;
        match db::repository::prune_audit_log(&conn, self.audit_retention_days) {
            Ok(0) => {}
            Ok(pruned) => tracing::info!(pruned, "Pruned expired audit entries"),
            Err(e) => tracing::warn!("Failed to prune audit log: {e}"),
        }
        Ok(flushed)
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Buffer one entry. Returns `true` once the flush threshold is reached.
    pub fn log(&self, entry: AuditEntry) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(entry);
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Put entries back at the front of the buffer, ahead of anything
    /// logged since they were drained.
    fn restore(&self, mut entries: Vec<AuditEntry>) {
        if let Ok(mut buf) = self.buffer.lock() {
            entries.append(&mut buf);
            *buf = entries;
        }
    }

    /// Write buffered entries to the audit_log table. On failure nothing
    /// is written and the entries stay buffered for the next flush.
    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }
        if let Err(e) = db::repository::insert_audit_entries(conn, &entries) {
            tracing::warn!(count = entries.len(), "Audit flush failed, entries kept in buffer");
            self.restore(entries);
            return Err(e.into());
        }
        tracing::debug!(count = entries.len(), "Flushed audit entries to database");
        Ok(entries.len())
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
