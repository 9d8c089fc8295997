// crates/lookup-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Subscription Store
// Description: Durable SubscriptionStore backed by SQLite.
// Purpose: Persist caller records and tier history with atomic quota charges.
// Dependencies: lookup-gate-core, rusqlite, serde, thiserror, tokio
// ============================================================================

//! ## Overview
//! This module implements a durable [`SubscriptionStore`] using `SQLite`. The
//! `callers` table holds one row per caller; `tier_history` records every
//! grant and revocation. Mutations load the row, apply the shared quota
//! ledger, and write it back inside a `BEGIN IMMEDIATE` transaction. Blocking
//! work runs on the tokio blocking pool.
//! Security posture: database contents are untrusted; rows that fail
//! validation surface as [`StoreError::Invalid`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lookup_gate_core::CallerId;
use lookup_gate_core::CallerRecord;
use lookup_gate_core::QuotaDecision;
use lookup_gate_core::QuotaDenial;
use lookup_gate_core::QuotaReceipt;
use lookup_gate_core::StoreError;
use lookup_gate_core::SubscriptionPolicy;
use lookup_gate_core::SubscriptionStats;
use lookup_gate_core::SubscriptionStore;
use lookup_gate_core::TierGrant;
use lookup_gate_core::TierId;
use lookup_gate_core::Timestamp;
use lookup_gate_core::runtime::ledger;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Column list shared by caller queries.
const CALLER_COLUMNS: &str = "caller_id, tier, tier_expires_at, admin, used, window_start, \
                              created_at, last_seen_at, lifetime_queries, payment_ref";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` subscription store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message)
            | SqliteStoreError::Db(message)
            | SqliteStoreError::VersionMismatch(message) => Self::Store(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Tier History
// ============================================================================

/// Tier history event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierEvent {
    /// Tier granted for a fixed term.
    Grant,
    /// Tier revoked to the default.
    Revoke,
}

impl TierEvent {
    /// Returns the stored label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        }
    }

    /// Parses a stored label.
    fn parse(label: &str) -> Result<Self, SqliteStoreError> {
        match label {
            "grant" => Ok(Self::Grant),
            "revoke" => Ok(Self::Revoke),
            other => Err(SqliteStoreError::Invalid(format!("unknown tier event: {other}"))),
        }
    }
}

/// One row of the tier history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierHistoryEntry {
    /// Caller affected.
    pub caller_id: CallerId,
    /// Event kind.
    pub event: TierEvent,
    /// Tier after the event.
    pub tier: TierId,
    /// Grant length in days, for grants.
    pub days: Option<u32>,
    /// Payment reference, for grants.
    pub payment_ref: Option<String>,
    /// Admin issuing the grant.
    pub granted_by: Option<CallerId>,
    /// Event time.
    pub recorded_at: Timestamp,
    /// Tier expiry set by the event.
    pub expires_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed subscription store.
#[derive(Debug, Clone)]
pub struct SqliteSubscriptionStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Policy enforced by the store.
    policy: Arc<SubscriptionPolicy>,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSubscriptionStore {
    /// Opens an `SQLite`-backed subscription store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(
        config: SqliteStoreConfig,
        policy: SubscriptionPolicy,
    ) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            policy: Arc::new(policy),
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns the tier history for a caller, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails or rows are invalid.
    pub async fn tier_history(&self, caller: &CallerId) -> Result<Vec<TierHistoryEntry>, StoreError> {
        let caller = caller.clone();
        self.blocking(move |connection, _| load_history(connection, &caller).map_err(StoreError::from))
            .await
    }

    /// Runs `op` on the blocking pool with the connection locked.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &SubscriptionPolicy) -> Result<T, StoreError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        let policy = Arc::clone(&self.policy);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|_| StoreError::Store("sqlite store mutex poisoned".to_string()))?;
            op(&mut guard, &policy)
        })
        .await
        .map_err(|err| StoreError::Store(format!("sqlite store task failed: {err}")))?
    }

    /// Applies `update` to an existing caller inside an immediate transaction.
    async fn update<F>(&self, caller: &CallerId, update: F) -> Result<CallerRecord, StoreError>
    where
        F: FnOnce(&mut CallerRecord, &SubscriptionPolicy) -> Result<Option<HistoryRow>, StoreError>
            + Send
            + 'static,
    {
        let caller = caller.clone();
        self.blocking(move |connection, policy| {
            let tx = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(SqliteStoreError::from)?;
            let mut record = load_record(&tx, &caller)?
                .ok_or_else(|| StoreError::UnknownCaller(caller.to_string()))?;
            let history = update(&mut record, policy)?;
            save_record(&tx, &record)?;
            if let Some(history) = history {
                insert_history(&tx, &history)?;
            }
            tx.commit().map_err(SqliteStoreError::from)?;
            Ok(record)
        })
        .await
    }
}

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    fn policy(&self) -> &SubscriptionPolicy {
        &self.policy
    }

    async fn register(
        &self,
        caller: &CallerId,
        now: Timestamp,
    ) -> Result<CallerRecord, StoreError> {
        let caller = caller.clone();
        self.blocking(move |connection, policy| {
            let tx = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(SqliteStoreError::from)?;
            let mut record = load_record(&tx, &caller)?
                .unwrap_or_else(|| CallerRecord::first_contact(caller.clone(), policy, now));
            record.last_seen_at = now;
            save_record(&tx, &record)?;
            tx.commit().map_err(SqliteStoreError::from)?;
            Ok(record)
        })
        .await
    }

    async fn caller(&self, caller: &CallerId) -> Result<Option<CallerRecord>, StoreError> {
        let caller = caller.clone();
        self.blocking(move |connection, _| Ok(load_record(connection, &caller)?)).await
    }

    async fn tier(&self, caller: &CallerId) -> Result<TierId, StoreError> {
        self.caller(caller)
            .await?
            .map(|record| record.tier)
            .ok_or_else(|| StoreError::UnknownCaller(caller.to_string()))
    }

    async fn is_admin(&self, caller: &CallerId) -> Result<bool, StoreError> {
        Ok(self.caller(caller).await?.is_some_and(|record| record.admin))
    }

    async fn consume_quota(
        &self,
        caller: &CallerId,
        cost: u32,
        now: Timestamp,
    ) -> Result<QuotaDecision, StoreError> {
        let caller = caller.clone();
        self.blocking(move |connection, policy| {
            let tx = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(SqliteStoreError::from)?;
            let Some(mut record) = load_record(&tx, &caller)? else {
                return Ok(QuotaDecision::Denied {
                    reason: QuotaDenial::UnknownCaller,
                    retry_at: None,
                });
            };
            let decision = ledger::consume(&mut record, policy, cost, now);
            save_record(&tx, &record)?;
            tx.commit().map_err(SqliteStoreError::from)?;
            Ok(decision)
        })
        .await
    }

    async fn refund_quota(&self, receipt: &QuotaReceipt) -> Result<bool, StoreError> {
        let receipt = receipt.clone();
        self.blocking(move |connection, _| {
            let tx = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(SqliteStoreError::from)?;
            let Some(mut record) = load_record(&tx, &receipt.caller_id)? else {
                return Ok(false);
            };
            let refunded = ledger::refund(&mut record, &receipt);
            if refunded {
                save_record(&tx, &record)?;
            }
            tx.commit().map_err(SqliteStoreError::from)?;
            Ok(refunded)
        })
        .await
    }

    async fn record_usage(&self, caller: &CallerId, now: Timestamp) -> Result<(), StoreError> {
        self.update(caller, move |record, _| {
            ledger::record_usage(record, now);
            Ok(None)
        })
        .await
        .map(|_| ())
    }

    async fn grant_tier(
        &self,
        grant: &TierGrant,
        now: Timestamp,
    ) -> Result<CallerRecord, StoreError> {
        let caller = grant.caller_id.clone();
        let grant = grant.clone();
        self.update(&caller, move |record, policy| {
            ledger::grant(record, policy, &grant, now)?;
            Ok(Some(HistoryRow {
                caller_id: grant.caller_id.clone(),
                event: TierEvent::Grant,
                tier: grant.tier.clone(),
                days: Some(grant.days),
                payment_ref: grant.payment_ref.clone(),
                granted_by: Some(grant.granted_by.clone()),
                recorded_at: now,
                expires_at: record.tier_expires_at,
            }))
        })
        .await
    }

    async fn revoke_tier(
        &self,
        caller: &CallerId,
        now: Timestamp,
    ) -> Result<CallerRecord, StoreError> {
        self.update(caller, move |record, policy| {
            ledger::revoke(record, policy);
            Ok(Some(HistoryRow {
                caller_id: record.caller_id.clone(),
                event: TierEvent::Revoke,
                tier: record.tier.clone(),
                days: None,
                payment_ref: None,
                granted_by: None,
                recorded_at: now,
                expires_at: None,
            }))
        })
        .await
    }

    async fn set_admin(
        &self,
        caller: &CallerId,
        admin: bool,
        now: Timestamp,
    ) -> Result<CallerRecord, StoreError> {
        let caller = caller.clone();
        self.blocking(move |connection, policy| {
            let tx = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(SqliteStoreError::from)?;
            let mut record = load_record(&tx, &caller)?
                .unwrap_or_else(|| CallerRecord::first_contact(caller.clone(), policy, now));
            record.admin = admin;
            save_record(&tx, &record)?;
            tx.commit().map_err(SqliteStoreError::from)?;
            Ok(record)
        })
        .await
    }

    async fn stats(&self, now: Timestamp) -> Result<SubscriptionStats, StoreError> {
        self.blocking(move |connection, policy| {
            let mut statement = connection
                .prepare(&format!("SELECT {CALLER_COLUMNS} FROM callers"))
                .map_err(SqliteStoreError::from)?;
            let rows = statement.query_map(params![], read_row).map_err(SqliteStoreError::from)?;
            let mut stats = SubscriptionStats::default();
            for row in rows {
                let record = row.map_err(SqliteStoreError::from)?.into_record()?;
                stats.accumulate(&record, policy, now);
            }
            Ok(stats)
        })
        .await
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Caller row as stored.
struct CallerRow {
    /// Caller identifier.
    caller_id: String,
    /// Tier identifier.
    tier: String,
    /// Tier expiry (unix millis).
    tier_expires_at: Option<i64>,
    /// Admin flag.
    admin: bool,
    /// Units used in the stored window.
    used: i64,
    /// Stored window start (unix millis).
    window_start: i64,
    /// First contact (unix millis).
    created_at: i64,
    /// Last contact (unix millis).
    last_seen_at: i64,
    /// Lifetime lookups.
    lifetime_queries: i64,
    /// Latest payment reference.
    payment_ref: Option<String>,
}

impl CallerRow {
    /// Validates the row and converts it into a caller record.
    fn into_record(self) -> Result<CallerRecord, SqliteStoreError> {
        if self.caller_id.is_empty() || self.tier.is_empty() {
            return Err(SqliteStoreError::Invalid("caller row has empty identifiers".to_string()));
        }
        let used = u32::try_from(self.used).map_err(|_| {
            SqliteStoreError::Invalid(format!("invalid usage for caller {}", self.caller_id))
        })?;
        let lifetime_queries = u64::try_from(self.lifetime_queries).map_err(|_| {
            SqliteStoreError::Invalid(format!("invalid lifetime count for caller {}", self.caller_id))
        })?;
        Ok(CallerRecord {
            caller_id: CallerId::new(self.caller_id),
            tier: TierId::new(self.tier),
            tier_expires_at: self.tier_expires_at.map(Timestamp::from_unix_millis),
            admin: self.admin,
            used,
            window_start: Timestamp::from_unix_millis(self.window_start),
            created_at: Timestamp::from_unix_millis(self.created_at),
            last_seen_at: Timestamp::from_unix_millis(self.last_seen_at),
            lifetime_queries,
            payment_ref: self.payment_ref,
        })
    }
}

/// Reads a caller row in `CALLER_COLUMNS` order.
fn read_row(row: &Row<'_>) -> rusqlite::Result<CallerRow> {
    Ok(CallerRow {
        caller_id: row.get(0)?,
        tier: row.get(1)?,
        tier_expires_at: row.get(2)?,
        admin: row.get(3)?,
        used: row.get(4)?,
        window_start: row.get(5)?,
        created_at: row.get(6)?,
        last_seen_at: row.get(7)?,
        lifetime_queries: row.get(8)?,
        payment_ref: row.get(9)?,
    })
}

/// Loads one caller record.
fn load_record(
    connection: &Connection,
    caller: &CallerId,
) -> Result<Option<CallerRecord>, SqliteStoreError> {
    let row = connection
        .query_row(
            &format!("SELECT {CALLER_COLUMNS} FROM callers WHERE caller_id = ?1"),
            params![caller.as_str()],
            read_row,
        )
        .optional()?;
    row.map(CallerRow::into_record).transpose()
}

/// Inserts or replaces one caller record.
fn save_record(connection: &Connection, record: &CallerRecord) -> Result<(), SqliteStoreError> {
    let lifetime_queries = i64::try_from(record.lifetime_queries)
        .map_err(|_| SqliteStoreError::Invalid("lifetime count exceeds i64".to_string()))?;
    connection.execute(
        &format!(
            "INSERT INTO callers ({CALLER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, \
             ?10) ON CONFLICT(caller_id) DO UPDATE SET tier = excluded.tier, tier_expires_at = \
             excluded.tier_expires_at, admin = excluded.admin, used = excluded.used, \
             window_start = excluded.window_start, last_seen_at = excluded.last_seen_at, \
             lifetime_queries = excluded.lifetime_queries, payment_ref = excluded.payment_ref"
        ),
        params![
            record.caller_id.as_str(),
            record.tier.as_str(),
            record.tier_expires_at.map(Timestamp::as_unix_millis),
            record.admin,
            i64::from(record.used),
            record.window_start.as_unix_millis(),
            record.created_at.as_unix_millis(),
            record.last_seen_at.as_unix_millis(),
            lifetime_queries,
            record.payment_ref.as_deref(),
        ],
    )?;
    Ok(())
}

/// Pending tier history row.
struct HistoryRow {
    /// Caller affected.
    caller_id: CallerId,
    /// Event kind.
    event: TierEvent,
    /// Tier after the event.
    tier: TierId,
    /// Grant length in days.
    days: Option<u32>,
    /// Payment reference.
    payment_ref: Option<String>,
    /// Issuing admin.
    granted_by: Option<CallerId>,
    /// Event time.
    recorded_at: Timestamp,
    /// Expiry set by the event.
    expires_at: Option<Timestamp>,
}

/// Appends one tier history row.
fn insert_history(connection: &Connection, row: &HistoryRow) -> Result<(), SqliteStoreError> {
    connection.execute(
        "INSERT INTO tier_history (caller_id, event, tier, days, payment_ref, granted_by, \
         recorded_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.caller_id.as_str(),
            row.event.as_str(),
            row.tier.as_str(),
            row.days,
            row.payment_ref.as_deref(),
            row.granted_by.as_ref().map(CallerId::as_str),
            row.recorded_at.as_unix_millis(),
            row.expires_at.map(Timestamp::as_unix_millis),
        ],
    )?;
    Ok(())
}

/// Loads the tier history for a caller.
fn load_history(
    connection: &Connection,
    caller: &CallerId,
) -> Result<Vec<TierHistoryEntry>, SqliteStoreError> {
    let mut statement = connection.prepare(
        "SELECT caller_id, event, tier, days, payment_ref, granted_by, recorded_at, expires_at \
         FROM tier_history WHERE caller_id = ?1 ORDER BY id",
    )?;
    let rows = statement.query_map(params![caller.as_str()], |row| {
        let caller_id: String = row.get(0)?;
        let event: String = row.get(1)?;
        let tier: String = row.get(2)?;
        let days: Option<u32> = row.get(3)?;
        let payment_ref: Option<String> = row.get(4)?;
        let granted_by: Option<String> = row.get(5)?;
        let recorded_at: i64 = row.get(6)?;
        let expires_at: Option<i64> = row.get(7)?;
        Ok((caller_id, event, tier, days, payment_ref, granted_by, recorded_at, expires_at))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        let (caller_id, event, tier, days, payment_ref, granted_by, recorded_at, expires_at) = row?;
        entries.push(TierHistoryEntry {
            caller_id: CallerId::new(caller_id),
            event: TierEvent::parse(&event)?,
            tier: TierId::new(tier),
            days,
            payment_ref,
            granted_by: granted_by.map(CallerId::new),
            recorded_at: Timestamp::from_unix_millis(recorded_at),
            expires_at: expires_at.map(Timestamp::from_unix_millis),
        });
    }
    Ok(entries)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(SqliteStoreError::Invalid("store path is empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    connection.execute_batch(&format!(
        "PRAGMA journal_mode = {};",
        config.journal_mode.pragma_value()
    ))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS callers (
                    caller_id TEXT PRIMARY KEY,
                    tier TEXT NOT NULL,
                    tier_expires_at INTEGER,
                    admin INTEGER NOT NULL DEFAULT 0,
                    used INTEGER NOT NULL DEFAULT 0,
                    window_start INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    last_seen_at INTEGER NOT NULL,
                    lifetime_queries INTEGER NOT NULL DEFAULT 0,
                    payment_ref TEXT
                );
                CREATE TABLE IF NOT EXISTS tier_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    caller_id TEXT NOT NULL,
                    event TEXT NOT NULL,
                    tier TEXT NOT NULL,
                    days INTEGER,
                    payment_ref TEXT,
                    granted_by TEXT,
                    recorded_at INTEGER NOT NULL,
                    expires_at INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_tier_history_caller_id
                    ON tier_history (caller_id);",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}
