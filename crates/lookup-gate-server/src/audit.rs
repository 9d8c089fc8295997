// crates/lookup-gate-server/src/audit.rs
// ============================================================================
// Module: Audit Sinks
// Description: Destinations for per-lookup audit entries.
// Purpose: Route audit entries to stderr, files, or logs without coupling.
// Dependencies: lookup-gate-core, lookup-gate-config, serde_json, tracing
// ============================================================================

//! ## Overview
//! Sinks implement [`lookup_gate_core::AuditSink`]. Entries are written as
//! JSON lines; write failures are swallowed so auditing never fails a lookup.
//! [`build_audit_sink`] wires the configured sink together with a tracing
//! sink through [`FanoutAuditSink`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use lookup_gate_config::AuditConfig;
use lookup_gate_config::AuditSinkType;
use lookup_gate_core::AuditEntry;
use lookup_gate_core::AuditOutcome;
use lookup_gate_core::AuditSink;
use tracing::info;
use tracing::warn;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, entry: &AuditEntry) {
        if let Ok(payload) = serde_json::to_string(entry) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
#[derive(Debug)]
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, entry: &AuditEntry) {
        if let Ok(payload) = serde_json::to_string(entry)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _entry: &AuditEntry) {}
}

/// Audit sink that emits one tracing event per entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) {
        let reason = entry.reason.as_deref().unwrap_or("");
        match entry.outcome {
            AuditOutcome::Success | AuditOutcome::Denied => info!(
                request_id = %entry.request_id,
                caller_id = %entry.caller_id,
                kind = %entry.kind,
                outcome = ?entry.outcome,
                reason,
                attempts = entry.provider_attempts,
                latency_ms = entry.latency_ms,
                "lookup settled"
            ),
            AuditOutcome::Failed => warn!(
                request_id = %entry.request_id,
                caller_id = %entry.caller_id,
                kind = %entry.kind,
                reason,
                attempts = entry.provider_attempts,
                latency_ms = entry.latency_ms,
                refunded = entry.quota_refunded,
                "lookup failed"
            ),
        }
    }
}

/// Audit sink that forwards every entry to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutAuditSink {
    /// Inner sinks.
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    /// Creates a fan-out over `sinks`.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self {
            sinks,
        }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, entry: &AuditEntry) {
        for sink in &self.sinks {
            sink.record(entry);
        }
    }
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds the configured audit sink, paired with a tracing sink.
///
/// # Errors
///
/// Returns an error when the file sink cannot be opened.
pub fn build_audit_sink(config: &AuditConfig) -> io::Result<Arc<dyn AuditSink>> {
    let primary: Arc<dyn AuditSink> = match (config.sink, &config.path) {
        (AuditSinkType::Stderr, _) => Arc::new(StderrAuditSink),
        (AuditSinkType::File, Some(path)) => Arc::new(FileAuditSink::new(path)?),
        (AuditSinkType::File, None) => {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "file audit sink requires a path"));
        }
        (AuditSinkType::None, _) => Arc::new(NoopAuditSink),
    };
    Ok(Arc::new(FanoutAuditSink::new(vec![primary, Arc::new(TracingAuditSink)])))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use std::fs;

    use lookup_gate_core::CallerId;
    use lookup_gate_core::DispatchState;
    use lookup_gate_core::InMemoryAuditLog;
    use lookup_gate_core::LookupKind;
    use lookup_gate_core::RequestId;
    use lookup_gate_core::Timestamp;
    use lookup_gate_core::core::audit::LOOKUP_AUDIT_EVENT;

    use super::*;

    fn entry(request: &str) -> AuditEntry {
        AuditEntry {
            event: LOOKUP_AUDIT_EVENT.to_string(),
            request_id: RequestId::new(request),
            caller_id: CallerId::new("42"),
            kind: LookupKind::Phone,
            timestamp: Timestamp::from_unix_millis(1_700_000_000_000),
            outcome: AuditOutcome::Success,
            state: DispatchState::Completed,
            reason: None,
            provider_attempts: 1,
            latency_ms: 12,
            admin: false,
            quota_charged: 1,
            quota_refunded: false,
        }
    }

    #[test]
    fn file_sink_appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record(&entry("req-1"));
        sink.record(&entry("req-2"));
        drop(sink);
        let reopened = FileAuditSink::new(&path).unwrap();
        reopened.record(&entry("req-3"));
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: AuditEntry = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(parsed.request_id.as_str(), "req-3");
    }

    #[test]
    fn fanout_forwards_to_every_sink() {
        let first = Arc::new(InMemoryAuditLog::new());
        let second = Arc::new(InMemoryAuditLog::new());
        let fanout = FanoutAuditSink::new(vec![
            Arc::clone(&first) as Arc<dyn AuditSink>,
            Arc::new(NoopAuditSink),
            Arc::clone(&second) as Arc<dyn AuditSink>,
        ]);
        fanout.record(&entry("req-1"));
        fanout.record(&entry("req-2"));
        assert_eq!(first.entries().len(), 2);
        assert_eq!(second.entries(), first.entries());
    }

    #[test]
    fn build_audit_sink_opens_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let config = AuditConfig {
            sink: AuditSinkType::File,
            path: Some(path.clone()),
        };
        let sink = build_audit_sink(&config).unwrap();
        sink.record(&entry("req-1"));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn build_audit_sink_rejects_missing_directory() {
        let config = AuditConfig {
            sink: AuditSinkType::File,
            path: Some("/nonexistent/dir/audit.jsonl".into()),
        };
        assert!(build_audit_sink(&config).is_err());
    }
}
