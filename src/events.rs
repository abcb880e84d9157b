use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

/// Account and profile events worth keeping an audit trail of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AccountRegistered,
    ProfileProvisioned,
    ProfileRepaired,
    ProfilePhotoUpdated,
    LoginSucceeded,
    LoginRejected,
    LoggedOut,
}

/// A single audit record stored as one JSONL line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub account_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl SiteEvent {
    pub fn new(event_type: EventType, account_id: Option<Uuid>, details: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            account_id,
            timestamp: Utc::now(),
            details,
        }
    }
}

/// Append-only JSONL log under the data directory.
#[derive(Debug, Clone)]
pub struct EventLog {
    events_path: PathBuf,
}

impl EventLog {
    pub fn at(events_path: impl Into<PathBuf>) -> Self {
        Self {
            events_path: events_path.into(),
        }
    }

    pub fn append(&self, event: &SiteEvent) -> Result<()> {
        if let Some(parent) = self.events_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .with_context(|| format!("Failed opening event log {:?}", self.events_path))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Appends an event; a failure is logged rather than returned so the
    /// already-committed request still succeeds.
    pub fn record(&self, event_type: EventType, account_id: Option<Uuid>, details: serde_json::Value) {
        let event = SiteEvent::new(event_type, account_id, details);
        if let Err(err) = self.append(&event) {
            warn!(?event_type, "Failed to append audit event: {err:#}");
        }
    }

    pub fn load(&self) -> Result<Vec<SiteEvent>> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.events_path)?;
        let mut events = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            let event: SiteEvent = serde_json::from_str(line)
                .with_context(|| format!("Corrupt event line in {:?}", self.events_path))?;
            events.push(event);
        }
        Ok(events)
    }
}
