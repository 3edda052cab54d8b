//! Post-commit side effects: the persisted audit trail and notification dispatch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::domain::Actor;
use super::error::EngineError;
use super::repository::{AuditEntry, AuditSink, Notification, NotificationDispatcher};
use crate::telemetry::AUDIT_TARGET;

/// Builder for one audit record.
pub(crate) struct Audit {
    entry: AuditEntry,
}

impl Audit {
    pub(crate) fn new(
        actor: Actor,
        action: &str,
        entity: &str,
        entity_id: impl ToString,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry: AuditEntry {
                actor,
                action: action.to_string(),
                entity: entity.to_string(),
                entity_id: entity_id.to_string(),
                before: None,
                after: None,
                recorded_at: at,
            },
        }
    }

    pub(crate) fn before(mut self, value: &impl Serialize) -> Self {
        self.entry.before = to_value(value);
        self
    }

    pub(crate) fn after(mut self, value: &impl Serialize) -> Self {
        self.entry.after = to_value(value);
        self
    }

    /// Mirrors the entry to the audit log target, then persists it. A failed write is an
    /// error: the trail is mandatory.
    pub(crate) fn write<S>(self, sink: &S) -> Result<(), EngineError>
    where
        S: AuditSink + ?Sized,
    {
        let entry = self.entry;
        info!(
            target: AUDIT_TARGET,
            actor = %entry.actor,
            action = %entry.action,
            entity = %entry.entity,
            entity_id = %entry.entity_id,
            "audit"
        );
        sink.append_audit(entry)?;
        Ok(())
    }
}

fn to_value(value: &impl Serialize) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, "audit payload not serializable");
            None
        }
    }
}

/// Fire-and-forget: delivery failures are logged, never returned.
pub(crate) fn dispatch<N>(notifier: &N, recipient: impl ToString, template: &str, payload: Value)
where
    N: NotificationDispatcher + ?Sized,
{
    let notification = Notification {
        recipient_id: recipient.to_string(),
        template: template.to_string(),
        payload,
    };
    let recipient = notification.recipient_id.clone();
    if let Err(err) = notifier.notify(notification) {
        warn!(%recipient, template, error = %err, "notification dispatch failed");
    }
}
