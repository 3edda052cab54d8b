use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Developer account (tenant) on the marketplace.
    PromoteurId
);
identifier!(ProjectId);
identifier!(LeadId);
identifier!(SanctionId);
identifier!(CaseId);
identifier!(AppealId);
identifier!(ViolationId);
identifier!(SnapshotId);

static ENTITY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Process-wide sequence for storage keys. Case numbers use their own per-year sequence.
pub(crate) fn next_key(prefix: &str) -> String {
    let id = ENTITY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

/// Who performed a mutation, as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    System,
    Admin(String),
    Promoteur(PromoteurId),
}

impl Actor {
    pub fn label(&self) -> String {
        match self {
            Actor::System => "system".to_string(),
            Actor::Admin(id) => format!("admin:{id}"),
            Actor::Promoteur(id) => format!("promoteur:{id}"),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Rounds to two decimals for breakdowns shown to admins.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
