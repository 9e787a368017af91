//! Migration status state machine
//!
//! ```text
//! pending ──apply──▶ completed ──rollback──▶ rolled_back
//!    │
//!    └──────────────▶ failed
//! ```
//!
//! `rolled_back` and `failed` are terminal. Every transition site goes
//! through [`validate_transition`].

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Lifecycle status of a migration record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Discovered, not yet applied
    #[default]
    Pending,
    /// Payload is the live content of its interface
    Completed,
    /// Recorded as failed; never re-entered
    Failed,
    /// Prior content restored; no further transitions
    RolledBack,
}

impl MigrationStatus {
    /// Every status, in lifecycle order
    pub const ALL: [MigrationStatus; 4] = [
        MigrationStatus::Pending,
        MigrationStatus::Completed,
        MigrationStatus::Failed,
        MigrationStatus::RolledBack,
    ];

    /// Stable wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Failed => "failed",
            MigrationStatus::RolledBack => "rolled_back",
        }
    }

    /// No transition leaves this status
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

impl Display for MigrationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MigrationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TransitionError::UnknownStatus(s.to_string()))
    }
}

/// Statuses reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: MigrationStatus) -> &'static [MigrationStatus] {
    use MigrationStatus::{Completed, Failed, Pending, RolledBack};
    match from {
        Pending => &[Completed, Failed],
        Completed => &[RolledBack],
        Failed | RolledBack => &[],
    }
}

/// Validates a state transition.
///
/// # Errors
/// Returns `TransitionError::Illegal` if `to` is not reachable from `from`
pub fn validate_transition(from: MigrationStatus, to: MigrationStatus) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError::Illegal { from, to })
    }
}

/// Status transition errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Edge not in the state machine
    #[error("illegal status transition: {from} -> {to}")]
    Illegal {
        from: MigrationStatus,
        to: MigrationStatus,
    },

    /// Unrecognized status name
    #[error("unknown migration status: '{0}'")]
    UnknownStatus(String),
}
