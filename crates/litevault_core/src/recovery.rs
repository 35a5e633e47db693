//! Recovery engine.
//!
//! Brings the database file into a usable state through a fixed fallback
//! cascade, expressed as an explicit state machine:
//!
//! ```text
//! Start ──exists──▶ Validate(Existing) ──ok──▶ Available(Validated)
//!   │                    │ fail
//!   │ absent             ▼
//!   ▼               RepairLocal ──restored──▶ Validate(AfterLocalRestore) ──ok──▶ Available(RestoredLocal)
//! NoLocal                │ none                     │ fail
//!   │                    ▼                          │
//!   └──────────────▶ FetchRemote ◀──────────────────┘
//!                        │ fetched ──▶ Validate(AfterRemoteFetch) ──ok──▶ Available(FetchedRemote)
//!                        │ none                     │ fail
//!                        ▼                          │
//!                   CreateEmpty ◀───────────────────┘
//!                        │
//!                        ▼
//!                 Available(CreatedEmpty)
//! ```
//!
//! The machine never loops: every path reaches `Available` in at most
//! seven transitions. Each transition is logged with its reason and kept
//! in the returned [`RecoveryReport`].
//!
//! The engine does not lock anything itself. [`crate::Vault`] runs it inside
//! one exclusive guarded section.

use crate::config::VaultConfig;
use crate::error::CoreResult;
use crate::generations::LocalGenerations;
use crate::remote::RemoteGenerations;
use crate::schema;
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{info, warn};

/// Which validation attempt is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    /// The file that was already on disk.
    Existing,
    /// The file just copied from a local generation.
    AfterLocalRestore,
    /// The file just downloaded from the remote store.
    AfterRemoteFetch,
}

/// How the database became available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The existing file was valid.
    Validated,
    /// A local generation replaced the file.
    RestoredLocal,
    /// The remote slot 1 replaced the file.
    FetchedRemote,
    /// A fresh database was created.
    CreatedEmpty,
}

/// States of the recovery cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Entry point.
    Start,
    /// No database file on disk.
    NoLocal,
    /// Checking readability and required tables.
    Validate(ValidationStage),
    /// Copying the newest local generation over the file.
    RepairLocal,
    /// Downloading remote slot 1 over the file.
    FetchRemote,
    /// Initializing a new database.
    CreateEmpty,
    /// Terminal state.
    Available(RecoveryOutcome),
}

impl RecoveryState {
    /// Returns true for the terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, RecoveryState::Available(_))
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryState::Start => "start",
            RecoveryState::NoLocal => "no_local",
            RecoveryState::Validate(ValidationStage::Existing) => "validate",
            RecoveryState::Validate(ValidationStage::AfterLocalRestore) => "validate_after_restore",
            RecoveryState::Validate(ValidationStage::AfterRemoteFetch) => "validate_after_fetch",
            RecoveryState::RepairLocal => "repair_local",
            RecoveryState::FetchRemote => "fetch_remote",
            RecoveryState::CreateEmpty => "create_empty",
            RecoveryState::Available(_) => "available",
        };
        f.write_str(name)
    }
}

impl Serialize for RecoveryState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One step of the cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    /// State left.
    pub from: RecoveryState,
    /// State entered.
    pub to: RecoveryState,
    /// Why the transition happened.
    pub reason: String,
}

/// Result of a recovery run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryReport {
    /// How the database became available.
    pub outcome: RecoveryOutcome,
    /// Every transition taken, in order.
    pub transitions: Vec<Transition>,
}

/// The side effects the cascade needs.
///
/// Separating them from the transition logic lets the machine be driven
/// against scripted outcomes in tests.
pub trait RecoveryActions {
    /// Whether the database file exists.
    fn database_exists(&self) -> bool;

    /// Validates the current database file.
    ///
    /// # Errors
    ///
    /// Returns the reason the file is unusable.
    fn validate(&self) -> CoreResult<()>;

    /// Restores the newest local generation; `false` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error on local I/O failure.
    fn restore_local(&self) -> CoreResult<bool>;

    /// Fetches the newest remote generation; `false` on any failure.
    fn fetch_remote(&self) -> bool;

    /// Replaces the file with a freshly initialized database.
    ///
    /// # Errors
    ///
    /// Returns an error on local I/O or engine failure.
    fn create_empty(&self) -> CoreResult<()>;
}

/// Runs the cascade to completion.
///
/// # Errors
///
/// Only local I/O failures during restore or creation are returned;
/// validation failures and remote failures move to the next fallback.
pub fn run(actions: &dyn RecoveryActions) -> CoreResult<RecoveryReport> {
    let mut state = RecoveryState::Start;
    let mut transitions = Vec::new();

    loop {
        if let RecoveryState::Available(outcome) = state {
            info!(?outcome, steps = transitions.len(), "database available");
            return Ok(RecoveryReport {
                outcome,
                transitions,
            });
        }

        let (next, reason) = step(state, actions)?;
        info!(from = %state, to = %next, %reason, "recovery transition");
        transitions.push(Transition {
            from: state,
            to: next,
            reason,
        });
        state = next;
    }
}

fn step(state: RecoveryState, actions: &dyn RecoveryActions) -> CoreResult<(RecoveryState, String)> {
    use RecoveryState as S;
    use ValidationStage as V;

    let transition = match state {
        S::Start => {
            if actions.database_exists() {
                (S::Validate(V::Existing), "database file present".to_string())
            } else {
                (S::NoLocal, "database file absent".to_string())
            }
        }
        S::NoLocal => (S::FetchRemote, "no local file to validate".to_string()),
        S::Validate(stage) => match actions.validate() {
            Ok(()) => {
                let outcome = match stage {
                    V::Existing => RecoveryOutcome::Validated,
                    V::AfterLocalRestore => RecoveryOutcome::RestoredLocal,
                    V::AfterRemoteFetch => RecoveryOutcome::FetchedRemote,
                };
                (S::Available(outcome), "validation passed".to_string())
            }
            Err(e) => {
                warn!(error = %e, ?stage, "validation failed");
                let next = match stage {
                    V::Existing => S::RepairLocal,
                    V::AfterLocalRestore => S::FetchRemote,
                    V::AfterRemoteFetch => S::CreateEmpty,
                };
                (next, format!("validation failed: {e}"))
            }
        },
        S::RepairLocal => {
            if actions.restore_local()? {
                (
                    S::Validate(V::AfterLocalRestore),
                    "restored newest local generation".to_string(),
                )
            } else {
                (S::FetchRemote, "no local generation available".to_string())
            }
        }
        S::FetchRemote => {
            if actions.fetch_remote() {
                (
                    S::Validate(V::AfterRemoteFetch),
                    "fetched newest remote generation".to_string(),
                )
            } else {
                (S::CreateEmpty, "remote generation unavailable".to_string())
            }
        }
        S::CreateEmpty => {
            actions.create_empty()?;
            (
                S::Available(RecoveryOutcome::CreatedEmpty),
                "initialized empty database".to_string(),
            )
        }
        S::Available(_) => (state, "already available".to_string()),
    };
    Ok(transition)
}

/// Recovery actions against the real database file and generation stores.
pub(crate) struct FileRecovery<'a> {
    pub(crate) config: &'a VaultConfig,
    pub(crate) local: &'a LocalGenerations,
    pub(crate) remote: &'a RemoteGenerations,
}

impl RecoveryActions for FileRecovery<'_> {
    fn database_exists(&self) -> bool {
        self.config.db_path.is_file()
    }

    fn validate(&self) -> CoreResult<()> {
        schema::validate(
            &self.config.db_path,
            &self.config.required_tables,
            self.config.busy_timeout,
        )
    }

    fn restore_local(&self) -> CoreResult<bool> {
        let restored = self.local.restore_latest(&self.config.db_path)?;
        if restored {
            schema::discard_journals(&self.config.db_path)?;
        }
        Ok(restored)
    }

    fn fetch_remote(&self) -> bool {
        if self.remote.fetch_latest(&self.config.db_path).is_none() {
            return false;
        }
        match schema::discard_journals(&self.config.db_path) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "could not discard stale journal after fetch");
                false
            }
        }
    }

    fn create_empty(&self) -> CoreResult<()> {
        schema::create_empty(
            &self.config.db_path,
            self.config.schema_sql.as_deref(),
            self.config.busy_timeout,
        )
    }
}
