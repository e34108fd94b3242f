//! Claim lifecycle for one (property, investor) pair.
//!
//! `Idle -> Validating -> Submitting -> Confirmed | Rejected | Failed`
//!
//! The cycle is an aggregate: callers send commands, it returns events and applies
//! them. It never talks to the ledger; the coordinator in the infra layer does the
//! reads and the submission and reports back through `Evaluate`, `Confirm` and `Fail`.
//!
//! While a cycle is `Submitting` it refuses to begin again, which is what keeps a
//! second transaction for the same pair from being sent before the first settles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use estate_core::{Aggregate, AggregateRoot, AttemptId, InvestorAddress};

use crate::accountant::{validate_claim, ClaimIntent};
use crate::error::{ClaimRejection, DividendError, SubmissionFailure};
use crate::property::{AccountSnapshot, ClaimKey};

/// Where a claim cycle currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ClaimState {
    /// No claim in flight.
    Idle,
    /// Snapshot being read and checked. Cancellable.
    Validating,
    /// Intent sent to the ledger, awaiting confirmation. Not cancellable.
    Submitting { intent: ClaimIntent },
    /// Ledger accepted; the cached claim record must be re-read.
    Confirmed { tx_hash: String },
    /// Validation refused the claim.
    Rejected { reason: ClaimRejection },
    /// Ledger rejected or the transaction errored.
    Failed { failure: SubmissionFailure },
}

impl ClaimState {
    pub fn name(&self) -> &'static str {
        match self {
            ClaimState::Idle => "idle",
            ClaimState::Validating => "validating",
            ClaimState::Submitting { .. } => "submitting",
            ClaimState::Confirmed { .. } => "confirmed",
            ClaimState::Rejected { .. } => "rejected",
            ClaimState::Failed { .. } => "failed",
        }
    }

    /// Terminal for the current cycle; `Reset` returns to `Idle`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClaimState::Confirmed { .. } | ClaimState::Rejected { .. } | ClaimState::Failed { .. }
        )
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, ClaimState::Idle | ClaimState::Validating)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, ClaimState::Submitting { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimCommand {
    /// Start a new attempt. Only valid from `Idle`.
    Begin { attempt_id: AttemptId },
    /// Check a freshly read snapshot and decide whether to submit.
    Evaluate {
        snapshot: AccountSnapshot,
        wallet: Option<InvestorAddress>,
    },
    /// Hand the approved intent to the ledger. Accepted once per attempt, and only
    /// for the attempt and intent that were approved.
    Dispatch { attempt_id: AttemptId, intent: ClaimIntent },
    /// Abandon the attempt before anything reaches the ledger.
    Cancel,
    Confirm { tx_hash: String },
    Fail { failure: SubmissionFailure },
    /// Leave a terminal state so the user can retry.
    Reset,
}

impl ClaimCommand {
    fn name(&self) -> &'static str {
        match self {
            ClaimCommand::Begin { .. } => "begin",
            ClaimCommand::Evaluate { .. } => "evaluate",
            ClaimCommand::Dispatch { .. } => "dispatch",
            ClaimCommand::Cancel => "cancel",
            ClaimCommand::Confirm { .. } => "confirm",
            ClaimCommand::Fail { .. } => "fail",
            ClaimCommand::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimEvent {
    ValidationStarted {
        attempt_id: AttemptId,
    },
    ClaimApproved {
        attempt_id: AttemptId,
        intent: ClaimIntent,
        /// Display-only estimate; the ledger pays what it computes at execution.
        #[serde(with = "crate::amount_serde")]
        estimated_amount: u128,
        revision: u64,
    },
    ClaimRejected {
        attempt_id: AttemptId,
        reason: ClaimRejection,
        revision: u64,
    },
    ClaimDispatched {
        attempt_id: AttemptId,
    },
    /// Snapshot could not be assessed (corrupt upstream data); back to `Idle`.
    ValidationAborted {
        attempt_id: AttemptId,
        error: DividendError,
    },
    ClaimCancelled {
        attempt_id: AttemptId,
    },
    ClaimConfirmed {
        attempt_id: AttemptId,
        tx_hash: String,
    },
    ClaimFailed {
        attempt_id: AttemptId,
        failure: SubmissionFailure,
    },
    CycleReset,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimCycleError {
    /// A claim for this pair is already awaiting the ledger.
    #[error("a claim for {0} is already being submitted")]
    AlreadyInFlight(ClaimKey),

    #[error("claim for {0} was already sent to the ledger and cannot be cancelled")]
    NotCancellable(ClaimKey),

    #[error("cannot {command} while {state}")]
    InvalidTransition {
        state: &'static str,
        command: &'static str,
    },

    /// The snapshot is not newer than one already known to be out of date.
    #[error("snapshot revision {offered} is stale; re-read the ledger (need > {stale})")]
    RefreshRequired { offered: u64, stale: u64 },

    /// No approved, unsent claim matches this attempt and intent.
    #[error("attempt {attempt_id} for {key} is not an approved claim awaiting submission")]
    NotPending { key: ClaimKey, attempt_id: AttemptId },

    #[error("snapshot is for {found}, cycle is for {expected}")]
    WrongPair { expected: ClaimKey, found: ClaimKey },

    #[error("connected wallet {wallet} is not the investor {expected}")]
    WalletMismatch {
        expected: InvestorAddress,
        wallet: InvestorAddress,
    },
}

/// Claim lifecycle aggregate for one (property, investor) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimCycle {
    key: ClaimKey,
    state: ClaimState,
    attempt_id: Option<AttemptId>,
    /// Highest snapshot revision known not to reflect the ledger: one that was
    /// rejected as stale, or the one a confirmed claim was approved against.
    stale_revision: Option<u64>,
    approved_revision: Option<u64>,
    /// The approved intent has been handed to the ledger.
    dispatched: bool,
    version: u64,
}

impl ClaimCycle {
    pub fn new(key: ClaimKey) -> Self {
        Self {
            key,
            state: ClaimState::Idle,
            attempt_id: None,
            stale_revision: None,
            approved_revision: None,
            dispatched: false,
            version: 0,
        }
    }

    pub fn key(&self) -> ClaimKey {
        self.key
    }

    pub fn state(&self) -> &ClaimState {
        &self.state
    }

    pub fn attempt_id(&self) -> Option<AttemptId> {
        self.attempt_id
    }

    pub fn stale_revision(&self) -> Option<u64> {
        self.stale_revision
    }

    /// `true` once the approved intent of the current attempt went to the ledger.
    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    fn current_attempt(&self, command: &ClaimCommand) -> Result<AttemptId, ClaimCycleError> {
        self.attempt_id.ok_or(ClaimCycleError::InvalidTransition {
            state: self.state.name(),
            command: command.name(),
        })
    }

    fn invalid(&self, command: &ClaimCommand) -> ClaimCycleError {
        ClaimCycleError::InvalidTransition {
            state: self.state.name(),
            command: command.name(),
        }
    }

    fn handle_evaluate(
        &self,
        command: &ClaimCommand,
        snapshot: &AccountSnapshot,
        wallet: Option<InvestorAddress>,
    ) -> Result<Vec<ClaimEvent>, ClaimCycleError> {
        let attempt_id = self.current_attempt(command)?;

        if snapshot.key() != self.key {
            return Err(ClaimCycleError::WrongPair {
                expected: self.key,
                found: snapshot.key(),
            });
        }
        if let Some(stale) = self.stale_revision {
            if snapshot.revision <= stale {
                return Err(ClaimCycleError::RefreshRequired {
                    offered: snapshot.revision,
                    stale,
                });
            }
        }
        if let Some(wallet) = wallet {
            if wallet != self.key.investor {
                return Err(ClaimCycleError::WalletMismatch {
                    expected: self.key.investor,
                    wallet,
                });
            }
        }

        let assessment = match snapshot.assess() {
            Ok(a) => a,
            Err(error) => return Ok(vec![ClaimEvent::ValidationAborted { attempt_id, error }]),
        };

        let verdict = validate_claim(
            self.key.property_id,
            assessment.unclaimed,
            wallet,
            snapshot.property.is_active,
        );

        Ok(vec![match verdict {
            Ok(intent) => ClaimEvent::ClaimApproved {
                attempt_id,
                intent,
                estimated_amount: assessment.unclaimed.payable(),
                revision: snapshot.revision,
            },
            Err(reason) => ClaimEvent::ClaimRejected {
                attempt_id,
                reason,
                revision: snapshot.revision,
            },
        }])
    }
}

impl AggregateRoot for ClaimCycle {
    type Id = ClaimKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for ClaimCycle {
    type Command = ClaimCommand;
    type Event = ClaimEvent;
    type Error = ClaimCycleError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ClaimEvent::ValidationStarted { attempt_id } => {
                self.attempt_id = Some(*attempt_id);
                self.dispatched = false;
                self.state = ClaimState::Validating;
            }
            ClaimEvent::ClaimApproved {
                intent, revision, ..
            } => {
                self.approved_revision = Some(*revision);
                self.state = ClaimState::Submitting { intent: *intent };
            }
            ClaimEvent::ClaimDispatched { .. } => {
                self.dispatched = true;
            }
            ClaimEvent::ClaimRejected {
                reason, revision, ..
            } => {
                if reason.requires_refresh() {
                    self.stale_revision = Some(self.stale_revision.map_or(*revision, |s| s.max(*revision)));
                }
                self.state = ClaimState::Rejected {
                    reason: reason.clone(),
                };
            }
            ClaimEvent::ValidationAborted { .. } | ClaimEvent::ClaimCancelled { .. } => {
                self.attempt_id = None;
                self.state = ClaimState::Idle;
            }
            ClaimEvent::ClaimConfirmed { tx_hash, .. } => {
                // The claim record read before submission no longer matches the ledger.
                if let Some(approved) = self.approved_revision {
                    self.stale_revision = Some(self.stale_revision.map_or(approved, |s| s.max(approved)));
                }
                self.state = ClaimState::Confirmed {
                    tx_hash: tx_hash.clone(),
                };
            }
            ClaimEvent::ClaimFailed { failure, .. } => {
                self.state = ClaimState::Failed {
                    failure: failure.clone(),
                };
            }
            ClaimEvent::CycleReset => {
                self.attempt_id = None;
                self.dispatched = false;
                self.approved_revision = None;
                self.state = ClaimState::Idle;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match (&self.state, command) {
            (ClaimState::Idle, ClaimCommand::Begin { attempt_id }) => {
                Ok(vec![ClaimEvent::ValidationStarted {
                    attempt_id: *attempt_id,
                }])
            }
            (ClaimState::Submitting { .. }, ClaimCommand::Begin { .. }) => {
                Err(ClaimCycleError::AlreadyInFlight(self.key))
            }

            (ClaimState::Validating, ClaimCommand::Evaluate { snapshot, wallet }) => {
                self.handle_evaluate(command, snapshot, *wallet)
            }

            (ClaimState::Submitting { intent: approved }, ClaimCommand::Dispatch { attempt_id, intent })
                if !self.dispatched && self.attempt_id == Some(*attempt_id) && approved == intent =>
            {
                Ok(vec![ClaimEvent::ClaimDispatched {
                    attempt_id: *attempt_id,
                }])
            }
            (_, ClaimCommand::Dispatch { attempt_id, .. }) => Err(ClaimCycleError::NotPending {
                key: self.key,
                attempt_id: *attempt_id,
            }),

            (ClaimState::Idle, ClaimCommand::Cancel) => Ok(vec![]),
            (ClaimState::Validating, ClaimCommand::Cancel) => Ok(vec![ClaimEvent::ClaimCancelled {
                attempt_id: self.current_attempt(command)?,
            }]),
            (ClaimState::Submitting { .. }, ClaimCommand::Cancel) => {
                Err(ClaimCycleError::NotCancellable(self.key))
            }

            (ClaimState::Submitting { .. }, ClaimCommand::Confirm { tx_hash }) => {
                Ok(vec![ClaimEvent::ClaimConfirmed {
                    attempt_id: self.current_attempt(command)?,
                    tx_hash: tx_hash.clone(),
                }])
            }
            (ClaimState::Submitting { .. }, ClaimCommand::Fail { failure }) => {
                Ok(vec![ClaimEvent::ClaimFailed {
                    attempt_id: self.current_attempt(command)?,
                    failure: failure.clone(),
                }])
            }

            (state, ClaimCommand::Reset) if state.is_terminal() => Ok(vec![ClaimEvent::CycleReset]),
            (ClaimState::Idle, ClaimCommand::Reset) => Ok(vec![]),

            _ => Err(self.invalid(command)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::fixtures::*;
    use estate_core::PropertyId;

    fn key() -> ClaimKey {
        ClaimKey::new(PropertyId::new(1), investor(0x01))
    }

    fn validating() -> ClaimCycle {
        let mut cycle = ClaimCycle::new(key());
        cycle
            .execute(&ClaimCommand::Begin {
                attempt_id: AttemptId::new(),
            })
            .unwrap();
        cycle
    }

    fn evaluate(cycle: &mut ClaimCycle, claimed: u128, revision: u64) -> Result<Vec<ClaimEvent>, ClaimCycleError> {
        cycle.execute(&ClaimCommand::Evaluate {
            snapshot: snapshot(1000, 100_000, 250, claimed, revision),
            wallet: Some(investor(0x01)),
        })
    }

    #[test]
    fn happy_path_reaches_confirmed() {
        let mut cycle = validating();
        assert_eq!(cycle.state(), &ClaimState::Validating);

        let events = evaluate(&mut cycle, 10_000, 1).unwrap();
        match &events[0] {
            ClaimEvent::ClaimApproved { estimated_amount, .. } => assert_eq!(*estimated_amount, 15_000),
            other => panic!("expected approval, got {other:?}"),
        }
        assert!(cycle.state().is_in_flight());

        cycle
            .execute(&ClaimCommand::Confirm {
                tx_hash: "0xfeed".to_string(),
            })
            .unwrap();
        assert_eq!(
            cycle.state(),
            &ClaimState::Confirmed {
                tx_hash: "0xfeed".to_string()
            }
        );
        assert_eq!(cycle.version(), 3);
    }

    #[test]
    fn second_begin_while_submitting_is_refused() {
        let mut cycle = validating();
        evaluate(&mut cycle, 0, 1).unwrap();

        let err = cycle
            .execute(&ClaimCommand::Begin {
                attempt_id: AttemptId::new(),
            })
            .unwrap_err();
        assert_eq!(err, ClaimCycleError::AlreadyInFlight(key()));
    }

    #[test]
    fn approved_intent_is_dispatched_once() {
        let mut cycle = validating();
        let events = evaluate(&mut cycle, 0, 1).unwrap();
        let ClaimEvent::ClaimApproved { attempt_id, intent, .. } = events[0].clone() else {
            panic!("expected approval, got {events:?}");
        };

        cycle.execute(&ClaimCommand::Dispatch { attempt_id, intent }).unwrap();
        assert!(cycle.is_dispatched());

        assert_eq!(
            cycle.execute(&ClaimCommand::Dispatch { attempt_id, intent }).unwrap_err(),
            ClaimCycleError::NotPending { key: key(), attempt_id }
        );
    }

    #[test]
    fn dispatch_of_another_attempt_or_intent_is_refused() {
        let mut cycle = validating();
        let events = evaluate(&mut cycle, 0, 1).unwrap();
        let ClaimEvent::ClaimApproved { attempt_id, intent, .. } = events[0].clone() else {
            panic!("expected approval, got {events:?}");
        };

        let other_attempt = AttemptId::new();
        assert!(matches!(
            cycle.execute(&ClaimCommand::Dispatch {
                attempt_id: other_attempt,
                intent
            }),
            Err(ClaimCycleError::NotPending { .. })
        ));

        let other_intent = ClaimIntent {
            investor: investor(0x02),
            ..intent
        };
        assert!(matches!(
            cycle.execute(&ClaimCommand::Dispatch {
                attempt_id,
                intent: other_intent
            }),
            Err(ClaimCycleError::NotPending { .. })
        ));
        assert!(!cycle.is_dispatched());

        // An idle cycle has nothing to dispatch.
        let idle = ClaimCycle::new(key());
        assert!(matches!(
            idle.handle(&ClaimCommand::Dispatch { attempt_id, intent }),
            Err(ClaimCycleError::NotPending { .. })
        ));
    }

    #[test]
    fn submitting_cannot_be_cancelled() {
        let mut cycle = validating();
        evaluate(&mut cycle, 0, 1).unwrap();
        assert_eq!(
            cycle.execute(&ClaimCommand::Cancel).unwrap_err(),
            ClaimCycleError::NotCancellable(key())
        );
    }

    #[test]
    fn validating_can_be_cancelled() {
        let mut cycle = validating();
        cycle.execute(&ClaimCommand::Cancel).unwrap();
        assert_eq!(cycle.state(), &ClaimState::Idle);
        assert_eq!(cycle.attempt_id(), None);
    }

    #[test]
    fn stale_rejection_forces_a_fresh_read() {
        let mut cycle = validating();
        evaluate(&mut cycle, 30_000, 4).unwrap();
        assert_eq!(
            cycle.state(),
            &ClaimState::Rejected {
                reason: ClaimRejection::StaleEntitlement { excess: 5_000 }
            }
        );

        cycle.execute(&ClaimCommand::Reset).unwrap();
        cycle
            .execute(&ClaimCommand::Begin {
                attempt_id: AttemptId::new(),
            })
            .unwrap();

        // Re-offering the same revision is refused.
        assert_eq!(
            evaluate(&mut cycle, 30_000, 4).unwrap_err(),
            ClaimCycleError::RefreshRequired { offered: 4, stale: 4 }
        );

        // A newer read goes through.
        evaluate(&mut cycle, 10_000, 5).unwrap();
        assert!(cycle.state().is_in_flight());
    }

    #[test]
    fn confirmed_claim_invalidates_the_approved_snapshot() {
        let mut cycle = validating();
        evaluate(&mut cycle, 0, 7).unwrap();
        cycle
            .execute(&ClaimCommand::Confirm {
                tx_hash: "0x1".to_string(),
            })
            .unwrap();
        cycle.execute(&ClaimCommand::Reset).unwrap();
        cycle
            .execute(&ClaimCommand::Begin {
                attempt_id: AttemptId::new(),
            })
            .unwrap();

        // Claiming again against the pre-claim snapshot would double-claim.
        assert_eq!(
            evaluate(&mut cycle, 0, 7).unwrap_err(),
            ClaimCycleError::RefreshRequired { offered: 7, stale: 7 }
        );
    }

    #[test]
    fn failed_submission_is_retryable_after_reset() {
        let mut cycle = validating();
        evaluate(&mut cycle, 0, 1).unwrap();
        cycle
            .execute(&ClaimCommand::Fail {
                failure: SubmissionFailure::UserRejected,
            })
            .unwrap();
        assert!(cycle.state().is_terminal());

        // Must reset before beginning again.
        assert!(matches!(
            cycle.execute(&ClaimCommand::Begin {
                attempt_id: AttemptId::new()
            }),
            Err(ClaimCycleError::InvalidTransition { state: "failed", command: "begin" })
        ));
        cycle.execute(&ClaimCommand::Reset).unwrap();
        assert_eq!(cycle.state(), &ClaimState::Idle);
    }

    #[test]
    fn corrupt_snapshot_aborts_back_to_idle() {
        let mut cycle = validating();
        let events = cycle
            .execute(&ClaimCommand::Evaluate {
                snapshot: snapshot(0, 100_000, 0, 0, 1),
                wallet: Some(investor(0x01)),
            })
            .unwrap();
        assert!(matches!(
            &events[0],
            ClaimEvent::ValidationAborted {
                error: DividendError::DivisionByZero { .. },
                ..
            }
        ));
        assert_eq!(cycle.state(), &ClaimState::Idle);
    }

    #[test]
    fn disconnected_wallet_is_rejected_without_marking_stale() {
        let mut cycle = validating();
        cycle
            .execute(&ClaimCommand::Evaluate {
                snapshot: snapshot(1000, 100_000, 250, 0, 1),
                wallet: None,
            })
            .unwrap();
        assert_eq!(
            cycle.state(),
            &ClaimState::Rejected {
                reason: ClaimRejection::NotConnected
            }
        );
        assert_eq!(cycle.stale_revision(), None);
    }

    #[test]
    fn other_wallet_is_refused() {
        let mut cycle = validating();
        let err = cycle
            .execute(&ClaimCommand::Evaluate {
                snapshot: snapshot(1000, 100_000, 250, 0, 1),
                wallet: Some(investor(0x09)),
            })
            .unwrap_err();
        assert!(matches!(err, ClaimCycleError::WalletMismatch { .. }));
        assert_eq!(cycle.state(), &ClaimState::Validating);
    }
}
