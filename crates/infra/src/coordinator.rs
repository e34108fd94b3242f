//! Claim orchestration: fresh read, validate, submit, reconcile.
//!
//! One `ClaimCycle` per (property, investor) pair lives behind a mutex that is never
//! held across an await. The cycle's `Submitting` state is the guard that keeps a
//! second claim for the same pair off the ledger until the first one settles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;

use estate_core::{Aggregate, AttemptId, InvestorAddress};
use estate_dividends::{
    AccountSnapshot, ClaimCommand, ClaimCycle, ClaimCycleError, ClaimEvent, ClaimIntent, ClaimKey, ClaimRejection,
    ClaimState, DividendError, SubmissionFailure,
};

use crate::cache::SnapshotCache;
use crate::ledger::{ClaimReceipt, DividendLedger, LedgerError};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Cycle(#[from] ClaimCycleError),

    #[error("claim state lock poisoned")]
    Poisoned,
}

/// How a claim attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// Mined. `snapshot` is the re-read ledger state, or `None` if the re-read
    /// failed (the cached entry is dropped in that case).
    Confirmed {
        receipt: ClaimReceipt,
        snapshot: Option<AccountSnapshot>,
    },
    Rejected { reason: ClaimRejection },
    Failed { failure: SubmissionFailure },
    /// Snapshot data is corrupt; dividends for this property are unavailable.
    Unavailable { error: DividendError },
    /// Cancelled while the snapshot was being read.
    Cancelled,
}

impl ClaimOutcome {
    /// The accounting error a non-confirmed outcome stands for, if any.
    pub fn error(&self) -> Option<DividendError> {
        match self {
            ClaimOutcome::Rejected { reason } => Some(reason.clone().into()),
            ClaimOutcome::Failed { failure } => Some(failure.clone().into()),
            ClaimOutcome::Unavailable { error } => Some(error.clone()),
            ClaimOutcome::Confirmed { .. } | ClaimOutcome::Cancelled => None,
        }
    }
}

/// A claim approved against a fresh snapshot and now `Submitting`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClaim {
    pub attempt_id: AttemptId,
    pub intent: ClaimIntent,
    /// Display-only; the ledger pays what it computes at execution.
    pub estimated_amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preflight {
    Pending(PendingClaim),
    Stopped(ClaimOutcome),
}

pub struct ClaimCoordinator<L: DividendLedger> {
    ledger: Arc<L>,
    cache: Arc<SnapshotCache>,
    cycles: Mutex<HashMap<ClaimKey, ClaimCycle>>,
}

impl<L: DividendLedger> ClaimCoordinator<L> {
    pub fn new(ledger: Arc<L>, cache: Arc<SnapshotCache>) -> Self {
        Self {
            ledger,
            cache,
            cycles: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Current lifecycle state of a pair (`Idle` if it never claimed).
    pub fn state(&self, key: ClaimKey) -> Result<ClaimState, CoordinatorError> {
        let cycles = self.cycles.lock().map_err(|_| CoordinatorError::Poisoned)?;
        Ok(cycles
            .get(&key)
            .map(|c| c.state().clone())
            .unwrap_or(ClaimState::Idle))
    }

    fn with_cycle<T>(
        &self,
        key: ClaimKey,
        f: impl FnOnce(&mut ClaimCycle) -> Result<T, ClaimCycleError>,
    ) -> Result<T, CoordinatorError> {
        let mut cycles = self.cycles.lock().map_err(|_| CoordinatorError::Poisoned)?;
        let cycle = cycles.entry(key).or_insert_with(|| ClaimCycle::new(key));
        Ok(f(cycle)?)
    }

    /// Re-read the pair from the ledger, replacing the cached snapshot.
    pub async fn refresh(&self, key: ClaimKey) -> Result<AccountSnapshot, CoordinatorError> {
        match self.cache.refresh(self.ledger.as_ref(), key).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                tracing::error!(
                    property_id = %key.property_id,
                    investor = %key.investor,
                    error = %e,
                    "ledger read failed"
                );
                Err(e.into())
            }
        }
    }

    /// Validate a claim against a fresh snapshot and, if approved, record it as
    /// pending (`Submitting`).
    ///
    /// A terminal cycle from an earlier attempt is reset first. Fails with
    /// `AlreadyInFlight` while another claim for the pair is being submitted.
    pub async fn record_pending_claim(
        &self,
        key: ClaimKey,
        wallet: Option<InvestorAddress>,
    ) -> Result<Preflight, CoordinatorError> {
        let attempt_id = AttemptId::new();
        self.with_cycle(key, |cycle| {
            if cycle.state().is_terminal() {
                cycle.execute(&ClaimCommand::Reset)?;
            }
            cycle.execute(&ClaimCommand::Begin { attempt_id })
        })?;

        let snapshot = match self.refresh(key).await {
            Ok(s) => s,
            Err(e) => {
                self.abandon(key, attempt_id);
                return Err(e);
            }
        };

        let events = {
            let mut cycles = self.cycles.lock().map_err(|_| CoordinatorError::Poisoned)?;
            let cycle = cycles.entry(key).or_insert_with(|| ClaimCycle::new(key));
            if cycle.attempt_id() != Some(attempt_id) {
                return Ok(Preflight::Stopped(ClaimOutcome::Cancelled));
            }
            match cycle.execute(&ClaimCommand::Evaluate { snapshot, wallet }) {
                Ok(events) => events,
                Err(e) => {
                    let _ = cycle.execute(&ClaimCommand::Cancel);
                    return Err(e.into());
                }
            }
        };

        let preflight = match events.into_iter().last() {
            Some(ClaimEvent::ClaimApproved {
                intent,
                estimated_amount,
                ..
            }) => {
                tracing::info!(
                    property_id = %key.property_id,
                    investor = %key.investor,
                    attempt_id = %attempt_id,
                    estimated_amount = %estimated_amount,
                    state = "submitting",
                    "claim approved"
                );
                Preflight::Pending(PendingClaim {
                    attempt_id,
                    intent,
                    estimated_amount,
                })
            }
            Some(ClaimEvent::ClaimRejected { reason, .. }) => {
                if reason.requires_refresh() {
                    tracing::warn!(
                        property_id = %key.property_id,
                        investor = %key.investor,
                        attempt_id = %attempt_id,
                        reason = %reason,
                        "cached claim state is stale"
                    );
                    self.cache.invalidate(&key);
                } else {
                    tracing::info!(
                        property_id = %key.property_id,
                        investor = %key.investor,
                        attempt_id = %attempt_id,
                        reason = %reason,
                        "claim rejected"
                    );
                }
                Preflight::Stopped(ClaimOutcome::Rejected { reason })
            }
            Some(ClaimEvent::ValidationAborted { error, .. }) => {
                tracing::warn!(
                    property_id = %key.property_id,
                    investor = %key.investor,
                    attempt_id = %attempt_id,
                    error = %error,
                    "dividends unavailable"
                );
                Preflight::Stopped(ClaimOutcome::Unavailable { error })
            }
            _ => Preflight::Stopped(ClaimOutcome::Cancelled),
        };
        Ok(preflight)
    }

    /// Send a pending claim to the ledger and settle the cycle.
    ///
    /// Only the attempt and intent the cycle approved are sent, and only once: a
    /// replayed or hand-built `PendingClaim` fails with `NotPending` before anything
    /// reaches the ledger. On confirmation the pair is reconciled by re-reading the
    /// ledger.
    pub async fn submit(&self, pending: PendingClaim) -> Result<ClaimOutcome, CoordinatorError> {
        let key = ClaimKey::new(pending.intent.property_id, pending.intent.investor);

        if let Err(e) = self.with_cycle(key, |cycle| {
            cycle.execute(&ClaimCommand::Dispatch {
                attempt_id: pending.attempt_id,
                intent: pending.intent,
            })
        }) {
            tracing::warn!(
                property_id = %key.property_id,
                investor = %key.investor,
                attempt_id = %pending.attempt_id,
                error = %e,
                "claim not sent"
            );
            return Err(e);
        }

        match self.ledger.submit_claim(&pending.intent).await {
            Ok(receipt) => {
                self.settle(
                    key,
                    pending.attempt_id,
                    ClaimCommand::Confirm {
                        tx_hash: receipt.tx.tx_hash.clone(),
                    },
                );
                tracing::info!(
                    property_id = %key.property_id,
                    investor = %key.investor,
                    attempt_id = %pending.attempt_id,
                    tx_hash = %receipt.tx.tx_hash,
                    amount_paid = %receipt.amount_paid,
                    state = "confirmed",
                    "claim confirmed"
                );

                let snapshot = self.reconcile_after_claim(key).await.ok();
                Ok(ClaimOutcome::Confirmed { receipt, snapshot })
            }
            Err(failure) => {
                self.settle(
                    key,
                    pending.attempt_id,
                    ClaimCommand::Fail {
                        failure: failure.clone(),
                    },
                );

                match &failure {
                    SubmissionFailure::Transport(_) => tracing::error!(
                        property_id = %key.property_id,
                        investor = %key.investor,
                        attempt_id = %pending.attempt_id,
                        failure = %failure,
                        "claim submission failed"
                    ),
                    _ => tracing::warn!(
                        property_id = %key.property_id,
                        investor = %key.investor,
                        attempt_id = %pending.attempt_id,
                        failure = %failure,
                        "claim submission failed"
                    ),
                }
                if matches!(failure, SubmissionFailure::Reverted(_)) {
                    self.cache.invalidate(&key);
                }
                Ok(ClaimOutcome::Failed { failure })
            }
        }
    }

    /// Record the ledger's answer on the cycle of a dispatched attempt.
    ///
    /// The ledger result stands whatever happens here; a cycle that can no longer
    /// take it is logged and dropped from the cache.
    fn settle(&self, key: ClaimKey, attempt_id: AttemptId, command: ClaimCommand) {
        let settled = self.with_cycle(key, |cycle| {
            if cycle.attempt_id() != Some(attempt_id) || !cycle.is_dispatched() {
                return Err(ClaimCycleError::NotPending { key, attempt_id });
            }
            cycle.execute(&command)
        });
        if let Err(e) = settled {
            tracing::error!(
                property_id = %key.property_id,
                investor = %key.investor,
                attempt_id = %attempt_id,
                error = %e,
                "could not settle claim cycle"
            );
            self.cache.invalidate(&key);
        }
    }

    /// Refresh the cached claim record after a confirmed claim.
    ///
    /// The record is always re-read from the ledger; the local copy is never
    /// incremented by the estimated or paid amount.
    pub async fn reconcile_after_claim(&self, key: ClaimKey) -> Result<AccountSnapshot, CoordinatorError> {
        self.cache.invalidate(&key);
        self.refresh(key).await
    }

    /// Full claim: validate, submit, reconcile.
    pub async fn claim(&self, key: ClaimKey, wallet: Option<InvestorAddress>) -> Result<ClaimOutcome, CoordinatorError> {
        match self.record_pending_claim(key, wallet).await? {
            Preflight::Pending(pending) => self.submit(pending).await,
            Preflight::Stopped(outcome) => Ok(outcome),
        }
    }

    /// Cancel an attempt that has not reached the ledger.
    ///
    /// Fails with `NotCancellable` once the claim is `Submitting`.
    pub fn cancel(&self, key: ClaimKey) -> Result<(), CoordinatorError> {
        self.with_cycle(key, |cycle| cycle.execute(&ClaimCommand::Cancel))?;
        Ok(())
    }

    /// Return a terminal cycle to `Idle`.
    pub fn reset(&self, key: ClaimKey) -> Result<(), CoordinatorError> {
        self.with_cycle(key, |cycle| cycle.execute(&ClaimCommand::Reset))?;
        Ok(())
    }

    fn abandon(&self, key: ClaimKey, attempt_id: AttemptId) {
        let _ = self.with_cycle(key, |cycle| {
            if cycle.attempt_id() == Some(attempt_id) && cycle.state().is_cancellable() {
                cycle.execute(&ClaimCommand::Cancel)?;
            }
            Ok(())
        });
    }
}
