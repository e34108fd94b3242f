//! Cache of per-(property, investor) ledger snapshots.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use estate_core::{InvestorAddress, PropertyId};
use estate_dividends::{AccountSnapshot, ClaimKey, ClaimRecord, Holding, Property};

use crate::ledger::{DividendLedger, LedgerError};

/// Latest snapshot read from the ledger for each pair.
///
/// Entries are only ever replaced wholesale by a fresh read. Each read takes its
/// revision from a cache-wide counter before it is issued, so a read that started
/// later carries a higher revision. A read never overwrites an entry with a higher
/// revision, and a read that started before an invalidation is not cached.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    inner: RwLock<Entries>,
    revision: AtomicU64,
}

#[derive(Debug, Default)]
struct Entries {
    snapshots: HashMap<ClaimKey, AccountSnapshot>,
    /// Revisions at or below these were invalidated and must not come back.
    pair_floor: HashMap<ClaimKey, u64>,
    property_floor: HashMap<PropertyId, u64>,
}

impl Entries {
    fn floor(&self, key: &ClaimKey) -> u64 {
        let pair = self.pair_floor.get(key).copied().unwrap_or(0);
        let property = self.property_floor.get(&key.property_id).copied().unwrap_or(0);
        pair.max(property)
    }

    fn store(&mut self, snapshot: &AccountSnapshot) {
        let key = snapshot.key();
        if snapshot.revision <= self.floor(&key) {
            return;
        }
        match self.snapshots.get(&key) {
            Some(existing) if existing.revision > snapshot.revision => {}
            _ => {
                self.snapshots.insert(key, snapshot.clone());
            }
        }
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store a freshly read snapshot under a new revision.
    pub fn replace(&self, property: Property, holding: Holding, record: ClaimRecord) -> AccountSnapshot {
        let snapshot = AccountSnapshot {
            property,
            holding,
            record,
            revision: self.next_revision(),
        };
        self.store(&snapshot);
        snapshot
    }

    fn store(&self, snapshot: &AccountSnapshot) {
        if let Ok(mut entries) = self.inner.write() {
            entries.store(snapshot);
        }
    }

    /// Read property, balance and claimed amount from the ledger and cache the result.
    ///
    /// The three reads are issued together; none of them is taken from the cache.
    /// Returns what this read saw, even when a read that started later has already
    /// been cached in its place.
    pub async fn refresh<L>(&self, ledger: &L, key: ClaimKey) -> Result<AccountSnapshot, LedgerError>
    where
        L: DividendLedger + ?Sized,
    {
        let revision = self.next_revision();
        let (property, balance, claimed_amount) = tokio::try_join!(
            ledger.property(key.property_id),
            ledger.balance(key.property_id, key.investor),
            ledger.claimed(key.property_id, key.investor),
        )?;

        if property.id != key.property_id {
            return Err(LedgerError::Malformed(format!(
                "asked for property {}, ledger returned {}",
                key.property_id, property.id
            )));
        }

        let snapshot = AccountSnapshot {
            property,
            holding: Holding {
                property_id: key.property_id,
                investor: key.investor,
                balance,
            },
            record: ClaimRecord {
                property_id: key.property_id,
                investor: key.investor,
                claimed_amount,
            },
            revision,
        };
        self.store(&snapshot);
        Ok(snapshot)
    }

    pub fn get(&self, key: &ClaimKey) -> Option<AccountSnapshot> {
        let entries = self.inner.read().ok()?;
        entries.snapshots.get(key).cloned()
    }

    /// Drop the cached snapshot so the next read must go to the ledger.
    pub fn invalidate(&self, key: &ClaimKey) {
        let floor = self.latest_revision();
        if let Ok(mut entries) = self.inner.write() {
            entries.snapshots.remove(key);
            entries.pair_floor.insert(*key, floor);
        }
    }

    /// Drop every cached pair of a property (after a deposit changes its pool).
    pub fn invalidate_property(&self, property_id: PropertyId) {
        let floor = self.latest_revision();
        if let Ok(mut entries) = self.inner.write() {
            entries.snapshots.retain(|key, _| key.property_id != property_id);
            entries.property_floor.insert(property_id, floor);
        }
    }

    /// Cached snapshots for one investor, ordered by property id.
    pub fn list_for(&self, investor: InvestorAddress) -> Vec<AccountSnapshot> {
        let entries = match self.inner.read() {
            Ok(e) => e,
            Err(_) => return vec![],
        };

        let mut out: Vec<_> = entries
            .snapshots
            .values()
            .filter(|s| s.holding.investor == investor)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.property.id);
        out
    }

    pub fn latest_revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}
