use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;

use estate_core::{InvestorAddress, PropertyId};
use estate_dividends::trade::{quote_purchase, validate_deposit, validate_sell};
use estate_dividends::{
    compute_entitlement, ClaimIntent, DividendsClaimed, DividendsDistributed, Holding, LedgerEvent, Property,
    SubmissionFailure, TokensPurchased, TokensSold,
};
use estate_events::{EventEnvelope, LogPosition};

use super::r#trait::{ClaimReceipt, DividendLedger, LedgerError, TxReceipt};

/// 2025-01-01T00:00:00Z; block `n` is mined `12 * n` seconds later.
const GENESIS_UNIX_SECS: i64 = 1_735_689_600;
const BLOCK_TIME_SECS: i64 = 12;

type Slot = (PropertyId, InvestorAddress);

#[derive(Debug, Default)]
struct LedgerState {
    properties: BTreeMap<PropertyId, Property>,
    names: HashMap<PropertyId, String>,
    balances: HashMap<Slot, u64>,
    claimed: HashMap<Slot, u128>,
    /// Dividends actually transferred out per property.
    paid_out: HashMap<PropertyId, u128>,
    investor_index: BTreeMap<InvestorAddress, BTreeSet<PropertyId>>,
    logs: Vec<EventEnvelope<JsonValue>>,
    block_number: u64,
    next_property_id: u64,
    reject_next_signature: bool,
    offline: bool,
}

impl LedgerState {
    fn block_time(&self) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
            + Duration::seconds(GENESIS_UNIX_SECS + self.block_number as i64 * BLOCK_TIME_SECS)
    }

    /// Mine one block holding one transaction that emitted `events`.
    fn mine(&mut self, events: Vec<LedgerEvent>) -> TxReceipt {
        self.block_number += 1;
        let tx_hash = format!("0x{:064x}", self.block_number);

        for (log_index, event) in events.into_iter().enumerate() {
            self.logs.push(EventEnvelope::new(
                tx_hash.clone(),
                LogPosition::new(self.block_number, log_index as u32),
                event.abi_name(),
                event.to_payload(),
            ));
        }

        TxReceipt {
            tx_hash,
            block_number: self.block_number,
        }
    }

    fn property_mut(&mut self, property_id: PropertyId) -> Result<&mut Property, SubmissionFailure> {
        self.properties
            .get_mut(&property_id)
            .ok_or_else(|| revert("Property does not exist"))
    }

    fn name_of(&self, property_id: PropertyId) -> String {
        self.names.get(&property_id).cloned().unwrap_or_default()
    }
}

fn revert(reason: &str) -> SubmissionFailure {
    SubmissionFailure::Reverted(reason.to_string())
}

/// In-memory stand-in for the tokenization contract.
///
/// Intended for tests/dev. Mirrors the contract's rules: owner-only deposits, the
/// payable claim amount recomputed from ledger state at execution, and transfers
/// that cannot exceed what was deposited.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        let state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Transport("ledger state poisoned".to_string()))?;
        if state.offline {
            return Err(LedgerError::Transport("ledger unreachable".to_string()));
        }
        Ok(state)
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, LedgerState>, SubmissionFailure> {
        self.lock().map_err(|e| SubmissionFailure::Transport(e.to_string()))
    }

    /// Tokenize a property. Returns the id the ledger assigned.
    pub fn tokenize(
        &self,
        owner: InvestorAddress,
        name: impl Into<String>,
        total_tokens: u64,
        token_price: u128,
        metadata_cid: impl Into<String>,
    ) -> Result<PropertyId, SubmissionFailure> {
        if total_tokens == 0 {
            return Err(revert("Total tokens must be greater than zero"));
        }
        if token_price == 0 {
            return Err(revert("Token price must be greater than zero"));
        }

        let mut state = self.lock_for_write()?;
        state.next_property_id += 1;
        let id = PropertyId::new(state.next_property_id);

        state.properties.insert(
            id,
            Property {
                id,
                owner,
                total_tokens,
                tokens_sold: 0,
                token_price,
                total_dividends: 0,
                is_active: true,
                metadata_cid: metadata_cid.into(),
            },
        );
        state.names.insert(id, name.into());
        state.mine(vec![]);
        Ok(id)
    }

    /// Insert a property record verbatim, bypassing tokenization checks.
    ///
    /// Lets tests reproduce corrupt upstream records (e.g. zero supply).
    pub fn insert_property(&self, property: Property) {
        if let Ok(mut state) = self.state.lock() {
            state.next_property_id = state.next_property_id.max(property.id.get());
            state.properties.insert(property.id, property);
        }
    }

    /// Set a raw balance, bypassing purchase checks.
    pub fn insert_holding(&self, holding: Holding) {
        if let Ok(mut state) = self.state.lock() {
            state
                .investor_index
                .entry(holding.investor)
                .or_default()
                .insert(holding.property_id);
            state
                .balances
                .insert((holding.property_id, holding.investor), holding.balance);
        }
    }

    pub fn buy(
        &self,
        property_id: PropertyId,
        buyer: InvestorAddress,
        tokens: u64,
    ) -> Result<TxReceipt, SubmissionFailure> {
        let mut state = self.lock_for_write()?;
        let block_time = state.block_time();

        let property = state.property_mut(property_id)?;
        let quote = quote_purchase(property, tokens).map_err(|e| revert(&e.to_string()))?;
        property.tokens_sold += tokens;

        *state.balances.entry((property_id, buyer)).or_default() += tokens;
        state.investor_index.entry(buyer).or_default().insert(property_id);

        Ok(state.mine(vec![LedgerEvent::TokensPurchased(TokensPurchased {
            property_id,
            buyer,
            amount: tokens,
            cost: quote.cost,
            block_time,
        })]))
    }

    /// Sell tokens back to the property's pool.
    pub fn sell(
        &self,
        property_id: PropertyId,
        seller: InvestorAddress,
        tokens: u64,
    ) -> Result<TxReceipt, SubmissionFailure> {
        let mut state = self.lock_for_write()?;
        let block_time = state.block_time();

        let balance = state.balances.get(&(property_id, seller)).copied().unwrap_or(0);
        validate_sell(tokens, balance).map_err(|e| revert(&e.to_string()))?;

        let property = state.property_mut(property_id)?;
        property.tokens_sold = property.tokens_sold.saturating_sub(tokens);
        state.balances.insert((property_id, seller), balance - tokens);

        Ok(state.mine(vec![LedgerEvent::TokensSold(TokensSold {
            property_id,
            seller,
            amount: tokens,
            block_time,
        })]))
    }

    pub fn set_active(&self, property_id: PropertyId, active: bool) -> Result<(), SubmissionFailure> {
        let mut state = self.lock_for_write()?;
        state.property_mut(property_id)?.is_active = active;
        state.mine(vec![]);
        Ok(())
    }

    /// The next signature request is declined, as if the user cancelled in the wallet.
    pub fn reject_next_signature(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.reject_next_signature = true;
        }
    }

    /// Simulate loss of connectivity: every read and write fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.offline = offline;
        }
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().map(|s| s.block_number).unwrap_or(0)
    }

    /// Total transferred out of a property's pool so far.
    pub fn paid_out(&self, property_id: PropertyId) -> u128 {
        self.state
            .lock()
            .map(|s| s.paid_out.get(&property_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl DividendLedger for InMemoryLedger {
    async fn property(&self, property_id: PropertyId) -> Result<Property, LedgerError> {
        let state = self.lock()?;
        state
            .properties
            .get(&property_id)
            .cloned()
            .ok_or(LedgerError::PropertyNotFound(property_id))
    }

    async fn investor_properties(&self, investor: InvestorAddress) -> Result<Vec<PropertyId>, LedgerError> {
        let state = self.lock()?;
        Ok(state
            .investor_index
            .get(&investor)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn owner_properties(&self, owner: InvestorAddress) -> Result<Vec<Property>, LedgerError> {
        let state = self.lock()?;
        Ok(state
            .properties
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect())
    }

    async fn balance(&self, property_id: PropertyId, investor: InvestorAddress) -> Result<u64, LedgerError> {
        let state = self.lock()?;
        if !state.properties.contains_key(&property_id) {
            return Err(LedgerError::PropertyNotFound(property_id));
        }
        Ok(state.balances.get(&(property_id, investor)).copied().unwrap_or(0))
    }

    async fn claimed(&self, property_id: PropertyId, investor: InvestorAddress) -> Result<u128, LedgerError> {
        let state = self.lock()?;
        Ok(state.claimed.get(&(property_id, investor)).copied().unwrap_or(0))
    }

    async fn submit_claim(&self, intent: &ClaimIntent) -> Result<ClaimReceipt, SubmissionFailure> {
        let mut state = self.lock_for_write()?;
        if std::mem::take(&mut state.reject_next_signature) {
            return Err(SubmissionFailure::from_signer_message(
                "User rejected the request.",
            ));
        }

        let slot = (intent.property_id, intent.investor);
        let property = state
            .properties
            .get(&intent.property_id)
            .cloned()
            .ok_or_else(|| revert("Property does not exist"))?;
        if !property.is_active {
            return Err(revert("Property is not active"));
        }

        let holding = Holding {
            property_id: intent.property_id,
            investor: intent.investor,
            balance: state.balances.get(&slot).copied().unwrap_or(0),
        };
        let entitlement = compute_entitlement(&property, &holding).map_err(|e| revert(&e.to_string()))?;
        let claimed = state.claimed.get(&slot).copied().unwrap_or(0);
        if entitlement <= claimed {
            return Err(revert("No dividends to claim"));
        }

        let payable = entitlement - claimed;
        let paid_out = state.paid_out.get(&intent.property_id).copied().unwrap_or(0);
        if paid_out.saturating_add(payable) > property.total_dividends {
            return Err(revert("Insufficient dividend pool"));
        }

        state.claimed.insert(slot, entitlement);
        state.paid_out.insert(intent.property_id, paid_out + payable);

        let event = LedgerEvent::DividendsClaimed(DividendsClaimed {
            property_id: intent.property_id,
            property_name: state.name_of(intent.property_id),
            investor: intent.investor,
            amount: payable,
            block_time: state.block_time(),
        });
        let tx = state.mine(vec![event]);

        Ok(ClaimReceipt {
            tx,
            amount_paid: payable,
        })
    }

    async fn deposit_dividends(
        &self,
        property_id: PropertyId,
        from: InvestorAddress,
        amount: u128,
    ) -> Result<TxReceipt, SubmissionFailure> {
        let mut state = self.lock_for_write()?;
        if std::mem::take(&mut state.reject_next_signature) {
            return Err(SubmissionFailure::UserRejected);
        }
        validate_deposit(amount).map_err(|_| revert("Dividend amount must be greater than zero"))?;

        let block_time = state.block_time();
        let property = state.property_mut(property_id)?;
        if property.owner != from {
            return Err(revert("Only the property owner can distribute dividends"));
        }
        property.total_dividends = property
            .total_dividends
            .checked_add(amount)
            .ok_or_else(|| revert("Dividend pool overflow"))?;

        Ok(state.mine(vec![LedgerEvent::DividendsDistributed(DividendsDistributed {
            property_id,
            amount,
            block_time,
        })]))
    }

    async fn logs(&self, from_block: u64) -> Result<Vec<EventEnvelope<JsonValue>>, LedgerError> {
        let state = self.lock()?;
        Ok(state
            .logs
            .iter()
            .filter(|log| log.position().block_number >= from_block)
            .cloned()
            .collect())
    }
}
