//! # Ledger State
//!
//! The authoritative account state: positions, the referral forest,
//! cooldown timestamps, signed-sell nonces and the global aggregates.
//!
//! Positions are created implicitly on first reference and are never
//! destroyed; an account that exits keeps a zero-principal position so its
//! settlement timestamps and pending balances survive.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tierstake_core::{AccountId, Amount, Result, Timestamp};
use tracing::debug;

use crate::cooldown::CooldownBook;
use crate::events::LedgerEvent;
use crate::position::{AccrualRules, GlobalAggregates, StakingPosition};
use crate::referral::ReferralTree;

/// Every piece of mutable ledger state
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LedgerState {
    positions: HashMap<AccountId, StakingPosition>,
    pub(crate) tree: ReferralTree,
    pub(crate) cooldowns: CooldownBook,
    nonces: HashMap<AccountId, u64>,
    pub(crate) aggregates: GlobalAggregates,
    /// Unbounded until the host drains it
    #[serde(skip)]
    events: Vec<LedgerEvent>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position for `account`, zeroed if never touched
    pub fn position(&self, account: &AccountId) -> StakingPosition {
        self.positions.get(account).cloned().unwrap_or_default()
    }

    pub(crate) fn position_mut(&mut self, account: AccountId) -> &mut StakingPosition {
        self.positions.entry(account).or_default()
    }

    pub fn tree(&self) -> &ReferralTree {
        &self.tree
    }

    pub fn cooldowns(&self) -> &CooldownBook {
        &self.cooldowns
    }

    pub fn aggregates(&self) -> &GlobalAggregates {
        &self.aggregates
    }

    /// Last consumed signed-sell nonce (0 = none)
    pub fn nonce(&self, account: &AccountId) -> u64 {
        self.nonces.get(account).copied().unwrap_or(0)
    }

    pub(crate) fn consume_nonce(&mut self, account: AccountId, nonce: u64) {
        self.nonces.insert(account, nonce);
    }

    /// Attach `account` under `referrer` and record the edge
    pub(crate) fn link(&mut self, account: AccountId, referrer: AccountId) -> Result<()> {
        self.tree.register(account, referrer)?;
        debug!("Registered {} under {}", account, referrer);
        self.push_event(LedgerEvent::ReferralRegistered { account, referrer });
        Ok(())
    }

    /// Detach `account` from its referrer and record the removal
    pub(crate) fn unlink(&mut self, account: AccountId) -> Result<AccountId> {
        let former_referrer = self.tree.unlink(&account)?;
        debug!("Unlinked {} from {}", account, former_referrer);
        self.push_event(LedgerEvent::ReferralRemoved {
            account,
            former_referrer,
        });
        Ok(former_referrer)
    }

    /// Number of accounts that hold or have held a position
    pub fn account_count(&self) -> usize {
        self.positions.len()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &StakingPosition)> {
        self.positions.iter()
    }

    /// Direct referees currently holding a non-zero principal
    pub fn active_referee_count(&self, account: &AccountId) -> usize {
        self.tree
            .children(account)
            .filter(|child| self.positions.get(*child).map_or(false, |p| p.is_active()))
            .count()
    }

    /// Settled plus accrued plain reward, without mutating anything
    pub fn preview_reward(
        &self,
        account: &AccountId,
        rules: &AccrualRules,
        now: Timestamp,
    ) -> Amount {
        let position = self.position(account);
        position
            .pending_reward
            .saturating_add(rules.accrued_reward(&position, now))
    }

    /// Settled plus accrued referral reward, without mutating anything
    pub fn preview_referral_reward(
        &self,
        account: &AccountId,
        rules: &AccrualRules,
        now: Timestamp,
    ) -> Amount {
        let position = self.position(account);
        position
            .pending_referral_reward
            .saturating_add(rules.accrued_referral_reward(&position, now))
    }

    /// Credit accrued plain reward and move the settlement mark to `now`
    pub fn settle_reward(
        &mut self,
        account: &AccountId,
        rules: &AccrualRules,
        now: Timestamp,
    ) -> Amount {
        let position = self.position_mut(*account);
        let accrued = rules.accrued_reward(position, now);
        position.pending_reward = position.pending_reward.saturating_add(accrued);
        position.last_reward_settled_at = now;
        if accrued > 0 {
            debug!(
                "Settled reward for {}: +{} (pending {})",
                account, accrued, position.pending_reward
            );
        }
        accrued
    }

    /// Credit accrued referral reward and move the referral mark to `now`
    pub fn settle_referral_reward(
        &mut self,
        account: &AccountId,
        rules: &AccrualRules,
        now: Timestamp,
    ) -> Amount {
        let position = self.position_mut(*account);
        let accrued = rules.accrued_referral_reward(position, now);
        position.pending_referral_reward = position.pending_referral_reward.saturating_add(accrued);
        position.last_referral_settled_at = now;
        if accrued > 0 {
            debug!(
                "Settled referral reward for {}: +{} (pending {})",
                account, accrued, position.pending_referral_reward
            );
        }
        accrued
    }

    pub(crate) fn push_event(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub(crate) fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}
