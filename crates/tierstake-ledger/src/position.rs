//! # Staking Positions
//!
//! Per-account state and the closed-form accrual formulas.
//!
//! ## Plain reward
//!
//! ```text
//! reward = floor_unit(principal × rate_bps / 10_000 × days / days_per_month)
//! ```
//!
//! `floor_unit` truncates to whole display units. Settling often therefore
//! forfeits fractional days and sub-unit remainders; that truncation is part
//! of the reward definition.
//!
//! ## Referral reward
//!
//! ```text
//! referral = daily_referral_inflow_rate × seconds / 86_400
//! ```

use serde::{Deserialize, Serialize};
use tierstake_core::constants::{BPS_DENOMINATOR, SECONDS_PER_DAY};
use tierstake_core::{AccrualAnchor, AccrualClock, Amount, Timestamp};

use crate::config::LedgerConfig;

/// One account's staking state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingPosition {
    /// Currently staked amount
    pub principal: Amount,
    /// Settled, unclaimed plain reward
    pub pending_reward: Amount,
    /// Settled, unclaimed referral reward
    pub pending_referral_reward: Amount,
    /// Referral reward received per day from referees below this account
    pub daily_referral_inflow_rate: Amount,
    /// Monthly rate locked in for `principal`
    pub reward_rate_bps: u32,
    /// Holding period before `principal` may be withdrawn
    pub lock_days: u32,
    pub staked_at: Timestamp,
    pub last_reward_settled_at: Timestamp,
    pub last_referral_settled_at: Timestamp,
}

impl StakingPosition {
    /// Time at which `principal` becomes withdrawable
    pub fn unlocks_at(&self) -> Timestamp {
        self.staked_at
            .saturating_add(self.lock_days as i64 * SECONDS_PER_DAY)
    }

    pub fn is_unlocked(&self, now: Timestamp) -> bool {
        now >= self.unlocks_at()
    }

    /// Contribution to the global weighted rate sum
    pub fn weighted_rate(&self) -> Amount {
        self.principal.saturating_mul(self.reward_rate_bps as Amount)
    }

    pub fn is_active(&self) -> bool {
        self.principal > 0
    }
}

/// Ledger-wide totals, updated in O(1) per position change
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAggregates {
    pub total_principal: Amount,
    /// Σ principal × rate_bps
    pub total_weighted_rate: Amount,
}

impl GlobalAggregates {
    /// Replace one account's before-contribution with its after-contribution
    pub fn apply_change(
        &mut self,
        old_principal: Amount,
        old_rate_bps: u32,
        new_principal: Amount,
        new_rate_bps: u32,
    ) {
        let old_weighted = old_principal.saturating_mul(old_rate_bps as Amount);
        let new_weighted = new_principal.saturating_mul(new_rate_bps as Amount);
        self.total_principal = self
            .total_principal
            .saturating_sub(old_principal)
            .saturating_add(new_principal);
        self.total_weighted_rate = self
            .total_weighted_rate
            .saturating_sub(old_weighted)
            .saturating_add(new_weighted);
    }

    /// Principal-weighted average rate in bps (0 with nothing staked)
    pub fn weighted_average_rate_bps(&self) -> u32 {
        if self.total_principal == 0 {
            return 0;
        }
        (self.total_weighted_rate / self.total_principal) as u32
    }
}

/// Accrual parameters derived from configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccrualRules {
    pub clock: AccrualClock,
    pub anchor: AccrualAnchor,
    pub display_unit: Amount,
    pub days_per_month: u64,
}

impl AccrualRules {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            clock: AccrualClock::new(config.reward_stop_time),
            anchor: config.accrual_anchor,
            display_unit: config.display_unit.max(1),
            days_per_month: config.days_per_accrual_month.max(1),
        }
    }

    /// Truncate to whole display units
    pub fn floor_to_unit(&self, amount: Amount) -> Amount {
        amount / self.display_unit * self.display_unit
    }

    /// Plain reward earned since the last settlement, not yet credited
    pub fn accrued_reward(&self, position: &StakingPosition, now: Timestamp) -> Amount {
        let days = self.clock.reward_days(
            self.anchor,
            position.last_reward_settled_at,
            position.staked_at,
            now,
        );
        if days == 0 || position.principal == 0 {
            return 0;
        }
        let monthly = position
            .principal
            .saturating_mul(position.reward_rate_bps as Amount)
            / BPS_DENOMINATOR;
        let raw = monthly.saturating_mul(days as Amount) / self.days_per_month as Amount;
        self.floor_to_unit(raw)
    }

    /// Referral reward earned since the last referral settlement
    pub fn accrued_referral_reward(&self, position: &StakingPosition, now: Timestamp) -> Amount {
        let seconds = self
            .clock
            .elapsed_seconds(position.last_referral_settled_at, now);
        position
            .daily_referral_inflow_rate
            .saturating_mul(seconds as Amount)
            / SECONDS_PER_DAY as Amount
    }

    /// Daily reward rate a `(principal, rate)` pair generates, used by the cascade
    pub fn daily_rate(&self, principal: Amount, rate_bps: u32) -> Amount {
        let raw = principal.saturating_mul(rate_bps as Amount)
            / BPS_DENOMINATOR
            / self.days_per_month as Amount;
        self.floor_to_unit(raw)
    }
}
