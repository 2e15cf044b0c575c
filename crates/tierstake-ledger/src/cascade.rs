//! # Referral Cascade
//!
//! Whenever an account's `(principal, rate)` pair changes, its daily reward
//! rate changes with it. The cascade walks up to `level_rates.len()`
//! ancestors and moves each one's referral inflow from the old weighted
//! daily rate to the new one.
//!
//! ```text
//!   level   ancestor   weight    inflow change
//!   1       parent     1000 bps  + new/10 - old/10
//!   2       grand      500 bps   + new/20 - old/20
//!   3       great      250 bps   + new/40 - old/40
//! ```
//!
//! Each ancestor's referral reward is settled before its inflow changes, so
//! accrual at the old rate is never lost.
//!
//! ## Clamped subtraction
//!
//! The old contribution is removed as `gross - min(delta_old, gross)` where
//! `gross = inflow + delta_new`. When an ancestor never received the old
//! contribution (the account joined it after staking, or level weights
//! changed in between) the subtraction clamps at zero and the ancestor ends
//! up under-credited. This is an accepted approximation, not a ledger of
//! record per edge.

use tierstake_core::constants::BPS_DENOMINATOR;
use tierstake_core::{AccountId, Amount, Timestamp};
use tracing::debug;

use crate::events::LedgerEvent;
use crate::ledger::LedgerState;
use crate::position::AccrualRules;

/// Re-prices positions and propagates the change to referral ancestors
#[derive(Clone, Copy, Debug)]
pub struct CascadeEngine<'a> {
    rules: AccrualRules,
    level_rates_bps: &'a [u32],
}

impl<'a> CascadeEngine<'a> {
    pub fn new(rules: AccrualRules, level_rates_bps: &'a [u32]) -> Self {
        Self {
            rules,
            level_rates_bps,
        }
    }

    /// Set `account`'s principal and rate, update the aggregates and cascade.
    ///
    /// The caller settles the account's plain reward first.
    pub fn reprice(
        &self,
        state: &mut LedgerState,
        account: &AccountId,
        new_principal: Amount,
        new_rate_bps: u32,
        now: Timestamp,
    ) {
        let (old_principal, old_rate_bps) = {
            let position = state.position_mut(*account);
            let old = (position.principal, position.reward_rate_bps);
            position.principal = new_principal;
            position.reward_rate_bps = new_rate_bps;
            old
        };
        state
            .aggregates
            .apply_change(old_principal, old_rate_bps, new_principal, new_rate_bps);

        let previous_daily = self.rules.daily_rate(old_principal, old_rate_bps);
        let new_daily = self.rules.daily_rate(new_principal, new_rate_bps);
        self.propagate(state, account, previous_daily, new_daily, now);
    }

    /// Move every ancestor's inflow from `previous_daily` to `new_daily`
    pub fn propagate(
        &self,
        state: &mut LedgerState,
        account: &AccountId,
        previous_daily: Amount,
        new_daily: Amount,
        now: Timestamp,
    ) {
        let ancestors = state.tree.ancestors(account, self.level_rates_bps.len());
        for (index, (ancestor, weight)) in ancestors.iter().zip(self.level_rates_bps).enumerate() {
            state.settle_referral_reward(ancestor, &self.rules, now);

            let weight = *weight as Amount;
            let delta_new = new_daily.saturating_mul(weight) / BPS_DENOMINATOR;
            let delta_old = previous_daily.saturating_mul(weight) / BPS_DENOMINATOR;

            let position = state.position_mut(*ancestor);
            let gross = position.daily_referral_inflow_rate.saturating_add(delta_new);
            position.daily_referral_inflow_rate = gross - delta_old.min(gross);
            let daily_inflow = position.daily_referral_inflow_rate;

            let level = (index + 1) as u8;
            debug!(
                "Cascade level {} from {}: {} inflow -{} +{} = {}",
                level, account, ancestor, delta_old, delta_new, daily_inflow
            );
            state.push_event(LedgerEvent::ReferralRateChanged {
                account: *ancestor,
                level,
                daily_inflow,
            });
        }
    }
}
