//! # Reward Rate Table
//!
//! Maps a principal to a monthly reward rate and a lock period.
//!
//! | Threshold | Rate | Lock |
//! |-----------|------|------|
//! | 0 | 8.00% | 90 days |
//! | 5,000,000 | 10.00% | 120 days |
//! | 25,000,000 | 12.00% | 180 days |
//! | 125,000,000 | 14.00% | 270 days |
//!
//! Selection is a step function: the tier with the greatest threshold not
//! exceeding the principal. A per-account investor override replaces the
//! table entirely.

use serde::{Deserialize, Serialize};
use tierstake_core::{Amount, Result};

use crate::config::{validate_tiers, InvestorRate, LedgerConfig, OverrideLockPolicy, RewardTier};

/// Rate and lock selected for a principal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierQuote {
    pub rate_bps: u32,
    pub lock_days: u32,
}

/// Validated view over the configured tier table
#[derive(Clone, Copy, Debug)]
pub struct RewardRateTable<'a> {
    tiers: &'a [RewardTier],
    override_policy: OverrideLockPolicy,
}

impl<'a> RewardRateTable<'a> {
    /// Fails with `ConfigurationError` on an empty or unordered table
    pub fn new(tiers: &'a [RewardTier], override_policy: OverrideLockPolicy) -> Result<Self> {
        validate_tiers(tiers)?;
        Ok(Self {
            tiers,
            override_policy,
        })
    }

    pub fn from_config(config: &'a LedgerConfig) -> Result<Self> {
        Self::new(&config.tiers, config.override_lock_policy)
    }

    /// Tier for `principal`, ignoring overrides
    pub fn tier_for(&self, principal: Amount) -> &'a RewardTier {
        let idx = self.tiers.partition_point(|t| t.threshold <= principal);
        // first threshold is 0, so idx >= 1 on a validated table
        &self.tiers[idx.saturating_sub(1)]
    }

    /// Quote for `principal`, honoring an investor override
    pub fn lookup(&self, principal: Amount, investor: Option<&InvestorRate>) -> TierQuote {
        let tier = self.tier_for(principal);
        match investor {
            Some(rate) => {
                let keep = self.override_policy == OverrideLockPolicy::PerAccount && rate.keep_lock;
                TierQuote {
                    rate_bps: rate.rate_bps,
                    lock_days: if keep { tier.lock_days } else { 0 },
                }
            }
            None => TierQuote {
                rate_bps: tier.rate_bps,
                lock_days: tier.lock_days,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierstake_core::LedgerError;

    fn table(policy: OverrideLockPolicy) -> (Vec<RewardTier>, OverrideLockPolicy) {
        (LedgerConfig::default().tiers, policy)
    }

    #[test]
    fn test_tier_boundaries() {
        let (tiers, policy) = table(OverrideLockPolicy::AlwaysZero);
        let table = RewardRateTable::new(&tiers, policy).unwrap();

        assert_eq!(table.lookup(0, None), TierQuote { rate_bps: 800, lock_days: 90 });
        assert_eq!(table.lookup(4_999_999, None), TierQuote { rate_bps: 800, lock_days: 90 });
        assert_eq!(table.lookup(5_000_000, None), TierQuote { rate_bps: 1000, lock_days: 120 });
        assert_eq!(table.lookup(24_999_999, None).rate_bps, 1000);
        assert_eq!(table.lookup(25_000_000, None).rate_bps, 1200);
        assert_eq!(table.lookup(125_000_000, None), TierQuote { rate_bps: 1400, lock_days: 270 });
        assert_eq!(table.lookup(Amount::MAX, None).rate_bps, 1400);
    }

    #[test]
    fn test_override_always_zeroes_lock() {
        let (tiers, policy) = table(OverrideLockPolicy::AlwaysZero);
        let table = RewardRateTable::new(&tiers, policy).unwrap();
        let investor = InvestorRate {
            rate_bps: 2000,
            keep_lock: true,
        };
        assert_eq!(
            table.lookup(10_000_000, Some(&investor)),
            TierQuote { rate_bps: 2000, lock_days: 0 }
        );
    }

    #[test]
    fn test_override_per_account_keeps_lock() {
        let (tiers, policy) = table(OverrideLockPolicy::PerAccount);
        let table = RewardRateTable::new(&tiers, policy).unwrap();
        let keep = InvestorRate {
            rate_bps: 2000,
            keep_lock: true,
        };
        let drop = InvestorRate {
            rate_bps: 2000,
            keep_lock: false,
        };
        assert_eq!(table.lookup(10_000_000, Some(&keep)).lock_days, 120);
        assert_eq!(table.lookup(10_000_000, Some(&drop)).lock_days, 0);
    }

    #[test]
    fn test_empty_table_is_configuration_error() {
        let result = RewardRateTable::new(&[], OverrideLockPolicy::AlwaysZero);
        assert!(matches!(result, Err(LedgerError::ConfigurationError(_))));
    }
}
