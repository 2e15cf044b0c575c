//! Ledger configuration
//!
//! A single [`LedgerConfig`] is handed to the engine at construction and is
//! afterwards mutated only through admin-gated setters. Every mutation is
//! re-validated before it is committed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tierstake_core::constants::{
    BPS_DENOMINATOR, DAYS_PER_ACCRUAL_MONTH, MAX_REFERRAL_LEVELS, SECONDS_PER_DAY,
};
use tierstake_core::{
    amount_serde, AccountId, AccrualAnchor, Amount, InstrumentId, LedgerError, OperationKind,
    Result, Timestamp,
};

use crate::authority::SignerKey;

/// One step of the tier table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTier {
    /// Smallest principal that earns this tier
    #[serde(with = "amount_serde")]
    pub threshold: Amount,
    /// Monthly reward rate in basis points
    pub rate_bps: u32,
    /// Minimum holding period in days
    pub lock_days: u32,
}

impl RewardTier {
    pub const fn new(threshold: Amount, rate_bps: u32, lock_days: u32) -> Self {
        Self {
            threshold,
            rate_bps,
            lock_days,
        }
    }
}

/// Per-account rate override granted to an investor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorRate {
    pub rate_bps: u32,
    /// Keep the tier lock period (honored only under `OverrideLockPolicy::PerAccount`)
    #[serde(default)]
    pub keep_lock: bool,
}

/// What an investor override does to the lock period
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideLockPolicy {
    /// Overridden accounts never have a lock
    #[default]
    AlwaysZero,
    /// The override's `keep_lock` flag decides
    PerAccount,
}

/// What reinvesting does to the lock epoch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReinvestPolicy {
    /// `staked_at` and `lock_days` are left untouched
    #[default]
    PreserveLockEpoch,
    /// `staked_at = now` and the lock is re-tiered
    ResetLockEpoch,
}

/// Cooldown windows in accrual days
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownWindows {
    #[serde(default = "default_reinvest_days")]
    pub reinvest_days: u32,
    #[serde(default = "default_claim_days")]
    pub claim_reward_days: u32,
    #[serde(default = "default_claim_days")]
    pub claim_referral_reward_days: u32,
    #[serde(default = "default_claim_days")]
    pub sell_days: u32,
}

fn default_reinvest_days() -> u32 {
    7
}

fn default_claim_days() -> u32 {
    30
}

impl Default for CooldownWindows {
    fn default() -> Self {
        Self {
            reinvest_days: default_reinvest_days(),
            claim_reward_days: default_claim_days(),
            claim_referral_reward_days: default_claim_days(),
            sell_days: default_claim_days(),
        }
    }
}

impl CooldownWindows {
    pub fn days(&self, kind: OperationKind) -> u32 {
        match kind {
            OperationKind::Reinvest => self.reinvest_days,
            OperationKind::ClaimReward => self.claim_reward_days,
            OperationKind::ClaimReferralReward => self.claim_referral_reward_days,
            OperationKind::Sell => self.sell_days,
        }
    }

    /// Window length in seconds
    pub fn seconds(&self, kind: OperationKind) -> i64 {
        self.days(kind) as i64 * SECONDS_PER_DAY
    }
}

/// Auxiliary payout instrument
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Staking-asset units per instrument unit
    #[serde(with = "amount_serde")]
    pub price: Amount,
    /// Smallest purchase, in instrument units
    #[serde(with = "amount_serde")]
    pub min_purchase: Amount,
}

/// Fixed exchange rate into an external payout unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    #[serde(with = "amount_serde")]
    pub numerator: Amount,
    #[serde(with = "amount_serde")]
    pub denominator: Amount,
}

impl ExchangeRate {
    /// `amount * numerator / denominator`, floored
    pub fn convert(&self, amount: Amount) -> Amount {
        amount.saturating_mul(self.numerator) / self.denominator
    }
}

/// Complete ledger configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Tier table, ascending thresholds starting at 0
    #[serde(default = "default_tiers")]
    pub tiers: Vec<RewardTier>,

    /// Referral weight per level (bps), index 0 = direct parent
    #[serde(default = "default_level_rates")]
    pub level_rates_bps: Vec<u32>,

    /// Smallest accepted stake
    #[serde(default = "default_min_stake", with = "amount_serde")]
    pub min_stake: Amount,

    /// Largest principal one account may hold (unbounded if absent)
    #[serde(default, with = "amount_serde::option")]
    pub max_stake_position: Option<Amount>,

    /// Display-unit granularity rewards are truncated to
    #[serde(default = "default_display_unit", with = "amount_serde")]
    pub display_unit: Amount,

    /// Accrual days per reward month
    #[serde(default = "default_days_per_month")]
    pub days_per_accrual_month: u64,

    #[serde(default)]
    pub accrual_anchor: AccrualAnchor,

    #[serde(default)]
    pub override_lock_policy: OverrideLockPolicy,

    #[serde(default)]
    pub reinvest_policy: ReinvestPolicy,

    #[serde(default)]
    pub cooldowns: CooldownWindows,

    /// Accrual stops at this time (emergency stop)
    #[serde(default)]
    pub reward_stop_time: Option<Timestamp>,

    /// Referrer used when a first stake names none
    #[serde(default)]
    pub default_referrer: Option<AccountId>,

    #[serde(default)]
    pub instruments: BTreeMap<InstrumentId, InstrumentConfig>,

    #[serde(default)]
    pub investor_rates: BTreeMap<AccountId, InvestorRate>,

    /// Conversion applied to plain-reward payouts
    #[serde(default)]
    pub reward_payout_rate: Option<ExchangeRate>,

    /// Conversion applied to referral-reward payouts
    #[serde(default)]
    pub referral_payout_rate: Option<ExchangeRate>,

    /// Key whose signatures authorize unrestricted sells
    #[serde(default)]
    pub price_signer: Option<SignerKey>,
}

fn default_tiers() -> Vec<RewardTier> {
    vec![
        RewardTier::new(0, 800, 90),
        RewardTier::new(5_000_000, 1000, 120),
        RewardTier::new(25_000_000, 1200, 180),
        RewardTier::new(125_000_000, 1400, 270),
    ]
}

fn default_level_rates() -> Vec<u32> {
    vec![1000, 500, 250]
}

fn default_min_stake() -> Amount {
    1
}

fn default_display_unit() -> Amount {
    1
}

fn default_days_per_month() -> u64 {
    DAYS_PER_ACCRUAL_MONTH
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            level_rates_bps: default_level_rates(),
            min_stake: default_min_stake(),
            max_stake_position: None,
            display_unit: default_display_unit(),
            days_per_accrual_month: default_days_per_month(),
            accrual_anchor: AccrualAnchor::default(),
            override_lock_policy: OverrideLockPolicy::default(),
            reinvest_policy: ReinvestPolicy::default(),
            cooldowns: CooldownWindows::default(),
            reward_stop_time: None,
            default_referrer: None,
            instruments: BTreeMap::new(),
            investor_rates: BTreeMap::new(),
            reward_payout_rate: None,
            referral_payout_rate: None,
            price_signer: None,
        }
    }
}

impl LedgerConfig {
    /// Check every structural constraint
    pub fn validate(&self) -> Result<()> {
        validate_tiers(&self.tiers)?;
        validate_level_rates(&self.level_rates_bps)?;

        if self.display_unit == 0 {
            return Err(config_error("display_unit must be non-zero"));
        }
        if self.days_per_accrual_month == 0 {
            return Err(config_error("days_per_accrual_month must be non-zero"));
        }
        if let Some(max) = self.max_stake_position {
            if self.min_stake > max {
                return Err(config_error(format!(
                    "min_stake {} exceeds max_stake_position {}",
                    self.min_stake, max
                )));
            }
        }
        for (id, instrument) in &self.instruments {
            if instrument.price == 0 {
                return Err(config_error(format!("instrument {} has zero price", id)));
            }
        }
        for rate in [self.reward_payout_rate, self.referral_payout_rate].into_iter().flatten() {
            if rate.denominator == 0 {
                return Err(config_error("exchange rate denominator must be non-zero"));
            }
        }
        if self.default_referrer.map_or(false, |r| r.is_zero()) {
            return Err(config_error("default_referrer must not be the zero account"));
        }
        Ok(())
    }

    /// Number of referral levels the cascade walks
    pub fn referral_depth(&self) -> usize {
        self.level_rates_bps.len()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| config_error(format!("invalid TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| config_error(format!("invalid JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn validate_tiers(tiers: &[RewardTier]) -> Result<()> {
    let first = tiers
        .first()
        .ok_or_else(|| config_error("tier table is empty"))?;
    if first.threshold != 0 {
        return Err(config_error(format!(
            "first tier threshold must be 0, got {}",
            first.threshold
        )));
    }
    for pair in tiers.windows(2) {
        if pair[1].threshold <= pair[0].threshold {
            return Err(config_error(format!(
                "tier thresholds must be strictly increasing ({} after {})",
                pair[1].threshold, pair[0].threshold
            )));
        }
    }
    Ok(())
}

fn validate_level_rates(rates: &[u32]) -> Result<()> {
    if rates.len() > MAX_REFERRAL_LEVELS {
        return Err(config_error(format!(
            "at most {} referral levels, got {}",
            MAX_REFERRAL_LEVELS,
            rates.len()
        )));
    }
    if let Some(rate) = rates.iter().find(|r| **r as u128 > BPS_DENOMINATOR) {
        return Err(config_error(format!("level rate {} bps exceeds 100%", rate)));
    }
    Ok(())
}

pub(crate) fn config_error(message: impl Into<String>) -> LedgerError {
    LedgerError::ConfigurationError(message.into())
}
