//! # Staking Engine
//!
//! The top-level ledger: every operation takes the whole-ledger write lock,
//! validates, performs the external transfer, and only then applies its
//! state changes. A rejected call leaves the ledger exactly as it was.
//!
//! | Operation | Gate | Moves |
//! |-----------|------|-------|
//! | `stake` | min/max stake | staking asset in |
//! | `reinvest` | 7-day cooldown, pending reward | nothing |
//! | `claim` | lock period, principal | staking asset out |
//! | `claim_reward` | 30-day cooldown, pending reward | reward payout out |
//! | `claim_referral_reward` | 30-day cooldown, pending referral reward | referral payout out |
//! | `sell` | 30-day cooldown, half of principal | instruments out |
//! | `sell_authorized` | 30-day cooldown, signature, nonce | instruments out |

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tierstake_core::{AccountId, Amount, LedgerError, OperationKind, Result, TimeSource, Timestamp};
use tracing::{debug, info, warn};

use crate::authority::{Ed25519PriceAuthority, SellAuthorization, SignerKey};
use crate::cascade::CascadeEngine;
use crate::config::{
    config_error, CooldownWindows, ExchangeRate, InstrumentConfig, InvestorRate, LedgerConfig,
    ReinvestPolicy, RewardTier,
};
use crate::cooldown::{CooldownPolicy, CooldownState, CooldownStatus};
use crate::events::{LedgerEvent, SaleProceeds};
use crate::interfaces::{AdminAction, AdminGate, Asset, AssetTransfer, PriceAuthority};
use crate::ledger::LedgerState;
use crate::position::{AccrualRules, GlobalAggregates, StakingPosition};
use crate::rate_table::{RewardRateTable, TierQuote};
use crate::referral::ReferralNode;
use crate::sale::{plan_sale, Allocation, PriceSource};

/// Configuration plus state, exported and imported as one document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub config: LedgerConfig,
    pub state: LedgerState,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error(format!("snapshot encoding failed: {}", e)))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| config_error(format!("invalid snapshot: {}", e)))
    }
}

/// Which pending balance a reward claim draws from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingBalance {
    Reward,
    Referral,
}

impl PendingBalance {
    fn operation(self) -> OperationKind {
        match self {
            Self::Reward => OperationKind::ClaimReward,
            Self::Referral => OperationKind::ClaimReferralReward,
        }
    }
}

struct EngineInner {
    config: LedgerConfig,
    state: LedgerState,
}

impl EngineInner {
    fn rules(&self) -> AccrualRules {
        AccrualRules::from_config(&self.config)
    }

    /// Tier quote for `account` holding `principal`
    fn quote(&self, account: &AccountId, principal: Amount) -> Result<TierQuote> {
        let table = RewardRateTable::from_config(&self.config)?;
        Ok(table.lookup(principal, self.config.investor_rates.get(account)))
    }

    fn check_cooldown(
        &self,
        account: &AccountId,
        kind: OperationKind,
        now: Timestamp,
    ) -> Result<()> {
        CooldownPolicy::new(&self.config.cooldowns).check(&self.state.cooldowns, account, kind, now)
    }

    fn record_cooldown(&mut self, account: AccountId, kind: OperationKind, now: Timestamp) {
        let policy = CooldownPolicy::new(&self.config.cooldowns);
        policy.record(&mut self.state.cooldowns, account, kind, now);
    }

    fn check_cap(&self, amount: Amount, principal: Amount) -> Result<()> {
        match self.config.max_stake_position {
            Some(max) if principal > max => Err(LedgerError::invalid_amount(
                amount,
                format!("principal {} would exceed maximum position {}", principal, max),
            )),
            _ => Ok(()),
        }
    }

    /// Referrer to attach on this stake, if any. Unusable referrers are skipped.
    fn resolve_referrer(
        &self,
        account: &AccountId,
        requested: Option<AccountId>,
    ) -> Option<AccountId> {
        if self.state.tree.parent(account).is_some() {
            return None;
        }
        let candidate = requested.or(self.config.default_referrer)?;
        match self.state.tree.check_register(account, &candidate) {
            Ok(()) => Some(candidate),
            Err(err) => {
                warn!("Skipping referrer {} for {}: {}", candidate, account, err);
                None
            }
        }
    }

    /// Settle both pending balances of every position at `now`
    fn settle_all(&mut self, now: Timestamp) {
        let rules = self.rules();
        let accounts: Vec<AccountId> = self.state.accounts().map(|(id, _)| *id).collect();
        for account in &accounts {
            self.state.settle_reward(account, &rules, now);
            self.state.settle_referral_reward(account, &rules, now);
        }
        debug!("Settled {} positions at {}", accounts.len(), now);
    }

    /// Settle, re-rate and cascade `account` to `principal`
    fn reprice(&mut self, account: &AccountId, principal: Amount, rate_bps: u32, now: Timestamp) {
        let rules = self.rules();
        let EngineInner { config, state } = self;
        state.settle_reward(account, &rules, now);
        CascadeEngine::new(rules, &config.level_rates_bps)
            .reprice(state, account, principal, rate_bps, now);
    }
}

/// Tiered staking ledger with a multi-level referral cascade
pub struct StakingEngine {
    inner: RwLock<EngineInner>,
    clock: Arc<dyn TimeSource>,
    transfer: Arc<dyn AssetTransfer>,
    gate: Arc<dyn AdminGate>,
    authority: Arc<dyn PriceAuthority>,
}

impl StakingEngine {
    /// Create an empty ledger. Fails with `ConfigurationError` on an invalid config.
    pub fn new(
        config: LedgerConfig,
        clock: Arc<dyn TimeSource>,
        transfer: Arc<dyn AssetTransfer>,
        gate: Arc<dyn AdminGate>,
    ) -> Result<Self> {
        Self::from_snapshot(
            LedgerSnapshot {
                config,
                state: LedgerState::new(),
            },
            clock,
            transfer,
            gate,
        )
    }

    /// Resume a ledger from a snapshot
    pub fn from_snapshot(
        snapshot: LedgerSnapshot,
        clock: Arc<dyn TimeSource>,
        transfer: Arc<dyn AssetTransfer>,
        gate: Arc<dyn AdminGate>,
    ) -> Result<Self> {
        snapshot.config.validate()?;
        info!(
            "Ledger ready: {} tiers, {} referral levels, {} accounts",
            snapshot.config.tiers.len(),
            snapshot.config.referral_depth(),
            snapshot.state.account_count()
        );
        Ok(Self {
            inner: RwLock::new(EngineInner {
                config: snapshot.config,
                state: snapshot.state,
            }),
            clock,
            transfer,
            gate,
            authority: Arc::new(Ed25519PriceAuthority),
        })
    }

    /// Replace the signed-sell verifier
    pub fn with_price_authority(mut self, authority: Arc<dyn PriceAuthority>) -> Self {
        self.authority = authority;
        self
    }

    /// Run `op` under the write lock at the current time
    fn write_op<T>(
        &self,
        name: &str,
        account: &AccountId,
        op: impl FnOnce(&mut EngineInner, Timestamp) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.write();
        let now = self.clock.now();
        op(&mut *inner, now).map_err(|err| {
            warn!("Rejected {} for {}: {} (code {})", name, account, err, err.code());
            err
        })
    }

    fn admin_op<T>(
        &self,
        caller: &AccountId,
        action: AdminAction,
        op: impl FnOnce(&mut EngineInner, Timestamp) -> Result<T>,
    ) -> Result<T> {
        self.write_op(action.name(), caller, |inner, now| {
            if !self.gate.authorize(caller, action) {
                return Err(LedgerError::Unauthorized {
                    caller: *caller,
                    action: action.name().to_string(),
                });
            }
            let out = op(inner, now)?;
            inner.state.push_event(LedgerEvent::AdminApplied { action, by: *caller });
            info!("Admin {} applied by {}", action.name(), caller);
            Ok(out)
        })
    }

    fn update_config(
        &self,
        caller: &AccountId,
        action: AdminAction,
        mutate: impl FnOnce(&mut LedgerConfig),
    ) -> Result<()> {
        self.admin_op(caller, action, |inner, _now| {
            let mut next = inner.config.clone();
            mutate(&mut next);
            next.validate()?;
            inner.config = next;
            Ok(())
        })
    }

    // ========================================================================
    // Account operations
    // ========================================================================

    /// Deposit `amount`, optionally naming a referrer for a first registration
    pub fn stake(
        &self,
        account: AccountId,
        amount: Amount,
        referrer: Option<AccountId>,
    ) -> Result<()> {
        self.write_op("stake", &account, |inner, now| {
            if account.is_zero() {
                return Err(LedgerError::InvalidAccount(account));
            }
            if amount == 0 {
                return Err(LedgerError::invalid_amount(amount, "stake must be positive"));
            }
            if amount < inner.config.min_stake {
                return Err(LedgerError::invalid_amount(
                    amount,
                    format!("below minimum stake {}", inner.config.min_stake),
                ));
            }
            let principal = inner
                .state
                .position(&account)
                .principal
                .checked_add(amount)
                .ok_or_else(|| LedgerError::invalid_amount(amount, "principal overflow"))?;
            inner.check_cap(amount, principal)?;
            let quote = inner.quote(&account, principal)?;
            let referrer = inner.resolve_referrer(&account, referrer);
            self.transfer.transfer_in(&account, &Asset::Staking, amount)?;

            if let Some(referrer) = referrer {
                if let Err(err) = inner.state.link(account, referrer) {
                    warn!("Referral for {} not recorded: {}", account, err);
                }
            }
            inner.reprice(&account, principal, quote.rate_bps, now);
            let position = inner.state.position_mut(account);
            position.staked_at = now;
            position.lock_days = quote.lock_days;

            inner.state.push_event(LedgerEvent::Staked {
                account,
                amount,
                principal,
                rate_bps: quote.rate_bps,
                lock_days: quote.lock_days,
                at: now,
            });
            info!(
                "Staked {} for {}: principal {}, {} bps, {} day lock",
                amount, account, principal, quote.rate_bps, quote.lock_days
            );
            Ok(())
        })
    }

    /// Move `amount` of settled reward into principal
    pub fn reinvest(&self, account: AccountId, amount: Amount) -> Result<()> {
        self.write_op("reinvest", &account, |inner, now| {
            inner.check_cooldown(&account, OperationKind::Reinvest, now)?;
            if amount == 0 {
                return Err(LedgerError::invalid_amount(amount, "reinvest must be positive"));
            }
            let available = inner.state.preview_reward(&account, &inner.rules(), now);
            if amount > available {
                return Err(LedgerError::invalid_amount(
                    amount,
                    format!("exceeds pending reward {}", available),
                ));
            }
            let principal = inner
                .state
                .position(&account)
                .principal
                .checked_add(amount)
                .ok_or_else(|| LedgerError::invalid_amount(amount, "principal overflow"))?;
            inner.check_cap(amount, principal)?;
            let quote = inner.quote(&account, principal)?;

            let rules = inner.rules();
            inner.state.settle_reward(&account, &rules, now);
            let position = inner.state.position_mut(account);
            position.pending_reward = position.pending_reward.saturating_sub(amount);
            inner.reprice(&account, principal, quote.rate_bps, now);
            if inner.config.reinvest_policy == ReinvestPolicy::ResetLockEpoch {
                let position = inner.state.position_mut(account);
                position.staked_at = now;
                position.lock_days = quote.lock_days;
            }
            inner.record_cooldown(account, OperationKind::Reinvest, now);

            inner.state.push_event(LedgerEvent::Reinvested {
                account,
                amount,
                principal,
                rate_bps: quote.rate_bps,
                at: now,
            });
            info!("Reinvested {} for {}: principal {}", amount, account, principal);
            Ok(())
        })
    }

    /// Withdraw `amount` of principal once the lock period has elapsed
    pub fn claim(&self, account: AccountId, amount: Amount) -> Result<()> {
        self.write_op("claim", &account, |inner, now| {
            let position = inner.state.position(&account);
            if !position.is_unlocked(now) {
                return Err(LedgerError::LockNotElapsed {
                    unlocks_at: position.unlocks_at(),
                });
            }
            if amount == 0 || amount > position.principal {
                return Err(LedgerError::invalid_amount(
                    amount,
                    format!("must be between 1 and principal {}", position.principal),
                ));
            }
            let principal = position.principal - amount;
            let quote = inner.quote(&account, principal)?;
            self.transfer.transfer_out(&account, &Asset::Staking, amount)?;

            inner.reprice(&account, principal, quote.rate_bps, now);
            inner.state.push_event(LedgerEvent::Claimed {
                account,
                amount,
                principal,
                at: now,
            });
            info!("Claimed {} principal for {}: {} remains", amount, account, principal);
            Ok(())
        })
    }

    /// Pay out `amount` of plain reward; returns the amount released
    pub fn claim_reward(&self, account: AccountId, amount: Amount) -> Result<Amount> {
        self.write_op("claim_reward", &account, |inner, now| {
            self.claim_pending(inner, now, account, amount, PendingBalance::Reward, false)
        })
    }

    /// Pay out `amount` of referral reward; returns the amount released
    pub fn claim_referral_reward(&self, account: AccountId, amount: Amount) -> Result<Amount> {
        self.write_op("claim_referral_reward", &account, |inner, now| {
            self.claim_pending(inner, now, account, amount, PendingBalance::Referral, false)
        })
    }

    fn claim_pending(
        &self,
        inner: &mut EngineInner,
        now: Timestamp,
        account: AccountId,
        amount: Amount,
        balance: PendingBalance,
        forced: bool,
    ) -> Result<Amount> {
        let kind = balance.operation();
        if !forced {
            inner.check_cooldown(&account, kind, now)?;
        }
        if amount == 0 {
            return Err(LedgerError::invalid_amount(amount, "claim must be positive"));
        }
        let rules = inner.rules();
        let (available, rate, payout_asset) = match balance {
            PendingBalance::Reward => (
                inner.state.preview_reward(&account, &rules, now),
                inner.config.reward_payout_rate,
                Asset::RewardPayout,
            ),
            PendingBalance::Referral => (
                inner.state.preview_referral_reward(&account, &rules, now),
                inner.config.referral_payout_rate,
                Asset::ReferralPayout,
            ),
        };
        if amount > available {
            return Err(LedgerError::invalid_amount(
                amount,
                format!("exceeds pending {} {}", kind.name(), available),
            ));
        }
        let (asset, paid_out) = match rate {
            Some(rate) => (payout_asset, rate.convert(amount)),
            None => (Asset::Staking, amount),
        };
        if paid_out == 0 {
            return Err(LedgerError::invalid_amount(amount, "converts to a zero payout"));
        }
        self.transfer.transfer_out(&account, &asset, paid_out)?;

        let event = match balance {
            PendingBalance::Reward => {
                inner.state.settle_reward(&account, &rules, now);
                let position = inner.state.position_mut(account);
                position.pending_reward = position.pending_reward.saturating_sub(amount);
                LedgerEvent::RewardClaimed {
                    account,
                    amount,
                    paid_out,
                    at: now,
                }
            }
            PendingBalance::Referral => {
                inner.state.settle_referral_reward(&account, &rules, now);
                let position = inner.state.position_mut(account);
                position.pending_referral_reward =
                    position.pending_referral_reward.saturating_sub(amount);
                LedgerEvent::ReferralRewardClaimed {
                    account,
                    amount,
                    paid_out,
                    at: now,
                }
            }
        };
        if !forced {
            inner.record_cooldown(account, kind, now);
        }
        inner.state.push_event(event);
        info!("Paid {} {} ({} of {}) to {}", kind.name(), paid_out, amount, asset, account);
        Ok(paid_out)
    }

    /// Sell up to half of principal into auxiliary instruments at configured prices
    pub fn sell(
        &self,
        account: AccountId,
        amount: Amount,
        allocations: &[Allocation],
    ) -> Result<Vec<SaleProceeds>> {
        self.write_op("sell", &account, |inner, now| {
            inner.check_cooldown(&account, OperationKind::Sell, now)?;
            let principal = inner.state.position(&account).principal;
            let limit = principal / 2;
            if amount == 0 || amount > limit {
                return Err(LedgerError::invalid_amount(
                    amount,
                    format!("must be between 1 and half of principal ({})", limit),
                ));
            }
            let proceeds = plan_sale(
                amount,
                allocations,
                &inner.config.instruments,
                PriceSource::Configured,
            )?;
            self.finish_sale(inner, now, account, amount, proceeds, None)
        })
    }

    /// Sell any part of principal at prices signed by the configured price signer
    pub fn sell_authorized(
        &self,
        account: AccountId,
        amount: Amount,
        allocations: &[Allocation],
        prices: &[Amount],
        nonce: u64,
        signature: &[u8],
    ) -> Result<Vec<SaleProceeds>> {
        self.write_op("sell_authorized", &account, |inner, now| {
            inner.check_cooldown(&account, OperationKind::Sell, now)?;
            let principal = inner.state.position(&account).principal;
            if amount == 0 || amount > principal {
                return Err(LedgerError::invalid_amount(
                    amount,
                    format!("must be between 1 and principal {}", principal),
                ));
            }
            let last = inner.state.nonce(&account);
            if nonce <= last {
                return Err(LedgerError::StaleNonce { nonce, last });
            }
            let signer = inner
                .config
                .price_signer
                .ok_or(LedgerError::UnauthorizedSignature(account))?;
            let authorization = SellAuthorization {
                caller: account,
                amount,
                instruments: allocations.iter().map(|a| a.instrument.clone()).collect(),
                prices: prices.to_vec(),
                nonce,
            };
            if !self.authority.verify(&signer, &authorization, signature) {
                return Err(LedgerError::UnauthorizedSignature(account));
            }
            let proceeds = plan_sale(
                amount,
                allocations,
                &inner.config.instruments,
                PriceSource::Signed(prices),
            )?;
            let signed = Some((nonce, signer.account_id()));
            self.finish_sale(inner, now, account, amount, proceeds, signed)
        })
    }

    fn finish_sale(
        &self,
        inner: &mut EngineInner,
        now: Timestamp,
        account: AccountId,
        amount: Amount,
        proceeds: Vec<SaleProceeds>,
        signed: Option<(u64, AccountId)>,
    ) -> Result<Vec<SaleProceeds>> {
        let principal = inner.state.position(&account).principal - amount;
        let quote = inner.quote(&account, principal)?;
        let payouts: Vec<(Asset, Amount)> = proceeds
            .iter()
            .map(|p| (Asset::Instrument(p.instrument.clone()), p.units))
            .collect();
        self.transfer.transfer_out_batch(&account, &payouts)?;

        inner.reprice(&account, principal, quote.rate_bps, now);
        inner.record_cooldown(account, OperationKind::Sell, now);
        if let Some((nonce, signer)) = signed {
            inner.state.consume_nonce(account, nonce);
            debug!("Consumed nonce {} for {} (signer {})", nonce, account, signer);
        }
        inner.state.push_event(LedgerEvent::Sold {
            account,
            amount,
            proceeds: proceeds.clone(),
            authorized_by: signed.map(|(_, signer)| signer),
            at: now,
        });
        info!(
            "Sold {} of {} principal into {} instruments: {} remains",
            amount,
            account,
            proceeds.len(),
            principal
        );
        Ok(proceeds)
    }

    /// Attach `account` under `referrer` without staking.
    ///
    /// No inflow moves on registration. An account that already holds
    /// principal therefore joins without crediting its new ancestors, and
    /// when it later exits the clamped cascade can wipe credit those
    /// ancestors earned from other referees.
    pub fn register_referral(&self, account: AccountId, referrer: AccountId) -> Result<()> {
        self.write_op("register_referral", &account, |inner, _now| {
            inner.state.link(account, referrer)
        })
    }

    // ========================================================================
    // Admin operations
    // ========================================================================

    /// Replace the tier table. Existing positions keep their rate until their next re-pricing.
    pub fn set_tier_table(&self, caller: &AccountId, tiers: Vec<RewardTier>) -> Result<()> {
        self.update_config(caller, AdminAction::SetTierTable, |config| config.tiers = tiers)
    }

    pub fn set_level_rates(&self, caller: &AccountId, level_rates_bps: Vec<u32>) -> Result<()> {
        self.update_config(caller, AdminAction::SetLevelRates, |config| {
            config.level_rates_bps = level_rates_bps
        })
    }

    pub fn set_stake_bounds(
        &self,
        caller: &AccountId,
        min_stake: Amount,
        max_stake_position: Option<Amount>,
    ) -> Result<()> {
        self.update_config(caller, AdminAction::SetStakeBounds, |config| {
            config.min_stake = min_stake;
            config.max_stake_position = max_stake_position;
        })
    }

    /// Configure (or remove with `None`) an auxiliary instrument
    pub fn set_instrument(
        &self,
        caller: &AccountId,
        instrument: &str,
        settings: Option<InstrumentConfig>,
    ) -> Result<()> {
        self.update_config(caller, AdminAction::SetInstrument, |config| match settings {
            Some(settings) => {
                config.instruments.insert(instrument.to_string(), settings);
            }
            None => {
                config.instruments.remove(instrument);
            }
        })
    }

    pub fn set_cooldown_windows(&self, caller: &AccountId, windows: CooldownWindows) -> Result<()> {
        self.update_config(caller, AdminAction::SetCooldownWindows, |config| {
            config.cooldowns = windows
        })
    }

    /// Stop (or with `None` resume) all accrual at `stop_time`.
    ///
    /// Every position is settled under the previous stop time first, so the
    /// change applies from now to all accounts alike. A paused period is not
    /// paid out when accrual resumes.
    pub fn set_reward_stop_time(
        &self,
        caller: &AccountId,
        stop_time: Option<Timestamp>,
    ) -> Result<()> {
        self.admin_op(caller, AdminAction::SetRewardStopTime, |inner, now| {
            let mut next = inner.config.clone();
            next.reward_stop_time = stop_time;
            next.validate()?;
            inner.settle_all(now);
            inner.config = next;
            Ok(())
        })
    }

    pub fn set_price_signer(&self, caller: &AccountId, signer: Option<SignerKey>) -> Result<()> {
        self.update_config(caller, AdminAction::SetPriceSigner, |config| {
            config.price_signer = signer
        })
    }

    pub fn set_default_referrer(
        &self,
        caller: &AccountId,
        referrer: Option<AccountId>,
    ) -> Result<()> {
        self.update_config(caller, AdminAction::SetDefaultReferrer, |config| {
            config.default_referrer = referrer
        })
    }

    pub fn set_payout_rates(
        &self,
        caller: &AccountId,
        reward: Option<ExchangeRate>,
        referral: Option<ExchangeRate>,
    ) -> Result<()> {
        self.update_config(caller, AdminAction::SetPayoutRates, |config| {
            config.reward_payout_rate = reward;
            config.referral_payout_rate = referral;
        })
    }

    /// Grant or clear an investor rate override and re-price the account at once
    pub fn set_investor_rate(
        &self,
        caller: &AccountId,
        account: AccountId,
        rate: Option<InvestorRate>,
    ) -> Result<()> {
        self.admin_op(caller, AdminAction::SetInvestorRate, |inner, now| {
            if account.is_zero() {
                return Err(LedgerError::InvalidAccount(account));
            }
            let mut next = inner.config.clone();
            match rate {
                Some(rate) => {
                    next.investor_rates.insert(account, rate);
                }
                None => {
                    next.investor_rates.remove(&account);
                }
            }
            next.validate()?;
            let principal = inner.state.position(&account).principal;
            let quote = RewardRateTable::from_config(&next)?
                .lookup(principal, next.investor_rates.get(&account));

            inner.config = next;
            inner.reprice(&account, principal, quote.rate_bps, now);
            inner.state.position_mut(account).lock_days = quote.lock_days;
            inner.state.push_event(LedgerEvent::InvestorRateChanged {
                account,
                rate_bps: rate.map(|r| r.rate_bps),
            });
            Ok(())
        })
    }

    /// Claim plain reward on behalf of `account`, bypassing its cooldown
    pub fn force_claim_reward(
        &self,
        caller: &AccountId,
        account: AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        self.admin_op(caller, AdminAction::ForceClaim, |inner, now| {
            self.claim_pending(inner, now, account, amount, PendingBalance::Reward, true)
        })
    }

    /// Claim referral reward on behalf of `account`, bypassing its cooldown
    pub fn force_claim_referral_reward(
        &self,
        caller: &AccountId,
        account: AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        self.admin_op(caller, AdminAction::ForceClaim, |inner, now| {
            self.claim_pending(inner, now, account, amount, PendingBalance::Referral, true)
        })
    }

    /// Detach `account` from its referrer.
    ///
    /// Inflow already propagated to the former ancestors is not retracted.
    pub fn unlink(&self, caller: &AccountId, account: AccountId) -> Result<AccountId> {
        self.admin_op(caller, AdminAction::Unlink, |inner, _now| inner.state.unlink(account))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn position(&self, account: &AccountId) -> StakingPosition {
        self.inner.read().state.position(account)
    }

    /// Every touched position, ordered by account
    pub fn positions(&self) -> Vec<(AccountId, StakingPosition)> {
        let inner = self.inner.read();
        let mut positions: Vec<_> = inner
            .state
            .accounts()
            .map(|(id, p)| (*id, p.clone()))
            .collect();
        positions.sort_by_key(|(id, _)| *id);
        positions
    }

    /// Pending plus not-yet-settled plain reward
    pub fn preview_reward(&self, account: &AccountId) -> Amount {
        let inner = self.inner.read();
        inner.state.preview_reward(account, &inner.rules(), self.clock.now())
    }

    /// Pending plus not-yet-settled referral reward
    pub fn preview_referral_reward(&self, account: &AccountId) -> Amount {
        let inner = self.inner.read();
        inner
            .state
            .preview_referral_reward(account, &inner.rules(), self.clock.now())
    }

    pub fn referral_node(&self, account: &AccountId) -> ReferralNode {
        self.inner
            .read()
            .state
            .tree
            .node(account)
            .cloned()
            .unwrap_or_default()
    }

    pub fn active_referee_count(&self, account: &AccountId) -> usize {
        self.inner.read().state.active_referee_count(account)
    }

    /// Last consumed signed-sell nonce
    pub fn nonce(&self, account: &AccountId) -> u64 {
        self.inner.read().state.nonce(account)
    }

    pub fn cooldown_status(&self, account: &AccountId, kind: OperationKind) -> CooldownStatus {
        let inner = self.inner.read();
        let policy = CooldownPolicy::new(&inner.config.cooldowns);
        policy.status(&inner.state.cooldowns, account, kind, self.clock.now())
    }

    /// Last-performed timestamps of every cooldown-gated operation
    pub fn cooldown_state(&self, account: &AccountId) -> CooldownState {
        self.inner.read().state.cooldowns.state(account)
    }

    pub fn aggregates(&self) -> GlobalAggregates {
        self.inner.read().state.aggregates.clone()
    }

    pub fn config(&self) -> LedgerConfig {
        self.inner.read().config.clone()
    }

    /// Take every event recorded since the last drain.
    ///
    /// The engine never discards events on its own; a host that does not
    /// drain them keeps every event in memory.
    pub fn drain_events(&self) -> Vec<LedgerEvent> {
        self.inner.write().state.drain_events()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let inner = self.inner.read();
        LedgerSnapshot {
            config: inner.config.clone(),
            state: inner.state.clone(),
        }
    }
}
