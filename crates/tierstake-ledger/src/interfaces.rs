//! External collaborators
//!
//! The ledger never moves tokens, checks signatures or authenticates
//! administrators itself. It calls into these traits, which the host wires
//! up at construction.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tierstake_core::{AccountId, Amount, InstrumentId, LedgerError, Result};

use crate::authority::{SellAuthorization, SignerKey};

/// Asset moved by an [`AssetTransfer`]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Asset {
    /// The staked base asset
    Staking,
    /// External unit plain rewards are paid in when a rate is configured
    RewardPayout,
    /// External unit referral rewards are paid in when a rate is configured
    ReferralPayout,
    /// Auxiliary sell instrument
    Instrument(InstrumentId),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staking => write!(f, "staking"),
            Self::RewardPayout => write!(f, "reward-payout"),
            Self::ReferralPayout => write!(f, "referral-payout"),
            Self::Instrument(id) => write!(f, "instrument:{}", id),
        }
    }
}

/// Custody of the underlying assets
pub trait AssetTransfer: Send + Sync {
    /// Pull `amount` of `asset` from `from` into ledger custody
    fn transfer_in(&self, from: &AccountId, asset: &Asset, amount: Amount) -> Result<()>;

    /// Release `amount` of `asset` to `to`
    fn transfer_out(&self, to: &AccountId, asset: &Asset, amount: Amount) -> Result<()>;

    /// Release several assets in one call.
    ///
    /// The engine treats an `Err` as "nothing was released" and leaves its
    /// state untouched, so the batch must be all-or-nothing. The default
    /// sends one transfer at a time and is only correct for custodians whose
    /// `transfer_out` cannot fail after an earlier one in the batch
    /// succeeded; any other implementor must override it.
    fn transfer_out_batch(&self, to: &AccountId, payouts: &[(Asset, Amount)]) -> Result<()> {
        for (asset, amount) in payouts {
            self.transfer_out(to, asset, *amount)?;
        }
        Ok(())
    }
}

/// Verifier for signed sell authorizations
pub trait PriceAuthority: Send + Sync {
    fn verify(
        &self,
        signer: &SignerKey,
        authorization: &SellAuthorization,
        signature: &[u8],
    ) -> bool;
}

/// Administrative capability
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    SetTierTable,
    SetLevelRates,
    SetStakeBounds,
    SetInstrument,
    SetCooldownWindows,
    SetRewardStopTime,
    SetInvestorRate,
    SetPriceSigner,
    SetDefaultReferrer,
    SetPayoutRates,
    ForceClaim,
    Unlink,
}

impl AdminAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetTierTable => "set_tier_table",
            Self::SetLevelRates => "set_level_rates",
            Self::SetStakeBounds => "set_stake_bounds",
            Self::SetInstrument => "set_instrument",
            Self::SetCooldownWindows => "set_cooldown_windows",
            Self::SetRewardStopTime => "set_reward_stop_time",
            Self::SetInvestorRate => "set_investor_rate",
            Self::SetPriceSigner => "set_price_signer",
            Self::SetDefaultReferrer => "set_default_referrer",
            Self::SetPayoutRates => "set_payout_rates",
            Self::ForceClaim => "force_claim",
            Self::Unlink => "unlink",
        }
    }
}

/// Access control for configuration mutators
pub trait AdminGate: Send + Sync {
    fn authorize(&self, caller: &AccountId, action: AdminAction) -> bool;
}

/// One administrator holds every capability
#[derive(Clone, Copy, Debug)]
pub struct SingleAdmin {
    admin: AccountId,
}

impl SingleAdmin {
    pub fn new(admin: AccountId) -> Self {
        Self { admin }
    }
}

impl AdminGate for SingleAdmin {
    fn authorize(&self, caller: &AccountId, _action: AdminAction) -> bool {
        !caller.is_zero() && *caller == self.admin
    }
}

/// Every caller is an administrator (simulations)
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl AdminGate for AllowAll {
    fn authorize(&self, _caller: &AccountId, _action: AdminAction) -> bool {
        true
    }
}

/// Direction of a recorded movement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    In,
    Out,
}

/// A movement seen by [`RecordingTransfer`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub direction: TransferDirection,
    pub account: AccountId,
    pub asset: Asset,
    pub amount: Amount,
}

/// In-memory custody that records every movement
///
/// Can be switched into a failing mode to exercise rollback paths.
#[derive(Default)]
pub struct RecordingTransfer {
    records: Mutex<Vec<TransferRecord>>,
    failing: AtomicBool,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent transfer fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<TransferRecord> {
        self.records.lock().clone()
    }

    /// Net amount of `asset` paid out to `account`
    pub fn total_out(&self, account: &AccountId, asset: &Asset) -> Amount {
        self.records
            .lock()
            .iter()
            .filter(|r| {
                r.direction == TransferDirection::Out && r.account == *account && r.asset == *asset
            })
            .map(|r| r.amount)
            .sum()
    }

    fn record(
        &self,
        direction: TransferDirection,
        account: &AccountId,
        asset: &Asset,
        amount: Amount,
    ) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::TransferFailed(format!(
                "{:?} {} {} for {} rejected",
                direction, amount, asset, account
            )));
        }
        self.records.lock().push(TransferRecord {
            direction,
            account: *account,
            asset: asset.clone(),
            amount,
        });
        Ok(())
    }
}

impl AssetTransfer for RecordingTransfer {
    fn transfer_in(&self, from: &AccountId, asset: &Asset, amount: Amount) -> Result<()> {
        self.record(TransferDirection::In, from, asset, amount)
    }

    fn transfer_out(&self, to: &AccountId, asset: &Asset, amount: Amount) -> Result<()> {
        self.record(TransferDirection::Out, to, asset, amount)
    }

    // All-or-nothing: check the mode once, then record the whole batch.
    fn transfer_out_batch(&self, to: &AccountId, payouts: &[(Asset, Amount)]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::TransferFailed(format!(
                "batch of {} payouts for {} rejected",
                payouts.len(),
                to
            )));
        }
        let mut records = self.records.lock();
        for (asset, amount) in payouts {
            records.push(TransferRecord {
                direction: TransferDirection::Out,
                account: *to,
                asset: asset.clone(),
                amount: *amount,
            });
        }
        Ok(())
    }
}
