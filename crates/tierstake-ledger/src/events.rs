//! Ledger notifications
//!
//! Every successful mutation appends one or more events to the ledger's
//! event log. Hosts drain the log after each call and forward it to
//! whatever indexer or audit trail they run.

use serde::{Deserialize, Serialize};
use tierstake_core::{amount_serde, AccountId, Amount, InstrumentId, Timestamp};

use crate::interfaces::AdminAction;

/// Something that happened to the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Staked {
        account: AccountId,
        #[serde(with = "amount_serde")]
        amount: Amount,
        #[serde(with = "amount_serde")]
        principal: Amount,
        rate_bps: u32,
        lock_days: u32,
        at: Timestamp,
    },
    Reinvested {
        account: AccountId,
        #[serde(with = "amount_serde")]
        amount: Amount,
        #[serde(with = "amount_serde")]
        principal: Amount,
        rate_bps: u32,
        at: Timestamp,
    },
    Claimed {
        account: AccountId,
        #[serde(with = "amount_serde")]
        amount: Amount,
        #[serde(with = "amount_serde")]
        principal: Amount,
        at: Timestamp,
    },
    RewardClaimed {
        account: AccountId,
        #[serde(with = "amount_serde")]
        amount: Amount,
        /// Amount released after exchange-rate conversion
        #[serde(with = "amount_serde")]
        paid_out: Amount,
        at: Timestamp,
    },
    ReferralRewardClaimed {
        account: AccountId,
        #[serde(with = "amount_serde")]
        amount: Amount,
        #[serde(with = "amount_serde")]
        paid_out: Amount,
        at: Timestamp,
    },
    Sold {
        account: AccountId,
        #[serde(with = "amount_serde")]
        amount: Amount,
        /// Instrument units released per instrument
        proceeds: Vec<SaleProceeds>,
        /// Identity of the price signer for signed sells
        authorized_by: Option<AccountId>,
        at: Timestamp,
    },
    ReferralRegistered {
        account: AccountId,
        referrer: AccountId,
    },
    ReferralRemoved {
        account: AccountId,
        former_referrer: AccountId,
    },
    ReferralRateChanged {
        account: AccountId,
        /// 1 = direct parent of the repriced account
        level: u8,
        #[serde(with = "amount_serde")]
        daily_inflow: Amount,
    },
    InvestorRateChanged {
        account: AccountId,
        rate_bps: Option<u32>,
    },
    AdminApplied {
        action: AdminAction,
        by: AccountId,
    },
}

/// Units of one instrument released by a sell
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleProceeds {
    pub instrument: InstrumentId,
    #[serde(with = "amount_serde")]
    pub units: Amount,
}

impl LedgerEvent {
    /// Account the event is about
    pub fn account(&self) -> AccountId {
        match self {
            Self::Staked { account, .. }
            | Self::Reinvested { account, .. }
            | Self::Claimed { account, .. }
            | Self::RewardClaimed { account, .. }
            | Self::ReferralRewardClaimed { account, .. }
            | Self::Sold { account, .. }
            | Self::ReferralRegistered { account, .. }
            | Self::ReferralRemoved { account, .. }
            | Self::ReferralRateChanged { account, .. }
            | Self::InvestorRateChanged { account, .. } => *account,
            Self::AdminApplied { by, .. } => *by,
        }
    }
}
