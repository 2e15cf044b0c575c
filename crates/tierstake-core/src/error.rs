//! Error types for Tierstake ledger operations

use crate::types::{AccountId, Amount, InstrumentId, Timestamp};
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Which time-gated operation a cooldown applies to
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Reinvest,
    ClaimReward,
    ClaimReferralReward,
    Sell,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        Self::Reinvest,
        Self::ClaimReward,
        Self::ClaimReferralReward,
        Self::Sell,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Reinvest => "reinvest",
            Self::ClaimReward => "claim_reward",
            Self::ClaimReferralReward => "claim_referral_reward",
            Self::Sell => "sell",
        }
    }
}

/// Errors that can occur in ledger operations
///
/// Every variant is detected before the first state write, so a returned
/// error always means the ledger is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Amount validation ===
    /// Zero, below minimum, above cap, or more than is available
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Amount, reason: String },

    /// Instrument has no configured price or minimum
    #[error("Instrument not configured: {0}")]
    InvalidInstrument(InstrumentId),

    // === Time gating ===
    /// Principal is still inside its lock period
    #[error("Lock period not elapsed: unlocks at {unlocks_at}")]
    LockNotElapsed { unlocks_at: Timestamp },

    /// Operation attempted inside its cooldown window
    #[error("Cooldown active for {}: ready at {until}", .kind.name())]
    CooldownActive { kind: OperationKind, until: Timestamp },

    // === Referral graph ===
    /// Registration would create a cycle
    #[error("Circular referral: {referrer} descends from {account}")]
    CircularReference {
        account: AccountId,
        referrer: AccountId,
    },

    /// Account already has a referrer
    #[error("Account already registered: {0}")]
    AlreadyRegistered(AccountId),

    /// Account has no referrer
    #[error("Account not registered: {0}")]
    NotRegistered(AccountId),

    /// The all-zero unset sentinel
    #[error("Invalid account: {0}")]
    InvalidAccount(AccountId),

    // === Authorization ===
    /// Price authority rejected the signature
    #[error("Unauthorized signature for {0}")]
    UnauthorizedSignature(AccountId),

    /// Nonce not strictly greater than the last consumed one
    #[error("Stale nonce {nonce}: last consumed {last}")]
    StaleNonce { nonce: u64, last: u64 },

    /// Admin gate denied the caller
    #[error("Unauthorized admin action {action} by {caller}")]
    Unauthorized { caller: AccountId, action: String },

    // === Configuration / collaborators ===
    /// Malformed configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// External asset transfer failed
    #[error("Asset transfer failed: {0}")]
    TransferFailed(String),
}

impl LedgerError {
    /// Shorthand for amount validation failures
    pub fn invalid_amount(amount: Amount, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            amount,
            reason: reason.into(),
        }
    }

    /// Stable numeric code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidAmount { .. } => 1001,
            Self::InvalidInstrument(_) => 1002,
            Self::LockNotElapsed { .. } => 2001,
            Self::CooldownActive { .. } => 2002,
            Self::CircularReference { .. } => 3001,
            Self::AlreadyRegistered(_) => 3002,
            Self::NotRegistered(_) => 3003,
            Self::InvalidAccount(_) => 3004,
            Self::UnauthorizedSignature(_) => 4001,
            Self::StaleNonce { .. } => 4002,
            Self::Unauthorized { .. } => 4003,
            Self::ConfigurationError(_) => 5001,
            Self::TransferFailed(_) => 5002,
        }
    }

    /// Whether retrying later (without changing the request) can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LockNotElapsed { .. } | Self::CooldownActive { .. } | Self::TransferFailed(_)
        )
    }
}
