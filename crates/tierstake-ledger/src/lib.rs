//! # Tierstake Ledger - Tiered Staking & Referral Rewards
//!
//! Accounts deposit a base asset, accrue a tiered monthly reward, and pass a
//! fraction of that reward up a multi-level referral tree.
//!
//! ## Key Features
//!
//! - **Tiered rates**: stake size selects a monthly rate and a lock period
//! - **Lazy accrual**: rewards are settled on demand, never by a scheduler
//! - **Referral cascade**: every re-pricing moves up to ten ancestors' inflow
//! - **Cooldowns**: per-account spacing between claim-type operations
//! - **Signed sells**: off-chain price authorizations with replay nonces
//!
//! ## Reward Tiers (default)
//!
//! | Principal | Monthly Rate | Lock |
//! |-----------|--------------|------|
//! | 0 | 8% | 90 days |
//! | 5,000,000 | 10% | 120 days |
//! | 25,000,000 | 12% | 180 days |
//! | 125,000,000 | 14% | 270 days |
//!
//! ## Referral Levels (default)
//!
//! ```text
//!   A ── 2.5% of D's daily reward
//!   └─ B ── 5%
//!      └─ C ── 10%
//!         └─ D  (stakes)
//! ```

pub mod authority;
pub mod cascade;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod events;
pub mod interfaces;
pub mod ledger;
pub mod position;
pub mod rate_table;
pub mod referral;
pub mod sale;

// Re-exports
pub use authority::{Ed25519PriceAuthority, SellAuthorization, SignerKey};
pub use cascade::CascadeEngine;
pub use config::{
    CooldownWindows, ExchangeRate, InstrumentConfig, InvestorRate, LedgerConfig, OverrideLockPolicy,
    ReinvestPolicy, RewardTier,
};
pub use cooldown::{CooldownBook, CooldownPolicy, CooldownState, CooldownStatus};
pub use engine::{LedgerSnapshot, StakingEngine};
pub use events::{LedgerEvent, SaleProceeds};
pub use interfaces::{
    AdminAction, AdminGate, AllowAll, Asset, AssetTransfer, PriceAuthority, RecordingTransfer,
    SingleAdmin, TransferDirection, TransferRecord,
};
pub use ledger::LedgerState;
pub use position::{AccrualRules, GlobalAggregates, StakingPosition};
pub use rate_table::{RewardRateTable, TierQuote};
pub use referral::{ReferralNode, ReferralTree};
pub use sale::{plan_sale, Allocation, PriceSource};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::LedgerConfig;
    pub use crate::engine::StakingEngine;
    pub use crate::interfaces::{AllowAll, Asset, RecordingTransfer, SingleAdmin};
    pub use crate::sale::Allocation;
    pub use tierstake_core::prelude::*;
}
