//! # Tierstake Core
//!
//! Core building blocks shared by the Tierstake ledger crates:
//! - `AccountId` - opaque 32-byte identity with a zero "unset" sentinel
//! - `LedgerError` - the single error taxonomy for every ledger operation
//! - `AccrualClock` - elapsed whole-day / whole-second arithmetic clipped at
//!   the reward-stop time
//! - `TimeSource` - wall clock abstraction (`SystemClock`, `ManualClock`)

pub mod clock;
pub mod error;
pub mod types;

pub use clock::*;
pub use error::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::{AccrualAnchor, AccrualClock, ManualClock, SystemClock, TimeSource};
    pub use crate::error::{LedgerError, OperationKind, Result};
    pub use crate::types::*;
}
