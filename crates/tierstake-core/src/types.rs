//! Core type definitions for Tierstake
//!
//! Account identities, amounts and timestamps shared by every ledger
//! component.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Amount in the staking asset's smallest unit
pub type Amount = u128;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Named auxiliary payout instrument
pub type InstrumentId = String;

/// AccountId - Opaque 32-byte account identity
///
/// The all-zero identity is the "unset" sentinel and is never a valid
/// participant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId {
    id: [u8; 32],
}

impl AccountId {
    /// Unset sentinel
    pub const ZERO: Self = Self { id: [0u8; 32] };

    pub fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    /// Identity bound to an Ed25519 public key
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"tierstake/key-id");
        hasher.update(public_key);
        Self::new(*hasher.finalize().as_bytes())
    }

    /// Derive a stable identity from a human label, for fixtures and scenarios
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        Self {
            id: *hash.as_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    pub fn is_zero(&self) -> bool {
        self.id == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut id = [0u8; 32];
        hex::decode_to_slice(s, &mut id)?;
        Ok(Self { id })
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

// Hex on the wire so identities can key TOML/JSON maps.
impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Amounts on the wire: integers while they fit in `u64`, decimal strings
/// beyond that, so `u128` values survive TOML as well as JSON.
pub mod amount_serde {
    use super::Amount;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(u64),
        Text(String),
    }

    impl Repr {
        fn into_amount<E: serde::de::Error>(self) -> Result<Amount, E> {
            match self {
                Repr::Int(value) => Ok(value as Amount),
                Repr::Text(text) => text.replace('_', "").parse().map_err(E::custom),
            }
        }
    }

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        match u64::try_from(*amount) {
            Ok(small) => serializer.serialize_u64(small),
            Err(_) => serializer.serialize_str(&amount.to_string()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        Repr::deserialize(deserializer)?.into_amount()
    }

    pub mod option {
        use super::{Amount, Repr};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            amount: &Option<Amount>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match amount {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Amount>, D::Error> {
            Option::<Repr>::deserialize(deserializer)?
                .map(Repr::into_amount)
                .transpose()
        }
    }
}

/// Protocol constants
pub mod constants {
    /// Basis-point denominator (100%)
    pub const BPS_DENOMINATOR: u128 = 10_000;

    /// Seconds in one accrual day
    pub const SECONDS_PER_DAY: i64 = 86_400;

    /// Default accrual days in one reward month
    pub const DAYS_PER_ACCRUAL_MONTH: u64 = 30;

    /// Upper bound on referral depth
    pub const MAX_REFERRAL_LEVELS: usize = 10;
}
