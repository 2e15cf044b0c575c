//! Signed sell authorizations
//!
//! An off-chain price feed signs `(caller, amount, instruments, prices,
//! nonce)`. The signed message is a BLAKE3 digest over a domain tag and a
//! fixed-width encoding of those fields; [`Ed25519PriceAuthority`] checks an
//! Ed25519 signature over that digest.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tierstake_core::{AccountId, Amount, InstrumentId};

use crate::interfaces::PriceAuthority;

const SELL_DOMAIN: &[u8] = b"tierstake/sell-authorization/v1";

/// Public key of the price signer
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignerKey([u8; 32]);

impl SignerKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Ledger identity of this signer, as it appears in logs and events
    pub fn account_id(&self) -> AccountId {
        AccountId::from_public_key(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<&SigningKey> for SignerKey {
    fn from(key: &SigningKey) -> Self {
        Self(key.verifying_key().to_bytes())
    }
}

impl fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerKey({})", &self.to_hex()[..12])
    }
}

impl Serialize for SignerKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SignerKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The fields a price signer commits to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellAuthorization {
    pub caller: AccountId,
    pub amount: Amount,
    pub instruments: Vec<InstrumentId>,
    pub prices: Vec<Amount>,
    pub nonce: u64,
}

impl SellAuthorization {
    /// Canonical encoding: lengths are explicit so no two field lists collide
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SELL_DOMAIN.len() + 64 + self.prices.len() * 16);
        bytes.extend_from_slice(SELL_DOMAIN);
        bytes.extend_from_slice(self.caller.as_bytes());
        bytes.extend_from_slice(&self.amount.to_be_bytes());
        bytes.extend_from_slice(&(self.instruments.len() as u32).to_be_bytes());
        for instrument in &self.instruments {
            bytes.extend_from_slice(&(instrument.len() as u32).to_be_bytes());
            bytes.extend_from_slice(instrument.as_bytes());
        }
        bytes.extend_from_slice(&(self.prices.len() as u32).to_be_bytes());
        for price in &self.prices {
            bytes.extend_from_slice(&price.to_be_bytes());
        }
        bytes.extend_from_slice(&self.nonce.to_be_bytes());
        bytes
    }

    /// Message that is actually signed
    pub fn digest(&self) -> [u8; 32] {
        *blake3::hash(&self.to_bytes()).as_bytes()
    }

    /// Sign with an Ed25519 key (price-feed side)
    pub fn sign(&self, key: &SigningKey) -> [u8; 64] {
        key.sign(&self.digest()).to_bytes()
    }
}

/// Ed25519 verification of sell authorizations
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519PriceAuthority;

impl PriceAuthority for Ed25519PriceAuthority {
    fn verify(
        &self,
        signer: &SignerKey,
        authorization: &SellAuthorization,
        signature: &[u8],
    ) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify_strict(&authorization.digest(), &signature).is_ok()
    }
}
