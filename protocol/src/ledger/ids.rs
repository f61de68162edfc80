//! # Identifiers
//!
//! Two 32-byte handles identify everything the ledger tracks:
//!
//! - [`Address`] names a principal. The all-zero address is the null
//!   identity and can never hold or receive value.
//! - [`AssetId`] names an asset. The all-zero id is reserved for the native
//!   asset; token ids are content-addressed BLAKE3 hashes of the symbol, so
//!   the same symbol always maps to the same id without a registry.
//!
//! Both serialize as lowercase hex strings, which keeps them usable as JSON
//! map keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Domain separator mixed into address derivation so that an address and
/// an asset id derived from the same label never collide.
const ADDRESS_DOMAIN: &[u8] = b"strongbox/address\x00";

/// Domain separator for asset id derivation.
const ASSET_DOMAIN: &[u8] = b"strongbox/asset\x00";

fn parse_hex32(s: &str) -> Result<[u8; 32], hex::FromHexError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

fn derive32(domain: &[u8], label: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(label.as_bytes());
    *hasher.finalize().as_bytes()
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A principal's identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// The null identity.
    pub const ZERO: Address = Address([0u8; 32]);

    /// Creates an address from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derives a deterministic address from a human-readable label.
    ///
    /// Used by tooling and tests to refer to principals as `"alice"` rather
    /// than 64 hex characters.
    pub fn from_label(label: &str) -> Self {
        Self(derive32(ADDRESS_DOMAIN, label))
    }

    /// Returns the raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns `true` for the null identity.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Returns the hex-encoded address.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded address.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        parse_hex32(s).map(Self)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// An asset handle. [`AssetId::NATIVE`] is the native value asset; every
/// other id is a fungible token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId([u8; 32]);

impl AssetId {
    /// The reserved native-asset identifier.
    pub const NATIVE: AssetId = AssetId([0u8; 32]);

    /// Creates an asset id from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derives the token id for a symbol. Symbols are case-insensitive:
    /// `"usdc"` and `"USDC"` name the same token.
    pub fn derive(symbol: &str) -> Self {
        Self(derive32(ASSET_DOMAIN, &symbol.to_uppercase()))
    }

    /// Returns `true` for the native asset.
    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }

    /// Returns the raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the hex-encoded id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded id.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        parse_hex32(s).map(Self)
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "AssetId(native)")
        } else {
            write!(f, "AssetId({}...)", &self.to_hex()[..12])
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for AssetId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
