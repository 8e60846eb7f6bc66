use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Identity of a caller or account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::Parse {
                what: "address",
                input: value,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// Four-byte operation identifier derived from a function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector([u8; 4]);

impl Selector {
    /// Derive a selector from a signature such as `"collect(address,uint256)"`.
    ///
    /// The selector is the first four bytes of the SHA-256 digest of the
    /// signature text.
    pub fn from_signature(signature: &str) -> Self {
        let digest = Sha256::digest(signature.as_bytes());
        Self([digest[0], digest[1], digest[2], digest[3]])
    }

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse_err = || Error::Parse {
            what: "selector",
            input: s.to_string(),
        };
        let hex = s.strip_prefix("0x").ok_or_else(parse_err)?;
        if hex.len() != 8 || !hex.is_ascii() {
            return Err(parse_err());
        }
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| parse_err())?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Selector {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

/// Identifier of a validation function within one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(pub u8);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Indirect reference to a validation or hook predicate.
///
/// References never name a concrete module. Dependency references are
/// resolved by ordinal against the dependency table handed to the engine
/// on each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FunctionReference {
    /// A function implemented by the declaring module.
    Own { function: FunctionId },
    /// A function implemented by the dependency at `index`.
    Dependency { index: u8, function: FunctionId },
    /// Passes for every caller. Only meaningful as a validator.
    AlwaysAllow,
    /// Fails for every caller. Only meaningful as a hook.
    AlwaysDeny,
}

impl FunctionReference {
    pub const fn own(function: u8) -> Self {
        Self::Own {
            function: FunctionId(function),
        }
    }

    pub const fn dependency(index: u8, function: u8) -> Self {
        Self::Dependency {
            index,
            function: FunctionId(function),
        }
    }
}

impl fmt::Display for FunctionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Own { function } => write!(f, "own{function}"),
            Self::Dependency { index, function } => write!(f, "dependency[{index}]{function}"),
            Self::AlwaysAllow => f.write_str("always_allow"),
            Self::AlwaysDeny => f.write_str("always_deny"),
        }
    }
}

/// A module that supplies validation predicates to the engine.
///
/// Installed modules act as providers for their own wiring and for the
/// wiring of modules that declare them as dependencies.
pub trait CapabilityProvider {
    /// Interface name dependents declare, e.g. `"single-owner"`.
    fn interface(&self) -> &str;

    /// Whether `function` is a predicate this provider implements.
    fn exposes(&self, function: FunctionId) -> bool;

    /// Evaluate predicate `function` against `caller`.
    ///
    /// Unknown functions must return `false`.
    fn is_authorized(&self, function: FunctionId, caller: &Address) -> bool;
}
