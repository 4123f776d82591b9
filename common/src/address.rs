// common/src/address.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// Length of an account address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// A wallet address, normalized to lower-case `0x`-prefixed hex.
///
/// Two spellings of the same account (checksummed or not) compare equal
/// once parsed, so the address can be used directly as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address string
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(trimmed.to_string()))?;

        if body.len() != ADDRESS_LENGTH * 2 {
            return Err(AddressError::InvalidLength {
                address: trimmed.to_string(),
                length: body.len(),
            });
        }

        hex::decode(body).map_err(|_| AddressError::InvalidHex(trimmed.to_string()))?;

        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
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
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let checksummed = Address::parse("0x71C7656EC7ab88b098defB751B7401B5f6d8976F").unwrap();
        let lower = Address::parse("0x71c7656ec7ab88b098defb751b7401b5f6d8976f").unwrap();
        assert_eq!(checksummed, lower);
        assert_eq!(lower.as_str(), "0x71c7656ec7ab88b098defb751b7401b5f6d8976f");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            Address::parse("71c7656ec7ab88b098defb751b7401b5f6d8976f"),
            Err(AddressError::MissingPrefix(_))
        ));
        assert!(matches!(
            Address::parse("0xabc"),
            Err(AddressError::InvalidLength { length: 3, .. })
        ));
        assert!(matches!(
            Address::parse("0xzzc7656ec7ab88b098defb751b7401b5f6d8976f"),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_serde_uses_plain_string() {
        let address = Address::parse("0x00000000000000000000000000000000000000aa").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"0x00000000000000000000000000000000000000aa\"");

        let bad: Result<Address, _> = serde_json::from_str("\"not-an-address\"");
        assert!(bad.is_err());
    }
}
