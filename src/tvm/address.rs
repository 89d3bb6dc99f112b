//! TON Address implementation
//!
//! An internal address is a workchain id plus a 256-bit account id. It has two
//! textual projections: raw (`workchain:hex`) and user-friendly (base64 of
//! tag, workchain, account id and a CRC16 checksum).

use crate::crc::CRC16;
use crate::tvm::error::{TvmError, TvmResult};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

/// Length of a decoded user-friendly address
const FRIENDLY_LEN: usize = 36;

fn invalid(reason: impl Into<String>) -> TvmError {
    TvmError::InvalidAddressFormat(reason.into())
}

/// Represents a TON blockchain address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// Workchain ID (-1 for masterchain, 0 for basechain)
    pub workchain: i8,
    /// 32-byte account id
    pub hash_part: [u8; 32],
}

/// Flags carried by the user-friendly form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressFlags {
    pub url_safe: bool,
    pub bounceable: bool,
    pub test_only: bool,
}

impl Default for AddressFlags {
    fn default() -> Self {
        Self {
            url_safe: true,
            bounceable: true,
            test_only: false,
        }
    }
}

impl Address {
    /// Creates a new address from workchain and hash part
    pub fn new(workchain: i8, hash_part: [u8; 32]) -> Self {
        Self {
            workchain,
            hash_part,
        }
    }

    /// Parses an address from string (supports both raw and user-friendly formats)
    pub fn parse(address: &str) -> TvmResult<Self> {
        if address.contains(':') {
            Self::from_raw(address)
        } else {
            Self::from_user_friendly(address).map(|(addr, _)| addr)
        }
    }

    /// Parses address from raw format: "workchain:hash"
    pub fn from_raw(address: &str) -> TvmResult<Self> {
        let (workchain, hash_hex) = address
            .split_once(':')
            .ok_or_else(|| invalid("missing workchain separator"))?;

        let workchain = workchain
            .parse::<i8>()
            .map_err(|e| invalid(format!("bad workchain: {e}")))?;

        if hash_hex.len() != 64 {
            return Err(invalid("account id must be 64 hex characters"));
        }

        let mut hash_part = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash_part)
            .map_err(|e| invalid(format!("bad account id: {e}")))?;

        Ok(Self::new(workchain, hash_part))
    }

    /// Parses address from user-friendly base64 format, returning its flags too
    pub fn from_user_friendly(address: &str) -> TvmResult<(Self, AddressFlags)> {
        if address.len() != 48 {
            return Err(invalid(format!(
                "user-friendly address must be 48 characters, got {}",
                address.len()
            )));
        }

        let url_safe = !address.contains(['+', '/']);
        let engine = if url_safe { &URL_SAFE_NO_PAD } else { &STANDARD_NO_PAD };
        let decoded = engine
            .decode(address)
            .map_err(|e| invalid(format!("bad base64: {e}")))?;

        if decoded.len() != FRIENDLY_LEN {
            return Err(invalid("decoded address must be 36 bytes"));
        }

        let expected_crc = &decoded[34..36];
        let actual_crc = CRC16.checksum(&decoded[..34]).to_be_bytes();
        if expected_crc != actual_crc {
            return Err(invalid("checksum mismatch"));
        }

        let mut tag = decoded[0];
        let test_only = tag & TAG_TEST_ONLY != 0;
        tag &= !TAG_TEST_ONLY;

        let bounceable = match tag {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            other => return Err(invalid(format!("unknown tag {other:#04x}"))),
        };

        let mut hash_part = [0u8; 32];
        hash_part.copy_from_slice(&decoded[2..34]);

        let flags = AddressFlags {
            url_safe,
            bounceable,
            test_only,
        };
        Ok((Self::new(decoded[1] as i8, hash_part), flags))
    }

    /// Converts to raw format (workchain:hash)
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash_part))
    }

    /// Converts to user-friendly base64 format
    pub fn to_user_friendly(&self, flags: AddressFlags) -> String {
        let mut tag = if flags.bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if flags.test_only {
            tag |= TAG_TEST_ONLY;
        }

        let mut data = Vec::with_capacity(FRIENDLY_LEN);
        data.push(tag);
        data.push(self.workchain as u8);
        data.extend_from_slice(&self.hash_part);
        data.extend_from_slice(&CRC16.checksum(&data).to_be_bytes());

        if flags.url_safe {
            URL_SAFE_NO_PAD.encode(&data)
        } else {
            STANDARD_NO_PAD.encode(&data)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_user_friendly(AddressFlags::default()))
    }
}

impl std::str::FromStr for Address {
    type Err = TvmError;

    fn from_str(s: &str) -> TvmResult<Self> {
        Address::parse(s.trim())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Address::parse(&text).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";
    const FRIENDLY: &str = "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N";

    #[test]
    fn test_address_raw() {
        let addr = Address::from_raw(RAW).unwrap();
        assert_eq!(addr.workchain, 0);
        assert_eq!(addr.to_raw(), RAW);
    }

    #[test]
    fn test_address_user_friendly() {
        let (addr, flags) = Address::from_user_friendly(FRIENDLY).unwrap();
        assert_eq!(addr, Address::from_raw(RAW).unwrap());
        assert!(flags.bounceable);
        assert!(!flags.test_only);
        assert_eq!(addr.to_user_friendly(flags), FRIENDLY);
        assert_eq!(addr.to_string(), FRIENDLY);
    }

    #[test]
    fn test_masterchain_round_trip() {
        let addr = Address::new(-1, [0x12; 32]);
        let flags = AddressFlags {
            url_safe: false,
            bounceable: false,
            test_only: true,
        };
        let text = addr.to_user_friendly(flags);
        let (parsed, parsed_flags) = Address::from_user_friendly(&text).unwrap();
        assert_eq!(parsed, addr);
        assert!(!parsed_flags.bounceable);
        assert!(parsed_flags.test_only);
        assert_eq!(Address::parse(&addr.to_raw()).unwrap(), addr);
        assert!(addr.to_raw().starts_with("-1:"));
    }

    #[test]
    fn test_zero_address_formats() {
        let zero_addr = Address::new(0, [0u8; 32]);

        assert_eq!(
            zero_addr.to_raw(),
            "0:0000000000000000000000000000000000000000000000000000000000000000"
        );
        assert_eq!(
            zero_addr.to_user_friendly(AddressFlags::default()),
            "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c"
        );
        assert_eq!(
            zero_addr.to_user_friendly(AddressFlags {
                bounceable: false,
                ..AddressFlags::default()
            }),
            "UQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAJKZ"
        );
    }

    #[test]
    fn test_invalid_checksum() {
        let mut broken = FRIENDLY.to_string();
        broken.replace_range(47..48, "M");
        assert!(matches!(
            Address::parse(&broken),
            Err(TvmError::InvalidAddressFormat(_))
        ));
    }

    #[test]
    fn test_invalid_length() {
        assert!(matches!(
            Address::parse("EQCD39VS5jcptHL8"),
            Err(TvmError::InvalidAddressFormat(_))
        ));
        assert!(matches!(
            Address::parse("0:83dfd552"),
            Err(TvmError::InvalidAddressFormat(_))
        ));
        assert!(matches!(
            Address::parse("zero:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8"),
            Err(TvmError::InvalidAddressFormat(_))
        ));
    }

    #[test]
    fn test_unknown_tag() {
        let addr = Address::new(0, [7u8; 32]);
        let mut data = vec![0x22u8, 0x00];
        data.extend_from_slice(&addr.hash_part);
        data.extend_from_slice(&CRC16.checksum(&data).to_be_bytes());
        let text = URL_SAFE_NO_PAD.encode(&data);

        let err = Address::from_user_friendly(&text).unwrap_err();
        assert!(err.to_string().contains("unknown tag"));
    }

    #[test]
    fn test_address_serde() {
        let addr: Address = serde_json::from_str(&format!("\"{FRIENDLY}\"")).unwrap();
        assert_eq!(serde_json::to_string(&addr).unwrap(), format!("\"{RAW}\""));
        assert!(serde_json::from_str::<Address>("\"nope\"").is_err());
    }
}
