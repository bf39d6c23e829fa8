use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Digits of the booking phone number a customer looks their visit up with
pub const PHONE_SUFFIX_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("예약하신 전화번호 뒷자리 4자리를 입력해주세요.")]
pub struct InvalidPhoneSuffix;

/// Last four digits of the phone number the visit was booked with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneSuffix(String);

impl PhoneSuffix {
    /// Surrounding whitespace is ignored, anything but exactly four ASCII
    /// digits is refused
    pub fn parse(raw: &str) -> Result<Self, InvalidPhoneSuffix> {
        let raw = raw.trim();
        if raw.len() == PHONE_SUFFIX_LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidPhoneSuffix)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PhoneSuffix {
    type Err = InvalidPhoneSuffix;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneSuffix {
    type Error = InvalidPhoneSuffix;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneSuffix> for String {
    fn from(value: PhoneSuffix) -> Self {
        value.0
    }
}

impl fmt::Display for PhoneSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_four_digits() {
        assert_eq!(PhoneSuffix::parse("1234").unwrap().as_str(), "1234");
        assert_eq!(PhoneSuffix::parse(" 0990 ").unwrap().as_str(), "0990");
    }

    #[test]
    fn test_refuses_everything_else() {
        for raw in ["", "   ", "123", "12345", "12a4", "１２３４", "12 4", "-123"] {
            assert_eq!(
                PhoneSuffix::parse(raw),
                Err(InvalidPhoneSuffix),
                "Accepted {raw:?}"
            );
        }
    }

    #[test]
    fn test_deserialize_checks_digits() {
        let ok: PhoneSuffix = serde_json::from_str("\"5678\"").unwrap();
        assert_eq!(ok.to_string(), "5678");
        assert!(serde_json::from_str::<PhoneSuffix>("\"56\"").is_err());
    }
}
