use crate::error::Error;
use derive_more::Display;
use serde::Deserialize;
use std::convert::TryFrom;
use std::str::FromStr;

/// CTF reserved keywords, which are not valid identifiers.
const RESERVED_KEYWORDS: &[&str] = &[
    "align",
    "callsite",
    "const",
    "char",
    "clock",
    "double",
    "enum",
    "env",
    "event",
    "floating_point",
    "float",
    "integer",
    "int",
    "long",
    "short",
    "signed",
    "stream",
    "string",
    "struct",
    "trace",
    "typealias",
    "typedef",
    "unsigned",
    "variant",
    "void",
    "_Bool",
    "_Complex",
    "_Imaginary",
];

/// Returns true if `name` is a valid CTF identifier: a C identifier which is
/// not a reserved keyword.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => (),
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) && !RESERVED_KEYWORDS.contains(&name)
}

pub(crate) fn check_identifier(what: &str, name: &str) -> Result<(), Error> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{what} '{name}' is not a valid CTF identifier"
        )))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize)]
#[serde(try_from = "String")]
pub enum ByteOrder {
    #[display(fmt = "native")]
    Native,
    #[display(fmt = "little-endian")]
    LittleEndian,
    #[display(fmt = "big-endian")]
    BigEndian,
    #[display(fmt = "network")]
    Network,
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::Native
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "native" => ByteOrder::Native,
            "le" | "little-endian" => ByteOrder::LittleEndian,
            "be" | "big-endian" => ByteOrder::BigEndian,
            "network" => ByteOrder::Network,
            _ => return Err(format!("'{s}' is not a valid byte order")),
        })
    }
}

impl TryFrom<String> for ByteOrder {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ByteOrder::from_str(&s)
    }
}

/// Preferred display base of an integer field type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum Base {
    #[display(fmt = "2")]
    Binary,
    #[display(fmt = "8")]
    Octal,
    #[display(fmt = "10")]
    Decimal,
    #[display(fmt = "16")]
    Hexadecimal,
}

impl Default for Base {
    fn default() -> Self {
        Base::Decimal
    }
}

impl TryFrom<u8> for Base {
    type Error = Error;

    fn try_from(radix: u8) -> Result<Self, Self::Error> {
        Ok(match radix {
            2 => Base::Binary,
            8 => Base::Octal,
            10 => Base::Decimal,
            16 => Base::Hexadecimal,
            _ => {
                return Err(Error::validation(format!(
                    "integer base must be one of 2, 8, 10 or 16, got {radix}"
                )))
            }
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize)]
#[serde(try_from = "String")]
pub enum Encoding {
    #[display(fmt = "none")]
    None,
    #[display(fmt = "utf8")]
    Utf8,
    #[display(fmt = "ascii")]
    Ascii,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::None
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "none" => Encoding::None,
            "utf8" | "utf-8" => Encoding::Utf8,
            "ascii" => Encoding::Ascii,
            _ => return Err(format!("'{s}' is not a valid encoding")),
        })
    }
}

impl TryFrom<String> for Encoding {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Encoding::from_str(&s)
    }
}

/// Severity of an event class.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    #[display(fmt = "emergency")]
    Emergency,
    #[display(fmt = "alert")]
    Alert,
    #[display(fmt = "critical")]
    Critical,
    #[display(fmt = "error")]
    Error,
    #[display(fmt = "warning")]
    Warning,
    #[display(fmt = "notice")]
    Notice,
    #[display(fmt = "info")]
    Info,
    #[display(fmt = "debug_system")]
    DebugSystem,
    #[display(fmt = "debug_program")]
    DebugProgram,
    #[display(fmt = "debug_process")]
    DebugProcess,
    #[display(fmt = "debug_module")]
    DebugModule,
    #[display(fmt = "debug_unit")]
    DebugUnit,
    #[display(fmt = "debug_function")]
    DebugFunction,
    #[display(fmt = "debug_line")]
    DebugLine,
    #[display(fmt = "debug")]
    Debug,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use LogLevel::*;
        Ok(match s.trim().to_lowercase().as_str() {
            "emergency" => Emergency,
            "alert" => Alert,
            "critical" => Critical,
            "error" => Error,
            "warning" => Warning,
            "notice" => Notice,
            "info" => Info,
            "debug_system" => DebugSystem,
            "debug_program" => DebugProgram,
            "debug_process" => DebugProcess,
            "debug_module" => DebugModule,
            "debug_unit" => DebugUnit,
            "debug_function" => DebugFunction,
            "debug_line" => DebugLine,
            "debug" => Debug,
            _ => return Err(format!("'{s}' is not a valid log level")),
        })
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    // `Self::Error` would be ambiguous with the `Error` variant
    fn try_from(s: String) -> Result<Self, String> {
        LogLevel::from_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identifiers() {
        assert!(is_valid_identifier("my_field"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("has-dash"));
        assert!(!is_valid_identifier("struct"));
        assert!(!is_valid_identifier("env"));
    }

    #[test]
    fn log_level_round_trip_through_display() {
        for ll in [LogLevel::Emergency, LogLevel::DebugUnit, LogLevel::Debug] {
            assert_eq!(LogLevel::from_str(&ll.to_string()), Ok(ll));
        }
        assert!(LogLevel::from_str("loud").is_err());
    }

    #[test]
    fn log_level_from_owned_string() {
        assert_eq!(LogLevel::try_from("Error".to_owned()), Ok(LogLevel::Error));
        assert_eq!(
            LogLevel::try_from(" debug_line ".to_owned()),
            Ok(LogLevel::DebugLine)
        );
        assert!(LogLevel::try_from(String::new()).is_err());
    }

    #[test]
    fn base_from_radix() {
        assert_eq!(Base::try_from(16).unwrap(), Base::Hexadecimal);
        assert!(Base::try_from(3).is_err());
    }
}
