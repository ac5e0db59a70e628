use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{FrameError, Result};

/// Text encoding used to interpret frame bodies.
///
/// Both encodings are ASCII compatible, so delimiter matching happens on raw
/// bytes and only complete bodies are decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Charset {
    /// UTF-8. Invalid sequences are rejected.
    #[default]
    Utf8,
    /// ISO-8859-1. Every byte maps to the code point of the same value.
    Latin1,
}

impl Charset {
    /// Canonical name of the charset.
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode raw bytes into text.
    pub fn decode(self, bytes: &[u8]) -> Result<Cow<'_, str>> {
        match self {
            Charset::Utf8 => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|err| FrameError::InvalidText {
                    charset: self.name(),
                    offset: err.valid_up_to(),
                }),
            Charset::Latin1 => {
                if bytes.is_ascii() {
                    // ASCII is valid UTF-8; skip the per-byte conversion.
                    return Ok(Cow::Borrowed(
                        std::str::from_utf8(bytes).unwrap_or_default(),
                    ));
                }
                Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
            }
        }
    }

    /// Encode text into raw bytes.
    ///
    /// Characters outside Latin-1 are written as `?`.
    pub fn encode(self, text: &str) -> Cow<'_, [u8]> {
        match self {
            Charset::Utf8 => Cow::Borrowed(text.as_bytes()),
            Charset::Latin1 => {
                if text.is_ascii() {
                    return Cow::Borrowed(text.as_bytes());
                }
                Cow::Owned(
                    text.chars()
                        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                        .collect(),
                )
            }
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Charset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Ok(Charset::Latin1),
            other => Err(format!("unsupported charset: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_decodes_multibyte_text() {
        let text = Charset::Utf8.decode("olá, 世界".as_bytes()).unwrap();
        assert_eq!(text, "olá, 世界");
    }

    #[test]
    fn utf8_rejects_invalid_bytes() {
        let err = Charset::Utf8.decode(&[b'o', b'k', 0xFF]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidText {
                charset: "UTF-8",
                offset: 2
            }
        ));
    }

    #[test]
    fn latin1_maps_high_bytes() {
        let text = Charset::Latin1.decode(&[b'o', b'l', 0xE1]).unwrap();
        assert_eq!(text, "olá");
    }

    #[test]
    fn latin1_replaces_unrepresentable_characters() {
        let bytes = Charset::Latin1.encode("olá 世");
        assert_eq!(bytes.as_ref(), &[b'o', b'l', 0xE1, b' ', b'?']);
    }

    #[test]
    fn parses_common_names() {
        assert_eq!("UTF-8".parse::<Charset>().unwrap(), Charset::Utf8);
        assert_eq!("utf8".parse::<Charset>().unwrap(), Charset::Utf8);
        assert_eq!("Latin1".parse::<Charset>().unwrap(), Charset::Latin1);
        assert_eq!("ISO-8859-1".parse::<Charset>().unwrap(), Charset::Latin1);
        assert!("ebcdic".parse::<Charset>().is_err());
    }
}
