//! Text decoding with an ordered encoding fallback.
//!
//! Payroll exports do not declare their encoding. We try UTF-8 first, then
//! ISO-8859-1 restricted to printable characters (C1 control bytes are
//! almost always a sign of a Windows code page), then Windows-1252, which
//! rejects its five undefined byte values.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// Windows-1252 mapping for bytes 0x80..=0x9F; `None` marks undefined slots.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
}

impl TextEncoding {
    /// Fallback order used by the loader.
    pub const FALLBACK_ORDER: [Self; 3] = [Self::Utf8, Self::Latin1, Self::Windows1252];

    /// Strictly decode `bytes`, or `None` if they are not valid in this encoding.
    #[must_use]
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            Self::Latin1 => {
                if bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
                    return None;
                }
                Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
            }
            Self::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => CP1252_HIGH[usize::from(b - 0x80)],
                    _ => Some(char::from(b)),
                })
                .collect::<Option<String>>()
                .map(Cow::Owned),
        }
    }

    /// Whether `bytes` are valid in this encoding, without decoding them.
    #[must_use]
    pub fn accepts(&self, bytes: &[u8]) -> bool {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).is_ok(),
            Self::Latin1 => !bytes.iter().any(|b| (0x80..=0x9F).contains(b)),
            Self::Windows1252 => bytes
                .iter()
                .all(|&b| !(0x80..=0x9F).contains(&b) || CP1252_HIGH[usize::from(b - 0x80)].is_some()),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "iso-8859-1",
            Self::Windows1252 => "windows-1252",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode with the first encoding in `order` that accepts the bytes.
#[must_use]
pub fn decode_with_fallback<'a>(
    bytes: &'a [u8],
    order: &[TextEncoding],
) -> Option<(Cow<'a, str>, TextEncoding)> {
    order
        .iter()
        .find_map(|encoding| encoding.decode(bytes).map(|text| (text, *encoding)))
}
