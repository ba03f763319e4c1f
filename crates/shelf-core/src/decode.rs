//! Text decoding for plain-text books
//!
//! Tries strict UTF-8 first (after dropping a BOM), then the configured
//! legacy encoding, also strictly. Malformed input in both is an error
//! rather than a page full of replacement characters.

use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

use crate::error::{SyncError, SyncResult};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decoder with a legacy fallback encoding
#[derive(Debug, Clone, Copy)]
pub struct TextDecoder {
    fallback: &'static Encoding,
}

impl TextDecoder {
    /// Create a decoder falling back to the encoding named by `label`
    pub fn new(label: &str) -> SyncResult<Self> {
        let fallback = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            SyncError::InvalidInput(format!("Unknown text encoding '{}'", label))
        })?;
        Ok(Self { fallback })
    }

    /// Name of the fallback encoding
    pub fn fallback_name(&self) -> &'static str {
        self.fallback.name()
    }

    /// Decode `bytes` belonging to `file_name`
    pub fn decode(&self, file_name: &str, bytes: &[u8]) -> SyncResult<String> {
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(body) {
            return Ok(text.into_owned());
        }

        debug!(
            "{} is not valid UTF-8, trying {}",
            file_name,
            self.fallback.name()
        );

        self.fallback
            .decode_without_bom_handling_and_without_replacement(body)
            .map(|text| text.into_owned())
            .ok_or_else(|| SyncError::DecodeFailed {
                file_name: file_name.to_string(),
                fallback: self.fallback.name().to_string(),
            })
    }
}

impl Default for TextDecoder {
    fn default() -> Self {
        Self {
            fallback: encoding_rs::GBK,
        }
    }
}
