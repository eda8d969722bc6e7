use thiserror::Error;

use crate::types::ControlValue;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed attribute value: {0}")]
    Malformed(String),
}

/// Format contract for a textual multi-channel attribute: ASCII decimal
/// channels joined by commas, e.g. `255,0,128`.
///
/// Whether the driver wants a trailing newline is not knowable from here
/// (`sscanf`-style parsers tolerate one but do not require it), so the
/// choice is an explicit flag rather than a silent default. The decoder
/// accepts one trailing newline either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCodec {
    arity: usize,
    trailing_newline: bool,
}

impl ChannelCodec {
    pub fn new(arity: usize, trailing_newline: bool) -> Self {
        Self {
            arity,
            trailing_newline,
        }
    }

    /// Three channels, no trailing newline; byte-compatible with writing
    /// `"r,g,b"` via `tee`.
    pub fn rgb() -> Self {
        Self::new(3, false)
    }

    pub fn with_trailing_newline(mut self, on: bool) -> Self {
        self.trailing_newline = on;
        self
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Total for every value; arity mismatches surface on decode, where the
    /// attribute's contract is actually checked.
    pub fn encode(&self, value: &ControlValue) -> Vec<u8> {
        let mut out = value.to_string().into_bytes();
        if self.trailing_newline {
            out.push(b'\n');
        }
        out
    }

    pub fn decode(&self, raw: &[u8]) -> Result<ControlValue, CodecError> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| CodecError::Malformed("not valid UTF-8".to_string()))?;
        let text = text.strip_suffix('\n').unwrap_or(text);
        if text.is_empty() {
            return Err(CodecError::Malformed("empty value".to_string()));
        }
        let mut channels = Vec::with_capacity(self.arity);
        for field in text.split(',') {
            let field = field.trim();
            let channel = field.parse::<u8>().map_err(|_| {
                CodecError::Malformed(format!("channel {:?} is not in 0..=255", field))
            })?;
            channels.push(channel);
        }
        if channels.len() != self.arity {
            return Err(CodecError::Malformed(format!(
                "expected {} channels, got {}",
                self.arity,
                channels.len()
            )));
        }
        Ok(ControlValue::new(channels))
    }
}
