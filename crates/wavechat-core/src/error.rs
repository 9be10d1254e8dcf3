//! Common error types for wavechat.

use thiserror::Error;

/// Errors that can occur when decoding inbound wire frames.
///
/// Protocol errors are recovered locally: the offending frame is logged and
/// discarded while the connection stays open.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The inbound frame was not valid JSON or did not match the frame schema.
    #[error("malformed frame: {source}")]
    MalformedFrame {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
        /// A truncated copy of the offending frame text for logging.
        frame: String,
    },
}

impl ProtocolError {
    /// Maximum number of frame bytes retained for logging.
    const FRAME_SNIPPET_LEN: usize = 256;

    /// Build a `MalformedFrame` error, truncating the frame text.
    #[must_use]
    pub fn malformed(source: serde_json::Error, frame: &str) -> Self {
        let mut snippet = frame.to_string();
        if snippet.len() > Self::FRAME_SNIPPET_LEN {
            let mut end = Self::FRAME_SNIPPET_LEN;
            while !snippet.is_char_boundary(end) {
                end -= 1;
            }
            snippet.truncate(end);
        }
        Self::MalformedFrame {
            source,
            frame: snippet,
        }
    }

    /// The truncated frame text that failed to decode.
    #[must_use]
    pub fn frame(&self) -> &str {
        match self {
            Self::MalformedFrame { frame, .. } => frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_truncates_long_frames() {
        let bad = "x".repeat(1000);
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ProtocolError::malformed(source, &bad);
        assert_eq!(err.frame().len(), 256);
    }

    #[test]
    fn malformed_respects_char_boundaries() {
        let bad = "é".repeat(200);
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ProtocolError::malformed(source, &bad);
        assert!(err.frame().len() <= 256);
        assert!(bad.starts_with(err.frame()));
    }
}
