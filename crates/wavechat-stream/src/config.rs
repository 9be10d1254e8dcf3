//! Streaming layer configuration.

use std::time::Duration;

use serde::Deserialize;

use wavechat_transport::ReconnectPolicy;

/// Configuration for the streaming connection manager.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Streaming endpoint URL (e.g. "wss://chat.example.com/stream").
    #[serde(default = "StreamConfig::default_endpoint")]
    pub endpoint: String,

    /// Base reconnect delay in milliseconds.
    #[serde(default = "StreamConfig::default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Maximum automatic reconnection attempts before a terminal failure.
    #[serde(default = "StreamConfig::default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Capacity of the broadcast event channel.
    #[serde(default = "StreamConfig::default_event_capacity")]
    pub event_capacity: usize,
}

impl StreamConfig {
    fn default_endpoint() -> String {
        "ws://127.0.0.1:8080/stream".to_string()
    }

    const fn default_reconnect_base_ms() -> u64 {
        1000
    }

    const fn default_max_reconnect_attempts() -> u32 {
        3
    }

    const fn default_event_capacity() -> usize {
        256
    }

    /// Build the reconnect policy this configuration describes.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_base_ms),
            self.max_reconnect_attempts,
        )
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            reconnect_base_ms: Self::default_reconnect_base_ms(),
            max_reconnect_attempts: Self::default_max_reconnect_attempts(),
            event_capacity: Self::default_event_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.reconnect_base_ms, 1000);
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn policy_from_config() {
        let config = StreamConfig::default();
        let policy = config.reconnect_policy();
        assert_eq!(policy.delay(1), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay(4), None);
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"endpoint":"wss://example.com/stream"}"#).unwrap();
        assert_eq!(config.endpoint, "wss://example.com/stream");
        assert_eq!(config.max_reconnect_attempts, 3);
    }
}
