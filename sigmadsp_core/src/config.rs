use once_cell::sync::Lazy;

/// Runtime knobs read from the environment.
#[derive(Debug)]
pub struct Config {
    pub channel_capacity: usize,
    pub max_payload_bytes: usize,
    pub safety_retry_attempts: usize,
    pub safety_retry_backoff_ms: u64,
    pub log_payloads: bool,
}

impl Config {
    fn from_env() -> Self {
        let channel_capacity = std::env::var("SIGMADSP_CHANNEL_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(32usize);
        let max_payload_bytes = std::env::var("SIGMADSP_MAX_PAYLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1usize << 20);
        let safety_retry_attempts = std::env::var("SIGMADSP_SAFETY_RETRY_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5usize);
        let safety_retry_backoff_ms = std::env::var("SIGMADSP_SAFETY_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000u64);
        let log_payloads = std::env::var("SIGMADSP_LOG_PAYLOADS")
            .map(|v| v == "1")
            .unwrap_or(false);
        Self {
            channel_capacity,
            max_payload_bytes,
            safety_retry_attempts,
            safety_retry_backoff_ms,
            log_payloads,
        }
    }
}

/// Global config loaded once from environment at first access.
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Convenience accessor
pub fn config() -> &'static Config {
    &GLOBAL_CONFIG
}

/// Space-separated uppercase hex, used for payload dumps.
#[must_use]
pub fn hex_dump(b: &[u8]) -> String {
    b.iter()
        .map(|x| format!("{x:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
