//! Process-wide configuration, read once from the environment at startup.

use std::time::Duration;

/// Immutable snapshot of every tunable the debate core reads from the
/// environment. Constructed once in `main` and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_channel_mod: String,
    pub redis_channel_res: String,
    pub redis_channel_arb: String,
    pub ws_uri: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_expiry: Duration,
    pub api_url: String,
    pub model: String,
    pub confidence_threshold: f64,
    pub consensus_threshold: f64,
    pub min_debate_rounds: u32,
    pub max_debate_rounds: u32,
    pub caching_enabled: bool,
    pub cache_ttl: Duration,
    pub topic_extraction_enabled: bool,
    pub enable_deadlock_detection: bool,
    pub debate_timeout: Duration,
    pub max_history_size: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_channel_mod: "moderation_channel".to_string(),
            redis_channel_res: "responses_channel".to_string(),
            redis_channel_arb: "arbitration_channel".to_string(),
            ws_uri: "ws://localhost:8000/ws/moderation".to_string(),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_expiry: Duration::from_secs(15),
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-7-sonnet-20250219".to_string(),
            confidence_threshold: 0.25,
            consensus_threshold: 0.15,
            min_debate_rounds: 2,
            max_debate_rounds: 4,
            caching_enabled: true,
            cache_ttl: Duration::from_secs(300),
            topic_extraction_enabled: true,
            enable_deadlock_detection: true,
            debate_timeout: Duration::from_secs(30),
            max_history_size: 10,
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Overlay environment variables onto the defaults. Unparsable values
    /// fall back to the default rather than aborting startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            redis_channel_mod: env_or("REDIS_CHANNEL_MOD", defaults.redis_channel_mod),
            redis_channel_res: env_or("REDIS_CHANNEL_RES", defaults.redis_channel_res),
            redis_channel_arb: env_or("REDIS_CHANNEL_ARB", defaults.redis_channel_arb),
            ws_uri: env_or("WS_URI", defaults.ws_uri),
            heartbeat_interval: env_secs("HEARTBEAT_INTERVAL", defaults.heartbeat_interval),
            heartbeat_expiry: env_secs("HEARTBEAT_EXPIRY", defaults.heartbeat_expiry),
            api_url: env_or("API_URL", defaults.api_url),
            model: env_or("MODEL", defaults.model),
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", defaults.confidence_threshold),
            consensus_threshold: env_parse("CONSENSUS_THRESHOLD", defaults.consensus_threshold),
            min_debate_rounds: env_parse("MIN_DEBATE_ROUNDS", defaults.min_debate_rounds),
            max_debate_rounds: env_parse("MAX_DEBATE_ROUNDS", defaults.max_debate_rounds),
            caching_enabled: env_bool("CACHING_ENABLED", defaults.caching_enabled),
            cache_ttl: env_secs("CACHE_TTL", defaults.cache_ttl),
            topic_extraction_enabled: env_bool(
                "TOPIC_EXTRACTION_ENABLED",
                defaults.topic_extraction_enabled,
            ),
            enable_deadlock_detection: env_bool(
                "ENABLE_DEADLOCK_DETECTION",
                defaults.enable_deadlock_detection,
            ),
            debate_timeout: env_secs("DEBATE_TIMEOUT", defaults.debate_timeout),
            max_history_size: env_parse("MAX_HISTORY_SIZE", defaults.max_history_size),
            log_level: env_or("LOG_LEVEL", defaults.log_level),
        }
    }

    /// Invariant from the heartbeat protocol: the expiry must outlive the
    /// interval or every agent would flap stale between beats.
    pub fn heartbeat_sane(&self) -> bool {
        self.heartbeat_expiry > self.heartbeat_interval
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => v.eq_ignore_ascii_case("true") || v == "1",
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(key, default.as_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.confidence_threshold, 0.25);
        assert_eq!(cfg.consensus_threshold, 0.15);
        assert_eq!(cfg.min_debate_rounds, 2);
        assert_eq!(cfg.max_debate_rounds, 4);
        assert_eq!(cfg.max_history_size, 10);
        assert!(cfg.heartbeat_sane());
    }

    #[test]
    fn env_bool_accepts_one_and_true() {
        std::env::set_var("DEBATE_CORE_TEST_BOOL", "1");
        assert!(env_bool("DEBATE_CORE_TEST_BOOL", false));
        std::env::set_var("DEBATE_CORE_TEST_BOOL", "TRUE");
        assert!(env_bool("DEBATE_CORE_TEST_BOOL", false));
        std::env::remove_var("DEBATE_CORE_TEST_BOOL");
    }
}
