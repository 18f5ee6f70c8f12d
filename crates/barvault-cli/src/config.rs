use std::env;

/// Settings the CLI takes from the environment.
///
/// Flags win over these.
#[derive(Clone, Default)]
pub struct EnvConfig {
    /// `REFRESH_TOKEN`; empty is treated as unset.
    pub refresh_token: Option<String>,
    /// `BARVAULT_PRACTICE`
    pub practice: bool,
    /// `BARVAULT_CALL_INTERVAL_MS`
    pub call_interval_ms: u64,
}

pub const DEFAULT_CALL_INTERVAL_MS: u64 = 250;

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            refresh_token: env_opt_str("REFRESH_TOKEN"),
            practice: env_bool("BARVAULT_PRACTICE", false),
            call_interval_ms: env_u64("BARVAULT_CALL_INTERVAL_MS", DEFAULT_CALL_INTERVAL_MS),
        }
    }
}

impl std::fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvConfig")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("practice", &self.practice)
            .field("call_interval_ms", &self.call_interval_ms)
            .finish()
    }
}

fn env_opt_str(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
        .unwrap_or(default)
}
