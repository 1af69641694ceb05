//! Environment-driven settings.
//!
//! Every knob has a default; an unset or blank variable means "use the
//! default", a set-but-unparseable one is an error. CLI flags override these.

use std::env::VarError;

pub const MAX_MODEL_CALLS_ENV: &str = "JOBSCOUT_MAX_MODEL_CALLS";
pub const CONTEXT_K_ENV: &str = "JOBSCOUT_CONTEXT_K";
pub const PREFETCH_CONTEXT_ENV: &str = "JOBSCOUT_PREFETCH_CONTEXT";
pub const LLM_TIMEOUT_SECS_ENV: &str = "JOBSCOUT_LLM_TIMEOUT_SECS";
pub const MAX_SESSIONS_ENV: &str = "JOBSCOUT_MAX_SESSIONS";

pub const DEFAULT_MAX_MODEL_CALLS: usize = 8;
pub const DEFAULT_CONTEXT_K: usize = 5;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_SESSIONS: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No LLM provider configured. Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or LOCAL_LLM_URL")]
    NoProviderConfigured,
    #[error("{var} is not set")]
    Missing { var: &'static str },
    #[error("invalid {var}={value:?} (expected {expected})")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("failed to read {var}: {source}")]
    Read {
        var: &'static str,
        #[source]
        source: VarError,
    },
}

/// Trimmed, non-empty value of `var`, or `None` when unset or blank.
pub(crate) fn env_value(var: &'static str) -> Result<Option<String>, ConfigError> {
    match std::env::var(var) {
        Ok(v) => {
            let v = v.trim();
            if v.is_empty() {
                Ok(None)
            } else {
                Ok(Some(v.to_string()))
            }
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(source) => Err(ConfigError::Read { var, source }),
    }
}

fn parse_count(var: &'static str, raw: Option<String>, default: usize, min: usize) -> Result<usize, ConfigError> {
    let Some(v) = raw else {
        return Ok(default);
    };
    let n = v.parse::<usize>().map_err(|_| ConfigError::Invalid {
        var,
        value: v.clone(),
        expected: "non-negative integer",
    })?;
    Ok(n.max(min))
}

fn parse_flag(var: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(v) = raw else {
        return Ok(false);
    };
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: v,
            expected: "boolean (true/false/1/0)",
        }),
    }
}

/// Upper bound on model calls within one turn (at least 1).
pub fn max_model_calls() -> Result<usize, ConfigError> {
    parse_count(MAX_MODEL_CALLS_ENV, env_value(MAX_MODEL_CALLS_ENV)?, DEFAULT_MAX_MODEL_CALLS, 1)
}

/// Documents fetched by the context-retrieval node.
pub fn context_k() -> Result<usize, ConfigError> {
    parse_count(CONTEXT_K_ENV, env_value(CONTEXT_K_ENV)?, DEFAULT_CONTEXT_K, 0)
}

pub fn prefetch_context() -> Result<bool, ConfigError> {
    parse_flag(PREFETCH_CONTEXT_ENV, env_value(PREFETCH_CONTEXT_ENV)?)
}

pub fn llm_timeout_secs() -> Result<u64, ConfigError> {
    parse_count(LLM_TIMEOUT_SECS_ENV, env_value(LLM_TIMEOUT_SECS_ENV)?, DEFAULT_LLM_TIMEOUT_SECS as usize, 1)
        .map(|n| n as u64)
}

pub fn max_sessions() -> Result<usize, ConfigError> {
    parse_count(MAX_SESSIONS_ENV, env_value(MAX_SESSIONS_ENV)?, DEFAULT_MAX_SESSIONS, 1)
}
