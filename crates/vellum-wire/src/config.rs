use crate::{DEFAULT_MAX_PACKET_BYTES, DEFAULT_WRITE_RETRIES};
use std::str::FromStr;

pub const MAX_PACKET_BYTES_ENV: &str = "VELLUM_MAX_PACKET_BYTES";
pub const WRITE_RETRIES_ENV: &str = "VELLUM_WRITE_RETRIES";

/// Stream limits, read once from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireConfig {
    /// Packets whose size prefix exceeds this are rejected as malformed.
    pub max_packet_bytes: u64,
    /// How many times [`FileLike`](crate::FileLike) retries a transient write failure.
    pub write_retries: u32,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_packet_bytes: DEFAULT_MAX_PACKET_BYTES,
            write_retries: DEFAULT_WRITE_RETRIES,
        }
    }
}

impl WireConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset or unparsable values fall back to
    /// the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_packet_bytes: parse_or(&lookup, MAX_PACKET_BYTES_ENV, defaults.max_packet_bytes),
            write_retries: parse_or(&lookup, WRITE_RETRIES_ENV, defaults.write_retries),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, %default, "ignoring unparsable setting");
            default
        }
    }
}
