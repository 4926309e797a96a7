//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in the binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

use crate::error::SyncError;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times; reads go through the
/// process environment afterwards, so explicit exports still win over .env.
pub fn init_env() {
    INIT.call_once(|| {
        let _ = dotenv::dotenv();
    });
}

/// A resolved environment value plus the alias that supplied it, so startup
/// logs can say which of several accepted keys was actually in effect.
#[derive(Debug, Clone)]
pub struct ResolvedVar {
    pub key: String,
    pub value: String,
}

/// Walk an ordered alias list and return the first non-empty value (trimmed).
pub fn resolve_first(keys: &[&str]) -> Option<ResolvedVar> {
    init_env();
    for &k in keys {
        if let Some(v) = env_opt(k) {
            return Some(ResolvedVar {
                key: k.to_string(),
                value: v.trim().to_string(),
            });
        }
    }
    None
}

/// Like `resolve_first`, but missing configuration is fatal. The error names
/// every accepted key so the operator knows all the spellings that would work.
pub fn require_first(keys: &[&str]) -> Result<ResolvedVar, SyncError> {
    resolve_first(keys).ok_or_else(|| {
        SyncError::config(format!("none of {} is set", keys.join(" / ")))
    })
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        Err(_) => default,
    }
}

/// Mask a secret for logging: keep the first and last three characters when
/// the value is long enough to stay unguessable, otherwise hide it entirely.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 6 {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

fn redact_for_log(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("TOKEN") || k.contains("KEY") || k.contains("SECRET") || k.contains("PASSWORD") {
        mask_secret(val.trim())
    } else {
        val.trim().to_string()
    }
}

/// Log a consolidated, redacted snapshot of the listed keys. Secrets are
/// masked; unset keys show as `<unset>`.
pub fn preflight_snapshot(title: &str, keys: &[&str]) {
    init_env();
    let mut snapshot: Vec<(String, String)> = Vec::new();
    for &k in keys {
        let shown = match env_opt(k) {
            Some(v) => redact_for_log(k, &v),
            None => "<unset>".to_string(),
        };
        snapshot.push((k.to_string(), shown));
    }
    info!(title, snapshot = ?snapshot, "configuration snapshot");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_first_honors_alias_order() {
        std::env::set_var("SMS_TEST_ALIAS_B", "second");
        std::env::set_var("SMS_TEST_ALIAS_A", "first");
        let hit = resolve_first(&["SMS_TEST_ALIAS_A", "SMS_TEST_ALIAS_B"]).unwrap();
        assert_eq!(hit.key, "SMS_TEST_ALIAS_A");
        assert_eq!(hit.value, "first");
    }

    #[test]
    fn test_resolve_first_skips_empty_values() {
        std::env::set_var("SMS_TEST_EMPTY", "   ");
        std::env::set_var("SMS_TEST_FALLBACK", "present");
        let hit = resolve_first(&["SMS_TEST_EMPTY", "SMS_TEST_FALLBACK"]).unwrap();
        assert_eq!(hit.key, "SMS_TEST_FALLBACK");
    }

    #[test]
    fn test_require_first_names_every_key() {
        let err = require_first(&["SMS_TEST_NOPE_1", "SMS_TEST_NOPE_2"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SMS_TEST_NOPE_1"));
        assert!(msg.contains("SMS_TEST_NOPE_2"));
    }

    #[test]
    fn test_mask_secret_boundaries() {
        assert_eq!(mask_secret("abcdef"), "***");
        assert_eq!(mask_secret(""), "***");
        assert_eq!(mask_secret("abcdefg"), "abc...efg");
        assert_eq!(mask_secret("shpat_1234567890"), "shp...890");
    }

    #[test]
    fn test_env_flag_accepts_usual_spellings() {
        std::env::set_var("SMS_TEST_FLAG_ON", "YES");
        std::env::set_var("SMS_TEST_FLAG_OFF", "nope");
        assert!(env_flag("SMS_TEST_FLAG_ON", false));
        assert!(!env_flag("SMS_TEST_FLAG_OFF", true));
        assert!(env_flag("SMS_TEST_FLAG_UNSET", true));
    }
}
