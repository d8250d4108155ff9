//! In-memory preference store and property table.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::services::{Preferences, PrefsError, SystemProperties};

/// A [`Preferences`] store kept in a map.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write and delete fail.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values().contains_key(key)
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<(), PrefsError> {
        if self.read_only.load(Ordering::SeqCst) {
            Err(PrefsError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl Preferences for MemoryPreferences {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.check_writable()?;
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_i64(&self, key: &str, value: i64) -> Result<(), PrefsError> {
        self.set_string(key, &value.to_string())
    }

    fn delete(&self, key: &str) -> Result<(), PrefsError> {
        self.check_writable()?;
        self.values().remove(key);
        Ok(())
    }
}

/// A [`SystemProperties`] table that can be changed while the action runs.
#[derive(Debug, Default)]
pub struct MemoryProperties {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, builder style.
    pub fn with(self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values().insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values().remove(key);
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }
}

impl SystemProperties for MemoryProperties {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).as_deref().map(str::trim) {
            Some("1" | "y" | "yes" | "on" | "true") => true,
            Some("0" | "n" | "no" | "off" | "false") => false,
            _ => default,
        }
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_store_integers_as_strings() {
        let prefs = MemoryPreferences::new();
        prefs.set_i64("offset", -1).unwrap();

        assert_eq!(prefs.get_string("offset").as_deref(), Some("-1"));
    }

    #[test]
    fn read_only_preferences_reject_writes() {
        let prefs = MemoryPreferences::new();
        prefs.set_string("key", "value").unwrap();
        prefs.set_read_only(true);

        assert_eq!(prefs.set_string("key", "other"), Err(PrefsError::ReadOnly));
        assert_eq!(prefs.delete("key"), Err(PrefsError::ReadOnly));
        assert!(prefs.contains("key"));
    }

    #[test]
    fn deleting_missing_key_succeeds() {
        let prefs = MemoryPreferences::new();
        assert!(prefs.delete("missing").is_ok());
    }

    #[test]
    fn properties_parse_booleans_and_integers() {
        let props = MemoryProperties::new()
            .with("flag.on", "1")
            .with("flag.off", "false")
            .with("flag.bad", "maybe")
            .with("delay", " 90 ")
            .with("delay.bad", "ninety");

        assert!(props.get_bool("flag.on", false));
        assert!(!props.get_bool("flag.off", true));
        assert!(props.get_bool("flag.bad", true));
        assert!(!props.get_bool("flag.missing", false));
        assert_eq!(props.get_i64("delay", 0), 90);
        assert_eq!(props.get_i64("delay.bad", 7), 7);
        assert_eq!(props.get_string("missing", "fallback"), "fallback");
    }
}
