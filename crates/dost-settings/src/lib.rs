//! # dost-settings
//!
//! Configuration management with layered sources for the DOST backend.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`DostSettings::default()`]
//! 2. **User file** — `~/.dost/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `DOST_*` overrides (highest priority)
//!
//! The binary loads once at startup, stores the result with [`init_settings`],
//! and hands an `Arc` snapshot to the server. [`get_settings`] lazily loads
//! from disk if nothing was initialised.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::Arc;

use parking_lot::RwLock;

/// Global settings cache.
static SETTINGS: RwLock<Option<Arc<DostSettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.dost/settings.json` with env var
/// overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> Arc<DostSettings> {
    if let Some(ref s) = *SETTINGS.read() {
        return Arc::clone(s);
    }

    let mut guard = SETTINGS.write();
    // Another thread may have initialised while we waited for the write lock.
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            DostSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Replace the cached settings.
pub fn init_settings(settings: DostSettings) -> Arc<DostSettings> {
    let settings = Arc::new(settings);
    *SETTINGS.write() = Some(Arc::clone(&settings));
    settings
}

#[cfg(test)]
pub(crate) fn reset_settings() {
    *SETTINGS.write() = None;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that touch the global cache hold this lock; the test harness runs in parallel.
    static SETTINGS_MUTEX: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    #[test]
    fn init_settings_sets_custom_value() {
        let _lock = SETTINGS_MUTEX.lock();
        reset_settings();
        let mut custom = DostSettings::default();
        custom.server.port = 9999;
        let _ = init_settings(custom);
        assert_eq!(get_settings().server.port, 9999);
        reset_settings();
    }

    #[test]
    fn init_settings_replaces_previous() {
        let _lock = SETTINGS_MUTEX.lock();
        reset_settings();
        let mut first = DostSettings::default();
        first.server.port = 1111;
        let _ = init_settings(first);
        assert_eq!(get_settings().server.port, 1111);

        let mut second = DostSettings::default();
        second.server.port = 2222;
        let returned = init_settings(second);
        assert_eq!(returned.server.port, 2222);
        assert_eq!(get_settings().server.port, 2222);
        reset_settings();
    }

    #[test]
    fn get_settings_returns_shared_snapshot() {
        let _lock = SETTINGS_MUTEX.lock();
        reset_settings();
        let _ = init_settings(DostSettings::default());
        let a = get_settings();
        let b = get_settings();
        assert!(Arc::ptr_eq(&a, &b));
        reset_settings();
    }
}
