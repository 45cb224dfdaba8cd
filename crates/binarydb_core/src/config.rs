//! Database configuration.

use crate::error::CoreError;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with failures that no caller is waiting on.
pub type ErrorHook = Arc<dyn Fn(&CoreError) + Send + Sync>;

/// Configuration for opening a database.
#[derive(Clone)]
pub struct Config {
    /// Whether to sync the write-ahead log, id table and ledger on every
    /// write (safer but slower). When false, writes are only flushed.
    pub sync_on_write: bool,

    /// Whether to hold an exclusive lock file while the database is open.
    pub lock_database: bool,

    /// Receives errors raised by background compaction.
    pub on_background_error: Option<ErrorHook>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            lock_database: true,
            on_background_error: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("sync_on_write", &self.sync_on_write)
            .field("lock_database", &self.lock_database)
            .field("on_background_error", &self.on_background_error.is_some())
            .finish()
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync files on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets whether to lock the database files while open.
    #[must_use]
    pub const fn lock_database(mut self, value: bool) -> Self {
        self.lock_database = value;
        self
    }

    /// Installs a hook for background errors.
    #[must_use]
    pub fn on_background_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CoreError) + Send + Sync + 'static,
    {
        self.on_background_error = Some(Arc::new(hook));
        self
    }

    pub(crate) fn report_background_error(&self, error: &CoreError) {
        if let Some(hook) = &self.on_background_error {
            hook(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.sync_on_write);
        assert!(config.lock_database);
        assert!(config.on_background_error.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new().sync_on_write(false).lock_database(false);

        assert!(!config.sync_on_write);
        assert!(!config.lock_database);
    }

    #[test]
    fn hook_receives_errors() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let config = Config::new().on_background_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        config.report_background_error(&CoreError::DatabaseClosed);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(format!("{config:?}").contains("on_background_error: true"));
    }
}
