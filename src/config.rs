//! Settings for the local store of confirmed installment state
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    path: PathBuf,
    temporary: bool,
    cache_capacity: u64, // bytes
    flush_every_ms: Option<u64>,
    flush_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("repayments.db"),
            temporary: false,
            cache_capacity: 64 * 1024 * 1024,
            flush_every_ms: Some(500),
            flush_on_write: false,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }
    /// Throwaway store, removed when the last handle drops.
    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }
    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }
    pub fn flush_every_ms(mut self, every: Option<u64>) -> Self {
        self.flush_every_ms = every;
        self
    }
    /// Flush synchronously after every confirmed write.
    pub fn flush_on_write(mut self, flush: bool) -> Self {
        self.flush_on_write = flush;
        self
    }
    pub fn should_flush_on_write(&self) -> bool {
        self.flush_on_write
    }

    pub fn open(&self) -> sled::Result<sled::Db> {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .flush_every_ms(self.flush_every_ms)
            .temporary(self.temporary);
        if !self.temporary {
            config = config.path(&self.path);
        }
        config.open()
    }
}
