//! Reader configuration.
//!
//! Defaults are usable as-is. With the `config` feature the same structure can be loaded
//! from a TOML file; every field is optional there.

use crate::encoding::Encoding;
use crate::error::{BiglineError, Result};
use crate::file_handler::{AccessStrategy, SourceFactory};

#[cfg(feature = "config")]
use std::path::Path;

/// Default scratch buffer capacity per read context (64KB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Default longest line returned untruncated (10MB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 10 * 1024 * 1024;

/// Tuning of the bytes-per-character estimator used by prefix reads
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ReadAheadConfig {
    /// Extra bytes requested on every incremental read, absorbing multi-byte sequences
    pub safety_margin: usize,
    /// Seed for the cumulative byte count
    pub initial_bytes: f64,
    /// Seed for the cumulative char count
    pub initial_chars: f64,
}

impl Default for ReadAheadConfig {
    fn default() -> Self {
        Self {
            safety_margin: 32,
            initial_bytes: 1.0,
            initial_chars: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ReaderConfig {
    /// Byte and char scratch capacity of each read context
    pub buffer_capacity: usize,
    /// Lines longer than this are truncated by `extract_line`
    pub max_line_length: usize,
    pub encoding: Encoding,
    pub read_ahead: ReadAheadConfig,
    /// Worker count: 0 uses every core, negative values leave that many cores free
    pub search_threads: i32,
    pub strategy: AccessStrategy,
    /// Files smaller than this are loaded into memory by `AccessStrategy::Auto`
    pub memory_threshold: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            encoding: Encoding::default(),
            read_ahead: ReadAheadConfig::default(),
            search_threads: 0,
            strategy: AccessStrategy::default(),
            memory_threshold: SourceFactory::MEMORY_THRESHOLD,
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(BiglineError::config("buffer_capacity must be positive"));
        }
        if self.max_line_length == 0 {
            return Err(BiglineError::config("max_line_length must be positive"));
        }
        let seeds = [self.read_ahead.initial_bytes, self.read_ahead.initial_chars];
        if seeds.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(BiglineError::config(
                "read_ahead seeds must be finite and positive",
            ));
        }
        Ok(())
    }

    /// Number of scan workers for this machine.
    pub fn worker_count(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        resolve_worker_count(self.search_threads, cores)
    }

    /// Load a TOML configuration file.
    #[cfg(feature = "config")]
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BiglineError::file_error(format!("Failed to read config: {}", path.display()), e)
        })?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| BiglineError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<config dir>/bigline/config.toml`, falling back to defaults when it is absent.
    #[cfg(feature = "config")]
    pub fn load_default() -> Result<Self> {
        match dirs::config_dir().map(|dir| dir.join("bigline").join("config.toml")) {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }
}

fn resolve_worker_count(requested: i32, cores: usize) -> usize {
    let cores = cores.max(1) as i64;
    let mut count = i64::from(requested);
    if count <= 0 {
        count += cores;
    }
    count.clamp(1, cores) as usize
}
