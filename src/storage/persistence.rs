//! Ledger persistence layer
//!
//! Saves and loads ledger snapshots as JSON. Programs are code, not state,
//! so they are not part of a snapshot and must be registered again on load.

use crate::ledger::{Ledger, Program};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Snapshot format written by this version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub ledger_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".paychan_data"),
            ledger_file: "ledger.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// On-disk envelope around a ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub ledger: Ledger,
}

impl LedgerSnapshot {
    pub fn new(ledger: &Ledger) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            ledger: ledger.clone(),
        }
    }

    fn into_ledger(
        self,
        programs: impl IntoIterator<Item = Arc<dyn Program>>,
    ) -> Result<Ledger, StorageError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StorageError::InvalidData(format!(
                "Unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        let mut ledger = self.ledger;
        for program in programs {
            ledger.register_program(program);
        }
        Ok(ledger)
    }
}

/// Ledger storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    /// Create with default configuration
    pub fn with_defaults() -> Result<Self, StorageError> {
        Self::new(StorageConfig::default())
    }

    fn ledger_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.ledger_file)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.ledger_file, index))
    }

    /// Save the ledger to disk
    ///
    /// The previous snapshot, if any, becomes backup 0.
    pub fn save(&self, ledger: &Ledger) -> Result<(), StorageError> {
        let path = self.ledger_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        // Write to temporary file first
        let temp_path = self
            .config
            .data_dir
            .join(format!("{}.tmp", self.config.ledger_file));
        let writer = BufWriter::new(fs::File::create(&temp_path)?);
        serde_json::to_writer_pretty(writer, &LedgerSnapshot::new(ledger))?;

        // Atomic rename
        fs::rename(&temp_path, &path)?;

        log::info!(
            "Saved ledger at slot {} ({} accounts) to {}",
            ledger.slot(),
            ledger.account_count(),
            path.display()
        );
        Ok(())
    }

    /// Load the ledger from disk and register `programs` on it
    pub fn load(
        &self,
        programs: impl IntoIterator<Item = Arc<dyn Program>>,
    ) -> Result<Ledger, StorageError> {
        let path = self.ledger_path();

        if !path.exists() {
            return Err(StorageError::InvalidData(
                "Ledger file not found".to_string(),
            ));
        }

        let ledger = read_snapshot(&path)?.into_ledger(programs)?;
        log::info!(
            "Loaded ledger at slot {} ({} accounts)",
            ledger.slot(),
            ledger.account_count()
        );
        Ok(ledger)
    }

    /// Check if a saved ledger exists
    pub fn exists(&self) -> bool {
        self.ledger_path().exists()
    }

    /// Delete the saved ledger
    pub fn delete(&self) -> Result<(), StorageError> {
        let path = self.ledger_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn rotate_backups(&self) -> Result<(), StorageError> {
        let last = self.config.max_backups - 1;

        // Delete oldest backup
        let oldest = self.backup_path(last);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        // Shift existing backups
        for i in (0..last).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Restore from a backup (0 is the most recent)
    pub fn restore_backup(
        &self,
        backup_index: usize,
        programs: impl IntoIterator<Item = Arc<dyn Program>>,
    ) -> Result<Ledger, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        log::warn!("Restoring ledger from backup {}", backup_index);
        read_snapshot(&backup_path)?.into_ledger(programs)
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let path = self.ledger_path();

        let file_size = if path.exists() {
            fs::metadata(&path)?.len()
        } else {
            0
        };

        Ok(StorageStats {
            file_size,
            backup_count: self.list_backups().len(),
            data_dir: self.config.data_dir.clone(),
        })
    }
}

/// Storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub file_size: u64,
    pub backup_count: usize,
    pub data_dir: PathBuf,
}

fn read_snapshot(path: &Path) -> Result<LedgerSnapshot, StorageError> {
    let reader = BufReader::new(fs::File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Save a ledger snapshot to a specific file path
pub fn save_to_file(ledger: &Ledger, path: &Path) -> Result<(), StorageError> {
    let writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(writer, &LedgerSnapshot::new(ledger))?;
    Ok(())
}

/// Load a ledger snapshot from a specific file path
pub fn load_from_file(
    path: &Path,
    programs: impl IntoIterator<Item = Arc<dyn Program>>,
) -> Result<Ledger, StorageError> {
    read_snapshot(path)?.into_ledger(programs)
}
