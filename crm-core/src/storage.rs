use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOCK_FILE_NAME: &str = ".autocrm.lock";
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Handles saving and loading collection snapshots in a data directory with
/// file locking, so two `crm` invocations never interleave a write
pub struct Storage {
    dir: PathBuf,
    lock_file_path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance rooted at `dir`
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let lock_file_path = dir.join(LOCK_FILE_NAME);
        Self {
            dir,
            lock_file_path,
        }
    }

    /// Returns the data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding the snapshot for `key`
    pub fn file_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Acquire an exclusive lock on the directory for writing
    /// Returns the lock file handle which must be held during the operation
    fn acquire_write_lock(&self) -> Result<File> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory: {:?}", self.dir))?;

        let mut lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to create lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(&lock_file, |f| FileExt::try_lock_exclusive(f))?;

        // Lock holder info, for debugging stale locks
        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        Ok(lock_file)
    }

    /// Acquire a shared lock for reading
    fn acquire_read_lock(&self) -> Result<Option<File>> {
        if !self.lock_file_path.exists() {
            return Ok(None);
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to open lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(&lock_file, |f| FileExt::try_lock_shared(f))?;
        Ok(Some(lock_file))
    }

    fn wait_for_lock(
        &self,
        lock_file: &File,
        try_lock: impl Fn(&File) -> std::io::Result<()>,
    ) -> Result<()> {
        let start = std::time::Instant::now();
        loop {
            match try_lock(lock_file) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        anyhow::bail!(
                            "Timeout waiting for lock - another process is writing to {:?}",
                            self.dir
                        );
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to acquire lock on {:?}", self.lock_file_path)
                    })
                }
            }
        }
    }

    fn read_unlocked(&self, key: &str) -> Result<Option<String>> {
        let path = self.file_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read collection file: {:?}", path))?;
        Ok(Some(json))
    }

    fn write_unlocked(&self, key: &str, json: &str) -> Result<()> {
        let path = self.file_for(key);
        fs::write(&path, json)
            .with_context(|| format!("Failed to write collection file: {:?}", path))
    }

    /// Loads the snapshot for `key`, `None` if it was never written
    pub fn load(&self, key: &str) -> Result<Option<String>> {
        let _lock = self.acquire_read_lock()?;
        self.read_unlocked(key)
    }

    /// Saves the snapshot for `key` with file locking
    pub fn save(&self, key: &str, json: &str) -> Result<()> {
        let _lock = self.acquire_write_lock()?;
        self.write_unlocked(key, json)
        // Lock is automatically released when the handle is dropped
    }

    /// Perform an atomic read-modify-write with the exclusive lock held
    /// across both steps. `update_fn` returns `None` to skip the write
    pub fn update_atomically<F>(&self, key: &str, update_fn: F) -> Result<()>
    where
        F: FnOnce(Option<&str>) -> Result<Option<String>>,
    {
        let _lock = self.acquire_write_lock()?;
        let current = self.read_unlocked(key)?;
        if let Some(next) = update_fn(current.as_deref())? {
            self.write_unlocked(key, &next)?;
        }
        Ok(())
    }

    /// Lists the collection keys present in the directory
    pub fn keys(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list data directory: {:?}", self.dir))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_key_loads_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("data"));
        assert!(storage.load("autocrm_contacts").unwrap().is_none());
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_save_creates_directory_and_lists_key() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("nested").join("data"));

        storage.save("autocrm_deals", "[]").unwrap();

        assert_eq!(storage.load("autocrm_deals").unwrap().as_deref(), Some("[]"));
        assert_eq!(storage.keys().unwrap(), vec!["autocrm_deals".to_string()]);
    }

    #[test]
    fn test_update_atomically_can_skip_write() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());

        storage
            .update_atomically("autocrm_tasks", |current| {
                assert!(current.is_none());
                Ok(None)
            })
            .unwrap();
        assert!(storage.load("autocrm_tasks").unwrap().is_none());

        storage
            .update_atomically("autocrm_tasks", |_| Ok(Some("[1]".to_string())))
            .unwrap();
        assert_eq!(storage.load("autocrm_tasks").unwrap().as_deref(), Some("[1]"));
    }
}
