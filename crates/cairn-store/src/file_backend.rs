// file_backend.rs — FileBackend: a directory of JSON files as the durable replica.
//
// Layout under the root directory:
//   <table>.jsonl          log tables, one entry per line, oldest first
//   <table>/<id>.json      one file per entity of an object table
//   <table>/_ids.json      ordered index of live ids for that table
//   <table>.json           singleton record
//
// Logs are append-only between trims. A log may run up to a tenth over its
// capacity before it is rewritten; loads still return at most `max_len`
// entries. Everything stays inspectable with jq or grep.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::backend::DurableBackend;
use crate::entry::MemoryEntry;
use crate::error::StoreError;

const INDEX_FILE: &str = "_ids.json";

/// Durable backend writing JSON/JSONL files under one directory.
pub struct FileBackend {
    root: PathBuf,
    /// Line counts of log files seen so far, so trimming need not reread them.
    log_lens: HashMap<String, usize>,
}

impl FileBackend {
    /// Create a backend rooted at `root`. Nothing touches the disk until
    /// [`DurableBackend::connect`] is called.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            log_lens: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn log_file(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", table))
    }

    fn object_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    fn singleton_file(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}.json", table))
    }

    fn object_file(&self, table: &str, id: &str) -> Result<PathBuf, StoreError> {
        // Entity ids become file names, so they must not escape the table dir.
        if id.is_empty()
            || id == INDEX_FILE.trim_end_matches(".json")
            || id.contains(['/', '\\'])
            || id.starts_with('.')
        {
            return Err(StoreError::InvalidKey {
                table: table.to_string(),
                key: id.to_string(),
            });
        }
        Ok(self.object_dir(table).join(format!("{}.json", id)))
    }

    fn read_lines(path: &Path) -> Result<Vec<String>, StoreError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|source| io_error(path, source))?;
        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| io_error(path, source))?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    fn read_index(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let path = self.object_dir(table).join(INDEX_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write_index(&self, table: &str, ids: &[String]) -> Result<(), StoreError> {
        let path = self.object_dir(table).join(INDEX_FILE);
        let json = serde_json::to_string_pretty(ids)?;
        fs::write(&path, json).map_err(|source| io_error(&path, source))
    }
}

impl DurableBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    fn connect(&mut self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| io_error(&self.root, source))?;

        // Probe for writability so a read-only mount fails here, not on the
        // first replicated write.
        let probe = self.root.join(".probe");
        fs::write(&probe, b"ok").map_err(|source| StoreError::BackendUnavailable {
            backend: self.name().to_string(),
            reason: format!("{} is not writable: {}", self.root.display(), source),
        })?;
        fs::remove_file(&probe).map_err(|source| io_error(&probe, source))?;
        Ok(())
    }

    fn push_log(&mut self, table: &str, entry: &MemoryEntry) -> Result<(), StoreError> {
        let path = self.log_file(table);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(entry)?;
        writeln!(writer, "{}", json).map_err(|source| io_error(&path, source))?;
        writer.flush().map_err(|source| io_error(&path, source))?;
        if let Some(len) = self.log_lens.get_mut(table) {
            *len += 1;
        }
        Ok(())
    }

    fn trim_log(&mut self, table: &str, max_len: usize) -> Result<(), StoreError> {
        let path = self.log_file(table);
        let len = match self.log_lens.get(table) {
            Some(len) => *len,
            None => {
                let len = Self::read_lines(&path)?.len();
                self.log_lens.insert(table.to_string(), len);
                len
            }
        };
        if len <= max_len + max_len / 10 {
            return Ok(());
        }

        let lines = Self::read_lines(&path)?;
        let keep = &lines[lines.len().saturating_sub(max_len)..];
        let file = File::create(&path).map_err(|source| io_error(&path, source))?;
        let mut writer = BufWriter::new(file);
        for line in keep {
            writeln!(writer, "{}", line).map_err(|source| io_error(&path, source))?;
        }
        writer.flush().map_err(|source| io_error(&path, source))?;
        self.log_lens.insert(table.to_string(), keep.len());
        tracing::debug!(table, kept = keep.len(), dropped = lines.len() - keep.len(), "trimmed log file");
        Ok(())
    }

    fn load_log(&mut self, table: &str, max_len: usize) -> Result<Vec<MemoryEntry>, StoreError> {
        let path = self.log_file(table);
        let lines = Self::read_lines(&path)?;
        self.log_lens.insert(table.to_string(), lines.len());

        let mut entries: Vec<MemoryEntry> = Vec::new();
        for (number, line) in lines.iter().enumerate().rev() {
            if entries.len() == max_len {
                break;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(table, line = number + 1, "skipping unreadable log line: {}", e)
                }
            }
        }
        entries.reverse();
        Ok(entries)
    }

    fn put_object(&mut self, table: &str, entry: &MemoryEntry) -> Result<(), StoreError> {
        let path = self.object_file(table, &entry.id)?;
        let dir = self.object_dir(table);
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;

        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&path, json).map_err(|source| io_error(&path, source))?;

        let mut ids = self.read_index(table)?;
        if !ids.iter().any(|id| id == &entry.id) {
            ids.push(entry.id.clone());
            self.write_index(table, &ids)?;
        }
        Ok(())
    }

    fn delete_object(&mut self, table: &str, id: &str) -> Result<(), StoreError> {
        let path = self.object_file(table, id)?;
        if path.exists() {
            fs::remove_file(&path).map_err(|source| io_error(&path, source))?;
        }

        let mut ids = self.read_index(table)?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() != before {
            self.write_index(table, &ids)?;
        }
        Ok(())
    }

    fn load_objects(&mut self, table: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        let mut entries = Vec::new();
        for id in self.read_index(table)? {
            let path = self.object_file(table, &id)?;
            if !path.exists() {
                tracing::warn!(table, id = %id, "indexed entity has no file, skipping");
                continue;
            }
            let json = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
            entries.push(serde_json::from_str(&json)?);
        }
        Ok(entries)
    }

    fn set_singleton(&mut self, table: &str, entry: &MemoryEntry) -> Result<(), StoreError> {
        let path = self.singleton_file(table);
        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&path, json).map_err(|source| io_error(&path, source))
    }

    fn load_singleton(&mut self, table: &str) -> Result<Option<MemoryEntry>, StoreError> {
        let path = self.singleton_file(table);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::IoError {
        path: path.display().to_string(),
        source,
    }
}
