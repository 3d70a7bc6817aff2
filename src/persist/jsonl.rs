//! Flat-file storage: one JSON line per record.
//!
//! A data directory holds three files:
//! - `queue.jsonl`, rewritten whole through a temp file + rename
//! - `transactions.jsonl`, opened in append mode only
//! - `availability.json`, the counter record
//!
//! Missing files read as empty stores. A torn final line in the log (an
//! append cut short) is skipped on read and cut off before the next append.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::{
    entry::QueueEntry,
    journal::{StoredTransaction, StoredTransactionEnvelope, TransactionRecord, decode_stored_transaction},
    types::{Availability, LogSeq},
};

use super::{PersistError, PersistResult, Storage};

const QUEUE_FILE: &str = "queue.jsonl";
const LOG_FILE: &str = "transactions.jsonl";
const COUNTER_FILE: &str = "availability.json";

/// Paths of the three flat files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    /// Pending entries, rewritten whole.
    pub queue: PathBuf,
    /// Append-only transaction log.
    pub transactions: PathBuf,
    /// Availability counter record.
    pub counter: PathBuf,
}

impl DataPaths {
    /// Standard file names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            queue: dir.join(QUEUE_FILE),
            transactions: dir.join(LOG_FILE),
            counter: dir.join(COUNTER_FILE),
        }
    }
}

/// JSONL implementation of [`crate::persist::Storage`].
#[derive(Debug)]
pub struct JsonlStorage {
    paths: DataPaths,
    next_seq: Option<LogSeq>,
}

impl JsonlStorage {
    /// Uses (and creates if needed) the data directory `dir`.
    pub fn open(dir: impl AsRef<Path>) -> PersistResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;
        Ok(Self::with_paths(DataPaths::in_dir(dir)))
    }

    /// Uses explicit file paths; parent directories are created on first write.
    pub fn with_paths(paths: DataPaths) -> Self {
        Self {
            paths,
            next_seq: None,
        }
    }

    /// File locations in use.
    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    fn peek_next_seq(&self) -> PersistResult<LogSeq> {
        match self.next_seq {
            Some(seq) => Ok(seq),
            None => Ok(self
                .load_transactions()?
                .last()
                .map(|s| s.seq + 1)
                .unwrap_or(1)),
        }
    }
}

impl Storage for JsonlStorage {
    fn load_queue(&self) -> PersistResult<Vec<QueueEntry>> {
        read_lines(&self.paths.queue, Tail::Strict, |line| Ok(serde_json::from_str(line)?))
    }

    fn save_queue(&mut self, entries: &[QueueEntry]) -> PersistResult<()> {
        write_atomic(&self.paths.queue, |writer| {
            for entry in entries {
                serde_json::to_writer(&mut *writer, entry)?;
                writer.write_all(b"\n").map_err(|e| PersistError::io(&self.paths.queue, e))?;
            }
            Ok(())
        })
    }

    fn append_transaction(&mut self, record: &TransactionRecord) -> PersistResult<LogSeq> {
        let path = &self.paths.transactions;
        ensure_parent(path)?;
        repair_torn_tail(path)?;
        let seq = self.peek_next_seq()?;

        let mut line = serde_json::to_vec(&StoredTransactionEnvelope::new(StoredTransaction {
            seq,
            record: record.clone(),
        }))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PersistError::io(path, e))?;
        file.write_all(&line).map_err(|e| PersistError::io(path, e))?;
        self.next_seq = Some(seq + 1);
        Ok(seq)
    }

    fn load_transactions(&self) -> PersistResult<Vec<StoredTransaction>> {
        read_lines(&self.paths.transactions, Tail::SkipTorn, |line| {
            decode_stored_transaction(line.as_bytes()).map_err(PersistError::Corrupt)
        })
    }

    fn load_counter(&self) -> PersistResult<Option<Availability>> {
        let path = &self.paths.counter;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path).map_err(|e| PersistError::io(path, e))?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save_counter(&mut self, availability: &Availability) -> PersistResult<()> {
        write_atomic(&self.paths.counter, |writer| {
            serde_json::to_writer(&mut *writer, availability)?;
            Ok(())
        })
    }

    fn flush(&mut self) -> PersistResult<()> {
        let path = &self.paths.transactions;
        if path.exists() {
            File::open(path)
                .and_then(|f| f.sync_all())
                .map_err(|e| PersistError::io(path, e))?;
        }
        Ok(())
    }
}

/// How [`read_lines`] treats an undecodable last line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Strict,
    SkipTorn,
}

fn read_lines<T>(
    path: &Path,
    tail: Tail,
    decode: impl Fn(&str) -> PersistResult<T>,
) -> PersistResult<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(PersistError::io(path, err)),
    };

    let mut lines = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| PersistError::io(path, e))?;
        if !line.trim().is_empty() {
            lines.push((line_no + 1, line));
        }
    }

    let last = lines.len();
    let mut out = Vec::with_capacity(last);
    for (idx, (line_no, line)) in lines.iter().enumerate() {
        match decode(line.trim()) {
            Ok(item) => out.push(item),
            Err(err) if tail == Tail::SkipTorn && idx + 1 == last => {
                warn!(path = %path.display(), line = line_no, error = %err, "skipping torn final line");
            }
            Err(err) => {
                return Err(PersistError::Corrupt(format!(
                    "{} line {line_no}: {}",
                    path.display(),
                    corrupt_detail(err)
                )));
            }
        }
    }
    Ok(out)
}

fn corrupt_detail(err: PersistError) -> String {
    match err {
        PersistError::Corrupt(detail) => detail,
        other => other.to_string(),
    }
}

/// Makes the log end on a record boundary before appending.
///
/// An unterminated last line that still decodes gets its newline; one that
/// does not is truncated away.
fn repair_torn_tail(path: &Path) -> PersistResult<()> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(PersistError::io(path, err)),
    };
    let io = |e| PersistError::io(path, e);

    let len = file.metadata().map_err(io)?.len();
    if len == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1)).map_err(io)?;
    file.read_exact(&mut last).map_err(io)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0)).map_err(io)?;
    file.read_to_end(&mut bytes).map_err(io)?;
    let start = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |pos| pos + 1);

    if decode_stored_transaction(&bytes[start..]).is_ok() {
        file.seek(SeekFrom::End(0)).map_err(io)?;
        file.write_all(b"\n").map_err(io)?;
    } else {
        warn!(
            path = %path.display(),
            dropped_bytes = bytes.len() - start,
            "truncating torn final line"
        );
        file.set_len(start as u64).map_err(io)?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> PersistResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
    }
    Ok(())
}

fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> PersistResult<()>,
) -> PersistResult<()> {
    ensure_parent(path)?;

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> PersistResult<()> {
        let file = File::create(&tmp_path).map_err(|e| PersistError::io(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        let file = writer
            .into_inner()
            .map_err(|e| PersistError::io(&tmp_path, e.into_error()))?;
        file.sync_all().map_err(|e| PersistError::io(&tmp_path, e))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        PersistError::io(path, e)
    })
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::types::{TicketStatus, TicketType};

    #[test]
    fn missing_files_read_as_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = JsonlStorage::open(tmp.path().join("data")).unwrap();
        assert!(storage.load_queue().unwrap().is_empty());
        assert!(storage.load_transactions().unwrap().is_empty());
        assert_eq!(storage.load_counter().unwrap(), None);
    }

    #[test]
    fn append_resumes_sequence_after_reopen() {
        let tmp = TempDir::new().unwrap();
        let entry = QueueEntry::new("Ada", "Lovelace", TicketType::Regular, Utc::now());

        let mut storage = JsonlStorage::open(tmp.path()).unwrap();
        let record = TransactionRecord::settle(&entry, TicketStatus::Confirmed, Utc::now());
        assert_eq!(storage.append_transaction(&record).unwrap(), 1);
        assert_eq!(storage.append_transaction(&record).unwrap(), 2);
        drop(storage);

        let mut reopened = JsonlStorage::open(tmp.path()).unwrap();
        assert_eq!(reopened.append_transaction(&record).unwrap(), 3);
        let seqs: Vec<LogSeq> = reopened
            .load_transactions()
            .unwrap()
            .iter()
            .map(|s| s.seq)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn corrupt_line_reports_location() {
        let tmp = TempDir::new().unwrap();
        let storage = JsonlStorage::open(tmp.path()).unwrap();
        fs::write(&storage.paths().queue, "{not json}\n").unwrap();
        let err = storage.load_queue().unwrap_err();
        assert!(matches!(err, PersistError::Corrupt(ref msg) if msg.contains("line 1")));
    }

    fn record(first: &str) -> TransactionRecord {
        let entry = QueueEntry::new(first, "Doe", TicketType::Vip, Utc::now());
        TransactionRecord::settle(&entry, TicketStatus::Confirmed, Utc::now())
    }

    fn append_raw(path: &Path, bytes: &[u8]) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(bytes).unwrap();
    }

    #[test]
    fn torn_log_tail_is_skipped_then_cut_before_next_append() {
        let tmp = TempDir::new().unwrap();
        let mut storage = JsonlStorage::open(tmp.path()).unwrap();
        storage.append_transaction(&record("A")).unwrap();
        append_raw(&storage.paths().transactions, br#"{"format_ver"#);

        let mut reopened = JsonlStorage::open(tmp.path()).unwrap();
        assert_eq!(reopened.load_transactions().unwrap().len(), 1);
        assert_eq!(reopened.append_transaction(&record("B")).unwrap(), 2);

        let raw = fs::read_to_string(&reopened.paths().transactions).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(!raw.contains("format_ver\""));
        let names: Vec<_> = reopened
            .load_transactions()
            .unwrap()
            .into_iter()
            .map(|s| s.record.first_name)
            .collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn unterminated_but_complete_tail_is_kept() {
        let tmp = TempDir::new().unwrap();
        let mut storage = JsonlStorage::open(tmp.path()).unwrap();
        let stored = StoredTransaction {
            seq: 1,
            record: record("A"),
        };
        let line = serde_json::to_vec(&StoredTransactionEnvelope::new(stored)).unwrap();
        fs::write(&storage.paths().transactions, line).unwrap();

        assert_eq!(storage.append_transaction(&record("B")).unwrap(), 2);
        assert_eq!(storage.load_transactions().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_middle_of_log_is_an_error_with_one_prefix() {
        let tmp = TempDir::new().unwrap();
        let mut storage = JsonlStorage::open(tmp.path()).unwrap();
        storage.append_transaction(&record("A")).unwrap();
        append_raw(&storage.paths().transactions, b"garbage\n");
        storage.append_transaction(&record("B")).unwrap();

        let mut fresh = JsonlStorage::open(tmp.path()).unwrap();
        let err = fresh.load_transactions().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 2"), "{msg}");
        assert_eq!(msg.matches("corrupt store").count(), 1, "{msg}");
        assert!(fresh.append_transaction(&record("C")).is_err());
    }

    #[test]
    fn failed_append_does_not_consume_a_sequence() {
        let tmp = TempDir::new().unwrap();
        let mut storage = JsonlStorage::open(tmp.path()).unwrap();
        let log = storage.paths().transactions.clone();
        let parked = tmp.path().join("parked.jsonl");
        assert_eq!(storage.append_transaction(&record("A")).unwrap(), 1);

        fs::rename(&log, &parked).unwrap();
        fs::create_dir(&log).unwrap();
        assert!(storage.append_transaction(&record("B")).is_err());
        fs::remove_dir(&log).unwrap();
        fs::rename(&parked, &log).unwrap();

        assert_eq!(storage.append_transaction(&record("B")).unwrap(), 2);
        let seqs: Vec<LogSeq> = storage
            .load_transactions()
            .unwrap()
            .iter()
            .map(|s| s.seq)
            .collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn save_queue_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let mut storage = JsonlStorage::open(tmp.path()).unwrap();
        let entry = QueueEntry::new("Ada", "Lovelace", TicketType::Vip, Utc::now());
        storage.save_queue(&[entry.clone()]).unwrap();
        storage.save_queue(&[entry.clone(), entry]).unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(storage.load_queue().unwrap().len(), 2);
    }
}
