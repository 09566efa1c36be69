//! Binary snapshot format: `u64 entry_count`, then per entry the
//! length-prefixed key, a value tag (`0` = string with length-prefixed
//! bytes, `1` = list as a count of length-prefixed elements), a `u8`
//! expiry flag, and, when set, the expiry deadline as `i64` milliseconds
//! since the Unix epoch. Integers are host-endian; the format carries no
//! version marker.

use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::time::{Duration, Instant};

use crate::store::{Entry, Value};

const TAG_STRING: u8 = 0;
const TAG_LIST: u8 = 1;

/// Largest length prefix accepted when reading. A corrupt file cannot ask
/// for an absurd allocation.
const MAX_CHUNK: u64 = 512 * 1024 * 1024;

/// Serializes every live entry to `path`. The snapshot is written to a
/// temporary sibling file and renamed into place, so a crash mid-write
/// never leaves a truncated snapshot behind.
pub(crate) fn save(entries: &HashMap<String, Entry>, path: &Path) -> io::Result<()> {
    let now = Instant::now();
    let live: Vec<(&String, &Entry)> = entries
        .iter()
        .filter(|(_, entry)| !entry.is_expired(now))
        .collect();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("tmp");
    let mut file = BufWriter::new(File::create(&tmp)?);

    write_u64(&mut file, live.len() as u64)?;
    for (key, entry) in live {
        write_chunk(&mut file, key.as_bytes())?;
        match &entry.value {
            Value::String(data) => {
                write_u8(&mut file, TAG_STRING)?;
                write_chunk(&mut file, data)?;
            }
            Value::List(items) => {
                write_u8(&mut file, TAG_LIST)?;
                write_u64(&mut file, items.len() as u64)?;
                for item in items {
                    write_chunk(&mut file, item)?;
                }
            }
        }
        match entry.expires_at.and_then(deadline_to_unix_ms) {
            Some(ms) => {
                write_u8(&mut file, 1)?;
                write_i64(&mut file, ms)?;
            }
            None => write_u8(&mut file, 0)?,
        }
    }

    file.flush()?;
    drop(file);
    fs::rename(&tmp, path)?;

    Ok(())
}

/// Reads a snapshot into a fresh map. Entries whose deadline passed while
/// the snapshot sat on disk are dropped. Any read or decode error fails the
/// whole load; nothing partial escapes.
pub(crate) fn load(path: &Path) -> io::Result<HashMap<String, Entry>> {
    let mut file = BufReader::new(File::open(path)?);

    let count = read_u64(&mut file)?;
    let mut entries = HashMap::new();

    for _ in 0..count {
        let key = String::from_utf8(read_chunk(&mut file)?)
            .map_err(|_| corrupt("snapshot key is not valid UTF-8"))?;

        let value = match read_u8(&mut file)? {
            TAG_STRING => Value::String(Bytes::from(read_chunk(&mut file)?)),
            TAG_LIST => {
                let len = read_u64(&mut file)?;
                let mut items = VecDeque::new();
                for _ in 0..len {
                    items.push_back(Bytes::from(read_chunk(&mut file)?));
                }
                Value::List(items)
            }
            tag => return Err(corrupt(format!("unknown snapshot value tag {tag}"))),
        };

        let expiry_ms = match read_u8(&mut file)? {
            0 => None,
            _ => Some(read_i64(&mut file)?),
        };

        match expiry_ms {
            None => {
                entries.insert(
                    key,
                    Entry {
                        value,
                        expires_at: None,
                    },
                );
            }
            Some(ms) => {
                if let Some(deadline) = unix_ms_to_deadline(ms) {
                    entries.insert(
                        key,
                        Entry {
                            value,
                            expires_at: Some(deadline),
                        },
                    );
                }
            }
        }
    }

    Ok(entries)
}

/// Converts a monotonic deadline to wall-clock milliseconds so it stays
/// meaningful across a restart. `None` when the arithmetic cannot be
/// represented.
fn deadline_to_unix_ms(deadline: Instant) -> Option<i64> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    let absolute = SystemTime::now().checked_add(remaining)?;
    let since_epoch = absolute.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    i64::try_from(since_epoch.as_millis()).ok()
}

/// Converts stored wall-clock milliseconds back to a monotonic deadline.
/// `None` when the deadline already passed.
fn unix_ms_to_deadline(ms: i64) -> Option<Instant> {
    let ms = u64::try_from(ms).ok()?;
    let target = SystemTime::UNIX_EPOCH.checked_add(Duration::from_millis(ms))?;
    let remaining = target.duration_since(SystemTime::now()).ok()?;
    Some(Instant::now() + remaining)
}

fn corrupt(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn write_u8(writer: &mut impl Write, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

fn write_u64(writer: &mut impl Write, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_ne_bytes())
}

fn write_i64(writer: &mut impl Write, value: i64) -> io::Result<()> {
    writer.write_all(&value.to_ne_bytes())
}

fn write_chunk(writer: &mut impl Write, data: &[u8]) -> io::Result<()> {
    write_u64(writer, data.len() as u64)?;
    writer.write_all(data)
}

fn read_u8(reader: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u64(reader: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_ne_bytes(buf))
}

fn read_i64(reader: &mut impl Read) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_ne_bytes(buf))
}

fn read_chunk(reader: &mut impl Read) -> io::Result<Vec<u8>> {
    let len = read_u64(reader)?;
    if len > MAX_CHUNK {
        return Err(corrupt(format!("length prefix {len} exceeds limit")));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}
