//! On-disk embedding cache.
//!
//! Format (little endian):
//! `magic "MMIC" | version u32 | dim u32 | count u64 |
//!  [id_len u32 | id | path_len u32 | path | size u64 | mtime_ms i64 | f32 * dim] ...`

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{CorpusIndex, FileFingerprint, ImageRecord};
use crate::error::{Result, VectorDbError};
use crate::vector::EmbeddingVector;

const MAGIC: &[u8; 4] = b"MMIC";
const VERSION: u32 = 1;
/// Upper bound for a single string field; anything larger means a corrupt file.
const MAX_STR_LEN: u32 = 64 * 1024;
/// Upper bound for the vector dimension.
const MAX_DIM: usize = 65_536;
/// magic + version + dim + count.
const HEADER_LEN: u64 = 4 + 4 + 4 + 8;
/// Smallest possible record without its vector: two empty strings, size, mtime.
const RECORD_FIXED_LEN: u64 = 4 + 4 + 8 + 8;

/// Write `index` to `path` atomically (temp file in the same directory, then rename).
pub fn save_cache(index: &CorpusIndex, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(VERSION)?;
        w.write_u32::<LittleEndian>(index.dimension().unwrap_or(0) as u32)?;
        w.write_u64::<LittleEndian>(index.size() as u64)?;
        for record in index.all() {
            write_str(&mut w, &record.identifier)?;
            write_str(&mut w, &record.source_path.to_string_lossy())?;
            w.write_u64::<LittleEndian>(record.fingerprint.size_bytes)?;
            w.write_i64::<LittleEndian>(record.fingerprint.modified_unix_ms)?;
            for &val in record.vector.as_slice() {
                w.write_f32::<LittleEndian>(val)?;
            }
        }
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| VectorDbError::Io(e.error))?;
    tracing::debug!(path = %path.display(), records = index.size(), "saved embedding cache");
    Ok(())
}

/// Read a cache written by [`save_cache`].
pub fn load_cache(path: &Path) -> Result<CorpusIndex> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(VectorDbError::Cache("bad magic".into()));
    }
    let version = r.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(VectorDbError::Cache(format!("unsupported version {version}")));
    }
    let dim = r.read_u32::<LittleEndian>()? as usize;
    let count = r.read_u64::<LittleEndian>()?;
    if count > 0 && dim == 0 {
        return Err(VectorDbError::Cache("records without a dimension".into()));
    }
    if dim > MAX_DIM {
        return Err(VectorDbError::Cache(format!("dimension {dim} exceeds {MAX_DIM}")));
    }
    // Header fields are checked against the file size before anything is allocated.
    let needed = count
        .checked_mul(RECORD_FIXED_LEN + 4 * dim as u64)
        .and_then(|n| n.checked_add(HEADER_LEN));
    if needed.map_or(true, |n| n > file_len) {
        return Err(VectorDbError::Cache(format!(
            "{count} records of dimension {dim} do not fit in {file_len} bytes"
        )));
    }

    let mut index = CorpusIndex::new();
    for _ in 0..count {
        let identifier = read_str(&mut r)?;
        let source_path = PathBuf::from(read_str(&mut r)?);
        let fingerprint = FileFingerprint {
            size_bytes: r.read_u64::<LittleEndian>()?,
            modified_unix_ms: r.read_i64::<LittleEndian>()?,
        };
        let mut values = vec![0f32; dim];
        r.read_f32_into::<LittleEndian>(&mut values)?;
        let vector = EmbeddingVector::from_normalized(values)
            .map_err(|e| VectorDbError::Cache(format!("record {identifier}: {e}")))?;
        index.insert(ImageRecord::new(identifier, vector, source_path).with_fingerprint(fingerprint))?;
    }
    Ok(index)
}

fn write_str(w: &mut impl Write, s: &str) -> Result<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_str(r: &mut impl Read) -> Result<String> {
    let len = r.read_u32::<LittleEndian>()?;
    if len > MAX_STR_LEN {
        return Err(VectorDbError::Cache(format!("string field of {len} bytes")));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| VectorDbError::Cache("non-utf8 string field".into()))
}
