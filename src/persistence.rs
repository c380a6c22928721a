//! Top-level snapshot orchestration: the vector store file and the index
//! file.
//!
//! `index.bin` holds exactly the active backend's own framed format (see
//! [`crate::hnsw::persistence`], `crate::ivf::persistence`) with no wrapper
//! around it — `config.json`, read before either file on load, already names
//! the index kind, and the backend's own magic rejects a file written by the
//! wrong kind just as well as a dedicated header would.
//!
//! Both files are written to a `.tmp` sibling and renamed into place, so a
//! crash mid-write never leaves a half-written file at the name `load`
//! actually reads.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::vector::{Vector, VectorId, VectorRecord};

const VECTORS_MAGIC: &[u8; 4] = b"LYNX";
const VECTORS_VERSION: u32 = 1;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const INDEX_FILE: &str = "index.bin";

fn atomic_write(path: &Path, write_body: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        write_body(&mut writer)?;
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Writes every `(id, record)` pair to `vectors.bin` under `dir`.
pub fn write_vectors(dir: &Path, records: &HashMap<VectorId, VectorRecord>, dimension: usize) -> Result<()> {
    fs::create_dir_all(dir)?;
    atomic_write(&dir.join(VECTORS_FILE), |writer| {
        writer.write_all(VECTORS_MAGIC)?;
        writer.write_all(&VECTORS_VERSION.to_le_bytes())?;
        writer.write_all(&(records.len() as u64).to_le_bytes())?;
        writer.write_all(&(dimension as u64).to_le_bytes())?;

        for record in records.values() {
            writer.write_all(&record.id.to_le_bytes())?;
            for &component in record.vector.as_slice() {
                writer.write_all(&component.to_le_bytes())?;
            }
            match &record.metadata {
                Some(bytes) => {
                    writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
                    writer.write_all(bytes)?;
                }
                None => writer.write_all(&0u32.to_le_bytes())?,
            }
        }
        Ok(())
    })
}

/// Reads `vectors.bin` from `dir`, validating it matches `expected_dim`.
pub fn read_vectors(dir: &Path, expected_dim: usize) -> Result<HashMap<VectorId, VectorRecord>> {
    let file = File::open(dir.join(VECTORS_FILE))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != VECTORS_MAGIC {
        return Err(Error::InvalidState("vectors snapshot: bad magic".into()));
    }

    let mut version_buf = [0u8; 4];
    reader.read_exact(&mut version_buf)?;
    if u32::from_le_bytes(version_buf) != VECTORS_VERSION {
        return Err(Error::InvalidState("vectors snapshot: unsupported version".into()));
    }

    let mut count_buf = [0u8; 8];
    reader.read_exact(&mut count_buf)?;
    let count = u64::from_le_bytes(count_buf);

    let mut dim_buf = [0u8; 8];
    reader.read_exact(&mut dim_buf)?;
    let dim = u64::from_le_bytes(dim_buf) as usize;
    if dim != expected_dim {
        return Err(Error::DimensionMismatch {
            expected: expected_dim,
            actual: dim,
        });
    }

    let mut records = HashMap::with_capacity(count as usize);
    for _ in 0..count {
        let mut id_buf = [0u8; 8];
        reader.read_exact(&mut id_buf)?;
        let id = u64::from_le_bytes(id_buf);

        let mut data = Vec::with_capacity(dim);
        for _ in 0..dim {
            let mut f_buf = [0u8; 4];
            reader.read_exact(&mut f_buf)?;
            data.push(f32::from_le_bytes(f_buf));
        }

        let mut meta_len_buf = [0u8; 4];
        reader.read_exact(&mut meta_len_buf)?;
        let meta_len = u32::from_le_bytes(meta_len_buf) as usize;
        let metadata = if meta_len == 0 {
            None
        } else {
            let mut bytes = vec![0u8; meta_len];
            reader.read_exact(&mut bytes)?;
            Some(bytes)
        };

        records.insert(
            id,
            VectorRecord {
                id,
                vector: Vector::new(data),
                metadata,
            },
        );
    }

    Ok(records)
}

/// Writes `index.bin`, handing the writer straight to `write_body` — the
/// backend's own magic and framing are the only header this file gets.
pub fn write_index(dir: &Path, write_body: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    fs::create_dir_all(dir)?;
    atomic_write(&dir.join(INDEX_FILE), write_body)
}

/// Reads `index.bin`, handing the reader straight to `read_body`. The
/// backend's own `deserialize` is responsible for rejecting a mismatched
/// magic (e.g. config names `Ivf` but the file holds an `Hnsw` snapshot).
pub fn read_index<T>(dir: &Path, read_body: impl FnOnce(&mut dyn Read) -> Result<T>) -> Result<T> {
    let file = File::open(dir.join(INDEX_FILE))?;
    let mut reader = BufReader::new(file);
    read_body(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn vectors_round_trip_with_and_without_metadata() {
        let dir = tempdir().unwrap();
        let mut records = HashMap::new();
        records.insert(1, VectorRecord::new(1, Vector::new(vec![1.0, 2.0])));
        records.insert(2, VectorRecord::with_metadata(2, Vector::new(vec![3.0, 4.0]), vec![9, 9]));

        write_vectors(dir.path(), &records, 2).unwrap();
        let loaded = read_vectors(dir.path(), 2).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&1].metadata, None);
        assert_eq!(loaded[&2].metadata, Some(vec![9, 9]));
    }

    #[test]
    fn vectors_dimension_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let records = HashMap::new();
        write_vectors(dir.path(), &records, 4).unwrap();
        assert!(matches!(read_vectors(dir.path(), 8), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn index_round_trips_body_with_no_added_framing() {
        let dir = tempdir().unwrap();
        write_index(dir.path(), |w| {
            w.write_all(&[1, 2, 3])?;
            Ok(())
        })
        .unwrap();

        let body = read_index(dir.path(), |r| {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf)?;
            Ok(buf)
        })
        .unwrap();
        assert_eq!(body, vec![1, 2, 3]);
    }
}
