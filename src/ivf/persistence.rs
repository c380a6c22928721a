//! Binary snapshot format for an IVF index.
//!
//! ```text
//! magic      4 bytes   b"IVFX"
//! version    u32
//! dim        u32
//! metric     u8         0=L2, 1=Cosine, 2=DotProduct
//! n_clusters u64
//! centroids[n_clusters]:
//!   dim * f32
//! lists[n_clusters]:
//!   count      u64
//!   ids        count * u64
//!   vectors    count * dim * f32
//! ```

use std::io::{Read, Write};

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::ivf::index::{IvfList, IvfState};

const MAGIC: &[u8; 4] = b"IVFX";
const VERSION: u32 = 1;

fn metric_tag(metric: DistanceMetric) -> u8 {
    match metric {
        DistanceMetric::L2 => 0,
        DistanceMetric::Cosine => 1,
        DistanceMetric::DotProduct => 2,
    }
}

fn metric_from_tag(tag: u8) -> Result<DistanceMetric> {
    match tag {
        0 => Ok(DistanceMetric::L2),
        1 => Ok(DistanceMetric::Cosine),
        2 => Ok(DistanceMetric::DotProduct),
        other => Err(Error::InvalidState(format!("unknown distance metric tag {other}"))),
    }
}

fn write_u8(w: &mut dyn Write, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u32(w: &mut dyn Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u64(w: &mut dyn Write, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f32(w: &mut dyn Write, v: f32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u8(r: &mut dyn Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32(r: &mut dyn Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut dyn Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32(r: &mut dyn Read) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

pub fn write(state: &IvfState, dim: usize, metric: DistanceMetric, writer: &mut dyn Write) -> Result<()> {
    writer.write_all(MAGIC)?;
    write_u32(writer, VERSION)?;
    write_u32(writer, dim as u32)?;
    write_u8(writer, metric_tag(metric))?;

    write_u64(writer, state.centroids.len() as u64)?;
    for centroid in &state.centroids {
        for &component in centroid {
            write_f32(writer, component)?;
        }
    }

    for list in &state.lists {
        write_u64(writer, list.ids.len() as u64)?;
        for &id in &list.ids {
            write_u64(writer, id)?;
        }
        for &component in &list.vectors {
            write_f32(writer, component)?;
        }
    }

    Ok(())
}

pub fn read(expected_dim: usize, expected_metric: DistanceMetric, reader: &mut dyn Read) -> Result<IvfState> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::InvalidState("ivf snapshot: bad magic".into()));
    }

    let version = read_u32(reader)?;
    if version != VERSION {
        return Err(Error::InvalidState(format!("ivf snapshot: unsupported version {version}")));
    }

    let dim = read_u32(reader)? as usize;
    if dim != expected_dim {
        return Err(Error::DimensionMismatch {
            expected: expected_dim,
            actual: dim,
        });
    }

    let metric = metric_from_tag(read_u8(reader)?)?;
    if metric != expected_metric {
        return Err(Error::InvalidState("ivf snapshot: distance metric mismatch".into()));
    }

    let n_clusters = read_u64(reader)? as usize;
    let mut centroids = Vec::with_capacity(n_clusters);
    for _ in 0..n_clusters {
        let mut centroid = Vec::with_capacity(dim);
        for _ in 0..dim {
            centroid.push(read_f32(reader)?);
        }
        centroids.push(centroid);
    }

    let mut lists = Vec::with_capacity(n_clusters);
    let mut id_to_list = std::collections::HashMap::new();
    for cluster in 0..n_clusters {
        let count = read_u64(reader)? as usize;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id = read_u64(reader)?;
            ids.push(id);
            id_to_list.insert(id, cluster);
        }
        let mut vectors = Vec::with_capacity(count * dim);
        for _ in 0..count * dim {
            vectors.push(read_f32(reader)?);
        }
        lists.push(IvfList { ids, vectors });
    }

    Ok(IvfState { centroids, lists, id_to_list })
}
