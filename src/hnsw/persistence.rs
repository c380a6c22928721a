//! Binary snapshot format for an HNSW index.
//!
//! Framing is explicit field-by-field rather than a generic serialized blob
//! over the whole graph: a magic tag and version up front let a bad file (or
//! a future format change) fail fast on read instead of silently
//! misinterpreting bytes.
//!
//! ```text
//! magic      4 bytes   b"HNSW"
//! version    u32
//! dim        u32
//! metric     u8         0=L2, 1=Cosine, 2=DotProduct
//! m          u32
//! ef_constr  u32
//! ef_search  u32
//! max_elems  u64
//! has_entry  u8
//! entry_id   u64        (present only if has_entry == 1)
//! entry_lyr  u32
//! node_count u64
//! nodes[node_count]:
//!   id         u64
//!   vector     dim * f32
//!   max_layer  u32
//!   layers[max_layer + 1]:
//!     neighbor_count u32
//!     neighbor_ids   neighbor_count * u64
//! ```

use std::io::{Read, Write};

use crate::config::HnswParams;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::hnsw::graph::HnswState;
use crate::hnsw::node::HnswNode;

const MAGIC: &[u8; 4] = b"HNSW";
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

/// Writes `state` to `writer` in the framed format above.
pub fn write(state: &HnswState, metric: DistanceMetric, params: &HnswParams, writer: &mut dyn Write) -> Result<()> {
    writer.write_all(MAGIC)?;
    write_u32(writer, VERSION)?;
    write_u32(writer, state.buffer.dim() as u32)?;
    write_u8(writer, metric_tag(metric))?;
    write_u32(writer, params.m as u32)?;
    write_u32(writer, params.ef_construction as u32)?;
    write_u32(writer, params.ef_search as u32)?;
    write_u64(writer, params.max_elements as u64)?;

    match state.entry_point {
        Some(id) => {
            write_u8(writer, 1)?;
            write_u64(writer, id)?;
        }
        None => write_u8(writer, 0)?,
    }
    write_u32(writer, state.entry_layer as u32)?;

    write_u64(writer, state.nodes.len() as u64)?;
    for (&id, node) in &state.nodes {
        write_u64(writer, id)?;
        let vector = state.buffer.get(id).expect("graph node must have a stored vector");
        for &component in vector {
            write_f32(writer, component)?;
        }
        write_u32(writer, node.max_layer as u32)?;
        for layer in &node.neighbors {
            write_u32(writer, layer.len() as u32)?;
            for &nb in layer {
                write_u64(writer, nb)?;
            }
        }
    }

    Ok(())
}

/// Reads a framed snapshot, validating it matches `expected_dim` and
/// `expected_metric`. Never mutates caller state; the caller swaps in the
/// returned [`HnswState`] only once this returns `Ok`.
pub fn read(expected_dim: usize, expected_metric: DistanceMetric, reader: &mut dyn Read) -> Result<HnswState> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::InvalidState("hnsw snapshot: bad magic".into()));
    }

    let version = read_u32(reader)?;
    if version != VERSION {
        return Err(Error::InvalidState(format!("hnsw snapshot: unsupported version {version}")));
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
        return Err(Error::InvalidState("hnsw snapshot: distance metric mismatch".into()));
    }

    let _m = read_u32(reader)?;
    let _ef_construction = read_u32(reader)?;
    let _ef_search = read_u32(reader)?;
    let _max_elements = read_u64(reader)?;

    let has_entry = read_u8(reader)?;
    let entry_point = if has_entry == 1 { Some(read_u64(reader)?) } else { None };
    let entry_layer = read_u32(reader)? as usize;

    let node_count = read_u64(reader)?;
    let mut state = HnswState::new(dim);
    state.entry_point = entry_point;
    state.entry_layer = entry_layer;

    for _ in 0..node_count {
        let id = read_u64(reader)?;
        let mut vector = Vec::with_capacity(dim);
        for _ in 0..dim {
            vector.push(read_f32(reader)?);
        }
        let max_layer = read_u32(reader)? as usize;

        let mut node = HnswNode::new(max_layer);
        for layer in node.neighbors.iter_mut() {
            let count = read_u32(reader)?;
            for _ in 0..count {
                layer.insert(read_u64(reader)?);
            }
        }

        state.buffer.push(id, &vector);
        state.nodes.insert(id, node);
    }

    Ok(state)
}
