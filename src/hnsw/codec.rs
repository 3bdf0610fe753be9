//! Versioned binary encoding of the complete index state.
//!
//! Little-endian throughout. Header: version (u32), dimension (u64), metric
//! tag (u32 length + UTF-8 bytes), M (u64), ef_construction (u64), entry
//! point id (i64, -1 = none), max_level (i32), record count (u64). Then one
//! block per record: id (i64), level (i32), vector (dimension f32s),
//! tombstone byte, and for each layer 0..=level a u32 neighbor count
//! followed by that many i64 neighbor ids.
//!
//! Encode walks the arena in insertion order; the format leaves record order
//! unspecified, so decode resolves neighbor ids to positions in a second
//! pass and accepts any order. The level generator is re-seeded on load
//! (the format does not carry generator state).

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config;
use crate::error::{Result, VecdbError};
use crate::hnsw::distance::DistanceMetric;
use crate::hnsw::graph::{HnswIndex, HnswOptions};

const FORMAT_VERSION: u32 = 1;

impl HnswIndex {
    /// Encode the full index state into a byte buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let per_record = 13 + self.dimension * 4;
        let mut out = Vec::with_capacity(48 + self.ids.len() * per_record);

        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dimension as u64).to_le_bytes());
        let tag = self.metric.tag();
        out.extend_from_slice(&(tag.len() as u32).to_le_bytes());
        out.extend_from_slice(tag.as_bytes());
        out.extend_from_slice(&(self.options.m as u64).to_le_bytes());
        out.extend_from_slice(&(self.options.ef_construction as u64).to_le_bytes());
        let entry_id = self.entry_point.map_or(-1i64, |pos| self.ids[pos as usize]);
        out.extend_from_slice(&entry_id.to_le_bytes());
        out.extend_from_slice(&(self.max_level as i32).to_le_bytes());
        out.extend_from_slice(&(self.ids.len() as u64).to_le_bytes());

        for pos in 0..self.ids.len() {
            out.extend_from_slice(&self.ids[pos].to_le_bytes());
            out.extend_from_slice(&(self.levels[pos] as i32).to_le_bytes());
            for &v in self.vector(pos as u32) {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.push(self.tombstones[pos] as u8);
            for layer in &self.neighbors[pos] {
                out.extend_from_slice(&(layer.len() as u32).to_le_bytes());
                for &nb in layer {
                    out.extend_from_slice(&self.ids[nb as usize].to_le_bytes());
                }
            }
        }
        out
    }

    /// Decode an index from bytes produced by [`HnswIndex::serialize`].
    ///
    /// Fails with a deserialization error on an unsupported version,
    /// truncation, unresolvable ids, or trailing bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);

        let version = r.u32()?;
        if version != FORMAT_VERSION {
            return Err(VecdbError::Deserialization(format!(
                "unsupported version {version} (expected {FORMAT_VERSION})"
            )));
        }
        let dimension = r.u64()? as usize;
        if dimension < 1 {
            return Err(VecdbError::Deserialization(
                "dimension must be >= 1".into(),
            ));
        }
        let metric_len = r.u32()? as usize;
        let tag = std::str::from_utf8(r.bytes(metric_len)?)
            .map_err(|_| VecdbError::Deserialization("metric tag is not UTF-8".into()))?;
        let metric = DistanceMetric::from_tag(tag)
            .map_err(|_| VecdbError::Deserialization(format!("unknown metric '{tag}'")))?;
        let m = r.u64()? as usize;
        let ef_construction = r.u64()? as usize;
        let entry_id = r.i64()?;
        let max_level = r.i32()?;
        if max_level < 0 {
            return Err(VecdbError::Deserialization(format!(
                "negative max_level {max_level}"
            )));
        }
        let num_records = r.u64()?;

        // Cheapest possible record is an empty layer-0 adjacency; reject
        // counts the remaining input cannot possibly hold before allocating.
        let min_record = dimension
            .checked_mul(4)
            .and_then(|v| v.checked_add(8 + 4 + 1 + 4))
            .ok_or_else(|| VecdbError::Deserialization("dimension too large".into()))?;
        let plausible = (num_records as usize)
            .checked_mul(min_record)
            .is_some_and(|need| need <= r.remaining());
        if num_records > 0 && !plausible {
            return Err(VecdbError::Deserialization(format!(
                "record count {num_records} exceeds input size"
            )));
        }

        struct RawRecord {
            id: i64,
            level: u8,
            vector: Vec<f32>,
            tombstone: bool,
            layer_ids: Vec<Vec<i64>>,
        }

        let mut records: Vec<RawRecord> = Vec::with_capacity(num_records as usize);
        for _ in 0..num_records {
            let id = r.i64()?;
            let level = r.i32()?;
            if !(0..=u8::MAX as i32).contains(&level) {
                return Err(VecdbError::Deserialization(format!(
                    "record {id}: level {level} out of range"
                )));
            }
            let mut vector = Vec::with_capacity(dimension);
            for _ in 0..dimension {
                vector.push(r.f32()?);
            }
            let tombstone = r.u8()? != 0;
            let mut layer_ids = Vec::with_capacity(level as usize + 1);
            for _ in 0..=level {
                let count = r.u32()? as usize;
                let mut ids = Vec::with_capacity(count.min(r.remaining() / 8));
                for _ in 0..count {
                    ids.push(r.i64()?);
                }
                layer_ids.push(ids);
            }
            records.push(RawRecord {
                id,
                level: level as u8,
                vector,
                tombstone,
                layer_ids,
            });
        }
        if r.remaining() != 0 {
            return Err(VecdbError::Deserialization(format!(
                "{} trailing bytes after last record",
                r.remaining()
            )));
        }

        // Second pass: assign arena positions in file order, then resolve
        // neighbor ids against the complete id map.
        let mut id_to_pos: HashMap<i64, u32> = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if id_to_pos.insert(record.id, pos as u32).is_some() {
                return Err(VecdbError::Deserialization(format!(
                    "duplicate record id {}",
                    record.id
                )));
            }
        }

        let mut index = HnswIndex {
            options: HnswOptions {
                m,
                m_max0: m * 2,
                ef_construction,
            },
            dimension,
            metric,
            vectors: Vec::with_capacity(records.len() * dimension),
            ids: Vec::with_capacity(records.len()),
            levels: Vec::with_capacity(records.len()),
            tombstones: Vec::with_capacity(records.len()),
            neighbors: Vec::with_capacity(records.len()),
            id_to_pos,
            entry_point: None,
            max_level: max_level as usize,
            live: 0,
            level_rng: StdRng::seed_from_u64(config::HNSW_LEVEL_SEED),
        };

        for record in records {
            index.vectors.extend_from_slice(&record.vector);
            index.ids.push(record.id);
            index.levels.push(record.level);
            index.tombstones.push(record.tombstone);
            if !record.tombstone {
                index.live += 1;
            }
            let mut layers = Vec::with_capacity(record.layer_ids.len());
            for ids in record.layer_ids {
                let mut links = Vec::with_capacity(ids.len());
                for nb_id in ids {
                    let &nb_pos = index.id_to_pos.get(&nb_id).ok_or_else(|| {
                        VecdbError::Deserialization(format!(
                            "record {}: neighbor id {nb_id} not present",
                            record.id
                        ))
                    })?;
                    links.push(nb_pos);
                }
                layers.push(links);
            }
            index.neighbors.push(layers);
        }

        if entry_id != -1 {
            let &pos = index.id_to_pos.get(&entry_id).ok_or_else(|| {
                VecdbError::Deserialization(format!("entry point id {entry_id} not present"))
            })?;
            index.entry_point = Some(pos);
        }

        Ok(index)
    }
}

/// Bounds-checked little-endian reader over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| VecdbError::Deserialization("unexpected end of data".into()))?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(b);
        Ok(u32::from_le_bytes(buf))
    }

    fn i32(&mut self) -> Result<i32> {
        let b = self.bytes(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(b);
        Ok(i32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    fn i64(&mut self) -> Result<i64> {
        let b = self.bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(i64::from_le_bytes(buf))
    }

    fn f32(&mut self) -> Result<f32> {
        let b = self.bytes(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(b);
        Ok(f32::from_le_bytes(buf))
    }
}
