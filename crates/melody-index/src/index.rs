//! Flat L2 vector index with a store-backed slot mapping.
//!
//! Vectors live in one sidecar file; which tune owns which slot lives in
//! the store's `faiss_mapping` table.  Inserts keep the two in step: the
//! file is written first, and a mapping failure rolls the in-memory and
//! on-disk append back.  A crash between the two leaves an unmapped tail
//! in the file, which [`VectorIndex::reconcile`] truncates at startup.
//!
//! # Sidecar format
//! Magic `TCVI`, format version, dimension, vector count (all
//! little-endian), then `count x dimension` f32 values.  Writes go through
//! a temp file and rename.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crawl_store::{Store, StoreError};

use crate::windows::generate_windows;

const MAGIC: [u8; 4] = *b"TCVI";
const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store: {0}")]
    Store(#[from] StoreError),
    #[error("Bad index file: {0}")]
    Format(String),
    #[error("Vector has dimension {got}, index expects {expected}")]
    Dimension { expected: usize, got: usize },
    #[error("Mapping table has {mapped} rows but the index holds {stored} vectors")]
    MappingAhead { mapped: i64, stored: usize },
}

pub type IndexResult<T> = Result<T, IndexError>;

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub tune_id: i64,
    pub distance: f32,
}

/// A fixed-dimension L2 index persisted to one sidecar file.
pub struct VectorIndex {
    path: PathBuf,
    dimension: usize,
    /// Row-major `count x dimension` matrix.
    vectors: Vec<f32>,
}

// ---------------------------------------------------------------------------
// Construction and persistence
// ---------------------------------------------------------------------------

impl VectorIndex {
    /// Load the index at `path`, or start empty when the file is absent.
    pub fn open(path: &Path, dimension: usize) -> IndexResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut index = VectorIndex {
            path: path.to_owned(),
            dimension,
            vectors: Vec::new(),
        };
        if path.exists() {
            index.load()?;
            info!(
                path = %path.display(),
                vectors = index.count(),
                "loaded vector index"
            );
        }
        Ok(index)
    }

    /// Number of vectors currently held.
    pub fn count(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn load(&mut self) -> IndexResult<()> {
        let mut reader = BufReader::new(File::open(&self.path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(IndexError::Format("bad magic".to_owned()));
        }
        let version = read_u32(&mut reader)?;
        if version != FORMAT_VERSION {
            return Err(IndexError::Format(format!("unknown version {version}")));
        }
        let dimension = read_u32(&mut reader)? as usize;
        if dimension != self.dimension {
            return Err(IndexError::Dimension {
                expected: self.dimension,
                got: dimension,
            });
        }
        let count = read_u64(&mut reader)? as usize;

        let mut data = vec![0u8; count * dimension * 4];
        reader.read_exact(&mut data)?;
        self.vectors = data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(())
    }

    /// Persist the index through a temp file + rename.
    fn save(&self) -> IndexResult<()> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            writer.write_all(&MAGIC)?;
            writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
            writer.write_all(&(self.dimension as u32).to_le_bytes())?;
            writer.write_all(&(self.count() as u64).to_le_bytes())?;
            for value in &self.vectors {
                writer.write_all(&value.to_le_bytes())?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append a batch of vectors and write their slot->tune mapping rows.
    ///
    /// Slot ids are assigned contiguously from the pre-insert count.  The
    /// sidecar is written before the mapping transaction commits; if the
    /// mapping insert fails, the append is rolled back on disk and in
    /// memory, so readers never see mapped slots without vectors.
    pub fn add(
        &mut self,
        store: &mut Store,
        tune_ids: &[i64],
        vectors: &[Vec<f32>],
    ) -> IndexResult<()> {
        if tune_ids.len() != vectors.len() {
            return Err(IndexError::Format(format!(
                "{} tune ids for {} vectors",
                tune_ids.len(),
                vectors.len()
            )));
        }
        if tune_ids.is_empty() {
            return Ok(());
        }
        for v in vectors {
            if v.len() != self.dimension {
                return Err(IndexError::Dimension {
                    expected: self.dimension,
                    got: v.len(),
                });
            }
        }

        let start = self.count();
        let rollback_len = self.vectors.len();
        for v in vectors {
            self.vectors.extend_from_slice(v);
        }
        if let Err(e) = self.save() {
            self.vectors.truncate(rollback_len);
            return Err(e);
        }

        if let Err(e) = store.insert_faiss_mappings(start as i64, tune_ids) {
            self.vectors.truncate(rollback_len);
            self.save()?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Drop every vector and persist the empty index (rebuild).
    pub fn clear(&mut self) -> IndexResult<()> {
        self.vectors.clear();
        self.save()
    }

    /// Drop vectors that have no mapping row (left behind by a crash
    /// between the sidecar write and the mapping commit).  Returns the
    /// number of vectors truncated.
    ///
    /// A mapping table *larger* than the index is unrecoverable here and
    /// reported as an error.
    pub fn reconcile(&mut self, store: &Store) -> IndexResult<usize> {
        let mapped = store.faiss_mapping_count()?;
        let stored = self.count();
        if (mapped as usize) > stored {
            return Err(IndexError::MappingAhead { mapped, stored });
        }
        let excess = stored - mapped as usize;
        if excess > 0 {
            warn!(excess, "truncating unmapped vector tail");
            self.vectors.truncate(mapped as usize * self.dimension);
            self.save()?;
        }
        Ok(excess)
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Top-k nearest tunes for one query vector (L2), deduplicated by the
    /// minimum distance per tune across its windows.
    pub fn search(&self, store: &Store, query: &[f32], k: usize) -> IndexResult<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(IndexError::Dimension {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut slots: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(slot, row)| (slot, l2_distance(query, row)))
            .collect();
        slots.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(k);
        for (slot, distance) in slots {
            let Some(tune_id) = store.tune_for_slot(slot as i64)? else {
                // Unmapped tail vector; reconcile() removes these at startup.
                continue;
            };
            if seen.insert(tune_id) {
                out.push(Neighbor { tune_id, distance });
                if out.len() == k {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Window an interval sequence and aggregate per-window search results
    /// by minimum distance.  `exclude_id` removes the query tune itself.
    pub fn get_candidates(
        &self,
        store: &Store,
        intervals: &[f32],
        k: usize,
        exclude_id: Option<i64>,
    ) -> IndexResult<Vec<Neighbor>> {
        let mut best: std::collections::HashMap<i64, f32> = std::collections::HashMap::new();
        for window in generate_windows(intervals) {
            for hit in self.search(store, &window, k)? {
                if Some(hit.tune_id) == exclude_id {
                    continue;
                }
                best.entry(hit.tune_id)
                    .and_modify(|d| *d = d.min(hit.distance))
                    .or_insert(hit.distance);
            }
        }
        let mut out: Vec<Neighbor> = best
            .into_iter()
            .map(|(tune_id, distance)| Neighbor { tune_id, distance })
            .collect();
        out.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        out.truncate(k);
        Ok(out)
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn read_u32(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VECTOR_DIM;

    fn vector(fill: f32) -> Vec<f32> {
        vec![fill; VECTOR_DIM]
    }

    fn scratch_index(dir: &tempfile::TempDir) -> VectorIndex {
        VectorIndex::open(&dir.path().join("tunes.index"), VECTOR_DIM).unwrap()
    }

    #[test]
    fn add_then_search_finds_exact_match_at_distance_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        let mut index = scratch_index(&dir);

        index
            .add(&mut store, &[1, 2], &[vector(1.0), vector(5.0)])
            .unwrap();

        let hits = index.search(&store, &vector(5.0), 2).unwrap();
        assert_eq!(hits[0].tune_id, 2);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].tune_id, 1);
        assert!(hits[1].distance > 0.0);
    }

    #[test]
    fn search_dedupes_multiple_windows_of_one_tune() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        let mut index = scratch_index(&dir);

        // Tune 7 has two windows; both are closer than tune 8's.
        index
            .add(
                &mut store,
                &[7, 7, 8],
                &[vector(1.0), vector(1.5), vector(9.0)],
            )
            .unwrap();

        let hits = index.search(&store, &vector(1.0), 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].tune_id, 7);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn index_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunes.index");
        let mut store = Store::open_in_memory().unwrap();

        {
            let mut index = VectorIndex::open(&path, VECTOR_DIM).unwrap();
            index.add(&mut store, &[3], &[vector(2.0)]).unwrap();
        }

        let index = VectorIndex::open(&path, VECTOR_DIM).unwrap();
        assert_eq!(index.count(), 1);
        let hits = index.search(&store, &vector(2.0), 1).unwrap();
        assert_eq!(hits[0].tune_id, 3);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn failed_mapping_insert_rolls_the_append_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunes.index");
        let mut store = Store::open_in_memory().unwrap();
        let mut index = VectorIndex::open(&path, VECTOR_DIM).unwrap();

        // Occupy slot 0 so the next mapping insert collides.
        store.insert_faiss_mappings(0, &[99]).unwrap();

        let err = index.add(&mut store, &[1], &[vector(1.0)]);
        assert!(err.is_err());
        assert_eq!(index.count(), 0);
        assert_eq!(store.faiss_mapping_count().unwrap(), 1);

        // The on-disk file was rolled back too.
        let reloaded = VectorIndex::open(&path, VECTOR_DIM).unwrap();
        assert_eq!(reloaded.count(), 0);
    }

    #[test]
    fn reconcile_truncates_unmapped_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunes.index");
        let mut store = Store::open_in_memory().unwrap();

        {
            let mut index = VectorIndex::open(&path, VECTOR_DIM).unwrap();
            index
                .add(&mut store, &[1, 2], &[vector(1.0), vector(2.0)])
                .unwrap();
        }

        // Simulate a crash that lost the mapping commit: a fresh store has
        // no mapping rows for the two stored vectors.
        let empty_store = Store::open_in_memory().unwrap();
        let mut index = VectorIndex::open(&path, VECTOR_DIM).unwrap();
        assert_eq!(index.reconcile(&empty_store).unwrap(), 2);
        assert_eq!(index.count(), 0);

        // A second pass finds nothing left to truncate.
        let mut index = VectorIndex::open(&path, VECTOR_DIM).unwrap();
        assert_eq!(index.reconcile(&empty_store).unwrap(), 0);
    }

    #[test]
    fn mapping_ahead_of_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        store.insert_faiss_mappings(0, &[1]).unwrap();
        let mut index = scratch_index(&dir);
        assert!(matches!(
            index.reconcile(&store),
            Err(IndexError::MappingAhead { mapped: 1, stored: 0 })
        ));
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        let mut index = scratch_index(&dir);
        let err = index.add(&mut store, &[1], &[vec![1.0; VECTOR_DIM + 1]]);
        assert!(matches!(err, Err(IndexError::Dimension { .. })));
    }

    #[test]
    fn get_candidates_excludes_the_query_tune() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        let mut index = scratch_index(&dir);

        index
            .add(&mut store, &[1, 2], &[vector(1.0), vector(1.0)])
            .unwrap();

        let intervals = vec![1.0f32; VECTOR_DIM];
        let hits = index
            .get_candidates(&store, &intervals, 10, Some(1))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tune_id, 2);
    }
}
