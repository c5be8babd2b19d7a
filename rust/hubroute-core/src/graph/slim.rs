//! Snapshot-backed graph that keeps only recently used records in memory.
//! Thread-safe read-through LRU caches per record kind, deterministic eviction.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use byteorder::{ByteOrder, LittleEndian};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::models::{Node, NodeIndex, Segment, SegmentIndex, Way, WayIndex};
use crate::snapshot::{
    read_node, read_segment, read_way, Manifest, ManifestError, SnapshotError, HASH_LEN, NODE_RECORD, SEGMENT_RECORD,
    WAY_RECORD,
};

use super::{BinGrid, GraphError, GraphStore};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlimCacheConfig {
    pub nodes_capacity: usize,
    pub segments_capacity: usize,
    pub ways_capacity: usize,
}

impl Default for SlimCacheConfig {
    fn default() -> Self {
        Self { nodes_capacity: 4096, segments_capacity: 8192, ways_capacity: 1024 }
    }
}

struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn new() -> Self { Self { hits: AtomicU64::new(0), misses: AtomicU64::new(0) } }
}

pub struct SlimGraph {
    cfg: SlimCacheConfig,
    manifest: Manifest,
    file: Mutex<File>,
    nodes: Mutex<LruCache<NodeIndex, Node>>,
    segments: Mutex<LruCache<SegmentIndex, Segment>>,
    ways: Mutex<LruCache<WayIndex, Way>>,
    node_counters: Counters,
    segment_counters: Counters,
    way_counters: Counters,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

impl SlimGraph {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        Self::open_with_config(path, SlimCacheConfig::default())
    }

    /// Open a snapshot without mapping it. The whole file is streamed once to check
    /// its hash; afterwards records are read on demand.
    pub fn open_with_config(path: impl AsRef<Path>, cfg: SlimCacheConfig) -> Result<Self, SnapshotError> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len < Manifest::SIZE + HASH_LEN {
            return Err(ManifestError::HeaderTooSmall.into());
        }
        let mut header = [0u8; Manifest::SIZE];
        file.read_exact(&mut header)?;
        let manifest = Manifest::parse(&header)?;
        manifest.validate_layout(len)?;
        verify_hash(&mut file, len)?;

        tracing::debug!(nodes = manifest.counts.nodes, segments = manifest.counts.segments, ?cfg, "snapshot_opened_slim");
        Ok(Self {
            cfg,
            manifest,
            file: Mutex::new(file),
            nodes: Mutex::new(LruCache::new(capacity(cfg.nodes_capacity))),
            segments: Mutex::new(LruCache::new(capacity(cfg.segments_capacity))),
            ways: Mutex::new(LruCache::new(capacity(cfg.ways_capacity))),
            node_counters: Counters::new(),
            segment_counters: Counters::new(),
            way_counters: Counters::new(),
        })
    }

    fn read_at(&self, off: u64, buf: &mut [u8]) -> Result<(), GraphError> {
        let mut file = lock(&self.file);
        file.seek(SeekFrom::Start(off))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn cached<T: Copy, const N: usize>(
        &self,
        cache: &Mutex<LruCache<u32, T>>,
        counters: &Counters,
        index: u32,
        base: u64,
        decode: fn(&[u8]) -> T,
    ) -> Result<T, GraphError> {
        if let Some(hit) = lock(cache).get(&index).copied() {
            counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        // Miss: read and insert
        let mut buf = [0u8; N];
        self.read_at(base + index as u64 * N as u64, &mut buf)?;
        let record = decode(&buf);
        lock(cache).put(index, record);
        counters.misses.fetch_add(1, Ordering::Relaxed);
        Ok(record)
    }

    // Counters for tests/telemetry
    pub fn node_hits(&self) -> u64 { self.node_counters.hits.load(Ordering::Relaxed) }
    pub fn node_misses(&self) -> u64 { self.node_counters.misses.load(Ordering::Relaxed) }
    pub fn segment_hits(&self) -> u64 { self.segment_counters.hits.load(Ordering::Relaxed) }
    pub fn segment_misses(&self) -> u64 { self.segment_counters.misses.load(Ordering::Relaxed) }
    pub fn way_hits(&self) -> u64 { self.way_counters.hits.load(Ordering::Relaxed) }
    pub fn way_misses(&self) -> u64 { self.way_counters.misses.load(Ordering::Relaxed) }

    pub fn nodes_cached(&self) -> usize { lock(&self.nodes).len() }
    pub fn segments_cached(&self) -> usize { lock(&self.segments).len() }

    pub fn config(&self) -> SlimCacheConfig { self.cfg }
    pub fn manifest(&self) -> &Manifest { &self.manifest }
}

fn verify_hash(file: &mut File, len: usize) -> Result<(), SnapshotError> {
    file.seek(SeekFrom::Start(0))?;
    let body = (len - HASH_LEN) as u64;
    let mut hasher = blake3::Hasher::new();
    let mut reader = BufReader::new(file.by_ref().take(body));
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    drop(reader);
    let mut stored = [0u8; HASH_LEN];
    file.seek(SeekFrom::Start(body))?;
    file.read_exact(&mut stored)?;
    if hasher.finalize().as_bytes() != &stored {
        return Err(ManifestError::HashMismatch.into());
    }
    Ok(())
}

impl GraphStore for SlimGraph {
    fn node_count(&self) -> u32 { self.manifest.counts.nodes }
    fn segment_count(&self) -> u32 { self.manifest.counts.segments }
    fn way_count(&self) -> u32 { self.manifest.counts.ways }

    fn node(&self, index: NodeIndex) -> Result<Node, GraphError> {
        if index >= self.node_count() {
            return Err(GraphError::NodeOutOfRange { index, count: self.node_count() });
        }
        self.cached::<Node, NODE_RECORD>(&self.nodes, &self.node_counters, index, self.manifest.off_nodes, read_node)
    }

    fn segment(&self, index: SegmentIndex) -> Result<Segment, GraphError> {
        if index >= self.segment_count() {
            return Err(GraphError::SegmentOutOfRange { index, count: self.segment_count() });
        }
        self.cached::<Segment, SEGMENT_RECORD>(
            &self.segments,
            &self.segment_counters,
            index,
            self.manifest.off_segments,
            read_segment,
        )
    }

    fn way(&self, index: WayIndex) -> Result<Way, GraphError> {
        if index >= self.way_count() {
            return Err(GraphError::WayOutOfRange { index, count: self.way_count() });
        }
        self.cached::<Way, WAY_RECORD>(&self.ways, &self.way_counters, index, self.manifest.off_ways, read_way)
    }

    fn properties_seen(&self) -> u8 { self.manifest.props_seen }

    fn grid(&self) -> BinGrid { self.manifest.grid }

    fn bin_offset(&self, bin: u32) -> Result<u32, GraphError> {
        if bin as usize >= self.manifest.bin_offset_entries() {
            return Err(GraphError::BinOutOfRange { index: bin, count: self.manifest.grid.bins() });
        }
        let mut word = [0u8; 4];
        self.read_at(self.manifest.off_bin_offsets + bin as u64 * 4, &mut word)?;
        Ok(LittleEndian::read_u32(&word))
    }

    fn bin_node(&self, position: u32) -> Result<NodeIndex, GraphError> {
        if position >= self.manifest.counts.bin_nodes {
            return Err(GraphError::Corrupt(format!("bin node position {position} out of range")));
        }
        let mut word = [0u8; 4];
        self.read_at(self.manifest.off_bin_nodes + position as u64 * 4, &mut word)?;
        Ok(LittleEndian::read_u32(&word))
    }
}

#[allow(dead_code)]
fn _assert_send_sync() {
    fn assert_bound<T: Send + Sync>() {}
    assert_bound::<SlimGraph>();
}
