use std::{fs::File, path::Path};

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::graph::{BinGrid, GraphError, GraphStore};
use crate::models::{Node, NodeIndex, Segment, SegmentIndex, Way, WayIndex};

use super::manifest::{
    read_node, read_segment, read_way, Manifest, ManifestError, SnapshotCounts, HASH_LEN, NODE_RECORD,
    SEGMENT_RECORD, WAY_RECORD,
};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl From<SnapshotError> for GraphError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::Io(io) => GraphError::Io(io),
            SnapshotError::Manifest(m) => GraphError::Corrupt(m.to_string()),
        }
    }
}

/// Graph snapshot mapped read-only into memory.
pub struct MappedGraph {
    mmap: Mmap,
    manifest: Manifest,
}

impl MappedGraph {
    /// Map a snapshot, checking its header, section layout and trailing hash.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() < Manifest::SIZE + HASH_LEN {
            return Err(ManifestError::HeaderTooSmall.into());
        }
        let manifest = Manifest::parse(&mmap[0..Manifest::SIZE])?;
        manifest.validate_layout(mmap.len())?;
        let body = mmap.len() - HASH_LEN;
        if blake3::hash(&mmap[..body]).as_bytes() != &mmap[body..] {
            return Err(ManifestError::HashMismatch.into());
        }
        tracing::debug!(nodes = manifest.counts.nodes, segments = manifest.counts.segments, ways = manifest.counts.ways, "snapshot_mapped");
        Ok(MappedGraph { mmap, manifest })
    }

    pub fn manifest(&self) -> &Manifest { &self.manifest }
    pub fn counts(&self) -> SnapshotCounts { self.manifest.counts }

    fn record(&self, off: u64, index: u32, size: usize) -> &[u8] {
        let start = off as usize + index as usize * size;
        &self.mmap[start..start + size]
    }
}

impl GraphStore for MappedGraph {
    fn node_count(&self) -> u32 { self.manifest.counts.nodes }
    fn segment_count(&self) -> u32 { self.manifest.counts.segments }
    fn way_count(&self) -> u32 { self.manifest.counts.ways }

    fn node(&self, index: NodeIndex) -> Result<Node, GraphError> {
        if index >= self.node_count() {
            return Err(GraphError::NodeOutOfRange { index, count: self.node_count() });
        }
        Ok(read_node(self.record(self.manifest.off_nodes, index, NODE_RECORD)))
    }

    fn segment(&self, index: SegmentIndex) -> Result<Segment, GraphError> {
        if index >= self.segment_count() {
            return Err(GraphError::SegmentOutOfRange { index, count: self.segment_count() });
        }
        Ok(read_segment(self.record(self.manifest.off_segments, index, SEGMENT_RECORD)))
    }

    fn way(&self, index: WayIndex) -> Result<Way, GraphError> {
        if index >= self.way_count() {
            return Err(GraphError::WayOutOfRange { index, count: self.way_count() });
        }
        Ok(read_way(self.record(self.manifest.off_ways, index, WAY_RECORD)))
    }

    fn properties_seen(&self) -> u8 { self.manifest.props_seen }

    fn grid(&self) -> BinGrid { self.manifest.grid }

    fn bin_offset(&self, bin: u32) -> Result<u32, GraphError> {
        if bin as usize >= self.manifest.bin_offset_entries() {
            return Err(GraphError::BinOutOfRange { index: bin, count: self.manifest.grid.bins() });
        }
        Ok(LittleEndian::read_u32(self.record(self.manifest.off_bin_offsets, bin, 4)))
    }

    fn bin_node(&self, position: u32) -> Result<NodeIndex, GraphError> {
        if position >= self.manifest.counts.bin_nodes {
            return Err(GraphError::Corrupt(format!("bin node position {position} out of range")));
        }
        Ok(LittleEndian::read_u32(self.record(self.manifest.off_bin_nodes, position, 4)))
    }
}

#[allow(dead_code)]
fn _assert_send_sync() {
    fn assert_bound<T: Send + Sync>() {}
    assert_bound::<MappedGraph>();
}
