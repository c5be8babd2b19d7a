//! Read-only road graph storage.
//!
//! Nodes, segments and ways are dense arrays addressed by index. A node's incident
//! segments are threaded through the segment array itself: segments are sorted by
//! `node1`, so the segments leaving a node as `node1` are contiguous, while the ones in
//! which it is `node2` are chained through `Segment::next2`. `Node::first_segment`
//! starts the `node2` chain when there is one and the chain ends by linking into the
//! contiguous `node1` run.

pub mod memory;
pub mod slim;
pub mod spatial;

use serde::{Deserialize, Serialize};

use crate::geo::{bin_to_latlong, latlong_to_radians};
use crate::models::{Node, NodeIndex, Segment, SegmentIndex, Way, WayIndex, NO_SEGMENT};

pub use memory::{GraphBuilder, MemoryGraph};
pub use slim::{SlimCacheConfig, SlimGraph};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("node {index} out of range ({count} nodes)")]
    NodeOutOfRange { index: NodeIndex, count: u32 },
    #[error("segment {index} out of range ({count} segments)")]
    SegmentOutOfRange { index: SegmentIndex, count: u32 },
    #[error("way {index} out of range ({count} ways)")]
    WayOutOfRange { index: WayIndex, count: u32 },
    #[error("bin {index} out of range ({count} bins)")]
    BinOutOfRange { index: u32, count: u32 },
    #[error("invalid segment {node1}-{node2}: {reason}")]
    InvalidSegment { node1: NodeIndex, node2: NodeIndex, reason: &'static str },
    #[error("corrupt graph: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Geometry of the spatial bin grid. Bin `(lat_bin, lon_bin)` has linear index
/// `lon_bin * lat_bins + lat_bin`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinGrid {
    /// Bin number of the southernmost row.
    pub lat_zero: i32,
    /// Bin number of the westernmost column.
    pub lon_zero: i32,
    pub lat_bins: u32,
    pub lon_bins: u32,
}

impl BinGrid {
    pub fn bins(&self) -> u32 {
        self.lat_bins.saturating_mul(self.lon_bins)
    }

    #[inline]
    pub fn linear(&self, lat_bin: u32, lon_bin: u32) -> u32 {
        lon_bin * self.lat_bins + lat_bin
    }

    /// South-west corner of a bin, in radians.
    pub fn corner(&self, lat_bin: i32, lon_bin: i32) -> (f64, f64) {
        (
            latlong_to_radians(bin_to_latlong(self.lat_zero + lat_bin)),
            latlong_to_radians(bin_to_latlong(self.lon_zero + lon_bin)),
        )
    }
}

/// Immutable graph arrays shared by every query.
pub trait GraphStore: Send + Sync {
    fn node_count(&self) -> u32;
    fn segment_count(&self) -> u32;
    fn way_count(&self) -> u32;

    fn node(&self, index: NodeIndex) -> Result<Node, GraphError>;
    fn segment(&self, index: SegmentIndex) -> Result<Segment, GraphError>;
    fn way(&self, index: WayIndex) -> Result<Way, GraphError>;

    /// Union of the property bits present on any way.
    fn properties_seen(&self) -> u8;

    fn grid(&self) -> BinGrid;
    /// Position in the bin node list where bin `bin` starts; valid for `0..=bins`.
    fn bin_offset(&self, bin: u32) -> Result<u32, GraphError>;
    fn bin_node(&self, position: u32) -> Result<NodeIndex, GraphError>;

    /// Node position in radians.
    fn lat_long(&self, index: NodeIndex) -> Result<(f64, f64), GraphError> {
        let node = self.node(index)?;
        Ok((latlong_to_radians(node.latitude), latlong_to_radians(node.longitude)))
    }

    fn is_super_node(&self, index: NodeIndex) -> Result<bool, GraphError> {
        Ok(self.node(index)?.is_super())
    }

    fn first_segment(&self, node: NodeIndex) -> Result<Option<SegmentIndex>, GraphError> {
        let first = self.node(node)?.first_segment;
        Ok((first != NO_SEGMENT).then_some(first))
    }

    /// Segment after `current` (whose record is `segment`) in `node`'s adjacency.
    fn next_segment(
        &self,
        current: SegmentIndex,
        segment: &Segment,
        node: NodeIndex,
    ) -> Result<Option<SegmentIndex>, GraphError> {
        if segment.node1 == node {
            let next = current + 1;
            if next >= self.segment_count() {
                return Ok(None);
            }
            let following = self.segment(next)?;
            Ok((following.node1 == node).then_some(next))
        } else if segment.next2 == NO_SEGMENT {
            Ok(None)
        } else {
            Ok(Some(segment.next2))
        }
    }

    /// Iterate over the segments incident to `node`.
    fn adjacent(&self, node: NodeIndex) -> Adjacent<'_, Self>
    where
        Self: Sized,
    {
        Adjacent { graph: self, node, next: None, started: false }
    }
}

/// Iterator over `(index, segment)` pairs incident to one node.
pub struct Adjacent<'g, G: GraphStore + ?Sized> {
    graph: &'g G,
    node: NodeIndex,
    next: Option<SegmentIndex>,
    started: bool,
}

impl<'g, G: GraphStore + ?Sized> Iterator for Adjacent<'g, G> {
    type Item = Result<(SegmentIndex, Segment), GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            self.next = match self.graph.first_segment(self.node) {
                Ok(first) => first,
                Err(e) => return Some(Err(e)),
            };
        }
        let index = self.next.take()?;
        let segment = match self.graph.segment(index) {
            Ok(s) => s,
            Err(e) => return Some(Err(e)),
        };
        if segment.node1 != self.node && segment.node2 != self.node {
            return Some(Err(GraphError::Corrupt(format!(
                "segment {index} in adjacency of node {} does not touch it",
                self.node
            ))));
        }
        match self.graph.next_segment(index, &segment, self.node) {
            Ok(next) => self.next = next,
            Err(e) => return Some(Err(e)),
        }
        Some(Ok((index, segment)))
    }
}

impl<G: GraphStore + ?Sized> GraphStore for &G {
    fn node_count(&self) -> u32 { (**self).node_count() }
    fn segment_count(&self) -> u32 { (**self).segment_count() }
    fn way_count(&self) -> u32 { (**self).way_count() }
    fn node(&self, index: NodeIndex) -> Result<Node, GraphError> { (**self).node(index) }
    fn segment(&self, index: SegmentIndex) -> Result<Segment, GraphError> { (**self).segment(index) }
    fn way(&self, index: WayIndex) -> Result<Way, GraphError> { (**self).way(index) }
    fn properties_seen(&self) -> u8 { (**self).properties_seen() }
    fn grid(&self) -> BinGrid { (**self).grid() }
    fn bin_offset(&self, bin: u32) -> Result<u32, GraphError> { (**self).bin_offset(bin) }
    fn bin_node(&self, position: u32) -> Result<NodeIndex, GraphError> { (**self).bin_node(position) }
}

impl<G: GraphStore + ?Sized> GraphStore for std::sync::Arc<G> {
    fn node_count(&self) -> u32 { (**self).node_count() }
    fn segment_count(&self) -> u32 { (**self).segment_count() }
    fn way_count(&self) -> u32 { (**self).way_count() }
    fn node(&self, index: NodeIndex) -> Result<Node, GraphError> { (**self).node(index) }
    fn segment(&self, index: SegmentIndex) -> Result<Segment, GraphError> { (**self).segment(index) }
    fn way(&self, index: WayIndex) -> Result<Way, GraphError> { (**self).way(index) }
    fn properties_seen(&self) -> u8 { (**self).properties_seen() }
    fn grid(&self) -> BinGrid { (**self).grid() }
    fn bin_offset(&self, bin: u32) -> Result<u32, GraphError> { (**self).bin_offset(bin) }
    fn bin_node(&self, position: u32) -> Result<NodeIndex, GraphError> { (**self).bin_node(position) }
}
