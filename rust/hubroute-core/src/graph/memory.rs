use crate::geo::{degrees_to_radians, distance_whole_m, latlong_to_bin, latlong_to_radians, radians_to_latlong};
use crate::models::{
    pack_distance, Node, NodeIndex, Segment, SegmentIndex, Way, WayIndex, NODE_SUPER, NO_SEGMENT, ONEWAY_1TO2,
    ONEWAY_2TO1, SEGMENT_NORMAL, SEGMENT_SUPER,
};

use super::{BinGrid, GraphError, GraphStore};

/// Graph held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryGraph {
    nodes: Vec<Node>,
    segments: Vec<Segment>,
    ways: Vec<Way>,
    props_seen: u8,
    grid: BinGrid,
    bin_offsets: Vec<u32>,
    bin_nodes: Vec<NodeIndex>,
}

impl MemoryGraph {
    pub fn nodes(&self) -> &[Node] { &self.nodes }
    pub fn segments(&self) -> &[Segment] { &self.segments }
    pub fn ways(&self) -> &[Way] { &self.ways }

    /// Index of the segment joining `a` and `b`, if any.
    pub fn find_segment(&self, a: NodeIndex, b: NodeIndex) -> Option<SegmentIndex> {
        let (n1, n2) = if a <= b { (a, b) } else { (b, a) };
        let start = self.segments.partition_point(|s| (s.node1, s.node2) < (n1, n2));
        match self.segments.get(start) {
            Some(s) if s.node1 == n1 && s.node2 == n2 => Some(start as SegmentIndex),
            _ => None,
        }
    }
}

impl GraphStore for MemoryGraph {
    fn node_count(&self) -> u32 { self.nodes.len() as u32 }
    fn segment_count(&self) -> u32 { self.segments.len() as u32 }
    fn way_count(&self) -> u32 { self.ways.len() as u32 }

    fn node(&self, index: NodeIndex) -> Result<Node, GraphError> {
        self.nodes
            .get(index as usize)
            .copied()
            .ok_or(GraphError::NodeOutOfRange { index, count: self.node_count() })
    }

    fn segment(&self, index: SegmentIndex) -> Result<Segment, GraphError> {
        self.segments
            .get(index as usize)
            .copied()
            .ok_or(GraphError::SegmentOutOfRange { index, count: self.segment_count() })
    }

    fn way(&self, index: WayIndex) -> Result<Way, GraphError> {
        self.ways
            .get(index as usize)
            .copied()
            .ok_or(GraphError::WayOutOfRange { index, count: self.way_count() })
    }

    fn properties_seen(&self) -> u8 { self.props_seen }

    fn grid(&self) -> BinGrid { self.grid }

    fn bin_offset(&self, bin: u32) -> Result<u32, GraphError> {
        self.bin_offsets
            .get(bin as usize)
            .copied()
            .ok_or(GraphError::BinOutOfRange { index: bin, count: self.grid.bins() })
    }

    fn bin_node(&self, position: u32) -> Result<NodeIndex, GraphError> {
        self.bin_nodes
            .get(position as usize)
            .copied()
            .ok_or_else(|| GraphError::Corrupt(format!("bin node position {position} out of range")))
    }
}

#[derive(Clone, Copy, Debug)]
struct PendingSegment {
    from: NodeIndex,
    to: NodeIndex,
    way: WayIndex,
    metres: Option<u32>,
    flags: u32,
}

/// Assembles a [`MemoryGraph`] from already contracted records.
///
/// Segment flags are given relative to the `from -> to` direction passed in; the
/// builder normalises endpoint order, sorts segments and threads the adjacency links.
/// Segments with neither `SEGMENT_NORMAL` nor `SEGMENT_SUPER` are treated as normal.
#[derive(Clone, Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    ways: Vec<Way>,
    segments: Vec<PendingSegment>,
}

impl GraphBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn add_node(&mut self, lat_deg: f64, lon_deg: f64, allow: u16) -> NodeIndex {
        let index = self.nodes.len() as NodeIndex;
        self.nodes.push(Node {
            first_segment: NO_SEGMENT,
            latitude: radians_to_latlong(degrees_to_radians(lat_deg)),
            longitude: radians_to_latlong(degrees_to_radians(lon_deg)),
            allow,
            flags: 0,
        });
        index
    }

    /// Mark a node as retained in the hub graph.
    pub fn set_super(&mut self, node: NodeIndex) -> &mut Self {
        if let Some(n) = self.nodes.get_mut(node as usize) {
            n.flags |= NODE_SUPER;
        }
        self
    }

    pub fn add_way(&mut self, way: Way) -> WayIndex {
        self.ways.push(way);
        (self.ways.len() - 1) as WayIndex
    }

    /// Segment whose length is the great-circle distance between its endpoints.
    pub fn add_segment(&mut self, from: NodeIndex, to: NodeIndex, way: WayIndex, flags: u32) -> &mut Self {
        self.segments.push(PendingSegment { from, to, way, metres: None, flags });
        self
    }

    pub fn add_segment_with_distance(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        way: WayIndex,
        metres: u32,
        flags: u32,
    ) -> &mut Self {
        self.segments.push(PendingSegment { from, to, way, metres: Some(metres), flags });
        self
    }

    pub fn build(self) -> Result<MemoryGraph, GraphError> {
        let GraphBuilder { mut nodes, ways, segments: pending } = self;
        let node_count = nodes.len() as u32;
        let way_count = ways.len() as u32;

        let mut segments = Vec::with_capacity(pending.len());
        for p in pending {
            if p.from >= node_count {
                return Err(GraphError::NodeOutOfRange { index: p.from, count: node_count });
            }
            if p.to >= node_count {
                return Err(GraphError::NodeOutOfRange { index: p.to, count: node_count });
            }
            if p.way >= way_count {
                return Err(GraphError::WayOutOfRange { index: p.way, count: way_count });
            }
            if p.from == p.to {
                return Err(GraphError::InvalidSegment { node1: p.from, node2: p.to, reason: "loop" });
            }
            let metres = match p.metres {
                Some(m) => m,
                None => {
                    let a = &nodes[p.from as usize];
                    let b = &nodes[p.to as usize];
                    distance_whole_m(
                        latlong_to_radians(a.latitude),
                        latlong_to_radians(a.longitude),
                        latlong_to_radians(b.latitude),
                        latlong_to_radians(b.longitude),
                    )
                }
            };
            let mut flags = p.flags;
            if flags & (SEGMENT_NORMAL | SEGMENT_SUPER) == 0 {
                flags |= SEGMENT_NORMAL;
            }
            let (node1, node2) = if p.from <= p.to {
                (p.from, p.to)
            } else {
                flags = swap_oneway(flags);
                (p.to, p.from)
            };
            segments.push(Segment { node1, node2, next2: NO_SEGMENT, way: p.way, distance: pack_distance(metres, flags) });
        }
        segments.sort_by_key(|s| (s.node1, s.node2));

        thread_adjacency(&mut nodes, &mut segments);

        let props_seen = ways.iter().fold(0u8, |acc, w| acc | w.props);
        let (grid, bin_offsets, bin_nodes) = index_bins(&nodes);

        tracing::debug!(nodes = nodes.len(), segments = segments.len(), ways = ways.len(), bins = grid.bins(), "graph_built");

        Ok(MemoryGraph { nodes, segments, ways, props_seen, grid, bin_offsets, bin_nodes })
    }
}

fn swap_oneway(flags: u32) -> u32 {
    let mut out = flags & !(ONEWAY_1TO2 | ONEWAY_2TO1);
    if flags & ONEWAY_1TO2 != 0 { out |= ONEWAY_2TO1; }
    if flags & ONEWAY_2TO1 != 0 { out |= ONEWAY_1TO2; }
    out
}

/// Link every sorted segment into the adjacency of both of its nodes.
fn thread_adjacency(nodes: &mut [Node], segments: &mut [Segment]) {
    for i in 0..segments.len() {
        let (node1, node2) = (segments[i].node1, segments[i].node2);
        append_to_adjacency(nodes, segments, node1, i as SegmentIndex);
        append_to_adjacency(nodes, segments, node2, i as SegmentIndex);
    }
}

fn append_to_adjacency(nodes: &mut [Node], segments: &mut [Segment], node: NodeIndex, added: SegmentIndex) {
    let first = nodes[node as usize].first_segment;
    if first == NO_SEGMENT {
        nodes[node as usize].first_segment = added;
        return;
    }
    let mut index = first;
    loop {
        let seg = segments[index as usize];
        if seg.node1 == node {
            // contiguous run already reaches `added`
            index += 1;
            if index as usize >= segments.len() || segments[index as usize].node1 != node {
                break;
            }
        } else if seg.next2 == NO_SEGMENT {
            segments[index as usize].next2 = added;
            break;
        } else {
            index = seg.next2;
        }
    }
}

fn index_bins(nodes: &[Node]) -> (BinGrid, Vec<u32>, Vec<NodeIndex>) {
    if nodes.is_empty() {
        return (BinGrid::default(), vec![0], Vec::new());
    }
    let lat_min = nodes.iter().map(|n| latlong_to_bin(n.latitude)).min().unwrap_or(0);
    let lat_max = nodes.iter().map(|n| latlong_to_bin(n.latitude)).max().unwrap_or(0);
    let lon_min = nodes.iter().map(|n| latlong_to_bin(n.longitude)).min().unwrap_or(0);
    let lon_max = nodes.iter().map(|n| latlong_to_bin(n.longitude)).max().unwrap_or(0);
    let grid = BinGrid {
        lat_zero: lat_min,
        lon_zero: lon_min,
        lat_bins: (lat_max - lat_min + 1) as u32,
        lon_bins: (lon_max - lon_min + 1) as u32,
    };

    let bin_of = |n: &Node| {
        let lat_bin = (latlong_to_bin(n.latitude) - grid.lat_zero) as u32;
        let lon_bin = (latlong_to_bin(n.longitude) - grid.lon_zero) as u32;
        grid.linear(lat_bin, lon_bin)
    };

    let mut counts = vec![0u32; grid.bins() as usize + 1];
    for n in nodes {
        counts[bin_of(n) as usize + 1] += 1;
    }
    for i in 1..counts.len() {
        counts[i] += counts[i - 1];
    }
    let offsets = counts.clone();
    let mut cursor = counts;
    let mut bin_nodes = vec![0; nodes.len()];
    for (index, n) in nodes.iter().enumerate() {
        let bin = bin_of(n) as usize;
        bin_nodes[cursor[bin] as usize] = index as NodeIndex;
        cursor[bin] += 1;
    }
    (grid, offsets, bin_nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Highway, ALLOW_ALL};

    fn star() -> MemoryGraph {
        // 0 is the hub, 1..=3 hang off it; 3-1 closes a triangle
        let mut b = GraphBuilder::new();
        let c = b.add_node(51.0, 0.0, ALLOW_ALL);
        let n1 = b.add_node(51.001, 0.0, ALLOW_ALL);
        let n2 = b.add_node(51.0, 0.001, ALLOW_ALL);
        let n3 = b.add_node(50.999, 0.0, ALLOW_ALL);
        let w = b.add_way(Way::new(Highway::Residential, ALLOW_ALL));
        b.add_segment(n1, c, w, 0)
            .add_segment(c, n2, w, ONEWAY_1TO2)
            .add_segment(n3, c, w, 0)
            .add_segment(n3, n1, w, 0);
        b.build().unwrap()
    }

    fn neighbours(g: &MemoryGraph, node: NodeIndex) -> Vec<NodeIndex> {
        let mut v: Vec<_> = g.adjacent(node).map(|r| r.unwrap().1.other_node(node)).collect();
        v.sort();
        v
    }

    #[test]
    fn adjacency_visits_every_incident_segment_once() {
        let g = star();
        assert_eq!(neighbours(&g, 0), vec![1, 2, 3]);
        assert_eq!(neighbours(&g, 1), vec![0, 3]);
        assert_eq!(neighbours(&g, 2), vec![0]);
        assert_eq!(neighbours(&g, 3), vec![0, 1]);
    }

    #[test]
    fn segments_sorted_with_normalised_oneway() {
        let g = star();
        for w in g.segments().windows(2) {
            assert!((w[0].node1, w[0].node2) <= (w[1].node1, w[1].node2));
        }
        assert!(g.segments().iter().all(|s| s.node1 < s.node2 && s.is_normal()));
        let s = g.segment(g.find_segment(2, 0).unwrap()).unwrap();
        assert!(!s.is_oneway_to(0));
        assert!(s.is_oneway_to(2));
    }

    #[test]
    fn segment_distance_defaults_to_great_circle() {
        let g = star();
        let s = g.segment(g.find_segment(0, 1).unwrap()).unwrap();
        assert!((s.metres() as i64 - 111).abs() <= 1, "got {}", s.metres());
    }

    #[test]
    fn bins_cover_all_nodes() {
        let g = star();
        let grid = g.grid();
        let end = g.bin_offset(grid.bins()).unwrap();
        assert_eq!(end, g.node_count());
        let mut seen: Vec<_> = (0..end).map(|p| g.bin_node(p).unwrap()).collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn builder_rejects_bad_records() {
        let mut b = GraphBuilder::new();
        let a = b.add_node(0.0, 0.0, ALLOW_ALL);
        let w = b.add_way(Way::new(Highway::Path, ALLOW_ALL));
        b.add_segment(a, a, w, 0);
        assert!(matches!(b.build(), Err(GraphError::InvalidSegment { .. })));

        let mut b = GraphBuilder::new();
        let a = b.add_node(0.0, 0.0, ALLOW_ALL);
        b.add_segment(a, 7, 0, 0);
        assert!(matches!(b.build(), Err(GraphError::NodeOutOfRange { index: 7, .. })));
    }
}
