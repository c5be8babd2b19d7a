use crate::errors::RouteError;
use crate::fakes::FakeOverlay;
use crate::graph::GraphStore;
use crate::models::{is_fake, Node, NodeIndex, Segment, SegmentIndex};

/// The graph as one query sees it: real records plus that query's fake nodes and segments.
pub struct EngineView<'a, G: GraphStore> {
    graph: &'a G,
    overlay: &'a FakeOverlay,
}

impl<'a, G: GraphStore> Clone for EngineView<'a, G> {
    fn clone(&self) -> Self { *self }
}
impl<'a, G: GraphStore> Copy for EngineView<'a, G> {}

impl<'a, G: GraphStore> EngineView<'a, G> {
    pub fn new(graph: &'a G, overlay: &'a FakeOverlay) -> Self { Self { graph, overlay } }

    pub fn graph(&self) -> &'a G { self.graph }
    pub fn overlay(&self) -> &'a FakeOverlay { self.overlay }

    /// Position in radians.
    pub fn lat_long(&self, node: NodeIndex) -> Result<(f64, f64), RouteError> {
        if is_fake(node) {
            Ok(self.overlay.fake_lat_long(node)?)
        } else {
            Ok(self.graph.lat_long(node)?)
        }
    }

    /// Node record, `None` for fake nodes.
    pub fn real_node(&self, node: NodeIndex) -> Result<Option<Node>, RouteError> {
        if is_fake(node) {
            Ok(None)
        } else {
            Ok(Some(self.graph.node(node)?))
        }
    }

    pub fn is_super(&self, node: NodeIndex) -> Result<bool, RouteError> {
        Ok(self.real_node(node)?.map_or(false, |n| n.is_super()))
    }

    pub fn segment(&self, index: SegmentIndex) -> Result<Segment, RouteError> {
        if is_fake(index) {
            Ok(self.overlay.lookup_fake_segment(index)?)
        } else {
            Ok(self.graph.segment(index)?)
        }
    }

    /// Fill `out` with the segments leaving `node`. A fake node has its two halves; a
    /// real node has its adjacency, followed by the fake segment joining it to `target`
    /// when `target` is a fake node split from one of its segments.
    pub fn neighbours(
        &self,
        node: NodeIndex,
        target: NodeIndex,
        out: &mut Vec<(SegmentIndex, Segment)>,
    ) -> Result<(), RouteError> {
        out.clear();
        if is_fake(node) {
            let first = self.overlay.first_fake_segment(node)?;
            out.push(first);
            if let Some(second) = self.overlay.next_fake_segment(first.0, node) {
                out.push(second);
            }
            return Ok(());
        }
        for item in self.graph.adjacent(node) {
            out.push(item?);
        }
        if is_fake(target) {
            if let Some(extra) = self.overlay.extra_fake_segment(node, target) {
                out.push(extra);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, MemoryGraph};
    use crate::models::{Highway, Way, ALLOW_ALL, FAKE_BASE, NO_NODE};

    fn line() -> MemoryGraph {
        let mut b = GraphBuilder::new();
        let a = b.add_node(0.0, 0.0, ALLOW_ALL);
        let c = b.add_node(0.0, 0.01, ALLOW_ALL);
        let d = b.add_node(0.0, 0.02, ALLOW_ALL);
        let w = b.add_way(Way::new(Highway::Residential, ALLOW_ALL));
        b.add_segment_with_distance(a, c, w, 1000, 0);
        b.add_segment_with_distance(c, d, w, 1000, 0);
        b.build().unwrap()
    }

    #[test]
    fn fake_nodes_expose_both_halves() {
        let g = line();
        let mut o = FakeOverlay::new();
        let fake = o.create_fake(&g, 1, 0, 0, 1, 300, 700).unwrap();
        let view = EngineView::new(&g, &o);
        let mut out = Vec::new();
        view.neighbours(fake, NO_NODE, &mut out).unwrap();
        let others: Vec<_> = out.iter().map(|(_, s)| s.other_node(fake)).collect();
        assert_eq!(others, vec![0, 1]);
        assert!(!view.is_super(fake).unwrap());
        assert!(view.real_node(fake).unwrap().is_none());
        assert_eq!(view.segment(FAKE_BASE + 1).unwrap().metres(), 700);
    }

    #[test]
    fn real_node_gains_extra_segment_to_fake_target() {
        let g = line();
        let mut o = FakeOverlay::new();
        let fake = o.create_fake(&g, 2, 1, 1, 2, 400, 600).unwrap();
        let view = EngineView::new(&g, &o);
        let mut out = Vec::new();
        view.neighbours(1, NO_NODE, &mut out).unwrap();
        assert_eq!(out.len(), 2);
        view.neighbours(1, fake, &mut out).unwrap();
        assert_eq!(out.len(), 3);
        let (index, extra) = out[2];
        assert!(is_fake(index));
        assert_eq!((extra.other_node(1), extra.metres()), (fake, 400));
        // node 0 is not on the split segment
        view.neighbours(0, fake, &mut out).unwrap();
        assert_eq!(out.len(), 1);
    }
}
