//! Per-query overlay of virtual nodes and segments.
//!
//! A waypoint that falls part-way along a segment gets a fake node at slot `s`
//! (index `FAKE_BASE + s`) and two fake segments at positions `2s-2` and `2s-1`
//! (indices `FAKE_BASE + position`). The first joins the segment's `node1` side to the
//! fake node, the second joins the fake node to the `node2` side. Fake segments are
//! copies of the real one, so way, flags and oneway direction carry over.

use std::f64::consts::PI;

use crate::config::DEFAULT_SNAP_TOLERANCE_M;
use crate::errors::RouteError;
use crate::graph::GraphStore;
use crate::models::{
    flags_of, is_fake, pack_distance, NodeIndex, Segment, SegmentIndex, FAKE_BASE, MAX_WAYPOINTS,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FakeError {
    #[error("waypoint slot {0} outside 1..=99")]
    InvalidSlot(u32),
    #[error("fake index {0:#x} is not in use")]
    Unknown(u32),
    #[error("node {node} is not an endpoint of segment {segment}")]
    NotEndpoint { segment: SegmentIndex, node: NodeIndex },
}

#[derive(Clone, Copy, Debug)]
struct FakeSlot {
    latitude: f64,
    longitude: f64,
    original: SegmentIndex,
    segments: [Segment; 2],
}

#[derive(Clone, Debug)]
pub struct FakeOverlay {
    snap_tolerance_m: u32,
    slots: Vec<Option<FakeSlot>>,
}

impl Default for FakeOverlay {
    fn default() -> Self { Self::new() }
}

#[inline]
fn slot_of(index: u32) -> u32 {
    index.wrapping_sub(FAKE_BASE)
}

impl FakeOverlay {
    pub fn new() -> Self { Self::with_tolerance(DEFAULT_SNAP_TOLERANCE_M) }

    pub fn with_tolerance(snap_tolerance_m: u32) -> Self {
        Self { snap_tolerance_m, slots: vec![None; MAX_WAYPOINTS as usize + 1] }
    }

    pub fn snap_tolerance_m(&self) -> u32 { self.snap_tolerance_m }

    fn slot(&self, node: NodeIndex) -> Result<&FakeSlot, FakeError> {
        if !is_fake(node) {
            return Err(FakeError::Unknown(node));
        }
        self.slots
            .get(slot_of(node) as usize)
            .and_then(Option::as_ref)
            .ok_or(FakeError::Unknown(node))
    }

    /// Split `segment` at the point `dist1` metres from `node1` and `dist2` from `node2`.
    ///
    /// Returns the new fake node, or one of the real endpoints when the point lies within
    /// the snapping tolerance of it (the nearer one if both qualify, `node1` on a tie).
    #[allow(clippy::too_many_arguments)]
    pub fn create_fake<G: GraphStore>(
        &mut self,
        graph: &G,
        slot: u32,
        segment: SegmentIndex,
        node1: NodeIndex,
        node2: NodeIndex,
        dist1: u32,
        dist2: u32,
    ) -> Result<NodeIndex, RouteError> {
        if slot == 0 || slot > MAX_WAYPOINTS {
            return Err(FakeError::InvalidSlot(slot).into());
        }
        let real = graph.segment(segment)?;
        for node in [node1, node2] {
            if real.node1 != node && real.node2 != node {
                return Err(FakeError::NotEndpoint { segment, node }.into());
            }
        }
        if node1 == node2 {
            return Err(FakeError::NotEndpoint { segment, node: node2 }.into());
        }

        // an end exactly `tol` away is not within tolerance
        let tol = self.snap_tolerance_m;
        match (dist1 < tol, dist2 < tol) {
            (true, false) => return Ok(node1),
            (false, true) => return Ok(node2),
            (true, true) => return Ok(if dist1 <= dist2 { node1 } else { node2 }),
            (false, false) => {}
        }
        let total = dist1 as f64 + dist2 as f64;
        if total == 0.0 {
            return Ok(node1);
        }

        let fake = FAKE_BASE + slot;
        let (lat1, mut lon1) = graph.lat_long(node1)?;
        let (lat2, mut lon2) = graph.lat_long(node2)?;
        // keep both longitudes on the same side of the antimeridian
        if lon1 > 3.0 && lon2 < -3.0 {
            lon2 += 2.0 * PI;
        } else if lon1 < -3.0 && lon2 > 3.0 {
            lon1 += 2.0 * PI;
        }
        let frac = dist1 as f64 / total;
        let latitude = lat1 + (lat2 - lat1) * frac;
        let mut longitude = lon1 + (lon2 - lon1) * frac;
        if longitude > PI {
            longitude -= 2.0 * PI;
        }

        let flags = flags_of(real.distance);
        let mut first = real;
        if real.node1 == node2 { first.node1 = fake } else { first.node2 = fake }
        first.distance = pack_distance(dist1, flags);
        let mut second = real;
        if real.node1 == node1 { second.node1 = fake } else { second.node2 = fake }
        second.distance = pack_distance(dist2, flags);

        self.slots[slot as usize] = Some(FakeSlot { latitude, longitude, original: segment, segments: [first, second] });
        tracing::debug!(slot, segment, node1, node2, dist1, dist2, "fake_node_created");
        Ok(fake)
    }

    /// Forget the fake node in `slot`.
    pub fn clear(&mut self, slot: u32) {
        if let Some(s) = self.slots.get_mut(slot as usize) {
            *s = None;
        }
    }

    /// Position of a fake node in radians.
    pub fn fake_lat_long(&self, node: NodeIndex) -> Result<(f64, f64), FakeError> {
        let s = self.slot(node)?;
        Ok((s.latitude, s.longitude))
    }

    /// Real segment a fake node was split from.
    pub fn original_segment(&self, node: NodeIndex) -> Result<SegmentIndex, FakeError> {
        Ok(self.slot(node)?.original)
    }

    pub fn first_fake_segment(&self, node: NodeIndex) -> Result<(SegmentIndex, Segment), FakeError> {
        let s = self.slot(node)?;
        Ok((index_fake_segment(2 * slot_of(node) - 2), s.segments[0]))
    }

    /// The second fake segment of `node` when given its first, otherwise `None`.
    pub fn next_fake_segment(&self, current: SegmentIndex, node: NodeIndex) -> Option<(SegmentIndex, Segment)> {
        let s = self.slot(node).ok()?;
        let slot = slot_of(node);
        (current == index_fake_segment(2 * slot - 2)).then(|| (index_fake_segment(2 * slot - 1), s.segments[1]))
    }

    /// The fake segment joining the real node `real` to the fake node `fake`, if any.
    pub fn extra_fake_segment(&self, real: NodeIndex, fake: NodeIndex) -> Option<(SegmentIndex, Segment)> {
        let s = self.slot(fake).ok()?;
        let slot = slot_of(fake);
        s.segments
            .iter()
            .enumerate()
            .find(|(_, seg)| seg.node1 == real || seg.node2 == real)
            .map(|(i, seg)| (index_fake_segment(2 * slot - 2 + i as u32), *seg))
    }

    pub fn lookup_fake_segment(&self, index: SegmentIndex) -> Result<Segment, FakeError> {
        if !is_fake(index) {
            return Err(FakeError::Unknown(index));
        }
        let position = slot_of(index);
        let slot = position / 2 + 1;
        self.slots
            .get(slot as usize)
            .and_then(Option::as_ref)
            .map(|s| s.segments[(position % 2) as usize])
            .ok_or(FakeError::Unknown(index))
    }
}

/// Index of the fake segment stored at `position` (`2 * slot - 2` or `2 * slot - 1`).
#[inline]
pub fn index_fake_segment(position: u32) -> SegmentIndex {
    FAKE_BASE + position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::degrees_to_radians;
    use crate::graph::{GraphBuilder, MemoryGraph};
    use crate::models::{Highway, Way, ALLOW_ALL, DISTANCE_MASK, ONEWAY_1TO2};

    fn one_segment(flags: u32) -> MemoryGraph {
        let mut b = GraphBuilder::new();
        let a = b.add_node(10.0, 20.0, ALLOW_ALL);
        let c = b.add_node(10.0, 20.01, ALLOW_ALL);
        let w = b.add_way(Way::new(Highway::Secondary, ALLOW_ALL));
        b.add_segment_with_distance(a, c, w, 1000, flags);
        b.build().unwrap()
    }

    #[test]
    fn split_creates_node_and_two_segments() {
        let g = one_segment(ONEWAY_1TO2);
        let mut o = FakeOverlay::new();
        let fake = o.create_fake(&g, 1, 0, 0, 1, 400, 600).unwrap();
        assert_eq!(fake, FAKE_BASE + 1);

        let (lat, lon) = o.fake_lat_long(fake).unwrap();
        assert!((lat - degrees_to_radians(10.0)).abs() < 1e-7);
        assert!((lon - degrees_to_radians(20.004)).abs() < 1e-7);

        let (i0, s0) = o.first_fake_segment(fake).unwrap();
        assert_eq!(i0, FAKE_BASE);
        assert_eq!((s0.node1, s0.node2, s0.metres()), (0, fake, 400));
        let (i1, s1) = o.next_fake_segment(i0, fake).unwrap();
        assert_eq!(i1, FAKE_BASE + 1);
        assert_eq!((s1.node1, s1.node2, s1.metres()), (fake, 1, 600));
        assert!(o.next_fake_segment(i1, fake).is_none());

        // way and flag bits survive the split
        for s in [s0, s1] {
            assert_eq!(s.way, 0);
            assert!(s.is_normal());
            assert!(s.is_oneway_to(s.node2));
        }
        assert_eq!(o.original_segment(fake).unwrap(), 0);
        assert_eq!(o.lookup_fake_segment(i1).unwrap(), s1);
    }

    #[test]
    fn extra_segment_joins_real_end_to_fake() {
        let g = one_segment(0);
        let mut o = FakeOverlay::new();
        let fake = o.create_fake(&g, 3, 0, 1, 0, 250, 750).unwrap();
        let (i, s) = o.extra_fake_segment(0, fake).unwrap();
        assert_eq!(s.other_node(0), fake);
        assert_eq!(s.metres(), 750);
        assert_eq!(i, index_fake_segment(2 * 3 - 1));
        let (_, s) = o.extra_fake_segment(1, fake).unwrap();
        assert_eq!(s.metres(), 250);
        assert!(o.extra_fake_segment(7, fake).is_none());
    }

    #[test]
    fn snaps_to_endpoints_within_tolerance() {
        let g = one_segment(0);
        let mut o = FakeOverlay::new();
        assert_eq!(o.create_fake(&g, 1, 0, 0, 1, 3, 997).unwrap(), 0);
        assert_eq!(o.create_fake(&g, 1, 0, 0, 1, 997, 4).unwrap(), 1);

        let short = one_segment(0);
        assert_eq!(o.create_fake(&short, 2, 0, 0, 1, 2, 3).unwrap(), 0);
        assert_eq!(o.create_fake(&short, 2, 0, 0, 1, 4, 1).unwrap(), 1);
        assert_eq!(o.create_fake(&short, 2, 0, 0, 1, 2, 2).unwrap(), 0);
        assert!(o.fake_lat_long(FAKE_BASE + 1).is_err());
    }

    #[test]
    fn end_exactly_at_tolerance_is_split() {
        let g = one_segment(0);
        let mut o = FakeOverlay::with_tolerance(5);
        assert_eq!(o.create_fake(&g, 1, 0, 0, 1, 5, 995).unwrap(), FAKE_BASE + 1);
        assert_eq!(o.create_fake(&g, 2, 0, 0, 1, 995, 5).unwrap(), FAKE_BASE + 2);
        assert_eq!(o.create_fake(&g, 3, 0, 0, 1, 4, 996).unwrap(), 0);
    }

    #[test]
    fn oversized_split_distance_saturates() {
        let g = one_segment(ONEWAY_1TO2);
        let mut o = FakeOverlay::new();
        let fake = o.create_fake(&g, 1, 0, 0, 1, (1 << 28) + 5, 600).unwrap();
        let (_, first) = o.first_fake_segment(fake).unwrap();
        assert_eq!(first.metres(), DISTANCE_MASK);
        assert!(first.is_normal() && first.is_oneway_to(first.node2));
    }

    #[test]
    fn deterministic_for_same_input() {
        let g = one_segment(0);
        let mut a = FakeOverlay::new();
        let mut b = FakeOverlay::new();
        let fa = a.create_fake(&g, 5, 0, 0, 1, 123, 877).unwrap();
        let fb = b.create_fake(&g, 5, 0, 0, 1, 123, 877).unwrap();
        assert_eq!(fa, fb);
        assert_eq!(a.fake_lat_long(fa).unwrap(), b.fake_lat_long(fb).unwrap());
        assert_eq!(a.first_fake_segment(fa).unwrap(), b.first_fake_segment(fb).unwrap());
    }

    #[test]
    fn rejects_bad_slots_and_endpoints() {
        let g = one_segment(0);
        let mut o = FakeOverlay::new();
        assert!(matches!(o.create_fake(&g, 0, 0, 0, 1, 10, 10), Err(RouteError::Fake(FakeError::InvalidSlot(0)))));
        assert!(matches!(o.create_fake(&g, 100, 0, 0, 1, 10, 10), Err(RouteError::Fake(FakeError::InvalidSlot(100)))));
        assert!(matches!(
            o.create_fake(&g, 1, 0, 0, 5, 10, 10),
            Err(RouteError::Fake(FakeError::NotEndpoint { node: 5, .. }))
        ));
        assert_eq!(o.first_fake_segment(FAKE_BASE + 9), Err(FakeError::Unknown(FAKE_BASE + 9)));
    }

    #[test]
    fn longitude_unwraps_across_antimeridian() {
        let mut b = GraphBuilder::new();
        let a = b.add_node(0.0, 179.9, ALLOW_ALL);
        let c = b.add_node(0.0, -179.9, ALLOW_ALL);
        let w = b.add_way(Way::new(Highway::Ferry, ALLOW_ALL));
        b.add_segment_with_distance(a, c, w, 1000, 0);
        let g = b.build().unwrap();
        let mut o = FakeOverlay::new();
        let fake = o.create_fake(&g, 1, 0, 0, 1, 500, 500).unwrap();
        let (_, lon) = o.fake_lat_long(fake).unwrap();
        assert!((lon.abs() - PI).abs() < 1e-6, "lon={lon}");
    }
}
