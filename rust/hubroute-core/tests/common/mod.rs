#![allow(dead_code)]

use hubroute_core::engine::admissibility::{Admissibility, Check, Edge, Level, Travel, Verdict};
use hubroute_core::engine::CostModel;
use hubroute_core::models::{NodeIndex, NO_NODE};
use hubroute_core::{GraphStore, Route, Router};

/// Plain Dijkstra over every normal segment, hubs ignored.
pub fn reference_scores<G: GraphStore>(router: &Router<G>, from: NodeIndex) -> Vec<f64> {
    let g = router.graph();
    let profile = router.prepared();
    let cost = CostModel::new(profile);
    let rules = Admissibility::new(vec![
        Check::SegmentLevel(Level::Normal),
        Check::Oneway(Travel::Forward),
        Check::WayTransport,
        Check::HighwayClass,
        Check::Weight,
        Check::Height,
        Check::Width,
        Check::Length,
        Check::Properties,
        Check::NodeTransport,
    ]);
    let n = g.node_count() as usize;
    let mut best = vec![f64::INFINITY; n];
    let mut done = vec![false; n];
    best[from as usize] = 0.0;
    loop {
        let next = (0..n).filter(|&i| !done[i] && best[i].is_finite()).min_by(|&a, &b| best[a].total_cmp(&best[b]));
        let Some(u) = next else { break };
        done[u] = true;
        for item in g.adjacent(u as NodeIndex) {
            let (_, segment) = item.unwrap();
            let v = segment.other_node(u as NodeIndex);
            let way = g.way(segment.way).unwrap();
            let node = g.node(v).unwrap();
            let edge = Edge {
                from: u as NodeIndex,
                to: v,
                segment: &segment,
                way: &way,
                came_from: NO_NODE,
                to_node: Some(&node),
                endpoint: NO_NODE,
            };
            if let Verdict::Accept { pref } = rules.evaluate(profile, &edge) {
                let score = best[u] + cost.edge_cost(&segment, &way, pref);
                if score < best[v as usize] {
                    best[v as usize] = score;
                }
            }
        }
    }
    best
}

/// Every hop after the first arrives on a normal segment joining it to the previous hop,
/// driven in an allowed direction.
pub fn assert_drivable<G: GraphStore>(router: &Router<G>, route: &Route) {
    for pair in route.hops.windows(2) {
        let index = pair[1].segment.expect("hop without a segment");
        let segment = router.graph().segment(index).unwrap();
        let (from, to) = (pair[0].node, pair[1].node);
        assert!(segment.is_normal(), "{from}->{to} on a hub-only segment");
        assert_eq!(segment.other_node(from), to, "segment {index} does not join {from} and {to}");
        assert!(!(router.prepared().oneway && segment.is_oneway_to(from)), "{from}->{to} against a oneway");
    }
}
