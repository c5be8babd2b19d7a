//! Turning search results into a route.

use std::time::Instant;

use crate::errors::RouteError;
use crate::geo::radians_to_degrees;
use crate::graph::GraphStore;
use crate::models::{is_fake, NO_NODE};
use crate::route::{Route, RouteHop};

use super::results::{ResultId, ResultStore};
use super::search::Search;

/// Walk `prev` links back from `finish`, pointing each result's `next` at its successor.
pub fn fix_forward_route(results: &mut ResultStore, finish: ResultId) -> Result<(), RouteError> {
    let mut current = finish;
    let mut steps = 0usize;
    while let Some(prev) = results[current].prev {
        steps += 1;
        if steps > results.len() {
            return Err(RouteError::BrokenChain { node: results[current].node });
        }
        results[prev].next = Some(current);
        current = prev;
    }
    Ok(())
}

impl<'a, G: GraphStore> Search<'a, G> {
    /// Expand a hub path into the full node sequence, one normal search per pair of
    /// consecutive hubs. Scores keep accumulating across the pieces.
    pub fn combine_routes(&self, hubs: &ResultStore) -> Result<ResultStore, RouteError> {
        let t0 = Instant::now();
        let mut combined = ResultStore::new(self.config().combined_bins);
        combined.start = hubs.start;
        combined.finish = hubs.finish;

        let first = hubs.find(hubs.start).ok_or(RouteError::BrokenChain { node: hubs.start })?;
        let mut tail = combined.insert(hubs.start);
        let mut from = hubs.start;
        let mut cursor = hubs[first].next;
        let mut legs = 0usize;
        while let Some(hub) = cursor {
            legs += 1;
            if legs > hubs.len() {
                return Err(RouteError::BrokenChain { node: from });
            }
            let to = hubs[hub].node;
            let leg = self.find_normal_route(from, to)?.ok_or(RouteError::InconsistentHierarchy { from, to })?;
            let base = combined[tail].score;
            let leg_start = leg.find(from).ok_or(RouteError::BrokenChain { node: from })?;

            let mut step = leg[leg_start].next;
            while let Some(piece_id) = step {
                let piece = leg[piece_id];
                // a node met again replaces its earlier visit, cutting out the loop
                let id = match combined.find(piece.node) {
                    Some(id) => id,
                    None => combined.insert(piece.node),
                };
                combined[tail].next = Some(id);
                let r = &mut combined[id];
                r.prev = Some(tail);
                r.next = None;
                r.segment = piece.segment;
                r.score = base + piece.score;
                r.sortby = r.score;
                tail = id;
                step = piece.next;
            }
            from = to;
            cursor = hubs[hub].next;
        }
        tracing::debug!(
            start = hubs.start,
            finish = hubs.finish,
            legs,
            results = combined.len(),
            score = combined[tail].score,
            duration_ms = t0.elapsed().as_millis() as u64,
            "routes_combined"
        );
        Ok(combined)
    }
}

/// Follow `next` links from the start and describe every hop.
pub fn build_route<G: GraphStore>(search: &Search<'_, G>, results: &ResultStore) -> Result<Route, RouteError> {
    let view = search.view();
    let cost = search.cost();
    let first = results.find(results.start).ok_or(RouteError::BrokenChain { node: results.start })?;

    let mut hops: Vec<RouteHop> = Vec::new();
    let mut total_distance = 0.0;
    let mut total_duration = 0.0;
    let mut cursor = Some(first);
    while let Some(id) = cursor {
        let r = results[id];
        if hops.len() >= results.len() {
            return Err(RouteError::BrokenChain { node: r.node });
        }
        let (lat, lon) = view.lat_long(r.node)?;
        let (segment, way, distance, duration) = if hops.is_empty() {
            (None, None, 0.0, 0.0)
        } else {
            let seg = view.segment(r.segment)?;
            let w = view.graph().way(seg.way)?;
            let index = if is_fake(r.segment) {
                let fake = if is_fake(seg.node1) { seg.node1 } else { seg.node2 };
                view.overlay().original_segment(fake)?
            } else {
                r.segment
            };
            (Some(index), Some(seg.way), seg.metres() as f64, cost.segment_seconds(&seg, &w))
        };
        total_distance += distance;
        total_duration += duration;
        hops.push(RouteHop {
            node: r.node,
            segment,
            way,
            latitude: radians_to_degrees(lat),
            longitude: radians_to_degrees(lon),
            fake: is_fake(r.node),
            distance_m: distance,
            duration_s: duration,
            total_distance_m: total_distance,
            total_duration_s: total_duration,
            score: r.score,
        });
        cursor = r.next;
    }

    let last = hops.last().map_or(NO_NODE, |h| h.node);
    if results.finish != NO_NODE && last != results.finish {
        return Err(RouteError::BrokenChain { node: last });
    }
    Ok(Route { hops })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::engine::view::EngineView;
    use crate::fakes::FakeOverlay;
    use crate::graph::{GraphBuilder, MemoryGraph};
    use crate::models::{Highway, Way, ALLOW_ALL, SEGMENT_NORMAL, SEGMENT_SUPER};
    use crate::profile::Profile;

    fn hub_line() -> MemoryGraph {
        let mut b = GraphBuilder::new();
        let n: Vec<_> = (0..5).map(|i| b.add_node(0.0, i as f64 * 0.01, ALLOW_ALL)).collect();
        b.set_super(n[1]).set_super(n[3]);
        let w = b.add_way(Way::new(Highway::Primary, ALLOW_ALL));
        for i in 0..4 {
            b.add_segment_with_distance(n[i], n[i + 1], w, 1000, SEGMENT_NORMAL);
        }
        b.add_segment_with_distance(n[1], n[3], w, 2000, SEGMENT_SUPER);
        b.build().unwrap()
    }

    #[test]
    fn fix_forward_mirrors_prev_links() {
        let mut store = ResultStore::new(8);
        let ids: Vec<_> = [5, 9, 2, 7].iter().map(|&n| store.insert(n)).collect();
        for w in ids.windows(2) {
            store[w[1]].prev = Some(w[0]);
        }
        fix_forward_route(&mut store, ids[3]).unwrap();
        assert_eq!(store.forward_nodes(ids[0]), vec![5, 9, 2, 7]);
        let mut back = store.backward_nodes(ids[3]);
        back.reverse();
        assert_eq!(back, store.forward_nodes(ids[0]));
    }

    #[test]
    fn fix_forward_detects_loops() {
        let mut store = ResultStore::new(8);
        let a = store.insert(1);
        let b = store.insert(2);
        store[a].prev = Some(b);
        store[b].prev = Some(a);
        assert!(matches!(fix_forward_route(&mut store, b), Err(RouteError::BrokenChain { .. })));
    }

    #[test]
    fn combined_route_matches_hub_score_and_builds() {
        let g = hub_line();
        let overlay = FakeOverlay::new();
        let profile = Profile::motorcar().prepare(0).unwrap();
        let config = RouterConfig::default();
        let s = Search::new(EngineView::new(&g, &overlay), &profile, &config);

        let begin = s.find_start_routes(0).unwrap().unwrap();
        let end = s.find_finish_routes(4).unwrap().unwrap();
        let hubs = s.find_middle_route(&begin, &end).unwrap().unwrap();
        let combined = s.combine_routes(&hubs).unwrap();

        let start = combined.find(0).unwrap();
        assert_eq!(combined.forward_nodes(start), vec![0, 1, 2, 3, 4]);
        let hub_score = hubs[hubs.find(4).unwrap()].score;
        let combined_score = combined[combined.find(4).unwrap()].score;
        assert!((hub_score - combined_score).abs() < 1e-9);

        let route = build_route(&s, &combined).unwrap();
        assert_eq!(route.nodes(), vec![0, 1, 2, 3, 4]);
        assert_eq!(route.distance_m(), 4000.0);
        // 96 km/h on primary roads
        assert!((route.duration_s() - 150.0).abs() < 1e-9);
        assert!(route.hops.iter().skip(1).all(|h| h.way == Some(0)));
        assert!(route.start().unwrap().segment.is_none());
    }

    #[test]
    fn broken_hub_path_is_inconsistent() {
        let g = hub_line();
        let overlay = FakeOverlay::new();
        let profile = Profile::motorcar().prepare(0).unwrap();
        let config = RouterConfig::default();
        let s = Search::new(EngineView::new(&g, &overlay), &profile, &config);

        // claims 0 reaches 4 directly, which no normal route does without crossing hubs
        let mut hubs = ResultStore::new(4);
        hubs.start = 0;
        hubs.finish = 4;
        let a = hubs.insert(0);
        let b = hubs.insert(4);
        hubs[b].prev = Some(a);
        fix_forward_route(&mut hubs, b).unwrap();
        assert!(matches!(s.combine_routes(&hubs), Err(RouteError::InconsistentHierarchy { from: 0, to: 4 })));
    }
}
