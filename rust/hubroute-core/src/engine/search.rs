//! The four searches behind a hierarchical route.
//!
//! All of them run the same label-correcting loop over a `ResultStore`. What differs is
//! the edge checks, which link (`prev` or `next`) a result records, which nodes get
//! queued and when the loop may stop; a `Policy` carries the last three.

use std::time::Instant;

use crate::config::RouterConfig;
use crate::errors::RouteError;
use crate::geo::distance_m;
use crate::graph::GraphStore;
use crate::models::{Node, NodeIndex, NO_NODE, NO_SEGMENT};
use crate::profile::PreparedProfile;

use super::admissibility::{Admissibility, Edge, Verdict};
use super::assemble::fix_forward_route;
use super::cost::CostModel;
use super::queue::ResultQueue;
use super::results::{NodeResult, ResultId, ResultStore};
use super::view::EngineView;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link {
    Prev,
    Next,
}

trait Policy {
    /// Scores above this are not worth extending.
    fn bound(&self) -> f64;

    /// True when the popped result ends the search.
    fn done(&self, _popped: &NodeResult) -> bool { false }

    fn sortby(&self, _node: NodeIndex, score: f64) -> Result<f64, RouteError> { Ok(score) }

    /// `id` now holds `score`; returns whether it should be queued.
    fn reached(&mut self, id: ResultId, node: NodeIndex, score: f64, record: Option<&Node>) -> Result<bool, RouteError>;
}

/// Towards a single known finish, which is recorded but never expanded.
struct ToFinish {
    finish: NodeIndex,
    finish_score: f64,
}

impl Policy for ToFinish {
    fn bound(&self) -> f64 { self.finish_score }

    fn reached(&mut self, _id: ResultId, node: NodeIndex, score: f64, _record: Option<&Node>) -> Result<bool, RouteError> {
        if node == self.finish {
            self.finish_score = score;
            return Ok(false);
        }
        Ok(score <= self.finish_score)
    }
}

/// Outwards until hubs: only real, non-hub nodes are expanded further.
struct ToHubs;

impl Policy for ToHubs {
    fn bound(&self) -> f64 { f64::INFINITY }

    fn reached(&mut self, _id: ResultId, _node: NodeIndex, _score: f64, record: Option<&Node>) -> Result<bool, RouteError> {
        Ok(record.map_or(false, |n| !n.is_super()))
    }
}

/// Hub to hub, guided towards the finish and closed off by the finish-side results.
struct AcrossHubs<'a, 'g, G: GraphStore> {
    view: EngineView<'g, G>,
    cost: CostModel<'g>,
    end: &'a ResultStore,
    finish_lat: f64,
    finish_lon: f64,
    finish_score: f64,
    end_prev: Option<ResultId>,
}

impl<'a, 'g, G: GraphStore> Policy for AcrossHubs<'a, 'g, G> {
    fn bound(&self) -> f64 { self.finish_score }

    fn done(&self, popped: &NodeResult) -> bool { popped.sortby > self.finish_score }

    fn sortby(&self, node: NodeIndex, score: f64) -> Result<f64, RouteError> {
        let (lat, lon) = self.view.lat_long(node)?;
        Ok(score + self.cost.heuristic(distance_m(lat, lon, self.finish_lat, self.finish_lon)))
    }

    fn reached(&mut self, id: ResultId, node: NodeIndex, score: f64, _record: Option<&Node>) -> Result<bool, RouteError> {
        if let Some(e) = self.end.find(node) {
            let combined = score + self.end[e].score;
            if combined <= self.finish_score {
                self.finish_score = combined;
                self.end_prev = Some(id);
            }
        }
        Ok(true)
    }
}

/// Searches for one query: the graph plus its overlay, a prepared profile and limits.
pub struct Search<'a, G: GraphStore> {
    view: EngineView<'a, G>,
    profile: &'a PreparedProfile,
    cost: CostModel<'a>,
    config: &'a RouterConfig,
}

impl<'a, G: GraphStore> Search<'a, G> {
    pub fn new(view: EngineView<'a, G>, profile: &'a PreparedProfile, config: &'a RouterConfig) -> Self {
        Self { view, profile, cost: CostModel::new(profile), config }
    }

    pub fn view(&self) -> EngineView<'a, G> { self.view }
    pub fn cost(&self) -> CostModel<'a> { self.cost }
    pub fn config(&self) -> &'a RouterConfig { self.config }

    fn seeded(&self, bins: usize, start: NodeIndex, finish: NodeIndex, origin: NodeIndex) -> (ResultStore, ResultQueue, ResultId) {
        let mut results = ResultStore::new(bins);
        results.start = start;
        results.finish = finish;
        let id = results.insert(origin);
        (results, ResultQueue::new(), id)
    }

    #[allow(clippy::too_many_arguments)]
    fn run<P: Policy>(
        &self,
        name: &'static str,
        rules: &Admissibility,
        link: Link,
        target: NodeIndex,
        results: &mut ResultStore,
        queue: &mut ResultQueue,
        policy: &mut P,
    ) -> Result<u64, RouteError> {
        let mut pops: u64 = 0;
        let mut edges = Vec::new();
        while let Some(id1) = queue.pop(results) {
            pops += 1;
            if pops > self.config.max_pops {
                return Err(RouteError::NotConverged { search: name, pops });
            }
            let r1 = results[id1];
            if policy.done(&r1) {
                break;
            }
            if r1.score > policy.bound() {
                continue;
            }
            let node1 = r1.node;
            let linked = match link {
                Link::Prev => r1.prev,
                Link::Next => r1.next,
            };
            let came_from = linked.map_or(NO_NODE, |l| results[l].node);

            self.view.neighbours(node1, target, &mut edges)?;
            for &(seg_index, segment) in &edges {
                let node2 = segment.other_node(node1);
                let way = self.view.graph().way(segment.way)?;
                let record = self.view.real_node(node2)?;
                let edge = Edge {
                    from: node1,
                    to: node2,
                    segment: &segment,
                    way: &way,
                    came_from,
                    to_node: record.as_ref(),
                    endpoint: target,
                };
                let pref = match rules.evaluate(self.profile, &edge) {
                    Verdict::Accept { pref } => pref,
                    Verdict::Reject(reason) => {
                        tracing::trace!(search = name, node1, node2, ?reason, "edge_rejected");
                        continue;
                    }
                };
                let score = r1.score + self.cost.edge_cost(&segment, &way, pref);
                if score > policy.bound() {
                    continue;
                }
                let id2 = match results.find(node2) {
                    None => results.insert(node2),
                    Some(id2) if score < results[id2].score => id2,
                    Some(_) => continue,
                };
                let sortby = policy.sortby(node2, score)?;
                let r2 = &mut results[id2];
                match link {
                    Link::Prev => r2.prev = Some(id1),
                    Link::Next => r2.next = Some(id1),
                }
                r2.segment = seg_index;
                r2.score = score;
                r2.sortby = sortby;
                if policy.reached(id2, node2, score, record.as_ref())? {
                    queue.push(results, id2);
                }
            }
        }
        Ok(pops)
    }

    /// Best route from `start` to `finish` over normal segments, passing no hub on the way.
    pub fn find_normal_route(&self, start: NodeIndex, finish: NodeIndex) -> Result<Option<ResultStore>, RouteError> {
        let t0 = Instant::now();
        let (mut results, mut queue, origin) = self.seeded(self.config.local_bins, start, finish, start);
        queue.push(&mut results, origin);
        let mut policy = ToFinish { finish, finish_score: f64::INFINITY };
        let pops = self.run("normal", &Admissibility::normal(), Link::Prev, finish, &mut results, &mut queue, &mut policy)?;
        let found = results.find(finish);
        tracing::debug!(
            start,
            finish,
            pops,
            results = results.len(),
            found = found.is_some(),
            duration_ms = t0.elapsed().as_millis() as u64,
            "normal_route_done"
        );
        let Some(fid) = found else { return Ok(None) };
        fix_forward_route(&mut results, fid)?;
        Ok(Some(results))
    }

    /// Everything reachable from `start` before the first hub, hubs included.
    pub fn find_start_routes(&self, start: NodeIndex) -> Result<Option<ResultStore>, RouteError> {
        let (mut results, mut queue, origin) = self.seeded(self.config.local_bins, start, NO_NODE, start);
        queue.push(&mut results, origin);
        let pops = self.run("start", &Admissibility::start(), Link::Prev, NO_NODE, &mut results, &mut queue, &mut ToHubs)?;
        tracing::debug!(start, pops, results = results.len(), "start_routes_done");
        Ok((results.len() > 1).then_some(results))
    }

    /// Everything that reaches `finish` without passing a hub, hubs included. Links run
    /// through `next`, towards the finish.
    pub fn find_finish_routes(&self, finish: NodeIndex) -> Result<Option<ResultStore>, RouteError> {
        let (mut results, mut queue, origin) = self.seeded(self.config.local_bins, NO_NODE, finish, finish);
        queue.push(&mut results, origin);
        let pops = self.run("finish", &Admissibility::finish(), Link::Next, NO_NODE, &mut results, &mut queue, &mut ToHubs)?;
        tracing::debug!(finish, pops, results = results.len(), "finish_routes_done");
        Ok((results.len() > 1).then_some(results))
    }

    /// Hub path from the hubs around `begin.start` to the hubs around `end.finish`.
    ///
    /// The returned store holds the start, the hubs crossed and the finish, linked both
    /// ways; the finish's score is the full route score through the chosen hubs.
    pub fn find_middle_route(&self, begin: &ResultStore, end: &ResultStore) -> Result<Option<ResultStore>, RouteError> {
        self.find_middle_route_below(begin, end, f64::INFINITY)
    }

    /// As `find_middle_route`, keeping only hub paths whose full score is at most `limit`.
    pub fn find_middle_route_below(
        &self,
        begin: &ResultStore,
        end: &ResultStore,
        limit: f64,
    ) -> Result<Option<ResultStore>, RouteError> {
        let t0 = Instant::now();
        let start = begin.start;
        let finish = end.finish;
        let (finish_lat, finish_lon) = self.view.lat_long(finish)?;
        let (mut results, mut queue, origin) = self.seeded(self.config.middle_bins, start, finish, start);
        let mut policy = AcrossHubs {
            view: self.view,
            cost: self.cost,
            end,
            finish_lat,
            finish_lon,
            finish_score: limit,
            end_prev: None,
        };

        for (_, seed) in begin.iter() {
            if seed.node == start || !self.view.is_super(seed.node)? {
                continue;
            }
            let id = results.insert(seed.node);
            let sortby = policy.sortby(seed.node, seed.score)?;
            let r = &mut results[id];
            r.prev = Some(origin);
            r.segment = seed.segment;
            r.score = seed.score;
            r.sortby = sortby;
            policy.reached(id, seed.node, seed.score, None)?;
            queue.push(&mut results, id);
        }
        if self.view.is_super(start)? {
            results[origin].sortby = policy.sortby(start, 0.0)?;
            policy.reached(origin, start, 0.0, None)?;
            queue.push(&mut results, origin);
        }

        let pops = self.run("middle", &Admissibility::middle(), Link::Prev, NO_NODE, &mut results, &mut queue, &mut policy)?;
        tracing::debug!(
            start,
            finish,
            pops,
            results = results.len(),
            found = policy.end_prev.is_some(),
            score = policy.finish_score,
            duration_ms = t0.elapsed().as_millis() as u64,
            "middle_route_done"
        );
        let Some(end_prev) = policy.end_prev else { return Ok(None) };

        let fid = if results[end_prev].node == finish {
            end_prev
        } else {
            let fid = match results.find(finish) {
                Some(fid) => fid,
                None => results.insert(finish),
            };
            let r = &mut results[fid];
            r.prev = Some(end_prev);
            r.segment = NO_SEGMENT;
            r.score = policy.finish_score;
            r.sortby = policy.finish_score;
            fid
        };
        fix_forward_route(&mut results, fid)?;
        Ok(Some(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeOverlay;
    use crate::graph::{GraphBuilder, MemoryGraph};
    use crate::models::{Highway, Way, ALLOW_ALL, ONEWAY_1TO2, SEGMENT_NORMAL, SEGMENT_SUPER};
    use crate::profile::Profile;

    const BOTH: u32 = SEGMENT_NORMAL | SEGMENT_SUPER;

    /// 0 - 1 - 2 - 3 - 4 along a line, 1 and 3 hubs, plus a super shortcut 1 - 3.
    fn hub_line() -> MemoryGraph {
        let mut b = GraphBuilder::new();
        let n: Vec<_> = (0..5).map(|i| b.add_node(0.0, i as f64 * 0.01, ALLOW_ALL)).collect();
        b.set_super(n[1]).set_super(n[3]);
        let w = b.add_way(Way::new(Highway::Primary, ALLOW_ALL));
        b.add_segment_with_distance(n[0], n[1], w, 1000, SEGMENT_NORMAL);
        b.add_segment_with_distance(n[1], n[2], w, 1000, SEGMENT_NORMAL);
        b.add_segment_with_distance(n[2], n[3], w, 1000, SEGMENT_NORMAL);
        b.add_segment_with_distance(n[3], n[4], w, 1000, SEGMENT_NORMAL);
        b.add_segment_with_distance(n[1], n[3], w, 2000, SEGMENT_SUPER);
        b.build().unwrap()
    }

    fn with_search<R>(g: &MemoryGraph, f: impl FnOnce(&Search<'_, MemoryGraph>) -> R) -> R {
        let overlay = FakeOverlay::new();
        let profile = Profile::motorcar().prepare(0).unwrap();
        let config = RouterConfig::default();
        let search = Search::new(EngineView::new(g, &overlay), &profile, &config);
        f(&search)
    }

    #[test]
    fn normal_route_stops_at_hubs() {
        let g = hub_line();
        with_search(&g, |s| {
            let r = s.find_normal_route(0, 1).unwrap().unwrap();
            let fid = r.find(1).unwrap();
            assert_eq!(r[fid].score, 1000.0 / 0.9);
            // 0 -> 2 would have to pass hub 1
            assert!(s.find_normal_route(0, 2).unwrap().is_none());
        });
    }

    #[test]
    fn start_and_finish_routes_end_at_hubs() {
        let g = hub_line();
        with_search(&g, |s| {
            let begin = s.find_start_routes(0).unwrap().unwrap();
            let nodes: Vec<_> = begin.iter().map(|(_, r)| r.node).collect();
            assert_eq!(nodes, vec![0, 1]);

            let end = s.find_finish_routes(4).unwrap().unwrap();
            let hub = end.find(3).unwrap();
            assert_eq!(end[hub].next.map(|n| end[n].node), Some(4));
            assert!(end.find(2).is_none());
        });
    }

    #[test]
    fn middle_route_crosses_hubs() {
        let g = hub_line();
        with_search(&g, |s| {
            let begin = s.find_start_routes(0).unwrap().unwrap();
            let end = s.find_finish_routes(4).unwrap().unwrap();
            let hubs = s.find_middle_route(&begin, &end).unwrap().unwrap();
            let start = hubs.find(0).unwrap();
            assert_eq!(hubs.forward_nodes(start), vec![0, 1, 3, 4]);
            let fid = hubs.find(4).unwrap();
            assert!((hubs[fid].score - 4000.0 / 0.9).abs() < 1e-9);
            let mut back = hubs.backward_nodes(fid);
            back.reverse();
            assert_eq!(back, vec![0, 1, 3, 4]);
        });
    }

    #[test]
    fn oneway_blocks_normal_route() {
        let mut b = GraphBuilder::new();
        let a = b.add_node(0.0, 0.0, ALLOW_ALL);
        let c = b.add_node(0.0, 0.01, ALLOW_ALL);
        let w = b.add_way(Way::new(Highway::Primary, ALLOW_ALL));
        // open only from c to a
        b.add_segment_with_distance(c, a, w, 1000, SEGMENT_NORMAL | ONEWAY_1TO2);
        let g = b.build().unwrap();
        with_search(&g, |s| {
            assert!(s.find_normal_route(a, c).unwrap().is_none());
            assert!(s.find_normal_route(c, a).unwrap().is_some());
        });
    }

    #[test]
    fn pop_limit_reports_not_converged() {
        let mut b = GraphBuilder::new();
        let n: Vec<_> = (0..3).map(|i| b.add_node(0.0, i as f64 * 0.01, ALLOW_ALL)).collect();
        let w = b.add_way(Way::new(Highway::Primary, ALLOW_ALL));
        b.add_segment(n[0], n[1], w, SEGMENT_NORMAL).add_segment(n[1], n[2], w, SEGMENT_NORMAL);
        let g = b.build().unwrap();
        let overlay = FakeOverlay::new();
        let profile = Profile::motorcar().prepare(0).unwrap();
        let config = RouterConfig { max_pops: 1, ..RouterConfig::default() };
        let s = Search::new(EngineView::new(&g, &overlay), &profile, &config);
        let err = s.find_start_routes(0).unwrap_err();
        assert!(matches!(err, RouteError::NotConverged { search: "start", pops: 2 }));
    }
}
