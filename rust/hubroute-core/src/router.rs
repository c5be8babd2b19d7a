//! Query driver: places waypoints on the graph and runs the searches for each leg.

use std::time::Instant;

use crate::config::RouterConfig;
use crate::engine::{build_route, fix_forward_route, EngineView, ResultStore, Search};
use crate::errors::RouteError;
use crate::fakes::FakeOverlay;
use crate::geo::degrees_to_radians;
use crate::graph::spatial::{find_closest_node, find_closest_segment};
use crate::graph::GraphStore;
use crate::models::{is_fake, NodeIndex, MAX_WAYPOINTS};
use crate::profile::{PreparedProfile, Profile};
use crate::route::{Journey, Route};

pub struct Router<G: GraphStore> {
    graph: G,
    profile: Profile,
    prepared: PreparedProfile,
    config: RouterConfig,
}

impl<G: GraphStore> Router<G> {
    pub fn new(graph: G, profile: Profile, config: RouterConfig) -> Result<Self, RouteError> {
        let prepared = profile.prepare(graph.properties_seen())?;
        if let Err(e) = prepared.check_heuristic() {
            if config.strict_heuristic {
                return Err(e.into());
            }
            tracing::warn!(profile = %profile.name, error = %e, "heuristic_not_admissible");
        }
        Ok(Self { graph, profile, prepared, config })
    }

    pub fn graph(&self) -> &G { &self.graph }
    pub fn profile(&self) -> &Profile { &self.profile }
    pub fn prepared(&self) -> &PreparedProfile { &self.prepared }
    pub fn config(&self) -> &RouterConfig { &self.config }

    /// Empty overlay using the configured snapping tolerance.
    pub fn new_overlay(&self) -> FakeOverlay { FakeOverlay::with_tolerance(self.config.snap_tolerance_m) }

    pub fn search<'a>(&'a self, overlay: &'a FakeOverlay) -> Search<'a, G> {
        Search::new(EngineView::new(&self.graph, overlay), &self.prepared, &self.config)
    }

    /// Put waypoint `slot` at (`lat_deg`, `lon_deg`): on the nearest usable segment,
    /// split there unless an end is close enough, or else on the nearest node.
    pub fn locate(
        &self,
        slot: u32,
        lat_deg: f64,
        lon_deg: f64,
        overlay: &mut FakeOverlay,
    ) -> Result<Option<NodeIndex>, RouteError> {
        overlay.clear(slot);
        let lat = degrees_to_radians(lat_deg);
        let lon = degrees_to_radians(lon_deg);
        let allow = Some(self.prepared.allow);
        let radius = self.config.search_radius_m;

        if let Some(hit) = find_closest_segment(&self.graph, lat, lon, radius, allow)? {
            // split in proportion, measured against the stored segment length
            let metres = self.graph.segment(hit.segment)?.metres();
            let along = hit.dist1 as f64 + hit.dist2 as f64;
            let dist1 = if along > 0.0 { (metres as f64 * hit.dist1 as f64 / along).round() as u32 } else { 0 };
            let dist2 = metres.saturating_sub(dist1);
            let node = overlay.create_fake(&self.graph, slot, hit.segment, hit.node1, hit.node2, dist1, dist2)?;
            tracing::debug!(slot, node, segment = hit.segment, offset_m = hit.distance_m, "waypoint_located");
            return Ok(Some(node));
        }
        let node = find_closest_node(&self.graph, lat, lon, radius, allow)?.map(|c| c.node);
        tracing::debug!(slot, ?node, "waypoint_located_on_node");
        Ok(node)
    }

    /// Route between two nodes, either of which may be a fake node in `overlay`.
    pub fn route(&self, start: NodeIndex, finish: NodeIndex, overlay: &FakeOverlay) -> Result<Route, RouteError> {
        self.route_leg(0, start, finish, overlay)
    }

    /// Route through 2 to 99 coordinates (degrees), one leg per consecutive pair.
    pub fn route_waypoints(&self, points: &[(f64, f64)]) -> Result<Journey, RouteError> {
        if points.len() < 2 || points.len() > MAX_WAYPOINTS as usize {
            return Err(RouteError::TooManyWaypoints { count: points.len() });
        }
        let mut overlay = self.new_overlay();
        let mut nodes = Vec::with_capacity(points.len());
        for (index, &(lat, lon)) in points.iter().enumerate() {
            let node = self.locate(index as u32 + 1, lat, lon, &mut overlay)?.ok_or(RouteError::NoWaypoint { index })?;
            nodes.push(node);
        }
        let legs = nodes
            .windows(2)
            .enumerate()
            .map(|(leg, pair)| self.route_leg(leg, pair[0], pair[1], &overlay))
            .collect::<Result<Vec<_>, _>>()?;
        let journey = Journey::new(legs);
        tracing::info!(
            waypoints = points.len(),
            distance_m = journey.distance_m,
            duration_s = journey.duration_s,
            "journey_routed"
        );
        Ok(journey)
    }

    fn route_leg(&self, leg: usize, start: NodeIndex, finish: NodeIndex, overlay: &FakeOverlay) -> Result<Route, RouteError> {
        let t0 = Instant::now();
        let search = self.search(overlay);
        let results = if start == finish {
            let mut single = ResultStore::new(1);
            single.start = start;
            single.finish = finish;
            single.insert(start);
            single
        } else {
            hierarchical(&search, start, finish)?.ok_or(RouteError::NoRoute { leg })?
        };
        let route = build_route(&search, &results)?;
        tracing::info!(
            leg,
            start,
            finish,
            hops = route.hops.len(),
            distance_m = route.distance_m(),
            duration_s = route.duration_s(),
            duration_ms = t0.elapsed().as_millis() as u64,
            "leg_routed"
        );
        Ok(route)
    }
}

fn hierarchical<G: GraphStore>(
    search: &Search<'_, G>,
    start: NodeIndex,
    finish: NodeIndex,
) -> Result<Option<ResultStore>, RouteError> {
    let Some(mut begin) = search.find_start_routes(start)? else { return Ok(None) };
    if let Some(fid) = begin.find(finish) {
        if let Some(via) = via_hubs(search, &begin, finish, begin[fid].score)? {
            return Ok(Some(via));
        }
        begin.finish = finish;
        fix_forward_route(&mut begin, fid)?;
        return Ok(Some(begin));
    }
    // both ends may sit on the same stretch with no hub in between
    if is_fake(finish) {
        if let Some(direct) = search.find_normal_route(start, finish)? {
            let score = direct.find(finish).map_or(f64::INFINITY, |fid| direct[fid].score);
            return Ok(Some(via_hubs(search, &begin, finish, score)?.unwrap_or(direct)));
        }
    }
    via_hubs(search, &begin, finish, f64::INFINITY)
}

/// Route through the hub graph, if there is one scoring below `limit`.
fn via_hubs<G: GraphStore>(
    search: &Search<'_, G>,
    begin: &ResultStore,
    finish: NodeIndex,
    limit: f64,
) -> Result<Option<ResultStore>, RouteError> {
    let view = search.view();
    let mut hub_below = false;
    for (_, r) in begin.iter() {
        if r.score < limit && view.is_super(r.node)? {
            hub_below = true;
            break;
        }
    }
    if !hub_below {
        return Ok(None);
    }
    let Some(end) = search.find_finish_routes(finish)? else { return Ok(None) };
    let Some(hubs) = search.find_middle_route_below(begin, &end, limit)? else { return Ok(None) };
    let combined = search.combine_routes(&hubs)?;
    let score = combined.find(finish).map_or(f64::INFINITY, |fid| combined[fid].score);
    if score < limit {
        tracing::debug!(start = begin.start, finish, score, limit, "hub_route_chosen");
        Ok(Some(combined))
    } else {
        Ok(None)
    }
}
