use serde::{Deserialize, Serialize};

use crate::models::{NodeIndex, SegmentIndex, WayIndex};

/// One node along a route and the segment used to reach it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteHop {
    pub node: NodeIndex,
    /// Graph segment arrived on; for a piece of a split segment, the segment it was split from.
    pub segment: Option<SegmentIndex>,
    pub way: Option<WayIndex>,
    /// Degrees.
    pub latitude: f64,
    pub longitude: f64,
    /// Waypoint placed part-way along a segment rather than on a graph node.
    pub fake: bool,
    pub distance_m: f64,
    pub duration_s: f64,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    /// Search score accumulated up to here.
    pub score: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub hops: Vec<RouteHop>,
}

impl Route {
    pub fn start(&self) -> Option<&RouteHop> { self.hops.first() }
    pub fn finish(&self) -> Option<&RouteHop> { self.hops.last() }

    pub fn distance_m(&self) -> f64 { self.finish().map_or(0.0, |h| h.total_distance_m) }
    pub fn duration_s(&self) -> f64 { self.finish().map_or(0.0, |h| h.total_duration_s) }
    pub fn score(&self) -> f64 { self.finish().map_or(0.0, |h| h.score) }

    pub fn nodes(&self) -> Vec<NodeIndex> { self.hops.iter().map(|h| h.node).collect() }
}

/// Consecutive legs between waypoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub legs: Vec<Route>,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl Journey {
    pub fn new(legs: Vec<Route>) -> Self {
        let distance_m = legs.iter().map(Route::distance_m).sum();
        let duration_s = legs.iter().map(Route::duration_s).sum();
        Self { legs, distance_m, duration_s }
    }
}
