//! Nearest node / nearest segment lookup over the bin grid.
//!
//! Both searches start in the bin holding the query point and spiral outwards one
//! ring of bins at a time, skipping bins whose corners are all further away than the
//! search radius. They stop after the first ring in which no bin was worth examining.

use serde::{Deserialize, Serialize};

use crate::geo::{distance_m, latlong_to_bin, radians_to_latlong};
use crate::models::{NodeIndex, SegmentIndex};

use super::{GraphError, GraphStore};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClosestNode {
    pub node: NodeIndex,
    pub distance_m: f64,
}

/// Closest point on a segment. `dist1`/`dist2` are the distances along the segment from
/// `node1`/`node2` to the projected point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClosestSegment {
    pub segment: SegmentIndex,
    pub node1: NodeIndex,
    pub node2: NodeIndex,
    pub dist1: u32,
    pub dist2: u32,
    pub distance_m: f64,
}

/// Visit every bin that may hold a node within `radius_m` of the point, ring by ring.
/// `visit` returns the radius to use from then on.
fn spiral<G, F>(graph: &G, lat: f64, lon: f64, radius_m: f64, mut visit: F) -> Result<(), GraphError>
where
    G: GraphStore,
    F: FnMut(u32, u32, f64) -> Result<f64, GraphError>,
{
    let grid = graph.grid();
    if grid.bins() == 0 {
        return Ok(());
    }
    let lat_bins = grid.lat_bins as i32;
    let lon_bins = grid.lon_bins as i32;
    let lat_bin = latlong_to_bin(radians_to_latlong(lat)) - grid.lat_zero;
    let lon_bin = latlong_to_bin(radians_to_latlong(lon)) - grid.lon_zero;
    let reach = [lat_bin, lat_bins - 1 - lat_bin, lon_bin, lon_bins - 1 - lon_bin]
        .iter()
        .map(|d| d.abs())
        .max()
        .unwrap_or(0);

    let mut radius = radius_m;
    let mut delta = 0i32;
    loop {
        let mut in_grid = 0u32;
        let mut examined = 0u32;
        for latb in (lat_bin - delta)..=(lat_bin + delta) {
            if latb < 0 || latb >= lat_bins {
                continue;
            }
            for lonb in (lon_bin - delta)..=(lon_bin + delta) {
                if lonb < 0 || lonb >= lon_bins {
                    continue;
                }
                if (latb - lat_bin).abs() < delta && (lonb - lon_bin).abs() < delta {
                    continue;
                }
                in_grid += 1;
                if delta > 0 && !bin_may_be_close(graph, lat, lon, latb, lonb, lat_bin, lon_bin, radius) {
                    continue;
                }
                radius = visit(latb as u32, lonb as u32, radius)?;
                examined += 1;
            }
        }
        if examined == 0 && (in_grid > 0 || delta > reach) {
            return Ok(());
        }
        delta += 1;
    }
}

#[allow(clippy::too_many_arguments)]
fn bin_may_be_close<G: GraphStore>(
    graph: &G,
    lat: f64,
    lon: f64,
    latb: i32,
    lonb: i32,
    lat_bin: i32,
    lon_bin: i32,
    radius: f64,
) -> bool {
    let grid = graph.grid();
    let (lat1, lon1) = grid.corner(latb, lonb);
    let (lat2, lon2) = grid.corner(latb + 1, lonb + 1);
    if latb == lat_bin {
        distance_m(lat, lon1, lat, lon) <= radius || distance_m(lat, lon2, lat, lon) <= radius
    } else if lonb == lon_bin {
        distance_m(lat1, lon, lat, lon) <= radius || distance_m(lat2, lon, lat, lon) <= radius
    } else {
        [(lat1, lon1), (lat2, lon1), (lat2, lon2), (lat1, lon2)]
            .iter()
            .any(|&(a, o)| distance_m(a, o, lat, lon) <= radius)
    }
}

fn bin_nodes<G: GraphStore>(graph: &G, latb: u32, lonb: u32) -> Result<std::ops::Range<u32>, GraphError> {
    let bin = graph.grid().linear(latb, lonb);
    Ok(graph.bin_offset(bin)?..graph.bin_offset(bin + 1)?)
}

/// Does any way touching `node` admit one of the `allow` bits?
fn node_reachable<G: GraphStore>(graph: &G, node: NodeIndex, allow: u16) -> Result<bool, GraphError> {
    for item in graph.adjacent(node) {
        let (_, segment) = item?;
        if graph.way(segment.way)?.allow & allow != 0 {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Closest node within `radius_m` of (`lat`, `lon`) radians. With `allow`, only nodes
/// on a way open to one of those transports qualify.
pub fn find_closest_node<G: GraphStore>(
    graph: &G,
    lat: f64,
    lon: f64,
    radius_m: f64,
    allow: Option<u16>,
) -> Result<Option<ClosestNode>, GraphError> {
    let mut best: Option<ClosestNode> = None;
    spiral(graph, lat, lon, radius_m, |latb, lonb, radius| {
        let mut radius = radius;
        for position in bin_nodes(graph, latb, lonb)? {
            let node = graph.bin_node(position)?;
            let (nlat, nlon) = graph.lat_long(node)?;
            let d = distance_m(nlat, nlon, lat, lon);
            if d >= radius {
                continue;
            }
            if let Some(mask) = allow {
                if !node_reachable(graph, node, mask)? {
                    continue;
                }
            }
            best = Some(ClosestNode { node, distance_m: d });
            radius = d;
        }
        Ok(radius)
    })?;
    Ok(best)
}

/// Closest normal segment with an endpoint within `radius_m` of (`lat`, `lon`) radians,
/// projecting the point onto each candidate on a locally flat earth.
pub fn find_closest_segment<G: GraphStore>(
    graph: &G,
    lat: f64,
    lon: f64,
    radius_m: f64,
    allow: Option<u16>,
) -> Result<Option<ClosestSegment>, GraphError> {
    let mut best: Option<ClosestSegment> = None;
    spiral(graph, lat, lon, radius_m, |latb, lonb, radius| {
        for position in bin_nodes(graph, latb, lonb)? {
            let node = graph.bin_node(position)?;
            let (lat1, lon1) = graph.lat_long(node)?;
            let dist1 = distance_m(lat1, lon1, lat, lon);
            if dist1 >= radius {
                continue;
            }
            for item in graph.adjacent(node) {
                let (index, segment) = item?;
                if !segment.is_normal() {
                    continue;
                }
                if let Some(mask) = allow {
                    if graph.way(segment.way)?.allow & mask == 0 {
                        continue;
                    }
                }
                let other = segment.other_node(node);
                let (lat2, lon2) = graph.lat_long(other)?;
                let dist2 = distance_m(lat2, lon2, lat, lon);
                let dist3 = distance_m(lat1, lon1, lat2, lon2);

                let (along1, along2, offset) = project(dist1, dist2, dist3);
                if best.map_or(true, |b| offset < b.distance_m) {
                    best = Some(ClosestSegment {
                        segment: index,
                        node1: node,
                        node2: other,
                        dist1: along1 as u32,
                        dist2: along2 as u32,
                        distance_m: offset,
                    });
                }
            }
        }
        Ok(radius)
    })?;
    Ok(best)
}

/// Split a segment of length `dist3` whose endpoints are `dist1` and `dist2` from a point.
/// Returns the distances along the segment from each end and the perpendicular offset.
fn project(dist1: f64, dist2: f64, dist3: f64) -> (f64, f64, f64) {
    if dist3 <= 0.0 {
        return (0.0, 0.0, dist1);
    }
    let along1 = (dist1 * dist1 - dist2 * dist2 + dist3 * dist3) / (2.0 * dist3);
    let along2 = dist3 - along1;
    if along1 >= 0.0 && along2 >= 0.0 {
        (along1, along2, (dist1 * dist1 - along1 * along1).max(0.0).sqrt())
    } else if along1 > 0.0 {
        (dist3, 0.0, dist2)
    } else {
        (0.0, dist3, dist1)
    }
}
