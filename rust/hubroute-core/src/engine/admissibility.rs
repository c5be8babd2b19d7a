//! Per-edge checks applied before a segment is relaxed.
//!
//! Each search variant holds an ordered list of checks. They run in order and the first
//! failure rejects the edge with its reason; an accepted edge comes back with the
//! combined highway and property preference used to scale its cost.

use crate::models::{Node, NodeIndex, Segment, Way, HIGHWAY_COUNT, NO_NODE};
use crate::profile::PreparedProfile;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Normal,
    Super,
}

/// Direction in which the search walks edges relative to travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Travel {
    /// Searching from `from` to `to`, the way it will be driven.
    Forward,
    /// Searching from the finish backwards: travel goes from `to` to `from`.
    Backward,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Check {
    SegmentLevel(Level),
    Oneway(Travel),
    NoUTurn,
    /// Destination must not be a hub unless it is the declared endpoint.
    AvoidHubs,
    WayTransport,
    HighwayClass,
    Weight,
    Height,
    Width,
    Length,
    Properties,
    NodeTransport,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    WrongLevel,
    Oneway,
    UTurn,
    ThroughHub,
    WayForbidden,
    HighwayExcluded,
    TooHeavy,
    TooHigh,
    TooWide,
    TooLong,
    PropertiesExcluded,
    NodeForbidden,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    Accept { pref: f64 },
    Reject(Rejection),
}

/// Everything the checks may look at for one candidate edge.
#[derive(Clone, Copy, Debug)]
pub struct Edge<'a> {
    pub from: NodeIndex,
    pub to: NodeIndex,
    pub segment: &'a Segment,
    pub way: &'a Way,
    /// Node linked to `from` in the search tree, `NO_NODE` at the origin.
    pub came_from: NodeIndex,
    /// Record of `to`, `None` for a fake node.
    pub to_node: Option<&'a Node>,
    /// Node exempt from `AvoidHubs`.
    pub endpoint: NodeIndex,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admissibility {
    checks: Vec<Check>,
}

fn way_checks() -> [Check; 8] {
    [
        Check::WayTransport,
        Check::HighwayClass,
        Check::Weight,
        Check::Height,
        Check::Width,
        Check::Length,
        Check::Properties,
        Check::NodeTransport,
    ]
}

impl Admissibility {
    pub fn new(checks: Vec<Check>) -> Self { Self { checks } }

    /// Local search between two given nodes.
    pub fn normal() -> Self {
        let mut checks = vec![Check::SegmentLevel(Level::Normal), Check::Oneway(Travel::Forward), Check::NoUTurn, Check::AvoidHubs];
        checks.extend(way_checks());
        Self { checks }
    }

    /// Outward search from the start towards the surrounding hubs.
    pub fn start() -> Self {
        let mut checks = vec![Check::SegmentLevel(Level::Normal), Check::Oneway(Travel::Forward), Check::NoUTurn];
        checks.extend(way_checks());
        Self { checks }
    }

    /// Backward search from the finish towards the surrounding hubs.
    pub fn finish() -> Self {
        let mut checks = vec![Check::SegmentLevel(Level::Normal), Check::Oneway(Travel::Backward), Check::NoUTurn];
        checks.extend(way_checks());
        Self { checks }
    }

    /// Hub-to-hub search.
    pub fn middle() -> Self {
        let mut checks = vec![Check::SegmentLevel(Level::Super), Check::Oneway(Travel::Forward), Check::NoUTurn];
        checks.extend(way_checks());
        Self { checks }
    }

    pub fn checks(&self) -> &[Check] { &self.checks }

    pub fn evaluate(&self, profile: &PreparedProfile, edge: &Edge<'_>) -> Verdict {
        let mut pref = 1.0;
        for &check in &self.checks {
            if let Err(reason) = apply(check, profile, edge, &mut pref) {
                return Verdict::Reject(reason);
            }
        }
        Verdict::Accept { pref }
    }
}

fn over_limit(way_limit: u8, wanted: u8) -> bool {
    way_limit != 0 && way_limit < wanted
}

fn apply(check: Check, profile: &PreparedProfile, edge: &Edge<'_>, pref: &mut f64) -> Result<(), Rejection> {
    let seg = edge.segment;
    let way = edge.way;
    let reject = |failed: bool, reason| if failed { Err(reason) } else { Ok(()) };
    match check {
        Check::SegmentLevel(Level::Normal) => reject(!seg.is_normal(), Rejection::WrongLevel),
        Check::SegmentLevel(Level::Super) => reject(!seg.is_super(), Rejection::WrongLevel),
        Check::Oneway(travel) => {
            let blocked = match travel {
                Travel::Forward => seg.is_oneway_to(edge.from),
                Travel::Backward => seg.is_oneway_from(edge.from),
            };
            reject(profile.oneway && blocked, Rejection::Oneway)
        }
        Check::NoUTurn => reject(edge.came_from != NO_NODE && edge.came_from == edge.to, Rejection::UTurn),
        Check::AvoidHubs => {
            let hub = edge.to_node.map_or(false, Node::is_super);
            reject(hub && edge.to != edge.endpoint, Rejection::ThroughHub)
        }
        Check::WayTransport => reject(way.allow & profile.allow == 0, Rejection::WayForbidden),
        Check::HighwayClass => {
            let class = way.class() as usize;
            let p = if class < HIGHWAY_COUNT { profile.highway[class] } else { 0.0 };
            *pref *= p;
            reject(p <= 0.0, Rejection::HighwayExcluded)
        }
        Check::Weight => reject(over_limit(way.weight, profile.weight), Rejection::TooHeavy),
        Check::Height => reject(over_limit(way.height, profile.height), Rejection::TooHigh),
        Check::Width => reject(over_limit(way.width, profile.width), Rejection::TooWide),
        Check::Length => reject(over_limit(way.length, profile.length), Rejection::TooLong),
        Check::Properties => {
            for p in crate::models::Property::ALL {
                if profile.props_seen & p.bit() == 0 {
                    continue;
                }
                let i = p as usize;
                *pref *= if way.props & p.bit() != 0 { profile.props_yes[i] } else { profile.props_no[i] };
            }
            reject(*pref <= 0.0, Rejection::PropertiesExcluded)
        }
        Check::NodeTransport => {
            let closed = edge.to_node.map_or(false, |n| n.allow & profile.allow == 0);
            reject(closed, Rejection::NodeForbidden)
        }
    }
}
