use serde::{Deserialize, Serialize};

pub type NodeIndex = u32;
pub type SegmentIndex = u32;
pub type WayIndex = u32;

pub const NO_NODE: NodeIndex = u32::MAX;
pub const NO_SEGMENT: SegmentIndex = u32::MAX;

/// First index of the fake node / fake segment ranges. Anything at or above this
/// (other than the `NO_*` sentinels) lives in a per-query overlay, not in the graph.
pub const FAKE_BASE: u32 = 0xffff_0000;

/// Number of waypoint slots available to a single overlay.
pub const MAX_WAYPOINTS: u32 = 99;

#[inline]
pub fn is_fake(index: u32) -> bool {
    index >= FAKE_BASE && index != u32::MAX
}

/// Bit flags packed into the top of `Segment::distance`.
pub const ONEWAY_1TO2: u32 = 0x8000_0000;
pub const ONEWAY_2TO1: u32 = 0x4000_0000;
pub const SEGMENT_SUPER: u32 = 0x2000_0000;
pub const SEGMENT_NORMAL: u32 = 0x1000_0000;
pub const DISTANCE_FLAGS: u32 = ONEWAY_1TO2 | ONEWAY_2TO1 | SEGMENT_SUPER | SEGMENT_NORMAL;
pub const DISTANCE_MASK: u32 = !DISTANCE_FLAGS;

/// Metres stored in a packed distance field.
#[inline]
pub fn distance_of(packed: u32) -> u32 {
    packed & DISTANCE_MASK
}

/// Flag bits stored in a packed distance field.
#[inline]
pub fn flags_of(packed: u32) -> u32 {
    packed & DISTANCE_FLAGS
}

/// Combine a distance in metres with flag bits; metres beyond the field width saturate.
#[inline]
pub fn pack_distance(metres: u32, flags: u32) -> u32 {
    metres.min(DISTANCE_MASK) | (flags & DISTANCE_FLAGS)
}

pub const NODE_SUPER: u16 = 0x8000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub first_segment: SegmentIndex,
    /// Fixed-point radians, see [`crate::geo::LAT_LONG_SCALE`].
    pub latitude: i32,
    pub longitude: i32,
    pub allow: u16,
    pub flags: u16,
}

impl Node {
    #[inline]
    pub fn is_super(&self) -> bool {
        self.flags & NODE_SUPER != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub node1: NodeIndex,
    pub node2: NodeIndex,
    /// Next segment in which `node2` appears, `NO_SEGMENT` at the end of the chain.
    pub next2: SegmentIndex,
    pub way: WayIndex,
    pub distance: u32,
}

impl Segment {
    #[inline]
    pub fn metres(&self) -> u32 {
        distance_of(self.distance)
    }

    #[inline]
    pub fn is_super(&self) -> bool {
        self.distance & SEGMENT_SUPER != 0
    }

    #[inline]
    pub fn is_normal(&self) -> bool {
        self.distance & SEGMENT_NORMAL != 0
    }

    #[inline]
    pub fn other_node(&self, node: NodeIndex) -> NodeIndex {
        if self.node1 == node { self.node2 } else { self.node1 }
    }

    /// True when travel along this segment is forbidden in the direction leaving `node`.
    #[inline]
    pub fn is_oneway_to(&self, node: NodeIndex) -> bool {
        if self.node1 == node {
            self.distance & ONEWAY_2TO1 != 0
        } else {
            self.distance & ONEWAY_1TO2 != 0
        }
    }

    /// True when travel along this segment is forbidden in the direction arriving at `node`.
    #[inline]
    pub fn is_oneway_from(&self, node: NodeIndex) -> bool {
        if self.node2 == node {
            self.distance & ONEWAY_2TO1 != 0
        } else {
            self.distance & ONEWAY_1TO2 != 0
        }
    }
}

/// Highway class stored in the low five bits of `Way::highway`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Highway {
    Motorway = 1,
    Trunk = 2,
    Primary = 3,
    Secondary = 4,
    Tertiary = 5,
    Unclassified = 6,
    Residential = 7,
    Service = 8,
    Track = 9,
    Cycleway = 10,
    Path = 11,
    Steps = 12,
    Ferry = 13,
}

/// One more than the largest highway class; tables indexed by class have this length.
pub const HIGHWAY_COUNT: usize = 14;
pub const HIGHWAY_ONEWAY: u8 = 32;
pub const HIGHWAY_ROUNDABOUT: u8 = 64;

impl Highway {
    pub const ALL: [Highway; 13] = [
        Highway::Motorway,
        Highway::Trunk,
        Highway::Primary,
        Highway::Secondary,
        Highway::Tertiary,
        Highway::Unclassified,
        Highway::Residential,
        Highway::Service,
        Highway::Track,
        Highway::Cycleway,
        Highway::Path,
        Highway::Steps,
        Highway::Ferry,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get((code & 0x1f).checked_sub(1)? as usize).copied()
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Foot = 1,
    Horse = 2,
    Wheelchair = 3,
    Bicycle = 4,
    Moped = 5,
    Motorbike = 6,
    Motorcar = 7,
    Goods = 8,
    Hgv = 9,
    Psv = 10,
}

impl Transport {
    /// Bit for this transport in node and way `allow` masks.
    #[inline]
    pub fn allow_bit(self) -> u16 {
        1u16 << (self as u16 - 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    Paved = 1,
    Multilane = 2,
    Bridge = 3,
    Tunnel = 4,
    #[serde(rename = "footroute")]
    FootRoute = 5,
    #[serde(rename = "bicycleroute")]
    BicycleRoute = 6,
}

pub const PROPERTY_COUNT: usize = 7;

impl Property {
    pub const ALL: [Property; 6] = [
        Property::Paved,
        Property::Multilane,
        Property::Bridge,
        Property::Tunnel,
        Property::FootRoute,
        Property::BicycleRoute,
    ];

    #[inline]
    pub fn bit(self) -> u8 {
        1u8 << (self as u8 - 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Way {
    pub name: u32,
    pub allow: u16,
    /// Highway class in the low five bits plus `HIGHWAY_ONEWAY` / `HIGHWAY_ROUNDABOUT`.
    pub highway: u8,
    pub props: u8,
    /// km/h, 0 = unknown
    pub speed: u8,
    /// 0.2 tonne units, 0 = unrestricted
    pub weight: u8,
    /// 0.1 metre units, 0 = unrestricted
    pub height: u8,
    pub width: u8,
    pub length: u8,
}

impl Way {
    /// Way open to `allow` on a highway class with no properties or limits.
    pub fn new(highway: Highway, allow: u16) -> Self {
        Self { name: 0, allow, highway: highway.code(), props: 0, speed: 0, weight: 0, height: 0, width: 0, length: 0 }
    }

    #[inline]
    pub fn class(&self) -> u8 {
        self.highway & 0x1f
    }
}

/// All transports allowed.
pub const ALLOW_ALL: u16 = 0x03ff;

pub fn tonnes_to_weight(tonnes: f64) -> u8 {
    (tonnes * 5.0).round().clamp(0.0, 255.0) as u8
}

pub fn metres_to_size(metres: f64) -> u8 {
    (metres * 10.0).round().clamp(0.0, 255.0) as u8
}

/// Seconds needed to cover `metres` at `kph`.
#[inline]
pub fn travel_seconds(metres: f64, kph: f64) -> f64 {
    metres / kph * 3.6
}

pub const NO_SPEED_SECONDS: f64 = 10.0 * 3600.0;
