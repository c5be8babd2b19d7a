use crate::models::{travel_seconds, Segment, Way, HIGHWAY_COUNT, NO_SPEED_SECONDS};
use crate::profile::PreparedProfile;

/// Edge scores and the hub-search lower bound for one prepared profile.
#[derive(Clone, Copy, Debug)]
pub struct CostModel<'p> {
    profile: &'p PreparedProfile,
}

impl<'p> CostModel<'p> {
    pub fn new(profile: &'p PreparedProfile) -> Self { Self { profile } }

    pub fn profile(&self) -> &'p PreparedProfile { self.profile }

    /// Speed used on `way`: the lower of its own limit and the class speed, either one
    /// when the other is unknown.
    pub fn speed_kph(&self, way: &Way) -> f64 {
        let class = way.class() as usize;
        let class_speed = if class < HIGHWAY_COUNT { self.profile.speed[class] } else { 0.0 };
        let way_speed = way.speed as f64;
        match (way_speed > 0.0, class_speed > 0.0) {
            (true, true) => way_speed.min(class_speed),
            (true, false) => way_speed,
            (false, true) => class_speed,
            (false, false) => 0.0,
        }
    }

    pub fn segment_seconds(&self, segment: &Segment, way: &Way) -> f64 {
        match self.speed_kph(way) {
            s if s > 0.0 => travel_seconds(segment.metres() as f64, s),
            _ => NO_SPEED_SECONDS,
        }
    }

    /// Score for traversing `segment` with the combined preference `pref`.
    pub fn edge_cost(&self, segment: &Segment, way: &Way, pref: f64) -> f64 {
        let raw = if self.profile.quickest { self.segment_seconds(segment, way) } else { segment.metres() as f64 };
        raw / pref
    }

    /// Lower bound on the score of covering `direct_m` metres.
    pub fn heuristic(&self, direct_m: f64) -> f64 {
        let raw = if self.profile.quickest { travel_seconds(direct_m, self.profile.max_speed) } else { direct_m };
        raw / self.profile.max_pref
    }
}
