use std::env;

use serde::{Deserialize, Serialize};

use crate::graph::SlimCacheConfig;

pub const DEFAULT_SNAP_TOLERANCE_M: u32 = 5;
pub const DEFAULT_SEARCH_RADIUS_M: f64 = 1_000.0;
pub const DEFAULT_MAX_POPS: u64 = 50_000_000;
pub const DEFAULT_LOCAL_BINS: usize = 8;
pub const DEFAULT_MIDDLE_BINS: usize = 2048;
pub const DEFAULT_COMBINED_BINS: usize = 64;

/// Query-time knobs. Missing fields take their defaults when deserialised.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Waypoints closer than this to a segment end snap to the end node.
    pub snap_tolerance_m: u32,
    /// How far from a waypoint to look for a road.
    pub search_radius_m: f64,
    /// Queue pops allowed per search before giving up.
    pub max_pops: u64,
    pub local_bins: usize,
    pub middle_bins: usize,
    pub combined_bins: usize,
    /// Refuse profiles whose hub-search heuristic could overestimate.
    pub strict_heuristic: bool,
    pub slim_cache: SlimCacheConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_m: DEFAULT_SNAP_TOLERANCE_M,
            search_radius_m: DEFAULT_SEARCH_RADIUS_M,
            max_pops: DEFAULT_MAX_POPS,
            local_bins: DEFAULT_LOCAL_BINS,
            middle_bins: DEFAULT_MIDDLE_BINS,
            combined_bins: DEFAULT_COMBINED_BINS,
            strict_heuristic: false,
            slim_cache: SlimCacheConfig::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl RouterConfig {
    /// Defaults overridden by `HUBROUTE_*` environment variables; unparsable values are ignored.
    pub fn from_env() -> Self {
        let d = Self::default();
        let strict = env::var("HUBROUTE_STRICT_HEURISTIC")
            .ok()
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(d.strict_heuristic);
        Self {
            snap_tolerance_m: parse_var("HUBROUTE_SNAP_TOLERANCE_M").unwrap_or(d.snap_tolerance_m),
            search_radius_m: parse_var("HUBROUTE_SEARCH_RADIUS_M").unwrap_or(d.search_radius_m),
            max_pops: parse_var("HUBROUTE_MAX_POPS").unwrap_or(d.max_pops),
            local_bins: parse_var("HUBROUTE_LOCAL_BINS").unwrap_or(d.local_bins),
            middle_bins: parse_var("HUBROUTE_MIDDLE_BINS").unwrap_or(d.middle_bins),
            combined_bins: parse_var("HUBROUTE_COMBINED_BINS").unwrap_or(d.combined_bins),
            strict_heuristic: strict,
            slim_cache: SlimCacheConfig {
                nodes_capacity: parse_var("HUBROUTE_SLIM_NODES").unwrap_or(d.slim_cache.nodes_capacity),
                segments_capacity: parse_var("HUBROUTE_SLIM_SEGMENTS").unwrap_or(d.slim_cache.segments_capacity),
                ways_capacity: parse_var("HUBROUTE_SLIM_WAYS").unwrap_or(d.slim_cache.ways_capacity),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let c = RouterConfig::default();
        assert_eq!(c.snap_tolerance_m, 5);
        assert_eq!(c.max_pops, DEFAULT_MAX_POPS);
        assert_eq!((c.local_bins, c.middle_bins, c.combined_bins), (8, 2048, 64));
        assert!(!c.strict_heuristic);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: RouterConfig = serde_json::from_value(json!({ "snap_tolerance_m": 12, "strict_heuristic": true })).unwrap();
        assert_eq!(c.snap_tolerance_m, 12);
        assert!(c.strict_heuristic);
        assert_eq!(c.search_radius_m, DEFAULT_SEARCH_RADIUS_M);
        assert_eq!(c.slim_cache, SlimCacheConfig::default());
    }

    #[test]
    fn env_overrides() {
        // variable names are unique to this test
        env::set_var("HUBROUTE_MAX_POPS", "1234");
        env::set_var("HUBROUTE_SLIM_WAYS", "not-a-number");
        let c = RouterConfig::from_env();
        env::remove_var("HUBROUTE_MAX_POPS");
        env::remove_var("HUBROUTE_SLIM_WAYS");
        assert_eq!(c.max_pops, 1234);
        assert_eq!(c.slim_cache.ways_capacity, SlimCacheConfig::default().ways_capacity);
    }
}
