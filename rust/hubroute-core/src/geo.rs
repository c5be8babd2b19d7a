//! Fixed-point coordinates and great-circle distance.

use std::f64::consts::PI;

/// Fixed-point units per radian.
pub const LAT_LONG_SCALE: f64 = (1024 * 65536) as f64;
/// Fixed-point units per spatial bin.
pub const LAT_LONG_BIN: i32 = 65536;

pub const EARTH_RADIUS_KM: f64 = 6378.137;

#[inline]
pub fn latlong_to_radians(v: i32) -> f64 {
    v as f64 / LAT_LONG_SCALE
}

#[inline]
pub fn radians_to_latlong(r: f64) -> i32 {
    (r * LAT_LONG_SCALE).floor() as i32
}

#[inline]
pub fn degrees_to_radians(d: f64) -> f64 {
    d * (PI / 180.0)
}

#[inline]
pub fn radians_to_degrees(r: f64) -> f64 {
    r * (180.0 / PI)
}

/// Bin containing a fixed-point coordinate.
#[inline]
pub fn latlong_to_bin(v: i32) -> i32 {
    v.div_euclid(LAT_LONG_BIN)
}

#[inline]
pub fn bin_to_latlong(bin: i32) -> i32 {
    bin.saturating_mul(LAT_LONG_BIN)
}

/// Haversine distance in metres between two points given in radians.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlon = lon1 - lon2;
    let dlat = lat1 - lat2;
    let a1 = (dlat / 2.0).sin();
    let a2 = (dlon / 2.0).sin();
    let a = a1 * a1 + lat1.cos() * lat2.cos() * a2 * a2;
    let sa = a.sqrt().min(1.0);
    let c = 2.0 * sa.asin();
    EARTH_RADIUS_KM * c * 1000.0
}

/// Haversine distance rounded down to whole metres, the unit stored in segments.
#[inline]
pub fn distance_whole_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> u32 {
    distance_m(lat1, lon1, lat2, lon2) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_m(0.0, 0.0, degrees_to_radians(1.0), 0.0);
        assert!((d - 111_319.5).abs() < 1.0, "got {d}");
    }

    #[test]
    fn fixed_point_round_trip_is_within_one_unit() {
        let r = degrees_to_radians(51.5);
        let back = latlong_to_radians(radians_to_latlong(r));
        assert!((back - r).abs() <= 1.0 / LAT_LONG_SCALE);
    }

    #[test]
    fn bins_floor_negative_coordinates() {
        assert_eq!(latlong_to_bin(0), 0);
        assert_eq!(latlong_to_bin(65535), 0);
        assert_eq!(latlong_to_bin(65536), 1);
        assert_eq!(latlong_to_bin(-1), -1);
        assert_eq!(bin_to_latlong(-1), -65536);
    }
}
