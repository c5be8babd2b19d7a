//! Travel profiles: what a transport may use and how much it likes each way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{
    metres_to_size, tonnes_to_weight, Highway, Property, Transport, HIGHWAY_COUNT, PROPERTY_COUNT,
};

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("{field} must be a finite non-negative number, got {value}")]
    InvalidValue { field: String, value: f64 },
    #[error("profile allows no highway class")]
    NoUsableHighway,
    #[error("hub search heuristic may overestimate: {0}")]
    InadmissibleHeuristic(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimise {
    #[default]
    Shortest,
    Quickest,
}

/// User-facing profile. Preferences are percentages, speeds km/h, limits in tonnes and
/// metres (0 = no limit).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub transport: Transport,
    pub optimise: Optimise,
    pub oneway: bool,
    pub highway: BTreeMap<Highway, f64>,
    pub speed: BTreeMap<Highway, f64>,
    /// Preference for ways having each property; ways without it get `100 - p`.
    pub props: BTreeMap<Property, f64>,
    pub weight_t: f64,
    pub height_m: f64,
    pub width_m: f64,
    pub length_m: f64,
}

impl Default for Profile {
    fn default() -> Self { Self::motorcar() }
}

fn table<K: Ord + Copy, const N: usize>(keys: [K; N], values: [f64; N]) -> BTreeMap<K, f64> {
    keys.into_iter().zip(values).collect()
}

impl Profile {
    pub fn motorcar() -> Self {
        Self {
            name: "motorcar".into(),
            transport: Transport::Motorcar,
            optimise: Optimise::Shortest,
            oneway: true,
            highway: table(Highway::ALL, [100.0, 100.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 0.0, 0.0, 0.0, 20.0]),
            speed: table(Highway::ALL, [112.0, 96.0, 96.0, 88.0, 80.0, 64.0, 48.0, 32.0, 16.0, 0.0, 0.0, 0.0, 10.0]),
            props: table(Property::ALL, [90.0, 60.0, 50.0, 50.0, 50.0, 50.0]),
            weight_t: 0.0,
            height_m: 0.0,
            width_m: 0.0,
            length_m: 0.0,
        }
    }

    pub fn bicycle() -> Self {
        Self {
            name: "bicycle".into(),
            transport: Transport::Bicycle,
            optimise: Optimise::Shortest,
            oneway: true,
            highway: table(Highway::ALL, [0.0, 30.0, 70.0, 80.0, 90.0, 90.0, 90.0, 90.0, 90.0, 100.0, 90.0, 50.0, 20.0]),
            speed: table(Highway::ALL, [0.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 16.0, 20.0, 16.0, 4.0, 10.0]),
            props: table(Property::ALL, [50.0, 25.0, 50.0, 50.0, 50.0, 60.0]),
            ..Self::motorcar()
        }
    }

    pub fn foot() -> Self {
        Self {
            name: "foot".into(),
            transport: Transport::Foot,
            optimise: Optimise::Shortest,
            oneway: false,
            highway: table(Highway::ALL, [0.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 90.0, 95.0, 95.0, 100.0, 80.0, 20.0]),
            speed: table(Highway::ALL, [0.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 10.0]),
            props: table(Property::ALL, [50.0, 40.0, 50.0, 50.0, 55.0, 50.0]),
            ..Self::motorcar()
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn quickest(mut self) -> Self {
        self.optimise = Optimise::Quickest;
        self
    }

    /// Normalise the tables for a graph whose ways carry the `props_seen` property bits.
    pub fn prepare(&self, props_seen: u8) -> Result<PreparedProfile, ProfileError> {
        fn check(field: String, value: f64) -> Result<f64, ProfileError> {
            if value.is_finite() && value >= 0.0 {
                Ok(value)
            } else {
                Err(ProfileError::InvalidValue { field, value })
            }
        }

        let mut highway = [0.0; HIGHWAY_COUNT];
        let mut speed = [0.0; HIGHWAY_COUNT];
        for (&h, &p) in &self.highway {
            highway[h as usize] = check(format!("highway.{h:?}"), p)?;
        }
        for (&h, &s) in &self.speed {
            speed[h as usize] = check(format!("speed.{h:?}"), s)?;
        }
        let top = highway.iter().cloned().fold(0.0, f64::max);
        if top <= 0.0 {
            return Err(ProfileError::NoUsableHighway);
        }
        for p in highway.iter_mut() {
            *p /= top;
        }
        let max_speed = speed.iter().cloned().fold(0.0, f64::max);

        let mut props_yes = [1.0; PROPERTY_COUNT];
        let mut props_no = [1.0; PROPERTY_COUNT];
        for p in Property::ALL {
            let pct = match self.props.get(&p) {
                Some(&v) => check(format!("props.{p:?}"), v)?.min(100.0),
                None => 50.0,
            };
            props_yes[p as usize] = pct / 100.0;
            props_no[p as usize] = 1.0 - pct / 100.0;
        }
        let max_pref = Property::ALL
            .iter()
            .filter(|p| props_seen & p.bit() != 0)
            .map(|&p| props_yes[p as usize].max(props_no[p as usize]))
            .product::<f64>();

        Ok(PreparedProfile {
            transport: self.transport,
            allow: self.transport.allow_bit(),
            oneway: self.oneway,
            quickest: self.optimise == Optimise::Quickest,
            highway,
            speed,
            props_yes,
            props_no,
            props_seen,
            weight: tonnes_to_weight(check("weight_t".into(), self.weight_t)?),
            height: metres_to_size(check("height_m".into(), self.height_m)?),
            width: metres_to_size(check("width_m".into(), self.width_m)?),
            length: metres_to_size(check("length_m".into(), self.length_m)?),
            max_speed,
            max_pref,
        })
    }
}

/// Profile normalised against one graph, in the units stored on ways.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedProfile {
    pub transport: Transport,
    pub allow: u16,
    pub oneway: bool,
    pub quickest: bool,
    /// Highway preference in 0..=1, the best class at 1.
    pub highway: [f64; HIGHWAY_COUNT],
    pub speed: [f64; HIGHWAY_COUNT],
    pub props_yes: [f64; PROPERTY_COUNT],
    pub props_no: [f64; PROPERTY_COUNT],
    pub props_seen: u8,
    pub weight: u8,
    pub height: u8,
    pub width: u8,
    pub length: u8,
    pub max_speed: f64,
    /// Best combined preference any way could reach.
    pub max_pref: f64,
}

impl PreparedProfile {
    /// Check that remaining distance (or time at `max_speed`) divided by `max_pref`
    /// never exceeds what the search would actually charge for the rest of a route.
    pub fn check_heuristic(&self) -> Result<(), ProfileError> {
        if !(self.max_pref > 0.0) {
            return Err(ProfileError::InadmissibleHeuristic(
                "every way is excluded by its property preferences".into(),
            ));
        }
        if self.quickest {
            if !(self.max_speed > 0.0) {
                return Err(ProfileError::InadmissibleHeuristic("no highway class has a speed".into()));
            }
            for h in Highway::ALL {
                let i = h as usize;
                if self.highway[i] > 0.0 && self.speed[i] <= 0.0 {
                    return Err(ProfileError::InadmissibleHeuristic(format!(
                        "{h:?} is usable but has no speed, so way speeds above {} km/h are possible",
                        self.max_speed
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highway_preferences_normalise_to_best_class() {
        let p = Profile::bicycle().prepare(0).unwrap();
        assert_eq!(p.highway[Highway::Cycleway as usize], 1.0);
        assert!((p.highway[Highway::Primary as usize] - 0.7).abs() < 1e-12);
        assert_eq!(p.highway[Highway::Motorway as usize], 0.0);
        assert_eq!(p.max_speed, 20.0);
        assert_eq!(p.allow, Transport::Bicycle.allow_bit());
    }

    #[test]
    fn max_pref_only_counts_properties_present() {
        let p = Profile::motorcar().prepare(0).unwrap();
        assert_eq!(p.max_pref, 1.0);
        let seen = Property::Paved.bit() | Property::Multilane.bit();
        let p = Profile::motorcar().prepare(seen).unwrap();
        assert!((p.max_pref - 0.9 * 0.6).abs() < 1e-12);
        assert!((p.props_no[Property::Paved as usize] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn rejects_unusable_profiles() {
        let mut p = Profile::foot();
        p.highway.values_mut().for_each(|v| *v = 0.0);
        assert!(matches!(p.prepare(0), Err(ProfileError::NoUsableHighway)));

        let mut p = Profile::foot();
        p.weight_t = -1.0;
        assert!(matches!(p.prepare(0), Err(ProfileError::InvalidValue { .. })));
    }

    #[test]
    fn heuristic_check_flags_speedless_classes() {
        assert!(Profile::motorcar().quickest().prepare(0).unwrap().check_heuristic().is_ok());
        assert!(Profile::foot().prepare(0).unwrap().check_heuristic().is_ok());

        let mut p = Profile::motorcar().quickest();
        p.speed.insert(Highway::Residential, 0.0);
        let err = p.prepare(0).unwrap().check_heuristic().unwrap_err();
        assert!(matches!(err, ProfileError::InadmissibleHeuristic(_)));

        // shortest-distance routing never depends on speeds
        let mut p = Profile::motorcar();
        p.speed.insert(Highway::Residential, 0.0);
        assert!(p.prepare(0).unwrap().check_heuristic().is_ok());
    }

    #[test]
    fn property_preferences_that_exclude_everything() {
        let mut p = Profile::motorcar();
        p.props.insert(Property::Bridge, 100.0);
        let prepared = p.prepare(Property::Bridge.bit()).unwrap();
        assert_eq!(prepared.props_no[Property::Bridge as usize], 0.0);
        assert!(prepared.check_heuristic().is_ok());
    }

    #[test]
    fn json_profiles_fill_missing_fields() {
        let p = Profile::from_json_str(r#"{"name":"van","transport":"goods","weight_t":3.5,"optimise":"quickest"}"#).unwrap();
        assert_eq!(p.transport, Transport::Goods);
        assert_eq!(p.optimise, Optimise::Quickest);
        assert_eq!(p.highway, Profile::motorcar().highway);
        assert_eq!(p.prepare(0).unwrap().weight, 18);
        assert!(Profile::from_json_str("{\"transport\":\"jetpack\"}").is_err());
    }
}
