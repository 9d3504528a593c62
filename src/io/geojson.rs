//! Displacement map as GeoJSON.
//!
//! A FeatureCollection with the station position and its secular horizontal
//! velocity drawn as a line, exaggerated so that mm/yr rates are visible at
//! country scale. Any GeoJSON viewer can render it.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::domain::{Component, Coordinate, StationFit};
use crate::error::AppError;

/// Exaggeration applied to the velocity vector (metres on the map per m/yr).
pub const VELOCITY_SCALE: f64 = 5_000_000.0;

/// Metres per degree of latitude.
const METERS_PER_DEG_LAT: f64 = 111_000.0;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    pub geometry: Geometry,
    pub properties: serde_json::Value,
}

impl Feature {
    fn new(geometry: Geometry, properties: serde_json::Value) -> Self {
        Self {
            kind: "Feature",
            geometry,
            properties,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    pub features: Vec<Feature>,
}

/// Tip of the exaggerated velocity vector starting at `origin`.
///
/// `de`/`dn` are east/north rates in m/yr. Returns `(latitude, longitude)`.
pub fn velocity_tip(origin: &Coordinate, de: f64, dn: f64, scale: f64) -> (f64, f64) {
    let meters_per_deg_lon = METERS_PER_DEG_LAT * origin.latitude.to_radians().cos();
    let lat = origin.latitude + dn * scale / METERS_PER_DEG_LAT;
    let lon = origin.longitude + de * scale / meters_per_deg_lon;
    (lat, lon)
}

/// Build the station marker and (when both horizontal rates were fitted) the
/// velocity vector.
pub fn build_displacement_map(reference: &Coordinate, fit: &StationFit) -> FeatureCollection {
    let origin = [reference.longitude, reference.latitude];
    let mut features = vec![Feature::new(
        Geometry::Point { coordinates: origin },
        serde_json::json!({
            "station": fit.station,
            "tooltip": format!("Station: {}", fit.station),
            "height": reference.height,
        }),
    )];

    let rate = |c: Component| fit.component(c).map(|r| r.params.rate);
    match (rate(Component::East), rate(Component::North)) {
        (Some(de), Some(dn)) => {
            let (lat, lon) = velocity_tip(reference, de, dn, VELOCITY_SCALE);
            features.push(Feature::new(
                Geometry::LineString {
                    coordinates: vec![origin, [lon, lat]],
                },
                serde_json::json!({
                    "station": fit.station,
                    "kind": "secular_velocity",
                    "de_m_per_yr": de,
                    "dn_m_per_yr": dn,
                    "horizontal_mm_per_yr": de.hypot(dn) * 1000.0,
                    "scale": VELOCITY_SCALE,
                }),
            ));
        }
        _ => log::warn!("{}: horizontal rates unavailable, map has no velocity vector", fit.station),
    }

    FeatureCollection {
        kind: "FeatureCollection",
        features,
    }
}

pub fn write_geojson(path: &Path, map: &FeatureCollection) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create GeoJSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, map)
        .map_err(|e| AppError::new(2, format!("Failed to write GeoJSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ComponentFit, DecayKind, FitQuality, FitResult, ParameterVector, WeightMode,
    };

    fn fit_with_rates(rates: &[(Component, f64)]) -> StationFit {
        let fits = rates
            .iter()
            .map(|&(component, rate)| ComponentFit {
                component,
                result: FitResult {
                    params: ParameterVector::secular(0.0, rate),
                    residual: 0.0,
                    grid: Vec::new(),
                    selected: 0,
                    quality: FitQuality {
                        n: 10,
                        n_params: 2,
                        sse: 0.0,
                        rmse: 0.0,
                        wrms: 0.0,
                        chi2_reduced: Some(0.0),
                    },
                    t0: 2010.0,
                    decay: DecayKind::Logarithmic,
                    weighting: WeightMode::Sigma,
                    partial: false,
                },
            })
            .collect();
        StationFit {
            station: "J299".to_string(),
            events: Vec::new(),
            fits,
            skipped: Vec::new(),
        }
    }

    #[test]
    fn velocity_tip_uses_latitude_dependent_longitude_scale() {
        let origin = Coordinate::new(60.0, 10.0);
        let (lat, lon) = velocity_tip(&origin, 0.0111, 0.0111, 1.0e6);
        assert!((lat - 60.1).abs() < 1e-9);
        // cos(60°) = 0.5 doubles the longitude displacement.
        assert!((lon - 10.2).abs() < 1e-9);
    }

    #[test]
    fn map_contains_station_and_velocity_vector() {
        let reference = Coordinate::new(38.3, 141.5);
        let fit = fit_with_rates(&[(Component::East, 0.0066), (Component::North, -0.0083)]);
        let map = build_displacement_map(&reference, &fit);
        let json = serde_json::to_value(&map).unwrap();

        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
        assert_eq!(json["features"][0]["geometry"]["coordinates"][0], 141.5);
        assert_eq!(json["features"][0]["properties"]["tooltip"], "Station: J299");

        let line = &json["features"][1];
        assert_eq!(line["geometry"]["type"], "LineString");
        let tip_lat = line["geometry"]["coordinates"][1][1].as_f64().unwrap();
        assert!((tip_lat - (38.3 - 0.0083 * VELOCITY_SCALE / 111_000.0)).abs() < 1e-9);
    }

    #[test]
    fn missing_horizontal_component_skips_vector() {
        let reference = Coordinate::new(38.3, 141.5);
        let fit = fit_with_rates(&[(Component::Up, -0.002)]);
        let map = build_displacement_map(&reference, &fit);
        assert_eq!(map.features.len(), 1);
    }
}
