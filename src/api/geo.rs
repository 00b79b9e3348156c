use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Please provide latitude and longitude in the format lat,lng")]
    InvalidLatLng,

    #[error("Unit must be either 'mi' or 'km'")]
    InvalidUnit,

    #[error("Distance must be a positive number")]
    InvalidDistance,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl FromStr for LatLng {
    type Err = GeoError;

    /// Parses `lat,lng`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s.split_once(',').ok_or(GeoError::InvalidLatLng)?;
        let lat: f64 = lat.trim().parse().map_err(|_| GeoError::InvalidLatLng)?;
        let lng: f64 = lng.trim().parse().map_err(|_| GeoError::InvalidLatLng)?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::InvalidLatLng);
        }
        Ok(Self { lat, lng })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometers,
}

impl Unit {
    /// Earth radius in this unit; turns radians into distances and back
    pub fn earth_radius(&self) -> f64 {
        match self {
            Unit::Miles => 3963.2,
            Unit::Kilometers => 6378.1,
        }
    }
}

impl FromStr for Unit {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mi" => Ok(Unit::Miles),
            "km" => Ok(Unit::Kilometers),
            _ => Err(GeoError::InvalidUnit),
        }
    }
}

pub fn parse_distance(s: &str) -> Result<f64, GeoError> {
    match s.parse::<f64>() {
        Ok(d) if d.is_finite() && d > 0.0 => Ok(d),
        _ => Err(GeoError::InvalidDistance),
    }
}

/// Great-circle distance in radians between two points, as SQL over the
/// `[lng, lat]` coordinates of a GeoJSON column. `$lat`/`$lng` are the
/// placeholders of the reference point.
pub fn haversine_sql(column: &str, lat: &str, lng: &str) -> String {
    let point_lng = format!("(({}->'coordinates'->>0)::float8)", column);
    let point_lat = format!("(({}->'coordinates'->>1)::float8)", column);
    format!(
        "(2 * asin(LEAST(1.0, sqrt(power(sin(radians({plat} - {lat}) / 2), 2) + \
         cos(radians({lat})) * cos(radians({plat})) * power(sin(radians({plng} - {lng}) / 2), 2)))))",
        plat = point_lat,
        plng = point_lng,
        lat = lat,
        lng = lng,
    )
}
