use serde::{Deserialize, Serialize};

/// Tolerance (degrees) under which two coordinates are treated as the same place.
pub const DEFAULT_EPSILON_DEG: f64 = 0.01;

/// Fallback location used until a reading or a manual choice is available (Bengaluru).
pub const DEFAULT_COORDINATE: Coordinate = Coordinate {
    lat: 12.9716,
    lon: 77.5946,
};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Approximate equality: both axes differ by at most `epsilon` degrees.
    ///
    /// GPS jitter moves readings by tiny amounts; treating those as equal keeps
    /// a stationary device from refetching weather on every update.
    pub fn approx_eq(&self, other: &Coordinate, epsilon: f64) -> bool {
        (self.lat - other.lat).abs() <= epsilon && (self.lon - other.lon).abs() <= epsilon
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        DEFAULT_COORDINATE
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// A city candidate returned by the search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl City {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    /// "Name, CC" as shown in a suggestion list.
    pub fn label(&self) -> String {
        if self.country.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.country)
        }
    }
}
