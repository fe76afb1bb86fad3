use crate::{Bool, DataType, Int, ValueType};

/// A latitude/longitude pair in milliseconds of arc, stored as `i32`s.
///
/// Valid points satisfy latitude ∈ [-90°, +90°] and longitude ∈
/// [-180°, +180°). N/A stores `i32::MIN` in both components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GeoPoint {
    latitude: i32,
    longitude: i32,
}

/// Milliseconds of arc per degree.
const MS_PER_DEGREE: i64 = 60 * 60 * 1000;

const fn degrees(value: i64) -> i64 {
    value * MS_PER_DEGREE
}

impl GeoPoint {
    pub const NA_COMPONENT: i32 = i32::MIN;

    /// Builds a point from latitude/longitude in milliseconds.
    ///
    /// Out-of-range input is normalized: latitude wraps over the poles
    /// (carrying the longitude to the antimeridian), longitude wraps into
    /// [-180°, +180°). At the poles the longitude collapses to 0.
    /// If either component is N/A the point is N/A.
    pub fn new(latitude: Int, longitude: Int) -> Self {
        let (lat, lon) = match (latitude.to_option(), longitude.to_option()) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return GeoPoint::na(),
        };
        let (lat, lon) = Self::normalize(lat, lon);
        GeoPoint {
            latitude: lat as i32,
            longitude: lon as i32,
        }
    }

    fn normalize(mut latitude: i64, mut longitude: i64) -> (i64, i64) {
        // Reduce both into one revolution first so the pole fold below
        // cannot overflow.
        latitude = latitude.rem_euclid(degrees(360));
        if latitude > degrees(180) {
            latitude -= degrees(360);
        }
        longitude = longitude.rem_euclid(degrees(360));
        // Fold latitude over the poles, carrying the longitude across.
        if latitude > degrees(90) {
            latitude = degrees(180) - latitude;
            longitude += degrees(180);
        } else if latitude < degrees(-90) {
            latitude = degrees(-180) - latitude;
            longitude += degrees(180);
        }
        longitude = longitude.rem_euclid(degrees(360));
        if longitude >= degrees(180) {
            longitude -= degrees(360);
        }
        if latitude == degrees(90) || latitude == degrees(-90) {
            longitude = 0;
        }
        (latitude, longitude)
    }

    pub fn na() -> Self {
        GeoPoint {
            latitude: Self::NA_COMPONENT,
            longitude: Self::NA_COMPONENT,
        }
    }

    pub fn is_na(self) -> bool {
        self.latitude == Self::NA_COMPONENT && self.longitude == Self::NA_COMPONENT
    }

    pub fn latitude(self) -> Int {
        if self.is_na() {
            Int::na()
        } else {
            Int::new(self.latitude as i64)
        }
    }

    pub fn longitude(self) -> Int {
        if self.is_na() {
            Int::na()
        } else {
            Int::new(self.longitude as i64)
        }
    }

    pub fn matches(&self, other: &Self) -> bool {
        self == other
    }

    pub fn equal(self, other: Self) -> Bool {
        if self.is_na() || other.is_na() {
            Bool::Na
        } else {
            Bool::new(self == other)
        }
    }

    pub fn not_equal(self, other: Self) -> Bool {
        !self.equal(other)
    }

    fn key(self) -> (i32, i32) {
        (self.latitude, self.longitude)
    }

    /// Ordering by latitude, then longitude.
    pub fn less(self, other: Self) -> Bool {
        if self.is_na() || other.is_na() {
            Bool::Na
        } else {
            Bool::new(self.key() < other.key())
        }
    }

    pub fn less_equal(self, other: Self) -> Bool {
        if self.is_na() || other.is_na() {
            Bool::Na
        } else {
            Bool::new(self.key() <= other.key())
        }
    }

    pub fn greater(self, other: Self) -> Bool {
        other.less(self)
    }

    pub fn greater_equal(self, other: Self) -> Bool {
        other.less_equal(self)
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        GeoPoint::na()
    }
}

impl ValueType for GeoPoint {
    const DATA_TYPE: DataType = DataType::GeoPoint;

    fn na() -> Self {
        GeoPoint::na()
    }

    fn is_na(&self) -> bool {
        GeoPoint::is_na(*self)
    }

    fn matches(&self, other: &Self) -> bool {
        self == other
    }
}
