//! Sunrise and sunset computation.
//!
//! Implements the NOAA sunrise equation: mean solar anomaly, equation of
//! the center, ecliptic longitude, solar transit, declination, and the hour
//! angle at which the sun's upper limb touches the horizon (-0.833 degrees,
//! accounting for refraction and the solar disc).
//!
//! Days are counted from the Unix epoch; results are UTC epoch
//! milliseconds. Accuracy is about a minute at mid latitudes, which is
//! well within what a day/night flag needs.

use serde::Deserialize;

use crate::clock::{DAY_MS, HOUR_MS};

/// Julian date of the Unix epoch.
const JULIAN_UNIX_EPOCH: f64 = 2_440_587.5;

/// Julian date of 2000-01-01 12:00 UTC.
const JULIAN_J2000: f64 = 2_451_545.0;

/// Days from the Unix epoch to 2000-01-01.
const DAYS_TO_J2000: i64 = 10_957;

/// Altitude of the sun's centre at apparent sunrise, in degrees.
const SUNRISE_ALTITUDE_DEG: f64 = -0.833;

/// Obliquity of the ecliptic, in degrees.
const OBLIQUITY_DEG: f64 = 23.4397;

/// A fixed point on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GeoLocation {
    /// Degrees north of the equator (south is negative).
    pub latitude: f64,
    /// Degrees east of Greenwich (west is negative).
    pub longitude: f64,
}

impl GeoLocation {
    /// Create a location from latitude and longitude in degrees.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Sun event times for one calendar date, in UTC epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    /// Apparent sunrise.
    pub sunrise_ms: i64,
    /// Apparent sunset.
    pub sunset_ms: i64,
    /// Solar transit.
    pub solar_noon_ms: i64,
}

impl SunTimes {
    /// Whether `at_ms` falls in `[sunrise, sunset)`.
    pub const fn is_daytime(&self, at_ms: i64) -> bool {
        self.sunrise_ms <= at_ms && at_ms < self.sunset_ms
    }
}

/// Days since the Unix epoch of the local calendar date containing
/// `utc_ms`, for a zone `offset_hours` ahead of UTC.
pub fn local_day(utc_ms: i64, offset_hours: i32) -> i64 {
    let local_ms = utc_ms.saturating_add(i64::from(offset_hours).saturating_mul(HOUR_MS));
    local_ms.div_euclid(DAY_MS)
}

/// Sunrise, sunset and solar noon at `location` on the date `day` days
/// after the Unix epoch.
///
/// During polar night sunrise and sunset both collapse onto solar noon, so
/// no instant is daytime. During polar day they sit twelve hours either
/// side of noon, so the whole day is.
#[allow(clippy::cast_precision_loss)]
pub fn sun_times(location: GeoLocation, day: i64) -> SunTimes {
    let n = day.saturating_sub(DAYS_TO_J2000) as f64;
    let mean_solar_day = n - location.longitude / 360.0;

    let anomaly = 0.985_600_28_f64
        .mul_add(mean_solar_day, 357.529_1)
        .rem_euclid(360.0);
    let m = anomaly.to_radians();
    let center = 0.0003_f64.mul_add(
        (3.0 * m).sin(),
        1.9148_f64.mul_add(m.sin(), 0.02 * (2.0 * m).sin()),
    );
    let ecliptic = (anomaly + center + 180.0 + 102.9372).rem_euclid(360.0);
    let lambda = ecliptic.to_radians();

    let transit = 0.0053_f64.mul_add(m.sin(), JULIAN_J2000 + mean_solar_day)
        - 0.0069 * (2.0 * lambda).sin();

    let sin_decl = lambda.sin() * OBLIQUITY_DEG.to_radians().sin();
    let cos_decl = sin_decl.asin().cos();
    let phi = location.latitude.to_radians();
    let cos_hour_angle = phi
        .sin()
        .mul_add(-sin_decl, SUNRISE_ALTITUDE_DEG.to_radians().sin())
        / (phi.cos() * cos_decl);

    let half_day = if cos_hour_angle > 1.0 {
        0.0
    } else if cos_hour_angle < -1.0 {
        0.5
    } else {
        cos_hour_angle.acos().to_degrees() / 360.0
    };

    SunTimes {
        sunrise_ms: julian_to_ms(transit - half_day),
        sunset_ms: julian_to_ms(transit + half_day),
        solar_noon_ms: julian_to_ms(transit),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn julian_to_ms(julian: f64) -> i64 {
    ((julian - JULIAN_UNIX_EPOCH) * 86_400_000.0).round() as i64
}
