use serde::{Deserialize, Serialize};

use super::reader::{ExifTagMap, GpsInfo, TagValue};

/// Capture time and position pulled out of an image's EXIF tags.
///
/// Every field is optional: images routinely lack one or all of them, and
/// malformed values degrade to `None` instead of failing the lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    /// `DateTime` tag verbatim (EXIF format, e.g. `2023:05:01 10:00:00`).
    pub date_time: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A degrees/minutes/seconds coordinate with its hemisphere reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsCoordinate {
    pub degrees: f64,
    pub minutes: f64,
    pub seconds: f64,
    pub hemisphere: Option<char>,
}

impl GpsCoordinate {
    /// Build from a `GPSLatitude`/`GPSLongitude` value and its `*Ref` tag.
    ///
    /// Returns `None` unless the value is exactly three finite numbers.
    pub fn from_tags(value: &TagValue, reference: Option<&TagValue>) -> Option<Self> {
        let parts = value.as_numbers()?;
        let &[degrees, minutes, seconds] = parts.as_slice() else {
            return None;
        };
        if !(degrees.is_finite() && minutes.is_finite() && seconds.is_finite()) {
            return None;
        }

        let hemisphere = reference
            .and_then(TagValue::as_text)
            .and_then(|s| s.trim().chars().next());

        Some(Self {
            degrees,
            minutes,
            seconds,
            hemisphere,
        })
    }

    /// Signed decimal degrees; southern and western references are negative.
    pub fn to_decimal(&self) -> f64 {
        let value = self.degrees + self.minutes / 60.0 + self.seconds / 3600.0;
        match self.hemisphere {
            Some('S' | 'W') => -value,
            _ => value,
        }
    }
}

impl GpsInfo {
    /// Decimal `(latitude, longitude)`.
    ///
    /// Both are `None` unless the block carries both coordinate tags; after
    /// that each axis degrades to `None` on its own when malformed.
    pub fn decimal_coordinates(&self) -> (Option<f64>, Option<f64>) {
        let (Some(latitude), Some(longitude)) = (&self.latitude, &self.longitude) else {
            return (None, None);
        };

        let axis = |value: &TagValue, reference: &Option<TagValue>| {
            GpsCoordinate::from_tags(value, reference.as_ref()).map(|c| c.to_decimal())
        };

        (
            axis(latitude, &self.latitude_ref),
            axis(longitude, &self.longitude_ref),
        )
    }
}

/// Reduce a decoded tag map to the fields the lookup returns.
pub fn normalize(tags: &ExifTagMap) -> PhotoMetadata {
    let (latitude, longitude) = tags
        .gps
        .as_ref()
        .map_or((None, None), GpsInfo::decimal_coordinates);

    PhotoMetadata {
        date_time: tags.date_time().map(str::to_owned),
        latitude,
        longitude,
    }
}
