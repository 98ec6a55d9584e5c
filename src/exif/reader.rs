use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;

use ::exif::{Context, In, Value};

use super::tags::{
    GPS_LATITUDE, GPS_LATITUDE_REF, GPS_LONGITUDE, GPS_LONGITUDE_REF, TAG_DATE_TIME, TAG_GPS_INFO,
    TagKey,
};
use crate::decode::{self, DecodeError, DecodedImage};

/// A decoded EXIF value, flattened to the handful of shapes callers care about.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Bytes(Vec<u8>),
    Integers(Vec<i64>),
    /// Rationals as `numerator / denominator`. A zero denominator yields a
    /// non-finite value.
    Rationals(Vec<f64>),
    Floats(Vec<f64>),
}

impl TagValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric components of the value, if it is numeric at all.
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        match self {
            // i64 -> f64 is exact for every width EXIF can store.
            Self::Integers(v) => Some(v.iter().map(|&n| n as f64).collect()),
            Self::Rationals(v) | Self::Floats(v) => Some(v.clone()),
            Self::Text(_) | Self::Bytes(_) => None,
        }
    }

    fn from_exif(value: &Value) -> Option<Self> {
        let converted = match value {
            Value::Ascii(parts) => {
                let text = parts
                    .first()
                    .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())
                    .unwrap_or_default();
                Self::Text(text)
            }
            Value::Byte(v) => Self::Integers(v.iter().map(|&n| i64::from(n)).collect()),
            Value::Short(v) => Self::Integers(v.iter().map(|&n| i64::from(n)).collect()),
            Value::Long(v) => Self::Integers(v.iter().map(|&n| i64::from(n)).collect()),
            Value::SByte(v) => Self::Integers(v.iter().map(|&n| i64::from(n)).collect()),
            Value::SShort(v) => Self::Integers(v.iter().map(|&n| i64::from(n)).collect()),
            Value::SLong(v) => Self::Integers(v.iter().map(|&n| i64::from(n)).collect()),
            Value::Rational(v) => Self::Rationals(
                v.iter()
                    .map(|r| f64::from(r.num) / f64::from(r.denom))
                    .collect(),
            ),
            Value::SRational(v) => Self::Rationals(
                v.iter()
                    .map(|r| f64::from(r.num) / f64::from(r.denom))
                    .collect(),
            ),
            Value::Float(v) => Self::Floats(v.iter().map(|&f| f64::from(f)).collect()),
            Value::Double(v) => Self::Floats(v.clone()),
            Value::Undefined(bytes, _) => Self::Bytes(bytes.clone()),
            _ => return None,
        };
        Some(converted)
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        }

        match self {
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) if b.len() > 16 => write!(f, "<{} bytes>", b.len()),
            Self::Bytes(b) => {
                let hex: Vec<String> = b.iter().map(|byte| format!("{byte:02x}")).collect();
                f.write_str(&hex.join(" "))
            }
            Self::Integers(v) => f.write_str(&join(v)),
            Self::Rationals(v) | Self::Floats(v) => f.write_str(&join(v)),
        }
    }
}

/// Fixed-schema view of the GPS sub-IFD.
///
/// The four coordinate tags get their own slots; every other GPS sub-tag is
/// kept by its resolved name in `other`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsInfo {
    pub latitude_ref: Option<TagValue>,
    pub latitude: Option<TagValue>,
    pub longitude_ref: Option<TagValue>,
    pub longitude: Option<TagValue>,
    pub other: BTreeMap<TagKey, TagValue>,
}

impl GpsInfo {
    fn insert(&mut self, id: u16, value: TagValue) {
        match id {
            GPS_LATITUDE_REF => self.latitude_ref = Some(value),
            GPS_LATITUDE => self.latitude = Some(value),
            GPS_LONGITUDE_REF => self.longitude_ref = Some(value),
            GPS_LONGITUDE => self.longitude = Some(value),
            _ => {
                self.other.insert(TagKey::gps(id), value);
            }
        }
    }

    /// All GPS entries by resolved name, coordinate tags first.
    pub fn entries(&self) -> Vec<(TagKey, &TagValue)> {
        let slots = [
            (GPS_LATITUDE_REF, &self.latitude_ref),
            (GPS_LATITUDE, &self.latitude),
            (GPS_LONGITUDE_REF, &self.longitude_ref),
            (GPS_LONGITUDE, &self.longitude),
        ];
        let mut entries: Vec<(TagKey, &TagValue)> = slots
            .into_iter()
            .filter_map(|(id, value)| value.as_ref().map(|v| (TagKey::gps(id), v)))
            .collect();
        entries.extend(self.other.iter().map(|(key, value)| (*key, value)));
        entries
    }
}

/// Tags decoded from an image's EXIF block.
///
/// `tags` holds everything from the primary IFD and the Exif sub-IFD. The GPS
/// sub-IFD is kept apart in `gps`, which is `Some` whenever the image carries
/// a `GPSInfo` pointer or any GPS field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifTagMap {
    pub tags: BTreeMap<TagKey, TagValue>,
    pub gps: Option<GpsInfo>,
}

impl ExifTagMap {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.gps.is_none()
    }

    /// Look up a primary/Exif tag by numeric ID.
    pub fn get(&self, id: u16) -> Option<&TagValue> {
        self.tags.get(&TagKey::exif(id))
    }

    /// Raw `DateTime` string, exactly as stored.
    pub fn date_time(&self) -> Option<&str> {
        self.get(TAG_DATE_TIME).and_then(TagValue::as_text)
    }
}

/// Everything pulled out of a downloaded image.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub image: DecodedImage,
    pub tags: ExifTagMap,
}

/// Validate `bytes` as an image and decode its EXIF tags.
///
/// Fails only when the bytes are not a readable image. A missing or broken
/// EXIF block gives an empty tag map.
pub fn extract(bytes: &[u8]) -> Result<Extraction, DecodeError> {
    let image = decode::probe(bytes)?;
    let tags = read_tags(bytes);
    Ok(Extraction { image, tags })
}

/// Decode the EXIF block of an image container into an [`ExifTagMap`].
pub fn read_tags(bytes: &[u8]) -> ExifTagMap {
    let parsed = match ::exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!("No EXIF data found: {e}");
            return ExifTagMap::default();
        }
    };

    let mut map = ExifTagMap::default();

    for field in parsed.fields() {
        // Thumbnail IFD tags would shadow the primary image's.
        if field.ifd_num != In::PRIMARY {
            continue;
        }

        let id = field.tag.number();
        match field.tag.context() {
            Context::Gps => {
                if let Some(value) = TagValue::from_exif(&field.value) {
                    map.gps.get_or_insert_with(GpsInfo::default).insert(id, value);
                }
            }
            Context::Tiff | Context::Exif => {
                if id == TAG_GPS_INFO {
                    map.gps.get_or_insert_with(GpsInfo::default);
                    continue;
                }
                if let Some(value) = TagValue::from_exif(&field.value) {
                    map.tags.insert(TagKey::exif(id), value);
                }
            }
            _ => {}
        }
    }

    log::debug!(
        "Decoded {} EXIF tags (GPS block: {})",
        map.tags.len(),
        map.gps.is_some()
    );
    map
}
