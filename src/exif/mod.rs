//! EXIF decoding and normalization.
//!
//! - [`extract`] - validate downloaded bytes as an image and decode its EXIF tags
//! - [`normalize`] - reduce the tags to capture time and decimal GPS coordinates
//!
//! Tag IDs resolve to names through static tables in [`tags`]. GPS sub-tags
//! are kept in their own [`GpsInfo`] structure rather than mixed in with the
//! general tag map.

mod normalize;
mod reader;
pub mod tags;

pub use normalize::{GpsCoordinate, PhotoMetadata, normalize};
pub use reader::{ExifTagMap, Extraction, GpsInfo, TagValue, extract, read_tags};
pub use tags::TagKey;
