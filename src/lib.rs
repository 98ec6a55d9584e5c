//! # photo-metadata
//!
//! HTTP function that downloads an image by URL and returns its EXIF capture
//! time and GPS position as JSON.
//!
//! ## Quick Start
//!
//! The pipeline module runs the whole fetch → decode → extract flow for one
//! URL:
//!
//! ```rust,no_run
//! use photo_metadata::config::Config;
//! use photo_metadata::fetch::HttpFetcher;
//! use photo_metadata::pipeline::{MetadataRequest, process};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let fetcher = HttpFetcher::from_config(&config.fetch)?;
//!
//!     let request = MetadataRequest::new("https://example.com/photo.jpg", false)?;
//!     let result = process(&request, &fetcher).await;
//!
//!     match result.outcome {
//!         Ok(meta) => println!(
//!             "taken {:?} at {:?}, {:?}",
//!             meta.date_time, meta.latitude, meta.longitude
//!         ),
//!         Err(err) => eprintln!("{err}"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The EXIF side works on bytes you already have:
//!
//! ```rust,no_run
//! use photo_metadata::exif::{extract, normalize};
//!
//! # fn main() -> anyhow::Result<()> {
//! let bytes = std::fs::read("photo.jpg")?;
//! let extraction = extract(&bytes)?;
//! println!("{} {}x{}", extraction.image.format_name(), extraction.image.width, extraction.image.height);
//!
//! let meta = normalize(&extraction.tags);
//! println!("{:?}", meta.date_time);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Configuration types and loading/saving
//! - [`decode`] - Image format and dimension probing
//! - [`exif`] - EXIF tag decoding and GPS/date normalization
//! - [`fetch`] - Image download with content-type validation
//! - [`pipeline`] - Request validation and the per-request flow
//! - [`server`] - The `GetPhotoMetadata` HTTP trigger

pub mod config;
pub mod decode;
pub mod exif;
pub mod fetch;
pub mod pipeline;
pub mod server;

#[cfg(test)]
pub(crate) mod test_utils;
