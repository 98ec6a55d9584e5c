use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

use crate::exif::{self, PhotoMetadata};
use crate::fetch::{FetchError, ImageFetcher, RawImage};

/// Query/body field carrying the image URL.
pub const FILE_URL_PARAM: &str = "fileUrl";
/// Query field enabling diagnostics.
pub const DEBUG_PARAM: &str = "debug";

/// A validated metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub file_url: String,
    pub debug: bool,
}

impl MetadataRequest {
    pub fn new(file_url: impl Into<String>, debug: bool) -> Result<Self, PipelineError> {
        let file_url = file_url.into();
        if file_url.is_empty() {
            return Err(PipelineError::ParameterMissing);
        }
        Ok(Self { file_url, debug })
    }

    /// Build a request from query parameters, falling back to a JSON body
    /// for `fileUrl`. The query wins when both carry it.
    pub fn from_params(query: &HashMap<String, String>, body: &[u8]) -> Result<Self, PipelineError> {
        let debug = debug_requested(query);
        let file_url = query
            .get(FILE_URL_PARAM)
            .filter(|url| !url.is_empty())
            .cloned()
            .or_else(|| file_url_from_body(body));

        match file_url {
            Some(url) => Self::new(url, debug),
            None => Err(PipelineError::ParameterMissing),
        }
    }
}

/// `debug=true`, case-insensitively.
pub fn debug_requested(query: &HashMap<String, String>) -> bool {
    query
        .get(DEBUG_PARAM)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn file_url_from_body(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get(FILE_URL_PARAM)?
        .as_str()
        .filter(|url| !url.is_empty())
        .map(str::to_owned)
}

/// Why a lookup failed. Each variant maps to one HTTP status and message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Missing fileUrl parameter")]
    ParameterMissing,
    #[error("Error fetching fileUrl: {cause}")]
    FetchFailed { cause: String },
    #[error("URL did not return an image. Content-Type: {content_type}")]
    NotAnImage { content_type: String },
    #[error("Downloaded content is not a valid image: {cause}")]
    DecodeFailed { cause: String },
    #[error("Error: {message}")]
    Unhandled { message: String },
}

impl PipelineError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ParameterMissing | Self::NotAnImage { .. } | Self::DecodeFailed { .. } => 400,
            Self::FetchFailed { .. } => 502,
            Self::Unhandled { .. } => 500,
        }
    }

    /// Structured body used instead of the plain message when the caller
    /// asked for diagnostics. `None` for failures that are always plain text.
    pub fn debug_body(&self, debug: &DebugInfo) -> Option<serde_json::Value> {
        match self {
            Self::FetchFailed { cause } => Some(json!({
                "error": cause,
                "debug": debug,
            })),
            Self::NotAnImage { content_type } => Some(json!({
                "error": "URL did not return an image",
                "content_type": content_type,
                "debug": debug,
            })),
            Self::DecodeFailed { cause } => Some(json!({
                "error": "Downloaded content is not a valid image",
                "open_error": cause,
                "debug": debug,
            })),
            Self::ParameterMissing | Self::Unhandled { .. } => None,
        }
    }
}

/// Diagnostics gathered while a request moves through the stages. Only the
/// stages the request actually reached fill their fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<[u32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_error: Option<String>,
}

/// Successful response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataResult {
    #[serde(flatten)]
    pub metadata: PhotoMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// Outcome of one lookup plus the diagnostics collected on the way.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub outcome: Result<PhotoMetadata, PipelineError>,
    pub debug: DebugInfo,
}

impl ProcessResult {
    /// Response body for a successful lookup; diagnostics attached on request.
    pub fn into_body(self, debug_mode: bool) -> Result<MetadataResult, (PipelineError, DebugInfo)> {
        match self.outcome {
            Ok(metadata) => Ok(MetadataResult {
                metadata,
                debug: debug_mode.then_some(self.debug),
            }),
            Err(err) => Err((err, self.debug)),
        }
    }
}

/// Run one lookup: fetch, validate as an image, decode EXIF, normalize.
///
/// Never fails outright; every failure is reported through
/// [`ProcessResult::outcome`].
pub async fn process(request: &MetadataRequest, fetcher: &dyn ImageFetcher) -> ProcessResult {
    let mut debug = DebugInfo::default();
    let outcome = run(request, fetcher, &mut debug).await;
    ProcessResult { outcome, debug }
}

async fn run(
    request: &MetadataRequest,
    fetcher: &dyn ImageFetcher,
    debug: &mut DebugInfo,
) -> Result<PhotoMetadata, PipelineError> {
    log::info!("Fetching fileUrl: {}", request.file_url);

    let raw = match fetcher.fetch(&request.file_url).await {
        Ok(raw) => raw,
        Err(FetchError::Request { cause }) => {
            log::error!("Error fetching fileUrl: {cause}");
            debug.fetch_error = Some(cause.clone());
            return Err(PipelineError::FetchFailed { cause });
        }
        Err(FetchError::NotAnImage {
            content_type,
            content_length,
        }) => {
            log::warn!("URL did not return an image. Content-Type: {content_type}");
            debug.content_type = Some(content_type.clone());
            debug.content_length = content_length;
            return Err(PipelineError::NotAnImage { content_type });
        }
    };

    let RawImage {
        bytes,
        content_type,
        content_length,
    } = raw;
    debug.content_type = Some(content_type);
    debug.content_length = content_length;

    let extraction = tokio::task::spawn_blocking(move || exif::extract(&bytes))
        .await
        .map_err(|e| {
            log::error!("EXIF extraction task failed: {e}");
            PipelineError::Unhandled {
                message: e.to_string(),
            }
        })?;

    let extraction = match extraction {
        Ok(extraction) => extraction,
        Err(e) => {
            let cause = e.to_string();
            log::error!("Downloaded content is not a valid image: {cause}");
            debug.open_error = Some(cause.clone());
            return Err(PipelineError::DecodeFailed { cause });
        }
    };

    let image = extraction.image;
    log::info!(
        "Image opened successfully: format={} size={}x{}",
        image.format_name(),
        image.width,
        image.height
    );
    debug.image_format = Some(image.format_name());
    debug.image_size = Some([image.width, image.height]);

    Ok(exif::normalize(&extraction.tags))
}
