//! Shared fixtures for unit tests: in-memory images with hand-built EXIF
//! blocks, and a loopback HTTP server that serves them.

use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use axum::routing::get;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TAG_GPS_POINTER: u16 = 0x8825;

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let pixels = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(pixels)
        .write_to(&mut out, format)
        .expect("encode fixture image");
    out.into_inner()
}

/// A JPEG without any EXIF segment.
pub(crate) fn plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

pub(crate) fn plain_png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

#[derive(Debug, Clone)]
struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    data: Vec<u8>,
}

impl Entry {
    fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self {
            tag,
            kind: TYPE_ASCII,
            count: data.len() as u32,
            data,
        }
    }

    fn rationals(tag: u16, values: &[(u32, u32)]) -> Self {
        let data = values
            .iter()
            .flat_map(|&(num, denom)| num.to_le_bytes().into_iter().chain(denom.to_le_bytes()))
            .collect();
        Self {
            tag,
            kind: TYPE_RATIONAL,
            count: values.len() as u32,
            data,
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        Self {
            tag,
            kind: TYPE_LONG,
            count: 1,
            data: value.to_le_bytes().to_vec(),
        }
    }

    /// Bytes this entry needs outside the IFD, word aligned.
    fn overflow_len(&self) -> usize {
        if self.data.len() > 4 {
            self.data.len() + self.data.len() % 2
        } else {
            0
        }
    }
}

fn ifd_len(entries: &[Entry]) -> usize {
    2 + 12 * entries.len() + 4 + entries.iter().map(Entry::overflow_len).sum::<usize>()
}

/// Append an IFD at the end of `out`. Offsets are relative to the start of
/// `out`, which must begin with the TIFF header.
fn write_ifd(out: &mut Vec<u8>, entries: &[Entry]) {
    let mut data_offset = out.len() + 2 + 12 * entries.len() + 4;
    let mut overflow = Vec::new();

    out.extend((entries.len() as u16).to_le_bytes());
    for entry in entries {
        out.extend(entry.tag.to_le_bytes());
        out.extend(entry.kind.to_le_bytes());
        out.extend(entry.count.to_le_bytes());
        if entry.data.len() <= 4 {
            let mut inline = entry.data.clone();
            inline.resize(4, 0);
            out.extend(inline);
        } else {
            out.extend((data_offset as u32).to_le_bytes());
            overflow.extend(&entry.data);
            if entry.data.len() % 2 == 1 {
                overflow.push(0);
            }
            data_offset += entry.overflow_len();
        }
    }
    out.extend(0u32.to_le_bytes());
    out.extend(overflow);
}

/// Builds a little-endian TIFF/EXIF block with an optional GPS sub-IFD and
/// splices it into a JPEG as an APP1 segment.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExifBuilder {
    primary: Vec<Entry>,
    gps: Vec<Entry>,
}

impl ExifBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn ascii(mut self, tag: u16, text: &str) -> Self {
        self.primary.push(Entry::ascii(tag, text));
        self
    }

    pub(crate) fn date_time(self, text: &str) -> Self {
        self.ascii(0x0132, text)
    }

    pub(crate) fn gps_ascii(mut self, tag: u16, text: &str) -> Self {
        self.gps.push(Entry::ascii(tag, text));
        self
    }

    pub(crate) fn gps_rationals(mut self, tag: u16, values: &[(u32, u32)]) -> Self {
        self.gps.push(Entry::rationals(tag, values));
        self
    }

    pub(crate) fn tiff(&self) -> Vec<u8> {
        let mut primary = self.primary.clone();
        let mut gps = self.gps.clone();
        if !gps.is_empty() {
            primary.push(Entry::long(TAG_GPS_POINTER, 0));
        }
        primary.sort_by_key(|e| e.tag);
        gps.sort_by_key(|e| e.tag);

        let gps_offset = (8 + ifd_len(&primary)) as u32;
        if let Some(pointer) = primary.iter_mut().find(|e| e.tag == TAG_GPS_POINTER) {
            pointer.data = gps_offset.to_le_bytes().to_vec();
        }

        let mut out = b"II".to_vec();
        out.extend(42u16.to_le_bytes());
        out.extend(8u32.to_le_bytes());
        write_ifd(&mut out, &primary);
        if !gps.is_empty() {
            write_ifd(&mut out, &gps);
        }
        out
    }

    /// A 16x12 JPEG carrying this EXIF block.
    pub(crate) fn jpeg(&self) -> Vec<u8> {
        let jpeg = plain_jpeg(16, 12);
        let tiff = self.tiff();

        let mut out = jpeg[..2].to_vec();
        out.extend([0xFF, 0xE1]);
        out.extend(((2 + 6 + tiff.len()) as u16).to_be_bytes());
        out.extend(b"Exif\0\0");
        out.extend(tiff);
        out.extend(&jpeg[2..]);
        out
    }
}

/// `2023:05:01 10:00:00` at 40°26'46"N 79°56'55"W.
pub(crate) fn sample_exif() -> ExifBuilder {
    ExifBuilder::new()
        .date_time("2023:05:01 10:00:00")
        .gps_ascii(0x01, "N")
        .gps_rationals(0x02, &[(40, 1), (26, 1), (46, 1)])
        .gps_ascii(0x03, "W")
        .gps_rationals(0x04, &[(79, 1), (56, 1), (55, 1)])
}

/// Same as [`sample_exif`] but with a two-component latitude.
pub(crate) fn short_latitude_exif() -> ExifBuilder {
    ExifBuilder::new()
        .date_time("2023:05:01 10:00:00")
        .gps_ascii(0x01, "N")
        .gps_rationals(0x02, &[(40, 1), (26, 1)])
        .gps_ascii(0x03, "W")
        .gps_rationals(0x04, &[(79, 1), (56, 1), (55, 1)])
}

fn typed(content_type: &'static str, body: Vec<u8>) -> Response {
    Response::builder()
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .expect("fixture response")
}

/// Routes serving the fixtures with assorted content types. Anything else is a
/// 404.
pub(crate) fn image_host() -> Router {
    let photo = sample_exif().jpeg();
    let shouting = photo.clone();
    let slow = photo.clone();
    let short_latitude = short_latitude_exif().jpeg();
    let plain = plain_jpeg(10, 10);

    Router::new()
        .route("/photo.jpg", get(move || async move { typed("image/jpeg", photo) }))
        .route(
            "/shouting.jpg",
            get(move || async move { typed("IMAGE/JPEG; charset=binary", shouting) }),
        )
        .route(
            "/short-latitude.jpg",
            get(move || async move { typed("image/jpeg", short_latitude) }),
        )
        .route("/plain.jpg", get(move || async move { typed("image/jpeg", plain) }))
        .route(
            "/page.html",
            get(|| async { typed("text/html; charset=utf-8", b"<html></html>".to_vec()) }),
        )
        .route(
            "/bogus.png",
            get(|| async { typed("image/png", b"this is not a png".to_vec()) }),
        )
        .route(
            "/untyped",
            get(|| async { Response::new(Body::from("raw bytes")) }),
        )
        .route(
            "/slow.jpg",
            get(move || async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                typed("image/jpeg", slow)
            }),
        )
}

/// Serve `router` on an ephemeral loopback port for the rest of the test.
pub(crate) async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fixture server");
    });
    addr
}
