use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage, Rgba};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};

pub const DEFAULT_MAX_IMAGE_DIM: u32 = 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a rendered shot lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Base64 payload plus its mime type, as the pipeline hands it over.
    Inline { data: String, mime: String },
    /// `data:<mime>;base64,<payload>`
    DataUrl(String),
    Remote(String),
    Path(PathBuf),
}

impl ImageSource {
    /// Classifies a scene's `generatedImage` string.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lowered = trimmed.to_ascii_lowercase();
        if lowered.starts_with("data:") {
            return Some(Self::DataUrl(trimmed.to_string()));
        }
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            return Some(Self::Remote(trimmed.to_string()));
        }
        Some(Self::Path(PathBuf::from(trimmed)))
    }

    /// Short description for logs; never includes inline payloads.
    pub fn label(&self) -> String {
        match self {
            Self::Inline { mime, .. } => format!("inline:{mime}"),
            Self::DataUrl(_) => "data_url".to_string(),
            Self::Remote(url) => url.clone(),
            Self::Path(path) => path.to_string_lossy().to_string(),
        }
    }
}

/// Uniform `bytes + mime` form sent to vision models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl NormalizedImage {
    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64())
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    http: HttpClient,
    max_dim: u32,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_DIM)
    }
}

impl ImageNormalizer {
    pub fn new(max_dim: u32) -> Self {
        Self {
            http: HttpClient::new(),
            max_dim: max_dim.max(128),
        }
    }

    /// Inline payloads pass through untouched; fetched and local images are
    /// flattened, bounded to `max_dim` and re-encoded as JPEG when they
    /// decode.
    pub fn normalize(&self, source: &ImageSource) -> Result<NormalizedImage> {
        match source {
            ImageSource::Inline { data, mime } => decode_inline(data, mime),
            ImageSource::DataUrl(url) => decode_data_url(url),
            ImageSource::Remote(url) => {
                let (bytes, mime) = self.fetch(url)?;
                Ok(self.prepare_raster(bytes, mime))
            }
            ImageSource::Path(path) => {
                let bytes =
                    fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
                let mime = guess_image_mime(path).to_string();
                Ok(self.prepare_raster(bytes, mime))
            }
        }
    }

    fn fetch(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let response = self
            .http
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .with_context(|| format!("image fetch failed ({url})"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("image fetch failed ({}): {url}", status.as_u16());
        }
        let header_mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| value.starts_with("image/"));
        let bytes = response
            .bytes()
            .with_context(|| format!("image body read failed ({url})"))?
            .to_vec();
        if bytes.is_empty() {
            bail!("image fetch returned an empty body ({url})");
        }
        let mime = header_mime.unwrap_or_else(|| {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            guess_image_mime(Path::new(path)).to_string()
        });
        Ok((bytes, mime))
    }

    fn prepare_raster(&self, bytes: Vec<u8>, mime: String) -> NormalizedImage {
        let Ok(decoded) = image::load_from_memory(&bytes) else {
            return NormalizedImage { bytes, mime };
        };
        let rgba = decoded.to_rgba8();
        let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([red, green, blue, alpha]) = *rgba.get_pixel(x, y);
            let alpha = u32::from(alpha);
            let over_white =
                |channel: u8| ((u32::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8;
            Rgb([over_white(red), over_white(green), over_white(blue)])
        });
        let mut image = DynamicImage::ImageRgb8(flattened);
        if image.width() > self.max_dim || image.height() > self.max_dim {
            image = image.resize(self.max_dim, self.max_dim, FilterType::Triangle);
        }
        let mut encoded = Vec::new();
        let encoded_ok = JpegEncoder::new_with_quality(&mut encoded, 90)
            .encode_image(&image)
            .is_ok();
        if encoded_ok {
            return NormalizedImage {
                bytes: encoded,
                mime: "image/jpeg".to_string(),
            };
        }
        NormalizedImage { bytes, mime }
    }
}

fn decode_inline(data: &str, mime: &str) -> Result<NormalizedImage> {
    let mime = mime.trim().to_ascii_lowercase();
    if !mime.starts_with("image/") {
        bail!("inline payload is not an image ({mime})");
    }
    let compact: String = data.chars().filter(|ch| !ch.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .context("inline image is not valid base64")?;
    if bytes.is_empty() {
        bail!("inline image is empty");
    }
    Ok(NormalizedImage { bytes, mime })
}

fn decode_data_url(url: &str) -> Result<NormalizedImage> {
    let Some(rest) = url.trim().get(5..) else {
        bail!("malformed data URL");
    };
    let Some((header, payload)) = rest.split_once(',') else {
        bail!("malformed data URL");
    };
    let Some(mime) = header.strip_suffix(";base64") else {
        bail!("data URL is not base64 encoded");
    };
    decode_inline(payload, mime)
}

fn guess_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" | "heif" => "image/heic",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use base64::Engine as _;
    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

    use super::{ImageNormalizer, ImageSource, NormalizedImage, BASE64};

    #[test]
    fn parse_classifies_sources() {
        assert_eq!(ImageSource::parse("   "), None);
        assert_eq!(
            ImageSource::parse("data:image/png;base64,AAAA"),
            Some(ImageSource::DataUrl("data:image/png;base64,AAAA".to_string()))
        );
        assert_eq!(
            ImageSource::parse(" https://cdn.example.com/s1.png "),
            Some(ImageSource::Remote("https://cdn.example.com/s1.png".to_string()))
        );
        assert_eq!(
            ImageSource::parse("renders/s1.png"),
            Some(ImageSource::Path(PathBuf::from("renders/s1.png")))
        );
    }

    #[test]
    fn data_url_and_inline_decode_to_same_bytes() -> anyhow::Result<()> {
        let normalizer = ImageNormalizer::default();
        let payload = BASE64.encode(b"not-really-a-png");
        let from_url = normalizer.normalize(&ImageSource::DataUrl(format!(
            "data:image/png;base64,{payload}"
        )))?;
        let from_inline = normalizer.normalize(&ImageSource::Inline {
            data: payload,
            mime: "IMAGE/PNG".to_string(),
        })?;
        assert_eq!(from_url, from_inline);
        assert_eq!(from_url.bytes, b"not-really-a-png".to_vec());
        assert_eq!(from_url.mime, "image/png");
        Ok(())
    }

    #[test]
    fn rejects_malformed_inline_payloads() {
        let normalizer = ImageNormalizer::default();
        assert!(normalizer
            .normalize(&ImageSource::DataUrl("data:image/png,raw".to_string()))
            .is_err());
        assert!(normalizer
            .normalize(&ImageSource::Inline {
                data: "!!!".to_string(),
                mime: "image/png".to_string(),
            })
            .is_err());
        assert!(normalizer
            .normalize(&ImageSource::Inline {
                data: BASE64.encode(b"text"),
                mime: "text/plain".to_string(),
            })
            .is_err());
    }

    #[test]
    fn local_images_are_downscaled_to_jpeg() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("wide.png");
        RgbImage::from_pixel(1024, 512, Rgb([200, 40, 40])).save(&path)?;

        let normalized = ImageNormalizer::new(256).normalize(&ImageSource::Path(path))?;
        assert_eq!(normalized.mime, "image/jpeg");
        let decoded = image::load_from_memory(&normalized.bytes)?;
        assert_eq!(decoded.dimensions(), (256, 128));
        Ok(())
    }

    #[test]
    fn transparent_pixels_flatten_onto_white() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("cutout.png");
        RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])).save(&path)?;

        let normalized = ImageNormalizer::default().normalize(&ImageSource::Path(path))?;
        let decoded = image::load_from_memory(&normalized.bytes)?.to_rgb8();
        let pixel = decoded.get_pixel(1, 1);
        assert!(pixel.0.iter().all(|channel| *channel > 240), "{pixel:?}");
        Ok(())
    }

    #[test]
    fn undecodable_local_files_pass_through() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("shot.webp");
        std::fs::write(&path, b"opaque")?;
        let normalized = ImageNormalizer::default().normalize(&ImageSource::Path(path))?;
        assert_eq!(normalized.bytes, b"opaque".to_vec());
        assert_eq!(normalized.mime, "image/webp");
        Ok(())
    }

    #[test]
    fn missing_local_file_is_an_error() {
        let result = ImageNormalizer::default()
            .normalize(&ImageSource::Path(PathBuf::from("/nonexistent/shot.png")));
        assert!(result.is_err());
    }

    #[test]
    fn normalized_image_encodings() {
        let image = NormalizedImage {
            bytes: b"abc".to_vec(),
            mime: "image/png".to_string(),
        };
        assert_eq!(image.data_url(), "data:image/png;base64,YWJj");
        assert_eq!(
            image.sha256_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
