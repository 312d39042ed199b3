//! Where an image comes from, and the decoded form the pipeline works on.

use std::io::Cursor;
use std::path::PathBuf;

use image::{DynamicImage, GrayImage, ImageFormat};
use thiserror::Error;
use tracing::debug;

/// Fallback MIME type when the bytes carry no recognisable signature.
const DEFAULT_MIME: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a decodable image: {0}")]
    Decode(String),
}

/// An image reference from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Interpret a command-line style argument: `http(s)://` is a URL,
    /// anything else a file path.
    pub fn parse(arg: &str) -> Self {
        match url::Url::parse(arg) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ImageSource::Url(arg.to_string()),
            _ => ImageSource::Path(PathBuf::from(arg)),
        }
    }

    /// Fetch the raw bytes.
    pub async fn read(&self, client: &reqwest::Client) -> Result<Vec<u8>, ImageLoadError> {
        match self {
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::Path(path) => Ok(tokio::fs::read(path).await?),
            ImageSource::Url(url) => {
                debug!("fetching image from {}", url);
                let fetch_error = |e: reqwest::Error| ImageLoadError::Fetch {
                    url: url.clone(),
                    message: e.to_string(),
                };
                let response = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(fetch_error)?;
                let bytes = response.bytes().await.map_err(fetch_error)?;
                Ok(bytes.to_vec())
            }
        }
    }
}

/// Encoded bytes alongside their decoded pixels.
///
/// Remote backends upload the original bytes; local OCR works on pixels.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub image: DynamicImage,
}

impl LoadedImage {
    /// Decode raw bytes. Fails if they are not a supported image format.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, ImageLoadError> {
        if bytes.is_empty() {
            return Err(ImageLoadError::Decode("empty input".to_string()));
        }
        let image =
            image::load_from_memory(&bytes).map_err(|e| ImageLoadError::Decode(e.to_string()))?;
        let mime_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| DEFAULT_MIME.to_string());

        Ok(Self {
            bytes,
            mime_type,
            image,
        })
    }

    /// Wrap a processed greyscale image, encoding it as PNG.
    pub fn from_gray(gray: GrayImage) -> Result<Self, ImageLoadError> {
        let image = DynamicImage::ImageLuma8(gray);
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| ImageLoadError::Decode(e.to_string()))?;

        Ok(Self {
            bytes,
            mime_type: "image/png".to_string(),
            image,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// File extension matching the MIME type, for engines that sniff by name.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            _ => "jpg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::new_rgb8(width, height);
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_parse_source() {
        assert_eq!(
            ImageSource::parse("https://example.com/board.jpg"),
            ImageSource::Url("https://example.com/board.jpg".to_string())
        );
        assert_eq!(
            ImageSource::parse("photos/board.jpg"),
            ImageSource::Path(PathBuf::from("photos/board.jpg"))
        );
        assert_eq!(
            ImageSource::parse("C:\\boards\\a.png"),
            ImageSource::Path(PathBuf::from("C:\\boards\\a.png"))
        );
    }

    #[test]
    fn test_decode_png() {
        let loaded = LoadedImage::decode(png_bytes(12, 8)).unwrap();
        assert_eq!(loaded.dimensions(), (12, 8));
        assert_eq!(loaded.mime_type, "image/png");
        assert_eq!(loaded.extension(), "png");
    }

    #[test]
    fn test_decode_rejects_non_images() {
        assert!(matches!(
            LoadedImage::decode(b"ORIGIN:MADURAI".to_vec()),
            Err(ImageLoadError::Decode(_))
        ));
        assert!(LoadedImage::decode(Vec::new()).is_err());
    }

    #[test]
    fn test_from_gray_round_trips_dimensions() {
        let loaded = LoadedImage::from_gray(GrayImage::new(5, 7)).unwrap();
        let decoded = LoadedImage::decode(loaded.bytes.clone()).unwrap();
        assert_eq!(decoded.dimensions(), (5, 7));
    }

    #[tokio::test]
    async fn test_read_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.png");
        std::fs::write(&path, png_bytes(3, 3)).unwrap();

        let client = reqwest::Client::new();
        let bytes = ImageSource::Path(path).read(&client).await.unwrap();
        assert!(LoadedImage::decode(bytes).is_ok());
    }
}
