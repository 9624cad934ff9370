//! Remote-fetch collaborator.
//!
//! [`RemoteFetcher`] is the boundary the loader uses for `http…` tags.
//! Retries and caching belong to implementations, not to the loader.
//! Cancelling a fetch means dropping its future, which the loader does by
//! aborting the request task.

use async_trait::async_trait;
use futures_util::StreamExt;
use image::{DynamicImage, Rgba, RgbaImage};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::error::{LoadError, PixtagError};
use crate::geometry::{ResizeMode, Size};
use crate::scaling::ScalingEngine;
use crate::types::DecodedImage;

/// Progress callback: `(bytes_loaded, total_bytes_if_known)`.
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Parameters for [`RemoteFetcher::fetch_image`].
#[derive(Debug, Clone)]
pub struct FetchImageRequest {
    pub tag: String,
    pub url: Url,
    pub size: Size,
    pub scale: f64,
    pub resize_mode: ResizeMode,
    /// Recolor every opaque pixel, keeping alpha
    pub tint: Option<Rgba<u8>>,
    /// Composite the image over a solid color
    pub background: Option<Rgba<u8>>,
}

/// Fetches bytes and images over the network.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Download the raw body of `url`.
    async fn fetch_bytes(
        &self,
        tag: &str,
        url: &Url,
        progress: Option<ProgressFn>,
    ) -> Result<Vec<u8>, LoadError>;

    /// Download and decode an image sized for the request.
    ///
    /// The default implementation downloads with [`fetch_bytes`] and decodes
    /// through the scaling engine on a blocking thread.
    ///
    /// [`fetch_bytes`]: RemoteFetcher::fetch_bytes
    async fn fetch_image(
        &self,
        request: &FetchImageRequest,
        progress: Option<ProgressFn>,
    ) -> Result<DecodedImage, LoadError> {
        let bytes = self
            .fetch_bytes(&request.tag, &request.url, progress)
            .await?;
        let request = request.clone();
        let tag = request.tag.clone();
        tokio::task::spawn_blocking(move || decode_fetched(&request, &bytes))
            .await
            .map_err(|e| LoadError::decode(&tag, format!("Task join error: {}", e)))?
    }
}

/// Decode downloaded bytes for `request`, applying background and tint.
pub fn decode_fetched(
    request: &FetchImageRequest,
    bytes: &[u8],
) -> Result<DecodedImage, LoadError> {
    let mut decoded = ScalingEngine::new().scale_bytes(
        &request.tag,
        bytes,
        request.size,
        request.scale,
        request.resize_mode,
    )?;
    if request.tint.is_some() || request.background.is_some() {
        let mut pixels = decoded.image.to_rgba8();
        if let Some(tint) = request.tint {
            apply_tint(&mut pixels, tint);
        }
        if let Some(background) = request.background {
            apply_background(&mut pixels, background);
        }
        decoded.image = DynamicImage::ImageRgba8(pixels);
    }
    Ok(decoded)
}

fn apply_tint(pixels: &mut RgbaImage, tint: Rgba<u8>) {
    for pixel in pixels.pixels_mut() {
        let alpha = (pixel[3] as u16 * tint[3] as u16 / 255) as u8;
        *pixel = Rgba([tint[0], tint[1], tint[2], alpha]);
    }
}

fn apply_background(pixels: &mut RgbaImage, background: Rgba<u8>) {
    for pixel in pixels.pixels_mut() {
        let a = pixel[3] as u32;
        let inv = 255 - a;
        let blend = |fg: u8, bg: u8| ((fg as u32 * a + bg as u32 * inv) / 255) as u8;
        let out_alpha = (a + background[3] as u32 * inv / 255).min(255) as u8;
        *pixel = Rgba([
            blend(pixel[0], background[0]),
            blend(pixel[1], background[1]),
            blend(pixel[2], background[2]),
            out_alpha,
        ]);
    }
}

/// [`RemoteFetcher`] over HTTP(S) using `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &RemoteConfig) -> Result<Self, PixtagError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch_bytes(
        &self,
        tag: &str,
        url: &Url,
        progress: Option<ProgressFn>,
    ) -> Result<Vec<u8>, LoadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| LoadError::Fetch {
                tag: tag.to_string(),
                message: format!("Request failed: {e}"),
                status_code: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Fetch {
                tag: tag.to_string(),
                message: format!("HTTP {status}"),
                status_code: Some(status.as_u16()),
            });
        }

        let total = response.content_length();
        let mut bytes = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LoadError::Fetch {
                tag: tag.to_string(),
                message: format!("Body read failed: {e}"),
                status_code: Some(status.as_u16()),
            })?;
            bytes.extend_from_slice(&chunk);
            if let Some(progress) = &progress {
                progress(bytes.len() as u64, total);
            }
        }

        tracing::trace!("Fetched {} bytes for {}", bytes.len(), tag);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::fixtures;
    use image::GenericImageView;

    fn request(tint: Option<Rgba<u8>>, background: Option<Rgba<u8>>) -> FetchImageRequest {
        FetchImageRequest {
            tag: "https://example.com/x.png".into(),
            url: Url::parse("https://example.com/x.png").unwrap(),
            size: Size::new(10.0, 10.0),
            scale: 1.0,
            resize_mode: ResizeMode::Fill,
            tint,
            background,
        }
    }

    #[test]
    fn test_decode_fetched_plain() {
        let img = decode_fetched(&request(None, None), &fixtures::png(20, 20)).unwrap();
        assert_eq!(img.pixel_size(), (10, 10));
    }

    #[test]
    fn test_tint_keeps_alpha() {
        let mut pixels = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 128]));
        apply_tint(&mut pixels, Rgba([255, 0, 0, 255]));
        assert_eq!(*pixels.get_pixel(0, 0), Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn test_background_fills_transparent_pixels() {
        let mut pixels = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        apply_background(&mut pixels, Rgba([0, 0, 255, 255]));
        assert_eq!(*pixels.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_decode_fetched_with_colors() {
        let img = decode_fetched(
            &request(Some(Rgba([0, 255, 0, 255])), Some(Rgba([255, 255, 255, 255]))),
            &fixtures::png(4, 4),
        )
        .unwrap();
        assert_eq!(img.image.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_http_fetcher_builds_from_defaults() {
        assert!(HttpFetcher::new(&RemoteConfig::default()).is_ok());
    }
}
