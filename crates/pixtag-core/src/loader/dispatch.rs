//! Per-source load strategies.

use reqwest::Url;
use std::time::Instant;

use crate::config::PhotosDelivery;
use crate::decode::decode_animated;
use crate::error::{LoadError, LoadResult};
use crate::geometry::{ResizeMode, Size};
use crate::source::{FetchImageRequest, PhotoRequest, ProgressFn};
use crate::tag::{photos_local_id, Source};
use crate::types::DecodedImage;

use super::{LoadRequest, Shared};

/// Run the strategy for `source`, returning the terminal result.
pub(super) async fn run(
    shared: &Shared,
    source: Source,
    request: &LoadRequest,
    progress: Option<ProgressFn>,
) -> LoadResult<DecodedImage> {
    let tag = request.tag.as_str();
    let scale = shared.effective_scale(request.scale);

    match source {
        Source::AssetLibrary => {
            load_asset(shared, tag, request.size, scale, request.resize_mode).await
        }
        Source::Photos => load_photo(shared, tag, request.size, scale, request.resize_mode).await,
        Source::RemoteGif => load_remote_gif(shared, tag, progress).await,
        Source::RemoteImage => load_remote_image(shared, request, scale, progress).await,
        Source::ImageStore => shared
            .store
            .get(tag)
            .await
            .ok_or_else(|| LoadError::not_found(tag)),
        Source::LocalGif => load_local_gif(shared, tag).await,
        Source::Resource => {
            shared
                .resources
                .resolve(tag)
                .await
                .ok_or_else(|| LoadError::UnrecognizedProtocol {
                    tag: tag.to_string(),
                })
        }
    }
}

/// Resolve the asset, then decode it on the serial queue. The asset's bytes
/// are dropped as soon as the queued job returns.
async fn load_asset(
    shared: &Shared,
    tag: &str,
    size: Size,
    scale: f64,
    mode: ResizeMode,
) -> LoadResult<DecodedImage> {
    let resolve_start = Instant::now();
    let asset = shared
        .library
        .get()
        .resolve_asset(tag)
        .await?
        .ok_or_else(|| LoadError::not_found(tag))?;
    tracing::trace!("  Resolve: {:?}", resolve_start.elapsed());

    let engine = shared.engine;
    let job_tag = tag.to_string();
    let decode_start = Instant::now();
    let image = shared
        .queue
        .run(tag, move || {
            if size.is_natural() {
                engine.decode_natural(&job_tag, asset.as_ref())
            } else {
                engine.scale(&job_tag, asset.as_ref(), size, scale, mode)
            }
        })
        .await?;
    tracing::trace!("  Decode: {:?}", decode_start.elapsed());
    Ok(image)
}

async fn load_photo(
    shared: &Shared,
    tag: &str,
    size: Size,
    scale: f64,
    mode: ResizeMode,
) -> LoadResult<DecodedImage> {
    let local_id = photos_local_id(tag).unwrap_or_default();
    let mut deliveries = shared
        .library
        .get()
        .request_image(tag, local_id, PhotoRequest::new(size, scale, mode))
        .await;

    match shared.config.photos_delivery {
        PhotosDelivery::First => match deliveries.recv().await {
            Some(delivery) => delivery.result,
            None => Err(LoadError::not_found(tag)),
        },
        PhotosDelivery::Final => {
            let mut fallback = None;
            while let Some(delivery) = deliveries.recv().await {
                if !delivery.degraded {
                    return delivery.result;
                }
                tracing::trace!("  Degraded delivery for {}", tag);
                fallback = Some(delivery.result);
            }
            fallback.unwrap_or_else(|| Err(LoadError::not_found(tag)))
        }
    }
}

/// Parse a remote tag before any network traffic.
fn parse_url(tag: &str) -> LoadResult<Url> {
    let url = Url::parse(tag).map_err(|e| LoadError::MalformedUrl {
        tag: tag.to_string(),
        message: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::MalformedUrl {
            tag: tag.to_string(),
            message: format!("unsupported scheme {other:?}"),
        }),
    }
}

async fn load_remote_gif(
    shared: &Shared,
    tag: &str,
    progress: Option<ProgressFn>,
) -> LoadResult<DecodedImage> {
    let url = parse_url(tag)?;
    let bytes = shared.fetcher.fetch_bytes(tag, &url, progress).await?;
    decode_gif_blocking(tag, bytes).await
}

async fn load_remote_image(
    shared: &Shared,
    request: &LoadRequest,
    scale: f64,
    progress: Option<ProgressFn>,
) -> LoadResult<DecodedImage> {
    let url = parse_url(&request.tag)?;
    let fetch = FetchImageRequest {
        tag: request.tag.clone(),
        url,
        size: request.size,
        scale,
        resize_mode: request.resize_mode,
        tint: request.tint,
        background: request.background,
    };
    shared.fetcher.fetch_image(&fetch, progress).await
}

async fn load_local_gif(shared: &Shared, tag: &str) -> LoadResult<DecodedImage> {
    let bytes = shared
        .resources
        .read_bytes(tag)
        .await
        .ok_or_else(|| LoadError::not_found(tag))?;
    decode_gif_blocking(tag, bytes).await
}

async fn decode_gif_blocking(tag: &str, bytes: Vec<u8>) -> LoadResult<DecodedImage> {
    let owned = tag.to_string();
    tokio::task::spawn_blocking(move || decode_animated(&owned, &bytes))
        .await
        .map_err(|e| LoadError::decode(tag, format!("Task join error: {}", e)))?
}
