//! Pixtag Core - tag-dispatched asynchronous image loading.
//!
//! A tag is an opaque string naming an image that may live in a photo
//! library, at a remote URL, in an in-process store, or in a local resource.
//! [`ImageLoader`] turns a tag into a [`DecodedImage`] without the caller
//! knowing which backend holds it.
//!
//! # Architecture
//!
//! ```text
//! load(tag) → classify → per-source strategy (→ scaling engine) → scheduler → callback
//! ```
//!
//! - [`tag`] maps tags to a [`Source`] with an ordered rule table.
//! - [`scaling`] decodes straight to a thumbnail sized for the target rect.
//! - [`scheduler`] runs every callback on one home thread.
//! - [`loader`] orchestrates, owns the serial asset decode queue, and hands
//!   back a [`CancellationToken`] immediately.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pixtag_core::{Config, ImageLoader, LoadRequest, ResizeMode, Size};
//!
//! #[tokio::main]
//! async fn main() -> pixtag_core::Result<()> {
//!     let config = Config::load()?;
//!     let loader = ImageLoader::new(&config)?;
//!
//!     let request = LoadRequest::new("https://example.com/cat.jpg")
//!         .size(Size::new(100.0, 100.0))
//!         .scale(2.0)
//!         .resize_mode(ResizeMode::AspectFit);
//!     let image = loader.load_async(request).await?;
//!     println!("{:?}", image.pixel_size());
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod decode;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod queue;
pub mod scaling;
pub mod scheduler;
pub mod source;
pub mod tag;
pub mod types;

// Re-exports for convenient access
pub use cancel::{Cancel, CancellationToken, NoopCancel};
pub use config::{Config, PhotosDelivery};
pub use error::{ConfigError, ErrorKind, LoadError, LoadResult, PixtagError, Result};
pub use geometry::{clip_rect, Rect, ResizeMode, Size};
pub use loader::{ImageLoader, ImageLoaderBuilder, LoadRequest};
pub use queue::DecodeQueue;
pub use scaling::{ScalePlan, ScalingEngine};
pub use scheduler::{CallbackScheduler, Executor, HomeExecutor, Job};
pub use tag::{classify, Source};
pub use types::{AnimationFrame, DecodedImage};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
