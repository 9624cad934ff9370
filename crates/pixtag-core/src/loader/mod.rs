//! The load dispatcher.
//!
//! [`ImageLoader`] classifies a tag, runs the matching strategy on the Tokio
//! runtime, and hands the single terminal result to the caller's callback on
//! the home context. `load` never blocks and never completes inline.

mod dispatch;

use futures_util::FutureExt;
use image::Rgba;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::cancel::{AbortOnCancel, CancellationToken, Completion, FinishOnDrop};
use crate::config::{Config, LoaderConfig};
use crate::error::{LoadError, LoadResult, PixtagError};
use crate::geometry::{ResizeMode, Size};
use crate::queue::DecodeQueue;
use crate::scaling::ScalingEngine;
use crate::scheduler::{CallbackScheduler, Executor, HomeExecutor};
use crate::source::{
    BundleResolver, DirectoryPhotoLibrary, HttpFetcher, ImageStore, MemoryImageStore,
    PhotoLibrary, ProgressFn, RemoteFetcher, ResourceResolver,
};
use crate::tag::classify;
use crate::types::DecodedImage;

type LibraryFactory = Box<dyn Fn() -> Arc<dyn PhotoLibrary> + Send + Sync>;

/// Photo library handle created on first use.
struct LazyLibrary {
    cell: OnceLock<Arc<dyn PhotoLibrary>>,
    init: LibraryFactory,
}

impl LazyLibrary {
    fn get(&self) -> &Arc<dyn PhotoLibrary> {
        self.cell.get_or_init(|| {
            let library = (self.init)();
            tracing::debug!("Initialized photo library: {}", library.name());
            library
        })
    }
}

/// Everything a running strategy needs, shared across requests.
struct Shared {
    config: LoaderConfig,
    scheduler: CallbackScheduler,
    library: LazyLibrary,
    fetcher: Arc<dyn RemoteFetcher>,
    store: Arc<dyn ImageStore>,
    resources: Arc<dyn ResourceResolver>,
    queue: Arc<DecodeQueue>,
    engine: ScalingEngine,
}

impl Shared {
    /// A scale of 0 means the device default.
    fn effective_scale(&self, scale: f64) -> f64 {
        if scale > 0.0 {
            scale
        } else {
            self.config.default_scale
        }
    }
}

/// One image request.
#[derive(Clone)]
pub struct LoadRequest {
    pub tag: String,
    /// Target size in points; [`Size::NATURAL`] keeps the source size
    pub size: Size,
    /// Pixels per point; 0 means the configured default
    pub scale: f64,
    pub resize_mode: ResizeMode,
    /// Remote images only
    pub tint: Option<Rgba<u8>>,
    /// Remote images only
    pub background: Option<Rgba<u8>>,
    progress: Option<ProgressFn>,
}

impl LoadRequest {
    /// Natural size, default scale, [`ResizeMode::Fill`], no progress.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            size: Size::NATURAL,
            scale: 0.0,
            resize_mode: ResizeMode::Fill,
            tint: None,
            background: None,
            progress: None,
        }
    }

    pub fn size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn resize_mode(mut self, mode: ResizeMode) -> Self {
        self.resize_mode = mode;
        self
    }

    pub fn tint(mut self, color: Rgba<u8>) -> Self {
        self.tint = Some(color);
        self
    }

    pub fn background(mut self, color: Rgba<u8>) -> Self {
        self.background = Some(color);
        self
    }

    /// Called on the home context with `(bytes_loaded, total_bytes)` while a
    /// remote download runs. Never called after the completion.
    pub fn on_progress(mut self, progress: impl Fn(u64, Option<u64>) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("tag", &self.tag)
            .field("size", &self.size)
            .field("scale", &self.scale)
            .field("resize_mode", &self.resize_mode)
            .field("tint", &self.tint)
            .field("background", &self.background)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Resolves tags into decoded images.
#[derive(Clone)]
pub struct ImageLoader {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl ImageLoader {
    /// Loader with the reference collaborators and a fresh home thread.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &Config) -> Result<Self, PixtagError> {
        Self::builder(config).build()
    }

    pub fn builder(config: &Config) -> ImageLoaderBuilder {
        ImageLoaderBuilder::new(config)
    }

    /// Load `tag` at its natural size.
    pub fn load(
        &self,
        tag: impl Into<String>,
        completion: impl FnOnce(LoadResult<DecodedImage>) + Send + 'static,
    ) -> CancellationToken {
        self.load_with(LoadRequest::new(tag), completion)
    }

    /// Start `request` and return its cancellation handle immediately.
    ///
    /// `completion` runs exactly once, on the home context, with either the
    /// image or an error naming the tag.
    pub fn load_with(
        &self,
        mut request: LoadRequest,
        completion: impl FnOnce(LoadResult<DecodedImage>) + Send + 'static,
    ) -> CancellationToken {
        let source = classify(&request.tag);
        tracing::debug!("Dispatching {} as {}", request.tag, source);

        let completion = Completion::new(
            request.tag.clone(),
            Box::new(completion),
            self.shared.scheduler.clone(),
        );
        let progress = request
            .progress
            .take()
            .map(|progress| completion.forward_progress(progress));

        let shared = Arc::clone(&self.shared);
        let guard = FinishOnDrop(Arc::clone(&completion));
        let task = self.runtime.spawn(async move {
            let start = Instant::now();
            let tag = request.tag.clone();
            let result = AssertUnwindSafe(dispatch::run(&shared, source, &request, progress))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(LoadError::decode(&tag, "Loader task panicked")));

            match &result {
                Ok(image) => {
                    let (width, height) = image.pixel_size();
                    tracing::debug!("Loaded {} in {:?} ({}x{})", tag, start.elapsed(), width, height);
                }
                Err(e) => tracing::warn!("{}", e),
            }
            guard.0.finish(result);
        });

        if source.is_remote() {
            CancellationToken::new(AbortOnCancel::new(task.abort_handle(), completion))
        } else {
            CancellationToken::noop()
        }
    }

    /// Await the result of `request` instead of passing a callback.
    pub async fn load_async(&self, request: LoadRequest) -> LoadResult<DecodedImage> {
        let tag = request.tag.clone();
        let (tx, rx) = oneshot::channel();
        let _token = self.load_with(request, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(LoadError::Cancelled { tag }))
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.shared.config
    }
}

/// Builder for [`ImageLoader`]. Unset collaborators fall back to the
/// reference implementations configured by [`Config`].
pub struct ImageLoaderBuilder {
    config: Config,
    executor: Option<Arc<dyn Executor>>,
    runtime: Option<Handle>,
    library: Option<LibraryFactory>,
    fetcher: Option<Arc<dyn RemoteFetcher>>,
    store: Option<Arc<dyn ImageStore>>,
    resources: Option<Arc<dyn ResourceResolver>>,
    queue: Option<Arc<DecodeQueue>>,
}

impl ImageLoaderBuilder {
    fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            executor: None,
            runtime: None,
            library: None,
            fetcher: None,
            store: None,
            resources: None,
            queue: None,
        }
    }

    /// Context that runs every callback. Defaults to a new `pixtag-home`
    /// thread.
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Runtime that drives requests. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Photo library factory, called at most once on first use.
    pub fn photo_library(
        mut self,
        factory: impl Fn() -> Arc<dyn PhotoLibrary> + Send + Sync + 'static,
    ) -> Self {
        self.library = Some(Box::new(factory));
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn image_store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn resources(mut self, resources: Arc<dyn ResourceResolver>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Serial asset decode queue. Defaults to the process-wide one.
    pub fn decode_queue(mut self, queue: Arc<DecodeQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn build(self) -> Result<ImageLoader, PixtagError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()?,
        };
        let executor: Arc<dyn Executor> = match self.executor {
            Some(executor) => executor,
            None => HomeExecutor::spawn("pixtag-home")?,
        };
        let fetcher: Arc<dyn RemoteFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&self.config.remote)?),
        };
        let init: LibraryFactory = match self.library {
            Some(factory) => factory,
            None => {
                let root = self.config.library_root();
                Box::new(move || {
                    Arc::new(DirectoryPhotoLibrary::new(root.clone())) as Arc<dyn PhotoLibrary>
                })
            }
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryImageStore::new()));
        let resources = self
            .resources
            .unwrap_or_else(|| Arc::new(BundleResolver::new(self.config.bundle_dir())));

        Ok(ImageLoader {
            shared: Arc::new(Shared {
                config: self.config.loader,
                scheduler: CallbackScheduler::new(executor),
                library: LazyLibrary {
                    cell: OnceLock::new(),
                    init,
                },
                fetcher,
                store,
                resources,
                queue: self.queue.unwrap_or_else(DecodeQueue::shared),
                engine: ScalingEngine::new(),
            }),
            runtime,
        })
    }
}
