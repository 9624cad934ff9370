//! Photo-library collaborator: asset-URL resolution and managed fetches.
//!
//! [`PhotoLibrary`] is the interface the loader consumes. The
//! [`DirectoryPhotoLibrary`] implementation serves both `assets-library://`
//! and `ph://` tags from image files under a root directory.

use async_trait::async_trait;
use image::metadata::Orientation;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::decode::read_orientation_from;
use crate::error::LoadError;
use crate::geometry::{ResizeMode, Size};
use crate::scaling::ScalingEngine;
use crate::types::DecodedImage;

/// Raw, still-encoded asset data plus the metadata needed to plan a decode.
///
/// Borrowed read-only by the scaling engine for the duration of one decode.
pub trait AssetRepresentation: Send + Sync {
    /// Total size of the encoded data in bytes
    fn byte_len(&self) -> u64;

    /// Native dimensions in pixels
    fn pixel_size(&self) -> (u32, u32);

    /// Native pixels per point
    fn scale(&self) -> f64 {
        1.0
    }

    fn orientation(&self) -> Orientation;

    /// Read bytes starting at `offset` into `buf`, returning how many were read.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// How a managed fetch should fit the image into the requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    AspectFit,
    AspectFill,
}

impl From<ResizeMode> for ContentMode {
    fn from(mode: ResizeMode) -> Self {
        match mode {
            ResizeMode::AspectFit => Self::AspectFit,
            _ => Self::AspectFill,
        }
    }
}

/// Requested output size for a managed fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhotoTarget {
    /// Largest available image
    Maximum,
    /// `size` points at `scale` pixels per point
    Size { size: Size, scale: f64 },
}

/// Options for a managed fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoRequest {
    pub target: PhotoTarget,
    pub content_mode: ContentMode,
    /// Whether the provider may resize; off when the maximum size is requested
    pub allow_resize: bool,
}

impl PhotoRequest {
    pub fn new(size: Size, scale: f64, mode: ResizeMode) -> Self {
        if size.is_natural() {
            Self {
                target: PhotoTarget::Maximum,
                content_mode: mode.into(),
                allow_resize: false,
            }
        } else {
            Self {
                target: PhotoTarget::Size { size, scale },
                content_mode: mode.into(),
                allow_resize: true,
            }
        }
    }
}

/// One result from a managed fetch. Providers may send a degraded preview
/// before the final image.
#[derive(Debug)]
pub struct PhotoDelivery {
    pub result: Result<DecodedImage, LoadError>,
    pub degraded: bool,
}

/// Device photo library.
#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Resolve an `assets-library://` URL. `Ok(None)` means not found.
    async fn resolve_asset(
        &self,
        url: &str,
    ) -> Result<Option<Arc<dyn AssetRepresentation>>, LoadError>;

    /// Start a managed fetch of `local_id`. Results arrive on the returned
    /// channel; it closes once the provider is done.
    async fn request_image(
        &self,
        tag: &str,
        local_id: &str,
        request: PhotoRequest,
    ) -> mpsc::Receiver<PhotoDelivery>;
}

/// An image file on disk, read in byte ranges.
pub struct FileAsset {
    path: PathBuf,
    file: Mutex<File>,
    byte_len: u64,
    pixel_size: (u32, u32),
    orientation: Orientation,
}

impl FileAsset {
    /// Open `path`, reading only the header and EXIF block.
    pub fn open(path: &Path) -> io::Result<Self> {
        let pixel_size = image::ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let orientation = read_orientation_from(&mut BufReader::new(File::open(path)?));
        let file = File::open(path)?;
        let byte_len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            byte_len,
            pixel_size,
            orientation,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AssetRepresentation for FileAsset {
    fn byte_len(&self) -> u64 {
        self.byte_len
    }

    fn pixel_size(&self) -> (u32, u32) {
        self.pixel_size
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }
}

/// Photo library backed by a directory tree.
///
/// - `assets-library://asset/asset.JPG?id=NAME&ext=JPG` resolves to the file
///   `NAME.JPG` anywhere under the root (case-insensitive).
/// - `ph://LOCAL_ID` resolves to `ROOT/LOCAL_ID` if it exists, otherwise to
///   the first file whose stem equals `LOCAL_ID`.
pub struct DirectoryPhotoLibrary {
    root: PathBuf,
    engine: ScalingEngine,
}

impl DirectoryPhotoLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            engine: ScalingEngine::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name an asset URL refers to.
    fn asset_file_name(url: &str) -> Option<String> {
        let rest = url.strip_prefix(crate::tag::ASSETS_LIBRARY_SCHEME)?;
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut id = None;
        let mut ext = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("id", value)) => id = Some(value),
                Some(("ext", value)) => ext = Some(value),
                _ => {}
            }
        }

        match (id, ext) {
            (Some(id), Some(ext)) => Some(format!("{id}.{ext}")),
            (Some(id), None) => Some(id.to_string()),
            _ => path
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .map(String::from),
        }
    }

    fn find(root: &Path, matches: impl Fn(&Path) -> bool) -> Option<PathBuf> {
        WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .find(|p| matches(p))
    }

    fn locate_local_id(root: &Path, local_id: &str) -> Option<PathBuf> {
        // Ids resolve strictly below the root.
        let relative = Path::new(local_id);
        if local_id.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        let direct = root.join(local_id);
        if direct.is_file() {
            return Some(direct);
        }
        Self::find(root, |p| {
            p.file_stem().and_then(|s| s.to_str()) == Some(local_id)
        })
    }

    fn decode_for(
        engine: ScalingEngine,
        tag: &str,
        path: &Path,
        request: PhotoRequest,
    ) -> Result<DecodedImage, LoadError> {
        let asset = FileAsset::open(path).map_err(|e| {
            LoadError::decode(tag, format!("Cannot open {}: {}", path.display(), e))
        })?;
        match request.target {
            PhotoTarget::Maximum => engine.decode_natural(tag, &asset),
            PhotoTarget::Size { size, scale } => {
                let mode = match request.content_mode {
                    ContentMode::AspectFit => ResizeMode::AspectFit,
                    ContentMode::AspectFill => ResizeMode::AspectFill,
                };
                engine.scale(tag, &asset, size, scale, mode)
            }
        }
    }
}

#[async_trait]
impl PhotoLibrary for DirectoryPhotoLibrary {
    fn name(&self) -> &str {
        "directory"
    }

    async fn resolve_asset(
        &self,
        url: &str,
    ) -> Result<Option<Arc<dyn AssetRepresentation>>, LoadError> {
        let Some(file_name) = Self::asset_file_name(url) else {
            return Ok(None);
        };
        let root = self.root.clone();
        let tag = url.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<Arc<dyn AssetRepresentation>>, LoadError> {
            let Some(path) = Self::find(&root, |p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case(&file_name))
            }) else {
                return Ok(None);
            };
            tracing::trace!("Resolved {} to {:?}", tag, path);
            let asset = FileAsset::open(&path).map_err(|e| {
                LoadError::decode(&tag, format!("Cannot open {}: {}", path.display(), e))
            })?;
            Ok(Some(Arc::new(asset) as Arc<dyn AssetRepresentation>))
        })
        .await
        .map_err(|e| LoadError::decode(url, format!("Task join error: {}", e)))?
    }

    async fn request_image(
        &self,
        tag: &str,
        local_id: &str,
        request: PhotoRequest,
    ) -> mpsc::Receiver<PhotoDelivery> {
        let (tx, rx) = mpsc::channel(1);
        let root = self.root.clone();
        let engine = self.engine;
        let tag = tag.to_string();
        let local_id = local_id.to_string();

        tokio::task::spawn_blocking(move || {
            let result = match Self::locate_local_id(&root, &local_id) {
                Some(path) => Self::decode_for(engine, &tag, &path, request),
                None => Err(LoadError::not_found(&tag)),
            };
            let _ = tx.blocking_send(PhotoDelivery {
                result,
                degraded: false,
            });
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::fixtures;

    fn library_with(files: &[(&str, Vec<u8>)]) -> (tempfile::TempDir, DirectoryPhotoLibrary) {
        let dir = tempfile::tempdir().unwrap();
        for (name, bytes) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, bytes).unwrap();
        }
        let library = DirectoryPhotoLibrary::new(dir.path());
        (dir, library)
    }

    #[test]
    fn test_content_mode_from_resize_mode() {
        assert_eq!(ContentMode::from(ResizeMode::AspectFit), ContentMode::AspectFit);
        assert_eq!(ContentMode::from(ResizeMode::AspectFill), ContentMode::AspectFill);
        assert_eq!(ContentMode::from(ResizeMode::Fill), ContentMode::AspectFill);
    }

    #[test]
    fn test_natural_request_disables_resize() {
        let request = PhotoRequest::new(Size::NATURAL, 2.0, ResizeMode::Fill);
        assert_eq!(request.target, PhotoTarget::Maximum);
        assert!(!request.allow_resize);

        let request = PhotoRequest::new(Size::new(10.0, 10.0), 2.0, ResizeMode::Fill);
        assert!(request.allow_resize);
    }

    #[test]
    fn test_asset_file_name() {
        assert_eq!(
            DirectoryPhotoLibrary::asset_file_name(
                "assets-library://asset/asset.JPG?id=ABC-1&ext=JPG"
            ),
            Some("ABC-1.JPG".to_string())
        );
        assert_eq!(
            DirectoryPhotoLibrary::asset_file_name("assets-library://asset/beach.png"),
            Some("beach.png".to_string())
        );
        assert_eq!(DirectoryPhotoLibrary::asset_file_name("ph://x"), None);
    }

    #[tokio::test]
    async fn test_resolve_asset_reads_header() {
        let (_dir, library) = library_with(&[("2024/ABC-1.jpg", fixtures::jpeg(64, 32))]);
        let asset = library
            .resolve_asset("assets-library://asset/asset.JPG?id=ABC-1&ext=JPG")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(asset.pixel_size(), (64, 32));
        assert!(asset.byte_len() > 0);
    }

    #[tokio::test]
    async fn test_resolve_missing_asset() {
        let (_dir, library) = library_with(&[]);
        let asset = library
            .resolve_asset("assets-library://asset/asset.JPG?id=nope&ext=JPG")
            .await
            .unwrap();
        assert!(asset.is_none());
    }

    #[tokio::test]
    async fn test_request_image_scales() {
        let (_dir, library) = library_with(&[("beach.png", fixtures::png(200, 100))]);
        let request = PhotoRequest::new(Size::new(50.0, 50.0), 1.0, ResizeMode::AspectFit);
        let mut rx = library.request_image("ph://beach", "beach", request).await;
        let delivery = rx.recv().await.unwrap();
        assert!(!delivery.degraded);
        assert_eq!(delivery.result.unwrap().pixel_size(), (50, 25));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_request_image_missing() {
        let (_dir, library) = library_with(&[]);
        let request = PhotoRequest::new(Size::NATURAL, 1.0, ResizeMode::Fill);
        let mut rx = library.request_image("ph://gone", "gone", request).await;
        let err = rx.recv().await.unwrap().result.unwrap_err();
        assert_eq!(err, LoadError::not_found("ph://gone"));
    }

    #[test]
    fn test_local_id_rejects_traversal() {
        let (_dir, library) = library_with(&[]);
        for id in ["../etc/passwd", "a/../../b", "/etc/passwd", "./beach"] {
            assert!(DirectoryPhotoLibrary::locate_local_id(library.root(), id).is_none(), "{id}");
        }
    }

    #[tokio::test]
    async fn test_request_image_stays_inside_root() {
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.png");
        std::fs::write(&secret, fixtures::png(9, 7)).unwrap();
        let (_dir, library) = library_with(&[("beach.png", fixtures::png(4, 4))]);

        let local_id = secret.to_str().unwrap();
        let tag = format!("ph://{local_id}");
        let request = PhotoRequest::new(Size::NATURAL, 1.0, ResizeMode::Fill);
        let mut rx = library.request_image(&tag, local_id, request).await;
        let err = rx.recv().await.unwrap().result.unwrap_err();
        assert_eq!(err, LoadError::not_found(&tag));
    }
}
