//! Collaborators the loader dispatches to.
//!
//! Each source is a trait plus one reference implementation.

pub mod photos;
pub mod remote;
pub mod resource;
pub mod store;

pub use photos::{
    AssetRepresentation, ContentMode, DirectoryPhotoLibrary, FileAsset, PhotoDelivery,
    PhotoLibrary, PhotoRequest, PhotoTarget,
};
pub use remote::{FetchImageRequest, HttpFetcher, ProgressFn, RemoteFetcher};
pub use resource::{BundleResolver, ResourceResolver};
pub use store::{ImageStore, MemoryImageStore};
