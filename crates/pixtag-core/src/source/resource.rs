//! Generic resource collaborator: bundle files, file URLs, and data URIs.
//!
//! This is the sink for every tag no scheme rule claims, and the byte source
//! for local GIF tags.

use async_trait::async_trait;
use base64::Engine;
use std::path::PathBuf;

use crate::decode::decode_still;
use crate::types::DecodedImage;

const DATA_URL_PREFIX: &str = "data:";
const FILE_URL_PREFIX: &str = "file://";

/// Resolves tags that name local resources.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    /// Raw bytes of the resource, or `None` if it cannot be located.
    async fn read_bytes(&self, tag: &str) -> Option<Vec<u8>>;

    /// Decoded image for the resource, or `None` if it cannot be located or
    /// decoded.
    async fn resolve(&self, tag: &str) -> Option<DecodedImage> {
        let bytes = self.read_bytes(tag).await?;
        let tag = tag.to_string();
        tokio::task::spawn_blocking(move || match decode_still(&tag, &bytes) {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::debug!("Resource decode failed: {}", e);
                None
            }
        })
        .await
        .ok()
        .flatten()
    }
}

/// Resolves data URIs, `file://` URLs, absolute paths, and paths relative to
/// a bundle directory. A name without an extension also tries `NAME.png`.
pub struct BundleResolver {
    bundle_dir: PathBuf,
}

impl BundleResolver {
    pub fn new(bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_dir: bundle_dir.into(),
        }
    }

    /// Candidate file paths for `tag`, most specific first.
    fn candidates(&self, tag: &str) -> Vec<PathBuf> {
        let path = match tag.strip_prefix(FILE_URL_PREFIX) {
            Some(rest) => match percent_decode(rest) {
                Some(bytes) => PathBuf::from(String::from_utf8_lossy(&bytes).into_owned()),
                None => return Vec::new(),
            },
            None => PathBuf::from(tag),
        };
        let path = if path.is_absolute() {
            path
        } else {
            self.bundle_dir.join(path)
        };

        let mut candidates = vec![path.clone()];
        if path.extension().is_none() {
            candidates.push(path.with_extension("png"));
        }
        candidates
    }
}

#[async_trait]
impl ResourceResolver for BundleResolver {
    async fn read_bytes(&self, tag: &str) -> Option<Vec<u8>> {
        if tag.is_empty() {
            return None;
        }
        if let Some(rest) = tag.strip_prefix(DATA_URL_PREFIX) {
            return decode_data_url(rest);
        }

        for path in self.candidates(tag) {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    tracing::trace!("Resolved {} to {:?}", tag, path);
                    return Some(bytes);
                }
                Err(e) => tracing::trace!("  {:?}: {}", path, e),
            }
        }
        None
    }
}

/// Decode the part of a data URL after `data:` (RFC 2397).
fn decode_data_url(rest: &str) -> Option<Vec<u8>> {
    let (metadata, data) = rest.split_once(',')?;
    let is_base64 = metadata
        .split(';')
        .skip(1)
        .any(|param| param.trim().eq_ignore_ascii_case("base64"));

    if is_base64 {
        let cleaned: Vec<u8> = data
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| tracing::debug!("Invalid base64 in data URL: {e}"))
            .ok()
    } else {
        percent_decode(data)
    }
}

/// Percent-decode without treating '+' specially.
fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hi = (hex[0] as char).to_digit(16)?;
            let lo = (hex[1] as char).to_digit(16)?;
            out.push(((hi << 4) | lo) as u8);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}
