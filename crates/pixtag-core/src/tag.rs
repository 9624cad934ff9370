//! Tag classification.
//!
//! A tag is an opaque string naming an image. [`classify`] maps it to the
//! [`Source`] that knows how to load it by walking [`RULES`] top to bottom;
//! the first matching rule wins. The order is part of the contract: a tag
//! such as `ph://clip.gif` satisfies both the `ph://` prefix and the `.gif`
//! suffix rule and must load from the photo library.

use serde::Serialize;
use std::fmt;

pub const ASSETS_LIBRARY_SCHEME: &str = "assets-library://";
pub const PHOTOS_SCHEME: &str = "ph://";
pub const IMAGE_STORE_SCHEME: &str = "rct-image-store://";

/// Where a tag's image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// `assets-library://` asset URL, decoded on the serial queue
    AssetLibrary,
    /// `ph://` local identifier fetched through the photo library
    Photos,
    /// `http…` URL ending in `.gif`
    RemoteGif,
    /// Any other `http…` URL
    RemoteImage,
    /// `rct-image-store://` key into the in-process store
    ImageStore,
    /// Local file ending in `.gif`
    LocalGif,
    /// Bundle resource, file path, or data URI
    Resource,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssetLibrary => "asset-library",
            Self::Photos => "photos",
            Self::RemoteGif => "remote-gif",
            Self::RemoteImage => "remote-image",
            Self::ImageStore => "image-store",
            Self::LocalGif => "local-gif",
            Self::Resource => "resource",
        }
    }

    /// Sources fetched over the network.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteGif | Self::RemoteImage)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification rule.
pub struct Rule {
    pub matches: fn(&str) -> bool,
    pub source: Source,
}

fn has_gif_suffix(tag: &str) -> bool {
    let len = tag.len();
    len >= 4
        && tag.is_char_boundary(len - 4)
        && tag[len - 4..].eq_ignore_ascii_case(".gif")
}

fn is_http(tag: &str) -> bool {
    tag.starts_with("http")
}

/// Classification rules in priority order.
pub const RULES: &[Rule] = &[
    Rule {
        matches: |tag| tag.starts_with(ASSETS_LIBRARY_SCHEME),
        source: Source::AssetLibrary,
    },
    Rule {
        matches: |tag| tag.starts_with(PHOTOS_SCHEME),
        source: Source::Photos,
    },
    Rule {
        matches: |tag| is_http(tag) && has_gif_suffix(tag),
        source: Source::RemoteGif,
    },
    Rule {
        matches: is_http,
        source: Source::RemoteImage,
    },
    Rule {
        matches: |tag| tag.starts_with(IMAGE_STORE_SCHEME),
        source: Source::ImageStore,
    },
    Rule {
        matches: has_gif_suffix,
        source: Source::LocalGif,
    },
];

/// Classify a tag. Total: anything no rule claims is a [`Source::Resource`].
pub fn classify(tag: &str) -> Source {
    RULES
        .iter()
        .find(|rule| (rule.matches)(tag))
        .map(|rule| rule.source)
        .unwrap_or(Source::Resource)
}

/// The photo-library local identifier of a `ph://` tag.
pub fn photos_local_id(tag: &str) -> Option<&str> {
    tag.strip_prefix(PHOTOS_SCHEME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_prefixes() {
        assert_eq!(
            classify("assets-library://asset/asset.JPG?id=1&ext=JPG"),
            Source::AssetLibrary
        );
        assert_eq!(classify("ph://ABC-123/L0/001"), Source::Photos);
        assert_eq!(classify("rct-image-store://3"), Source::ImageStore);
    }

    #[test]
    fn test_remote_variants() {
        assert_eq!(classify("https://example.com/x.png"), Source::RemoteImage);
        assert_eq!(classify("http://example.com/anim.GIF"), Source::RemoteGif);
        assert_eq!(classify("httpfoo"), Source::RemoteImage);
    }

    #[test]
    fn test_prefixes_are_case_sensitive() {
        assert_eq!(classify("HTTP://example.com/x.png"), Source::Resource);
        assert_eq!(classify("PH://abc"), Source::Resource);
    }

    #[test]
    fn test_scheme_beats_gif_suffix() {
        assert_eq!(classify("ph://foo.gif"), Source::Photos);
        assert_eq!(classify("assets-library://a.gif"), Source::AssetLibrary);
        assert_eq!(classify("rct-image-store://1.gif"), Source::ImageStore);
    }

    #[test]
    fn test_local_gif_and_fallback() {
        assert_eq!(classify("spinner.GiF"), Source::LocalGif);
        assert_eq!(classify("/tmp/spinner.gif"), Source::LocalGif);
        assert_eq!(classify("logo"), Source::Resource);
        assert_eq!(classify(""), Source::Resource);
        assert_eq!(classify("data:image/png;base64,AAAA"), Source::Resource);
    }

    #[test]
    fn test_gif_suffix_on_multibyte_tag() {
        assert_eq!(classify("ü"), Source::Resource);
        assert_eq!(classify("émoji.gif"), Source::LocalGif);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for tag in ["ph://x", "http://a.gif", "b.gif", "c", "rct-image-store://k"] {
            assert_eq!(classify(tag), classify(tag));
        }
    }

    #[test]
    fn test_photos_local_id() {
        assert_eq!(photos_local_id("ph://ABC/L0/001"), Some("ABC/L0/001"));
        assert_eq!(photos_local_id("http://x"), None);
    }
}
