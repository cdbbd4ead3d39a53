use std::fmt;

use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico", "avif", "tif", "tiff",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "rtf", "txt",
];

/// Hosts and path fragments that are known to serve images.
const IMAGE_KEYWORDS: &[&str] = &[
    "unsplash.com",
    "imgur.com",
    "cloudinary.com",
    "picsum.photos",
    "googleusercontent.com",
    "pexels.com",
    "pixabay.com",
    "/images/",
    "/image/",
    "/img/",
    "/photos/",
    "/thumbnails/",
];

const DOCUMENT_KEYWORDS: &[&str] = &[
    "docs.google.com",
    "/pdf/",
    "/pdfs/",
    "/documents/",
    "/datasheets/",
    "/manuals/",
];

/// Inferred category of a media asset, used to pick a rendering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Document,
    /// Rendered as an image.
    Unknown,
}

impl AssetKind {
    /// Whether the asset should go through the image rendering path.
    pub fn renders_as_image(self) -> bool {
        !matches!(self, Self::Document)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Document => write!(f, "document"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify an arbitrary URL as an image, a document, or unknown.
///
/// Extension match always wins over keyword match. Extensions are compared
/// case-insensitively; query string and fragment are ignored.
pub fn classify(url: &str) -> AssetKind {
    if let Some(ext) = extension(url) {
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return AssetKind::Image;
        }
        if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            return AssetKind::Document;
        }
    }

    let lower = url.to_ascii_lowercase();
    if IMAGE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return AssetKind::Image;
    }
    if DOCUMENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return AssetKind::Document;
    }

    AssetKind::Unknown
}

fn extension(url: &str) -> Option<String> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_any_case() {
        assert_eq!(classify("http://x/b.jpg"), AssetKind::Image);
        assert_eq!(classify("http://x/b.JPEG"), AssetKind::Image);
        assert_eq!(classify("/static/uploads/photo.WebP"), AssetKind::Image);
    }

    #[test]
    fn document_extensions() {
        assert_eq!(classify("http://cdn/doc.pdf"), AssetKind::Document);
        assert_eq!(classify("https://cdn/spec.DOCX"), AssetKind::Document);
    }

    #[test]
    fn query_and_fragment_ignored() {
        assert_eq!(classify("http://cdn/doc.pdf?v=3#page=2"), AssetKind::Document);
        assert_eq!(classify("http://cdn/file?name=a.pdf"), AssetKind::Unknown);
    }

    #[test]
    fn keyword_fallback() {
        assert_eq!(
            classify("https://images.unsplash.com/photo-1523275335684"),
            AssetKind::Image
        );
        assert_eq!(
            classify("https://docs.google.com/document/d/abc/export"),
            AssetKind::Document
        );
    }

    #[test]
    fn extension_beats_keyword() {
        assert_eq!(classify("https://cdn.example.com/images/manual.pdf"), AssetKind::Document);
        assert_eq!(classify("https://docs.google.com/preview.png"), AssetKind::Image);
    }

    #[test]
    fn defaults_to_unknown() {
        assert_eq!(classify("https://cdn.example.com/asset/12345"), AssetKind::Unknown);
        assert_eq!(classify(""), AssetKind::Unknown);
        assert_eq!(classify("https://example.com/.hidden"), AssetKind::Unknown);
    }

    #[test]
    fn unknown_renders_as_image() {
        assert!(AssetKind::Unknown.renders_as_image());
        assert!(AssetKind::Image.renders_as_image());
        assert!(!AssetKind::Document.renders_as_image());
    }
}
