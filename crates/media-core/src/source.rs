use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EndpointConfig;
use crate::kind::{self, AssetKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("invalid product id {0}: must be a positive integer")]
    InvalidProductId(i64),
}

/// Identifier of a product row. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ProductId(i64);

impl ProductId {
    pub fn new(id: i64) -> Result<Self, SourceError> {
        if id <= 0 {
            return Err(SourceError::InvalidProductId(id));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ProductId {
    type Error = SourceError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<ProductId> for i64 {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of binary payload a product row can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobKind {
    Image,
    Document,
}

impl BlobKind {
    fn endpoint_suffix(self) -> &'static str {
        match self {
            Self::Image => "img",
            Self::Document => "pdf",
        }
    }
}

impl From<BlobKind> for AssetKind {
    fn from(kind: BlobKind) -> Self {
        match kind {
            BlobKind::Image => AssetKind::Image,
            BlobKind::Document => AssetKind::Document,
        }
    }
}

/// Raw media fields of a product record.
///
/// String fields count as present only when they are non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMedia {
    pub id: ProductId,
    #[serde(default)]
    pub image_file: Option<String>,
    /// A binary image is stored in the database.
    #[serde(default)]
    pub image_data: bool,
    #[serde(default)]
    pub pdf_file: Option<String>,
    /// A binary document is stored in the database.
    #[serde(default)]
    pub pdf_data: bool,
    #[serde(default)]
    pub storage_url: Option<String>,
}

impl ProductMedia {
    pub fn new(id: ProductId) -> Self {
        Self {
            id,
            image_file: None,
            image_data: false,
            pdf_file: None,
            pdf_data: false,
            storage_url: None,
        }
    }

    pub fn with_image_file(mut self, path: impl Into<String>) -> Self {
        self.image_file = Some(path.into());
        self
    }

    pub fn with_image_data(mut self) -> Self {
        self.image_data = true;
        self
    }

    pub fn with_pdf_file(mut self, path: impl Into<String>) -> Self {
        self.pdf_file = Some(path.into());
        self
    }

    pub fn with_pdf_data(mut self) -> Self {
        self.pdf_data = true;
        self
    }

    pub fn with_storage_url(mut self, url: impl Into<String>) -> Self {
        self.storage_url = Some(url.into());
        self
    }
}

/// The concrete origin chosen for a product's visual asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    LocalFile { path: String },
    DatabaseBlob { product_id: ProductId, kind: BlobKind },
    ExternalUrl { url: String },
    None,
}

impl MediaSource {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// URL the asset is fetched from, before any cache-busting parameters.
    pub fn request_url(&self, kind: AssetKind, endpoints: &EndpointConfig) -> Option<String> {
        let origin = endpoints.origin.trim_end_matches('/');
        match self {
            Self::LocalFile { path } => {
                if is_absolute_http(path) {
                    Some(path.clone())
                } else if path.starts_with('/') {
                    Some(format!("{}{}", origin, path))
                } else {
                    Some(format!("{}/{}", origin, path))
                }
            }
            Self::DatabaseBlob { product_id, kind } => Some(format!(
                "{}/api/products/{}/{}",
                origin,
                product_id,
                kind.endpoint_suffix()
            )),
            Self::ExternalUrl { url } => {
                if endpoints.proxy_external_images && kind.renders_as_image() {
                    let encoded: String =
                        url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
                    Some(format!("{}/api/proxy/image?url={}", origin, encoded))
                } else {
                    Some(url.clone())
                }
            }
            Self::None => None,
        }
    }
}

fn is_absolute_http(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// A media source together with its inferred asset kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub source: MediaSource,
    pub kind: AssetKind,
}

impl ResolvedMedia {
    pub fn none() -> Self {
        Self {
            source: MediaSource::None,
            kind: AssetKind::Unknown,
        }
    }

    pub fn request_url(&self, endpoints: &EndpointConfig) -> Option<String> {
        self.source.request_url(self.kind, endpoints)
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Pick exactly one media source for a product.
///
/// Fields are evaluated in the fixed order
/// `image_file → image_data → pdf_file → pdf_data → storage_url`, stopping at
/// the first present one. Never fails: a product without media resolves to
/// [`MediaSource::None`].
pub fn resolve(product: &ProductMedia) -> ResolvedMedia {
    if let Some(path) = present(&product.image_file) {
        return ResolvedMedia {
            source: MediaSource::LocalFile {
                path: path.to_string(),
            },
            kind: AssetKind::Image,
        };
    }
    if product.image_data {
        return blob(product.id, BlobKind::Image);
    }
    if let Some(path) = present(&product.pdf_file) {
        return ResolvedMedia {
            source: MediaSource::LocalFile {
                path: path.to_string(),
            },
            kind: AssetKind::Document,
        };
    }
    if product.pdf_data {
        return blob(product.id, BlobKind::Document);
    }
    if let Some(url) = present(&product.storage_url) {
        return ResolvedMedia {
            source: MediaSource::ExternalUrl {
                url: url.to_string(),
            },
            kind: kind::classify(url),
        };
    }
    ResolvedMedia::none()
}

fn blob(product_id: ProductId, kind: BlobKind) -> ResolvedMedia {
    ResolvedMedia {
        source: MediaSource::DatabaseBlob { product_id, kind },
        kind: kind.into(),
    }
}
