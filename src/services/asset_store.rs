use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::dto::product::UploadedImage;
use crate::errors::ServiceError;

/// Namespace (sub-directory) product images are stored under
pub const PRODUCT_IMAGE_NAMESPACE: &str = "product-images";

/// Image formats accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Svg,
}

impl ImageKind {
    /// Detects the format from the file contents. SVG has no magic number,
    /// so it is accepted when the part is declared as SVG and contains an
    /// `<svg` element.
    pub fn detect(file: &UploadedImage) -> Option<Self> {
        let bytes = file.bytes.as_ref();

        let sniffed = infer::get(bytes).and_then(|kind| match kind.mime_type() {
            "image/jpeg" => Some(ImageKind::Jpeg),
            "image/png" | "image/apng" => Some(ImageKind::Png),
            "image/gif" => Some(ImageKind::Gif),
            "image/webp" => Some(ImageKind::Webp),
            "image/bmp" if has_bitmap_info_header(bytes) => Some(ImageKind::Bmp),
            _ => None,
        });
        if sniffed.is_some() {
            return sniffed;
        }

        let declared_svg = file
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.eq_ignore_ascii_case("image/svg+xml"))
            || file
                .file_name
                .as_deref()
                .is_some_and(|name| name.to_ascii_lowercase().ends_with(".svg"));
        if declared_svg && contains(bytes, b"<svg") {
            return Some(ImageKind::Svg);
        }

        None
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Bmp => "bmp",
            ImageKind::Webp => "webp",
            ImageKind::Svg => "svg",
        }
    }
}

/// A `BM` signature alone matches plenty of text; require the 14-byte file
/// header followed by a DIB header of a known size.
fn has_bitmap_info_header(bytes: &[u8]) -> bool {
    const DIB_HEADER_SIZES: [u32; 8] = [12, 16, 40, 52, 56, 64, 108, 124];

    bytes
        .get(14..18)
        .and_then(|size| size.try_into().ok())
        .map(u32::from_le_bytes)
        .is_some_and(|size| DIB_HEADER_SIZES.contains(&size) && bytes.len() >= 14 + size as usize)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

/// Persists uploaded files and hands back the path they are reachable under
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Stores `file` under `namespace` and returns its path relative to the
    /// public storage root, e.g. `product-images/<uuid>.png`.
    async fn store(
        &self,
        file: &UploadedImage,
        kind: ImageKind,
        namespace: &str,
    ) -> Result<String, ServiceError>;
}

/// Writes assets to a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn store(
        &self,
        file: &UploadedImage,
        kind: ImageKind,
        namespace: &str,
    ) -> Result<String, ServiceError> {
        let dir = self.root.join(namespace);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            error!(dir = %dir.display(), "Failed to create asset directory: {}", e);
            ServiceError::AssetStorageError(e.to_string())
        })?;

        let file_name = format!("{}.{}", Uuid::new_v4().simple(), kind.extension());
        let target = dir.join(&file_name);
        debug!(target = %target.display(), size = file.bytes.len(), "Writing asset");

        tokio::fs::write(&target, &file.bytes).await.map_err(|e| {
            error!(target = %target.display(), "Failed to write asset: {}", e);
            ServiceError::AssetStorageError(e.to_string())
        })?;

        let path = format!("{}/{}", namespace, file_name);
        info!(path = %path, "Asset stored");
        Ok(path)
    }
}
