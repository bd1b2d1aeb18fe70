//! Image hosting and attachment resolution.
//!
//! Search engines only accept public URLs, so every inbound attachment is
//! normalized to a still image and pushed to an [`ImageHost`] once. Hosted
//! files are addressed by the transport's stable per-file id, which lets a
//! re-submitted attachment reuse its existing URL without another upload.

use crate::chat::Attachment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Durable, content-addressed image storage.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn file_exists(&self, name: &str) -> Result<bool>;

    async fn get_url(&self, name: &str) -> Result<String>;

    /// Store `bytes` under `name` and return the public URL.
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String>;
}

/// Fetches an attachment from the transport and normalizes it to a still
/// image (sticker conversion, video frame extraction).
#[async_trait]
pub trait AttachmentResolver: Send + Sync {
    async fn fetch_image(&self, attachment: &Attachment) -> Result<Vec<u8>, ResolveError>;
}

/// Why an attachment could not be turned into a hosted image.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Input the bot knowingly rejects; the message is shown to the user.
    #[error("{0}")]
    Unsupported(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stable hosted filename for an attachment.
pub fn stable_filename(attachment: &Attachment) -> String {
    let extension = match attachment {
        Attachment::Sticker { .. } => "png",
        _ => "jpg",
    };
    format!("{}.{}", attachment.file().unique_id, extension)
}

/// Replace attachments the engines cannot take directly with a searchable
/// stand-in, or reject them outright.
fn normalize(attachment: &Attachment, max_video_bytes: u64) -> Result<Attachment, ResolveError> {
    match attachment {
        Attachment::Sticker { animated: true, .. } => Err(ResolveError::Unsupported(
            "Animated stickers are not supported.".to_string(),
        )),
        Attachment::Video { file, thumbnail } | Attachment::DocumentVideo { file, thumbnail } => {
            // Transports cap downloads; fall back to the thumbnail for
            // oversized videos instead of failing the whole search.
            if file.size.unwrap_or(0) > max_video_bytes {
                match thumbnail {
                    Some(thumbnail) => Ok(Attachment::Photo(thumbnail.clone())),
                    None => Err(ResolveError::Unsupported(
                        "This video is too large to search and has no preview image.".to_string(),
                    )),
                }
            } else {
                Ok(attachment.clone())
            }
        }
        other => Ok(other.clone()),
    }
}

/// Resolve an attachment into a stable hosted image URL.
///
/// The host is checked first so re-submissions never re-download or
/// re-upload anything.
pub async fn attachment_to_url(
    resolver: &dyn AttachmentResolver,
    host: &dyn ImageHost,
    attachment: &Attachment,
    max_video_bytes: u64,
) -> Result<String, ResolveError> {
    let attachment = normalize(attachment, max_video_bytes)?;
    let filename = stable_filename(&attachment);

    if host
        .file_exists(&filename)
        .await
        .context("image host lookup failed")?
    {
        return Ok(host
            .get_url(&filename)
            .await
            .context("image host URL lookup failed")?);
    }

    let bytes = resolver.fetch_image(&attachment).await?;
    let url = host
        .upload(bytes, &filename)
        .await
        .context("image upload failed")?;
    Ok(url)
}

/// Manifest entry written for every hosted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedImage {
    pub filename: String,
    /// Content hash (SHA256)
    pub content_hash: String,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// Filesystem-backed [`ImageHost`] serving files from a static base URL.
///
/// Suitable for deployments that put the data directory behind any static
/// file server, and for tests.
pub struct DirectoryHost {
    root_dir: String,
    base_url: String,
}

impl DirectoryHost {
    pub fn new(root_dir: &str, base_url: &str) -> Result<Self> {
        fs::create_dir_all(format!("{}/images", root_dir))
            .context("cannot create image directory")?;
        Ok(Self {
            root_dir: root_dir.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn image_path(&self, name: &str) -> String {
        format!("{}/images/{}", self.root_dir, name)
    }

    fn append_manifest(&self, entry: &HostedImage) -> Result<()> {
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(format!("{}/hosted.jsonl", self.root_dir))?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }
}

#[async_trait]
impl ImageHost for DirectoryHost {
    async fn file_exists(&self, name: &str) -> Result<bool> {
        Ok(Path::new(&self.image_path(name)).exists())
    }

    async fn get_url(&self, name: &str) -> Result<String> {
        Ok(format!("{}/{}", self.base_url, name))
    }

    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let content_hash = format!("{:x}", hasher.finalize());

        fs::write(self.image_path(name), &bytes).context("cannot write image file")?;
        self.append_manifest(&HostedImage {
            filename: name.to_string(),
            content_hash,
            size_bytes: bytes.len(),
            uploaded_at: Utc::now(),
        })?;

        self.get_url(name).await
    }
}
