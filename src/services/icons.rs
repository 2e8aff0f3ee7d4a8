use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Image types accepted as campaign icons, detected from magic bytes.
pub const ALLOWED_ICON_MIMES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

#[async_trait]
pub trait IconStorage: Send + Sync {
    async fn save(&self, key: &str, data: Vec<u8>) -> Result<()>;
    async fn load(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub struct LocalIconStorage {
    root: PathBuf,
}

impl LocalIconStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are generated server side; anything path-like is rejected outright
        if key.is_empty()
            || key.contains(['/', '\\'])
            || key.starts_with('.')
            || Path::new(key).components().count() != 1
        {
            return Err(anyhow!("invalid icon key: {}", key));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl IconStorage for LocalIconStorage {
    async fn save(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).await?;
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        Ok(fs::read(path).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Checks size and content type, returning the detected MIME type and extension.
pub fn validate_icon(data: &[u8], max_size: usize) -> Result<(&'static str, &'static str)> {
    if data.is_empty() {
        return Err(anyhow!("Icon file is empty"));
    }
    if data.len() > max_size {
        return Err(anyhow!(
            "Icon size {} bytes exceeds maximum allowed {} bytes",
            data.len(),
            max_size
        ));
    }

    let kind = infer::get(data).ok_or_else(|| anyhow!("Unrecognized icon format"))?;
    if !ALLOWED_ICON_MIMES.contains(&kind.mime_type()) {
        return Err(anyhow!("Icon type {} is not allowed", kind.mime_type()));
    }
    Ok((kind.mime_type(), kind.extension()))
}

/// MIME type to serve a stored icon with, based on its file extension.
pub fn mime_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next().unwrap_or_default() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
