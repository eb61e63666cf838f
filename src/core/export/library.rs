//! 导出到媒体库

use super::error::ExportError;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authorization {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

pub trait MediaLibrary: Send + Sync {
    fn request_authorization(&self) -> Authorization;

    /// 返回视频在媒体库中的位置
    fn save_video(&self, path: &Path) -> Result<PathBuf, ExportError>;
}

/// 先申请权限再保存；拒绝即终止，不重试
pub fn export_video(library: &dyn MediaLibrary, path: &Path) -> Result<PathBuf, ExportError> {
    match library.request_authorization() {
        Authorization::Authorized => {
            let saved = library.save_video(path)?;
            info!("✅ Successfully saved {:?}", saved);
            Ok(saved)
        }
        Authorization::Denied => {
            error!("❌ Photo permission denied");
            Err(ExportError::PermissionDenied)
        }
        Authorization::Restricted => {
            error!("❌ Photo library access restricted");
            Err(ExportError::Restricted)
        }
        Authorization::NotDetermined => Err(ExportError::NotDetermined),
    }
}

/// 以目录模拟的媒体库
pub struct FolderLibrary {
    root: PathBuf,
    authorization: Authorization,
}

impl FolderLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            authorization: Authorization::Authorized,
        }
    }

    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unique_destination(&self, file_name: &str) -> PathBuf {
        let candidate = self.root.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{}", ext)),
            None => (file_name, String::new()),
        };
        (1u32..)
            .map(|n| self.root.join(format!("{}_{}{}", stem, n, ext)))
            .find(|p| !p.exists())
            .unwrap_or(candidate)
    }
}

impl MediaLibrary for FolderLibrary {
    fn request_authorization(&self) -> Authorization {
        self.authorization
    }

    fn save_video(&self, path: &Path) -> Result<PathBuf, ExportError> {
        if !path.is_file() {
            return Err(ExportError::MissingFile(path.display().to_string()));
        }
        std::fs::create_dir_all(&self.root)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        let destination = self.unique_destination(&file_name);
        std::fs::copy(path, &destination)?;
        Ok(destination)
    }
}
