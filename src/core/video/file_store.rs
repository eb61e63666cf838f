//! 渲染帧存储 - 按 1 起始的序号保存/读取

use super::error::StoreError;
use image::{ImageFormat, RgbaImage};
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_FRAMES_FOLDER: &str = "RenderedImages";

pub trait FrameStore: Send + Sync {
    /// 覆盖写入同一序号的旧帧
    fn put(&self, index: u64, image: &RgbaImage) -> Result<(), StoreError>;

    /// 从未写入过的序号返回 None
    fn get(&self, index: u64) -> Option<RgbaImage>;
}

/// 每帧一个 PNG 文件：`<dir>/<index>.png`
pub struct DiskFrameStore {
    folder: PathBuf,
}

impl DiskFrameStore {
    /// 目录在第一次写入时才创建
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn in_documents(documents_dir: Option<&Path>, folder: &str) -> Result<Self, StoreError> {
        let documents_dir = documents_dir.ok_or(StoreError::NoDocumentDirectory)?;
        Ok(Self::new(documents_dir.join(folder)))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.folder.join(format!("{}.png", index))
    }
}

impl FrameStore for DiskFrameStore {
    fn put(&self, index: u64, image: &RgbaImage) -> Result<(), StoreError> {
        if !self.folder.exists() {
            std::fs::create_dir_all(&self.folder)?;
            debug!("Created frame folder {:?}", self.folder);
        }
        image.save_with_format(self.frame_path(index), ImageFormat::Png)?;
        Ok(())
    }

    fn get(&self, index: u64) -> Option<RgbaImage> {
        let path = self.frame_path(index);
        if !path.exists() {
            return None;
        }
        match image::open(&path) {
            Ok(img) => Some(img.to_rgba8()),
            Err(e) => {
                warn!("⚠️ Failed to load stored frame {:?}: {}", path, e);
                None
            }
        }
    }
}

/// 不需要跨进程持久化时使用
#[derive(Default)]
pub struct MemoryFrameStore {
    frames: Mutex<HashMap<u64, RgbaImage>>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, index: u64) -> Option<RgbaImage> {
        self.frames.lock().ok()?.remove(&index)
    }
}

impl FrameStore for MemoryFrameStore {
    fn put(&self, index: u64, image: &RgbaImage) -> Result<(), StoreError> {
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| StoreError::Io(std::io::Error::other("frame store lock poisoned")))?;
        frames.insert(index, image.clone());
        Ok(())
    }

    fn get(&self, index: u64) -> Option<RgbaImage> {
        self.frames.lock().ok()?.get(&index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value / 2, 255 - value, 255]))
    }

    #[test]
    fn test_disk_store_creates_folder_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFrameStore::new(dir.path().join(DEFAULT_FRAMES_FOLDER));
        assert!(!store.folder().exists());

        store.put(1, &solid(4, 4, 10)).unwrap();
        assert!(store.folder().exists());
        assert!(store.folder().join("1.png").exists());
    }

    #[test]
    fn test_disk_store_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFrameStore::new(dir.path().join("frames"));
        let mut img = solid(8, 6, 100);
        img.put_pixel(3, 2, Rgba([1, 2, 3, 4]));

        store.put(7, &img).unwrap();
        let loaded = store.get(7).unwrap();
        assert_eq!(loaded.dimensions(), (8, 6));
        assert_eq!(loaded.as_raw(), img.as_raw());
    }

    #[test]
    fn test_disk_store_overwrite_and_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFrameStore::new(dir.path().join("frames"));

        store.put(1, &solid(4, 4, 10)).unwrap();
        store.put(1, &solid(4, 4, 200)).unwrap();
        assert_eq!(store.get(1).unwrap().as_raw(), solid(4, 4, 200).as_raw());

        assert!(store.get(2).is_none());
        assert!(store.get(100).is_none());
    }

    #[test]
    fn test_disk_store_write_failure_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let store = DiskFrameStore::new(blocker.join("frames"));

        assert!(store.put(1, &solid(2, 2, 0)).is_err());
    }

    #[test]
    fn test_in_documents_requires_directory() {
        assert!(matches!(
            DiskFrameStore::in_documents(None, DEFAULT_FRAMES_FOLDER),
            Err(StoreError::NoDocumentDirectory)
        ));
        let store = DiskFrameStore::in_documents(Some(Path::new("/docs")), "frames").unwrap();
        assert_eq!(store.frame_path(3), PathBuf::from("/docs/frames/3.png"));
    }

    #[test]
    fn test_memory_store_semantics() {
        let store = MemoryFrameStore::new();
        assert!(store.is_empty());

        store.put(1, &solid(2, 2, 1)).unwrap();
        store.put(1, &solid(2, 2, 2)).unwrap();
        store.put(2, &solid(2, 2, 3)).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap().as_raw(), solid(2, 2, 2).as_raw());
        assert!(store.get(3).is_none());
        assert!(store.remove(2).is_some());
        assert!(store.get(2).is_none());
    }
}
