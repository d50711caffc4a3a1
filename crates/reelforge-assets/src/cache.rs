//! On-disk cache of backend output, keyed by what was asked of which backend.
//!
//! Layout: `<root>/assets/{audio|images}/<sha256(backend|kind|text)>.<ext>`.
//! Image text also carries the variant and output size.

use std::path::{Path, PathBuf};

use reelforge_core::hash::hash_fields;
use reelforge_core::ReelResult;
use reelforge_ir::AssetType;

#[derive(Debug, Clone)]
pub struct AssetCache {
    root: PathBuf,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key(backend: &str, asset_type: AssetType, text: &str) -> String {
        hash_fields(&[backend, &asset_type.to_string(), text]).to_hex()
    }

    /// Image entries also depend on which variant was asked for and at what size.
    pub fn image_key(backend: &str, text: &str, variant: usize, width: u32, height: u32) -> String {
        Self::key(
            backend,
            AssetType::Image,
            &format!("{}#{}@{}x{}", text, variant, width, height),
        )
    }

    fn dir(&self, asset_type: AssetType) -> PathBuf {
        let sub = match asset_type {
            AssetType::Audio => "audio",
            AssetType::Image => "images",
        };
        self.root.join("assets").join(sub)
    }

    /// Existing entry for a key, whatever extension it was stored with.
    pub fn lookup(&self, asset_type: AssetType, key: &str) -> Option<PathBuf> {
        let entries = std::fs::read_dir(self.dir(asset_type)).ok()?;
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| {
                p.file_stem().and_then(|s| s.to_str()) == Some(key)
                    && p.extension().and_then(|e| e.to_str()) != Some("tmp")
            })
    }

    /// Write an entry via a temporary file so readers never see half a file.
    pub fn store(
        &self,
        asset_type: AssetType,
        key: &str,
        extension: &str,
        bytes: &[u8],
    ) -> ReelResult<PathBuf> {
        let dir = self.dir(asset_type);
        std::fs::create_dir_all(&dir)?;
        let out_path = dir.join(format!("{}.{}", key, extension));
        let tmp_path = out_path.with_extension("tmp");
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &out_path)?;
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_and_distinct() {
        let a = AssetCache::key("piper", AssetType::Audio, "hello");
        assert_eq!(a, AssetCache::key("piper", AssetType::Audio, "hello"));
        assert_ne!(a, AssetCache::key("openai", AssetType::Audio, "hello"));
        assert_ne!(a, AssetCache::key("piper", AssetType::Image, "hello"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_image_key_depends_on_size_and_variant() {
        let base = AssetCache::image_key("pexels", "city night", 0, 1080, 1920);
        assert_eq!(base, AssetCache::image_key("pexels", "city night", 0, 1080, 1920));
        assert_ne!(base, AssetCache::image_key("pexels", "city night", 0, 720, 1280));
        assert_ne!(base, AssetCache::image_key("pexels", "city night", 1, 1080, 1920));
    }

    #[test]
    fn test_store_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path());
        let key = AssetCache::key("pexels", AssetType::Image, "city night");
        assert!(cache.lookup(AssetType::Image, &key).is_none());

        let path = cache.store(AssetType::Image, &key, "jpg", b"jpeg bytes").unwrap();
        assert!(path.ends_with(format!("assets/images/{}.jpg", key)));
        assert_eq!(cache.lookup(AssetType::Image, &key), Some(path));
        assert!(cache.lookup(AssetType::Audio, &key).is_none());
    }
}
