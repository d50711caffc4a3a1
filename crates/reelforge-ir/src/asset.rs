use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Conventional id for the `ordinal`-th asset of a kind within a segment.
    pub fn for_segment(asset_type: AssetType, segment_index: usize, ordinal: usize) -> Self {
        Self(format!("{}:{:03}:{}", asset_type, segment_index, ordinal))
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Audio,
    Image,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Audio => write!(f, "audio"),
            AssetType::Image => write!(f, "image"),
        }
    }
}

/// Where an asset's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Generated,
    Fetched,
    Placeholder,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Generated => write!(f, "generated"),
            SourceKind::Fetched => write!(f, "fetched"),
            SourceKind::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// A concrete audio or image artifact bound to a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub asset_type: AssetType,
    /// Index of the owning segment.
    pub segment_index: usize,
    pub source: SourceKind,
    /// Content handle on disk.
    pub path: PathBuf,
    /// Name of the backend that produced the content.
    pub backend: String,
    /// Realized playback length, for audio assets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Asset {
    pub fn audio(
        segment_index: usize,
        source: SourceKind,
        path: impl Into<PathBuf>,
        duration: f64,
    ) -> Self {
        Self {
            id: AssetId::for_segment(AssetType::Audio, segment_index, 0),
            asset_type: AssetType::Audio,
            segment_index,
            source,
            path: path.into(),
            backend: String::new(),
            duration: Some(duration),
        }
    }

    pub fn image(
        segment_index: usize,
        ordinal: usize,
        source: SourceKind,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: AssetId::for_segment(AssetType::Image, segment_index, ordinal),
            asset_type: AssetType::Image,
            segment_index,
            source,
            path: path.into(),
            backend: String::new(),
            duration: None,
        }
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.source == SourceKind::Placeholder
    }
}

/// All assets resolved for a run, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetSet {
    assets: Vec<Asset>,
}

impl AssetSet {
    pub fn new() -> Self {
        Self { assets: Vec::new() }
    }

    /// Register an asset. Returns its id.
    pub fn register(&mut self, asset: Asset) -> AssetId {
        let id = asset.id.clone();
        self.assets.push(asset);
        id
    }

    pub fn get(&self, id: &AssetId) -> Option<&Asset> {
        self.assets.iter().find(|a| &a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn count(&self) -> usize {
        self.assets.len()
    }

    /// Assets of one type owned by a segment, in registration order.
    pub fn for_segment(
        &self,
        segment_index: usize,
        asset_type: AssetType,
    ) -> impl Iterator<Item = &Asset> {
        self.assets
            .iter()
            .filter(move |a| a.segment_index == segment_index && a.asset_type == asset_type)
    }

    pub fn count_for(&self, segment_index: usize, asset_type: AssetType) -> usize {
        self.for_segment(segment_index, asset_type).count()
    }

    /// The single audio clip of a segment, if resolved.
    pub fn audio_for(&self, segment_index: usize) -> Option<&Asset> {
        self.for_segment(segment_index, AssetType::Audio).next()
    }

    pub fn images_for(&self, segment_index: usize) -> Vec<&Asset> {
        self.for_segment(segment_index, AssetType::Image).collect()
    }

    /// Realized audio durations for segments `0..segments`, falling back to
    /// `planned` when a segment has no audio duration recorded.
    pub fn realized_durations(&self, planned: &[f64]) -> Vec<f64> {
        planned
            .iter()
            .enumerate()
            .map(|(i, &p)| self.audio_for(i).and_then(|a| a.duration).unwrap_or(p))
            .collect()
    }

    pub fn placeholder_count(&self) -> usize {
        self.assets.iter().filter(|a| a.is_placeholder()).count()
    }
}

impl FromIterator<Asset> for AssetSet {
    fn from_iter<I: IntoIterator<Item = Asset>>(iter: I) -> Self {
        Self {
            assets: iter.into_iter().collect(),
        }
    }
}
