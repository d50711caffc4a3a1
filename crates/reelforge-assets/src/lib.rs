//! # reelforge-assets
//!
//! The Asset Resolution Layer. Every segment ends up with exactly one audio
//! clip and at least one image: each asset walks an ordered fallback chain of
//! backends (preferred, secondary) that always ends in a deterministic
//! placeholder, so a backend failure degrades the asset but never the run.

pub mod backend;
pub mod backends;
pub mod cache;
pub mod cancel;
pub mod error;
pub mod permit;
pub mod query;
pub mod resolver;
pub mod strategy;

pub use backend::{ImageFetcher, ImageGenerator, ImageRequest, Speech, SpeechBackend};
pub use cache::AssetCache;
pub use cancel::CancelToken;
pub use error::BackendError;
pub use permit::HeavyPermit;
pub use resolver::{AssetResolver, AssetWarning, Resolution};
pub use strategy::{Backends, ImageTier, SpeechTier};
