//! # reelforge-core
//!
//! Core types and primitives for the ReelForge reel compiler.
//! This crate contains foundational types shared across all ReelForge crates:
//! the error taxonomy, time values, configuration, and content hashing.

pub mod config;
pub mod error;
pub mod hash;
pub mod time;

pub use config::*;

pub use error::{ReelError, ReelResult};
pub use time::{Duration, Timestamp};
