// src/lib.rs

//! freeze-requirements
//!
//! Freezes pip requirements files into deterministic, pinned requirements,
//! reconciling the versions they resolve to across files.
//!
//! # Architecture
//!
//! - Identity from archive names: distributions are known by the file names
//!   pip downloads, no metadata is read
//! - Highest version wins: versions are ordered leniently and the highest
//!   one is pinned everywhere
//! - Content-addressed cache: downloads are remembered per requirements file
//!   content in SQLite and invalidated by distribution name on conflicts
//! - Bounded retries: conflicts that survive invalidation fail the run

pub mod cache;
pub mod config;
pub mod db;
mod error;
pub mod formatter;
pub mod manifest;
pub mod packages;
pub mod repository;
pub mod resolver;
pub mod version;

pub use error::{Error, Result};
