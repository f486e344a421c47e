// src/packages/mod.rs

//! Python package archive support
//!
//! This module turns downloaded archive file names into distribution
//! identities, reads sdist archives and builds wheels from them.

pub mod archive;
pub mod identity;
pub mod traits;
pub mod wheel;

pub use archive::SourceArchive;
pub use identity::{DistributionIdentity, canonicalize_name};
pub use traits::ArchiveIntrospector;
pub use wheel::WheelBuilder;
