//! Vidforge-Common: shared types and utilities.
//!
//! - **Errors**: the unified [`Error`] type and its wire codes
//! - **IDs**: the [`VideoId`] newtype
//! - **Quality**: the eight-level rendition ladder
//! - **Paths**: where uploads, renditions and thumbnails live on disk
//!
//! # Examples
//!
//! ```
//! use vidforge_common::{Quality, VideoId};
//! use vidforge_common::paths::segment_path;
//! use std::path::Path;
//!
//! let ladder = Quality::ladder_for_height(480);
//! assert_eq!(ladder.last(), Some(&Quality::P480));
//!
//! let path = segment_path(Path::new("/data"), VideoId::new(1), Quality::P480, 0);
//! assert!(path.ends_with("480p/1_3_0.mp4"));
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod quality;

pub use error::{Error, Result};
pub use ids::VideoId;
pub use quality::{EncodingProfile, Quality, UnknownQuality};
