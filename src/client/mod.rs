//! Client for the vidforge session protocol: a request/response
//! [`Connection`] with a local segment cache, and the [`PlaybackScheduler`]
//! that prefetches segments through it.

mod connection;
pub mod scheduler;

pub use connection::{cached_segment_path, ClientOptions, Connection};
pub use scheduler::{
    seek_target, Availability, Available, BufferPair, FetchFailure, PlaybackEvent, PlaybackPlan,
    PlaybackScheduler, SeekTarget, SegmentSource,
};
