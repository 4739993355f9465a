//! Wire protocol shared by the server and the client.

pub mod frame;
pub mod message;

pub use frame::{
    copy_exact, read_frame, read_frame_bounded, write_frame, DEFAULT_MAX_FRAME_BYTES,
};
pub use message::{error_from_wire, Request, Response};
