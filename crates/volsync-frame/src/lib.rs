//! COBS framing and typed wire messages for volsync.
//!
//! Every message travels as one frame:
//! - a one-byte discriminant identifying the [`MessageKind`]
//! - the kind's fixed fields
//! - COBS byte stuffing, so the body never contains `0x00`
//! - a single `0x00` delimiter
//!
//! A receiver that loses sync simply drops bytes up to the next delimiter.

pub mod cobs;
pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod registry;
pub mod writer;

pub use codec::{FrameCodec, DEFAULT_MAX_FRAME, MAX_NAME_LEN};
pub use error::{FrameError, Result};
pub use message::{
    AddItem, Message, MessageKind, RemoveItem, Rgb, SetDefaultEndpoint, Settings, UpdateVolume,
    FLOW_CAPTURE, FLOW_RENDER,
};
pub use reader::FrameReader;
pub use registry::KindRegistry;
pub use writer::FrameWriter;
