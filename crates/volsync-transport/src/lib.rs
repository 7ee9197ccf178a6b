//! Byte-stream link abstraction for volsync.
//!
//! The control surface is reached over an ordered byte stream. On the host
//! this is a Unix domain socket, either served directly by the device bridge
//! or by a serial-line forwarder. This is the lowest layer of volsync;
//! framing and the connection lifecycle build on the [`LinkStream`] type
//! provided here.

pub mod discovery;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use discovery::{Discovery, Endpoint, SocketDiscovery};
pub use error::{Result, TransportError};
pub use traits::LinkStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
