//! Client side: frame reassembly, pipelined connections and negotiated sessions.

pub mod connection;
pub mod frame;
pub mod session;

pub use connection::Connection;
pub use frame::FrameReader;
pub use session::Session;
