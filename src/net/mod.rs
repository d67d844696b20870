// Network module entry point
// Socket addresses, socket creation, and binding through the event engine

pub mod address;
pub mod bind;
pub mod engine;
pub mod socket;

pub use address::{normalize_wildcard, SocketAddress, UNKNOWN_ADDRESS};
pub use bind::{BindTarget, SocketBinder};
pub use engine::{Socket2Engine, SocketEngine};
pub use socket::{open_socket, open_stream_socket, raw_descriptor};
