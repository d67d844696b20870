// Server module entry point
// Client port reconciliation and daemon signal handling

pub mod port_parser;
pub mod ports;
pub mod signal;

// Re-export commonly used types
pub use port_parser::{expand_ports, PortParser};
pub use ports::{FailedPort, ListeningSocket, PortReconciler, PortStatus, ReconcileReport};
pub use signal::{ControlEvent, SignalHandler};
