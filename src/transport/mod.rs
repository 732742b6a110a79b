//! Transport module - TCP connection handling.
//!
//! Provides:
//! - Host resolution and connect with optional timeouts
//! - A `Read` connection type owned by one receiver
//! - An out-of-band shutdown handle for unblocking a pending read

mod tcp;

pub use tcp::{
    connect, ConnectOptions, Connection, ShutdownHandle, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT,
};
