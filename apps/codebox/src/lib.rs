pub mod config;
pub mod runtime;
pub mod session;
pub mod surface;
pub mod telemetry;
pub mod terminal;
pub mod transport;

pub use codebox_proto as proto;
