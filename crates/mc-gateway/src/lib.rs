//! mc-gateway: Network gateway in front of the machine controller
//!
//! Authenticated WebSocket clients call controller commands by name. Some
//! commands answer immediately; the rest are handed to the backend
//! executor, which completes them later and out of order. The gateway
//! tracks every such call against the connection that made it and
//! delivers exactly one reply when the executor reports back, or drops
//! the result if the connection has gone away in the meantime.

pub mod connection;
pub mod correlator;
pub mod dispatch;
pub mod executor;
pub mod server;
pub mod session;
pub mod state;

pub use correlator::{run_drain_loop, CallCorrelator};
pub use executor::ControllerSim;
pub use server::GatewayServer;
pub use session::SessionStore;
pub use state::GatewayState;
