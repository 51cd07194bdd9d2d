//! Domain traits - Abstractions for infrastructure implementations

pub mod socket;

pub use socket::LiveSocket;
