//! Duet core library — signaling gateway, room pairing state machine,
//! and wire protocol used by the server binary.

pub mod config;
pub mod gateway;
