//! Webpilot Gateway — HTTP + WebSocket API over running sessions

pub mod server;
pub mod ws;

pub use server::{start_gateway, GatewayOptions, GatewayState};
