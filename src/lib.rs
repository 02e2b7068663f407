//! # Bus Tracking
//!
//! WebSocket service pushing live trip progress to connected clients.

pub mod config;
pub mod http;
pub mod provider;
