//! Lobby Herald - lobby-watching notification service
//!
//! This crate continuously ingests transient game lobby listings from
//! external providers, reconciles each polling cycle against stored state
//! to detect lifecycle transitions, matches lobbies against user-defined
//! subscription rules, and dispatches rate-limited notification messages
//! on a chat platform.

pub mod chat;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod feeds;
pub mod matcher;
pub mod reconciler;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod template;
pub mod throttle;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{HeraldError, Result};
pub use types::*;

// Re-export key components
pub use dispatch::Dispatcher;
pub use feeds::LobbyGateway;
pub use reconciler::Reconciler;
pub use scheduler::{Scheduler, SingletonGuard};
pub use store::MemoryStore;
pub use template::TemplateEngine;
pub use throttle::RateLimiter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
