//! Service coordination
//!
//! Wires together the feed gateway, store, dispatcher, reconciler, and
//! scheduler into a running application.

pub mod app;

pub use app::AppState;
