//! Session authentication helpers.

pub mod refresh;

pub use refresh::{RefreshCoordinator, RefreshExchange};
