//! Starts logging before settings are known, then swaps in the configured filter.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
