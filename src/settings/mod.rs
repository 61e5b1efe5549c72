//! Settings come from a TOML file (see `settings/dev.toml`) with `CADENCE__*`
//! environment variables layered on top, so secrets never need to live in the file.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
