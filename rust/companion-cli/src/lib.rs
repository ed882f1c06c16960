mod cli;
pub use cli::*;

mod commands;
pub use commands::*;
