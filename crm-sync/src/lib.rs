pub mod cli;
pub mod load_config;
pub mod sheets;
pub mod square;
pub mod token;

pub use cli::{run, Cli, Commands};
