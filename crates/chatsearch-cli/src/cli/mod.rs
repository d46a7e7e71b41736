pub mod config;
pub mod output;
pub mod session;

pub use config::CliConfig;
pub use output::print_json;
pub use session::{run, SearchArgs, SessionCommand};
