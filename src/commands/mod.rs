mod config_cmd;
mod profile;
mod user;

pub use config_cmd::ConfigCommand;
pub use profile::ProfileCommand;
pub use user::UserCommand;

use clap::ValueEnum;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
