mod operation;
mod show_config;

pub use operation::cmd_operation;
pub use show_config::cmd_show_config;
