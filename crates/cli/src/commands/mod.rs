pub mod config_cmd;
pub mod groups;
pub mod run;
