pub mod calculate_conservation;
pub mod get_args;
pub mod run_commands;
