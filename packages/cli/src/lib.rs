pub mod commands;
pub mod config;
pub mod io;
pub mod logging;
