pub mod cli;
pub mod config;
pub mod error;
pub mod fileroot;
pub mod task;
pub mod utils;
pub mod views;
