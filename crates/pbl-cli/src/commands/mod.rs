pub mod config;
pub mod console;
pub mod demo;
pub mod status;
