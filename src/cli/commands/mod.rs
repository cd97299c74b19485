pub mod config;
pub mod tenant;
