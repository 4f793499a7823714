pub mod config;
pub mod directions;
pub mod info;
pub mod sample;
