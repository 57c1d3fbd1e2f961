pub mod config;
pub mod initializer;
pub mod output;
pub mod schema;
pub mod target;
pub mod verify;
