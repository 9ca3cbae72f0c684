pub mod actions;
pub mod auth;
pub mod bulk;
pub mod data;
pub mod server;
