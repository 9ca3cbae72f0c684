pub mod auth;
pub mod batch;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod storage;
pub mod testing;
pub mod types;
