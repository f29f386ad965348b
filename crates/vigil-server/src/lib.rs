pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod middleware;
pub mod service;
pub mod state;
