pub mod api;
pub mod app;
pub mod assistant;
pub mod cart;
pub mod config;
pub mod library;
pub mod notice;
pub mod report;
pub mod session;
