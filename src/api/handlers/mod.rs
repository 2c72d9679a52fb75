pub mod auth;
pub mod books;
pub mod cart;
pub mod chat;
pub mod collections;
pub mod library;
pub mod pages;
pub mod profile;
