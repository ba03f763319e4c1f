//! Command handlers, one module per command group

pub mod book;
pub mod cache;
pub mod config;
pub mod post;
pub mod status;
