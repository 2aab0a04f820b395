pub mod app;
pub mod card;
pub mod catalog;
pub mod config;
pub mod error;
pub mod output;
pub mod sdgapi;
pub mod store;
pub mod taxonomy;
