pub mod app;
pub mod auth;
pub mod client;
pub mod conf;
pub mod dispatch;
pub mod document;
pub mod messaging;
pub mod server;
pub mod store;
pub mod trigger;
