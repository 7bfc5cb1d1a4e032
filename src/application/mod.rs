pub mod artifacts;
pub mod error;
pub mod health;
pub mod invoker;
pub mod plugins;
pub mod render;
pub mod workspace;
