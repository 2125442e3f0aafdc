// src/lib.rs

pub mod config;
pub mod error;
pub mod gemini;
pub mod handlers;
pub mod routes;
pub mod sanitize;
pub mod state;

// Re-export specific items for convenience if needed
pub use routes::create_router;
