pub mod dto;
pub mod errors;
pub mod handlers;
#[cfg(test)]
pub mod memory_store;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use handlers::account_routes as router;
