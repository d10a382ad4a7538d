pub mod handlers;
pub mod services;

pub use handlers::uploads_router as router;
