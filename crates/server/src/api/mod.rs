pub mod convert;
pub mod error;
pub mod handlers;
pub mod media_fetch;
pub mod middleware;
pub mod routes;

pub use routes::create_router;
