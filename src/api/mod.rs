pub mod error;
pub mod response;
pub mod routes;

pub use error::ApiError;
pub use routes::{create_router, AppState};
