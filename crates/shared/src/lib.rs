pub mod errors;
pub mod types;

pub use errors::{AppError, AppResult, DomainError};
pub use types::*;
