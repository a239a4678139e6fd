//! Precache Library
//!
//! Discovers Apple software updates, apps, installers and device firmware
//! from the vendor's update feeds and primes a local caching server by
//! requesting the selected items through it.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(USER_AGENT, "precache");
        assert_eq!(HTTP_TIMEOUT.as_secs(), 10);
    }

    #[test]
    fn test_error_types() {
        let app_error = AppError::Selection(errors::SelectionError::NoCriteria);

        assert_eq!(app_error.category(), "selection");
        assert!(!app_error.is_recoverable());
    }
}
