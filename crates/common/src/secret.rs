//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports types from the [`secrecy`] crate. Use these for upstream
//! credentials and any other value that must never reach a log line.
//!
//! `SecretString` implements `Debug` with redaction, so a struct that derives
//! `Debug` and holds one is safe to log with `{:?}` or as a tracing field.
//! Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct UpstreamCredentials {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let creds = UpstreamCredentials {
//!     username: "app-id".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("hunter2"));
//! assert_eq!(creds.password.expose_secret(), "hunter2");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("password123");
        assert_eq!(secret.expose_secret(), "password123");
    }

    #[test]
    fn test_clone_works() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}
