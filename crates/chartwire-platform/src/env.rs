//! Environment variable abstraction and native implementation.
//!
//! Provides a platform-agnostic [`Environment`] trait so config discovery
//! can be tested with an in-memory map instead of the process environment.

/// Platform-agnostic environment variable access.
pub trait Environment: Send + Sync {
    /// Get the value of an environment variable, or `None` if it is not set.
    fn get_var(&self, name: &str) -> Option<String>;
}

/// Native environment implementation using [`std::env`].
pub struct NativeEnvironment;

impl Environment for NativeEnvironment {
    fn get_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}
