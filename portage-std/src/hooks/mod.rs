//! Standard invocation hooks.

pub mod timeout;

pub use timeout::{TimeoutWatch, Watched};
