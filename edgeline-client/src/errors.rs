//! Errors that can be returned by the client
pub use edgeline_errors::{display, kinds::*, Error, ErrorKind, ResultExt};
