//! # Error Handling
//!
//! All errors that the driver produces are encapsulated into the [`Error`]
//! structure, which is a bit like `Box<dyn Error>` except it can only
//! contain driver error kinds.
//!
//! Each error kind is a marker struct implementing [`ErrorKind`]. Kinds are
//! used both to create errors and to check them:
//!
//! ```rust
//! # use edgeline_errors::{ClientConnectionTimeoutError, ClientConnectionError, ErrorKind};
//! let err = ClientConnectionTimeoutError::with_message("read timed out");
//! assert!(err.is::<ClientConnectionTimeoutError>());
//! assert!(err.is::<ClientConnectionError>());  // implied by the above
//! ```
//!
//! The hierarchy is encoded in the 32-bit wire code: leading bytes identify
//! the error family, so `is` works with any ancestor.
mod error;
mod traits;

pub mod display;
pub mod kinds;

pub use error::Error;
pub use kinds::*;
pub use traits::{ErrorKind, ResultExt};
