use std::borrow::Cow;
use std::error::Error as StdError;

use crate::error::Error;

pub trait Sealed {
    const CODE: u64;
    fn is_superclass_of(code: u64) -> bool;
}

/// Trait that marks driver error kinds
///
/// Kinds are marker structs: they carry no data themselves and exist to
/// construct and classify [`Error`] values.
pub trait ErrorKind: Sealed {
    fn build() -> Error {
        Error::from_code(Self::CODE)
    }
    fn with_message<S: Into<Cow<'static, str>>>(message: S) -> Error {
        Error::from_code(Self::CODE).context(message)
    }
    fn with_source<E>(source: E) -> Error
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::from_code(Self::CODE).with_source(source)
    }
    fn with_source_box(source: Box<dyn StdError + Send + Sync>) -> Error {
        Error::from_code(Self::CODE).with_source_box(source)
    }
}

pub trait ResultExt<T> {
    fn context<S: Into<Cow<'static, str>>>(self, message: S) -> Result<T, Error>;
    fn with_context<S, F>(self, f: F) -> Result<T, Error>
    where
        S: Into<Cow<'static, str>>,
        F: FnOnce() -> S;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn context<S: Into<Cow<'static, str>>>(self, message: S) -> Result<T, Error> {
        self.map_err(|e| e.context(message))
    }
    fn with_context<S, F>(self, f: F) -> Result<T, Error>
    where
        S: Into<Cow<'static, str>>,
        F: FnOnce() -> S,
    {
        self.map_err(|e| e.context(f()))
    }
}
