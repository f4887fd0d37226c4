use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;

use crate::kinds::error_name;
use crate::traits::ErrorKind;

/// Error object returned from any driver call
// This is a boxed error, because propagating through the call chain is
// faster when the error is just one pointer
pub struct Error(Box<Inner>);

struct Inner {
    code: u64,
    messages: Vec<Cow<'static, str>>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    headers: BTreeMap<u16, Bytes>,
}

impl Error {
    pub fn from_code(code: u64) -> Error {
        Error(Box::new(Inner {
            code,
            messages: Vec::new(),
            source: None,
            headers: BTreeMap::new(),
        }))
    }
    pub fn is<T: ErrorKind>(&self) -> bool {
        T::is_superclass_of(self.0.code)
    }
    pub fn context<S: Into<Cow<'static, str>>>(mut self, message: S) -> Error {
        self.0.messages.push(message.into());
        self
    }
    pub fn with_source<E>(mut self, source: E) -> Error
    where
        E: StdError + Send + Sync + 'static,
    {
        self.0.source = Some(Box::new(source));
        self
    }
    pub fn with_source_box(mut self, source: Box<dyn StdError + Send + Sync>) -> Error {
        self.0.source = Some(source);
        self
    }
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (u16, Bytes)>) -> Error {
        self.0.headers.extend(headers);
        self
    }
    pub fn code(&self) -> u64 {
        self.0.code
    }
    pub fn kind_name(&self) -> &'static str {
        error_name(self.0.code)
    }
    /// The message this error was originally created with
    pub fn initial_message(&self) -> Option<&str> {
        self.0.messages.first().map(|m| &m[..])
    }
    /// Attributes of the server `error_response` this error was built from
    pub fn headers(&self) -> &BTreeMap<u16, Bytes> {
        &self.0.headers
    }
    /// Changes the kind without touching message, source or headers
    ///
    /// Only used to refine a generic kind into a more specific subclass.
    pub fn refine_kind<T: ErrorKind>(mut self) -> Error {
        self.0.code = T::CODE;
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}: ", self.kind_name())?;
        }
        let mut first = true;
        for msg in self.0.messages.iter().rev() {
            if !first {
                write!(f, ": ")?;
            }
            write!(f, "{}", msg)?;
            first = false;
        }
        if let Some(source) = &self.0.source {
            if !first {
                write!(f, ": ")?;
            }
            write!(f, "{}", source)?;
            first = false;
        }
        if first {
            write!(f, "{}", self.kind_name())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind_name())?;
        for msg in self.0.messages.iter().rev() {
            write!(f, ": {}", msg)?;
        }
        if let Some(source) = &self.0.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0
            .source
            .as_ref()
            .map(|b| &**b as &(dyn StdError + 'static))
    }
}
