use bytes::Buf;
use snafu::ensure;

use crate::errors::{self, DecodeError};

/// Cursor over a single value's payload with helpers for the element
/// envelopes composite codecs use
pub struct Reader<'t> {
    raw: Option<&'t [u8]>,
}

impl<'t> std::fmt::Debug for Reader<'t> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Reader ")?;
        match self.raw {
            Some(raw) => {
                f.write_fmt(format_args!("{:x?}", raw))?;
            }
            None => {
                f.write_str("errored")?;
            }
        }
        Ok(())
    }
}

impl<'t> Reader<'t> {
    pub fn from_bytes(bytes: &'t [u8]) -> Self {
        Reader { raw: Some(bytes) }
    }

    fn error<E>(&mut self, e: E) -> E {
        self.raw = None;
        e
    }

    fn len(&self) -> usize {
        self.raw_bytes().len()
    }

    pub fn remaining(&self) -> usize {
        self.len()
    }

    /// Finish reading; leftover bytes are a protocol violation
    pub fn complete(self) -> Result<(), DecodeError> {
        ensure!(self.len() == 0, errors::ExtraDataSnafu);
        Ok(())
    }

    fn raw_bytes(&self) -> &'t [u8] {
        self.raw.expect("attempt to access an errored reader")
    }

    fn raw_mut(&mut self) -> &mut &'t [u8] {
        self.raw.as_mut().expect("attempt to access an errored reader")
    }

    pub fn as_slice(&self) -> &'t [u8] {
        self.raw_bytes()
    }

    /// Consume and return everything that's left
    pub fn take_rest(&mut self) -> &'t [u8] {
        let buf = self.raw_mut();
        let rest = *buf;
        *buf = &[];
        rest
    }

    fn split(&mut self, position: usize) -> Result<Self, DecodeError> {
        ensure!(self.len() >= position, self.error(errors::UnderflowSnafu));
        let buf = self.raw_mut();
        let result = Reader::from_bytes(&buf[..position]);
        buf.advance(position);
        Ok(result)
    }

    pub fn get_u8(&mut self) -> Result<u8, DecodeError> {
        ensure!(self.len() >= 1, self.error(errors::UnderflowSnafu));
        Ok(self.raw_mut().get_u8())
    }
    pub fn get_i16(&mut self) -> Result<i16, DecodeError> {
        ensure!(self.len() >= 2, self.error(errors::UnderflowSnafu));
        Ok(self.raw_mut().get_i16())
    }
    pub fn get_u16(&mut self) -> Result<u16, DecodeError> {
        ensure!(self.len() >= 2, self.error(errors::UnderflowSnafu));
        Ok(self.raw_mut().get_u16())
    }
    pub fn get_i32(&mut self) -> Result<i32, DecodeError> {
        ensure!(self.len() >= 4, self.error(errors::UnderflowSnafu));
        Ok(self.raw_mut().get_i32())
    }
    pub fn get_u32(&mut self) -> Result<u32, DecodeError> {
        ensure!(self.len() >= 4, self.error(errors::UnderflowSnafu));
        Ok(self.raw_mut().get_u32())
    }
    pub fn get_i64(&mut self) -> Result<i64, DecodeError> {
        ensure!(self.len() >= 8, self.error(errors::UnderflowSnafu));
        Ok(self.raw_mut().get_i64())
    }
    pub fn get_f32(&mut self) -> Result<f32, DecodeError> {
        ensure!(self.len() >= 4, self.error(errors::UnderflowSnafu));
        Ok(self.raw_mut().get_f32())
    }
    pub fn get_f64(&mut self) -> Result<f64, DecodeError> {
        ensure!(self.len() >= 8, self.error(errors::UnderflowSnafu));
        Ok(self.raw_mut().get_f64())
    }

    /// Element of an object row: `i32 reserved`, `i32 length` where `-1`
    /// marks an absent field
    pub fn read_object_element(&mut self) -> Result<Option<Self>, DecodeError> {
        ensure!(self.len() >= 8, self.error(errors::UnderflowSnafu));
        let buf = self.raw_mut();
        let _reserved = buf.get_i32();
        let len = buf.get_i32();
        if len < 0 {
            ensure!(len == -1, self.error(errors::InvalidMarkerSnafu));
            return Ok(None);
        }
        let len = len as usize;
        Ok(Some(self.split(len)?))
    }

    pub fn read_tuple_element(&mut self) -> Result<Self, DecodeError> {
        ensure!(self.len() >= 8, self.error(errors::UnderflowSnafu));
        let buf = self.raw_mut();
        let _reserved = buf.get_i32();
        let len = buf.get_i32();
        ensure!(len >= 0, self.error(errors::InvalidMarkerSnafu));
        self.split(len as usize)
    }

    pub fn read_array_like_element(&mut self) -> Result<Self, DecodeError> {
        ensure!(self.len() >= 4, self.error(errors::UnderflowSnafu));
        let len = self.raw_mut().get_i32();
        ensure!(len >= 0, self.error(errors::InvalidMarkerSnafu));
        self.split(len as usize)
    }

    pub fn read_tuple_like_header(&mut self) -> Result<usize, DecodeError> {
        ensure!(self.len() >= 4, self.error(errors::UnderflowSnafu));
        Ok(self.raw_mut().get_u32() as usize)
    }

    /// Array/set envelope. `ndims == 0` is the empty sequence regardless of
    /// the element type; only one-dimensional arrays with lower bound 1 are
    /// supported otherwise.
    pub fn read_array_like_header(
        &mut self,
        ensure_shape: impl Fn(bool) -> Result<(), DecodeError>,
    ) -> Result<usize, DecodeError> {
        ensure!(self.len() >= 12, self.error(errors::UnderflowSnafu));
        let buf = self.raw_mut();
        let ndims = buf.get_u32();
        let _reserved0 = buf.get_u32();
        let _reserved1 = buf.get_u32();
        if ndims == 0 {
            return Ok(0);
        }
        ensure_shape(ndims == 1)?;
        ensure!(self.len() >= 8, self.error(errors::UnderflowSnafu));
        let buf = self.raw_mut();
        let size = buf.get_u32() as usize;
        let lower = buf.get_u32();
        ensure_shape(lower == 1)?;
        Ok(size)
    }
}
