use std::convert::TryFrom;

use bytes::{Buf, BufMut, Bytes};
use snafu::{ensure, OptionExt};
use uuid::Uuid;

use crate::encoding::{decode_headers, encode, encode_headers};
use crate::encoding::{Decode, Encode, Input, KeyValues, Output};
use crate::errors::{self, DecodeError, EncodeError};

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientMessage {
    ClientHandshake(ClientHandshake),
    AuthenticationSaslInitialResponse(SaslInitialResponse),
    AuthenticationSaslResponse(SaslResponse),
    Prepare(Prepare),
    DescribeStatement(DescribeStatement),
    Execute(Execute),
    OptimisticExecute(OptimisticExecute),
    ExecuteScript(ExecuteScript),
    Flush,
    Sync,
    Terminate,
    UnknownMessage(u8, Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHandshake {
    pub major_ver: u16,
    pub minor_ver: u16,
    pub params: Vec<(String, String)>,
    pub extensions: Vec<(String, KeyValues)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslInitialResponse {
    pub method: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslResponse {
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepare {
    pub headers: KeyValues,
    pub io_format: IoFormat,
    pub expected_cardinality: Cardinality,
    pub statement_name: Bytes,
    pub command_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeStatement {
    pub headers: KeyValues,
    pub aspect: DescribeAspect,
    pub statement_name: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute {
    pub headers: KeyValues,
    pub statement_name: Bytes,
    pub arguments: Bytes,
}

/// Combined prepare+execute sent when the client believes the server's
/// type descriptors are unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticExecute {
    pub headers: KeyValues,
    pub io_format: IoFormat,
    pub expected_cardinality: Cardinality,
    pub command_text: String,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
    pub arguments: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteScript {
    pub headers: KeyValues,
    pub script_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IoFormat {
    Binary = 0x62,
    Json = 0x6a,
    JsonElements = 0x4a,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cardinality {
    NoResult = 0x6e,
    AtMostOne = 0x6f,
    One = 0x41,
    Many = 0x6d,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeAspect {
    DataDescription = 0x54,
}

impl TryFrom<u8> for IoFormat {
    type Error = DecodeError;
    fn try_from(io_format: u8) -> Result<IoFormat, DecodeError> {
        match io_format {
            0x62 => Ok(IoFormat::Binary),
            0x6a => Ok(IoFormat::Json),
            0x4a => Ok(IoFormat::JsonElements),
            _ => errors::InvalidIoFormatSnafu { io_format }.fail(),
        }
    }
}

impl TryFrom<u8> for Cardinality {
    type Error = DecodeError;
    fn try_from(cardinality: u8) -> Result<Cardinality, DecodeError> {
        match cardinality {
            0x6e => Ok(Cardinality::NoResult),
            0x6f => Ok(Cardinality::AtMostOne),
            0x41 => Ok(Cardinality::One),
            0x6d => Ok(Cardinality::Many),
            _ => errors::InvalidCardinalitySnafu { cardinality }.fail(),
        }
    }
}

impl TryFrom<u8> for DescribeAspect {
    type Error = DecodeError;
    fn try_from(aspect: u8) -> Result<DescribeAspect, DecodeError> {
        match aspect {
            0x54 => Ok(DescribeAspect::DataDescription),
            _ => errors::InvalidAspectSnafu { aspect }.fail(),
        }
    }
}

impl Cardinality {
    pub fn is_optional(&self) -> bool {
        use Cardinality::*;
        match self {
            NoResult => true,
            AtMostOne => true,
            One => false,
            Many => true,
        }
    }
}

struct Empty;

impl Encode for Empty {
    fn encode(&self, _buf: &mut Output) -> Result<(), EncodeError> {
        Ok(())
    }
}

impl ClientMessage {
    pub fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        use ClientMessage::*;
        match self {
            ClientHandshake(h) => encode(buf, 0x56, h),
            AuthenticationSaslInitialResponse(h) => encode(buf, 0x70, h),
            AuthenticationSaslResponse(h) => encode(buf, 0x72, h),
            Prepare(h) => encode(buf, 0x50, h),
            DescribeStatement(h) => encode(buf, 0x44, h),
            Execute(h) => encode(buf, 0x45, h),
            OptimisticExecute(h) => encode(buf, 0x4f, h),
            ExecuteScript(h) => encode(buf, 0x51, h),
            Flush => encode(buf, 0x48, &Empty),
            Sync => encode(buf, 0x53, &Empty),
            Terminate => encode(buf, 0x58, &Empty),

            UnknownMessage(..) => errors::UnknownMessageCantBeEncodedSnafu.fail(),
        }
    }

    /// Decode exactly one frame from the buffer.
    ///
    /// This expects the full frame to already be in the buffer. Extra data
    /// after the frame payload is an error.
    pub fn decode(buf: &mut Input) -> Result<ClientMessage, DecodeError> {
        use self::ClientMessage as M;
        ensure!(buf.remaining() >= 5, errors::UnderflowSnafu);
        let data = &mut buf.slice(5..);
        let result = match buf[0] {
            0x56 => ClientHandshake::decode(data).map(M::ClientHandshake)?,
            0x70 => SaslInitialResponse::decode(data).map(M::AuthenticationSaslInitialResponse)?,
            0x72 => SaslResponse::decode(data).map(M::AuthenticationSaslResponse)?,
            0x50 => Prepare::decode(data).map(M::Prepare)?,
            0x44 => DescribeStatement::decode(data).map(M::DescribeStatement)?,
            0x45 => Execute::decode(data).map(M::Execute)?,
            0x4f => OptimisticExecute::decode(data).map(M::OptimisticExecute)?,
            0x51 => ExecuteScript::decode(data).map(M::ExecuteScript)?,
            0x48 => M::Flush,
            0x53 => M::Sync,
            0x58 => M::Terminate,
            mtype => M::UnknownMessage(mtype, data.copy_to_bytes(data.remaining())),
        };
        ensure!(data.remaining() == 0, errors::ExtraDataSnafu);
        Ok(result)
    }
}

impl Encode for ClientHandshake {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(8);
        buf.put_u16(self.major_ver);
        buf.put_u16(self.minor_ver);
        buf.put_u16(
            u16::try_from(self.params.len())
                .ok()
                .context(errors::TooManyParamsSnafu)?,
        );
        for (k, v) in &self.params {
            k.encode(buf)?;
            v.encode(buf)?;
        }
        buf.reserve(2);
        buf.put_u16(
            u16::try_from(self.extensions.len())
                .ok()
                .context(errors::TooManyExtensionsSnafu)?,
        );
        for (name, headers) in &self.extensions {
            name.encode(buf)?;
            encode_headers(headers, buf)?;
        }
        Ok(())
    }
}

impl Decode for ClientHandshake {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 8, errors::UnderflowSnafu);
        let major_ver = buf.get_u16();
        let minor_ver = buf.get_u16();
        let num_params = buf.get_u16();
        let mut params = Vec::with_capacity(num_params as usize);
        for _ in 0..num_params {
            params.push((String::decode(buf)?, String::decode(buf)?));
        }

        ensure!(buf.remaining() >= 2, errors::UnderflowSnafu);
        let num_ext = buf.get_u16();
        let mut extensions = Vec::with_capacity(num_ext as usize);
        for _ in 0..num_ext {
            let name = String::decode(buf)?;
            extensions.push((name, decode_headers(buf)?));
        }
        Ok(ClientHandshake {
            major_ver,
            minor_ver,
            params,
            extensions,
        })
    }
}

impl Encode for SaslInitialResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.method.encode(buf)?;
        self.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for SaslInitialResponse {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let method = String::decode(buf)?;
        let data = Bytes::decode(buf)?;
        Ok(SaslInitialResponse { method, data })
    }
}

impl Encode for SaslResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for SaslResponse {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let data = Bytes::decode(buf)?;
        Ok(SaslResponse { data })
    }
}

impl Encode for Prepare {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(&self.headers, buf)?;
        buf.reserve(2);
        buf.put_u8(self.io_format as u8);
        buf.put_u8(self.expected_cardinality as u8);
        self.statement_name.encode(buf)?;
        self.command_text.encode(buf)?;
        Ok(())
    }
}

impl Decode for Prepare {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        ensure!(buf.remaining() >= 2, errors::UnderflowSnafu);
        let io_format = TryFrom::try_from(buf.get_u8())?;
        let expected_cardinality = TryFrom::try_from(buf.get_u8())?;
        let statement_name = Bytes::decode(buf)?;
        let command_text = String::decode(buf)?;
        Ok(Prepare {
            headers,
            io_format,
            expected_cardinality,
            statement_name,
            command_text,
        })
    }
}

impl Encode for DescribeStatement {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(&self.headers, buf)?;
        buf.reserve(1);
        buf.put_u8(self.aspect as u8);
        self.statement_name.encode(buf)?;
        Ok(())
    }
}

impl Decode for DescribeStatement {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        ensure!(buf.remaining() >= 1, errors::UnderflowSnafu);
        let aspect = TryFrom::try_from(buf.get_u8())?;
        let statement_name = Bytes::decode(buf)?;
        Ok(DescribeStatement {
            headers,
            aspect,
            statement_name,
        })
    }
}

impl Encode for Execute {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(&self.headers, buf)?;
        self.statement_name.encode(buf)?;
        self.arguments.encode(buf)?;
        Ok(())
    }
}

impl Decode for Execute {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let statement_name = Bytes::decode(buf)?;
        let arguments = Bytes::decode(buf)?;
        Ok(Execute {
            headers,
            statement_name,
            arguments,
        })
    }
}

impl Encode for OptimisticExecute {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(&self.headers, buf)?;
        buf.reserve(2);
        buf.put_u8(self.io_format as u8);
        buf.put_u8(self.expected_cardinality as u8);
        self.command_text.encode(buf)?;
        self.input_typedesc_id.encode(buf)?;
        self.output_typedesc_id.encode(buf)?;
        self.arguments.encode(buf)?;
        Ok(())
    }
}

impl Decode for OptimisticExecute {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        ensure!(buf.remaining() >= 2, errors::UnderflowSnafu);
        let io_format = TryFrom::try_from(buf.get_u8())?;
        let expected_cardinality = TryFrom::try_from(buf.get_u8())?;
        let command_text = String::decode(buf)?;
        let input_typedesc_id = Uuid::decode(buf)?;
        let output_typedesc_id = Uuid::decode(buf)?;
        let arguments = Bytes::decode(buf)?;
        Ok(OptimisticExecute {
            headers,
            io_format,
            expected_cardinality,
            command_text,
            input_typedesc_id,
            output_typedesc_id,
            arguments,
        })
    }
}

impl Encode for ExecuteScript {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(&self.headers, buf)?;
        self.script_text.encode(buf)?;
        Ok(())
    }
}

impl Decode for ExecuteScript {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let script_text = String::decode(buf)?;
        Ok(ExecuteScript {
            headers,
            script_text,
        })
    }
}
