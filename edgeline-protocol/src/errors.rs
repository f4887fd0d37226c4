use std::str;

use snafu::{Backtrace, Snafu};

use crate::value::Value;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    #[snafu(display("unexpected end of frame"))]
    Underflow { backtrace: Backtrace },
    #[snafu(display("frame contains extra data"))]
    ExtraData { backtrace: Backtrace },
    #[snafu(display("invalid utf8 when decoding string: {}", source))]
    InvalidUtf8 {
        backtrace: Backtrace,
        source: str::Utf8Error,
    },
    #[snafu(display("invalid auth status: {:x}", auth_status))]
    AuthStatusInvalid {
        backtrace: Backtrace,
        auth_status: u32,
    },
    #[snafu(display("unsupported transaction state: {:x}", transaction_state))]
    InvalidTransactionState {
        backtrace: Backtrace,
        transaction_state: u8,
    },
    #[snafu(display("unsupported io format: {:x}", io_format))]
    InvalidIoFormat { backtrace: Backtrace, io_format: u8 },
    #[snafu(display("unsupported cardinality: {:x}", cardinality))]
    InvalidCardinality { backtrace: Backtrace, cardinality: u8 },
    #[snafu(display("unsupported describe aspect: {:x}", aspect))]
    InvalidAspect { backtrace: Backtrace, aspect: u8 },
    #[snafu(display("unsupported type descriptor: {:x}", descriptor))]
    InvalidTypeDescriptor {
        backtrace: Backtrace,
        descriptor: u8,
    },
    #[snafu(display("invalid uuid: {}", source))]
    InvalidUuid {
        backtrace: Backtrace,
        source: uuid::Error,
    },
    #[snafu(display("invalid bool encoding"))]
    InvalidBool { backtrace: Backtrace },
    #[snafu(display("invalid json format marker"))]
    InvalidJsonFormat { backtrace: Backtrace },
    #[snafu(display("invalid sign byte in numeric value"))]
    InvalidNumericSign { backtrace: Backtrace },
    #[snafu(display("duration contains non-zero days or months"))]
    NonZeroReservedBytes { backtrace: Backtrace },
    #[snafu(display("invalid element marker"))]
    InvalidMarker { backtrace: Backtrace },
    #[snafu(display("array shape is not supported"))]
    InvalidArrayShape { backtrace: Backtrace },
    #[snafu(display("set shape is not supported"))]
    InvalidSetShape { backtrace: Backtrace },
    #[snafu(display("invalid range flags"))]
    InvalidRangeFlags { backtrace: Backtrace },
    #[snafu(display("object size does not match its shape"))]
    ObjectSizeMismatch { backtrace: Backtrace },
    #[snafu(display("tuple size does not match its shape"))]
    TupleSizeMismatch { backtrace: Backtrace },
    #[snafu(display("enum value is not a member of the enumeration"))]
    ExtraEnumValue { backtrace: Backtrace },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum EncodeError {
    #[snafu(display("message doesn't fit 4GiB"))]
    MessageTooLong { backtrace: Backtrace },
    #[snafu(display("string is larger than 4GiB"))]
    StringTooLong { backtrace: Backtrace },
    #[snafu(display("more than 64Ki extensions"))]
    TooManyExtensions { backtrace: Backtrace },
    #[snafu(display("more than 64Ki headers"))]
    TooManyHeaders { backtrace: Backtrace },
    #[snafu(display("more than 64Ki params"))]
    TooManyParams { backtrace: Backtrace },
    #[snafu(display("more than 4Gi auth methods"))]
    TooManyMethods { backtrace: Backtrace },
    #[snafu(display("more than 4Gi elements"))]
    TooManyElements { backtrace: Backtrace },
    #[snafu(display("element is larger than 2GiB"))]
    ElementTooLong { backtrace: Backtrace },
    #[snafu(display("array is too long"))]
    ArrayTooLong { backtrace: Backtrace },
    #[snafu(display("numeric value has too many digits"))]
    BigIntTooLong { backtrace: Backtrace },
    #[snafu(display("value can not be encoded as {}: {}", codec, description))]
    InvalidValue {
        backtrace: Backtrace,
        codec: &'static str,
        description: String,
    },
    #[snafu(display("object values are received from the server and can not be encoded"))]
    ObjectAsArgument { backtrace: Backtrace },
    #[snafu(display("object shape does not match the codec"))]
    ObjectShapeMismatch { backtrace: Backtrace },
    #[snafu(display("tuple shape does not match the codec"))]
    TupleShapeMismatch { backtrace: Backtrace },
    #[snafu(display("enum value is not a member of the enumeration"))]
    MissingEnumValue { backtrace: Backtrace },
    #[snafu(display("unknown message types can't be encoded"))]
    UnknownMessageCantBeEncoded { backtrace: Backtrace },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum CodecError {
    #[snafu(display("type position {} is absent", position))]
    UnexpectedTypePos { backtrace: Backtrace, position: u16 },
    #[snafu(display("base scalar with uuid {} not found", uuid))]
    UndefinedBaseScalar {
        backtrace: Backtrace,
        uuid: uuid::Uuid,
    },
    #[snafu(display("too many descriptors ({})", index))]
    TooManyDescriptors { backtrace: Backtrace, index: usize },
}

pub(crate) fn invalid_value(codec: &'static str, val: &Value) -> EncodeError {
    // string payloads are quoted so messages read naturally
    let description = match val {
        Value::Str(s) => format!("{:?}", s),
        _ => format!("{:?}", val),
    };
    InvalidValueSnafu { codec, description }.build()
}
