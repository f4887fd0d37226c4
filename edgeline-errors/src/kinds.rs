use crate::traits::{ErrorKind, Sealed};

macro_rules! define {
    ($id:ident, $mask:expr, $code:expr) => {
        pub struct $id;

        impl Sealed for $id {
            const CODE: u64 = $code;
            fn is_superclass_of(code: u64) -> bool {
                code & $mask == $code
            }
        }

        impl ErrorKind for $id {}
    };
}

// Server-assigned families. The leading byte selects the family, deeper
// bytes select subclasses; a zero byte means "any subclass".
define!(InternalServerError, 0xFF_00_00_00, 0x01_00_00_00);
define!(UnsupportedFeatureError, 0xFF_00_00_00, 0x02_00_00_00);

define!(ProtocolError, 0xFF_00_00_00, 0x03_00_00_00);
define!(BinaryProtocolError, 0xFF_FF_00_00, 0x03_01_00_00);
define!(UnsupportedProtocolVersionError, 0xFF_FF_FF_FF, 0x03_01_00_01);
define!(TypeSpecNotFoundError, 0xFF_FF_FF_FF, 0x03_01_00_02);
define!(UnexpectedMessageError, 0xFF_FF_FF_FF, 0x03_01_00_03);
define!(ProtocolEncodingError, 0xFF_FF_00_00, 0x03_02_00_00);
define!(ProtocolOutOfOrderError, 0xFF_FF_00_00, 0x03_03_00_00);

define!(QueryError, 0xFF_00_00_00, 0x04_00_00_00);
define!(InvalidSyntaxError, 0xFF_FF_00_00, 0x04_01_00_00);
define!(InvalidTypeError, 0xFF_FF_00_00, 0x04_02_00_00);
define!(InvalidReferenceError, 0xFF_FF_00_00, 0x04_03_00_00);

define!(ExecutionError, 0xFF_00_00_00, 0x05_00_00_00);
define!(InvalidValueError, 0xFF_FF_00_00, 0x05_01_00_00);
define!(IntegrityError, 0xFF_FF_00_00, 0x05_02_00_00);
define!(CardinalityViolationError, 0xFF_FF_00_00, 0x05_03_00_00);

define!(ConfigurationError, 0xFF_00_00_00, 0x06_00_00_00);

define!(AccessError, 0xFF_00_00_00, 0x07_00_00_00);
define!(AuthenticationError, 0xFF_FF_00_00, 0x07_01_00_00);
define!(PasswordRequired, 0xFF_FF_FF_FF, 0x07_01_00_01);

// Client-side kinds live in the 0xFF family, which the server never sends.
define!(ClientError, 0xFF_00_00_00, 0xFF_00_00_00);
define!(ClientConnectionError, 0xFF_FF_00_00, 0xFF_01_00_00);
define!(ClientConnectionFailedError, 0xFF_FF_FF_00, 0xFF_01_01_00);
define!(ClientConnectionTimeoutError, 0xFF_FF_FF_00, 0xFF_01_02_00);
define!(ClientConnectionEosError, 0xFF_FF_FF_00, 0xFF_01_03_00);
define!(InterfaceError, 0xFF_FF_00_00, 0xFF_02_00_00);
define!(QueryArgumentError, 0xFF_FF_FF_00, 0xFF_02_01_00);
define!(MissingArgumentError, 0xFF_FF_FF_FF, 0xFF_02_01_01);
define!(UnknownArgumentError, 0xFF_FF_FF_FF, 0xFF_02_01_02);
define!(InvalidArgumentError, 0xFF_FF_FF_FF, 0xFF_02_01_03);
define!(ClientEncodingError, 0xFF_FF_FF_00, 0xFF_02_02_00);
define!(NoDataError, 0xFF_FF_00_00, 0xFF_03_00_00);
define!(ClientNoCredentialsError, 0xFF_FF_00_00, 0xFF_04_00_00);
define!(ClientInconsistentError, 0xFF_FF_00_00, 0xFF_05_00_00);

/// Name of the most specific kind matching a wire code
pub(crate) fn error_name(code: u64) -> &'static str {
    match code {
        0x03_01_00_01 => "UnsupportedProtocolVersionError",
        0x03_01_00_02 => "TypeSpecNotFoundError",
        0x03_01_00_03 => "UnexpectedMessageError",
        0x07_01_00_01 => "PasswordRequired",
        0xFF_02_01_01 => "MissingArgumentError",
        0xFF_02_01_02 => "UnknownArgumentError",
        0xFF_02_01_03 => "InvalidArgumentError",
        _ => match code & 0xFF_FF_FF_00 {
            0x03_01_00_00 => "BinaryProtocolError",
            0xFF_01_01_00 => "ClientConnectionFailedError",
            0xFF_01_02_00 => "ClientConnectionTimeoutError",
            0xFF_01_03_00 => "ClientConnectionEosError",
            0xFF_02_01_00 => "QueryArgumentError",
            0xFF_02_02_00 => "ClientEncodingError",
            _ => match code & 0xFF_FF_00_00 {
                0x03_02_00_00 => "ProtocolEncodingError",
                0x03_03_00_00 => "ProtocolOutOfOrderError",
                0x04_01_00_00 => "InvalidSyntaxError",
                0x04_02_00_00 => "InvalidTypeError",
                0x04_03_00_00 => "InvalidReferenceError",
                0x05_01_00_00 => "InvalidValueError",
                0x05_02_00_00 => "IntegrityError",
                0x05_03_00_00 => "CardinalityViolationError",
                0x07_01_00_00 => "AuthenticationError",
                0xFF_01_00_00 => "ClientConnectionError",
                0xFF_02_00_00 => "InterfaceError",
                0xFF_03_00_00 => "NoDataError",
                0xFF_04_00_00 => "ClientNoCredentialsError",
                0xFF_05_00_00 => "ClientInconsistentError",
                _ => match code & 0xFF_00_00_00 {
                    0x01_00_00_00 => "InternalServerError",
                    0x02_00_00_00 => "UnsupportedFeatureError",
                    0x03_00_00_00 => "ProtocolError",
                    0x04_00_00_00 => "QueryError",
                    0x05_00_00_00 => "ExecutionError",
                    0x06_00_00_00 => "ConfigurationError",
                    0x07_00_00_00 => "AccessError",
                    0xFF_00_00_00 => "ClientError",
                    _ => "UnknownError",
                },
            },
        },
    }
}
