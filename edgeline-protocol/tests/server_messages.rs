use std::error::Error;

use bytes::{Bytes, BytesMut};

use edgeline_protocol::client_message::Cardinality;
use edgeline_protocol::descriptors::RawTypedesc;
use edgeline_protocol::encoding::{Input, Output};
use edgeline_protocol::features::ProtocolVersion;
use edgeline_protocol::server_message::{Authentication, CommandComplete, CommandDataDescription};
use edgeline_protocol::server_message::{Data, ErrorResponse, ErrorSeverity};
use edgeline_protocol::server_message::{LogMessage, MessageSeverity, PrepareComplete};
use edgeline_protocol::server_message::{ReadyForCommand, ServerHandshake, ServerKeyData};
use edgeline_protocol::server_message::{ServerMessage, TransactionState};

macro_rules! encoding_eq {
    ($message: expr, $bytes: expr) => {
        let data: &[u8] = $bytes;
        let mut input = Input::new(ProtocolVersion::current(), Bytes::copy_from_slice(data));
        assert_eq!(ServerMessage::decode(&mut input)?, $message);
        let mut bytes = BytesMut::new();
        let proto = ProtocolVersion::current();
        $message.encode(&mut Output::new(&proto, &mut bytes))?;
        let bytes = bytes.freeze();
        assert_eq!(&bytes[..], data);
    };
}

#[test]
fn server_handshake() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::ServerHandshake(ServerHandshake {
            major_ver: 0,
            minor_ver: 11,
            extensions: vec![],
        }),
        b"\x76\x00\x00\x00\x0A\x00\x00\x00\x0B\x00\x00"
    );
    Ok(())
}

#[test]
fn authentication() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::Authentication(Authentication::Ok),
        b"\x52\x00\x00\x00\x08\x00\x00\x00\x00"
    );
    encoding_eq!(
        ServerMessage::Authentication(Authentication::Sasl {
            methods: vec!["SCRAM-SHA-256".into()],
        }),
        b"\x52\x00\x00\x00\x1D\x00\x00\x00\x0A\x00\x00\x00\x01\
          \x00\x00\x00\x0DSCRAM-SHA-256"
    );
    encoding_eq!(
        ServerMessage::Authentication(Authentication::SaslContinue {
            data: Bytes::from_static(b"data"),
        }),
        b"\x52\x00\x00\x00\x10\x00\x00\x00\x0B\x00\x00\x00\x04data"
    );
    encoding_eq!(
        ServerMessage::Authentication(Authentication::SaslFinal {
            data: Bytes::from_static(b"data"),
        }),
        b"\x52\x00\x00\x00\x10\x00\x00\x00\x0C\x00\x00\x00\x04data"
    );
    Ok(())
}

#[test]
fn server_key_data() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::ServerKeyData(ServerKeyData { data: [0u8; 32] }),
        &b"\x4b\x00\x00\x00\x24\
           \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\
           \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00"[..]
    );
    Ok(())
}

#[test]
fn ready_for_command() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::ReadyForCommand(ReadyForCommand {
            headers: Default::default(),
            transaction_state: TransactionState::NotInTransaction,
        }),
        b"\x5a\x00\x00\x00\x07\x00\x00\x49"
    );
    encoding_eq!(
        ServerMessage::ReadyForCommand(ReadyForCommand {
            headers: Default::default(),
            transaction_state: TransactionState::InFailedTransaction,
        }),
        b"\x5a\x00\x00\x00\x07\x00\x00\x45"
    );
    Ok(())
}

#[test]
fn prepare_complete() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::PrepareComplete(PrepareComplete {
            headers: Default::default(),
            cardinality: Cardinality::Many,
            input_typedesc_id: "00000000-0000-0000-0000-0000000000ff".parse()?,
            output_typedesc_id: "00000000-0000-0000-0000-000000000105".parse()?,
        }),
        b"\x31\x00\x00\x00\x27\x00\x00\x6d\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xff\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x05"
    );
    Ok(())
}

#[test]
fn command_data_description() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::CommandDataDescription(CommandDataDescription {
            headers: Default::default(),
            result_cardinality: Cardinality::AtMostOne,
            input: RawTypedesc {
                id: "00000000-0000-0000-0000-0000000000ff".parse()?,
                data: Bytes::from_static(b"\x04\
                    \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xff\
                    \x00\x00"),
            },
            output: RawTypedesc {
                id: "00000000-0000-0000-0000-000000000105".parse()?,
                data: Bytes::from_static(b"\x02\
                    \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x05"),
            },
        }),
        b"\x54\x00\x00\x00\x53\x00\x00\x6f\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xff\
          \x00\x00\x00\x13\x04\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xff\
          \x00\x00\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x05\
          \x00\x00\x00\x11\x02\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x05"
    );
    Ok(())
}

#[test]
fn data() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::Data(Data {
            data: vec![Bytes::from_static(b"\x3f\x00\x00\x00")],
        }),
        b"\x44\x00\x00\x00\x0E\x00\x01\x00\x00\x00\x04\x3f\x00\x00\x00"
    );
    Ok(())
}

#[test]
fn command_complete() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::CommandComplete(CommandComplete {
            headers: Default::default(),
            status_data: Bytes::from_static(b"SELECT"),
        }),
        b"\x43\x00\x00\x00\x10\x00\x00\x00\x00\x00\x06SELECT"
    );
    Ok(())
}

#[test]
fn error_response() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::ErrorResponse(ErrorResponse {
            severity: ErrorSeverity::Error,
            code: 0x_04_01_00_00,
            message: "msg".into(),
            attributes: Default::default(),
        }),
        b"\x45\x00\x00\x00\x12\x78\x04\x01\x00\x00\x00\x00\x00\x03msg\x00\x00"
    );
    Ok(())
}

#[test]
fn log_message() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::LogMessage(LogMessage {
            severity: MessageSeverity::Notice,
            code: 0xF0_00_00_00,
            text: "changes".into(),
            attributes: Default::default(),
        }),
        b"\x4c\x00\x00\x00\x16\x3c\xf0\x00\x00\x00\x00\x00\x00\x07changes\x00\x00"
    );
    Ok(())
}
