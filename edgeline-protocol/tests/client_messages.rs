use std::error::Error;

use bytes::{Bytes, BytesMut};

use edgeline_protocol::client_message::{Cardinality, IoFormat};
use edgeline_protocol::client_message::{ClientHandshake, ClientMessage};
use edgeline_protocol::client_message::{DescribeAspect, DescribeStatement};
use edgeline_protocol::client_message::{Execute, ExecuteScript, OptimisticExecute, Prepare};
use edgeline_protocol::encoding::{Input, Output};
use edgeline_protocol::features::ProtocolVersion;

macro_rules! encoding_eq {
    ($message: expr, $bytes: expr) => {
        let data: &[u8] = $bytes;
        let mut input = Input::new(ProtocolVersion::current(), Bytes::copy_from_slice(data));
        assert_eq!(ClientMessage::decode(&mut input)?, $message);
        let mut bytes = BytesMut::new();
        let proto = ProtocolVersion::current();
        $message.encode(&mut Output::new(&proto, &mut bytes))?;
        let bytes = bytes.freeze();
        assert_eq!(&bytes[..], data);
    };
}

#[test]
fn client_handshake() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::ClientHandshake(ClientHandshake {
            major_ver: 0,
            minor_ver: 11,
            params: vec![],
            extensions: vec![],
        }),
        b"\x56\x00\x00\x00\x0C\x00\x00\x00\x0B\x00\x00\x00\x00"
    );
    encoding_eq!(
        ClientMessage::ClientHandshake(ClientHandshake {
            major_ver: 0,
            minor_ver: 11,
            params: vec![("user".into(), "edgedb".into())],
            extensions: vec![],
        }),
        b"\x56\x00\x00\x00\x1E\x00\x00\x00\x0B\x00\x01\
          \x00\x00\x00\x04user\x00\x00\x00\x06edgedb\
          \x00\x00"
    );
    Ok(())
}

#[test]
fn prepare() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::Prepare(Prepare {
            headers: Default::default(),
            io_format: IoFormat::Binary,
            expected_cardinality: Cardinality::Many,
            statement_name: Bytes::from_static(b""),
            command_text: "SELECT 1".into(),
        }),
        b"\x50\x00\x00\x00\x18\x00\x00\x62\x6d\
          \x00\x00\x00\x00\
          \x00\x00\x00\x08SELECT 1"
    );
    Ok(())
}

#[test]
fn describe_statement() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::DescribeStatement(DescribeStatement {
            headers: Default::default(),
            aspect: DescribeAspect::DataDescription,
            statement_name: Bytes::from_static(b""),
        }),
        b"\x44\x00\x00\x00\x0B\x00\x00\x54\x00\x00\x00\x00"
    );
    Ok(())
}

#[test]
fn execute() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::Execute(Execute {
            headers: Default::default(),
            statement_name: Bytes::from_static(b""),
            arguments: Bytes::from_static(b"\x00\x00\x00\x00"),
        }),
        b"\x45\x00\x00\x00\x12\x00\x00\
          \x00\x00\x00\x00\
          \x00\x00\x00\x04\x00\x00\x00\x00"
    );
    Ok(())
}

#[test]
fn optimistic_execute() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::OptimisticExecute(OptimisticExecute {
            headers: Default::default(),
            io_format: IoFormat::Binary,
            expected_cardinality: Cardinality::Many,
            command_text: "SELECT 1".into(),
            input_typedesc_id: "00000000-0000-0000-0000-0000000000ff".parse()?,
            output_typedesc_id: "00000000-0000-0000-0000-000000000105".parse()?,
            arguments: Bytes::from_static(b"\x00\x00\x00\x00"),
        }),
        b"\x4F\x00\x00\x00\x3C\x00\x00\x62\x6d\
          \x00\x00\x00\x08SELECT 1\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xff\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x05\
          \x00\x00\x00\x04\x00\x00\x00\x00"
    );
    Ok(())
}

#[test]
fn execute_script() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::ExecuteScript(ExecuteScript {
            headers: Default::default(),
            script_text: "COMMIT".into(),
        }),
        b"\x51\x00\x00\x00\x10\x00\x00\x00\x00\x00\x06COMMIT"
    );
    Ok(())
}

#[test]
fn bare_messages() -> Result<(), Box<dyn Error>> {
    encoding_eq!(ClientMessage::Flush, b"\x48\x00\x00\x00\x04");
    encoding_eq!(ClientMessage::Sync, b"\x53\x00\x00\x00\x04");
    encoding_eq!(ClientMessage::Terminate, b"\x58\x00\x00\x00\x04");
    Ok(())
}
