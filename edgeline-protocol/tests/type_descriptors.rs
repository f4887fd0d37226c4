use std::error::Error;
use std::sync::Arc;

use bytes::Bytes;

use edgeline_protocol::codec::CodecRegistry;
use edgeline_protocol::descriptors::{Descriptor, RawTypedesc, TypePos, Typedesc};
use edgeline_protocol::encoding::Input;
use edgeline_protocol::features::ProtocolVersion;
use edgeline_protocol::value::Value;

fn parse(root_id: &str, data: &[u8]) -> Result<Typedesc, Box<dyn Error>> {
    let mut input = Input::new(ProtocolVersion::current(), Bytes::copy_from_slice(data));
    Ok(Typedesc::decode_with_id(root_id.parse()?, &mut input)?)
}

#[test]
fn base_scalar() -> Result<(), Box<dyn Error>> {
    let desc = parse(
        "00000000-0000-0000-0000-000000000105",
        b"\x02\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x05",
    )?;
    assert_eq!(desc.descriptors().len(), 1);
    assert_eq!(desc.root_pos(), Some(TypePos(0)));
    match &desc.descriptors()[0] {
        Descriptor::BaseScalar(d) => {
            assert_eq!(d.id, "00000000-0000-0000-0000-000000000105".parse::<uuid::Uuid>()?);
        }
        d => panic!("expected base scalar, got {:?}", d),
    }
    Ok(())
}

#[test]
fn array_references_earlier_position() -> Result<(), Box<dyn Error>> {
    let desc = parse(
        "b0105467-a177-635f-e207-0a21867f9be0",
        b"\x02\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x04\
          \x06\
          \xb0\x10\x54\x67\xa1\x77\x63\x5f\xe2\x07\x0a\x21\x86\x7f\x9b\xe0\
          \x00\x00\
          \x00\x01\xff\xff\xff\xff",
    )?;
    assert_eq!(desc.descriptors().len(), 2);
    assert_eq!(desc.root_pos(), Some(TypePos(1)));
    match &desc.descriptors()[1] {
        Descriptor::Array(d) => {
            assert_eq!(d.type_pos, TypePos(0));
            assert_eq!(d.dimensions, vec![None]);
        }
        d => panic!("expected array, got {:?}", d),
    }

    let registry = CodecRegistry::new();
    let codec = desc.build_codec(&registry)?;
    let value = codec.decode_bytes(
        b"\0\0\0\x01\0\0\0\0\0\0\0\0\
          \0\0\0\x01\0\0\0\x01\
          \0\0\0\x04\0\0\0\x07",
    )?;
    assert_eq!(value, Value::Array(vec![Value::Int32(7)]));
    Ok(())
}

#[test]
fn annotations_are_skipped() -> Result<(), Box<dyn Error>> {
    let desc = parse(
        "00000000-0000-0000-0000-000000000101",
        b"\x02\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x01\
          \xff\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x01\
          \x00\x00\x00\x08std::str",
    )?;
    assert_eq!(desc.descriptors().len(), 1);
    assert_eq!(desc.root_pos(), Some(TypePos(0)));
    Ok(())
}

#[test]
fn registry_is_idempotent() -> Result<(), Box<dyn Error>> {
    let raw = RawTypedesc {
        id: "b0105467-a177-635f-e207-0a21867f9be0".parse()?,
        data: Bytes::from_static(
            b"\x02\
              \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x04\
              \x06\
              \xb0\x10\x54\x67\xa1\x77\x63\x5f\xe2\x07\x0a\x21\x86\x7f\x9b\xe0\
              \x00\x00\
              \x00\x01\xff\xff\xff\xff",
        ),
    };
    let registry = CodecRegistry::new();
    let desc = raw.decode()?;
    let first = desc.build_codec(&registry)?;

    // every materialised codec lands in the cache under its type id
    assert!(registry.contains(&"00000000-0000-0000-0000-000000000104".parse()?));
    assert!(registry.contains(&"b0105467-a177-635f-e207-0a21867f9be0".parse()?));

    // re-running over the same blob returns the same codec identities
    let second = raw.decode()?.build_codec(&registry)?;
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

#[test]
fn unknown_tag_is_rejected() {
    let err = parse(
        "00000000-0000-0000-0000-000000000101",
        b"\x0b\
          \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x01",
    )
    .unwrap_err();
    assert!(err.to_string().contains("unsupported type descriptor"));
}
