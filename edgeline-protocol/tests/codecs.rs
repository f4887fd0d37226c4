use std::error::Error;
use std::sync::Arc;

use bytes::Bytes;

use edgeline_protocol::bignum::BigInt;
use edgeline_protocol::codec::{build_codec, Codec};
use edgeline_protocol::descriptors::{ArrayTypeDescriptor, BaseScalarTypeDescriptor};
use edgeline_protocol::descriptors::{Descriptor, ShapeElement, TypePos};
use edgeline_protocol::descriptors::{EnumerationTypeDescriptor, NamedTupleTypeDescriptor};
use edgeline_protocol::descriptors::{ObjectShapeDescriptor, RangeTypeDescriptor};
use edgeline_protocol::descriptors::{SetDescriptor, TupleElement, TupleTypeDescriptor};
use edgeline_protocol::range::Range;
use edgeline_protocol::time::Duration;
use edgeline_protocol::value::Value;

macro_rules! encoding_eq {
    ($codec: expr, $bytes: expr, $value: expr) => {
        let orig_value = $value;
        let value = decode($codec, $bytes)?;
        assert_eq!(value, orig_value);
        let mut bytes = bytes::BytesMut::new();
        $codec.encode(&mut bytes, &orig_value)?;
        let bytes = bytes.freeze();
        assert_eq!(&bytes[..], $bytes);
    };
}

fn decode(codec: &Arc<dyn Codec>, data: &[u8]) -> Result<Value, Box<dyn Error>> {
    Ok(codec.decode_bytes(data)?)
}

fn base_scalar(id: &str) -> Result<Arc<dyn Codec>, Box<dyn Error>> {
    let codec = build_codec(
        Some(TypePos(0)),
        &[Descriptor::BaseScalar(BaseScalarTypeDescriptor {
            id: id.parse()?,
        })],
    )?;
    Ok(codec)
}

#[test]
fn int16() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000103")?;
    encoding_eq!(&codec, b"\0\0", Value::Int16(0));
    encoding_eq!(&codec, b"\x01\x05", Value::Int16(0x105));
    encoding_eq!(&codec, b"\x7F\xFF", Value::Int16(i16::MAX));
    encoding_eq!(&codec, b"\x80\x00", Value::Int16(i16::MIN));
    encoding_eq!(&codec, b"\xFF\xFF", Value::Int16(-1));
    Ok(())
}

#[test]
fn int32() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000104")?;
    encoding_eq!(&codec, b"\0\0\0\0", Value::Int32(0));
    encoding_eq!(&codec, b"\0\0\x01\x05", Value::Int32(0x105));
    encoding_eq!(&codec, b"\x7F\xFF\xFF\xFF", Value::Int32(i32::MAX));
    encoding_eq!(&codec, b"\x80\x00\x00\x00", Value::Int32(i32::MIN));
    encoding_eq!(&codec, b"\xFF\xFF\xFF\xFF", Value::Int32(-1));
    Ok(())
}

#[test]
fn int64() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000105")?;
    encoding_eq!(&codec, b"\0\0\0\0\0\0\0\0", Value::Int64(0));
    encoding_eq!(
        &codec,
        b"\x7F\xFF\xFF\xFF\xFF\xFF\xFF\xFF",
        Value::Int64(i64::MAX)
    );
    encoding_eq!(&codec, b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF", Value::Int64(-1));
    Ok(())
}

#[test]
fn float32() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000106")?;
    encoding_eq!(&codec, b"\0\0\0\0", Value::Float32(0.0));
    encoding_eq!(&codec, b"\x80\0\0\0", Value::Float32(-0.0));
    encoding_eq!(&codec, b"?\x80\0\0", Value::Float32(1.0));
    encoding_eq!(&codec, b"?\0\0\0", Value::Float32(0.5));

    match decode(&codec, b"\x7f\xc0\0\0")? {
        Value::Float32(val) => assert!(val.is_nan()),
        _ => panic!("could not parse NaN"),
    };
    match decode(&codec, b"\x7f\x80\0\0")? {
        Value::Float32(val) => {
            assert!(val.is_infinite());
            assert!(val.is_sign_positive());
        }
        _ => panic!("could not parse +inf"),
    };
    match decode(&codec, b"\xff\x80\0\0")? {
        Value::Float32(val) => {
            assert!(val.is_infinite());
            assert!(val.is_sign_negative());
        }
        _ => panic!("could not parse -inf"),
    };
    Ok(())
}

#[test]
fn float64() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000107")?;
    encoding_eq!(&codec, b"\0\0\0\0\0\0\0\0", Value::Float64(0.0));
    encoding_eq!(&codec, b"?\xf0\0\0\0\0\0\0", Value::Float64(1.0));
    match decode(&codec, b"\x7f\xf8\0\0\0\0\0\0")? {
        Value::Float64(val) => assert!(val.is_nan()),
        _ => panic!("could not parse NaN"),
    };
    Ok(())
}

#[test]
fn str() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000101")?;
    encoding_eq!(&codec, b"hello", Value::Str("hello".into()));
    encoding_eq!(&codec, b"", Value::Str("".into()));
    encoding_eq!(
        &codec,
        b"\xd0\xbf\xd1\x80\xd0\xb8\xd0\xb2\xd0\xb5\xd1\x82",
        Value::Str("привет".into())
    );
    assert!(decode(&codec, b"\xff\xff").is_err());
    Ok(())
}

#[test]
fn bytes() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000102")?;
    encoding_eq!(
        &codec,
        b"hello",
        Value::Bytes(Bytes::from_static(b"hello"))
    );
    Ok(())
}

#[test]
fn bool() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000109")?;
    encoding_eq!(&codec, b"\x01", Value::Bool(true));
    encoding_eq!(&codec, b"\x00", Value::Bool(false));
    assert!(decode(&codec, b"\x02").is_err());
    Ok(())
}

#[test]
fn uuid() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000100")?;
    encoding_eq!(
        &codec,
        b"\xfe\x62\xd1\x50\xaf\x79\x11\xe9\x8a\xb7\x4f\x83\x22\xcf\xa3\x46",
        Value::Uuid("fe62d150-af79-11e9-8ab7-4f8322cfa346".parse()?)
    );
    Ok(())
}

#[test]
fn duration() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-00000000010e")?;
    encoding_eq!(
        &codec,
        b"\0\0\0\0\0\0\0\x05\0\0\0\0\0\0\0\0",
        Value::Duration(Duration::from_micros(5))
    );
    // days or months are never emitted by the server for std::duration
    assert!(decode(&codec, b"\0\0\0\0\0\0\0\x05\0\0\0\x01\0\0\0\0").is_err());
    Ok(())
}

#[test]
fn bigint() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000110")?;
    encoding_eq!(
        &codec,
        b"\0\x01\0\x01\0\0\0\0\0\x01",
        Value::BigInt(BigInt::from(10000i64))
    );
    encoding_eq!(
        &codec,
        b"\0\x01\0\0\x40\0\0\0\0\x05",
        Value::BigInt(BigInt::from(-5i64))
    );
    // sign must be 0x0000 or 0x4000
    assert!(decode(&codec, b"\0\x01\0\0\x20\0\0\0\0\x05").is_err());
    Ok(())
}

#[test]
fn array() -> Result<(), Box<dyn Error>> {
    let codec = build_codec(
        Some(TypePos(1)),
        &[
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000104".parse()?,
            }),
            Descriptor::Array(ArrayTypeDescriptor {
                id: "b0105467-a177-635f-e207-0a21867f9be0".parse()?,
                type_pos: TypePos(0),
                dimensions: vec![None],
            }),
        ],
    )?;
    encoding_eq!(
        &codec,
        b"\0\0\0\x01\0\0\0\0\0\0\0\0\
          \0\0\0\x03\0\0\0\x01\
          \0\0\0\x04\0\0\0\x01\
          \0\0\0\x04\0\0\0\x02\
          \0\0\0\x04\0\0\0\x03",
        Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)])
    );
    // an all-zeros envelope is the empty array whatever the element type
    encoding_eq!(
        &codec,
        b"\0\0\0\0\0\0\0\0\0\0\0\0",
        Value::Array(vec![])
    );
    Ok(())
}

#[test]
fn set() -> Result<(), Box<dyn Error>> {
    let codec = build_codec(
        Some(TypePos(1)),
        &[
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000105".parse()?,
            }),
            Descriptor::Set(SetDescriptor {
                id: "499ffd5f-f21e-574b-af8a-1c7c8e5e4e0a".parse()?,
                type_pos: TypePos(0),
            }),
        ],
    )?;
    encoding_eq!(
        &codec,
        b"\0\0\0\x01\0\0\0\0\0\0\0\0\
          \0\0\0\x02\0\0\0\x01\
          \0\0\0\x08\0\0\0\0\0\0\0\x0a\
          \0\0\0\x08\0\0\0\0\0\0\0\x14",
        Value::Set(vec![Value::Int64(10), Value::Int64(20)])
    );
    encoding_eq!(&codec, b"\0\0\0\0\0\0\0\0\0\0\0\0", Value::Set(vec![]));
    Ok(())
}

#[test]
fn empty_tuple() -> Result<(), Box<dyn Error>> {
    let codec = build_codec(
        Some(TypePos(0)),
        &[Descriptor::Tuple(TupleTypeDescriptor {
            id: "00000000-0000-0000-0000-0000000000ff".parse()?,
            element_types: vec![],
        })],
    )?;
    encoding_eq!(&codec, b"\0\0\0\0", Value::empty_tuple());
    Ok(())
}

#[test]
fn tuple() -> Result<(), Box<dyn Error>> {
    let codec = build_codec(
        Some(TypePos(2)),
        &[
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000104".parse()?,
            }),
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000101".parse()?,
            }),
            Descriptor::Tuple(TupleTypeDescriptor {
                id: "6c87a50e-9c5c-9d2f-7e34-22a3e2a34dd6".parse()?,
                element_types: vec![TypePos(0), TypePos(1)],
            }),
        ],
    )?;
    encoding_eq!(
        &codec,
        b"\0\0\0\x02\
          \0\0\0\0\0\0\0\x04\0\0\0\x01\
          \0\0\0\0\0\0\0\x05world",
        Value::Tuple(vec![Value::Int32(1), Value::Str("world".into())])
    );
    Ok(())
}

#[test]
fn named_tuple() -> Result<(), Box<dyn Error>> {
    let codec = build_codec(
        Some(TypePos(1)),
        &[
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000105".parse()?,
            }),
            Descriptor::NamedTuple(NamedTupleTypeDescriptor {
                id: "101385c1-d6b5-2c70-2b46-dbaf4c58bba5".parse()?,
                elements: vec![
                    TupleElement {
                        name: "a".into(),
                        type_pos: TypePos(0),
                    },
                    TupleElement {
                        name: "b".into(),
                        type_pos: TypePos(0),
                    },
                ],
            }),
        ],
    )?;
    let value = decode(
        &codec,
        b"\0\0\0\x02\
          \0\0\0\0\0\0\0\x08\0\0\0\0\0\0\0\x01\
          \0\0\0\0\0\0\0\x08\0\0\0\0\0\0\0\x02",
    )?;
    match &value {
        Value::NamedTuple { shape, fields } => {
            // addressable both by declared order and by name
            assert_eq!(fields[0], Value::Int64(1));
            assert_eq!(fields[1], Value::Int64(2));
            assert_eq!(shape.field_position("a"), Some(0));
            assert_eq!(shape.field_position("b"), Some(1));
            assert_eq!(shape.field_position("c"), None);
        }
        _ => panic!("expected named tuple, got {:?}", value),
    }
    let mut bytes = bytes::BytesMut::new();
    codec.encode(&mut bytes, &value)?;
    assert_eq!(
        &bytes[..],
        &b"\0\0\0\x02\
           \0\0\0\0\0\0\0\x08\0\0\0\0\0\0\0\x01\
           \0\0\0\0\0\0\0\x08\0\0\0\0\0\0\0\x02"[..]
    );
    Ok(())
}

#[test]
fn object() -> Result<(), Box<dyn Error>> {
    let codec = build_codec(
        Some(TypePos(2)),
        &[
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000100".parse()?,
            }),
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000101".parse()?,
            }),
            Descriptor::ObjectShape(ObjectShapeDescriptor {
                id: "5d5ebe41-eac8-eab7-a24e-cc3a8cd2766d".parse()?,
                elements: vec![
                    ShapeElement {
                        flag_implicit: true,
                        flag_link_property: false,
                        flag_link: false,
                        name: "id".into(),
                        type_pos: TypePos(0),
                    },
                    ShapeElement {
                        flag_implicit: false,
                        flag_link_property: false,
                        flag_link: false,
                        name: "title".into(),
                        type_pos: TypePos(1),
                    },
                ],
            }),
        ],
    )?;
    let value = decode(
        &codec,
        b"\0\0\0\x02\
          \0\0\0\0\0\0\0\x10\
          \xfe\x62\xd1\x50\xaf\x79\x11\xe9\x8a\xb7\x4f\x83\x22\xcf\xa3\x46\
          \0\0\0\0\0\0\0\x05hello",
    )?;
    match &value {
        Value::Object { shape, fields } => {
            assert_eq!(shape.elements.len(), 2);
            assert!(shape.elements[0].flag_implicit);
            assert_eq!(shape.elements[0].name, "id");
            assert!(!shape.elements[1].flag_implicit);
            assert_eq!(shape.elements[1].name, "title");
            assert_eq!(
                fields[0],
                Some(Value::Uuid("fe62d150-af79-11e9-8ab7-4f8322cfa346".parse()?))
            );
            assert_eq!(fields[1], Some(Value::Str("hello".into())));
        }
        _ => panic!("expected object, got {:?}", value),
    }
    // absent field decodes to None
    let value = decode(
        &codec,
        b"\0\0\0\x02\
          \0\0\0\0\0\0\0\x10\
          \xfe\x62\xd1\x50\xaf\x79\x11\xe9\x8a\xb7\x4f\x83\x22\xcf\xa3\x46\
          \0\0\0\0\xff\xff\xff\xff",
    )?;
    match &value {
        Value::Object { fields, .. } => assert_eq!(fields[1], None),
        _ => panic!("expected object"),
    }
    // objects never travel client to server
    let mut buf = bytes::BytesMut::new();
    assert!(codec.encode(&mut buf, &value).is_err());
    Ok(())
}

#[test]
fn enums() -> Result<(), Box<dyn Error>> {
    let codec = build_codec(
        Some(TypePos(0)),
        &[Descriptor::Enumeration(EnumerationTypeDescriptor {
            id: "ac5dc6a6-09e9-11ea-9c82-ffbc67e8fc17".parse()?,
            members: vec!["red".into(), "green".into()],
        })],
    )?;
    encoding_eq!(&codec, b"red", Value::Enum("red".into()));
    assert!(decode(&codec, b"blue").is_err());
    let mut buf = bytes::BytesMut::new();
    assert!(codec.encode(&mut buf, &Value::Enum("blue".into())).is_err());
    Ok(())
}

#[test]
fn range() -> Result<(), Box<dyn Error>> {
    let codec = build_codec(
        Some(TypePos(1)),
        &[
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000104".parse()?,
            }),
            Descriptor::Range(RangeTypeDescriptor {
                id: "51d9f426-cfd1-83f5-906f-540acac122ad".parse()?,
                type_pos: TypePos(0),
            }),
        ],
    )?;
    encoding_eq!(
        &codec,
        b"\x02\
          \0\0\0\x04\0\0\0\x01\
          \0\0\0\x04\0\0\0\x0a",
        Value::Range(Range::new(
            Some(Box::new(Value::Int32(1))),
            Some(Box::new(Value::Int32(10))),
            true,
            false,
        ))
    );
    encoding_eq!(&codec, b"\x01", Value::Range(Range::empty()));
    // unbounded above
    encoding_eq!(
        &codec,
        b"\x12\0\0\0\x04\0\0\0\x01",
        Value::Range(Range::new(Some(Box::new(Value::Int32(1))), None, true, false))
    );
    Ok(())
}

#[test]
fn encode_errors_name_the_type() -> Result<(), Box<dyn Error>> {
    let codec = base_scalar("00000000-0000-0000-0000-000000000106")?;
    let mut buf = bytes::BytesMut::new();
    let err = codec
        .encode(&mut buf, &Value::Str("something".into()))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "value can not be encoded as std::float32: \"something\""
    );
    assert_eq!(buf.len(), 0);
    Ok(())
}

#[test]
fn unknown_base_scalar() {
    let err = build_codec(
        Some(TypePos(0)),
        &[Descriptor::BaseScalar(BaseScalarTypeDescriptor {
            id: "6ed62a3e-0001-0001-0001-000000000001".parse().unwrap(),
        })],
    )
    .unwrap_err();
    assert!(err.to_string().contains("not found"));
}
