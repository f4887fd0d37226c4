use std::collections::{HashMap, HashSet};
use std::convert::{TryFrom, TryInto};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use bytes::{BufMut, Bytes, BytesMut};
use snafu::{ensure, OptionExt};
use uuid::Uuid as UuidVal;

use crate::bignum;
use crate::descriptors::{self, Descriptor, TypePos};
use crate::errors::{self, invalid_value, CodecError, DecodeError, EncodeError};
use crate::range;
use crate::serialization::Reader;
use crate::time;
use crate::value::Value;

pub const STD_UUID: UuidVal = UuidVal::from_u128(0x100);
pub const STD_STR: UuidVal = UuidVal::from_u128(0x101);
pub const STD_BYTES: UuidVal = UuidVal::from_u128(0x102);
pub const STD_INT16: UuidVal = UuidVal::from_u128(0x103);
pub const STD_INT32: UuidVal = UuidVal::from_u128(0x104);
pub const STD_INT64: UuidVal = UuidVal::from_u128(0x105);
pub const STD_FLOAT32: UuidVal = UuidVal::from_u128(0x106);
pub const STD_FLOAT64: UuidVal = UuidVal::from_u128(0x107);
pub const STD_DECIMAL: UuidVal = UuidVal::from_u128(0x108);
pub const STD_BOOL: UuidVal = UuidVal::from_u128(0x109);
pub const STD_DATETIME: UuidVal = UuidVal::from_u128(0x10a);
pub const CAL_LOCAL_DATETIME: UuidVal = UuidVal::from_u128(0x10b);
pub const CAL_LOCAL_DATE: UuidVal = UuidVal::from_u128(0x10c);
pub const CAL_LOCAL_TIME: UuidVal = UuidVal::from_u128(0x10d);
pub const STD_DURATION: UuidVal = UuidVal::from_u128(0x10e);
pub const STD_JSON: UuidVal = UuidVal::from_u128(0x10f);
pub const STD_BIGINT: UuidVal = UuidVal::from_u128(0x110);

/// Empty tuple, the input type of queries without parameters
pub const EMPTY_TUPLE: UuidVal = UuidVal::from_u128(0xFF);

pub trait Codec: fmt::Debug + Send + Sync + 'static {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError>;
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue(Arc<str>);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectShape(Arc<ObjectShapeInfo>);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTupleShape(Arc<NamedTupleShapeInfo>);

#[derive(Debug, PartialEq, Eq)]
pub struct ObjectShapeInfo {
    pub elements: Vec<ShapeElement>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ShapeElement {
    pub flag_implicit: bool,
    pub flag_link_property: bool,
    pub flag_link: bool,
    pub name: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct NamedTupleShapeInfo {
    pub elements: Vec<TupleElement>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TupleElement {
    pub name: String,
}

impl ObjectShape {
    pub fn new(elements: Vec<ShapeElement>) -> ObjectShape {
        ObjectShape(Arc::new(ObjectShapeInfo { elements }))
    }
}

impl Deref for ObjectShape {
    type Target = ObjectShapeInfo;
    fn deref(&self) -> &ObjectShapeInfo {
        &self.0
    }
}

impl NamedTupleShape {
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.0.elements.iter().position(|e| e.name == name)
    }
}

impl Deref for NamedTupleShape {
    type Target = NamedTupleShapeInfo;
    fn deref(&self) -> &NamedTupleShapeInfo {
        &self.0
    }
}

impl From<&str> for EnumValue {
    fn from(s: &str) -> EnumValue {
        EnumValue(s.into())
    }
}

impl Deref for EnumValue {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a [descriptors::ShapeElement]> for ObjectShape {
    fn from(shape: &'a [descriptors::ShapeElement]) -> ObjectShape {
        ObjectShape(Arc::new(ObjectShapeInfo {
            elements: shape
                .iter()
                .map(|e| ShapeElement {
                    flag_implicit: e.flag_implicit,
                    flag_link_property: e.flag_link_property,
                    flag_link: e.flag_link,
                    name: e.name.clone(),
                })
                .collect(),
        }))
    }
}

impl<'a> From<&'a [descriptors::TupleElement]> for NamedTupleShape {
    fn from(shape: &'a [descriptors::TupleElement]) -> NamedTupleShape {
        NamedTupleShape(Arc::new(NamedTupleShapeInfo {
            elements: shape
                .iter()
                .map(|e| TupleElement {
                    name: e.name.clone(),
                })
                .collect(),
        }))
    }
}

impl dyn Codec {
    pub fn decode_value(&self, mut buf: Reader) -> Result<Value, DecodeError> {
        let result = Codec::decode(self, &mut buf)?;
        buf.complete()?;
        Ok(result)
    }
    pub fn decode_bytes(&self, data: &[u8]) -> Result<Value, DecodeError> {
        self.decode_value(Reader::from_bytes(data))
    }
}

/// Process-wide codec cache keyed by the server-assigned type id
///
/// Two codecs with the same type id are behaviourally identical, so
/// materialising the same descriptor blob twice yields the same codec
/// instances.
#[derive(Debug)]
pub struct CodecRegistry {
    codecs: Mutex<HashMap<UuidVal, Arc<dyn Codec>>>,
}

impl CodecRegistry {
    pub fn new() -> CodecRegistry {
        CodecRegistry {
            codecs: Mutex::new(HashMap::new()),
        }
    }
    pub fn get(&self, id: &UuidVal) -> Option<Arc<dyn Codec>> {
        self.lock().get(id).cloned()
    }
    pub fn contains(&self, id: &UuidVal) -> bool {
        self.lock().contains_key(id)
    }
    fn insert(&self, id: UuidVal, codec: Arc<dyn Codec>) -> Arc<dyn Codec> {
        self.lock().entry(id).or_insert(codec).clone()
    }
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UuidVal, Arc<dyn Codec>>> {
        self.codecs.lock().expect("codec registry mutex is not poisoned")
    }
    /// Materialise the codec at `root_pos`, caching every codec built along
    /// the way under its type id
    pub fn build(
        &self,
        root_pos: Option<TypePos>,
        descriptors: &[Descriptor],
    ) -> Result<Arc<dyn Codec>, CodecError> {
        let builder = CodecBuilder {
            registry: Some(self),
            descriptors,
        };
        match root_pos {
            Some(pos) => builder.build(pos),
            None => Ok(Arc::new(Nothing {})),
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> CodecRegistry {
        CodecRegistry::new()
    }
}

struct CodecBuilder<'a> {
    registry: Option<&'a CodecRegistry>,
    descriptors: &'a [Descriptor],
}

impl<'a> CodecBuilder<'a> {
    fn build(&self, pos: TypePos) -> Result<Arc<dyn Codec>, CodecError> {
        use Descriptor as D;
        let item = self
            .descriptors
            .get(pos.0 as usize)
            .context(errors::UnexpectedTypePosSnafu { position: pos.0 })?;
        if let Some(registry) = self.registry {
            if let Some(codec) = registry.get(item.id()) {
                return Ok(codec);
            }
        }
        // descriptors only reference earlier positions, so this recursion
        // is bounded by the blob length
        let codec: Arc<dyn Codec> = match item {
            D::BaseScalar(base) => scalar_codec(&base.id)?,
            D::Scalar(d) => Arc::new(Scalar {
                inner: self.build(d.base_type_pos)?,
            }),
            D::Set(d) => Arc::new(Set {
                element: self.build(d.type_pos)?,
            }),
            D::ObjectShape(d) => Arc::new(Object::build(&d.elements, self)?),
            D::InputShape(d) => Arc::new(Object::build(&d.elements, self)?),
            D::Tuple(d) => Arc::new(Tuple {
                elements: d
                    .element_types
                    .iter()
                    .map(|&t| self.build(t))
                    .collect::<Result<_, _>>()?,
            }),
            D::NamedTuple(d) => Arc::new(NamedTuple {
                shape: d.elements.as_slice().into(),
                codecs: d
                    .elements
                    .iter()
                    .map(|e| self.build(e.type_pos))
                    .collect::<Result<_, _>>()?,
            }),
            D::Array(d) => Arc::new(Array {
                element: self.build(d.type_pos)?,
            }),
            D::Enumeration(d) => Arc::new(Enum {
                members: d.members.iter().map(|x| x[..].into()).collect(),
            }),
            D::Range(d) => Arc::new(Range {
                element: self.build(d.type_pos)?,
            }),
            // annotations are stripped when the blob is parsed
            D::TypeAnnotation(..) => unreachable!(),
        };
        match self.registry {
            Some(registry) => Ok(registry.insert(*item.id(), codec)),
            None => Ok(codec),
        }
    }
}

/// Build a codec without touching any process-wide cache
pub fn build_codec(
    root_pos: Option<TypePos>,
    descriptors: &[Descriptor],
) -> Result<Arc<dyn Codec>, CodecError> {
    let builder = CodecBuilder {
        registry: None,
        descriptors,
    };
    match root_pos {
        Some(pos) => builder.build(pos),
        None => Ok(Arc::new(Nothing {})),
    }
}

/// Resolve a well-known base scalar id to its codec
pub fn scalar_codec(uuid: &UuidVal) -> Result<Arc<dyn Codec>, CodecError> {
    match *uuid {
        STD_UUID => Ok(Arc::new(Uuid {})),
        STD_STR => Ok(Arc::new(Str {})),
        STD_BYTES => Ok(Arc::new(Bytea {})),
        STD_INT16 => Ok(Arc::new(Int16 {})),
        STD_INT32 => Ok(Arc::new(Int32 {})),
        STD_INT64 => Ok(Arc::new(Int64 {})),
        STD_FLOAT32 => Ok(Arc::new(Float32 {})),
        STD_FLOAT64 => Ok(Arc::new(Float64 {})),
        STD_DECIMAL => Ok(Arc::new(Decimal {})),
        STD_BOOL => Ok(Arc::new(Bool {})),
        STD_DATETIME => Ok(Arc::new(Datetime {})),
        CAL_LOCAL_DATETIME => Ok(Arc::new(LocalDatetime {})),
        CAL_LOCAL_DATE => Ok(Arc::new(LocalDate {})),
        CAL_LOCAL_TIME => Ok(Arc::new(LocalTime {})),
        STD_DURATION => Ok(Arc::new(Duration {})),
        STD_JSON => Ok(Arc::new(Json {})),
        STD_BIGINT => Ok(Arc::new(BigInt {})),
        _ => errors::UndefinedBaseScalarSnafu { uuid: *uuid }.fail(),
    }
}

#[derive(Debug)]
pub struct Uuid;

#[derive(Debug)]
pub struct Str;

#[derive(Debug)]
pub struct Bytea;

#[derive(Debug)]
pub struct Int16;

#[derive(Debug)]
pub struct Int32;

#[derive(Debug)]
pub struct Int64;

#[derive(Debug)]
pub struct Float32;

#[derive(Debug)]
pub struct Float64;

#[derive(Debug)]
pub struct Decimal;

#[derive(Debug)]
pub struct BigInt;

#[derive(Debug)]
pub struct Bool;

#[derive(Debug)]
pub struct Datetime;

#[derive(Debug)]
pub struct LocalDatetime;

#[derive(Debug)]
pub struct LocalDate;

#[derive(Debug)]
pub struct LocalTime;

#[derive(Debug)]
pub struct Duration;

#[derive(Debug)]
pub struct Json;

#[derive(Debug)]
pub struct Nothing;

#[derive(Debug)]
pub struct Scalar {
    inner: Arc<dyn Codec>,
}

#[derive(Debug)]
pub struct Set {
    element: Arc<dyn Codec>,
}

#[derive(Debug)]
pub struct Array {
    element: Arc<dyn Codec>,
}

#[derive(Debug)]
pub struct Object {
    shape: ObjectShape,
    codecs: Vec<Arc<dyn Codec>>,
}

#[derive(Debug)]
pub struct Tuple {
    elements: Vec<Arc<dyn Codec>>,
}

#[derive(Debug)]
pub struct NamedTuple {
    shape: NamedTupleShape,
    codecs: Vec<Arc<dyn Codec>>,
}

#[derive(Debug)]
pub struct Enum {
    members: HashSet<Arc<str>>,
}

#[derive(Debug)]
pub struct Range {
    element: Arc<dyn Codec>,
}

impl Object {
    fn build(
        elements: &[descriptors::ShapeElement],
        dec: &CodecBuilder,
    ) -> Result<Object, CodecError> {
        Ok(Object {
            shape: elements.into(),
            codecs: elements
                .iter()
                .map(|e| dec.build(e.type_pos))
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Write one `(length, payload)` element, patching the length afterwards
fn encode_element(
    buf: &mut BytesMut,
    codec: &Arc<dyn Codec>,
    value: &Value,
) -> Result<(), EncodeError> {
    buf.reserve(4);
    let pos = buf.len();
    buf.put_i32(0); // replaced after serializing a value
    codec.encode(buf, value)?;
    let len = buf.len() - pos - 4;
    buf[pos..pos + 4].copy_from_slice(
        &i32::try_from(len)
            .ok()
            .context(errors::ElementTooLongSnafu)?
            .to_be_bytes(),
    );
    Ok(())
}

fn encode_array_like(
    buf: &mut BytesMut,
    items: &[Value],
    element: &Arc<dyn Codec>,
) -> Result<(), EncodeError> {
    if items.is_empty() {
        buf.reserve(12);
        buf.put_u32(0); // ndims
        buf.put_u32(0); // reserved0
        buf.put_u32(0); // reserved1
        return Ok(());
    }
    buf.reserve(20);
    buf.put_u32(1); // ndims
    buf.put_u32(0); // reserved0
    buf.put_u32(0); // reserved1
    buf.put_u32(
        items
            .len()
            .try_into()
            .ok()
            .context(errors::ArrayTooLongSnafu)?,
    );
    buf.put_u32(1); // lower
    for item in items {
        encode_element(buf, element, item)?;
    }
    Ok(())
}

fn encode_tuple_like<'x>(
    buf: &mut BytesMut,
    fields: impl Iterator<Item = &'x Value>,
    codecs: &[Arc<dyn Codec>],
) -> Result<(), EncodeError> {
    buf.reserve(4 + 8 * codecs.len());
    buf.put_u32(
        codecs
            .len()
            .try_into()
            .ok()
            .context(errors::TooManyElementsSnafu)?,
    );
    for (codec, field) in codecs.iter().zip(fields) {
        buf.reserve(8);
        buf.put_u32(0); // reserved
        encode_element(buf, codec, field)?;
    }
    Ok(())
}

fn decode_array_like(
    reader: &mut Reader,
    codec: &Arc<dyn Codec>,
    ensure_shape: impl Fn(bool) -> Result<(), DecodeError>,
) -> Result<Vec<Value>, DecodeError> {
    let len = reader.read_array_like_header(ensure_shape)?;
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        let element = reader.read_array_like_element()?;
        items.push(codec.decode_value(element)?);
    }
    Ok(items)
}

fn decode_tuple(
    reader: &mut Reader,
    codecs: &[Arc<dyn Codec>],
) -> Result<Vec<Value>, DecodeError> {
    let len = reader.read_tuple_like_header()?;
    ensure!(len == codecs.len(), errors::TupleSizeMismatchSnafu);
    let mut items = Vec::with_capacity(len);
    for codec in codecs {
        let element = reader.read_tuple_element()?;
        items.push(codec.decode_value(element)?);
    }
    Ok(items)
}

fn decode_object(
    reader: &mut Reader,
    codecs: &[Arc<dyn Codec>],
) -> Result<Vec<Option<Value>>, DecodeError> {
    let len = reader.read_tuple_like_header()?;
    ensure!(len == codecs.len(), errors::ObjectSizeMismatchSnafu);
    let mut fields = Vec::with_capacity(len);
    for codec in codecs {
        let element = reader.read_object_element()?;
        fields.push(element.map(|e| codec.decode_value(e)).transpose()?);
    }
    Ok(fields)
}

impl Codec for Uuid {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        use snafu::ResultExt;
        ensure!(buf.remaining() == 16, errors::UnderflowSnafu);
        let val = UuidVal::from_slice(buf.take_rest()).context(errors::InvalidUuidSnafu)?;
        Ok(Value::Uuid(val))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let &val = match val {
            Value::Uuid(val) => val,
            _ => Err(invalid_value("std::uuid", val))?,
        };
        buf.extend(val.as_bytes());
        Ok(())
    }
}

impl Codec for Str {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        use snafu::ResultExt;
        let val = std::str::from_utf8(buf.take_rest())
            .context(errors::InvalidUtf8Snafu)?
            .to_owned();
        Ok(Value::Str(val))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::Str(val) => val,
            _ => Err(invalid_value("std::str", val))?,
        };
        buf.extend(val.as_bytes());
        Ok(())
    }
}

impl Codec for Bytea {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        let val = Bytes::copy_from_slice(buf.take_rest());
        Ok(Value::Bytes(val))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::Bytes(val) => val,
            _ => Err(invalid_value("std::bytes", val))?,
        };
        buf.extend(val);
        Ok(())
    }
}

impl Codec for Int16 {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        buf.get_i16().map(Value::Int16)
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let &val = match val {
            Value::Int16(val) => val,
            _ => Err(invalid_value("std::int16", val))?,
        };
        buf.reserve(2);
        buf.put_i16(val);
        Ok(())
    }
}

impl Codec for Int32 {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        buf.get_i32().map(Value::Int32)
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let &val = match val {
            Value::Int32(val) => val,
            _ => Err(invalid_value("std::int32", val))?,
        };
        buf.reserve(4);
        buf.put_i32(val);
        Ok(())
    }
}

impl Codec for Int64 {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        buf.get_i64().map(Value::Int64)
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let &val = match val {
            Value::Int64(val) => val,
            _ => Err(invalid_value("std::int64", val))?,
        };
        buf.reserve(8);
        buf.put_i64(val);
        Ok(())
    }
}

impl Codec for Float32 {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        buf.get_f32().map(Value::Float32)
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let &val = match val {
            Value::Float32(val) => val,
            _ => Err(invalid_value("std::float32", val))?,
        };
        buf.reserve(4);
        buf.put_f32(val);
        Ok(())
    }
}

impl Codec for Float64 {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        buf.get_f64().map(Value::Float64)
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let &val = match val {
            Value::Float64(val) => val,
            _ => Err(invalid_value("std::float64", val))?,
        };
        buf.reserve(8);
        buf.put_f64(val);
        Ok(())
    }
}

fn decode_numeric_parts(buf: &mut Reader) -> Result<(bool, i16, u16, Vec<u16>), DecodeError> {
    let ndigits = buf.get_u16()? as usize;
    let weight = buf.get_i16()?;
    let negative = match buf.get_u16()? {
        0x0000 => false,
        0x4000 => true,
        _ => errors::InvalidNumericSignSnafu.fail()?,
    };
    let decimal_digits = buf.get_u16()?;
    let mut digits = Vec::with_capacity(ndigits);
    for _ in 0..ndigits {
        digits.push(buf.get_u16()?);
    }
    Ok((negative, weight, decimal_digits, digits))
}

impl Codec for Decimal {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        let (negative, weight, decimal_digits, digits) = decode_numeric_parts(buf)?;
        Ok(Value::Decimal(bignum::Decimal::from_parts(
            negative,
            weight,
            decimal_digits,
            digits,
        )))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::Decimal(val) => val,
            _ => Err(invalid_value("std::decimal", val))?,
        };
        buf.reserve(8 + val.digits().len() * 2);
        buf.put_u16(
            val.digits()
                .len()
                .try_into()
                .ok()
                .context(errors::BigIntTooLongSnafu)?,
        );
        buf.put_i16(val.weight());
        buf.put_u16(if val.negative() { 0x4000 } else { 0x0000 });
        buf.put_u16(val.decimal_digits());
        for &dig in val.digits() {
            buf.put_u16(dig);
        }
        Ok(())
    }
}

impl Codec for BigInt {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        let (negative, weight, _dscale, digits) = decode_numeric_parts(buf)?;
        Ok(Value::BigInt(bignum::BigInt::from_parts(
            negative, weight, digits,
        )))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::BigInt(val) => val,
            _ => Err(invalid_value("std::bigint", val))?,
        };
        buf.reserve(8 + val.digits().len() * 2);
        buf.put_u16(
            val.digits()
                .len()
                .try_into()
                .ok()
                .context(errors::BigIntTooLongSnafu)?,
        );
        buf.put_i16(val.weight());
        buf.put_u16(if val.negative() { 0x4000 } else { 0x0000 });
        buf.put_u16(0);
        for &dig in val.digits() {
            buf.put_u16(dig);
        }
        Ok(())
    }
}

impl Codec for Bool {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        match buf.get_u8()? {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            _ => errors::InvalidBoolSnafu.fail(),
        }
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let &val = match val {
            Value::Bool(val) => val,
            _ => Err(invalid_value("std::bool", val))?,
        };
        buf.reserve(1);
        buf.put_u8(val as u8);
        Ok(())
    }
}

impl Codec for Datetime {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        buf.get_i64()
            .map(|micros| Value::Datetime(time::Datetime::from_micros(micros)))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::Datetime(val) => val,
            _ => Err(invalid_value("std::datetime", val))?,
        };
        buf.reserve(8);
        buf.put_i64(val.micros());
        Ok(())
    }
}

impl Codec for LocalDatetime {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        buf.get_i64()
            .map(|micros| Value::LocalDatetime(time::LocalDatetime::from_micros(micros)))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::LocalDatetime(val) => val,
            _ => Err(invalid_value("cal::local_datetime", val))?,
        };
        buf.reserve(8);
        buf.put_i64(val.micros());
        Ok(())
    }
}

impl Codec for LocalDate {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        buf.get_i32()
            .map(|days| Value::LocalDate(time::LocalDate::from_days(days)))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::LocalDate(val) => val,
            _ => Err(invalid_value("cal::local_date", val))?,
        };
        buf.reserve(4);
        buf.put_i32(val.days());
        Ok(())
    }
}

impl Codec for LocalTime {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        let micros = buf.get_i64()?;
        ensure!(
            (0..86_400 * 1_000_000).contains(&micros),
            errors::InvalidMarkerSnafu
        );
        Ok(Value::LocalTime(time::LocalTime::from_micros(micros as u64)))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::LocalTime(val) => val,
            _ => Err(invalid_value("cal::local_time", val))?,
        };
        buf.reserve(8);
        buf.put_i64(val.micros());
        Ok(())
    }
}

impl Codec for Duration {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        let micros = buf.get_i64()?;
        let days = buf.get_i32()?;
        let months = buf.get_i32()?;
        ensure!(days == 0 && months == 0, errors::NonZeroReservedBytesSnafu);
        Ok(Value::Duration(time::Duration::from_micros(micros)))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::Duration(val) => val,
            _ => Err(invalid_value("std::duration", val))?,
        };
        buf.reserve(16);
        buf.put_i64(val.micros());
        buf.put_u32(0);
        buf.put_u32(0);
        Ok(())
    }
}

impl Codec for Json {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        use snafu::ResultExt;
        let format = buf.get_u8()?;
        ensure!(format == 1, errors::InvalidJsonFormatSnafu);
        let val = std::str::from_utf8(buf.take_rest())
            .context(errors::InvalidUtf8Snafu)?
            .to_owned();
        Ok(Value::Json(val))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::Json(val) => val,
            _ => Err(invalid_value("std::json", val))?,
        };
        buf.reserve(1 + val.len());
        buf.put_u8(1);
        buf.extend(val.as_bytes());
        Ok(())
    }
}

impl Codec for Nothing {
    fn decode(&self, _buf: &mut Reader) -> Result<Value, DecodeError> {
        Ok(Value::Nothing)
    }
    fn encode(&self, _buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        match val {
            Value::Nothing => Ok(()),
            _ => Err(invalid_value("nothing", val))?,
        }
    }
}

impl Codec for Scalar {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        self.inner.decode(buf)
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        self.inner.encode(buf, val)
    }
}

impl Codec for Set {
    fn decode(&self, reader: &mut Reader) -> Result<Value, DecodeError> {
        let items = decode_array_like(reader, &self.element, |predicate| {
            ensure!(predicate, errors::InvalidSetShapeSnafu);
            Ok(())
        })?;
        Ok(Value::Set(items))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let items = match val {
            Value::Set(items) => items,
            _ => Err(invalid_value("set", val))?,
        };
        encode_array_like(buf, items, &self.element)
    }
}

impl Codec for Array {
    fn decode(&self, reader: &mut Reader) -> Result<Value, DecodeError> {
        let items = decode_array_like(reader, &self.element, |predicate| {
            ensure!(predicate, errors::InvalidArrayShapeSnafu);
            Ok(())
        })?;
        Ok(Value::Array(items))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let items = match val {
            Value::Array(items) => items,
            _ => Err(invalid_value("array", val))?,
        };
        encode_array_like(buf, items, &self.element)
    }
}

impl Codec for Object {
    fn decode(&self, reader: &mut Reader) -> Result<Value, DecodeError> {
        let fields = decode_object(reader, &self.codecs)?;
        Ok(Value::Object {
            shape: self.shape.clone(),
            fields,
        })
    }
    fn encode(&self, _buf: &mut BytesMut, _val: &Value) -> Result<(), EncodeError> {
        // objects only ever travel server to client
        errors::ObjectAsArgumentSnafu.fail()
    }
}

impl Codec for Tuple {
    fn decode(&self, reader: &mut Reader) -> Result<Value, DecodeError> {
        let items = decode_tuple(reader, &self.elements)?;
        Ok(Value::Tuple(items))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let items = match val {
            Value::Tuple(items) => items,
            _ => Err(invalid_value("tuple", val))?,
        };
        ensure!(
            self.elements.len() == items.len(),
            errors::TupleShapeMismatchSnafu
        );
        encode_tuple_like(buf, items.iter(), &self.elements)
    }
}

impl Codec for NamedTuple {
    fn decode(&self, reader: &mut Reader) -> Result<Value, DecodeError> {
        let fields = decode_tuple(reader, &self.codecs)?;
        Ok(Value::NamedTuple {
            shape: self.shape.clone(),
            fields,
        })
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let (shape, fields) = match val {
            Value::NamedTuple { shape, fields } => (shape, fields),
            _ => Err(invalid_value("named tuple", val))?,
        };
        ensure!(shape == &self.shape, errors::TupleShapeMismatchSnafu);
        ensure!(
            self.codecs.len() == fields.len(),
            errors::TupleShapeMismatchSnafu
        );
        encode_tuple_like(buf, fields.iter(), &self.codecs)
    }
}

impl Codec for Enum {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        use snafu::ResultExt;
        let val = std::str::from_utf8(buf.take_rest()).context(errors::InvalidUtf8Snafu)?;
        let val = self
            .members
            .get(val)
            .context(errors::ExtraEnumValueSnafu)?;
        Ok(Value::Enum(EnumValue(val.clone())))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::Enum(val) => val,
            _ => Err(invalid_value("enum", val))?,
        };
        ensure!(
            self.members.contains(&val.0),
            errors::MissingEnumValueSnafu
        );
        buf.extend(val.0.as_bytes());
        Ok(())
    }
}

impl Codec for Range {
    fn decode(&self, buf: &mut Reader) -> Result<Value, DecodeError> {
        let flags = buf.get_u8()?;
        if flags & range::EMPTY != 0 {
            return Ok(Value::Range(crate::range::Range::empty()));
        }
        let lower = if flags & range::LB_INF == 0 {
            let element = buf.read_array_like_element()?;
            Some(Box::new(self.element.decode_value(element)?))
        } else {
            None
        };
        let upper = if flags & range::UB_INF == 0 {
            let element = buf.read_array_like_element()?;
            Some(Box::new(self.element.decode_value(element)?))
        } else {
            None
        };
        Ok(Value::Range(crate::range::Range::new(
            lower,
            upper,
            flags & range::LB_INC != 0,
            flags & range::UB_INC != 0,
        )))
    }
    fn encode(&self, buf: &mut BytesMut, val: &Value) -> Result<(), EncodeError> {
        let val = match val {
            Value::Range(val) => val,
            _ => Err(invalid_value("range", val))?,
        };
        let mut flags = 0u8;
        if val.is_empty() {
            flags |= range::EMPTY;
        } else {
            if val.inc_lower() {
                flags |= range::LB_INC;
            }
            if val.inc_upper() {
                flags |= range::UB_INC;
            }
            if val.lower().is_none() {
                flags |= range::LB_INF;
            }
            if val.upper().is_none() {
                flags |= range::UB_INF;
            }
        }
        buf.reserve(1);
        buf.put_u8(flags);
        if !val.is_empty() {
            if let Some(lower) = val.lower() {
                encode_element(buf, &self.element, lower.as_ref())?;
            }
            if let Some(upper) = val.upper() {
                encode_element(buf, &self.element, upper.as_ref())?;
            }
        }
        Ok(())
    }
}
