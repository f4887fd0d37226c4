use std::sync::Arc;

use bytes::{Buf, Bytes};
use snafu::{ensure, OptionExt};
use uuid::Uuid;

use crate::codec::{Codec, CodecRegistry};
use crate::encoding::{Decode, Input};
use crate::errors::{self, CodecError, DecodeError};
use crate::errors::{InvalidTypeDescriptorSnafu, UnexpectedTypePosSnafu};
use crate::features::ProtocolVersion;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TypePos(pub u16);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Set(SetDescriptor),
    ObjectShape(ObjectShapeDescriptor),
    BaseScalar(BaseScalarTypeDescriptor),
    Scalar(ScalarTypeDescriptor),
    Tuple(TupleTypeDescriptor),
    NamedTuple(NamedTupleTypeDescriptor),
    Array(ArrayTypeDescriptor),
    Enumeration(EnumerationTypeDescriptor),
    InputShape(InputShapeTypeDescriptor),
    Range(RangeTypeDescriptor),
    TypeAnnotation(TypeAnnotationDescriptor),
}

/// An undecoded type description blob together with its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTypedesc {
    pub id: Uuid,
    pub data: Bytes,
}

/// A parsed type description: a positional array of descriptors where
/// later entries reference earlier ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typedesc {
    pub(crate) array: Vec<Descriptor>,
    pub(crate) root_id: Uuid,
    pub(crate) root_pos: Option<TypePos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDescriptor {
    pub id: Uuid,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectShapeDescriptor {
    pub id: Uuid,
    pub elements: Vec<ShapeElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputShapeTypeDescriptor {
    pub id: Uuid,
    pub elements: Vec<ShapeElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeElement {
    pub flag_implicit: bool,
    pub flag_link_property: bool,
    pub flag_link: bool,
    pub name: String,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseScalarTypeDescriptor {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarTypeDescriptor {
    pub id: Uuid,
    pub base_type_pos: TypePos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleTypeDescriptor {
    pub id: Uuid,
    pub element_types: Vec<TypePos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTupleTypeDescriptor {
    pub id: Uuid,
    pub elements: Vec<TupleElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleElement {
    pub name: String,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayTypeDescriptor {
    pub id: Uuid,
    pub type_pos: TypePos,
    pub dimensions: Vec<Option<u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationTypeDescriptor {
    pub id: Uuid,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeTypeDescriptor {
    pub id: Uuid,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotationDescriptor {
    pub annotated_type: u8,
    pub id: Uuid,
    pub annotation: String,
}

impl RawTypedesc {
    pub fn uninitialized() -> RawTypedesc {
        RawTypedesc {
            id: Uuid::from_u128(0),
            data: Bytes::new(),
        }
    }
    pub fn decode(&self) -> Result<Typedesc, DecodeError> {
        let cur = &mut Input::new(ProtocolVersion::current(), self.data.clone());
        Typedesc::decode_with_id(self.id, cur)
    }
}

impl Typedesc {
    pub fn decode_with_id(root_id: Uuid, buf: &mut Input) -> Result<Typedesc, DecodeError> {
        let mut array = Vec::new();
        while buf.remaining() > 0 {
            match Descriptor::decode(buf)? {
                // annotations carry no codec and occupy no position
                Descriptor::TypeAnnotation(..) => {}
                item => array.push(item),
            }
        }
        let root_pos = if root_id == Uuid::from_u128(0) {
            None
        } else {
            array
                .iter()
                .position(|d| *d.id() == root_id)
                .map(|pos| TypePos(pos as u16))
        };
        Ok(Typedesc {
            array,
            root_id,
            root_pos,
        })
    }
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.array
    }
    pub fn root_id(&self) -> &Uuid {
        &self.root_id
    }
    pub fn root_pos(&self) -> Option<TypePos> {
        self.root_pos
    }
    pub fn get(&self, type_pos: TypePos) -> Result<&Descriptor, CodecError> {
        self.array.get(type_pos.0 as usize).context(UnexpectedTypePosSnafu {
            position: type_pos.0,
        })
    }
    pub fn is_empty_tuple(&self) -> bool {
        match self.root_pos.and_then(|p| self.array.get(p.0 as usize)) {
            Some(Descriptor::Tuple(t)) => {
                t.id == Uuid::from_u128(0xFF) && t.element_types.is_empty()
            }
            _ => false,
        }
    }
    /// Materialise the root codec, caching every built codec by type id
    pub fn build_codec(&self, registry: &CodecRegistry) -> Result<Arc<dyn Codec>, CodecError> {
        registry.build(self.root_pos(), self.descriptors())
    }
}

impl Descriptor {
    pub fn id(&self) -> &Uuid {
        use Descriptor::*;
        match self {
            Set(i) => &i.id,
            ObjectShape(i) => &i.id,
            BaseScalar(i) => &i.id,
            Scalar(i) => &i.id,
            Tuple(i) => &i.id,
            NamedTuple(i) => &i.id,
            Array(i) => &i.id,
            Enumeration(i) => &i.id,
            InputShape(i) => &i.id,
            Range(i) => &i.id,
            TypeAnnotation(i) => &i.id,
        }
    }
}

impl Decode for Descriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        use Descriptor as D;
        ensure!(buf.remaining() >= 1, errors::UnderflowSnafu);
        match buf.chunk()[0] {
            0x00 => SetDescriptor::decode(buf).map(D::Set),
            0x01 => ObjectShapeDescriptor::decode(buf).map(D::ObjectShape),
            0x02 => BaseScalarTypeDescriptor::decode(buf).map(D::BaseScalar),
            0x03 => ScalarTypeDescriptor::decode(buf).map(D::Scalar),
            0x04 => TupleTypeDescriptor::decode(buf).map(D::Tuple),
            0x05 => NamedTupleTypeDescriptor::decode(buf).map(D::NamedTuple),
            0x06 => ArrayTypeDescriptor::decode(buf).map(D::Array),
            0x07 => EnumerationTypeDescriptor::decode(buf).map(D::Enumeration),
            0x08 => InputShapeTypeDescriptor::decode(buf).map(D::InputShape),
            0x09 => RangeTypeDescriptor::decode(buf).map(D::Range),
            0x7F..=0xFF => TypeAnnotationDescriptor::decode(buf).map(D::TypeAnnotation),
            descriptor => InvalidTypeDescriptorSnafu { descriptor }.fail(),
        }
    }
}

impl Decode for SetDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        let type_pos = TypePos(buf.get_u16());
        Ok(SetDescriptor { id, type_pos })
    }
}

fn decode_shape_elements(buf: &mut Input) -> Result<Vec<ShapeElement>, DecodeError> {
    ensure!(buf.remaining() >= 2, errors::UnderflowSnafu);
    let element_count = buf.get_u16();
    let mut elements = Vec::with_capacity(element_count as usize);
    for _ in 0..element_count {
        elements.push(ShapeElement::decode(buf)?);
    }
    Ok(elements)
}

impl Decode for ObjectShapeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        let elements = decode_shape_elements(buf)?;
        Ok(ObjectShapeDescriptor { id, elements })
    }
}

impl Decode for InputShapeTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        let elements = decode_shape_elements(buf)?;
        Ok(InputShapeTypeDescriptor { id, elements })
    }
}

impl Decode for ShapeElement {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 7, errors::UnderflowSnafu);
        let flags = buf.get_u8();
        let name = String::decode(buf)?;
        ensure!(buf.remaining() >= 2, errors::UnderflowSnafu);
        let type_pos = TypePos(buf.get_u16());
        Ok(ShapeElement {
            flag_implicit: flags & 0b001 != 0,
            flag_link_property: flags & 0b010 != 0,
            flag_link: flags & 0b100 != 0,
            name,
            type_pos,
        })
    }
}

impl Decode for BaseScalarTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 17, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        Ok(BaseScalarTypeDescriptor { id })
    }
}

impl Decode for ScalarTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        let base_type_pos = TypePos(buf.get_u16());
        Ok(ScalarTypeDescriptor { id, base_type_pos })
    }
}

impl Decode for TupleTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        let el_count = buf.get_u16();
        ensure!(
            buf.remaining() >= 2 * el_count as usize,
            errors::UnderflowSnafu
        );
        let mut element_types = Vec::with_capacity(el_count as usize);
        for _ in 0..el_count {
            element_types.push(TypePos(buf.get_u16()));
        }
        Ok(TupleTypeDescriptor { id, element_types })
    }
}

impl Decode for NamedTupleTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        let element_count = buf.get_u16();
        let mut elements = Vec::with_capacity(element_count as usize);
        for _ in 0..element_count {
            elements.push(TupleElement::decode(buf)?);
        }
        Ok(NamedTupleTypeDescriptor { id, elements })
    }
}

impl Decode for TupleElement {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let name = String::decode(buf)?;
        ensure!(buf.remaining() >= 2, errors::UnderflowSnafu);
        let type_pos = TypePos(buf.get_u16());
        Ok(TupleElement { name, type_pos })
    }
}

impl Decode for ArrayTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 21, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        let type_pos = TypePos(buf.get_u16());
        let dim_count = buf.get_u16();
        ensure!(
            buf.remaining() >= 4 * dim_count as usize,
            errors::UnderflowSnafu
        );
        let mut dimensions = Vec::with_capacity(dim_count as usize);
        for _ in 0..dim_count {
            dimensions.push(match buf.get_i32() {
                -1 => None,
                n if n > 0 => Some(n as u32),
                _ => errors::InvalidArrayShapeSnafu.fail()?,
            });
        }
        Ok(ArrayTypeDescriptor {
            id,
            type_pos,
            dimensions,
        })
    }
}

impl Decode for EnumerationTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        let member_count = buf.get_u16();
        let mut members = Vec::with_capacity(member_count as usize);
        for _ in 0..member_count {
            members.push(String::decode(buf)?);
        }
        Ok(EnumerationTypeDescriptor { id, members })
    }
}

impl Decode for RangeTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::UnderflowSnafu);
        buf.advance(1);
        let id = Uuid::decode(buf)?;
        let type_pos = TypePos(buf.get_u16());
        Ok(RangeTypeDescriptor { id, type_pos })
    }
}

impl Decode for TypeAnnotationDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 21, errors::UnderflowSnafu);
        let annotated_type = buf.get_u8();
        let id = Uuid::decode(buf)?;
        let annotation = String::decode(buf)?;
        Ok(TypeAnnotationDescriptor {
            annotated_type,
            id,
            annotation,
        })
    }
}
