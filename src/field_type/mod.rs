//! Field types describe the shape of trace data, independently of any value.
//!
//! A [`FieldType`] is a shared handle: cloning it yields another reference to
//! the same node. Types stay mutable ("hot") until they are frozen, which
//! happens when they get attached to a frozen owner or when a field is
//! instantiated from them. Freezing is recursive and permanent.

use crate::clock::ClockClass;
use crate::error::Error;
use crate::types::{check_identifier, Base, ByteOrder, Encoding};
use derive_more::Display;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

pub use enumeration::{EnumerationMapping, MappingIter, MappingRange};

mod enumeration;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum FieldTypeId {
    #[display(fmt = "integer")]
    Integer,
    #[display(fmt = "floating point number")]
    Float,
    #[display(fmt = "enumeration")]
    Enumeration,
    #[display(fmt = "string")]
    String,
    #[display(fmt = "structure")]
    Structure,
    #[display(fmt = "variant")]
    Variant,
    #[display(fmt = "array")]
    Array,
    #[display(fmt = "sequence")]
    Sequence,
}

#[derive(Clone, PartialEq, Debug)]
pub struct IntegerProperties {
    pub size: u32,
    pub is_signed: bool,
    pub base: Base,
    pub encoding: Encoding,
    pub byte_order: ByteOrder,
    pub alignment: u32,
    pub mapped_clock_class: Option<ClockClass>,
}

impl IntegerProperties {
    /// The inclusive range of values representable with this size and signedness.
    pub fn value_range(&self) -> (i128, i128) {
        integer_value_range(self.size, self.is_signed)
    }
}

pub(crate) fn integer_value_range(size: u32, is_signed: bool) -> (i128, i128) {
    if is_signed {
        let half = 1_i128 << (size - 1);
        (-half, half - 1)
    } else {
        (0, (1_i128 << size) - 1)
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FloatProperties {
    pub exponent_digits: u32,
    pub mantissa_digits: u32,
    pub byte_order: ByteOrder,
    pub alignment: u32,
}

impl FloatProperties {
    pub fn is_single_precision(&self) -> bool {
        self.mantissa_digits == SINGLE_PRECISION.1
    }
}

const SINGLE_PRECISION: (u32, u32) = (8, 24);
const DOUBLE_PRECISION: (u32, u32) = (11, 53);

#[derive(Clone, PartialEq, Debug)]
pub struct EnumerationProperties {
    pub container: FieldType,
    pub mappings: Vec<EnumerationMapping>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct VariantProperties {
    pub tag_name: String,
    pub tag_type: Option<FieldType>,
    pub options: Vec<(String, FieldType)>,
}

/// The shape of a field type node.
#[derive(Clone, PartialEq, Debug)]
pub enum FieldTypeKind {
    Integer(IntegerProperties),
    Float(FloatProperties),
    Enumeration(EnumerationProperties),
    String { encoding: Encoding },
    Structure { fields: Vec<(String, FieldType)> },
    Variant(VariantProperties),
    Array { element: FieldType, length: u64 },
    Sequence { element: FieldType, length_name: String },
}

impl FieldTypeKind {
    pub fn id(&self) -> FieldTypeId {
        match self {
            FieldTypeKind::Integer(_) => FieldTypeId::Integer,
            FieldTypeKind::Float(_) => FieldTypeId::Float,
            FieldTypeKind::Enumeration(_) => FieldTypeId::Enumeration,
            FieldTypeKind::String { .. } => FieldTypeId::String,
            FieldTypeKind::Structure { .. } => FieldTypeId::Structure,
            FieldTypeKind::Variant(_) => FieldTypeId::Variant,
            FieldTypeKind::Array { .. } => FieldTypeId::Array,
            FieldTypeKind::Sequence { .. } => FieldTypeId::Sequence,
        }
    }

    fn children(&self) -> Vec<&FieldType> {
        match self {
            FieldTypeKind::Integer(_) | FieldTypeKind::Float(_) | FieldTypeKind::String { .. } => {
                Vec::new()
            }
            FieldTypeKind::Enumeration(e) => vec![&e.container],
            FieldTypeKind::Structure { fields } => fields.iter().map(|(_, ft)| ft).collect(),
            FieldTypeKind::Variant(v) => v
                .tag_type
                .iter()
                .chain(v.options.iter().map(|(_, ft)| ft))
                .collect(),
            FieldTypeKind::Array { element, .. } | FieldTypeKind::Sequence { element, .. } => {
                vec![element]
            }
        }
    }
}

#[derive(Debug)]
struct FieldTypeInner {
    frozen: Cell<bool>,
    kind: RefCell<FieldTypeKind>,
}

#[derive(Clone)]
pub struct FieldType(Rc<FieldTypeInner>);

impl FieldType {
    fn from_kind(kind: FieldTypeKind) -> Self {
        FieldType(Rc::new(FieldTypeInner {
            frozen: Cell::new(false),
            kind: RefCell::new(kind),
        }))
    }

    /// An integer field type of `size` bits, in `[1, 64]`.
    pub fn integer(size: u32, is_signed: bool) -> Result<Self, Error> {
        check_integer_size(size)?;
        Ok(Self::from_kind(FieldTypeKind::Integer(IntegerProperties {
            size,
            is_signed,
            base: Base::default(),
            encoding: Encoding::default(),
            byte_order: ByteOrder::default(),
            alignment: 1,
            mapped_clock_class: None,
        })))
    }

    /// A double precision floating point number field type.
    pub fn float() -> Self {
        Self::from_kind(FieldTypeKind::Float(FloatProperties {
            exponent_digits: DOUBLE_PRECISION.0,
            mantissa_digits: DOUBLE_PRECISION.1,
            byte_order: ByteOrder::default(),
            alignment: 1,
        }))
    }

    pub fn float_with_digits(exponent_digits: u32, mantissa_digits: u32) -> Result<Self, Error> {
        check_float_digits(exponent_digits, mantissa_digits)?;
        let ft = Self::float();
        if let FieldTypeKind::Float(p) = &mut *ft.kind_mut() {
            p.exponent_digits = exponent_digits;
            p.mantissa_digits = mantissa_digits;
        }
        Ok(ft)
    }

    /// An enumeration field type backed by the integer type `container`.
    pub fn enumeration(container: &FieldType) -> Result<Self, Error> {
        if container.id() != FieldTypeId::Integer {
            return Err(Error::validation(format!(
                "enumeration container must be an integer field type, got {}",
                container.id()
            )));
        }
        Ok(Self::from_kind(FieldTypeKind::Enumeration(
            EnumerationProperties {
                container: container.clone(),
                mappings: Vec::new(),
            },
        )))
    }

    pub fn string() -> Self {
        Self::from_kind(FieldTypeKind::String {
            encoding: Encoding::Utf8,
        })
    }

    pub fn structure() -> Self {
        Self::from_kind(FieldTypeKind::Structure { fields: Vec::new() })
    }

    /// A variant field type selected by the enumeration field named `tag_name`.
    pub fn variant(tag_name: &str, tag_type: Option<&FieldType>) -> Result<Self, Error> {
        check_identifier("Variant tag name", tag_name)?;
        if let Some(tt) = tag_type {
            check_tag_type(tt)?;
        }
        Ok(Self::from_kind(FieldTypeKind::Variant(VariantProperties {
            tag_name: tag_name.to_owned(),
            tag_type: tag_type.cloned(),
            options: Vec::new(),
        })))
    }

    pub fn array(element: &FieldType, length: u64) -> Self {
        Self::from_kind(FieldTypeKind::Array {
            element: element.clone(),
            length,
        })
    }

    /// A sequence field type whose length is given at runtime by the unsigned
    /// integer field named `length_name`.
    pub fn sequence(element: &FieldType, length_name: &str) -> Result<Self, Error> {
        check_identifier("Sequence length field name", length_name)?;
        Ok(Self::from_kind(FieldTypeKind::Sequence {
            element: element.clone(),
            length_name: length_name.to_owned(),
        }))
    }

    pub fn kind(&self) -> Ref<'_, FieldTypeKind> {
        self.0.kind.borrow()
    }

    fn kind_mut(&self) -> RefMut<'_, FieldTypeKind> {
        self.0.kind.borrow_mut()
    }

    pub fn id(&self) -> FieldTypeId {
        self.kind().id()
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    /// Returns true if both handles refer to the same field type node.
    pub fn ptr_eq(&self, other: &FieldType) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn freeze(&self) {
        if self.0.frozen.replace(true) {
            return;
        }
        debug!(id = %self.id(), "Froze field type");
        for child in self.kind().children() {
            child.freeze();
        }
    }

    /// Returns true if an integer type of this tree is mapped to a clock class.
    pub(crate) fn has_mapped_clock_class(&self) -> bool {
        match &*self.kind() {
            FieldTypeKind::Integer(p) => p.mapped_clock_class.is_some(),
            kind => kind.children().iter().any(|c| c.has_mapped_clock_class()),
        }
    }

    /// Returns true if `needle` is this node or one of its descendants.
    fn contains(&self, needle: &FieldType) -> bool {
        self.ptr_eq(needle) || self.kind().children().iter().any(|c| c.contains(needle))
    }

    /// Mutable access to the kind, provided the type is still hot and is of kind `id`.
    fn hot_kind_mut(&self, id: FieldTypeId) -> Result<RefMut<'_, FieldTypeKind>, Error> {
        if self.is_frozen() {
            return Err(Error::Frozen("field type"));
        }
        if self.id() != id {
            return Err(Error::validation(format!(
                "expected a {id} field type, got {}",
                self.id()
            )));
        }
        Ok(self.kind_mut())
    }

    fn integer_props_mut(&self) -> Result<RefMut<'_, IntegerProperties>, Error> {
        let kind = self.hot_kind_mut(FieldTypeId::Integer)?;
        Ok(RefMut::map(kind, |k| match k {
            FieldTypeKind::Integer(p) => p,
            _ => unreachable!("kind was checked"),
        }))
    }

    /// Integer properties of an integer field type, or of an enumeration's container.
    pub fn integer_properties(&self) -> Option<IntegerProperties> {
        match &*self.kind() {
            FieldTypeKind::Integer(p) => Some(p.clone()),
            FieldTypeKind::Enumeration(e) => e.container.integer_properties(),
            _ => None,
        }
    }

    pub fn set_size(&self, size: u32) -> Result<(), Error> {
        check_integer_size(size)?;
        self.integer_props_mut()?.size = size;
        Ok(())
    }

    pub fn set_is_signed(&self, is_signed: bool) -> Result<(), Error> {
        self.integer_props_mut()?.is_signed = is_signed;
        Ok(())
    }

    pub fn set_base(&self, base: Base) -> Result<(), Error> {
        self.integer_props_mut()?.base = base;
        Ok(())
    }

    pub fn set_encoding(&self, encoding: Encoding) -> Result<(), Error> {
        if self.id() == FieldTypeId::String {
            if let FieldTypeKind::String { encoding: e } =
                &mut *self.hot_kind_mut(FieldTypeId::String)?
            {
                *e = encoding;
            }
            Ok(())
        } else {
            self.integer_props_mut()?.encoding = encoding;
            Ok(())
        }
    }

    pub fn set_mapped_clock_class(&self, clock_class: Option<&ClockClass>) -> Result<(), Error> {
        self.integer_props_mut()?.mapped_clock_class = clock_class.cloned();
        Ok(())
    }

    pub fn set_byte_order(&self, byte_order: ByteOrder) -> Result<(), Error> {
        match self.id() {
            FieldTypeId::Float => {
                if let FieldTypeKind::Float(p) = &mut *self.hot_kind_mut(FieldTypeId::Float)? {
                    p.byte_order = byte_order;
                }
            }
            _ => self.integer_props_mut()?.byte_order = byte_order,
        }
        Ok(())
    }

    pub fn set_alignment(&self, alignment: u32) -> Result<(), Error> {
        if !alignment.is_power_of_two() {
            return Err(Error::validation(format!(
                "alignment must be a power of two, got {alignment}"
            )));
        }
        match self.id() {
            FieldTypeId::Float => {
                if let FieldTypeKind::Float(p) = &mut *self.hot_kind_mut(FieldTypeId::Float)? {
                    p.alignment = alignment;
                }
            }
            _ => self.integer_props_mut()?.alignment = alignment,
        }
        Ok(())
    }

    pub fn set_float_digits(&self, exponent_digits: u32, mantissa_digits: u32) -> Result<(), Error> {
        check_float_digits(exponent_digits, mantissa_digits)?;
        if let FieldTypeKind::Float(p) = &mut *self.hot_kind_mut(FieldTypeId::Float)? {
            p.exponent_digits = exponent_digits;
            p.mantissa_digits = mantissa_digits;
        }
        Ok(())
    }

    /// The container integer type of an enumeration field type.
    pub fn container_type(&self) -> Option<FieldType> {
        match &*self.kind() {
            FieldTypeKind::Enumeration(e) => Some(e.container.clone()),
            _ => None,
        }
    }

    pub fn add_signed_mapping(&self, name: &str, lower: i64, upper: i64) -> Result<(), Error> {
        self.add_mapping(name, MappingRange::Signed { lower, upper })
    }

    pub fn add_unsigned_mapping(&self, name: &str, lower: u64, upper: u64) -> Result<(), Error> {
        self.add_mapping(name, MappingRange::Unsigned { lower, upper })
    }

    /// Mapped ranges are only meaningful for the container's current size and
    /// signedness, so the first mapping freezes the container.
    fn add_mapping(&self, name: &str, range: MappingRange) -> Result<(), Error> {
        let mut kind = self.hot_kind_mut(FieldTypeId::Enumeration)?;
        let e = match &mut *kind {
            FieldTypeKind::Enumeration(e) => e,
            _ => unreachable!("kind was checked"),
        };
        let props = e
            .container
            .integer_properties()
            .ok_or_else(|| Error::validation("enumeration container is not an integer"))?;
        let range_is_signed = matches!(range, MappingRange::Signed { .. });
        if range_is_signed != props.is_signed {
            return Err(Error::validation(format!(
                "mapping '{name}' signedness doesn't match the enumeration's container"
            )));
        }
        if range.lower() > range.upper() {
            return Err(Error::validation(format!(
                "mapping '{name}' has its lower bound ({}) above its upper bound ({})",
                range.lower(),
                range.upper()
            )));
        }
        let (min, max) = props.value_range();
        if range.lower() < min || range.upper() > max {
            return Err(Error::validation(format!(
                "mapping '{name}' range [{}, {}] doesn't fit in a {}-bit container",
                range.lower(),
                range.upper(),
                props.size
            )));
        }
        e.mappings.push(EnumerationMapping {
            name: name.to_owned(),
            range,
        });
        e.container.freeze();
        Ok(())
    }

    /// All the mappings of an enumeration field type, in declaration order.
    pub fn mappings(&self) -> MappingIter {
        MappingIter::all(self)
    }

    /// Every mapping named `name`, in declaration order.
    pub fn mappings_by_name(&self, name: &str) -> MappingIter {
        MappingIter::by_name(self, name)
    }

    /// Every mapping whose inclusive range contains `value`, in declaration order.
    pub fn mappings_by_value<V: Into<i128>>(&self, value: V) -> Result<MappingIter, Error> {
        let value = value.into();
        let is_signed = match &*self.kind() {
            FieldTypeKind::Enumeration(e) => e
                .container
                .integer_properties()
                .map(|p| p.is_signed)
                .unwrap_or(false),
            other => {
                return Err(Error::validation(format!(
                    "expected an enumeration field type, got {}",
                    other.id()
                )))
            }
        };
        let in_bounds = if is_signed {
            i64::try_from(value).is_ok()
        } else {
            u64::try_from(value).is_ok()
        };
        if !in_bounds {
            return Err(Error::validation(format!(
                "value {value} is out of the enumeration's {} 64-bit range",
                if is_signed { "signed" } else { "unsigned" }
            )));
        }
        Ok(MappingIter::by_value(self, value))
    }

    /// Appends a named member to a structure field type.
    pub fn add_field(&self, name: &str, ft: &FieldType) -> Result<(), Error> {
        check_identifier("Structure field name", name)?;
        if ft.contains(self) {
            return Err(Error::validation(format!(
                "cannot add field '{name}': a field type cannot contain itself"
            )));
        }
        let mut kind = self.hot_kind_mut(FieldTypeId::Structure)?;
        if let FieldTypeKind::Structure { fields } = &mut *kind {
            if fields.iter().any(|(n, _)| n == name) {
                return Err(Error::validation(format!(
                    "structure field type already has a field named '{name}'"
                )));
            }
            fields.push((name.to_owned(), ft.clone()));
        }
        Ok(())
    }

    /// Appends a named option to a variant field type.
    pub fn add_option(&self, name: &str, ft: &FieldType) -> Result<(), Error> {
        check_identifier("Variant option name", name)?;
        if ft.contains(self) {
            return Err(Error::validation(format!(
                "cannot add option '{name}': a field type cannot contain itself"
            )));
        }
        let mut kind = self.hot_kind_mut(FieldTypeId::Variant)?;
        if let FieldTypeKind::Variant(v) = &mut *kind {
            if v.options.iter().any(|(n, _)| n == name) {
                return Err(Error::validation(format!(
                    "variant field type already has an option named '{name}'"
                )));
            }
            v.options.push((name.to_owned(), ft.clone()));
        }
        Ok(())
    }

    /// The tag type of a variant field type.
    pub fn tag_type(&self) -> Option<FieldType> {
        match &*self.kind() {
            FieldTypeKind::Variant(v) => v.tag_type.clone(),
            _ => None,
        }
    }

    pub fn set_tag_type(&self, tag_type: &FieldType) -> Result<(), Error> {
        check_tag_type(tag_type)?;
        let mut kind = self.hot_kind_mut(FieldTypeId::Variant)?;
        if let FieldTypeKind::Variant(v) = &mut *kind {
            v.tag_type = Some(tag_type.clone());
        }
        Ok(())
    }

    /// Number of members of a structure, options of a variant or mappings of an enumeration.
    pub fn len(&self) -> usize {
        match &*self.kind() {
            FieldTypeKind::Structure { fields } => fields.len(),
            FieldTypeKind::Variant(v) => v.options.len(),
            FieldTypeKind::Enumeration(e) => e.mappings.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Member type of a structure, or option type of a variant, by name.
    pub fn field_by_name(&self, name: &str) -> Option<FieldType> {
        let kind = self.kind();
        let named = match &*kind {
            FieldTypeKind::Structure { fields } => fields,
            FieldTypeKind::Variant(v) => &v.options,
            _ => return None,
        };
        named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ft)| ft.clone())
    }

    pub fn field_at(&self, index: usize) -> Option<(String, FieldType)> {
        match &*self.kind() {
            FieldTypeKind::Structure { fields } => fields.get(index).cloned(),
            FieldTypeKind::Variant(v) => v.options.get(index).cloned(),
            _ => None,
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        match &*self.kind() {
            FieldTypeKind::Structure { fields } => fields.iter().map(|(n, _)| n.clone()).collect(),
            FieldTypeKind::Variant(v) => v.options.iter().map(|(n, _)| n.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// Element type of an array or sequence field type.
    pub fn element_type(&self) -> Option<FieldType> {
        match &*self.kind() {
            FieldTypeKind::Array { element, .. } | FieldTypeKind::Sequence { element, .. } => {
                Some(element.clone())
            }
            _ => None,
        }
    }

    /// A new, unfrozen tree equivalent to this one. Mapped clock classes are shared.
    pub fn deep_copy(&self) -> FieldType {
        let copy_named = |named: &[(String, FieldType)]| -> Vec<(String, FieldType)> {
            named
                .iter()
                .map(|(n, ft)| (n.clone(), ft.deep_copy()))
                .collect()
        };
        let kind = match &*self.kind() {
            FieldTypeKind::Integer(p) => FieldTypeKind::Integer(p.clone()),
            FieldTypeKind::Float(p) => FieldTypeKind::Float(p.clone()),
            FieldTypeKind::Enumeration(e) => {
                let container = e.container.deep_copy();
                if !e.mappings.is_empty() {
                    container.freeze();
                }
                FieldTypeKind::Enumeration(EnumerationProperties {
                    container,
                    mappings: e.mappings.clone(),
                })
            }
            FieldTypeKind::String { encoding } => FieldTypeKind::String {
                encoding: *encoding,
            },
            FieldTypeKind::Structure { fields } => FieldTypeKind::Structure {
                fields: copy_named(fields),
            },
            FieldTypeKind::Variant(v) => FieldTypeKind::Variant(VariantProperties {
                tag_name: v.tag_name.clone(),
                tag_type: v.tag_type.as_ref().map(FieldType::deep_copy),
                options: copy_named(&v.options),
            }),
            FieldTypeKind::Array { element, length } => FieldTypeKind::Array {
                element: element.deep_copy(),
                length: *length,
            },
            FieldTypeKind::Sequence {
                element,
                length_name,
            } => FieldTypeKind::Sequence {
                element: element.deep_copy(),
                length_name: length_name.clone(),
            },
        };
        FieldType::from_kind(kind)
    }
}

fn check_integer_size(size: u32) -> Result<(), Error> {
    if (1..=64).contains(&size) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "integer field type size must be in [1, 64], got {size}"
        )))
    }
}

fn check_float_digits(exponent_digits: u32, mantissa_digits: u32) -> Result<(), Error> {
    let digits = (exponent_digits, mantissa_digits);
    if digits == SINGLE_PRECISION || digits == DOUBLE_PRECISION {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "unsupported floating point number digits: exponent={exponent_digits}, mantissa={mantissa_digits}"
        )))
    }
}

fn check_tag_type(tag_type: &FieldType) -> Result<(), Error> {
    if tag_type.id() == FieldTypeId::Enumeration {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "variant tag must be an enumeration field type, got {}",
            tag_type.id()
        )))
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.kind() == *other.kind()
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("kind", &*self.kind())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn point_type() -> FieldType {
        let st = FieldType::structure();
        st.add_field("x", &FieldType::integer(32, true).unwrap())
            .unwrap();
        st.add_field("y", &FieldType::integer(32, true).unwrap())
            .unwrap();
        st
    }

    #[test]
    fn integer_parameters_are_validated() {
        assert!(FieldType::integer(0, false).is_err());
        assert!(FieldType::integer(65, true).is_err());
        let ft = FieldType::integer(64, true).unwrap();
        assert!(ft.set_size(0).is_err());
        ft.set_base(Base::Hexadecimal).unwrap();
        assert!(ft.set_alignment(3).is_err());
        ft.set_alignment(8).unwrap();
        let p = ft.integer_properties().unwrap();
        assert_eq!(p.base, Base::Hexadecimal);
        assert_eq!(p.alignment, 8);
        assert_eq!(p.value_range(), (i128::from(i64::MIN), i128::from(i64::MAX)));
    }

    #[test]
    fn float_digits_are_validated() {
        assert!(FieldType::float_with_digits(8, 24).is_ok());
        assert!(FieldType::float_with_digits(11, 53).is_ok());
        assert!(FieldType::float_with_digits(8, 53).is_err());
        let ft = FieldType::float();
        assert!(ft.set_float_digits(5, 11).is_err());
        ft.set_float_digits(8, 24).unwrap();
        let kind = ft.kind();
        match &*kind {
            FieldTypeKind::Float(p) => assert!(p.is_single_precision()),
            _ => panic!("not a float"),
        }
    }

    #[test]
    fn frozen_types_reject_every_setter() {
        let int_ft = FieldType::integer(8, false).unwrap();
        let st = FieldType::structure();
        st.add_field("a", &int_ft).unwrap();
        st.freeze();
        assert!(int_ft.is_frozen(), "freezing is recursive");
        assert!(matches!(int_ft.set_size(16), Err(Error::Frozen(_))));
        assert!(matches!(
            st.add_field("b", &FieldType::string()),
            Err(Error::Frozen(_))
        ));
    }

    #[test]
    fn structure_members_are_ordered_and_unique() {
        let st = point_type();
        assert_eq!(st.field_names(), vec!["x", "y"]);
        assert!(st
            .add_field("x", &FieldType::string())
            .is_err());
        assert!(st.add_field("not valid", &FieldType::string()).is_err());
        assert!(st.add_field("st", &st).is_err());
        assert_eq!(st.field_at(1).unwrap().0, "y");
        assert!(st.field_by_name("z").is_none());
    }

    #[test]
    fn variant_tag_must_be_an_enumeration() {
        let int_ft = FieldType::integer(8, false).unwrap();
        assert!(FieldType::variant("tag", Some(&int_ft)).is_err());
        let tag = FieldType::enumeration(&int_ft).unwrap();
        let v = FieldType::variant("tag", Some(&tag)).unwrap();
        v.add_option("a", &FieldType::string()).unwrap();
        assert!(v.add_option("a", &FieldType::string()).is_err());
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn deep_copy_is_equal_independent_and_hot() {
        let st = point_type();
        st.freeze();
        let cpy = st.deep_copy();
        assert!(!cpy.ptr_eq(&st));
        assert!(!cpy.is_frozen());
        assert_eq!(cpy, st);
        cpy.add_field("z", &FieldType::float()).unwrap();
        assert!(cpy != st);
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(point_type(), point_type());
        let a = FieldType::integer(8, false).unwrap();
        let b = FieldType::integer(8, true).unwrap();
        assert!(a != b);
        assert!(a != FieldType::string());
    }
}
