//! Fields hold decoded values which conform to a [`FieldType`].
//!
//! [`Field`] is a closed sum type: there is exactly one variant per field type
//! kind, and [`Field::new`] dispatches on the kind of the type it's given.
//! Cloning a field makes an independent deep copy of its values; the field type
//! stays shared since it is frozen.

use crate::error::Error;
use crate::field_type::{integer_value_range, FieldType, FieldTypeId, FieldTypeKind};
use derive_more::From;
use tracing::warn;

pub use numeric::{Integral, Number};

mod numeric;

/// A generic, type-independent representation of a field's value.
#[derive(Clone, PartialEq, Debug, From)]
pub enum Value {
    #[from(ignore)]
    Null,
    Signed(i64),
    Unsigned(u64),
    Real(f64),
    String(String),
    Structure(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Signed(_) => "a signed integer",
            Value::Unsigned(_) => "an unsigned integer",
            Value::Real(_) => "a real number",
            Value::String(_) => "a string",
            Value::Structure(_) => "a structure",
            Value::Array(_) => "an array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Signed(v.into())
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => match (i64::try_from(i), u64::try_from(i)) {
                (Ok(s), _) => Value::Signed(s),
                (_, Ok(u)) => Value::Unsigned(u),
                _ => Value::Real(i as f64),
            },
            Number::Real(r) => Value::Real(r),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IntegerField {
    ft: FieldType,
    is_signed: bool,
    range: (i128, i128),
    value: Option<i128>,
}

impl IntegerField {
    fn new(ft: &FieldType) -> Self {
        let (size, is_signed) = ft
            .integer_properties()
            .map(|p| (p.size, p.is_signed))
            .unwrap_or((64, false));
        IntegerField {
            ft: ft.clone(),
            is_signed,
            range: integer_value_range(size, is_signed),
            value: None,
        }
    }

    pub fn field_type(&self) -> &FieldType {
        &self.ft
    }

    pub fn is_signed(&self) -> bool {
        self.is_signed
    }

    pub fn get(&self) -> Option<i128> {
        self.value
    }

    /// Sets the value, which must be within the range of the field type.
    pub fn set(&mut self, value: impl Into<i128>) -> Result<(), Error> {
        let value = value.into();
        let (min, max) = self.range;
        if value < min || value > max {
            return Err(Error::validation(format!(
                "value {value} is out of the [{min}, {max}] range of its integer field"
            )));
        }
        self.value = Some(value);
        Ok(())
    }

    fn value(&self) -> Value {
        match self.value {
            // set() keeps the value within 64 bits of the right signedness
            Some(v) if self.is_signed => Value::Signed(v as i64),
            Some(v) => Value::Unsigned(v as u64),
            None => Value::Null,
        }
    }

    fn assign(&mut self, value: &Value, id: FieldTypeId) -> Result<(), Error> {
        match value {
            Value::Null => {
                self.value = None;
                Ok(())
            }
            Value::Signed(v) => self.set(*v),
            Value::Unsigned(v) => self.set(*v),
            Value::Real(r) => self.set_real(*r),
            other => Err(Error::TypeConversion {
                expected: id,
                found: other.kind_name(),
            }),
        }
    }

    fn set_real(&mut self, r: f64) -> Result<(), Error> {
        if !r.is_finite() {
            return Err(Error::validation(format!(
                "cannot set integer field to non-finite value {r}"
            )));
        }
        // Saturating cast, the range check catches anything beyond 64 bits
        self.set(r.trunc() as i128)
    }
}

#[derive(Clone, Debug)]
pub struct FloatField {
    ft: FieldType,
    single_precision: bool,
    value: Option<f64>,
}

impl FloatField {
    fn new(ft: &FieldType) -> Self {
        let single_precision = match &*ft.kind() {
            FieldTypeKind::Float(p) => p.is_single_precision(),
            _ => false,
        };
        FloatField {
            ft: ft.clone(),
            single_precision,
            value: None,
        }
    }

    pub fn get(&self) -> Option<f64> {
        self.value
    }

    pub fn set(&mut self, value: f64) {
        self.value = Some(if self.single_precision {
            f64::from(value as f32)
        } else {
            value
        });
    }

    fn assign(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Null => self.value = None,
            Value::Signed(v) => self.set(*v as f64),
            Value::Unsigned(v) => self.set(*v as f64),
            Value::Real(v) => self.set(*v),
            other => {
                return Err(Error::TypeConversion {
                    expected: FieldTypeId::Float,
                    found: other.kind_name(),
                })
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct EnumerationField {
    ft: FieldType,
    container: IntegerField,
}

impl EnumerationField {
    pub fn field_type(&self) -> &FieldType {
        &self.ft
    }

    pub fn container(&self) -> &IntegerField {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut IntegerField {
        &mut self.container
    }

    /// Labels of every mapping containing the current value, in declaration order.
    pub fn labels(&self) -> Vec<String> {
        self.container
            .get()
            .and_then(|v| self.ft.mappings_by_value(v).ok())
            .map(|it| it.map(|m| m.name).collect())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug)]
pub struct StringField {
    ft: FieldType,
    value: Option<String>,
}

impl StringField {
    pub fn get(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set(&mut self, value: &str) {
        self.value = Some(value.to_owned());
    }

    pub fn append(&mut self, s: &str) {
        self.value.get_or_insert_with(String::new).push_str(s);
    }

    fn assign(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Null => self.value = None,
            Value::String(s) => self.set(s),
            other => {
                return Err(Error::TypeConversion {
                    expected: FieldTypeId::String,
                    found: other.kind_name(),
                })
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct StructureField {
    ft: FieldType,
    fields: Vec<(String, Field)>,
}

impl StructureField {
    pub fn field_type(&self) -> &FieldType {
        &self.ft
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }

    pub fn field_at(&self, index: usize) -> Option<(&str, &Field)> {
        self.fields.get(index).map(|(n, f)| (n.as_str(), f))
    }

    /// Members in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Assigns the value of an existing member. The members are fixed by the
    /// structure's type, so unknown names are an error.
    pub fn set<V: Into<Value>>(&mut self, name: &str, value: V) -> Result<(), Error> {
        self.field_mut(name)
            .ok_or_else(|| Error::not_found("structure field", name))?
            .set_value(value)
    }

    fn value(&self) -> Value {
        Value::Structure(
            self.fields
                .iter()
                .map(|(n, f)| (n.clone(), f.value()))
                .collect(),
        )
    }

    fn assign(&mut self, value: &Value) -> Result<(), Error> {
        let entries = match value {
            Value::Null => {
                self.fields.iter_mut().for_each(|(_, f)| f.reset());
                return Ok(());
            }
            Value::Structure(entries) => entries,
            other => {
                return Err(Error::TypeConversion {
                    expected: FieldTypeId::Structure,
                    found: other.kind_name(),
                })
            }
        };
        let mut staged = self.fields.clone();
        for (name, v) in entries {
            let (_, f) = staged
                .iter_mut()
                .find(|(n, _)| n == name)
                .ok_or_else(|| Error::not_found("structure field", name))?;
            f.assign(v)?;
        }
        self.fields = staged;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct VariantField {
    ft: FieldType,
    tag: Option<EnumerationField>,
    options: Vec<(String, Field)>,
}

impl VariantField {
    pub fn field_type(&self) -> &FieldType {
        &self.ft
    }

    pub fn tag(&self) -> Option<&EnumerationField> {
        self.tag.as_ref()
    }

    /// The tag field; changing its value changes the selected option.
    pub fn tag_mut(&mut self) -> Option<&mut EnumerationField> {
        self.tag.as_mut()
    }

    pub fn option(&self, name: &str) -> Option<&Field> {
        self.options.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    fn selected_index(&self) -> Option<usize> {
        let labels = self.tag.as_ref()?.labels();
        labels
            .iter()
            .find_map(|l| self.options.iter().position(|(n, _)| n == l))
    }

    /// The option selected by the current value of the tag, if any.
    pub fn selected(&self) -> Option<&Field> {
        self.selected_index().map(|i| &self.options[i].1)
    }

    pub fn selected_mut(&mut self) -> Option<&mut Field> {
        match self.selected_index() {
            Some(i) => Some(&mut self.options[i].1),
            None => None,
        }
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected_index().map(|i| self.options[i].0.as_str())
    }

    /// Forces the tag to the value of `tag`, then returns the option it selects.
    pub fn select_with_tag(&mut self, tag: &EnumerationField) -> Result<&mut Field, Error> {
        if let Some(tag_type) = self.ft.tag_type() {
            if tag_type != *tag.field_type() {
                return Err(Error::validation(
                    "tag field type doesn't match the variant's tag field type",
                ));
            }
        }
        self.tag = Some(tag.clone());
        let labels = tag.labels();
        self.selected_mut().ok_or_else(|| {
            Error::not_found("variant option for tag", format!("{labels:?}"))
        })
    }

    fn assign(&mut self, value: &Value) -> Result<(), Error> {
        match self.selected_mut() {
            Some(f) => f.assign(value),
            None if value.is_null() => Ok(()),
            None => Err(Error::validation(
                "cannot set the value of a variant field without a selected option",
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ArrayField {
    ft: FieldType,
    elements: Vec<Field>,
}

impl ArrayField {
    pub fn field_type(&self) -> &FieldType {
        &self.ft
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Field> {
        self.elements.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Field> {
        self.elements.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.elements.iter()
    }

    fn assign(&mut self, value: &Value) -> Result<(), Error> {
        let values = match value {
            Value::Null => {
                self.elements.iter_mut().for_each(Field::reset);
                return Ok(());
            }
            Value::Array(values) => values,
            other => {
                return Err(Error::TypeConversion {
                    expected: FieldTypeId::Array,
                    found: other.kind_name(),
                })
            }
        };
        if values.len() != self.elements.len() {
            return Err(Error::validation(format!(
                "expected {} values for array field, got {}",
                self.elements.len(),
                values.len()
            )));
        }
        let mut staged = self.elements.clone();
        assign_elements(&mut staged, values)?;
        self.elements = staged;
        Ok(())
    }
}

/// Largest number of elements a sequence field can hold.
pub const MAX_SEQUENCE_LENGTH: usize = 1 << 24;

#[derive(Clone, Debug)]
pub struct SequenceField {
    ft: FieldType,
    element_ft: FieldType,
    length: Option<IntegerField>,
    elements: Vec<Field>,
}

impl SequenceField {
    pub fn field_type(&self) -> &FieldType {
        &self.ft
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Field> {
        self.elements.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Field> {
        self.elements.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.elements.iter()
    }

    pub fn length_field(&self) -> Option<&IntegerField> {
        self.length.as_ref()
    }

    /// Sets the length field, which must be a set unsigned integer, and resizes
    /// the elements accordingly. Existing elements are kept.
    pub fn set_length_field(&mut self, length: IntegerField) -> Result<(), Error> {
        if length.is_signed() {
            return Err(Error::validation(
                "sequence length field must be an unsigned integer",
            ));
        }
        let len = length
            .get()
            .ok_or_else(|| Error::validation("sequence length field is not set"))?;
        let len = usize::try_from(len)
            .ok()
            .filter(|l| *l <= MAX_SEQUENCE_LENGTH)
            .ok_or_else(|| {
                Error::validation(format!(
                    "sequence length {len} exceeds the maximum of {MAX_SEQUENCE_LENGTH} elements"
                ))
            })?;
        if len > self.elements.len() {
            self.elements
                .try_reserve_exact(len - self.elements.len())
                .map_err(|e| {
                    Error::validation(format!("cannot allocate {len} sequence elements: {e}"))
                })?;
        }
        self.elements.truncate(len);
        while self.elements.len() < len {
            self.elements.push(Field::build(&self.element_ft));
        }
        self.length = Some(length);
        Ok(())
    }

    fn assign(&mut self, value: &Value) -> Result<(), Error> {
        let values = match value {
            Value::Null => {
                self.elements.iter_mut().for_each(Field::reset);
                return Ok(());
            }
            Value::Array(values) => values,
            other => {
                return Err(Error::TypeConversion {
                    expected: FieldTypeId::Sequence,
                    found: other.kind_name(),
                })
            }
        };
        let original_length = self.length.clone();
        let original_elements = self.elements.clone();
        let res = self.assign_values(values);
        if let Err(e) = &res {
            warn!(err = %e, "Rolling back sequence field assignment");
            self.length = original_length;
            self.elements = original_elements;
        }
        res
    }

    fn assign_values(&mut self, values: &[Value]) -> Result<(), Error> {
        let current = self.length.as_ref().and_then(IntegerField::get);
        if current != Some(values.len() as i128) {
            let length_ft = match &self.length {
                Some(l) => l.field_type().clone(),
                None => {
                    let ft = FieldType::integer(64, false)?;
                    ft.freeze();
                    ft
                }
            };
            let mut length = IntegerField::new(&length_ft);
            length.set(values.len() as u64)?;
            self.set_length_field(length)?;
        }
        assign_elements(&mut self.elements, values)
    }
}

fn assign_elements(elements: &mut [Field], values: &[Value]) -> Result<(), Error> {
    for (f, v) in elements.iter_mut().zip(values) {
        if !v.is_null() {
            f.assign(v)?;
        }
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub enum Field {
    Integer(IntegerField),
    Float(FloatField),
    Enumeration(EnumerationField),
    String(StringField),
    Structure(StructureField),
    Variant(VariantField),
    Array(ArrayField),
    Sequence(SequenceField),
}

impl Field {
    /// Creates an unset field conforming to `ft`. This freezes `ft`.
    pub fn new(ft: &FieldType) -> Self {
        ft.freeze();
        Self::build(ft)
    }

    fn build(ft: &FieldType) -> Self {
        let kind = ft.kind();
        match &*kind {
            FieldTypeKind::Integer(_) => Field::Integer(IntegerField::new(ft)),
            FieldTypeKind::Float(_) => Field::Float(FloatField::new(ft)),
            FieldTypeKind::Enumeration(e) => Field::Enumeration(EnumerationField {
                ft: ft.clone(),
                container: IntegerField::new(&e.container),
            }),
            FieldTypeKind::String { .. } => Field::String(StringField {
                ft: ft.clone(),
                value: None,
            }),
            FieldTypeKind::Structure { fields } => Field::Structure(StructureField {
                ft: ft.clone(),
                fields: fields
                    .iter()
                    .map(|(n, ft)| (n.clone(), Field::build(ft)))
                    .collect(),
            }),
            FieldTypeKind::Variant(v) => Field::Variant(VariantField {
                ft: ft.clone(),
                tag: v.tag_type.as_ref().and_then(|tt| match Field::build(tt) {
                    Field::Enumeration(e) => Some(e),
                    _ => None,
                }),
                options: v
                    .options
                    .iter()
                    .map(|(n, ft)| (n.clone(), Field::build(ft)))
                    .collect(),
            }),
            FieldTypeKind::Array { element, length } => Field::Array(ArrayField {
                ft: ft.clone(),
                elements: (0..*length).map(|_| Field::build(element)).collect(),
            }),
            FieldTypeKind::Sequence { element, .. } => Field::Sequence(SequenceField {
                ft: ft.clone(),
                element_ft: element.clone(),
                length: None,
                elements: Vec::new(),
            }),
        }
    }

    pub fn field_type(&self) -> &FieldType {
        match self {
            Field::Integer(f) => &f.ft,
            Field::Float(f) => &f.ft,
            Field::Enumeration(f) => &f.ft,
            Field::String(f) => &f.ft,
            Field::Structure(f) => &f.ft,
            Field::Variant(f) => &f.ft,
            Field::Array(f) => &f.ft,
            Field::Sequence(f) => &f.ft,
        }
    }

    pub fn id(&self) -> FieldTypeId {
        match self {
            Field::Integer(_) => FieldTypeId::Integer,
            Field::Float(_) => FieldTypeId::Float,
            Field::Enumeration(_) => FieldTypeId::Enumeration,
            Field::String(_) => FieldTypeId::String,
            Field::Structure(_) => FieldTypeId::Structure,
            Field::Variant(_) => FieldTypeId::Variant,
            Field::Array(_) => FieldTypeId::Array,
            Field::Sequence(_) => FieldTypeId::Sequence,
        }
    }

    /// The field's value. Unset scalars are [`Value::Null`], as is a variant
    /// without a selected option.
    pub fn value(&self) -> Value {
        match self {
            Field::Integer(f) => f.value(),
            Field::Float(f) => f.value.map(Value::Real).unwrap_or(Value::Null),
            Field::Enumeration(f) => f.container.value(),
            Field::String(f) => f.value.clone().map(Value::String).unwrap_or(Value::Null),
            Field::Structure(f) => f.value(),
            Field::Variant(f) => f.selected().map(Field::value).unwrap_or(Value::Null),
            Field::Array(f) => Value::Array(f.elements.iter().map(Field::value).collect()),
            Field::Sequence(f) => Value::Array(f.elements.iter().map(Field::value).collect()),
        }
    }

    /// Converts and assigns `value`. On error the field is left unchanged.
    pub fn set_value<V: Into<Value>>(&mut self, value: V) -> Result<(), Error> {
        self.assign(&value.into())
    }

    fn assign(&mut self, value: &Value) -> Result<(), Error> {
        match self {
            Field::Integer(f) => f.assign(value, FieldTypeId::Integer),
            Field::Float(f) => f.assign(value),
            Field::Enumeration(f) => f.container.assign(value, FieldTypeId::Enumeration),
            Field::String(f) => f.assign(value),
            Field::Structure(f) => f.assign(value),
            Field::Variant(f) => f.assign(value),
            Field::Array(f) => f.assign(value),
            Field::Sequence(f) => f.assign(value),
        }
    }

    /// Unsets every value in this tree. Sequence lengths and variant tags are kept.
    pub fn reset(&mut self) {
        match self {
            Field::Integer(f) => f.value = None,
            Field::Float(f) => f.value = None,
            Field::Enumeration(f) => f.container.value = None,
            Field::String(f) => f.value = None,
            Field::Structure(f) => f.fields.iter_mut().for_each(|(_, f)| f.reset()),
            Field::Variant(f) => f.options.iter_mut().for_each(|(_, f)| f.reset()),
            Field::Array(f) => f.elements.iter_mut().for_each(Field::reset),
            Field::Sequence(f) => f.elements.iter_mut().for_each(Field::reset),
        }
    }

    /// Returns true if every value reachable from this field is set.
    pub fn is_set(&self) -> bool {
        match self {
            Field::Integer(f) => f.value.is_some(),
            Field::Float(f) => f.value.is_some(),
            Field::Enumeration(f) => f.container.value.is_some(),
            Field::String(f) => f.value.is_some(),
            Field::Structure(f) => f.fields.iter().all(|(_, f)| f.is_set()),
            Field::Variant(f) => f.selected().map(Field::is_set).unwrap_or(false),
            Field::Array(f) => f.elements.iter().all(Field::is_set),
            Field::Sequence(f) => f.length.is_some() && f.elements.iter().all(Field::is_set),
        }
    }

    /// Follows selected variant options down to a non-variant field.
    /// A variant without a selected option is its own leaf.
    pub fn leaf(&self) -> &Field {
        match self {
            Field::Variant(v) => v.selected().map(Field::leaf).unwrap_or(self),
            _ => self,
        }
    }

    /// The value of a numeric (integer, enumeration or float) field.
    pub fn number(&self) -> Option<Number> {
        match self {
            Field::Integer(f) => f.value.map(Number::Integer),
            Field::Enumeration(f) => f.container.value.map(Number::Integer),
            Field::Float(f) => f.value.map(Number::Real),
            Field::Variant(_) => match self.leaf() {
                Field::Variant(_) => None,
                leaf => leaf.number(),
            },
            _ => None,
        }
    }

    /// The value of an integer or enumeration field.
    pub fn integral(&self) -> Option<Integral> {
        match self.number()? {
            Number::Integer(i) if self.leaf().id() != FieldTypeId::Float => Some(Integral(i)),
            _ => None,
        }
    }

    pub fn set_number<N: Into<Number>>(&mut self, n: N) -> Result<(), Error> {
        let n: Number = n.into();
        self.set_value(Value::from(n))
    }

    /// Applies `op` to the current numeric value and stores the result, with
    /// the usual conversion and range checks.
    pub fn update_number<F>(&mut self, op: F) -> Result<(), Error>
    where
        F: FnOnce(Number) -> Number,
    {
        let current = self
            .number()
            .ok_or_else(|| Error::validation(format!("{} field has no numeric value", self.id())))?;
        self.set_number(op(current))
    }

    pub fn update_integral<F>(&mut self, op: F) -> Result<(), Error>
    where
        F: FnOnce(Integral) -> Integral,
    {
        let current = self.integral().ok_or_else(|| {
            Error::validation(format!("{} field has no integral value", self.id()))
        })?;
        self.set_number(op(current))
    }

    pub fn as_integer(&self) -> Option<&IntegerField> {
        match self {
            Field::Integer(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_enumeration(&self) -> Option<&EnumerationField> {
        match self {
            Field::Enumeration(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringField> {
        match self {
            Field::String(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_string_mut(&mut self) -> Option<&mut StringField> {
        match self {
            Field::String(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&StructureField> {
        match self {
            Field::Structure(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_structure_mut(&mut self) -> Option<&mut StructureField> {
        match self {
            Field::Structure(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&VariantField> {
        match self {
            Field::Variant(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_variant_mut(&mut self) -> Option<&mut VariantField> {
        match self {
            Field::Variant(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayField> {
        match self {
            Field::Array(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceField> {
        match self {
            Field::Sequence(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut SequenceField> {
        match self {
            Field::Sequence(f) => Some(f),
            _ => None,
        }
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Field) -> bool {
        match (self.leaf(), other.leaf()) {
            (
                a @ (Field::Integer(_) | Field::Enumeration(_) | Field::Float(_)),
                b @ (Field::Integer(_) | Field::Enumeration(_) | Field::Float(_)),
            ) => a.number() == b.number(),
            (Field::String(a), Field::String(b)) => a.value == b.value,
            (Field::Structure(a), Field::Structure(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(n, f)| b.field(n).map(|g| f == g).unwrap_or(false))
            }
            (Field::Array(a), Field::Array(b)) => a.elements == b.elements,
            (Field::Sequence(a), Field::Sequence(b)) => a.elements == b.elements,
            (Field::Array(a), Field::Sequence(b)) | (Field::Sequence(b), Field::Array(a)) => {
                a.elements == b.elements
            }
            (Field::Variant(a), Field::Variant(b)) => a.ft == b.ft,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn uint(size: u32) -> FieldType {
        FieldType::integer(size, false).unwrap()
    }

    fn int(size: u32) -> FieldType {
        FieldType::integer(size, true).unwrap()
    }

    fn state_enum() -> FieldType {
        let ft = FieldType::enumeration(&uint(8)).unwrap();
        ft.add_unsigned_mapping("idle", 0, 0).unwrap();
        ft.add_unsigned_mapping("running", 1, 1).unwrap();
        ft.add_unsigned_mapping("inner", 2, 2).unwrap();
        ft
    }

    fn record_type() -> FieldType {
        let st = FieldType::structure();
        st.add_field("id", &uint(16)).unwrap();
        st.add_field("delta", &int(32)).unwrap();
        st.add_field("ratio", &FieldType::float()).unwrap();
        st.add_field("name", &FieldType::string()).unwrap();
        st.add_field("samples", &FieldType::array(&uint(8), 3))
            .unwrap();
        st
    }

    #[test]
    fn field_variant_matches_type_id() {
        for ft in [
            uint(8),
            FieldType::float(),
            state_enum(),
            FieldType::string(),
            record_type(),
            FieldType::variant("tag", Some(&state_enum())).unwrap(),
            FieldType::array(&uint(8), 2),
            FieldType::sequence(&uint(8), "len").unwrap(),
        ] {
            let f = Field::new(&ft);
            assert_eq!(f.id(), ft.id());
            assert!(ft.is_frozen());
        }
    }

    #[test]
    fn integer_range_boundaries() {
        let mut f = Field::new(&int(8));
        f.set_value(-128_i64).unwrap();
        assert_eq!(f.value(), Value::Signed(-128));
        f.set_value(127_i64).unwrap();
        assert!(matches!(f.set_value(128_i64), Err(Error::Validation(_))));
        assert!(matches!(f.set_value(-129_i64), Err(Error::Validation(_))));
        assert_eq!(f.value(), Value::Signed(127));

        let mut f = Field::new(&uint(64));
        f.set_value(u64::MAX).unwrap();
        assert_eq!(f.value(), Value::Unsigned(u64::MAX));
        assert!(f.set_value(-1_i64).is_err());
    }

    #[test]
    fn integer_conversions() {
        let mut f = Field::new(&int(32));
        f.set_value(-3.9).unwrap();
        assert_eq!(f.value(), Value::Signed(-3));
        assert!(f.set_value(f64::NAN).is_err());
        assert!(matches!(
            f.set_value("12"),
            Err(Error::TypeConversion {
                expected: FieldTypeId::Integer,
                ..
            })
        ));
        let mut s = Field::new(&FieldType::string());
        assert!(matches!(s.set_value(12), Err(Error::TypeConversion { .. })));
        s.set_value("hello").unwrap();
        s.as_string_mut().unwrap().append(" world");
        assert_eq!(s.value(), Value::from("hello world"));
    }

    #[test]
    fn single_precision_floats_are_rounded() {
        let mut f = Field::new(&FieldType::float_with_digits(8, 24).unwrap());
        f.set_value(0.1).unwrap();
        assert_eq!(f.value(), Value::Real(f64::from(0.1_f32)));
        let mut d = Field::new(&FieldType::float());
        d.set_value(3_u64).unwrap();
        assert_eq!(d.value(), Value::Real(3.0));
    }

    #[test]
    fn structure_set_never_creates_members() {
        let mut f = Field::new(&record_type());
        let st = f.as_structure_mut().unwrap();
        st.set("id", 7_u64).unwrap();
        assert!(matches!(
            st.set("nope", 1),
            Err(Error::NotFound { .. })
        ));
        assert_eq!(st.len(), 5);
        assert_eq!(st.field("id").unwrap().value(), Value::Unsigned(7));
        assert_eq!(st.field_at(1).unwrap().0, "delta");
    }

    #[test]
    fn structure_assignment_is_all_or_nothing() {
        let mut f = Field::new(&record_type());
        f.as_structure_mut().unwrap().set("id", 1_u64).unwrap();
        let res = f.set_value(Value::Structure(vec![
            ("id".to_owned(), Value::Unsigned(2)),
            ("delta".to_owned(), Value::from("oops")),
        ]));
        assert!(res.is_err());
        let st = f.as_structure().unwrap();
        assert_eq!(st.field("id").unwrap().value(), Value::Unsigned(1));
    }

    #[test]
    fn deep_copy_of_structure_is_equal_and_independent() {
        let mut a = Field::new(&record_type());
        a.set_value(Value::Structure(vec![
            ("id".to_owned(), Value::Unsigned(3)),
            ("delta".to_owned(), Value::Signed(-4)),
            ("ratio".to_owned(), Value::Real(0.5)),
            ("name".to_owned(), Value::from("x")),
            (
                "samples".to_owned(),
                Value::Array(vec![1_u64.into(), 2_u64.into(), 3_u64.into()]),
            ),
        ]))
        .unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.as_structure_mut().unwrap().set("id", 4_u64).unwrap();
        assert!(a != b);
        assert_eq!(
            a.as_structure().unwrap().field("id").unwrap().value(),
            Value::Unsigned(3)
        );
    }

    #[test]
    fn array_requires_exact_length_and_skips_nulls() {
        let mut f = Field::new(&FieldType::array(&uint(8), 3));
        f.set_value(Value::Array(vec![1_u64.into(), 2_u64.into(), 3_u64.into()]))
            .unwrap();
        assert!(f.set_value(Value::Array(vec![1_u64.into()])).is_err());
        f.set_value(Value::Array(vec![Value::Null, 9_u64.into(), Value::Null]))
            .unwrap();
        assert_eq!(
            f.value(),
            Value::Array(vec![1_u64.into(), 9_u64.into(), 3_u64.into()])
        );
    }

    #[test]
    fn sequence_assignment_creates_a_default_length_field() {
        let mut f = Field::new(&FieldType::sequence(&uint(8), "len").unwrap());
        assert!(f.as_sequence().unwrap().length_field().is_none());
        f.set_value(Value::Array(vec![4_u64.into(), 5_u64.into()]))
            .unwrap();
        let seq = f.as_sequence().unwrap();
        let len = seq.length_field().unwrap();
        assert_eq!(len.get(), Some(2));
        assert_eq!(
            len.field_type().integer_properties().unwrap().size,
            64
        );
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn sequence_assignment_rolls_back_on_failure() {
        let mut f = Field::new(&FieldType::sequence(&uint(8), "len").unwrap());
        f.set_value(Value::Array(vec![1_u64.into(), 2_u64.into()]))
            .unwrap();
        let res = f.set_value(Value::Array(vec![
            10_u64.into(),
            20_u64.into(),
            300_u64.into(),
        ]));
        assert!(matches!(res, Err(Error::Validation(_))));
        let seq = f.as_sequence().unwrap();
        assert_eq!(seq.length_field().unwrap().get(), Some(2));
        assert_eq!(f.value(), Value::Array(vec![1_u64.into(), 2_u64.into()]));
    }

    #[test]
    fn sequence_length_field_type_bounds_the_length() {
        let mut f = Field::new(&FieldType::sequence(&uint(8), "len").unwrap());
        let len_ft = uint(2);
        let mut len = IntegerField::new(&len_ft);
        len.set(1_u64).unwrap();
        f.as_sequence_mut().unwrap().set_length_field(len).unwrap();
        assert_eq!(f.as_sequence().unwrap().len(), 1);
        let too_long: Vec<Value> = (0..5_u64).map(Value::from).collect();
        assert!(f.set_value(Value::Array(too_long)).is_err());
        assert_eq!(f.as_sequence().unwrap().len(), 1);

        let mut signed_len = IntegerField::new(&int(8));
        signed_len.set(1).unwrap();
        assert!(f
            .as_sequence_mut()
            .unwrap()
            .set_length_field(signed_len)
            .is_err());
    }

    #[test]
    fn huge_sequence_lengths_are_rejected() {
        let mut f = Field::new(&FieldType::sequence(&uint(8), "len").unwrap());
        f.set_value(Value::Array(vec![Value::Unsigned(7)])).unwrap();
        let len_ft = uint(64);
        for huge in [1_u64 << 40, u64::MAX, MAX_SEQUENCE_LENGTH as u64 + 1] {
            let mut len = IntegerField::new(&len_ft);
            len.set(huge).unwrap();
            assert!(matches!(
                f.as_sequence_mut().unwrap().set_length_field(len),
                Err(Error::Validation(_))
            ));
            let seq = f.as_sequence().unwrap();
            assert_eq!(seq.len(), 1);
            assert_eq!(seq.length_field().unwrap().get(), Some(1));
        }
    }

    fn nested_variant_type() -> FieldType {
        let inner = FieldType::variant("inner_tag", Some(&state_enum())).unwrap();
        inner.add_option("idle", &FieldType::string()).unwrap();
        inner.add_option("running", &uint(32)).unwrap();
        let outer = FieldType::variant("tag", Some(&state_enum())).unwrap();
        outer.add_option("idle", &FieldType::string()).unwrap();
        outer.add_option("inner", &inner).unwrap();
        outer
    }

    #[test]
    fn variant_selection_follows_the_tag() {
        let mut f = Field::new(&nested_variant_type());
        assert!(f.as_variant().unwrap().selected().is_none());
        assert_eq!(f.value(), Value::Null);
        let v = f.as_variant_mut().unwrap();
        v.tag_mut().unwrap().container_mut().set(0_u64).unwrap();
        assert_eq!(v.selected_name(), Some("idle"));
        v.tag_mut().unwrap().container_mut().set(2_u64).unwrap();
        assert_eq!(v.selected_name(), Some("inner"));
        v.tag_mut().unwrap().container_mut().set(1_u64).unwrap();
        assert!(v.selected().is_none(), "no 'running' option at the outer level");
    }

    #[test]
    fn variant_equals_its_resolved_leaf() {
        let mut f = Field::new(&nested_variant_type());
        let mut tag = Field::new(&state_enum());
        tag.set_value(2_u64).unwrap();
        let tag = tag.as_enumeration().unwrap().clone();
        let inner = f.as_variant_mut().unwrap().select_with_tag(&tag).unwrap();

        let mut inner_tag = Field::new(&state_enum());
        inner_tag.set_value(1_u64).unwrap();
        let inner_tag = inner_tag.as_enumeration().unwrap().clone();
        let leaf = inner
            .as_variant_mut()
            .unwrap()
            .select_with_tag(&inner_tag)
            .unwrap();
        leaf.set_value(42_u64).unwrap();

        let mut expected = Field::new(&uint(32));
        expected.set_value(42_u64).unwrap();
        assert_eq!(f.value(), Value::Unsigned(42));
        assert_eq!(f, expected);
        assert_eq!(expected, f);
        assert_eq!(f.leaf().id(), FieldTypeId::Integer);

        f.set_value(43_u64).unwrap();
        assert!(f != expected);
    }

    #[test]
    fn select_with_tag_checks_the_tag_type() {
        let mut f = Field::new(&nested_variant_type());
        let other = FieldType::enumeration(&uint(16)).unwrap();
        other.add_unsigned_mapping("idle", 0, 0).unwrap();
        let tag = Field::new(&other);
        assert!(f
            .as_variant_mut()
            .unwrap()
            .select_with_tag(tag.as_enumeration().unwrap())
            .is_err());
    }

    #[test]
    fn enumeration_labels() {
        let mut f = Field::new(&state_enum());
        assert!(f.as_enumeration().unwrap().labels().is_empty());
        f.set_value(1_u64).unwrap();
        assert_eq!(f.as_enumeration().unwrap().labels(), vec!["running"]);
        assert!(f.set_value(256_u64).is_err());
    }

    #[test]
    fn numeric_updates_are_validated() {
        let mut f = Field::new(&uint(8));
        f.set_value(250_u64).unwrap();
        f.update_number(|n| n + Number::from(5_i64)).unwrap();
        assert_eq!(f.value(), Value::Unsigned(255));
        assert!(f.update_number(|n| n + Number::from(1_i64)).is_err());
        assert_eq!(f.value(), Value::Unsigned(255));
        f.update_number(|n| n / Number::from(2_i64)).unwrap();
        assert_eq!(f.value(), Value::Unsigned(127));
        f.update_integral(|i| i & Integral(0x0f)).unwrap();
        assert_eq!(f.integral(), Some(Integral(0x0f)));
        assert!(f.update_number(|n| n / Number::from(0_i64)).is_err());

        let mut real = Field::new(&FieldType::float());
        real.set_value(1.5).unwrap();
        assert!(real.integral().is_none());
        real.update_number(|n| n * Number::from(2_i64)).unwrap();
        assert_eq!(real.number(), Some(Number::Real(3.0)));

        let mut unset = Field::new(&uint(8));
        assert!(unset.update_number(|n| n).is_err());
    }

    #[test]
    fn numeric_fields_compare_by_value() {
        let mut a = Field::new(&uint(8));
        let mut b = Field::new(&FieldType::float());
        a.set_value(2_u64).unwrap();
        b.set_value(2.0).unwrap();
        assert_eq!(a, b);
        let mut s = Field::new(&FieldType::string());
        s.set_value("2").unwrap();
        assert!(a != s);
    }
}
