use super::{FieldType, FieldTypeKind};
use std::fmt;

/// The inclusive value range of an enumeration mapping, typed after the
/// signedness of the enumeration's container integer type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MappingRange {
    Signed { lower: i64, upper: i64 },
    Unsigned { lower: u64, upper: u64 },
}

impl MappingRange {
    pub fn lower(&self) -> i128 {
        match self {
            MappingRange::Signed { lower, .. } => i128::from(*lower),
            MappingRange::Unsigned { lower, .. } => i128::from(*lower),
        }
    }

    pub fn upper(&self) -> i128 {
        match self {
            MappingRange::Signed { upper, .. } => i128::from(*upper),
            MappingRange::Unsigned { upper, .. } => i128::from(*upper),
        }
    }

    pub fn contains(&self, value: i128) -> bool {
        self.lower() <= value && value <= self.upper()
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct EnumerationMapping {
    pub name: String,
    pub range: MappingRange,
}

impl fmt::Display for EnumerationMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}, {}]",
            self.name,
            self.range.lower(),
            self.range.upper()
        )
    }
}

#[derive(Clone, Debug)]
enum MappingFilter {
    All,
    Name(String),
    Value(i128),
}

impl MappingFilter {
    fn matches(&self, m: &EnumerationMapping) -> bool {
        match self {
            MappingFilter::All => true,
            MappingFilter::Name(n) => &m.name == n,
            MappingFilter::Value(v) => m.range.contains(*v),
        }
    }
}

/// Lazily walks the mappings of an enumeration field type in declaration
/// order, yielding the ones that match. Each lookup returns a new iterator.
#[derive(Clone, Debug)]
pub struct MappingIter {
    ft: FieldType,
    at: usize,
    filter: MappingFilter,
}

impl MappingIter {
    pub(super) fn all(ft: &FieldType) -> Self {
        Self::new(ft, MappingFilter::All)
    }

    pub(super) fn by_name(ft: &FieldType, name: &str) -> Self {
        Self::new(ft, MappingFilter::Name(name.to_owned()))
    }

    pub(super) fn by_value(ft: &FieldType, value: i128) -> Self {
        Self::new(ft, MappingFilter::Value(value))
    }

    fn new(ft: &FieldType, filter: MappingFilter) -> Self {
        MappingIter {
            ft: ft.clone(),
            at: 0,
            filter,
        }
    }
}

impl Iterator for MappingIter {
    type Item = EnumerationMapping;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.ft.kind();
        let mappings = match &*kind {
            FieldTypeKind::Enumeration(e) => &e.mappings,
            _ => return None,
        };
        while let Some(m) = mappings.get(self.at) {
            self.at += 1;
            if self.filter.matches(m) {
                return Some(m.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn overlapping_enum() -> FieldType {
        let container = FieldType::integer(8, true).unwrap();
        let ft = FieldType::enumeration(&container).unwrap();
        ft.add_signed_mapping("LOW", -10, 0).unwrap();
        ft.add_signed_mapping("MID", -2, 5).unwrap();
        ft.add_signed_mapping("HIGH", 3, 100).unwrap();
        ft.add_signed_mapping("MID", 50, 60).unwrap();
        ft
    }

    fn names(it: MappingIter) -> Vec<String> {
        it.map(|m| m.name).collect()
    }

    #[test]
    fn by_value_yields_every_overlap_in_declaration_order() {
        let ft = overlapping_enum();
        assert_eq!(names(ft.mappings_by_value(-1).unwrap()), vec!["LOW", "MID"]);
        assert_eq!(names(ft.mappings_by_value(4).unwrap()), vec!["MID", "HIGH"]);
        assert_eq!(names(ft.mappings_by_value(55).unwrap()), vec!["HIGH", "MID"]);
        assert!(names(ft.mappings_by_value(101).unwrap()).is_empty());
    }

    #[test]
    fn by_name_yields_every_mapping_with_that_name() {
        let ft = overlapping_enum();
        let mids: Vec<EnumerationMapping> = ft.mappings_by_name("MID").collect();
        assert_eq!(
            mids,
            vec![
                EnumerationMapping {
                    name: "MID".to_owned(),
                    range: MappingRange::Signed { lower: -2, upper: 5 }
                },
                EnumerationMapping {
                    name: "MID".to_owned(),
                    range: MappingRange::Signed {
                        lower: 50,
                        upper: 60
                    }
                },
            ]
        );
        assert!(ft.mappings_by_name("NOPE").next().is_none());
    }

    #[test]
    fn lookups_are_restartable() {
        let ft = overlapping_enum();
        let mut first = ft.mappings_by_value(4).unwrap();
        assert_eq!(first.next().unwrap().name, "MID");
        // A new lookup starts over, independently of the first one
        assert_eq!(names(ft.mappings_by_value(4).unwrap()), vec!["MID", "HIGH"]);
        assert_eq!(first.next().unwrap().name, "HIGH");
        assert!(first.next().is_none());
    }

    #[test]
    fn value_lookup_is_checked_against_signedness() {
        let container = FieldType::integer(32, false).unwrap();
        let ft = FieldType::enumeration(&container).unwrap();
        ft.add_unsigned_mapping("A", 0, 10).unwrap();
        assert!(matches!(ft.mappings_by_value(-1), Err(Error::Validation(_))));
        assert!(ft.add_signed_mapping("B", 0, 1).is_err());
        assert_eq!(names(ft.mappings_by_value(3_u64).unwrap()), vec!["A"]);
    }

    #[test]
    fn mapping_ranges_are_validated() {
        let container = FieldType::integer(4, false).unwrap();
        let ft = FieldType::enumeration(&container).unwrap();
        assert!(ft.add_unsigned_mapping("A", 5, 1).is_err());
        assert!(ft.add_unsigned_mapping("A", 0, 16).is_err());
        ft.add_unsigned_mapping("A", 0, 15).unwrap();
    }

    #[test]
    fn mapped_container_keeps_its_signedness_and_size() {
        let container = FieldType::integer(8, false).unwrap();
        let ft = FieldType::enumeration(&container).unwrap();
        container.set_size(16).unwrap();
        ft.add_unsigned_mapping("A", 0, 300).unwrap();

        assert!(container.is_frozen());
        assert!(matches!(container.set_is_signed(true), Err(Error::Frozen(_))));
        assert!(matches!(container.set_size(8), Err(Error::Frozen(_))));
        assert!(!ft.is_frozen());
        ft.add_unsigned_mapping("B", 301, 400).unwrap();
        assert_eq!(names(ft.mappings_by_value(350_u64).unwrap()), vec!["B"]);
        assert!(ft.mappings_by_value(-1).is_err());

        let copy = ft.deep_copy();
        assert!(!copy.is_frozen());
        assert!(copy.container_type().unwrap().is_frozen());
    }
}
