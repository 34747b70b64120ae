//! Flat `key = value` renderings of traces, streams and events.

use crate::attrs::{AttrKey, AttrVal};
use crate::error::Error;
use crate::field::{Field, Value};
use crate::trace::Trace;
use std::collections::BTreeMap;

pub use event::EventAttrs;
pub use stream::StreamAttrs;
pub use trace::TraceAttrs;

pub(crate) mod event;
pub(crate) mod stream;
pub(crate) mod trace;

/// The attributes of a trace and of each of its streams.
#[derive(Clone, PartialEq, Debug)]
pub struct TraceDescription {
    pub trace: TraceAttrs,
    pub streams: Vec<StreamAttrs>,
}

impl TraceDescription {
    pub fn new(t: &Trace) -> Self {
        TraceDescription {
            trace: TraceAttrs::new(t),
            streams: t.streams().iter().map(StreamAttrs::new).collect(),
        }
    }

    /// Each stream's attributes merged with the trace's.
    pub fn streams_with_trace_attrs(&self) -> impl Iterator<Item = Vec<(AttrKey, AttrVal)>> + '_ {
        let trace_attr_kvs = self.trace.attr_kvs();
        self.streams.iter().map(move |s| {
            let mut attr_kvs = s.attr_kvs();
            attr_kvs.extend_from_slice(&trace_attr_kvs);
            attr_kvs
        })
    }
}

/// Yields a map of `<prefix>.<possibly.nested.key>` to value.
pub(crate) fn field_to_attrs(prefix: &str, f: &Field) -> Result<BTreeMap<String, AttrVal>, Error> {
    let gen = FieldToAttrKeysGen::new(prefix)?;
    Ok(gen.generate(f))
}

/// Walks a field tree, building dotted keys from member names.
///
/// Array and sequence elements are keyed by their index, a variant by the name
/// of its selected option. Unset scalars produce no attribute.
#[derive(Debug)]
struct FieldToAttrKeysGen {
    // Invariant: never empty, the first entry is the key prefix.
    // Invariant: no entry contains a '.', member names are CTF identifiers.
    attr_key_stack: Vec<String>,
    attrs: BTreeMap<String, AttrVal>,
}

impl FieldToAttrKeysGen {
    fn new(key_prefix: &str) -> Result<Self, Error> {
        if key_prefix.starts_with('.') || key_prefix.ends_with('.') {
            Err(Error::validation(format!(
                "attribute key prefix '{key_prefix}' can't start or end with a '.'"
            )))
        } else {
            Ok(Self {
                attr_key_stack: vec![key_prefix.to_owned()],
                attrs: Default::default(),
            })
        }
    }

    fn generate(mut self, root: &Field) -> BTreeMap<String, AttrVal> {
        self.visit(root);
        self.attrs
    }

    fn visit(&mut self, f: &Field) {
        match f {
            Field::Structure(s) => {
                for (name, member) in s.iter() {
                    self.nested(name.to_owned(), member);
                }
            }
            Field::Variant(v) => {
                if let (Some(name), Some(selected)) = (v.selected_name(), v.selected()) {
                    self.nested(name.to_owned(), selected);
                }
            }
            Field::Array(a) => {
                for (i, element) in a.iter().enumerate() {
                    self.nested(i.to_string(), element);
                }
            }
            Field::Sequence(s) => {
                for (i, element) in s.iter().enumerate() {
                    self.nested(i.to_string(), element);
                }
            }
            Field::Enumeration(e) => {
                let key = self.current_key();
                // Values mapping to zero or several labels get no `.label` attr
                if let [label] = e.labels().as_slice() {
                    self.attrs
                        .insert(join_key(&key, "label"), label.clone().into());
                }
                if let Some(v) = scalar_value_to_attr(f.value()) {
                    self.attrs.insert(key, v);
                }
            }
            _ => {
                if let Some(v) = scalar_value_to_attr(f.value()) {
                    let key = self.current_key();
                    self.attrs.insert(key, v);
                }
            }
        }
    }

    fn nested(&mut self, component: String, f: &Field) {
        self.attr_key_stack.push(component);
        self.visit(f);
        let _ = self.attr_key_stack.pop();
    }

    fn current_key(&self) -> String {
        self.attr_key_stack
            .iter()
            .filter(|k| !k.is_empty())
            .cloned()
            .collect::<Vec<String>>()
            .join(".")
    }
}

fn join_key(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        suffix.to_owned()
    } else {
        format!("{prefix}.{suffix}")
    }
}

fn scalar_value_to_attr(v: Value) -> Option<AttrVal> {
    match v {
        Value::Signed(v) => Some(v.into()),
        Value::Unsigned(v) => Some(v.into()),
        Value::Real(v) => Some(v.into()),
        Value::String(v) => Some(v.into()),
        Value::Null | Value::Structure(_) | Value::Array(_) => None,
    }
}
