use crate::attrs::{AttrKey, AttrVal, TraceAttrKey};
use crate::trace::{EnvValue, Trace};
use std::collections::BTreeMap;

#[derive(Clone, PartialEq, Debug)]
pub struct TraceAttrs {
    attrs: BTreeMap<AttrKey, AttrVal>,
}

impl TraceAttrs {
    pub fn new(t: &Trace) -> Self {
        let mut attrs = BTreeMap::new();
        let props = t.properties();

        if let Some(name) = &props.name {
            attrs.insert(TraceAttrKey::Name.into(), name.as_str().into());
        }
        if let Some(uuid) = &props.uuid {
            attrs.insert(TraceAttrKey::Uuid.into(), uuid.to_string().into());
        }
        if let Some(bo) = &props.native_byte_order {
            attrs.insert(TraceAttrKey::NativeByteOrder.into(), bo.to_string().into());
        }
        attrs.insert(TraceAttrKey::IsStatic.into(), t.is_static().into());
        attrs.insert(
            TraceAttrKey::StreamCount.into(),
            (t.stream_count() as u64).into(),
        );
        attrs.insert(TraceAttrKey::StreamClassCount.into(), (t.len() as u64).into());
        attrs.insert(
            TraceAttrKey::ClockClassCount.into(),
            (t.clock_class_count() as u64).into(),
        );

        for (k, v) in t.environment().iter() {
            attrs.insert(
                TraceAttrKey::Env(k.to_owned()).into(),
                match v {
                    EnvValue::Integer(int) => AttrVal::Integer(*int),
                    EnvValue::String(s) => AttrVal::String(s.clone()),
                },
            );
        }

        Self { attrs }
    }

    pub fn get(&self, key: &AttrKey) -> Option<&AttrVal> {
        self.attrs.get(key)
    }

    pub fn attr_kvs(&self) -> Vec<(AttrKey, AttrVal)> {
        self.attrs.clone().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn trace_metadata_and_environment() {
        let t = Trace::new();
        t.set_name("kernel").unwrap();
        let uuid = Uuid::from_u128(0xa1a2_a3a4_b1b2_c1c2_d1d2_d3d4_d5d6_d7d8);
        t.set_uuid(uuid).unwrap();
        t.set_environment_entry("hostname", "box").unwrap();
        t.set_environment_entry("tracer_major", 2_i64).unwrap();

        let attrs = TraceAttrs::new(&t);
        assert_eq!(
            attrs.get(&TraceAttrKey::Name.into()),
            Some(&AttrVal::String("kernel".to_owned()))
        );
        assert_eq!(
            attrs.get(&TraceAttrKey::Uuid.into()),
            Some(&AttrVal::String(uuid.to_string()))
        );
        assert_eq!(
            attrs.get(&TraceAttrKey::Env("tracer_major".to_owned()).into()),
            Some(&AttrVal::Integer(2))
        );
        assert_eq!(
            attrs.get(&TraceAttrKey::StreamCount.into()),
            Some(&AttrVal::Integer(0))
        );
        assert_eq!(
            attrs.get(&TraceAttrKey::IsStatic.into()),
            Some(&AttrVal::Bool(false))
        );
    }
}
