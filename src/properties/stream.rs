use crate::attrs::{AttrKey, AttrVal, StreamAttrKey, CLOCK_STYLE_RELATIVE, CLOCK_STYLE_UTC};
use crate::stream::Stream;
use std::collections::BTreeMap;

#[derive(Clone, PartialEq, Debug)]
pub struct StreamAttrs {
    attrs: BTreeMap<AttrKey, AttrVal>,
}

impl StreamAttrs {
    pub fn new(s: &Stream) -> Self {
        let mut attrs = BTreeMap::new();
        let sc = s.stream_class();

        // Unnamed streams follow the "stream{id}" convention of LTTng traces
        let stream_name = s
            .name()
            .or_else(|| s.id().map(|id| format!("stream{id}")))
            .unwrap_or_else(|| "stream".to_owned());

        attrs.insert(
            StreamAttrKey::Description.into(),
            format!("CTF stream '{stream_name}'").into(),
        );
        attrs.insert(StreamAttrKey::Name.into(), stream_name.into());
        if let Some(id) = s.id() {
            attrs.insert(StreamAttrKey::Id.into(), id.into());
        }
        attrs.insert(
            StreamAttrKey::DiscardedEvents.into(),
            s.discarded_events().into(),
        );

        if let Some(id) = sc.id() {
            attrs.insert(StreamAttrKey::ClassId.into(), id.into());
        }
        if let Some(name) = sc.name() {
            attrs.insert(StreamAttrKey::ClassName.into(), name.into());
        }
        attrs.insert(
            StreamAttrKey::ClassEventClassCount.into(),
            (sc.event_class_count() as u64).into(),
        );

        if let Some(cc) = sc.default_clock_class() {
            let c = cc.properties();
            attrs.insert(StreamAttrKey::ClockFreq.into(), c.frequency.into());
            attrs.insert(
                StreamAttrKey::ClockOffsetSeconds.into(),
                c.offset_seconds.into(),
            );
            attrs.insert(
                StreamAttrKey::ClockOffsetCycles.into(),
                c.offset_cycles.into(),
            );
            attrs.insert(StreamAttrKey::ClockPrecision.into(), c.precision.into());
            attrs.insert(StreamAttrKey::ClockAbsolute.into(), c.is_absolute.into());
            attrs.insert(StreamAttrKey::ClockName.into(), c.name.as_str().into());
            if let Some(cd) = &c.description {
                attrs.insert(StreamAttrKey::ClockDesc.into(), cd.as_str().into());
            }
            if let Some(cid) = &c.uuid {
                attrs.insert(StreamAttrKey::ClockUuid.into(), cid.to_string().into());
                attrs.insert(StreamAttrKey::TimeDomain.into(), cid.to_string().into());
            }
            attrs.insert(
                StreamAttrKey::ClockStyle.into(),
                AttrVal::from(if c.is_absolute {
                    CLOCK_STYLE_UTC
                } else {
                    CLOCK_STYLE_RELATIVE
                }),
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
