use super::field_to_attrs;
use crate::attrs::{AttrKey, AttrVal, EventAttrKey};
use crate::error::Error;
use crate::event::Event;
use crate::field::Field;
use std::collections::BTreeMap;
use tracing::warn;

const EMPTY_PREFIX: &str = "";

#[derive(Clone, PartialEq, Debug)]
pub struct EventAttrs {
    attrs: BTreeMap<AttrKey, AttrVal>,
}

impl EventAttrs {
    pub fn new(event: &Event) -> Result<Self, Error> {
        let mut attrs = BTreeMap::new();
        let ec = event.event_class();
        let sc = event.stream_class();

        {
            let props = ec.properties();
            attrs.insert(EventAttrKey::Name.into(), props.name.as_str().into());
            if let Some(id) = props.id {
                attrs.insert(EventAttrKey::Id.into(), id.into());
            }
            if let Some(ll) = props.log_level {
                attrs.insert(EventAttrKey::LogLevel.into(), ll.to_string().into());
            }
            if let Some(uri) = &props.emf_uri {
                attrs.insert(EventAttrKey::EmfUri.into(), uri.as_str().into());
            }
        }
        if let Some(id) = sc.id() {
            attrs.insert(EventAttrKey::StreamClassId.into(), id.into());
        }
        if let Some(id) = event.stream().and_then(|s| s.id()) {
            attrs.insert(EventAttrKey::StreamId.into(), id.into());
        }

        let snapshot = sc
            .default_clock_class()
            .and_then(|cc| event.clock_values().get(&cc).cloned());
        if let Some(cv) = snapshot {
            attrs.insert(EventAttrKey::ClockSnapshot.into(), cv.cycles().into());
            match cv.ns_from_origin() {
                Ok(ns) if ns >= 0 => {
                    attrs.insert(EventAttrKey::Timestamp.into(), ns.into());
                }
                _ => warn!(
                    event_class = %ec.name(),
                    cycles = cv.cycles(),
                    "Dropping event timestamp, it isn't representable as nanoseconds since the origin"
                ),
            }
        }

        insert_field_attrs(&mut attrs, event.header(), EventAttrKey::Header)?;
        insert_field_attrs(
            &mut attrs,
            event.stream_event_context(),
            EventAttrKey::CommonContext,
        )?;
        insert_field_attrs(&mut attrs, event.context(), EventAttrKey::SpecificContext)?;
        if let Some(packet) = event.packet() {
            insert_field_attrs(
                &mut attrs,
                packet.context().as_deref(),
                EventAttrKey::PacketContext,
            )?;
        }
        insert_field_attrs(&mut attrs, event.payload(), EventAttrKey::Field)?;

        Ok(Self { attrs })
    }

    pub fn get(&self, key: &AttrKey) -> Option<&AttrVal> {
        self.attrs.get(key)
    }

    pub fn attr_kvs(&self) -> Vec<(AttrKey, AttrVal)> {
        self.attrs.clone().into_iter().collect()
    }
}

fn insert_field_attrs(
    attrs: &mut BTreeMap<AttrKey, AttrVal>,
    root: Option<&Field>,
    to_key: fn(String) -> EventAttrKey,
) -> Result<(), Error> {
    if let Some(f) = root {
        for (k, v) in field_to_attrs(EMPTY_PREFIX, f)? {
            attrs.insert(to_key(k).into(), v);
        }
    }
    Ok(())
}
