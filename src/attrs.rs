use derive_more::{Display, From, Into};

pub(crate) const CLOCK_STYLE_RELATIVE: &str = "relative";
pub(crate) const CLOCK_STYLE_UTC: &str = "utc";

/// A dotted attribute key, e.g. `event.common_context.cpu_id`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From, Into)]
pub struct AttrKey(String);

impl AttrKey {
    pub fn new(key: String) -> Self {
        AttrKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AttrKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, PartialEq, Debug, Display, From)]
pub enum AttrVal {
    Integer(i64),
    BigInt(i128),
    Float(f64),
    Bool(bool),
    #[display(fmt = "{:?}", _0)]
    String(String),
}

impl From<&str> for AttrVal {
    fn from(s: &str) -> Self {
        AttrVal::String(s.to_owned())
    }
}

impl From<u64> for AttrVal {
    fn from(v: u64) -> Self {
        i64::try_from(v)
            .map(AttrVal::Integer)
            .unwrap_or_else(|_| AttrVal::BigInt(v.into()))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum TraceAttrKey {
    #[display(fmt = "trace.name")]
    Name,
    #[display(fmt = "trace.uuid")]
    Uuid,
    #[display(fmt = "trace.native_byte_order")]
    NativeByteOrder,
    #[display(fmt = "trace.is_static")]
    IsStatic,
    #[display(fmt = "trace.stream_count")]
    StreamCount,
    #[display(fmt = "trace.stream_class_count")]
    StreamClassCount,
    #[display(fmt = "trace.clock_class_count")]
    ClockClassCount,
    #[display(fmt = "trace.env.{_0}")]
    Env(String),
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum StreamAttrKey {
    #[display(fmt = "stream.name")]
    Name,
    #[display(fmt = "stream.description")]
    Description,
    #[display(fmt = "stream.id")]
    Id,
    #[display(fmt = "stream.discarded_events")]
    DiscardedEvents,
    #[display(fmt = "stream.class.id")]
    ClassId,
    #[display(fmt = "stream.class.name")]
    ClassName,
    #[display(fmt = "stream.class.event_class_count")]
    ClassEventClassCount,
    #[display(fmt = "stream.clock_style")]
    ClockStyle,
    #[display(fmt = "stream.time_domain")]
    TimeDomain,

    #[display(fmt = "stream.clock.frequency")]
    ClockFreq,
    #[display(fmt = "stream.clock.offset_seconds")]
    ClockOffsetSeconds,
    #[display(fmt = "stream.clock.offset_cycles")]
    ClockOffsetCycles,
    #[display(fmt = "stream.clock.precision")]
    ClockPrecision,
    #[display(fmt = "stream.clock.absolute")]
    ClockAbsolute,
    #[display(fmt = "stream.clock.name")]
    ClockName,
    #[display(fmt = "stream.clock.description")]
    ClockDesc,
    #[display(fmt = "stream.clock.uuid")]
    ClockUuid,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum EventAttrKey {
    #[display(fmt = "event.name")]
    Name,
    #[display(fmt = "event.timestamp")]
    Timestamp,

    #[display(fmt = "event.stream_id")]
    StreamId,
    #[display(fmt = "event.stream_class_id")]
    StreamClassId,
    #[display(fmt = "event.id")]
    Id,
    #[display(fmt = "event.log_level")]
    LogLevel,
    #[display(fmt = "event.emf_uri")]
    EmfUri,
    #[display(fmt = "event.clock_snapshot")]
    ClockSnapshot,

    #[display(fmt = "event.header.{_0}")]
    Header(String),
    #[display(fmt = "event.common_context.{_0}")]
    CommonContext(String),
    #[display(fmt = "event.specific_context.{_0}")]
    SpecificContext(String),
    #[display(fmt = "event.packet_context.{_0}")]
    PacketContext(String),

    #[display(fmt = "event.{_0}")]
    Field(String),
}

macro_rules! into_attr_key {
    ($($t:ty),*) => {
        $(impl From<$t> for AttrKey {
            fn from(k: $t) -> Self {
                AttrKey(k.to_string())
            }
        })*
    };
}

into_attr_key!(TraceAttrKey, StreamAttrKey, EventAttrKey);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keys_render_dotted() {
        assert_eq!(
            AttrKey::from(EventAttrKey::CommonContext("cpu_id".to_owned())).as_str(),
            "event.common_context.cpu_id"
        );
        assert_eq!(
            TraceAttrKey::Env("hostname".to_owned()).to_string(),
            "trace.env.hostname"
        );
        assert_eq!(StreamAttrKey::ClockFreq.to_string(), "stream.clock.frequency");
    }

    #[test]
    fn unsigned_values_widen_when_needed() {
        assert_eq!(AttrVal::from(7_u64), AttrVal::Integer(7));
        assert_eq!(
            AttrVal::from(u64::MAX),
            AttrVal::BigInt(i128::from(u64::MAX))
        );
        assert_eq!(AttrVal::from("x").to_string(), "\"x\"");
    }
}
