pub use crate::attrs::{AttrKey, AttrVal, EventAttrKey, StreamAttrKey, TraceAttrKey};
pub use crate::clock::{ClockClass, ClockValue};
pub use crate::config::{CtfIrConfig, TraceConfig};
pub use crate::error::Error;
pub use crate::event::Event;
pub use crate::event_class::EventClass;
pub use crate::field::{Field, Value};
pub use crate::field_type::{FieldType, FieldTypeId};
pub use crate::message::{Message, MessageIterator, MessageKind, MessageSource};
pub use crate::opts::InspectOpts;
pub use crate::properties::{EventAttrs, StreamAttrs, TraceAttrs, TraceDescription};
pub use crate::stream::{Packet, Stream};
pub use crate::stream_class::StreamClass;
pub use crate::trace::{EnvValue, Trace};
pub use crate::types::{Base, ByteOrder, Encoding, LogLevel};
