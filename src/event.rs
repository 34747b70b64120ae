use crate::clock::{ClockClass, ClockValue};
use crate::error::Error;
use crate::event_class::EventClass;
use crate::field::Field;
use crate::stream::{check_declared, Packet, Stream};
use crate::stream_class::StreamClass;
use crate::trace::Trace;
use std::cell::Ref;
use std::fmt;
use std::ops::Deref;
use tracing::debug;

/// One trace record.
///
/// An event keeps its event class, stream class and trace alive. Its root
/// fields are allocated from the types the stream class and event class
/// declare when the event is created.
///
/// Cloning an event deep-copies its fields; the clone shares the classes, the
/// packet and the clock classes of its clock values.
#[derive(Clone)]
pub struct Event {
    event_class: EventClass,
    stream_class: StreamClass,
    trace: Option<Trace>,
    header: Option<Field>,
    stream_event_context: Option<Field>,
    context: Option<Field>,
    payload: Option<Field>,
    packet: Option<Packet>,
    clock_values: Vec<ClockValue>,
}

impl Event {
    /// Creates an event of class `ec`, which must already belong to a stream
    /// class. This freezes the event class and its stream class.
    pub fn new(ec: &EventClass) -> Result<Self, Error> {
        let stream_class = ec.stream_class().ok_or_else(|| {
            Error::creation(
                "event",
                format!("event class '{}' isn't part of a stream class", ec.name()),
            )
        })?;
        let trace = stream_class.trace();
        ec.freeze();
        stream_class.freeze();

        let header = stream_class.event_header_type().map(|ft| Field::new(&ft));
        let stream_event_context = stream_class.event_context_type().map(|ft| Field::new(&ft));
        let context = ec.context_type().map(|ft| Field::new(&ft));
        let payload = ec.payload_type().map(|ft| Field::new(&ft));
        debug!(event_class = %ec.name(), id = ?ec.id(), "Created event");

        Ok(Event {
            event_class: ec.clone(),
            stream_class,
            trace,
            header,
            stream_event_context,
            context,
            payload,
            packet: None,
            clock_values: Vec::new(),
        })
    }

    pub fn event_class(&self) -> &EventClass {
        &self.event_class
    }

    pub fn stream_class(&self) -> &StreamClass {
        &self.stream_class
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    pub fn packet(&self) -> Option<&Packet> {
        self.packet.as_ref()
    }

    /// The stream of the event's packet.
    pub fn stream(&self) -> Option<&Stream> {
        self.packet.as_ref().map(Packet::stream)
    }

    /// Attaches the event to a packet of a stream of the event's stream class.
    pub fn set_packet(&mut self, packet: &Packet) -> Result<(), Error> {
        if !packet.stream().stream_class().ptr_eq(&self.stream_class) {
            return Err(Error::validation(format!(
                "packet's stream class (id {:?}) isn't the event's stream class (id {:?})",
                packet.stream().stream_class().id(),
                self.stream_class.id()
            )));
        }
        self.packet = Some(packet.clone());
        Ok(())
    }

    pub fn header(&self) -> Option<&Field> {
        self.header.as_ref()
    }

    pub fn header_mut(&mut self) -> Option<&mut Field> {
        self.header.as_mut()
    }

    pub fn stream_event_context(&self) -> Option<&Field> {
        self.stream_event_context.as_ref()
    }

    pub fn stream_event_context_mut(&mut self) -> Option<&mut Field> {
        self.stream_event_context.as_mut()
    }

    pub fn context(&self) -> Option<&Field> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut Field> {
        self.context.as_mut()
    }

    pub fn payload(&self) -> Option<&Field> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut Field> {
        self.payload.as_mut()
    }

    pub fn set_header(&mut self, field: Field) -> Result<(), Error> {
        check_declared(
            "event header",
            self.stream_class.event_header_type(),
            &field,
        )?;
        self.header = Some(field);
        Ok(())
    }

    pub fn set_stream_event_context(&mut self, field: Field) -> Result<(), Error> {
        check_declared(
            "stream event context",
            self.stream_class.event_context_type(),
            &field,
        )?;
        self.stream_event_context = Some(field);
        Ok(())
    }

    pub fn set_context(&mut self, field: Field) -> Result<(), Error> {
        check_declared("event context", self.event_class.context_type(), &field)?;
        self.context = Some(field);
        Ok(())
    }

    pub fn set_payload(&mut self, field: Field) -> Result<(), Error> {
        check_declared("event payload", self.event_class.payload_type(), &field)?;
        self.payload = Some(field);
        Ok(())
    }

    /// Looks up a top-level member by name in the payload, then the context,
    /// the stream event context, the header, the packet context and finally
    /// the packet header.
    pub fn get(&self, key: &str) -> Result<FieldRef<'_>, Error> {
        let roots = [
            &self.payload,
            &self.context,
            &self.stream_event_context,
            &self.header,
        ];
        if let Some(field) = roots
            .into_iter()
            .find_map(|root| root.as_ref().and_then(|f| member(f, key)))
        {
            return Ok(FieldRef::Event(field));
        }
        if let Some(packet) = &self.packet {
            for root in [packet.context(), packet.header()].into_iter().flatten() {
                if let Ok(field) = Ref::filter_map(root, |f| member(f, key)) {
                    return Ok(FieldRef::Packet(field));
                }
            }
        }
        Err(Error::not_found("event field", key))
    }

    /// One slot per clock class registered on the event's trace.
    pub fn clock_values(&self) -> ClockValues<'_> {
        ClockValues {
            clock_classes: self
                .trace
                .as_ref()
                .map(Trace::clock_classes)
                .unwrap_or_default(),
            values: &self.clock_values,
        }
    }

    /// Sets the event's value for the clock class of `value`, replacing any
    /// previous one. The clock class must be registered on the event's trace.
    pub fn add_clock_value(&mut self, value: ClockValue) -> Result<(), Error> {
        let trace = self.trace.as_ref().ok_or_else(|| {
            Error::validation("event's stream class isn't part of a trace")
        })?;
        if !trace.has_clock_class(value.clock_class()) {
            return Err(Error::not_found(
                "trace clock class",
                value.clock_class().name(),
            ));
        }
        match self
            .clock_values
            .iter_mut()
            .find(|cv| cv.clock_class().ptr_eq(value.clock_class()))
        {
            Some(existing) => *existing = value,
            None => self.clock_values.push(value),
        }
        Ok(())
    }
}

fn member<'f>(root: &'f Field, key: &str) -> Option<&'f Field> {
    root.as_structure()?.field(key)
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.event_class == other.event_class
            && self.header == other.header
            && self.stream_event_context == other.stream_event_context
            && self.context == other.context
            && self.payload == other.payload
            && self.clock_values.len() == other.clock_values.len()
            && self
                .clock_values
                .iter()
                .all(|cv| other.clock_values.contains(cv))
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_class", &self.event_class.name())
            .field("header", &self.header)
            .field("stream_event_context", &self.stream_event_context)
            .field("context", &self.context)
            .field("payload", &self.payload)
            .field("clock_values", &self.clock_values)
            .finish()
    }
}

/// A field found by [`Event::get`], either owned by the event or borrowed
/// from its packet.
#[derive(Debug)]
pub enum FieldRef<'a> {
    Event(&'a Field),
    Packet(Ref<'a, Field>),
}

impl Deref for FieldRef<'_> {
    type Target = Field;

    fn deref(&self) -> &Field {
        match self {
            FieldRef::Event(f) => *f,
            FieldRef::Packet(f) => &**f,
        }
    }
}

/// View of an event's clock values, keyed by the trace's clock classes.
#[derive(Debug)]
pub struct ClockValues<'a> {
    clock_classes: Vec<ClockClass>,
    values: &'a [ClockValue],
}

impl<'a> ClockValues<'a> {
    pub fn len(&self) -> usize {
        self.clock_classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clock_classes.is_empty()
    }

    pub fn get(&self, cc: &ClockClass) -> Option<&'a ClockValue> {
        self.values.iter().find(|cv| cv.clock_class().ptr_eq(cc))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClockClass, Option<&'a ClockValue>)> + '_ {
        self.clock_classes.iter().map(move |cc| (cc, self.get(cc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Value;
    use crate::field_type::FieldType;
    use pretty_assertions::assert_eq;

    fn uint() -> FieldType {
        FieldType::integer(32, false).unwrap()
    }

    fn structure(members: &[&str]) -> FieldType {
        let ft = FieldType::structure();
        for m in members {
            ft.add_field(m, &uint()).unwrap();
        }
        ft
    }

    struct Fixture {
        trace: Trace,
        stream: Stream,
        ec: EventClass,
        clock: ClockClass,
    }

    fn fixture() -> Fixture {
        let trace = Trace::new();
        let clock = ClockClass::new("monotonic").unwrap();
        let sc = StreamClass::with_name("sc");
        sc.set_packet_context_type(Some(&structure(&["cpu_id", "b"])))
            .unwrap();
        sc.set_default_clock_class(Some(&clock)).unwrap();
        let ec = EventClass::new("ev").unwrap();
        ec.set_context_type(Some(&structure(&["a", "b"]))).unwrap();
        ec.set_payload_type(Some(&structure(&["a"]))).unwrap();
        sc.add_event_class(&ec).unwrap();
        trace.add_stream_class(&sc).unwrap();
        let stream = trace.create_stream(&sc, None, Some(0)).unwrap();
        Fixture {
            trace,
            stream,
            ec,
            clock,
        }
    }

    fn set(root: Option<&mut Field>, name: &str, v: u64) {
        root.unwrap()
            .as_structure_mut()
            .unwrap()
            .set(name, v)
            .unwrap();
    }

    #[test]
    fn lookup_follows_root_priority() {
        let fx = fixture();
        let packet = fx.stream.create_packet().unwrap();
        set(packet.context_mut().unwrap().as_deref_mut(), "cpu_id", 7);
        set(packet.context_mut().unwrap().as_deref_mut(), "b", 9);

        let mut ev = Event::new(&fx.ec).unwrap();
        set(ev.payload_mut(), "a", 1);
        set(ev.context_mut(), "a", 2);
        set(ev.context_mut(), "b", 3);
        ev.set_packet(&packet).unwrap();

        assert_eq!(ev.get("a").unwrap().value(), Value::Unsigned(1));
        assert_eq!(ev.get("b").unwrap().value(), Value::Unsigned(3));
        assert_eq!(ev.get("cpu_id").unwrap().value(), Value::Unsigned(7));
        assert!(matches!(ev.get("nope"), Err(Error::NotFound { .. })));
        assert!(ev.stream().unwrap().ptr_eq(&fx.stream));
    }

    #[test]
    fn creation_needs_a_stream_class_and_freezes_classes() {
        let orphan = EventClass::new("orphan").unwrap();
        assert!(matches!(
            Event::new(&orphan),
            Err(Error::Creation { .. })
        ));

        let fx = fixture();
        let _ev = Event::new(&fx.ec).unwrap();
        assert!(fx.ec.is_frozen());
        assert!(fx.ec.payload_type().unwrap().is_frozen());
    }

    #[test]
    fn root_setters_check_declared_types() {
        let fx = fixture();
        let mut ev = Event::new(&fx.ec).unwrap();
        assert!(ev.set_payload(Field::new(&structure(&["z"]))).is_err());
        let payload = ev.payload().unwrap().clone();
        ev.set_payload(payload).unwrap();
        assert!(ev
            .set_header(Field::new(&FieldType::structure()))
            .is_err());
    }

    #[test]
    fn packet_must_share_the_stream_class() {
        let fx = fixture();
        let other_sc = StreamClass::new();
        let other_trace = Trace::new();
        other_trace.add_stream_class(&other_sc).unwrap();
        let other_stream = other_trace.create_stream(&other_sc, None, None).unwrap();
        let packet = other_stream.create_packet().unwrap();
        let mut ev = Event::new(&fx.ec).unwrap();
        assert!(ev.set_packet(&packet).is_err());
        assert!(ev.packet().is_none());
    }

    #[test]
    fn clock_values_are_keyed_by_trace_clock_classes() {
        let fx = fixture();
        let mut ev = Event::new(&fx.ec).unwrap();
        assert_eq!(fx.trace.clock_class_count(), 1);
        assert_eq!(ev.clock_values().len(), 1);
        assert!(ev.clock_values().get(&fx.clock).is_none());

        ev.add_clock_value(ClockValue::new(&fx.clock, 10)).unwrap();
        ev.add_clock_value(ClockValue::new(&fx.clock, 20)).unwrap();
        let values = ev.clock_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values.get(&fx.clock).unwrap().cycles(), 20);
        let (cc, cv) = values.iter().next().unwrap();
        assert!(cc.ptr_eq(&fx.clock));
        assert_eq!(cv.map(ClockValue::cycles), Some(20));

        let stranger = ClockClass::new("stranger").unwrap();
        assert!(matches!(
            ev.add_clock_value(ClockValue::new(&stranger, 1)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn clone_copies_fields_and_shares_clock_classes() {
        let fx = fixture();
        let mut ev = Event::new(&fx.ec).unwrap();
        set(ev.payload_mut(), "a", 5);
        ev.add_clock_value(ClockValue::new(&fx.clock, 3)).unwrap();

        let mut copy = ev.clone();
        assert_eq!(copy, ev);
        let cv = copy.clock_values().get(&fx.clock).unwrap().clone();
        assert!(cv.clock_class().ptr_eq(&fx.clock));

        set(copy.payload_mut(), "a", 6);
        assert_ne!(copy, ev);
        assert_eq!(ev.get("a").unwrap().value(), Value::Unsigned(5));
    }
}
