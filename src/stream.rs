use crate::error::Error;
use crate::field::Field;
use crate::field_type::FieldType;
use crate::stream_class::StreamClass;
use crate::trace::{Trace, WeakTrace};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct StreamProperties {
    pub name: Option<String>,
    pub id: Option<u64>,
    pub discarded_events: u64,
}

struct StreamInner {
    props: RefCell<StreamProperties>,
    stream_class: StreamClass,
    trace: WeakTrace,
}

/// One timeline of events. Streams are created by [`Trace::create_stream`].
#[derive(Clone)]
pub struct Stream(Rc<StreamInner>);

impl Stream {
    pub(crate) fn new(sc: &StreamClass, trace: &Trace, name: Option<&str>, id: Option<u64>) -> Self {
        Stream(Rc::new(StreamInner {
            props: RefCell::new(StreamProperties {
                name: name.map(ToOwned::to_owned),
                id,
                discarded_events: 0,
            }),
            stream_class: sc.clone(),
            trace: trace.downgrade(),
        }))
    }

    pub fn properties(&self) -> Ref<'_, StreamProperties> {
        self.0.props.borrow()
    }

    pub fn name(&self) -> Option<String> {
        self.0.props.borrow().name.clone()
    }

    pub fn id(&self) -> Option<u64> {
        self.0.props.borrow().id
    }

    pub fn stream_class(&self) -> &StreamClass {
        &self.0.stream_class
    }

    pub fn trace(&self) -> Option<Trace> {
        self.0.trace.upgrade()
    }

    pub fn ptr_eq(&self, other: &Stream) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn discarded_events(&self) -> u64 {
        self.0.props.borrow().discarded_events
    }

    pub fn append_discarded_events(&self, count: u64) -> Result<(), Error> {
        let mut props = self.0.props.borrow_mut();
        props.discarded_events = props.discarded_events.checked_add(count).ok_or_else(|| {
            Error::validation(format!(
                "discarded event count overflows when adding {count}"
            ))
        })?;
        Ok(())
    }

    /// Creates a packet with header and context fields allocated from the
    /// trace's packet header type and the stream class's packet context type.
    pub fn create_packet(&self) -> Result<Packet, Error> {
        let trace = self
            .trace()
            .ok_or_else(|| Error::creation("packet", "the stream's trace no longer exists"))?;
        let header = trace.packet_header_type().map(|ft| Field::new(&ft));
        let context = self
            .stream_class()
            .packet_context_type()
            .map(|ft| Field::new(&ft));
        debug!(stream_id = ?self.id(), "Created packet");
        Ok(Packet(Rc::new(PacketInner {
            frozen: Cell::new(false),
            stream: self.clone(),
            trace,
            header: RefCell::new(header),
            context: RefCell::new(context),
        })))
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (*self.0.props.borrow() == *other.0.props.borrow()
                && self.0.stream_class == other.0.stream_class)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("props", &*self.0.props.borrow())
            .field("stream_class_id", &self.0.stream_class.id())
            .finish()
    }
}

struct PacketInner {
    frozen: Cell<bool>,
    stream: Stream,
    trace: Trace,
    header: RefCell<Option<Field>>,
    context: RefCell<Option<Field>>,
}

/// A chunk of a stream, with its header and context fields. The packet keeps
/// its stream and trace alive. Cloning shares the same packet.
#[derive(Clone)]
pub struct Packet(Rc<PacketInner>);

impl Packet {
    pub fn stream(&self) -> &Stream {
        &self.0.stream
    }

    pub fn trace(&self) -> &Trace {
        &self.0.trace
    }

    pub fn ptr_eq(&self, other: &Packet) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    pub(crate) fn freeze(&self) {
        if !self.0.frozen.replace(true) {
            debug!(stream_id = ?self.0.stream.id(), "Froze packet");
        }
    }

    pub fn header(&self) -> Option<Ref<'_, Field>> {
        Ref::filter_map(self.0.header.borrow(), Option::as_ref).ok()
    }

    pub fn context(&self) -> Option<Ref<'_, Field>> {
        Ref::filter_map(self.0.context.borrow(), Option::as_ref).ok()
    }

    pub fn header_mut(&self) -> Result<Option<RefMut<'_, Field>>, Error> {
        self.check_hot()?;
        Ok(RefMut::filter_map(self.0.header.borrow_mut(), Option::as_mut).ok())
    }

    pub fn context_mut(&self) -> Result<Option<RefMut<'_, Field>>, Error> {
        self.check_hot()?;
        Ok(RefMut::filter_map(self.0.context.borrow_mut(), Option::as_mut).ok())
    }

    /// Replaces the header field, whose type must be the trace's packet header type.
    pub fn set_header(&self, field: Field) -> Result<(), Error> {
        self.check_hot()?;
        check_declared("packet header", self.0.trace.packet_header_type(), &field)?;
        *self.0.header.borrow_mut() = Some(field);
        Ok(())
    }

    /// Replaces the context field, whose type must be the stream class's packet context type.
    pub fn set_context(&self, field: Field) -> Result<(), Error> {
        self.check_hot()?;
        check_declared(
            "packet context",
            self.0.stream.stream_class().packet_context_type(),
            &field,
        )?;
        *self.0.context.borrow_mut() = Some(field);
        Ok(())
    }

    fn check_hot(&self) -> Result<(), Error> {
        if self.is_frozen() {
            Err(Error::Frozen("packet"))
        } else {
            Ok(())
        }
    }
}

/// A root field must conform to the type its class declares for it.
pub(crate) fn check_declared(
    what: &str,
    declared: Option<FieldType>,
    field: &Field,
) -> Result<(), Error> {
    match declared {
        Some(ft) if ft == *field.field_type() => Ok(()),
        Some(_) => Err(Error::validation(format!(
            "{what} field's type doesn't match the declared {what} field type"
        ))),
        None => Err(Error::validation(format!(
            "no {what} field type is declared"
        ))),
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.0.stream == other.0.stream
                && *self.0.header.borrow() == *other.0.header.borrow()
                && *self.0.context.borrow() == *other.0.context.borrow())
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("stream", &self.0.stream)
            .field("header", &*self.0.header.borrow())
            .field("context", &*self.0.context.borrow())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Value;
    use pretty_assertions::assert_eq;

    fn trace_with_stream() -> (Trace, Stream) {
        let trace = Trace::new();
        let ph = FieldType::structure();
        ph.add_field("magic", &FieldType::integer(32, false).unwrap())
            .unwrap();
        trace.set_packet_header_type(Some(&ph)).unwrap();
        let sc = StreamClass::new();
        let pc = FieldType::structure();
        pc.add_field("cpu_id", &FieldType::integer(32, false).unwrap())
            .unwrap();
        sc.set_packet_context_type(Some(&pc)).unwrap();
        trace.add_stream_class(&sc).unwrap();
        let stream = trace.create_stream(&sc, Some("s"), Some(3)).unwrap();
        (trace, stream)
    }

    #[test]
    fn packets_get_header_and_context_fields() {
        let (_trace, stream) = trace_with_stream();
        let packet = stream.create_packet().unwrap();
        packet
            .context_mut()
            .unwrap()
            .unwrap()
            .as_structure_mut()
            .unwrap()
            .set("cpu_id", 2_u64)
            .unwrap();
        assert_eq!(
            packet
                .context()
                .unwrap()
                .as_structure()
                .unwrap()
                .field("cpu_id")
                .unwrap()
                .value(),
            Value::Unsigned(2)
        );
        assert!(packet.header().unwrap().as_structure().unwrap().contains("magic"));
        packet.freeze();
        assert!(matches!(packet.context_mut(), Err(Error::Frozen(_))));
    }

    #[test]
    fn root_fields_must_match_the_declared_type() {
        let (_trace, stream) = trace_with_stream();
        let packet = stream.create_packet().unwrap();
        assert!(packet
            .set_context(Field::new(&FieldType::structure()))
            .is_err());
        let ctx = packet.context().unwrap().clone();
        packet.set_context(ctx).unwrap();
    }

    #[test]
    fn packet_keeps_its_trace_alive() {
        let packet = {
            let (_trace, stream) = trace_with_stream();
            stream.create_packet().unwrap()
        };
        assert_eq!(packet.stream().id(), Some(3));
        assert_eq!(packet.trace().stream_count(), 1);
    }

    #[test]
    fn discarded_events_accumulate() {
        let (_trace, stream) = trace_with_stream();
        stream.append_discarded_events(3).unwrap();
        stream.append_discarded_events(4).unwrap();
        assert_eq!(stream.discarded_events(), 7);
        assert!(stream.append_discarded_events(u64::MAX).is_err());
    }
}
