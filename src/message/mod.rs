//! The messages a trace is delivered as: events plus the stream and packet
//! boundaries around them.

use crate::clock::{ClockClass, ClockValue};
use crate::error::Error;
use crate::event::Event;
use crate::stream::{Packet, Stream};
use crate::stream_class::StreamClass;
use derive_more::Display;
use tracing::warn;

mod iterator;

pub use iterator::{MessageIterator, MessageSource};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum MessageKind {
    #[display(fmt = "event")]
    Event,
    #[display(fmt = "packet beginning")]
    PacketBeginning,
    #[display(fmt = "packet end")]
    PacketEnd,
    #[display(fmt = "stream beginning")]
    StreamBeginning,
    #[display(fmt = "stream end")]
    StreamEnd,
    #[display(fmt = "inactivity")]
    Inactivity,
}

#[derive(Clone, Debug)]
pub enum Message {
    Event(EventMessage),
    PacketBeginning(PacketMessage),
    PacketEnd(PacketMessage),
    StreamBeginning(StreamMessage),
    StreamEnd(StreamMessage),
    Inactivity(InactivityMessage),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Event(_) => MessageKind::Event,
            Message::PacketBeginning(_) => MessageKind::PacketBeginning,
            Message::PacketEnd(_) => MessageKind::PacketEnd,
            Message::StreamBeginning(_) => MessageKind::StreamBeginning,
            Message::StreamEnd(_) => MessageKind::StreamEnd,
            Message::Inactivity(_) => MessageKind::Inactivity,
        }
    }

    /// The stream the message belongs to. Inactivity messages have none.
    pub fn stream(&self) -> Option<&Stream> {
        match self {
            Message::Event(m) => m.event.stream(),
            Message::PacketBeginning(m) | Message::PacketEnd(m) => Some(m.packet.stream()),
            Message::StreamBeginning(m) | Message::StreamEnd(m) => Some(&m.stream),
            Message::Inactivity(_) => None,
        }
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockValue> {
        match self {
            Message::Event(m) => m.default_clock_snapshot.as_ref(),
            Message::PacketBeginning(m) | Message::PacketEnd(m) => {
                m.default_clock_snapshot.as_ref()
            }
            Message::StreamBeginning(m) | Message::StreamEnd(m) => {
                m.default_clock_snapshot.as_ref()
            }
            Message::Inactivity(m) => Some(&m.snapshot),
        }
    }

    /// Position of the message within its stream, assigned by [`MessageIterator`].
    pub fn seq_num(&self) -> Option<u64> {
        match self {
            Message::Event(m) => m.seq_num,
            Message::PacketBeginning(m) | Message::PacketEnd(m) => m.seq_num,
            Message::StreamBeginning(m) | Message::StreamEnd(m) => m.seq_num,
            Message::Inactivity(_) => None,
        }
    }

    pub(crate) fn set_seq_num(&mut self, seq_num: u64) {
        match self {
            Message::Event(m) => m.seq_num = Some(seq_num),
            Message::PacketBeginning(m) | Message::PacketEnd(m) => m.seq_num = Some(seq_num),
            Message::StreamBeginning(m) | Message::StreamEnd(m) => m.seq_num = Some(seq_num),
            Message::Inactivity(_) => (),
        }
    }
}

/// Carries one event. The event must be attached to a packet, which gets frozen.
#[derive(Clone, Debug)]
pub struct EventMessage {
    event: Event,
    default_clock_snapshot: Option<ClockValue>,
    seq_num: Option<u64>,
}

impl EventMessage {
    pub fn new(event: Event, default_clock_snapshot: Option<u64>) -> Result<Self, Error> {
        let packet = event
            .packet()
            .ok_or_else(|| Error::creation("event message", "the event has no packet"))?;
        let default_clock_snapshot = snapshot_for(
            MessageKind::Event,
            event.stream_class(),
            default_clock_snapshot,
        )?;
        packet.freeze();
        Ok(EventMessage {
            event,
            default_clock_snapshot,
            seq_num: None,
        })
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockValue> {
        self.default_clock_snapshot.as_ref()
    }
}

impl From<EventMessage> for Message {
    fn from(m: EventMessage) -> Self {
        Message::Event(m)
    }
}

/// Marks the beginning or the end of a packet, which gets frozen.
#[derive(Clone, Debug)]
pub struct PacketMessage {
    packet: Packet,
    default_clock_snapshot: Option<ClockValue>,
    seq_num: Option<u64>,
}

impl PacketMessage {
    fn new(
        kind: MessageKind,
        packet: &Packet,
        default_clock_snapshot: Option<u64>,
    ) -> Result<Self, Error> {
        let default_clock_snapshot = snapshot_for(
            kind,
            packet.stream().stream_class(),
            default_clock_snapshot,
        )?;
        packet.freeze();
        Ok(PacketMessage {
            packet: packet.clone(),
            default_clock_snapshot,
            seq_num: None,
        })
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockValue> {
        self.default_clock_snapshot.as_ref()
    }
}

/// Marks the beginning or the end of a stream. The default clock snapshot is
/// optional here and set after construction.
#[derive(Clone, Debug)]
pub struct StreamMessage {
    stream: Stream,
    default_clock_snapshot: Option<ClockValue>,
    seq_num: Option<u64>,
}

impl StreamMessage {
    pub fn new(stream: &Stream) -> Self {
        StreamMessage {
            stream: stream.clone(),
            default_clock_snapshot: None,
            seq_num: None,
        }
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockValue> {
        self.default_clock_snapshot.as_ref()
    }

    /// Needs the stream class to have a default clock class.
    pub fn set_default_clock_snapshot(&mut self, cycles: u64) -> Result<(), Error> {
        let kind = MessageKind::StreamBeginning;
        self.default_clock_snapshot =
            snapshot_for(kind, self.stream.stream_class(), Some(cycles))?;
        Ok(())
    }
}

/// Signals that nothing happened on any stream up to a point in time.
#[derive(Clone, Debug)]
pub struct InactivityMessage {
    snapshot: ClockValue,
}

impl InactivityMessage {
    pub fn new(clock_class: &ClockClass, cycles: u64) -> Self {
        InactivityMessage {
            snapshot: ClockValue::new(clock_class, cycles),
        }
    }

    pub fn clock_class(&self) -> &ClockClass {
        self.snapshot.clock_class()
    }

    pub fn snapshot(&self) -> &ClockValue {
        &self.snapshot
    }
}

impl Message {
    pub fn event(event: Event, default_clock_snapshot: Option<u64>) -> Result<Self, Error> {
        EventMessage::new(event, default_clock_snapshot).map(Message::Event)
    }

    pub fn packet_beginning(
        packet: &Packet,
        default_clock_snapshot: Option<u64>,
    ) -> Result<Self, Error> {
        PacketMessage::new(MessageKind::PacketBeginning, packet, default_clock_snapshot)
            .map(Message::PacketBeginning)
    }

    pub fn packet_end(packet: &Packet, default_clock_snapshot: Option<u64>) -> Result<Self, Error> {
        PacketMessage::new(MessageKind::PacketEnd, packet, default_clock_snapshot)
            .map(Message::PacketEnd)
    }

    pub fn stream_beginning(stream: &Stream) -> Self {
        Message::StreamBeginning(StreamMessage::new(stream))
    }

    pub fn stream_end(stream: &Stream) -> Self {
        Message::StreamEnd(StreamMessage::new(stream))
    }

    pub fn inactivity(clock_class: &ClockClass, cycles: u64) -> Self {
        Message::Inactivity(InactivityMessage::new(clock_class, cycles))
    }
}

/// A default clock snapshot must be given exactly when the stream class has a
/// default clock class.
fn snapshot_for(
    kind: MessageKind,
    sc: &StreamClass,
    cycles: Option<u64>,
) -> Result<Option<ClockValue>, Error> {
    let message = match kind {
        MessageKind::Event => "event",
        MessageKind::PacketBeginning => "packet beginning",
        MessageKind::PacketEnd => "packet end",
        MessageKind::StreamBeginning | MessageKind::StreamEnd => "stream",
        MessageKind::Inactivity => "inactivity",
    };
    match (sc.default_clock_class(), cycles) {
        (Some(cc), Some(cycles)) => Ok(Some(ClockValue::new(&cc, cycles))),
        (None, None) => Ok(None),
        (Some(_), None) => {
            warn!(stream_class_id = ?sc.id(), kind = %kind, "Rejected message without a default clock snapshot");
            Err(Error::Consistency {
                message,
                reason: "the stream class has a default clock class, a snapshot is required",
            })
        }
        (None, Some(_)) => {
            warn!(stream_class_id = ?sc.id(), kind = %kind, "Rejected message with an unexpected default clock snapshot");
            Err(Error::Consistency {
                message,
                reason: "the stream class has no default clock class",
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_class::EventClass;
    use crate::trace::Trace;
    use pretty_assertions::assert_eq;

    fn setup(with_clock: bool) -> (Trace, Stream, EventClass) {
        let trace = Trace::new();
        let sc = StreamClass::new();
        if with_clock {
            sc.set_default_clock_class(Some(&ClockClass::new("cc").unwrap()))
                .unwrap();
        }
        let ec = EventClass::new("ev").unwrap();
        sc.add_event_class(&ec).unwrap();
        trace.add_stream_class(&sc).unwrap();
        let stream = trace.create_stream(&sc, None, Some(1)).unwrap();
        (trace, stream, ec)
    }

    fn event_in(stream: &Stream, ec: &EventClass) -> (Packet, Event) {
        let packet = stream.create_packet().unwrap();
        let mut ev = Event::new(ec).unwrap();
        ev.set_packet(&packet).unwrap();
        (packet, ev)
    }

    #[test]
    fn snapshot_required_with_a_default_clock_class() {
        let (_trace, stream, ec) = setup(true);
        let (packet, ev) = event_in(&stream, &ec);
        assert!(matches!(
            Message::event(ev.clone(), None),
            Err(Error::Consistency { .. })
        ));
        assert!(matches!(
            Message::packet_beginning(&packet, None),
            Err(Error::Consistency { .. })
        ));
        let msg = Message::event(ev, Some(42)).unwrap();
        assert_eq!(msg.default_clock_snapshot().map(ClockValue::cycles), Some(42));
        assert_eq!(msg.kind(), MessageKind::Event);
        assert!(packet.is_frozen());
    }

    #[test]
    fn snapshot_rejected_without_a_default_clock_class() {
        let (_trace, stream, ec) = setup(false);
        let (packet, ev) = event_in(&stream, &ec);
        assert!(matches!(
            Message::event(ev.clone(), Some(1)),
            Err(Error::Consistency { .. })
        ));
        assert!(matches!(
            Message::packet_end(&packet, Some(1)),
            Err(Error::Consistency { .. })
        ));
        let msg = Message::event(ev, None).unwrap();
        assert!(msg.default_clock_snapshot().is_none());
        assert!(msg.stream().unwrap().ptr_eq(&stream));
    }

    #[test]
    fn event_messages_need_a_packet() {
        let (_trace, _stream, ec) = setup(false);
        let ev = Event::new(&ec).unwrap();
        assert!(matches!(
            Message::event(ev, None),
            Err(Error::Creation { .. })
        ));
    }

    #[test]
    fn stream_message_snapshot_is_checked() {
        let (_trace, stream, _ec) = setup(false);
        let mut m = StreamMessage::new(&stream);
        assert!(m.set_default_clock_snapshot(5).is_err());
        assert!(m.default_clock_snapshot().is_none());

        let (_trace, stream, _ec) = setup(true);
        let mut m = StreamMessage::new(&stream);
        m.set_default_clock_snapshot(5).unwrap();
        assert_eq!(m.default_clock_snapshot().map(ClockValue::cycles), Some(5));
    }

    #[test]
    fn inactivity_has_no_stream() {
        let cc = ClockClass::new("cc").unwrap();
        let msg = Message::inactivity(&cc, 9);
        assert!(msg.stream().is_none());
        assert_eq!(msg.default_clock_snapshot().map(ClockValue::cycles), Some(9));
        assert_eq!(msg.kind().to_string(), "inactivity");
    }
}
