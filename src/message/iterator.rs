use super::Message;
use crate::error::Error;
use crate::stream::{Packet, Stream};
use tracing::{debug, warn};

/// Where messages come from, typically a trace decoder.
pub trait MessageSource {
    /// Returns `Ok(None)` once the source is exhausted.
    fn next_message(&mut self) -> Result<Option<Message>, Error>;
}

impl MessageSource for std::vec::IntoIter<Message> {
    fn next_message(&mut self) -> Result<Option<Message>, Error> {
        Ok(self.next())
    }
}

impl<S: MessageSource + ?Sized> MessageSource for Box<S> {
    fn next_message(&mut self) -> Result<Option<Message>, Error> {
        (**self).next_message()
    }
}

struct StreamState {
    stream: Stream,
    ended: bool,
    packet: Option<Packet>,
    last_snapshot: Option<u64>,
    next_seq_num: u64,
}

/// Pulls messages from a [`MessageSource`] and checks that each stream's
/// messages come in a valid order:
///
/// * a stream begins before anything else happens on it, and nothing follows its end
/// * packets begin and end in pairs, and a stream can't end inside a packet
/// * events belong to the packet currently open on their stream
/// * default clock snapshots don't go backwards within a stream
/// * every stream has ended by the time the source is exhausted
///
/// Each message gets a sequence number counting from 0 within its stream.
/// The iterator stops after the first error.
pub struct MessageIterator<S> {
    source: S,
    streams: Vec<StreamState>,
    done: bool,
}

impl<S: MessageSource> MessageIterator<S> {
    pub fn new(source: S) -> Self {
        MessageIterator {
            source,
            streams: Vec::new(),
            done: false,
        }
    }

    fn state_index(&self, stream: &Stream) -> Option<usize> {
        self.streams.iter().position(|s| s.stream.ptr_eq(stream))
    }

    fn accept(&mut self, msg: &mut Message) -> Result<(), Error> {
        let stream = match msg.stream() {
            Some(s) => s.clone(),
            None => return Ok(()),
        };
        let snapshot = msg.default_clock_snapshot().map(|cv| cv.cycles());

        let idx = match (&*msg, self.state_index(&stream)) {
            (Message::StreamBeginning(_), Some(_)) => {
                return Err(sequence_error(&stream, "it already began"));
            }
            (Message::StreamBeginning(_), None) => {
                self.streams.push(StreamState {
                    stream: stream.clone(),
                    ended: false,
                    packet: None,
                    last_snapshot: None,
                    next_seq_num: 0,
                });
                self.streams.len() - 1
            }
            (_, None) => {
                return Err(sequence_error(&stream, "it didn't begin"));
            }
            (_, Some(idx)) => idx,
        };

        let state = &mut self.streams[idx];
        if state.ended {
            return Err(sequence_error(&stream, "it already ended"));
        }
        if let (Some(last), Some(current)) = (state.last_snapshot, snapshot) {
            if current < last {
                return Err(sequence_error(
                    &stream,
                    format!("its default clock went back from {last} to {current}"),
                ));
            }
        }

        match msg {
            Message::PacketBeginning(m) => {
                if state.packet.is_some() {
                    return Err(sequence_error(&stream, "a packet is already open"));
                }
                state.packet = Some(m.packet().clone());
            }
            Message::PacketEnd(m) => {
                let is_open = state
                    .packet
                    .as_ref()
                    .is_some_and(|open| open.ptr_eq(m.packet()));
                if !is_open {
                    return Err(sequence_error(
                        &stream,
                        "the ending packet isn't the open one",
                    ));
                }
                state.packet = None;
            }
            Message::Event(m) => {
                let in_open_packet = match (&state.packet, m.event().packet()) {
                    (Some(open), Some(p)) => open.ptr_eq(p),
                    _ => false,
                };
                if !in_open_packet {
                    return Err(sequence_error(
                        &stream,
                        "the event's packet isn't the open one",
                    ));
                }
            }
            Message::StreamEnd(_) => {
                if state.packet.is_some() {
                    return Err(sequence_error(&stream, "a packet is still open"));
                }
                state.ended = true;
            }
            Message::StreamBeginning(_) | Message::Inactivity(_) => (),
        }

        if snapshot.is_some() {
            state.last_snapshot = snapshot;
        }
        msg.set_seq_num(state.next_seq_num);
        state.next_seq_num += 1;
        Ok(())
    }

    fn finish(&self) -> Result<(), Error> {
        match self.streams.iter().find(|s| !s.ended) {
            Some(s) => Err(sequence_error(
                &s.stream,
                "the source ended before the stream did",
            )),
            None => Ok(()),
        }
    }
}

impl<S: MessageSource> Iterator for MessageIterator<S> {
    type Item = Result<Message, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let res = match self.source.next_message() {
            Ok(Some(mut msg)) => self.accept(&mut msg).map(|()| Some(msg)),
            Ok(None) => self.finish().map(|()| None),
            Err(e) => Err(e),
        };
        match res {
            Ok(Some(msg)) => Some(Ok(msg)),
            Ok(None) => {
                debug!(streams = self.streams.len(), "Message source exhausted");
                self.done = true;
                None
            }
            Err(e) => {
                warn!(error = %e, "Stopping message iteration");
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn sequence_error<R: std::fmt::Display>(stream: &Stream, reason: R) -> Error {
    let name = stream
        .name()
        .or_else(|| stream.id().map(|id| id.to_string()))
        .unwrap_or_else(|| "<anonymous>".to_owned());
    Error::Sequence(format!("Message for stream '{name}' is out of order: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockClass;
    use crate::event::Event;
    use crate::event_class::EventClass;
    use crate::stream_class::StreamClass;
    use crate::trace::Trace;
    use pretty_assertions::assert_eq;

    struct Fixture {
        _trace: Trace,
        stream: Stream,
        ec: EventClass,
    }

    fn fixture() -> Fixture {
        let trace = Trace::new();
        let sc = StreamClass::new();
        sc.set_default_clock_class(Some(&ClockClass::new("cc").unwrap()))
            .unwrap();
        let ec = EventClass::new("ev").unwrap();
        sc.add_event_class(&ec).unwrap();
        trace.add_stream_class(&sc).unwrap();
        let stream = trace.create_stream(&sc, Some("cpu0"), None).unwrap();
        Fixture {
            _trace: trace,
            stream,
            ec,
        }
    }

    fn event(fx: &Fixture, packet: &Packet, at: u64) -> Message {
        let mut ev = Event::new(&fx.ec).unwrap();
        ev.set_packet(packet).unwrap();
        Message::event(ev, Some(at)).unwrap()
    }

    fn run(msgs: Vec<Message>) -> Vec<Result<Message, Error>> {
        MessageIterator::new(msgs.into_iter()).collect()
    }

    #[test]
    fn well_ordered_stream_gets_sequence_numbers() {
        let fx = fixture();
        let packet = fx.stream.create_packet().unwrap();
        let msgs = vec![
            Message::stream_beginning(&fx.stream),
            Message::packet_beginning(&packet, Some(1)).unwrap(),
            event(&fx, &packet, 2),
            event(&fx, &packet, 2),
            Message::packet_end(&packet, Some(3)).unwrap(),
            Message::stream_end(&fx.stream),
        ];
        let out = run(msgs)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let seq = out.iter().map(Message::seq_num).collect::<Vec<_>>();
        assert_eq!(seq, (0..6).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn event_outside_its_packet_stops_iteration() {
        let fx = fixture();
        let packet = fx.stream.create_packet().unwrap();
        let msgs = vec![
            Message::stream_beginning(&fx.stream),
            event(&fx, &packet, 2),
            Message::stream_end(&fx.stream),
        ];
        let out = run(msgs);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(Error::Sequence(_))));
    }

    #[test]
    fn nothing_after_stream_end() {
        let fx = fixture();
        let packet = fx.stream.create_packet().unwrap();
        let out = run(vec![
            Message::stream_beginning(&fx.stream),
            Message::stream_end(&fx.stream),
            Message::packet_beginning(&packet, Some(0)).unwrap(),
        ]);
        assert!(matches!(out.last(), Some(Err(Error::Sequence(_)))));
    }

    #[test]
    fn unfinished_stream_is_reported_at_exhaustion() {
        let fx = fixture();
        let out = run(vec![Message::stream_beginning(&fx.stream)]);
        assert_eq!(out.len(), 2);
        match &out[1] {
            Err(Error::Sequence(msg)) => assert!(msg.contains("cpu0")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn clock_must_not_go_backwards() {
        let fx = fixture();
        let packet = fx.stream.create_packet().unwrap();
        let out = run(vec![
            Message::stream_beginning(&fx.stream),
            Message::packet_beginning(&packet, Some(10)).unwrap(),
            event(&fx, &packet, 5),
        ]);
        assert!(matches!(out.last(), Some(Err(Error::Sequence(_)))));
    }

    #[test]
    fn mismatched_packet_end_is_rejected() {
        let fx = fixture();
        let a = fx.stream.create_packet().unwrap();
        let b = fx.stream.create_packet().unwrap();
        let out = run(vec![
            Message::stream_beginning(&fx.stream),
            Message::packet_beginning(&a, Some(0)).unwrap(),
            Message::packet_end(&b, Some(1)).unwrap(),
        ]);
        assert!(matches!(out.last(), Some(Err(Error::Sequence(_)))));
    }
}
