use crate::clock::ClockClass;
use crate::error::Error;
use crate::field_type::{FieldType, FieldTypeId, FieldTypeKind};
use crate::stream::Stream;
use crate::stream_class::StreamClass;
use crate::types::{check_identifier, ByteOrder};
use derive_more::{Display, From};
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

/// A trace environment value.
#[derive(Clone, Eq, PartialEq, Debug, Display, From)]
pub enum EnvValue {
    #[display(fmt = "{}", _0)]
    Integer(i64),
    #[display(fmt = "{}", _0)]
    String(String),
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        EnvValue::String(s.to_owned())
    }
}

/// Ordered trace metadata entries.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Environment(Vec<(String, EnvValue)>);

impl Environment {
    pub fn get(&self, name: &str) -> Option<&EnvValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    fn insert(&mut self, name: &str, value: EnvValue) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name.to_owned(), value)),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct TraceProperties {
    pub name: Option<String>,
    pub uuid: Option<Uuid>,
    pub native_byte_order: Option<ByteOrder>,
}

type StaticListener = Rc<dyn Fn(&Trace)>;

pub(crate) struct TraceInner {
    frozen: Cell<bool>,
    is_static: Cell<bool>,
    props: RefCell<TraceProperties>,
    environment: RefCell<Environment>,
    clock_classes: RefCell<Vec<ClockClass>>,
    packet_header_type: RefCell<Option<FieldType>>,
    stream_classes: RefCell<Vec<StreamClass>>,
    streams: RefCell<Vec<Stream>>,
    static_listeners: RefCell<Vec<Option<StaticListener>>>,
}

/// The top-level container: a mapping from stream class id to stream class,
/// plus the streams, clock classes and environment. Cloning shares the same trace.
#[derive(Clone)]
pub struct Trace(Rc<TraceInner>);

/// Upward reference from a stream class or stream to its trace.
#[derive(Clone, Default)]
pub(crate) struct WeakTrace(Weak<TraceInner>);

impl WeakTrace {
    pub(crate) fn upgrade(&self) -> Option<Trace> {
        self.0.upgrade().map(Trace)
    }
}

impl Trace {
    pub fn new() -> Self {
        Trace(Rc::new(TraceInner {
            frozen: Cell::new(false),
            is_static: Cell::new(false),
            props: RefCell::new(TraceProperties::default()),
            environment: RefCell::new(Environment::default()),
            clock_classes: RefCell::new(Vec::new()),
            packet_header_type: RefCell::new(None),
            stream_classes: RefCell::new(Vec::new()),
            streams: RefCell::new(Vec::new()),
            static_listeners: RefCell::new(Vec::new()),
        }))
    }

    pub(crate) fn downgrade(&self) -> WeakTrace {
        WeakTrace(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Trace) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn properties(&self) -> Ref<'_, TraceProperties> {
        self.0.props.borrow()
    }

    pub fn name(&self) -> Option<String> {
        self.0.props.borrow().name.clone()
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.0.props.borrow().uuid
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    pub fn is_static(&self) -> bool {
        self.0.is_static.get()
    }

    fn check_hot(&self) -> Result<(), Error> {
        if self.is_frozen() {
            warn!(name = ?self.name(), "Rejected modification of a frozen trace");
            Err(Error::Frozen("trace"))
        } else {
            Ok(())
        }
    }

    fn check_not_static(&self) -> Result<(), Error> {
        if self.is_static() {
            warn!(name = ?self.name(), "Rejected modification of a static trace");
            Err(Error::Frozen("static trace"))
        } else {
            Ok(())
        }
    }

    pub fn set_name(&self, name: &str) -> Result<(), Error> {
        self.check_hot()?;
        self.0.props.borrow_mut().name = Some(name.to_owned());
        Ok(())
    }

    pub fn set_uuid(&self, uuid: Uuid) -> Result<(), Error> {
        self.check_hot()?;
        self.0.props.borrow_mut().uuid = Some(uuid);
        Ok(())
    }

    pub fn set_native_byte_order(&self, byte_order: ByteOrder) -> Result<(), Error> {
        self.check_hot()?;
        if byte_order == ByteOrder::Native {
            return Err(Error::validation(
                "a trace's native byte order can't be 'native'",
            ));
        }
        self.0.props.borrow_mut().native_byte_order = Some(byte_order);
        Ok(())
    }

    pub fn environment(&self) -> Ref<'_, Environment> {
        self.0.environment.borrow()
    }

    /// Sets an environment entry. New entries can be added to a frozen
    /// trace, but existing ones can't change.
    pub fn set_environment_entry<V: Into<EnvValue>>(
        &self,
        name: &str,
        value: V,
    ) -> Result<(), Error> {
        self.check_not_static()?;
        check_identifier("Environment entry name", name)?;
        let mut env = self.0.environment.borrow_mut();
        if self.is_frozen() && env.contains(name) {
            return Err(Error::Frozen("trace environment entry"));
        }
        env.insert(name, value.into());
        Ok(())
    }

    pub fn remove_environment_entry(&self, _name: &str) -> Result<(), Error> {
        Err(Error::NotImplemented("removing a trace environment entry"))
    }

    pub fn add_clock_class(&self, cc: &ClockClass) -> Result<(), Error> {
        self.check_not_static()?;
        let name = cc.name();
        if self.clock_class_by_name(&name).is_some() {
            return Err(Error::validation(format!(
                "trace already has a clock class named '{name}'"
            )));
        }
        debug!(clock_class = %name, "Added clock class to trace");
        self.0.clock_classes.borrow_mut().push(cc.clone());
        if self.is_frozen() {
            cc.freeze();
        }
        Ok(())
    }

    pub fn clock_classes(&self) -> Vec<ClockClass> {
        self.0.clock_classes.borrow().clone()
    }

    pub fn clock_class_count(&self) -> usize {
        self.0.clock_classes.borrow().len()
    }

    pub fn clock_class_by_name(&self, name: &str) -> Option<ClockClass> {
        self.0
            .clock_classes
            .borrow()
            .iter()
            .find(|cc| cc.name() == name)
            .cloned()
    }

    /// Returns true if this very clock class is registered on the trace.
    pub fn has_clock_class(&self, cc: &ClockClass) -> bool {
        self.0.clock_classes.borrow().iter().any(|c| c.ptr_eq(cc))
    }

    pub fn packet_header_type(&self) -> Option<FieldType> {
        self.0.packet_header_type.borrow().clone()
    }

    /// Only possible before the trace is frozen, and before any stream exists.
    pub fn set_packet_header_type(&self, ft: Option<&FieldType>) -> Result<(), Error> {
        self.check_hot()?;
        if !self.0.streams.borrow().is_empty() {
            return Err(Error::validation(
                "can't set the packet header field type once streams exist",
            ));
        }
        if let Some(ft) = ft {
            if ft.id() != FieldTypeId::Structure {
                return Err(Error::validation(format!(
                    "packet header field type must be a structure, got {}",
                    ft.id()
                )));
            }
        }
        *self.0.packet_header_type.borrow_mut() = ft.cloned();
        Ok(())
    }

    /// Adds a stream class, assigning it the next free id when it has none.
    /// This freezes the trace, the stream class and its event classes, and
    /// registers the stream class's default clock class if needed.
    pub fn add_stream_class(&self, sc: &StreamClass) -> Result<(), Error> {
        self.check_not_static()?;
        if sc.trace().is_some() {
            return Err(Error::validation("stream class already belongs to a trace"));
        }
        if let Some(id) = sc.id() {
            if self.stream_class_by_id(id).is_some() {
                return Err(Error::validation(format!(
                    "trace already has a stream class with id {id}"
                )));
            }
        }
        self.validate_packet_header_type()?;
        let default_cc = sc.default_clock_class();
        let register_cc = match &default_cc {
            Some(cc) if self.has_clock_class(cc) => false,
            Some(cc) => {
                if self.clock_class_by_name(&cc.name()).is_some() {
                    return Err(Error::validation(format!(
                        "trace already has a different clock class named '{}'",
                        cc.name()
                    )));
                }
                true
            }
            None => false,
        };

        if sc.id().is_none() {
            let next_id = self
                .0
                .stream_classes
                .borrow()
                .iter()
                .filter_map(StreamClass::id)
                .max()
                .map(|id| id + 1)
                .unwrap_or(0);
            sc.assign_id(next_id);
        }
        if let (Some(cc), true) = (&default_cc, register_cc) {
            debug!(clock_class = %cc.name(), "Registered stream class default clock class");
            self.0.clock_classes.borrow_mut().push(cc.clone());
        }
        sc.set_trace(self);
        self.0.stream_classes.borrow_mut().push(sc.clone());
        debug!(trace = ?self.name(), stream_class_id = ?sc.id(), "Added stream class");
        self.freeze();
        sc.freeze();
        Ok(())
    }

    fn validate_packet_header_type(&self) -> Result<(), Error> {
        let existing = self.0.stream_classes.borrow().len();
        let ph = match self.packet_header_type() {
            Some(ph) => ph,
            None if existing >= 1 => {
                return Err(Error::validation(
                    "a trace with more than one stream class needs a packet header field type",
                ))
            }
            None => return Ok(()),
        };
        if ph.has_mapped_clock_class() {
            return Err(Error::validation(
                "packet header field type can't contain a field type mapped to a clock class",
            ));
        }
        let is_unsigned_int = |ft: &FieldType, size: Option<u32>| match &*ft.kind() {
            FieldTypeKind::Integer(p) => !p.is_signed && size.map(|s| s == p.size).unwrap_or(true),
            _ => false,
        };
        if let Some(magic) = ph.field_by_name("magic") {
            if !is_unsigned_int(&magic, Some(32)) {
                return Err(Error::validation(
                    "packet header 'magic' field type must be a 32-bit unsigned integer",
                ));
            }
            if ph.field_at(0).map(|(n, _)| n != "magic").unwrap_or(true) {
                return Err(Error::validation(
                    "packet header 'magic' field must be the first field",
                ));
            }
        }
        if let Some(uuid) = ph.field_by_name("uuid") {
            let valid = match &*uuid.kind() {
                FieldTypeKind::Array { element, length } => {
                    *length == 16 && is_unsigned_int(element, Some(8))
                }
                _ => false,
            };
            if !valid {
                return Err(Error::validation(
                    "packet header 'uuid' field type must be an array of 16 8-bit unsigned integers",
                ));
            }
        }
        match ph.field_by_name("stream_id") {
            None if existing >= 1 => {
                return Err(Error::validation(
                    "packet header needs a 'stream_id' field with more than one stream class",
                ))
            }
            Some(ft) if !is_unsigned_int(&ft, None) => {
                return Err(Error::validation(
                    "packet header 'stream_id' field type must be an unsigned integer",
                ))
            }
            _ => (),
        }
        if let Some(ft) = ph.field_by_name("packet_seq_num") {
            if !is_unsigned_int(&ft, None) {
                return Err(Error::validation(
                    "packet header 'packet_seq_num' field type must be an unsigned integer",
                ));
            }
        }
        Ok(())
    }

    /// Number of stream classes.
    pub fn len(&self) -> usize {
        self.0.stream_classes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stream_class_by_id(&self, id: u64) -> Option<StreamClass> {
        self.0
            .stream_classes
            .borrow()
            .iter()
            .find(|sc| sc.id() == Some(id))
            .cloned()
    }

    /// Iterates over the stream classes in insertion order. Each call starts over.
    pub fn iter(&self) -> std::vec::IntoIter<StreamClass> {
        self.0.stream_classes.borrow().clone().into_iter()
    }

    /// Creates a stream of class `sc`, which must belong to this trace.
    pub fn create_stream(
        &self,
        sc: &StreamClass,
        name: Option<&str>,
        id: Option<u64>,
    ) -> Result<Stream, Error> {
        self.check_not_static()?;
        if !sc.trace().map(|t| t.ptr_eq(self)).unwrap_or(false) {
            return Err(Error::creation(
                "stream",
                "stream class doesn't belong to this trace",
            ));
        }
        if let Some(id) = id {
            if i64::try_from(id).is_err() {
                return Err(Error::validation(format!(
                    "stream id {id} is out of the signed 64-bit range"
                )));
            }
            let taken = self
                .0
                .streams
                .borrow()
                .iter()
                .any(|s| s.stream_class().ptr_eq(sc) && s.id() == Some(id));
            if taken {
                return Err(Error::validation(format!(
                    "stream class already has a stream with id {id}"
                )));
            }
        }
        let stream = Stream::new(sc, self, name, id);
        self.0.streams.borrow_mut().push(stream.clone());
        debug!(stream_class_id = ?sc.id(), stream_id = ?id, name = ?name, "Created stream");
        self.freeze();
        Ok(stream)
    }

    pub fn streams(&self) -> Vec<Stream> {
        self.0.streams.borrow().clone()
    }

    pub fn stream_count(&self) -> usize {
        self.0.streams.borrow().len()
    }

    /// Makes the trace static: no stream class, clock class or stream can be
    /// added anymore. This can't be undone. The "trace is static" listeners are
    /// called once the trace is static.
    pub fn set_is_static(&self) -> Result<(), Error> {
        if self.is_static() {
            return Ok(());
        }
        if self
            .packet_header_type()
            .map(|ph| ph.has_mapped_clock_class())
            .unwrap_or(false)
        {
            return Err(Error::validation(
                "packet header field type can't contain a field type mapped to a clock class",
            ));
        }
        self.0.is_static.set(true);
        self.freeze();
        debug!(name = ?self.name(), "Trace is now static");
        // Listeners may add or remove listeners, so none of them runs under a borrow
        let listeners: Vec<StaticListener> = self
            .0
            .static_listeners
            .borrow()
            .iter()
            .flatten()
            .cloned()
            .collect();
        for listener in listeners {
            listener(self);
        }
        Ok(())
    }

    /// Registers a function to call when the trace becomes static. Returns the
    /// listener id, for removal.
    pub fn add_is_static_listener<F>(&self, listener: F) -> Result<usize, Error>
    where
        F: Fn(&Trace) + 'static,
    {
        self.check_not_static()?;
        let mut listeners = self.0.static_listeners.borrow_mut();
        let id = match listeners.iter().position(Option::is_none) {
            Some(free) => {
                listeners[free] = Some(Rc::new(listener));
                free
            }
            None => {
                listeners.push(Some(Rc::new(listener)));
                listeners.len() - 1
            }
        };
        Ok(id)
    }

    pub fn remove_is_static_listener(&self, id: usize) -> Result<(), Error> {
        let mut listeners = self.0.static_listeners.borrow_mut();
        match listeners.get_mut(id) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(Error::not_found("trace is static listener", id)),
        }
    }

    pub(crate) fn freeze(&self) {
        if self.0.frozen.replace(true) {
            return;
        }
        debug!(name = ?self.name(), "Froze trace");
        if let Some(ph) = &*self.0.packet_header_type.borrow() {
            ph.freeze();
        }
        for cc in self.0.clock_classes.borrow().iter() {
            cc.freeze();
        }
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = StreamClass;
    type IntoIter = std::vec::IntoIter<StreamClass>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl PartialEq for Trace {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (*self.0.props.borrow() == *other.0.props.borrow()
                && *self.0.environment.borrow() == *other.0.environment.borrow()
                && *self.0.clock_classes.borrow() == *other.0.clock_classes.borrow()
                && *self.0.packet_header_type.borrow() == *other.0.packet_header_type.borrow()
                && *self.0.stream_classes.borrow() == *other.0.stream_classes.borrow()
                && self.is_static() == other.is_static())
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("props", &*self.0.props.borrow())
            .field("environment", &*self.0.environment.borrow())
            .field("clock_classes", &*self.0.clock_classes.borrow())
            .field("stream_classes", &*self.0.stream_classes.borrow())
            .field("is_static", &self.is_static())
            .finish()
    }
}
