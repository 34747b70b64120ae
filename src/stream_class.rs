use crate::clock::ClockClass;
use crate::error::Error;
use crate::event_class::{check_root_type, EventClass};
use crate::field_type::FieldType;
use crate::trace::{Trace, WeakTrace};
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

#[derive(Clone, PartialEq, Debug, Default)]
pub struct StreamClassProperties {
    pub name: Option<String>,
    pub id: Option<u64>,
    pub packet_context_type: Option<FieldType>,
    pub event_header_type: Option<FieldType>,
    pub event_context_type: Option<FieldType>,
    pub default_clock_class: Option<ClockClass>,
}

pub(crate) struct StreamClassInner {
    frozen: Cell<bool>,
    props: RefCell<StreamClassProperties>,
    event_classes: RefCell<Vec<EventClass>>,
    trace: RefCell<WeakTrace>,
}

/// The shared template of streams. Cloning shares the same stream class.
#[derive(Clone)]
pub struct StreamClass(Rc<StreamClassInner>);

/// Upward reference from an event class to its stream class.
#[derive(Clone, Default)]
pub(crate) struct WeakStreamClass(Weak<StreamClassInner>);

impl WeakStreamClass {
    pub(crate) fn upgrade(&self) -> Option<StreamClass> {
        self.0.upgrade().map(StreamClass)
    }
}

impl StreamClass {
    pub fn new() -> Self {
        StreamClass(Rc::new(StreamClassInner {
            frozen: Cell::new(false),
            props: RefCell::new(StreamClassProperties::default()),
            event_classes: RefCell::new(Vec::new()),
            trace: RefCell::new(WeakTrace::default()),
        }))
    }

    pub fn with_name(name: &str) -> Self {
        let sc = Self::new();
        sc.0.props.borrow_mut().name = Some(name.to_owned());
        sc
    }

    pub(crate) fn downgrade(&self) -> WeakStreamClass {
        WeakStreamClass(Rc::downgrade(&self.0))
    }

    pub fn properties(&self) -> Ref<'_, StreamClassProperties> {
        self.0.props.borrow()
    }

    pub fn name(&self) -> Option<String> {
        self.0.props.borrow().name.clone()
    }

    pub fn id(&self) -> Option<u64> {
        self.0.props.borrow().id
    }

    pub fn default_clock_class(&self) -> Option<ClockClass> {
        self.0.props.borrow().default_clock_class.clone()
    }

    pub fn packet_context_type(&self) -> Option<FieldType> {
        self.0.props.borrow().packet_context_type.clone()
    }

    pub fn event_header_type(&self) -> Option<FieldType> {
        self.0.props.borrow().event_header_type.clone()
    }

    pub fn event_context_type(&self) -> Option<FieldType> {
        self.0.props.borrow().event_context_type.clone()
    }

    /// The trace this stream class was added to, if any.
    pub fn trace(&self) -> Option<Trace> {
        self.0.trace.borrow().upgrade()
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    pub fn ptr_eq(&self, other: &StreamClass) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn check_hot(&self) -> Result<(), Error> {
        if self.is_frozen() {
            warn!(id = ?self.id(), "Rejected modification of a frozen stream class");
            Err(Error::Frozen("stream class"))
        } else {
            Ok(())
        }
    }

    pub fn set_name(&self, name: &str) -> Result<(), Error> {
        self.check_hot()?;
        self.0.props.borrow_mut().name = Some(name.to_owned());
        Ok(())
    }

    pub fn set_id(&self, id: u64) -> Result<(), Error> {
        self.check_hot()?;
        if i64::try_from(id).is_err() {
            return Err(Error::validation(format!(
                "stream class id {id} is out of the signed 64-bit range"
            )));
        }
        self.0.props.borrow_mut().id = Some(id);
        Ok(())
    }

    pub fn set_packet_context_type(&self, ft: Option<&FieldType>) -> Result<(), Error> {
        self.check_hot()?;
        check_root_type("packet context", ft)?;
        self.0.props.borrow_mut().packet_context_type = ft.cloned();
        Ok(())
    }

    pub fn set_event_header_type(&self, ft: Option<&FieldType>) -> Result<(), Error> {
        self.check_hot()?;
        check_root_type("event header", ft)?;
        self.0.props.borrow_mut().event_header_type = ft.cloned();
        Ok(())
    }

    pub fn set_event_context_type(&self, ft: Option<&FieldType>) -> Result<(), Error> {
        self.check_hot()?;
        check_root_type("stream event context", ft)?;
        self.0.props.borrow_mut().event_context_type = ft.cloned();
        Ok(())
    }

    pub fn set_default_clock_class(&self, cc: Option<&ClockClass>) -> Result<(), Error> {
        self.check_hot()?;
        self.0.props.borrow_mut().default_clock_class = cc.cloned();
        Ok(())
    }

    /// Adds an event class, assigning it the next free id when it has none.
    /// Event classes can still be added once the stream class is frozen; they
    /// get frozen right away.
    pub fn add_event_class(&self, ec: &EventClass) -> Result<(), Error> {
        if let Some(id) = ec.id() {
            if self.event_class_by_id(id).is_some() {
                return Err(Error::validation(format!(
                    "stream class already has an event class with id {id}"
                )));
            }
        }
        ec.set_stream_class(self)?;
        let mut event_classes = self.0.event_classes.borrow_mut();
        if ec.id().is_none() {
            let next_id = event_classes
                .iter()
                .filter_map(EventClass::id)
                .max()
                .map(|id| id + 1)
                .unwrap_or(0);
            ec.assign_id(next_id);
        }
        debug!(stream_class_id = ?self.id(), event_class = %ec.name(), id = ?ec.id(), "Added event class");
        event_classes.push(ec.clone());
        if self.is_frozen() {
            ec.freeze();
        }
        Ok(())
    }

    pub fn event_classes(&self) -> Vec<EventClass> {
        self.0.event_classes.borrow().clone()
    }

    pub fn event_class_count(&self) -> usize {
        self.0.event_classes.borrow().len()
    }

    pub fn event_class_by_id(&self, id: u64) -> Option<EventClass> {
        self.0
            .event_classes
            .borrow()
            .iter()
            .find(|ec| ec.id() == Some(id))
            .cloned()
    }

    pub fn event_class_by_name(&self, name: &str) -> Option<EventClass> {
        self.0
            .event_classes
            .borrow()
            .iter()
            .find(|ec| ec.name() == name)
            .cloned()
    }

    pub(crate) fn set_trace(&self, trace: &Trace) {
        *self.0.trace.borrow_mut() = trace.downgrade();
    }

    pub(crate) fn assign_id(&self, id: u64) {
        self.0.props.borrow_mut().id = Some(id);
    }

    pub(crate) fn freeze(&self) {
        if self.0.frozen.replace(true) {
            return;
        }
        let props = self.0.props.borrow();
        debug!(id = ?props.id, name = ?props.name, "Froze stream class");
        for ft in props
            .packet_context_type
            .iter()
            .chain(props.event_header_type.iter())
            .chain(props.event_context_type.iter())
        {
            ft.freeze();
        }
        if let Some(cc) = &props.default_clock_class {
            cc.freeze();
        }
        for ec in self.0.event_classes.borrow().iter() {
            ec.freeze();
        }
    }
}

impl Default for StreamClass {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for StreamClass {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (*self.0.props.borrow() == *other.0.props.borrow()
                && *self.0.event_classes.borrow() == *other.0.event_classes.borrow())
    }
}

impl fmt::Debug for StreamClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClass")
            .field("props", &*self.0.props.borrow())
            .field("event_classes", &*self.0.event_classes.borrow())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
