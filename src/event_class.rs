use crate::error::Error;
use crate::field_type::{FieldType, FieldTypeId};
use crate::stream_class::{StreamClass, WeakStreamClass};
use crate::types::LogLevel;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;
use url::Url;

#[derive(Clone, PartialEq, Debug)]
pub struct EventClassProperties {
    pub name: String,
    pub id: Option<u64>,
    pub log_level: Option<LogLevel>,
    pub emf_uri: Option<Url>,
    pub context_type: Option<FieldType>,
    pub payload_type: Option<FieldType>,
}

struct EventClassInner {
    frozen: Cell<bool>,
    props: RefCell<EventClassProperties>,
    stream_class: RefCell<WeakStreamClass>,
}

/// The template of the events of one kind. Cloning shares the same event class.
#[derive(Clone)]
pub struct EventClass(Rc<EventClassInner>);

impl EventClass {
    pub fn new(name: &str) -> Result<Self, Error> {
        if name.is_empty() {
            return Err(Error::validation("event class name can't be empty"));
        }
        Ok(EventClass(Rc::new(EventClassInner {
            frozen: Cell::new(false),
            props: RefCell::new(EventClassProperties {
                name: name.to_owned(),
                id: None,
                log_level: None,
                emf_uri: None,
                context_type: None,
                payload_type: None,
            }),
            stream_class: RefCell::new(WeakStreamClass::default()),
        })))
    }

    pub fn properties(&self) -> Ref<'_, EventClassProperties> {
        self.0.props.borrow()
    }

    pub fn name(&self) -> String {
        self.0.props.borrow().name.clone()
    }

    pub fn id(&self) -> Option<u64> {
        self.0.props.borrow().id
    }

    pub fn context_type(&self) -> Option<FieldType> {
        self.0.props.borrow().context_type.clone()
    }

    pub fn payload_type(&self) -> Option<FieldType> {
        self.0.props.borrow().payload_type.clone()
    }

    /// The stream class this event class was added to, if any.
    pub fn stream_class(&self) -> Option<StreamClass> {
        self.0.stream_class.borrow().upgrade()
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    pub fn ptr_eq(&self, other: &EventClass) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn check_hot(&self) -> Result<(), Error> {
        if self.is_frozen() {
            Err(Error::Frozen("event class"))
        } else {
            Ok(())
        }
    }

    pub fn set_id(&self, id: u64) -> Result<(), Error> {
        self.check_hot()?;
        if i64::try_from(id).is_err() {
            return Err(Error::validation(format!(
                "event class id {id} is out of the signed 64-bit range"
            )));
        }
        self.0.props.borrow_mut().id = Some(id);
        Ok(())
    }

    pub fn set_log_level(&self, log_level: Option<LogLevel>) -> Result<(), Error> {
        self.check_hot()?;
        self.0.props.borrow_mut().log_level = log_level;
        Ok(())
    }

    pub fn set_emf_uri(&self, uri: &str) -> Result<(), Error> {
        self.check_hot()?;
        let uri = Url::parse(uri)
            .map_err(|e| Error::validation(format!("invalid EMF URI '{uri}': {e}")))?;
        self.0.props.borrow_mut().emf_uri = Some(uri);
        Ok(())
    }

    pub fn set_context_type(&self, ft: Option<&FieldType>) -> Result<(), Error> {
        self.check_hot()?;
        check_root_type("event class context", ft)?;
        self.0.props.borrow_mut().context_type = ft.cloned();
        Ok(())
    }

    pub fn set_payload_type(&self, ft: Option<&FieldType>) -> Result<(), Error> {
        self.check_hot()?;
        check_root_type("event class payload", ft)?;
        self.0.props.borrow_mut().payload_type = ft.cloned();
        Ok(())
    }

    pub(crate) fn set_stream_class(&self, sc: &StreamClass) -> Result<(), Error> {
        if self.stream_class().is_some() {
            return Err(Error::validation(format!(
                "event class '{}' already belongs to a stream class",
                self.name()
            )));
        }
        *self.0.stream_class.borrow_mut() = sc.downgrade();
        Ok(())
    }

    /// Assigns the id when the event class is added without one.
    pub(crate) fn assign_id(&self, id: u64) {
        self.0.props.borrow_mut().id = Some(id);
    }

    pub(crate) fn freeze(&self) {
        if self.0.frozen.replace(true) {
            return;
        }
        let props = self.0.props.borrow();
        debug!(name = %props.name, id = ?props.id, "Froze event class");
        for ft in props.context_type.iter().chain(props.payload_type.iter()) {
            ft.freeze();
        }
    }
}

/// Root types of events and packets must be structures.
pub(crate) fn check_root_type(what: &str, ft: Option<&FieldType>) -> Result<(), Error> {
    match ft {
        Some(ft) if ft.id() != FieldTypeId::Structure => Err(Error::validation(format!(
            "{what} field type must be a structure, got {}",
            ft.id()
        ))),
        _ => Ok(()),
    }
}

impl PartialEq for EventClass {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.props.borrow() == *other.0.props.borrow()
    }
}

impl fmt::Debug for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventClass")
            .field("props", &*self.0.props.borrow())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
