use crate::error::Error;
use crate::types::check_identifier;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;
use uuid::Uuid;

const NS_PER_SECOND: u64 = 1_000_000_000;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ClockClassProperties {
    pub name: String,
    pub description: Option<String>,
    pub frequency: u64,
    pub precision: u64,
    pub offset_seconds: i64,
    pub offset_cycles: u64,
    pub is_absolute: bool,
    pub uuid: Option<Uuid>,
}

#[derive(Debug)]
struct ClockClassInner {
    frozen: Cell<bool>,
    props: RefCell<ClockClassProperties>,
}

/// A named time reference. Cloning shares the same clock class.
#[derive(Clone)]
pub struct ClockClass(Rc<ClockClassInner>);

impl ClockClass {
    pub fn new(name: &str) -> Result<Self, Error> {
        check_identifier("Clock class name", name)?;
        Ok(ClockClass(Rc::new(ClockClassInner {
            frozen: Cell::new(false),
            props: RefCell::new(ClockClassProperties {
                name: name.to_owned(),
                description: None,
                frequency: NS_PER_SECOND,
                precision: 0,
                offset_seconds: 0,
                offset_cycles: 0,
                is_absolute: false,
                uuid: None,
            }),
        })))
    }

    pub fn properties(&self) -> Ref<'_, ClockClassProperties> {
        self.0.props.borrow()
    }

    pub fn name(&self) -> String {
        self.0.props.borrow().name.clone()
    }

    pub fn frequency(&self) -> u64 {
        self.0.props.borrow().frequency
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    /// Returns true if both handles refer to the same clock class.
    pub fn ptr_eq(&self, other: &ClockClass) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn check_hot(&self) -> Result<(), Error> {
        if self.is_frozen() {
            Err(Error::Frozen("clock class"))
        } else {
            Ok(())
        }
    }

    pub fn set_description(&self, description: &str) -> Result<(), Error> {
        self.check_hot()?;
        self.0.props.borrow_mut().description = Some(description.to_owned());
        Ok(())
    }

    pub fn set_frequency(&self, frequency: u64) -> Result<(), Error> {
        self.check_hot()?;
        if frequency == 0 || frequency == u64::MAX {
            return Err(Error::validation(format!(
                "invalid clock class frequency {frequency}"
            )));
        }
        let mut props = self.0.props.borrow_mut();
        if props.offset_cycles >= frequency {
            return Err(Error::validation(format!(
                "clock class offset cycles ({}) must be less than its frequency ({frequency})",
                props.offset_cycles
            )));
        }
        props.frequency = frequency;
        Ok(())
    }

    pub fn set_precision(&self, precision: u64) -> Result<(), Error> {
        self.check_hot()?;
        if precision == u64::MAX {
            return Err(Error::validation("invalid clock class precision"));
        }
        self.0.props.borrow_mut().precision = precision;
        Ok(())
    }

    pub fn set_offset(&self, seconds: i64, cycles: u64) -> Result<(), Error> {
        self.check_hot()?;
        let mut props = self.0.props.borrow_mut();
        if cycles >= props.frequency {
            return Err(Error::validation(format!(
                "clock class offset cycles ({cycles}) must be less than its frequency ({})",
                props.frequency
            )));
        }
        props.offset_seconds = seconds;
        props.offset_cycles = cycles;
        Ok(())
    }

    pub fn set_is_absolute(&self, is_absolute: bool) -> Result<(), Error> {
        self.check_hot()?;
        self.0.props.borrow_mut().is_absolute = is_absolute;
        Ok(())
    }

    pub fn set_uuid(&self, uuid: Uuid) -> Result<(), Error> {
        self.check_hot()?;
        self.0.props.borrow_mut().uuid = Some(uuid);
        Ok(())
    }

    pub(crate) fn freeze(&self) {
        if !self.0.frozen.replace(true) {
            debug!(name = %self.0.props.borrow().name, "Froze clock class");
        }
    }

    /// Converts a value in cycles of this clock to nanoseconds from its origin,
    /// including the clock offset.
    pub fn cycles_to_ns_from_origin(&self, cycles: u64) -> Result<i64, Error> {
        let props = self.0.props.borrow();
        let to_ns = |c: u64| -> i128 {
            if props.frequency == NS_PER_SECOND {
                i128::from(c)
            } else {
                i128::from(c) * i128::from(NS_PER_SECOND) / i128::from(props.frequency)
            }
        };
        let ns = i128::from(props.offset_seconds) * i128::from(NS_PER_SECOND)
            + to_ns(props.offset_cycles)
            + to_ns(cycles);
        i64::try_from(ns).map_err(|_| {
            Error::validation(format!(
                "clock value of {cycles} cycles overflows a signed 64-bit nanosecond count from origin"
            ))
        })
    }

    /// A new, unfrozen clock class with the same properties.
    pub fn deep_copy(&self) -> ClockClass {
        ClockClass(Rc::new(ClockClassInner {
            frozen: Cell::new(false),
            props: RefCell::new(self.0.props.borrow().clone()),
        }))
    }
}

impl PartialEq for ClockClass {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.props.borrow() == *other.0.props.borrow()
    }
}

impl fmt::Debug for ClockClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockClass")
            .field("props", &*self.0.props.borrow())
            .field("frozen", &self.0.frozen.get())
            .finish()
    }
}

/// A timestamp measured against a clock class.
#[derive(Clone, PartialEq, Debug)]
pub struct ClockValue {
    clock_class: ClockClass,
    cycles: u64,
}

impl ClockValue {
    pub fn new(clock_class: &ClockClass, cycles: u64) -> Self {
        ClockValue {
            clock_class: clock_class.clone(),
            cycles,
        }
    }

    pub fn clock_class(&self) -> &ClockClass {
        &self.clock_class
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn ns_from_origin(&self) -> Result<i64, Error> {
        self.clock_class.cycles_to_ns_from_origin(self.cycles)
    }
}
