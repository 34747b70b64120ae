//! # Overview
//!
//! An in-memory model of CTF trace data:
//! * Trace (metadata, environment, clock classes, packet header type)
//!   - One or more stream classes, each with event classes
//!   - Streams, instances of a stream class
//!     * Packets
//!       - Events, whose fields follow their classes' field types
//!
//! Field types describe the layout of data, fields hold values conforming
//! to a field type. Classes and types are shared, mutable handles until they
//! get frozen, which happens as soon as anything is instantiated from them.
//! Messages carry events, packet and stream boundaries through a
//! [`message::MessageIterator`], which checks their ordering.
//!
//! # Attrs Mappings
//!
//! Trace Attrs
//! * trace.name
//! * trace.uuid
//! * trace.native_byte_order
//! * trace.is_static
//! * trace.stream_count
//! * trace.stream_class_count
//! * trace.clock_class_count
//! * trace.env.`<fields>`
//!
//! Stream Attrs
//! * stream.id
//! * stream.name
//! * stream.description
//! * stream.discarded_events
//! * stream.class.id
//! * stream.class.name
//! * stream.class.event_class_count
//! * stream.clock_style
//! * stream.clock.frequency
//! * stream.clock.offset_seconds
//! * stream.clock.offset_cycles
//! * stream.clock.precision
//! * stream.clock.absolute
//! * stream.clock.name
//! * stream.clock.description
//! * stream.clock.uuid
//!   - stream.time_domain
//!
//! Event Attrs
//! * event.name
//! * event.id
//! * event.stream_id
//! * event.stream_class_id
//! * event.log_level
//! * event.emf_uri
//! * event.clock_snapshot
//!   - event.timestamp
//! * event.header.<possibly.nested.fields>
//! * event.common_context.<possibly.nested.fields>
//! * event.specific_context.<possibly.nested.fields>
//! * event.packet_context.<possibly.nested.fields>
//! * event.<possibly.nested.fields>
//!
//! # Mapping Conventions
//!
//! ## Enumerations
//!
//! An enumeration field gets an Attr for its value and, when exactly one
//! mapping contains that value, a `.label` Attr naming it.
//!
//! Example: `my_enum` has value 5 and the single mapping "RUNNING"
//! * event.my_enum = 5
//! * event.my_enum.label = "RUNNING"
//!
//! Example: `my_enum` has value 1 and no mapping
//! * event.my_enum = 1
//!
//! ## Arrays, sequences and variants
//!
//! Elements are keyed by their index, a variant by its selected option.
//!
//! Example: `args` is a sequence of two integers
//! * event.args.0 = 3
//! * event.args.1 = 4
#![warn(clippy::all)]

pub mod attrs;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod event_class;
pub mod field;
pub mod field_type;
pub mod message;
pub mod opts;
pub mod prelude;
pub mod properties;
pub mod stream;
pub mod stream_class;
pub mod trace;
pub mod tracing;
pub mod types;
