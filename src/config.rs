//! Declarative trace schemas.
//!
//! A schema is a JSON document describing a trace's metadata, clock classes,
//! stream classes, event classes and field types. [`TraceConfig::build`]
//! turns it into a [`Trace`].

use crate::attrs::{AttrKey, AttrVal};
use crate::clock::ClockClass;
use crate::error::Error;
use crate::event_class::EventClass;
use crate::field_type::FieldType;
use crate::opts::InspectOpts;
use crate::stream_class::StreamClass;
use crate::trace::{EnvValue, Trace};
use crate::types::{Base, ByteOrder, Encoding, LogLevel};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

pub const CONFIG_ENV_VAR: &str = "CTF_IR_CONFIG";

#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CtfIrConfig {
    pub trace: TraceConfig,

    /// Rename a stream attribute key when printing
    pub rename_stream_attrs: Vec<AttrKeyRename>,

    /// Rename an event attribute key when printing
    pub rename_event_attrs: Vec<AttrKeyRename>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AttrKeyRename {
    /// The attr key to rename
    pub original: String,

    /// The new attr key name to use
    pub new: String,
}

#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TraceConfig {
    pub name: Option<String>,
    pub uuid: Option<Uuid>,
    pub native_byte_order: Option<ByteOrder>,

    /// Ordered environment entries
    pub environment: Vec<EnvEntryConfig>,

    pub clock_classes: Vec<ClockClassConfig>,
    pub packet_header: Option<FieldTypeConfig>,
    pub stream_classes: Vec<StreamClassConfig>,
    pub streams: Vec<StreamConfig>,

    /// Make the trace static once built
    pub is_static: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnvEntryConfig {
    pub name: String,
    pub value: EnvValueConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValueConfig {
    Integer(i64),
    String(String),
}

impl From<&EnvValueConfig> for EnvValue {
    fn from(v: &EnvValueConfig) -> Self {
        match v {
            EnvValueConfig::Integer(i) => EnvValue::Integer(*i),
            EnvValueConfig::String(s) => EnvValue::String(s.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClockClassConfig {
    pub name: String,
    pub description: Option<String>,
    /// Cycles per second, 1 GHz when absent
    pub frequency: Option<u64>,
    pub precision: u64,
    pub offset_seconds: i64,
    pub offset_cycles: u64,
    pub is_absolute: bool,
    pub uuid: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StreamClassConfig {
    pub name: Option<String>,
    pub id: Option<u64>,
    /// Name of one of the trace's clock classes
    pub default_clock_class: Option<String>,
    pub packet_context: Option<FieldTypeConfig>,
    pub event_header: Option<FieldTypeConfig>,
    pub event_context: Option<FieldTypeConfig>,
    pub event_classes: Vec<EventClassConfig>,
}

#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EventClassConfig {
    pub name: String,
    pub id: Option<u64>,
    pub log_level: Option<LogLevel>,
    pub emf_uri: Option<String>,
    pub context: Option<FieldTypeConfig>,
    pub payload: Option<FieldTypeConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StreamConfig {
    pub stream_class_id: u64,
    pub name: Option<String>,
    pub id: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NamedFieldTypeConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldTypeConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MappingConfig {
    pub name: String,
    pub lower: serde_json::Number,
    pub upper: serde_json::Number,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FieldTypeConfig {
    #[serde(rename_all = "kebab-case")]
    Integer {
        size: u32,
        #[serde(default)]
        signed: bool,
        base: Option<u8>,
        encoding: Option<Encoding>,
        byte_order: Option<ByteOrder>,
        alignment: Option<u32>,
        /// Name of one of the trace's clock classes
        mapped_clock_class: Option<String>,
    },
    #[serde(rename_all = "kebab-case")]
    Float {
        exponent_digits: Option<u32>,
        mantissa_digits: Option<u32>,
        byte_order: Option<ByteOrder>,
    },
    Enumeration {
        container: Box<FieldTypeConfig>,
        #[serde(default)]
        mappings: Vec<MappingConfig>,
    },
    String {
        encoding: Option<Encoding>,
    },
    Structure {
        #[serde(default)]
        fields: Vec<NamedFieldTypeConfig>,
    },
    #[serde(rename_all = "kebab-case")]
    Variant {
        tag_name: String,
        tag: Option<Box<FieldTypeConfig>>,
        #[serde(default)]
        options: Vec<NamedFieldTypeConfig>,
    },
    Array {
        element: Box<FieldTypeConfig>,
        length: u64,
    },
    #[serde(rename_all = "kebab-case")]
    Sequence {
        element: Box<FieldTypeConfig>,
        length_name: String,
    },
}

impl CtfIrConfig {
    /// Loads the config file named by the options, or else by the
    /// `CTF_IR_CONFIG` environment variable, and applies the options' overrides.
    pub fn load_merge_with_opts(opts: &InspectOpts) -> Result<Self, Error> {
        let mut cfg = if let Some(cfg_path) = &opts.config_file {
            Self::from_file(cfg_path)?
        } else if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
            Self::from_file(Path::new(&env_path))?
        } else {
            Self::default()
        };

        if let Some(name) = &opts.trace_name {
            cfg.trace.name = Some(name.clone());
        }
        if let Some(uuid) = opts.trace_uuid {
            cfg.trace.uuid = Some(uuid);
        }
        if opts.is_static {
            cfg.trace.is_static = true;
        }
        cfg.rename_stream_attrs
            .extend(opts.rename_stream_attr.iter().cloned());
        cfg.rename_event_attrs
            .extend(opts.rename_event_attr.iter().cloned());
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        debug!(path = %path.display(), "Loading configuration");
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl TraceConfig {
    /// Builds the trace described by this schema.
    pub fn build(&self) -> Result<Trace, Error> {
        let trace = Trace::new();
        if let Some(name) = &self.name {
            trace.set_name(name)?;
        }
        if let Some(uuid) = self.uuid {
            trace.set_uuid(uuid)?;
        }
        if let Some(bo) = self.native_byte_order {
            trace.set_native_byte_order(bo)?;
        }
        for entry in &self.environment {
            trace.set_environment_entry(&entry.name, EnvValue::from(&entry.value))?;
        }

        for cc_cfg in &self.clock_classes {
            trace.add_clock_class(&cc_cfg.build()?)?;
        }
        let clocks = trace.clock_classes();

        if let Some(ph) = &self.packet_header {
            trace.set_packet_header_type(Some(&ph.build(&clocks)?))?;
        }

        for sc_cfg in &self.stream_classes {
            let sc = sc_cfg.build(&clocks)?;
            trace.add_stream_class(&sc)?;
        }

        for s in &self.streams {
            let sc = trace.stream_class_by_id(s.stream_class_id).ok_or_else(|| {
                Error::Config(format!(
                    "stream refers to unknown stream class id {}",
                    s.stream_class_id
                ))
            })?;
            trace.create_stream(&sc, s.name.as_deref(), s.id)?;
        }

        if self.is_static {
            trace.set_is_static()?;
        }
        debug!(
            stream_classes = trace.len(),
            streams = trace.stream_count(),
            "Built trace from configuration"
        );
        Ok(trace)
    }
}

impl ClockClassConfig {
    fn build(&self) -> Result<ClockClass, Error> {
        let cc = ClockClass::new(&self.name)?;
        if let Some(d) = &self.description {
            cc.set_description(d)?;
        }
        if let Some(f) = self.frequency {
            cc.set_frequency(f)?;
        }
        cc.set_precision(self.precision)?;
        cc.set_offset(self.offset_seconds, self.offset_cycles)?;
        cc.set_is_absolute(self.is_absolute)?;
        if let Some(uuid) = self.uuid {
            cc.set_uuid(uuid)?;
        }
        Ok(cc)
    }
}

impl StreamClassConfig {
    fn build(&self, clocks: &[ClockClass]) -> Result<StreamClass, Error> {
        let sc = StreamClass::new();
        if let Some(name) = &self.name {
            sc.set_name(name)?;
        }
        if let Some(id) = self.id {
            sc.set_id(id)?;
        }
        if let Some(cc_name) = &self.default_clock_class {
            sc.set_default_clock_class(Some(&find_clock(clocks, cc_name)?))?;
        }
        let build = |ft: &Option<FieldTypeConfig>| ft.as_ref().map(|ft| ft.build(clocks)).transpose();
        sc.set_packet_context_type(build(&self.packet_context)?.as_ref())?;
        sc.set_event_header_type(build(&self.event_header)?.as_ref())?;
        sc.set_event_context_type(build(&self.event_context)?.as_ref())?;

        for ec_cfg in &self.event_classes {
            let ec = EventClass::new(&ec_cfg.name)?;
            if let Some(id) = ec_cfg.id {
                ec.set_id(id)?;
            }
            ec.set_log_level(ec_cfg.log_level)?;
            if let Some(uri) = &ec_cfg.emf_uri {
                ec.set_emf_uri(uri)?;
            }
            ec.set_context_type(build(&ec_cfg.context)?.as_ref())?;
            ec.set_payload_type(build(&ec_cfg.payload)?.as_ref())?;
            sc.add_event_class(&ec)?;
        }
        Ok(sc)
    }
}

impl FieldTypeConfig {
    pub fn build(&self, clocks: &[ClockClass]) -> Result<FieldType, Error> {
        Ok(match self {
            FieldTypeConfig::Integer {
                size,
                signed,
                base,
                encoding,
                byte_order,
                alignment,
                mapped_clock_class,
            } => {
                let ft = FieldType::integer(*size, *signed)?;
                if let Some(radix) = base {
                    ft.set_base(Base::try_from(*radix)?)?;
                }
                if let Some(e) = encoding {
                    ft.set_encoding(*e)?;
                }
                if let Some(bo) = byte_order {
                    ft.set_byte_order(*bo)?;
                }
                if let Some(a) = alignment {
                    ft.set_alignment(*a)?;
                }
                if let Some(cc_name) = mapped_clock_class {
                    ft.set_mapped_clock_class(Some(&find_clock(clocks, cc_name)?))?;
                }
                ft
            }
            FieldTypeConfig::Float {
                exponent_digits,
                mantissa_digits,
                byte_order,
            } => {
                let ft = match (exponent_digits, mantissa_digits) {
                    (Some(e), Some(m)) => FieldType::float_with_digits(*e, *m)?,
                    (None, None) => FieldType::float(),
                    _ => {
                        return Err(Error::Config(
                            "float exponent and mantissa digits go together".to_owned(),
                        ))
                    }
                };
                if let Some(bo) = byte_order {
                    ft.set_byte_order(*bo)?;
                }
                ft
            }
            FieldTypeConfig::Enumeration {
                container,
                mappings,
            } => {
                let container = container.build(clocks)?;
                let ft = FieldType::enumeration(&container)?;
                let signed = container
                    .integer_properties()
                    .map(|p| p.is_signed)
                    .unwrap_or(false);
                for m in mappings {
                    if signed {
                        ft.add_signed_mapping(&m.name, as_i64(&m.lower)?, as_i64(&m.upper)?)?;
                    } else {
                        ft.add_unsigned_mapping(&m.name, as_u64(&m.lower)?, as_u64(&m.upper)?)?;
                    }
                }
                ft
            }
            FieldTypeConfig::String { encoding } => {
                let ft = FieldType::string();
                if let Some(e) = encoding {
                    ft.set_encoding(*e)?;
                }
                ft
            }
            FieldTypeConfig::Structure { fields } => {
                let ft = FieldType::structure();
                for f in fields {
                    ft.add_field(&f.name, &f.field_type.build(clocks)?)?;
                }
                ft
            }
            FieldTypeConfig::Variant {
                tag_name,
                tag,
                options,
            } => {
                let tag = tag.as_ref().map(|t| t.build(clocks)).transpose()?;
                let ft = FieldType::variant(tag_name, tag.as_ref())?;
                for o in options {
                    ft.add_option(&o.name, &o.field_type.build(clocks)?)?;
                }
                ft
            }
            FieldTypeConfig::Array { element, length } => {
                FieldType::array(&element.build(clocks)?, *length)
            }
            FieldTypeConfig::Sequence {
                element,
                length_name,
            } => FieldType::sequence(&element.build(clocks)?, length_name)?,
        })
    }
}

/// Applies the renames to every matching key, in order.
pub fn rename_attr_keys(renames: &[AttrKeyRename], attr_kvs: &mut [(AttrKey, AttrVal)]) {
    for (k, _) in attr_kvs.iter_mut() {
        for r in renames {
            if k.as_str() == r.original {
                *k = AttrKey::new(r.new.clone());
            }
        }
    }
}

fn find_clock(clocks: &[ClockClass], name: &str) -> Result<ClockClass, Error> {
    clocks
        .iter()
        .find(|cc| cc.name() == name)
        .cloned()
        .ok_or_else(|| Error::Config(format!("unknown clock class '{name}'")))
}

fn as_i64(n: &serde_json::Number) -> Result<i64, Error> {
    n.as_i64()
        .ok_or_else(|| Error::Config(format!("mapping bound {n} isn't a signed 64-bit integer")))
}

fn as_u64(n: &serde_json::Number) -> Result<u64, Error> {
    n.as_u64()
        .ok_or_else(|| Error::Config(format!("mapping bound {n} isn't an unsigned 64-bit integer")))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field_type::FieldTypeId;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;
    use std::{fs::File, io::Write};

    const SCHEMA: &str = r#"{
  "rename-event-attrs": [
    { "original": "event.common_context.tid", "new": "event.thread" }
  ],
  "trace": {
    "name": "kernel",
    "uuid": "a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d2",
    "native-byte-order": "le",
    "environment": [
      { "name": "hostname", "value": "box" },
      { "name": "tracer_major", "value": 2 }
    ],
    "clock-classes": [
      { "name": "monotonic", "frequency": 1000000000, "is-absolute": true }
    ],
    "packet-header": {
      "kind": "structure",
      "fields": [
        { "name": "magic", "type": { "kind": "integer", "size": 32 } },
        { "name": "stream_id", "type": { "kind": "integer", "size": 8 } }
      ]
    },
    "stream-classes": [
      {
        "name": "channel0",
        "id": 0,
        "default-clock-class": "monotonic",
        "event-context": {
          "kind": "structure",
          "fields": [{ "name": "tid", "type": { "kind": "integer", "size": 32, "signed": true } }]
        },
        "event-classes": [
          {
            "name": "sched_switch",
            "log-level": "info",
            "payload": {
              "kind": "structure",
              "fields": [
                {
                  "name": "prev_state",
                  "type": {
                    "kind": "enumeration",
                    "container": { "kind": "integer", "size": 8 },
                    "mappings": [
                      { "name": "RUNNING", "lower": 0, "upper": 0 },
                      { "name": "BLOCKED", "lower": 1, "upper": 3 }
                    ]
                  }
                },
                { "name": "comm", "type": { "kind": "string" } },
                {
                  "name": "args",
                  "type": {
                    "kind": "sequence",
                    "element": { "kind": "float" },
                    "length-name": "nargs"
                  }
                }
              ]
            }
          }
        ]
      }
    ],
    "streams": [{ "stream-class-id": 0, "name": "cpu0", "id": 0 }],
    "is-static": true
  }
}"#;

    fn write_schema(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(content.as_bytes()).unwrap();
            f.flush().unwrap();
        }
        (dir, path)
    }

    #[test]
    fn schema_cfg() {
        let (_dir, path) = write_schema(SCHEMA);

        let cfg = CtfIrConfig::load_merge_with_opts(&InspectOpts {
            config_file: Some(path.clone()),
            ..Default::default()
        })
        .unwrap();

        env::set_var(CONFIG_ENV_VAR, &path);
        let env_cfg = CtfIrConfig::load_merge_with_opts(&Default::default()).unwrap();
        env::remove_var(CONFIG_ENV_VAR);
        assert_eq!(cfg, env_cfg);

        assert_eq!(
            cfg.rename_event_attrs,
            vec![AttrKeyRename {
                original: "event.common_context.tid".to_owned(),
                new: "event.thread".to_owned(),
            }]
        );
        assert_eq!(cfg.trace.name.as_deref(), Some("kernel"));
        assert_eq!(
            cfg.trace.uuid,
            Some(Uuid::from_str("a1a2a3a4b1b2c1c2d1d2d3d4d5d6d7d2").unwrap())
        );
        assert_eq!(cfg.trace.native_byte_order, Some(ByteOrder::LittleEndian));
        assert_eq!(
            cfg.trace.environment[1],
            EnvEntryConfig {
                name: "tracer_major".to_owned(),
                value: EnvValueConfig::Integer(2),
            }
        );
        assert_eq!(
            cfg.trace.streams,
            vec![StreamConfig {
                stream_class_id: 0,
                name: Some("cpu0".to_owned()),
                id: Some(0),
            }]
        );
    }

    #[test]
    fn options_override_the_file() {
        let (_dir, path) = write_schema(SCHEMA);
        let cfg = CtfIrConfig::load_merge_with_opts(&InspectOpts {
            config_file: Some(path),
            trace_name: Some("renamed".to_owned()),
            rename_stream_attr: vec![AttrKeyRename {
                original: "stream.name".to_owned(),
                new: "stream.label".to_owned(),
            }],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(cfg.trace.name.as_deref(), Some("renamed"));
        assert_eq!(cfg.rename_stream_attrs.len(), 1);
    }

    #[test]
    fn builds_the_described_trace() {
        let cfg: CtfIrConfig = serde_json::from_str(SCHEMA).unwrap();
        let trace = cfg.trace.build().unwrap();

        assert!(trace.is_static());
        assert_eq!(trace.name().as_deref(), Some("kernel"));
        assert_eq!(trace.environment().get("tracer_major"), Some(&EnvValue::Integer(2)));
        assert_eq!(trace.clock_class_count(), 1);
        assert_eq!(trace.stream_count(), 1);

        let sc = trace.stream_class_by_id(0).unwrap();
        assert_eq!(sc.default_clock_class().unwrap().name(), "monotonic");
        let ec = sc.event_class_by_name("sched_switch").unwrap();
        assert_eq!(ec.id(), Some(0));
        assert_eq!(ec.properties().log_level, Some(LogLevel::Info));

        let payload = ec.payload_type().unwrap();
        let (_, prev_state) = payload.field_at(0).unwrap();
        assert_eq!(prev_state.id(), FieldTypeId::Enumeration);
        assert_eq!(prev_state.mappings_by_value(2_u64).unwrap().count(), 1);
        assert_eq!(
            payload.field_by_name("args").unwrap().id(),
            FieldTypeId::Sequence
        );
    }

    #[test]
    fn unknown_references_are_config_errors() {
        let cfg: TraceConfig = serde_json::from_str(
            r#"{ "stream-classes": [{ "default-clock-class": "nope" }] }"#,
        )
        .unwrap();
        assert!(matches!(cfg.build(), Err(Error::Config(_))));

        let cfg: TraceConfig =
            serde_json::from_str(r#"{ "streams": [{ "stream-class-id": 4 }] }"#).unwrap();
        assert!(matches!(cfg.build(), Err(Error::Config(_))));
    }

    #[test]
    fn renames_apply_in_order() {
        let renames = vec![
            AttrKeyRename {
                original: "event.a".to_owned(),
                new: "event.b".to_owned(),
            },
            AttrKeyRename {
                original: "event.b".to_owned(),
                new: "event.c".to_owned(),
            },
        ];
        let mut kvs = vec![
            (AttrKey::new("event.a".to_owned()), AttrVal::Integer(1)),
            (AttrKey::new("event.z".to_owned()), AttrVal::Integer(2)),
        ];
        rename_attr_keys(&renames, &mut kvs);
        assert_eq!(kvs[0].0.as_str(), "event.c");
        assert_eq!(kvs[1].0.as_str(), "event.z");
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let (_dir, path) = write_schema("{ not json");
        assert!(matches!(
            CtfIrConfig::from_file(&path),
            Err(Error::Json(_))
        ));
    }
}
