use crate::config::AttrKeyRename;
use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

/// Command line options shared by the tools that load a trace schema.
#[derive(Parser, Debug, Clone, Default)]
pub struct InspectOpts {
    /// Use configuration from file. Falls back to the `CTF_IR_CONFIG`
    /// environment variable.
    #[clap(long = "config", name = "config-file", help_heading = "SCHEMA CONFIGURATION")]
    pub config_file: Option<PathBuf>,

    /// Set the name of the trace, overriding the schema's trace name if present
    #[clap(long, name = "trace-name", help_heading = "SCHEMA CONFIGURATION")]
    pub trace_name: Option<String>,

    /// Set the UUID of the trace, overriding the schema's trace UUID if present
    #[clap(long, name = "trace-uuid", help_heading = "SCHEMA CONFIGURATION")]
    pub trace_uuid: Option<Uuid>,

    /// Make the trace static once it's built
    #[clap(long = "static", help_heading = "SCHEMA CONFIGURATION")]
    pub is_static: bool,

    /// Rename a stream attribute key when printing. Specify as 'original_key,new_key'
    #[clap(long, name = "original.stream.attr,new.stream.attr", help_heading = "OUTPUT", value_parser = parse_attr_key_rename)]
    pub rename_stream_attr: Vec<AttrKeyRename>,

    /// Rename an event attribute key when printing. Specify as 'original_key,new_key'
    #[clap(long, name = "original.event.attr,new.event.attr", help_heading = "OUTPUT", value_parser = parse_attr_key_rename)]
    pub rename_event_attr: Vec<AttrKeyRename>,
}

fn parse_attr_key_rename(
    s: &str,
) -> Result<AttrKeyRename, Box<dyn std::error::Error + Send + Sync + 'static>> {
    let pos = s
        .find(',')
        .ok_or_else(|| format!("invalid original,new: no `,` found in `{s}`"))?;
    let (original, new) = (s[..pos].trim(), s[pos + 1..].trim());
    if original.is_empty() || new.is_empty() {
        return Err(format!("invalid original,new: empty key in `{s}`").into());
    }
    Ok(AttrKeyRename {
        original: original.to_owned(),
        new: new.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renames_parse_from_the_command_line() {
        let opts = InspectOpts::try_parse_from([
            "inspect",
            "--trace-name",
            "kernel",
            "--static",
            "--rename-event-attr",
            "event.common_context.tid,event.thread",
        ])
        .unwrap();
        assert_eq!(opts.trace_name.as_deref(), Some("kernel"));
        assert!(opts.is_static);
        assert_eq!(
            opts.rename_event_attr,
            vec![AttrKeyRename {
                original: "event.common_context.tid".to_owned(),
                new: "event.thread".to_owned(),
            }]
        );
    }

    #[test]
    fn rename_needs_both_keys() {
        assert!(parse_attr_key_rename("event.a").is_err());
        assert!(parse_attr_key_rename("event.a,").is_err());
    }
}
