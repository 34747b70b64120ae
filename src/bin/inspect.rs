#![deny(warnings, clippy::all)]

use clap::Parser;
use ctf_ir::config::rename_attr_keys;
use ctf_ir::{prelude::*, tracing::try_init_tracing_subscriber};
use thiserror::Error;
use tracing::warn;

/// Build a trace from a schema file and print its attributes
#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct Opts {
    #[clap(flatten)]
    pub inspect_opts: InspectOpts,

    /// Also print the attributes of each event class, as carried by a freshly created event
    #[clap(long, help_heading = "OUTPUT")]
    pub event_classes: bool,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    CtfIr(#[from] ctf_ir::error::Error),

    #[error("A schema file is required, either with --config or the CTF_IR_CONFIG environment variable.")]
    MissingSchema,
}

fn main() {
    match do_main() {
        Ok(()) => (),
        Err(e) => {
            eprintln!("{e}");
            let mut cause = e.source();
            while let Some(err) = cause {
                eprintln!("Caused by: {err}");
                cause = err.source();
            }
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

fn do_main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    try_init_tracing_subscriber()?;

    if opts.inspect_opts.config_file.is_none()
        && std::env::var_os(ctf_ir::config::CONFIG_ENV_VAR).is_none()
    {
        return Err(Error::MissingSchema.into());
    }

    let cfg = CtfIrConfig::load_merge_with_opts(&opts.inspect_opts).map_err(Error::from)?;
    let trace = cfg.trace.build().map_err(Error::from)?;

    let desc = TraceDescription::new(&trace);
    print_attrs("trace", desc.trace.attr_kvs());

    if desc.streams.is_empty() {
        warn!("The schema doesn't declare any streams");
    }
    for (idx, mut attr_kvs) in desc.streams_with_trace_attrs().enumerate() {
        rename_attr_keys(&cfg.rename_stream_attrs, &mut attr_kvs);
        print_attrs(&format!("stream {idx}"), attr_kvs);
    }

    if opts.event_classes {
        for sc in trace.iter() {
            for ec in sc.event_classes() {
                let event = Event::new(&ec).map_err(Error::from)?;
                let mut attr_kvs = EventAttrs::new(&event).map_err(Error::from)?.attr_kvs();
                rename_attr_keys(&cfg.rename_event_attrs, &mut attr_kvs);
                print_attrs(&format!("event class {}", ec.name()), attr_kvs);
                if let Some(payload) = ec.payload_type() {
                    println!("  payload fields: {}", payload.field_names().join(", "));
                }
            }
        }
    }

    Ok(())
}

fn print_attrs(title: &str, attr_kvs: Vec<(AttrKey, AttrVal)>) {
    println!("{title}");
    for (k, v) in attr_kvs {
        println!("  {k} = {v}");
    }
}
