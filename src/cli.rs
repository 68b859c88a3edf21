//! Port listing for `--list-ports`

use anyhow::Result;
use colored::*;
use std::fmt::Write;

use crate::ports::{resolve_port, PortPrefixes, PortRole};
use crate::transport::MidiBackend;

/// Render every input and output port, marking the ones the prefixes select
pub fn port_listing(backend: &dyn MidiBackend, prefixes: Option<&PortPrefixes>) -> Result<String> {
    let inputs = backend.input_names()?;
    let outputs = backend.output_names()?;
    let mut out = String::new();

    writeln!(out, "\n{}", "=== Available MIDI Ports ===".bold().cyan())?;
    write_section(&mut out, "Input Ports:", &inputs)?;
    write_section(&mut out, "Output Ports:", &outputs)?;

    if let Some(prefixes) = prefixes {
        writeln!(out, "\n{}", "Configured mapping:".bold().bright_green())?;
        for role in PortRole::ALL {
            let names = if role.is_input() { &inputs } else { &outputs };
            match resolve_port(role, prefixes.for_role(role), names) {
                Ok(name) => writeln!(out, "  {:<13} {}", role.as_str(), name.bright_white())?,
                Err(e) => writeln!(out, "  {:<13} {}", role.as_str(), e.to_string().red())?,
            }
        }
    }

    Ok(out)
}

fn write_section(out: &mut String, title: &str, names: &[String]) -> std::fmt::Result {
    writeln!(out, "\n{}", title.bold())?;
    if names.is_empty() {
        writeln!(out, "  {}", "No ports found".dimmed())?;
    }
    for name in names {
        writeln!(out, "  {}", name)?;
    }
    Ok(())
}
