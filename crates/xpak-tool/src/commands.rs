//! Subcommand handlers.
//!
//! Every handler writes its report to the supplied writer so the binary can
//! pass stdout and tests can pass a buffer.

use crate::config::{Command, ToolConfig};
use anyhow::{Context, Result, bail};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;
use xpak_formats::directory::write_segment_file;
use xpak_formats::scan::{attach_segment_file, recover_segment, split_segment_file};
use xpak_formats::{Container, ContainerState, ReplaceMode};

/// Run the configured subcommand.
///
/// # Errors
///
/// Returns an error when the host or segment file cannot be read or
/// rewritten, or when a read operation targets a file without a segment.
pub fn run<W: Write>(config: &ToolConfig, out: &mut W) -> Result<()> {
    let mode = config.replace_mode();
    match &config.command {
        Command::Info { host } => info_cmd(host, out),
        Command::List { host } => list_cmd(host, out),
        Command::Get { host, name } => get_cmd(host, name, out),
        Command::Unpack { host, dest, clean } => {
            Container::new(host)
                .decompose(dest, *clean)
                .with_context(|| format!("failed to unpack {}", host.display()))?;
            Ok(())
        }
        Command::Pack { root, output } => {
            write_segment_file(root, output)
                .with_context(|| format!("failed to pack {}", root.display()))?;
            Ok(())
        }
        Command::Attach { host, root } => {
            open(host, mode).replace(root).with_context(|| {
                format!("failed to attach {} to {}", root.display(), host.display())
            })?;
            Ok(())
        }
        Command::AttachSegment { host, segment } => {
            attach_segment_file(host, segment, mode).with_context(|| {
                format!("failed to attach {} to {}", segment.display(), host.display())
            })?;
            Ok(())
        }
        Command::Strip { host } => {
            open(host, mode)
                .strip()
                .with_context(|| format!("failed to strip {}", host.display()))?;
            Ok(())
        }
        Command::Split { segment } => {
            if !split_segment_file(segment)
                .with_context(|| format!("failed to read {}", segment.display()))?
            {
                bail!("{} is not a metadata segment", segment.display());
            }
            Ok(())
        }
        Command::Recover { host, output } => recover_cmd(host, output),
    }
}

fn open(host: &Path, mode: ReplaceMode) -> Container {
    Container::new(host).with_replace_mode(mode)
}

fn info_cmd<W: Write>(host: &Path, out: &mut W) -> Result<()> {
    let mut container = Container::new(host);
    match container.locate() {
        ContainerState::Unlocated => {
            writeln!(out, "{}: no metadata segment", host.display())?;
        }
        ContainerState::Located(location) => {
            let entries = container.list_names()?.len();
            writeln!(out, "{}:", host.display())?;
            writeln!(out, "  payload bytes:  {}", location.payload_length())?;
            writeln!(out, "  segment offset: {}", location.segment_offset)?;
            writeln!(out, "  segment length: {}", location.segment_length)?;
            writeln!(out, "  index length:   {}", location.index_length)?;
            writeln!(out, "  data length:    {}", location.data_length)?;
            writeln!(out, "  entries:        {entries}")?;
        }
    }
    Ok(())
}

fn list_cmd<W: Write>(host: &Path, out: &mut W) -> Result<()> {
    let names = Container::new(host)
        .list_names()
        .with_context(|| format!("failed to list {}", host.display()))?;
    for name in names {
        writeln!(out, "{}", String::from_utf8_lossy(&name))?;
    }
    Ok(())
}

fn get_cmd<W: Write>(host: &Path, name: &str, out: &mut W) -> Result<()> {
    let content = Container::new(host)
        .extract(name.as_bytes())
        .with_context(|| format!("failed to read {name} from {}", host.display()))?;
    out.write_all(&content)?;
    Ok(())
}

fn recover_cmd(host: &Path, output: &Path) -> Result<()> {
    let Some(segment) = recover_segment(host)
        .with_context(|| format!("failed to scan {}", host.display()))?
    else {
        bail!("no metadata segment found in {}", host.display());
    };
    fs::write(output, &segment).with_context(|| format!("failed to write {}", output.display()))?;
    info!("recovered {} bytes into {}", segment.len(), output.display());
    Ok(())
}
