//! Output sinks for `dbctl describe`.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use dbctl_core::ClusterSummary;
use dbctl_describe::SummarySink;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Output {
    Human,
    Json,
    Yaml,
}

/// Writes summaries to `out` in the chosen format and notices to `err`.
pub struct Printer<W: Write, E: Write> {
    format: Output,
    out: W,
    err: E,
    written: usize,
}

impl<W: Write, E: Write> Printer<W, E> {
    pub fn new(format: Output, out: W, err: E) -> Self {
        Self { format, out, err, written: 0 }
    }
}

impl Printer<io::Stdout, io::Stderr> {
    /// Process stdout/stderr, locked per write. The tracing subscriber writes to
    /// stderr from runtime workers, so the printer must not hold that lock.
    pub fn stdio(format: Output) -> Self {
        Self::new(format, io::stdout(), io::stderr())
    }
}

impl<W: Write, E: Write> SummarySink for Printer<W, E> {
    fn summary(&mut self, summary: &ClusterSummary) -> io::Result<()> {
        match self.format {
            Output::Human => {
                if self.written > 0 {
                    writeln!(self.out)?;
                }
                write_human(&mut self.out, summary, Utc::now())?;
            }
            Output::Json => {
                serde_json::to_writer_pretty(&mut self.out, summary)?;
                writeln!(self.out)?;
            }
            Output::Yaml => {
                writeln!(self.out, "---")?;
                serde_yaml::to_writer(&mut self.out, summary).map_err(io::Error::other)?;
            }
        }
        self.written += 1;
        self.out.flush()
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.err, "{}", message)
    }
}

fn write_human<W: Write>(out: &mut W, s: &ClusterSummary, now: DateTime<Utc>) -> io::Result<()> {
    let start = match render_age(&s.start_time, now) {
        Some(age) => format!("{} ({} ago)", s.start_time, age),
        None => s.start_time.clone(),
    };
    let rows: [(&str, String); 12] = [
        ("Name", s.cluster_name.clone()),
        ("Namespace", s.namespace.clone()),
        ("Engine", format!("{} {}", s.engine, s.version)),
        ("Topology", s.topology.to_string()),
        ("Status", format!("{} ({}/{} instances online)", s.status, s.online_instances, s.instances)),
        ("Server ID", s.server_id.to_string()),
        ("Storage", format!("{}Gi", s.storage_gib)),
        ("Root User", s.root_user.clone()),
        ("Port", s.port.to_string()),
        ("Secret", s.secret_name.clone()),
        ("Start Time", start),
        ("Labels", s.labels.trim_end().to_string()),
    ];
    for (label, value) in rows {
        writeln!(out, "{:<12}{}", format!("{}:", label), value)?;
    }
    Ok(())
}

/// Compact age like `3d4h`; None when `ts` is not RFC 3339.
fn render_age(ts: &str, now: DateTime<Utc>) -> Option<String> {
    let created = DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc);
    let mut secs = (now - created).num_seconds().max(0) as u64;
    let days = secs / 86_400; secs %= 86_400;
    let hours = secs / 3600; secs %= 3600;
    let mins = secs / 60; secs %= 60;
    Some(if days > 0 { format!("{}d{}h", days, hours) }
    else if hours > 0 { format!("{}h{}m", hours, mins) }
    else if mins > 0 { format!("{}m", mins) }
    else { format!("{}s", secs) })
}
