//! Output writer
//!
//! The writer is the only code that touches the output sink. It drains the
//! match queue until every producer has hung up, framing records for the
//! selected format. After a write failure it stops writing but keeps
//! draining, so producers blocked on a full queue are always released.
//!
//! Every record is flushed through to the sink before it counts as written,
//! so a dead sink is noticed on the first record.
//!
//! In `Text` mode the line order follows arrival order, which depends on
//! scheduling and varies between runs unless concurrency is 1.

use std::io::{self, BufWriter, Write};
use std::str::FromStr;

use crossbeam::channel::Receiver;
use log::{debug, warn};

use super::cancel::CancelToken;
use super::entry::Entry;
use crate::errors::FindError;

/// Output encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One path per line
    #[default]
    Text,
    /// A single JSON array of records
    Json,
    /// One JSON record per line
    Ndjson,
}

impl FromStr for OutputFormat {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" | "text" | "plain" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "ndjson" | "jsonl" => Ok(OutputFormat::Ndjson),
            _ => Err(FindError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// What the writer saw once the queue closed
#[derive(Debug, Default)]
pub struct WriterReport {
    /// Records received from producers
    pub received: usize,
    /// Records fully handed to the sink before any failure
    pub written: usize,
    /// First sink error, if any
    pub error: Option<io::Error>,
}

/// Serializes entries to a sink in one of the [`OutputFormat`]s.
pub struct OutputWriter<W: Write> {
    out: BufWriter<W>,
    format: OutputFormat,
    pretty: bool,
    first: bool,
    report: WriterReport,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(out: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            out: BufWriter::new(out),
            format,
            pretty,
            first: true,
            report: WriterReport::default(),
        }
    }

    /// Drain `rx` until all senders are dropped and return the report.
    ///
    /// On the first sink error `halt` is cancelled so producers can stop early.
    pub fn drain(mut self, rx: Receiver<Entry>, halt: &CancelToken) -> WriterReport {
        let opened = self.open();
        self.record(opened, halt);

        for entry in rx.iter() {
            self.report.received += 1;
            if self.report.error.is_some() {
                continue;
            }
            let written = self.write_entry(&entry).and_then(|()| self.out.flush());
            if written.is_ok() {
                self.report.written += 1;
            }
            self.record(written, halt);
        }

        if self.report.error.is_none() {
            let closed = self.close();
            self.record(closed, halt);
        }
        debug!(
            "Writer finished: {} received, {} written",
            self.report.received, self.report.written
        );
        self.report
    }

    fn record(&mut self, result: io::Result<()>, halt: &CancelToken) {
        if let Err(err) = result {
            if self.report.error.is_none() {
                warn!("Output write failed: {}", err);
                self.report.error = Some(err);
                halt.cancel();
            }
        }
    }

    fn open(&mut self) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                self.out.write_all(b"[")?;
                self.out.flush()
            }
            _ => Ok(()),
        }
    }

    fn write_entry(&mut self, entry: &Entry) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", entry.path.display()),
            OutputFormat::Ndjson => {
                serde_json::to_writer(&mut self.out, entry)?;
                self.out.write_all(b"\n")
            }
            OutputFormat::Json => {
                let separator: &[u8] = match (self.first, self.pretty) {
                    (true, true) => b"\n",
                    (true, false) => b"",
                    (false, true) => b",\n",
                    (false, false) => b",",
                };
                self.first = false;
                self.out.write_all(separator)?;
                if self.pretty {
                    let record = serde_json::to_string_pretty(entry)?;
                    write!(self.out, "  {}", record.replace('\n', "\n  "))
                } else {
                    serde_json::to_writer(&mut self.out, entry).map_err(io::Error::from)
                }
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            if self.pretty && !self.first {
                self.out.write_all(b"\n")?;
            }
            self.out.write_all(b"]\n")?;
        }
        self.out.flush()
    }
}
