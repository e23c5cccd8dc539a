use crate::device::IdentityCandidate;
use crate::error::ConnectionError;
use crate::extract::{Connection, RawRow};
use crate::family::Family;
use crate::reading::EnergyReadingSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, TimestampSeconds};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

// DatalogReader {{{
/// One line of a datalog file:
///
/// `{"utc_timestamp": 1717228800, "datalog": "roof", "inverter_id": 3,
///   "family": "standard", "raw_data": {"13": "0x04D2", ...}}`
#[serde_as]
#[derive(Debug, Deserialize)]
struct DatalogLine {
    #[serde_as(as = "TimestampSeconds<i64>")]
    utc_timestamp: DateTime<Utc>,
    datalog: String,
    #[serde(flatten)]
    identity: IdentityCandidate,
    #[serde_as(as = "Option<DisplayFromStr>")]
    family: Option<Family>,
    raw_data: HashMap<String, String>,
}

/// Reads raw rows from a JSON-lines datalog. Lines for other sources are
/// skipped; a line that is not valid JSON aborts the read.
pub struct DatalogReader<R> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl DatalogReader<BufReader<File>> {
    pub fn open(path: &str) -> Result<Self, ConnectionError> {
        info!("Opening datalog file at {}", path);
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> DatalogReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    fn parse_register(key: &str, value: &str) -> Option<(u8, u16)> {
        let register = match key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16).ok()?,
            None => key.parse().ok()?,
        };
        let value = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
            Some(hex) => u16::from_str_radix(hex, 16).ok()?,
            None => value.parse().ok()?,
        };
        Some((register, value))
    }

    fn to_row(&self, line: DatalogLine) -> RawRow {
        let mut registers = HashMap::with_capacity(line.raw_data.len());
        for (key, value) in &line.raw_data {
            match Self::parse_register(key, value) {
                Some((register, value)) => {
                    registers.insert(register, value);
                }
                None => debug!("line {}: ignoring register {}={}", self.line, key, value),
            }
        }

        RawRow {
            source: line.datalog,
            time: line.utc_timestamp,
            identity: line.identity,
            family: line.family,
            registers,
        }
    }
}

impl<R: BufRead> Connection for DatalogReader<R> {
    fn next_row(&mut self, source_name: &str) -> Result<Option<RawRow>, ConnectionError> {
        while let Some(text) = self.lines.next() {
            let text = text?;
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }

            let line: DatalogLine =
                serde_json::from_str(&text).map_err(|err| ConnectionError::Decode {
                    line: self.line,
                    reason: err.to_string(),
                })?;
            if line.datalog == source_name {
                return Ok(Some(self.to_row(line)));
            }
        }

        Ok(None)
    }

    fn release(&mut self) {
        debug!("datalog released after {} lines", self.line);
    }
} // }}}

// ReadingWriter {{{
/// Hands finished day sets to storage.
pub trait Persist {
    fn persist(&mut self, set: &EnergyReadingSet) -> Result<()>;
}

#[derive(Serialize)]
struct DayRecord<'a> {
    #[serde(flatten)]
    set: &'a EnergyReadingSet,
    energy_today: Option<f64>,
    peak_power: Option<f64>,
}

/// Writes one JSON line per [`EnergyReadingSet`].
pub struct ReadingWriter<W: Write> {
    out: W,
    path: String,
    sets_written: u64,
}

impl ReadingWriter<File> {
    pub fn create(path: &str) -> Result<Self> {
        info!("Opening output file at {}", path);

        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to open output file {}: {}", path, e);
                return Err(e.into());
            }
        };

        Ok(Self::new(file, path))
    }
}

impl<W: Write> ReadingWriter<W> {
    pub fn new(out: W, path: &str) -> Self {
        Self {
            out,
            path: path.to_string(),
            sets_written: 0,
        }
    }

    pub fn sets_written(&self) -> u64 {
        self.sets_written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Persist for ReadingWriter<W> {
    fn persist(&mut self, set: &EnergyReadingSet) -> Result<()> {
        let record = DayRecord {
            set,
            energy_today: set.energy_today(),
            peak_power: set.peak_power(),
        };
        let json_string = serde_json::to_string(&record)?;

        if let Err(e) = writeln!(self.out, "{}", json_string).and_then(|_| self.out.flush()) {
            error!("Failed to write to {}: {}", self.path, e);
            return Err(e.into());
        }

        self.sets_written += 1;
        debug!("{}: {} day sets written", self.path, self.sets_written);
        Ok(())
    }
} // }}}
