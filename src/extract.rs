use crate::device::{DeviceIdentity, DeviceManager, IdentityCandidate};
use crate::error::{ConnectionError, Error};
use crate::family::{Family, InverterFamily};
use crate::reading::{DayCountMismatch, EnergyReadingSet, PVReading, PVReadingSet};
use crate::register::{DataIds, Quantity};

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One sample of raw register values, as handed over by the framing layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub source: String,
    pub time: DateTime<Utc>,
    pub identity: IdentityCandidate,
    /// Family that produced the buffer, when the source knows it.
    pub family: Option<Family>,
    pub registers: HashMap<u8, u16>,
}

// Connection {{{
/// Source of raw rows. Acquired by the caller; extraction calls
/// [`Connection::release`] on every exit path.
pub trait Connection {
    /// Next row for `source_name`, or `None` once the source is exhausted.
    fn next_row(&mut self, source_name: &str) -> Result<Option<RawRow>, ConnectionError>;

    fn release(&mut self) {}
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn next_row(&mut self, source_name: &str) -> Result<Option<RawRow>, ConnectionError> {
        (**self).next_row(source_name)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

struct Scoped<'a, C: Connection + ?Sized>(&'a mut C);

impl<C: Connection + ?Sized> Drop for Scoped<'_, C> {
    fn drop(&mut self) {
        self.0.release();
    }
} // }}}

// diagnostics {{{
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionEvent {
    RowRejected {
        source: String,
        time: DateTime<Utc>,
        reason: String,
    },
    DeviceDiscovered {
        source: String,
        device: String,
    },
    DayOpened {
        device: String,
        day: NaiveDate,
    },
    DayAnnotated {
        device: String,
        day: NaiveDate,
        mismatch: DayCountMismatch,
    },
    ConnectionFailed {
        source: String,
        rows: usize,
        reason: String,
    },
    Finished {
        source: String,
        rows: usize,
        rejected: usize,
        days: usize,
        success: bool,
    },
}

/// Receives what an extraction call has to report. The core never logs on
/// its own.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: &ExtractionEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, event: &ExtractionEvent) {
        use ExtractionEvent::*;
        match event {
            RowRejected {
                source,
                time,
                reason,
            } => warn!("{}: skipping row at {}: {}", source, time, reason),
            DeviceDiscovered { source, device } => info!("{}: discovered {}", source, device),
            DayOpened { device, day } => debug!("new day {} for {}", day, device),
            DayAnnotated {
                device,
                day,
                mismatch,
            } => info!("{} on {}: {:?}", device, day, mismatch),
            ConnectionFailed {
                source,
                rows,
                reason,
            } => error!("{}: connection failed after {} rows: {}", source, rows, reason),
            Finished {
                source,
                rows,
                rejected,
                days,
                success,
            } => info!(
                "{}: extracted {} rows ({} rejected) into {} days, success={}",
                source, rows, rejected, days, success
            ),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _event: &ExtractionEvent) {}
}

/// Keeps every event, for callers that inspect them afterwards.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ExtractionEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<ExtractionEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, event: &ExtractionEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event.clone());
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn emit(&self, event: &ExtractionEvent) {
        (**self).emit(event)
    }
} // }}}

#[derive(Debug)]
pub struct RowRejection {
    pub time: DateTime<Utc>,
    pub error: Error,
}

/// Result of one extraction call. Check both `success` and `readings`:
/// a failed call still returns whatever was decoded before the failure.
#[derive(Debug)]
pub struct Extraction {
    pub success: bool,
    pub readings: Vec<EnergyReadingSet>,
    pub rejected: Vec<RowRejection>,
}

pub trait ExtractYieldRecords {
    fn extract_records<C: Connection + ?Sized>(
        &self,
        connection: &mut C,
        manager: &DeviceManager,
        source_name: &str,
    ) -> Extraction;
}

/// Upper bound for the per-day capacity hint. Days larger than this just
/// grow the set.
const MAX_CAPACITY_HINT: usize = 4096;

// Extractor {{{
pub struct Extractor {
    sink: Box<dyn DiagnosticSink>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(LogSink)
    }
}

impl Extractor {
    pub fn new(sink: impl DiagnosticSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    fn decode_row(
        catalog: &DataIds,
        family: Family,
        row: &RawRow,
        source_name: &str,
    ) -> Result<DecodedRow, Error> {
        let malformed = |reason: String| Error::MalformedRow {
            source_name: row.source.clone(),
            timestamp: row.time.to_rfc3339(),
            reason,
        };

        if row.source != source_name {
            return Err(malformed(format!("row belongs to source {}", row.source)));
        }
        if let Some(tagged) = row.family {
            if tagged != family {
                return Err(malformed(format!(
                    "{} buffer cannot be decoded with the {} catalog",
                    tagged,
                    family.name()
                )));
            }
        }

        let missing: Vec<String> = catalog
            .required_addresses()
            .into_iter()
            .filter(|a| !row.registers.contains_key(a))
            .map(|a| format!("{:#04x}", a))
            .collect();
        if !missing.is_empty() {
            return Err(malformed(format!("missing registers {}", missing.join(", "))));
        }

        let mut readings = Vec::new();
        for (quantity, info) in catalog.iter().filter(|(q, _)| q.is_energy_relevant()) {
            if let Some(decoded) = catalog.decode_from(quantity, &row.registers)? {
                readings.push(PVReading::new(quantity, info.unit, decoded, row.time));
            }
        }

        Ok(DecodedRow {
            readings,
            energy_total: Self::total(
                catalog,
                Quantity::EnergyTotalHigh,
                Quantity::EnergyTotalLow,
                &row.registers,
            )?,
            hours: Self::total(catalog, Quantity::HoursHigh, Quantity::HoursLow, &row.registers)?,
        })
    }

    /// Trusted value of a high/low word pair, if the catalog has both words.
    fn total(
        catalog: &DataIds,
        high: Quantity,
        low: Quantity,
        registers: &HashMap<u8, u16>,
    ) -> Result<Option<f64>, Error> {
        if !(catalog.supports(high) && catalog.supports(low)) {
            return Ok(None);
        }
        let combined = catalog.combined(high, low, registers)?;
        Ok(combined.filter(|d| d.valid).map(|d| d.value))
    }

    fn reject(&self, rejected: &mut Vec<RowRejection>, row: &RawRow, error: Error) {
        self.sink.emit(&ExtractionEvent::RowRejected {
            source: row.source.clone(),
            time: row.time,
            reason: error.to_string(),
        });
        rejected.push(RowRejection {
            time: row.time,
            error,
        });
    }
}

#[derive(Debug)]
struct DecodedRow {
    readings: Vec<PVReading>,
    energy_total: Option<f64>,
    hours: Option<f64>,
}

struct Day {
    rows: usize,
    readings: PVReadingSet,
    energy_total: Option<f64>,
    hours: Option<f64>,
}

impl ExtractYieldRecords for Extractor {
    fn extract_records<C: Connection + ?Sized>(
        &self,
        connection: &mut C,
        manager: &DeviceManager,
        source_name: &str,
    ) -> Extraction {
        let mut connection = Scoped(connection);
        let catalog = manager.catalog();
        let expected = manager.normal_day_size();
        let per_row = catalog.iter().filter(|(q, _)| q.is_energy_relevant()).count();
        let capacity = expected.saturating_mul(per_row).min(MAX_CAPACITY_HINT);

        let mut days: Vec<(NaiveDate, Day)> = Vec::new();
        let mut index: HashMap<(DeviceIdentity, NaiveDate), usize> = HashMap::new();
        let mut rejected = Vec::new();
        let mut rows = 0;
        let mut success = true;

        loop {
            let row = match connection.0.next_row(source_name) {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(err) => {
                    self.sink.emit(&ExtractionEvent::ConnectionFailed {
                        source: source_name.to_string(),
                        rows,
                        reason: err.to_string(),
                    });
                    success = false;
                    break;
                }
            };
            rows += 1;

            let decoded = match Self::decode_row(&catalog, manager.family(), &row, source_name) {
                Ok(decoded) => decoded,
                Err(err) => {
                    self.reject(&mut rejected, &row, err);
                    continue;
                }
            };
            let device = match manager.resolve_tracked(row.identity.clone()) {
                Ok((device, discovered)) => {
                    if discovered {
                        self.sink.emit(&ExtractionEvent::DeviceDiscovered {
                            source: source_name.to_string(),
                            device: device.to_string(),
                        });
                    }
                    device
                }
                Err(err) => {
                    self.reject(&mut rejected, &row, err);
                    continue;
                }
            };

            let date = row.time.date_naive();
            let slot = *index.entry(((*device).clone(), date)).or_insert_with(|| {
                self.sink.emit(&ExtractionEvent::DayOpened {
                    device: device.to_string(),
                    day: date,
                });
                days.push((
                    date,
                    Day {
                        rows: 0,
                        readings: PVReadingSet::with_capacity(device.clone(), capacity),
                        energy_total: None,
                        hours: None,
                    },
                ));
                days.len() - 1
            });

            let day = &mut days[slot].1;
            day.rows += 1;
            for reading in decoded.readings {
                day.readings.append(reading);
            }
            day.energy_total = decoded.energy_total.or(day.energy_total);
            day.hours = decoded.hours.or(day.hours);
        }

        let decoded_any = !days.is_empty();
        let malformed = rejected
            .iter()
            .any(|r| matches!(r.error, Error::MalformedRow { .. }));
        if !decoded_any && malformed {
            success = false;
        }

        let readings: Vec<EnergyReadingSet> = days
            .into_iter()
            .map(|(date, day)| {
                EnergyReadingSet::new(date, day.rows, expected, day.readings)
                    .with_totals(day.energy_total, day.hours)
            })
            .collect();

        for set in &readings {
            if let Some(mismatch) = set.mismatch {
                self.sink.emit(&ExtractionEvent::DayAnnotated {
                    device: set.device().to_string(),
                    day: set.day,
                    mismatch,
                });
            }
        }

        self.sink.emit(&ExtractionEvent::Finished {
            source: source_name.to_string(),
            rows,
            rejected: rejected.len(),
            days: readings.len(),
            success,
        });

        Extraction {
            success,
            readings,
            rejected,
        }
    }
} // }}}

/// Rows served from memory; an `Err` entry is raised as a connection error
/// when reached.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    rows: std::collections::VecDeque<Result<RawRow, String>>,
    released: bool,
}

impl MemoryConnection {
    pub fn new(rows: impl IntoIterator<Item = Result<RawRow, String>>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            released: false,
        }
    }

    pub fn released(&self) -> bool {
        self.released
    }
}

impl Connection for MemoryConnection {
    fn next_row(&mut self, source_name: &str) -> Result<Option<RawRow>, ConnectionError> {
        loop {
            match self.rows.pop_front() {
                None => return Ok(None),
                Some(Err(reason)) => return Err(ConnectionError::Other(reason)),
                Some(Ok(row)) if row.source == source_name => return Ok(Some(row)),
                Some(Ok(_)) => continue,
            }
        }
    }

    fn release(&mut self) {
        self.released = true;
    }
}
