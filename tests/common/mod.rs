#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use pv_yield::extract::{MemoryConnection, RawRow};
use pv_yield::family::{Family, InverterFamily, Standard};
use pv_yield::prelude::*;
use std::collections::HashMap;

pub const SOURCE: &str = "roof";

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory();
impl Factory {
    pub fn family() -> Family {
        Family::Standard(Standard)
    }

    pub fn manager() -> DeviceManager {
        DeviceManager::new(Self::family())
    }

    pub fn day_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    /// Every register the standard catalog needs, flags set, values 1.
    pub fn registers() -> HashMap<u8, u16> {
        Self::family()
            .catalog()
            .required_addresses()
            .into_iter()
            .map(|a| (a, 1))
            .collect()
    }

    pub fn row(identity: IdentityCandidate, time: DateTime<Utc>) -> RawRow {
        RawRow {
            source: SOURCE.to_string(),
            time,
            identity,
            family: None,
            registers: Self::registers(),
        }
    }

    /// `count` rows ten minutes apart from midnight.
    pub fn day_rows(identity: IdentityCandidate, count: usize) -> Vec<RawRow> {
        (0..count)
            .map(|i| {
                let time = Self::day_start() + Duration::minutes(10 * i as i64);
                let mut row = Self::row(identity.clone(), time);
                row.registers.insert(0x0D, i as u16);
                row
            })
            .collect()
    }

    pub fn connection(rows: Vec<RawRow>) -> MemoryConnection {
        MemoryConnection::new(rows.into_iter().map(Ok))
    }
}
