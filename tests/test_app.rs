mod common;
use common::*;

use pv_yield::options::Options;
use pv_yield::prelude::*;
use std::io::Write;

fn datalog_line(timestamp: i64, energy_today: u16) -> String {
    let mut raw = serde_json::Map::new();
    for (register, value) in Factory::registers() {
        raw.insert(
            register.to_string(),
            serde_json::Value::String(format!("0x{:04X}", value)),
        );
    }
    raw.insert(
        "13".to_string(),
        serde_json::Value::String(format!("0x{:04X}", energy_today)),
    );

    serde_json::json!({
        "utc_timestamp": timestamp,
        "datalog": SOURCE,
        "make": "Acme",
        "model": "SR3000",
        "serial": "0000000001",
        "family": "standard",
        "raw_data": raw,
    })
    .to_string()
}

#[test]
fn extracts_datalog_to_output() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "family: standard\nloglevel: warn\n")?;

    let input_path = dir.path().join("datalog.jsonl");
    let mut input = std::fs::File::create(&input_path)?;
    // 2024-06-01T00:00:00Z, then ten minutes later
    writeln!(input, "{}", datalog_line(1717200000, 100))?;
    writeln!(input, "{}", datalog_line(1717200600, 1234))?;
    drop(input);

    let output_path = dir.path().join("out").join("days.jsonl");
    let options = Options {
        config_file: config_path.to_string_lossy().into_owned(),
        input: input_path.to_string_lossy().into_owned(),
        source: SOURCE.to_string(),
        output: Some(output_path.to_string_lossy().into_owned()),
    };

    assert!(pv_yield::app(options)?);

    let contents = std::fs::read_to_string(&output_path)?;
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);

    let json: serde_json::Value = serde_json::from_str(lines[0])?;
    assert_eq!(json["day"], "2024-06-01");
    assert_eq!(json["rows"], 2);
    assert_eq!(json["expected_rows"], 144);
    assert_eq!(json["mismatch"]["kind"], "short");
    assert_eq!(json["energy_today"], 12.34);
    // both words of each counter are 1
    let total = json["energy_total"].as_f64().unwrap_or_default();
    assert!((total - 6553.7).abs() < 1e-9, "{}", total);
    assert_eq!(json["hours"], 65537.0);
    assert_eq!(json["readings"]["device"]["serial"], "0000000001");
    Ok(())
}

#[test]
fn missing_config_is_an_error() {
    let options = Options {
        config_file: "/nonexistent/config.yaml".to_string(),
        input: "/nonexistent/datalog.jsonl".to_string(),
        source: SOURCE.to_string(),
        output: None,
    };
    assert!(pv_yield::app(options).is_err());
}
