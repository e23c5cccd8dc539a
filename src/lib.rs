// Module declarations for the library's components
pub mod config;   // Configuration management
pub mod datalog;  // Datalog reader and day set writer
pub mod device;   // Device identity and the device manager
pub mod error;    // Error handling and types
pub mod extract;  // Yield extraction
pub mod family;   // Inverter protocol families and their register catalogs
pub mod options;  // Command line options parsing
pub mod prelude;  // Common imports and types
pub mod reading;  // Decoded readings and day sets
pub mod register; // Register descriptors and catalogs

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::datalog::{DatalogReader, Persist, ReadingWriter};
use crate::extract::Extractor;
use crate::options::Options;
use crate::prelude::*;
use crate::reading::EnergyReadingSet;
use std::io::Write;

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .try_init();
}

fn write_sets<W: Write>(mut writer: ReadingWriter<W>, sets: &[EnergyReadingSet]) -> Result<u64> {
    for set in sets {
        writer.persist(set)?;
    }
    Ok(writer.sets_written())
}

/// Main application entry point
///
/// Loads the configuration, extracts the requested source from the datalog
/// and writes every resulting day set. Returns the extraction's success flag.
pub fn app(options: Options) -> Result<bool> {
    init_logging();

    info!("pv-yield {} starting with config file: {}", CARGO_PKG_VERSION, options.config_file);

    let config = ConfigWrapper::new(options.config_file.clone())?;

    // Update log level based on configuration
    match config.loglevel().parse::<log::LevelFilter>() {
        Ok(level) => log::set_max_level(level),
        Err(e) => error!("Failed to update log level: {}", e),
    }

    let manager = config.device_manager()?;
    let mut reader = DatalogReader::open(&options.input)?;
    let extraction = Extractor::default().extract_records(&mut reader, &manager, &options.source);

    let written = match &options.output {
        Some(path) => write_sets(ReadingWriter::create(path)?, &extraction.readings)?,
        None => write_sets(
            ReadingWriter::new(std::io::stdout(), "stdout"),
            &extraction.readings,
        )?,
    };

    info!(
        "{}: {} day sets written, {} rows rejected",
        options.source,
        written,
        extraction.rejected.len()
    );

    Ok(extraction.success)
}
