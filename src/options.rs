use clap::Parser;

/// pv-yield - decode inverter datalogs into per-day yield readings
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Datalog file (JSON lines) to extract from
    #[clap(short = 'i', long = "input")]
    pub input: String,

    /// Source name whose rows are extracted
    #[clap(short = 's', long = "source")]
    pub source: String,

    /// Output file for day sets, stdout when omitted
    #[clap(short = 'o', long = "output")]
    pub output: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
