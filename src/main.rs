use anyhow::Result;
use log::error;

use pv_yield::options::Options;

fn main() -> Result<()> {
    let options = Options::new();

    match pv_yield::app(options) {
        Ok(true) => Ok(()),
        Ok(false) => {
            error!("extraction did not complete");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Application error: {:#}", e);
            std::process::exit(255);
        }
    }
}
