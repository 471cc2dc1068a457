mod devices;
mod error;
mod logging;
mod measurement;
mod protocol;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use tracing::{error, info};

use devices::{HostOs, PortConfig, HM8115};
use logging::LogLevel;
use measurement::VersionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Query {
    /// Voltage, current and power
    Values,
    /// Firmware version
    Version,
}

/// Poll a HM8115 power meter over its serial link and print the reading as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// COM or TTY number of the interface
    #[arg(long, default_value_t = 0)]
    interface: u32,

    /// Operating system, 0=Linux, 1=Windows
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    os: u8,

    /// Log level, 0=Off, 1=Error, 2=Info, 3=Warning, 4=Trace
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=4))]
    log: u8,

    /// Serial port name, overrides --interface and --os
    #[arg(long)]
    port: Option<String>,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// What to ask the instrument for
    #[arg(long, value_enum, default_value_t = Query::Values)]
    query: Query,
}

impl Args {
    fn port_name(&self) -> String {
        match &self.port {
            Some(name) => name.clone(),
            None => HostOs::from_index(self.os)
                .unwrap_or(HostOs::Linux)
                .port_name(self.interface),
        }
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let level = LogLevel::from_index(args.log).unwrap_or(LogLevel::Off);

    let (subscriber, _guard) = logging::subscriber(level, args.log_dir.as_deref());
    tracing::subscriber::with_default(subscriber, || run(&args))
}

fn run(args: &Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let start = Instant::now();

    let port_name = args.port_name();
    let mut hm = HM8115::connect(&port_name, &PortConfig::default())?;

    let output = match args.query {
        Query::Values => hm
            .read_values()
            .inspect_err(|e| error!("Transaction failed: {}", e))?
            .map(|record| serde_json::to_string(&record)),
        Query::Version => hm
            .read_version()
            .inspect_err(|e| error!("Transaction failed: {}", e))?
            .map(|version| serde_json::to_string(&VersionRecord { version })),
    };

    let status = match output {
        Some(json) => {
            let json = json.inspect_err(|e| error!("Failed to serialize reading: {}", e))?;
            println!("{}", json);
            ExitCode::SUCCESS
        }
        None => {
            error!("No data received from {}", hm.port_name());
            println!("No data received");
            ExitCode::FAILURE
        }
    };

    info!("Time elapsed: {:?}", start.elapsed());
    Ok(status)
}
