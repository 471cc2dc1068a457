use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};
use tracing::{error, info, trace, warn};

use crate::error::Result;
use crate::measurement::{self, MeasurementRecord};
use crate::protocol::{self, Command, Exchange, RawFrame, TransactionConfig, WriteStatus};

pub mod cmds {
    use crate::protocol::Command;

    pub const VERSION: Command = Command::new(b"VERSION?\r");
    pub const VALUES: Command = Command::new(b"VAL?\r");
}

/// Serial line settings of the instrument.
#[derive(Debug, Clone)]
pub struct PortConfig {
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub timeout: Duration, // per read
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(250),
        }
    }
}

/// Host operating system, which decides how serial ports are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    Windows,
}

impl HostOs {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(HostOs::Linux),
            1 => Some(HostOs::Windows),
            _ => None,
        }
    }

    /// Port name for an interface index: `/dev/ttyUSB<n>` or `COM<n>`.
    pub fn port_name(self, interface: u32) -> String {
        match self {
            HostOs::Linux => format!("/dev/ttyUSB{}", interface),
            HostOs::Windows => format!("COM{}", interface),
        }
    }
}

pub struct HM8115<P = Box<dyn SerialPort>> {
    port: P,
    port_name: String,
    transaction: TransactionConfig,
}

impl HM8115 {
    pub fn connect(port_name: &str, config: &PortConfig) -> Result<Self> {
        info!("Connecting to serial port: {}", port_name);
        let port = serialport::new(port_name, config.baud_rate)
            .parity(config.parity)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .timeout(config.timeout)
            .open()
            .map_err(|e| {
                error!("Could not open connection to port, check interface and OS: {}", e);
                e
            })?;
        info!("HM8115 port {} opened at {} baud", port_name, config.baud_rate);
        Ok(Self::with_port(port, port_name, TransactionConfig::default()))
    }
}

impl<P: Read + Write> HM8115<P> {
    pub fn with_port(port: P, port_name: &str, transaction: TransactionConfig) -> Self {
        HM8115 {
            port,
            port_name: port_name.to_string(),
            transaction,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Run one transaction and return the raw frame, if anything arrived.
    pub fn query(&mut self, command: Command) -> Option<RawFrame> {
        let exchange: Exchange = protocol::exchange(&mut self.port, command, &self.transaction);
        match &exchange.write {
            WriteStatus::Sent(n) => trace!("Sent {} bytes to {}", n, self.port_name),
            WriteStatus::Failed(e) => {
                warn!("Reading from {} despite failed write: {}", self.port_name, e)
            }
        }
        info!(
            "Transaction on {} ended {:?} after {} read passes",
            self.port_name, exchange.state, exchange.passes
        );
        exchange.into_frame()
    }

    /// Read voltage, current and power. `None` means no data was received.
    pub fn read_values(&mut self) -> Result<Option<MeasurementRecord>> {
        let Some(frame) = self.query(cmds::VALUES) else {
            return Ok(None);
        };
        let text = frame.decode()?;
        info!("Received values from HM8115: {}", text);
        measurement::parse_measurement(&text).map(Some)
    }

    /// Read the firmware version string.
    pub fn read_version(&mut self) -> Result<Option<String>> {
        let Some(frame) = self.query(cmds::VERSION) else {
            return Ok(None);
        };
        let version = frame.decode()?.trim().to_string();
        info!("HM8115 firmware version: {}", version);
        Ok(Some(version))
    }
}
