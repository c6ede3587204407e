use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{
    DataBits, FlowControl, Parity, PortOpener, PortOptions, PortSettings, SerialTransport,
    StopBits,
};

/// Opens real serial devices through the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortOpener;

impl PortOpener for SerialPortOpener {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialTransport>> {
        let port = SerialPortTransport::open(settings)?;
        Ok(Box::new(port))
    }
}

/// A serial device opened via `serialport`.
pub struct SerialPortTransport {
    port: Option<Box<dyn SerialPort>>,
    device: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialPortTransport {
    /// Open the device described by `settings`.
    pub fn open(settings: &PortSettings) -> Result<Self> {
        let builder = apply_options(
            serialport::new(settings.path.as_str(), settings.baud_rate)
                .timeout(settings.read_timeout),
            settings.options,
        );

        let port = builder
            .open()
            .map_err(|err| TransportError::open(settings.path.clone(), err))?;

        debug!(
            device = %settings.path,
            baud_rate = settings.baud_rate,
            read_timeout = ?settings.read_timeout,
            "serial port opened"
        );

        Ok(Self {
            port: Some(port),
            device: settings.path.clone(),
            baud_rate: settings.baud_rate,
            read_timeout: settings.read_timeout,
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

fn apply_options(
    builder: serialport::SerialPortBuilder,
    options: PortOptions,
) -> serialport::SerialPortBuilder {
    let data_bits = match options.data_bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    };
    let parity = match options.parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    };
    let stop_bits = match options.stop_bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    };
    let flow_control = match options.flow_control {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Software => serialport::FlowControl::Software,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
    };

    builder
        .data_bits(data_bits)
        .parity(parity)
        .stop_bits(stop_bits)
        .flow_control(flow_control)
}

impl SerialTransport for SerialPortTransport {
    fn bytes_available(&mut self) -> Result<usize> {
        let pending = self.port_mut()?.bytes_to_read().map_err(std::io::Error::from)?;
        Ok(pending as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let deadline = Instant::now() + self.read_timeout;
        let port = self.port_mut()?;

        let mut filled = 0usize;
        while filled < buf.len() {
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => break,
                Err(err) => return Err(TransportError::Io(err)),
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        trace!(requested = buf.len(), read = filled, "serial read");
        Ok(filled)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(device = %self.device, "serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn device(&self) -> &str {
        &self.device
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_device_reports_path() {
        let settings = PortSettings {
            path: "/dev/jointlink-does-not-exist".to_string(),
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(10),
            options: PortOptions::default(),
        };

        let err = SerialPortOpener
            .open(&settings)
            .expect_err("missing device should fail to open");
        match err {
            TransportError::Open { path, .. } => {
                assert_eq!(path, "/dev/jointlink-does-not-exist");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
