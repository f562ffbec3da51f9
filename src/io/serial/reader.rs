// src/io/serial/reader.rs
//
// Serial port byte source.
// Opens one named port and hands raw reads to the session driver.

use std::io::{ErrorKind, Read};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::io::source::{ByteSource, ReadOutcome};

/// Read buffer size per call
const READ_BUFFER_SIZE: usize = 256;

/// Serial port configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Upper bound on one blocking read. Kept short so a stop request is seen promptly.
    pub read_timeout_ms: u64,
}

/// Byte source over an open serial port
pub struct SerialSource {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    buf: [u8; READ_BUFFER_SIZE],
}

impl SerialSource {
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|e| TransportError::Open {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        tlog!(
            "[serial] Opened {} at {} baud (timeout {} ms)",
            config.port,
            config.baud_rate,
            config.read_timeout_ms
        );

        Ok(SerialSource {
            port,
            name: config.port.clone(),
            buf: [0u8; READ_BUFFER_SIZE],
        })
    }
}

impl ByteSource for SerialSource {
    fn read(&mut self) -> Result<ReadOutcome, TransportError> {
        match self.port.read(&mut self.buf) {
            Ok(n) if n > 0 => Ok(ReadOutcome::Chunk(self.buf[..n].to_vec())),
            // EOF - port closed/disconnected
            Ok(_) => Err(TransportError::Disconnected),
            // Timeout is expected for serial reads
            Err(ref e) if e.kind() == ErrorKind::TimedOut => Ok(ReadOutcome::Chunk(Vec::new())),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
