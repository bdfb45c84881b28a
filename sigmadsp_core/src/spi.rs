//! SPI register transport for SigmaDSP parts (tested with ADAU145x).
//!
//! Frame layout: `[direction | address (2 bytes, BE) | payload]` where the
//! direction byte is 0 for writes and 1 for reads. Reads clock out as many
//! dummy bytes as data is expected.

use embedded_hal::spi::SpiDevice;

use crate::config::{config as global_config, hex_dump};
use crate::conversion::int16_to_bytes;
use crate::error::SigmaDspError;
use crate::transport::{max_payload_words, writable_chunks, RegisterTransport, ADDRESS_LENGTH};

/// Direction byte plus register address.
pub const SPI_HEADER_LENGTH: usize = 1 + ADDRESS_LENGTH;

/// Default maximum number of bytes per SPI transfer.
pub const MAX_SPI_BYTES: usize = 4096;

pub const SPI_WRITE: u8 = 0;
pub const SPI_READ: u8 = 1;

/// Build an outgoing write frame.
#[must_use]
pub fn build_spi_frame(address: u16, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(SPI_HEADER_LENGTH + data.len());
    frame.push(SPI_WRITE);
    frame.extend_from_slice(&int16_to_bytes(address));
    frame.extend_from_slice(data);
    frame
}

pub struct SpiTransport<S> {
    spi: S,
    max_payload_words: usize,
}

impl<S: SpiDevice> SpiTransport<S> {
    #[must_use]
    pub fn new(spi: S) -> Self {
        Self::with_max_transfer_bytes(spi, MAX_SPI_BYTES)
    }

    #[must_use]
    pub fn with_max_transfer_bytes(spi: S, max_bytes: usize) -> Self {
        Self {
            spi,
            max_payload_words: max_payload_words(max_bytes, SPI_HEADER_LENGTH),
        }
    }

    #[must_use]
    pub const fn max_payload_words(&self) -> usize {
        self.max_payload_words
    }

    /// Give the bus device back, e.g. to inspect a test double.
    pub fn into_inner(self) -> S {
        self.spi
    }
}

impl<S> RegisterTransport for SpiTransport<S>
where
    S: SpiDevice + Send,
{
    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>, SigmaDspError> {
        let mut buf = vec![0u8; SPI_HEADER_LENGTH + length];
        buf[0] = SPI_READ;
        buf[1..SPI_HEADER_LENGTH].copy_from_slice(&int16_to_bytes(address));
        self.spi.transfer_in_place(&mut buf).map_err(|e| {
            log::error!("SPI failed to read {length} bytes from 0x{address:04X}: {e:?}");
            SigmaDspError::Bus(format!("SPI read from 0x{address:04X} failed: {e:?}"))
        })?;
        let data = buf.split_off(SPI_HEADER_LENGTH);
        if global_config().log_payloads {
            log::debug!("[SPI read 0x{address:04X}] {}", hex_dump(&data));
        }
        Ok(data)
    }

    fn write(&mut self, address: u16, data: &[u8]) {
        let mut sent = 0usize;
        for (chunk_address, chunk) in writable_chunks(address, data, self.max_payload_words) {
            let frame = build_spi_frame(chunk_address, chunk);
            if global_config().log_payloads {
                log::debug!("[SPI write] {}", hex_dump(&frame));
            }
            if let Err(e) = self.spi.write(&frame) {
                log::error!(
                    "SPI failed to write frame to 0x{chunk_address:04X} with error: {e:?}; \
                     {sent} of {} bytes for 0x{address:04X} were applied",
                    data.len()
                );
                return;
            }
            sent += chunk.len();
        }
    }
}
