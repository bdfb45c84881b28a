//! I2C register transport.
//!
//! Writes go out as `[address (2 bytes, BE) | payload]`; reads are a single
//! write-then-read transaction with the register address as the write part.

use embedded_hal::i2c::I2c;

use crate::config::{config as global_config, hex_dump};
use crate::conversion::int16_to_bytes;
use crate::error::SigmaDspError;
use crate::transport::{max_payload_words, writable_chunks, RegisterTransport, ADDRESS_LENGTH};

pub const I2C_HEADER_LENGTH: usize = ADDRESS_LENGTH;

/// Default maximum number of bytes per I2C transfer.
pub const MAX_I2C_BYTES: usize = 1024;

pub struct I2cTransport<I> {
    i2c: I,
    device_address: u8,
    max_payload_words: usize,
}

impl<I: I2c> I2cTransport<I> {
    #[must_use]
    pub fn new(i2c: I, device_address: u8) -> Self {
        Self::with_max_transfer_bytes(i2c, device_address, MAX_I2C_BYTES)
    }

    #[must_use]
    pub fn with_max_transfer_bytes(i2c: I, device_address: u8, max_bytes: usize) -> Self {
        Self {
            i2c,
            device_address,
            max_payload_words: max_payload_words(max_bytes, I2C_HEADER_LENGTH),
        }
    }

    #[must_use]
    pub const fn device_address(&self) -> u8 {
        self.device_address
    }

    #[must_use]
    pub const fn max_payload_words(&self) -> usize {
        self.max_payload_words
    }

    pub fn into_inner(self) -> I {
        self.i2c
    }
}

impl<I> RegisterTransport for I2cTransport<I>
where
    I: I2c + Send,
{
    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>, SigmaDspError> {
        let mut data = vec![0u8; length];
        self.i2c
            .write_read(self.device_address, &int16_to_bytes(address), &mut data)
            .map_err(|e| {
                log::error!(
                    "I2C device 0x{:02X} failed to read {length} bytes from 0x{address:04X}: {e:?}",
                    self.device_address
                );
                SigmaDspError::Bus(format!("I2C read from 0x{address:04X} failed: {e:?}"))
            })?;
        if global_config().log_payloads {
            log::debug!("[I2C read 0x{address:04X}] {}", hex_dump(&data));
        }
        Ok(data)
    }

    fn write(&mut self, address: u16, data: &[u8]) {
        let mut sent = 0usize;
        for (chunk_address, chunk) in writable_chunks(address, data, self.max_payload_words) {
            let mut frame = Vec::with_capacity(I2C_HEADER_LENGTH + chunk.len());
            frame.extend_from_slice(&int16_to_bytes(chunk_address));
            frame.extend_from_slice(chunk);
            if global_config().log_payloads {
                log::debug!("[I2C write 0x{:02X}] {}", self.device_address, hex_dump(&frame));
            }
            if let Err(e) = self.i2c.write(self.device_address, &frame) {
                log::error!(
                    "I2C device 0x{:02X} failed to write frame to 0x{chunk_address:04X}: {e:?}; \
                     {sent} of {} bytes for 0x{address:04X} were applied",
                    self.device_address,
                    data.len()
                );
                return;
            }
            sent += chunk.len();
        }
    }
}
