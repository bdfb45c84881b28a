use embedded_hal::i2c::{self, I2c};
use embedded_hal::spi::{self, SpiDevice};
use std::convert::Infallible;

use sigmadsp::i2c::{I2cTransport, I2C_HEADER_LENGTH};
use sigmadsp::spi::{SpiTransport, SPI_HEADER_LENGTH, SPI_WRITE};
use sigmadsp::RegisterTransport;

#[derive(Default)]
struct RecordingSpi {
    frames: Vec<Vec<u8>>,
}

impl spi::ErrorType for RecordingSpi {
    type Error = Infallible;
}

impl SpiDevice for RecordingSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Infallible> {
        for op in operations.iter_mut() {
            if let spi::Operation::Write(data) = op {
                self.frames.push(data.to_vec());
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingI2c {
    frames: Vec<Vec<u8>>,
}

impl i2c::ErrorType for RecordingI2c {
    type Error = Infallible;
}

impl I2c for RecordingI2c {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Infallible> {
        for op in operations.iter_mut() {
            if let i2c::Operation::Write(data) = op {
                self.frames.push(data.to_vec());
            }
        }
        Ok(())
    }
}

/// Split frames into (register address, payload) using the bus header length.
fn decode(frames: &[Vec<u8>], header_len: usize) -> Vec<(u16, Vec<u8>)> {
    frames
        .iter()
        .map(|f| {
            let a = header_len - 2;
            (u16::from_be_bytes([f[a], f[a + 1]]), f[header_len..].to_vec())
        })
        .collect()
}

fn assert_covers(chunks: &[(u16, Vec<u8>)], start: u16, data: &[u8]) {
    let joined: Vec<u8> = chunks.iter().flat_map(|(_, d)| d.clone()).collect();
    assert_eq!(joined, data);
    assert_eq!(chunks[0].0, start);
    for pair in chunks.windows(2) {
        let words = (pair[0].1.len() / 4) as u16;
        assert_eq!(pair[1].0, pair[0].0 + words);
    }
}

#[test]
fn spi_five_words_in_two_word_frames() {
    let max_bytes = SPI_HEADER_LENGTH + 2 * 4;
    let mut t = SpiTransport::with_max_transfer_bytes(RecordingSpi::default(), max_bytes);
    let data: Vec<u8> = (0u8..20).collect();
    t.write(0x0400, &data);

    let frames = t.into_inner().frames;
    assert!(frames.iter().all(|f| f[0] == SPI_WRITE));
    let chunks = decode(&frames, SPI_HEADER_LENGTH);
    let shape: Vec<_> = chunks.iter().map(|(a, d)| (*a, d.len() / 4)).collect();
    assert_eq!(shape, vec![(0x0400, 2), (0x0402, 2), (0x0404, 1)]);
    assert_covers(&chunks, 0x0400, &data);
}

#[test]
fn spi_large_program_upload() {
    let mut t = SpiTransport::new(RecordingSpi::default());
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    t.write(0xC000, &data);
    let frames = t.into_inner().frames;
    assert!(frames.iter().all(|f| f.len() <= sigmadsp::spi::MAX_SPI_BYTES));
    assert_covers(&decode(&frames, SPI_HEADER_LENGTH), 0xC000, &data);
}

#[test]
fn i2c_chunks_follow_the_same_rule() {
    let max_bytes = I2C_HEADER_LENGTH + 3 * 4;
    let mut t = I2cTransport::with_max_transfer_bytes(RecordingI2c::default(), 0x38, max_bytes);
    let data: Vec<u8> = (0u8..30).collect();
    t.write(0x0010, &data);
    let chunks = decode(&t.into_inner().frames, I2C_HEADER_LENGTH);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2].1.len(), 6);
    assert_covers(&chunks, 0x0010, &data);
}

#[test]
fn small_writes_are_a_single_frame() {
    let mut t = SpiTransport::new(RecordingSpi::default());
    t.write(0x1000, &[0xAA, 0xBB, 0xCC, 0xDD]);
    assert_eq!(t.into_inner().frames, vec![vec![0, 0x10, 0x00, 0xAA, 0xBB, 0xCC, 0xDD]]);
}
