//! Register-level access to a SigmaDSP over a physical bus.
//!
//! Implementations move raw register contents; they know nothing about
//! parameters or safeload. Writes larger than one bus frame are split by
//! [`writable_chunks`].

use crate::error::SigmaDspError;

/// Register address width on the bus, in bytes.
pub const ADDRESS_LENGTH: usize = 2;

/// Parameter registers are 32 bit wide; chunking is word-granular.
pub const WORD_LENGTH: usize = 4;

pub trait RegisterTransport: Send {
    /// Read `length` bytes starting at register `address`.
    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>, SigmaDspError>;

    /// Write `data` starting at register `address`. Bus failures are logged,
    /// not returned; a failed chunked write may have applied a prefix of its
    /// frames.
    fn write(&mut self, address: u16, data: &[u8]);
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for Box<T> {
    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>, SigmaDspError> {
        (**self).read(address, length)
    }

    fn write(&mut self, address: u16, data: &[u8]) {
        (**self).write(address, data);
    }
}

/// Number of whole words that fit into one frame after the bus header.
#[must_use]
pub const fn max_payload_words(max_bus_bytes: usize, header_len: usize) -> usize {
    max_bus_bytes.saturating_sub(header_len) / WORD_LENGTH
}

/// Iterator over `(register address, frame payload)` chunks of a write.
///
/// Every chunk but the last carries exactly `max_payload_words` words. The
/// register address advances by the word count of the previous chunk, which
/// mirrors the chip's auto-incrementing write pointer.
#[derive(Clone, Debug)]
pub struct WritableChunks<'a> {
    address: u16,
    remaining: &'a [u8],
    max_payload_words: usize,
}

impl<'a> Iterator for WritableChunks<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let max_bytes = self.max_payload_words * WORD_LENGTH;
        if max_bytes == 0 || self.remaining.len() <= max_bytes {
            let chunk = (self.address, self.remaining);
            self.remaining = &[];
            return Some(chunk);
        }
        let (head, tail) = self.remaining.split_at(max_bytes);
        let chunk = (self.address, head);
        // the address register is 16 bits wide and wraps like the chip's pointer
        self.address = self.address.wrapping_add(self.max_payload_words as u16);
        self.remaining = tail;
        Some(chunk)
    }
}

/// Frames never carry more words than the 16-bit address space can step over.
const MAX_WORDS_PER_CHUNK: usize = u16::MAX as usize;

#[must_use]
pub const fn writable_chunks(address: u16, data: &[u8], max_payload_words: usize) -> WritableChunks<'_> {
    let max_payload_words = if max_payload_words > MAX_WORDS_PER_CHUNK {
        MAX_WORDS_PER_CHUNK
    } else {
        max_payload_words
    };
    WritableChunks {
        address,
        remaining: data,
        max_payload_words,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_words_in_two_word_frames() {
        let data: Vec<u8> = (0u8..20).collect();
        let chunks: Vec<_> = writable_chunks(0x0100, &data, 2).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], (0x0100, &data[0..8]));
        assert_eq!(chunks[1], (0x0102, &data[8..16]));
        assert_eq!(chunks[2], (0x0104, &data[16..20]));
    }

    #[test]
    fn exact_fit_is_a_single_frame() {
        let data = [0u8; 8];
        assert_eq!(writable_chunks(0, &data, 2).count(), 1);
        assert_eq!(writable_chunks(0, &[], 2).count(), 0);
    }

    #[test]
    fn unaligned_tail_is_sent_as_is() {
        let data = [1u8; 10];
        let chunks: Vec<_> = writable_chunks(0x10, &data, 2).collect();
        assert_eq!(chunks.last().map(|(a, d)| (*a, d.len())), Some((0x12, 2)));
    }

    #[test]
    fn huge_frames_step_the_address_by_whole_chunks() {
        let data = vec![0u8; (MAX_WORDS_PER_CHUNK + 2) * WORD_LENGTH];
        let chunks: Vec<_> = writable_chunks(0x0000, &data, 70_000)
            .map(|(address, chunk)| (address, chunk.len()))
            .collect();
        assert_eq!(
            chunks,
            vec![(0x0000, MAX_WORDS_PER_CHUNK * WORD_LENGTH), (0xFFFF, 2 * WORD_LENGTH)]
        );
    }

    #[test]
    fn payload_words_per_frame() {
        assert_eq!(max_payload_words(4096, 3), 1023);
        assert_eq!(max_payload_words(1024, 2), 255);
        assert_eq!(max_payload_words(2, 3), 0);
    }
}
