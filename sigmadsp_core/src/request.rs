//! Typed requests exchanged between the SigmaStudio session and the DSP worker.

use crate::error::SigmaDspError;
use crate::packet::Packet;

/// SigmaStudio writes `data` to the register at `address`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRequest {
    pub address: u16,
    pub data: Vec<u8>,
}

/// Like [`WriteRequest`], but the chip must commit the words through safeload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafeloadRequest {
    pub address: u16,
    pub data: Vec<u8>,
}

/// SigmaStudio reads `length` bytes starting at `address`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    pub address: u16,
    pub length: usize,
}

/// Data returned for a [`ReadRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadResponse {
    pub data: Vec<u8>,
}

/// A decoded SigmaStudio request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigmaRequest {
    Write(WriteRequest),
    Safeload(SafeloadRequest),
    Read(ReadRequest),
}

impl SigmaRequest {
    /// Classify a received packet. Read responses are only ever sent, so they
    /// yield `Ok(None)`.
    pub fn try_from_packet(packet: Packet) -> Result<Option<Self>, SigmaDspError> {
        let (header, payload) = packet.into_parts();
        if !header.is_write_request() && !header.is_read_request() {
            return Ok(None);
        }
        let address = header.address()?;
        if header.is_safeload() {
            return Ok(Some(Self::Safeload(SafeloadRequest {
                address,
                data: payload,
            })));
        }
        if header.is_write_request() {
            return Ok(Some(Self::Write(WriteRequest {
                address,
                data: payload,
            })));
        }
        if header.is_read_request() {
            return Ok(Some(Self::Read(ReadRequest {
                address,
                length: header.data_length()?,
            })));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ChipFamily;
    use crate::header::FieldName;

    fn write_packet(safeload: u64) -> Packet {
        let mut header = ChipFamily::Adau14xx
            .new_header_from_operation_byte(0x09, None)
            .unwrap();
        header.set(FieldName::Safeload, safeload).unwrap();
        header.set(FieldName::Address, 0x1000).unwrap();
        Packet::with_payload(header, vec![0xAA, 0xBB, 0xCC, 0xDD]).unwrap()
    }

    #[test]
    fn write_and_safeload_are_distinguished() {
        assert_eq!(
            SigmaRequest::try_from_packet(write_packet(0)).unwrap(),
            Some(SigmaRequest::Write(WriteRequest {
                address: 0x1000,
                data: vec![0xAA, 0xBB, 0xCC, 0xDD]
            }))
        );
        assert!(matches!(
            SigmaRequest::try_from_packet(write_packet(1)).unwrap(),
            Some(SigmaRequest::Safeload(SafeloadRequest { address: 0x1000, .. }))
        ));
    }

    #[test]
    fn read_request_carries_length() {
        let mut header = ChipFamily::Adau1x0x.new_read_request_header().unwrap();
        header.set(FieldName::Operation, 0x0A).unwrap();
        header.set(FieldName::Address, 0x0010).unwrap();
        header.set(FieldName::DataLength, 2).unwrap();
        assert_eq!(
            SigmaRequest::try_from_packet(Packet::new(header)).unwrap(),
            Some(SigmaRequest::Read(ReadRequest {
                address: 0x0010,
                length: 2
            }))
        );
    }
}
