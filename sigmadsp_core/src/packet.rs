use crate::error::SigmaDspError;
use crate::header::{FieldName, PacketHeader};

/// A header plus its (optional) payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Vec<u8>,
}

impl Packet {
    #[must_use]
    pub const fn new(header: PacketHeader) -> Self {
        Self {
            header,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(header: PacketHeader, payload: Vec<u8>) -> Result<Self, SigmaDspError> {
        let mut packet = Self::new(header);
        packet.set_payload(payload)?;
        Ok(packet)
    }

    #[must_use]
    pub const fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut PacketHeader {
        &mut self.header
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Attach a payload. A zero `data_length` is back-filled from the payload;
    /// a nonzero one must match the payload length exactly.
    pub fn set_payload(&mut self, payload: Vec<u8>) -> Result<(), SigmaDspError> {
        let declared = self.header.data_length()?;
        if declared == 0 {
            self.header
                .set(FieldName::DataLength, payload.len() as u64)?;
        } else if declared != payload.len() {
            return Err(SigmaDspError::LengthMismatch {
                expected: declared,
                actual: payload.len(),
            });
        }
        self.payload = payload;
        Ok(())
    }

    #[must_use]
    pub fn into_parts(self) -> (PacketHeader, Vec<u8>) {
        (self.header, self.payload)
    }

    #[must_use]
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut out = self.header.as_bytes();
        out.extend_from_slice(&self.payload);
        out
    }
}
