//! Per-chip-family header layouts.
//!
//! The wire layout of a header depends on both the operation and the chip
//! family, so building a header is two-phase: the operation byte is read
//! first, then the matching layout is instantiated and filled.

use serde::{Deserialize, Serialize};

use crate::conversion::FixedPointFormat;
use crate::error::SigmaDspError;
use crate::header::{FieldName, OperationKey, PacketHeader};

use FieldName::{
    Address, Channel, ChipAddress, DataLength, Operation, Reserved, Safeload, Success, TotalLength,
};

type Layout = &'static [(FieldName, usize, usize)];

const ADAU14XX_WRITE: Layout = &[
    (Operation, 0, 1),
    (Safeload, 1, 1),
    (Channel, 2, 1),
    (TotalLength, 3, 4),
    (ChipAddress, 7, 1),
    (DataLength, 8, 4),
    (Address, 12, 2),
];

const ADAU14XX_READ_REQUEST: Layout = &[
    (Operation, 0, 1),
    (TotalLength, 1, 4),
    (ChipAddress, 5, 1),
    (DataLength, 6, 4),
    (Address, 10, 2),
    (Reserved, 12, 2),
];

const ADAU14XX_READ_RESPONSE: Layout = &[
    (Operation, 0, 1),
    (TotalLength, 1, 4),
    (ChipAddress, 5, 1),
    (DataLength, 6, 4),
    (Address, 10, 2),
    (Success, 12, 1),
    (Reserved, 13, 1),
];

const ADAU1X0X_WRITE: Layout = &[
    (Operation, 0, 1),
    (Safeload, 1, 1),
    (Channel, 2, 1),
    (TotalLength, 3, 2),
    (ChipAddress, 5, 1),
    (DataLength, 6, 2),
    (Address, 8, 2),
];

const ADAU1X0X_READ_REQUEST: Layout = &[
    (Operation, 0, 1),
    (TotalLength, 1, 2),
    (ChipAddress, 3, 1),
    (DataLength, 4, 2),
    (Address, 6, 2),
];

const ADAU1X0X_READ_RESPONSE: Layout = &[(Operation, 0, 1), (DataLength, 1, 2), (Success, 3, 1)];

/// Supported SigmaDSP chip families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipFamily {
    /// ADAU145x/146x: wide header fields, software safeload, 8.24 parameters.
    Adau14xx,
    /// ADAU1701/1401: narrow header fields, hardware safeload, 5.23 parameters.
    #[serde(alias = "adau1701", alias = "adau1x01")]
    Adau1x0x,
}

impl ChipFamily {
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "adau14xx" => Some(Self::Adau14xx),
            "adau1x0x" | "adau1x01" | "adau1701" => Some(Self::Adau1x0x),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Adau14xx => "adau14xx",
            Self::Adau1x0x => "adau1x0x",
        }
    }

    #[must_use]
    pub const fn fixed_point(&self) -> FixedPointFormat {
        match self {
            Self::Adau14xx => FixedPointFormat::Q8_24,
            Self::Adau1x0x => FixedPointFormat::Q5_23,
        }
    }

    const fn layout(self, key: OperationKey) -> Layout {
        match (self, key) {
            (Self::Adau14xx, OperationKey::Write) => ADAU14XX_WRITE,
            (Self::Adau14xx, OperationKey::ReadRequest) => ADAU14XX_READ_REQUEST,
            (Self::Adau14xx, OperationKey::ReadResponse) => ADAU14XX_READ_RESPONSE,
            (Self::Adau1x0x, OperationKey::Write) => ADAU1X0X_WRITE,
            (Self::Adau1x0x, OperationKey::ReadRequest) => ADAU1X0X_READ_REQUEST,
            (Self::Adau1x0x, OperationKey::ReadResponse) => ADAU1X0X_READ_RESPONSE,
        }
    }

    pub fn new_write_header(self) -> Result<PacketHeader, SigmaDspError> {
        PacketHeader::from_layout(self.layout(OperationKey::Write))
    }

    pub fn new_read_request_header(self) -> Result<PacketHeader, SigmaDspError> {
        PacketHeader::from_layout(self.layout(OperationKey::ReadRequest))
    }

    pub fn new_read_response_header(self) -> Result<PacketHeader, SigmaDspError> {
        PacketHeader::from_layout(self.layout(OperationKey::ReadResponse))
    }

    /// Build the header selected by an operation byte, optionally copying
    /// matching fields from `template`, and store the byte in `operation`.
    pub fn new_header_from_operation_byte(
        self,
        operation_byte: u8,
        template: Option<&PacketHeader>,
    ) -> Result<PacketHeader, SigmaDspError> {
        let key = OperationKey::try_from(operation_byte)?;
        let mut header = match key {
            OperationKey::Write => self.new_write_header()?,
            OperationKey::ReadRequest => self.new_read_request_header()?,
            OperationKey::ReadResponse => self.new_read_response_header()?,
        };
        if let Some(template) = template {
            header.copy_from_template(template)?;
        }
        header.set(Operation, u64::from(operation_byte))?;
        Ok(header)
    }

    pub fn new_header_from_operation_key(
        self,
        key: OperationKey,
        template: Option<&PacketHeader>,
    ) -> Result<PacketHeader, SigmaDspError> {
        self.new_header_from_operation_byte(key.as_byte(), template)
    }
}

impl std::str::FromStr for ChipFamily {
    type Err = SigmaDspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s).ok_or_else(|| SigmaDspError::Config(format!("unknown DSP type '{s}'")))
    }
}

impl std::fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
