//! Header model for packets exchanged with SigmaStudio.
//!
//! A header is an ordered set of named, non-overlapping byte fields. The
//! layout differs per chip family and per operation (see `generator`), so
//! fields are described at runtime rather than as fixed structs.

use std::fmt;

use crate::conversion::{bytes_to_int, int_to_bytes};
use crate::error::SigmaDspError;

/// Widest field the header model stores (fits a `u64`).
pub const MAX_FIELD_SIZE: usize = 8;

/// Operation discriminant, always the first byte of a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKey {
    Write = 0x09,
    ReadRequest = 0x0A,
    ReadResponse = 0x0B,
}

impl OperationKey {
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for OperationKey {
    type Error = SigmaDspError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x09 => Ok(Self::Write),
            0x0A => Ok(Self::ReadRequest),
            0x0B => Ok(Self::ReadResponse),
            other => Err(SigmaDspError::UnknownOperation(other)),
        }
    }
}

/// Names of all fields that appear in any supported header layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldName {
    Operation,
    Safeload,
    Channel,
    TotalLength,
    ChipAddress,
    DataLength,
    Address,
    Success,
    Reserved,
}

impl FieldName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operation => "operation",
            Self::Safeload => "safeload",
            Self::Channel => "channel",
            Self::TotalLength => "total_length",
            Self::ChipAddress => "chip_address",
            Self::DataLength => "data_length",
            Self::Address => "address",
            Self::Success => "success",
            Self::Reserved => "reserved",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named region of a header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    name: FieldName,
    offset: usize,
    size: usize,
    value: u64,
}

impl Field {
    /// Create a zero-valued field. Sizes above [`MAX_FIELD_SIZE`] are rejected.
    pub fn new(name: FieldName, offset: usize, size: usize) -> Result<Self, SigmaDspError> {
        if size > MAX_FIELD_SIZE {
            return Err(SigmaDspError::InvalidFieldValue {
                field: name,
                reason: format!("size {size} exceeds {MAX_FIELD_SIZE} bytes"),
            });
        }
        Ok(Self {
            name,
            offset,
            size,
            value: 0,
        })
    }

    #[must_use]
    pub const fn name(&self) -> FieldName {
        self.name
    }
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Index of the last byte occupied by this field.
    #[must_use]
    pub const fn end(&self) -> usize {
        (self.offset + self.size).saturating_sub(1)
    }

    /// Store an integer; it must fit into `size * 8` bits.
    pub fn set_from_int(&mut self, value: u64) -> Result<(), SigmaDspError> {
        let bits = self.size * 8;
        if bits < 64 && value >> bits != 0 {
            return Err(SigmaDspError::InvalidFieldValue {
                field: self.name,
                reason: format!("{value} does not fit into {bits} bits"),
            });
        }
        self.value = value;
        Ok(())
    }

    /// Store a big-endian byte string of exactly `size` bytes.
    pub fn set_from_bytes(&mut self, data: &[u8]) -> Result<(), SigmaDspError> {
        if data.len() != self.size {
            return Err(SigmaDspError::InvalidFieldValue {
                field: self.name,
                reason: format!("expected {} bytes, got {}", self.size, data.len()),
            });
        }
        self.value = bytes_to_int(data);
        Ok(())
    }

    const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.offset + other.size && other.offset < self.offset + self.size
    }
}

/// Ordered collection of fields, sorted by offset.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PacketHeader {
    fields: Vec<Field>,
}

impl PacketHeader {
    pub fn new<I>(fields: I) -> Result<Self, SigmaDspError>
    where
        I: IntoIterator<Item = Field>,
    {
        let mut header = Self::default();
        for field in fields {
            header.add_field(field)?;
        }
        Ok(header)
    }

    /// Build a header from `(name, offset, size)` triples.
    pub fn from_layout(layout: &[(FieldName, usize, usize)]) -> Result<Self, SigmaDspError> {
        let mut header = Self::default();
        for &(name, offset, size) in layout {
            header.add(name, offset, size)?;
        }
        Ok(header)
    }

    pub fn add(&mut self, name: FieldName, offset: usize, size: usize) -> Result<(), SigmaDspError> {
        self.add_field(Field::new(name, offset, size)?)
    }

    /// Add a field. A field whose name is already present is ignored; a field
    /// that would overlap an existing one is rejected and the header is left
    /// unchanged.
    pub fn add_field(&mut self, field: Field) -> Result<(), SigmaDspError> {
        if self.contains(field.name) {
            return Ok(());
        }
        if let Some(existing) = self.fields.iter().find(|f| f.overlaps(&field)) {
            let (first, second) = if existing.offset <= field.offset {
                (existing.name, field.name)
            } else {
                (field.name, existing.name)
            };
            return Err(SigmaDspError::OverlappingFields { first, second });
        }
        self.fields.push(field);
        self.fields.sort_by_key(|f| f.offset);
        Ok(())
    }

    /// Total header size in bytes (sum of field sizes).
    #[must_use]
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.size).sum()
    }

    /// Whether the fields cover the header without gaps.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        self.fields
            .windows(2)
            .all(|pair| pair[0].offset + pair[0].size == pair[1].offset)
    }

    #[must_use]
    pub fn contains(&self, name: FieldName) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    #[must_use]
    pub fn get(&self, name: FieldName) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn get_mut(&mut self, name: FieldName) -> Result<&mut Field, SigmaDspError> {
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or(SigmaDspError::UnknownField(name))
    }

    pub fn value(&self, name: FieldName) -> Result<u64, SigmaDspError> {
        self.get(name)
            .map(Field::value)
            .ok_or(SigmaDspError::UnknownField(name))
    }

    pub fn set(&mut self, name: FieldName, value: u64) -> Result<(), SigmaDspError> {
        self.get_mut(name)?.set_from_int(value)
    }

    pub fn set_bytes(&mut self, name: FieldName, data: &[u8]) -> Result<(), SigmaDspError> {
        self.get_mut(name)?.set_from_bytes(data)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<FieldName> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Copy values of all fields that exist in both headers.
    pub fn copy_from_template(&mut self, template: &Self) -> Result<(), SigmaDspError> {
        for field in template.iter() {
            if self.contains(field.name) {
                self.set(field.name, field.value)?;
            }
        }
        Ok(())
    }

    /// Populate all field values from a complete serialized header.
    pub fn parse(&mut self, data: &[u8]) -> Result<(), SigmaDspError> {
        let expected = self.size();
        if data.len() != expected {
            return Err(SigmaDspError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        for field in &mut self.fields {
            let slice = data
                .get(field.offset..field.offset + field.size)
                .ok_or(SigmaDspError::LengthMismatch {
                    expected: field.offset + field.size,
                    actual: data.len(),
                })?;
            field.set_from_bytes(slice)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn as_bytes(&self) -> Vec<u8> {
        let len = self
            .fields
            .iter()
            .map(|f| f.offset + f.size)
            .max()
            .unwrap_or(0);
        let mut buf = vec![0u8; len];
        for field in &self.fields {
            int_to_bytes(field.value, &mut buf[field.offset..field.offset + field.size]);
        }
        buf
    }

    /// The decoded operation key, if the operation field holds a known one.
    #[must_use]
    pub fn operation(&self) -> Option<OperationKey> {
        let raw = self.get(FieldName::Operation)?.value;
        u8::try_from(raw)
            .ok()
            .and_then(|b| OperationKey::try_from(b).ok())
    }

    #[must_use]
    pub fn is_write_request(&self) -> bool {
        self.operation() == Some(OperationKey::Write)
    }
    #[must_use]
    pub fn is_read_request(&self) -> bool {
        self.operation() == Some(OperationKey::ReadRequest)
    }
    #[must_use]
    pub fn is_read_response(&self) -> bool {
        self.operation() == Some(OperationKey::ReadResponse)
    }
    /// A write request whose safeload flag is set.
    #[must_use]
    pub fn is_safeload(&self) -> bool {
        self.is_write_request() && self.value(FieldName::Safeload).ok() == Some(1)
    }
    #[must_use]
    pub fn carries_payload(&self) -> bool {
        self.is_write_request() || self.is_read_response()
    }

    pub fn address(&self) -> Result<u16, SigmaDspError> {
        let raw = self.value(FieldName::Address)?;
        u16::try_from(raw).map_err(|_| SigmaDspError::InvalidFieldValue {
            field: FieldName::Address,
            reason: format!("0x{raw:X} is not a 16-bit register address"),
        })
    }

    pub fn data_length(&self) -> Result<usize, SigmaDspError> {
        let raw = self.value(FieldName::DataLength)?;
        usize::try_from(raw).map_err(|_| SigmaDspError::InvalidFieldValue {
            field: FieldName::DataLength,
            reason: format!("{raw} does not fit into usize"),
        })
    }
}
