//! TOML settings file for the backend service.
//!
//! ```toml
//! [host]
//! ip = "0.0.0.0"
//! port = 8087
//!
//! [dsp]
//! type = "adau14xx"        # or "adau1x0x" / "adau1701"
//! protocol = "spi"         # or "i2c"
//! bus_number = 0
//! device_address = 0       # SPI chip select, or I2C slave address
//! use_safeload = true
//! reset_pin = 17           # optional
//!
//! [safety_hash]            # optional
//! address = 0x2000
//! value = 0x12345678
//! ```

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::Deserialize;

use crate::dsp::SafetyHashCell;
use crate::error::SigmaDspError;
use crate::generator::ChipFamily;
use crate::i2c::{I2C_HEADER_LENGTH, MAX_I2C_BYTES};
use crate::spi::{MAX_SPI_BYTES, SPI_HEADER_LENGTH};

/// TCP port SigmaStudio connects to by default.
pub const DEFAULT_PORT: u16 = 8087;
/// Default I2C slave address of ADAU145x parts.
pub const DEFAULT_I2C_ADDRESS: u8 = 0x38;
/// Largest bus frame accepted from the settings file; keeps the per-frame
/// word count well inside the 16-bit register address space.
pub const TRANSFER_BYTES_CEILING: usize = 65_535;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusProtocol {
    #[default]
    Spi,
    I2c,
}

impl BusProtocol {
    #[must_use]
    pub const fn header_length(self) -> usize {
        match self {
            Self::Spi => SPI_HEADER_LENGTH,
            Self::I2c => I2C_HEADER_LENGTH,
        }
    }

    #[must_use]
    pub const fn default_max_transfer_bytes(self) -> usize {
        match self {
            Self::Spi => MAX_SPI_BYTES,
            Self::I2c => MAX_I2C_BYTES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HostSettings {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DspSettings {
    #[serde(rename = "type")]
    pub family: ChipFamily,
    #[serde(default)]
    pub protocol: BusProtocol,
    #[serde(default)]
    pub bus_number: u32,
    pub device_address: Option<u8>,
    #[serde(default = "default_true")]
    pub use_safeload: bool,
    pub reset_pin: Option<u64>,
    #[serde(default = "default_reset_hold_ms")]
    pub reset_hold_ms: u64,
    pub max_transfer_bytes: Option<usize>,
}

const fn default_true() -> bool {
    true
}

const fn default_reset_hold_ms() -> u64 {
    10
}

impl DspSettings {
    /// SPI chip select or I2C slave address, with the per-bus default applied.
    #[must_use]
    pub fn device_address(&self) -> u8 {
        self.device_address.unwrap_or(match self.protocol {
            BusProtocol::Spi => 0,
            BusProtocol::I2c => DEFAULT_I2C_ADDRESS,
        })
    }

    #[must_use]
    pub fn max_transfer_bytes(&self) -> usize {
        self.max_transfer_bytes
            .unwrap_or_else(|| self.protocol.default_max_transfer_bytes())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub host: HostSettings,
    pub dsp: DspSettings,
    pub safety_hash: Option<SafetyHashCell>,
}

impl Settings {
    /// Parse and validate settings from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, SigmaDspError> {
        let settings: Self = toml::from_str(s).map_err(|e| {
            let msg = e.message().to_string();
            match e.span().map(|span| line_col(s, span.start)) {
                Some((line, col)) => {
                    SigmaDspError::Config(format!("settings parse error at {line}:{col}: {msg}"))
                }
                None => SigmaDspError::Config(format!("settings parse error: {msg}")),
            }
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: &Path) -> Result<Self, SigmaDspError> {
        let s = fs::read_to_string(path).map_err(|e| {
            SigmaDspError::Config(format!("read settings {}: {e}", path.display()))
        })?;
        Self::from_str(&s)
    }

    pub fn validate(&self) -> Result<(), SigmaDspError> {
        self.host
            .ip
            .parse::<IpAddr>()
            .map_err(|e| SigmaDspError::Config(format!("invalid host ip '{}': {e}", self.host.ip)))?;
        let max = self.dsp.max_transfer_bytes();
        let min = self.dsp.protocol.header_length() + 4;
        if max < min {
            return Err(SigmaDspError::Config(format!(
                "max_transfer_bytes {max} cannot carry a single word (minimum {min})"
            )));
        }
        if max > TRANSFER_BYTES_CEILING {
            return Err(SigmaDspError::Config(format!(
                "max_transfer_bytes {max} exceeds {TRANSFER_BYTES_CEILING}"
            )));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, SigmaDspError> {
        let ip: IpAddr = self
            .host
            .ip
            .parse()
            .map_err(|e| SigmaDspError::Config(format!("invalid host ip '{}': {e}", self.host.ip)))?;
        Ok(SocketAddr::new(ip, self.host.port))
    }
}

impl std::str::FromStr for Settings {
    type Err = SigmaDspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

/// 1-based line and column of a byte offset in `src`.
fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let before = &src[..offset.min(src.len())];
    let line = before.matches('\n').count() + 1;
    let col = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_settings_use_defaults() {
        let s = Settings::from_str("[dsp]\ntype = \"adau14xx\"\n").unwrap();
        assert_eq!(s.host, HostSettings::default());
        assert_eq!(s.dsp.protocol, BusProtocol::Spi);
        assert!(s.dsp.use_safeload);
        assert_eq!(s.dsp.device_address(), 0);
        assert_eq!(s.dsp.max_transfer_bytes(), MAX_SPI_BYTES);
        assert!(s.safety_hash.is_none());
        assert_eq!(s.listen_addr().unwrap().port(), DEFAULT_PORT);
    }

    #[test]
    fn i2c_defaults_to_adau145x_address() {
        let s = Settings::from_str("[dsp]\ntype = \"adau1701\"\nprotocol = \"i2c\"\nbus_number = 1\n")
            .unwrap();
        assert_eq!(s.dsp.family, ChipFamily::Adau1x0x);
        assert_eq!(s.dsp.device_address(), DEFAULT_I2C_ADDRESS);
        assert_eq!(s.dsp.max_transfer_bytes(), MAX_I2C_BYTES);
    }

    #[test]
    fn parse_error_reports_position() {
        let err = Settings::from_str("[dsp]\ntype = \"adau9999\"\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("adau9999"), "unexpected message: {msg}");
    }

    #[test]
    fn too_small_transfer_size_is_rejected() {
        let err =
            Settings::from_str("[dsp]\ntype = \"adau14xx\"\nmax_transfer_bytes = 6\n").unwrap_err();
        assert!(matches!(err, SigmaDspError::Config(_)));
    }

    #[test]
    fn oversized_transfer_size_is_rejected() {
        let err = Settings::from_str("[dsp]\ntype = \"adau14xx\"\nmax_transfer_bytes = 262147\n")
            .unwrap_err();
        assert!(err.to_string().contains("262147"), "{err}");
        let s = Settings::from_str("[dsp]\ntype = \"adau14xx\"\nmax_transfer_bytes = 65535\n")
            .unwrap();
        assert_eq!(s.dsp.max_transfer_bytes(), TRANSFER_BYTES_CEILING);
    }

    #[test]
    fn line_col_counts_from_one() {
        assert_eq!(line_col("ab\ncd", 4), (2, 2));
        assert_eq!(line_col("ab", 0), (1, 1));
    }
}
