#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::cast_possible_truncation,
    clippy::too_long_first_doc_paragraph
)]

//! sigmadsp
//!
//! Bridges SigmaStudio's TCP protocol to Analog Devices SigmaDSP chips
//! attached over SPI or I2C.
//!
//! Main pieces:
//! - SigmaStudio packet headers for the ADAU14xx and ADAU1x0x families
//!   (`header`, `generator`, `packet`)
//! - the TCP session that decodes requests and answers reads (`server`)
//! - chunked register transports over `embedded-hal` buses (`spi`, `i2c`)
//! - chip access with safeload, volume control and the safety hash
//!   check (`dsp`, `adau14xx`, `adau1x0x`)
//! - the worker thread that owns the bus (`backend`)
//!
//! ```no_run
//! use sigmadsp::{new_dsp, ChipFamily, DspCore, DspWorker, MemoryTransport, SigmaStudioServer};
//! # async fn demo() -> Result<(), sigmadsp::SigmaDspError> {
//! let dsp = new_dsp(ChipFamily::Adau14xx, DspCore::new(Box::new(MemoryTransport::new()), true));
//! let (handle, _worker) = DspWorker::spawn_default(dsp)?;
//! SigmaStudioServer::new(handle).run("0.0.0.0:8087").await?;
//! # Ok(())
//! # }
//! ```

pub mod adau14xx;
pub mod adau1x0x;
pub mod backend;
pub mod config;
pub mod conversion;
pub mod dsp;
pub mod error;
pub mod generator;
pub mod header;
pub mod i2c;
pub mod memory_transport;
pub mod packet;
pub mod request;
pub mod server;
pub mod settings;
pub mod spi;
pub mod transport;

pub use backend::{DspHandle, DspWorker, RetryPolicy, SafetyGate};
pub use dsp::{new_dsp, Dsp, DspCore, ParameterFormat, ParameterValue, SafetyHashCell};
pub use error::SigmaDspError;
pub use generator::ChipFamily;
pub use memory_transport::MemoryTransport;
pub use server::SigmaStudioServer;
pub use settings::Settings;
pub use transport::RegisterTransport;
