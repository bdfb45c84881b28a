//! Chip-level register access shared by all SigmaDSP families.
//!
//! A [`Dsp`] owns the bus transport. Family types only supply their
//! safeload sequence and soft reset; parameter encoding, volume control and
//! the safety hash check are provided here.

use std::thread;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use serde::Deserialize;

use crate::adau14xx::Adau14xx;
use crate::adau1x0x::Adau1x0x;
use crate::conversion::{
    bytes_to_int32, clamp, db_to_linear, int32_to_bytes, linear_to_db, FixedPointFormat,
};
use crate::error::SigmaDspError;
use crate::generator::ChipFamily;
use crate::transport::RegisterTransport;

/// Parameter registers are four bytes long.
pub const FIXPOINT_REGISTER_LENGTH: usize = 4;

/// How a parameter register should be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterFormat {
    Float,
    Int,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterValue {
    Float(f64),
    Int(u32),
}

/// Register that holds the hash of the loaded program, and the value the
/// parameter file says it must contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct SafetyHashCell {
    pub address: u16,
    pub value: u32,
}

/// The DSP reset input.
pub trait ResetLine: Send {
    fn assert_reset(&mut self) -> Result<(), SigmaDspError>;
    fn release_reset(&mut self) -> Result<(), SigmaDspError>;
}

impl<P> ResetLine for P
where
    P: OutputPin + Send,
{
    fn assert_reset(&mut self) -> Result<(), SigmaDspError> {
        self.set_high()
            .map_err(|e| SigmaDspError::Bus(format!("reset line: {e:?}")))
    }

    fn release_reset(&mut self) -> Result<(), SigmaDspError> {
        self.set_low()
            .map_err(|e| SigmaDspError::Bus(format!("reset line: {e:?}")))
    }
}

/// State every family shares: the transport, the safeload preference and an
/// optional reset line.
pub struct DspCore {
    transport: Box<dyn RegisterTransport>,
    use_safeload: bool,
    reset_line: Option<Box<dyn ResetLine>>,
}

impl DspCore {
    #[must_use]
    pub fn new(transport: Box<dyn RegisterTransport>, use_safeload: bool) -> Self {
        Self {
            transport,
            use_safeload,
            reset_line: None,
        }
    }

    #[must_use]
    pub fn with_reset_line(mut self, line: Box<dyn ResetLine>) -> Self {
        self.reset_line = Some(line);
        self
    }

    #[must_use]
    pub const fn use_safeload(&self) -> bool {
        self.use_safeload
    }

    #[must_use]
    pub fn has_reset_line(&self) -> bool {
        self.reset_line.is_some()
    }
}

/// Build the DSP implementation for a chip family.
#[must_use]
pub fn new_dsp(family: ChipFamily, core: DspCore) -> Box<dyn Dsp> {
    match family {
        ChipFamily::Adau14xx => Box::new(Adau14xx::new(core)),
        ChipFamily::Adau1x0x => Box::new(Adau1x0x::new(core)),
    }
}

pub trait Dsp: Send {
    fn chip_family(&self) -> ChipFamily;

    fn core(&self) -> &DspCore;

    fn core_mut(&mut self) -> &mut DspCore;

    /// Commit up to the chip's staging capacity of words atomically.
    /// Fails before touching the bus when `data` holds too many words.
    fn safeload(&mut self, address: u16, data: &[u8]) -> Result<(), SigmaDspError>;

    fn soft_reset(&mut self);

    fn fixed_point(&self) -> FixedPointFormat {
        self.chip_family().fixed_point()
    }

    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>, SigmaDspError> {
        self.core_mut().transport.read(address, length)
    }

    fn write(&mut self, address: u16, data: &[u8]) {
        self.core_mut().transport.write(address, data);
    }

    fn get_parameter_value(
        &mut self,
        address: u16,
        format: ParameterFormat,
    ) -> Result<ParameterValue, SigmaDspError> {
        let register = self.read(address, FIXPOINT_REGISTER_LENGTH)?;
        let word = bytes_to_int32(&register)?;
        match format {
            ParameterFormat::Int => Ok(ParameterValue::Int(word)),
            ParameterFormat::Float => {
                let fixed_point = self.fixed_point();
                let value = fixed_point.frac_to_float(fixed_point.sign_extend(word))?;
                Ok(ParameterValue::Float(value))
            }
        }
    }

    /// Encode a parameter into one register word and write it, through
    /// safeload when the instance is configured for it.
    fn set_parameter_value(
        &mut self,
        value: ParameterValue,
        address: u16,
    ) -> Result<(), SigmaDspError> {
        let word = match value {
            ParameterValue::Float(v) => self.fixed_point().float_to_frac(v)? as u32,
            ParameterValue::Int(v) => v,
        };
        let register = int32_to_bytes(word);
        if self.core().use_safeload {
            self.safeload(address, &register)
        } else {
            self.write(address, &register);
            Ok(())
        }
    }

    /// Linear gain stored at `address`, read as a float parameter.
    fn get_linear(&mut self, address: u16) -> Result<f64, SigmaDspError> {
        match self.get_parameter_value(address, ParameterFormat::Float)? {
            ParameterValue::Float(v) => Ok(v),
            ParameterValue::Int(v) => Ok(f64::from(v)),
        }
    }

    /// Set (or, with `relative`, shift) the gain at `address` in dB.
    ///
    /// The gain is clamped to `[0, 1]` linear. Returns the level read back
    /// from the chip, which differs from the request by quantization and
    /// clamping. Requests that cannot be represented leave the register
    /// unchanged and return the current level.
    fn set_volume(&mut self, volume_db: f64, address: u16, relative: bool) -> Result<f64, SigmaDspError> {
        let current_db = linear_to_db(self.get_linear(address)?);
        if volume_db.is_nan() {
            log::info!("Volume value is NaN, keeping {current_db:.2} dB");
            return Ok(current_db);
        }

        let target_db = if relative { current_db + volume_db } else { volume_db };
        let linear = db_to_linear(target_db);
        if !linear.is_finite() {
            log::info!("Volume adjustment was too large, ignoring");
            return Ok(current_db);
        }
        let linear = clamp(linear, 0.0, 1.0);

        match self.set_parameter_value(ParameterValue::Float(linear), address) {
            Ok(()) => {}
            Err(SigmaDspError::FixedPointOverflow { .. }) => return Ok(current_db),
            Err(e) => return Err(e),
        }
        log::info!("Set volume to {:.2} dB", linear_to_db(linear));

        Ok(linear_to_db(self.get_linear(address)?))
    }

    fn adjust_volume(&mut self, adjustment_db: f64, address: u16) -> Result<f64, SigmaDspError> {
        self.set_volume(adjustment_db, address, true)
    }

    /// Pulse the reset line for `hold`, then soft reset to flush registers.
    fn hard_reset(&mut self, hold: Duration) -> Result<(), SigmaDspError> {
        match self.core_mut().reset_line.as_mut() {
            Some(line) => {
                log::info!("Hard-resetting the DSP");
                line.assert_reset()?;
                thread::sleep(hold);
                line.release_reset()?;
            }
            None => log::warn!("No hard-reset line is defined, not resetting"),
        }
        self.soft_reset();
        Ok(())
    }

    /// Compare the hash register against the expected value. A missing cell
    /// or a mismatch yields `Ok(false)`; bus errors are returned.
    fn check_safety_hash(&mut self, cell: Option<&SafetyHashCell>) -> Result<bool, SigmaDspError> {
        let Some(cell) = cell else {
            log::warn!("No safety hash cell is configured, configuration remains locked");
            return Ok(false);
        };
        let dsp_hash = match self.get_parameter_value(cell.address, ParameterFormat::Int)? {
            ParameterValue::Int(v) => v,
            ParameterValue::Float(_) => return Ok(false),
        };
        log::info!("Safety hash address: 0x{:04X}", cell.address);
        if dsp_hash == cell.value {
            log::info!("Safety check successful, configuration unlocked");
            Ok(true)
        } else {
            log::warn!(
                "Safety hash mismatch: expected {}, read {dsp_hash}; configuration remains locked",
                cell.value
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_transport::{MemoryTransport, TransportOp};
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    fn dsp(family: ChipFamily, use_safeload: bool) -> (Box<dyn Dsp>, MemoryTransport) {
        let bus = MemoryTransport::new();
        let core = DspCore::new(Box::new(bus.clone()), use_safeload);
        (new_dsp(family, core), bus)
    }

    #[derive(Clone, Default)]
    struct RecordingPin(Arc<Mutex<Vec<bool>>>);
    impl embedded_hal::digital::ErrorType for RecordingPin {
        type Error = Infallible;
    }
    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.lock().unwrap().push(false);
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.lock().unwrap().push(true);
            Ok(())
        }
    }

    #[test]
    fn float_parameter_is_encoded_per_family() {
        let (mut a, bus_a) = dsp(ChipFamily::Adau14xx, false);
        a.set_parameter_value(ParameterValue::Float(0.5), 0x0040).unwrap();
        assert_eq!(bus_a.register(0x0040), Some(vec![0x00, 0x80, 0x00, 0x00]));

        let (mut b, bus_b) = dsp(ChipFamily::Adau1x0x, false);
        b.set_parameter_value(ParameterValue::Float(0.5), 0x0040).unwrap();
        assert_eq!(bus_b.register(0x0040), Some(vec![0x00, 0x40, 0x00, 0x00]));
    }

    #[test]
    fn negative_parameter_reads_back() {
        let (mut b, _bus) = dsp(ChipFamily::Adau1x0x, false);
        b.set_parameter_value(ParameterValue::Float(-0.25), 0x0010).unwrap();
        assert_eq!(
            b.get_parameter_value(0x0010, ParameterFormat::Float).unwrap(),
            ParameterValue::Float(-0.25)
        );
    }

    #[test]
    fn parameter_goes_through_safeload_when_configured() {
        let (mut a, bus) = dsp(ChipFamily::Adau14xx, true);
        a.set_parameter_value(ParameterValue::Int(7), 0x1234).unwrap();
        assert!(bus.writes().iter().all(|(addr, _)| *addr != 0x1234));
        assert_eq!(bus.register(0x6005), Some(vec![0, 0, 0x12, 0x34]));
    }

    #[test]
    fn volume_is_clamped_to_unity() {
        let (mut a, bus) = dsp(ChipFamily::Adau14xx, false);
        bus.set_register(0x0100, &[0x00, 0x80, 0x00, 0x00]);
        let db = a.set_volume(12.0, 0x0100, false).unwrap();
        assert_eq!(db, 0.0);
        assert_eq!(bus.register(0x0100), Some(vec![0x01, 0x00, 0x00, 0x00]));
    }

    #[test]
    fn nan_volume_keeps_current_level() {
        let (mut a, bus) = dsp(ChipFamily::Adau14xx, false);
        bus.set_register(0x0100, &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(a.set_volume(f64::NAN, 0x0100, false).unwrap(), 0.0);
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn huge_adjustment_is_ignored() {
        let (mut a, bus) = dsp(ChipFamily::Adau14xx, false);
        bus.set_register(0x0100, &[0x00, 0x80, 0x00, 0x00]);
        let before = a.adjust_volume(1.0e6, 0x0100).unwrap();
        assert!((before - linear_to_db(0.5)).abs() < 1e-9);
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn hard_reset_pulses_line_then_soft_resets() {
        let pin = RecordingPin::default();
        let bus = MemoryTransport::new();
        let core = DspCore::new(Box::new(bus.clone()), false).with_reset_line(Box::new(pin.clone()));
        let mut a = new_dsp(ChipFamily::Adau14xx, core);
        a.hard_reset(Duration::from_millis(1)).unwrap();
        assert_eq!(*pin.0.lock().unwrap(), vec![true, false]);
        assert_eq!(
            bus.writes(),
            vec![(0xF890, vec![0, 0]), (0xF890, vec![0, 1])]
        );
    }

    #[test]
    fn safety_hash() {
        let (mut a, bus) = dsp(ChipFamily::Adau14xx, false);
        let cell = SafetyHashCell {
            address: 0x2000,
            value: 0xCAFE_F00D,
        };
        assert!(!a.check_safety_hash(None).unwrap());
        assert!(!a.check_safety_hash(Some(&cell)).unwrap());
        bus.set_register(0x2000, &[0xCA, 0xFE, 0xF0, 0x0D]);
        assert!(a.check_safety_hash(Some(&cell)).unwrap());
        assert_eq!(
            bus.ops().last(),
            Some(&TransportOp::Read {
                address: 0x2000,
                length: FIXPOINT_REGISTER_LENGTH
            })
        );
        bus.fail_reads(true);
        assert!(a.check_safety_hash(Some(&cell)).is_err());
    }
}
