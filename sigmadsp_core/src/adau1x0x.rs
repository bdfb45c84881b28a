//! ADAU1701/ADAU1401: hardware safeload, 5.23 parameters.

use crate::conversion::{bytes_to_int16, int16_to_bytes};
use crate::dsp::{Dsp, DspCore, FIXPOINT_REGISTER_LENGTH};
use crate::error::SigmaDspError;
use crate::generator::ChipFamily;

pub const CORE_CONTROL_REGISTER: u16 = 0x081C;
pub const CORE_CONTROL_REGISTER_LENGTH: usize = 2;
/// Initiate-safeload-transfer bit of the core control register.
pub const CORE_CONTROL_IST_MASK: u16 = 1 << 5;

/// `(address register, data register)` pairs of the safeload slots.
pub const SAFELOAD_REGISTERS: [(u16, u16); 5] = [
    (0x0815, 0x0810),
    (0x0816, 0x0811),
    (0x0817, 0x0812),
    (0x0818, 0x0813),
    (0x0819, 0x0814),
];

/// Data slots are 40 bits wide; parameters occupy the low 32.
pub const SAFELOAD_DATA_REGISTER_LENGTH: usize = 5;

pub struct Adau1x0x {
    core: DspCore,
}

impl Adau1x0x {
    #[must_use]
    pub const fn new(core: DspCore) -> Self {
        Self { core }
    }
}

impl Dsp for Adau1x0x {
    fn chip_family(&self) -> ChipFamily {
        ChipFamily::Adau1x0x
    }

    fn core(&self) -> &DspCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DspCore {
        &mut self.core
    }

    fn soft_reset(&mut self) {
        log::info!("Soft reset is not available on ADAU1x0x");
    }

    /// Fill one slot per word with its target address and data, then set
    /// the IST bit in the core control register.
    fn safeload(&mut self, address: u16, data: &[u8]) -> Result<(), SigmaDspError> {
        let word_count = data.len().div_ceil(FIXPOINT_REGISTER_LENGTH);
        if word_count > SAFELOAD_REGISTERS.len() {
            return Err(SigmaDspError::SafeloadCapacityExceeded {
                requested: word_count,
                capacity: SAFELOAD_REGISTERS.len(),
            });
        }

        for (index, (word, (address_register, data_register))) in data
            .chunks(FIXPOINT_REGISTER_LENGTH)
            .zip(SAFELOAD_REGISTERS)
            .enumerate()
        {
            let mut slot = [0u8; SAFELOAD_DATA_REGISTER_LENGTH];
            slot[1..=word.len()].copy_from_slice(word);
            let target = address.wrapping_add(index as u16);
            self.write(address_register, &int16_to_bytes(target));
            self.write(data_register, &slot);
        }

        let control = self.read(CORE_CONTROL_REGISTER, CORE_CONTROL_REGISTER_LENGTH)?;
        let control = bytes_to_int16(&control)? | CORE_CONTROL_IST_MASK;
        self.write(CORE_CONTROL_REGISTER, &int16_to_bytes(control));
        Ok(())
    }
}
