//! ADAU145x/146x: software safeload, 8.24 parameters.

use crate::conversion::{int16_to_bytes, int32_to_bytes};
use crate::dsp::{Dsp, DspCore, FIXPOINT_REGISTER_LENGTH};
use crate::error::SigmaDspError;
use crate::generator::ChipFamily;

pub const RESET_REGISTER: u16 = 0xF890;

pub const SAFELOAD_DATA_REGISTERS: [u16; 5] = [0x6000, 0x6001, 0x6002, 0x6003, 0x6004];
pub const SAFELOAD_ADDRESS_REGISTER: u16 = 0x6005;
pub const SAFELOAD_COUNT_REGISTER: u16 = 0x6006;

pub struct Adau14xx {
    core: DspCore,
}

impl Adau14xx {
    #[must_use]
    pub const fn new(core: DspCore) -> Self {
        Self { core }
    }
}

impl Dsp for Adau14xx {
    fn chip_family(&self) -> ChipFamily {
        ChipFamily::Adau14xx
    }

    fn core(&self) -> &DspCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DspCore {
        &mut self.core
    }

    fn soft_reset(&mut self) {
        log::info!("Soft-resetting the DSP");
        self.write(RESET_REGISTER, &int16_to_bytes(0));
        self.write(RESET_REGISTER, &int16_to_bytes(1));
    }

    /// Stage the words in the data registers, then write the target address
    /// and the word count. The count write starts the transfer.
    fn safeload(&mut self, address: u16, data: &[u8]) -> Result<(), SigmaDspError> {
        let word_count = data.len().div_ceil(FIXPOINT_REGISTER_LENGTH);
        if word_count > SAFELOAD_DATA_REGISTERS.len() {
            return Err(SigmaDspError::SafeloadCapacityExceeded {
                requested: word_count,
                capacity: SAFELOAD_DATA_REGISTERS.len(),
            });
        }

        for (word, register) in data
            .chunks(FIXPOINT_REGISTER_LENGTH)
            .zip(SAFELOAD_DATA_REGISTERS)
        {
            self.write(register, word);
        }

        self.write(SAFELOAD_ADDRESS_REGISTER, &int32_to_bytes(u32::from(address)));
        self.write(SAFELOAD_COUNT_REGISTER, &int32_to_bytes(word_count as u32));
        Ok(())
    }
}
