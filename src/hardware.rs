//! Linux bus drivers for the DSP: spidev, i2c-dev and a sysfs reset GPIO.

use anyhow::{anyhow, Context, Result};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{I2cdev, SpidevDevice, SysfsPin};
use tracing::info;

use sigmadsp::dsp::ResetLine;
use sigmadsp::i2c::I2cTransport;
use sigmadsp::settings::{BusProtocol, DspSettings};
use sigmadsp::spi::SpiTransport;
use sigmadsp::RegisterTransport;

/// SigmaDSP parts accept up to 20 MHz.
const SPI_SPEED_HZ: u32 = 16_000_000;

pub fn open_transport(dsp: &DspSettings) -> Result<Box<dyn RegisterTransport>> {
    match dsp.protocol {
        BusProtocol::Spi => {
            let path = format!("/dev/spidev{}.{}", dsp.bus_number, dsp.device_address());
            let mut spi =
                SpidevDevice::open(&path).map_err(|e| anyhow!("open {path}: {e:?}"))?;
            let options = SpidevOptions::new()
                .bits_per_word(8)
                .max_speed_hz(SPI_SPEED_HZ)
                .mode(SpiModeFlags::SPI_MODE_0)
                .build();
            spi.configure(&options)
                .with_context(|| format!("configure {path}"))?;
            info!(%path, max_bytes = dsp.max_transfer_bytes(), "using SPI");
            Ok(Box::new(SpiTransport::with_max_transfer_bytes(
                spi,
                dsp.max_transfer_bytes(),
            )))
        }
        BusProtocol::I2c => {
            let path = format!("/dev/i2c-{}", dsp.bus_number);
            let i2c = I2cdev::new(&path).map_err(|e| anyhow!("open {path}: {e:?}"))?;
            info!(%path, address = dsp.device_address(), "using I2C");
            Ok(Box::new(I2cTransport::with_max_transfer_bytes(
                i2c,
                dsp.device_address(),
                dsp.max_transfer_bytes(),
            )))
        }
    }
}

/// Export the reset GPIO and drive it inactive.
pub fn open_reset_line(pin_number: u64) -> Result<Box<dyn ResetLine>> {
    let pin = SysfsPin::new(pin_number);
    pin.export()
        .map_err(|e| anyhow!("export reset gpio {pin_number}: {e:?}"))?;
    pin.set_direction(Direction::Low)
        .map_err(|e| anyhow!("set direction of reset gpio {pin_number}: {e:?}"))?;
    info!(pin = pin_number, "reset line ready");
    Ok(Box::new(pin))
}
