//! Acquisition orchestration for 8-channel data loggers: channel configuration,
//! calibration correction, sampling-rate measurement, streaming CSV export and
//! interactive calibration. The device itself sits behind [`device::Device`].

pub mod args;
pub mod calibration;
pub mod cancel;
pub mod capture;
pub mod channels;
pub mod device;
pub mod error;
pub mod exfil;
pub mod monitoring;
pub mod recorder;
pub mod sim;

pub use error::{Error, Result};

/// Physical input channels on the logger
pub const CHANNELS: usize = 8;
/// Raw rows averaged for one calibration measurement
pub const CALIBRATION_SAMPLES: usize = 512;
/// Horizontal time base handed to the driver
pub const NS_PER_DIV: u64 = 1_000_000;
pub const DEFAULT_SAMPLING_RATE: u32 = 440;
/// Sampling rates the logger supports in roll mode, in Hz
pub const ROLL_SAMPLING_RATES: [u32; 9] = [1, 2, 5, 11, 22, 44, 88, 220, 440];
/// Seconds spent measuring the achieved sampling rate
pub const RATE_MEASUREMENT_SECS: f64 = 10.0;
