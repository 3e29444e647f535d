//! The driver collaborator as seen by the acquisition pipeline.
//!
//! Anything that can connect to an 8-channel logger and hand back sample batches
//! implements [`Device`]. The wire protocol lives behind this trait; the rest of
//! the crate only pulls batches, pauses and closes.

use std::{
    collections::BTreeMap,
    fmt,
    ops::{Deref, DerefMut},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    calibration::CorrectionTable,
    error::{ConfigurationError, DeviceError},
    CHANNELS,
};

/// Column-major sample data: one sequence per column, all of equal length
pub type Batch = Vec<Vec<f64>>;

/// Lazy, potentially endless sequence of roll mode batches
pub type BatchStream<'a> = Box<dyn Iterator<Item = Result<Batch, DeviceError>> + 'a>;

/// Lazy sequence of single time-aligned rows
pub type RowStream<'a> = Box<dyn Iterator<Item = Result<Vec<f64>, DeviceError>> + 'a>;

/// Hardware pre-scale applied to a channel before digitization
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum VScale {
    Fiftieth,
    Eighth,
    #[default]
    One,
}

impl VScale {
    pub const ALL: [VScale; 3] = [VScale::Fiftieth, VScale::Eighth, VScale::One];

    pub fn factor(self) -> f64 {
        match self {
            VScale::Fiftieth => 0.02,
            VScale::Eighth => 0.125,
            VScale::One => 1.0,
        }
    }
}

impl TryFrom<f64> for VScale {
    type Error = ConfigurationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        VScale::ALL
            .into_iter()
            .find(|vs| vs.factor() == value)
            .ok_or(ConfigurationError::InvalidVScale(value))
    }
}

impl From<VScale> for f64 {
    fn from(vs: VScale) -> Self {
        vs.factor()
    }
}

impl FromStr for VScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
        VScale::try_from(value).map_err(|e| e.to_string())
    }
}

impl fmt::Display for VScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Always keep a decimal point so the header reads like the float it is
        f.pad(match self {
            VScale::Fiftieth => "0.02",
            VScale::Eighth => "0.125",
            VScale::One => "1.0",
        })
    }
}

/// What kind of values the device should deliver
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SampleMode {
    Raw,
    #[default]
    Volt,
    /// Volt columns for all channels followed by the raw columns for all channels
    VoltRaw,
}

impl SampleMode {
    pub fn produces_volts(self) -> bool {
        !matches!(self, SampleMode::Raw)
    }

    /// Number of columns in a batch delivered in this mode
    pub fn columns(self) -> usize {
        match self {
            SampleMode::VoltRaw => 2 * CHANNELS,
            _ => CHANNELS,
        }
    }
}

impl FromStr for SampleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(SampleMode::Raw),
            "volt" => Ok(SampleMode::Volt),
            "volt+raw" => Ok(SampleMode::VoltRaw),
            _ => Err(format!("'{}' is not one of raw, volt, volt+raw", s)),
        }
    }
}

/// Which streaming variant of the device feeds the exporter
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StreamMode {
    /// Continuous single-stream acquisition
    Roll { sampling_rate: u32 },
    /// Double-buffered acquisition, two batches per request
    Normal,
}

/// Everything a driver needs at construction time
#[derive(Clone, Debug)]
pub struct DeviceSettings {
    pub ns_per_div: u64,
    pub vertical_scale: [VScale; CHANNELS],
    pub correction: CorrectionTable,
    /// Zero-based index of the channel that tracks baseline drift
    pub zero_offset_compensation_channel: Option<usize>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            ns_per_div: crate::NS_PER_DIV,
            vertical_scale: [VScale::One; CHANNELS],
            correction: CorrectionTable::default(),
            zero_offset_compensation_channel: None,
        }
    }
}

pub trait Device {
    fn connect(&mut self) -> Result<(), DeviceError>;
    fn init(&mut self) -> Result<(), DeviceError>;
    /// Release the device. Must tolerate being called on an unconnected or closed device.
    fn close(&mut self);

    fn pause(&mut self) -> Result<(), DeviceError>;
    fn cancel_pause(&mut self) -> Result<(), DeviceError>;

    fn vscales(&self) -> [VScale; CHANNELS];
    /// Current zero offset (in raw units) of a zero-based channel
    fn zero_offset(&self, channel: usize) -> f64;
    /// Zero offsets of all channels for every known vscale
    fn calibration_data(&self) -> BTreeMap<VScale, [f64; CHANNELS]>;

    fn roll_batches(
        &mut self,
        mode: SampleMode,
        sampling_rate: u32,
    ) -> Result<BatchStream<'_>, DeviceError>;
    fn roll_rows(&mut self, mode: SampleMode) -> Result<RowStream<'_>, DeviceError>;
    fn normal_batches(&mut self) -> Result<(Batch, Batch), DeviceError>;
}

/// Exclusive handle on a device for one session; closes it exactly once when dropped
pub struct DeviceGuard<'a, D: Device + ?Sized> {
    device: &'a mut D,
}

impl<'a, D: Device + ?Sized> DeviceGuard<'a, D> {
    pub fn new(device: &'a mut D) -> Self {
        Self { device }
    }
}

impl<D: Device + ?Sized> Deref for DeviceGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: Device + ?Sized> DerefMut for DeviceGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: Device + ?Sized> Drop for DeviceGuard<'_, D> {
    fn drop(&mut self) {
        debug!("Closing device");
        self.device.close();
    }
}
