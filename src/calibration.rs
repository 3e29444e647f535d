//! Calibration records and the correction table built from them.
//!
//! A calibration file is a JSON object keyed by zero-based channel id, each
//! holding the list of measurements taken for that channel:
//!
//! ```text
//! {"0": [{"test_voltage": 5.0, "measured_value": 510.0, "vscale": 1.0, "zero_offset": 10.0}], "1": []}
//! ```

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{device::VScale, error::CalibrationDataError, CHANNELS};

/// Raw units are scaled by this before the vscale is applied
const UNITS_TO_VOLTS: f64 = 0.01;

/// One observation of a known test voltage on one channel
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub test_voltage: f64,
    pub measured_value: f64,
    pub vscale: VScale,
    pub zero_offset: f64,
}

impl CalibrationRecord {
    /// Measured value with the baseline removed
    pub fn units(&self) -> f64 {
        self.measured_value - self.zero_offset
    }

    /// Factor turning `units` into `test_voltage`
    pub fn correction_factor(&self, channel: usize) -> Result<f64, CalibrationDataError> {
        let units = self.units();
        if units == 0.0 || !units.is_finite() {
            return Err(CalibrationDataError::DegenerateRecord {
                channel,
                reason: format!("measured value equals zero offset ({})", self.zero_offset),
            });
        }
        let factor = self.test_voltage / (units * UNITS_TO_VOLTS * self.vscale.factor());
        if !factor.is_finite() {
            return Err(CalibrationDataError::DegenerateRecord {
                channel,
                reason: format!("non-finite correction factor {}", factor),
            });
        }
        Ok(factor)
    }
}

/// Contents of a calibration file, keyed by zero-based channel id
pub type CalibrationData = BTreeMap<usize, Vec<CalibrationRecord>>;

fn check_path(path: &Path) -> Result<(), CalibrationDataError> {
    if !path.exists() {
        return Err(CalibrationDataError::Missing(path.to_owned()));
    }
    if path.is_dir() {
        return Err(CalibrationDataError::IsDirectory(path.to_owned()));
    }
    Ok(())
}

/// Parse a calibration file, skipping (and logging) entries that are not records
pub fn read_calibration_file(path: &Path) -> Result<CalibrationData, CalibrationDataError> {
    check_path(path)?;
    let reader = BufReader::new(File::open(path)?);
    let loose: BTreeMap<usize, Vec<serde_json::Value>> = serde_json::from_reader(reader)?;
    let mut data = CalibrationData::new();
    for (channel, entries) in loose {
        let records = data.entry(channel).or_default();
        for entry in entries {
            match serde_json::from_value::<CalibrationRecord>(entry.clone()) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed record {} of channel {}: {}", entry, channel + 1, e),
            }
        }
    }
    Ok(data)
}

/// Serialize calibration data (grouped by channel id) to `path`, replacing its contents
pub fn write_calibration_file(path: &Path, data: &CalibrationData) -> Result<(), CalibrationDataError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, data)?;
    writer.flush()?;
    Ok(())
}

/// `channel -> vscale -> raw units -> correction factor`
///
/// Lookups by [`CorrectionTable::lookup`] are literal: a factor is only found for the
/// exact raw-unit value it was measured at. [`CorrectionTable::nearest`] falls back to the
/// closest stored raw-unit key instead.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrectionTable {
    // Per vscale, (units, factor) pairs kept sorted by units
    channels: [BTreeMap<VScale, Vec<(f64, f64)>>; CHANNELS],
}

impl CorrectionTable {
    /// Build the table from every usable record; degenerate records are logged and skipped
    pub fn from_calibration(data: &CalibrationData) -> Self {
        let mut table = Self::default();
        for (&channel, records) in data {
            if records.is_empty() {
                continue;
            }
            if channel >= CHANNELS {
                warn!("{}", CalibrationDataError::UnknownChannel(channel));
                continue;
            }
            info!("  Channel {}:", channel + 1);
            for record in records {
                match record.correction_factor(channel) {
                    Ok(factor) => {
                        info!("    {:?} -> {}", record, factor);
                        table.insert(channel, record.vscale, record.units(), factor);
                    }
                    Err(e) => warn!("    Skipping {:?}: {}", record, e),
                }
            }
        }
        let uncovered = table.uncovered_channels();
        if !uncovered.is_empty() {
            let listed: Vec<_> = uncovered.iter().map(|c| c + 1).collect();
            warn!("There is no calibration data for channel(s): {:?}", listed);
        }
        table
    }

    /// Read a calibration file and build its table
    pub fn load(path: &Path) -> Result<Self, CalibrationDataError> {
        let data = read_calibration_file(path)?;
        info!(
            "Using calibration data from file '{}' to correct measured values",
            path.display()
        );
        Ok(Self::from_calibration(&data))
    }

    /// Store a factor; a later factor for the same units replaces the earlier one
    pub fn insert(&mut self, channel: usize, vscale: VScale, units: f64, factor: f64) {
        let points = self.channels[channel].entry(vscale).or_default();
        match points.binary_search_by(|(u, _)| u.total_cmp(&units)) {
            Ok(i) => points[i].1 = factor,
            Err(i) => points.insert(i, (units, factor)),
        }
    }

    /// Exact-match lookup, no interpolation between stored raw-unit keys
    pub fn lookup(&self, channel: usize, vscale: VScale, units: f64) -> Option<f64> {
        let points = self.channels.get(channel)?.get(&vscale)?;
        points
            .binary_search_by(|(u, _)| u.total_cmp(&units))
            .ok()
            .map(|i| points[i].1)
    }

    /// Factor of the stored raw-unit key closest to `units`
    pub fn nearest(&self, channel: usize, vscale: VScale, units: f64) -> Option<f64> {
        self.channels
            .get(channel)?
            .get(&vscale)?
            .iter()
            .min_by(|a, b| (a.0 - units).abs().total_cmp(&(b.0 - units).abs()))
            .map(|&(_, factor)| factor)
    }

    /// Zero-based channels without any calibration entry
    pub fn uncovered_channels(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, scales)| scales.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(BTreeMap::is_empty)
    }
}
