//! A software stand-in for the logger hardware.
//!
//! Every channel reads a fixed baseline (its zero offset), a slow common drift and a
//! sine test signal. The zero-offset compensation channel only sees baseline and
//! drift, which is exactly what compensation removes from the other channels.

use std::{collections::BTreeMap, f64::consts::TAU, thread::sleep, time::Duration};

use tracing::debug;

use crate::{
    device::{Batch, BatchStream, Device, DeviceSettings, RowStream, SampleMode, VScale},
    error::DeviceError,
    CHANNELS, DEFAULT_SAMPLING_RATE,
};

const SIGNAL_AMPLITUDE: f64 = 120.0;
const SIGNAL_PERIOD: f64 = 400.0;
const DRIFT_AMPLITUDE: f64 = 3.0;
const DRIFT_PERIOD: f64 = 20_000.0;
const NORMAL_MODE_ROWS: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Disconnected,
    Connected,
    Ready,
    Closed,
}

#[derive(Debug)]
pub struct SimulatedDevice {
    settings: DeviceSettings,
    state: State,
    paused: bool,
    pace: bool,
    sample: u64,
}

impl SimulatedDevice {
    pub fn new(settings: DeviceSettings) -> Self {
        Self {
            settings,
            state: State::Disconnected,
            paused: false,
            pace: true,
            sample: 0,
        }
    }

    /// Deliver samples as fast as they are pulled instead of at the requested rate
    pub fn without_pacing(mut self) -> Self {
        self.pace = false;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    fn baseline(channel: usize, vscale: VScale) -> f64 {
        let scale_shift = match vscale {
            VScale::Fiftieth => 0.0,
            VScale::Eighth => 3.0,
            VScale::One => 7.0,
        };
        2048.0 + 5.0 * channel as f64 + scale_shift
    }

    fn ready(&self) -> Result<(), DeviceError> {
        match self.state {
            State::Ready if self.paused => Err(DeviceError::Paused),
            State::Ready => Ok(()),
            State::Closed => Err(DeviceError::Closed),
            _ => Err(DeviceError::Other("device is not initialised".to_owned())),
        }
    }

    fn raw_row(&self, n: u64) -> [f64; CHANNELS] {
        let drift = DRIFT_AMPLITUDE * (TAU * n as f64 / DRIFT_PERIOD).sin();
        let mut row = [0.0; CHANNELS];
        for (ch, value) in row.iter_mut().enumerate() {
            let signal = if Some(ch) == self.settings.zero_offset_compensation_channel {
                0.0
            } else {
                SIGNAL_AMPLITUDE * (TAU * n as f64 / SIGNAL_PERIOD + ch as f64).sin()
            };
            *value = (self.zero_offset(ch) + drift + signal).round();
        }
        row
    }

    fn to_volts(&self, raw: &[f64; CHANNELS]) -> [f64; CHANNELS] {
        let shift = self
            .settings
            .zero_offset_compensation_channel
            .map_or(0.0, |zos| raw[zos] - self.zero_offset(zos));
        let mut volts = [0.0; CHANNELS];
        for (ch, value) in volts.iter_mut().enumerate() {
            let vscale = self.settings.vertical_scale[ch];
            let units = raw[ch] - self.zero_offset(ch) - shift;
            let table = &self.settings.correction;
            let factor = table
                .lookup(ch, vscale, units)
                .or_else(|| table.nearest(ch, vscale, units))
                .unwrap_or(1.0);
            *value = units * 0.01 * vscale.factor() * factor;
        }
        volts
    }

    fn next_row(&mut self, mode: SampleMode) -> Vec<f64> {
        let raw = self.raw_row(self.sample);
        self.sample += 1;
        match mode {
            SampleMode::Raw => raw.to_vec(),
            SampleMode::Volt => self.to_volts(&raw).to_vec(),
            SampleMode::VoltRaw => {
                let mut row = self.to_volts(&raw).to_vec();
                row.extend_from_slice(&raw);
                row
            }
        }
    }

    fn next_batch(&mut self, mode: SampleMode, rows: usize) -> Batch {
        let mut batch = vec![Vec::with_capacity(rows); mode.columns()];
        for _ in 0..rows {
            for (column, value) in batch.iter_mut().zip(self.next_row(mode)) {
                column.push(value);
            }
        }
        batch
    }

    fn wait(&self, rows: usize, sampling_rate: u32) {
        if self.pace {
            sleep(Duration::from_secs_f64(rows as f64 / sampling_rate.max(1) as f64));
        }
    }
}

impl Device for SimulatedDevice {
    fn connect(&mut self) -> Result<(), DeviceError> {
        match self.state {
            State::Closed => Err(DeviceError::Connect("device was closed".to_owned())),
            _ => {
                self.state = State::Connected;
                Ok(())
            }
        }
    }

    fn init(&mut self) -> Result<(), DeviceError> {
        match self.state {
            State::Connected | State::Ready => {
                debug!("Simulated device at {} ns/div", self.settings.ns_per_div);
                self.state = State::Ready;
                Ok(())
            }
            _ => Err(DeviceError::Init("device is not connected".to_owned())),
        }
    }

    fn close(&mut self) {
        self.state = State::Closed;
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        self.paused = true;
        Ok(())
    }

    fn cancel_pause(&mut self) -> Result<(), DeviceError> {
        self.paused = false;
        Ok(())
    }

    fn vscales(&self) -> [VScale; CHANNELS] {
        self.settings.vertical_scale
    }

    fn zero_offset(&self, channel: usize) -> f64 {
        Self::baseline(channel, self.settings.vertical_scale[channel])
    }

    fn calibration_data(&self) -> BTreeMap<VScale, [f64; CHANNELS]> {
        VScale::ALL
            .into_iter()
            .map(|vs| {
                let mut offsets = [0.0; CHANNELS];
                for (ch, offset) in offsets.iter_mut().enumerate() {
                    *offset = Self::baseline(ch, vs);
                }
                (vs, offsets)
            })
            .collect()
    }

    fn roll_batches(
        &mut self,
        mode: SampleMode,
        sampling_rate: u32,
    ) -> Result<BatchStream<'_>, DeviceError> {
        self.ready()?;
        let rows = (sampling_rate as usize / 10).clamp(1, 64);
        Ok(Box::new(std::iter::from_fn(move || {
            if let Err(e) = self.ready() {
                return Some(Err(e));
            }
            self.wait(rows, sampling_rate);
            Some(Ok(self.next_batch(mode, rows)))
        })))
    }

    fn roll_rows(&mut self, mode: SampleMode) -> Result<RowStream<'_>, DeviceError> {
        self.ready()?;
        Ok(Box::new(std::iter::from_fn(move || {
            if let Err(e) = self.ready() {
                return Some(Err(e));
            }
            self.wait(1, DEFAULT_SAMPLING_RATE);
            Some(Ok(self.next_row(mode)))
        })))
    }

    fn normal_batches(&mut self) -> Result<(Batch, Batch), DeviceError> {
        self.ready()?;
        self.wait(2 * NORMAL_MODE_ROWS, DEFAULT_SAMPLING_RATE);
        let first = self.next_batch(SampleMode::Volt, NORMAL_MODE_ROWS);
        let second = self.next_batch(SampleMode::Volt, NORMAL_MODE_ROWS);
        Ok((first, second))
    }
}
