//! Argument parsing for running from the command line

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

use crate::{
    channels::{resolve, ChannelConfig},
    device::{SampleMode, StreamMode, VScale},
    error::ConfigurationError,
    exfil::Destination,
    recorder::PersistPolicy,
    CHANNELS, DEFAULT_SAMPLING_RATE, ROLL_SAMPLING_RATES,
};

/// Collect data from an 8-channel data logger into CSV, or calibrate it.
///
/// Save data sampled with 22 Hz in file 'my_data.csv':
///     octolog my_data.csv --channels 1 2 --samplingrate 22
///
/// Create and fill calibration file 'my_cal.cd.json':
///     octolog --calibrate my_cal.cd.json
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None, verbatim_doc_comment)]
pub struct Args {
    /// Export measured data to this file in CSV format ('-' for stdout). If the name ends
    /// with '.xz' the content is xz compressed.
    #[clap(value_name = "CSV_PATH")]
    pub csv_path: Option<String>,
    /// Calibrate the device interactively and write the calibration to this file.
    /// Ignores all other arguments
    #[clap(long, value_name = "CALIBRATION_FILE")]
    pub calibrate: Option<PathBuf>,
    /// Channels of interest (1..8), all by default
    #[clap(short = 's', long, multiple_values = true, value_parser = channel_number)]
    pub channels: Vec<usize>,
    /// Hardware pre-scale, must be 1, 0.125 or 0.02. One value applies to all selected
    /// channels, otherwise there must be one value per selected channel
    #[clap(long, multiple_values = true, value_parser = valid_vscale)]
    pub vscale: Vec<f64>,
    /// Correct measured samples with the content of this calibration file
    #[clap(short = 'c', long = "calibrationfile", value_name = "CALIBRATION_FILE")]
    pub calibration_file: Option<PathBuf>,
    /// Deliver raw values, volts (possibly calibrated) or both. The bare flag means 'raw'
    #[clap(
        short = 'r',
        long = "raw",
        default_value = "volt",
        default_missing_value = "raw",
        min_values = 0,
        max_values = 1,
        value_parser = SampleMode::from_str
    )]
    pub raw_or_volt: SampleMode,
    /// Compensate the zero offset shift with this unused channel (no voltage may be
    /// applied to it). The bare flag uses channel 8
    #[clap(
        short = 'z',
        long = "zoscompensation",
        value_name = "CHANNEL",
        default_missing_value = "8",
        min_values = 0,
        max_values = 1,
        value_parser = channel_number
    )]
    pub zos_compensation: Option<usize>,
    /// Sampling rate (in Hz) the device should use: 1, 2, 5, 11, 22, 44, 88, 220 or 440
    #[clap(short = 'f', long = "samplingrate", default_value_t = DEFAULT_SAMPLING_RATE)]
    #[clap(value_parser = roll_sampling_rate)]
    pub sampling_rate: u32,
    /// Measure the sampling rate the device achieves against the computer clock.
    /// Adds about 10 seconds to startup
    #[clap(short = 'm', long = "measuresamplingrate")]
    pub measure_sampling_rate: bool,
    /// Use double-buffered normal mode instead of roll mode
    #[clap(long)]
    pub normal_mode: bool,
    /// During calibration, save the file after every finished channel
    #[clap(long)]
    pub save_each_channel: bool,
    /// Use the built-in simulated logger instead of hardware
    #[clap(long)]
    pub simulate: bool,
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

/// What the invocation asks for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Task {
    Export(Destination),
    Calibrate(PathBuf),
}

impl Args {
    pub fn task(&self) -> Result<Task, &'static str> {
        match (&self.csv_path, &self.calibrate) {
            (Some(path), None) => Ok(Task::Export(Destination::from_path(path))),
            (None, Some(path)) => Ok(Task::Calibrate(path.clone())),
            (Some(_), Some(_)) => Err("CSV_PATH and --calibrate can not be used together"),
            (None, None) => Err("either CSV_PATH or --calibrate is required"),
        }
    }

    /// Channel selection checked against the requested value mode
    pub fn channel_config(&self) -> Result<ChannelConfig, ConfigurationError> {
        let config = resolve(&self.channels, &self.vscale, self.zos_compensation)?;
        config.check_mode(self.raw_or_volt, self.calibration_file.is_some())?;
        Ok(config)
    }

    pub fn stream_mode(&self) -> StreamMode {
        if self.normal_mode {
            StreamMode::Normal
        } else {
            StreamMode::Roll {
                sampling_rate: self.sampling_rate,
            }
        }
    }

    pub fn persist_policy(&self) -> PersistPolicy {
        if self.save_each_channel {
            PersistPolicy::EachChannel
        } else {
            PersistPolicy::OnCompletion
        }
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn channel_number(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(ch) if (1..=CHANNELS).contains(&ch) => Ok(ch),
        _ => Err(format!("There is no channel {}", s)),
    }
}

fn roll_sampling_rate(s: &str) -> Result<u32, String> {
    let rate: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a sampling rate", s))?;
    if ROLL_SAMPLING_RATES.contains(&rate) {
        Ok(rate)
    } else {
        Err(ConfigurationError::InvalidSamplingRate(rate).to_string())
    }
}

fn valid_vscale(s: &str) -> Result<f64, String> {
    s.parse::<VScale>().map(f64::from)
}
