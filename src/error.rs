//! Error types for every stage of an acquisition session

use std::path::PathBuf;

use thiserror::Error;

/// Invalid channel selection or option combination, caught before touching the device
#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("Selected channels list is not a set (channel {0} occurs more than once)")]
    DuplicateChannel(usize),
    #[error("There is no channel {0}")]
    ChannelOutOfRange(usize),
    #[error("There must be one vscale factor or as many as selected channels ({given} given, {selected} selected)")]
    ScaleArity { given: usize, selected: usize },
    #[error("Invalid vscale {0}, must be 1, 0.125 or 0.02")]
    InvalidVScale(f64),
    #[error("The channel {0} is used for zero-offset-shift compensation, but it is also a selected channel")]
    CompensationConflict(usize),
    #[error("Zero-offset-shift compensation is only possible if there is at least one unused channel")]
    NoFreeChannel,
    #[error("--zoscompensation can not be used together with the '--raw raw' flag")]
    CompensationRequiresVolt,
    #[error("--calibrationfile can not be used together with the '--raw raw' flag")]
    CalibrationRequiresVolt,
    #[error("Input must contain at least one voltage")]
    NoVoltages,
    #[error("The device can not sample at {0} Hz")]
    InvalidSamplingRate(u32),
    #[error("Normal mode only delivers volt values")]
    NormalModeVoltOnly,
}

/// Problems with calibration input
#[derive(Debug, Error)]
pub enum CalibrationDataError {
    #[error("There is no file '{}'", .0.display())]
    Missing(PathBuf),
    #[error("'{}' is a directory", .0.display())]
    IsDirectory(PathBuf),
    #[error("calibration file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed calibration file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("degenerate calibration record for channel {channel}: {reason}")]
    DegenerateRecord { channel: usize, reason: String },
    #[error("calibration data refers to unknown channel id {0}")]
    UnknownChannel(usize),
}

/// Failures reported by the driver collaborator
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("failed to initialise: {0}")]
    Init(String),
    #[error("samples requested while the device is paused")]
    Paused,
    #[error("device is closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Calibration(#[from] CalibrationDataError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("export sink: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
