use std::{
    fmt::Display,
    io::{self, BufReader},
    process::ExitCode,
};

use clap::{error::ErrorKind, CommandFactory, Parser};
use octolog::{
    args::{convert_filter, Args, Task},
    calibration::CorrectionTable,
    cancel::CancellationToken,
    device::{Device, DeviceSettings},
    error::DeviceError,
    exfil::{run_export, ExportOptions},
    monitoring::session_subscriber,
    recorder::{run_calibration, Console, Outcome},
    sim::SimulatedDevice,
    NS_PER_DIV, RATE_MEASUREMENT_SECS,
};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = Args::parse();
    let subscriber = session_subscriber(convert_filter(args.verbose.log_level_filter()));
    tracing::subscriber::with_default(subscriber, || run(&args))
}

/// Report a bad invocation the way clap reports its own errors, then exit
fn usage_error(kind: ErrorKind, message: impl Display) -> ! {
    Args::command().error(kind, message).exit()
}

/// Connect and initialise, closing the device again on failure
fn open_device(device: &mut dyn Device) -> Result<(), DeviceError> {
    info!("Connecting...");
    if let Err(e) = device.connect() {
        device.close();
        return Err(e);
    }
    info!("Connection established");
    info!("Initialising...");
    if let Err(e) = device.init() {
        device.close();
        return Err(e);
    }
    info!("Initialisation completed");
    Ok(())
}

fn run(args: &Args) -> ExitCode {
    let task = args
        .task()
        .unwrap_or_else(|e| usage_error(ErrorKind::ArgumentConflict, e));
    let config = args
        .channel_config()
        .unwrap_or_else(|e| usage_error(ErrorKind::ValueValidation, e));
    let vertical_scale = config
        .device_vscales()
        .unwrap_or_else(|e| usage_error(ErrorKind::ValueValidation, e));

    let correction = match &args.calibration_file {
        Some(path) => match CorrectionTable::load(path) {
            Ok(table) => table,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => CorrectionTable::default(),
    };

    if !args.simulate {
        error!("No hardware transport is built into this binary, run with --simulate");
        return ExitCode::FAILURE;
    }
    let mut device = SimulatedDevice::new(DeviceSettings {
        ns_per_div: NS_PER_DIV,
        vertical_scale,
        correction,
        zero_offset_compensation_channel: config.zero_offset_compensation_channel,
    });

    let cancel = CancellationToken::new();
    if let Err(e) = cancel.cancel_on_interrupt() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = open_device(&mut device) {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    if cancel.is_cancelled() {
        device.close();
        return ExitCode::SUCCESS;
    }

    let result = match task {
        Task::Calibrate(path) => {
            let mut console = match Console::new(BufReader::new(io::stdin()), io::stdout(), &cancel) {
                Ok(console) => console,
                Err(e) => {
                    error!("{}", e);
                    device.close();
                    return ExitCode::FAILURE;
                }
            };
            run_calibration(&mut device, path.clone(), args.persist_policy(), &mut console, &cancel)
                .map(|outcome| match outcome {
                    Outcome::Completed(_) => {
                        info!("Calibration data written to '{}'", path.display())
                    }
                    Outcome::Quit(saved) if !saved.is_empty() => info!(
                        "Calibration stopped, channels saved so far stay in '{}'",
                        path.display()
                    ),
                    Outcome::Quit(_) => info!("Calibration stopped, nothing was saved"),
                })
        }
        Task::Export(destination) => {
            let options = ExportOptions {
                destination,
                channels: config,
                mode: args.raw_or_volt,
                stream: args.stream_mode(),
                measure_rate_for: args.measure_sampling_rate.then(|| RATE_MEASUREMENT_SECS),
            };
            run_export(&mut device, &options, &cancel).map(|_| ())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
