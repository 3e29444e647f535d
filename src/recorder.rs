//! Interactive calibration: walk every channel and test voltage, let the operator
//! apply the voltage and record what the device reads.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    str::FromStr,
    thread,
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use tracing::{debug, info};

use crate::{
    calibration::{write_calibration_file, CalibrationData, CalibrationRecord},
    cancel::CancellationToken,
    capture::average_column,
    device::{Device, DeviceGuard, SampleMode},
    error::{ConfigurationError, Result},
    CALIBRATION_SAMPLES, CHANNELS,
};

const INTRO: &str = "This interactive routine will generate a calibration that can later be used \
to get more precise results. It works by connecting different well known voltages one after \
another to a channel. Once all calibration voltages are measured, the same is done for every \
other channel.";

/// Operator decision for one (channel, voltage) cell
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command {
    Measure,
    SkipVoltage,
    SkipChannel,
    Quit,
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(Command::Measure),
            "s" => Ok(Command::SkipVoltage),
            "ss" => Ok(Command::SkipChannel),
            "q" => Ok(Command::Quit),
            _ => Err(()),
        }
    }
}

/// When records reach the output file
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PersistPolicy {
    /// Only after the last channel; quitting discards everything
    #[default]
    OnCompletion,
    /// Rewrite the file after every finished channel
    EachChannel,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Completed(CalibrationData),
    /// Operator quit; holds what was already written to disk
    Quit(CalibrationData),
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// How often a pending prompt looks at the cancellation token
const PROMPT_POLL: Duration = Duration::from_millis(50);

/// Parse `x, y, z` into distinct voltages
pub fn parse_voltages(line: &str) -> std::result::Result<Vec<f64>, String> {
    if line.trim().is_empty() {
        return Err(ConfigurationError::NoVoltages.to_string());
    }
    let mut voltages = Vec::new();
    for part in line.split(',') {
        let v: f64 = part
            .trim()
            .parse()
            .map_err(|_| "Input must be comma separated floats".to_owned())?;
        if voltages.contains(&v) {
            return Err(format!("Voltage {}V is given more than once", v));
        }
        voltages.push(v);
    }
    Ok(voltages)
}

/// Operator console: prompts go to `output`, answers come from `input`.
///
/// Lines are read on a separate thread so a pending prompt gives up as soon as
/// the cancellation token fires, without waiting for the operator to press Enter.
pub struct Console<W> {
    lines: Receiver<io::Result<String>>,
    output: W,
    cancel: CancellationToken,
}

impl<W: Write> Console<W> {
    pub fn new<R>(input: R, output: W, cancel: &CancellationToken) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, lines) = bounded(1);
        thread::Builder::new()
            .name("console".to_owned())
            .spawn(move || {
                for line in input.lines() {
                    let failed = line.is_err();
                    if tx.send(line).is_err() || failed {
                        break;
                    }
                }
                debug!("Console input closed");
            })?;
        Ok(Self {
            lines,
            output,
            cancel: cancel.clone(),
        })
    }

    pub fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)
    }

    /// `None` once the input is exhausted or the session is cancelled
    pub fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        loop {
            if self.cancel.is_cancelled() {
                writeln!(self.output)?;
                return Ok(None);
            }
            match self.lines.recv_timeout(PROMPT_POLL) {
                Ok(line) => return line.map(Some),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }

    /// Re-prompt until the operator gives at least one valid voltage
    pub fn ask_voltages(&mut self) -> io::Result<Option<Vec<f64>>> {
        loop {
            let line = match self.ask("Calibration voltages (x, y, z, ...): ")? {
                Some(line) => line,
                None => return Ok(None),
            };
            match parse_voltages(&line) {
                Ok(voltages) => return Ok(Some(voltages)),
                Err(message) => self.say(&message)?,
            }
        }
    }

    fn ask_command(&mut self, prompt: &str) -> io::Result<Command> {
        loop {
            match self.ask(prompt)? {
                None => return Ok(Command::Quit),
                Some(line) => match line.parse() {
                    Ok(command) => return Ok(command),
                    Err(()) => self.say("Press Enter, or type s, ss or q")?,
                },
            }
        }
    }
}

/// Traversal over (channel, voltage) cells and the records gathered so far
#[derive(Debug)]
pub struct CalibrationSession {
    channels: Vec<usize>,
    voltages: Vec<f64>,
    records: CalibrationData,
    policy: PersistPolicy,
    output: PathBuf,
}

impl CalibrationSession {
    /// `channels` are zero-based and visited in the given order
    pub fn new(
        channels: Vec<usize>,
        voltages: Vec<f64>,
        policy: PersistPolicy,
        output: PathBuf,
    ) -> Self {
        Self {
            channels,
            voltages,
            records: CalibrationData::new(),
            policy,
            output,
        }
    }

    pub fn records(&self) -> &CalibrationData {
        &self.records
    }

    fn persist(&self) -> Result<()> {
        write_calibration_file(&self.output, &self.records)?;
        debug!("Wrote calibration data to '{}'", self.output.display());
        Ok(())
    }

    /// Resume streaming, average `CALIBRATION_SAMPLES` raw rows of `channel`, pause again
    fn measure<D: Device + ?Sized>(
        device: &mut D,
        channel: usize,
        test_voltage: f64,
    ) -> Result<CalibrationRecord> {
        device.cancel_pause()?;
        let average = device
            .roll_rows(SampleMode::Raw)
            .and_then(|rows| average_column(rows, channel, CALIBRATION_SAMPLES));
        device.pause()?;
        Ok(CalibrationRecord {
            test_voltage,
            measured_value: round2(average?),
            vscale: device.vscales()[channel],
            zero_offset: round2(device.zero_offset(channel)),
        })
    }

    /// Drive the state machine until every cell is decided or the operator quits.
    /// The device is expected to be paused.
    pub fn run<D: Device + ?Sized, W: Write>(
        &mut self,
        device: &mut D,
        console: &mut Console<W>,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let mut persisted = CalibrationData::new();
        for &channel in &self.channels {
            self.records.insert(channel, Vec::new());
            for &test_voltage in &self.voltages {
                let prompt = format!(
                    "Do {}V measurement on channel {} (Enter), skip voltage (s), skip channel (ss) or quit (q): ",
                    test_voltage,
                    channel + 1
                );
                let mut command = console.ask_command(&prompt)?;
                if cancel.is_cancelled() {
                    command = Command::Quit;
                }
                match command {
                    Command::Quit => {
                        info!("Calibration quit by user");
                        return Ok(Outcome::Quit(persisted));
                    }
                    Command::SkipChannel => break,
                    Command::SkipVoltage => continue,
                    Command::Measure => {
                        console.say(&format!(
                            "Measure {} values for {}V...",
                            CALIBRATION_SAMPLES, test_voltage
                        ))?;
                        let record = Self::measure(device, channel, test_voltage)?;
                        info!("Channel {}: {:?}", channel + 1, record);
                        self.records.entry(channel).or_default().push(record);
                    }
                }
            }
            if self.policy == PersistPolicy::EachChannel {
                self.persist()?;
                persisted = self.records.clone();
            }
        }
        self.persist()?;
        Ok(Outcome::Completed(self.records.clone()))
    }
}

/// The full interactive routine over all channels on a connected, initialised device.
///
/// The device is closed exactly once before returning.
pub fn run_calibration<D: Device + ?Sized, W: Write>(
    device: &mut D,
    output: PathBuf,
    policy: PersistPolicy,
    console: &mut Console<W>,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let mut device = DeviceGuard::new(device);
    console.say(INTRO)?;
    device.pause()?;

    let voltages = match console.ask_voltages()? {
        Some(voltages) if !cancel.is_cancelled() => voltages,
        _ => {
            info!("Calibration quit by user");
            return Ok(Outcome::Quit(CalibrationData::new()));
        }
    };
    let listed: Vec<_> = voltages.iter().map(|v| format!("{}V", v)).collect();
    console.say(&format!("Calibration voltages are: {}", listed.join(" ")))?;

    let mut session = CalibrationSession::new((0..CHANNELS).collect(), voltages, policy, output);
    session.run(&mut *device, console, cancel)
}
