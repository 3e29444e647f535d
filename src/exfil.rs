//! This module is responsible for exfilling sample batches to a CSV artifact.
//!
//! The artifact is a run of `#`-prefixed metadata lines followed by comma separated
//! rows, one per sampled instant. Every batch is followed by a `# UNIX-Time:` line so
//! wall time can be matched to row position later on.

use std::{
    collections::BTreeMap,
    fmt::Display,
    fs::{File, OpenOptions},
    io::{self, BufWriter, Stdout, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};
use xz2::write::XzEncoder;

use crate::{
    cancel::CancellationToken,
    capture::{batch_rows, measure_sampling_rate},
    channels::ChannelConfig,
    device::{Batch, Device, DeviceGuard, SampleMode, StreamMode, VScale},
    error::{ConfigurationError, DeviceError, Result},
    CHANNELS,
};

/// Destination path that selects standard output
pub const STDOUT_PATH: &str = "-";
/// Destinations ending in this are written xz-compressed
pub const COMPRESSED_SUFFIX: &str = ".xz";
const XZ_PRESET: u32 = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    pub fn from_path(path: &str) -> Self {
        if path == STDOUT_PATH {
            Destination::Stdout
        } else {
            Destination::File(PathBuf::from(path))
        }
    }
}

fn is_compressed(path: &Path) -> bool {
    path.to_string_lossy().ends_with(COMPRESSED_SUFFIX)
}

/// Append-only byte sink behind every destination
pub enum Sink {
    Stdout(BufWriter<Stdout>),
    Plain(BufWriter<File>),
    Xz(XzEncoder<File>),
}

impl Sink {
    /// Open a destination for appending. The flag is true when nothing has been
    /// written to it before.
    pub fn open(destination: &Destination) -> io::Result<(Self, bool)> {
        let path = match destination {
            Destination::Stdout => {
                info!("Exporting data to stdout...");
                return Ok((Sink::Stdout(BufWriter::new(io::stdout())), true));
            }
            Destination::File(path) => path,
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let fresh = file.metadata()?.len() == 0;
        let sink = if is_compressed(path) {
            info!("Exporting data xz-compressed to file '{}'...", path.display());
            Sink::Xz(XzEncoder::new(file, XZ_PRESET))
        } else {
            info!("Exporting data to file '{}'...", path.display());
            Sink::Plain(BufWriter::new(file))
        };
        Ok((sink, fresh))
    }

    /// Flush everything and terminate the compressed stream, if any.
    /// Nothing is fsynced, the destination may be a pipe or a character device.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Sink::Stdout(mut w) => w.flush(),
            Sink::Plain(mut w) => w.flush(),
            Sink::Xz(w) => w.finish().map(drop),
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(w) => w.write(buf),
            Sink::Plain(w) => w.write(buf),
            Sink::Xz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(w) => w.flush(),
            Sink::Plain(w) => w.flush(),
            Sink::Xz(w) => w.flush(),
        }
    }
}

/// Self-describing metadata written ahead of the first row
#[derive(Debug)]
pub struct Header<'a> {
    pub titles: &'a [String],
    pub sampling_rate: Option<u32>,
    pub measured_sampling_rate: Option<f64>,
    pub started: DateTime<Local>,
    pub vertical_scale: &'a [f64; CHANNELS],
    pub zero_offsets: &'a BTreeMap<VScale, [f64; CHANNELS]>,
}

fn unix_time(time: &DateTime<Local>) -> String {
    format!("{}.{:06}", time.timestamp(), time.timestamp_subsec_micros())
}

fn join<T: Display>(values: impl IntoIterator<Item = T>, sep: &str) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Row counts of a finished export
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: u64,
    pub batches: u64,
    pub cancelled: bool,
}

/// One exported value. Raw counts are written without a fraction.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(untagged)]
enum Cell {
    Volt(f64),
    Raw(i64),
}

/// One export into one sink: header state, column selection and row count
pub struct ExportSession<W: Write> {
    sink: W,
    columns: Vec<usize>,
    raw: Vec<bool>,
    header_written: bool,
    row: Vec<Cell>,
    summary: ExportSummary,
}

impl<W: Write> ExportSession<W> {
    /// `columns` are the batch columns to export, in output order. `mode` is the
    /// sample mode the batches are requested in, it tells raw columns apart.
    pub fn new(sink: W, columns: Vec<usize>, mode: SampleMode) -> Self {
        let raw = columns
            .iter()
            .map(|&c| match mode {
                SampleMode::Raw => true,
                SampleMode::Volt => false,
                SampleMode::VoltRaw => c >= CHANNELS,
            })
            .collect();
        Self {
            sink,
            row: Vec::with_capacity(columns.len()),
            columns,
            raw,
            header_written: false,
            summary: ExportSummary::default(),
        }
    }

    fn comment(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.sink, "# {}", text)?;
        Ok(())
    }

    /// Write the metadata header. Only the first call per session writes anything.
    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        if self.header_written {
            debug!("Header already written, not repeating it");
            return Ok(());
        }
        self.comment(join(header.titles, ", "))?;
        if let Some(rate) = header.sampling_rate {
            self.comment(format_args!("samplingrate: {} Hz", rate))?;
        }
        if let Some(rate) = header.measured_sampling_rate {
            self.comment(format_args!("measured samplingrate: {} Hz", rate))?;
        }
        self.comment(format_args!("UNIX-Time: {}", unix_time(&header.started)))?;
        self.comment(format_args!("UNIX-Time: {}", header.started.to_rfc3339()))?;
        self.comment(format_args!(
            "vscale: {}",
            join(header.vertical_scale.iter().map(|v| format!("{:?}", v)), ", ")
        ))?;
        self.comment("calibration data:")?;
        for (vscale, offsets) in header.zero_offsets {
            self.comment(format_args!(
                "zero_offset [{:<4}]: {}",
                vscale,
                join(offsets.iter().map(|v| format!("{:.1}", v)), " ")
            ))?;
        }
        self.header_written = true;
        Ok(())
    }

    /// Continue an artifact that already carries a header from an earlier session
    pub fn resume(&mut self, now: DateTime<Local>) -> Result<()> {
        if !self.header_written {
            self.comment(format_args!("resumed session at UNIX-Time: {}", unix_time(&now)))?;
            self.header_written = true;
        }
        Ok(())
    }

    /// Select, transpose and append all rows of a column-major batch
    pub fn write_batch(&mut self, batch: &Batch) -> Result<usize> {
        if let Some(&missing) = self.columns.iter().find(|&&c| c >= batch.len()) {
            return Err(DeviceError::Other(format!(
                "batch has {} columns, column {} requested",
                batch.len(),
                missing
            ))
            .into());
        }
        let rows = self
            .columns
            .iter()
            .map(|&c| batch[c].len())
            .min()
            .unwrap_or_else(|| batch_rows(batch));
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut self.sink);
        for i in 0..rows {
            self.row.clear();
            self.row
                .extend(self.columns.iter().zip(&self.raw).map(|(&c, &raw)| {
                    if raw {
                        Cell::Raw(batch[c][i].round() as i64)
                    } else {
                        Cell::Volt(batch[c][i])
                    }
                }));
            writer.serialize(&self.row[..])?;
        }
        writer.flush()?;
        self.summary.rows += rows as u64;
        Ok(rows)
    }

    /// Append a wall clock checkpoint
    pub fn checkpoint(&mut self, now: DateTime<Local>) -> Result<()> {
        self.summary.batches += 1;
        self.comment(format_args!("UNIX-Time: {}", unix_time(&now)))
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn summary(&self) -> ExportSummary {
        self.summary
    }

    /// Flush and hand back the sink
    pub fn finish(mut self) -> Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Pull batches from the device into the session until the stream ends or `cancel` fires.
/// Cancellation is checked between batches only.
pub fn export<D: Device + ?Sized, W: Write>(
    device: &mut D,
    session: &mut ExportSession<W>,
    stream: StreamMode,
    mode: SampleMode,
    cancel: &CancellationToken,
) -> Result<ExportSummary> {
    match stream {
        StreamMode::Roll { sampling_rate } => {
            let mut batches = device.roll_batches(mode, sampling_rate)?;
            while !cancel.is_cancelled() {
                let batch = match batches.next() {
                    Some(batch) => batch?,
                    None => break,
                };
                session.write_batch(&batch)?;
                session.checkpoint(Local::now())?;
            }
        }
        StreamMode::Normal => {
            while !cancel.is_cancelled() {
                let (primary, secondary) = device.normal_batches()?;
                debug!(
                    "Normal mode batches of {} and {} rows",
                    batch_rows(&primary),
                    batch_rows(&secondary)
                );
                session.write_batch(&primary)?;
                session.write_batch(&secondary)?;
                session.checkpoint(Local::now())?;
            }
        }
    }
    let mut summary = session.summary();
    summary.cancelled = cancel.is_cancelled();
    if summary.cancelled {
        info!("Sample collection was canceled by user");
    }
    Ok(summary)
}

/// Everything needed for one export run
#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub destination: Destination,
    pub channels: ChannelConfig,
    pub mode: SampleMode,
    pub stream: StreamMode,
    /// Measure the achieved sampling rate for this many seconds before exporting
    pub measure_rate_for: Option<f64>,
}

/// Run a full export session on a connected, initialised device.
///
/// The device is closed exactly once before returning, whatever the outcome.
pub fn run_export<D: Device + ?Sized>(
    device: &mut D,
    options: &ExportOptions,
    cancel: &CancellationToken,
) -> Result<ExportSummary> {
    let mut device = DeviceGuard::new(device);
    if options.stream == StreamMode::Normal && options.mode != SampleMode::Volt {
        return Err(ConfigurationError::NormalModeVoltOnly.into());
    }

    let sampling_rate = match options.stream {
        StreamMode::Roll { sampling_rate } => Some(sampling_rate),
        StreamMode::Normal => None,
    };
    let measured_sampling_rate = match (options.measure_rate_for, sampling_rate) {
        (Some(duration), Some(rate)) => {
            info!("Measure sample rate of device (takes about {} sec) ...", duration);
            let measured = device
                .roll_batches(options.mode, rate)
                .and_then(|batches| measure_sampling_rate(batches, rate, duration));
            match measured {
                Ok(measured) => {
                    info!("-> {:.4} Hz", measured);
                    Some(measured)
                }
                Err(e) => {
                    warn!("Could not measure the sampling rate: {}", e);
                    None
                }
            }
        }
        (Some(_), None) => {
            warn!("The sampling rate can only be measured in roll mode, skipping the measurement");
            None
        }
        (None, _) => None,
    };

    let selected = &options.channels.selected_channels;
    info!(
        "Processing data of channel{}: {}",
        if selected.len() == 1 { "" } else { "s" },
        join(selected.iter().map(|c| c + 1), " ")
    );

    let (sink, fresh) = Sink::open(&options.destination)?;
    let mut session = ExportSession::new(sink, options.channels.columns(options.mode), options.mode);
    let now = Local::now();
    if fresh {
        let titles = options.channels.column_titles(options.mode);
        let zero_offsets = device.calibration_data();
        session.write_header(&Header {
            titles: &titles,
            sampling_rate,
            measured_sampling_rate,
            started: now,
            vertical_scale: &options.channels.vertical_scale,
            zero_offsets: &zero_offsets,
        })?;
    } else {
        warn!("Appending to existing data, the header of the earlier session stays in effect");
        session.resume(now)?;
    }

    let summary = export(&mut *device, &mut session, options.stream, options.mode, cancel)?;
    session.finish()?.finish()?;
    info!("Exporting data finished ({} rows)", summary.rows);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channels::resolve, device::RowStream};
    use std::io::Read;

    /// Hands out numbered batches and cancels the session once `cancel_after` went out
    struct FakeDevice {
        columns: usize,
        rows_per_batch: usize,
        served: usize,
        cancel_after: usize,
        cancel: CancellationToken,
        closes: usize,
    }

    impl FakeDevice {
        fn new(cancel: &CancellationToken, cancel_after: usize) -> Self {
            Self {
                columns: CHANNELS,
                rows_per_batch: 3,
                served: 0,
                cancel_after,
                cancel: cancel.clone(),
                closes: 0,
            }
        }

        fn batch(&mut self) -> Batch {
            self.served += 1;
            if self.served == self.cancel_after {
                self.cancel.cancel();
            }
            let n = self.served as f64;
            (0..self.columns)
                .map(|c| vec![n * 100.0 + c as f64; self.rows_per_batch])
                .collect()
        }
    }

    impl Device for FakeDevice {
        fn connect(&mut self) -> std::result::Result<(), DeviceError> {
            Ok(())
        }
        fn init(&mut self) -> std::result::Result<(), DeviceError> {
            Ok(())
        }
        fn close(&mut self) {
            self.closes += 1;
        }
        fn pause(&mut self) -> std::result::Result<(), DeviceError> {
            Ok(())
        }
        fn cancel_pause(&mut self) -> std::result::Result<(), DeviceError> {
            Ok(())
        }
        fn vscales(&self) -> [VScale; CHANNELS] {
            [VScale::One; CHANNELS]
        }
        fn zero_offset(&self, _channel: usize) -> f64 {
            0.0
        }
        fn calibration_data(&self) -> BTreeMap<VScale, [f64; CHANNELS]> {
            BTreeMap::from([(VScale::One, [10.0; CHANNELS]), (VScale::Fiftieth, [12.34; CHANNELS])])
        }
        fn roll_batches(
            &mut self,
            _mode: SampleMode,
            _sampling_rate: u32,
        ) -> std::result::Result<crate::device::BatchStream<'_>, DeviceError> {
            Ok(Box::new(std::iter::from_fn(move || Some(Ok(self.batch())))))
        }
        fn roll_rows(&mut self, _mode: SampleMode) -> std::result::Result<RowStream<'_>, DeviceError> {
            Err(DeviceError::Other("unused".to_owned()))
        }
        fn normal_batches(&mut self) -> std::result::Result<(Batch, Batch), DeviceError> {
            Ok((self.batch(), self.batch()))
        }
    }

    fn options(destination: Destination, stream: StreamMode) -> ExportOptions {
        ExportOptions {
            destination,
            channels: resolve(&[3, 1], &[], None).unwrap(),
            mode: SampleMode::Volt,
            stream,
            measure_rate_for: None,
        }
    }

    fn data_lines(text: &str) -> Vec<&str> {
        text.lines().filter(|l| !l.starts_with('#')).collect()
    }

    #[test]
    fn header_written_once() {
        let titles = vec!["ch_1".to_owned()];
        let zero_offsets = BTreeMap::from([(VScale::One, [2048.04; CHANNELS])]);
        let header = Header {
            titles: &titles,
            sampling_rate: Some(440),
            measured_sampling_rate: Some(438.5),
            started: Local::now(),
            vertical_scale: &[1.0; CHANNELS],
            zero_offsets: &zero_offsets,
        };
        let mut session = ExportSession::new(Vec::new(), vec![0], SampleMode::Volt);
        session.write_header(&header).unwrap();
        for _ in 0..3 {
            session.write_batch(&vec![vec![1.5, 2.5]]).unwrap();
            session.checkpoint(Local::now()).unwrap();
            session.write_header(&header).unwrap();
        }
        let text = String::from_utf8(session.finish().unwrap()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "# ch_1");
        assert_eq!(lines[1], "# samplingrate: 440 Hz");
        assert_eq!(lines[2], "# measured samplingrate: 438.5 Hz");
        assert!(lines[3].starts_with("# UNIX-Time: "));
        assert_eq!(lines[5], "# vscale: 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0");
        assert_eq!(lines[6], "# calibration data:");
        assert_eq!(
            lines[7],
            "# zero_offset [1.0 ]: 2048.0 2048.0 2048.0 2048.0 2048.0 2048.0 2048.0 2048.0"
        );
        assert_eq!(text.matches("# ch_1").count(), 1);
        assert_eq!(data_lines(&text), vec!["1.5", "2.5", "1.5", "2.5", "1.5", "2.5"]);
        // One checkpoint per batch plus the two header time lines
        assert_eq!(text.matches("# UNIX-Time:").count(), 3 + 2);
    }

    #[test]
    fn selects_columns_in_requested_order() {
        let config = resolve(&[3, 1], &[], None).unwrap();
        let mut session = ExportSession::new(
            Vec::new(),
            config.columns(SampleMode::VoltRaw),
            SampleMode::VoltRaw,
        );
        let batch: Batch = (0..16)
            .map(|c| match c {
                c if c < CHANNELS => vec![c as f64, c as f64 + 0.5],
                c => vec![2040.0 + c as f64, 2041.0 + c as f64],
            })
            .collect();
        assert_eq!(session.write_batch(&batch).unwrap(), 2);
        let text = String::from_utf8(session.finish().unwrap()).unwrap();
        assert_eq!(data_lines(&text), vec!["2.0,0.0,2050,2048", "2.5,0.5,2051,2049"]);
    }

    #[test]
    fn raw_counts_have_no_fraction() {
        let mut session = ExportSession::new(Vec::new(), vec![1, 0], SampleMode::Raw);
        session
            .write_batch(&vec![vec![2048.0, 2047.0], vec![2053.0, 1990.0]])
            .unwrap();
        session.checkpoint(Local::now()).unwrap();
        let text = String::from_utf8(session.finish().unwrap()).unwrap();
        assert_eq!(data_lines(&text), vec!["2053,2048", "1990,2047"]);
        assert!(text.ends_with('\n'));
        assert!(text.lines().nth(2).unwrap().starts_with("# UNIX-Time: "));
    }

    #[test]
    fn missing_columns_are_an_error() {
        let mut session = ExportSession::new(Vec::new(), vec![0, 9], SampleMode::Volt);
        assert!(session.write_batch(&vec![vec![1.0]; 8]).is_err());
    }

    #[test]
    fn cancel_after_n_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let cancel = CancellationToken::new();
        let mut device = FakeDevice::new(&cancel, 4);

        let opts = options(
            Destination::File(path.clone()),
            StreamMode::Roll { sampling_rate: 440 },
        );
        let summary = run_export(&mut device, &opts, &cancel).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.batches, 4);
        assert_eq!(summary.rows, 12);
        assert_eq!(device.served, 4);
        assert_eq!(device.closes, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let rows = data_lines(&text);
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0], "102.0,100.0");
        assert_eq!(rows[11], "402.0,400.0");
        assert!(text.contains("# ch_3, ch_1\n"));
        assert!(text.contains("# zero_offset [0.02]: 12.3 12.3"));
    }

    #[test]
    fn normal_mode_writes_both_buffers_per_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normal.csv");
        let cancel = CancellationToken::new();
        // Second iteration produces batches 3 and 4
        let mut device = FakeDevice::new(&cancel, 4);

        let opts = options(Destination::File(path.clone()), StreamMode::Normal);
        let summary = run_export(&mut device, &opts, &cancel).unwrap();
        assert_eq!(summary.batches, 2);
        assert_eq!(device.closes, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("samplingrate"));
        let body: Vec<_> = text
            .lines()
            .skip_while(|l| l.starts_with('#'))
            .collect();
        assert_eq!(body.len(), 4 * 3 + 2);
        assert_eq!(body[0], "102.0,100.0");
        assert_eq!(body[3], "202.0,200.0");
        assert!(body[6].starts_with("# UNIX-Time:"));
        assert_eq!(body[7], "302.0,300.0");
    }

    #[test]
    fn normal_mode_rejects_raw_columns() {
        let cancel = CancellationToken::new();
        let mut device = FakeDevice::new(&cancel, 1);
        let mut opts = options(Destination::Stdout, StreamMode::Normal);
        opts.mode = SampleMode::VoltRaw;
        assert!(run_export(&mut device, &opts, &cancel).is_err());
        assert_eq!(device.closes, 1);
        assert_eq!(device.served, 0);
    }

    #[test]
    fn reopened_file_keeps_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("append.csv");
        for _ in 0..2 {
            let cancel = CancellationToken::new();
            let mut device = FakeDevice::new(&cancel, 2);
            let opts = options(
                Destination::File(path.clone()),
                StreamMode::Roll { sampling_rate: 440 },
            );
            run_export(&mut device, &opts, &cancel).unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("# ch_3, ch_1").count(), 1);
        assert_eq!(text.matches("# calibration data:").count(), 1);
        assert_eq!(text.matches("# resumed session").count(), 1);
        assert_eq!(data_lines(&text).len(), 2 * 2 * 3);
    }

    #[test]
    fn compressed_sink_is_finished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv.xz");
        let cancel = CancellationToken::new();
        let mut device = FakeDevice::new(&cancel, 3);
        let opts = options(
            Destination::File(path.clone()),
            StreamMode::Roll { sampling_rate: 440 },
        );
        run_export(&mut device, &opts, &cancel).unwrap();

        let mut text = String::new();
        xz2::read::XzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(data_lines(&text).len(), 9);
        assert!(text.starts_with("# ch_3, ch_1\n"));
    }

    #[test]
    fn reopened_compressed_file_appends_a_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("append.csv.xz");
        for _ in 0..2 {
            let cancel = CancellationToken::new();
            let mut device = FakeDevice::new(&cancel, 2);
            let opts = options(
                Destination::File(path.clone()),
                StreamMode::Roll { sampling_rate: 440 },
            );
            run_export(&mut device, &opts, &cancel).unwrap();
        }

        let mut text = String::new();
        xz2::read::XzDecoder::new_multi_decoder(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.starts_with("# ch_3, ch_1\n"));
        assert_eq!(text.matches("# ch_3, ch_1").count(), 1);
        assert_eq!(text.matches("# resumed session").count(), 1);
        assert_eq!(data_lines(&text).len(), 2 * 2 * 3);
    }

    #[cfg(unix)]
    #[test]
    fn exports_to_character_device() {
        let cancel = CancellationToken::new();
        let mut device = FakeDevice::new(&cancel, 2);
        let opts = options(
            Destination::File(PathBuf::from("/dev/null")),
            StreamMode::Roll { sampling_rate: 440 },
        );
        let summary = run_export(&mut device, &opts, &cancel).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.rows, 6);
        assert_eq!(device.closes, 1);
    }

    #[test]
    fn rate_measurement_is_skipped_in_normal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normal.csv");
        let cancel = CancellationToken::new();
        let mut device = FakeDevice::new(&cancel, 2);
        let mut opts = options(Destination::File(path.clone()), StreamMode::Normal);
        opts.measure_rate_for = Some(10.0);
        let summary = run_export(&mut device, &opts, &cancel).unwrap();
        assert_eq!(summary.batches, 1);
        // Only the export pulled batches
        assert_eq!(device.served, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("measured samplingrate"));
    }

    #[test]
    fn destination_from_path() {
        assert_eq!(Destination::from_path("-"), Destination::Stdout);
        assert_eq!(
            Destination::from_path("a.csv"),
            Destination::File(PathBuf::from("a.csv"))
        );
        assert!(is_compressed(Path::new("data.csv.xz")));
        assert!(!is_compressed(Path::new("data.csv")));
    }
}
