//! Pulling samples off the device for measurements (rather than export)

use std::time::Instant;

use tracing::debug;

use crate::{device::Batch, error::DeviceError};

/// Number of rows (time instants) in a column-major batch
pub fn batch_rows(batch: &Batch) -> usize {
    batch.first().map_or(0, Vec::len)
}

/// Estimate the rate (in Hz) a batch stream actually achieves.
///
/// The first batch absorbs the device start-up latency: its arrival starts the clock
/// and its rows are not counted. Rows are then counted until `duration * nominal_rate`
/// have arrived, at which point the stream is left alone.
pub fn measure_sampling_rate<I>(
    batches: I,
    nominal_rate: u32,
    duration: f64,
) -> Result<f64, DeviceError>
where
    I: IntoIterator<Item = Result<Batch, DeviceError>>,
{
    let required = (duration * nominal_rate as f64) as usize;
    let mut batches = batches.into_iter();

    let warm_up = batches
        .next()
        .ok_or_else(|| DeviceError::Other("sample stream ended during warm-up".to_owned()))??;
    let start = Instant::now();
    debug!("Skipped {} warm-up rows", batch_rows(&warm_up));

    let mut counted = 0usize;
    for batch in batches {
        counted += batch_rows(&batch?);
        if counted >= required {
            break;
        }
    }
    let elapsed = start.elapsed().as_secs_f64();
    if counted == 0 || elapsed <= 0.0 {
        return Err(DeviceError::Other(
            "no samples arrived after warm-up".to_owned(),
        ));
    }
    Ok(counted as f64 / elapsed)
}

/// Mean of one column over the next `count` rows
pub fn average_column<I>(rows: I, column: usize, count: usize) -> Result<f64, DeviceError>
where
    I: IntoIterator<Item = Result<Vec<f64>, DeviceError>>,
{
    let mut sum = 0.0;
    let mut seen = 0usize;
    for row in rows.into_iter().take(count) {
        let row = row?;
        sum += row
            .get(column)
            .copied()
            .ok_or_else(|| DeviceError::Other(format!("row has no column {}", column)))?;
        seen += 1;
    }
    if seen == 0 {
        return Err(DeviceError::Other("sample stream yielded no rows".to_owned()));
    }
    Ok(sum / seen as f64)
}
