//! Validation and normalisation of the channel selection

use crate::{
    device::{SampleMode, VScale},
    error::ConfigurationError,
    CHANNELS,
};

/// Resolved channel selection. All indices are zero-based physical channels.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    /// Distinct channels in the order they were requested
    pub selected_channels: Vec<usize>,
    /// Scale factor per physical channel slot, 1.0 for unselected channels
    pub vertical_scale: [f64; CHANNELS],
    pub zero_offset_compensation_channel: Option<usize>,
}

fn zero_based(channel: usize) -> Result<usize, ConfigurationError> {
    if (1..=CHANNELS).contains(&channel) {
        Ok(channel - 1)
    } else {
        Err(ConfigurationError::ChannelOutOfRange(channel))
    }
}

/// Build a [`ChannelConfig`] from 1-based channel numbers.
///
/// An empty channel list selects all channels, an empty scale list means `[1.0]`.
/// A single scale factor applies to every selected channel, otherwise factor `i`
/// belongs to `channels[i]`.
pub fn resolve(
    channels: &[usize],
    vertical_scale_factors: &[f64],
    zero_offset_compensation_channel: Option<usize>,
) -> Result<ChannelConfig, ConfigurationError> {
    let mut selected = Vec::with_capacity(CHANNELS);
    if channels.is_empty() {
        selected.extend(0..CHANNELS);
    }
    for &channel in channels {
        let idx = zero_based(channel)?;
        if selected.contains(&idx) {
            return Err(ConfigurationError::DuplicateChannel(channel));
        }
        selected.push(idx);
    }

    let factors = if vertical_scale_factors.is_empty() {
        &[1.0][..]
    } else {
        vertical_scale_factors
    };
    let mut vertical_scale = [1.0; CHANNELS];
    match factors.len() {
        1 => selected.iter().for_each(|&ch| vertical_scale[ch] = factors[0]),
        n if n == selected.len() => selected
            .iter()
            .zip(factors)
            .for_each(|(&ch, &factor)| vertical_scale[ch] = factor),
        n => {
            return Err(ConfigurationError::ScaleArity {
                given: n,
                selected: selected.len(),
            })
        }
    }

    let compensation = match zero_offset_compensation_channel {
        Some(channel) => {
            let idx = zero_based(channel)?;
            if selected.len() == CHANNELS {
                return Err(ConfigurationError::NoFreeChannel);
            }
            if selected.contains(&idx) {
                return Err(ConfigurationError::CompensationConflict(channel));
            }
            Some(idx)
        }
        None => None,
    };

    Ok(ChannelConfig {
        selected_channels: selected,
        vertical_scale,
        zero_offset_compensation_channel: compensation,
    })
}

impl ChannelConfig {
    /// Calibration and drift compensation only act on volt values
    pub fn check_mode(&self, mode: SampleMode, with_calibration: bool) -> Result<(), ConfigurationError> {
        if mode.produces_volts() {
            return Ok(());
        }
        if with_calibration {
            return Err(ConfigurationError::CalibrationRequiresVolt);
        }
        if self.zero_offset_compensation_channel.is_some() {
            return Err(ConfigurationError::CompensationRequiresVolt);
        }
        Ok(())
    }

    /// The scale vector as hardware pre-scale settings
    pub fn device_vscales(&self) -> Result<[VScale; CHANNELS], ConfigurationError> {
        let mut out = [VScale::One; CHANNELS];
        for (slot, &factor) in out.iter_mut().zip(self.vertical_scale.iter()) {
            *slot = VScale::try_from(factor)?;
        }
        Ok(out)
    }

    /// Batch column indices to export, raw companions after the volt columns
    pub fn columns(&self, mode: SampleMode) -> Vec<usize> {
        let mut columns = self.selected_channels.clone();
        if mode == SampleMode::VoltRaw {
            columns.extend(self.selected_channels.iter().map(|ch| ch + CHANNELS));
        }
        columns
    }

    /// Column titles matching [`ChannelConfig::columns`]
    pub fn column_titles(&self, mode: SampleMode) -> Vec<String> {
        self.columns(mode)
            .into_iter()
            .map(|col| {
                if col < CHANNELS {
                    format!("ch_{}", col + 1)
                } else {
                    format!("ch_{}_raw", col + 1 - CHANNELS)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_everything() {
        let config = resolve(&[], &[], None).unwrap();
        assert_eq!(config.selected_channels, (0..8).collect::<Vec<_>>());
        assert_eq!(config.vertical_scale, [1.0; 8]);
        assert_eq!(config.zero_offset_compensation_channel, None);
    }

    #[test]
    fn broadcast_single_factor() {
        let config = resolve(&[3, 1], &[2.0], None).unwrap();
        assert_eq!(config.selected_channels, vec![2, 0]);
        assert_eq!(config.vertical_scale, [2.0, 1.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn positional_factors_follow_input_order() {
        let config = resolve(&[3, 1], &[2.0, 5.0], None).unwrap();
        assert_eq!(config.vertical_scale[2], 2.0);
        assert_eq!(config.vertical_scale[0], 5.0);
        assert!(config
            .vertical_scale
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 0 && *i != 2)
            .all(|(_, &v)| v == 1.0));
    }

    #[test]
    fn rejects_bad_selections() {
        assert_eq!(
            resolve(&[1, 2, 1], &[], None),
            Err(ConfigurationError::DuplicateChannel(1))
        );
        assert_eq!(resolve(&[0], &[], None), Err(ConfigurationError::ChannelOutOfRange(0)));
        assert_eq!(resolve(&[9], &[], None), Err(ConfigurationError::ChannelOutOfRange(9)));
        assert_eq!(
            resolve(&[1, 2, 3], &[1.0, 0.125], None),
            Err(ConfigurationError::ScaleArity { given: 2, selected: 3 })
        );
        assert_eq!(
            resolve(&[1, 2], &[], Some(2)),
            Err(ConfigurationError::CompensationConflict(2))
        );
        assert_eq!(resolve(&[], &[], Some(8)), Err(ConfigurationError::NoFreeChannel));
        assert_eq!(
            resolve(&[1], &[], Some(9)),
            Err(ConfigurationError::ChannelOutOfRange(9))
        );
    }

    #[test]
    fn compensation_channel_is_zero_based() {
        let config = resolve(&[1, 2], &[0.125], Some(8)).unwrap();
        assert_eq!(config.zero_offset_compensation_channel, Some(7));
        assert_eq!(config.device_vscales().unwrap()[0], VScale::Eighth);
        assert_eq!(config.device_vscales().unwrap()[7], VScale::One);
        assert!(config.check_mode(SampleMode::Raw, false).is_err());
        assert!(config.check_mode(SampleMode::VoltRaw, true).is_ok());
    }

    #[test]
    fn raw_mode_refuses_calibration() {
        let config = resolve(&[1], &[], None).unwrap();
        assert_eq!(
            config.check_mode(SampleMode::Raw, true),
            Err(ConfigurationError::CalibrationRequiresVolt)
        );
        assert_eq!(config.check_mode(SampleMode::Raw, false), Ok(()));
    }

    #[test]
    fn raw_companion_columns() {
        let config = resolve(&[3, 1], &[], None).unwrap();
        assert_eq!(config.columns(SampleMode::VoltRaw), vec![2, 0, 10, 8]);
        assert_eq!(
            config.column_titles(SampleMode::VoltRaw),
            vec!["ch_3", "ch_1", "ch_3_raw", "ch_1_raw"]
        );
        assert_eq!(config.column_titles(SampleMode::Raw), vec!["ch_3", "ch_1"]);
    }
}
