//! IMA ADPCM sector decompression
//!
//! Sound files in MPQ archives are stored as WAVE data whose sectors are
//! compressed with a 4-bit ADPCM variant, mono (tag 0x40) or stereo
//! (tag 0x80). Each sector starts with a padding byte, a shift byte and one
//! uncompressed 16-bit sample per channel; every following byte is either a
//! step-index control code (high bit set) or a sample delta.

use crate::tables::{ADPCM_INDEX_ADJUST, ADPCM_STEP_TABLE};
use crate::{MpqError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Initial step index of every channel
const INITIAL_STEP_INDEX: i32 = 0x2C;

/// Largest valid step index
const MAX_STEP_INDEX: i32 = 0x58;

/// Decompress an ADPCM sector into little-endian 16-bit samples
pub fn decompress(data: &[u8], channels: usize) -> Result<Vec<u8>> {
    if channels != 1 && channels != 2 {
        return Err(MpqError::UnsupportedFeature(format!(
            "ADPCM with {} channels",
            channels
        )));
    }

    let header_size = 2 + 2 * channels;
    if data.len() < header_size {
        return Err(MpqError::short_read(header_size, data.len()));
    }

    let mut input = Cursor::new(data);
    let mut output = Vec::with_capacity(data.len() * 4);

    input.read_u8()?;
    let shift = u32::from(input.read_u8()?);

    let mut step_index = [INITIAL_STEP_INDEX; 2];
    let mut predicted = [0i32; 2];
    for sample in predicted.iter_mut().take(channels) {
        let initial = input.read_i16::<LittleEndian>()?;
        *sample = i32::from(initial);
        output.write_i16::<LittleEndian>(initial)?;
    }

    let stereo = channels == 2;
    let mut channel = channels - 1;

    for &value in &data[header_size..] {
        if stereo {
            channel = 1 - channel;
        }

        if value & 0x80 != 0 {
            match value & 0x7F {
                0 => {
                    if step_index[channel] != 0 {
                        step_index[channel] -= 1;
                    }
                    output.write_i16::<LittleEndian>(predicted[channel] as i16)?;
                }
                1 => {
                    step_index[channel] = (step_index[channel] + 8).min(MAX_STEP_INDEX);
                    if stereo {
                        channel = 1 - channel;
                    }
                }
                2 => {}
                _ => {
                    step_index[channel] = (step_index[channel] - 8).max(0);
                    if stereo {
                        channel = 1 - channel;
                    }
                }
            }
            continue;
        }

        let step = ADPCM_STEP_TABLE[step_index[channel] as usize];
        let mut delta = step.checked_shr(shift).unwrap_or(0);
        for bit in 0..6 {
            if value & (1 << bit) != 0 {
                delta += step >> bit;
            }
        }

        let sample = if value & 0x40 != 0 {
            (predicted[channel] - delta).max(i32::from(i16::MIN))
        } else {
            (predicted[channel] + delta).min(i32::from(i16::MAX))
        };
        predicted[channel] = sample;
        output.write_i16::<LittleEndian>(sample as i16)?;

        step_index[channel] = (step_index[channel]
            + ADPCM_INDEX_ADJUST[(value & 0x1F) as usize])
            .clamp(0, MAX_STEP_INDEX);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn test_header_only() {
        let output = decompress(&[0x00, 0x04, 0x34, 0x12], 1).unwrap();
        assert_eq!(samples(&output), vec![0x1234]);
    }

    #[test]
    fn test_mono_delta() {
        // Step index 0x2C is step 0x01EE; shift 4 gives 0x001E, bit 0 adds 0x01EE
        let output = decompress(&[0x00, 0x04, 0x00, 0x00, 0x01], 1).unwrap();
        assert_eq!(samples(&output), vec![0, 0x001E + 0x01EE]);
    }

    #[test]
    fn test_negative_delta_clamps() {
        let output = decompress(&[0x00, 0x00, 0x00, 0x80, 0x7F], 1).unwrap();
        assert_eq!(samples(&output), vec![i16::MIN, i16::MIN]);
    }

    #[test]
    fn test_repeat_code_emits_previous_sample() {
        let output = decompress(&[0x00, 0x04, 0x10, 0x00, 0x80, 0x80], 1).unwrap();
        assert_eq!(samples(&output), vec![0x10, 0x10, 0x10]);
    }

    #[test]
    fn test_stereo_alternates_channels() {
        let data = [0x00, 0x04, 0x01, 0x00, 0x02, 0x00, 0x80, 0x80];
        let output = decompress(&data, 2).unwrap();
        assert_eq!(samples(&output), vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            decompress(&[0x00, 0x04, 0x00], 1),
            Err(MpqError::InsufficientData { .. })
        ));
        assert!(matches!(
            decompress(&[0u8; 16], 3),
            Err(MpqError::UnsupportedFeature(_))
        ));
    }
}
