//! Literal and distance decoding
//!
//! Port of the DecodeLit/DecodeDist pair from PKLib explode.c, reading from
//! an LSB-first bit stream with the reverse lookup tables from
//! [`crate::tables`].

use super::LITERAL_END_OF_STREAM;
use crate::bits::BitStream;
use crate::tables::{DIST_BITS, DIST_POSITIONS, EX_LEN_BITS, LEN_BASE, LEN_BITS, LEN_POSITIONS};
use crate::{DictionarySize, MpqError, Result, MAX_PREALLOCATION};

/// One decoded instruction of an explode stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    /// Copy one byte to the output
    Byte(u8),
    /// Repeat `n` bytes from earlier output (2..=518)
    Repeat(u32),
    /// Stream terminator, or input ran out
    EndOfStream,
}

/// Decoder state for one explode stream
#[derive(Debug)]
pub struct Exploder<'a> {
    bits: BitStream<&'a [u8]>,
    dict_bits: u32,
}

impl<'a> Exploder<'a> {
    /// Create a decoder over the bitstream that follows the two byte header
    pub fn new(payload: &'a [u8], dict_size: DictionarySize) -> Self {
        Self {
            bits: BitStream::new(payload),
            dict_bits: u32::from(dict_size.bits()),
        }
    }

    /// Decode the whole stream into at most `expected_size` bytes
    pub fn expand(&mut self, expected_size: usize) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(expected_size.min(MAX_PREALLOCATION));

        while output.len() < expected_size {
            match self.decode_literal()? {
                Literal::EndOfStream => break,
                Literal::Byte(byte) => output.push(byte),
                Literal::Repeat(length) => {
                    let move_back = self.decode_distance(length)? as usize;
                    if move_back == 0 {
                        break;
                    }
                    if move_back > output.len() {
                        return Err(MpqError::CorruptStream(format!(
                            "repetition distance {} exceeds {} bytes of output",
                            move_back,
                            output.len()
                        )));
                    }

                    // Source and destination may overlap, so copy byte by byte
                    let mut source = output.len() - move_back;
                    for _ in 0..length {
                        if output.len() >= expected_size {
                            break;
                        }
                        output.push(output[source]);
                        source += 1;
                    }
                }
            }
        }

        Ok(output)
    }

    /// Decode the next literal or repetition length
    pub fn decode_literal(&mut self) -> Result<Literal> {
        let flag = match self.bits.read_bits(1)? {
            Some(flag) => flag,
            None => return Ok(Literal::EndOfStream),
        };

        if flag == 0 {
            return Ok(match self.bits.read_bits(8)? {
                Some(byte) => Literal::Byte(byte as u8),
                None => Literal::EndOfStream,
            });
        }

        // The next 2..=7 bits select a length code
        let mut pos = u32::from(LEN_POSITIONS[self.bits.peek_byte()? as usize]);
        if self.bits.read_bits(u32::from(LEN_BITS[pos as usize]))?.is_none() {
            return Ok(Literal::EndOfStream);
        }

        let extra_bits = u32::from(EX_LEN_BITS[pos as usize]);
        if extra_bits != 0 {
            let extra = match self.bits.read_bits(extra_bits)? {
                Some(extra) => extra,
                None => return Ok(Literal::EndOfStream),
            };
            pos = u32::from(LEN_BASE[pos as usize]) + extra;
        }

        let instruction = pos + 0x100;
        if instruction == LITERAL_END_OF_STREAM {
            return Ok(Literal::EndOfStream);
        }
        Ok(Literal::Repeat(instruction - 0xFE))
    }

    /// Decode the distance of a repetition of `length` bytes
    ///
    /// Returns the distance plus one, or 0 when the input runs out.
    pub fn decode_distance(&mut self, length: u32) -> Result<u32> {
        // Short codes near the end of input are padded with zero bits
        let pos = u32::from(DIST_POSITIONS[self.bits.peek_byte()? as usize]);
        if self.bits.read_bits(u32::from(DIST_BITS[pos as usize]))?.is_none() {
            return Ok(0);
        }

        let low_bits = if length == 2 { 2 } else { self.dict_bits };
        match self.bits.read_bits(low_bits)? {
            Some(low) => Ok(((pos << low_bits) | low) + 1),
            None => Ok(0),
        }
    }
}
