//! Bit-level readers
//!
//! Two small readers share the LSB-first bit order used by every format in
//! this crate:
//!
//! - [`BitMuncher`] addresses a byte slice by absolute bit offset and counts
//!   the bits it consumed. The DCC codec carves several of these out of one
//!   buffer and checks their counts after decoding.
//! - [`BitStream`] pulls bytes from a [`Read`] source on demand and keeps a
//!   small bit buffer, which is all the explode decoder needs.

use crate::{MpqError, Result};
use std::io::Read;

/// Bit cursor over a byte slice
#[derive(Debug, Clone)]
pub struct BitMuncher<'a> {
    data: &'a [u8],
    offset: usize,
    bits_read: usize,
}

impl<'a> BitMuncher<'a> {
    /// Create a cursor starting at bit `offset` of `data`
    pub fn new(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            offset,
            bits_read: 0,
        }
    }

    /// Copy of this cursor at the same position with a fresh bit counter
    pub fn fork(&self) -> Self {
        Self {
            data: self.data,
            offset: self.offset,
            bits_read: 0,
        }
    }

    /// Current absolute bit offset
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of bits consumed since creation (or since the fork)
    pub fn bits_read(&self) -> usize {
        self.bits_read
    }

    /// Read one bit
    pub fn get_bit(&mut self) -> Result<u32> {
        let byte = self
            .data
            .get(self.offset / 8)
            .ok_or_else(|| MpqError::short_read(self.offset / 8 + 1, self.data.len()))?;
        let result = (u32::from(*byte) >> (self.offset % 8)) & 1;
        self.offset += 1;
        self.bits_read += 1;
        Ok(result)
    }

    /// Skip `bits` bits, counting them as read
    pub fn skip_bits(&mut self, bits: usize) {
        self.offset += bits;
        self.bits_read += bits;
    }

    /// Read up to 32 bits, least significant bit first
    pub fn get_bits(&mut self, bits: u32) -> Result<u32> {
        debug_assert!(bits <= 32);
        let mut result = 0u32;
        for i in 0..bits {
            result |= self.get_bit()? << i;
        }
        Ok(result)
    }

    /// Read `bits` bits and sign-extend them
    ///
    /// A single bit reads as 0 or -1.
    pub fn get_signed_bits(&mut self, bits: u32) -> Result<i32> {
        let value = self.get_bits(bits)?;
        Ok(make_signed(value, bits))
    }

    /// Read an 8-bit value
    pub fn get_byte(&mut self) -> Result<u8> {
        Ok(self.get_bits(8)? as u8)
    }

    /// Read a little-endian 32-bit value
    pub fn get_u32(&mut self) -> Result<u32> {
        self.get_bits(32)
    }
}

/// Sign-extend the low `bits` bits of `value`
pub fn make_signed(value: u32, bits: u32) -> i32 {
    match bits {
        0 => 0,
        32 => value as i32,
        _ => {
            let shift = 32 - bits;
            ((value << shift) as i32) >> shift
        }
    }
}

/// LSB-first bit reader over a byte source
#[derive(Debug)]
pub struct BitStream<R: Read> {
    reader: R,
    bit_buff: u32,
    bit_count: u32,
}

impl<R: Read> BitStream<R> {
    /// Wrap a byte source
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            bit_buff: 0,
            bit_count: 0,
        }
    }

    /// Make sure at least `n_bits` (at most 24) are buffered
    ///
    /// Returns `false` when the source ran dry first.
    pub fn ensure_bits(&mut self, n_bits: u32) -> Result<bool> {
        while self.bit_count < n_bits {
            let mut byte = [0u8; 1];
            if self.reader.read(&mut byte)? == 0 {
                return Ok(false);
            }
            self.bit_buff |= u32::from(byte[0]) << self.bit_count;
            self.bit_count += 8;
        }
        Ok(true)
    }

    /// Look at the next 8 bits without consuming them
    ///
    /// Missing bits past the end of input read as zero.
    pub fn peek_byte(&mut self) -> Result<u8> {
        self.ensure_bits(8)?;
        Ok((self.bit_buff & 0xFF) as u8)
    }

    /// Read `n_bits` bits, or `None` if the input ends first
    pub fn read_bits(&mut self, n_bits: u32) -> Result<Option<u32>> {
        if !self.ensure_bits(n_bits)? {
            return Ok(None);
        }
        let value = self.bit_buff & ((1u32 << n_bits) - 1);
        self.waste_bits(n_bits);
        Ok(Some(value))
    }

    /// Drop `n_bits` buffered bits
    fn waste_bits(&mut self, n_bits: u32) {
        self.bit_buff >>= n_bits;
        self.bit_count -= n_bits;
    }

    /// Consume the reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}
