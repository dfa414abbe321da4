//! MPQ hashing and encryption
//!
//! Both the filename hashes and the table/sector cipher are driven by one
//! table of 0x500 words, produced by a small linear congruential generator
//! and evaluated at compile time.

use crate::{MpqError, Result};

/// Number of words in the crypt table
pub const CRYPT_TABLE_SIZE: usize = 0x500;

/// Initial accumulator of the cipher and of `hash_string`
const SEED2_INIT: u32 = 0xEEEE_EEEE;

/// Process-wide crypt table
pub static CRYPT_TABLE: [u32; CRYPT_TABLE_SIZE] = build_table();

/// Generate the crypt table
///
/// Five slots per `index1`, each spaced 0x100 apart, every slot packing two
/// 16-bit outputs of `seed = (seed * 125 + 3) % 0x2AAAAB`.
pub const fn build_table() -> [u32; CRYPT_TABLE_SIZE] {
    let mut table = [0u32; CRYPT_TABLE_SIZE];
    let mut seed: u32 = 0x0010_0001;
    let mut index1 = 0;
    while index1 < 0x100 {
        let mut index2 = index1;
        let mut i = 0;
        while i < 5 {
            seed = (seed * 125 + 3) % 0x2A_AAAB;
            let temp = (seed & 0xFFFF) << 16;
            seed = (seed * 125 + 3) % 0x2A_AAAB;
            table[index2] = temp | (seed & 0xFFFF);
            index2 += 0x100;
            i += 1;
        }
        index1 += 1;
    }
    table
}

/// Selects which quarter of the crypt table `hash_string` uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashType {
    /// Home slot in the hash table
    TableOffset = 0,
    /// First name check value
    NameA = 1,
    /// Second name check value
    NameB = 2,
    /// Encryption key
    FileKey = 3,
}

impl HashType {
    /// Create a HashType from a raw value
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(HashType::TableOffset),
            1 => Ok(HashType::NameA),
            2 => Ok(HashType::NameB),
            3 => Ok(HashType::FileKey),
            _ => Err(MpqError::InvalidHashType(value)),
        }
    }
}

/// Case-insensitive MPQ string hash
pub fn hash_string(text: &str, hash_type: HashType) -> u32 {
    let base = (hash_type as usize) * 0x100;
    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = SEED2_INIT;

    for &byte in text.as_bytes() {
        let ch = u32::from(byte.to_ascii_uppercase());
        seed1 = CRYPT_TABLE[base + ch as usize] ^ seed1.wrapping_add(seed2);
        seed2 = ch
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }
    seed1
}

#[inline]
fn next_seed1(seed1: u32) -> u32 {
    ((!seed1) << 21).wrapping_add(0x1111_1111) | (seed1 >> 11)
}

/// Decrypt a block of words in place
pub fn decrypt_block(data: &mut [u32], mut seed1: u32) {
    let mut seed2 = SEED2_INIT;

    for word in data.iter_mut() {
        seed2 = seed2.wrapping_add(CRYPT_TABLE[0x400 + (seed1 & 0xFF) as usize]);
        let result = *word ^ seed1.wrapping_add(seed2);

        seed1 = next_seed1(seed1);
        seed2 = result
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
        *word = result;
    }
}

/// Decrypt a byte buffer in place as little-endian words
///
/// Trailing bytes that do not fill a whole word are left untouched, the
/// same way the encoder leaves them.
pub fn decrypt_bytes(data: &mut [u8], mut seed1: u32) {
    let mut seed2 = SEED2_INIT;

    for chunk in data.chunks_exact_mut(4) {
        seed2 = seed2.wrapping_add(CRYPT_TABLE[0x400 + (seed1 & 0xFF) as usize]);
        let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let result = value ^ seed1.wrapping_add(seed2);

        seed1 = next_seed1(seed1);
        seed2 = result
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
        chunk.copy_from_slice(&result.to_le_bytes());
    }
}

/// Encrypt a block of words in place (inverse of [`decrypt_block`])
pub fn encrypt_block(data: &mut [u32], mut seed1: u32) {
    let mut seed2 = SEED2_INIT;

    for word in data.iter_mut() {
        seed2 = seed2.wrapping_add(CRYPT_TABLE[0x400 + (seed1 & 0xFF) as usize]);
        let plain = *word;
        *word = plain ^ seed1.wrapping_add(seed2);

        seed1 = next_seed1(seed1);
        seed2 = plain
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }
}

/// Encrypt a byte buffer in place as little-endian words
pub fn encrypt_bytes(data: &mut [u8], seed1: u32) {
    let mut words: Vec<u32> = data
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    encrypt_block(&mut words, seed1);
    for (chunk, word) in data.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Recover the key of an encrypted sector offset table
///
/// `value0` and `value1` are the first two encrypted words, `decrypted` the
/// known plaintext of the first word (the table size in bytes). The second
/// word must decrypt to a plausible offset (below 0x40000) for a candidate
/// to be accepted.
pub fn detect_file_seed(value0: u32, value1: u32, decrypted: u32) -> Option<u32> {
    let temp = (value0 ^ decrypted).wrapping_sub(SEED2_INIT);

    for i in 0..0x100 {
        let mut seed1 = temp.wrapping_sub(CRYPT_TABLE[0x400 + i]);
        let mut seed2 = SEED2_INIT.wrapping_add(CRYPT_TABLE[0x400 + (seed1 & 0xFF) as usize]);
        let mut result = value0 ^ seed1.wrapping_add(seed2);

        if result != decrypted {
            continue;
        }

        let candidate = seed1;

        seed1 = next_seed1(seed1);
        seed2 = result
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
        seed2 = seed2.wrapping_add(CRYPT_TABLE[0x400 + (seed1 & 0xFF) as usize]);
        result = value1 ^ seed1.wrapping_add(seed2);

        if result & 0xFFFC_0000 == 0 {
            return Some(candidate);
        }
    }
    None
}

/// Key of a file, derived from the name after its last path separator
pub fn file_key(path: &str, block_offset: u32, file_size: u32, key_adjusted: bool) -> u32 {
    let base_name = path.rsplit(['\\', '/']).next().unwrap_or(path);
    let key = hash_string(base_name, HashType::FileKey);
    if key_adjusted {
        key.wrapping_add(block_offset) ^ file_size
    } else {
        key
    }
}
