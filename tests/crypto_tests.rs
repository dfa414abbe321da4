//! Cipher and hash tests against known values

use mpqkit::crypto::{
    decrypt_block, decrypt_bytes, detect_file_seed, encrypt_bytes, file_key, hash_string,
    HashType, CRYPT_TABLE,
};
use mpqkit::{BLOCK_TABLE_KEY, HASH_TABLE_KEY};

#[test]
fn test_crypt_table_entries() {
    assert_eq!(CRYPT_TABLE[0x000], 0x55C6_36E2);
    assert_eq!(CRYPT_TABLE[0x001], 0x02BE_0170);
    assert_eq!(CRYPT_TABLE[0x400], 0x193A_A698);
    assert_eq!(CRYPT_TABLE[0x4FF], 0x7303_286C);
}

#[test]
fn test_encrypt_known_bytes() {
    let mut data = hex::decode("00000000010000000200000003000000").unwrap();
    encrypt_bytes(&mut data, 0xDEAD_BEEF);
    assert_eq!(hex::encode(&data), "b816d05d193a0bfb9bf8fe614da57619");

    decrypt_bytes(&mut data, 0xDEAD_BEEF);
    assert_eq!(hex::encode(&data), "00000000010000000200000003000000");
}

#[test]
fn test_bytes_and_words_agree() {
    let mut bytes = hex::decode("b816d05d193a0bfb9bf8fe614da57619").unwrap();
    let mut words = [0x5DD0_16B8u32, 0xFB0B_3A19, 0x61FE_F89B, 0x1976_A54D];
    decrypt_bytes(&mut bytes, 0xDEAD_BEEF);
    decrypt_block(&mut words, 0xDEAD_BEEF);

    let from_words: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    assert_eq!(bytes, from_words);
}

#[test]
fn test_table_keys() {
    assert_eq!(hash_string(HASH_TABLE_KEY, HashType::FileKey), 0xC3AF_3770);
    assert_eq!(hash_string(BLOCK_TABLE_KEY, HashType::FileKey), 0xEC83_B3A3);
}

#[test]
fn test_hash_types_differ() {
    let name = "data\\global\\excel\\armor.txt";
    let hashes: Vec<u32> = [
        HashType::TableOffset,
        HashType::NameA,
        HashType::NameB,
        HashType::FileKey,
    ]
    .into_iter()
    .map(|hash_type| hash_string(name, hash_type))
    .collect();

    for i in 0..hashes.len() {
        for j in i + 1..hashes.len() {
            assert_ne!(hashes[i], hashes[j]);
        }
    }
}

#[test]
fn test_separators_are_significant() {
    // Lookup hashes the whole path; only the key uses the base name
    assert_ne!(
        hash_string("data\\a.txt", HashType::NameA),
        hash_string("data/a.txt", HashType::NameA)
    );
    assert_eq!(
        file_key("data\\a.txt", 0, 0, false),
        file_key("data/a.txt", 0, 0, false)
    );
}

#[test]
fn test_recover_offset_table_key() {
    let key = file_key("sound\\music\\intro.wav", 0x2000, 0x9000, true);

    // Offset table of a 0x9000 byte file in 4096 byte sectors: 10 entries
    let mut table: Vec<u8> = [40u32, 1000, 2100, 3000]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    encrypt_bytes(&mut table, key.wrapping_sub(1));

    let value0 = u32::from_le_bytes([table[0], table[1], table[2], table[3]]);
    let value1 = u32::from_le_bytes([table[4], table[5], table[6], table[7]]);
    assert_eq!(detect_file_seed(value0, value1, 40), Some(key.wrapping_sub(1)));
}
