//! PKWare DCL explode tests
//!
//! Streams are produced with the test-side [`DclWriter`], so every test
//! states the literals and repetitions it expects back.

mod common;

use common::DclWriter;
use mpqkit::explode::{explode, Exploder, Literal};
use mpqkit::{explode_bytes, DictionarySize, MpqError};

#[test]
fn test_reference_stream() {
    let reference = hex::decode("0004820819aa4bc03f").unwrap();

    let mut writer = DclWriter::new(4);
    writer.literals(b"ABC").repeat(6, 3);
    assert_eq!(writer.finish(), reference);

    assert_eq!(explode_bytes(&reference, 100).unwrap(), b"ABCABCABC");
}

#[test]
fn test_all_dictionary_sizes() {
    let text = b"Hello, World! Hello, World! Hello, World!";
    for dict_bits in [4u8, 5, 6] {
        let mut writer = DclWriter::new(dict_bits);
        writer.literals(&text[..14]).repeat(27, 14);
        let output = explode(&writer.finish(), text.len()).unwrap();
        assert_eq!(&output[..], &text[..], "dictionary bits {}", dict_bits);
    }
}

#[test]
fn test_length_two_uses_short_distance() {
    // Length 2 repetitions carry only two low distance bits
    let mut writer = DclWriter::new(6);
    writer.literals(b"abcdefgh").repeat(2, 7).repeat(2, 1);
    let output = explode(&writer.finish(), 64).unwrap();
    assert_eq!(output, b"abcdefghbccc");
}

#[test]
fn test_longest_repetition() {
    let mut writer = DclWriter::new(5);
    writer.literal(b'z').repeat(518, 1).repeat(518, 1);
    let output = explode(&writer.finish(), 2000).unwrap();
    assert_eq!(output.len(), 1037);
    assert!(output.iter().all(|&b| b == b'z'));
}

#[test]
fn test_far_distance_with_large_dictionary() {
    let prefix: Vec<u8> = (0..4000u32).map(|i| (i * 7 % 251) as u8).collect();
    let mut writer = DclWriter::new(6);
    writer.literals(&prefix).repeat(100, 4000);

    let output = explode(&writer.finish(), 5000).unwrap();
    assert_eq!(output.len(), 4100);
    assert_eq!(&output[4000..], &prefix[..100]);
}

#[test]
fn test_output_is_capped() {
    let mut writer = DclWriter::new(4);
    writer.literals(b"0123456789").repeat(200, 10);
    let stream = writer.finish();

    for expected in [0, 1, 10, 11, 150, 210] {
        assert_eq!(explode(&stream, expected).unwrap().len(), expected);
    }
    assert_eq!(explode(&stream, 1000).unwrap().len(), 210);
}

#[test]
fn test_distance_before_output_start() {
    let mut writer = DclWriter::new(4);
    writer.literals(b"ab").repeat(4, 40);
    assert!(matches!(
        explode(&writer.finish(), 100),
        Err(MpqError::CorruptStream(_))
    ));
}

#[test]
fn test_stream_without_end_marker() {
    // Running out of input ends the stream like the end code does
    let mut stream = vec![0x00, 0x05];
    let mut bits = common::BitWriter::new();
    for &byte in b"no end" {
        bits.write_bits(0, 1).write_bits(u32::from(byte), 8);
    }
    stream.extend(bits.finish());
    assert_eq!(explode(&stream, 100).unwrap(), b"no end");
}

#[test]
fn test_short_distance_code_at_end_of_input() {
    // Six literals and a three byte repetition leave only 7 bits for the
    // 6-bit distance that closes the stream
    let mut writer = DclWriter::new(4);
    writer.literals(b"ABCDEF").repeat(3, 3);
    let stream = writer.finish_unterminated();
    assert_eq!(stream.len(), 2 + 8);

    assert_eq!(explode(&stream, 100).unwrap(), b"ABCDEFDEF");
}

#[test]
fn test_decoder_instructions() {
    let mut writer = DclWriter::new(4);
    writer.literal(b'x').repeat(9, 1);
    let stream = writer.finish();

    let mut exploder = Exploder::new(&stream[2..], DictionarySize::Size1K);
    assert_eq!(exploder.decode_literal().unwrap(), Literal::Byte(b'x'));
    assert_eq!(exploder.decode_literal().unwrap(), Literal::Repeat(9));
    assert_eq!(exploder.decode_distance(9).unwrap(), 1);
    assert_eq!(exploder.decode_literal().unwrap(), Literal::EndOfStream);
}
