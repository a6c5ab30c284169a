use super::*;
use crate::error::Error;
use proptest::prelude::*;

fn allowed_text(max: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop::sample::select(crate::alphabet::ALLOWED_NUCLEOTIDES.to_vec()),
        0..max,
    )
    .prop_map(|bytes| String::from_utf8(bytes).unwrap())
}

#[test]
fn encode_acgtnnnacgt() {
    let seq = PackedSequence::from_text("ACGTNNNACGT").unwrap();
    assert_eq!(seq.len(), 11);
    assert_eq!(seq.padded_len(), 12);
    assert_eq!(seq.holes().len(), 1);
    assert_eq!(
        seq.holes()[0],
        Hole {
            offset: 4,
            len: 3,
            symbol: b'N'
        }
    );
    // Canonical positions carry their base codes; hole and padding positions
    // carry filler, which is only required to be a valid 2-bit code.
    for (i, code) in [0u8, 1, 2, 3].into_iter().enumerate() {
        assert_eq!(seq.code_at(i), code);
        assert_eq!(seq.code_at(7 + i), code);
    }
    for i in 4..7 {
        assert!(seq.code_at(i) < 4);
    }
}

#[test]
fn encode_is_deterministic() {
    let a = PackedSequence::from_text("ACGTNNNACGTWWACGTNN").unwrap();
    let b = PackedSequence::from_text("ACGTNNNACGTWWACGTNN").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.pac_bytes(), b.pac_bytes());
}

#[test]
fn empty_text_round_trips() {
    let seq = PackedSequence::from_text("").unwrap();
    assert_eq!(seq.len(), 0);
    assert_eq!(seq.padded_len(), 0);
    assert!(seq.holes().is_empty());
    assert_eq!(seq.to_text(), "");
}

#[test]
fn hole_runs_split_on_symbol_change() {
    // Identical consecutive ambiguity symbols merge; a change of symbol
    // starts a new hole even though both are ambiguous.
    let seq = PackedSequence::from_text("ANNNWWNA").unwrap();
    let holes = seq.holes();
    assert_eq!(holes.len(), 3);
    assert_eq!((holes[0].offset, holes[0].len, holes[0].symbol), (1, 3, b'N'));
    assert_eq!((holes[1].offset, holes[1].len, holes[1].symbol), (4, 2, b'W'));
    assert_eq!((holes[2].offset, holes[2].len, holes[2].symbol), (6, 1, b'N'));
}

#[test]
fn leading_and_trailing_holes() {
    let seq = PackedSequence::from_text("NNACGTNN").unwrap();
    assert_eq!(seq.holes().len(), 2);
    assert_eq!(seq.to_text(), "NNACGTNN");
}

#[test]
fn invalid_symbols_are_rejected() {
    assert!(matches!(
        PackedSequence::from_text("ACGTX"),
        Err(Error::InvalidSymbol { symbol: 'X' })
    ));
    // Lowercase is deliberately outside the stored alphabet.
    assert!(matches!(
        PackedSequence::from_text("acgt"),
        Err(Error::InvalidSymbol { symbol: 'a' })
    ));
    assert!(matches!(
        PackedSequence::from_text("ACGT-ACGT"),
        Err(Error::InvalidSymbol { symbol: '-' })
    ));
}

#[test]
fn complement_maps_bases_and_hole_symbols() {
    let seq = PackedSequence::from_text("ACGTNWSMKRYBDHV").unwrap();
    let comp = seq.complement();
    assert_eq!(comp.to_text(), "TGCANWSKMYRVHDB");
    assert_eq!(comp.len(), seq.len());
    // Hole offsets and lengths are preserved.
    for (original, complemented) in seq.holes().iter().zip(comp.holes()) {
        assert_eq!(original.offset, complemented.offset);
        assert_eq!(original.len, complemented.len);
    }
    // Packed codes complement everywhere, hole positions included.
    for i in 0..seq.padded_len() as usize {
        assert_eq!(comp.code_at(i), 3 - seq.code_at(i));
    }
}

#[test]
fn reverse_relocates_holes() {
    let seq = PackedSequence::from_text("ACGTNNNACGT").unwrap();
    let rev = seq.reverse();
    assert_eq!(rev.to_text(), "TGCANNNTGCA");
    assert_eq!(rev.holes().len(), 1);
    assert_eq!(
        rev.holes()[0],
        Hole {
            offset: 4,
            len: 3,
            symbol: b'N'
        }
    );

    let seq = PackedSequence::from_text("NNACGTW").unwrap();
    let rev = seq.reverse();
    assert_eq!(rev.to_text(), "WTGCANN");
    assert_eq!((rev.holes()[0].offset, rev.holes()[0].len), (0, 1));
    assert_eq!((rev.holes()[1].offset, rev.holes()[1].len), (5, 2));
}

#[test]
fn reverse_is_bit_identical_across_calls() {
    let seq = PackedSequence::from_text("ACGTNNWACGTACGNNNT").unwrap();
    assert_eq!(seq.reverse(), seq.reverse());
    assert_eq!(seq.reverse().pac_bytes(), seq.reverse().pac_bytes());
}

#[test]
fn occurrences_counts_bases_outside_holes() {
    let seq = PackedSequence::from_text("ACGTNNNACGT").unwrap();
    assert_eq!(seq.occurrences(b'A').unwrap(), 2);
    assert_eq!(seq.occurrences(b'C').unwrap(), 2);
    assert_eq!(seq.occurrences(b'G').unwrap(), 2);
    assert_eq!(seq.occurrences(b'T').unwrap(), 2);
    assert_eq!(seq.occurrences(b'N').unwrap(), 3);
    assert_eq!(seq.occurrences(b'W').unwrap(), 0);
    assert!(matches!(
        seq.occurrences(b'X'),
        Err(Error::InvalidSymbol { symbol: 'X' })
    ));
}

#[test]
fn occurrences_distinguishes_hole_symbols() {
    let seq = PackedSequence::from_text("NNWWWNKK").unwrap();
    assert_eq!(seq.occurrences(b'N').unwrap(), 3);
    assert_eq!(seq.occurrences(b'W').unwrap(), 3);
    assert_eq!(seq.occurrences(b'K').unwrap(), 2);
    assert_eq!(seq.occurrences(b'A').unwrap(), 0);
}

#[test]
fn blob_round_trips() {
    let seq = PackedSequence::from_text("ACGTNNNACGTWWACGT").unwrap();
    let blob = seq.to_bytes();
    let back = PackedSequence::from_bytes(&blob).unwrap();
    assert_eq!(back, seq);
    assert_eq!(back.to_text(), "ACGTNNNACGTWWACGT");
}

#[test]
fn truncated_blob_is_rejected() {
    let seq = PackedSequence::from_text("ACGTNNNACGT").unwrap();
    let blob = seq.to_bytes();
    assert!(PackedSequence::from_bytes(&blob[..blob.len() - 1]).is_err());
    assert!(PackedSequence::from_bytes(&blob[..6]).is_err());
}

#[test]
fn malformed_blob_headers_are_rejected() {
    let seq = PackedSequence::from_text("ACGT").unwrap();
    let mut blob = seq.to_bytes();
    // Corrupt the padded length field.
    blob[8] = 7;
    assert!(matches!(
        PackedSequence::from_bytes(&blob),
        Err(Error::MalformedBlob(_))
    ));

    // A length beyond the addressable range is rejected before any
    // allocation happens.
    let mut huge = seq.to_bytes();
    huge[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        PackedSequence::from_bytes(&huge),
        Err(Error::SequenceTooLong { .. })
    ));
}

proptest! {
    #[test]
    fn prop_round_trip(text in allowed_text(256)) {
        let seq = PackedSequence::from_text(&text).unwrap();
        prop_assert_eq!(seq.to_text(), text);
    }

    #[test]
    fn prop_occurrences_sum_to_length(text in allowed_text(256)) {
        let seq = PackedSequence::from_text(&text).unwrap();
        let bases: u32 = b"ACGT".iter().map(|&b| seq.occurrences(b).unwrap()).sum();
        let holes: u32 = seq.holes().iter().map(|h| h.len).sum();
        prop_assert_eq!(bases + holes, seq.len());
    }

    #[test]
    fn prop_complement_involution(text in allowed_text(256)) {
        let seq = PackedSequence::from_text(&text).unwrap();
        prop_assert_eq!(seq.complement().complement().to_text(), text);
    }

    #[test]
    fn prop_reverse_involution(text in allowed_text(256)) {
        let seq = PackedSequence::from_text(&text).unwrap();
        prop_assert_eq!(seq.reverse().reverse().to_text(), text);
    }

    #[test]
    fn prop_blob_round_trip(text in allowed_text(256)) {
        let seq = PackedSequence::from_text(&text).unwrap();
        prop_assert_eq!(PackedSequence::from_bytes(&seq.to_bytes()).unwrap(), seq);
    }
}
