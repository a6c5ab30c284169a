//! Packed nucleotide sequence codec.
//!
//! A sequence is stored as 2-bit base codes plus an out-of-band table of
//! "holes": maximal runs of identical ambiguity symbols. Inside a hole the
//! packed code is a deterministic pseudo-random filler, because the alignment
//! engine only understands the four concrete bases but results must be
//! reproducible across runs. The filler generator is seeded from
//! `hole_count ^ length`, never from wall-clock or process state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::alphabet;
use crate::error::{Error, Result};
use crate::pac::PacVec;

/// Longest storable sequence, chosen so that `4 * length` still fits a
/// 32-bit byte offset.
pub const MAX_SEQUENCE_LEN: usize = (i32::MAX / 4) as usize;

/// A maximal run of identical ambiguity symbols, stored out-of-band from the
/// 2-bit buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hole {
    /// Start position of the run.
    pub offset: u64,
    /// Number of consecutive symbols in the run.
    pub len: u32,
    /// The ambiguity symbol covering the run.
    pub symbol: u8,
}

/// Canonical in-memory representation of one nucleotide string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedSequence {
    len: u32,
    padded_len: u32,
    codes: PacVec,
    holes: Vec<Hole>,
}

/// Filler generator for hole and padding positions.
fn filler_rng(hole_count: usize, len: usize) -> StdRng {
    StdRng::seed_from_u64(hole_count as u64 ^ len as u64)
}

impl PackedSequence {
    /// Encode `text` over the allowed alphabet.
    ///
    /// Consecutive identical ambiguous characters merge into one hole; a
    /// change of ambiguous character starts a new hole, even if both are
    /// ambiguous.
    pub fn from_text(text: &str) -> Result<PackedSequence> {
        let bytes = text.as_bytes();
        if bytes.len() > MAX_SEQUENCE_LEN {
            return Err(Error::SequenceTooLong { len: bytes.len() });
        }

        // Pre-pass: validate and count holes, so the filler generator can be
        // seeded before any code is written.
        let mut hole_count = 0usize;
        let mut prev = 0u8;
        for &symbol in bytes {
            if !alphabet::is_allowed(symbol) {
                return Err(Error::InvalidSymbol {
                    symbol: symbol as char,
                });
            }
            if alphabet::code_for(symbol) >= 4 && prev != symbol {
                hole_count += 1;
            }
            prev = symbol;
        }

        let len = bytes.len() as u32;
        let padded_len = (bytes.len().div_ceil(4) * 4) as u32;
        let mut rng = filler_rng(hole_count, bytes.len());
        let mut codes = PacVec::with_capacity(padded_len as usize);
        let mut holes: Vec<Hole> = Vec::with_capacity(hole_count);

        prev = 0;
        for (idx, &symbol) in bytes.iter().enumerate() {
            let code = alphabet::code_for(symbol);
            if code >= 4 {
                if prev == symbol {
                    // Guaranteed by the pre-pass to follow a pushed hole.
                    holes.last_mut().unwrap().len += 1;
                } else {
                    holes.push(Hole {
                        offset: idx as u64,
                        len: 1,
                        symbol,
                    });
                }
                codes.push(rng.gen_range(0u8..4));
            } else {
                codes.push(code);
            }
            prev = symbol;
        }
        for _ in len..padded_len {
            codes.push(rng.gen_range(0u8..4));
        }

        Ok(PackedSequence {
            len,
            padded_len,
            codes,
            holes,
        })
    }

    /// Number of logical symbols.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length rounded up to the packing granularity (multiple of 4).
    pub fn padded_len(&self) -> u32 {
        self.padded_len
    }

    /// The ambiguity runs, sorted by offset, non-overlapping.
    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    /// 2-bit code at `index`. Panics past `padded_len`.
    pub fn code_at(&self, index: usize) -> u8 {
        self.codes.get(index)
    }

    /// The packed byte buffer covering `padded_len` positions.
    pub fn pac_bytes(&self) -> &[u8] {
        self.codes.as_bytes()
    }

    /// Call `f(start, end)` for every maximal block of positions outside any
    /// hole, in order.
    fn for_each_block(&self, mut f: impl FnMut(u64, u64)) {
        let mut p = 0u64;
        for hole in &self.holes {
            if hole.offset > p {
                f(p, hole.offset);
            }
            p = hole.offset + hole.len as u64;
        }
        if p < self.len as u64 {
            f(p, self.len as u64);
        }
    }

    /// Decode back to text. Exact left inverse of `from_text` for all
    /// positions below `len`; padding is never surfaced.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.len as usize);
        let mut holes = self.holes.iter().peekable();
        let mut i = 0u64;
        while i < self.len as u64 {
            if let Some(hole) = holes.peek() {
                if hole.offset == i {
                    for _ in 0..hole.len {
                        text.push(hole.symbol as char);
                    }
                    i += hole.len as u64;
                    holes.next();
                    continue;
                }
            }
            text.push(alphabet::BASE_CHARS[self.codes.get(i as usize) as usize] as char);
            i += 1;
        }
        text
    }

    /// Watson-Crick complement. Every packed code becomes its 2-bit
    /// complement (`3 - code`), hole symbols map through the ambiguity
    /// complement table; length and hole offsets are preserved.
    pub fn complement(&self) -> PackedSequence {
        let mut codes = PacVec::zeroed(self.padded_len as usize);
        for i in 0..self.padded_len as usize {
            codes.set(i, 3 - self.codes.get(i));
        }
        let holes = self
            .holes
            .iter()
            .map(|hole| Hole {
                symbol: alphabet::complement_symbol(hole.symbol),
                ..*hole
            })
            .collect();
        PackedSequence {
            len: self.len,
            padded_len: self.padded_len,
            codes,
            holes,
        }
    }

    /// Symbol order reversed (not complemented). Hole runs are relocated and
    /// order-reversed; filler inside relocated holes and in the trailing
    /// padding is redrawn from the seed discipline used by `from_text`, so
    /// repeated calls on equal inputs are bit-identical.
    pub fn reverse(&self) -> PackedSequence {
        let len = self.len as u64;
        let mut rng = filler_rng(self.holes.len(), self.len as usize);
        let mut codes = PacVec::zeroed(self.padded_len as usize);

        self.for_each_block(|start, end| {
            for i in start..end {
                codes.set((len - i - 1) as usize, self.codes.get(i as usize));
            }
        });

        let holes: Vec<Hole> = self
            .holes
            .iter()
            .rev()
            .map(|hole| Hole {
                offset: len - hole.offset - hole.len as u64,
                ..*hole
            })
            .collect();
        for hole in &holes {
            for i in hole.offset..hole.offset + hole.len as u64 {
                codes.set(i as usize, rng.gen_range(0u8..4));
            }
        }
        for i in self.len..self.padded_len {
            codes.set(i as usize, rng.gen_range(0u8..4));
        }

        PackedSequence {
            len: self.len,
            padded_len: self.padded_len,
            codes,
            holes,
        }
    }

    /// Count occurrences of `symbol`.
    ///
    /// A canonical base counts packed positions outside hole runs; an
    /// ambiguity symbol counts the covered positions of holes carrying
    /// exactly that symbol.
    pub fn occurrences(&self, symbol: u8) -> Result<u32> {
        if !alphabet::is_allowed(symbol) {
            return Err(Error::InvalidSymbol {
                symbol: symbol as char,
            });
        }
        let code = alphabet::code_for(symbol);
        if code >= 4 {
            Ok(self
                .holes
                .iter()
                .filter(|hole| hole.symbol == symbol)
                .map(|hole| hole.len)
                .sum())
        } else {
            let mut count = 0u32;
            self.for_each_block(|start, end| {
                for i in start..end {
                    if self.codes.get(i as usize) == code {
                        count += 1;
                    }
                }
            });
            Ok(count)
        }
    }

    /// Serialize to the opaque blob form consumed by hosting layers:
    /// length-prefixed hole table followed by the packed bytes, all
    /// little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(12 + self.holes.len() * 13 + self.codes.as_bytes().len());
        // Writes to a Vec cannot fail.
        out.write_u32::<LittleEndian>(self.holes.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(self.len).unwrap();
        out.write_u32::<LittleEndian>(self.padded_len).unwrap();
        for hole in &self.holes {
            out.write_u64::<LittleEndian>(hole.offset).unwrap();
            out.write_u32::<LittleEndian>(hole.len).unwrap();
            out.write_u8(hole.symbol).unwrap();
        }
        out.extend_from_slice(self.codes.as_bytes());
        out
    }

    /// Deserialize a blob produced by `to_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<PackedSequence> {
        let mut cursor = Cursor::new(bytes);
        let hole_count = cursor.read_u32::<LittleEndian>()?;
        let len = cursor.read_u32::<LittleEndian>()?;
        let padded_len = cursor.read_u32::<LittleEndian>()?;
        if len as usize > MAX_SEQUENCE_LEN {
            return Err(Error::SequenceTooLong { len: len as usize });
        }
        if padded_len as usize != (len as usize).div_ceil(4) * 4 {
            return Err(Error::MalformedBlob("padded length mismatch"));
        }

        let mut holes = Vec::with_capacity(hole_count as usize);
        let mut prev_end = 0u64;
        for _ in 0..hole_count {
            let offset = cursor.read_u64::<LittleEndian>()?;
            let run_len = cursor.read_u32::<LittleEndian>()?;
            let symbol = cursor.read_u8()?;
            if run_len == 0 || offset < prev_end || offset + run_len as u64 > len as u64 {
                return Err(Error::MalformedBlob("hole table out of order"));
            }
            if !alphabet::is_allowed(symbol) || alphabet::code_for(symbol) < 4 {
                return Err(Error::MalformedBlob("hole symbol is not ambiguous"));
            }
            prev_end = offset + run_len as u64;
            holes.push(Hole {
                offset,
                len: run_len,
                symbol,
            });
        }

        let mut pac = Vec::with_capacity(padded_len as usize / 4);
        cursor.read_to_end(&mut pac)?;
        if pac.len() != padded_len as usize / 4 {
            return Err(Error::MalformedBlob("packed buffer size mismatch"));
        }

        Ok(PackedSequence {
            len,
            padded_len,
            codes: PacVec::from_bytes(pac, padded_len as usize),
            holes,
        })
    }
}

#[cfg(test)]
#[path = "sequence_test.rs"]
mod sequence_test;
