//! Seed-and-extend alignment engine.
//!
//! The core only depends on the [`AlignmentEngine`] trait: given a query in
//! 2-bit codes, return raw hit regions in the doubled (forward +
//! reverse-complement) reference coordinate space. [`FmEngine`] is the
//! bundled implementation, built on the `bio` crate's suffix array / BWT /
//! FM-index: exact seed lookup via backward search, then gapless extension
//! with an x-dropoff. Hit translation into per-reference coordinates is the
//! query executor's job, not the engine's.

use std::collections::HashSet;

use bio::alphabets::dna;
use bio::data_structures::bwt::{bwt, less, Less, Occ, BWT};
use bio::data_structures::fmindex::{BackwardSearchResult, FMIndex, FMIndexable};
use bio::data_structures::suffix_array::{suffix_array, RawSuffixArray};

use crate::alphabet::BASE_CHARS;
use crate::cigar::{self, CigarOp};
use crate::error::Result;
use crate::pac::PacVec;

/// Occ checkpoint sampling interval.
const OCC_SAMPLING: u32 = 64;

/// Engine tuning knobs, a pruned rendition of bwa-mem's option block.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Minimum seed length; queries shorter than this produce no hits.
    pub min_seed_len: usize,
    /// Skip a seed if it occurs more often than this in the reference.
    pub max_occ: usize,
    /// Match score.
    pub match_score: i32,
    /// Mismatch penalty (positive).
    pub mismatch_penalty: i32,
    /// Stop extending once the score drops this far below the running best.
    pub x_dropoff: i32,
    /// Minimum score for a region to be reported.
    pub min_output_score: i32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            min_seed_len: 19,
            max_occ: 500,
            match_score: 1,
            mismatch_penalty: 4,
            x_dropoff: 100,
            min_output_score: 19,
        }
    }
}

/// One raw hit region, in doubled-axis reference coordinates.
#[derive(Debug, Clone)]
pub struct RawHit {
    pub ref_begin: u64,
    pub ref_end: u64,
    pub query_begin: usize,
    pub query_end: usize,
    pub ops: Vec<(CigarOp, u32)>,
    pub score: i32,
    pub is_secondary: bool,
}

/// The black-box search contract the index holds on to.
pub trait AlignmentEngine: Send + Sync {
    /// Find hit regions for a query given as 2-bit base codes.
    fn find_regions(&self, query: &[u8]) -> Result<Vec<RawHit>>;
}

/// FM-index backed seed-and-extend engine over the doubled reference buffer.
pub struct FmEngine {
    /// Doubled reference text in ASCII bases, sentinel-terminated.
    text: Vec<u8>,
    sa: RawSuffixArray,
    fm: FMIndex<BWT, Less, Occ>,
    opts: EngineOptions,
    /// Length of the forward half; positions at or past this are on the
    /// reverse-complement strand.
    forward_len: u64,
}

impl FmEngine {
    /// Build the search structure from the doubled packed buffer.
    pub fn build(bwt_pac: &PacVec, opts: EngineOptions) -> Result<FmEngine> {
        let total = bwt_pac.len();
        debug_assert_eq!(total % 2, 0);

        let mut text = Vec::with_capacity(total + 1);
        for i in 0..total {
            text.push(BASE_CHARS[bwt_pac.get(i) as usize]);
        }
        text.push(b'$');

        let alphabet = dna::n_alphabet();
        let sa = suffix_array(&text);
        let bwt_vec = bwt(&text, &sa);
        let less_vec = less(&bwt_vec, &alphabet);
        let occ = Occ::new(&bwt_vec, OCC_SAMPLING, &alphabet);
        let fm = FMIndex::new(bwt_vec, less_vec, occ);

        log::debug!(
            "built FM-index over {} bases ({} forward)",
            total,
            total / 2
        );

        Ok(FmEngine {
            text,
            sa,
            fm,
            opts,
            forward_len: (total / 2) as u64,
        })
    }

    /// Positions of every exact occurrence of `seed` in the doubled text.
    fn seed_positions(&self, seed: &[u8]) -> Vec<usize> {
        match self.fm.backward_search(seed.iter()) {
            BackwardSearchResult::Complete(interval) => interval.occ(&self.sa),
            _ => Vec::new(),
        }
    }

    /// Gapless extension of a seed anchor in both directions, clamped to the
    /// anchor's strand half so no region bridges the forward/reverse
    /// boundary.
    fn extend(&self, qtext: &[u8], seed_qstart: usize, seed_rstart: u64) -> Option<RawHit> {
        let msl = self.opts.min_seed_len as u64;
        let a = self.opts.match_score;
        let b = self.opts.mismatch_penalty;
        let l = self.forward_len;

        let (low, high) = if seed_rstart < l { (0, l) } else { (l, 2 * l) };
        if seed_rstart + msl > high {
            return None;
        }

        let qlen = qtext.len();

        // Right extension from the seed's end.
        let mut score = msl as i32 * a;
        let mut best = score;
        let (mut qe, mut re) = (seed_qstart + msl as usize, seed_rstart + msl);
        let (mut best_qe, mut best_re) = (qe, re);
        while qe < qlen && re < high {
            score += if qtext[qe] == self.text[re as usize] { a } else { -b };
            qe += 1;
            re += 1;
            if score > best {
                best = score;
                best_qe = qe;
                best_re = re;
            } else if best - score > self.opts.x_dropoff {
                break;
            }
        }

        // Left extension from the seed's start.
        let mut score = best;
        let (mut qb, mut rb) = (seed_qstart, seed_rstart);
        let (mut best_qb, mut best_rb) = (qb, rb);
        while qb > 0 && rb > low {
            score += if qtext[qb - 1] == self.text[rb as usize - 1] { a } else { -b };
            qb -= 1;
            rb -= 1;
            if score > best {
                best = score;
                best_qb = qb;
                best_rb = rb;
            } else if best - score > self.opts.x_dropoff {
                break;
            }
        }

        let (qb, qe) = (best_qb, best_qe);
        let mut ops = Vec::with_capacity(3);
        if qb > 0 {
            ops.push((CigarOp::S, qb as u32));
        }
        ops.push((CigarOp::M, (qe - qb) as u32));
        if qe < qlen {
            ops.push((CigarOp::S, (qlen - qe) as u32));
        }
        debug_assert_eq!(cigar::query_length(&ops) as usize, qlen);
        debug_assert_eq!(cigar::reference_length(&ops) as u64, best_re - best_rb);

        Some(RawHit {
            ref_begin: best_rb,
            ref_end: best_re,
            query_begin: qb,
            query_end: qe,
            ops,
            score: best,
            is_secondary: false,
        })
    }

    /// Two regions compete for the same query locus if their query intervals
    /// overlap by at least half of the shorter one.
    fn query_overlaps(a: &RawHit, b: &RawHit) -> bool {
        let begin = a.query_begin.max(b.query_begin);
        let end = a.query_end.min(b.query_end);
        if begin >= end {
            return false;
        }
        let overlap = end - begin;
        let shorter = (a.query_end - a.query_begin).min(b.query_end - b.query_begin);
        overlap * 2 >= shorter
    }
}

impl AlignmentEngine for FmEngine {
    fn find_regions(&self, query: &[u8]) -> Result<Vec<RawHit>> {
        let qlen = query.len();
        let msl = self.opts.min_seed_len;
        if qlen < msl {
            return Ok(Vec::new());
        }
        let qtext: Vec<u8> = query.iter().map(|&c| BASE_CHARS[c as usize]).collect();

        // Fixed-length seed windows; the final window is anchored to the
        // query's tail so its last bases are always seeded.
        let mut starts: Vec<usize> = (0..=qlen - msl).step_by(msl).collect();
        if starts.last() != Some(&(qlen - msl)) {
            starts.push(qlen - msl);
        }

        let mut regions = Vec::new();
        let mut seen_diagonals: HashSet<u64> = HashSet::new();
        for &qs in &starts {
            let seed = &qtext[qs..qs + msl];
            let mut positions = self.seed_positions(seed);
            if positions.is_empty() {
                continue;
            }
            if positions.len() > self.opts.max_occ {
                log::debug!(
                    "seed at query offset {} has {} occurrences, skipping (cap {})",
                    qs,
                    positions.len(),
                    self.opts.max_occ
                );
                continue;
            }
            positions.sort_unstable();
            for pos in positions {
                if pos < qs {
                    continue;
                }
                // One extension per diagonal: seeds of the same alignment
                // land on the same diagonal and would rediscover it.
                let diagonal = (pos - qs) as u64;
                if !seen_diagonals.insert(diagonal) {
                    continue;
                }
                if let Some(hit) = self.extend(&qtext, qs, pos as u64) {
                    regions.push(hit);
                }
            }
        }

        regions.retain(|r| r.score >= self.opts.min_output_score);
        regions.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.ref_begin.cmp(&b.ref_begin))
        });

        // Best-scoring region per query locus family stays primary; any
        // lower-scoring region overlapping a kept one becomes secondary.
        let mut kept: Vec<RawHit> = Vec::with_capacity(regions.len());
        for mut region in regions {
            region.is_secondary = kept
                .iter()
                .any(|k| !k.is_secondary && Self::query_overlaps(k, &region));
            kept.push(region);
        }
        Ok(kept)
    }
}
