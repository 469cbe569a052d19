//! Magic bitboard attack tables for the sliding pieces.
//!
//! Rook and bishop attacks under blockers are answered by a perfect hash:
//! `idx = ((occupied & mask) * magic) >> (64 - mask.len())`, indexing a
//! shared lookup pool. Rook squares are paired along the long diagonal and
//! bishop squares are grouped in 16 quadruples so that paired squares share
//! one pool slice; a colliding entry then holds the union of both attack
//! sets, which the per-square post-mask strips back down. The pairing is
//! safe because the polluting squares either lie off the query square's
//! rays or are adjacent and therefore always attacked.
//!
//! The magic multipliers are found once at table construction by the same
//! search the original offline generator runs: sparse random candidates
//! validated for index uniqueness over every occupancy submask. A fixed
//! PRNG seed keeps the tables reproducible.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::geometry::{BISHOP_DELTAS, ROOK_DELTAS};
use crate::board::types::{Bitboard, Square};

const MAGIC_SEED: u64 = 0x3141592653589793;

const ROOK_LOOKUP_SIZE: usize = 65536;
const BISHOP_LOOKUP_SIZE: usize = 1792;

const FILE_FRAME: Bitboard = Bitboard(0xff000000000000ff);
const RANK_FRAME: Bitboard = Bitboard(0x8181818181818181);
const DIAG_FRAME: Bitboard = Bitboard(0xff818181818181ff);

struct MagicOffsets {
    lo: [usize; 64],
    total: usize,
}

/// The capability set distinguishing the two sliding pieces: ray deltas,
/// relevance/post masks and the shared-pool offset layout.
trait MagicKind {
    const DELTAS: [(i8, i8); 4];
    const LOOKUP_SIZE: usize;

    fn build_mask(sq: Square) -> Bitboard;
    fn build_post_mask(sq: Square) -> Bitboard;
    fn init_offsets() -> MagicOffsets;
}

struct RookMagic;

impl MagicKind for RookMagic {
    const DELTAS: [(i8, i8); 4] = ROOK_DELTAS;
    const LOOKUP_SIZE: usize = ROOK_LOOKUP_SIZE;

    fn build_mask(sq: Square) -> Bitboard {
        ((Bitboard::file(sq.file()) & !FILE_FRAME) | (Bitboard::rank(sq.rank()) & !RANK_FRAME))
            & !Bitboard::from_square(sq)
    }

    fn build_post_mask(sq: Square) -> Bitboard {
        Bitboard::file(sq.file()) ^ Bitboard::rank(sq.rank())
    }

    fn init_offsets() -> MagicOffsets {
        let mut offs = MagicOffsets {
            lo: [0; 64],
            total: 0,
        };
        for idx in 0..64usize {
            // Pair each square with its long-diagonal neighbor.
            let other = idx ^ 9;
            if idx > other {
                continue;
            }
            let max_len = Self::build_mask(Square::from_index(idx))
                .len()
                .max(Self::build_mask(Square::from_index(other)).len());
            offs.lo[idx] = offs.total;
            offs.lo[other] = offs.total;
            offs.total += 1 << max_len;
        }
        offs
    }
}

struct BishopMagic;

impl MagicKind for BishopMagic {
    const DELTAS: [(i8, i8); 4] = BISHOP_DELTAS;
    const LOOKUP_SIZE: usize = BISHOP_LOOKUP_SIZE;

    fn build_mask(sq: Square) -> Bitboard {
        (Bitboard::diag(sq.diag()) ^ Bitboard::antidiag(sq.antidiag())) & !DIAG_FRAME
    }

    fn build_post_mask(sq: Square) -> Bitboard {
        Bitboard::diag(sq.diag()) ^ Bitboard::antidiag(sq.antidiag())
    }

    fn init_offsets() -> MagicOffsets {
        // 16 groups of four squares each share a pool slice. A group holds
        // the squares `start + j * step` for j = 0..4.
        const STARTS: [usize; 16] = [0, 1, 32, 33, 2, 10, 18, 26, 34, 42, 50, 58, 6, 7, 38, 39];
        const STEPS: [usize; 16] = [8, 8, 8, 8, 1, 1, 1, 1, 1, 1, 1, 1, 8, 8, 8, 8];

        let mut offs = MagicOffsets {
            lo: [0; 64],
            total: 0,
        };
        for g in 0..16 {
            let mut max_len = 0;
            for j in 0..4 {
                let idx = STARTS[g] + j * STEPS[g];
                max_len = max_len.max(Self::build_mask(Square::from_index(idx)).len());
            }
            for j in 0..4 {
                offs.lo[STARTS[g] + j * STEPS[g]] = offs.total;
            }
            offs.total += 1 << max_len;
        }
        offs
    }
}

#[derive(Clone, Copy)]
struct MagicEntry {
    magic: u64,
    shift: u32,
    index: usize,
    mask: Bitboard,
    post_mask: Bitboard,
}

struct MagicTable {
    entries: [MagicEntry; 64],
    lookup: Vec<Bitboard>,
}

/// A magic is valid iff every occupancy submask of the relevance mask maps
/// to a distinct index.
fn is_valid_magic(mask: Bitboard, magic: u64) -> bool {
    let shift = mask.len();
    let submask_cnt = 1u64 << shift;
    let mut used = vec![false; submask_cnt as usize];
    for submask in 0..submask_cnt {
        let occupied = mask.deposit_bits(submask);
        let idx = (occupied.0.wrapping_mul(magic) >> (64 - shift)) as usize;
        if used[idx] {
            return false;
        }
        used[idx] = true;
    }
    true
}

fn find_magic(mask: Bitboard, rng: &mut StdRng) -> u64 {
    loop {
        // Sparse candidates (each bit set with probability 1/8) are far
        // more likely to be valid magics than uniform ones.
        let candidate = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
        if is_valid_magic(mask, candidate) {
            return candidate;
        }
    }
}

/// Walk each ray from `sq`, stopping behind the first blocker in `occupied`.
fn ray_attacks(sq: Square, occupied: Bitboard, deltas: &[(i8, i8)]) -> Bitboard {
    let mut res = Bitboard::EMPTY;
    for &(df, dr) in deltas {
        let mut pos = sq;
        while let Some(next) = pos.shift(df, dr) {
            res.set(next);
            if occupied.has(next) {
                break;
            }
            pos = next;
        }
    }
    res
}

fn build_table<M: MagicKind>() -> MagicTable {
    let offs = M::init_offsets();
    assert_eq!(offs.total, M::LOOKUP_SIZE, "unexpected lookup table size");

    let mut rng = StdRng::seed_from_u64(MAGIC_SEED);
    let mut lookup = vec![Bitboard::EMPTY; M::LOOKUP_SIZE];
    let mut entries = [MagicEntry {
        magic: 0,
        shift: 0,
        index: 0,
        mask: Bitboard::EMPTY,
        post_mask: Bitboard::EMPTY,
    }; 64];

    for idx in 0..64 {
        let sq = Square::from_index(idx);
        let mask = M::build_mask(sq);
        let shift = mask.len();
        let magic = find_magic(mask, &mut rng);

        entries[idx] = MagicEntry {
            magic,
            shift: 64 - shift,
            index: offs.lo[idx],
            mask,
            post_mask: M::build_post_mask(sq),
        };

        let submask_cnt = 1u64 << shift;
        for submask in 0..submask_cnt {
            let occupied = mask.deposit_bits(submask);
            let slot = (occupied.0.wrapping_mul(magic) >> (64 - shift)) as usize;
            let target = &mut lookup[slot + offs.lo[idx]];
            // Entries shared between paired squares accumulate both attack
            // sets; the post-mask at query time strips the foreign bits.
            *target |= ray_attacks(sq, occupied, &M::DELTAS);
            target.unset(sq);
        }
    }

    MagicTable { entries, lookup }
}

static ROOK_TABLE: Lazy<MagicTable> = Lazy::new(build_table::<RookMagic>);
static BISHOP_TABLE: Lazy<MagicTable> = Lazy::new(build_table::<BishopMagic>);

#[inline]
fn table_attacks(table: &MagicTable, sq: Square, occupied: Bitboard) -> Bitboard {
    let entry = &table.entries[sq.index()];
    let idx = ((occupied.0 & entry.mask.0).wrapping_mul(entry.magic) >> entry.shift) as usize;
    table.lookup[idx + entry.index] & entry.post_mask
}

/// Squares a rook on `sq` attacks given the full occupancy.
#[inline]
pub(crate) fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    table_attacks(&ROOK_TABLE, sq, occupied)
}

/// Squares a bishop on `sq` attacks given the full occupancy.
#[inline]
pub(crate) fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    table_attacks(&BISHOP_TABLE, sq, occupied)
}
