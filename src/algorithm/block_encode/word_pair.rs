// two 32-bit lanes per word, values written MSB-first into each lane and
// allowed to straddle words

use super::BlockPackTrait;
use crate::algorithm::int_block::{IntBlock, BLOCK_SIZE_IN_LONGS};

#[derive(Debug, Clone, Copy, Default)]
pub struct WordPairPacking;

#[inline(always)]
fn expand_mask(mask: u64) -> u64 {
    mask | (mask << 32)
}

#[inline(always)]
fn mask(bits: u32) -> u64 {
    expand_mask((1u64 << bits) - 1)
}

impl BlockPackTrait for WordPairPacking {
    fn pack(&self, block: &IntBlock, bits_per_value: u32, words: &mut [u64]) {
        let bpv = bits_per_value as i32;
        let mut next_block = 0u64;
        let mut bits_left = 32i32;
        let mut out = 0;
        for &pair in block.longs() {
            bits_left -= bpv;
            if bits_left > 0 {
                next_block |= pair << bits_left;
            } else if bits_left == 0 {
                next_block |= pair;
                words[out] = next_block;
                out += 1;
                next_block = 0;
                bits_left = 32;
            } else {
                let deficit = (-bits_left) as u32;
                next_block |= (pair >> deficit) & mask(bits_per_value - deficit);
                words[out] = next_block;
                out += 1;
                next_block = (pair & mask(deficit)) << (32 - deficit);
                bits_left += 32;
            }
        }
        debug_assert_eq!(out, words.len());
    }

    fn unpack(&self, words: &[u64], bits_per_value: u32, block: &mut IntBlock) {
        let pairs = block.longs_mut();
        macro_rules! specialize {
            ($($n:literal)*) => {
                match bits_per_value {
                    $($n => unpack_fixed::<$n>(words, pairs),)*
                    _ => unpack_generic(bits_per_value, words, pairs),
                }
            };
        }
        specialize!(1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24);
    }
}

#[inline(always)]
fn unpack_pairs(bpv: u32, words: &[u64], pairs: &mut [u64; BLOCK_SIZE_IN_LONGS]) {
    let value_mask = mask(bpv);
    let mut current = words[0];
    let mut idx = 1;
    let mut bits_left = 32i32;
    for pair in pairs.iter_mut() {
        bits_left -= bpv as i32;
        if bits_left < 0 {
            let deficit = (-bits_left) as u32;
            let next = words[idx];
            idx += 1;
            *pair = ((current & mask(bpv - deficit)) << deficit)
                | ((next >> (32 - deficit)) & mask(deficit));
            current = next;
            bits_left += 32;
        } else {
            *pair = (current >> bits_left) & value_mask;
        }
    }
}

// constant bit width lets the compiler fold masks and shifts and drop the
// bounds checks on `words`
fn unpack_fixed<const BPV: u32>(words: &[u64], pairs: &mut [u64; BLOCK_SIZE_IN_LONGS]) {
    unpack_pairs(BPV, &words[..2 * BPV as usize], pairs)
}

#[inline(never)]
fn unpack_generic(bpv: u32, words: &[u64], pairs: &mut [u64; BLOCK_SIZE_IN_LONGS]) {
    unpack_pairs(bpv, words, pairs)
}
