// values are first transposed into 8, 16 or 32-bit lanes (8, 4 or 2 values
// per word depending on the bit width) and the lanes are then packed by
// shifting whole words, so every step works on all lanes at once

use super::BlockPackTrait;
use crate::algorithm::int_block::{IntBlock, BLOCK_SIZE};

#[derive(Debug, Clone, Copy, Default)]
pub struct LanePacking;

/// `bits` low bits set in every `PRIM`-bit lane of a word.
#[inline(always)]
const fn lane_mask<const PRIM: u32>(bits: u32) -> u64 {
    let mut mask = (1u64 << bits) - 1;
    let mut width = PRIM;
    while width < 64 {
        mask |= mask << width;
        width *= 2;
    }
    mask
}

#[inline(always)]
const fn num_longs<const PRIM: u32>() -> usize {
    2 * PRIM as usize
}

fn collapse<const PRIM: u32>(values: &[u64; BLOCK_SIZE], longs: &mut [u64]) {
    let n = num_longs::<PRIM>();
    let lanes = 64 / PRIM as usize;
    for (i, long) in longs[..n].iter_mut().enumerate() {
        let mut acc = 0u64;
        for j in 0..lanes {
            acc |= values[j * n + i] << (64 - PRIM as usize * (j + 1));
        }
        *long = acc;
    }
}

fn expand<const PRIM: u32>(longs: &[u64], values: &mut [u64; BLOCK_SIZE]) {
    let n = num_longs::<PRIM>();
    let lanes = 64 / PRIM as usize;
    let mask = lane_mask::<64>(PRIM);
    for (i, &long) in longs[..n].iter().enumerate() {
        for j in 0..lanes {
            values[j * n + i] = (long >> (64 - PRIM as usize * (j + 1))) & mask;
        }
    }
}

fn pack_lanes<const PRIM: u32>(values: &[u64; BLOCK_SIZE], bpv: u32, words: &mut [u64]) {
    let n = num_longs::<PRIM>();
    let mut collapsed = [0u64; 64];
    collapse::<PRIM>(values, &mut collapsed);
    let longs = &collapsed[..n];

    words.fill(0);
    let mut idx = 0;
    let mut shift = PRIM as i32 - bpv as i32;
    while shift >= 0 {
        for word in words.iter_mut() {
            *word |= longs[idx] << shift;
            idx += 1;
        }
        shift -= bpv as i32;
    }

    let remaining_bits_per_long = (shift + bpv as i32) as u32;
    let mask_remaining = lane_mask::<PRIM>(remaining_bits_per_long);
    let mut word_idx = 0;
    let mut remaining_bits_per_value = bpv;
    while idx < n {
        if remaining_bits_per_value >= remaining_bits_per_long {
            remaining_bits_per_value -= remaining_bits_per_long;
            words[word_idx] |= (longs[idx] >> remaining_bits_per_value) & mask_remaining;
            word_idx += 1;
            if remaining_bits_per_value == 0 {
                idx += 1;
                remaining_bits_per_value = bpv;
            }
        } else {
            let head = lane_mask::<PRIM>(remaining_bits_per_value);
            let tail = lane_mask::<PRIM>(remaining_bits_per_long - remaining_bits_per_value);
            words[word_idx] |=
                (longs[idx] & head) << (remaining_bits_per_long - remaining_bits_per_value);
            idx += 1;
            remaining_bits_per_value = bpv - remaining_bits_per_long + remaining_bits_per_value;
            words[word_idx] |= (longs[idx] >> remaining_bits_per_value) & tail;
            word_idx += 1;
        }
    }
}

fn unpack_lanes<const PRIM: u32>(words: &[u64], bpv: u32, values: &mut [u64; BLOCK_SIZE]) {
    let n = num_longs::<PRIM>();
    let mut longs = [0u64; 64];
    let value_mask = lane_mask::<PRIM>(bpv);

    let mut idx = 0;
    let mut shift = PRIM as i32 - bpv as i32;
    while shift >= 0 {
        for &word in words {
            longs[idx] = (word >> shift) & value_mask;
            idx += 1;
        }
        shift -= bpv as i32;
    }

    let remaining_bits_per_long = (shift + bpv as i32) as u32;
    let mask_remaining = lane_mask::<PRIM>(remaining_bits_per_long);
    let mut word_idx = 0;
    // unread low bits of `words[word_idx]`
    let mut remaining_bits = remaining_bits_per_long;
    while idx < n {
        let mut b = bpv - remaining_bits;
        let mut value = (words[word_idx] & lane_mask::<PRIM>(remaining_bits)) << b;
        word_idx += 1;
        while b >= remaining_bits_per_long {
            b -= remaining_bits_per_long;
            value |= (words[word_idx] & mask_remaining) << b;
            word_idx += 1;
        }
        if b > 0 {
            value |= (words[word_idx] >> (remaining_bits_per_long - b)) & lane_mask::<PRIM>(b);
            remaining_bits = remaining_bits_per_long - b;
        } else {
            remaining_bits = remaining_bits_per_long;
        }
        longs[idx] = value;
        idx += 1;
    }

    expand::<PRIM>(&longs, values);
}

impl BlockPackTrait for LanePacking {
    fn pack(&self, block: &IntBlock, bits_per_value: u32, words: &mut [u64]) {
        let mut values = [0u64; BLOCK_SIZE];
        for (i, v) in values.iter_mut().enumerate() {
            *v = u64::from(block.get(i));
        }
        match bits_per_value {
            0..=8 => pack_lanes::<8>(&values, bits_per_value, words),
            9..=16 => pack_lanes::<16>(&values, bits_per_value, words),
            _ => pack_lanes::<32>(&values, bits_per_value, words),
        }
    }

    fn unpack(&self, words: &[u64], bits_per_value: u32, block: &mut IntBlock) {
        let mut values = [0u64; BLOCK_SIZE];
        match bits_per_value {
            0..=8 => unpack_lanes::<8>(words, bits_per_value, &mut values),
            9..=16 => unpack_lanes::<16>(words, bits_per_value, &mut values),
            _ => unpack_lanes::<32>(words, bits_per_value, &mut values),
        }
        for (i, &v) in values.iter().enumerate() {
            block.set(i, v as u32);
        }
    }
}
