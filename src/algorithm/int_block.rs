use std::fmt;

pub const BLOCK_SIZE: usize = 128;
pub const BLOCK_SIZE_IN_LONGS: usize = BLOCK_SIZE / 2;

/// 128 unsigned 32-bit values stored two per word: even indices in the high
/// half, odd indices in the low half.
#[derive(Clone, PartialEq, Eq)]
pub struct IntBlock {
    longs: [u64; BLOCK_SIZE_IN_LONGS],
}

impl IntBlock {
    pub fn new() -> Self {
        Self {
            longs: [0; BLOCK_SIZE_IN_LONGS],
        }
    }

    pub fn from_slice(values: &[u32]) -> Self {
        assert!(values.len() <= BLOCK_SIZE);
        let mut block = Self::new();
        for (i, &v) in values.iter().enumerate() {
            block.set(i, v);
        }
        block
    }

    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        let shift = ((index + 1) & 1) << 5;
        (self.longs[index >> 1] >> shift) as u32
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: u32) {
        let shift = (1 - (index & 1)) << 5;
        let slot = &mut self.longs[index >> 1];
        *slot = (*slot & !(0xFFFF_FFFFu64 << shift)) | (u64::from(value) << shift);
    }

    pub fn fill(&mut self, value: u32) {
        let value = u64::from(value);
        self.longs.fill((value << 32) | value);
    }

    /// Bit length of the OR of all values, 0 for an all-zero block.
    pub fn bits_required(&self) -> u32 {
        let or = self.longs.iter().fold(0u64, |acc, &l| acc | l);
        let or = (or >> 32) | (or & 0xFFFF_FFFF);
        64 - or.leading_zeros()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..BLOCK_SIZE).map(|i| self.get(i))
    }

    pub(crate) fn longs(&self) -> &[u64; BLOCK_SIZE_IN_LONGS] {
        &self.longs
    }

    pub(crate) fn longs_mut(&mut self) -> &mut [u64; BLOCK_SIZE_IN_LONGS] {
        &mut self.longs
    }
}

impl Default for IntBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IntBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut block = IntBlock::new();
        let values: Vec<u32> = (0..BLOCK_SIZE).map(|_| rand::random()).collect();
        for (i, &v) in values.iter().enumerate() {
            block.set(i, v);
        }
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(block.get(i), v);
        }
        // overwrite does not leak into the neighbour
        block.set(6, 0);
        block.set(7, u32::MAX);
        assert_eq!(block.get(5), values[5]);
        assert_eq!(block.get(6), 0);
        assert_eq!(block.get(7), u32::MAX);
        assert_eq!(block.get(8), values[8]);
    }

    #[test]
    fn test_layout() {
        let mut block = IntBlock::new();
        block.set(0, 1);
        block.set(1, 2);
        assert_eq!(block.longs()[0], (1u64 << 32) | 2);
    }

    #[test]
    fn test_bits_required() {
        let mut block = IntBlock::new();
        assert_eq!(block.bits_required(), 0);
        block.set(77, 1);
        assert_eq!(block.bits_required(), 1);
        block.set(12, 0x1_0000);
        assert_eq!(block.bits_required(), 17);
        block.fill(u32::MAX);
        assert_eq!(block.bits_required(), 32);
    }
}
