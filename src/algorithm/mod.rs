mod block_encode;
mod int_block;

pub use block_encode::{
    encoded_size, BlockPackTrait, BlockPacking, ForUtil, MAX_BITS_PER_VALUE,
};
pub use int_block::{IntBlock, BLOCK_SIZE, BLOCK_SIZE_IN_LONGS};
