//! Block layout of a chunked transfer.

/// Bytes per transfer block. Fixed by the display bootloader.
pub const BLOCK_SIZE: usize = 4096;

/// How an image of a given size is split into acknowledged blocks.
///
/// Every block is [`BLOCK_SIZE`] bytes except the last, which carries the
/// remainder. A remainder of zero means the last block is a full one; an
/// empty trailing block is never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkPlan {
    total: u32,
    blocks: usize,
    last_block: usize,
}

impl ChunkPlan {
    /// Plan the transfer of `total` bytes.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(total: u32) -> Self {
        // u32 -> usize is lossless on every supported host
        let total_len = total as usize;
        let blocks = total_len.div_ceil(BLOCK_SIZE);
        let last_block = match total_len % BLOCK_SIZE {
            0 if blocks > 0 => BLOCK_SIZE,
            rem => rem,
        };

        Self {
            total,
            blocks,
            last_block,
        }
    }

    /// Total bytes to transfer.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of blocks.
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Size of the final block.
    pub fn last_block(&self) -> usize {
        self.last_block
    }

    /// Size of block `index` (zero-based), or `None` past the end.
    pub fn block_len(&self, index: usize) -> Option<usize> {
        match index {
            i if i + 1 < self.blocks => Some(BLOCK_SIZE),
            i if i + 1 == self.blocks => Some(self.last_block),
            _ => None,
        }
    }

    /// Sizes of every block, in transfer order.
    pub fn block_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.blocks).filter_map(|i| self.block_len(i))
    }
}
