use super::impacts::write_impacts;
use super::{CompetitiveImpactAccumulator, SkipBlock, SkipCheckpoint, SkipListWrite};
use crate::error::Result;
use crate::options::PostingsOption;
use crate::store::{DataOutput, IndexOutput};

#[derive(Default)]
struct SkipLevel {
    entries: Vec<SkipBlock>,
    impacts: Vec<u8>,
    // impacts of blocks not yet covered by an entry of this level
    pending: CompetitiveImpactAccumulator,
}

impl SkipLevel {
    fn clear(&mut self) {
        self.entries.clear();
        self.impacts.clear();
        self.pending.clear();
    }
}

pub struct SkipWriter {
    multiplier: usize,
    max_levels: usize,
    levels: Vec<SkipLevel>,
    num_blocks: usize,
    doc_base: u64,
    pos_base: u64,
    pay_base: u64,
}

impl SkipWriter {
    pub fn new(option: &PostingsOption) -> Self {
        Self {
            multiplier: option.skip_multiplier as usize,
            max_levels: option.max_skip_levels as usize,
            levels: Vec::new(),
            num_blocks: 0,
            doc_base: 0,
            pos_base: 0,
            pay_base: 0,
        }
    }

    fn level_mut(&mut self, level: usize) -> &mut SkipLevel {
        if self.levels.len() <= level {
            self.levels.resize_with(level + 1, SkipLevel::default);
        }
        &mut self.levels[level]
    }
}

impl SkipListWrite for SkipWriter {
    fn reset_skip(&mut self, doc_fp: u64, pos_fp: u64, pay_fp: u64) {
        self.levels.iter_mut().for_each(SkipLevel::clear);
        self.num_blocks = 0;
        self.doc_base = doc_fp;
        self.pos_base = pos_fp;
        self.pay_base = pay_fp;
    }

    fn buffer_skip(
        &mut self,
        checkpoint: &SkipCheckpoint,
        impacts: &CompetitiveImpactAccumulator,
    ) -> Result<()> {
        self.num_blocks += 1;
        self.level_mut(0).pending.add_all(impacts);

        let mut span = 1usize;
        let mut level = 0;
        while level < self.max_levels && self.num_blocks % span == 0 {
            if level + 1 < self.max_levels {
                self.level_mut(level + 1);
                let (lower, upper) = self.levels.split_at_mut(level + 1);
                upper[0].pending.add_all(&lower[level].pending);
            }
            let entry = SkipBlock {
                doc_fp: checkpoint.doc_fp - self.doc_base,
                pos_fp: checkpoint.pos_fp - self.pos_base,
                pay_fp: checkpoint.pay_fp - self.pay_base,
                last_doc: checkpoint.last_doc,
                pos_buffer_upto: checkpoint.pos_buffer_upto,
                payload_byte_upto: checkpoint.payload_byte_upto,
                impacts_offset: self.levels[level].impacts.len() as u32,
            };
            let current = &mut self.levels[level];
            write_impacts(&current.pending, &mut current.impacts)?;
            current.pending.clear();
            current.entries.push(entry);

            span = span.saturating_mul(self.multiplier);
            level += 1;
        }
        Ok(())
    }

    fn write_skip(&mut self, out: &mut IndexOutput) -> Result<u64> {
        let skip_fp = out.file_pointer();
        let levels: Vec<&SkipLevel> = self
            .levels
            .iter()
            .take_while(|level| !level.entries.is_empty())
            .collect();
        out.write_vint(levels.len() as u32)?;
        out.write_vint(self.multiplier as u32)?;
        for level in levels {
            out.write_vint(level.entries.len() as u32)?;
            out.write_vint(level.impacts.len() as u32)?;
            out.write_bytes(bytemuck::cast_slice(&level.entries))?;
            out.write_bytes(&level.impacts)?;
        }
        tracing::trace!(
            blocks = self.num_blocks,
            bytes = out.file_pointer() - skip_fp,
            "wrote skip data"
        );
        Ok(skip_fp)
    }
}
