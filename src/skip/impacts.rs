use std::collections::BTreeMap;

use crate::error::Result;
use crate::postings::{DocId, NO_MORE_DOCS};
use crate::store::{DataInput, DataOutput};

/// Upper bound on the score contribution of a document: higher `freq` and
/// lower `norm` score better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Impact {
    pub freq: u32,
    pub norm: u64,
}

/// Competitive impacts by level. Level `i` covers documents up to
/// `doc_id_up_to(i)`; higher levels cover longer ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Impacts {
    levels: Vec<(DocId, Vec<Impact>)>,
}

impl Impacts {
    pub(crate) fn new(levels: Vec<(DocId, Vec<Impact>)>) -> Self {
        debug_assert!(!levels.is_empty());
        Self { levels }
    }

    /// Single level that holds no information beyond "anything is possible".
    pub fn unbounded() -> Self {
        Self {
            levels: vec![(
                NO_MORE_DOCS,
                vec![Impact {
                    freq: u32::MAX,
                    norm: 1,
                }],
            )],
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn doc_id_up_to(&self, level: usize) -> DocId {
        self.levels[level].0
    }

    pub fn get(&self, level: usize) -> &[Impact] {
        &self.levels[level].1
    }
}

/// Keeps the (freq, norm) pairs that are not dominated by another pair with
/// both a higher-or-equal freq and a lower-or-equal norm. Ordered by norm,
/// freq is then strictly increasing.
#[derive(Debug, Clone, Default)]
pub struct CompetitiveImpactAccumulator {
    impacts: BTreeMap<u64, u32>,
}

impl CompetitiveImpactAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, freq: u32, norm: u64) {
        if let Some((_, &best)) = self.impacts.range(..=norm).next_back() {
            if best >= freq {
                return;
            }
        }
        let dominated: Vec<u64> = self
            .impacts
            .range(norm..)
            .take_while(|(_, &f)| f <= freq)
            .map(|(&n, _)| n)
            .collect();
        for n in dominated {
            self.impacts.remove(&n);
        }
        self.impacts.insert(norm, freq);
    }

    pub fn add_all(&mut self, other: &CompetitiveImpactAccumulator) {
        for (&norm, &freq) in &other.impacts {
            self.add(freq, norm);
        }
    }

    pub fn clear(&mut self) {
        self.impacts.clear();
    }

    pub fn len(&self) -> usize {
        self.impacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Impact> + '_ {
        self.impacts
            .iter()
            .map(|(&norm, &freq)| Impact { freq, norm })
    }
}

// deltas minus one between consecutive frontier points; the low bit of the
// freq delta says whether a norm delta follows
pub(crate) fn write_impacts(acc: &CompetitiveImpactAccumulator, out: &mut Vec<u8>) -> Result<()> {
    out.write_vint(acc.len() as u32)?;
    let mut prev = Impact { freq: 0, norm: 0 };
    for impact in acc.iter() {
        let freq_delta = u64::from(impact.freq.wrapping_sub(prev.freq).wrapping_sub(1));
        let norm_delta = impact.norm.wrapping_sub(prev.norm).wrapping_sub(1);
        if norm_delta == 0 {
            out.write_vlong(freq_delta << 1)?;
        } else {
            out.write_vlong((freq_delta << 1) | 1)?;
            out.write_vlong(norm_delta)?;
        }
        prev = impact;
    }
    Ok(())
}

pub(crate) fn read_impacts(data: &mut &[u8]) -> Result<Vec<Impact>> {
    let count = data.read_vint()? as usize;
    let mut impacts = Vec::with_capacity(count.min(256));
    let mut prev = Impact { freq: 0, norm: 0 };
    for _ in 0..count {
        let code = data.read_vlong()?;
        let freq = prev.freq.wrapping_add((code >> 1) as u32).wrapping_add(1);
        let norm = if code & 1 != 0 {
            prev.norm.wrapping_add(data.read_vlong()?).wrapping_add(1)
        } else {
            prev.norm.wrapping_add(1)
        };
        prev = Impact { freq, norm };
        impacts.push(prev);
    }
    Ok(impacts)
}
