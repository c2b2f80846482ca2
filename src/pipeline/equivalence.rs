//! Equivalence folding.
//!
//! Keys whose vertex (or pixel) stages are textually identical are grouped
//! offline; the first key of a group is its master. The index only redirects
//! keys to masters and remembers which backend objects the masters compiled.
//! It never owns an instance.

use rustc_hash::FxHashMap;

use crate::backend::StageHandle;
use crate::key::ProgramKey;
use crate::source::ShaderStage;

#[derive(Debug, Clone, Default)]
pub struct EquivalenceIndex {
    vertex_masters: FxHashMap<ProgramKey, ProgramKey>,
    pixel_masters: FxHashMap<ProgramKey, ProgramKey>,
    vertex_stages: FxHashMap<ProgramKey, StageHandle>,
    pixel_stages: FxHashMap<ProgramKey, StageHandle>,
    /// (vertex master, pixel master) → key of the linked program.
    programs: FxHashMap<(ProgramKey, ProgramKey), ProgramKey>,
}

impl EquivalenceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn masters(&self, stage: ShaderStage) -> &FxHashMap<ProgramKey, ProgramKey> {
        match stage {
            ShaderStage::Vertex => &self.vertex_masters,
            ShaderStage::Pixel => &self.pixel_masters,
        }
    }

    fn stages_mut(&mut self, stage: ShaderStage) -> &mut FxHashMap<ProgramKey, StageHandle> {
        match stage {
            ShaderStage::Vertex => &mut self.vertex_stages,
            ShaderStage::Pixel => &mut self.pixel_stages,
        }
    }

    /// Registers one group; the first key is the master. Keys already
    /// assigned to a master keep their first mapping. Returns the number of
    /// keys newly mapped.
    pub fn add_group(&mut self, stage: ShaderStage, keys: &[ProgramKey]) -> usize {
        let Some(&master) = keys.first() else {
            return 0;
        };
        let map = match stage {
            ShaderStage::Vertex => &mut self.vertex_masters,
            ShaderStage::Pixel => &mut self.pixel_masters,
        };
        let before = map.len();
        for &key in keys {
            map.entry(key).or_insert(master);
        }
        map.len() - before
    }

    #[inline]
    #[must_use]
    pub fn master(&self, stage: ShaderStage, key: ProgramKey) -> Option<ProgramKey> {
        self.masters(stage).get(&key).copied()
    }

    #[must_use]
    pub fn stage(&self, stage: ShaderStage, master: ProgramKey) -> Option<StageHandle> {
        match stage {
            ShaderStage::Vertex => self.vertex_stages.get(&master).copied(),
            ShaderStage::Pixel => self.pixel_stages.get(&master).copied(),
        }
    }

    pub fn set_stage(&mut self, stage: ShaderStage, master: ProgramKey, handle: StageHandle) {
        self.stages_mut(stage).insert(master, handle);
    }

    #[must_use]
    pub fn program(&self, vertex_master: ProgramKey, pixel_master: ProgramKey) -> Option<ProgramKey> {
        self.programs.get(&(vertex_master, pixel_master)).copied()
    }

    pub fn set_program(&mut self, vertex_master: ProgramKey, pixel_master: ProgramKey, key: ProgramKey) {
        self.programs.insert((vertex_master, pixel_master), key);
    }

    /// Drops every reference to a destroyed stage.
    pub fn forget_stage(&mut self, stage: ShaderStage, handle: StageHandle) {
        self.stages_mut(stage).retain(|_, h| *h != handle);
    }

    /// Drops every pair that resolves to `key`.
    pub fn forget_program(&mut self, key: ProgramKey) {
        self.programs.retain(|_, k| *k != key);
    }

    /// Forgets backend objects while keeping the key → master groups.
    pub fn clear_compiled(&mut self) {
        self.vertex_stages.clear();
        self.pixel_stages.clear();
        self.programs.clear();
    }

    /// Drops the groups and master stage tables once bulk loading is done.
    /// Program pairs are kept.
    pub fn release_groups(&mut self) {
        self.vertex_masters = FxHashMap::default();
        self.pixel_masters = FxHashMap::default();
        self.vertex_stages = FxHashMap::default();
        self.pixel_stages = FxHashMap::default();
    }

    #[must_use]
    pub fn group_len(&self, stage: ShaderStage) -> usize {
        self.masters(stage).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(n: u64) -> ProgramKey {
        ProgramKey::from_halves(n, 0)
    }

    #[test]
    fn test_first_key_is_master() {
        let mut index = EquivalenceIndex::new();
        assert_eq!(index.add_group(ShaderStage::Vertex, &[k(1), k(2), k(3)]), 3);
        assert_eq!(index.master(ShaderStage::Vertex, k(3)), Some(k(1)));
        assert_eq!(index.master(ShaderStage::Vertex, k(1)), Some(k(1)));
        assert_eq!(index.master(ShaderStage::Pixel, k(3)), None);
    }

    #[test]
    fn test_duplicate_keys_keep_first_mapping() {
        let mut index = EquivalenceIndex::new();
        index.add_group(ShaderStage::Pixel, &[k(1), k(2)]);
        assert_eq!(index.add_group(ShaderStage::Pixel, &[k(5), k(2), k(6)]), 2);
        assert_eq!(index.master(ShaderStage::Pixel, k(2)), Some(k(1)));
        assert_eq!(index.master(ShaderStage::Pixel, k(6)), Some(k(5)));
    }

    #[test]
    fn test_forget_stage_and_release() {
        let mut index = EquivalenceIndex::new();
        index.add_group(ShaderStage::Vertex, &[k(1), k(2)]);
        index.set_stage(ShaderStage::Vertex, k(1), StageHandle(7));
        index.set_program(k(1), k(9), k(1));
        index.forget_stage(ShaderStage::Vertex, StageHandle(7));
        assert_eq!(index.stage(ShaderStage::Vertex, k(1)), None);

        index.release_groups();
        assert_eq!(index.group_len(ShaderStage::Vertex), 0);
        assert_eq!(index.program(k(1), k(9)), Some(k(1)));
    }
}
