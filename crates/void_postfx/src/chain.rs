//! Effect chain
//!
//! The ordered list of effects a pipeline renders, with the link decision of
//! each entry. The pipeline is the only writer; everything else reads it.

use serde::{Deserialize, Serialize};

use crate::effect::{EffectKind, InstanceId};
use crate::link::{ChainCursor, LinkDecision, OutputTarget};

/// One effect in a chain
#[derive(Clone, Debug, PartialEq)]
pub struct ChainEntry {
    pub kind: EffectKind,
    pub instance: InstanceId,
    pub link: LinkDecision,
    /// MSAA samples of the entry's first pass
    pub samples: u32,
}

/// Instance-independent view of a chain, comparable across rebuilds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLayout {
    pub kinds: Vec<EffectKind>,
    pub links: Vec<LinkDecision>,
}

/// Ordered effect chain
#[derive(Clone, Debug, Default)]
pub struct EffectChain {
    entries: Vec<ChainEntry>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an effect, consulting `cursor` for its link decision
    pub fn push(
        &mut self,
        kind: EffectKind,
        instance: InstanceId,
        cursor: &mut ChainCursor,
    ) -> LinkDecision {
        let link = cursor.link(self.entries.len());
        self.entries.push(ChainEntry {
            kind,
            instance,
            link,
            samples: 1,
        });
        link
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&ChainEntry> {
        self.entries.first()
    }

    /// Effect kinds in chain order
    pub fn kinds(&self) -> Vec<EffectKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    pub fn contains(&self, kind: EffectKind) -> bool {
        self.position(kind).is_some()
    }

    pub fn position(&self, kind: EffectKind) -> Option<usize> {
        self.entries.iter().position(|e| e.kind == kind)
    }

    pub fn instance_of(&self, kind: EffectKind) -> Option<InstanceId> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.instance)
    }

    /// Index of the entry that owns the buffer entry `index` renders into
    pub fn owner_of(&self, index: usize) -> Option<usize> {
        let mut current = index;
        loop {
            match self.entries.get(current)?.link.output {
                OutputTarget::Own => return Some(current),
                OutputTarget::SharedWith(other) => current = other,
            }
        }
    }

    /// Number of distinct output buffers the chain renders into
    pub fn output_buffer_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.link.output == OutputTarget::Own)
            .count()
    }

    pub(crate) fn set_samples(&mut self, index: usize, samples: u32) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.samples = samples.max(1);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn layout(&self) -> ChainLayout {
        ChainLayout {
            kinds: self.kinds(),
            links: self.entries.iter().map(|e| e.link).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(kinds: &[EffectKind]) -> EffectChain {
        let mut chain = EffectChain::new();
        let mut cursor = ChainCursor::new();
        for kind in kinds {
            chain.push(*kind, InstanceId::next(), &mut cursor);
        }
        chain
    }

    #[test]
    fn test_push_and_lookup() {
        let chain = chain_of(&[EffectKind::Sharpen, EffectKind::Bloom, EffectKind::Fxaa]);

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.position(EffectKind::Bloom), Some(1));
        assert!(!chain.contains(EffectKind::DepthOfField));
        assert!(chain.first().map_or(false, |e| e.link.auto_clear));
    }

    #[test]
    fn test_two_buffers_regardless_of_length() {
        let chain = chain_of(&EffectKind::CHAIN_ORDER);

        assert_eq!(chain.output_buffer_count(), 2);
        assert_eq!(chain.owner_of(4), Some(0));
        assert_eq!(chain.owner_of(5), Some(1));
        assert_eq!(chain.owner_of(9), None);
    }

    #[test]
    fn test_layout_ignores_instances() {
        let a = chain_of(&[EffectKind::Bloom, EffectKind::Fxaa]);
        let b = chain_of(&[EffectKind::Bloom, EffectKind::Fxaa]);
        assert_ne!(a.instance_of(EffectKind::Fxaa), b.instance_of(EffectKind::Fxaa));
        assert_eq!(a.layout(), b.layout());
    }
}
