//! Chain link policy
//!
//! Decides, for each effect appended to a chain, whether its first pass
//! clears its target and whether it renders into its own output or reuses
//! the output of the pass two positions back.
//!
//! Reusing the output two positions back turns the chain into a ping-pong
//! between two buffers, so peak intermediate memory stays at two outputs no
//! matter how long the chain is.

use serde::{Deserialize, Serialize};

/// Where a pass renders its output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputTarget {
    /// A fresh target owned by the pass
    Own,
    /// The output target of the chain entry at this index
    SharedWith(usize),
}

/// Link decision for one chain entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkDecision {
    /// Clear the target before rendering
    pub auto_clear: bool,
    /// Output assignment
    pub output: OutputTarget,
}

/// Chain-position state threaded through one rebuild.
///
/// Holds the decisions of the last two appended entries. A new cursor is
/// created at the start of every rebuild.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainCursor {
    prev: Option<(usize, LinkDecision)>,
    prev_prev: Option<(usize, LinkDecision)>,
}

impl ChainCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decision for the next entry, without advancing
    pub fn decide(&self) -> LinkDecision {
        LinkDecision {
            auto_clear: self.prev.map_or(true, |(_, prev)| !prev.auto_clear),
            output: self
                .prev_prev
                .map_or(OutputTarget::Own, |(index, _)| OutputTarget::SharedWith(index)),
        }
    }

    /// Record that the entry at `index` was appended with `decision`
    pub fn advance(&mut self, index: usize, decision: LinkDecision) {
        self.prev_prev = self.prev;
        self.prev = Some((index, decision));
    }

    /// Decide for the entry at `index` and advance
    pub fn link(&mut self, index: usize) -> LinkDecision {
        let decision = self.decide();
        self.advance(index, decision);
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_entry_clears_and_owns() {
        let cursor = ChainCursor::new();
        assert_eq!(
            cursor.decide(),
            LinkDecision {
                auto_clear: true,
                output: OutputTarget::Own,
            }
        );
    }

    #[test]
    fn test_decide_is_pure() {
        let mut cursor = ChainCursor::new();
        cursor.link(0);
        assert_eq!(cursor.decide(), cursor.decide());
    }

    #[test]
    fn test_alternating_clear_and_sharing() {
        let mut cursor = ChainCursor::new();
        let decisions: Vec<LinkDecision> = (0..5).map(|i| cursor.link(i)).collect();

        let clears: Vec<bool> = decisions.iter().map(|d| d.auto_clear).collect();
        assert_eq!(clears, vec![true, false, true, false, true]);

        assert_eq!(decisions[0].output, OutputTarget::Own);
        assert_eq!(decisions[1].output, OutputTarget::Own);
        assert_eq!(decisions[2].output, OutputTarget::SharedWith(0));
        assert_eq!(decisions[3].output, OutputTarget::SharedWith(1));
        assert_eq!(decisions[4].output, OutputTarget::SharedWith(2));
    }
}
