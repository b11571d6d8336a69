use serde::{Deserialize, Serialize};

use crate::policy::TimePolicy;

/// A boolean combination of time policies. Finite and acyclic by
/// construction: children are owned boxes, never references back into the
/// tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PolicyComposition {
    /// A single policy leaf, satisfied per `TimePolicy::satisfied`.
    Leaf(TimePolicy),
    /// Both sides must hold (short-circuits on the left).
    And(Box<PolicyComposition>, Box<PolicyComposition>),
    /// Either side holds (short-circuits on the left).
    Or(Box<PolicyComposition>, Box<PolicyComposition>),
    /// Exactly one side holds.
    Xor(Box<PolicyComposition>, Box<PolicyComposition>),
    /// The child must not hold.
    Not(Box<PolicyComposition>),
}

impl PolicyComposition {
    /// Recursive evaluation under the given spend conditions.
    pub fn evaluate(&self, sig_count: u8, block_height: u32, lock_time: u32) -> bool {
        match self {
            PolicyComposition::Leaf(p) => p.satisfied(sig_count, block_height, lock_time),
            PolicyComposition::And(l, r) => {
                l.evaluate(sig_count, block_height, lock_time)
                    && r.evaluate(sig_count, block_height, lock_time)
            }
            PolicyComposition::Or(l, r) => {
                l.evaluate(sig_count, block_height, lock_time)
                    || r.evaluate(sig_count, block_height, lock_time)
            }
            PolicyComposition::Xor(l, r) => {
                l.evaluate(sig_count, block_height, lock_time)
                    != r.evaluate(sig_count, block_height, lock_time)
            }
            PolicyComposition::Not(c) => !c.evaluate(sig_count, block_height, lock_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shell_core::types::PubKey;

    fn leaf(threshold: u8, delay: u32) -> PolicyComposition {
        let keys = (0..threshold)
            .map(|i| {
                let mut b = [0u8; 33];
                b[0] = 0x02;
                b[1] = i;
                PubKey::from_bytes(b)
            })
            .collect();
        PolicyComposition::Leaf(TimePolicy::new(threshold, delay, 0, keys))
    }

    #[test]
    fn and_requires_both() {
        let tree = PolicyComposition::And(Box::new(leaf(1, 0)), Box::new(leaf(3, 0)));
        assert!(!tree.evaluate(2, 100, 100));
        assert!(tree.evaluate(3, 100, 100));
    }

    #[test]
    fn or_requires_either() {
        let tree = PolicyComposition::Or(Box::new(leaf(1, 0)), Box::new(leaf(3, 0)));
        assert!(tree.evaluate(1, 100, 100));
        assert!(!tree.evaluate(0, 100, 100));
    }

    #[test]
    fn xor_requires_exactly_one() {
        // Left activates immediately; right only after 50 blocks.
        let tree = PolicyComposition::Xor(Box::new(leaf(1, 0)), Box::new(leaf(1, 50)));
        assert!(tree.evaluate(1, 100, 100));  // only left
        assert!(!tree.evaluate(1, 200, 100)); // both → false
        assert!(!tree.evaluate(0, 100, 100)); // neither
    }

    #[test]
    fn not_negates() {
        let tree = PolicyComposition::Not(Box::new(leaf(2, 0)));
        assert!(tree.evaluate(1, 100, 100));
        assert!(!tree.evaluate(2, 100, 100));
    }

    #[test]
    fn nested_tree_evaluates_recursively() {
        // (1-of AND NOT 5-of) OR 3-of
        let tree = PolicyComposition::Or(
            Box::new(PolicyComposition::And(
                Box::new(leaf(1, 0)),
                Box::new(PolicyComposition::Not(Box::new(leaf(5, 0)))),
            )),
            Box::new(leaf(3, 0)),
        );
        assert!(tree.evaluate(1, 100, 100));
        assert!(tree.evaluate(5, 100, 100)); // right arm: 3-of satisfied
    }
}
