//! Signature transform programs
//!
//! A player script scrambles signatures with a short sequence of three
//! primitive operations. Once the sequence is recovered it is applied
//! locally, with no script evaluation.

use std::fmt;

use serde::Serialize;

/// One primitive step of a signature transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "arg")]
pub enum TransformOp {
    /// Reverses the whole sequence
    Reverse,

    /// Removes the first `n` characters (clamped to the length)
    Splice(usize),

    /// Swaps the first character with the one at `n % len`
    Swap(usize),
}

impl TransformOp {
    fn apply(self, chars: &mut Vec<char>) {
        match self {
            TransformOp::Reverse => chars.reverse(),
            TransformOp::Splice(n) => {
                let n = n.min(chars.len());
                chars.drain(..n);
            }
            TransformOp::Swap(n) => {
                if !chars.is_empty() {
                    let idx = n % chars.len();
                    chars.swap(0, idx);
                }
            }
        }
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformOp::Reverse => write!(f, "reverse"),
            TransformOp::Splice(n) => write!(f, "splice({})", n),
            TransformOp::Swap(n) => write!(f, "swap({})", n),
        }
    }
}

/// Ordered list of operations recovered from one player script
///
/// Programs are immutable once built and are shared between tasks behind
/// an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformProgram {
    ops: Vec<TransformOp>,
}

impl TransformProgram {
    pub fn new(ops: Vec<TransformOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[TransformOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Runs every operation in order over the characters of `signature`
    pub fn apply(&self, signature: &str) -> String {
        let mut chars: Vec<char> = signature.chars().collect();
        for op in &self.ops {
            op.apply(&mut chars);
        }
        chars.into_iter().collect()
    }
}

impl fmt::Display for TransformProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ops.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
