//! Signature transform programs

use serde::{Deserialize, Serialize};

/// One signature transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum CipherOp {
    /// Reverse the whole sequence
    Reverse,
    /// Delete the first N elements
    Splice(usize),
    /// Swap the first element with the element at N mod length
    Swap(usize),
}

impl CipherOp {
    fn apply(&self, chars: &mut Vec<char>) {
        match *self {
            CipherOp::Reverse => chars.reverse(),
            CipherOp::Splice(n) => {
                chars.drain(..n.min(chars.len()));
            }
            CipherOp::Swap(n) => {
                if !chars.is_empty() {
                    let len = chars.len();
                    chars.swap(0, n % len);
                }
            }
        }
    }
}

/// Ordered transform list recovered for one content version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherProgram {
    /// Content version the program was derived from
    pub version: String,
    /// Transforms in application order
    pub ops: Vec<CipherOp>,
}

impl CipherProgram {
    /// Create a program
    pub fn new(version: impl Into<String>, ops: Vec<CipherOp>) -> Self {
        Self {
            version: version.into(),
            ops,
        }
    }

    /// Run every transform over `signature` in order
    pub fn apply(&self, signature: &str) -> String {
        let mut chars: Vec<char> = signature.chars().collect();
        for op in &self.ops {
            op.apply(&mut chars);
        }
        chars.into_iter().collect()
    }
}
