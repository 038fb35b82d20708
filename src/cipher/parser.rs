//! Operation resolver for obfuscated player logic
//!
//! Player scripts contain a transform function of the shape
//!
//! ```text
//! Qt=function(a){a=a.split("");Mt.splice(a,3);Mt.EQ(a,39);Mt.reverse(a,52);return a.join("")}
//! ```
//!
//! whose statements call methods of a helper object:
//!
//! ```text
//! var Mt={splice:function(a,b){a.splice(0,b)},
//! reverse:function(a){a.reverse()},
//! EQ:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}};
//! ```
//!
//! The resolver maps every call to a [`CipherOp`] by classifying the body of
//! the helper method it invokes.

use crate::{
    Error, Result,
    cipher::{CipherOp, CipherProgram},
};
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Kind of transform a helper method implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Reverse,
    Splice,
    Swap,
}

/// Derives [`CipherProgram`]s from player script text
#[derive(Debug, Clone)]
pub struct OperationResolver {
    transform_fn: Regex,
    call: Regex,
    method: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Internal {
        message: format!("invalid pattern: {}", e),
        context: Some("cipher parser".to_string()),
    })
}

/// Index of the brace closing the one at `open`
fn matching_brace(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in source.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn classify(body: &str) -> Option<OpKind> {
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.contains(".reverse()") {
        Some(OpKind::Reverse)
    } else if compact.contains(".splice(0,") {
        Some(OpKind::Splice)
    } else if compact.contains('%') && compact.contains(".length") && compact.contains("[0]") {
        Some(OpKind::Swap)
    } else {
        None
    }
}

impl OperationResolver {
    /// Compile the scanning patterns
    pub fn new() -> Result<Self> {
        Ok(Self {
            transform_fn: compile(
                r#"function(?:\s+[\w$]+)?\s*\(\s*([\w$]+)\s*\)\s*\{\s*([\w$]+)\s*=\s*([\w$]+)\.split\(\s*(?:""|'')\s*\)\s*;([^}]*?)return\s+([\w$]+)\.join\(\s*(?:""|'')\s*\)"#,
            )?,
            call: compile(
                r#"^([\w$]+)(?:\.([\w$]+)|\[\s*["']([\w$]+)["']\s*\])\(\s*([\w$]+)\s*(?:,\s*(\d+)\s*)?\)$"#,
            )?,
            method: compile(r#"(?:^|[{,\s])["']?([\w$]+)["']?\s*:\s*function\s*\([^)]*\)\s*\{"#)?,
        })
    }

    /// Derive the program for `version` from its player script
    ///
    /// Fails with `CipherExtraction` when no transform function or helper
    /// object can be found, and with `UnsupportedOperation` when a statement
    /// or helper method does not map to a known transform.
    pub fn resolve(&self, version: &str, script: &str) -> Result<CipherProgram> {
        let caps = self.transform_fn.captures(script).ok_or_else(|| {
            Error::cipher_extraction(version, "no signature transform function found")
        })?;

        let param = &caps[1];
        if &caps[2] != param || &caps[3] != param || &caps[5] != param {
            return Err(Error::cipher_extraction(
                version,
                "transform function does not operate on its argument",
            ));
        }

        let mut helpers: HashMap<String, HashMap<String, OpKind>> = HashMap::new();
        let mut ops = Vec::new();

        for statement in caps[4].split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let call = self
                .call
                .captures(statement)
                .ok_or_else(|| Error::unsupported_operation(version, statement))?;

            let object = &call[1];
            let method = call
                .get(2)
                .or_else(|| call.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            if &call[4] != param {
                return Err(Error::unsupported_operation(version, statement));
            }

            if !helpers.contains_key(object) {
                let methods = self.helper_methods(version, script, object)?;
                helpers.insert(object.to_string(), methods);
            }

            let kind = helpers
                .get(object)
                .and_then(|methods| methods.get(method))
                .copied()
                .ok_or_else(|| {
                    Error::unsupported_operation(version, &format!("{}.{}", object, method))
                })?;

            let arg = call.get(5).and_then(|m| m.as_str().parse::<usize>().ok());
            let op = match (kind, arg) {
                (OpKind::Reverse, _) => CipherOp::Reverse,
                (OpKind::Splice, Some(n)) => CipherOp::Splice(n),
                (OpKind::Swap, Some(n)) => CipherOp::Swap(n),
                (_, None) => return Err(Error::unsupported_operation(version, statement)),
            };
            ops.push(op);
        }

        debug!(
            "Resolved {} cipher operations for player {}",
            ops.len(),
            version
        );
        Ok(CipherProgram::new(version, ops))
    }

    /// Classify every method of the helper object named `object`
    ///
    /// Methods whose body matches no known transform are left out, so a call
    /// to them surfaces as `UnsupportedOperation`.
    fn helper_methods(
        &self,
        version: &str,
        script: &str,
        object: &str,
    ) -> Result<HashMap<String, OpKind>> {
        let definition = compile(&format!(
            r"(?:^|[^\w$.])(?:var\s+|let\s+|const\s+)?{}\s*=\s*\{{",
            regex::escape(object)
        ))?;

        let found = definition.find(script).ok_or_else(|| {
            Error::cipher_extraction(version, &format!("helper object {} not found", object))
        })?;
        let open = found.end() - 1;
        let close = matching_brace(script, open).ok_or_else(|| {
            Error::cipher_extraction(version, &format!("helper object {} is unterminated", object))
        })?;
        let body = &script[open + 1..close];

        let mut methods = HashMap::new();
        for caps in self.method.captures_iter(body) {
            let (Some(name), Some(whole)) = (caps.get(1), caps.get(0)) else {
                continue;
            };
            let method_open = whole.end() - 1;
            let Some(method_close) = matching_brace(body, method_open) else {
                continue;
            };
            if let Some(kind) = classify(&body[method_open + 1..method_close]) {
                methods.insert(name.as_str().to_string(), kind);
            }
        }

        Ok(methods)
    }
}
