//! Stable signature for a parsed stack, used to group identical traces.

use crate::types::ParsedStack;

/// Compute a stable signature from a parsed stack.
///
/// Key components: call chain (already capped) + total depth. Line numbers are
/// ignored so a redeploy that shifts lines still groups with the old trace.
/// Uses blake3 for a fast, deterministic hash.
pub fn stack_signature(stack: &ParsedStack) -> String {
  let mut hasher = blake3::Hasher::new();
  for name in &stack.call_chain {
    hasher.update(name.as_bytes());
    hasher.update(b"|");
  }
  hasher.update(stack.depth.to_le_bytes().as_slice());

  let hex = hasher.finalize().to_hex();
  hex[..32].to_string()
}
