//! Stack-trace frame extraction from raw log text.
//!
//! A frame is any `dotted.qualified.name(File.ext:line)` substring, the shape JVM
//! traces print. Frames are reported in source order; the first one is the root.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{ParsedStack, StackFrame};

/// Qualified names kept in `ParsedStack::call_chain`.
pub const CALL_CHAIN_LIMIT: usize = 5;

lazy_static! {
  static ref FRAME_PATTERN: Regex = Regex::new(r"([\w.]+)\(([\w.]+):(\d+)\)").unwrap();
}

/// Parse a raw trace. `None` for missing/empty input and for text with no frames.
pub fn extract(raw_trace: Option<&str>) -> Option<ParsedStack> {
  let frames = frames(raw_trace?);
  let root_frame = frames.first()?.clone();

  Some(ParsedStack {
    root_frame,
    call_chain: frames
      .iter()
      .take(CALL_CHAIN_LIMIT)
      .map(|f| f.qualified_name.clone())
      .collect(),
    depth: frames.len() as u32,
  })
}

/// Every frame in the trace, in source order.
pub fn frames(raw_trace: &str) -> Vec<StackFrame> {
  FRAME_PATTERN
    .captures_iter(raw_trace)
    .filter_map(|caps| {
      let qualified_name = caps.get(1)?.as_str();
      let file = caps.get(2)?.as_str();
      // Digits too long for u32 are not a line number.
      let line: u32 = caps.get(3)?.as_str().parse().ok()?;

      let mut segments = qualified_name.rsplit('.');
      let method = segments.next().unwrap_or(qualified_name);
      let class_name = segments.next().unwrap_or(qualified_name);

      Some(StackFrame {
        class_name: class_name.to_string(),
        method: method.to_string(),
        file: file.to_string(),
        line,
        qualified_name: qualified_name.to_string(),
      })
    })
    .collect()
}
