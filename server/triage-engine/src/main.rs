//! Binary entrypoint: read JSON lines from stdin, write JSON lines to stdout.
//!
//! Each input line is an InboundRequest. Output lines are either:
//! - A ResultEnvelope (every well-formed request, including failed collectors)
//! - An ErrorOutput (when the line is not valid JSON or fails validation)
//!
//! Diagnostics go to stderr via tracing (`RUST_LOG`), keeping stdout machine-readable.
//! Set `TRIAGE_CONFIG` to a JSON file to override default thresholds and weights.

use std::io::{self, BufRead, Write};

use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use triage_engine::envelope::Timing;
use triage_engine::types::ErrorOutput;
use triage_engine::{Config, Engine, InboundRequest, TriageError};

fn main() {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| "triage_engine=info".into()),
    )
    .init();

  let config = match std::env::var("TRIAGE_CONFIG") {
    Ok(path) => match Config::from_path(&path) {
      Ok(c) => {
        info!(%path, "loaded config");
        c
      }
      Err(e) => {
        error!(%path, error = %e, "invalid config");
        std::process::exit(2);
      }
    },
    Err(_) => Config::default(),
  };
  let engine = Engine::new(config);

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  for line in stdin.lock().lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        error!(error = %e, "read error");
        std::process::exit(1);
      }
    };

    // Skip blank lines.
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let started_at = Utc::now();

    // Parse inbound request.
    let req: InboundRequest = match serde_json::from_str(trimmed) {
      Ok(v) => v,
      Err(e) => {
        emit(&mut out, &ErrorOutput::new(format!("json parse: {}", e)));
        continue;
      }
    };

    match engine.process(&req) {
      Ok(evidence) => {
        let envelope = evidence.into_envelope(Timing::new(started_at, Utc::now()));
        emit(&mut out, &envelope);
      }
      Err(e) => {
        let err = match &e {
          TriageError::Validation { field, reason } => {
            ErrorOutput::new(reason.clone()).with_field(field.clone())
          }
          _ => ErrorOutput::new(e.to_string()),
        };
        emit(&mut out, &err);
      }
    }
  }

  if let Err(e) = out.flush() {
    error!(error = %e, "flush stdout");
    std::process::exit(1);
  }
}

/// Log a failed output line; the loop keeps serving the remaining input.
fn emit<W: Write, T: serde::Serialize>(out: &mut W, value: &T) {
  if let Err(e) = write_line(out, value) {
    error!(error = %e, "write output");
  }
}

fn write_line<W: Write, T: serde::Serialize>(out: &mut W, value: &T) -> io::Result<()> {
  serde_json::to_writer(&mut *out, value)?;
  writeln!(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  struct BrokenPipe;

  impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
      Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
      Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }
  }

  #[test]
  fn write_line_appends_newline() {
    let mut buf = Vec::new();
    write_line(&mut buf, &ErrorOutput::new("bad")).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), "{\"error\":true,\"message\":\"bad\"}\n");
  }

  #[test]
  fn write_failures_are_reported() {
    let err = write_line(&mut BrokenPipe, &ErrorOutput::new("bad")).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
  }
}
