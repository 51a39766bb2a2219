//! Line-oriented token source feeding the head of a pipeline.

use crate::cancel::{CancellationToken, Sent};
use crate::error::{PipelineError, Result};
use crossbeam::channel::Sender;
use std::io::BufRead;
use tracing::{debug, error, info, warn};

/// Sentinel that requests shutdown, matched case-insensitively
pub const EXIT_TOKEN: &str = "exit";

/// A successfully parsed input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Value(i64),
    Exit,
}

/// Parse one line. Surrounding whitespace is ignored.
pub fn parse_token(raw: &str) -> Result<Token> {
    let token = raw.trim();
    if token.eq_ignore_ascii_case(EXIT_TOKEN) {
        return Ok(Token::Exit);
    }
    token
        .parse::<i64>()
        .map(Token::Value)
        .map_err(|source| PipelineError::MalformedToken {
            token: token.to_string(),
            source,
        })
}

/// Why the source stopped and what it saw on the way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSummary {
    /// Values handed to the pipeline
    pub forwarded: u64,
    /// Lines that were neither integers nor the sentinel
    pub malformed: u64,
    /// The sentinel was read and the token was set
    pub exit_requested: bool,
}

/// Read tokens from `reader` until EOF, the exit sentinel, cancellation or
/// an I/O error, sending every integer into `sink`.
///
/// The sentinel sets `cancel`. `sink` is dropped on return so the next
/// stage observes the stream closing.
pub fn read_tokens<R: BufRead>(
    reader: R,
    sink: Sender<i64>,
    cancel: &CancellationToken,
) -> Result<SourceSummary> {
    let mut summary = SourceSummary::default();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to read from token source");
                return Err(PipelineError::Source(e));
            }
        };

        match parse_token(&line) {
            Ok(Token::Exit) => {
                info!("exit requested by user");
                summary.exit_requested = true;
                cancel.cancel();
                return Ok(summary);
            }
            Ok(Token::Value(value)) => {
                debug!(value, "read value");
                match cancel.send(&sink, value) {
                    Sent::Delivered => summary.forwarded += 1,
                    Sent::Closed => {
                        warn!(value, "pipeline input closed");
                        return Ok(summary);
                    }
                    Sent::Cancelled => {
                        debug!(value, "cancelled while sending");
                        return Ok(summary);
                    }
                }
            }
            Err(e) => {
                summary.malformed += 1;
                warn!(error = %e, "skipping malformed token");
            }
        }

        if cancel.is_cancelled() {
            return Ok(summary);
        }
    }

    debug!("token source exhausted");
    Ok(summary)
}
