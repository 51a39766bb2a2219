//! Result sink rendering the pipeline output, one value per line.

use crate::cancel::{CancellationToken, Received};
use crate::error::{PipelineError, Result};
use crate::stage::Stream;
use std::io::Write;
use tracing::debug;

/// Write every value from `output` until it closes or `cancel` is set.
/// Returns the number of values written.
pub fn render<W: Write>(output: &Stream, cancel: &CancellationToken, mut writer: W) -> Result<u64> {
    let mut written = 0;
    loop {
        match cancel.recv(output) {
            Received::Item(value) => {
                writeln!(writer, "Processed: {}", value).map_err(PipelineError::Sink)?;
                writer.flush().map_err(PipelineError::Sink)?;
                written += 1;
            }
            Received::Closed => {
                debug!(written, "output stream closed");
                return Ok(written);
            }
            Received::Cancelled => {
                debug!(written, "sink stopped by cancellation");
                return Ok(written);
            }
        }
    }
}
