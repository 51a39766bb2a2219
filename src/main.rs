//! Reads integers from stdin, runs them through the standard pipeline and
//! prints the survivors. Type `exit` to stop.

use anyhow::{Context, Result};
use int_pipeline::{
    read_tokens, render, rendezvous, CancellationToken, Diagnostics, Pipeline, PipelineConfig,
};
use std::io;
use std::thread;

fn main() -> Result<()> {
    let diagnostics = Diagnostics::from_env("info,int_pipeline=debug");
    let config = PipelineConfig::from_env().context("invalid pipeline configuration")?;
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::standard(&config, cancel.clone(), diagnostics.clone())?;
    let (input, source) = rendezvous();
    let running = pipeline.run(source).context("failed to start pipeline")?;

    println!("Type integers, one per line. Type 'exit' to quit.");

    let reader = {
        let cancel = cancel.clone();
        let diagnostics = diagnostics.clone();
        thread::Builder::new()
            .name("token-source".into())
            .spawn(move || diagnostics.in_scope(|| read_tokens(io::stdin().lock(), input, &cancel)))
            .context("failed to spawn token reader")?
    };

    let written = diagnostics.in_scope(|| render(running.output(), &cancel, io::stdout().lock()))?;

    let summary = running.metrics_summary();
    running.shutdown()?;

    // The reader may still be blocked on stdin after a cancellation; only
    // collect its result once it has finished on its own.
    if reader.is_finished() {
        match reader.join() {
            Ok(Ok(source)) => diagnostics.in_scope(|| {
                tracing::info!(
                    forwarded = source.forwarded,
                    malformed = source.malformed,
                    "token source finished"
                )
            }),
            Ok(Err(e)) => diagnostics.in_scope(|| tracing::error!(error = %e, "token source failed")),
            Err(_) => anyhow::bail!("token reader panicked"),
        }
    }

    diagnostics.in_scope(|| {
        tracing::info!(written, "pipeline finished");
        tracing::info!("{}", summary.trim_end());
    });
    Ok(())
}
