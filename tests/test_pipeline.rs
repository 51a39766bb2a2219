use int_pipeline::{
    read_tokens, rendezvous, BufferingStage, CancellationToken, Diagnostics, FilterStage,
    Pipeline, PipelineBuilder, PipelineConfig, PipelineError, Stage, StageContext, StageOutput,
    Stream,
};
use std::io::Cursor;
use std::thread;
use std::time::{Duration, Instant};

fn feed(values: Vec<i64>) -> (Stream, thread::JoinHandle<()>) {
    let (tx, rx) = rendezvous();
    let handle = thread::spawn(move || {
        for value in values {
            if tx.send(value).is_err() {
                break;
            }
        }
    });
    (rx, handle)
}

#[test]
fn test_chained_filters() {
    let pipeline = PipelineBuilder::new()
        .stage(FilterStage::non_negative())
        .stage(FilterStage::nonzero_multiple_of_three())
        .build()
        .expect("Pipeline build failed");

    let (source, feeder) = feed(vec![-9, -6, 0, 3, 6]);
    let running = pipeline.run(source).expect("Pipeline start failed");

    let output: Vec<i64> = running.output().iter().collect();
    assert_eq!(output, vec![3, 6]);

    feeder.join().unwrap();
    running.join().expect("Join failed");
}

#[test]
fn test_filter_metrics() {
    let pipeline = PipelineBuilder::new()
        .stage(FilterStage::non_negative())
        .stage(FilterStage::nonzero_multiple_of_three())
        .build()
        .expect("Pipeline build failed");

    let (source, feeder) = feed((-5..=9).collect());
    let running = pipeline.run(source).expect("Pipeline start failed");
    let output: Vec<i64> = running.output().iter().collect();
    feeder.join().unwrap();

    assert_eq!(output, vec![3, 6, 9]);

    let first = running.stage_metrics(0).unwrap().snapshot();
    assert_eq!(first.received, 15);
    assert_eq!(first.rejected, 5);
    assert_eq!(first.forwarded, 10);

    let second = running.stage_metrics(1).unwrap().snapshot();
    assert_eq!(second.received, 10);
    assert_eq!(second.forwarded, 3);

    let summary = running.metrics_summary();
    assert!(summary.contains("Stage 0 (non_negative)"));
    assert!(summary.contains("Stage 1 (multiple_of_three)"));

    running.join().expect("Join failed");
}

#[test]
fn test_standard_pipeline_flushes_on_interval() {
    let config = PipelineConfig::default()
        .with_buffer_capacity(100)
        .with_flush_interval(Duration::from_millis(200));
    let cancel = CancellationToken::new();
    let pipeline = Pipeline::standard(&config, cancel.clone(), Diagnostics::disabled())
        .expect("Pipeline build failed");

    let (input, source) = rendezvous();
    let start = Instant::now();
    let running = pipeline.run(source).expect("Pipeline start failed");

    for value in [-3, 1, 3, 0, 6, 7, 9] {
        input.send(value).unwrap();
    }

    let first = running.output().recv().unwrap();
    assert!(start.elapsed() >= Duration::from_millis(200));
    let rest: Vec<i64> = (0..2).map(|_| running.output().recv().unwrap()).collect();
    assert_eq!(first, 3);
    assert_eq!(rest, vec![6, 9]);

    running.shutdown().expect("Shutdown failed");
    drop(input);
}

#[test]
fn test_intervals_preserve_order() {
    let interval = Duration::from_millis(150);
    let config = PipelineConfig::default()
        .with_buffer_capacity(10)
        .with_flush_interval(interval);
    let cancel = CancellationToken::new();
    let pipeline = Pipeline::standard(&config, cancel.clone(), Diagnostics::disabled())
        .expect("Pipeline build failed");

    let (input, source) = rendezvous();
    let running = pipeline.run(source).expect("Pipeline start failed");

    // Upstream stays open throughout: both batches leave on timer ticks.
    let first_sent = Instant::now();
    input.send(3).unwrap();
    input.send(6).unwrap();
    let first_batch: Vec<i64> = (0..2).map(|_| running.output().recv().unwrap()).collect();
    assert!(first_sent.elapsed() >= interval / 2);

    let second_sent = Instant::now();
    input.send(9).unwrap();
    input.send(12).unwrap();
    let second_batch: Vec<i64> = (0..2).map(|_| running.output().recv().unwrap()).collect();
    assert!(second_sent.elapsed() >= interval / 2);

    assert_eq!(first_batch, vec![3, 6]);
    assert_eq!(second_batch, vec![9, 12]);
    assert_eq!(running.stage_metrics(2).unwrap().total_flushes(), 2);

    running.shutdown().expect("Shutdown failed");
    drop(input);
}

#[test]
fn test_overload_keeps_newest_values() {
    let interval = Duration::from_millis(200);
    let pipeline = PipelineBuilder::new()
        .stage(FilterStage::non_negative())
        .stage(BufferingStage::new(3, interval))
        .build()
        .expect("Pipeline build failed");

    let (source, feeder) = feed(vec![1, 2, 3, 4, 5]);
    let start = Instant::now();
    let running = pipeline.run(source).expect("Pipeline start failed");

    // Upstream closes early, yet the survivors still wait for the tick
    // before the stream closes.
    let first = running.output().recv().unwrap();
    assert!(start.elapsed() >= interval);
    let rest: Vec<i64> = running.output().iter().collect();
    feeder.join().unwrap();
    assert_eq!(first, 3);
    assert_eq!(rest, vec![4, 5]);
    assert_eq!(running.stage_metrics(1).unwrap().total_evicted(), 2);

    running.join().expect("Join failed");
}

#[test]
fn test_cancellation_stops_every_stage() {
    let config = PipelineConfig::default().with_flush_interval(Duration::from_millis(20));
    let cancel = CancellationToken::new();
    let pipeline = Pipeline::standard(&config, cancel.clone(), Diagnostics::disabled())
        .expect("Pipeline build failed");

    let (input, source) = rendezvous();
    let running = pipeline.run(source).expect("Pipeline start failed");

    for value in [3, 6, 9] {
        input.send(value).unwrap();
    }
    // Nobody reads the output: the buffering stage blocks mid-flush while
    // the filters block on their upstream.
    thread::sleep(Duration::from_millis(100));

    let output = running.output().clone();
    let start = Instant::now();
    cancel.cancel();
    running.join().expect("Join failed");

    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(output.recv().is_err());
    assert!(input.send(12).is_err());
}

#[test]
fn test_join_timeout_cancels_idle_pipeline() {
    let pipeline = PipelineBuilder::new()
        .stage(FilterStage::non_negative())
        .build()
        .expect("Pipeline build failed");

    let (_input, source) = rendezvous();
    let running = pipeline.run(source).expect("Pipeline start failed");
    let cancel = running.cancellation().clone();

    running
        .join_timeout(Duration::from_millis(50))
        .expect("Wait failed");
    assert!(cancel.is_cancelled());
}

#[test]
fn test_token_source_drives_pipeline() {
    let cancel = CancellationToken::new();
    let pipeline = PipelineBuilder::new()
        .stage(FilterStage::non_negative())
        .stage(FilterStage::nonzero_multiple_of_three())
        .with_cancellation(cancel.clone())
        .build()
        .expect("Pipeline build failed");

    let (input, source) = rendezvous();
    let running = pipeline.run(source).expect("Pipeline start failed");

    let reader = {
        let cancel = cancel.clone();
        thread::spawn(move || read_tokens(Cursor::new("-3\nfoo\n3\n4\n6\n"), input, &cancel))
    };

    let output: Vec<i64> = running.output().iter().collect();
    assert_eq!(output, vec![3, 6]);

    let summary = reader.join().unwrap().expect("Source failed");
    assert_eq!(summary.forwarded, 4);
    assert_eq!(summary.malformed, 1);
    running.join().expect("Join failed");
}

#[test]
fn test_custom_stage() {
    struct Doubler;

    impl Stage for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn transform(
            &self,
            upstream: Stream,
            ctx: &StageContext,
        ) -> int_pipeline::Result<StageOutput> {
            let (tx, stream) = rendezvous();
            let cancel = ctx.cancel.clone();
            let worker = int_pipeline::stage::spawn_worker("doubler", "map", ctx, move || {
                while let int_pipeline::Received::Item(value) = cancel.recv(&upstream) {
                    if cancel.send(&tx, value * 2) != int_pipeline::Sent::Delivered {
                        return;
                    }
                }
            })?;
            Ok(StageOutput {
                stream,
                workers: vec![worker],
            })
        }
    }

    let pipeline = PipelineBuilder::new()
        .stage(Doubler)
        .stage(FilterStage::nonzero_multiple_of_three())
        .build()
        .expect("Pipeline build failed");

    let (source, feeder) = feed(vec![1, 3, 4, 6]);
    let running = pipeline.run(source).expect("Pipeline start failed");
    let output: Vec<i64> = running.output().iter().collect();
    feeder.join().unwrap();

    assert_eq!(output, vec![6, 12]);
    running.join().expect("Join failed");
}

#[test]
fn test_no_stages() {
    let result = PipelineBuilder::new().build();
    assert!(matches!(result, Err(PipelineError::NoStages)));
}
