//! Capture-and-infer loop
//!
//! Runs on a blocking thread: read, pace, infer, submit, strictly in source
//! order. The stop signal is checked before every read and while pacing.

use std::time::Instant;

use contracts::{
    FrameSource, InferenceEngine, InferenceResult, ReadOutcome, SourceConfig, StopSignal,
};
use ingestion::{FrameDecimator, RatePacer};
use reporter::{IntakeSender, ReporterError, SubmitOutcome};
use tracing::{debug, error, info, instrument, warn};

use crate::stats::AgentStats;

/// Why the capture loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A finite source ran out of frames
    EndOfStream,
    /// The stop signal fired
    Stopped,
    /// The source reported a fatal error
    SourceFailed,
    /// The reporter intake went away
    ReporterClosed,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndOfStream => "end_of_stream",
            Self::Stopped => "stopped",
            Self::SourceFailed => "source_failed",
            Self::ReporterClosed => "reporter_closed",
        }
    }
}

/// What the capture thread hands back
pub struct CaptureExit {
    pub reason: StopReason,
    pub stats: AgentStats,
    /// Handed back so the orchestrator closes it after the final flush
    pub source: Box<dyn FrameSource>,
}

pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    engine: Box<dyn InferenceEngine>,
    intake: IntakeSender,
    pacer: RatePacer,
    decimator: FrameDecimator,
    report_only_detections: bool,
    stop: StopSignal,
}

impl CaptureLoop {
    /// `source` must already be open
    pub fn new(
        source: Box<dyn FrameSource>,
        engine: Box<dyn InferenceEngine>,
        intake: IntakeSender,
        config: &SourceConfig,
        report_only_detections: bool,
        stop: StopSignal,
    ) -> Self {
        Self {
            source,
            engine,
            intake,
            pacer: RatePacer::new(config.rate_limit),
            decimator: FrameDecimator::new(config.skip_frames),
            report_only_detections,
            stop,
        }
    }

    /// Run until end of stream, stop or a fatal source error.
    ///
    /// The intake sender is dropped on return, which closes the reporter
    /// intake.
    #[instrument(
        name = "capture_loop",
        skip(self),
        fields(source = %self.source.source_id(), engine = %self.engine.name())
    )]
    pub fn run(mut self) -> CaptureExit {
        let started = Instant::now();
        let mut stats = AgentStats::default();
        let kind = self.source.kind().as_str();
        info!(
            source_type = kind,
            rate_limit_interval = ?self.pacer.interval(),
            "Capture loop started"
        );

        let reason = loop {
            if self.stop.is_triggered() || !self.pacer.wait(&self.stop) {
                break StopReason::Stopped;
            }

            let frame = match self.source.read() {
                Ok(ReadOutcome::Frame(frame)) => frame,
                Ok(ReadOutcome::EndOfStream) => {
                    info!(frames = stats.frames_read, "Source reached end of stream");
                    break StopReason::EndOfStream;
                }
                Err(e) if e.is_fatal_source() => {
                    error!(error = %e, "Source failed");
                    break StopReason::SourceFailed;
                }
                Err(e) => {
                    if self.stop.is_triggered() {
                        break StopReason::Stopped;
                    }
                    warn!(error = %e, "Source read failed, continuing");
                    continue;
                }
            };
            stats.frames_read += 1;

            if !self.decimator.admit() {
                stats.frames_skipped += 1;
                observability::record_frame_skipped("decimated");
                continue;
            }

            let prediction = match self.engine.predict(&frame.image) {
                Ok(prediction) => prediction,
                Err(e) => {
                    stats.inference_failures += 1;
                    observability::record_inference_failure(self.engine.name());
                    warn!(frame_id = frame.sequence, error = %e, "Inference failed, frame skipped");
                    continue;
                }
            };

            let latency_ms = prediction.latency.as_secs_f64() * 1000.0;
            observability::record_inference(latency_ms, &prediction.detections);
            observability::record_frame_processed(kind);
            stats.inference.update(latency_ms, &prediction.detections);
            stats.frames_processed += 1;
            stats.detections_total += prediction.detections.len() as u64;

            if self.report_only_detections && prediction.detections.is_empty() {
                stats.frames_skipped += 1;
                observability::record_frame_skipped("no_detections");
                continue;
            }

            let result =
                InferenceResult::from_frame(&frame, prediction.detections, prediction.latency);
            match self.intake.submit_blocking(result) {
                Ok(SubmitOutcome::Queued) => stats.results_submitted += 1,
                Ok(SubmitOutcome::QueuedWithEviction(evicted)) => {
                    stats.results_submitted += 1;
                    stats.results_dropped += evicted as u64;
                }
                Err(ReporterError::IntakeClosed) => {
                    error!(frame_id = frame.sequence, "Reporter intake closed");
                    break StopReason::ReporterClosed;
                }
                Err(e) => {
                    error!(frame_id = frame.sequence, error = %e, "Result submit failed");
                    break StopReason::ReporterClosed;
                }
            }

            if stats.frames_read % 100 == 0 {
                debug!(
                    frames = stats.frames_read,
                    progress = ?self.source.progress(),
                    "Capture progress"
                );
            }
        };

        stats.duration = started.elapsed();
        info!(
            reason = reason.as_str(),
            frames_read = stats.frames_read,
            frames_processed = stats.frames_processed,
            fps = format!("{:.2}", stats.fps()),
            "Capture loop stopped"
        );

        CaptureExit {
            reason,
            stats,
            source: self.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        BackpressurePolicy, ContractError, Frame, ImageData, ImageFormat, SourceType,
    };
    use inference::{StubEngine, StubMode};
    use reporter::{intake, IntakeReceiver, ReporterMetrics};
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Scripted source for testing
    struct ScriptedSource {
        script: VecDeque<Result<ReadOutcome, ContractError>>,
        sequence: u64,
    }

    impl ScriptedSource {
        fn frames(n: usize) -> Self {
            let mut source = Self {
                script: VecDeque::new(),
                sequence: 0,
            };
            for _ in 0..n {
                source.push_frame();
            }
            source
        }

        fn push_frame(&mut self) {
            let image = ImageData::new(4, 4, ImageFormat::Rgb8, vec![0u8; 48]);
            let frame = Frame::new(image, self.sequence, "scripted");
            self.sequence += 1;
            self.script.push_back(Ok(ReadOutcome::Frame(frame)));
        }

        fn push_error(&mut self, error: ContractError) {
            self.script.push_back(Err(error));
        }
    }

    impl FrameSource for ScriptedSource {
        fn source_id(&self) -> &str {
            "scripted"
        }

        fn kind(&self) -> SourceType {
            SourceType::Folder
        }

        fn open(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        fn read(&mut self) -> Result<ReadOutcome, ContractError> {
            self.script
                .pop_front()
                .unwrap_or(Ok(ReadOutcome::EndOfStream))
        }

        fn close(&mut self) {}

        fn progress(&self) -> Option<f64> {
            None
        }
    }

    fn run_loop(
        source: ScriptedSource,
        mode: StubMode,
        config: SourceConfig,
        report_only_detections: bool,
    ) -> (CaptureExit, IntakeReceiver) {
        let metrics = Arc::new(ReporterMetrics::new());
        let (tx, rx) = intake(64, BackpressurePolicy::Block, metrics);
        let capture = CaptureLoop::new(
            Box::new(source),
            Box::new(StubEngine::new(mode, 0.5)),
            tx,
            &config,
            report_only_detections,
            StopSignal::new(),
        );
        (capture.run(), rx)
    }

    fn drain_ids(rx: &IntakeReceiver) -> Vec<u64> {
        let mut ids = Vec::new();
        while let Some(result) = rx.try_recv() {
            ids.push(result.frame_id);
        }
        ids
    }

    #[test]
    fn test_submits_in_source_order_until_end_of_stream() {
        let (exit, rx) = run_loop(
            ScriptedSource::frames(4),
            StubMode::Normal,
            SourceConfig::default(),
            false,
        );
        assert_eq!(exit.reason, StopReason::EndOfStream);
        assert_eq!(exit.stats.frames_read, 4);
        assert_eq!(exit.stats.results_submitted, 4);
        assert_eq!(exit.stats.detections_total, 12);
        assert_eq!(drain_ids(&rx), [0, 1, 2, 3]);
    }

    #[test]
    fn test_inference_failure_skips_frame() {
        let (exit, rx) = run_loop(
            ScriptedSource::frames(3),
            StubMode::Error,
            SourceConfig::default(),
            false,
        );
        assert_eq!(exit.reason, StopReason::EndOfStream);
        assert_eq!(exit.stats.inference_failures, 3);
        assert_eq!(exit.stats.results_submitted, 0);
        assert!(drain_ids(&rx).is_empty());
    }

    #[test]
    fn test_report_only_detections_filters_empty() {
        let (exit, rx) = run_loop(
            ScriptedSource::frames(3),
            StubMode::Empty,
            SourceConfig::default(),
            true,
        );
        assert_eq!(exit.stats.frames_processed, 3);
        assert_eq!(exit.stats.frames_skipped, 3);
        assert!(drain_ids(&rx).is_empty());
    }

    #[test]
    fn test_skip_frames_decimates() {
        let config = SourceConfig {
            skip_frames: 2,
            ..Default::default()
        };
        let (exit, rx) = run_loop(ScriptedSource::frames(7), StubMode::Normal, config, false);
        assert_eq!(exit.stats.frames_read, 7);
        assert_eq!(exit.stats.frames_skipped, 4);
        assert_eq!(drain_ids(&rx), [0, 3, 6]);
    }

    #[test]
    fn test_fatal_source_error_ends_loop() {
        let mut source = ScriptedSource::frames(2);
        source.push_error(ContractError::source_read("scripted", "hiccup"));
        source.push_frame();
        source.push_error(ContractError::source_fatal("scripted", "gone"));
        source.push_frame();

        let (exit, rx) = run_loop(source, StubMode::Normal, SourceConfig::default(), false);
        assert_eq!(exit.reason, StopReason::SourceFailed);
        assert_eq!(drain_ids(&rx), [0, 1, 2]);
    }

    #[test]
    fn test_stop_before_first_read() {
        let metrics = Arc::new(ReporterMetrics::new());
        let (tx, _rx) = intake(8, BackpressurePolicy::Block, metrics);
        let stop = StopSignal::new();
        stop.trigger();

        let exit = CaptureLoop::new(
            Box::new(ScriptedSource::frames(5)),
            Box::new(StubEngine::new(StubMode::Normal, 0.5)),
            tx,
            &SourceConfig::default(),
            false,
            stop,
        )
        .run();
        assert_eq!(exit.reason, StopReason::Stopped);
        assert_eq!(exit.stats.frames_read, 0);
    }

    #[test]
    fn test_reporter_gone_ends_loop() {
        let metrics = Arc::new(ReporterMetrics::new());
        let (tx, rx) = intake(8, BackpressurePolicy::Block, metrics);
        drop(rx);

        let exit = CaptureLoop::new(
            Box::new(ScriptedSource::frames(5)),
            Box::new(StubEngine::new(StubMode::Normal, 0.5)),
            tx,
            &SourceConfig::default(),
            false,
            StopSignal::new(),
        )
        .run();
        assert_eq!(exit.reason, StopReason::ReporterClosed);
        assert_eq!(exit.stats.frames_read, 1);
    }
}
