//! Agent orchestrator - drives one run from INIT to STOPPED.
//!
//! INIT opens the source, builds the engine and spawns the reporter. RUNNING
//! hands the capture loop to a blocking thread. DRAINING waits for the
//! capture thread, lets the reporter seal and flush what is left, then closes
//! the source. STOPPED is terminal.

use std::fmt;

use cache_store::CacheStore;
use contracts::{AgentConfig, FrameSource, InferenceEngine, ReportTransport, StopSignal};
use reporter::{IntakeSender, ReporterHandle, ReporterSnapshot};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::capture::{CaptureExit, CaptureLoop, StopReason};
use crate::error::AgentError;
use crate::state::{AgentState, StateMachine};
use crate::stats::AgentStats;

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub final_state: AgentState,
    pub reason: StopReason,
    pub stats: AgentStats,
    pub reporter: ReporterSnapshot,
}

impl RunReport {
    /// 0 for end of stream or stop, 3 for a fatal source, 1 if the reporter
    /// went away
    pub fn exit_code(&self) -> i32 {
        match self.reason {
            StopReason::EndOfStream | StopReason::Stopped => 0,
            StopReason::SourceFailed => 3,
            StopReason::ReporterClosed => 1,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Final state: {} ({})", self.final_state, self.reason.as_str())?;
        writeln!(f)?;
        writeln!(f, "{}", self.stats)?;
        write!(f, "{}", self.reporter)
    }
}

/// The edge agent
pub struct Agent {
    config: AgentConfig,
    stop: StopSignal,
    state: StateMachine,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self::with_stop(config, StopSignal::new())
    }

    /// Use an externally owned stop signal (signal handlers, tests)
    pub fn with_stop(config: AgentConfig, stop: StopSignal) -> Self {
        Self {
            config,
            stop,
            state: StateMachine::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> AgentState {
        self.state.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    /// Run with the transport and cache described by the configuration
    pub async fn run(self) -> Result<RunReport, AgentError> {
        let (source, engine) = match self.prepare() {
            Ok(parts) => parts,
            Err(e) => return Err(self.abort(e)),
        };
        let (reporter, intake) = match reporter::spawn_from_config(&self.config, self.stop.clone())
        {
            Ok(spawned) => spawned,
            Err(e) => {
                let mut source = source;
                source.close();
                return Err(self.abort(e.into()));
            }
        };
        self.execute(source, engine, reporter, intake).await
    }

    /// Run with an explicit transport and cache
    pub async fn run_with<T: ReportTransport + 'static>(
        self,
        transport: T,
        cache: CacheStore,
    ) -> Result<RunReport, AgentError> {
        let (source, engine) = match self.prepare() {
            Ok(parts) => parts,
            Err(e) => return Err(self.abort(e)),
        };
        let (reporter, intake) = ReporterHandle::spawn(
            &self.config.reporter,
            &self.config.device_id,
            transport,
            cache,
            self.stop.clone(),
        );
        self.execute(source, engine, reporter, intake).await
    }

    /// INIT: open the source, build and warm up the engine
    #[instrument(
        name = "agent_init",
        skip(self),
        fields(device_id = %self.config.device_id, source_type = %self.config.source.source_type)
    )]
    fn prepare(&self) -> Result<(Box<dyn FrameSource>, Box<dyn InferenceEngine>), AgentError> {
        let mut source =
            ingestion::create_source(&self.config.source, &self.stop).map_err(AgentError::Startup)?;
        source.open().map_err(AgentError::Startup)?;
        info!(source = %source.source_id(), progress = ?source.progress(), "Source opened");

        let mut engine = match inference::create_engine(&self.config.inference) {
            Ok(engine) => engine,
            Err(e) => {
                source.close();
                return Err(AgentError::Startup(e));
            }
        };
        if self.config.inference.warmup {
            if let Err(e) = engine.warm_up() {
                source.close();
                return Err(AgentError::Startup(e));
            }
        }
        info!(engine = engine.name(), "Inference engine ready");

        Ok((source, engine))
    }

    fn abort(&self, error: AgentError) -> AgentError {
        error!(error = %error, "Agent startup failed");
        if let Err(e) = self.state.advance(AgentState::Stopped) {
            warn!(error = %e, "Could not mark agent stopped");
        }
        error
    }

    /// RUNNING -> DRAINING -> STOPPED
    async fn execute(
        self,
        source: Box<dyn FrameSource>,
        engine: Box<dyn InferenceEngine>,
        reporter: ReporterHandle,
        intake: IntakeSender,
    ) -> Result<RunReport, AgentError> {
        let capture = CaptureLoop::new(
            source,
            engine,
            intake,
            &self.config.source,
            self.config.report_only_detections,
            self.stop.clone(),
        );

        self.state.advance(AgentState::Running)?;
        let mut capture_task = tokio::task::spawn_blocking(move || capture.run());

        let joined = tokio::select! {
            joined = &mut capture_task => {
                self.state.advance(AgentState::Draining)?;
                joined
            }
            _ = self.stop.cancelled() => {
                info!("Stop signal received");
                self.state.advance(AgentState::Draining)?;
                capture_task.await
            }
        };

        // the capture thread dropped its intake sender; this flushes
        let snapshot = reporter.shutdown().await;

        let exit: CaptureExit = match joined {
            Ok(exit) => exit,
            Err(e) => {
                self.state.advance(AgentState::Stopped)?;
                return Err(AgentError::CaptureTask(e.to_string()));
            }
        };
        let CaptureExit {
            reason,
            stats,
            mut source,
        } = exit;
        source.close();

        self.state.advance(AgentState::Stopped)?;
        info!(
            reason = reason.as_str(),
            delivered = snapshot.delivered,
            cached = snapshot.cached,
            "Agent stopped"
        );

        Ok(RunReport {
            final_state: self.state.current(),
            reason,
            stats,
            reporter: snapshot,
        })
    }
}
