//! Shared fixtures: scripted transport, image folders, configs

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use contracts::{
    AgentConfig, ContractError, InferenceResult, ReportTransport, SealedReport, SourceType,
};

/// Scripted transport: counts calls, records delivered bodies, fails on demand
#[derive(Clone, Default)]
pub struct MockTransport {
    calls: Arc<AtomicU64>,
    delivered: Arc<Mutex<Vec<SealedReport>>>,
    failing: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn failing() -> Self {
        let mock = Self::default();
        mock.set_failing(true);
        mock
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<SealedReport> {
        self.delivered.lock().unwrap().clone()
    }
}

impl ReportTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn endpoint(&self) -> &str {
        "mock://collector"
    }

    async fn send(&mut self, report: &SealedReport) -> Result<(), ContractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ContractError::delivery("mock://collector", "HTTP 503", true));
        }
        self.delivered.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Write `count` small PNGs named `img_000.png`, `img_001.png`, ...
pub fn write_pngs(dir: &Path, count: usize) {
    for i in 0..count {
        let image = image::RgbImage::from_fn(32, 24, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 10) as u8, (i * 40) as u8])
        });
        image.save(dir.join(format!("img_{i:03}.png"))).unwrap();
    }
}

/// Folder-source config with short retry delays
pub fn folder_config(images: &Path, cache_path: &Path) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.device_id = "edge-001".to_string();
    config.source.source_type = SourceType::Folder;
    config.source.path = images.display().to_string();
    config.reporter.batch_size = 10;
    config.reporter.batch_interval_secs = 5.0;
    config.reporter.max_retries = 3;
    config.reporter.retry_initial_delay_secs = 0.01;
    config.reporter.retry_max_delay_secs = 0.05;
    config.cache.storage_path = cache_path.to_path_buf();
    config
}

pub fn open_cache(config: &AgentConfig) -> cache_store::CacheStore {
    cache_store::CacheStore::open(
        &config.cache.storage_path,
        config.cache.max_entries,
        config.cache.max_age(),
    )
    .unwrap()
}

pub fn result(frame_id: u64) -> InferenceResult {
    InferenceResult {
        frame_id,
        source_id: "scenario".to_string(),
        captured_at: Utc::now(),
        detections: Vec::new(),
        inference_time_ms: 1.5,
        metadata: Default::default(),
    }
}

/// Poll `condition` every 20 ms until it holds or `timeout` passes
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
