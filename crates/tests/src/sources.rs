//! Source behavior through the public factory

use std::collections::BTreeSet;
use std::time::Duration;

use agent::{Agent, StopReason};
use contracts::{FrameSource, ReadOutcome, SourceConfig, SourceType, StopSignal};
use ingestion::{create_source, FolderSource};

use crate::support::{folder_config, open_cache, write_pngs, MockTransport};

fn file_of(outcome: ReadOutcome) -> String {
    match outcome {
        ReadOutcome::Frame(frame) => frame.metadata["file"].clone(),
        ReadOutcome::EndOfStream => panic!("unexpected end of stream"),
    }
}

#[test]
fn test_folder_yields_each_file_once_then_ends() {
    let dir = tempfile::tempdir().unwrap();
    write_pngs(dir.path(), 5);

    let config = SourceConfig {
        source_type: SourceType::Folder,
        path: dir.path().display().to_string(),
        ..Default::default()
    };
    let mut source = create_source(&config, &StopSignal::new()).unwrap();
    source.open().unwrap();

    let mut seen = Vec::new();
    let mut sequences = Vec::new();
    loop {
        match source.read().unwrap() {
            ReadOutcome::Frame(frame) => {
                sequences.push(frame.sequence);
                seen.push(frame.metadata["file"].clone());
            }
            ReadOutcome::EndOfStream => break,
        }
    }
    assert_eq!(seen.len(), 5);
    assert_eq!(seen.iter().collect::<BTreeSet<_>>().len(), 5);
    assert_eq!(seen[0], "img_000.png");
    assert_eq!(sequences, [0, 1, 2, 3, 4]);
    assert_eq!(source.progress(), Some(1.0));

    // stays at end of stream
    assert!(matches!(source.read().unwrap(), ReadOutcome::EndOfStream));
    source.close();
}

#[test]
fn test_looping_folder_wraps_without_gap() {
    let dir = tempfile::tempdir().unwrap();
    write_pngs(dir.path(), 3);
    let extensions = SourceConfig::default().extensions;

    let mut source = FolderSource::new(dir.path(), &extensions, true);
    source.open().unwrap();
    assert_eq!(source.file_count(), 3);

    let files: Vec<String> = (0..7).map(|_| file_of(source.read().unwrap())).collect();
    assert_eq!(
        files,
        [
            "img_000.png",
            "img_001.png",
            "img_002.png",
            "img_000.png",
            "img_001.png",
            "img_002.png",
            "img_000.png",
        ]
    );
    assert_eq!(source.progress(), None);
    source.close();
}

#[test]
fn test_folder_ignores_other_extensions() {
    let dir = tempfile::tempdir().unwrap();
    write_pngs(dir.path(), 2);
    std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

    let extensions = SourceConfig::default().extensions;
    let mut source = FolderSource::new(dir.path(), &extensions, false);
    source.open().unwrap();
    assert_eq!(source.file_count(), 2);
}

#[test]
fn test_missing_folder_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let config = SourceConfig {
        source_type: SourceType::Folder,
        path: dir.path().join("absent").display().to_string(),
        ..Default::default()
    };
    let err = create_source(&config, &StopSignal::new())
        .and_then(|mut source| source.open())
        .unwrap_err();
    assert!(err.is_configuration());
}

/// rate_limit = 5 bounds reads to about five per second
#[tokio::test]
async fn test_rate_limit_bounds_reads() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_pngs(images.path(), 4);
    let mut config = folder_config(images.path(), &state.path().join("cache.db"));
    config.source.looping = true;
    config.source.rate_limit = 5.0;
    config.reporter.batch_size = 100;

    let agent = Agent::new(config.clone());
    let stop = agent.stop_signal();
    let run = tokio::spawn(agent.run_with(MockTransport::default(), open_cache(&config)));

    tokio::time::sleep(Duration::from_secs(1)).await;
    stop.trigger();
    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(report.reason, StopReason::Stopped);
    assert!(report.stats.frames_read >= 3, "read {}", report.stats.frames_read);
    assert!(report.stats.frames_read <= 7, "read {}", report.stats.frames_read);
}
