//! Interrupting a run and releasing the client session

mod common;

use std::sync::Arc;
use std::time::Duration;

use channel_dl::{ChannelDownloader, Target, Targets, run_until};
use common::{MemoryService, assert_no_part_files, config_for, document};
use tempfile::TempDir;

fn slow_service() -> MemoryService {
    MemoryService::new()
        .channel(
            7,
            "Slow",
            "slow",
            (1..=6).map(|id| document(id, &format!("f{id}.txt"), 4, "")).collect(),
        )
        .transfer_delay(Duration::from_secs(30))
}

#[tokio::test]
async fn completed_run_disconnects_the_client() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(MemoryService::new().channel(
        7,
        "Quick",
        "quick",
        vec![document(1, "a.txt", 4, "")],
    ));
    let downloader = ChannelDownloader::new(service.clone(), config_for(dir.path())).unwrap();
    let targets: Targets = [Target::new("quick")].into_iter().collect();

    let summary = run_until(&downloader, &targets, std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.downloaded(), 1);
    assert_eq!(service.disconnects(), 1);
}

#[tokio::test]
async fn interrupt_cancels_outstanding_work_and_disconnects() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(slow_service());
    let downloader = ChannelDownloader::new(service.clone(), config_for(dir.path())).unwrap();
    let targets: Targets = [Target::new("slow")].into_iter().collect();

    let summary = run_until(
        &downloader,
        &targets,
        tokio::time::sleep(Duration::from_millis(100)),
    )
    .await
    .unwrap();

    assert!(downloader.is_shutting_down());
    assert_eq!(summary.downloaded(), 0);
    assert_eq!(summary.cancelled(), 6);
    assert_eq!(service.disconnects(), 1);
    assert_no_part_files(dir.path());
}

#[tokio::test]
async fn dry_run_touches_nothing_and_still_disconnects() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(slow_service());
    let mut config = config_for(dir.path());
    config.download.dry_run = true;
    let downloader = ChannelDownloader::new(service.clone(), config).unwrap();
    let targets: Targets = [Target::new("slow")].into_iter().collect();

    let summary = run_until(&downloader, &targets, std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.channels[0].planned, 6);
    assert_eq!(service.transfers(), 0);
    assert_eq!(service.disconnects(), 1);
    assert!(common::files_under(dir.path()).is_empty());
}
