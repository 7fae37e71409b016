//! Supervisor loop integration tests
//!
//! Tests verify that:
//! - A cycle runs harvest, then create and publish for every unpublished day
//! - A failing stage abandons the cycle with a structured failure
//! - The loop keeps cycling after failures and panics
//! - Progress persisted by a failed cycle is picked up by the next one

mod helpers;

use helpers::*;
use runstreak_bot::{
    CreateOutcome, CycleFailure, CycleStage, Error, HarvestOutcome, LedgerStore, PublishOutcome,
    SkipReason, Supervisor,
};
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn test_cycle_harvests_creates_and_publishes() {
    let start = date(2024, 5, 1);
    let ws = Workspace::new(start);
    ws.add_material("a.mov");
    let source = FakeSource::new(vec![FetchScript::ok(vec![run_on(start, 1, 7, 1.0)])]);
    let publisher = FakePublisher::new();
    let streak = ws.streak(start, source, FakeRenderer::new(RenderMode::Write), publisher.clone());
    let supervisor = Supervisor::new(streak, HOUR);

    let report = supervisor.run_cycle().await.unwrap();

    assert_eq!(report.day, 1);
    assert!(matches!(report.harvest, HarvestOutcome::Harvested { accepted: 1, .. }));
    assert_eq!(report.days.len(), 1);
    assert!(matches!(report.days[0].create, CreateOutcome::Created { day: 1, .. }));
    assert!(matches!(report.days[0].publish, PublishOutcome::Published { day: 1, .. }));
    assert_eq!(publisher.posts().len(), 1);

    // Nothing left to do on the same day
    let report = supervisor.run_cycle().await.unwrap();
    assert!(matches!(report.harvest, HarvestOutcome::UpToDate { .. }));
    assert!(report.days.is_empty());
    assert_eq!(publisher.posts().len(), 1);
}

#[tokio::test]
async fn test_cycle_catches_up_every_harvested_day() {
    let start = date(2024, 5, 1);
    let ws = Workspace::new(start);
    for clip in ["a.mov", "b.mov", "c.mov", "d.mov"] {
        ws.add_material(clip);
    }
    let source = FakeSource::new(vec![FetchScript::ok(vec![
        run_on(start, 1, 7, 1.0),
        run_on(start, 2, 7, 2.0),
        run_on(start, 3, 7, 3.0),
    ])]);
    let renderer = FakeRenderer::new(RenderMode::Write);
    let publisher = FakePublisher::new();
    let streak = ws.streak(date(2024, 5, 3), source, renderer.clone(), publisher.clone());
    let supervisor = Supervisor::new(streak, HOUR);

    let report = supervisor.run_cycle().await.unwrap();

    assert_eq!(report.created_days(), vec![1, 2, 3]);
    assert_eq!(report.published_days(), vec![1, 2, 3]);
    for day in 1..=3 {
        assert!(supervisor.streak().gate().artifact_exists(day));
        assert!(supervisor.streak().gate().is_published(day));
    }
    let posts: Vec<String> = publisher.posts().into_iter().map(|(_, text)| text).collect();
    assert_eq!(posts.len(), 3);
    assert!(posts[0].starts_with("Day 1:"));
    assert!(posts[1].starts_with("Day 2:"));
    assert!(posts[2].starts_with("Day 3:"));
    assert_eq!(ws.material_count(), 1);

    // Two more cycles on the same day change nothing
    supervisor.run_cycle().await.unwrap();
    supervisor.run_cycle().await.unwrap();
    assert_eq!(renderer.renders(), 3);
    assert_eq!(publisher.posts().len(), 3);
    assert_eq!(ws.material_count(), 1);
}

#[tokio::test]
async fn test_days_without_material_wait_for_later_cycles() {
    let start = date(2024, 5, 1);
    let ws = Workspace::new(start);
    ws.add_material("a.mov");
    let source = FakeSource::new(vec![FetchScript::ok(vec![
        run_on(start, 1, 7, 1.0),
        run_on(start, 2, 7, 2.0),
    ])]);
    let publisher = FakePublisher::new();
    let streak = ws.streak(date(2024, 5, 2), source, FakeRenderer::new(RenderMode::Write), publisher.clone());
    let supervisor = Supervisor::new(streak, HOUR);

    let report = supervisor.run_cycle().await.unwrap();
    assert_eq!(report.created_days(), vec![1]);
    assert_eq!(report.days[1].create, CreateOutcome::Skipped { day: 2, reason: SkipReason::NoRawMaterial });
    assert_eq!(report.days[1].publish, PublishOutcome::Skipped { day: 2, reason: SkipReason::NoArtifact });

    ws.add_material("b.mov");
    let report = supervisor.run_cycle().await.unwrap();
    assert_eq!(report.days.len(), 1);
    assert_eq!(report.published_days(), vec![2]);
    assert_eq!(publisher.posts().len(), 2);
}

#[tokio::test]
async fn test_harvest_failure_abandons_cycle() {
    let start = date(2024, 5, 1);
    let ws = Workspace::new(start);
    ws.add_material("a.mov");
    let source = FakeSource::new(vec![FetchScript::failing_after(vec![run_on(start, 1, 7, 1.0)], 0)]);
    let renderer = FakeRenderer::new(RenderMode::Write);
    let streak = ws.streak(date(2024, 5, 1), source, renderer.clone(), FakePublisher::new());
    let supervisor = Supervisor::new(streak, HOUR);

    let failure = supervisor.run_cycle().await.unwrap_err();

    assert!(matches!(
        failure,
        CycleFailure::Stage { stage: CycleStage::Harvest, error: Error::Harvest { accepted: 0, .. } }
    ));
    assert_eq!(renderer.renders(), 0);
    assert_eq!(ws.material_count(), 1);
}

#[tokio::test]
async fn test_publish_failure_reported_as_publish_stage() {
    let start = date(2024, 5, 1);
    let ws = Workspace::new(start);
    ws.add_material("a.mov");
    let source = FakeSource::new(vec![FetchScript::ok(vec![run_on(start, 1, 7, 1.0)])]);
    let publisher = FakePublisher::new();
    publisher.set_failing(true);
    let renderer = FakeRenderer::new(RenderMode::Write);
    let streak = ws.streak(start, source, renderer.clone(), publisher.clone());
    let supervisor = Supervisor::new(streak, HOUR);

    let failure = supervisor.run_cycle().await.unwrap_err();

    assert!(matches!(failure, CycleFailure::Stage { stage: CycleStage::Publish, .. }));
    assert!(supervisor.streak().gate().artifact_exists(1));

    // Next cycle publishes the existing artifact without rendering again
    publisher.set_failing(false);
    let report = supervisor.run_cycle().await.unwrap();
    assert_eq!(report.days[0].create, CreateOutcome::Skipped { day: 1, reason: SkipReason::AlreadyCreated });
    assert_eq!(report.published_days(), vec![1]);
    assert_eq!(renderer.renders(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_loop_recovers_from_crash_mid_harvest() {
    // Fetch drops after 2 of 5 records; the next cycle resumes from what was saved
    let start = date(2024, 5, 1);
    let ws = Workspace::new(start);
    ws.add_material("a.mov");
    let runs: Vec<_> = (1..=5).map(|d| run_on(start, d, 7, d as f64)).collect();
    let source = FakeSource::new(vec![
        FetchScript::failing_after(runs.clone(), 2),
        FetchScript::ok(runs),
    ]);
    let publisher = FakePublisher::new();
    let streak = ws.streak(date(2024, 5, 5), source.clone(), FakeRenderer::new(RenderMode::Write), publisher.clone());
    let supervisor = Supervisor::new(streak, HOUR);

    // Cycles at 0h and 1h, shutdown while sleeping before the 2h cycle
    let cycles = supervisor
        .run_until(tokio::time::sleep(HOUR + HOUR / 2))
        .await;

    assert_eq!(cycles, 2);
    assert_eq!(source.calls(), vec![start, date(2024, 5, 2)]);
    let ledger = LedgerStore::new(&ws.config.data_file).try_load().unwrap();
    assert_eq!(ledger.len(), 5);
    assert_eq!(publisher.posts().len(), 1);
    // One clip: the oldest unpublished day gets it
    assert!(publisher.posts()[0].1.starts_with("Day 1:"));
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_panicking_stage() {
    let start = date(2024, 5, 1);
    let ws = Workspace::new(start);
    ws.add_material("a.mov");
    ws.add_material("b.mov");
    let source = FakeSource::new(vec![FetchScript::ok(vec![run_on(start, 1, 7, 1.0)])]);
    let renderer = FakeRenderer::new(RenderMode::Panic);
    let streak = ws.streak(start, source, renderer.clone(), FakePublisher::new());
    let supervisor = Supervisor::new(streak, HOUR);

    let cycles = supervisor
        .run_until(tokio::time::sleep(HOUR * 2 + HOUR / 2))
        .await;

    assert_eq!(cycles, 3);
    assert_eq!(renderer.renders(), 2, "each panic consumed one clip");
    assert_eq!(ws.material_count(), 0);
    assert!(!supervisor.streak().gate().artifact_exists(1));
}
