// End-to-end reduction scenarios against the in-memory store and catalog.

use chrono::{Months, Utc};

use videoslim::catalog::memory::InMemoryCatalog;
use videoslim::catalog::{OwnerQuery, VideoCatalog};
use videoslim::core::error::ReduceError;
use videoslim::core::types::{Rendition, Video, VideoStatus};
use videoslim::package::playlist;
use videoslim::reduce::{
    inspect, EligibilityFilter, Operator, Pacing, Reducer, ReducerSettings, RunMode, SkipReason,
    VideoOutcome,
};
use videoslim::storage::memory::{InMemoryObjectStore, StoreOp};
use videoslim::storage::{ObjectStore, HLS_CONTENT_TYPE};

const SEGMENTS_PER_RENDITION: u64 = 4;

fn video(id: &str, permlink: &str, months_old: u32) -> Video {
    Video {
        id: id.to_string(),
        owner: "alice".to_string(),
        permlink: Some(permlink.to_string()),
        title: Some(format!("Video {}", id)),
        filename: Some(format!("{}.mp4", permlink)),
        created: Utc::now() - Months::new(months_old),
        size: Some(500 * 1024 * 1024),
        status: VideoStatus::Published,
        optimization: None,
    }
}

/// Master as the upload pipeline writes it: one stream-info entry per rendition.
fn ladder_master(renditions: &[Rendition]) -> String {
    let mut master = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for r in renditions {
        for line in playlist::synthesize_master(*r).lines().skip(2) {
            master.push_str(line);
            master.push('\n');
        }
    }
    master
}

async fn seed(store: &InMemoryObjectStore, permlink: &str, renditions: &[Rendition]) {
    store
        .insert(
            &format!("{}/default.m3u8", permlink),
            ladder_master(renditions),
        )
        .await;
    for r in renditions {
        store.insert(&format!("{}/{}.m3u8", permlink, r), "#EXTM3U\n").await;
        for i in 0..SEGMENTS_PER_RENDITION {
            store
                .insert(&format!("{}/{}/{}.ts", permlink, r, i), vec![0u8; 188])
                .await;
        }
    }
}

fn reducer(
    store: &InMemoryObjectStore,
    catalog: &InMemoryCatalog,
) -> Reducer<InMemoryObjectStore, InMemoryCatalog> {
    Reducer::new(
        store.clone(),
        catalog.clone(),
        ReducerSettings {
            pacing: Pacing::unlimited(),
            ..ReducerSettings::default()
        },
    )
}

fn operator() -> Operator {
    Operator::slim_user("alice", 6)
}

#[tokio::test]
async fn test_1080p_and_360p_keeps_360p() {
    let store = InMemoryObjectStore::new();
    let v = video("v1", "zlsjctuz", 12);
    let catalog = InMemoryCatalog::new(vec![v.clone()]);
    seed(&store, "zlsjctuz", &[Rendition::P1080, Rendition::P360]).await;

    let inventory = inspect(&store, "zlsjctuz").await.unwrap();
    assert_eq!(inventory.available(), &[Rendition::P360, Rendition::P1080]);
    assert_eq!(inventory.smallest(), Some(Rendition::P360));
    assert_eq!(inventory.to_delete(), &[Rendition::P1080]);

    let report = reducer(&store, &catalog)
        .reduce_video(&v, &operator(), RunMode::Execute)
        .await;

    assert_eq!(report.outcome, VideoOutcome::Reduced);
    assert_eq!(report.kept, Some(Rendition::P360));
    assert_eq!(report.removed, vec![Rendition::P1080]);
    assert_eq!(report.objects_deleted, 1 + SEGMENTS_PER_RENDITION);

    assert!(!store.contains("zlsjctuz/1080p.m3u8").await);
    for i in 0..SEGMENTS_PER_RENDITION {
        assert!(!store.contains(&format!("zlsjctuz/1080p/{}.ts", i)).await);
        assert!(store.contains(&format!("zlsjctuz/360p/{}.ts", i)).await);
    }
    assert!(store.contains("zlsjctuz/360p.m3u8").await);

    let master = store
        .get_content("zlsjctuz/default.m3u8")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(master, playlist::synthesize_master(Rendition::P360));
    assert_eq!(
        playlist::referenced_renditions(&master).unwrap(),
        vec![Rendition::P360]
    );
    assert_eq!(
        store.content_type("zlsjctuz/default.m3u8").await.as_deref(),
        Some(HLS_CONTENT_TYPE)
    );

    let stored = catalog.get("v1").await.unwrap();
    let meta = stored.optimization.expect("optimization metadata");
    assert_eq!(meta.optimization_type, "storage-diet-user");
    assert_eq!(meta.estimated_bytes_freed, 419_430_400);
}

#[tokio::test]
async fn test_only_360p_is_already_optimized() {
    let store = InMemoryObjectStore::new();
    let v = video("v1", "abc", 12);
    let catalog = InMemoryCatalog::new(vec![v.clone()]);
    seed(&store, "abc", &[Rendition::P360]).await;

    let report = reducer(&store, &catalog)
        .reduce_video(&v, &operator(), RunMode::Execute)
        .await;

    assert_eq!(
        report.outcome,
        VideoOutcome::Skipped {
            reason: SkipReason::AlreadyOptimized
        }
    );
    assert_eq!(report.objects_deleted, 0);
    assert_eq!(store.calls(StoreOp::Delete), 0);
    assert_eq!(store.calls(StoreOp::Put), 0);
}

#[tokio::test]
async fn test_zero_renditions_is_no_content() {
    let store = InMemoryObjectStore::new();
    let v = video("v1", "abc", 12);
    let catalog = InMemoryCatalog::new(vec![v.clone()]);

    let report = reducer(&store, &catalog)
        .reduce_video(&v, &operator(), RunMode::Execute)
        .await;

    assert_eq!(
        report.outcome,
        VideoOutcome::Skipped {
            reason: SkipReason::NoContentFound
        }
    );
    assert_eq!(store.calls(StoreOp::Delete), 0);
    assert_eq!(store.calls(StoreOp::Put), 0);
    assert!(catalog.get("v1").await.unwrap().optimization.is_none());
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let store = InMemoryObjectStore::new();
    let v = video("v1", "abc", 12);
    let catalog = InMemoryCatalog::new(vec![v.clone()]);
    seed(
        &store,
        "abc",
        &[Rendition::P480, Rendition::P720, Rendition::P1080],
    )
    .await;

    let r = reducer(&store, &catalog);
    let first = r.reduce_video(&v, &operator(), RunMode::Execute).await;
    assert_eq!(first.outcome, VideoOutcome::Reduced);
    let master_after_first = store.get_content("abc/default.m3u8").await.unwrap();
    let keys_after_first = store.keys().await;

    let puts = store.calls(StoreOp::Put);
    let deletes = store.calls(StoreOp::Delete);
    let second = r.reduce_video(&v, &operator(), RunMode::Execute).await;

    assert_eq!(
        second.outcome,
        VideoOutcome::Skipped {
            reason: SkipReason::AlreadyOptimized
        }
    );
    assert_eq!(store.calls(StoreOp::Put), puts);
    assert_eq!(store.calls(StoreOp::Delete), deletes);
    assert_eq!(
        store.get_content("abc/default.m3u8").await.unwrap(),
        master_after_first
    );
    assert_eq!(store.keys().await, keys_after_first);
}

#[tokio::test]
async fn test_master_upload_failure_is_degraded() {
    let store = InMemoryObjectStore::new();
    let v = video("v1", "abc", 12);
    let catalog = InMemoryCatalog::new(vec![v.clone()]);
    seed(&store, "abc", &[Rendition::P360, Rendition::P720]).await;
    store.fail_key(StoreOp::Put, "abc/default.m3u8");

    let report = reducer(&store, &catalog)
        .reduce_video(&v, &operator(), RunMode::Execute)
        .await;

    match &report.outcome {
        VideoOutcome::Failed { degraded, message } => {
            assert!(*degraded);
            assert!(message.contains("master playlist"), "{}", message);
        }
        other => panic!("expected degraded failure, got {:?}", other),
    }
    // Deletes already happened; master still holds the old content.
    assert!(!store.contains("abc/720p.m3u8").await);
    assert_eq!(
        store.get_content("abc/default.m3u8").await.unwrap(),
        Some(ladder_master(&[Rendition::P360, Rendition::P720]))
    );
    assert!(!report.catalog_updated);
    assert!(catalog.get("v1").await.unwrap().optimization.is_none());
}

#[tokio::test]
async fn test_rerun_after_degraded_failure_repairs_master() {
    let store = InMemoryObjectStore::new();
    let v = video("v1", "abc", 12);
    let catalog = InMemoryCatalog::new(vec![v.clone()]);
    seed(&store, "abc", &[Rendition::P360, Rendition::P1080]).await;
    store.fail_key(StoreOp::Put, "abc/default.m3u8");

    let r = reducer(&store, &catalog);
    let first = r.reduce_video(&v, &operator(), RunMode::Execute).await;
    assert!(matches!(
        first.outcome,
        VideoOutcome::Failed { degraded: true, .. }
    ));
    let stale = store.get_content("abc/default.m3u8").await.unwrap().unwrap();
    assert_eq!(
        playlist::referenced_renditions(&stale).unwrap(),
        vec![Rendition::P360, Rendition::P1080]
    );

    store.clear_faults();
    let second = r.reduce_video(&v, &operator(), RunMode::Execute).await;

    assert_eq!(second.outcome, VideoOutcome::Reduced);
    assert!(second.master_repaired);
    assert!(second.removed.is_empty());
    assert_eq!(second.objects_deleted, 0);
    assert_eq!(
        store.get_content("abc/default.m3u8").await.unwrap(),
        Some(playlist::synthesize_master(Rendition::P360))
    );
    assert!(catalog.get("v1").await.unwrap().optimization.is_some());

    // Once repaired, a further run is the usual no-op.
    let third = r.reduce_video(&v, &operator(), RunMode::Execute).await;
    assert_eq!(
        third.outcome,
        VideoOutcome::Skipped {
            reason: SkipReason::AlreadyOptimized
        }
    );
}

#[tokio::test]
async fn test_batch_continues_past_failures() {
    let store = InMemoryObjectStore::new();
    let videos = vec![
        video("v1", "aaa", 12),
        video("v2", "bbb", 12),
        video("v3", "ccc", 12),
        video("v4", "ddd", 12),
    ];
    let catalog = InMemoryCatalog::new(videos.clone());
    seed(&store, "aaa", &[Rendition::P360, Rendition::P1080]).await;
    seed(&store, "bbb", &[Rendition::P360, Rendition::P1080]).await;
    seed(&store, "ccc", &[Rendition::P480]).await;
    seed(&store, "ddd", &[Rendition::P480, Rendition::P720]).await;
    store.fail_key(StoreOp::Exists, "bbb/480p.m3u8");

    let summary = reducer(&store, &catalog)
        .run_batch(&videos, 3, &operator(), RunMode::Execute)
        .await
        .unwrap();

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.reduced, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped.get("already_optimized"), Some(&1));
    assert_eq!(summary.catalog_updated, 2);
    assert_eq!(summary.objects_deleted, 2 * (1 + SEGMENTS_PER_RENDITION));
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("Failed to optimize video v2"));
    assert_eq!(summary.estimated_bytes_freed, 2 * 419_430_400);

    // The video after the failure was still reduced.
    assert!(!store.contains("ddd/720p.m3u8").await);
}

#[tokio::test]
async fn test_dry_run_mutates_nothing_and_matches_real_analysis() {
    let dry_store = InMemoryObjectStore::new();
    let real_store = InMemoryObjectStore::new();
    let v = video("v1", "abc", 12);
    for store in [&dry_store, &real_store] {
        seed(store, "abc", &[Rendition::P360, Rendition::P720, Rendition::P1080]).await;
    }
    let dry_catalog = InMemoryCatalog::new(vec![v.clone()]);
    let real_catalog = InMemoryCatalog::new(vec![v.clone()]);
    let keys_before = dry_store.keys().await;

    let dry = reducer(&dry_store, &dry_catalog)
        .run_batch(&[v.clone()], 25, &operator(), RunMode::DryRun)
        .await
        .unwrap();
    let real = reducer(&real_store, &real_catalog)
        .run_batch(&[v.clone()], 25, &operator(), RunMode::Execute)
        .await
        .unwrap();

    assert!(dry.dry_run);
    assert_eq!(dry.planned, 1);
    assert_eq!(dry.reduced, 0);
    assert_eq!(dry.objects_deleted, 0);
    assert_eq!(dry.catalog_updated, 0);
    assert_eq!(dry_store.keys().await, keys_before);
    assert_eq!(dry_store.calls(StoreOp::Put), 0);
    assert_eq!(dry_store.calls(StoreOp::Delete), 0);
    assert!(dry_catalog.get("v1").await.unwrap().optimization.is_none());

    let (d, r) = (&dry.videos[0], &real.videos[0]);
    assert_eq!(d.available, r.available);
    assert_eq!(d.kept, r.kept);
    assert_eq!(d.removed, r.removed);
    assert_eq!(d.estimated_bytes_freed, r.estimated_bytes_freed);
    assert_eq!(dry.estimated_bytes_freed, real.estimated_bytes_freed);
}

#[tokio::test]
async fn test_unreachable_store_aborts_run() {
    let store = InMemoryObjectStore::new();
    let v = video("v1", "abc", 12);
    let catalog = InMemoryCatalog::new(vec![v.clone()]);
    seed(&store, "abc", &[Rendition::P360, Rendition::P720]).await;
    store.fail_all(StoreOp::CheckAccess);

    let result = reducer(&store, &catalog)
        .run_batch(&[v], 25, &operator(), RunMode::Execute)
        .await;

    assert!(matches!(result, Err(ReduceError::StoreUnreachable(_))));
    assert_eq!(store.calls(StoreOp::Exists), 0);
    assert!(store.contains("abc/720p.m3u8").await);
}

#[tokio::test]
async fn test_eligibility_selects_old_s3_videos() {
    let mut ipfs = video("old-ipfs", "ipfsvid", 24);
    ipfs.filename = Some("ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".to_string());
    let catalog = InMemoryCatalog::new(vec![
        video("seven", "seven", 7),
        video("five", "five", 5),
        ipfs,
    ]);

    let videos = catalog
        .find_by_owner("alice", &OwnerQuery::default())
        .await
        .unwrap();
    let filter = EligibilityFilter::older_than_months(Utc::now(), 6, false).unwrap();
    let eligible = filter.select(videos);

    let ids: Vec<&str> = eligible.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["seven"]);
}

#[tokio::test]
async fn test_optimized_flag_hides_video_from_next_owner_run() {
    let store = InMemoryObjectStore::new();
    let v = video("v1", "abc", 12);
    let catalog = InMemoryCatalog::new(vec![v.clone()]);
    seed(&store, "abc", &[Rendition::P360, Rendition::P720]).await;

    let r = reducer(&store, &catalog);
    r.run_batch(&[v], 25, &operator(), RunMode::Execute)
        .await
        .unwrap();

    let remaining = catalog
        .find_by_owner("alice", &OwnerQuery::default())
        .await
        .unwrap();
    assert!(remaining.is_empty());

    let with_optimized = catalog
        .find_by_owner(
            "alice",
            &OwnerQuery {
                include_optimized: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(with_optimized.len(), 1);
    assert_eq!(with_optimized[0].status, VideoStatus::Published);
}
