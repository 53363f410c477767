//! RetrievalService end to end over a temp library and the color embedder.

mod common;

use common::*;
use mm_core::LibraryConfig;
use mm_library::{LibraryError, RetrievalService, SearchOutcome};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

async fn service_over(dir: &Path) -> RetrievalService {
    let service = RetrievalService::new(library_config(dir), Arc::new(ColorEmbedder::default()));
    service.rebuild().await.unwrap();
    service
}

fn hits(outcome: SearchOutcome) -> Vec<(String, f32)> {
    match outcome {
        SearchOutcome::Hits(h) => h.into_iter().map(|h| (h.identifier, h.score)).collect(),
        SearchOutcome::EmptyCorpus => panic!("expected hits"),
    }
}

fn rgb_library() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "red.png", [255, 0, 0]);
    write_png(tmp.path(), "green.png", [0, 255, 0]);
    write_png(tmp.path(), "blue.png", [0, 0, 255]);
    write_png(tmp.path(), "magenta.png", [255, 0, 255]);
    tmp
}

// ============================================================
// Search
// ============================================================

#[tokio::test]
async fn test_search_ranks_by_similarity() {
    init_tracing();
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    assert_eq!(service.size(), 4);

    let ranked = hits(service.search("red", 2).await.unwrap());
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].0, "red.png");
    assert!((ranked[0].1 - 1.0).abs() < 1e-4);
    assert_eq!(ranked[1].0, "magenta.png");
    assert!((ranked[1].1 - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
}

#[tokio::test]
async fn test_search_returns_original_bytes() {
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    let SearchOutcome::Hits(found) = service.search("blue", 1).await.unwrap() else {
        panic!("expected hits");
    };
    assert_eq!(found[0].payload, std::fs::read(lib.path().join("blue.png")).unwrap());
}

#[tokio::test]
async fn test_top_k_larger_than_library() {
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    let ranked = hits(service.search("purple", 50).await.unwrap());
    assert_eq!(ranked.len(), 4);
    assert_eq!(ranked[0].0, "magenta.png");
    // red and blue tie; library order breaks it.
    assert_eq!(ranked[1].0, "blue.png");
    assert_eq!(ranked[2].0, "red.png");
    assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
}

#[tokio::test]
async fn test_empty_library_is_reported_not_failed() {
    let tmp = TempDir::new().unwrap();
    let service = service_over(tmp.path()).await;
    assert!(matches!(service.search("red", 5).await.unwrap(), SearchOutcome::EmptyCorpus));
}

#[tokio::test]
async fn test_invalid_queries() {
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    for (query, k) in [("", 5), ("   ", 5), ("?!", 5), ("... --", 5), ("red", 0), ("red", 51)] {
        let err = service.search(query, k).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidQuery(_)), "{query:?} k={k}");
    }
    let long = "r".repeat(513);
    assert!(matches!(service.search(&long, 1).await, Err(LibraryError::InvalidQuery(_))));
}

#[tokio::test]
async fn test_provider_failure_surfaces() {
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    assert!(matches!(service.search("chartreuse", 3).await, Err(LibraryError::Provider(_))));
    assert!(matches!(service.search("void", 3).await, Err(LibraryError::Provider(_))));
}

#[tokio::test]
async fn test_dot_prefixed_file_is_served() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), ".red.png", [255, 0, 0]);
    write_png(tmp.path(), "blue.png", [0, 0, 255]);
    let service = service_over(tmp.path()).await;
    assert_eq!(service.size(), 2);

    let ranked = hits(service.search("red", 1).await.unwrap());
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].0, ".red.png");
}

#[tokio::test]
async fn test_deleted_file_is_dropped_from_results() {
    init_tracing();
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    std::fs::remove_file(lib.path().join("red.png")).unwrap();

    let ranked = hits(service.search("red", 2).await.unwrap());
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].0, "magenta.png");
    // Still indexed until the next rebuild.
    assert_eq!(service.size(), 4);
    service.rebuild().await.unwrap();
    assert_eq!(service.size(), 3);
}

// ============================================================
// Rebuild and upload
// ============================================================

#[tokio::test]
async fn test_rebuild_picks_up_new_files() {
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    write_png(lib.path(), "white.png", [255, 255, 255]);
    let summary = service.rebuild().await.unwrap();
    assert_eq!(summary.image_library_size, 5);
    assert_eq!(summary.reused, 4);
    assert_eq!(summary.embedded, 1);
    assert_eq!(service.stats().last_build.unwrap().image_library_size, 5);
}

#[tokio::test]
async fn test_add_image_indexes_and_writes() {
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    let bytes = png([0, 10, 250]);
    let size = service.add_image("navy.png", bytes.clone()).await.unwrap();
    assert_eq!(size, 5);
    assert_eq!(std::fs::read(lib.path().join("navy.png")).unwrap(), bytes);

    let ranked = hits(service.search("blue", 2).await.unwrap());
    let names: Vec<&str> = ranked.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["blue.png", "navy.png"]);
}

#[tokio::test]
async fn test_add_image_replaces_same_name() {
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    let size = service.add_image("red.png", png([0, 255, 0])).await.unwrap();
    assert_eq!(size, 4);
    let ranked = hits(service.search("green", 2).await.unwrap());
    assert!(ranked.iter().all(|(_, s)| (*s - 1.0).abs() < 1e-4));
}

#[tokio::test]
async fn test_add_image_rejects_bad_uploads() {
    let lib = rgb_library();
    let service = service_over(lib.path()).await;
    let cases = [
        ("../escape.png", png([1, 2, 3])),
        ("notes.txt", png([1, 2, 3])),
        ("empty.png", Vec::new()),
        ("broken.png", b"not an image".to_vec()),
    ];
    for (name, bytes) in cases {
        let err = service.add_image(name, bytes).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidUpload(_)), "{name}");
    }
    assert!(!lib.path().join("broken.png").exists());
    assert_eq!(service.size(), 4);
}

#[tokio::test]
async fn test_add_image_into_missing_directory() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("library");
    let service = service_over(&dir).await;
    assert_eq!(service.add_image("red.png", png([255, 0, 0])).await.unwrap(), 1);
    assert!(dir.join("red.png").exists());
}

// ============================================================
// Image questions
// ============================================================

#[tokio::test]
async fn test_describe_image_without_provider() {
    let tmp = TempDir::new().unwrap();
    let service = service_over(tmp.path()).await;
    let err = service.describe_image(&png([1, 1, 1]), "what is this?").await.unwrap_err();
    assert!(matches!(err, LibraryError::Unavailable(_)));
}

#[tokio::test]
async fn test_describe_image_delegates() {
    let tmp = TempDir::new().unwrap();
    let service = RetrievalService::new(library_config(tmp.path()), Arc::new(ColorEmbedder::default()))
        .with_answerer(Arc::new(EchoAnswerer));
    let answer = service.describe_image(&[1, 2, 3], "  how many cats?  ").await.unwrap();
    assert_eq!(answer, "3 bytes, question: how many cats?");
    assert!(matches!(
        service.describe_image(&[1], " ").await,
        Err(LibraryError::InvalidQuery(_))
    ));
    assert!(matches!(
        service.describe_image(&[], "q").await,
        Err(LibraryError::InvalidQuery(_))
    ));
}

// ============================================================
// Concurrency
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_searches_during_rebuild_see_whole_snapshots() {
    let lib = rgb_library();
    let service = Arc::new(service_over(lib.path()).await);
    for i in 0..8u8 {
        write_png(lib.path(), &format!("extra{i}.png"), [i * 20 + 10, 30, 60]);
    }

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let svc = Arc::clone(&service);
            tokio::spawn(async move {
                for _ in 0..20 {
                    let n = match svc.search("green", 50).await.unwrap() {
                        SearchOutcome::Hits(h) => h.len(),
                        SearchOutcome::EmptyCorpus => 0,
                    };
                    assert!(n == 4 || n == 12, "partial corpus observed: {n}");
                }
            })
        })
        .collect();
    let writer = {
        let svc = Arc::clone(&service);
        tokio::spawn(async move { svc.rebuild().await.unwrap() })
    };

    for r in readers {
        r.await.unwrap();
    }
    assert_eq!(writer.await.unwrap().image_library_size, 12);
}

#[tokio::test]
async fn test_stats() {
    let lib = rgb_library();
    let config = LibraryConfig {
        path: lib.path().to_path_buf(),
        ..LibraryConfig::default()
    };
    let service = RetrievalService::new(config, Arc::new(ColorEmbedder::default()));
    assert!(service.stats().last_build.is_none());
    service.rebuild().await.unwrap();
    let stats = service.stats();
    assert_eq!(stats.image_library_size, 4);
    assert_eq!(stats.dimension, Some(3));
    assert_eq!(stats.embedding_provider, "color");
    assert!(stats.answer_provider.is_none());
}
