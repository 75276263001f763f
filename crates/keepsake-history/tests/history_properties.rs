//! Cross-module properties of the diff engine and the version store.

use keepsake_history::{
    compute_diff, format_unified_diff, split_lines, DiffLineKind, HistoryConfig, VersionComparison,
    VersionStore,
};
use keepsake_storage::JsonStorage;
use tempfile::TempDir;

/// Small deterministic generator so the text corpus is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn text(&mut self) -> String {
        const WORDS: &[&str] = &["alpha", "beta", "gamma", "", "delta", "alpha"];
        let lines = self.next() % 12;
        (0..lines)
            .map(|_| WORDS[(self.next() % WORDS.len() as u64) as usize])
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn replay(text_a: &str, text_b: &str, keep: DiffLineKind) -> String {
    compute_diff(text_a, text_b)
        .lines
        .iter()
        .filter(|l| l.kind == DiffLineKind::Unchanged || l.kind == keep)
        .map(|l| l.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_diff_replay_reconstructs_generated_pairs() {
    let mut rng = Lcg(7);
    for _ in 0..300 {
        let (a, b) = (rng.text(), rng.text());
        assert_eq!(replay(&a, &b, DiffLineKind::Added), b, "{a:?} -> {b:?}");
        assert_eq!(replay(&a, &b, DiffLineKind::Removed), a, "{a:?} -> {b:?}");

        let diff = compute_diff(&a, &b);
        assert_eq!(diff, compute_diff(&a, &b));
        assert_eq!(
            diff.unchanged_count + diff.removed_count,
            split_lines(&a).len()
        );
        assert_eq!(
            diff.unchanged_count + diff.added_count,
            split_lines(&b).len()
        );
    }
}

#[test]
fn test_self_diff_of_generated_text_is_unchanged() {
    let mut rng = Lcg(11);
    for _ in 0..100 {
        let a = rng.text();
        let diff = compute_diff(&a, &a);
        assert_eq!((diff.added_count, diff.removed_count), (0, 0));
        assert_eq!(diff.unchanged_count, split_lines(&a).len());
    }
}

#[tokio::test]
async fn test_edit_scenario_compares_and_renders() {
    let dir = TempDir::new().unwrap();
    let store = VersionStore::load(JsonStorage::new(dir.path()), HistoryConfig::default()).await;

    let first = store.save_version("a.txt", "hello\nworld", None).await;
    let second = store
        .save_version("a.txt", "hello\nthere\nworld", Some("edit1".to_string()))
        .await;

    assert_eq!(
        store.compare_versions("a.txt", &first.id, &second.id).await,
        Some(VersionComparison {
            added: 1,
            removed: 0,
            changed: true,
        })
    );

    let diff = store
        .diff_versions("a.txt", &first.id, &second.id)
        .await
        .unwrap();
    assert_eq!(
        format_unified_diff(&diff, "a.txt@1", "a.txt@2"),
        "--- a.txt@1\n+++ a.txt@2\n hello\n+there\n world"
    );
}

#[tokio::test]
async fn test_export_import_roundtrip_through_fresh_store() {
    let source_dir = TempDir::new().unwrap();
    let source = VersionStore::load(
        JsonStorage::new(source_dir.path()),
        HistoryConfig::with_max_versions(4),
    )
    .await;

    let mut rng = Lcg(3);
    for i in 0..10 {
        let path = format!("file-{}.txt", i % 3);
        let message = (i % 2 == 0).then(|| format!("save {i}"));
        source.save_version(&path, &rng.text(), message).await;
    }
    let exported = source.export_versions().await.unwrap();

    let target_dir = TempDir::new().unwrap();
    let target = VersionStore::load(JsonStorage::new(target_dir.path()), HistoryConfig::default())
        .await;
    target.import_versions(&exported).await.unwrap();

    for path in source.get_files_with_versions().await {
        assert_eq!(target.get_versions(&path).await, source.get_versions(&path).await);
    }

    // The import was persisted: a restart sees the same history.
    let restarted =
        VersionStore::load(JsonStorage::new(target_dir.path()), HistoryConfig::default()).await;
    for path in source.get_files_with_versions().await {
        assert_eq!(
            restarted.get_versions(&path).await,
            source.get_versions(&path).await
        );
        assert!(restarted.get_version_count(&path).await <= 4);
    }
}
