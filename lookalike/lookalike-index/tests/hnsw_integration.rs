//! Integration tests for the HNSW similarity index

use lookalike_core::{IndexConfig, ItemId};
use lookalike_index::{HnswIndex, IndexFiles, NeighborIndex, cosine_distance};
use tempfile::tempdir;

fn create_test_vector(dimension: usize, seed: u64) -> Vec<f32> {
    // Cheap deterministic pseudo-random values in [-1, 1)
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..dimension)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / (1u64 << 31) as f32) * 2.0 - 1.0
        })
        .collect()
}

fn catalog(n: u64, dimension: usize) -> Vec<(ItemId, Vec<f32>)> {
    (0..n)
        .map(|i| (ItemId::Numeric(i), create_test_vector(dimension, i)))
        .collect()
}

#[tokio::test]
async fn test_every_built_id_is_queryable() {
    let data = catalog(200, 32);
    let index = HnswIndex::build(IndexConfig::default(), data.clone()).unwrap();

    assert_eq!(index.len(), 200);
    for (id, vector) in &data {
        assert!(index.contains(id));
        assert_eq!(index.vector(id), Some(vector.as_slice()));
    }
}

#[tokio::test]
async fn test_k_plus_one_bound() {
    let index = HnswIndex::build(IndexConfig::default(), catalog(12, 8)).unwrap();
    let k = 10;

    let query = create_test_vector(8, 3);
    let results = index.search(&query, k + 1).await.unwrap();
    assert_eq!(results.len(), k + 1);

    let without_self: Vec<_> = results.iter().filter(|h| h.id != ItemId::Numeric(3)).collect();
    assert!(without_self.len() <= k + 1);
    assert_eq!(without_self.len(), k);
}

#[tokio::test]
async fn test_fewer_points_than_requested() {
    let index = HnswIndex::build(IndexConfig::default(), catalog(3, 4)).unwrap();
    let results = index.search(&create_test_vector(4, 0), 11).await.unwrap();
    assert_eq!(results.len(), 3);
}

/// HNSW is approximate: the exact top-k is not guaranteed. This test pins the
/// tradeoff we accept. On a random catalog the approximate top-10 must agree
/// with brute force on most entries, and each item must find itself first.
#[tokio::test]
async fn test_recall_against_brute_force() {
    let n = 1000;
    let dimension = 24;
    let k = 10;
    let data = catalog(n, dimension);
    let index = HnswIndex::build(IndexConfig::default(), data.clone()).unwrap();

    let mut found = 0usize;
    let mut self_first = 0usize;
    let queries = 50u64;

    for q in 0..queries {
        let query = &data[(q * 19 % n) as usize];

        let mut exact: Vec<(ItemId, f32)> = data
            .iter()
            .map(|(id, v)| (id.clone(), cosine_distance(&query.1, v)))
            .collect();
        exact.sort_by(|a, b| a.1.total_cmp(&b.1));
        let exact_ids: Vec<ItemId> = exact.into_iter().take(k).map(|(id, _)| id).collect();

        let approx = index.search(&query.1, k).await.unwrap();
        if approx.first().map(|h| &h.id) == Some(&query.0) {
            self_first += 1;
        }
        found += approx.iter().filter(|h| exact_ids.contains(&h.id)).count();
    }

    let recall = found as f64 / (queries as usize * k) as f64;
    assert!(recall >= 0.9, "recall@{} too low: {:.3}", k, recall);
    assert!(self_first as u64 >= queries * 9 / 10);
}

#[tokio::test]
async fn test_reload_preserves_query_behavior() {
    let temp_dir = tempdir().unwrap();
    let files = IndexFiles::new(&temp_dir.path().join("nested/index"), "index.bin");

    let data = catalog(300, 16);
    let built = HnswIndex::build(IndexConfig::default(), data.clone()).unwrap();
    built.save(&files).await.unwrap();
    let loaded = HnswIndex::load(&files).await.unwrap();

    for (_, vector) in data.iter().step_by(25) {
        let a = built.search(vector, 11).await.unwrap();
        let b = loaded.search(vector, 11).await.unwrap();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn test_string_ids_survive_persistence() {
    let temp_dir = tempdir().unwrap();
    let files = IndexFiles::new(temp_dir.path(), "index.bin");

    let data = vec![
        (ItemId::from("shoe-1"), vec![1.0, 0.0, 0.0]),
        (ItemId::from("shoe-2"), vec![0.9, 0.1, 0.0]),
        (ItemId::Numeric(3), vec![0.0, 0.0, 1.0]),
    ];
    HnswIndex::build(IndexConfig::default(), data)
        .unwrap()
        .save(&files)
        .await
        .unwrap();

    let loaded = HnswIndex::load(&files).await.unwrap();
    let results = loaded.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
    assert_eq!(results[0].id, ItemId::from("shoe-1"));
    assert_eq!(results[1].id, ItemId::from("shoe-2"));
}
