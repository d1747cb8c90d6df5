use proptest::prelude::*;

use cmdseek::search::{cosine_similarity, rank};

fn vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-100.0f32..100.0, dim)
}

fn non_zero(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    vector(dim).prop_filter("non-zero magnitude", |v| {
        v.iter().map(|x| x * x).sum::<f32>() > 1e-3
    })
}

fn pair() -> impl Strategy<Value = (Vec<f32>, Vec<f32>)> {
    (1usize..24).prop_flat_map(|dim| (non_zero(dim), non_zero(dim)))
}

proptest! {
    #[test]
    fn property_cosine_is_bounded((a, b) in pair()) {
        let s = cosine_similarity(&a, &b);
        prop_assert!((-1.0..=1.0).contains(&s));
    }

    #[test]
    fn property_cosine_self_and_opposite((a, _b) in pair()) {
        let neg: Vec<f32> = a.iter().map(|x| -x).collect();
        prop_assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
        prop_assert!((cosine_similarity(&a, &neg) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn property_cosine_is_commutative((a, b) in pair()) {
        prop_assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn property_cosine_scale_invariant((a, b) in pair(), k in 0.01f32..100.0) {
        let scaled: Vec<f32> = b.iter().map(|x| x * k).collect();
        prop_assert!((cosine_similarity(&a, &b) - cosine_similarity(&a, &scaled)).abs() < 1e-5);
    }

    #[test]
    fn property_zero_vector_scores_zero(a in (1usize..24).prop_flat_map(vector)) {
        let zero = vec![0.0f32; a.len()];
        prop_assert_eq!(cosine_similarity(&a, &zero), 0.0);
        prop_assert_eq!(cosine_similarity(&zero, &a), 0.0);
    }

    #[test]
    fn property_rank_is_deterministic_sorted_and_capped(
        (query, vectors) in (1usize..8).prop_flat_map(|dim| {
            (vector(dim), prop::collection::vec(prop::option::of(vector(dim)), 0..30))
        }),
        top_k in 0usize..10,
        threshold in -1.0f64..1.0,
    ) {
        let ids: Vec<String> = (0..vectors.len()).map(|i| format!("cmd{i}")).collect();
        let candidates = || {
            ids.iter()
                .map(String::as_str)
                .zip(vectors.iter().map(|v| v.as_deref()))
        };

        let first = rank(&query, candidates(), top_k, threshold);
        let second = rank(&query, candidates(), top_k, threshold);
        prop_assert_eq!(&first, &second);

        prop_assert!(first.len() <= top_k);
        for w in first.windows(2) {
            prop_assert!(w[0].score >= w[1].score);
            // equal scores keep input order
            if w[0].score == w[1].score {
                let i0: usize = w[0].id[3..].parse().unwrap();
                let i1: usize = w[1].id[3..].parse().unwrap();
                prop_assert!(i0 < i1);
            }
        }
        for c in &first {
            prop_assert!(c.score >= threshold);
            let i: usize = c.id[3..].parse().unwrap();
            prop_assert!(vectors[i].is_some(), "null embedding {} was ranked", c.id);
        }
    }
}

#[test]
fn test_known_similarities_above_threshold() {
    let query = [1.0f32, 0.0];
    let candidates = [
        [0.9f32, 0.19f32.sqrt()],
        [0.5f32, 0.75f32.sqrt()],
        [0.1f32, 0.99f32.sqrt()],
    ];
    let ids = ["a", "b", "c"];

    let ranked = rank(
        &query,
        ids.iter().copied().zip(candidates.iter().map(|v| Some(&v[..]))),
        10,
        0.3,
    );

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].id, "a");
    assert_eq!(ranked[1].id, "b");
}

#[test]
fn test_top_k_keeps_most_similar() {
    let query = [1.0f32, 0.0];
    let vectors = [[0.6f32, 0.8], [1.0, 0.0], [0.8, 0.6], [0.5, 0.5]];
    let ids = ["w", "x", "y", "z"];

    let ranked = rank(
        &query,
        ids.iter().copied().zip(vectors.iter().map(|v| Some(&v[..]))),
        2,
        0.3,
    );

    let got: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(got, vec!["x", "y"]);
}

#[test]
fn test_null_embedding_never_ranked() {
    let query = [1.0f32, 0.0];
    let ranked = rank(&query, vec![("none", None)], 10, -1.0);
    assert!(ranked.is_empty());
}
