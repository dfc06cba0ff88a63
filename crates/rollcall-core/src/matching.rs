//! Embedding comparison primitives.
//!
//! Both functions preserve the order of `known`, so indices line up with
//! roster iteration order. The recognizer relies on that to resolve the
//! first matching entry, not the closest one.

use crate::types::Embedding;

/// Euclidean distance from `probe` to every known embedding.
pub fn distances(known: &[Embedding], probe: &Embedding) -> Vec<f32> {
    known.iter().map(|k| k.distance(probe)).collect()
}

/// Per-entry match flag: distance within `tolerance` (lower = stricter).
pub fn compare(known: &[Embedding], probe: &Embedding, tolerance: f32) -> Vec<bool> {
    known
        .iter()
        .map(|k| k.distance(probe) <= tolerance)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding { values: values.to_vec() }
    }

    #[test]
    fn test_distances_preserve_order() {
        let known = vec![emb(&[1.0, 0.0]), emb(&[0.0, 1.0]), emb(&[0.0, 0.0])];
        let probe = emb(&[0.0, 0.0]);
        let d = distances(&known, &probe);
        assert_eq!(d.len(), 3);
        assert!((d[0] - 1.0).abs() < 1e-6);
        assert!((d[1] - 1.0).abs() < 1e-6);
        assert!(d[2].abs() < 1e-6);
    }

    #[test]
    fn test_compare_threshold_inclusive() {
        let known = vec![emb(&[1.0, 0.0])];
        let probe = emb(&[0.0, 0.0]);
        assert_eq!(compare(&known, &probe, 1.0), vec![true]);
        assert_eq!(compare(&known, &probe, 0.99), vec![false]);
    }

    #[test]
    fn test_compare_empty_roster() {
        let probe = emb(&[1.0]);
        assert!(compare(&[], &probe, 10.0).is_empty());
        assert!(distances(&[], &probe).is_empty());
    }

    #[test]
    fn test_compare_multiple_matches_keep_all_flags() {
        let known = vec![emb(&[0.1, 0.0]), emb(&[5.0, 0.0]), emb(&[0.0, 0.1])];
        let probe = emb(&[0.0, 0.0]);
        assert_eq!(compare(&known, &probe, 0.5), vec![true, false, true]);
    }
}
