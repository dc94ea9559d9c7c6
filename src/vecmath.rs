// src/vecmath.rs
// Small embedding-vector helpers shared by enrichment, attention scoring,
// the profile engine and the retriever. Kept dependency-free (no nalgebra)
// since vectors here are short, L2-normalized f32 slices, not matrices.

/// L2-normalize in place. A zero vector is left as-is (cosine against it is
/// defined as 0.0 by [`cosine`]).
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn normalized(mut v: Vec<f32>) -> Vec<f32> {
    normalize(&mut v);
    v
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot.clamp(-1.0, 1.0)
}

pub fn is_l2_normalized(v: &[f32], epsilon: f32) -> bool {
    if v.is_empty() {
        return true;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    (norm - 1.0).abs() <= epsilon
}

/// Deterministic fallback embedding used when the enrichment capability
/// times out (spec §4.6). Hashes word n-grams into fixed buckets, then
/// L2-normalizes — reproducible for the same input, no external call.
pub fn fallback_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut buckets = vec![0f32; dims];
    for token in text.split_whitespace() {
        let mut hasher_state: u64 = 1469598103934665603; // FNV offset basis
        for b in token.as_bytes() {
            hasher_state ^= *b as u64;
            hasher_state = hasher_state.wrapping_mul(1099511628211);
        }
        let idx = (hasher_state as usize) % dims;
        buckets[idx] += 1.0;
    }
    normalize(&mut buckets);
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let v = normalized(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!(is_l2_normalized(&v, 1e-5));
    }

    #[test]
    fn zero_vector_is_left_unchanged() {
        let v = normalized(vec![0.0, 0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn cosine_of_identical_unit_vectors_is_one() {
        let v = normalized(vec![1.0, 2.0, 3.0]);
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn fallback_embedding_is_deterministic_and_normalized() {
        let a = fallback_embedding("vector databases are fun", 32);
        let b = fallback_embedding("vector databases are fun", 32);
        assert_eq!(a, b);
        assert!(is_l2_normalized(&a, 1e-5));
    }
}
