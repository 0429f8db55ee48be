/// Compute the cosine similarity between two vectors.
///
/// Returns a value in `[0, 1]` where 1 means identical direction.
/// Negative cosines are clamped to 0, matching the scoring contract
/// of the identity registry (scores are always presentable as a
/// 0..1 confidence).
///
/// Uses f64 intermediate precision. Returns 0.0 for zero vectors or
/// length mismatches.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;

    for i in 0..a.len() {
        let ai = a[i] as f64;
        let bi = b[i] as f64;
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    // Clamp to [0, 1] to handle floating point errors and negative cosines.
    similarity.clamp(0.0, 1.0) as f32
}
