// ============================================================
// Layer 5 — Novelty
// ============================================================
// How different the generated proposals are from EACH OTHER:
//
//   S_ij    = cos(e_i, e_j)            over all i, j (N×N)
//   novelty = 1 − mean(S)
//
// The diagonal (S_ii = 1) is part of the mean, so even N
// distinct vectors never reach the theoretical maximum.
// Cosine lies in [−1, 1], so novelty lies in [0, 2]:
//   0   every embedding points the same way
//   1   embeddings are orthogonal on average
//
// Reference: Reimers & Gurevych (2019) Sentence-BERT, §4

/// Cosine similarity; 0 when either vector has zero norm
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot    = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot    += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON { 0.0 } else { (dot / denom).clamp(-1.0, 1.0) }
}

/// 1 − mean pairwise cosine similarity; 0 for an empty set.
pub fn novelty(embeddings: &[Vec<f32>]) -> f64 {
    let n = embeddings.len();
    if n == 0 {
        return 0.0;
    }

    // S is symmetric: sum the upper triangle twice plus the diagonal
    let mut total = 0.0f64;
    for i in 0..n {
        total += cosine_similarity(&embeddings[i], &embeddings[i]);
        for j in (i + 1)..n {
            total += 2.0 * cosine_similarity(&embeddings[i], &embeddings[j]);
        }
    }

    1.0 - total / (n * n) as f64
}
