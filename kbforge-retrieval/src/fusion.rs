//! Reciprocal Rank Fusion for combining vector and lexical rankings.

use kbforge_core::types::Chunk;

pub const DEFAULT_K0: f32 = 60.0;

/// Fuses two ranked candidate lists keyed by `Chunk::id`, via
/// `fused_score(c) = Σ 1 / (k0 + rank_i(c))`, summed over whichever lists
/// contain `c`, and uses that sum purely to order the result. The fused sum
/// itself (max ≈ 1/k0) is not on the same scale as a cosine similarity, so
/// the *reported* score per chunk is instead its original vector score when
/// the chunk was found by vector search, or its BM25 score normalized
/// against the strongest BM25 hit in this ranking when it was found by
/// lexical search alone — keeping every returned score comparable to
/// `min_score` regardless of which path surfaced the chunk. Ties are broken
/// by the higher reported score. Returns at most `top_k` chunks with
/// embeddings carried over from `vector_ranked` when present there, else
/// from `lexical_ranked`.
#[must_use]
pub fn reciprocal_rank_fusion(
    vector_ranked: &[(Chunk, f32)],
    lexical_ranked: &[(Chunk, f32)],
    k0: f32,
    top_k: usize,
) -> Vec<(Chunk, f32)> {
    use std::collections::HashMap;

    let mut fused: HashMap<i64, f32> = HashMap::new();
    let mut display_score: HashMap<i64, f32> = HashMap::new();
    let mut chunk_by_id: HashMap<i64, &Chunk> = HashMap::new();

    let max_lexical = lexical_ranked.iter().map(|(_, score)| *score).fold(0.0_f32, f32::max);

    for (rank, (chunk, score)) in vector_ranked.iter().enumerate() {
        *fused.entry(chunk.id).or_insert(0.0) += 1.0 / (k0 + rank as f32 + 1.0);
        display_score.insert(chunk.id, *score);
        chunk_by_id.insert(chunk.id, chunk);
    }
    for (rank, (chunk, score)) in lexical_ranked.iter().enumerate() {
        *fused.entry(chunk.id).or_insert(0.0) += 1.0 / (k0 + rank as f32 + 1.0);
        chunk_by_id.entry(chunk.id).or_insert(chunk);
        display_score
            .entry(chunk.id)
            .or_insert_with(|| if max_lexical > 0.0 { (score / max_lexical).clamp(0.0, 1.0) } else { 0.0 });
    }

    let mut ranked: Vec<(i64, f32)> = fused.into_iter().collect();
    ranked.sort_by(|(id_a, fused_a), (id_b, fused_b)| {
        fused_b.partial_cmp(fused_a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| {
            let va = display_score.get(id_a).copied().unwrap_or(0.0);
            let vb = display_score.get(id_b).copied().unwrap_or(0.0);
            vb.partial_cmp(&va).unwrap_or(std::cmp::Ordering::Equal)
        })
    });

    ranked
        .into_iter()
        .take(top_k)
        .filter_map(|(id, _)| chunk_by_id.get(&id).map(|c| ((*c).clone(), display_score.get(&id).copied().unwrap_or(0.0))))
        .collect()
}
