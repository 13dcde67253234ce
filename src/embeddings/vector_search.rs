//! Similarity ranking and context assembly.

use crate::config::RetrievalConfig;
use crate::embeddings::similarity::cosine_similarity;
use crate::types::{AppError, AppResult};
use tracing::debug;

const CONTEXT_SEPARATOR: &str = "\n\n";

/// A chunk with its similarity to the question.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Position of the chunk in document order.
    pub index: usize,
    pub text: String,
    pub score: f32,
}

/// The bounded context handed to answer generation.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub context: String,
    pub best: ScoredChunk,
    /// Document-order indices of the chunks included, in rank order.
    pub chunks_used: Vec<usize>,
}

pub struct Retriever {
    top_k: usize,
    max_context_chars: usize,
}

impl Retriever {
    pub fn new(top_k: usize, max_context_chars: usize) -> Self {
        Self {
            top_k: top_k.max(1),
            max_context_chars: max_context_chars.max(1),
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.top_k, config.max_context_chars)
    }

    /// Score every chunk against the question, best first. Equal scores keep document order.
    pub fn rank<T, E>(question: &[f32], chunks: &[(T, E)]) -> AppResult<Vec<ScoredChunk>>
    where
        T: AsRef<str>,
        E: AsRef<[f32]>,
    {
        if chunks.is_empty() {
            return Err(AppError::NoChunksAvailable(
                "the document has no stored chunks".to_string(),
            ));
        }

        let mut scored = chunks
            .iter()
            .enumerate()
            .map(|(index, (text, embedding))| {
                Ok(ScoredChunk {
                    index,
                    text: text.as_ref().to_string(),
                    score: cosine_similarity(question, embedding.as_ref())?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        // stable: ties keep the earlier chunk first
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(scored)
    }

    /// Concatenate ranked chunks until `top_k` chunks or `max_context_chars` characters.
    ///
    /// The best chunk is always present, truncated if it alone exceeds the budget.
    pub fn assemble(&self, ranked: &[ScoredChunk]) -> AppResult<RetrievedContext> {
        let best = ranked.first().cloned().ok_or_else(|| {
            AppError::NoChunksAvailable("nothing was ranked".to_string())
        })?;

        let mut context = String::new();
        let mut used_chars = 0usize;
        let mut chunks_used = Vec::new();

        for chunk in ranked.iter().take(self.top_k) {
            let chunk_chars = chunk.text.chars().count();

            if chunks_used.is_empty() {
                if chunk_chars > self.max_context_chars {
                    context.extend(chunk.text.chars().take(self.max_context_chars));
                    used_chars = self.max_context_chars;
                } else {
                    context.push_str(&chunk.text);
                    used_chars = chunk_chars;
                }
                chunks_used.push(chunk.index);
                continue;
            }

            let needed = CONTEXT_SEPARATOR.len() + chunk_chars;
            if used_chars + needed > self.max_context_chars {
                break;
            }
            context.push_str(CONTEXT_SEPARATOR);
            context.push_str(&chunk.text);
            used_chars += needed;
            chunks_used.push(chunk.index);
        }

        debug!(
            chunks = chunks_used.len(),
            chars = used_chars,
            best_score = best.score,
            "Assembled retrieval context"
        );

        Ok(RetrievedContext {
            context,
            best,
            chunks_used,
        })
    }

    /// Rank then assemble in one step.
    pub fn retrieve<T, E>(&self, question: &[f32], chunks: &[(T, E)]) -> AppResult<RetrievedContext>
    where
        T: AsRef<str>,
        E: AsRef<[f32]>,
    {
        let ranked = Self::rank(question, chunks)?;
        self.assemble(&ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(items: &[(&str, Vec<f32>)]) -> Vec<(String, Vec<f32>)> {
        items.iter().map(|(t, e)| (t.to_string(), e.clone())).collect()
    }

    #[test]
    fn test_identical_embedding_ranks_first() {
        let set = chunks(&[
            ("chunk one", vec![0.9, 0.1, 0.0]),
            ("chunk two", vec![0.1, 0.9, 0.9]),
            ("chunk three", vec![0.0, 0.2, 1.0]),
        ]);

        let ranked = Retriever::rank(&[0.1, 0.9, 0.9], &set).unwrap();
        assert_eq!(ranked[0].index, 1);
        assert_eq!(ranked[0].text, "chunk two");
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_prefer_earlier_chunk() {
        let set = chunks(&[
            ("a", vec![0.0, 1.0]),
            ("b", vec![1.0, 0.0]),
            ("c", vec![1.0, 0.0]),
            ("d", vec![2.0, 0.0]),
        ]);

        let ranked = Retriever::rank(&[1.0, 0.0], &set).unwrap();
        let order: Vec<usize> = ranked.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_empty_chunk_set() {
        let empty: Vec<(String, Vec<f32>)> = Vec::new();
        let err = Retriever::rank(&[1.0, 0.0], &empty).unwrap_err();
        assert!(matches!(err, AppError::NoChunksAvailable(_)));

        let retriever = Retriever::new(3, 100);
        assert!(matches!(
            retriever.assemble(&[]),
            Err(AppError::NoChunksAvailable(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let set = chunks(&[("a", vec![1.0, 0.0]), ("b", vec![1.0, 0.0, 0.0])]);
        let err = Retriever::rank(&[1.0, 0.0], &set).unwrap_err();
        assert!(matches!(
            err,
            AppError::DimensionMismatch { expected: 2, actual: 3 }
        ));
    }

    #[test]
    fn test_top_k_limits_chunks() {
        let set = chunks(&[
            ("first", vec![1.0, 0.0]),
            ("second", vec![0.9, 0.1]),
            ("third", vec![0.8, 0.2]),
        ]);
        let context = Retriever::new(2, 10_000).retrieve(&[1.0, 0.0], &set).unwrap();
        assert_eq!(context.chunks_used, vec![0, 1]);
        assert_eq!(context.context, "first\n\nsecond");
        assert_eq!(context.best.text, "first");
    }

    #[test]
    fn test_single_best_mode() {
        let set = chunks(&[("low", vec![0.0, 1.0]), ("high", vec![1.0, 0.0])]);
        let context = Retriever::new(1, 10_000).retrieve(&[1.0, 0.0], &set).unwrap();
        assert_eq!(context.context, "high");
        assert_eq!(context.chunks_used, vec![1]);
    }

    #[test]
    fn test_character_budget_limits_chunks() {
        let set = chunks(&[
            ("aaaaaaaaaa", vec![1.0, 0.0]),
            ("bbbbbbbbbb", vec![0.9, 0.1]),
            ("cccccccccc", vec![0.8, 0.2]),
        ]);
        // 10 + 2 + 10 = 22 fits, a third chunk would need 34
        let context = Retriever::new(5, 30).retrieve(&[1.0, 0.0], &set).unwrap();
        assert_eq!(context.chunks_used, vec![0, 1]);
        assert_eq!(context.context.chars().count(), 22);
    }

    #[test]
    fn test_oversized_best_chunk_is_truncated() {
        let set = chunks(&[("ééééééééé", vec![1.0]), ("short", vec![0.5])]);
        let context = Retriever::new(3, 4).retrieve(&[1.0], &set).unwrap();
        assert_eq!(context.context, "éééé");
        assert_eq!(context.chunks_used, vec![0]);
        assert_eq!(context.best.text, "ééééééééé");
    }
}
