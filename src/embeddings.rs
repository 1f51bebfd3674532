use futures::future::BoxFuture;
use rig::embeddings::{EmbeddingError, EmbeddingModel};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("Embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[cfg(test)]
    #[error("Test error: {0}")]
    TestError(String),
}

/// Turns text into a vector.
#[cfg_attr(test, mockall::automock)]
pub trait Embedder: Send + Sync {
    fn embed(&self, text: String) -> BoxFuture<'static, Result<Vec<f64>, EmbedError>>;
}

/// [Embedder] backed by a rig [EmbeddingModel].
#[derive(Clone)]
pub struct RigEmbedder<M: EmbeddingModel> {
    model: M,
}

impl<M: EmbeddingModel> RigEmbedder<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

impl<M> Embedder for RigEmbedder<M>
where
    M: EmbeddingModel + Clone + 'static,
{
    fn embed(&self, text: String) -> BoxFuture<'static, Result<Vec<f64>, EmbedError>> {
        let model = self.model.clone();
        Box::pin(async move {
            let embedding = model.embed_text(&text).await?;
            Ok(embedding.vec)
        })
    }
}

/// Cosine of the angle between two vectors. Zero-length vectors have similarity 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A document and how close it is to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub index: usize,
    pub text: String,
    pub score: f64,
}

/// An in-memory similarity index over a fixed set of documents.
pub struct SemanticIndex {
    documents: Vec<String>,
    vectors: Vec<Vec<f64>>,
}

impl SemanticIndex {
    /// Embed every document. Embedding calls run one after another.
    pub async fn build(
        embedder: &dyn Embedder,
        documents: Vec<String>,
    ) -> Result<Self, EmbedError> {
        let mut vectors = Vec::with_capacity(documents.len());
        for document in &documents {
            let vector = embedder.embed(document.clone()).await?;
            if let Some(first) = vectors.first().map(Vec::len) {
                if first != vector.len() {
                    return Err(EmbedError::DimensionMismatch {
                        expected: first,
                        actual: vector.len(),
                    });
                }
            }
            vectors.push(vector);
        }
        debug!(documents = documents.len(), "semantic index built");
        Ok(Self { documents, vectors })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The `k` closest documents, best first.
    pub async fn top_k(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, EmbedError> {
        let query = embedder.embed(query.to_owned()).await?;
        let expected = self.vectors.first().map_or(query.len(), Vec::len);
        if expected != query.len() {
            return Err(EmbedError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }
        let mut scored: Vec<ScoredDocument> = self
            .documents
            .iter()
            .zip(&self.vectors)
            .enumerate()
            .map(|(index, (text, vector))| ScoredDocument {
                index,
                text: text.clone(),
                score: cosine_similarity(&query, vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    pub async fn best_match(
        &self,
        embedder: &dyn Embedder,
        query: &str,
    ) -> Result<Option<ScoredDocument>, EmbedError> {
        Ok(self.top_k(embedder, query, 1).await?.into_iter().next())
    }
}
