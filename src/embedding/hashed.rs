//! Offline embeddings from hashed word counts.

use async_trait::async_trait;

use super::{EmbeddingClient, EmbeddingClientError, normalize};

/// Deterministic bag-of-words embeddings: each lowercase word is hashed into a slot.
///
/// Texts that share vocabulary land close together under cosine similarity, which is enough for
/// offline use and tests. No model is involved.
#[derive(Debug, Clone)]
pub struct HashedEmbeddingClient {
    dimension: usize,
}

impl HashedEmbeddingClient {
    /// Create a client producing vectors of `dimension` entries.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];
        for word in text
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let slot = fnv1a(&word.to_lowercase()) as usize % self.dimension;
            embedding[slot] += 1.0;
        }
        normalize(&mut embedding);
        embedding
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingClient for HashedEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        tracing::debug!(
            dimension = self.dimension,
            count = texts.len(),
            "Generating hashed embeddings"
        );
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn shared_vocabulary_scores_higher() {
        let client = HashedEmbeddingClient::new(256);
        let vectors = client
            .generate_embeddings(vec![
                "When was the bridge completed?".into(),
                "The bridge was completed in 1932 after six years.".into(),
                "Quarterly revenue figures for the retail division.".into(),
            ])
            .await
            .expect("embeddings");

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|vector| vector.len() == 256));
        assert!(cosine(&vectors[0], &vectors[1]) > cosine(&vectors[0], &vectors[2]));
    }

    #[tokio::test]
    async fn encoding_is_deterministic_and_case_insensitive() {
        let client = HashedEmbeddingClient::new(32);
        let vectors = client
            .generate_embeddings(vec!["Hello World".into(), "hello world".into()])
            .await
            .expect("embeddings");
        assert_eq!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn rejects_empty_batches_and_zero_dimension() {
        assert!(
            HashedEmbeddingClient::new(8)
                .generate_embeddings(Vec::new())
                .await
                .is_err()
        );
        assert!(
            HashedEmbeddingClient::new(0)
                .generate_embeddings(vec!["text".into()])
                .await
                .is_err()
        );
    }
}
