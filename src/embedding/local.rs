//! Local ONNX Runtime embedder backing the `minilm` vectorizer method.
//!
//! Tokenizes with `tokenizers`, runs all-MiniLM-L6-v2 through `ort`, then mean-pools
//! token states under the attention mask and L2-normalizes the result.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, ensure, Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

/// all-MiniLM-L6-v2 was trained on sequences of at most 256 tokens.
const MAX_SEQ_LEN: usize = 256;

/// Token ids and attention mask of a padded batch, flattened row-major.
struct EncodedBatch {
    batch_size: usize,
    seq_len: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
}

pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync and the Session is only reached through the Mutex.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

/// Locations of the model and tokenizer inside the configured cache directory.
pub fn model_files(config: &EmbeddingConfig) -> (PathBuf, PathBuf) {
    let cache_dir = crate::config::expand_tilde(&config.cache_dir);
    (cache_dir.join("model.onnx"), cache_dir.join("tokenizer.json"))
}

impl OnnxEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_path, tokenizer_path) = model_files(config);

        ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `mnemos model download` first.",
            model_path.display()
        );
        ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `mnemos model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("failed to set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            model = %config.model,
            path = %model_path.display(),
            "embedding model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    fn encode(&self, texts: &[&str]) -> Result<EncodedBatch> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings.first().map_or(0, |e| e.get_ids().len());
        let mut input_ids = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask = Vec::with_capacity(batch_size * seq_len);
        for encoding in &encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        Ok(EncodedBatch {
            batch_size,
            seq_len,
            input_ids,
            attention_mask,
        })
    }
}

impl EmbeddingProvider for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedder returned no vector"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch = self.encode(texts)?;
        let shape = vec![batch.batch_size as i64, batch.seq_len as i64];
        let input_ids = Tensor::from_array((shape.clone(), batch.input_ids.into_boxed_slice()))?;
        let attention_mask =
            Tensor::from_array((shape.clone(), batch.attention_mask.clone().into_boxed_slice()))?;
        // single-segment input
        let token_type_ids = Tensor::from_array((
            shape,
            vec![0i64; batch.batch_size * batch.seq_len].into_boxed_slice(),
        ))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            "token_type_ids" => token_type_ids,
        })?;

        // Output name varies by export.
        let hidden = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);
        let (dims, data) = hidden
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings")?;
        let dims: &[i64] = &dims;
        ensure!(
            dims.len() == 3 && dims[2] == EMBEDDING_DIM as i64,
            "unexpected token embedding shape {dims:?}, expected [batch, seq, {EMBEDDING_DIM}]"
        );

        let out_seq_len = dims[1] as usize;
        let vectors = (0..batch.batch_size)
            .map(|b| {
                let mask = &batch.attention_mask[b * batch.seq_len..(b + 1) * batch.seq_len];
                let states = &data[b * out_seq_len * EMBEDDING_DIM..(b + 1) * out_seq_len * EMBEDDING_DIM];
                l2_normalize(mean_pool(states, mask, out_seq_len, EMBEDDING_DIM))
            })
            .collect();
        Ok(vectors)
    }
}

/// Average the token states whose attention mask is set.
fn mean_pool(states: &[f32], mask: &[i64], seq_len: usize, hidden: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;
    for (s, &m) in mask.iter().enumerate().take(seq_len) {
        if m == 0 {
            continue;
        }
        let row = &states[s * hidden..(s + 1) * hidden];
        sum.iter_mut().zip(row).for_each(|(acc, x)| *acc += x);
        count += 1.0;
    }
    if count > 0.0 {
        sum.iter_mut().for_each(|x| *x /= count);
    }
    sum
}

/// L2-normalize a vector. A zero vector is returned unchanged.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_pool_ignores_masked_tokens() {
        // two tokens of width 2, second is padding
        let states = [1.0, 3.0, 100.0, 100.0];
        let pooled = mean_pool(&states, &[1, 0], 2, 2);
        assert_eq!(pooled, vec![1.0, 3.0]);
    }

    #[test]
    fn mean_pool_averages_unmasked_tokens() {
        let states = [1.0, 2.0, 3.0, 4.0];
        let pooled = mean_pool(&states, &[1, 1], 2, 2);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn l2_normalize_unit_length() {
        let normalized = l2_normalize(vec![3.0, 4.0]);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    #[ignore] // Requires model files: run `mnemos model download`, then `cargo test -- --ignored`
    fn embed_is_deterministic_and_normalized() {
        let provider = OnnxEmbedder::new(&EmbeddingConfig::default()).unwrap();
        let a = provider.embed("Rust is a systems programming language").unwrap();
        let b = provider.embed("Rust is a systems programming language").unwrap();
        assert_eq!(a, b, "same input must produce identical output");
        assert_eq!(a.len(), EMBEDDING_DIM);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    #[ignore]
    fn similar_texts_score_higher() {
        let provider = OnnxEmbedder::new(&EmbeddingConfig::default()).unwrap();
        let batch = provider
            .embed_batch(&["I am very smart", "I am a genius", "I love pizza"])
            .unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&batch[0], &batch[1]) > dot(&batch[0], &batch[2]));
    }
}
