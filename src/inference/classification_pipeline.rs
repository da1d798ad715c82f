use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::error::{HandlerError, HandlerResult};
use crate::inference::albert::AlbertForSequenceClassification;
use crate::inference::model_config::{ClassifierConfig, LabelMap};

pub const CONFIG_FILENAME: &str = "config.json";
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";
pub const SAFETENSORS_FILENAME: &str = "model.safetensors";
pub const PTH_FILENAME: &str = "pytorch_model.bin";

/// Outcome of classifying a single input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub index: usize,
    pub label: String,
}

/// Tokenizer, classifier and label table loaded from one model directory.
pub struct ClassificationPipeline {
    model: AlbertForSequenceClassification,
    tokenizer: Tokenizer,
    labels: LabelMap,
    device: Device,
    max_length: usize,
}

impl ClassificationPipeline {
    /// Loads `config.json`, `tokenizer.json` and the weights from `model_dir`.
    ///
    /// The tokenizer is set up to pad and truncate every input to exactly `max_length` ids.
    #[tracing::instrument(level = "info")]
    pub fn load(model_dir: &Path, max_length: usize) -> HandlerResult<Self> {
        if max_length == 0 {
            return Err(HandlerError::ResourceLoad(
                "max_length must be at least 1".into(),
            ));
        }
        let config = ClassifierConfig::from_file(&model_dir.join(CONFIG_FILENAME))?;
        if max_length > config.max_position_embeddings {
            return Err(HandlerError::ResourceLoad(format!(
                "max_length {max_length} exceeds the model's {} positions",
                config.max_position_embeddings
            )));
        }
        let labels = config.label_map()?;
        let tokenizer = load_tokenizer(
            &model_dir.join(TOKENIZER_FILENAME),
            max_length,
            config.pad_token_id,
        )?;

        let device = Device::Cpu;
        let weights = weights_file(model_dir)?;
        let vb = if weights.extension().is_some_and(|e| e == "safetensors") {
            // Safety: the weights file is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[&weights], DType::F32, &device) }
        } else {
            VarBuilder::from_pth(&weights, DType::F32, &device)
        }
        .map_err(|e| resource_error(&weights, e))?;

        let model = AlbertForSequenceClassification::load(vb, &config, labels.len())
            .map_err(|e| resource_error(&weights, e))?;

        info!(
            model_dir = %model_dir.display(),
            labels = labels.len(),
            max_length,
            "loaded sequence classification model"
        );
        Ok(Self {
            model,
            tokenizer,
            labels,
            device,
            max_length,
        })
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Encodes `text` into exactly `max_length` token ids.
    pub fn encode(&self, text: &str) -> HandlerResult<Encoding> {
        let encoding = self.tokenizer.encode(text, true).map_err(|e| {
            HandlerError::Encoding(format!(
                "tokenization failed on '{}': {e}",
                text.chars().take(50).collect::<String>()
            ))
        })?;
        if encoding.get_ids().len() != self.max_length {
            return Err(HandlerError::Encoding(format!(
                "expected {} tokens, tokenizer produced {}",
                self.max_length,
                encoding.get_ids().len()
            )));
        }
        Ok(encoding)
    }

    /// Returns `(1, num_labels)` logits for `text`.
    pub fn logits(&self, text: &str) -> HandlerResult<Tensor> {
        let encoding = self.encode(text)?;
        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let logits = self
            .model
            .forward(&input_ids, &token_type_ids, &attention_mask)?;
        debug!(logits = %logits, "forward pass");
        Ok(logits)
    }

    /// Classifies `text`, ties go to the lowest index.
    #[tracing::instrument(level = "debug", skip(self, text))]
    pub fn classify(&self, text: &str) -> HandlerResult<ClassificationResult> {
        let logits = self.logits(text)?;
        let index = logits.argmax(D::Minus1)?.squeeze(0)?.to_scalar::<u32>()? as usize;
        let label = self.labels.label(index)?.to_string();
        Ok(ClassificationResult { index, label })
    }
}

/// Loads `tokenizer.json` with fixed-length padding and truncation.
///
/// The pad token comes from the file's own padding settings, then the vocabulary, and
/// finally the model config's `pad_token_id`.
fn load_tokenizer(path: &Path, max_length: usize, pad_token_id: u32) -> HandlerResult<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| HandlerError::ResourceLoad(format!("cannot load {}: {e}", path.display())))?;

    let (pad_id, pad_token) = match tokenizer.get_padding() {
        Some(padding) => (padding.pad_id, padding.pad_token.clone()),
        None => ["<pad>", "[PAD]"]
            .iter()
            .find_map(|token| tokenizer.token_to_id(token).map(|id| (id, token.to_string())))
            .unwrap_or_else(|| {
                let token = tokenizer
                    .id_to_token(pad_token_id)
                    .unwrap_or_else(|| "<pad>".to_string());
                (pad_token_id, token)
            }),
    };

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| HandlerError::ResourceLoad(format!("set truncation: {e}")))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::Fixed(max_length),
        pad_id,
        pad_token,
        ..Default::default()
    }));
    Ok(tokenizer)
}

fn weights_file(model_dir: &Path) -> HandlerResult<PathBuf> {
    [SAFETENSORS_FILENAME, PTH_FILENAME]
        .iter()
        .map(|name| model_dir.join(name))
        .find(|path| path.exists())
        .ok_or_else(|| {
            HandlerError::ResourceLoad(format!(
                "neither {SAFETENSORS_FILENAME} nor {PTH_FILENAME} found in {}",
                model_dir.display()
            ))
        })
}

fn resource_error(path: &Path, err: candle_core::Error) -> HandlerError {
    HandlerError::ResourceLoad(format!("cannot load weights {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn write_tokenizer(dir: &Path, vocab: serde_json::Value) -> PathBuf {
        let path = dir.join(TOKENIZER_FILENAME);
        let tokenizer = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {"type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]"}
        });
        std::fs::write(&path, tokenizer.to_string()).unwrap();
        path
    }

    #[test]
    fn pads_with_the_configured_id_when_vocab_has_no_pad_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tokenizer(dir.path(), json!({"[UNK]": 0, "hello": 1, "<blank>": 2}));

        let tokenizer = load_tokenizer(&path, 4, 2).unwrap();
        let encoding = tokenizer.encode("hello", true).unwrap();
        assert_eq!(encoding.get_ids(), &[1, 2, 2, 2]);
        assert_eq!(tokenizer.get_padding().unwrap().pad_token, "<blank>");
    }

    #[test]
    fn prefers_the_vocabulary_pad_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tokenizer(dir.path(), json!({"[UNK]": 0, "hello": 1, "<pad>": 2}));

        let tokenizer = load_tokenizer(&path, 3, 0).unwrap();
        let encoding = tokenizer.encode("hello", true).unwrap();
        assert_eq!(encoding.get_ids(), &[1, 2, 2]);
    }
}
