use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{HandlerError, HandlerResult};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HiddenAct {
    Gelu,
    #[default]
    GeluNew,
    Relu,
    Tanh,
}

/// Hyperparameters and label table read from a checkpoint's `config.json`.
#[derive(Deserialize, Debug, Clone)]
pub struct ClassifierConfig {
    pub vocab_size: usize,
    #[serde(default = "default_embedding_size")]
    pub embedding_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    #[serde(default = "default_one")]
    pub num_hidden_groups: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default = "default_one")]
    pub inner_group_num: usize,
    #[serde(default)]
    pub hidden_act: HiddenAct,
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default)]
    pub pad_token_id: u32,
    #[serde(default)]
    pub id2label: Option<HashMap<String, String>>,
    #[serde(default)]
    pub num_labels: Option<usize>,
}

fn default_embedding_size() -> usize {
    128
}

fn default_one() -> usize {
    1
}

fn default_max_position_embeddings() -> usize {
    512
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl ClassifierConfig {
    #[tracing::instrument(level = "debug")]
    pub fn from_file(path: &Path) -> HandlerResult<Self> {
        let str = std::fs::read_to_string(path).map_err(|e| {
            HandlerError::ResourceLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&str).map_err(|e| {
            HandlerError::ResourceLoad(format!("invalid model config {}: {e}", path.display()))
        })
    }

    pub fn label_map(&self) -> HandlerResult<LabelMap> {
        match (&self.id2label, self.num_labels) {
            (Some(id2label), _) => LabelMap::from_id2label(id2label),
            (None, Some(num_labels)) => Ok(LabelMap::generic(num_labels)),
            (None, None) => Ok(LabelMap::generic(2)),
        }
    }
}

/// Index to label table of a classification head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    /// Builds the table from `config.json` style keys ("0", "1", ...).
    ///
    /// Keys must cover `0..n` without gaps.
    pub fn from_id2label(id2label: &HashMap<String, String>) -> HandlerResult<Self> {
        let mut labels = vec![None; id2label.len()];
        for (key, label) in id2label {
            let index: usize = key.trim().parse().map_err(|_| {
                HandlerError::ResourceLoad(format!("id2label key {key:?} is not an index"))
            })?;
            let slot = labels.get_mut(index).ok_or_else(|| {
                HandlerError::ResourceLoad(format!(
                    "id2label index {index} is out of range for {} labels",
                    id2label.len()
                ))
            })?;
            *slot = Some(label.clone());
        }
        let labels = labels
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| HandlerError::ResourceLoad("id2label has duplicate indices".into()))?;
        if labels.is_empty() {
            return Err(HandlerError::ResourceLoad("id2label is empty".into()));
        }
        Ok(Self { labels })
    }

    pub fn generic(num_labels: usize) -> Self {
        Self {
            labels: (0..num_labels).map(|i| format!("LABEL_{i}")).collect(),
        }
    }

    pub fn label(&self, index: usize) -> HandlerResult<&str> {
        self.labels.get(index).map(String::as_str).ok_or_else(|| {
            HandlerError::Inference(format!(
                "predicted index {index} has no label, available: {}",
                self.labels.join(", ")
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id2label(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn orders_labels_by_index() {
        let map = LabelMap::from_id2label(&id2label(&[("1", "POSITIVE"), ("0", "NEGATIVE")]))
            .unwrap();
        assert_eq!(map.labels(), &["NEGATIVE", "POSITIVE"]);
        assert_eq!(map.label(1).unwrap(), "POSITIVE");
    }

    #[test]
    fn rejects_gaps_and_bad_keys() {
        assert!(LabelMap::from_id2label(&id2label(&[("0", "A"), ("2", "B")])).is_err());
        assert!(LabelMap::from_id2label(&id2label(&[("zero", "A")])).is_err());
        assert!(LabelMap::from_id2label(&HashMap::new()).is_err());
    }

    #[test]
    fn out_of_range_index_is_an_inference_error() {
        let map = LabelMap::generic(2);
        assert!(matches!(map.label(2), Err(HandlerError::Inference(_))));
    }

    #[test]
    fn parses_albert_base_config() {
        let config: ClassifierConfig = serde_json::from_str(
            r#"{
                "architectures": ["AlbertForSequenceClassification"],
                "attention_probs_dropout_prob": 0,
                "embedding_size": 128,
                "hidden_act": "gelu_new",
                "hidden_size": 768,
                "id2label": {"0": "NEGATIVE", "1": "POSITIVE"},
                "intermediate_size": 3072,
                "max_position_embeddings": 512,
                "model_type": "albert",
                "num_attention_heads": 12,
                "num_hidden_groups": 1,
                "num_hidden_layers": 12,
                "pad_token_id": 0,
                "type_vocab_size": 2,
                "vocab_size": 30000
            }"#,
        )
        .unwrap();
        assert_eq!(config.hidden_act, HiddenAct::GeluNew);
        assert_eq!(config.inner_group_num, 1);
        assert_eq!(config.label_map().unwrap().labels(), &["NEGATIVE", "POSITIVE"]);
    }

    #[test]
    fn falls_back_to_generic_labels() {
        let config: ClassifierConfig = serde_json::from_str(
            r#"{"vocab_size": 10, "hidden_size": 8, "num_hidden_layers": 1,
                "num_attention_heads": 2, "intermediate_size": 16, "num_labels": 3}"#,
        )
        .unwrap();
        assert_eq!(
            config.label_map().unwrap().labels(),
            &["LABEL_0", "LABEL_1", "LABEL_2"]
        );
    }
}
