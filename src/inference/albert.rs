//! ALBERT encoder with a sequence classification head.
//!
//! Parameter names follow the usual `AlbertForSequenceClassification` checkpoint layout so
//! weights exported by the reference tooling load as is:
//! `albert.embeddings.*`, `albert.encoder.*`, `albert.pooler`, `classifier`.

use candle_core::{DType, Module, Result, Tensor, D};
use candle_nn::{embedding, layer_norm, linear, Embedding, LayerNorm, Linear, VarBuilder};

use crate::inference::model_config::{ClassifierConfig, HiddenAct};

// Large negative bias keeps padded positions out of the attention softmax.
const MASKED_BIAS: f64 = -10_000.0;

impl HiddenAct {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            HiddenAct::Gelu => xs.gelu_erf(),
            HiddenAct::GeluNew => xs.gelu(),
            HiddenAct::Relu => xs.relu(),
            HiddenAct::Tanh => xs.tanh(),
        }
    }
}

struct AlbertEmbeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Embedding,
    layer_norm: LayerNorm,
}

impl AlbertEmbeddings {
    fn load(vb: VarBuilder, config: &ClassifierConfig) -> Result<Self> {
        Ok(Self {
            word_embeddings: embedding(
                config.vocab_size,
                config.embedding_size,
                vb.pp("word_embeddings"),
            )?,
            position_embeddings: embedding(
                config.max_position_embeddings,
                config.embedding_size,
                vb.pp("position_embeddings"),
            )?,
            token_type_embeddings: embedding(
                config.type_vocab_size,
                config.embedding_size,
                vb.pp("token_type_embeddings"),
            )?,
            layer_norm: layer_norm(
                config.embedding_size,
                config.layer_norm_eps,
                vb.pp("LayerNorm"),
            )?,
        })
    }

    fn forward(&self, input_ids: &Tensor, token_type_ids: &Tensor) -> Result<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;
        let position_ids = Tensor::arange(0u32, seq_len as u32, input_ids.device())?;

        let words = self.word_embeddings.forward(input_ids)?;
        let types = self.token_type_embeddings.forward(token_type_ids)?;
        let positions = self.position_embeddings.forward(&position_ids)?;

        let embeddings = (words + types)?.broadcast_add(&positions)?;
        self.layer_norm.forward(&embeddings)
    }
}

struct AlbertAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    dense: Linear,
    layer_norm: LayerNorm,
    num_heads: usize,
    head_dim: usize,
}

impl AlbertAttention {
    fn load(vb: VarBuilder, config: &ClassifierConfig) -> Result<Self> {
        let hidden = config.hidden_size;
        if hidden % config.num_attention_heads != 0 {
            candle_core::bail!(
                "hidden size {hidden} is not a multiple of {} attention heads",
                config.num_attention_heads
            )
        }
        Ok(Self {
            query: linear(hidden, hidden, vb.pp("query"))?,
            key: linear(hidden, hidden, vb.pp("key"))?,
            value: linear(hidden, hidden, vb.pp("value"))?,
            dense: linear(hidden, hidden, vb.pp("dense"))?,
            layer_norm: layer_norm(hidden, config.layer_norm_eps, vb.pp("LayerNorm"))?,
            num_heads: config.num_attention_heads,
            head_dim: hidden / config.num_attention_heads,
        })
    }

    fn split_heads(&self, xs: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, _) = xs.dims3()?;
        xs.reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    fn forward(&self, hidden_states: &Tensor, mask_bias: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, hidden) = hidden_states.dims3()?;

        let query = self.split_heads(&self.query.forward(hidden_states)?)?;
        let key = self.split_heads(&self.key.forward(hidden_states)?)?;
        let value = self.split_heads(&self.value.forward(hidden_states)?)?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = (query.matmul(&key.t()?.contiguous()?)? * scale)?;
        let scores = scores.broadcast_add(mask_bias)?;
        let probs = candle_nn::ops::softmax(&scores, D::Minus1)?;

        let context = probs
            .matmul(&value)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, hidden))?;

        let projected = self.dense.forward(&context)?;
        self.layer_norm.forward(&(hidden_states + projected)?)
    }
}

struct AlbertLayer {
    attention: AlbertAttention,
    ffn: Linear,
    ffn_output: Linear,
    full_layer_layer_norm: LayerNorm,
    activation: HiddenAct,
}

impl AlbertLayer {
    fn load(vb: VarBuilder, config: &ClassifierConfig) -> Result<Self> {
        Ok(Self {
            attention: AlbertAttention::load(vb.pp("attention"), config)?,
            ffn: linear(config.hidden_size, config.intermediate_size, vb.pp("ffn"))?,
            ffn_output: linear(
                config.intermediate_size,
                config.hidden_size,
                vb.pp("ffn_output"),
            )?,
            full_layer_layer_norm: layer_norm(
                config.hidden_size,
                config.layer_norm_eps,
                vb.pp("full_layer_layer_norm"),
            )?,
            activation: config.hidden_act,
        })
    }

    fn forward(&self, hidden_states: &Tensor, mask_bias: &Tensor) -> Result<Tensor> {
        let attention_output = self.attention.forward(hidden_states, mask_bias)?;
        let ffn = self
            .activation
            .forward(&self.ffn.forward(&attention_output)?)?;
        let ffn = self.ffn_output.forward(&ffn)?;
        self.full_layer_layer_norm
            .forward(&(ffn + attention_output)?)
    }
}

struct AlbertLayerGroup {
    layers: Vec<AlbertLayer>,
}

impl AlbertLayerGroup {
    fn load(vb: VarBuilder, config: &ClassifierConfig) -> Result<Self> {
        let vb = vb.pp("albert_layers");
        let layers = (0..config.inner_group_num)
            .map(|i| AlbertLayer::load(vb.pp(i), config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    fn forward(&self, hidden_states: &Tensor, mask_bias: &Tensor) -> Result<Tensor> {
        let mut hidden_states = hidden_states.clone();
        for layer in &self.layers {
            hidden_states = layer.forward(&hidden_states, mask_bias)?;
        }
        Ok(hidden_states)
    }
}

struct AlbertEncoder {
    embedding_hidden_mapping_in: Linear,
    groups: Vec<AlbertLayerGroup>,
    num_hidden_layers: usize,
}

impl AlbertEncoder {
    fn load(vb: VarBuilder, config: &ClassifierConfig) -> Result<Self> {
        if config.num_hidden_groups == 0 {
            candle_core::bail!("num_hidden_groups must be at least 1")
        }
        let groups_vb = vb.pp("albert_layer_groups");
        let groups = (0..config.num_hidden_groups)
            .map(|i| AlbertLayerGroup::load(groups_vb.pp(i), config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            embedding_hidden_mapping_in: linear(
                config.embedding_size,
                config.hidden_size,
                vb.pp("embedding_hidden_mapping_in"),
            )?,
            groups,
            num_hidden_layers: config.num_hidden_layers,
        })
    }

    fn forward(&self, embeddings: &Tensor, mask_bias: &Tensor) -> Result<Tensor> {
        let mut hidden_states = self.embedding_hidden_mapping_in.forward(embeddings)?;
        for layer in 0..self.num_hidden_layers {
            let index = group_index(layer, self.groups.len(), self.num_hidden_layers);
            let group = &self.groups[index];
            hidden_states = group.forward(&hidden_states, mask_bias)?;
        }
        Ok(hidden_states)
    }
}

/// Group whose parameters `layer` reuses; consecutive layers share a group.
fn group_index(layer: usize, num_groups: usize, num_layers: usize) -> usize {
    layer * num_groups / num_layers
}

pub struct AlbertForSequenceClassification {
    embeddings: AlbertEmbeddings,
    encoder: AlbertEncoder,
    pooler: Linear,
    classifier: Linear,
}

impl AlbertForSequenceClassification {
    pub fn load(vb: VarBuilder, config: &ClassifierConfig, num_labels: usize) -> Result<Self> {
        let albert = vb.pp("albert");
        Ok(Self {
            embeddings: AlbertEmbeddings::load(albert.pp("embeddings"), config)?,
            encoder: AlbertEncoder::load(albert.pp("encoder"), config)?,
            pooler: linear(config.hidden_size, config.hidden_size, albert.pp("pooler"))?,
            classifier: linear(config.hidden_size, num_labels, vb.pp("classifier"))?,
        })
    }

    /// Returns `(batch, num_labels)` logits.
    ///
    /// All inputs are `(batch, seq_len)` `u32` tensors; `attention_mask` is 1 for real
    /// tokens and 0 for padding.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        let (batch, seq_len) = input_ids.dims2()?;
        let mask_bias = attention_mask
            .to_dtype(DType::F32)?
            .affine(-MASKED_BIAS, MASKED_BIAS)?
            .reshape((batch, 1, 1, seq_len))?;

        let embeddings = self.embeddings.forward(input_ids, token_type_ids)?;
        let sequence_output = self.encoder.forward(&embeddings, &mask_bias)?;

        let first_token = sequence_output.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&first_token)?.tanh()?;
        self.classifier.forward(&pooled)
    }
}
