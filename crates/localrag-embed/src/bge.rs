use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;

use localrag_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

pub const BGE_M3_DIM: usize = 1024;

struct Model {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl Model {
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let v: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if v.len() != BGE_M3_DIM {
            bail!("model produced {} dims, expected {}", v.len(), BGE_M3_DIM);
        }
        Ok(v)
    }
}

/// BGE-M3 dense embeddings computed locally with candle.
///
/// The model directory must hold `tokenizer.json`, `config.json` and
/// `pytorch_model.bin`. Inference runs on the blocking thread pool.
pub struct BgeM3Embedder {
    inner: Arc<Model>,
}

impl BgeM3Embedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading BGE-M3 model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!("BGE-M3 model loaded");

        Ok(Self { inner: Arc::new(Model { model, tokenizer, device, max_len }) })
    }
}

#[async_trait]
impl Embedder for BgeM3Embedder {
    fn id(&self) -> &str {
        "bge-m3"
    }

    fn dim(&self) -> usize {
        BGE_M3_DIM
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let out = texts.iter().map(|t| inner.embed_one(t)).collect::<Result<Vec<_>>>()?;
            tracing::debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
            Ok::<_, anyhow::Error>(out)
        })
        .await?
    }
}

/// Find the model directory: explicit setting, then `APP_MODEL_DIR`, `MODEL_DIR`,
/// then `../models/bge-m3` and `models/bge-m3`.
pub fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::env::var("MODEL_DIR").ok().map(PathBuf::from))
        .chain([PathBuf::from("../models/bge-m3"), PathBuf::from("models/bge-m3")]);
    for dir in candidates {
        if dir.exists() {
            tracing::debug!(dir = %dir.display(), "using model dir");
            return Ok(dir);
        }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
