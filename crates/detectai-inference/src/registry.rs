//! Lazy, concurrency-safe loading of the shared model bundle.
//!
//! The tokenizer, encoder, and classifier are slow to load and large, so they
//! are loaded at most once per process and shared read-only across requests.
//! The registry is an explicitly constructed value passed to the pipeline, not
//! a process-wide global; tests inject their own loader.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use ort::session::{builder::GraphOptimizationLevel, Session};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::error::DetectError;

/// Write-once cell with a mutex-guarded check-then-init sequence.
///
/// Concurrent callers of [`get_or_try_init`](Self::get_or_try_init) block
/// until the single in-flight initializer resolves. A failed initializer
/// publishes nothing: the cell stays empty and the next caller runs the
/// initializer again. Once a value is published, reads are lock-free.
pub struct GuardedCell<T> {
    cell: OnceLock<T>,
    init_lock: Mutex<()>,
}

impl<T> GuardedCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// The published value, if initialization has succeeded.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        // Fast path: already published, no locking.
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // A concurrent caller may have published while we waited on the lock.
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let value = init()?;
        Ok(self.cell.get_or_init(|| value))
    }
}

impl<T> Default for GuardedCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk locations of the model artifacts.
///
/// `encoder_dir` holds the HuggingFace export of the code encoder
/// (`tokenizer.json`, `config.json`, `model.safetensors`); `classifier` is
/// the externally trained ONNX classification artifact.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub encoder_dir: PathBuf,
    pub classifier: PathBuf,
}

/// The loaded tokenizer, encoder, and classifier shared by all requests.
///
/// Immutable after construction except for the ONNX session, which sits
/// behind a mutex because the runtime takes `&mut` to run. Inference never
/// mutates weights.
pub struct ModelBundle {
    pub(crate) tokenizer: Tokenizer,
    pub(crate) encoder: BertModel,
    pub(crate) device: Device,
    pub(crate) hidden_size: usize,
    pub(crate) classifier: Mutex<Session>,
}

impl ModelBundle {
    /// Hidden size of the encoder, which is also the embedding length.
    #[must_use]
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

type BundleLoader = dyn Fn() -> Result<ModelBundle, DetectError> + Send + Sync;

/// Process-lifetime holder of the [`ModelBundle`], loaded lazily exactly once.
pub struct ModelRegistry {
    loader: Box<BundleLoader>,
    bundle: GuardedCell<Arc<ModelBundle>>,
}

impl ModelRegistry {
    /// Registry that loads the artifacts at `paths` on first use.
    #[must_use]
    pub fn new(paths: ModelPaths) -> Self {
        Self::with_loader(move || load_bundle(&paths))
    }

    /// Registry with an injected loader. Used by tests and callers that
    /// source artifacts somewhere other than local disk.
    pub fn with_loader(
        loader: impl Fn() -> Result<ModelBundle, DetectError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            loader: Box::new(loader),
            bundle: GuardedCell::new(),
        }
    }

    /// Load the bundle if it is not loaded yet, and return it.
    ///
    /// Idempotent and safe under concurrent invocation: exactly one load runs,
    /// concurrent callers block until it resolves, later calls are a cheap
    /// check. On failure the registry remains unloaded so the next call
    /// retries from scratch.
    pub fn ensure_loaded(&self) -> Result<Arc<ModelBundle>, DetectError> {
        self.bundle
            .get_or_try_init(|| {
                info!("loading model bundle");
                let started = Instant::now();
                let bundle = (self.loader)()?;
                info!(elapsed = ?started.elapsed(), "model bundle loaded");
                Ok(Arc::new(bundle))
            })
            .cloned()
    }

    /// Whether a bundle has been published.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.bundle.get().is_some()
    }
}

fn load_bundle(paths: &ModelPaths) -> Result<ModelBundle, DetectError> {
    let tokenizer_path = paths.encoder_dir.join("tokenizer.json");
    let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
        DetectError::model_load(format!(
            "failed to load tokenizer {}: {e}",
            tokenizer_path.display()
        ))
    })?;

    let config_path = paths.encoder_dir.join("config.json");
    let config_str = std::fs::read_to_string(&config_path).map_err(|e| {
        DetectError::model_load(format!(
            "failed to read encoder config {}: {e}",
            config_path.display()
        ))
    })?;
    let config: BertConfig = serde_json::from_str(&config_str).map_err(|e| {
        DetectError::model_load(format!(
            "failed to parse encoder config {}: {e}",
            config_path.display()
        ))
    })?;

    let device = Device::Cpu;
    let weights_path = paths.encoder_dir.join("model.safetensors");
    if !weights_path.exists() {
        return Err(DetectError::model_load(format!(
            "model.safetensors not found in {}",
            paths.encoder_dir.display()
        )));
    }
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
            .map_err(|e| DetectError::model_load(format!("failed to load encoder weights: {e}")))?
    };

    let encoder = load_encoder(&vb, &config)?;

    let classifier = Session::builder()
        .map_err(|e| DetectError::model_load(format!("failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| DetectError::model_load(format!("failed to set optimization level: {e}")))?
        .with_intra_threads(4)
        .map_err(|e| DetectError::model_load(format!("failed to set intra threads: {e}")))?
        .commit_from_file(&paths.classifier)
        .map_err(|e| {
            DetectError::model_load(format!(
                "failed to load classifier {}: {e}",
                paths.classifier.display()
            ))
        })?;

    info!(hidden_size = config.hidden_size, "model bundle ready");

    Ok(ModelBundle {
        tokenizer,
        encoder,
        device,
        hidden_size: config.hidden_size,
        classifier: Mutex::new(classifier),
    })
}

/// Checkpoints exported from HuggingFace prefix their weight names with the
/// architecture (`roberta` for CodeBERT); some exports strip the prefix.
fn load_encoder(vb: &VarBuilder, config: &BertConfig) -> Result<BertModel, DetectError> {
    let mut errors = Vec::new();

    for prefix in ["roberta", "bert", ""] {
        let vb_prefix = if prefix.is_empty() {
            vb.clone()
        } else {
            vb.pp(prefix)
        };

        match BertModel::load(vb_prefix, config) {
            Ok(model) => {
                debug!(
                    prefix = if prefix.is_empty() { "<root>" } else { prefix },
                    "loaded encoder backbone"
                );
                return Ok(model);
            }
            Err(e) => {
                errors.push(format!(
                    "{}: {e}",
                    if prefix.is_empty() { "<root>" } else { prefix }
                ));
            }
        }
    }

    Err(DetectError::model_load(format!(
        "failed to load encoder backbone, tried prefixes [{}]",
        errors.join(" | ")
    )))
}
