//! Checkpoints
//!
//! A checkpoint captures everything needed to either use a trained model or
//! resume training exactly where it stopped:
//!
//! - the training configuration and vocabulary
//! - both embedding tables
//! - Adam's moment estimates (optional, omitted for inference-only files)
//! - the window sampler's cursor, epoch and order
//! - progress metadata and the position of the model's random stream
//!
//! ## File Layout
//!
//! ```text
//! "W2V_CKPT"                 8-byte magic
//! version                    u8 (currently 1)
//! config                     u32 length + JSON
//! vocabulary                 u32 length + JSON
//! metadata                   u32 length + JSON
//! sampler state              u32 length + JSON (`null` when absent)
//! embed, out_weight          tensors
//! has_optimizer              u8
//!   step                     u64
//!   alpha β₁ β₂ ε λ          f32 x 5
//!   m/v embed, m/v out       tensors
//! ```
//!
//! Tensors are written as a `u32` rank, `u32` dimensions, then `f32` values,
//! all little-endian.

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::model::Word2Vec;
use crate::optimizer::{Adam, Moments};
use crate::tensor::Tensor;
use crate::vocab::Vocabulary;
use crate::window::SamplerState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 8] = b"W2V_CKPT";
const VERSION: u8 = 1;
/// Highest tensor rank a checkpoint may declare
const MAX_RANK: usize = 4;

/// Training progress stored alongside the weights
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Completed epochs
    pub epoch: usize,
    /// Batches processed so far
    pub iteration: usize,
    /// Lowest validation loss seen so far, if any epoch has finished
    pub best_val_loss: Option<f32>,
    pub best_epoch: usize,
    /// Position of the model's random stream (negative sampling)
    pub rng_word_pos: u128,
}

pub struct Checkpoint {
    pub config: TrainingConfig,
    pub vocab: Vocabulary,
    pub model: Word2Vec,
    pub optimizer: Option<Adam>,
    pub sampler: Option<SamplerState>,
    pub metadata: CheckpointMetadata,
}

impl Checkpoint {
    /// Checkpoint holding only what inference needs
    pub fn inference_only(config: TrainingConfig, vocab: Vocabulary, model: Word2Vec) -> Self {
        Self {
            config,
            vocab,
            model,
            optimizer: None,
            sampler: None,
            metadata: CheckpointMetadata::default(),
        }
    }

    /// Write the checkpoint to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file = BufWriter::new(File::create(path)?);

        file.write_all(MAGIC)?;
        file.write_all(&[VERSION])?;

        write_json(&mut file, &self.config)?;
        write_json(&mut file, &self.vocab)?;
        write_json(&mut file, &self.metadata)?;
        write_json(&mut file, &self.sampler)?;

        write_tensor(&mut file, &self.model.embed)?;
        write_tensor(&mut file, &self.model.out_weight)?;

        match &self.optimizer {
            Some(opt) => {
                file.write_all(&[1u8])?;
                file.write_all(&(opt.step as u64).to_le_bytes())?;
                for value in [opt.alpha, opt.beta1, opt.beta2, opt.epsilon, opt.weight_decay] {
                    file.write_all(&value.to_le_bytes())?;
                }
                write_tensor(&mut file, &opt.embed.m)?;
                write_tensor(&mut file, &opt.embed.v)?;
                write_tensor(&mut file, &opt.out_weight.m)?;
                write_tensor(&mut file, &opt.out_weight.v)?;
            }
            None => file.write_all(&[0u8])?,
        }

        file.flush()?;
        tracing::info!(path = %path.display(), epoch = self.metadata.epoch, "checkpoint saved");
        Ok(())
    }

    /// Read a checkpoint written by [`Checkpoint::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = BufReader::new(File::open(path)?);

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        if &header != MAGIC {
            return Err(Error::Checkpoint(format!(
                "{} is not a checkpoint (bad header)",
                path.display()
            )));
        }
        let version = read_u8(&mut file)?;
        if version != VERSION {
            return Err(Error::Checkpoint(format!(
                "unsupported checkpoint version {}",
                version
            )));
        }

        let config: TrainingConfig = read_json(&mut file)?;
        let vocab: Vocabulary = read_json(&mut file)?;
        let metadata: CheckpointMetadata = read_json(&mut file)?;
        let sampler: Option<SamplerState> = read_json(&mut file)?;

        let embed = read_tensor(&mut file)?;
        let out_weight = read_tensor(&mut file)?;
        let model = Word2Vec::from_parts(config.model, config.output, embed, out_weight, vocab.counts())?;

        let optimizer = match read_u8(&mut file)? {
            0 => None,
            1 => {
                let step = read_u64(&mut file)? as usize;
                let mut hyper = [0f32; 5];
                for value in hyper.iter_mut() {
                    *value = read_f32(&mut file)?;
                }
                let embed = Moments {
                    m: read_tensor(&mut file)?,
                    v: read_tensor(&mut file)?,
                };
                let out_weight = Moments {
                    m: read_tensor(&mut file)?,
                    v: read_tensor(&mut file)?,
                };
                if embed.m.shape != model.embed.shape || out_weight.m.shape != model.out_weight.shape {
                    return Err(Error::Checkpoint(
                        "optimizer state does not match model shape".into(),
                    ));
                }
                Some(Adam {
                    embed,
                    out_weight,
                    alpha: hyper[0],
                    beta1: hyper[1],
                    beta2: hyper[2],
                    epsilon: hyper[3],
                    weight_decay: hyper[4],
                    step,
                })
            }
            flag => {
                return Err(Error::Checkpoint(format!("invalid optimizer flag {}", flag)));
            }
        };

        tracing::info!(path = %path.display(), epoch = metadata.epoch, "checkpoint loaded");
        Ok(Self {
            config,
            vocab,
            model,
            optimizer,
            sampler,
            metadata,
        })
    }
}

fn write_json<W: Write, T: Serialize>(w: &mut W, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(&bytes)?;
    Ok(())
}

fn read_json<R: Read, T: DeserializeOwned>(r: &mut R) -> Result<T> {
    let len = read_u32(r)? as usize;
    let bytes = read_bytes(r, len)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_tensor<W: Write>(w: &mut W, tensor: &Tensor) -> Result<()> {
    w.write_all(&(tensor.shape.len() as u32).to_le_bytes())?;
    for &dim in &tensor.shape {
        w.write_all(&(dim as u32).to_le_bytes())?;
    }
    for &val in &tensor.data {
        w.write_all(&val.to_le_bytes())?;
    }
    Ok(())
}

fn read_tensor<R: Read>(r: &mut R) -> Result<Tensor> {
    let rank = read_u32(r)? as usize;
    if rank > MAX_RANK {
        return Err(Error::Checkpoint(format!(
            "corrupt tensor header: rank {}",
            rank
        )));
    }
    let mut shape = Vec::with_capacity(rank);
    for _ in 0..rank {
        shape.push(read_u32(r)? as usize);
    }
    let byte_len = shape
        .iter()
        .try_fold(4usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| {
            Error::Checkpoint(format!("corrupt tensor header: shape {:?}", shape))
        })?;
    let bytes = read_bytes(r, byte_len)?;
    let data = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(Tensor::new(data, shape))
}

/// Read exactly `len` bytes, growing the buffer only as data arrives
///
/// A corrupt length prefix then fails at end of file instead of allocating
/// whatever the header claims.
fn read_bytes<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(Error::Checkpoint(format!(
            "truncated checkpoint: expected {} bytes, found {}",
            len,
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32<R: Read>(r: &mut R) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelKind, OutputKind};
    use crate::window::WindowIterator;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fixture() -> (TrainingConfig, Vocabulary, Word2Vec) {
        let config = TrainingConfig {
            model: ModelKind::Cbow,
            output: OutputKind::NegativeSampling { samples: 2 },
            ..TrainingConfig::tiny()
        };
        let vocab = Vocabulary::build("a b c d\nb c d e\nc d e f", 1);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let model = Word2Vec::new(vocab.len(), 4, config.model, config.output, vocab.counts(), &mut rng).unwrap();
        (config, vocab, model)
    }

    #[test]
    fn test_full_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.bin");

        let (config, vocab, model) = fixture();
        let tokens = vocab.encode("a b c d e f a b c d e f");
        let mut sampler = WindowIterator::new(&tokens, 2, 3, true, 8).unwrap();
        sampler.next_batch();

        let mut optimizer = Adam::new(&model, 0.01).with_weight_decay(0.1);
        optimizer.step = 17;
        optimizer.embed.m.data[3] = 0.25;

        let checkpoint = Checkpoint {
            config: config.clone(),
            vocab,
            model,
            optimizer: Some(optimizer),
            sampler: Some(sampler.state()),
            metadata: CheckpointMetadata {
                epoch: 2,
                iteration: 40,
                best_val_loss: Some(1.5),
                best_epoch: 1,
                rng_word_pos: 1234,
            },
        };
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded.config, config);
        assert_eq!(loaded.vocab.words(), checkpoint.vocab.words());
        assert_eq!(loaded.model.embed, checkpoint.model.embed);
        assert_eq!(loaded.model.kind, ModelKind::Cbow);
        assert_eq!(loaded.metadata, checkpoint.metadata);
        assert_eq!(loaded.sampler, Some(sampler.state()));

        let opt = loaded.optimizer.unwrap();
        assert_eq!(opt.step, 17);
        assert_eq!(opt.weight_decay, 0.1);
        assert_eq!(opt.embed.m.data[3], 0.25);
    }

    #[test]
    fn test_inference_only_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        let (config, vocab, model) = fixture();
        Checkpoint::inference_only(config, vocab, model).save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert!(loaded.optimizer.is_none());
        assert!(loaded.sampler.is_none());
    }

    #[test]
    fn test_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        std::fs::write(&path, b"definitely not a checkpoint").unwrap();

        assert!(matches!(Checkpoint::load(&path), Err(Error::Checkpoint(_))));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.bin");
        let mut bytes = MAGIC.to_vec();
        bytes.push(2);
        std::fs::write(&path, bytes).unwrap();

        match Checkpoint::load(&path) {
            Err(Error::Checkpoint(msg)) => assert!(msg.contains("version 2"), "{}", msg),
            other => panic!("expected a checkpoint error, got {:?}", other.err()),
        }
    }

    /// Valid header and JSON sections, followed by `tensor_header`
    fn write_with_tensor_header(path: &Path, tensor_header: &[u32]) {
        let (config, vocab, _) = fixture();
        let mut bytes = MAGIC.to_vec();
        bytes.push(VERSION);
        write_json(&mut bytes, &config).unwrap();
        write_json(&mut bytes, &vocab).unwrap();
        write_json(&mut bytes, &CheckpointMetadata::default()).unwrap();
        write_json(&mut bytes, &None::<SamplerState>).unwrap();
        for value in tensor_header {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_rejects_overflowing_tensor_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overflow.bin");
        write_with_tensor_header(&path, &[2, u32::MAX, u32::MAX]);

        assert!(matches!(Checkpoint::load(&path), Err(Error::Checkpoint(_))));
    }

    #[test]
    fn test_rejects_absurd_tensor_rank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rank.bin");
        write_with_tensor_header(&path, &[u32::MAX]);

        assert!(matches!(Checkpoint::load(&path), Err(Error::Checkpoint(_))));
    }

    #[test]
    fn test_rejects_truncated_tensor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.bin");
        // Claims 1000 x 1000 floats but the file ends right after the header
        write_with_tensor_header(&path, &[2, 1000, 1000]);

        assert!(matches!(Checkpoint::load(&path), Err(Error::Checkpoint(_))));
    }
}
