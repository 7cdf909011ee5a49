//! End-to-end runs: corpus files → training → checkpoint → resume → search

use skipgram::{Checkpoint, Corpus, Embeddings, ModelKind, OutputKind, Trainer, TrainingConfig};
use std::fs;
use std::path::Path;

/// Sentences built from two topics so neighbours have something to find
fn synthetic_corpus(lines: usize, offset: usize) -> String {
    let animals = ["cat", "dog", "horse", "cow"];
    let foods = ["bread", "rice", "apple", "cheese"];
    let verbs = ["sees", "likes", "follows"];
    (0..lines)
        .map(|i| {
            let i = i + offset;
            if i % 2 == 0 {
                format!(
                    "the {} {} the {} in the field",
                    animals[i % 4],
                    verbs[i % 3],
                    animals[(i / 4) % 4]
                )
            } else {
                format!("we eat {} and {} for dinner", foods[i % 4], foods[(i / 4) % 4])
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_splits(dir: &Path) -> Corpus {
    let train = dir.join("train.txt");
    let valid = dir.join("valid.txt");
    let test = dir.join("test.txt");
    fs::write(&train, synthetic_corpus(120, 0)).unwrap();
    fs::write(&valid, synthetic_corpus(20, 1000)).unwrap();
    fs::write(&test, synthetic_corpus(20, 2000)).unwrap();
    Corpus::from_files(&train, &valid, &test, 1).unwrap()
}

fn config(out_dir: &Path, epochs: usize) -> TrainingConfig {
    TrainingConfig {
        unit: 12,
        window: 2,
        batch_size: 50,
        epochs,
        model: ModelKind::SkipGram,
        output: OutputKind::NegativeSampling { samples: 3 },
        learning_rate: 0.02,
        out_dir: out_dir.to_path_buf(),
        snapshot_every_epoch: true,
        ..TrainingConfig::tiny()
    }
}

#[test]
fn train_export_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_splits(dir.path());
    assert!(corpus.test.iter().all(|&id| id != 0), "test words are all in-vocabulary");

    let out = dir.path().join("run");
    let mut trainer = Trainer::new(config(&out, 4), corpus.clone()).unwrap();
    let before = trainer.evaluate(&corpus.valid).unwrap();
    let report = trainer.run().unwrap();
    let after = trainer.evaluate(&corpus.valid).unwrap();

    assert_eq!(report.epochs, 4);
    assert!(after < before, "validation loss {} -> {}", before, after);
    assert!(report.best_val_loss.unwrap() <= before);

    let log = fs::read_to_string(out.join("log.csv")).unwrap();
    assert_eq!(log.lines().count(), 5);

    let embeddings = Embeddings::load_word2vec_format(out.join("word2vec.model")).unwrap();
    assert_eq!(embeddings.len(), corpus.vocab.len());
    let neighbours = embeddings.most_similar("cat", 5).unwrap();
    assert_eq!(neighbours.len(), 5);
    assert!(neighbours.iter().all(|(w, s)| w != "cat" && s.is_finite()));
    assert!(neighbours.windows(2).all(|pair| pair[0].1 >= pair[1].1));
}

#[test]
fn resume_from_snapshot_continues_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_splits(dir.path());

    let straight_out = dir.path().join("straight");
    let mut straight = Trainer::new(config(&straight_out, 3), corpus.clone()).unwrap();
    let straight_report = straight.run().unwrap();

    // Same run, interrupted: keep only the epoch-2 snapshot and pick up from there
    let split_out = dir.path().join("split");
    Trainer::new(config(&split_out, 2), corpus.clone())
        .unwrap()
        .run()
        .unwrap();
    let mut checkpoint = Checkpoint::load(split_out.join("snapshot_epoch_2.bin")).unwrap();
    assert_eq!(checkpoint.metadata.epoch, 2);
    checkpoint.config.epochs = 3;

    let mut resumed = Trainer::resume(checkpoint, corpus).unwrap();
    let resumed_report = resumed.run().unwrap();

    assert_eq!(resumed_report.iterations, straight_report.iterations);
    assert_eq!(resumed_report.best_val_loss, straight_report.best_val_loss);
    assert_eq!(resumed.model().embed, straight.model().embed);
    assert_eq!(
        fs::read_to_string(split_out.join("log.csv")).unwrap().lines().count(),
        4
    );
}

#[test]
fn resume_rejects_a_different_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_splits(dir.path());
    let out = dir.path().join("run");

    let mut trainer = Trainer::new(config(&out, 1), corpus).unwrap();
    trainer.run().unwrap();
    let checkpoint = Checkpoint::load(out.join("snapshot_epoch_1.bin")).unwrap();

    let other = Corpus::from_texts("completely different words here and there again", "", "", 1);
    assert!(Trainer::resume(checkpoint, other).is_err());
}
