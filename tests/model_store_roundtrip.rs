mod support;

use std::sync::Arc;

use support::recipes::{fast_ensemble, hydration_loaf, measured_history};

use crumbcast::analysis::FeatureEngineer;
use crumbcast::ml::TrainControl;
use crumbcast::predict::{
    EnsemblePredictor, EnsembleTrainer, ModelStore, StoreError, TrainError,
    store::METADATA_FILE_NAME,
};

fn trainer_for(store: &Arc<ModelStore>) -> EnsembleTrainer {
    EnsembleTrainer::new(FeatureEngineer::default(), fast_ensemble(), Arc::clone(store))
}

fn predictor_for(store: &Arc<ModelStore>) -> EnsemblePredictor {
    EnsemblePredictor::new(FeatureEngineer::default(), fast_ensemble(), Arc::clone(store))
}

#[test]
fn reopened_store_predicts_identically() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("models");
    let store = Arc::new(ModelStore::empty(&dir));
    trainer_for(&store)
        .train_models(&measured_history(), &TrainControl::new())
        .unwrap();
    for file in [
        "random_forest.json",
        "gradient_boosting.json",
        "linear.json",
        "ridge.json",
        "scaler.json",
        METADATA_FILE_NAME,
    ] {
        assert!(dir.join(file).is_file(), "missing {file}");
    }

    let query = hydration_loaf(370.0, None);
    let before = predictor_for(&store).predict(&query).unwrap();

    let reopened = Arc::new(ModelStore::open(&dir).unwrap());
    let after = predictor_for(&reopened).predict(&query).unwrap();
    assert!((before.predicted_porosity - after.predicted_porosity).abs() < 1e-9);
    assert_eq!(
        before.confidence_info.top_features,
        after.confidence_info.top_features
    );
}

#[test]
fn missing_directory_means_untrained() {
    let temp = tempfile::tempdir().unwrap();
    let store = ModelStore::open(temp.path().join("never-trained")).unwrap();
    assert!(store.current().is_none());
}

#[test]
fn failed_retrain_keeps_saved_models() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("models");
    let store = Arc::new(ModelStore::empty(&dir));
    let trainer = trainer_for(&store);
    trainer
        .train_models(&measured_history(), &TrainControl::new())
        .unwrap();
    let saved = std::fs::read(dir.join(METADATA_FILE_NAME)).unwrap();

    let err = trainer
        .train_models(&[hydration_loaf(350.0, None)], &TrainControl::new())
        .unwrap_err();
    assert!(matches!(err, TrainError::NoTrainingData { .. }));

    let cancelled = TrainControl::new();
    cancelled.cancel();
    assert!(matches!(
        trainer.train_models(&measured_history(), &cancelled),
        Err(TrainError::Interrupted(_))
    ));

    assert_eq!(std::fs::read(dir.join(METADATA_FILE_NAME)).unwrap(), saved);
    assert!(ModelStore::open(&dir).unwrap().current().is_some());
}

#[test]
fn corrupt_metadata_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("models");
    let store = Arc::new(ModelStore::empty(&dir));
    trainer_for(&store)
        .train_models(&measured_history(), &TrainControl::new())
        .unwrap();
    std::fs::write(dir.join(METADATA_FILE_NAME), b"{ not json").unwrap();
    assert!(matches!(
        ModelStore::open(&dir),
        Err(StoreError::Json { .. })
    ));
}

#[test]
fn interrupted_swap_recovers_previous_models() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("models");
    let stranded = temp.path().join("models.old");
    let store = Arc::new(ModelStore::empty(&dir));
    trainer_for(&store)
        .train_models(&measured_history(), &TrainControl::new())
        .unwrap();
    let query = hydration_loaf(370.0, None);
    let before = predictor_for(&store).predict(&query).unwrap();

    // Crash after the live directory was moved aside but before the new one landed.
    std::fs::rename(&dir, &stranded).unwrap();

    let reopened = Arc::new(ModelStore::open(&dir).unwrap());
    assert!(reopened.current().is_some());
    assert!(dir.join(METADATA_FILE_NAME).is_file());
    assert!(!stranded.exists());
    let after = predictor_for(&reopened).predict(&query).unwrap();
    assert!((before.predicted_porosity - after.predicted_porosity).abs() < 1e-9);
}

#[test]
fn retrain_after_interrupted_swap_keeps_a_loadable_store() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("models");
    let store = Arc::new(ModelStore::empty(&dir));
    let trainer = trainer_for(&store);
    trainer
        .train_models(&measured_history(), &TrainControl::new())
        .unwrap();
    std::fs::rename(&dir, temp.path().join("models.old")).unwrap();

    let cancelled = TrainControl::new();
    cancelled.cancel();
    assert!(trainer.train_models(&measured_history(), &cancelled).is_err());
    assert!(temp.path().join("models.old").is_dir());

    trainer
        .train_models(&measured_history(), &TrainControl::new())
        .unwrap();
    assert!(!temp.path().join("models.old").exists());
    assert!(ModelStore::open(&dir).unwrap().current().is_some());
}

#[test]
fn leftover_staging_dir_is_discarded_on_open() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("models");
    let staging = temp.path().join("models.new");
    let store = Arc::new(ModelStore::empty(&dir));
    trainer_for(&store)
        .train_models(&measured_history(), &TrainControl::new())
        .unwrap();
    let saved = std::fs::read(dir.join(METADATA_FILE_NAME)).unwrap();

    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(staging.join(METADATA_FILE_NAME), b"{ half written").unwrap();

    let reopened = ModelStore::open(&dir).unwrap();
    assert!(reopened.current().is_some());
    assert!(!staging.exists());
    assert_eq!(std::fs::read(dir.join(METADATA_FILE_NAME)).unwrap(), saved);
}

#[test]
fn staging_dir_alone_is_not_a_trained_store() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("models");
    let staging = temp.path().join("models.new");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(staging.join(METADATA_FILE_NAME), b"{}").unwrap();

    let store = ModelStore::open(&dir).unwrap();
    assert!(store.current().is_none());
    assert!(!staging.exists());
    assert!(!dir.exists());
}
