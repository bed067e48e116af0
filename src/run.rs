//! Top-level run orchestration: assemble data, train, evaluate, checkpoint.

use crate::config::RunConfig;
use crate::data::{Batches, ExampleSet, Normalizer, CIFAR10_MEAN, CLEAN_IMAGE_KEY};
use crate::io::{CheckpointManager, TestMetrics};
use crate::logging::RunLogger;
use crate::model::{Classifier, LinearClassifier};
use crate::optim::{decay_param_groups, LrSchedule, Sgd, MOMENTUM};
use crate::train::{TrainSettings, Trainer};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

/// Execute one training (or evaluation) run.
///
/// Per-epoch state machine: TRAIN over positionally-paired clean/adversarial
/// batches, EVAL over both test sets, CHECKPOINT, then the next epoch.
pub fn run(config: RunConfig) -> Result<()> {
    let dir = config.run_dir();
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::io(format!("creating {}", dir.display()), e))?;
    let mut logger = RunLogger::create(&dir.join(config.log_name()))?;
    logger.info(&format!("{config:?}"))?;

    let mut rng = StdRng::seed_from_u64(config.seed);

    // clean splits share the adversarial artifact layout
    let clean_train = ExampleSet::load(&config.data_dir.join("train.safetensors"), CLEAN_IMAGE_KEY)?;
    let clean_test = ExampleSet::load(&config.data_dir.join("test.safetensors"), CLEAN_IMAGE_KEY)?;
    let balanced_total = clean_train.len();
    let (adv_train_set, adv_test_set) = config.policy.assemble(&config.data_dir, balanced_total)?;

    // tiling keeps positional pairing valid when several attacks concatenate
    let mut train_set = clean_train.into_dataset().tiled(config.policy.clean_tile_factor());
    let test_set = clean_test.into_dataset();
    let mut adv_train = adv_train_set.into_dataset();
    let adv_test = adv_test_set.into_dataset();

    train_set.subsample(config.sample, &mut rng);
    adv_train.subsample(config.sample, &mut rng);
    logger.info(&format!("Train original data: {} samples", train_set.len()))?;
    logger.info(&format!(
        "Train adversarial data ({}): {} samples",
        config.attack_label,
        adv_train.len()
    ))?;

    let image_shape = train_set
        .image_shape()
        .ok_or_else(|| Error::config("sample", "training set is empty after subsampling"))?;
    let classes = [&train_set, &test_set, &adv_train, &adv_test]
        .iter()
        .map(|ds| ds.num_classes())
        .max()
        .unwrap_or(0);

    let train_batches = Batches::new(train_set, config.batch_size);
    let test_batches = Batches::new(test_set, config.batch_size);
    let adv_train_batches = Batches::new(adv_train, config.batch_size);
    let adv_test_batches = Batches::new(adv_test, config.batch_size);

    let mut model = LinearClassifier::new(image_shape, classes, &mut rng);
    let groups = decay_param_groups(&model.named_parameters(), config.l2);
    let mut optimizer = Sgd::new(groups, config.lr_max as f32, MOMENTUM);
    let schedule = LrSchedule::new(config.lr_schedule, config.lr_max, config.epochs)
        .with_one_drop(config.lr_drop_epoch, config.lr_one_drop);

    let mut checkpoints = CheckpointManager::new(&dir, config.chkpt_iters)?;
    let start_epoch = match config.resume {
        Some(epoch) => {
            checkpoints.resume(&mut model, &mut optimizer, epoch)?;
            logger.info(&format!("Resuming at epoch {epoch}"))?;
            epoch
        }
        None => 0,
    };
    if config.eval {
        if config.resume.is_none() {
            logger.info("No model loaded to evaluate, specify with --resume EPOCH")?;
            return Ok(());
        }
        logger.info("[Evaluation mode]")?;
    }

    let channels = image_shape.0;
    let normalizer = if channels == CIFAR10_MEAN.len() {
        Normalizer::cifar10()
    } else {
        Normalizer::new(vec![0.0; channels], vec![1.0; channels])?
    };
    let settings = TrainSettings {
        mixup_alpha: config.mixup_alpha,
        l1: config.l1,
        eval_only: config.eval,
    };
    let mut trainer = Trainer::new(model, normalizer, optimizer, schedule, settings, rng);

    // starting-weight accuracy, before any epoch runs
    let initial = trainer.evaluate(&test_batches);
    logger.info(&format!("Initial accuracy on original test data: {:.4}", initial.accuracy()))?;
    let initial_robust = trainer.evaluate(&adv_test_batches);
    logger.info(&format!(
        "Initial accuracy on adversarial test data: {:.4}",
        initial_robust.accuracy()
    ))?;

    logger.epoch_header()?;
    for epoch in start_epoch..config.epochs {
        let train_start = Instant::now();
        let stats = trainer.train_epoch(epoch, &train_batches, &adv_train_batches);
        let train_time = train_start.elapsed().as_secs_f64();

        let test_start = Instant::now();
        let test = trainer.evaluate(&test_batches);
        let test_robust = trainer.evaluate(&adv_test_batches);
        let test_time = test_start.elapsed().as_secs_f64();

        logger.epoch_row(
            epoch,
            train_time,
            test_time,
            stats.lr,
            &stats.clean,
            &stats.robust,
            &test,
            &test_robust,
        )?;

        checkpoints.save_periodic(trainer.model(), trainer.optimizer(), epoch, config.epochs)?;
        checkpoints.save_best_if_improved(
            trainer.model(),
            &TestMetrics {
                test_loss: test.loss(),
                test_acc: test.accuracy(),
                test_robust_loss: test_robust.loss(),
                test_robust_acc: test_robust.accuracy(),
            },
        )?;
    }

    Ok(())
}
