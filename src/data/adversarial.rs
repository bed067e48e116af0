//! Adversarial example-set assembly.
//!
//! Pre-computed per-attack artifacts are combined under a tagged
//! [`AttackPolicy`]: a single attack, the whole registry, a user-listed
//! subset, or a proportionally resampled blend.

use super::artifact::{ExampleSet, ADV_IMAGE_KEY};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Attacks whose artifacts participate in the `all` policy, in registry order.
pub const ATTACK_REGISTRY: [&str; 11] = [
    "pixelattack",
    "spatialtransformation",
    "squareattack",
    "fgsm",
    "deepfool",
    "bim",
    "cw",
    "pgd",
    "autoattack",
    "autopgd",
    "newtonfool",
];

/// Attacks stored under the same artifact layout but excluded from `all`.
pub const EXTRA_ATTACKS: [&str; 3] = ["ffgsm", "mifgsm", "tpgd"];

/// Fixed resampling seed for the balanced policy, so repeated runs
/// reproduce identical subsets.
const BALANCED_RESAMPLE_SEED: u64 = 0;

/// Whether `name` has a known artifact directory.
pub fn is_known_attack(name: &str) -> bool {
    ATTACK_REGISTRY.contains(&name) || EXTRA_ATTACKS.contains(&name)
}

fn known_attacks_list() -> String {
    ATTACK_REGISTRY.iter().chain(EXTRA_ATTACKS.iter()).copied().collect::<Vec<_>>().join(", ")
}

/// How the adversarial training and test sets are assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackPolicy {
    /// One named attack's artifacts.
    Single(String),
    /// Concatenation of every attack in the registry.
    All,
    /// Concatenation of a user-listed subset.
    Combine(Vec<String>),
    /// Proportional with-replacement resampling of a user-listed subset to a
    /// fixed total.
    Balanced(Vec<String>, Vec<u32>),
}

impl AttackPolicy {
    /// Build a policy from the raw CLI surface.
    ///
    /// `attack` is a single attack name, `all`, or `combine`; `list` is the
    /// underscore-separated subset for `combine`; `balanced` the optional
    /// underscore-separated integer ratios. Unknown names are fatal before
    /// any training state is created.
    pub fn from_args(attack: &str, list: &str, balanced: Option<&str>) -> Result<Self> {
        match attack {
            "all" => Ok(Self::All),
            "combine" => {
                let names: Vec<String> = list.split('_').map(str::to_string).collect();
                for name in &names {
                    if !is_known_attack(name) {
                        return Err(Error::UnknownAttack {
                            name: name.clone(),
                            known: known_attacks_list(),
                        });
                    }
                }
                match balanced {
                    None => Ok(Self::Combine(names)),
                    Some(spec) => {
                        let ratios: Vec<u32> = spec
                            .split('_')
                            .map(|part| {
                                part.parse().map_err(|_| {
                                    Error::config(
                                        "balanced",
                                        format!("'{part}' is not a non-negative integer"),
                                    )
                                })
                            })
                            .collect::<Result<_>>()?;
                        if ratios.len() != names.len() {
                            return Err(Error::config(
                                "balanced",
                                format!(
                                    "{} ratios for {} attacks; counts must match",
                                    ratios.len(),
                                    names.len()
                                ),
                            ));
                        }
                        if ratios.iter().sum::<u32>() == 0 {
                            return Err(Error::config("balanced", "ratios must not all be zero"));
                        }
                        Ok(Self::Balanced(names, ratios))
                    }
                }
            }
            name if is_known_attack(name) => Ok(Self::Single(name.to_string())),
            name => {
                Err(Error::UnknownAttack { name: name.to_string(), known: known_attacks_list() })
            }
        }
    }

    /// How many times the clean training set must be tiled so positional
    /// pairing covers the assembled adversarial set.
    pub fn clean_tile_factor(&self) -> usize {
        match self {
            Self::Single(_) | Self::Balanced(..) => 1,
            Self::All => ATTACK_REGISTRY.len(),
            Self::Combine(names) => names.len(),
        }
    }

    /// Load and combine artifacts into `(train, test)` adversarial sets.
    ///
    /// `balanced_total` is the whole training-set size the balanced policy
    /// resamples to; per-attack counts are `floor(p_i * total)` with the last
    /// attack absorbing the remainder so the sum is exact.
    pub fn assemble(
        &self,
        data_dir: &Path,
        balanced_total: usize,
    ) -> Result<(ExampleSet, ExampleSet)> {
        match self {
            Self::Single(name) => load_attack(data_dir, name),
            Self::All => concat_attacks(data_dir, &registry_names()),
            Self::Combine(names) => concat_attacks(data_dir, names),
            Self::Balanced(names, ratios) => {
                let counts = balanced_counts(ratios, balanced_total);
                let mut train: Option<ExampleSet> = None;
                let mut test: Option<ExampleSet> = None;
                for (name, &n) in names.iter().zip(counts.iter()) {
                    let (attack_train, attack_test) = load_attack(data_dir, name)?;
                    let attack_train = attack_train.resample(n, BALANCED_RESAMPLE_SEED);
                    let attack_test = attack_test.resample(n, BALANCED_RESAMPLE_SEED);
                    extend(&mut train, attack_train)?;
                    extend(&mut test, attack_test)?;
                }
                Ok((
                    train.expect("balanced policy has at least one attack"),
                    test.expect("balanced policy has at least one attack"),
                ))
            }
        }
    }
}

/// Per-attack resample counts for the balanced policy.
///
/// Proportions are the normalized ratios; every attack but the last gets
/// `floor(p_i * total)` and the last absorbs the remainder.
pub fn balanced_counts(ratios: &[u32], total: usize) -> Vec<usize> {
    let sum: u32 = ratios.iter().sum();
    let mut counts = Vec::with_capacity(ratios.len());
    let mut assigned = 0usize;
    for (i, &r) in ratios.iter().enumerate() {
        if i + 1 == ratios.len() {
            counts.push(total - assigned);
        } else {
            let n = (f64::from(r) / f64::from(sum) * total as f64).floor() as usize;
            counts.push(n);
            assigned += n;
        }
    }
    counts
}

/// Path of one attack split artifact: `<data_dir>/adv_examples/<attack>/<split>.safetensors`.
pub fn artifact_path(data_dir: &Path, attack: &str, split: &str) -> PathBuf {
    data_dir.join("adv_examples").join(attack).join(format!("{split}.safetensors"))
}

fn registry_names() -> Vec<String> {
    ATTACK_REGISTRY.iter().map(|s| s.to_string()).collect()
}

fn load_attack(data_dir: &Path, name: &str) -> Result<(ExampleSet, ExampleSet)> {
    let train = ExampleSet::load(&artifact_path(data_dir, name, "train"), ADV_IMAGE_KEY)?;
    let test = ExampleSet::load(&artifact_path(data_dir, name, "test"), ADV_IMAGE_KEY)?;
    Ok((train, test))
}

fn concat_attacks(data_dir: &Path, names: &[String]) -> Result<(ExampleSet, ExampleSet)> {
    let mut train: Option<ExampleSet> = None;
    let mut test: Option<ExampleSet> = None;
    for name in names {
        let (attack_train, attack_test) = load_attack(data_dir, name)?;
        extend(&mut train, attack_train)?;
        extend(&mut test, attack_test)?;
    }
    match (train, test) {
        (Some(train), Some(test)) => Ok((train, test)),
        _ => Err(Error::config("attack", "policy selected no attacks")),
    }
}

fn extend(acc: &mut Option<ExampleSet>, set: ExampleSet) -> Result<()> {
    match acc {
        Some(existing) => existing.append(&set),
        None => {
            *acc = Some(set);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array4};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn write_attack(dir: &Path, name: &str, n: usize, label_base: i64) {
        let attack_dir = dir.join("adv_examples").join(name);
        std::fs::create_dir_all(&attack_dir).unwrap();
        for split in ["train", "test"] {
            let images = Array4::from_shape_fn((n, 1, 2, 2), |(i, _, _, _)| i as f32);
            let labels = Array1::from_iter((0..n as i64).map(|i| label_base + i));
            let set = ExampleSet::new(images, labels).unwrap();
            set.save(&attack_dir.join(format!("{split}.safetensors")), ADV_IMAGE_KEY).unwrap();
        }
    }

    #[test]
    fn test_unknown_attack_is_fatal() {
        let err = AttackPolicy::from_args("ddn", "", None).unwrap_err();
        assert!(matches!(err, Error::UnknownAttack { .. }));
    }

    #[test]
    fn test_unknown_name_in_combine_list_is_fatal() {
        let err = AttackPolicy::from_args("combine", "pgd_ddn", None).unwrap_err();
        assert!(matches!(err, Error::UnknownAttack { .. }));
    }

    #[test]
    fn test_single_and_extra_attacks_parse() {
        assert_eq!(
            AttackPolicy::from_args("pgd", "", None).unwrap(),
            AttackPolicy::Single("pgd".into())
        );
        assert_eq!(
            AttackPolicy::from_args("tpgd", "", None).unwrap(),
            AttackPolicy::Single("tpgd".into())
        );
    }

    #[test]
    fn test_balanced_requires_matching_counts() {
        let err = AttackPolicy::from_args("combine", "pgd_fgsm", Some("9_1_1")).unwrap_err();
        assert!(matches!(err, Error::ConfigValue { .. }));
    }

    #[test]
    fn test_tile_factors() {
        assert_eq!(AttackPolicy::from_args("pgd", "", None).unwrap().clean_tile_factor(), 1);
        assert_eq!(AttackPolicy::All.clean_tile_factor(), ATTACK_REGISTRY.len());
        assert_eq!(
            AttackPolicy::from_args("combine", "pgd_fgsm_bim", None).unwrap().clean_tile_factor(),
            3
        );
        assert_eq!(
            AttackPolicy::from_args("combine", "pgd_fgsm", Some("9_1"))
                .unwrap()
                .clean_tile_factor(),
            1
        );
    }

    #[test]
    fn test_combine_concatenates_in_list_order() {
        let dir = TempDir::new().unwrap();
        write_attack(dir.path(), "pgd", 3, 0);
        write_attack(dir.path(), "fgsm", 2, 100);
        let policy = AttackPolicy::from_args("combine", "pgd_fgsm", None).unwrap();
        let (train, test) = policy.assemble(dir.path(), 0).unwrap();
        assert_eq!(train.len(), 5);
        assert_eq!(test.len(), 5);
        assert_eq!(train.labels.to_vec(), vec![0, 1, 2, 100, 101]);
    }

    #[test]
    fn test_balanced_counts_sum_exactly() {
        assert_eq!(balanced_counts(&[9, 1, 1], 50_000), vec![40_909, 4_545, 4_546]);
        assert_eq!(balanced_counts(&[1, 1], 5), vec![2, 3]);
        assert_eq!(balanced_counts(&[1], 7), vec![7]);
    }

    #[test]
    fn test_balanced_assembly_is_reproducible() {
        let dir = TempDir::new().unwrap();
        write_attack(dir.path(), "pgd", 8, 0);
        write_attack(dir.path(), "fgsm", 8, 100);
        let policy = AttackPolicy::from_args("combine", "pgd_fgsm", Some("3_1")).unwrap();
        let (a_train, _) = policy.assemble(dir.path(), 12).unwrap();
        let (b_train, _) = policy.assemble(dir.path(), 12).unwrap();
        assert_eq!(a_train.len(), 12);
        assert_eq!(a_train.labels, b_train.labels);
    }

    #[test]
    fn test_missing_artifact_is_fatal() {
        let dir = TempDir::new().unwrap();
        let policy = AttackPolicy::Single("pgd".into());
        let err = policy.assemble(dir.path(), 0).unwrap_err();
        assert!(matches!(err, Error::ArtifactNotFound { .. }));
    }

    proptest! {
        #[test]
        fn prop_balanced_counts_always_sum_to_total(
            ratios in proptest::collection::vec(1u32..100, 1..8),
            total in 1usize..100_000,
        ) {
            let counts = balanced_counts(&ratios, total);
            prop_assert_eq!(counts.iter().sum::<usize>(), total);
            prop_assert_eq!(counts.len(), ratios.len());
        }
    }
}
