//! Orchestrator Engine - Generation Loop
//!
//! Improves a seed policy over several generations by rollout search:
//! - State sampling (simulate under the current policy)
//! - Action search (sequential halving over rollouts)
//! - Training (external trainer, opaque evaluator back)
//! - Persistence (external store, one policy per generation plus a manifest)
//! - Event logging (complete record of the run)
//!
//! # Architecture
//!
//! ```text
//! For each generation g in 1..=num_gens:
//! 1. g ≤ resume_gen → load policy g from the store, done
//! 2. Pick the sampling policy (current, or the seed with retrain_lastgen_only)
//! 3. Sample N decision states under it
//! 4. Search each state with M rollouts of horizon H → (features, target)
//! 5. Train → evaluator → policy "gen{g}"
//! 6. Save evaluator to output_dir/{model identifier}_gen{g}, update manifest
//! 7. The new policy becomes current
//! ```
//!
//! # Determinism
//!
//! Every generation derives its own seed from `base_seed`; sample `i` of a
//! generation always runs on ordinal `i`, and its search on an ordinal range
//! of its own. Samples are produced in parallel and collected in index order,
//! so the sample list is identical for any thread count.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ImprovementConfig::from_value(&json!({
//!     "N": 2000, "M": 500, "H": 40, "num_gens": 3,
//!     "output_dir": "policies"
//! }))?;
//!
//! let seed_policy = model.get_policy("base_stock")?;
//! let mut improver = PolicyImprover::new(model, seed_policy, config, trainer, store)?;
//!
//! for report in improver.run()? {
//!     println!("gen {}: {} samples, {} rollouts", report.generation,
//!              report.num_samples, report.rollouts_used);
//! }
//! let policies = improver.policies(); // seed, gen1, gen2, gen3
//! ```

use crate::core::{SimError, SimResult, StateCategory};
use crate::erasure::{Simulatable, SimulatableHandle};
use crate::events::{Event, EventLog};
use crate::models::Trajectory;
use crate::orchestrator::checkpoint::{compute_config_hash, GenerationManifest};
use crate::policy::{Policy, PolicyEvaluator, PolicyHandle};
use crate::rng::RandomStream;
use crate::rollout::{RolloutConfig, RolloutEvaluator};
use crate::search::{SearchConfig, SequentialHalvingSearch, TargetKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Stream key of the per-sample epoch draw (disjoint from trajectory streams)
const SAMPLE_EPOCHS_KEY: u64 = u64::MAX;

/// Salt separating rollout seeds from sampling seeds
const ROLLOUT_SEED_SALT: u64 = 0xA076_1D64_78BD_642F;

/// Restarts allowed while looking for a decision state
const MAX_SAMPLE_RESTARTS: usize = 1000;

/// Epochs allowed while advancing to the next non-trivial decision
const MAX_EPOCHS_TO_DECISION: usize = 10_000;

// ============================================================================
// External Collaborators
// ============================================================================

/// One training example: state features and the searched target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub features: Vec<f64>,

    /// Distribution over `0..valid_action_count`
    pub target: Vec<f64>,
}

/// Function-approximator trainer
///
/// The core never looks inside the returned evaluator.
pub trait PolicyTrainer: Send + Sync {
    /// Fit a policy to `samples`
    ///
    /// # Errors
    /// Any error; it is propagated unchanged (typically `SimError::Trainer`).
    fn train(
        &self,
        model: &dyn Simulatable,
        samples: &[TrainingSample],
        generation: usize,
    ) -> SimResult<Arc<dyn PolicyEvaluator>>;
}

/// Persistence of trained evaluators
///
/// Paths carry no extension; the store decides the on-disk format.
pub trait PolicyStore: Send + Sync {
    fn save(&self, evaluator: &dyn PolicyEvaluator, path: &str) -> SimResult<()>;

    fn load(&self, model: &dyn Simulatable, path: &str) -> SimResult<Arc<dyn PolicyEvaluator>>;

    /// Persist the run manifest; stores without manifest support ignore it
    fn save_manifest(&self, manifest: &GenerationManifest, path: &str) -> SimResult<()> {
        let _ = (manifest, path);
        Ok(())
    }

    fn load_manifest(&self, path: &str) -> SimResult<Option<GenerationManifest>> {
        let _ = path;
        Ok(None)
    }
}

// ============================================================================
// Configuration
// ============================================================================

fn default_num_samples() -> usize {
    5000
}

fn default_budget() -> usize {
    1000
}

fn default_horizon() -> usize {
    40
}

fn default_num_gens() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_max_sample_epochs() -> usize {
    100
}

/// Generation loop configuration
///
/// Field names of the search parameters follow the short names `N`, `M`,
/// `H`, `L` in serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementConfig {
    /// Samples per generation
    #[serde(rename = "N", default = "default_num_samples")]
    pub num_samples: usize,

    /// Rollout budget per sampled state
    #[serde(rename = "M", default = "default_budget")]
    pub budget: usize,

    /// Rollout horizon in epochs
    #[serde(rename = "H", default = "default_horizon")]
    pub horizon: usize,

    /// Warm-up epochs excluded from rollout scores
    #[serde(rename = "L", default)]
    pub warmup: usize,

    #[serde(default = "default_num_gens")]
    pub num_gens: usize,

    #[serde(default = "default_true")]
    pub enable_sequential_halving: bool,

    /// Always sample (and continue rollouts) with the seed policy
    #[serde(default)]
    pub retrain_lastgen_only: bool,

    /// Generations `1..=resume_gen` are loaded from the store
    #[serde(default)]
    pub resume_gen: usize,

    /// Sample states lie `0..max_sample_epochs` epochs into a trajectory
    #[serde(default = "default_max_sample_epochs")]
    pub max_sample_epochs: usize,

    #[serde(default)]
    pub base_seed: u64,

    #[serde(default)]
    pub target_kind: TargetKind,

    /// Directory prefix of saved policies (no trailing separator needed)
    #[serde(default)]
    pub output_dir: String,

    /// Trainer settings, passed through untouched
    #[serde(default)]
    pub trainer: Value,
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            num_samples: default_num_samples(),
            budget: default_budget(),
            horizon: default_horizon(),
            warmup: 0,
            num_gens: default_num_gens(),
            enable_sequential_halving: true,
            retrain_lastgen_only: false,
            resume_gen: 0,
            max_sample_epochs: default_max_sample_epochs(),
            base_seed: 0,
            target_kind: TargetKind::default(),
            output_dir: String::new(),
            trainer: Value::Null,
        }
    }
}

impl ImprovementConfig {
    /// Parse from an already-parsed JSON value; missing fields take defaults
    pub fn from_value(value: &Value) -> SimResult<Self> {
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| SimError::Configuration(format!("invalid improvement config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.num_samples == 0 {
            return Err(SimError::Configuration("N must be > 0".to_string()));
        }
        if self.budget == 0 {
            return Err(SimError::Configuration("M must be > 0".to_string()));
        }
        if self.warmup > self.horizon {
            return Err(SimError::Configuration(format!(
                "L ({}) must not exceed H ({})",
                self.warmup, self.horizon
            )));
        }
        if self.resume_gen > self.num_gens {
            return Err(SimError::Configuration(format!(
                "resume_gen ({}) must not exceed num_gens ({})",
                self.resume_gen, self.num_gens
            )));
        }
        Ok(())
    }

    pub fn rollout_config(&self, base_seed: u64) -> RolloutConfig {
        RolloutConfig {
            horizon: self.horizon,
            warmup: self.warmup,
            base_seed,
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            budget: self.budget,
            enable_sequential_halving: self.enable_sequential_halving,
            target_kind: self.target_kind,
        }
    }
}

/// Parameters that change the samples a generation produces
#[derive(Serialize)]
struct SamplingFingerprint<'a> {
    n: usize,
    m: usize,
    h: usize,
    l: usize,
    enable_sequential_halving: bool,
    retrain_lastgen_only: bool,
    max_sample_epochs: usize,
    base_seed: u64,
    target_kind: TargetKind,
    trainer: &'a Value,
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generation: usize,
    pub policy_id: String,

    /// Store path of the generation's policy
    pub path: String,

    /// True if the policy was loaded instead of trained
    pub loaded: bool,

    pub num_samples: usize,
    pub rollouts_used: usize,

    /// Mean number of search rounds per sample
    pub mean_rounds: f64,
}

/// Sample statistics of one generation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampleStats {
    pub rollouts_used: usize,
    pub mean_rounds: f64,
}

// ============================================================================
// Policy Improver
// ============================================================================

/// Generation loop driving sampling, search, training and persistence
pub struct PolicyImprover {
    model: SimulatableHandle,
    seed_policy: PolicyHandle,
    config: ImprovementConfig,
    trainer: Arc<dyn PolicyTrainer>,
    store: Arc<dyn PolicyStore>,

    /// Seed policy followed by one policy per completed generation
    policies: Vec<PolicyHandle>,

    event_log: EventLog,
}

impl PolicyImprover {
    /// Create a generation loop
    ///
    /// # Errors
    /// - `Configuration` if the config is invalid
    /// - `ContractViolation` if the seed policy was issued by another model
    /// - `UnsupportedOperation` if the model does not encode features
    pub fn new(
        model: SimulatableHandle,
        seed_policy: PolicyHandle,
        config: ImprovementConfig,
        trainer: Arc<dyn PolicyTrainer>,
        store: Arc<dyn PolicyStore>,
    ) -> SimResult<Self> {
        config.validate()?;

        if seed_policy.owner() != model.owner() {
            return Err(SimError::ContractViolation(format!(
                "seed policy \"{}\" was not issued by model \"{}\"",
                seed_policy.identifier(),
                model.identifier()
            )));
        }

        let mut probe = Vec::new();
        model.features(&model.initial_state(), &mut probe)?;

        Ok(Self {
            model,
            policies: vec![seed_policy.clone()],
            seed_policy,
            config,
            trainer,
            store,
            event_log: EventLog::new(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &ImprovementConfig {
        &self.config
    }

    pub fn model(&self) -> &SimulatableHandle {
        &self.model
    }

    /// Seed policy followed by the policy of every completed generation
    pub fn policies(&self) -> &[PolicyHandle] {
        &self.policies
    }

    /// Policy of `generation` (0 = seed policy)
    pub fn policy(&self, generation: usize) -> Option<&PolicyHandle> {
        self.policies.get(generation)
    }

    /// Most recent policy
    pub fn current_policy(&self) -> &PolicyHandle {
        self.policies.last().unwrap_or(&self.seed_policy)
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Store path of `generation`'s policy, without extension
    pub fn policy_path(&self, generation: usize) -> String {
        self.output_path(&format!("{}_gen{}", self.model.identifier(), generation))
    }

    pub fn manifest_path(&self) -> String {
        self.output_path(&format!("{}_manifest", self.model.identifier()))
    }

    fn output_path(&self, name: &str) -> String {
        Path::new(&self.config.output_dir)
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    /// Seed of generation `generation`
    fn generation_seed(&self, generation: usize) -> u64 {
        RandomStream::for_stream(self.config.base_seed, generation as u64, SAMPLE_EPOCHS_KEY)
            .next()
    }

    fn sampling_hash(&self) -> SimResult<String> {
        let c = &self.config;
        compute_config_hash(&SamplingFingerprint {
            n: c.num_samples,
            m: c.budget,
            h: c.horizon,
            l: c.warmup,
            enable_sequential_halving: c.enable_sequential_halving,
            retrain_lastgen_only: c.retrain_lastgen_only,
            max_sample_epochs: c.max_sample_epochs,
            base_seed: c.base_seed,
            target_kind: c.target_kind,
            trainer: &c.trainer,
        })
    }

    fn log_event(&mut self, event: Event) {
        self.event_log.log(event);
    }

    // ========================================================================
    // Generation Loop
    // ========================================================================

    /// Run all generations
    ///
    /// Restarts from the seed policy on every call. Trainer and store errors
    /// are returned unchanged; generations completed before the error stay
    /// available through [`policies`](Self::policies).
    pub fn run(&mut self) -> SimResult<Vec<GenerationReport>> {
        let sampling_hash = self.sampling_hash()?;
        let manifest_path = self.manifest_path();

        let mut manifest = match self.config.resume_gen {
            0 => None,
            resume_gen => {
                let stored = self.store.load_manifest(&manifest_path)?;
                if let Some(stored) = &stored {
                    stored.validate_resume(self.model.config_hash(), &sampling_hash, resume_gen)?;
                }
                stored
            }
        }
        .unwrap_or_else(|| {
            GenerationManifest::new(
                self.model.identifier(),
                self.model.config_hash(),
                &sampling_hash,
            )
        });

        self.policies.truncate(1);
        let mut reports = Vec::with_capacity(self.config.num_gens);

        for generation in 1..=self.config.num_gens {
            let report = if generation <= self.config.resume_gen {
                self.load_generation(generation)?
            } else {
                self.train_generation(generation)?
            };

            manifest.record_generation(generation, &report.path);
            self.store.save_manifest(&manifest, &manifest_path)?;
            self.log_event(Event::ManifestSaved {
                generations_completed: manifest.generations_completed,
            });

            reports.push(report);
        }

        Ok(reports)
    }

    fn load_generation(&mut self, generation: usize) -> SimResult<GenerationReport> {
        let path = self.policy_path(generation);
        let policy_id = format!("gen{}", generation);

        let evaluator = self.store.load(self.model.as_ref(), &path)?;
        let policy = self.model.policy_from_evaluator(&policy_id, evaluator)?;
        self.policies.push(policy);

        tracing::info!(generation, path = %path, "loaded policy from previous run");
        self.log_event(Event::PolicyLoaded {
            generation,
            policy_id: policy_id.clone(),
            path: path.clone(),
        });

        Ok(GenerationReport {
            generation,
            policy_id,
            path,
            loaded: true,
            num_samples: 0,
            rollouts_used: 0,
            mean_rounds: 0.0,
        })
    }

    fn train_generation(&mut self, generation: usize) -> SimResult<GenerationReport> {
        let sampling = if self.config.retrain_lastgen_only {
            self.seed_policy.clone()
        } else {
            self.current_policy().clone()
        };

        tracing::info!(
            generation,
            model = self.model.identifier(),
            sampling_policy = sampling.identifier(),
            samples = self.config.num_samples,
            "starting generation"
        );
        self.log_event(Event::GenerationStarted {
            generation,
            sampling_policy: sampling.identifier().to_string(),
        });

        let (samples, stats) = self.generate_samples(sampling.as_ref(), generation)?;
        self.log_event(Event::SamplesGenerated {
            generation,
            num_samples: samples.len(),
            rollouts_used: stats.rollouts_used,
            mean_rounds: stats.mean_rounds,
        });

        let policy_id = format!("gen{}", generation);
        let evaluator = self
            .trainer
            .train(self.model.as_ref(), &samples, generation)?;
        let policy = self
            .model
            .policy_from_evaluator(&policy_id, evaluator.clone())?;
        self.log_event(Event::PolicyTrained {
            generation,
            policy_id: policy_id.clone(),
        });

        let path = self.policy_path(generation);
        self.store.save(evaluator.as_ref(), &path)?;
        self.log_event(Event::PolicySaved {
            generation,
            policy_id: policy_id.clone(),
            path: path.clone(),
        });
        tracing::info!(
            generation,
            path = %path,
            rollouts = stats.rollouts_used,
            "generation trained and saved"
        );

        self.policies.push(policy);

        Ok(GenerationReport {
            generation,
            policy_id,
            path,
            loaded: false,
            num_samples: samples.len(),
            rollouts_used: stats.rollouts_used,
            mean_rounds: stats.mean_rounds,
        })
    }

    // ========================================================================
    // Sampling
    // ========================================================================

    /// Produce the training samples of `generation` under `sampling`
    ///
    /// `sampling` drives the trajectories to the sampled states and continues
    /// every rollout of the search.
    pub fn generate_samples(
        &self,
        sampling: &dyn Policy,
        generation: usize,
    ) -> SimResult<(Vec<TrainingSample>, SampleStats)> {
        let generation_seed = self.generation_seed(generation);
        let evaluator = RolloutEvaluator::new(
            self.model.clone(),
            self.config
                .rollout_config(generation_seed ^ ROLLOUT_SEED_SALT),
        )?;
        let search = SequentialHalvingSearch::new(evaluator, self.config.search_config())?;

        let results = (0..self.config.num_samples as u64)
            .into_par_iter()
            .map(|index| self.sample_one(&search, sampling, generation_seed, index))
            .collect::<SimResult<Vec<(TrainingSample, usize, usize)>>>()?;

        let mut stats = SampleStats::default();
        let mut total_rounds = 0;
        let mut samples = Vec::with_capacity(results.len());
        for (sample, rollouts, rounds) in results {
            stats.rollouts_used += rollouts;
            total_rounds += rounds;
            samples.push(sample);
        }
        if !samples.is_empty() {
            stats.mean_rounds = total_rounds as f64 / samples.len() as f64;
        }

        tracing::debug!(
            generation,
            samples = samples.len(),
            rollouts = stats.rollouts_used,
            "samples generated"
        );
        Ok((samples, stats))
    }

    /// One sample: returns the sample, rollouts spent and search rounds
    fn sample_one(
        &self,
        search: &SequentialHalvingSearch,
        sampling: &dyn Policy,
        generation_seed: u64,
        index: u64,
    ) -> SimResult<(TrainingSample, usize, usize)> {
        let model = self.model.as_ref();
        let mut traj = [model.seeded_trajectory(generation_seed, index)];
        model.initiate_state(&mut traj)?;

        let epochs = match self.config.max_sample_epochs {
            0 => 0,
            max => RandomStream::for_stream(generation_seed, index, SAMPLE_EPOCHS_KEY)
                .range(0, max as i64) as usize,
        };

        let mut restarts = 0;
        let mut restart = |traj: &mut [Trajectory; 1]| -> SimResult<()> {
            restarts += 1;
            if restarts > MAX_SAMPLE_RESTARTS {
                return Err(SimError::Configuration(format!(
                    "model \"{}\" did not reach a decision with several allowed actions \
                     within {} restarts",
                    model.identifier(),
                    MAX_SAMPLE_RESTARTS
                )));
            }
            model.initiate_state(traj)
        };

        // Simulate `epochs` epochs under the sampling policy
        let mut elapsed = 0;
        while elapsed < epochs {
            let before = traj[0].epoch_count;
            match traj[0].category {
                StateCategory::Final | StateCategory::EndOfHorizon => {
                    restart(&mut traj)?;
                    continue;
                }
                StateCategory::AwaitEvent(_) => {
                    model.incorporate_event(&mut traj)?;
                }
                StateCategory::AwaitAction(_) => {
                    model.incorporate_action_with(&mut traj, sampling)?
                }
            }
            elapsed += traj[0].epoch_count - before;
        }

        // Then on to the next decision that is not forced
        loop {
            let limit = traj[0].epoch_count.saturating_add(MAX_EPOCHS_TO_DECISION);
            if model.incorporate_until_nontrivial_action(&mut traj, limit)? {
                break;
            }
            restart(&mut traj)?;
        }

        let state = traj[0].state()?;
        let mut features = Vec::new();
        model.features(state, &mut features)?;

        let result = search.search(state, sampling, index << 32)?;
        Ok((
            TrainingSample {
                features,
                target: result.target,
            },
            result.rollouts_used,
            result.rounds,
        ))
    }
}
