//! Shared test models and collaborators
//!
//! - `Inventory`: lost-sales inventory with uniform demand, features, JSON
//!   states and a `base_stock` policy
//! - `FixedCost`: one decision with a fixed cost per action, then `Final`
//! - `Repeat`: decisions forever, no events
//! - `TwoStreams`: two events drawn from two different event streams
//! - `Stuck`: after one action, a decision state without allowed actions
//! - `MeanTargetTrainer` / `FailingTrainer`: stand-ins for a real trainer
//! - `MemoryStore`: in-memory policy store with manifest support

#![allow(dead_code)]

use decision_simulator_core_rs::modelling::DiscreteDist;
use decision_simulator_core_rs::orchestrator::{
    GenerationManifest, PolicyStore, PolicyTrainer, TrainingSample,
};
use decision_simulator_core_rs::{
    HorizonType, Mdp, ModelAdapter, ModelPolicy, PolicyEvaluator, PolicyRegistry, RandomStream,
    SimError, SimResult, Simulatable, SimulatableHandle, StateCategory, StaticInfo,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// Inventory Model
// ============================================================================

fn default_holding() -> f64 {
    1.0
}

fn default_penalty() -> f64 {
    4.0
}

fn default_max_demand() -> i64 {
    4
}

fn default_discount() -> f64 {
    0.95
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub max_order: i64,

    #[serde(default = "default_holding")]
    pub holding: f64,

    #[serde(default = "default_penalty")]
    pub penalty: f64,

    /// Demand is uniform on `0..=max_demand`
    #[serde(default = "default_max_demand")]
    pub max_demand: i64,

    #[serde(default = "default_discount")]
    pub discount: f64,
}

pub fn inventory_config() -> InventoryConfig {
    InventoryConfig {
        max_order: 3,
        holding: default_holding(),
        penalty: default_penalty(),
        max_demand: default_max_demand(),
        discount: default_discount(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryState {
    pub on_hand: i64,
    pub awaiting_demand: bool,
}

/// Periodic-review lost-sales inventory, capacity `2 × max_order`
pub struct Inventory {
    config: InventoryConfig,
    demand: DiscreteDist,
}

impl Inventory {
    pub fn capacity(&self) -> i64 {
        2 * self.config.max_order
    }
}

impl Mdp for Inventory {
    const TYPE_ID: &'static str = "inventory";
    type Config = InventoryConfig;
    type State = InventoryState;
    type Event = i64;

    fn from_config(config: &InventoryConfig) -> SimResult<Self> {
        if config.max_order < 1 {
            return Err(SimError::Configuration(format!(
                "max_order must be >= 1, got {}",
                config.max_order
            )));
        }
        Ok(Inventory {
            config: config.clone(),
            demand: DiscreteDist::uniform(0, config.max_demand)?,
        })
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo::new((self.config.max_order + 1) as usize)
            .with_discount_factor(self.config.discount)
            .with_num_features(1)
    }

    fn initial_state(&self) -> InventoryState {
        InventoryState {
            on_hand: 0,
            awaiting_demand: false,
        }
    }

    fn random_initial_state(&self, rng: &mut RandomStream) -> InventoryState {
        InventoryState {
            on_hand: rng.range(0, self.capacity() + 1),
            awaiting_demand: false,
        }
    }

    fn sample_event(&self, rng: &mut RandomStream) -> i64 {
        self.demand.sample(rng)
    }

    fn apply_event(&self, state: &mut InventoryState, demand: &i64) -> f64 {
        let sold = state.on_hand.min(*demand);
        let lost = demand - sold;
        state.on_hand -= sold;
        state.awaiting_demand = false;
        self.config.holding * state.on_hand as f64 + self.config.penalty * lost as f64
    }

    fn apply_action(&self, state: &mut InventoryState, action: i64) -> f64 {
        state.on_hand += action;
        state.awaiting_demand = true;
        0.0
    }

    fn classify(&self, state: &InventoryState) -> StateCategory {
        if state.awaiting_demand {
            StateCategory::await_event()
        } else {
            StateCategory::await_action()
        }
    }

    fn allowed_actions(&self, state: &InventoryState) -> Vec<i64> {
        let room = (self.capacity() - state.on_hand).max(0);
        (0..=self.config.max_order.min(room)).collect()
    }

    fn register_policies(&self, registry: &mut PolicyRegistry<Self>) {
        registry.register(
            "base_stock",
            "order up to a base-stock level (parameter \"level\")",
            |mdp: &Arc<Inventory>, config: &Value| {
                let level = config
                    .get("level")
                    .and_then(Value::as_i64)
                    .unwrap_or(mdp.config.max_order);
                Ok(BaseStockPolicy {
                    mdp: mdp.clone(),
                    level,
                })
            },
        );
    }

    fn features(&self, state: &InventoryState, out: &mut Vec<f64>) -> SimResult<()> {
        out.push(state.on_hand as f64);
        Ok(())
    }

    fn state_to_json(&self, state: &InventoryState) -> SimResult<Value> {
        Ok(json!({
            "on_hand": state.on_hand,
            "awaiting_demand": state.awaiting_demand,
        }))
    }

    fn state_from_json(&self, value: &Value) -> SimResult<InventoryState> {
        let on_hand = value
            .get("on_hand")
            .and_then(Value::as_i64)
            .ok_or_else(|| SimError::Serialization("missing on_hand".to_string()))?;
        let awaiting_demand = value
            .get("awaiting_demand")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(InventoryState {
            on_hand,
            awaiting_demand,
        })
    }
}

pub struct BaseStockPolicy {
    mdp: Arc<Inventory>,
    level: i64,
}

impl ModelPolicy<Inventory> for BaseStockPolicy {
    fn get_action(&self, state: &InventoryState, _rng: &mut RandomStream) -> SimResult<i64> {
        let allowed = self.mdp.allowed_actions(state);
        let target = (self.level - state.on_hand).max(0);
        allowed
            .iter()
            .copied()
            .filter(|&a| a <= target)
            .max()
            .or_else(|| allowed.first().copied())
            .ok_or_else(|| SimError::NoAllowedActions("base_stock".to_string()))
    }
}

pub fn inventory_with(config: &InventoryConfig) -> SimulatableHandle {
    ModelAdapter::<Inventory>::new(config).unwrap().into_shared()
}

pub fn inventory() -> SimulatableHandle {
    inventory_with(&inventory_config())
}

/// Inventory without demand: every event costs `on_hand`, undiscounted
pub fn idle_inventory() -> SimulatableHandle {
    inventory_with(&InventoryConfig {
        max_order: 3,
        holding: 1.0,
        penalty: 0.0,
        max_demand: 0,
        discount: 1.0,
    })
}

// ============================================================================
// Fixed Cost Model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedCostConfig {
    pub costs: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixedCostState {
    pub chosen: Option<i64>,
}

/// A single decision: action `a` costs `costs[a]` and ends the trajectory
pub struct FixedCost {
    costs: Vec<f64>,
}

impl Mdp for FixedCost {
    const TYPE_ID: &'static str = "fixed_cost";
    type Config = FixedCostConfig;
    type State = FixedCostState;
    type Event = ();

    fn from_config(config: &FixedCostConfig) -> SimResult<Self> {
        Ok(FixedCost {
            costs: config.costs.clone(),
        })
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo::new(self.costs.len()).with_horizon(HorizonType::Finite)
    }

    fn initial_state(&self) -> FixedCostState {
        FixedCostState { chosen: None }
    }

    fn sample_event(&self, _rng: &mut RandomStream) {}

    fn apply_event(&self, _state: &mut FixedCostState, _event: &()) -> f64 {
        0.0
    }

    fn apply_action(&self, state: &mut FixedCostState, action: i64) -> f64 {
        state.chosen = Some(action);
        self.costs[action as usize]
    }

    fn classify(&self, state: &FixedCostState) -> StateCategory {
        match state.chosen {
            Some(_) => StateCategory::Final,
            None => StateCategory::await_action(),
        }
    }

    fn allowed_actions(&self, state: &FixedCostState) -> Vec<i64> {
        match state.chosen {
            Some(_) => Vec::new(),
            None => (0..self.costs.len() as i64).collect(),
        }
    }

    fn register_policies(&self, registry: &mut PolicyRegistry<Self>) {
        registry.register(
            "first",
            "always the lowest allowed action",
            |mdp: &Arc<FixedCost>, _config: &Value| Ok(FirstAction { mdp: mdp.clone() }),
        );
    }
}

pub struct FirstAction {
    mdp: Arc<FixedCost>,
}

impl ModelPolicy<FixedCost> for FirstAction {
    fn get_action(&self, state: &FixedCostState, _rng: &mut RandomStream) -> SimResult<i64> {
        self.mdp
            .allowed_actions(state)
            .first()
            .copied()
            .ok_or_else(|| SimError::NoAllowedActions("first".to_string()))
    }
}

pub fn fixed_cost(costs: &[f64]) -> SimulatableHandle {
    ModelAdapter::<FixedCost>::new(&FixedCostConfig {
        costs: costs.to_vec(),
    })
    .unwrap()
    .into_shared()
}

// ============================================================================
// Repeat Model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatConfig {
    pub costs: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatState {
    pub decisions: u64,
}

/// Always awaits an action and never emits an event
pub struct Repeat {
    costs: Vec<f64>,
}

impl Mdp for Repeat {
    const TYPE_ID: &'static str = "repeat";
    type Config = RepeatConfig;
    type State = RepeatState;
    type Event = ();

    fn from_config(config: &RepeatConfig) -> SimResult<Self> {
        Ok(Repeat {
            costs: config.costs.clone(),
        })
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo::new(self.costs.len())
            .with_discount_factor(0.9)
            .with_num_features(1)
    }

    fn initial_state(&self) -> RepeatState {
        RepeatState { decisions: 0 }
    }

    fn sample_event(&self, _rng: &mut RandomStream) {}

    fn apply_event(&self, _state: &mut RepeatState, _event: &()) -> f64 {
        0.0
    }

    fn apply_action(&self, state: &mut RepeatState, action: i64) -> f64 {
        state.decisions += 1;
        self.costs[action as usize]
    }

    fn classify(&self, _state: &RepeatState) -> StateCategory {
        StateCategory::await_action()
    }

    fn allowed_actions(&self, _state: &RepeatState) -> Vec<i64> {
        (0..self.costs.len() as i64).collect()
    }

    fn features(&self, state: &RepeatState, out: &mut Vec<f64>) -> SimResult<()> {
        out.push(state.decisions as f64);
        Ok(())
    }
}

pub fn repeat(costs: &[f64]) -> SimulatableHandle {
    ModelAdapter::<Repeat>::new(&RepeatConfig {
        costs: costs.to_vec(),
    })
    .unwrap()
    .into_shared()
}

// ============================================================================
// Two Streams Model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwoStreamsConfig {
    /// Ask for stream 2 in the second phase, which does not exist
    #[serde(default)]
    pub stray_stream: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwoStreamsState {
    pub phase: usize,
    /// `(stream, draw)` per incorporated event
    pub draws: Vec<(usize, u64)>,
}

/// One event on stream 0, then one on stream 1, then `Final`
pub struct TwoStreams {
    stray_stream: bool,
}

impl Mdp for TwoStreams {
    const TYPE_ID: &'static str = "two_streams";
    type Config = TwoStreamsConfig;
    type State = TwoStreamsState;
    type Event = (usize, u64);

    fn from_config(config: &TwoStreamsConfig) -> SimResult<Self> {
        Ok(TwoStreams {
            stray_stream: config.stray_stream,
        })
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo::new(1).with_event_streams(2)
    }

    fn initial_state(&self) -> TwoStreamsState {
        TwoStreamsState {
            phase: 0,
            draws: Vec::new(),
        }
    }

    fn sample_event(&self, rng: &mut RandomStream) -> (usize, u64) {
        (0, rng.next())
    }

    fn sample_event_on(&self, stream: usize, rng: &mut RandomStream) -> (usize, u64) {
        (stream, rng.next())
    }

    fn apply_event(&self, state: &mut TwoStreamsState, event: &(usize, u64)) -> f64 {
        state.draws.push(*event);
        state.phase += 1;
        1.0
    }

    fn apply_action(&self, _state: &mut TwoStreamsState, _action: i64) -> f64 {
        0.0
    }

    fn classify(&self, state: &TwoStreamsState) -> StateCategory {
        match state.phase {
            0 => StateCategory::AwaitEvent(0),
            1 if self.stray_stream => StateCategory::AwaitEvent(2),
            1 => StateCategory::AwaitEvent(1),
            _ => StateCategory::Final,
        }
    }

    fn allowed_actions(&self, _state: &TwoStreamsState) -> Vec<i64> {
        vec![0]
    }
}

pub fn two_streams(stray_stream: bool) -> SimulatableHandle {
    ModelAdapter::<TwoStreams>::new(&TwoStreamsConfig { stray_stream })
        .unwrap()
        .into_shared()
}

// ============================================================================
// Stuck Model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StuckConfig {}

#[derive(Debug, Clone, PartialEq)]
pub struct StuckState {
    pub stuck: bool,
}

/// Two allowed actions at first; any action leads to a decision state that
/// allows none (a broken model)
pub struct Stuck;

impl Mdp for Stuck {
    const TYPE_ID: &'static str = "stuck";
    type Config = StuckConfig;
    type State = StuckState;
    type Event = ();

    fn from_config(_config: &StuckConfig) -> SimResult<Self> {
        Ok(Stuck)
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo::new(2)
    }

    fn initial_state(&self) -> StuckState {
        StuckState { stuck: false }
    }

    fn sample_event(&self, _rng: &mut RandomStream) {}

    fn apply_event(&self, _state: &mut StuckState, _event: &()) -> f64 {
        0.0
    }

    fn apply_action(&self, state: &mut StuckState, _action: i64) -> f64 {
        state.stuck = true;
        1.0
    }

    fn classify(&self, _state: &StuckState) -> StateCategory {
        StateCategory::await_action()
    }

    fn allowed_actions(&self, state: &StuckState) -> Vec<i64> {
        if state.stuck {
            Vec::new()
        } else {
            vec![0, 1]
        }
    }
}

pub fn stuck() -> SimulatableHandle {
    ModelAdapter::<Stuck>::new(&StuckConfig {})
        .unwrap()
        .into_shared()
}

// ============================================================================
// Trainers
// ============================================================================

/// Scores that ignore the features
pub struct ConstantEvaluator {
    pub scores: Vec<f64>,
}

impl PolicyEvaluator for ConstantEvaluator {
    fn evaluate(&self, _features: &[f64]) -> Vec<f64> {
        self.scores.clone()
    }
}

/// Fits the mean target and remembers what it was trained on
#[derive(Default)]
pub struct MeanTargetTrainer {
    pub calls: Mutex<Vec<(usize, Vec<TrainingSample>)>>,
}

impl MeanTargetTrainer {
    pub fn generations_trained(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(|(g, _)| *g).collect()
    }
}

impl PolicyTrainer for MeanTargetTrainer {
    fn train(
        &self,
        model: &dyn Simulatable,
        samples: &[TrainingSample],
        generation: usize,
    ) -> SimResult<Arc<dyn PolicyEvaluator>> {
        let mut scores = vec![0.0; model.valid_action_count()];
        for sample in samples {
            for (acc, t) in scores.iter_mut().zip(&sample.target) {
                *acc += t;
            }
        }
        if !samples.is_empty() {
            for score in scores.iter_mut() {
                *score /= samples.len() as f64;
            }
        }
        self.calls
            .lock()
            .unwrap()
            .push((generation, samples.to_vec()));
        Ok(Arc::new(ConstantEvaluator { scores }))
    }
}

pub struct FailingTrainer;

impl PolicyTrainer for FailingTrainer {
    fn train(
        &self,
        _model: &dyn Simulatable,
        _samples: &[TrainingSample],
        _generation: usize,
    ) -> SimResult<Arc<dyn PolicyEvaluator>> {
        Err(SimError::Trainer("trainer ran out of memory".to_string()))
    }
}

// ============================================================================
// Store
// ============================================================================

/// Keeps the scores of constant evaluators, keyed by path
#[derive(Default)]
pub struct MemoryStore {
    evaluators: Mutex<HashMap<String, Vec<f64>>>,
    manifests: Mutex<HashMap<String, GenerationManifest>>,
}

impl MemoryStore {
    pub fn saved_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.evaluators.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn manifest(&self, path: &str) -> Option<GenerationManifest> {
        self.manifests.lock().unwrap().get(path).cloned()
    }

    pub fn put_manifest(&self, path: &str, manifest: GenerationManifest) {
        self.manifests
            .lock()
            .unwrap()
            .insert(path.to_string(), manifest);
    }
}

impl PolicyStore for MemoryStore {
    fn save(&self, evaluator: &dyn PolicyEvaluator, path: &str) -> SimResult<()> {
        self.evaluators
            .lock()
            .unwrap()
            .insert(path.to_string(), evaluator.evaluate(&[]));
        Ok(())
    }

    fn load(&self, _model: &dyn Simulatable, path: &str) -> SimResult<Arc<dyn PolicyEvaluator>> {
        self.evaluators
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .map(|scores| Arc::new(ConstantEvaluator { scores }) as Arc<dyn PolicyEvaluator>)
            .ok_or_else(|| SimError::Persistence(format!("no policy stored at {}", path)))
    }

    fn save_manifest(&self, manifest: &GenerationManifest, path: &str) -> SimResult<()> {
        self.put_manifest(path, manifest.clone());
        Ok(())
    }

    fn load_manifest(&self, path: &str) -> SimResult<Option<GenerationManifest>> {
        Ok(self.manifest(path))
    }
}
