//! Named parameter store with scoped lookup, reuse rules and collections
//!
//! Variables live for the lifetime of the store and are shared by every layer
//! instance (and every device thread) that looks them up by the same name.

use crate::error::{DeepLabError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Collection holding every variable created by the store
pub const GLOBAL_VARIABLES: &str = "variables";
/// Collection holding trainable variables
pub const TRAINABLE_VARIABLES: &str = "trainable_variables";
/// Collection holding variables that belong to the model's state (moving statistics)
pub const MODEL_VARIABLES: &str = "model_variables";
/// Default collection for deferred moving-average updates
pub const UPDATE_OPS: &str = "update_ops";

/// Join a scope and a name with `/`
pub fn scoped_name(scope: &str, name: &str) -> String {
    let scope = scope.trim_end_matches('/');
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", scope, name)
    }
}

/// How `get_variable` treats an existing variable of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reuse {
    /// Create; fail if the variable already exists
    #[default]
    No,
    /// Attach; fail if the variable does not exist
    Yes,
    /// Attach if present, otherwise create
    Auto,
}

/// Initial value of a newly created variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Initializer {
    Zeros,
    Ones,
    Constant(f32),
}

impl Initializer {
    fn build(self, len: usize) -> Array1<f32> {
        match self {
            Self::Zeros => Array1::zeros(len),
            Self::Ones => Array1::ones(len),
            Self::Constant(value) => Array1::from_elem(len, value),
        }
    }
}

struct VariableInner {
    name: String,
    len: usize,
    trainable: bool,
    value: RwLock<Array1<f32>>,
}

/// A shared, mutable, rank-1 parameter tensor
#[derive(Clone)]
pub struct Variable {
    inner: Arc<VariableInner>,
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.inner.name)
            .field("shape", &[self.inner.len])
            .field("trainable", &self.inner.trainable)
            .finish()
    }
}

impl Variable {
    fn new(name: String, value: Array1<f32>, trainable: bool) -> Self {
        Self {
            inner: Arc::new(VariableInner {
                name,
                len: value.len(),
                trainable,
                value: RwLock::new(value),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of elements (the variable's only dimension)
    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    pub fn trainable(&self) -> bool {
        self.inner.trainable
    }

    /// Snapshot of the current value
    pub fn read(&self) -> Result<Array1<f32>> {
        let guard = self.inner.value.read().map_err(|_| {
            DeepLabError::internal(format!("Variable '{}' lock poisoned", self.inner.name))
        })?;
        Ok(guard.clone())
    }

    /// Replace the value; the shape must not change
    pub fn assign(&self, value: Array1<f32>) -> Result<()> {
        self.check_len(value.len())?;
        let mut guard = self.inner.value.write().map_err(|_| {
            DeepLabError::internal(format!("Variable '{}' lock poisoned", self.inner.name))
        })?;
        *guard = value;
        Ok(())
    }

    /// `self = self * decay + value * (1 - decay)` under a single write lock
    pub fn assign_moving_average(&self, value: &Array1<f32>, decay: f32) -> Result<()> {
        self.check_len(value.len())?;
        let mut guard = self.inner.value.write().map_err(|_| {
            DeepLabError::internal(format!("Variable '{}' lock poisoned", self.inner.name))
        })?;
        guard.zip_mut_with(value, |running, &batch| {
            *running = *running * decay + batch * (1.0 - decay);
        });
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.inner.len {
            return Err(DeepLabError::variable(format!(
                "Cannot assign value of shape [{}] to variable '{}' of shape [{}]",
                len, self.inner.name, self.inner.len
            )));
        }
        Ok(())
    }

    fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A deferred assignment recorded into an update collection
#[derive(Debug, Clone)]
pub enum UpdateOp {
    /// Exponential moving-average step toward `value`
    AssignMovingAverage {
        variable: Variable,
        value: Array1<f32>,
        decay: f32,
    },
}

impl UpdateOp {
    pub fn moving_average(variable: Variable, value: Array1<f32>, decay: f32) -> Self {
        Self::AssignMovingAverage {
            variable,
            value,
            decay,
        }
    }

    /// Name of the variable this op writes
    pub fn target(&self) -> &str {
        match self {
            Self::AssignMovingAverage { variable, .. } => variable.name(),
        }
    }

    pub fn apply(&self) -> Result<()> {
        match self {
            Self::AssignMovingAverage {
                variable,
                value,
                decay,
            } => variable.assign_moving_average(value, *decay),
        }
    }
}

/// Request passed to [`VariableStore::get_variable`]
#[derive(Debug, Clone)]
pub struct VariableSpec<'a> {
    pub name: &'a str,
    pub len: usize,
    pub initializer: Initializer,
    pub trainable: bool,
    pub reuse: Reuse,
    /// Collections joined in addition to `GLOBAL_VARIABLES` (and
    /// `TRAINABLE_VARIABLES` when trainable)
    pub collections: &'a [String],
}

#[derive(Default)]
struct StoreInner {
    variables: HashMap<String, Variable>,
    collections: HashMap<String, Vec<Variable>>,
    updates: HashMap<String, Vec<UpdateOp>>,
}

/// Process-wide parameter store shared by cloning
#[derive(Clone, Default)]
pub struct VariableStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len().unwrap_or_default();
        f.debug_struct("VariableStore")
            .field("variables", &count)
            .finish()
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|_| DeepLabError::internal("Variable store lock poisoned"))
    }

    /// Create or look up a variable according to `spec.reuse`.
    ///
    /// # Errors
    /// - `Reuse::No` and the variable exists
    /// - `Reuse::Yes` and the variable does not exist
    /// - the existing variable's shape differs from `spec.len`
    pub fn get_variable(&self, spec: &VariableSpec<'_>) -> Result<Variable> {
        let mut inner = self.lock()?;

        if let Some(existing) = inner.variables.get(spec.name) {
            if spec.reuse == Reuse::No {
                return Err(DeepLabError::variable(format!(
                    "Variable {} already exists, disallowed. Did you mean to set reuse=Yes or reuse=Auto?",
                    spec.name
                )));
            }
            if existing.len() != spec.len {
                return Err(DeepLabError::variable(format!(
                    "Trying to share variable {}, but specified shape [{}] and found shape [{}].",
                    spec.name,
                    spec.len,
                    existing.len()
                )));
            }
            return Ok(existing.clone());
        }

        if spec.reuse == Reuse::Yes {
            return Err(DeepLabError::variable(format!(
                "Variable {} does not exist, or was not created with get_variable(). Did you mean to set reuse=Auto?",
                spec.name
            )));
        }

        let variable = Variable::new(
            spec.name.to_string(),
            spec.initializer.build(spec.len),
            spec.trainable,
        );
        inner
            .variables
            .insert(spec.name.to_string(), variable.clone());

        // Unlike tf.get_variable, extra collections add to GLOBAL_VARIABLES
        // rather than replacing it
        Self::push_unique(&mut inner, GLOBAL_VARIABLES, &variable);
        if spec.trainable {
            Self::push_unique(&mut inner, TRAINABLE_VARIABLES, &variable);
        }
        for collection in spec.collections {
            Self::push_unique(&mut inner, collection, &variable);
        }

        tracing::debug!(
            name = %spec.name,
            len = spec.len,
            trainable = spec.trainable,
            "created variable"
        );

        Ok(variable)
    }

    fn push_unique(inner: &mut StoreInner, collection: &str, variable: &Variable) {
        let members = inner.collections.entry(collection.to_string()).or_default();
        if !members.iter().any(|v| v.same_as(variable)) {
            members.push(variable.clone());
        }
    }

    /// Look up a variable by its full name
    pub fn variable(&self, name: &str) -> Result<Option<Variable>> {
        Ok(self.lock()?.variables.get(name).cloned())
    }

    /// Number of variables in the store
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.variables.len())
    }

    /// Add a variable to a named collection (idempotent)
    pub fn add_to_collection(&self, collection: &str, variable: &Variable) -> Result<()> {
        let mut inner = self.lock()?;
        Self::push_unique(&mut inner, collection, variable);
        Ok(())
    }

    /// Register a non-trainable model-state variable
    pub fn add_model_variable(&self, variable: &Variable) -> Result<()> {
        self.add_to_collection(MODEL_VARIABLES, variable)
    }

    /// Members of a collection in insertion order
    pub fn collection(&self, collection: &str) -> Result<Vec<Variable>> {
        Ok(self
            .lock()?
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    pub fn trainable_variables(&self) -> Result<Vec<Variable>> {
        self.collection(TRAINABLE_VARIABLES)
    }

    pub fn model_variables(&self) -> Result<Vec<Variable>> {
        self.collection(MODEL_VARIABLES)
    }

    /// Defer an update until [`run_updates`](Self::run_updates) is called on `collection`
    pub fn add_update(&self, collection: &str, op: UpdateOp) -> Result<()> {
        self.lock()?
            .updates
            .entry(collection.to_string())
            .or_default()
            .push(op);
        Ok(())
    }

    /// Number of deferred updates waiting in `collection`
    pub fn pending_updates(&self, collection: &str) -> Result<usize> {
        Ok(self
            .lock()?
            .updates
            .get(collection)
            .map_or(0, Vec::len))
    }

    /// Apply and drain every deferred update in `collection`, in recording order.
    ///
    /// Returns the number of updates applied. If an op fails, the ops before it
    /// stay applied and the failing op plus every later one are put back at the
    /// front of the collection.
    pub fn run_updates(&self, collection: &str) -> Result<usize> {
        let mut ops = self
            .lock()?
            .updates
            .remove(collection)
            .unwrap_or_default();

        let mut applied = 0;
        let mut failure = None;
        for op in &ops {
            if let Err(err) = op.apply() {
                failure = Some(err);
                break;
            }
            applied += 1;
        }

        if let Some(err) = failure {
            let remaining = ops.split_off(applied);
            tracing::warn!(
                collection = %collection,
                applied,
                remaining = remaining.len(),
                "update op failed, keeping the rest pending"
            );
            let mut inner = self.lock()?;
            let pending = inner.updates.entry(collection.to_string()).or_default();
            let newer = std::mem::replace(pending, remaining);
            pending.extend(newer);
            return Err(err);
        }

        tracing::debug!(collection = %collection, applied, "ran update ops");
        Ok(applied)
    }
}
