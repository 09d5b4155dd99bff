//! Opaque State
//!
//! A model state with its concrete type erased. Every `OpaqueState` carries
//! the owner tag of the adapter that created it (a hash of that adapter's
//! configuration).
//!
//! # Critical Invariants
//!
//! 1. **Ownership**: a state may only be passed back to the adapter that
//!    created it. A mismatched owner tag is a `ContractViolation`.
//! 2. **Type**: the owner check precedes the downcast, so a downcast failure
//!    after a successful owner check means two adapters collided on their tag.

use crate::core::{SimError, SimResult};
use std::any::Any;
use std::fmt::Debug;

/// Object-safe view of a cloneable model state
trait StateBox: Any + Send + Sync + Debug {
    fn clone_box(&self) -> Box<dyn StateBox>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> StateBox for T
where
    T: Any + Clone + Send + Sync + Debug,
{
    fn clone_box(&self) -> Box<dyn StateBox> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Model state tagged with its owning adapter
#[derive(Debug)]
pub struct OpaqueState {
    owner: u64,
    inner: Box<dyn StateBox>,
}

impl Clone for OpaqueState {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            inner: self.inner.clone_box(),
        }
    }
}

impl OpaqueState {
    pub(crate) fn new<S>(owner: u64, state: S) -> Self
    where
        S: Any + Clone + Send + Sync + Debug,
    {
        Self {
            owner,
            inner: Box::new(state),
        }
    }

    /// Owner tag of the adapter that created this state
    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub(crate) fn check_owner(&self, owner: u64) -> SimResult<()> {
        if self.owner != owner {
            return Err(SimError::ContractViolation(format!(
                "state belongs to model {:016x}, used with model {:016x}",
                self.owner, owner
            )));
        }
        Ok(())
    }

    pub(crate) fn downcast_ref<S: Any>(&self, owner: u64) -> SimResult<&S> {
        self.check_owner(owner)?;
        self.inner.as_any().downcast_ref::<S>().ok_or_else(|| {
            SimError::ContractViolation("state has an unexpected concrete type".to_string())
        })
    }

    pub(crate) fn downcast_mut<S: Any>(&mut self, owner: u64) -> SimResult<&mut S> {
        self.check_owner(owner)?;
        self.inner.as_any_mut().downcast_mut::<S>().ok_or_else(|| {
            SimError::ContractViolation("state has an unexpected concrete type".to_string())
        })
    }
}
