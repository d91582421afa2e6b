//! Stateful handle for one managed resource.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Lifecycle, LifecycleError, Operation};
use crate::state::ResourceState;

/// One resource instance and its last known state.
///
/// Operations take `&mut self`, so no two of them can run against the same
/// resource at once.
#[derive(Debug)]
pub struct ScriptResource {
  lifecycle: Lifecycle,
  state: ResourceState,
}

impl ScriptResource {
  /// A resource that has not been created yet.
  pub fn new(lifecycle: Lifecycle) -> Self {
    Self::with_state(lifecycle, ResourceState::Absent)
  }

  /// A resource with previously recorded state.
  pub fn with_state(lifecycle: Lifecycle, state: ResourceState) -> Self {
    Self { lifecycle, state }
  }

  pub fn state(&self) -> &ResourceState {
    &self.state
  }

  pub fn lifecycle(&self) -> &Lifecycle {
    &self.lifecycle
  }

  /// Create the resource, then read it back.
  ///
  /// Once the create command succeeds the resource is tracked as present,
  /// even if the read that follows fails or finds nothing, so it can still
  /// be deleted.
  pub async fn create(&mut self, cancel: &CancellationToken) -> Result<&ResourceState, LifecycleError> {
    self.require(Operation::Create, false)?;
    self.lifecycle.create(cancel).await?;
    self.state = ResourceState::Present(String::new());
    self.read_back(Operation::Create, cancel).await
  }

  /// Replace the recorded state with a fresh read.
  pub async fn refresh(&mut self, cancel: &CancellationToken) -> Result<&ResourceState, LifecycleError> {
    self.state = self.lifecycle.read(cancel).await?;
    debug!(status = self.state.label(), "resource state refreshed");
    Ok(&self.state)
  }

  /// Update the resource, then read it back.
  ///
  /// A failed update leaves the resource recorded as present, as does an
  /// update whose follow-up read finds nothing.
  pub async fn update(&mut self, cancel: &CancellationToken) -> Result<&ResourceState, LifecycleError> {
    self.require(Operation::Update, true)?;
    self.lifecycle.update(cancel).await?;
    self.read_back(Operation::Update, cancel).await
  }

  /// Delete the resource. Deleting an absent resource does nothing.
  pub async fn delete(&mut self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
    if !self.state.is_present() {
      debug!("resource already absent; nothing to delete");
      return Ok(());
    }
    self.lifecycle.delete(cancel).await?;
    self.state = ResourceState::Absent;
    Ok(())
  }

  /// Check whether the resource still exists; forgets it if not.
  pub async fn exists(&mut self, cancel: &CancellationToken) -> Result<bool, LifecycleError> {
    let present = self.lifecycle.exists(cancel).await?;
    if !present {
      self.state = ResourceState::Absent;
    }
    Ok(present)
  }

  /// Read after `operation` succeeded. A read that masks to absent does not
  /// overwrite the recorded state; the inconsistency is reported instead.
  async fn read_back(
    &mut self,
    operation: Operation,
    cancel: &CancellationToken,
  ) -> Result<&ResourceState, LifecycleError> {
    match self.lifecycle.read(cancel).await? {
      ResourceState::Absent => {
        warn!(operation = operation.as_str(), "resource not found after a successful command");
        Err(LifecycleError::NotFoundAfter { operation })
      }
      state => {
        self.state = state;
        debug!(status = self.state.label(), "resource state refreshed");
        Ok(&self.state)
      }
    }
  }

  fn require(&self, operation: Operation, present: bool) -> Result<(), LifecycleError> {
    if self.state.is_present() == present {
      Ok(())
    } else {
      Err(LifecycleError::InvalidState {
        operation,
        state: self.state.label(),
      })
    }
  }
}
