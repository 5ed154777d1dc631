//! # Deployment Engine
//!
//! Turns registered resources into provider calls. Every registration
//! spawns one task; the task waits for its request (an [`Output`] built
//! from other resources' outputs), reconciles it against the provider, and
//! resolves the resource's own output. The dependency graph is never
//! written down: it is exactly the set of outputs each request was built
//! from.
//!
//! ```text
//!   register(bucket)  ─────────────┐
//!   register(key ring) ─▶ key ─▶ iam ─┤
//!                                   ├─▶ register(service) ─▶ mapping ─▶ export(url)
//!   invoke(project) ─▶ invoke(sa) ──┘
//! ```
//!
//! Resources without a data dependency between them run concurrently on
//! the tokio scheduler.
//!
//! ## Reconcile
//!
//! | Recorded | Desired request | Outcome |
//! |----------|-----------------|---------|
//! | no | - | `Created` |
//! | yes | identical | `Unchanged` |
//! | yes | mutable fields differ, update-in-place kind | `Updated` |
//! | yes | fixed fields differ, or delete-before-replace kind | `Replaced` |
//!
//! Replacement always deletes first. Fixed fields are those a provider
//! cannot change on an existing resource (see
//! [`ResourceRequest::immutable_changes`]).
//!
//! ## Superseded Resources
//!
//! A recorded resource whose id is not registered in the current run is
//! deleted and reported as `Deleted`:
//!
//! - before a delete-before-replace kind is created, recorded resources of
//!   that kind and of later kinds are deleted first, so a renamed service
//!   never runs next to its predecessor;
//! - everything else is deleted, dependents first, once every registered
//!   resource has settled without failure.
//!
//! ## Failure Model
//!
//! - The first failure is the run's result; later failures caused by it
//!   are reported as `Skipped`.
//! - After a failure the engine is aborted: resources whose request has
//!   not been submitted yet are skipped, in-flight calls finish.
//! - Nothing is rolled back. Created resources stay in place for the next
//!   run to adopt, and superseded resources are not deleted.
//! - [`Deployment::settle`] returns the per-step report of a failed run
//!   together with its failure.

use crate::error::{Error, Result};
use crate::output::Output;
use crate::resources::{
    ReplacePolicy, ResourceId, ResourceKind, ResourceProvider, ResourceRecord, ResourceRequest,
};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{Instrument, debug, info, info_span, warn};

// =============================================================================
// Run Report
// =============================================================================

/// What happened to one registered resource or lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Resource did not exist and was created.
    Created,
    /// Resource existed with a different request and was updated in place.
    Updated,
    /// Resource existed with a different request and was deleted, then
    /// created.
    Replaced,
    /// Resource existed with the same request and was adopted.
    Unchanged,
    /// Recorded resource is no longer registered and was deleted.
    Deleted,
    /// Lookup (no resource) completed.
    Read,
    /// This step failed.
    Failed(String),
    /// Not attempted because of an earlier failure.
    Skipped,
}

impl StepOutcome {
    /// Returns true if the step mutated provider state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Updated | Self::Replaced | Self::Deleted
        )
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Replaced => write!(f, "replaced"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Deleted => write!(f, "deleted"),
            Self::Read => write!(f, "read"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Resource id, or lookup label.
    pub target: String,
    /// Resource kind (`None` for lookups).
    pub kind: Option<ResourceKind>,
    /// Outcome.
    pub outcome: StepOutcome,
}

/// Result of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Steps in registration order, followed by deletions of superseded
    /// resources.
    pub steps: Vec<Step>,
    /// Exported values by name.
    pub outputs: BTreeMap<String, String>,
    /// First fatal failure, if the run failed.
    #[serde(
        rename = "error",
        serialize_with = "serialize_failure",
        skip_serializing_if = "Option::is_none"
    )]
    pub failure: Option<Error>,
}

fn serialize_failure<S: Serializer>(
    failure: &Option<Error>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match failure {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

impl RunReport {
    /// Returns the report, or the run's failure.
    ///
    /// # Errors
    ///
    /// Returns the first fatal failure of the run.
    pub fn into_result(mut self) -> Result<RunReport> {
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Returns the outcome recorded for `target`.
    #[must_use]
    pub fn outcome(&self, target: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.target == target)
            .map(|s| &s.outcome)
    }

    /// Number of steps with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: &StepOutcome) -> usize {
        self.steps.iter().filter(|s| &s.outcome == outcome).count()
    }

    /// Returns true if the run did not mutate any resource.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.steps.iter().any(|s| s.outcome.is_mutation())
    }
}

// =============================================================================
// Deployment
// =============================================================================

/// State shared between the deployment and its tasks.
struct EngineShared {
    provider: Arc<dyn ResourceProvider>,
    aborted: AtomicBool,
    next_index: AtomicUsize,
    steps: Mutex<Vec<(usize, Step)>>,
    first_failure: Mutex<Option<Error>>,
    /// Ids registered in this run.
    declared: Mutex<BTreeSet<ResourceId>>,
    /// Set once no more resources can be registered.
    sealed: watch::Sender<bool>,
}

impl EngineShared {
    fn record(&self, index: usize, target: String, kind: Option<ResourceKind>, outcome: StepOutcome) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push((
                index,
                Step {
                    target,
                    kind,
                    outcome,
                },
            ));
        }
    }

    /// Records `err` as the run's failure unless one is already recorded,
    /// and aborts the run.
    fn fail(&self, err: &Error) {
        if let Ok(mut first) = self.first_failure.lock() {
            if first.is_none() {
                warn!(error = %err, "Aborting run after fatal failure");
                *first = Some(err.clone());
            }
        }
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn seal(&self) {
        self.sealed.send_replace(true);
    }

    /// Waits until every resource of the run has been registered.
    async fn wait_sealed(&self) -> Result<()> {
        let mut sealed = self.sealed.subscribe();
        sealed
            .wait_for(|sealed| *sealed)
            .await
            .map(|_| ())
            .map_err(|_| Error::Internal("deployment dropped before completion".to_string()))
    }

    /// Recorded resources not registered in this run whose kind passes
    /// `filter`, dependents first.
    async fn undeclared(&self, filter: impl Fn(ResourceKind) -> bool) -> Result<Vec<ResourceId>> {
        self.wait_sealed().await?;
        let declared = self
            .declared
            .lock()
            .map_err(|_| Error::Internal("lock poisoned".to_string()))?
            .clone();

        let mut stale: Vec<ResourceId> = self
            .provider
            .list()
            .await?
            .into_iter()
            .map(|r| r.id)
            .filter(|id| filter(id.kind) && !declared.contains(id))
            .collect();
        sort_dependents_first(&mut stale);
        Ok(stale)
    }

    /// Deletes a superseded resource.
    async fn retire(&self, id: &ResourceId) -> Result<()> {
        info!(resource = %id, "Deleting resource no longer registered");
        match self.provider.delete(id).await {
            Ok(()) => {}
            Err(Error::ResourceNotFound(_)) => {
                debug!(resource = %id, "Superseded resource already gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        self.record(index, id.to_string(), Some(id.kind), StepOutcome::Deleted);
        Ok(())
    }

    /// Before a delete-before-replace kind is created, deletes superseded
    /// resources of that kind and of every kind created after it.
    async fn retire_predecessors(&self, kind: ResourceKind) -> Result<()> {
        if kind.replace_policy() != ReplacePolicy::DeleteBeforeReplace {
            return Ok(());
        }
        let rank = kind.creation_rank();
        for id in self.undeclared(|k| k.creation_rank() >= rank).await? {
            self.retire(&id).await?;
        }
        Ok(())
    }

    /// Deletes every remaining superseded resource, stopping at the first
    /// failure.
    async fn retire_superseded(&self) {
        let stale = match self.undeclared(|_| true).await {
            Ok(stale) => stale,
            Err(e) => return self.fail(&e),
        };
        for id in stale {
            if let Err(e) = self.retire(&id).await {
                self.fail(&e);
                let index = self.next_index.fetch_add(1, Ordering::SeqCst);
                self.record(index, id.to_string(), Some(id.kind), StepOutcome::Failed(e.to_string()));
                return;
            }
        }
    }

    async fn reconcile(
        &self,
        id: &ResourceId,
        request: &ResourceRequest,
    ) -> Result<(ResourceRecord, StepOutcome)> {
        if request.kind() != id.kind {
            return Err(Error::Internal(format!(
                "request of kind {} registered as {}",
                request.kind(),
                id
            )));
        }
        request.validate()?;

        let Some(existing) = self.provider.read(id).await? else {
            self.retire_predecessors(id.kind).await?;
            info!(resource = %id, "Creating resource");
            let record = self.provider.create(id, request).await?;
            return Ok((record, StepOutcome::Created));
        };

        if existing.request == *request {
            debug!(resource = %id, physical = %existing.physical_name, "Adopting unchanged resource");
            return Ok((existing, StepOutcome::Unchanged));
        }

        let fixed = request.immutable_changes(&existing.request);
        if fixed.is_empty() && id.kind.replace_policy() == ReplacePolicy::UpdateInPlace {
            info!(resource = %id, "Updating resource in place");
            let record = self.provider.update(id, request).await?;
            return Ok((record, StepOutcome::Updated));
        }

        info!(resource = %id, fixed = ?fixed, "Replacing resource (delete before create)");
        self.provider.delete(id).await?;
        self.retire_predecessors(id.kind).await?;
        let record = self.provider.create(id, request).await?;
        Ok((record, StepOutcome::Replaced))
    }
}

/// One provisioning run.
///
/// Created per run, with the provider passed in explicitly. Must be used
/// from within a tokio runtime. The registered resources are the whole
/// desired state: recorded resources that are not registered are deleted
/// by the run.
pub struct Deployment {
    shared: Arc<EngineShared>,
    pending: Mutex<Vec<Output<()>>>,
    exports: Mutex<Vec<(String, Output<String>)>>,
}

impl Deployment {
    /// Creates a deployment against `provider`.
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        let (sealed, _) = watch::channel(false);
        Self {
            shared: Arc::new(EngineShared {
                provider,
                aborted: AtomicBool::new(false),
                next_index: AtomicUsize::new(0),
                steps: Mutex::new(Vec::new()),
                first_failure: Mutex::new(None),
                declared: Mutex::new(BTreeSet::new()),
                sealed,
            }),
            pending: Mutex::new(Vec::new()),
            exports: Mutex::new(Vec::new()),
        }
    }

    /// Returns the provider.
    #[must_use]
    pub fn provider(&self) -> Arc<dyn ResourceProvider> {
        self.shared.provider.clone()
    }

    fn track<T>(&self, output: &Output<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(output.map(|_| ()));
        }
    }

    /// Runs a provider lookup (no resource is created).
    pub fn invoke<T, F, Fut>(&self, label: &str, f: F) -> Output<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Arc<dyn ResourceProvider>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let shared = self.shared.clone();
        let index = shared.next_index.fetch_add(1, Ordering::SeqCst);
        let label = label.to_string();
        let span = info_span!("invoke", target = %label);

        let handle = tokio::spawn(
            async move {
                match f(shared.provider.clone()).await {
                    Ok(value) => {
                        shared.record(index, label, None, StepOutcome::Read);
                        Ok(value)
                    }
                    Err(e) => {
                        shared.fail(&e);
                        shared.record(index, label, None, StepOutcome::Failed(e.to_string()));
                        Err(e)
                    }
                }
            }
            .instrument(span),
        );

        let output = Output::from_task(handle);
        self.track(&output);
        output
    }

    /// Registers a resource. The returned output resolves to the typed
    /// state of the resource once the provider has reconciled it.
    pub fn register<S>(&self, id: ResourceId, request: Output<ResourceRequest>) -> Output<S>
    where
        S: TryFrom<ResourceRecord, Error = Error> + Clone + Send + Sync + 'static,
    {
        if let Ok(mut declared) = self.shared.declared.lock() {
            declared.insert(id.clone());
        }

        let shared = self.shared.clone();
        let index = shared.next_index.fetch_add(1, Ordering::SeqCst);
        let span = info_span!("resource", id = %id);

        let handle = tokio::spawn(
            async move {
                let target = id.to_string();

                let request = match request.resolve().await {
                    Ok(request) => request,
                    Err(e) => {
                        debug!(resource = %id, error = %e, "Inputs failed to resolve");
                        shared.fail(&e);
                        shared.record(index, target, Some(id.kind), StepOutcome::Skipped);
                        return Err(e);
                    }
                };

                if shared.is_aborted() {
                    warn!(resource = %id, "Skipping resource, run aborted");
                    shared.record(index, target.clone(), Some(id.kind), StepOutcome::Skipped);
                    return Err(Error::Aborted { resource: target });
                }

                match shared.reconcile(&id, &request).await {
                    Ok((record, outcome)) => {
                        info!(
                            resource = %id,
                            physical = %record.physical_name,
                            outcome = %outcome,
                            "Resource reconciled"
                        );
                        shared.record(index, target, Some(id.kind), outcome);
                        S::try_from(record)
                    }
                    Err(e) => {
                        shared.fail(&e);
                        shared.record(index, target, Some(id.kind), StepOutcome::Failed(e.to_string()));
                        Err(e)
                    }
                }
            }
            .instrument(span),
        );

        let output = Output::from_task(handle);
        self.track(&output);
        output
    }

    /// Publishes a value under `name` in the run report.
    pub fn export(&self, name: &str, value: Output<String>) {
        if let Ok(mut exports) = self.exports.lock() {
            exports.push((name.to_string(), value));
        }
    }

    /// Waits for every registered resource and export, then deletes
    /// superseded resources if nothing failed.
    ///
    /// Always returns the per-step report; a failed run carries its first
    /// fatal failure in [`RunReport::failure`].
    pub async fn settle(self) -> RunReport {
        self.shared.seal();

        let pending = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        let exports = std::mem::take(&mut *self.exports.lock().unwrap_or_else(PoisonError::into_inner));

        futures::future::join_all(pending.into_iter().map(Output::resolve)).await;

        let mut outputs = BTreeMap::new();
        for (name, value) in exports {
            match value.resolve().await {
                Ok(value) => {
                    outputs.insert(name, value);
                }
                Err(e) => self.shared.fail(&e),
            }
        }

        if !self.shared.is_aborted() {
            self.shared.retire_superseded().await;
        }

        let failure = self
            .shared
            .first_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let mut steps = std::mem::take(&mut *self.shared.steps.lock().unwrap_or_else(PoisonError::into_inner));
        steps.sort_by_key(|(index, _)| *index);

        RunReport {
            steps: steps.into_iter().map(|(_, step)| step).collect(),
            outputs,
            failure,
        }
    }

    /// Waits for the run like [`Deployment::settle`].
    ///
    /// # Errors
    ///
    /// Returns the first fatal failure of the run.
    pub async fn complete(self) -> Result<RunReport> {
        self.settle().await.into_result()
    }
}

impl Drop for Deployment {
    fn drop(&mut self) {
        self.shared.seal();
    }
}

// =============================================================================
// Destroy
// =============================================================================

/// Orders ids so that dependents come before the resources they reference.
fn sort_dependents_first(ids: &mut [ResourceId]) {
    ids.sort_by(|a, b| {
        b.kind
            .creation_rank()
            .cmp(&a.kind.creation_rank())
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Deletes every resource recorded by `provider`, dependents first.
///
/// Stops at the first failure; already deleted resources stay deleted.
///
/// # Returns
///
/// Ids of the deleted resources, in deletion order.
pub async fn destroy(provider: &dyn ResourceProvider) -> Result<Vec<ResourceId>> {
    let mut ids: Vec<ResourceId> = provider.list().await?.into_iter().map(|r| r.id).collect();
    sort_dependents_first(&mut ids);

    let mut deleted = Vec::with_capacity(ids.len());
    for id in ids {
        info!(resource = %id, "Deleting resource");
        provider.delete(&id).await?;
        deleted.push(id);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{LocalProvider, ProviderOperation};
    use crate::resources::{BucketArgs, BucketState, KeyRingArgs, KeyRingState};

    fn bucket(location: &str) -> ResourceRequest {
        ResourceRequest::Bucket(BucketArgs {
            project: "vault-project".to_string(),
            location: location.to_string(),
            uniform_bucket_level_access: true,
        })
    }

    #[tokio::test]
    async fn test_register_creates_then_adopts() {
        let provider = Arc::new(LocalProvider::in_memory());

        let first = Deployment::new(provider.clone());
        let _: Output<BucketState> = first.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("US")),
        );
        let report = first.complete().await.unwrap();
        assert_eq!(report.outcome("bucket::vault-data"), Some(&StepOutcome::Created));

        let second = Deployment::new(provider.clone());
        let _: Output<BucketState> = second.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("US")),
        );
        let report = second.complete().await.unwrap();
        assert_eq!(report.outcome("bucket::vault-data"), Some(&StepOutcome::Unchanged));
        assert!(report.is_noop());
        assert_eq!(provider.count(ProviderOperation::Create, ResourceKind::Bucket), 1);
    }

    #[tokio::test]
    async fn test_bucket_location_change_replaces() {
        let provider = Arc::new(LocalProvider::in_memory());

        let first = Deployment::new(provider.clone());
        let original: Output<BucketState> = first.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("US")),
        );
        let original = original.map(|b| b.name);
        first.export("bucket", original);
        let first = first.complete().await.unwrap();

        let second = Deployment::new(provider.clone());
        let moved: Output<BucketState> = second.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("EU")),
        );
        second.export("bucket", moved.map(|b| b.name));
        let report = second.complete().await.unwrap();

        assert_eq!(report.outcome("bucket::vault-data"), Some(&StepOutcome::Replaced));
        assert_eq!(provider.count(ProviderOperation::Update, ResourceKind::Bucket), 0);
        assert_eq!(provider.count(ProviderOperation::Delete, ResourceKind::Bucket), 1);
        assert_ne!(report.outputs["bucket"], first.outputs["bucket"]);
    }

    #[tokio::test]
    async fn test_mutable_change_updates_in_place() {
        let provider = Arc::new(LocalProvider::in_memory());
        let request = |uniform: bool| {
            ResourceRequest::Bucket(BucketArgs {
                project: "vault-project".to_string(),
                location: "US".to_string(),
                uniform_bucket_level_access: uniform,
            })
        };

        let first = Deployment::new(provider.clone());
        let _: Output<BucketState> = first.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(request(true)),
        );
        first.complete().await.unwrap();

        let second = Deployment::new(provider.clone());
        let _: Output<BucketState> = second.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(request(false)),
        );
        let report = second.complete().await.unwrap();
        assert_eq!(report.outcome("bucket::vault-data"), Some(&StepOutcome::Updated));
        assert_eq!(provider.count(ProviderOperation::Delete, ResourceKind::Bucket), 0);
    }

    #[tokio::test]
    async fn test_unregistered_resource_is_deleted() {
        let provider = Arc::new(LocalProvider::in_memory());

        let first = Deployment::new(provider.clone());
        let _: Output<BucketState> = first.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("US")),
        );
        let _: Output<KeyRingState> = first.register(
            ResourceId::new(ResourceKind::KeyRing, "vault-server"),
            Output::known(ResourceRequest::KeyRing(KeyRingArgs {
                project: "vault-project".to_string(),
                location: "global".to_string(),
            })),
        );
        first.complete().await.unwrap();

        let second = Deployment::new(provider.clone());
        let _: Output<BucketState> = second.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("US")),
        );
        let report = second.complete().await.unwrap();

        assert_eq!(report.outcome("key-ring::vault-server"), Some(&StepOutcome::Deleted));
        assert!(!report.is_noop());
        let remaining = provider.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.kind, ResourceKind::Bucket);
    }

    #[tokio::test]
    async fn test_failure_skips_dependents() {
        let provider = Arc::new(LocalProvider::in_memory());
        provider.reject(ProviderOperation::Create, ResourceKind::Bucket, "permission denied");

        let deployment = Deployment::new(provider.clone());
        let bucket_out: Output<BucketState> = deployment.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("US")),
        );
        let _: Output<KeyRingState> = deployment.register(
            ResourceId::new(ResourceKind::KeyRing, "vault-server"),
            bucket_out.map(|b| {
                ResourceRequest::KeyRing(KeyRingArgs {
                    project: b.name,
                    location: "global".to_string(),
                })
            }),
        );

        let err = deployment.complete().await.unwrap_err();
        assert!(matches!(err, Error::ResourceCreationFailed { .. }));
        assert!(err.to_string().contains("permission denied"));
        assert_eq!(provider.count(ProviderOperation::Create, ResourceKind::KeyRing), 0);
    }

    #[tokio::test]
    async fn test_settle_keeps_steps_of_failed_run() {
        let provider = Arc::new(LocalProvider::in_memory());
        provider.reject(ProviderOperation::Create, ResourceKind::KeyRing, "quota exceeded");

        let deployment = Deployment::new(provider.clone());
        let _: Output<BucketState> = deployment.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("US")),
        );
        let _: Output<KeyRingState> = deployment.register(
            ResourceId::new(ResourceKind::KeyRing, "vault-server"),
            Output::known(ResourceRequest::KeyRing(KeyRingArgs {
                project: "vault-project".to_string(),
                location: "global".to_string(),
            })),
        );

        let report = deployment.settle().await;
        assert!(matches!(report.failure, Some(Error::ResourceCreationFailed { .. })));
        assert_eq!(report.outcome("bucket::vault-data"), Some(&StepOutcome::Created));
        assert!(matches!(
            report.outcome("key-ring::vault-server"),
            Some(StepOutcome::Failed(reason)) if reason.contains("quota exceeded")
        ));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["error"].as_str().unwrap().contains("quota exceeded"));
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_export_failure_fails_run() {
        let provider = Arc::new(LocalProvider::in_memory());
        let deployment = Deployment::new(provider);
        deployment.export("url", Output::failed(Error::Internal("nope".to_string())));
        assert!(deployment.complete().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_provider() {
        let provider = Arc::new(LocalProvider::in_memory());
        let deployment = Deployment::new(provider.clone());
        let _: Output<BucketState> = deployment.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("")),
        );

        let err = deployment.complete().await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_deletes_dependents_first() {
        let provider = Arc::new(LocalProvider::in_memory());
        let deployment = Deployment::new(provider.clone());
        let _: Output<BucketState> = deployment.register(
            ResourceId::new(ResourceKind::Bucket, "vault-data"),
            Output::known(bucket("US")),
        );
        let _: Output<KeyRingState> = deployment.register(
            ResourceId::new(ResourceKind::KeyRing, "vault-server"),
            Output::known(ResourceRequest::KeyRing(KeyRingArgs {
                project: "vault-project".to_string(),
                location: "global".to_string(),
            })),
        );
        deployment.complete().await.unwrap();

        let deleted = destroy(provider.as_ref()).await.unwrap();
        assert_eq!(
            deleted,
            vec![
                ResourceId::new(ResourceKind::KeyRing, "vault-server"),
                ResourceId::new(ResourceKind::Bucket, "vault-data"),
            ]
        );
        assert!(provider.list().await.unwrap().is_empty());
    }
}
