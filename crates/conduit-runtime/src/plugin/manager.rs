//! Resident plugins and batch resolution.

use super::graph::DependencyGraph;
use super::report::{BatchReport, PluginSummary, ResolutionError, ResolutionIssue, Satisfied};
use conduit_plugin::{
    Lifecycle, PluginAction, PluginArtifact, PluginError, PluginLoader, PluginMeta, PluginState,
    Provision, Requirement,
};
use conduit_types::NamespaceId;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Protocol version this runtime speaks.
pub const PROTOCOL_VERSION: Version = Version::new(1, 0, 0);

#[derive(Debug)]
struct Resident {
    artifact: PluginArtifact,
    lifecycle: Lifecycle,
}

impl Resident {
    fn new(artifact: PluginArtifact) -> Self {
        let lifecycle = Lifecycle::new(artifact.meta.id().clone());
        Self {
            artifact,
            lifecycle,
        }
    }

    fn meta(&self) -> &PluginMeta {
        &self.artifact.meta
    }

    fn state(&self) -> PluginState {
        self.lifecycle.state()
    }

    fn is_enabled(&self) -> bool {
        self.state() == PluginState::Enabled
    }

    fn summary(&self) -> PluginSummary {
        let meta = self.meta();
        PluginSummary {
            id: meta.id().clone(),
            version: meta.version().clone(),
            channel: meta.coordinate.channel.clone(),
            name: meta.name.clone(),
            state: self.state(),
        }
    }
}

type Residents = BTreeMap<NamespaceId, Resident>;

/// Owns every resident plugin and drives batches of them.
///
/// One readers-writer lock guards the resident map. Listing takes the
/// read side; installs and batches hold the write side for their whole
/// run, plugin callbacks included. A callback must therefore not call
/// back into the same manager.
///
/// # Example
///
/// ```
/// use conduit_plugin::{PluginArtifact, PluginCoordinate, PluginMeta, PluginState, Requirement};
/// use conduit_runtime::PluginManager;
/// use semver::Version;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let meta = |id: &str| PluginMeta::new(PluginCoordinate::new(id.parse().unwrap(), Version::new(1, 0, 0)));
/// let manager = PluginManager::new();
///
/// let report = manager
///     .enable_plugins(
///         vec![
///             PluginArtifact::noop(meta("acme:web").requires(Requirement::new("acme:db".parse().unwrap()))),
///             PluginArtifact::noop(meta("acme:db")),
///         ],
///         false,
///     )
///     .await
///     .unwrap();
///
/// assert_eq!(report.order[0].to_string(), "acme:db");
/// assert_eq!(
///     manager.state_of(&"acme:web".parse().unwrap()).await,
///     Some(PluginState::Enabled)
/// );
/// # }
/// ```
#[derive(Debug)]
pub struct PluginManager {
    residents: RwLock<Residents>,
    protocol: Version,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    /// Empty manager speaking [`PROTOCOL_VERSION`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_protocol(PROTOCOL_VERSION)
    }

    /// Empty manager speaking `protocol`.
    #[must_use]
    pub fn with_protocol(protocol: Version) -> Self {
        Self {
            residents: RwLock::new(BTreeMap::new()),
            protocol,
        }
    }

    /// Protocol version checked against plugin metadata.
    #[must_use]
    pub fn protocol(&self) -> &Version {
        &self.protocol
    }

    /// Makes a plugin resident in [`PluginState::Initialized`].
    ///
    /// # Errors
    ///
    /// [`PluginError::AlreadyInstalled`] if the id is taken.
    pub async fn install(&self, artifact: PluginArtifact) -> Result<(), PluginError> {
        let mut residents = self.residents.write().await;
        let id = artifact.meta.id().clone();
        if residents.contains_key(&id) {
            return Err(PluginError::AlreadyInstalled { id });
        }
        info!(plugin = %artifact.meta.coordinate, "plugin installed");
        residents.insert(id, Resident::new(artifact));
        Ok(())
    }

    /// Forgets a plugin that is not running.
    ///
    /// # Errors
    ///
    /// - [`PluginError::NotInstalled`] for an unknown id.
    /// - [`PluginError::IllegalState`] unless the plugin is initialized or
    ///   in an error state.
    pub async fn uninstall(&self, id: &NamespaceId) -> Result<PluginMeta, PluginError> {
        let mut residents = self.residents.write().await;
        let state = residents
            .get(id)
            .map(Resident::state)
            .ok_or_else(|| PluginError::NotInstalled { id: id.clone() })?;
        if state != PluginState::Initialized && !state.is_error() {
            return Err(PluginError::IllegalState {
                id: id.clone(),
                action: PluginAction::Unload,
                state,
            });
        }
        let resident = residents
            .remove(id)
            .ok_or_else(|| PluginError::NotInstalled { id: id.clone() })?;
        info!(plugin = %id, "plugin uninstalled");
        Ok(resident.artifact.meta)
    }

    /// Every resident plugin, by id.
    pub async fn list(&self) -> Vec<PluginSummary> {
        self.residents
            .read()
            .await
            .values()
            .map(Resident::summary)
            .collect()
    }

    /// State of one plugin.
    pub async fn state_of(&self, id: &NamespaceId) -> Option<PluginState> {
        self.residents.read().await.get(id).map(Resident::state)
    }

    /// Metadata of one plugin.
    pub async fn meta(&self, id: &NamespaceId) -> Option<PluginMeta> {
        self.residents.read().await.get(id).map(|r| r.meta().clone())
    }

    /// Enables a batch in dependency order.
    ///
    /// Candidates are checked as a whole before anything runs: protocol,
    /// resident versions, dependencies and cycles. Candidates covered by
    /// the provision of an enabled plugin are skipped. Residents that a
    /// candidate needs but that are not enabled join the batch.
    ///
    /// With `force`, a resident stuck in an error state is recovered and
    /// replaced, and callback failures are collected instead of stopping
    /// the batch. Plugins that need a failed one are skipped.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::Rejected`] with every issue found.
    /// - [`ResolutionError::Aborted`] on the first failure without `force`.
    pub async fn enable_plugins(
        &self,
        candidates: Vec<PluginArtifact>,
        force: bool,
    ) -> Result<BatchReport, ResolutionError> {
        let mut residents = self.residents.write().await;
        let mut report = BatchReport::default();
        let mut issues = Vec::new();

        let mut batch = dedupe(candidates);

        for artifact in batch.values() {
            let meta = &artifact.meta;
            if !meta.protocol.matches(&self.protocol) {
                issues.push(ResolutionIssue::ProtocolMismatch {
                    id: meta.id().clone(),
                    wanted: meta.protocol.clone(),
                    platform: self.protocol.clone(),
                });
            }
        }

        let provisions = enabled_provisions(&residents);
        batch.retain(|id, artifact| {
            let provider = provisions
                .iter()
                .find(|(provider, provision)| {
                    provider != id && provision.covers(&artifact.meta.coordinate)
                })
                .map(|(provider, _)| provider.clone());
            match provider {
                Some(provider) => {
                    debug!(plugin = %id, %provider, "candidate satisfied by provision");
                    report.satisfied.push(Satisfied {
                        id: id.clone(),
                        provider,
                    });
                    false
                }
                None => true,
            }
        });

        let mut replacing = BTreeSet::new();
        for (id, artifact) in &batch {
            let Some(resident) = residents.get(id) else {
                continue;
            };
            let state = resident.state();
            let resident_version = resident.meta().version();
            let candidate_version = artifact.meta.version();
            if resident_version == candidate_version {
                continue;
            }
            let replaceable = state == PluginState::Initialized || (force && state.is_error());
            if replaceable {
                replacing.insert(id.clone());
            } else {
                issues.push(ResolutionIssue::VersionConflict {
                    id: id.clone(),
                    resident: resident_version.clone(),
                    candidate: candidate_version.clone(),
                    state,
                });
            }
        }

        let mut graph = DependencyGraph::new();
        let mut queue: Vec<NamespaceId> = batch.keys().cloned().collect();
        let mut visited = BTreeSet::new();
        while let Some(id) = queue.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            graph.add_node(id.clone());
            let meta = match batch.get(&id) {
                Some(artifact) => &artifact.meta,
                None => match residents.get(&id) {
                    Some(resident) => resident.meta(),
                    None => continue,
                },
            };
            for requirement in &meta.dependencies {
                match locate(requirement, &batch, &residents, &provisions) {
                    Located::Batch | Located::Dormant => {
                        graph.add_edge(id.clone(), requirement.id.clone(), requirement.optional);
                        queue.push(requirement.id.clone());
                    }
                    Located::Running => {}
                    Located::Missing(_) if requirement.optional => {}
                    Located::Missing(found) => issues.push(ResolutionIssue::MissingDependency {
                        id: id.clone(),
                        dependency: requirement.id.clone(),
                        wanted: requirement.version.clone(),
                        found,
                    }),
                }
            }
        }

        let ordering = match graph.resolve() {
            Ok(ordering) => Some(ordering),
            Err(cycles) => {
                issues.extend(
                    cycles
                        .into_iter()
                        .map(|members| ResolutionIssue::Cycle { members }),
                );
                None
            }
        };
        let ordering = match ordering {
            Some(ordering) if issues.is_empty() => ordering,
            _ => return Err(ResolutionError::Rejected { issues }),
        };

        for (id, artifact) in batch {
            match residents.get_mut(&id) {
                None => {
                    info!(plugin = %artifact.meta.coordinate, "plugin installed");
                    residents.insert(id, Resident::new(artifact));
                }
                Some(resident) if replacing.contains(&id) => {
                    if resident.state().is_error() {
                        if let Err(failure) = resident.lifecycle.recover() {
                            return Err(ResolutionError::Aborted { failure, report });
                        }
                    }
                    info!(
                        plugin = %id,
                        from = %resident.meta().version(),
                        to = %artifact.meta.version(),
                        "plugin replaced"
                    );
                    resident.artifact = artifact;
                }
                Some(_) => {}
            }
        }

        report.order = ordering.order;
        report.dropped_edges = ordering.dropped;

        let mut failed = BTreeSet::new();
        for id in report.order.clone() {
            let Some(resident) = residents.get(&id) else {
                continue;
            };
            let blocked = resident
                .meta()
                .dependencies
                .iter()
                .find(|requirement| !requirement.optional && failed.contains(&requirement.id));
            if let Some(requirement) = blocked {
                warn!(plugin = %id, dependency = %requirement.id, "skipping plugin after dependency failure");
                report.failures.push(PluginError::DependencyFailed {
                    id: id.clone(),
                    dependency: requirement.id.clone(),
                });
                failed.insert(id);
                continue;
            }

            match raise(resident, force).await {
                Ok(true) => report.completed.push(id),
                Ok(false) => report.unchanged.push(id),
                Err(failure) if force => {
                    warn!(plugin = %id, error = %failure, "plugin failed to enable");
                    report.failures.push(failure);
                    failed.insert(id);
                }
                Err(failure) => return Err(ResolutionError::Aborted { failure, report }),
            }
        }

        Ok(report)
    }

    /// Loads entries through `loader`, then enables them as one batch.
    ///
    /// Without `force` the first loader error aborts before anything runs.
    /// With `force` it is recorded and the rest of the batch goes ahead.
    ///
    /// # Errors
    ///
    /// See [`enable_plugins`](Self::enable_plugins).
    pub async fn enable_from(
        &self,
        loader: &dyn PluginLoader,
        metas: Vec<PluginMeta>,
        force: bool,
    ) -> Result<BatchReport, ResolutionError> {
        let mut artifacts = Vec::with_capacity(metas.len());
        let mut load_failures = Vec::new();
        for meta in metas {
            match loader.artifact(meta).await {
                Ok(artifact) => artifacts.push(artifact),
                Err(failure) if force => {
                    warn!(error = %failure, "plugin loader failed");
                    load_failures.push(failure);
                }
                Err(failure) => {
                    return Err(ResolutionError::Aborted {
                        failure,
                        report: BatchReport::default(),
                    })
                }
            }
        }
        let mut report = self.enable_plugins(artifacts, force).await?;
        load_failures.append(&mut report.failures);
        report.failures = load_failures;
        Ok(report)
    }

    /// Disables plugins, dependents first.
    ///
    /// An enabled plugin outside the batch that requires one inside it is
    /// a [`ResolutionIssue::RequiredBy`]; with `force` it joins the batch.
    ///
    /// # Errors
    ///
    /// Same shape as [`enable_plugins`](Self::enable_plugins).
    pub async fn disable_plugins(
        &self,
        ids: Vec<NamespaceId>,
        force: bool,
    ) -> Result<BatchReport, ResolutionError> {
        self.stop_batch(ids, PluginState::Disabled, force).await
    }

    /// Disables where needed, then unloads back to
    /// [`PluginState::Initialized`]. Same ordering rules as
    /// [`disable_plugins`](Self::disable_plugins).
    ///
    /// # Errors
    ///
    /// Same shape as [`enable_plugins`](Self::enable_plugins).
    pub async fn unload_plugins(
        &self,
        ids: Vec<NamespaceId>,
        force: bool,
    ) -> Result<BatchReport, ResolutionError> {
        self.stop_batch(ids, PluginState::Initialized, force).await
    }

    async fn stop_batch(
        &self,
        ids: Vec<NamespaceId>,
        target: PluginState,
        force: bool,
    ) -> Result<BatchReport, ResolutionError> {
        let residents = self.residents.write().await;
        let mut issues = Vec::new();

        let mut batch = BTreeSet::new();
        for id in ids {
            if residents.contains_key(&id) {
                batch.insert(id);
            } else {
                issues.push(ResolutionIssue::NotInstalled { id });
            }
        }

        let mut queue: Vec<NamespaceId> = batch.iter().cloned().collect();
        while let Some(id) = queue.pop() {
            let Some(provider) = residents.get(&id) else {
                continue;
            };
            for (other, dependent) in residents.iter() {
                if batch.contains(other) || !dependent.is_enabled() {
                    continue;
                }
                if !relies_on(dependent.meta(), provider.meta(), false) {
                    continue;
                }
                if force {
                    info!(plugin = %other, dependency = %id, "disabling dependent");
                    batch.insert(other.clone());
                    queue.push(other.clone());
                } else {
                    issues.push(ResolutionIssue::RequiredBy {
                        id: id.clone(),
                        dependent: other.clone(),
                    });
                }
            }
        }

        let mut graph = DependencyGraph::new();
        for id in &batch {
            graph.add_node(id.clone());
            let Some(dependent) = residents.get(id) else {
                continue;
            };
            for other in &batch {
                let Some(provider) = residents.get(other) else {
                    continue;
                };
                if other == id {
                    continue;
                }
                if relies_on(dependent.meta(), provider.meta(), false) {
                    graph.add_edge(id.clone(), other.clone(), false);
                } else if relies_on(dependent.meta(), provider.meta(), true) {
                    graph.add_edge(id.clone(), other.clone(), true);
                }
            }
        }

        let ordering = match graph.resolve() {
            Ok(ordering) if issues.is_empty() => ordering,
            Ok(_) => return Err(ResolutionError::Rejected { issues }),
            Err(cycles) => {
                issues.extend(
                    cycles
                        .into_iter()
                        .map(|members| ResolutionIssue::Cycle { members }),
                );
                return Err(ResolutionError::Rejected { issues });
            }
        };

        let mut report = BatchReport {
            order: ordering.order.into_iter().rev().collect(),
            dropped_edges: ordering.dropped,
            ..BatchReport::default()
        };

        let mut failed: BTreeSet<NamespaceId> = BTreeSet::new();
        for id in report.order.clone() {
            let Some(resident) = residents.get(&id) else {
                continue;
            };
            let blocked = failed.iter().find(|other| {
                residents
                    .get(*other)
                    .is_some_and(|dependent| relies_on(dependent.meta(), resident.meta(), false))
            });
            if let Some(dependent) = blocked {
                warn!(plugin = %id, %dependent, "keeping plugin after dependent failure");
                report.failures.push(PluginError::DependencyFailed {
                    id: id.clone(),
                    dependency: dependent.clone(),
                });
                failed.insert(id);
                continue;
            }

            match lower(resident, target, force).await {
                Ok(true) => report.completed.push(id),
                Ok(false) => report.unchanged.push(id),
                Err(failure) if force => {
                    warn!(plugin = %id, error = %failure, "plugin failed to stop");
                    report.failures.push(failure);
                    failed.insert(id);
                }
                Err(failure) => return Err(ResolutionError::Aborted { failure, report }),
            }
        }

        Ok(report)
    }
}

fn dedupe(candidates: Vec<PluginArtifact>) -> BTreeMap<NamespaceId, PluginArtifact> {
    let mut batch = BTreeMap::new();
    for artifact in candidates {
        let id = artifact.meta.id().clone();
        if let Some(previous) = batch.insert(id.clone(), artifact) {
            warn!(plugin = %id, dropped = %previous.meta.version(), "duplicate candidate, keeping the last");
        }
    }
    batch
}

fn enabled_provisions(residents: &Residents) -> Vec<(NamespaceId, Provision)> {
    residents
        .iter()
        .filter(|(_, resident)| resident.is_enabled())
        .flat_map(|(id, resident)| {
            resident
                .meta()
                .provisions
                .iter()
                .map(move |provision| (id.clone(), provision.clone()))
        })
        .collect()
}

enum Located {
    /// A candidate in this batch.
    Batch,
    /// Resident, not enabled yet.
    Dormant,
    /// Enabled resident or an enabled provision.
    Running,
    /// Nowhere; carries a present but mismatching version.
    Missing(Option<Version>),
}

fn locate(
    requirement: &Requirement,
    batch: &BTreeMap<NamespaceId, PluginArtifact>,
    residents: &Residents,
    provisions: &[(NamespaceId, Provision)],
) -> Located {
    let mut found = None;
    if let Some(candidate) = batch.get(&requirement.id) {
        if requirement.is_satisfied_by(&candidate.meta.coordinate) {
            return Located::Batch;
        }
        found = Some(candidate.meta.version().clone());
    } else if let Some(resident) = residents.get(&requirement.id) {
        if requirement.is_satisfied_by(&resident.meta().coordinate) {
            if resident.is_enabled() {
                return Located::Running;
            }
            if !requirement.optional {
                return Located::Dormant;
            }
        } else {
            found = Some(resident.meta().version().clone());
        }
    }
    if provisions
        .iter()
        .any(|(_, provision)| provision.fulfils(requirement))
    {
        return Located::Running;
    }
    Located::Missing(found)
}

/// Whether `dependent` has a dependency `provider` answers, by identity or
/// provision. `optional` selects which kind of dependency is checked.
fn relies_on(dependent: &PluginMeta, provider: &PluginMeta, optional: bool) -> bool {
    dependent
        .dependencies
        .iter()
        .filter(|requirement| requirement.optional == optional)
        .any(|requirement| {
            requirement.is_satisfied_by(&provider.coordinate)
                || provider
                    .provisions
                    .iter()
                    .any(|provision| provision.fulfils(requirement))
        })
}

/// Drives a resident up to ENABLED. `Ok(false)` when it already was.
async fn raise(resident: &Resident, force: bool) -> Result<bool, PluginError> {
    let mut changed = false;
    let mut recovered = false;
    loop {
        let state = resident.state();
        let action = match state {
            PluginState::Enabled => return Ok(changed),
            PluginState::Initialized => PluginAction::Load,
            PluginState::Loaded => PluginAction::Enable,
            PluginState::Disabled => PluginAction::Unload,
            state if state.is_error() && force && !recovered => {
                let from = resident.lifecycle.recover()?;
                debug!(plugin = %resident.meta().id(), %from, "recovered plugin");
                recovered = true;
                changed = true;
                continue;
            }
            state => return Err(refused(resident, PluginAction::Enable, state)),
        };
        step(resident, action).await?;
        changed = true;
    }
}

/// Drives a resident down to `target`. Plugins already below it are left alone.
async fn lower(resident: &Resident, target: PluginState, force: bool) -> Result<bool, PluginError> {
    let mut changed = false;
    loop {
        let state = resident.state();
        if state == target {
            return Ok(changed);
        }
        let action = match state {
            PluginState::Enabled => PluginAction::Disable,
            PluginState::Disabled if target == PluginState::Initialized => PluginAction::Unload,
            PluginState::Initialized | PluginState::Disabled => return Ok(changed),
            state if state.is_error() && force => {
                let from = resident.lifecycle.recover()?;
                debug!(plugin = %resident.meta().id(), %from, "recovered plugin");
                return Ok(true);
            }
            state => {
                let action = if target == PluginState::Initialized {
                    PluginAction::Unload
                } else {
                    PluginAction::Disable
                };
                return Err(refused(resident, action, state));
            }
        };
        step(resident, action).await?;
        changed = true;
    }
}

fn refused(resident: &Resident, action: PluginAction, state: PluginState) -> PluginError {
    let id = resident.meta().id().clone();
    if state.is_active() {
        PluginError::InProgress { id, action, state }
    } else {
        PluginError::IllegalState { id, action, state }
    }
}

async fn step(resident: &Resident, action: PluginAction) -> Result<(), PluginError> {
    let transition = resident.lifecycle.begin(action)?;
    let meta = resident.meta();
    let entry = &resident.artifact.entry;
    let outcome = match action {
        PluginAction::Load => entry.load(meta).await,
        PluginAction::Enable => entry.enable(meta).await,
        PluginAction::Disable => entry.disable(meta).await,
        PluginAction::Unload => entry.unload(meta).await,
    };
    match outcome {
        Ok(()) => {
            transition.complete();
            debug!(plugin = %meta.id(), %action, state = %resident.state(), "plugin transition");
            Ok(())
        }
        Err(source) => {
            transition.fail();
            Err(PluginError::Callback {
                id: meta.id().clone(),
                action,
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_plugin::{async_trait, EntryError, PluginCoordinate, PluginEntry};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn id(text: &str) -> NamespaceId {
        text.parse().unwrap()
    }

    fn meta(text: &str, major: u64) -> PluginMeta {
        PluginMeta::new(PluginCoordinate::new(id(text), Version::new(major, 0, 0)))
    }

    fn requires(text: &str) -> Requirement {
        Requirement::new(id(text))
    }

    #[derive(Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn entries(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    struct Recording {
        journal: Arc<Journal>,
        fail_on: Option<PluginAction>,
    }

    impl Recording {
        fn note(&self, meta: &PluginMeta, action: PluginAction) -> Result<(), EntryError> {
            self.journal.0.lock().push(format!("{action} {}", meta.id()));
            if self.fail_on == Some(action) {
                return Err(format!("{action} refused").into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PluginEntry for Recording {
        async fn load(&self, meta: &PluginMeta) -> Result<(), EntryError> {
            self.note(meta, PluginAction::Load)
        }
        async fn enable(&self, meta: &PluginMeta) -> Result<(), EntryError> {
            self.note(meta, PluginAction::Enable)
        }
        async fn disable(&self, meta: &PluginMeta) -> Result<(), EntryError> {
            self.note(meta, PluginAction::Disable)
        }
        async fn unload(&self, meta: &PluginMeta) -> Result<(), EntryError> {
            self.note(meta, PluginAction::Unload)
        }
    }

    fn recorded(journal: &Arc<Journal>, meta: PluginMeta) -> PluginArtifact {
        PluginArtifact::new(
            meta,
            Arc::new(Recording {
                journal: Arc::clone(journal),
                fail_on: None,
            }),
        )
    }

    fn failing(journal: &Arc<Journal>, meta: PluginMeta, action: PluginAction) -> PluginArtifact {
        PluginArtifact::new(
            meta,
            Arc::new(Recording {
                journal: Arc::clone(journal),
                fail_on: Some(action),
            }),
        )
    }

    #[tokio::test]
    async fn install_and_uninstall() {
        let manager = PluginManager::new();
        manager
            .install(PluginArtifact::noop(meta("t:a", 1)))
            .await
            .unwrap();
        assert!(matches!(
            manager.install(PluginArtifact::noop(meta("t:a", 1))).await,
            Err(PluginError::AlreadyInstalled { .. })
        ));
        assert_eq!(
            manager.state_of(&id("t:a")).await,
            Some(PluginState::Initialized)
        );

        let removed = manager.uninstall(&id("t:a")).await.unwrap();
        assert_eq!(removed.id(), &id("t:a"));
        assert!(matches!(
            manager.uninstall(&id("t:a")).await,
            Err(PluginError::NotInstalled { .. })
        ));
    }

    #[tokio::test]
    async fn enabled_plugin_cannot_be_uninstalled() {
        let manager = PluginManager::new();
        manager
            .enable_plugins(vec![PluginArtifact::noop(meta("t:a", 1))], false)
            .await
            .unwrap();
        assert!(matches!(
            manager.uninstall(&id("t:a")).await,
            Err(PluginError::IllegalState {
                state: PluginState::Enabled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn callbacks_run_in_dependency_order() {
        let journal = Arc::new(Journal::default());
        let manager = PluginManager::new();
        let report = manager
            .enable_plugins(
                vec![
                    recorded(&journal, meta("t:x", 1).requires(requires("t:y"))),
                    recorded(&journal, meta("t:y", 1).requires(requires("t:z"))),
                    recorded(&journal, meta("t:z", 1)),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(report.order, vec![id("t:z"), id("t:y"), id("t:x")]);
        assert_eq!(report.completed, report.order);
        assert_eq!(
            journal.entries(),
            vec![
                "load t:z", "enable t:z", "load t:y", "enable t:y", "load t:x", "enable t:x"
            ]
        );
    }

    #[tokio::test]
    async fn second_enable_is_unchanged() {
        let manager = PluginManager::new();
        manager
            .enable_plugins(vec![PluginArtifact::noop(meta("t:a", 1))], false)
            .await
            .unwrap();
        let report = manager
            .enable_plugins(vec![PluginArtifact::noop(meta("t:a", 1))], false)
            .await
            .unwrap();
        assert!(report.completed.is_empty());
        assert_eq!(report.unchanged, vec![id("t:a")]);
    }

    #[tokio::test]
    async fn dormant_resident_dependency_joins_batch() {
        let manager = PluginManager::new();
        manager
            .install(PluginArtifact::noop(meta("t:lib", 1)))
            .await
            .unwrap();
        let report = manager
            .enable_plugins(
                vec![PluginArtifact::noop(meta("t:app", 1).requires(requires("t:lib")))],
                false,
            )
            .await
            .unwrap();
        assert_eq!(report.order, vec![id("t:lib"), id("t:app")]);
        assert_eq!(
            manager.state_of(&id("t:lib")).await,
            Some(PluginState::Enabled)
        );
    }

    #[tokio::test]
    async fn missing_dependency_rejects_whole_batch() {
        let manager = PluginManager::new();
        let err = manager
            .enable_plugins(
                vec![
                    PluginArtifact::noop(meta("t:a", 1)),
                    PluginArtifact::noop(
                        meta("t:b", 1).requires(requires("t:a").with_version("^2".parse().unwrap())),
                    ),
                    PluginArtifact::noop(meta("t:c", 1).requires(requires("t:gone").optional())),
                ],
                false,
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.issues(),
            &[ResolutionIssue::MissingDependency {
                id: id("t:b"),
                dependency: id("t:a"),
                wanted: "^2".parse().unwrap(),
                found: Some(Version::new(1, 0, 0)),
            }]
        );
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn protocol_mismatch_rejected() {
        let manager = PluginManager::new();
        let err = manager
            .enable_plugins(
                vec![PluginArtifact::noop(
                    meta("t:old", 1).with_protocol("^0.9".parse().unwrap()),
                )],
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.issues(),
            [ResolutionIssue::ProtocolMismatch { platform, .. }] if *platform == PROTOCOL_VERSION
        ));
    }

    #[tokio::test]
    async fn provision_skips_redundant_candidate() {
        let manager = PluginManager::new();
        manager
            .enable_plugins(
                vec![PluginArtifact::noop(meta("t:fast-json", 3).provides(
                    Provision::new(id("t:json")).with_version("^1".parse().unwrap()),
                ))],
                false,
            )
            .await
            .unwrap();

        let report = manager
            .enable_plugins(
                vec![
                    PluginArtifact::noop(meta("t:json", 1)),
                    PluginArtifact::noop(meta("t:api", 1).requires(requires("t:json"))),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(
            report.satisfied,
            vec![Satisfied {
                id: id("t:json"),
                provider: id("t:fast-json"),
            }]
        );
        assert_eq!(report.order, vec![id("t:api")]);
        assert_eq!(manager.state_of(&id("t:json")).await, None);
    }

    #[tokio::test]
    async fn provision_outside_required_range_is_missing() {
        let manager = PluginManager::new();
        manager
            .enable_plugins(
                vec![PluginArtifact::noop(meta("t:shim", 1).provides(
                    Provision::new(id("t:json")).with_version("^1".parse().unwrap()),
                ))],
                false,
            )
            .await
            .unwrap();

        let err = manager
            .enable_plugins(
                vec![PluginArtifact::noop(
                    meta("t:app", 1).requires(requires("t:json").with_version("^2".parse().unwrap())),
                )],
                false,
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.issues(),
            &[ResolutionIssue::MissingDependency {
                id: id("t:app"),
                dependency: id("t:json"),
                wanted: "^2".parse().unwrap(),
                found: None,
            }]
        );
        assert_eq!(manager.state_of(&id("t:app")).await, None);
    }

    #[tokio::test]
    async fn failure_aborts_without_force() {
        let journal = Arc::new(Journal::default());
        let manager = PluginManager::new();
        let err = manager
            .enable_plugins(
                vec![
                    failing(&journal, meta("t:a", 1), PluginAction::Enable),
                    recorded(&journal, meta("t:b", 1).requires(requires("t:a"))),
                    recorded(&journal, meta("t:c", 1)),
                ],
                false,
            )
            .await
            .unwrap_err();

        let ResolutionError::Aborted { failure, report } = err else {
            panic!("expected abort");
        };
        assert!(matches!(
            failure,
            PluginError::Callback {
                action: PluginAction::Enable,
                ..
            }
        ));
        assert!(report.completed.is_empty());
        assert_eq!(
            manager.state_of(&id("t:a")).await,
            Some(PluginState::EnablingError)
        );
        assert_eq!(
            manager.state_of(&id("t:b")).await,
            Some(PluginState::Initialized)
        );
    }

    #[tokio::test]
    async fn force_continues_and_skips_dependents() {
        let journal = Arc::new(Journal::default());
        let manager = PluginManager::new();
        let report = manager
            .enable_plugins(
                vec![
                    failing(&journal, meta("t:a", 1), PluginAction::Load),
                    recorded(&journal, meta("t:b", 1).requires(requires("t:a"))),
                    recorded(&journal, meta("t:c", 1)),
                ],
                true,
            )
            .await
            .unwrap();

        assert_eq!(report.completed, vec![id("t:c")]);
        assert_eq!(report.failed(), vec![&id("t:a"), &id("t:b")]);
        assert!(matches!(
            report.failures[1],
            PluginError::DependencyFailed { .. }
        ));
        assert!(!journal.entries().contains(&"load t:b".to_string()));
    }

    #[tokio::test]
    async fn error_state_resident_needs_force_to_replace() {
        let journal = Arc::new(Journal::default());
        let manager = PluginManager::new();
        manager
            .enable_plugins(
                vec![failing(&journal, meta("t:a", 1), PluginAction::Load)],
                true,
            )
            .await
            .unwrap();
        assert_eq!(
            manager.state_of(&id("t:a")).await,
            Some(PluginState::LoadingError)
        );

        let err = manager
            .enable_plugins(vec![recorded(&journal, meta("t:a", 2))], false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.issues(),
            [ResolutionIssue::VersionConflict {
                state: PluginState::LoadingError,
                ..
            }]
        ));

        let report = manager
            .enable_plugins(vec![recorded(&journal, meta("t:a", 2))], true)
            .await
            .unwrap();
        assert!(report.is_clean());
        let listed = manager.list().await;
        assert_eq!(listed[0].version, Version::new(2, 0, 0));
        assert_eq!(listed[0].state, PluginState::Enabled);
    }

    #[tokio::test]
    async fn enabled_resident_blocks_new_version() {
        let manager = PluginManager::new();
        manager
            .enable_plugins(vec![PluginArtifact::noop(meta("t:a", 1))], false)
            .await
            .unwrap();
        let err = manager
            .enable_plugins(vec![PluginArtifact::noop(meta("t:a", 2))], true)
            .await
            .unwrap_err();
        assert_eq!(
            err.issues(),
            &[ResolutionIssue::VersionConflict {
                id: id("t:a"),
                resident: Version::new(1, 0, 0),
                candidate: Version::new(2, 0, 0),
                state: PluginState::Enabled,
            }]
        );
    }

    #[tokio::test]
    async fn disable_walks_dependents_first() {
        let journal = Arc::new(Journal::default());
        let manager = PluginManager::new();
        manager
            .enable_plugins(
                vec![
                    recorded(&journal, meta("t:app", 1).requires(requires("t:lib"))),
                    recorded(&journal, meta("t:lib", 1)),
                ],
                false,
            )
            .await
            .unwrap();

        let err = manager
            .disable_plugins(vec![id("t:lib")], false)
            .await
            .unwrap_err();
        assert_eq!(
            err.issues(),
            &[ResolutionIssue::RequiredBy {
                id: id("t:lib"),
                dependent: id("t:app"),
            }]
        );

        let report = manager
            .disable_plugins(vec![id("t:lib")], true)
            .await
            .unwrap();
        assert_eq!(report.order, vec![id("t:app"), id("t:lib")]);
        let journal = journal.entries();
        assert_eq!(&journal[journal.len() - 2..], ["disable t:app", "disable t:lib"]);
    }

    #[tokio::test]
    async fn unload_disables_then_unloads() {
        let journal = Arc::new(Journal::default());
        let manager = PluginManager::new();
        manager
            .enable_plugins(vec![recorded(&journal, meta("t:a", 1))], false)
            .await
            .unwrap();
        let report = manager.unload_plugins(vec![id("t:a")], false).await.unwrap();
        assert_eq!(report.completed, vec![id("t:a")]);
        assert_eq!(
            journal.entries(),
            vec!["load t:a", "enable t:a", "disable t:a", "unload t:a"]
        );
        assert_eq!(
            manager.state_of(&id("t:a")).await,
            Some(PluginState::Initialized)
        );
    }

    #[tokio::test]
    async fn reenabling_disabled_plugin_reloads() {
        let journal = Arc::new(Journal::default());
        let manager = PluginManager::new();
        manager
            .enable_plugins(vec![recorded(&journal, meta("t:a", 1))], false)
            .await
            .unwrap();
        manager.disable_plugins(vec![id("t:a")], false).await.unwrap();
        manager
            .enable_plugins(vec![recorded(&journal, meta("t:a", 1))], false)
            .await
            .unwrap();
        assert_eq!(
            journal.entries(),
            vec![
                "load t:a", "enable t:a", "disable t:a", "unload t:a", "load t:a", "enable t:a"
            ]
        );
    }

    #[tokio::test]
    async fn unknown_ids_rejected_on_disable() {
        let manager = PluginManager::new();
        let err = manager
            .disable_plugins(vec![id("t:nope")], true)
            .await
            .unwrap_err();
        assert_eq!(
            err.issues(),
            &[ResolutionIssue::NotInstalled { id: id("t:nope") }]
        );
    }
}
