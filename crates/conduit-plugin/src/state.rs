//! Per-plugin lifecycle state machine.
//!
//! # State Lifecycle
//!
//! ```text
//! INITIALIZED ─load─► LOADING ─► LOADED ─enable─► ENABLING ─► ENABLED
//!      ▲                 │                           │            │
//!      │           LOADING_ERROR              ENABLING_ERROR   disable
//!      │                                                          ▼
//!      └──── UNLOADING ◄─unload─ DISABLED ◄──────────────── DISABLING
//!               │                                                 │
//!         UNLOADING_ERROR                                  DISABLING_ERROR
//! ```
//!
//! Each action is valid from exactly one resting state. While an action
//! runs, the plugin sits in the matching active state and every other
//! action, including the same one, is refused. A failed callback leaves
//! the plugin in the matching `*_ERROR` state until [`Lifecycle::recover`].

use crate::PluginError;
use conduit_types::NamespaceId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle state of one plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginState {
    /// Known to the manager, nothing loaded.
    #[default]
    Initialized,
    /// `load` in progress.
    Loading,
    /// `load` failed.
    LoadingError,
    /// Loaded, not enabled.
    Loaded,
    /// `enable` in progress.
    Enabling,
    /// `enable` failed.
    EnablingError,
    /// Running.
    Enabled,
    /// `disable` in progress.
    Disabling,
    /// `disable` failed.
    DisablingError,
    /// Stopped, still loaded.
    Disabled,
    /// `unload` in progress.
    Unloading,
    /// `unload` failed.
    UnloadingError,
}

impl PluginState {
    /// Whether this is one of the `*_ERROR` states.
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::LoadingError | Self::EnablingError | Self::DisablingError | Self::UnloadingError
        )
    }

    /// Whether an action is running.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Loading | Self::Enabling | Self::Disabling | Self::Unloading
        )
    }

    /// Upper-case name as used in logs and listings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "INITIALIZED",
            Self::Loading => "LOADING",
            Self::LoadingError => "LOADING_ERROR",
            Self::Loaded => "LOADED",
            Self::Enabling => "ENABLING",
            Self::EnablingError => "ENABLING_ERROR",
            Self::Enabled => "ENABLED",
            Self::Disabling => "DISABLING",
            Self::DisablingError => "DISABLING_ERROR",
            Self::Disabled => "DISABLED",
            Self::Unloading => "UNLOADING",
            Self::UnloadingError => "UNLOADING_ERROR",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginAction {
    /// INITIALIZED → LOADED
    Load,
    /// LOADED → ENABLED
    Enable,
    /// ENABLED → DISABLED
    Disable,
    /// DISABLED → INITIALIZED
    Unload,
}

impl PluginAction {
    /// State the action starts from.
    #[must_use]
    pub fn from_state(self) -> PluginState {
        match self {
            Self::Load => PluginState::Initialized,
            Self::Enable => PluginState::Loaded,
            Self::Disable => PluginState::Enabled,
            Self::Unload => PluginState::Disabled,
        }
    }

    /// State while the action runs.
    #[must_use]
    pub fn active_state(self) -> PluginState {
        match self {
            Self::Load => PluginState::Loading,
            Self::Enable => PluginState::Enabling,
            Self::Disable => PluginState::Disabling,
            Self::Unload => PluginState::Unloading,
        }
    }

    /// State after success.
    #[must_use]
    pub fn done_state(self) -> PluginState {
        match self {
            Self::Load => PluginState::Loaded,
            Self::Enable => PluginState::Enabled,
            Self::Disable => PluginState::Disabled,
            Self::Unload => PluginState::Initialized,
        }
    }

    /// State after failure.
    #[must_use]
    pub fn error_state(self) -> PluginState {
        match self {
            Self::Load => PluginState::LoadingError,
            Self::Enable => PluginState::EnablingError,
            Self::Disable => PluginState::DisablingError,
            Self::Unload => PluginState::UnloadingError,
        }
    }
}

impl fmt::Display for PluginAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Load => "load",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Unload => "unload",
        };
        f.write_str(text)
    }
}

/// State holder for one plugin.
///
/// # Example
///
/// ```
/// use conduit_plugin::{Lifecycle, PluginAction, PluginState};
///
/// let lifecycle = Lifecycle::new("acme:tool".parse().unwrap());
///
/// let load = lifecycle.begin(PluginAction::Load).unwrap();
/// assert_eq!(lifecycle.state(), PluginState::Loading);
/// assert!(lifecycle.begin(PluginAction::Load).is_err());
/// load.complete();
///
/// assert_eq!(lifecycle.state(), PluginState::Loaded);
/// ```
#[derive(Debug)]
pub struct Lifecycle {
    id: NamespaceId,
    state: Mutex<PluginState>,
}

impl Lifecycle {
    /// Lifecycle in [`PluginState::Initialized`].
    #[must_use]
    pub fn new(id: NamespaceId) -> Self {
        Self {
            id,
            state: Mutex::new(PluginState::Initialized),
        }
    }

    /// Plugin id.
    #[must_use]
    pub fn id(&self) -> &NamespaceId {
        &self.id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PluginState {
        *self.state.lock()
    }

    /// Enters the active state of `action`.
    ///
    /// The returned guard must be completed or failed. Dropping it
    /// unfinished (for example when the callback future is cancelled)
    /// counts as failure.
    ///
    /// # Errors
    ///
    /// - [`PluginError::InProgress`] if another action is running.
    /// - [`PluginError::IllegalState`] if the state is not the action's
    ///   starting state.
    pub fn begin(&self, action: PluginAction) -> Result<Transition<'_>, PluginError> {
        let mut state = self.state.lock();
        if state.is_active() {
            return Err(PluginError::InProgress {
                id: self.id.clone(),
                action,
                state: *state,
            });
        }
        if *state != action.from_state() {
            return Err(PluginError::IllegalState {
                id: self.id.clone(),
                action,
                state: *state,
            });
        }
        *state = action.active_state();
        debug!(plugin = %self.id, %action, state = %*state, "lifecycle action started");
        Ok(Transition {
            lifecycle: self,
            action,
            finished: false,
        })
    }

    /// Returns an error state to [`PluginState::Initialized`].
    ///
    /// # Errors
    ///
    /// [`PluginError::NotRecoverable`] unless the plugin is in an error state.
    pub fn recover(&self) -> Result<PluginState, PluginError> {
        let mut state = self.state.lock();
        if !state.is_error() {
            return Err(PluginError::NotRecoverable {
                id: self.id.clone(),
                state: *state,
            });
        }
        let previous = *state;
        *state = PluginState::Initialized;
        info!(plugin = %self.id, from = %previous, "recovered from error state");
        Ok(previous)
    }
}

/// An action in progress. See [`Lifecycle::begin`].
#[derive(Debug)]
#[must_use = "a transition left unfinished moves the plugin to its error state"]
pub struct Transition<'a> {
    lifecycle: &'a Lifecycle,
    action: PluginAction,
    finished: bool,
}

impl Transition<'_> {
    /// The running action.
    pub fn action(&self) -> PluginAction {
        self.action
    }

    /// Moves to the action's done state.
    pub fn complete(mut self) {
        self.finish(self.action.done_state());
    }

    /// Moves to the action's error state.
    pub fn fail(mut self) {
        self.finish(self.action.error_state());
    }

    fn finish(&mut self, to: PluginState) {
        *self.lifecycle.state.lock() = to;
        self.finished = true;
        debug!(plugin = %self.lifecycle.id, action = %self.action, state = %to, "lifecycle action finished");
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(plugin = %self.lifecycle.id, action = %self.action, "lifecycle action dropped unfinished");
            let to = self.action.error_state();
            self.finish(to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> Lifecycle {
        Lifecycle::new("acme:tool".parse().unwrap())
    }

    fn drive(lifecycle: &Lifecycle, action: PluginAction) {
        lifecycle.begin(action).unwrap().complete();
    }

    #[test]
    fn full_cycle() {
        let lc = lifecycle();
        for (action, expected) in [
            (PluginAction::Load, PluginState::Loaded),
            (PluginAction::Enable, PluginState::Enabled),
            (PluginAction::Disable, PluginState::Disabled),
            (PluginAction::Unload, PluginState::Initialized),
        ] {
            drive(&lc, action);
            assert_eq!(lc.state(), expected);
        }
    }

    #[test]
    fn actions_need_their_start_state() {
        let lc = lifecycle();
        for action in [PluginAction::Enable, PluginAction::Disable, PluginAction::Unload] {
            assert!(matches!(
                lc.begin(action),
                Err(PluginError::IllegalState { state: PluginState::Initialized, .. })
            ));
        }
        assert_eq!(lc.state(), PluginState::Initialized);
    }

    #[test]
    fn reentry_is_refused() {
        let lc = lifecycle();
        let running = lc.begin(PluginAction::Load).unwrap();
        assert!(matches!(
            lc.begin(PluginAction::Load),
            Err(PluginError::InProgress { state: PluginState::Loading, .. })
        ));
        running.complete();
        assert_eq!(lc.state(), PluginState::Loaded);
    }

    #[test]
    fn failure_and_recover() {
        let lc = lifecycle();
        drive(&lc, PluginAction::Load);
        lc.begin(PluginAction::Enable).unwrap().fail();
        assert_eq!(lc.state(), PluginState::EnablingError);
        assert!(lc.begin(PluginAction::Enable).is_err());

        assert_eq!(lc.recover().unwrap(), PluginState::EnablingError);
        assert_eq!(lc.state(), PluginState::Initialized);
        assert!(lc.recover().is_err());
    }

    #[test]
    fn dropped_transition_counts_as_failure() {
        let lc = lifecycle();
        {
            let _pending = lc.begin(PluginAction::Load).unwrap();
        }
        assert_eq!(lc.state(), PluginState::LoadingError);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn transitions_are_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let lc = lifecycle();
            drive(&lc, PluginAction::Load);
            drop(lc.begin(PluginAction::Enable).unwrap());
            lc.recover().unwrap();
        });

        let output = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(output.contains("lifecycle action started"));
        assert!(output.contains("state=LOADED"));
        assert!(output.contains("lifecycle action dropped unfinished"));
        assert!(output.contains("recovered from error state"));
        assert!(output.contains("from=ENABLING_ERROR"));
    }

    #[test]
    fn state_wire_names() {
        assert_eq!(
            serde_json::to_value(PluginState::UnloadingError).unwrap(),
            serde_json::json!("UNLOADING_ERROR")
        );
        assert_eq!(PluginState::DisablingError.to_string(), "DISABLING_ERROR");
    }
}
