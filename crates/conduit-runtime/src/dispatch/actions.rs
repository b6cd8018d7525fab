//! Action registry: declared actions and their per-mode handlers.
//!
//! ```text
//! "acme:echo" ── descriptor (parameter, result, owner)
//!             ├── sync  → adapter
//!             └── async → adapter
//! ```
//!
//! An adapter decodes the argument with the action's parameter
//! descriptor, calls the typed handler and encodes its result. Handlers
//! run on their own task under the registry's [`Supervisor`], so a panic
//! stays contained. A timeout or a dropped caller aborts the task.
//! Cancelling the supervisor stops async handlers still in flight.

use crate::supervisor::Supervisor;
use crate::PlatformError;
use conduit_protocol::{
    Action, ActionDescriptor, ActionError, ReceiptPacket, ReceiptState, RequestMode,
    RequestPacket,
};
use conduit_types::{Cause, PacketId, SessionId};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

/// Error type returned by action handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler knows about the request it serves.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Action name.
    pub action: String,
    /// Invocation mode.
    pub mode: RequestMode,
    /// Request packet id.
    pub request: PacketId,
    /// Session of the request, if any.
    pub session: Option<SessionId>,
    /// Cause carried by the request.
    pub cause: Option<Cause>,
}

impl ActionContext {
    fn of(request: &RequestPacket) -> Self {
        Self {
            action: request.action.clone(),
            mode: request.mode,
            request: request.header.id,
            session: request.header.session,
            cause: request.header.cause.clone(),
        }
    }

    /// Cause to attach to work done on behalf of this request.
    #[must_use]
    pub fn follow_up(&self) -> Cause {
        let cause = Cause::packet(self.request);
        match &self.cause {
            Some(parent) => cause.because(parent.clone()),
            None => cause,
        }
    }
}

type Adapter =
    Arc<dyn Fn(RequestPacket, ActionContext) -> BoxFuture<'static, Result<Value, ActionError>> + Send + Sync>;

struct Declared {
    descriptor: ActionDescriptor,
    adapters: BTreeMap<RequestMode, Adapter>,
}

/// Named actions and the handlers serving them.
///
/// # Example
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use conduit_protocol::{Action, ReceiptState, RequestMode, RequestPacket};
/// use conduit_runtime::ActionRegistry;
/// use conduit_types::Subject;
/// use std::time::Duration;
///
/// let registry = ActionRegistry::new();
/// let echo: Action<String, String> = Action::new("acme:echo", Subject::Platform);
/// registry
///     .handle(&echo, RequestMode::Sync, |text: String, _ctx| async move {
///         Ok(text.to_uppercase())
///     })
///     .unwrap();
///
/// let request = RequestPacket::new("acme:echo", RequestMode::Sync, 1_000)
///     .with_argument("hi".to_string())
///     .unwrap();
/// let receipt = registry.invoke(&request, Duration::from_secs(1)).await.unwrap();
/// assert_eq!(receipt.state, ReceiptState::Succeed);
/// assert_eq!(receipt.data().and_then(|v| v.as_str()), Some("HI"));
/// # }
/// ```
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Declared>>,
    supervisor: Supervisor,
}

impl ActionRegistry {
    /// Empty registry with its own root supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry whose handler tasks run under `supervisor`.
    #[must_use]
    pub fn with_supervisor(supervisor: Supervisor) -> Self {
        Self {
            actions: RwLock::default(),
            supervisor,
        }
    }

    /// Scope of the handler tasks.
    #[must_use]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Declares an action without attaching a handler.
    ///
    /// Declaring the same descriptor twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`PlatformError::ActionConflict`] if the name is declared with
    /// different descriptors.
    pub fn declare<P, R>(&self, action: &Action<P, R>) -> Result<(), PlatformError> {
        let descriptor = action.descriptor();
        let mut actions = self.actions.write();
        match actions.get(action.name()) {
            Some(existing) if existing.descriptor != descriptor => {
                Err(PlatformError::ActionConflict {
                    action: action.name().to_string(),
                })
            }
            Some(_) => Ok(()),
            None => {
                actions.insert(
                    action.name().to_string(),
                    Declared {
                        descriptor,
                        adapters: BTreeMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Attaches a typed handler for `mode`, declaring the action if needed.
    ///
    /// The handler receives the argument decoded with the action's
    /// parameter descriptor. An absent optional argument is decoded from
    /// `null`, so `()` and `Option<T>` parameters need no special casing.
    ///
    /// # Errors
    ///
    /// - [`PlatformError::ActionConflict`] if the name is declared with
    ///   different descriptors.
    /// - [`PlatformError::DuplicateAdapter`] if `mode` already has a handler.
    pub fn handle<P, R, F, Fut>(
        &self,
        action: &Action<P, R>,
        mode: RequestMode,
        handler: F,
    ) -> Result<(), PlatformError>
    where
        P: DeserializeOwned + Clone + Send + Sync + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P, ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        self.declare(action)?;

        let parameter = action.parameter().clone();
        let handler = Arc::new(handler);
        let adapter: Adapter = Arc::new(move |request: RequestPacket, ctx: ActionContext| {
            let handler = Arc::clone(&handler);
            let parameter = parameter.clone();
            async move {
                let action = ctx.action.clone();
                let argument: P = match request.decode_argument::<P>(&parameter) {
                    Ok(Some(argument)) => argument,
                    Ok(None) => P::deserialize(Value::Null).map_err(|e| {
                        ActionError::InvalidArgument {
                            action: action.clone(),
                            message: e.to_string(),
                        }
                    })?,
                    Err(e) => {
                        return Err(ActionError::InvalidArgument {
                            action,
                            message: e.to_string(),
                        })
                    }
                };
                let result = (*handler)(argument, ctx).await.map_err(|e| {
                    ActionError::InternalActionHandlerError {
                        action: action.clone(),
                        message: e.to_string(),
                    }
                })?;
                serde_json::to_value(result).map_err(|e| ActionError::InternalActionHandlerError {
                    action,
                    message: format!("result encoding failed: {e}"),
                })
            }
            .boxed()
        });

        let mut actions = self.actions.write();
        let declared = actions
            .get_mut(action.name())
            .ok_or_else(|| PlatformError::ActionNotFound {
                action: action.name().to_string(),
            })?;
        if declared.adapters.contains_key(&mode) {
            return Err(PlatformError::DuplicateAdapter {
                action: action.name().to_string(),
                mode,
            });
        }
        declared.adapters.insert(mode, adapter);
        debug!(action = action.name(), %mode, "action handler registered");
        Ok(())
    }

    /// Removes an action and all its handlers.
    ///
    /// # Errors
    ///
    /// [`PlatformError::ActionNotFound`] if the name is not declared.
    pub fn remove(&self, name: &str) -> Result<ActionDescriptor, PlatformError> {
        self.actions
            .write()
            .remove(name)
            .map(|declared| declared.descriptor)
            .ok_or_else(|| PlatformError::ActionNotFound {
                action: name.to_string(),
            })
    }

    /// Detaches the handler for one mode; the action stays declared.
    ///
    /// # Errors
    ///
    /// [`PlatformError::ActionNotFound`] if there is no such handler.
    pub fn remove_handler(&self, name: &str, mode: RequestMode) -> Result<(), PlatformError> {
        let removed = self
            .actions
            .write()
            .get_mut(name)
            .and_then(|declared| declared.adapters.remove(&mode));
        match removed {
            Some(_) => Ok(()),
            None => Err(PlatformError::ActionNotFound {
                action: name.to_string(),
            }),
        }
    }

    /// Descriptor of a declared action.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<ActionDescriptor> {
        self.actions
            .read()
            .get(name)
            .map(|declared| declared.descriptor.clone())
    }

    /// All declared actions, sorted by name.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        let mut all: Vec<_> = self
            .actions
            .read()
            .values()
            .map(|declared| declared.descriptor.clone())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Modes with a handler, sorted. Empty for unknown actions.
    #[must_use]
    pub fn modes(&self, name: &str) -> Vec<RequestMode> {
        self.actions
            .read()
            .get(name)
            .map(|declared| declared.adapters.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Runs the handler for `request` and builds the receipt.
    ///
    /// Sync requests get a `succeed` receipt carrying the result; dropping
    /// the returned future aborts the handler. Async requests get a
    /// `received` receipt at once while the handler keeps running under the
    /// registry's supervisor until it finishes or the supervisor is
    /// cancelled; its failures are only logged.
    ///
    /// # Errors
    ///
    /// - [`ActionError::UnsupportedRequestAction`] for unknown names.
    /// - [`ActionError::AdapterNotFound`] for actions without any handler.
    /// - [`ActionError::UnsupportedRequestMode`] when other modes have one.
    /// - [`ActionError::InvalidArgument`] if the argument does not decode.
    /// - [`ActionError::InternalActionHandlerError`] if the handler fails
    ///   or panics.
    /// - [`ActionError::ActionHandlerTimeout`] if it outlives `timeout`;
    ///   the handler task is aborted.
    pub async fn invoke(
        &self,
        request: &RequestPacket,
        timeout: Duration,
    ) -> Result<ReceiptPacket, ActionError> {
        let adapter = self.adapter(&request.action, request.mode)?;
        let ctx = ActionContext::of(request);

        match request.mode {
            RequestMode::Sync => {
                let data = run(&self.supervisor, adapter, request.clone(), ctx, timeout).await?;
                Ok(ReceiptPacket::reply(&request.header, ReceiptState::Succeed).with_data_tree(data))
            }
            RequestMode::Async => {
                let packet = request.clone();
                let supervisor = self.supervisor.clone();
                let token = supervisor.token().clone();
                self.supervisor.spawn(async move {
                    let action = ctx.action.clone();
                    tokio::select! {
                        () = token.cancelled() => {
                            debug!(%action, "async action handler cancelled");
                        }
                        result = run(&supervisor, adapter, packet, ctx, timeout) => {
                            if let Err(err) = result {
                                warn!(error = %err, "async action handler failed");
                            }
                        }
                    }
                });
                Ok(ReceiptPacket::reply(&request.header, ReceiptState::Received))
            }
        }
    }

    fn adapter(&self, name: &str, mode: RequestMode) -> Result<Adapter, ActionError> {
        let actions = self.actions.read();
        let Some(declared) = actions.get(name) else {
            return Err(ActionError::UnsupportedRequestAction {
                action: name.to_string(),
            });
        };
        if declared.adapters.is_empty() {
            return Err(ActionError::AdapterNotFound {
                action: name.to_string(),
            });
        }
        declared
            .adapters
            .get(&mode)
            .cloned()
            .ok_or_else(|| ActionError::UnsupportedRequestMode {
                action: name.to_string(),
                mode,
                supported: declared.adapters.keys().copied().collect(),
            })
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let actions = self.actions.read();
        let mut names: Vec<_> = actions.keys().collect();
        names.sort();
        f.debug_struct("ActionRegistry")
            .field("actions", &names)
            .finish()
    }
}

async fn run(
    supervisor: &Supervisor,
    adapter: Adapter,
    request: RequestPacket,
    ctx: ActionContext,
    timeout: Duration,
) -> Result<Value, ActionError> {
    let action = ctx.action.clone();
    let mut task = AbortOnDropHandle::new(supervisor.spawn(adapter(request, ctx)));
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(ActionError::InternalActionHandlerError {
            action,
            message: if join.is_panic() {
                "handler panicked".to_string()
            } else {
                "handler task cancelled".to_string()
            },
        }),
        Err(_) => {
            task.abort();
            Err(ActionError::ActionHandlerTimeout {
                action,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_protocol::TypeDescriptor;
    use conduit_types::Subject;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn echo() -> Action<String, String> {
        Action::new("test:echo", Subject::test("actions"))
    }

    fn request(action: &str, mode: RequestMode) -> RequestPacket {
        RequestPacket::new(action, mode, 1_000)
    }

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn sync_handler_result_in_receipt() {
        let registry = ActionRegistry::new();
        registry
            .handle(&echo(), RequestMode::Sync, |text: String, ctx| async move {
                Ok(format!("{}:{text}", ctx.action))
            })
            .unwrap();

        let req = request("test:echo", RequestMode::Sync)
            .with_argument("x".to_string())
            .unwrap();
        let receipt = registry.invoke(&req, SECOND).await.unwrap();
        assert_eq!(receipt.target, req.header.id);
        assert_eq!(receipt.state, ReceiptState::Succeed);
        assert_eq!(receipt.data().and_then(Value::as_str), Some("test:echo:x"));
    }

    #[tokio::test]
    async fn unknown_action() {
        let registry = ActionRegistry::new();
        let err = registry
            .invoke(&request("test:nope", RequestMode::Sync), SECOND)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "unsupported_request_action");
    }

    #[tokio::test]
    async fn declared_without_handler() {
        let registry = ActionRegistry::new();
        registry.declare(&echo()).unwrap();
        let err = registry
            .invoke(&request("test:echo", RequestMode::Sync), SECOND)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "adapter_not_found");
    }

    #[tokio::test]
    async fn wrong_mode_lists_supported() {
        let registry = ActionRegistry::new();
        registry
            .handle(&echo(), RequestMode::Async, |t: String, _| async move { Ok(t) })
            .unwrap();
        let err = registry
            .invoke(&request("test:echo", RequestMode::Sync), SECOND)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ActionError::UnsupportedRequestMode {
                action: "test:echo".into(),
                mode: RequestMode::Sync,
                supported: vec![RequestMode::Async],
            }
        );
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid() {
        let registry = ActionRegistry::new();
        registry
            .handle(&echo(), RequestMode::Sync, |t: String, _| async move { Ok(t) })
            .unwrap();
        let err = registry
            .invoke(&request("test:echo", RequestMode::Sync), SECOND)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "invalid_argument");
    }

    #[tokio::test]
    async fn unit_parameter_accepts_absent_argument() {
        let registry = ActionRegistry::new();
        let ping: Action<(), String> =
            Action::new("test:ping", Subject::Platform).with_parameter(TypeDescriptor::unit());
        registry
            .handle(&ping, RequestMode::Sync, |(), _| async { Ok("pong".to_string()) })
            .unwrap();
        let receipt = registry
            .invoke(&request("test:ping", RequestMode::Sync), SECOND)
            .await
            .unwrap();
        assert_eq!(receipt.data().and_then(Value::as_str), Some("pong"));
    }

    #[tokio::test]
    async fn handler_error_stays_local() {
        let registry = ActionRegistry::new();
        registry
            .handle(&echo(), RequestMode::Sync, |_: String, _| async move {
                Err::<String, HandlerError>("database password rejected".into())
            })
            .unwrap();
        let req = request("test:echo", RequestMode::Sync)
            .with_argument("x".to_string())
            .unwrap();
        let err = registry.invoke(&req, SECOND).await.unwrap_err();
        assert_eq!(err.id(), "internal_action_handler_error");
        assert!(!serde_json::to_string(&err.context())
            .unwrap()
            .contains("password"));
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let registry = ActionRegistry::new();
        registry
            .handle(&echo(), RequestMode::Sync, |_: String, _| async move {
                if true {
                    panic!("handler bug");
                }
                Ok(String::new())
            })
            .unwrap();
        let req = request("test:echo", RequestMode::Sync)
            .with_argument("x".to_string())
            .unwrap();
        let err = registry.invoke(&req, SECOND).await.unwrap_err();
        assert!(matches!(
            err,
            ActionError::InternalActionHandlerError { ref message, .. } if message == "handler panicked"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out_and_is_aborted() {
        let registry = ActionRegistry::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        registry
            .handle(&echo(), RequestMode::Sync, move |t: String, _| {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(t)
                }
            })
            .unwrap();
        let req = request("test:echo", RequestMode::Sync)
            .with_argument("x".to_string())
            .unwrap();

        let err = registry
            .invoke(&req, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ActionError::ActionHandlerTimeout {
                action: "test:echo".into(),
                timeout_ms: 50,
            }
        );

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    fn sleepy(registry: &ActionRegistry, mode: RequestMode) -> Arc<AtomicBool> {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        registry
            .handle(&echo(), mode, move |t: String, _| {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(t)
                }
            })
            .unwrap();
        finished
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_caller_aborts_handler() {
        let registry = ActionRegistry::new();
        let finished = sleepy(&registry, RequestMode::Sync);
        let req = request("test:echo", RequestMode::Sync)
            .with_argument("x".to_string())
            .unwrap();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            registry.invoke(&req, Duration::from_secs(600)),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert_eq!(registry.supervisor().task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_supervisor_stops_async_handler() {
        let registry = ActionRegistry::with_supervisor(Supervisor::new());
        let finished = sleepy(&registry, RequestMode::Async);
        let req = request("test:echo", RequestMode::Async)
            .with_argument("x".to_string())
            .unwrap();

        let receipt = registry.invoke(&req, Duration::from_secs(600)).await.unwrap();
        assert_eq!(receipt.state, ReceiptState::Received);
        assert!(registry.supervisor().task_count() > 0);

        registry.supervisor().shutdown().await;
        assert_eq!(registry.supervisor().task_count(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn async_mode_acknowledges_immediately() {
        let registry = ActionRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<String>();
        let tx = Arc::new(parking_lot::Mutex::new(Some(tx)));
        registry
            .handle(&echo(), RequestMode::Async, move |t: String, _| {
                let tx = Arc::clone(&tx);
                async move {
                    if let Some(tx) = tx.lock().take() {
                        let _ = tx.send(t.clone());
                    }
                    Ok(t)
                }
            })
            .unwrap();
        let req = request("test:echo", RequestMode::Async)
            .with_argument("later".to_string())
            .unwrap();

        let receipt = registry.invoke(&req, SECOND).await.unwrap();
        assert_eq!(receipt.state, ReceiptState::Received);
        assert!(!receipt.has_data());
        assert_eq!(rx.await.unwrap(), "later");
    }

    #[test]
    fn registration_rules() {
        let registry = ActionRegistry::new();
        registry
            .handle(&echo(), RequestMode::Sync, |t: String, _| async move { Ok(t) })
            .unwrap();
        assert!(matches!(
            registry.handle(&echo(), RequestMode::Sync, |t: String, _| async move { Ok(t) }),
            Err(PlatformError::DuplicateAdapter { .. })
        ));

        let clash: Action<u32, u32> = Action::new("test:echo", Subject::Platform);
        assert!(matches!(
            registry.declare(&clash),
            Err(PlatformError::ActionConflict { .. })
        ));

        assert_eq!(registry.modes("test:echo"), vec![RequestMode::Sync]);
        registry.remove_handler("test:echo", RequestMode::Sync).unwrap();
        assert!(registry.modes("test:echo").is_empty());
        assert!(registry.descriptor("test:echo").is_some());

        registry.remove("test:echo").unwrap();
        assert!(registry.remove("test:echo").is_err());
        assert!(registry.descriptors().is_empty());
    }
}
