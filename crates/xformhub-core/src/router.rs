//! Namespace router
//!
//! Maps an XML namespace to the ordered list of handlers interested in
//! submissions of that namespace. A handler is identified by its name; a
//! (namespace, handler) pair is either registered or not.
//!
//! Dispatch snapshots the handler list under the read lock and invokes the
//! handlers after releasing it, so a handler may itself register or
//! unregister routes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::errors::ExError;
use xformhub_core_types::RequestId;

/// A submitted document as handed over by the receiver pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Receiver-assigned attachment id, if any
    pub id: Option<String>,
    pub domain: String,
    /// Raw instance XML; never modified
    pub content: String,
    pub request_id: RequestId,
}

impl Attachment {
    pub fn new(domain: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            domain: domain.into(),
            content: content.into(),
            request_id: RequestId::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Something that wants to see submissions of a namespace
#[allow(clippy::result_large_err)]
pub trait SubmissionHandler: Send + Sync {
    /// Stable identity used for registration membership
    fn name(&self) -> &str;

    /// Handle one submission; returns whether the handler took it
    ///
    /// # Errors
    ///
    /// Any error aborts the dispatch and is returned from
    /// [`NamespaceRouter::process`].
    fn handle(
        &self,
        attachment: &Attachment,
        namespace: &str,
        version: Option<u32>,
    ) -> Result<bool, ExError>;
}

type HandlerFn = dyn Fn(&Attachment, &str, Option<u32>) -> Result<bool, ExError> + Send + Sync;

/// Adapter turning a closure into a named handler
pub struct FnHandler {
    name: String,
    f: Box<HandlerFn>,
}

impl FnHandler {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Attachment, &str, Option<u32>) -> Result<bool, ExError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl SubmissionHandler for FnHandler {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::result_large_err)]
    fn handle(
        &self,
        attachment: &Attachment,
        namespace: &str,
        version: Option<u32>,
    ) -> Result<bool, ExError> {
        (self.f)(attachment, namespace, version)
    }
}

/// Process-scoped registry of namespace routes, shared by `Arc`
#[derive(Default)]
pub struct NamespaceRouter {
    routes: RwLock<HashMap<String, Vec<Arc<dyn SubmissionHandler>>>>,
}

impl NamespaceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Arc<dyn SubmissionHandler>>>> {
        // a panicking handler never runs under the lock, the map is intact
        self.routes.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Arc<dyn SubmissionHandler>>>> {
        self.routes.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `handler` for `namespace`
    ///
    /// Returns `false` when a handler with the same name was already
    /// registered there, in which case nothing changes.
    pub fn register(&self, namespace: &str, handler: Arc<dyn SubmissionHandler>) -> bool {
        let mut routes = self.write();
        let handlers = routes.entry(namespace.to_string()).or_default();
        if handlers.iter().any(|h| h.name() == handler.name()) {
            return false;
        }
        tracing::debug!(namespace, handler = handler.name(), "registered route");
        handlers.push(handler);
        true
    }

    /// Remove the named handler from `namespace`; returns whether it was there
    pub fn unregister(&self, namespace: &str, handler_name: &str) -> bool {
        let mut routes = self.write();
        let Some(handlers) = routes.get_mut(namespace) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|h| h.name() != handler_name);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            routes.remove(namespace);
        }
        if removed {
            tracing::debug!(namespace, handler = handler_name, "unregistered route");
        }
        removed
    }

    pub fn is_registered(&self, namespace: &str, handler_name: &str) -> bool {
        self.read()
            .get(namespace)
            .map(|handlers| handlers.iter().any(|h| h.name() == handler_name))
            .unwrap_or(false)
    }

    /// Handler names registered on `namespace`, in registration order
    pub fn handlers(&self, namespace: &str) -> Vec<String> {
        self.read()
            .get(namespace)
            .map(|handlers| handlers.iter().map(|h| h.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Namespaces with at least one handler, sorted
    pub fn registered_namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self.read().keys().cloned().collect();
        namespaces.sort();
        namespaces
    }

    /// Dispatch a submission to every handler of `namespace`
    ///
    /// Handlers run in registration order on the caller's thread. An unknown
    /// namespace is a no-op. Returns the number of handlers that took the
    /// submission; a handler that declines is not counted.
    ///
    /// # Errors
    ///
    /// The first handler error stops the dispatch and is returned as is.
    #[allow(clippy::result_large_err)]
    pub fn process(
        &self,
        attachment: &Attachment,
        namespace: &str,
        version: Option<u32>,
    ) -> Result<usize, ExError> {
        let handlers: Vec<Arc<dyn SubmissionHandler>> =
            self.read().get(namespace).cloned().unwrap_or_default();

        if handlers.is_empty() {
            tracing::debug!(namespace, "no handlers registered, ignoring submission");
            return Ok(0);
        }

        let mut taken = 0;
        for handler in &handlers {
            tracing::debug!(
                namespace,
                handler = handler.name(),
                request_id = %attachment.request_id,
                "dispatching submission"
            );
            if handler.handle(attachment, namespace, version)? {
                taken += 1;
            } else {
                tracing::debug!(namespace, handler = handler.name(), "handler declined submission");
            }
        }
        Ok(taken)
    }

    /// Drop every route
    pub fn reset(&self) {
        self.write().clear();
    }
}

impl std::fmt::Debug for NamespaceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: HashMap<String, Vec<String>> = self
            .read()
            .iter()
            .map(|(ns, hs)| (ns.clone(), hs.iter().map(|h| h.name().to_string()).collect()))
            .collect();
        f.debug_struct("NamespaceRouter").field("routes", &routes).finish()
    }
}
