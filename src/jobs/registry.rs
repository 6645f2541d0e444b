//! Task type to handler mapping.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::middleware::Middleware;
use super::payloads::TaskPayload;
use super::task::{TaskMessage, TaskType};
use super::JobError;

/// Executes one task attempt.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &TaskMessage) -> Result<(), JobError>;
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>;

/// Adapts an async function over a typed payload into a [`TaskHandler`].
///
/// A payload that does not decode, or fails its own validation, is a
/// permanent failure.
pub struct TypedHandler<P, F> {
    func: F,
    _payload: PhantomData<fn(P)>,
}

impl<P, F> TypedHandler<P, F>
where
    P: TaskPayload,
    F: Fn(P) -> HandlerFuture + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<P, F> TaskHandler for TypedHandler<P, F>
where
    P: TaskPayload,
    F: Fn(P) -> HandlerFuture + Send + Sync,
{
    async fn handle(&self, task: &TaskMessage) -> Result<(), JobError> {
        let payload: P = serde_json::from_value(task.payload.clone()).map_err(|e| {
            JobError::skip(format!("invalid {} payload: {e}", P::TASK_TYPE))
        })?;
        payload.validate()?;
        (self.func)(payload).await
    }
}

/// Registered handlers, each already wrapped in the middleware stack.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware layer. Layers added first run outermost.
    /// Must be called before handlers are registered.
    pub fn with_middleware(mut self, layer: Arc<dyn Middleware>) -> Self {
        self.middleware.push(layer);
        self
    }

    pub fn register(&mut self, task_type: TaskType, handler: Arc<dyn TaskHandler>) {
        let wrapped = self
            .middleware
            .iter()
            .rev()
            .fold(handler, |inner, layer| layer.wrap(task_type, inner));
        self.handlers.insert(task_type.as_str().to_string(), wrapped);
    }

    /// Register an async function over a typed payload.
    pub fn handle<P, F, Fut>(&mut self, func: F)
    where
        P: TaskPayload,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let boxed = move |payload: P| -> HandlerFuture { Box::pin(func(payload)) };
        self.register(P::TASK_TYPE, Arc::new(TypedHandler::<P, _>::new(boxed)));
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::payloads::MarkAllReadRequest;
    use crate::jobs::task::TaskOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[tokio::test]
    async fn typed_handler_decodes_payload() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let mut registry = HandlerRegistry::new();
        registry.handle(move |payload: MarkAllReadRequest| {
            let counter = counter.clone();
            async move {
                assert_eq!(payload.user_id, Uuid::nil());
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let task = TaskMessage::new(
            TaskType::NotificationMarkAllRead,
            serde_json::json!({ "user_id": Uuid::nil() }),
            &TaskOptions::default(),
        );
        let handler = registry.get("notification:mark_all_read").unwrap();
        handler.handle(&task).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undecodable_payload_skips_retry() {
        let mut registry = HandlerRegistry::new();
        registry.handle(|_: MarkAllReadRequest| async { Ok(()) });

        let task = TaskMessage::new(
            TaskType::NotificationMarkAllRead,
            serde_json::json!({ "user": "nobody" }),
            &TaskOptions::default(),
        );
        let err = registry
            .get(TaskType::NotificationMarkAllRead.as_str())
            .unwrap()
            .handle(&task)
            .await
            .unwrap_err();
        assert!(err.is_skip_retry());
        assert!(registry.get("email:welcome").is_none());
    }
}
