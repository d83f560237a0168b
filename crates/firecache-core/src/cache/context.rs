//! Listener options and calling-context resolution.
//!
//! Every consumer callback receives an `Option<&C>` as its first argument:
//! the calling context the listener was registered with. The slot that
//! carries the cancel callback may instead carry a context, and a separate
//! explicit context may also be supplied. [`resolve_context`] decides which
//! context, if any, is bound.

use std::fmt;
use std::sync::Arc;

use crate::database::CancelHandler;
use crate::error::DatabaseError;

/// Cancel callback, bound to the resolved context.
pub type CancelCallback<C> = Arc<dyn Fn(Option<&C>, &DatabaseError) + Send + Sync>;

/// The overloaded slot: either a genuine cancel callback or a context.
pub enum CancelOrContext<C> {
    Cancel(CancelCallback<C>),
    Context(Arc<C>),
}

impl<C> Clone for CancelOrContext<C> {
    fn clone(&self) -> Self {
        match self {
            CancelOrContext::Cancel(cb) => CancelOrContext::Cancel(Arc::clone(cb)),
            CancelOrContext::Context(ctx) => CancelOrContext::Context(Arc::clone(ctx)),
        }
    }
}

impl<C> fmt::Debug for CancelOrContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelOrContext::Cancel(_) => f.write_str("Cancel(..)"),
            CancelOrContext::Context(_) => f.write_str("Context(..)"),
        }
    }
}

/// Pick the context callbacks are bound to.
///
/// - neither given: no context
/// - only the slot given: the slot, when it holds a context
/// - both given: the explicit context
pub fn resolve_context<C>(
    cancel_or_context: Option<&CancelOrContext<C>>,
    context: Option<&Arc<C>>,
) -> Option<Arc<C>> {
    match (cancel_or_context, context) {
        (None, None) => None,
        (Some(CancelOrContext::Context(slot)), None) => Some(Arc::clone(slot)),
        // A cancel callback cannot serve as a context.
        (Some(CancelOrContext::Cancel(_)), None) => None,
        (_, Some(explicit)) => Some(Arc::clone(explicit)),
    }
}

/// Invoke a one-argument callback with the context resolved from the two
/// optional arguments.
pub fn call_with_context<C, A>(
    callback: impl FnOnce(Option<&C>, A),
    cancel_or_context: Option<&CancelOrContext<C>>,
    context: Option<&Arc<C>>,
    arg: A,
) {
    let bound = resolve_context(cancel_or_context, context);
    callback(bound.as_deref(), arg);
}

/// Optional arguments shared by every listen operation.
pub struct ListenOptions<C = ()> {
    pub cancel_or_context: Option<CancelOrContext<C>>,
    pub context: Option<Arc<C>>,
}

impl<C> ListenOptions<C> {
    pub fn new() -> Self {
        Self {
            cancel_or_context: None,
            context: None,
        }
    }

    /// Options whose overloaded slot carries a context.
    pub fn with_context(context: Arc<C>) -> Self {
        Self {
            cancel_or_context: Some(CancelOrContext::Context(context)),
            context: None,
        }
    }

    /// Set the cancel callback.
    pub fn on_cancel<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&C>, &DatabaseError) + Send + Sync + 'static,
    {
        self.cancel_or_context = Some(CancelOrContext::Cancel(Arc::new(callback)));
        self
    }

    /// Set the explicit context, which overrides a context in the slot.
    pub fn bind(mut self, context: Arc<C>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn bound_context(&self) -> Option<Arc<C>> {
        resolve_context(self.cancel_or_context.as_ref(), self.context.as_ref())
    }

    /// The cancel callback, if the slot holds a genuine one.
    pub fn cancel_callback(&self) -> Option<CancelCallback<C>> {
        match &self.cancel_or_context {
            Some(CancelOrContext::Cancel(cb)) => Some(Arc::clone(cb)),
            _ => None,
        }
    }

    pub fn call<A>(&self, callback: impl FnOnce(Option<&C>, A), arg: A) {
        call_with_context(callback, self.cancel_or_context.as_ref(), self.context.as_ref(), arg);
    }
}

impl<C: Send + Sync + 'static> ListenOptions<C> {
    /// Cancel handler for the remote source, bound to the resolved context.
    /// `None` unless a genuine cancel callback was supplied.
    pub(crate) fn cancel_handler(&self, key: String) -> Option<CancelHandler> {
        let callback = self.cancel_callback()?;
        let context = self.bound_context();
        Some(Box::new(move |error: DatabaseError| {
            tracing::warn!(key = %key, error = %error, "Listener cancelled");
            callback(context.as_deref(), &error);
        }))
    }
}

impl<C> Default for ListenOptions<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for ListenOptions<C> {
    fn clone(&self) -> Self {
        Self {
            cancel_or_context: self.cancel_or_context.clone(),
            context: self.context.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, PartialEq)]
    struct Ctx(&'static str);

    fn capture(options: &ListenOptions<Ctx>) -> Option<&'static str> {
        let seen = Mutex::new(None);
        options.call(|ctx: Option<&Ctx>, _: ()| *seen.lock() = ctx.map(|c| c.0), ());
        seen.into_inner()
    }

    #[test]
    fn test_no_context_args() {
        let options: ListenOptions<Ctx> = ListenOptions::new();
        assert_eq!(capture(&options), None);
        assert!(options.cancel_callback().is_none());
    }

    #[test]
    fn test_slot_context_is_bound() {
        let options = ListenOptions::with_context(Arc::new(Ctx("slot")));
        assert_eq!(capture(&options), Some("slot"));
        assert!(options.cancel_callback().is_none());
    }

    #[test]
    fn test_cancel_in_slot_binds_nothing() {
        let options: ListenOptions<Ctx> = ListenOptions::new().on_cancel(|_, _| {});
        assert_eq!(capture(&options), None);
        assert!(options.cancel_callback().is_some());
    }

    #[test]
    fn test_explicit_context_wins_over_cancel() {
        let options = ListenOptions::new()
            .on_cancel(|_, _| {})
            .bind(Arc::new(Ctx("explicit")));
        assert_eq!(capture(&options), Some("explicit"));
    }

    #[test]
    fn test_explicit_context_wins_over_slot_context() {
        let options = ListenOptions::with_context(Arc::new(Ctx("slot"))).bind(Arc::new(Ctx("explicit")));
        assert_eq!(capture(&options), Some("explicit"));
    }

    #[test]
    fn test_resolve_context_is_pure() {
        let explicit = Arc::new(Ctx("explicit"));
        assert!(resolve_context::<Ctx>(None, None).is_none());
        assert_eq!(resolve_context::<Ctx>(None, Some(&explicit)).as_deref(), Some(&Ctx("explicit")));
    }

    #[test]
    fn test_cancel_handler_binds_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = ListenOptions::new()
            .on_cancel(move |ctx: Option<&Ctx>, err: &DatabaseError| {
                sink.lock().push((ctx.map(|c| c.0), err.code.clone()));
            })
            .bind(Arc::new(Ctx("explicit")));

        let handler = options.cancel_handler("items".to_string()).unwrap();
        handler(DatabaseError::permission_denied("items"));
        assert_eq!(*seen.lock(), vec![(Some("explicit"), "permission_denied".to_string())]);
    }
}
