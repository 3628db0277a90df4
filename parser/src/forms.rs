//! Form cache keyed by conversation and binding path.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use app_command_core::{Binding, CallContext, CallRequest, CallResponse, CallType, Form};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::backend::AppCaller;
use crate::error::FormError;

/// Cache key for a fetched form.
///
/// The same binding can expose a different form per channel or thread, so
/// both identifiers are part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormKey {
    pub channel_id: String,
    pub root_id: String,
    pub location: String,
}

impl FormKey {
    pub fn new(
        channel_id: impl Into<String>,
        root_id: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            root_id: root_id.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.channel_id, self.root_id, self.location)
    }
}

/// Supplies forms for leaf bindings that do not carry one inline.
#[async_trait]
pub trait FormSource: Send + Sync {
    /// Returns an already known form without fetching.
    fn get(&self, key: &FormKey) -> Option<Arc<Form>>;

    /// Returns the form for `key`, fetching it from the owning app if
    /// needed.
    async fn fetch(
        &self,
        key: &FormKey,
        binding: &Binding,
        context: &CallContext,
    ) -> Result<Arc<Form>, FormError>;
}

/// In-memory [`FormSource`] backed by an [`AppCaller`].
///
/// Each key owns a `OnceCell`, so concurrent parses of the same command
/// share one in-flight fetch. A failed fetch leaves the cell empty and the
/// next parse tries again.
pub struct FormCache {
    caller: Arc<dyn AppCaller>,
    entries: Mutex<HashMap<FormKey, Arc<OnceCell<Arc<Form>>>>>,
}

impl FormCache {
    pub fn new(caller: Arc<dyn AppCaller>) -> Self {
        Self {
            caller,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Stores a form under `key`, replacing any previous entry.
    pub fn insert(&self, key: FormKey, form: Form) {
        let cell = OnceCell::new_with(Some(Arc::new(form)));
        self.lock().insert(key, Arc::new(cell));
    }

    /// Number of keys with a cached form.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached form.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<FormKey, Arc<OnceCell<Arc<Form>>>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl FormSource for FormCache {
    fn get(&self, key: &FormKey) -> Option<Arc<Form>> {
        self.lock().get(key).and_then(|cell| cell.get().cloned())
    }

    async fn fetch(
        &self,
        key: &FormKey,
        binding: &Binding,
        context: &CallContext,
    ) -> Result<Arc<Form>, FormError> {
        let cell = Arc::clone(self.lock().entry(key.clone()).or_default());
        if let Some(form) = cell.get() {
            debug!(key = %key, "form cache hit");
            return Ok(Arc::clone(form));
        }

        debug!(key = %key, "form cache miss");
        let form = cell
            .get_or_try_init(|| fetch_form(self.caller.as_ref(), binding, context))
            .await
            .inspect_err(|err| warn!(key = %key, error = %err, "form fetch failed"))?;
        Ok(Arc::clone(form))
    }
}

/// Fetches the form of `binding` with a `form` call.
pub async fn fetch_form(
    caller: &dyn AppCaller,
    binding: &Binding,
    context: &CallContext,
) -> Result<Arc<Form>, FormError> {
    let call = binding.call.clone().ok_or_else(|| FormError::NoCall {
        location: context.location.clone(),
    })?;
    let request = CallRequest::new(call, context.clone());

    match caller.perform_call(&request, CallType::Form).await? {
        CallResponse::Form { form } => Ok(Arc::new(form)),
        CallResponse::Error { text } => Err(FormError::Remote(
            text.unwrap_or_else(|| "unknown error".to_string()),
        )),
        other => Err(FormError::UnexpectedResponse(other.type_name().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use app_command_core::{Call, Field, FieldType};

    use super::*;
    use crate::error::BackendError;

    struct CountingCaller {
        calls: AtomicUsize,
        response: CallResponse,
    }

    impl CountingCaller {
        fn new(response: CallResponse) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response,
            }
        }
    }

    #[async_trait]
    impl AppCaller for CountingCaller {
        async fn perform_call(
            &self,
            _request: &CallRequest,
            call_type: CallType,
        ) -> Result<CallResponse, BackendError> {
            assert_eq!(call_type, CallType::Form);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(self.response.clone())
        }
    }

    fn form() -> Form {
        Form::new(Call::new("/submit")).with_field(Field::new("name", FieldType::Text))
    }

    fn binding() -> Binding {
        Binding::new("create").with_call(Call::new("/form"))
    }

    fn key() -> FormKey {
        FormKey::new("chan", "", "/jira/create")
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key().to_string(), "chan--/jira/create");
    }

    #[tokio::test]
    async fn test_fetch_caches_form() {
        let caller = Arc::new(CountingCaller::new(CallResponse::Form { form: form() }));
        let cache = FormCache::new(caller.clone());
        let ctx = CallContext::default();

        assert!(cache.get(&key()).is_none());
        let first = cache.fetch(&key(), &binding(), &ctx).await.unwrap();
        let second = cache.fetch(&key(), &binding(), &ctx).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(caller.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key()).is_some());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_coalesce() {
        let caller = Arc::new(CountingCaller::new(CallResponse::Form { form: form() }));
        let cache = FormCache::new(caller.clone());
        let ctx = CallContext::default();
        let create = binding();
        let k = key();

        let (first, second) = tokio::join!(
            cache.fetch(&k, &create, &ctx),
            cache.fetch(&k, &create, &ctx)
        );
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(caller.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_response_is_not_cached() {
        let caller = Arc::new(CountingCaller::new(CallResponse::Error {
            text: Some("nope".into()),
        }));
        let cache = FormCache::new(caller.clone());
        let ctx = CallContext::default();

        let err = cache.fetch(&key(), &binding(), &ctx).await.unwrap_err();
        assert_eq!(err, FormError::Remote("nope".into()));
        let _ = cache.fetch(&key(), &binding(), &ctx).await;
        assert_eq!(caller.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_response_type() {
        let caller = CountingCaller::new(CallResponse::Ok {
            text: None,
            data: None,
        });
        let err = fetch_form(&caller, &binding(), &CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, FormError::UnexpectedResponse("ok".into()));
    }

    #[tokio::test]
    async fn test_binding_without_call() {
        let caller = CountingCaller::new(CallResponse::Form { form: form() });
        let ctx = CallContext {
            location: "/x".into(),
            ..Default::default()
        };
        let err = fetch_form(&caller, &Binding::new("x"), &ctx).await.unwrap_err();
        assert_eq!(
            err,
            FormError::NoCall {
                location: "/x".into()
            }
        );
        assert_eq!(caller.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_insert_and_clear() {
        let caller = Arc::new(CountingCaller::new(CallResponse::Form { form: form() }));
        let cache = FormCache::new(caller);
        cache.insert(key(), form());
        assert_eq!(cache.get(&key()).unwrap().fields.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
