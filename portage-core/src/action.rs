//! The action record and its builder.
//!
//! An [`Action`] is immutable once built. Adapters that need a different
//! action (for example one whose receiver is already bound) derive a new
//! value with [`Action::bind_receiver`]; the original is never mutated.

use crate::{
    access::{AccessControl, Identity},
    cache::CacheControl,
    error::{CallError, RegistrationError, ValidationError},
    schema::{Field, ObjectSchema, Schema, SharedSchema, ValueType},
    trigger::Trigger,
};
use futures::future::{BoxFuture, FutureExt};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::{any::Any, fmt, future::Future, sync::Arc, time::Duration};

/// Timeout used when an action does not declare one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Keyword arguments of one call.
pub type Kwargs = Map<String, Value>;

/// A type-erased method receiver.
pub type Receiver = Arc<dyn Any + Send + Sync>;

/// Future returned by an action body.
pub type ActionFuture = BoxFuture<'static, Result<Value, CallError>>;

/// The underlying function of an action.
pub type InvokeFn = Arc<dyn Fn(Invocation) -> ActionFuture + Send + Sync>;

/// Produces the receiver of a method-style action.
pub type ResolveFn = Arc<dyn Fn() -> Result<Receiver, CallError> + Send + Sync>;

/// Arguments handed to an action body.
#[derive(Clone, Default)]
pub struct Invocation {
    /// Parsed, validated keyword arguments.
    pub args: Kwargs,
    receiver: Option<Receiver>,
}

impl Invocation {
    /// An invocation with `args` and no receiver.
    pub fn new(args: Kwargs) -> Self {
        Self {
            args,
            receiver: None,
        }
    }

    /// Attach a bound receiver.
    pub fn with_receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Raw argument `name`.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Deserialize argument `name`; a missing argument reads as `null`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, CallError> {
        let value = self.args.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| CallError::Validation(ValidationError::new(name, e.to_string())))
    }

    /// The identity injected under `name`, if any.
    pub fn identity(&self, name: &str) -> Option<Identity> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The bound receiver, downcast to `T`.
    pub fn receiver<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.receiver.clone().and_then(|r| r.downcast::<T>().ok())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("args", &self.args)
            .field("receiver", &self.receiver.is_some())
            .finish()
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    ty: Option<ValueType>,
    required: bool,
    default: Option<Value>,
}

impl Param {
    /// A required parameter named `name`, still lacking a type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            required: true,
            default: None,
        }
    }

    /// A required parameter of type `ty`.
    pub fn typed(name: impl Into<String>, ty: ValueType) -> Self {
        Self::new(name).of(ty)
    }

    /// Declare the type.
    pub fn of(mut self, ty: ValueType) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Allow the parameter to be absent.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Use `value` when the parameter is absent.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn ty(&self) -> Option<&ValueType> {
        self.ty.as_ref()
    }
}

#[derive(Clone)]
struct ReceiverSpec {
    param: String,
    resolve: ResolveFn,
}

#[derive(Clone)]
struct ActionInner {
    name: String,
    description: Option<String>,
    params: Vec<Param>,
    identity_param: Option<String>,
    receiver: Option<ReceiverSpec>,
    invoke: InvokeFn,
    param_schema: SharedSchema,
    result_schema: SharedSchema,
    access: AccessControl,
    cache: CacheControl,
    triggers: Vec<Trigger>,
    timeout: Duration,
}

/// A registered, typed, named operation.
///
/// Cloning is cheap; all clones share the same immutable declaration.
#[derive(Clone)]
pub struct Action {
    inner: Arc<ActionInner>,
}

impl Action {
    /// Start declaring an action whose body is `f`.
    pub fn builder<F, Fut, T, E>(name: impl Into<String>, f: F) -> ActionBuilder
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + 'static,
        E: Into<CallError> + 'static,
    {
        let invoke: InvokeFn = Arc::new(move |invocation| {
            f(invocation)
                .map(|out| match out {
                    Ok(value) => serde_json::to_value(value)
                        .map_err(|e| CallError::Render(ValidationError::new("", e.to_string()))),
                    Err(err) => Err(err.into()),
                })
                .boxed()
        });
        ActionBuilder::new(name.into(), invoke)
    }

    /// Action name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Human readable description.
    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    /// Declared value parameters.
    pub fn params(&self) -> &[Param] {
        &self.inner.params
    }

    /// Name of the identity parameter, if declared.
    pub fn identity_param(&self) -> Option<&str> {
        self.inner.identity_param.as_deref()
    }

    /// Name of the unbound receiver parameter, if this is a method-style action.
    pub fn receiver_param(&self) -> Option<&str> {
        self.inner.receiver.as_ref().map(|r| r.param.as_str())
    }

    /// Schema of the keyword arguments.
    pub fn param_schema(&self) -> &SharedSchema {
        &self.inner.param_schema
    }

    /// Schema of the result.
    pub fn result_schema(&self) -> &SharedSchema {
        &self.inner.result_schema
    }

    /// Access-control policy.
    pub fn access_control(&self) -> &AccessControl {
        &self.inner.access
    }

    /// Cache policy.
    pub fn cache_control(&self) -> &CacheControl {
        &self.inner.cache
    }

    /// Declared triggers.
    pub fn triggers(&self) -> &[Trigger] {
        &self.inner.triggers
    }

    /// Declared timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Call the underlying function.
    pub fn invoke(&self, invocation: Invocation) -> ActionFuture {
        (self.inner.invoke)(invocation)
    }

    /// Resolve the receiver of a method-style action.
    ///
    /// Returns `None` for plain functions.
    pub fn resolve_receiver(&self) -> Option<Result<Receiver, CallError>> {
        self.inner.receiver.as_ref().map(|r| (r.resolve)())
    }

    /// A new action identical to this one, except that it has no unbound
    /// receiver and calls `invoke` instead.
    pub fn bind_receiver(&self, invoke: InvokeFn) -> Action {
        let mut inner = (*self.inner).clone();
        inner.receiver = None;
        inner.invoke = invoke;
        Action {
            inner: Arc::new(inner),
        }
    }

    /// Whether `self` and `other` share one declaration.
    pub fn ptr_eq(&self, other: &Action) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.inner.name)
            .field("params", &self.inner.params)
            .field("identity_param", &self.inner.identity_param)
            .field("receiver", &self.receiver_param())
            .field("access", &self.inner.access)
            .field("cache", &self.inner.cache)
            .field("triggers", &self.inner.triggers)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

/// Declares an [`Action`].
///
/// Every declared parameter must carry a type; [`ActionBuilder::build`]
/// fails otherwise, so a bad declaration surfaces at start-up.
pub struct ActionBuilder {
    name: String,
    description: Option<String>,
    params: Vec<Param>,
    identity_param: Option<String>,
    receiver: Option<ReceiverSpec>,
    invoke: InvokeFn,
    param_schema: Option<SharedSchema>,
    result_schema: SharedSchema,
    access: AccessControl,
    cache: CacheControl,
    triggers: Vec<Trigger>,
    timeout: Duration,
}

impl ActionBuilder {
    /// Start from a raw invoke function.
    pub fn new(name: String, invoke: InvokeFn) -> Self {
        Self {
            name,
            description: None,
            params: Vec::new(),
            identity_param: None,
            receiver: None,
            invoke,
            param_schema: None,
            result_schema: Arc::new(ValueType::Any),
            access: AccessControl::AllowAll,
            cache: CacheControl::no_cache(),
            triggers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a value parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Declare a parameter that receives the caller's [`Identity`].
    pub fn identity(mut self, name: impl Into<String>) -> Self {
        self.identity_param = Some(name.into());
        self
    }

    /// Make this a method-style action whose receiver is produced by `resolve`.
    pub fn receiver<T, F>(mut self, param: impl Into<String>, resolve: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> Result<Arc<T>, CallError> + Send + Sync + 'static,
    {
        self.receiver = Some(ReceiverSpec {
            param: param.into(),
            resolve: Arc::new(move || resolve().map(|r| r as Receiver)),
        });
        self
    }

    /// Replace the generated parameter schema.
    pub fn param_schema(mut self, schema: impl Schema) -> Self {
        self.param_schema = Some(Arc::new(schema));
        self
    }

    /// Declare the result schema.
    pub fn returns(mut self, schema: impl Schema) -> Self {
        self.result_schema = Arc::new(schema);
        self
    }

    /// Set the access-control policy.
    pub fn access(mut self, access: AccessControl) -> Self {
        self.access = access;
        self
    }

    /// Set the cache policy.
    pub fn cache(mut self, cache: CacheControl) -> Self {
        self.cache = cache;
        self
    }

    /// Add a trigger.
    pub fn trigger(mut self, trigger: impl Into<Trigger>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the declaration and freeze it.
    pub fn build(self) -> Result<Action, RegistrationError> {
        if self.name.trim().is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if self.timeout.is_zero() {
            return Err(RegistrationError::InvalidTimeout(self.name));
        }

        let mut seen: Vec<&str> = Vec::new();
        let reserved = self
            .identity_param
            .iter()
            .map(String::as_str)
            .chain(self.receiver.iter().map(|r| r.param.as_str()));
        for name in self.params.iter().map(Param::name).chain(reserved) {
            if seen.contains(&name) {
                return Err(RegistrationError::DuplicateParameter {
                    action: self.name.clone(),
                    param: name.to_string(),
                });
            }
            seen.push(name);
        }

        let mut generated = ObjectSchema::new();
        for param in &self.params {
            let Some(ty) = param.ty.clone() else {
                return Err(RegistrationError::UntypedParameter {
                    action: self.name.clone(),
                    param: param.name.clone(),
                });
            };
            generated = generated.with(Field {
                name: param.name.clone(),
                ty,
                required: param.required,
                default: param.default.clone(),
            });
        }

        for trigger in &self.triggers {
            if let Some(path) = trigger.as_web().and_then(|w| w.path.as_ref()) {
                if !path.starts_with('/') {
                    return Err(RegistrationError::InvalidPath {
                        action: self.name.clone(),
                        path: path.clone(),
                    });
                }
            }
        }

        let param_schema = self
            .param_schema
            .unwrap_or_else(|| Arc::new(generated) as SharedSchema);

        Ok(Action {
            inner: Arc::new(ActionInner {
                name: self.name,
                description: self.description,
                params: self.params,
                identity_param: self.identity_param,
                receiver: self.receiver,
                invoke: self.invoke,
                param_schema,
                result_schema: self.result_schema,
                access: self.access,
                cache: self.cache,
                triggers: self.triggers,
                timeout: self.timeout,
            }),
        })
    }
}
