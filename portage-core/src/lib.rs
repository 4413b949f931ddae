//! # portage-core
//!
//! Core data model and traits for the Portage action framework.
//!
//! Portage exposes plain typed functions ("actions") over several transports
//! (HTTP gateways, resolver events, queues, timers) without the function
//! author writing transport code. This crate holds everything the adapters
//! and routers in `portage-std` are built on.
//!
//! # Layers
//!
//! ## Layer 1: Data Model ([`Action`], [`Trigger`], [`AccessControl`], [`CacheControl`])
//!
//! An [`Action`] is an immutable declaration: a callable, its parameter and
//! result [`Schema`]s, an access policy, a cache policy, triggers, and a
//! timeout. It is built once through [`ActionBuilder`], which rejects bad
//! declarations before anything is served.
//!
//! ## Layer 2: Endpoints ([`Endpoint`])
//!
//! The transport-bound parse / invoke / render unit. [`Endpoint::call`]
//! drives the stages and turns every [`CallError`] into a response.
//!
//! ## Layer 3: Adapter Chain ([`FactoryChain`])
//!
//! Priority-sorted [`AdapterFactory`]s that decline, decorate or terminate.
//! Decorators recurse into an explicitly narrowed [`Chain`], never into
//! shared state.
//!
//! ## Layer 4: Event Routing ([`EventRouter`])
//!
//! Shape-based recognition of untyped platform events, with a second level
//! of dispatch between handler variants.
//!
//! # Error Types
//!
//! - [`PortageError`] - Top-level error type
//! - [`RegistrationError`] / [`ConfigurationError`] - start-up failures
//! - [`CallError`] - per-call failures, always converted to responses
//! - [`RoutingError`] - events nobody recognises

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod access;
mod action;
mod cache;
mod endpoint;
mod error;
mod factory;
mod registry;
mod router;
mod schema;
mod trigger;

// Re-exports
pub use access::{AccessControl, Authorizer, Identity};
pub use action::{
    Action, ActionBuilder, ActionFuture, DEFAULT_TIMEOUT, Invocation, InvokeFn, Kwargs, Param,
    Receiver, ResolveFn,
};
pub use cache::{CacheControl, CacheHeader, CacheStrategy, content_hash, http_date};
pub use endpoint::{
    BoxEndpoint, DynEndpoint, Endpoint, OperationDoc, Request, Response, RouteInfo, SchemaDoc,
    SharedEndpoint,
};
pub use error::{
    AuthorizationError, BoxError, CallError, ConfigurationError, FieldError, PortageError,
    RegistrationError, RoutingError, ValidationError,
};
pub use factory::{
    AdapterFactory, Chain, FactoryChain, FactoryChainBuilder, FactoryRole, SharedFactory,
};
pub use registry::{ActionRegistry, Finder, StaticFinder};
pub use router::{BoxHandler, EventHandler, EventRouter, first_usable};
pub use schema::{Field, ObjectSchema, Schema, SharedSchema, ValueType};
pub use trigger::{
    FixedRateTrigger, QueueTrigger, Trigger, TriggerKind, WebTrigger, method_carries_body,
};

// HTTP vocabulary used throughout the public API.
pub use http;
