//! # portage - Typed Actions over Any Transport
//!
//! `portage` lets plain async functions ("actions") be served over HTTP
//! gateways, resolver events, queue and topic records, direct invocations
//! and fixed-rate timers. Each transport builds its endpoints through a
//! priority-ordered chain of adapter factories; incoming platform events
//! are matched by shape against a list of routers.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use portage::prelude::*;
//!
//! let echo = Action::builder("echo", |inv: Invocation| async move { inv.get::<String>("val") })
//!     .param(Param::typed("val", ValueType::String))
//!     .returns(ValueType::String)
//!     .trigger(WebTrigger::get())
//!     .build()?;
//!
//! let portage = Portage::builder().action(echo).build()?;
//!
//! // GET /actions/echo?val=bar -> 200 "bar"
//! let response = portage.handle(Request::get("/actions/echo").with_query("val", "bar")).await;
//!
//! // Or hand it a raw platform event.
//! let reply = portage.dispatch(event).await?;
//! ```
//!
//! ## Crates
//!
//! - `portage-core`: the data model and the adapter and router traits
//! - `portage-std`: standard adapters, routers, transports and assembly

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use portage_core::{
    // Access
    AccessControl,
    // Data model
    Action,
    ActionBuilder,
    ActionFuture,
    // Registry
    ActionRegistry,
    // Adapter chain
    AdapterFactory,
    AuthorizationError,
    Authorizer,
    BoxEndpoint,
    // Errors
    BoxError,
    // Routing
    BoxHandler,
    // Cache
    CacheControl,
    CacheHeader,
    CacheStrategy,
    CallError,
    Chain,
    ConfigurationError,
    DEFAULT_TIMEOUT,
    DynEndpoint,
    // Endpoints
    Endpoint,
    EventHandler,
    EventRouter,
    FactoryChain,
    FactoryChainBuilder,
    FactoryRole,
    // Schema
    Field,
    FieldError,
    Finder,
    FixedRateTrigger,
    Identity,
    Invocation,
    InvokeFn,
    Kwargs,
    ObjectSchema,
    OperationDoc,
    Param,
    PortageError,
    QueueTrigger,
    Receiver,
    RegistrationError,
    Request,
    ResolveFn,
    Response,
    RouteInfo,
    RoutingError,
    Schema,
    SchemaDoc,
    SharedEndpoint,
    SharedFactory,
    SharedSchema,
    StaticFinder,
    // Triggers
    Trigger,
    TriggerKind,
    ValidationError,
    ValueType,
    WebTrigger,
    content_hash,
    first_usable,
    http_date,
    method_carries_body,
};

// Assembly
pub use portage_std::{
    app::{Portage, PortageBuilder},
    authorizer::HmacAuthorizer,
    config::{
        AuthConfig, ConfigError, MAX_LEEWAY_SECS, PathStyle, PortageConfig, SchedulerConfig,
    },
    transport::{EndpointSet, Transport, Transports},
};

// Vocabulary types of the public API.
pub use futures::future::BoxFuture;
pub use portage_core::http;
pub use serde_json;

/// Adapter factories and the endpoints they build.
pub mod adapters {
    #![allow(clippy::wildcard_imports)]
    pub use portage_std::adapters::*;
}

/// Event routers and the dispatcher that consults them.
pub mod routing {
    #![allow(clippy::wildcard_imports)]
    pub use portage_std::routing::*;
}

/// Execution watches wrapped around action calls.
pub mod hooks {
    #![allow(clippy::wildcard_imports)]
    pub use portage_std::hooks::*;
}

/// Argument collection and result rendering.
pub mod parse {
    #![allow(clippy::wildcard_imports)]
    pub use portage_std::parse::*;
}

/// Web path derivation.
pub mod route {
    #![allow(clippy::wildcard_imports)]
    pub use portage_std::route::*;
}

/// Fixed-rate timers.
#[cfg(feature = "tokio")]
pub mod scheduler {
    #![allow(clippy::wildcard_imports)]
    pub use portage_std::scheduler::*;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use portage_std::testing::*;
}

/// Prelude module - common imports for Portage.
///
/// # Usage
///
/// ```rust,ignore
/// use portage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AccessControl,
        Action,
        // Adapter chain
        AdapterFactory,
        Authorizer,
        CacheControl,
        CallError,
        Chain,
        Endpoint,
        EventRouter,
        FixedRateTrigger,
        Identity,
        Invocation,
        Param,
        // Assembly
        Portage,
        PortageConfig,
        PortageError,
        QueueTrigger,
        Request,
        Response,
        RoutingError,
        Trigger,
        ValueType,
        WebTrigger,
    };
}
