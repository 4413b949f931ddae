//! # portage-std
//!
//! Standard adapters, routers and transports for the Portage action
//! framework.
//!
//! This crate provides:
//! - **Adapters**: [`SelfBindingFactory`], [`AuthorizationFactory`],
//!   [`CachingFactory`] and the terminal [`BaseEndpointFactory`]
//! - **Parsing**: [`RequestParser`] / [`ResultRenderer`]
//! - **Transports**: [`Transport`] and the standard [`Transports`]
//! - **Routing**: [`GatewayRouter`], [`ResolverRouter`], [`BatchRouter`],
//!   [`DirectRouter`] and the [`EventDispatcher`]
//! - **Credentials**: [`HmacAuthorizer`]
//! - **Scheduling**: [`Scheduler`] (with the `tokio` feature)
//! - **Assembly**: [`Portage`]
//!
//! [`SelfBindingFactory`]: adapters::SelfBindingFactory
//! [`AuthorizationFactory`]: adapters::AuthorizationFactory
//! [`CachingFactory`]: adapters::CachingFactory
//! [`BaseEndpointFactory`]: adapters::BaseEndpointFactory
//! [`RequestParser`]: parse::RequestParser
//! [`ResultRenderer`]: parse::ResultRenderer
//! [`Transport`]: transport::Transport
//! [`Transports`]: transport::Transports
//! [`GatewayRouter`]: routing::GatewayRouter
//! [`ResolverRouter`]: routing::ResolverRouter
//! [`BatchRouter`]: routing::BatchRouter
//! [`DirectRouter`]: routing::DirectRouter
//! [`EventDispatcher`]: routing::EventDispatcher
//! [`HmacAuthorizer`]: authorizer::HmacAuthorizer
//! [`Scheduler`]: scheduler::Scheduler
//! [`Portage`]: app::Portage

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core
pub use portage_core;

// Modules
pub mod adapters;
pub mod app;
pub mod authorizer;
pub mod config;
pub mod hooks;
pub mod parse;
pub mod route;
pub mod routing;
#[cfg(feature = "tokio")]
pub mod scheduler;
pub mod testing;
pub mod transport;
