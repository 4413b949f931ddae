//! Standard adapter factories.
//!
//! | Factory                  | Priority | Role       | Declines when                         |
//! |--------------------------|----------|------------|---------------------------------------|
//! | [`SelfBindingFactory`]   | 200      | decorator  | the action is a plain function        |
//! | [`AuthorizationFactory`] | 150      | decorator  | open access and no identity parameter |
//! | [`CachingFactory`]       | 100      | decorator  | no cache policy, or not a `GET`       |
//! | [`BaseEndpointFactory`]  | 50       | terminal   | never, for supported kinds            |

mod authorization;
mod base;
mod caching;
mod self_binding;

pub use authorization::{AuthorizationFactory, AuthorizedEndpoint};
pub use base::{BaseEndpoint, BaseEndpointFactory};
pub use caching::{CachedEndpoint, CachingFactory};
pub use self_binding::SelfBindingFactory;

/// Priority of [`SelfBindingFactory`].
pub const SELF_BINDING_PRIORITY: i32 = 200;
/// Priority of [`AuthorizationFactory`].
pub const AUTHORIZATION_PRIORITY: i32 = 150;
/// Priority of [`CachingFactory`].
pub const CACHING_PRIORITY: i32 = 100;
/// Priority of [`BaseEndpointFactory`].
pub const BASE_PRIORITY: i32 = 50;
