//! # Event Routers
//!
//! | Router             | Priority | Recognises                      | Variants                 |
//! |--------------------|----------|---------------------------------|--------------------------|
//! | [`GatewayRouter`]  | 400      | `path` / `rawPath`              | REST, HTTP API           |
//! | [`ResolverRouter`] | 300      | `info.fieldName` (or a list)    | single, batch            |
//! | [`BatchRouter`]    | 200      | `Records`                       | queue, topic             |
//! | [`DirectRouter`]   | 100      | `params`                        | direct                   |
//!
//! [`EventDispatcher`] consults them in priority order.

mod batch;
mod direct;
mod dispatcher;
mod gateway;
mod resolver;
mod table;

pub use batch::BatchRouter;
pub use direct::DirectRouter;
pub use dispatcher::{EventDispatcher, EventDispatcherBuilder};
pub use gateway::GatewayRouter;
pub use resolver::{OperationType, ResolverRouter};
pub use table::{Lookup, RouteMatch, RouteTable};

/// Priority of [`GatewayRouter`].
pub const GATEWAY_PRIORITY: i32 = 400;
/// Priority of [`ResolverRouter`].
pub const RESOLVER_PRIORITY: i32 = 300;
/// Priority of [`BatchRouter`].
pub const BATCH_PRIORITY: i32 = 200;
/// Priority of [`DirectRouter`].
pub const DIRECT_PRIORITY: i32 = 100;
