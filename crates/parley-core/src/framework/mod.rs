//! Framework layer - turn processing chains.
//!
//! - Turn middleware and the ordered middleware set
//! - Interceptors around outbound send, update and delete

pub mod interceptor;
pub mod middleware;

pub use futures::future::BoxFuture;

pub use interceptor::{
    DeleteActivityHandler, DeleteNext, InterceptNext, Interceptor, InterceptorRegistry,
    SendActivitiesHandler, SendNext, UpdateActivityHandler, UpdateNext,
};
pub use middleware::{Middleware, MiddlewareFn, MiddlewareSet, Next, middleware_fn};
