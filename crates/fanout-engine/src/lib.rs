//! Delivery engine: endpoint registry, event dispatch, and the worker pool
//! that drains the delivery queue.

pub mod dispatcher;
pub mod registry;
pub mod sender;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use registry::{EndpointDefaults, EndpointRegistry, NewEndpoint};
pub use sender::Sender;
pub use worker::WorkerPool;
