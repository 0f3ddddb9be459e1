use std::sync::Arc;

use fanout_engine::{Dispatcher, EndpointDefaults, EndpointRegistry};
use fanout_store::WebhookStore;

#[derive(Clone)]
pub struct RequestId(pub String);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WebhookStore>,
    pub registry: EndpointRegistry,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(store: Arc<dyn WebhookStore>, defaults: EndpointDefaults) -> Self {
        Self {
            registry: EndpointRegistry::new(store.clone(), defaults),
            dispatcher: Dispatcher::new(store.clone()),
            store,
        }
    }
}
