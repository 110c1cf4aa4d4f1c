//! # Outbound Router
//!
//! Maps message types to the endpoints they are published to. Type names are
//! normalized the same way the inbound type registry normalizes them, so
//! `Orders.Created, Orders, Version=1.0.0.0` routes like
//! `Orders.Created, Orders`.

use conduit_types::{ConfigError, Endpoint, MessageTypeRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum RouteMatch {
    Type(String),
    Any,
}

#[derive(Debug, Clone)]
struct Route {
    matcher: RouteMatch,
    endpoint: Arc<Endpoint>,
}

#[derive(Debug, Clone, Default)]
pub struct OutboundRouter {
    routes: Vec<Route>,
}

impl OutboundRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route messages of `message_type` to `endpoint`.
    pub fn add_route(
        &mut self,
        message_type: &str,
        endpoint: Arc<Endpoint>,
    ) -> Result<(), ConfigError> {
        endpoint.validate()?;
        self.routes.push(Route {
            matcher: RouteMatch::Type(MessageTypeRegistry::normalize(message_type)),
            endpoint,
        });
        Ok(())
    }

    /// Route every message to `endpoint`.
    pub fn add_catch_all(&mut self, endpoint: Arc<Endpoint>) -> Result<(), ConfigError> {
        endpoint.validate()?;
        self.routes.push(Route {
            matcher: RouteMatch::Any,
            endpoint,
        });
        Ok(())
    }

    /// Endpoints a message of this type is published to, in declaration
    /// order. An endpoint routed twice is returned once.
    pub fn routes_for(&self, message_type: &str) -> Vec<Arc<Endpoint>> {
        let normalized = MessageTypeRegistry::normalize(message_type);
        let mut endpoints: Vec<Arc<Endpoint>> = Vec::new();

        for route in &self.routes {
            let matches = match &route.matcher {
                RouteMatch::Type(t) => *t == normalized,
                RouteMatch::Any => true,
            };
            if matches && !endpoints.iter().any(|e| e.name == route.endpoint.name) {
                endpoints.push(Arc::clone(&route.endpoint));
            }
        }

        endpoints
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
