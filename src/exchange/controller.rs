//! Request lifecycle controller.
//!
//! One controller exists per connection. It numbers the exchanges carried by
//! that connection (keep-alive connections carry several, one after another)
//! and wires each exchange to the observer and to the connection's abort
//! control.

use std::sync::Arc;

use super::lifecycle::Exchange;
use super::observer::ExchangeObserver;
use super::ExchangeId;
use crate::net::connection::{ConnectionControl, ConnectionId};

#[derive(Clone)]
pub struct LifecycleController {
    connection: ConnectionControl,
    observer: Arc<dyn ExchangeObserver>,
}

impl LifecycleController {
    pub fn new(connection: ConnectionControl, observer: Arc<dyn ExchangeObserver>) -> Self {
        Self {
            connection,
            observer,
        }
    }

    /// Controller whose connection is not backed by a socket.
    pub fn detached(observer: Arc<dyn ExchangeObserver>) -> Self {
        Self::new(ConnectionControl::new(ConnectionId::new()), observer)
    }

    /// Open the next exchange on this connection, in the `Reading` phase.
    pub fn open(&self) -> Exchange {
        let id = ExchangeId::new(self.connection.id(), self.connection.next_sequence());
        tracing::trace!(exchange = %id, "Exchange opened");
        Exchange::new(id, self.connection.clone(), Arc::clone(&self.observer))
    }

    pub fn connection(&self) -> &ConnectionControl {
        &self.connection
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}
