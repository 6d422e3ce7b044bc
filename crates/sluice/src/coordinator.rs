// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-singleton coordination across same-machine processes.
//!
//! Every process that acquires a given identity derives the same loopback
//! port from it. Whoever binds the port first runs the engine and serves the
//! wire protocol; everyone else proxies to it. Within one process, acquired
//! handles are cached per identity, so repeated acquires observe the same
//! instance.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, OnceLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sluice_config::SluiceConfig;
use sluice_core::{
    format_error_chain, AccessMessage, AccessRequest, Category, LogMessage, SluiceError,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::rpc::{self, RpcClient};

/// Lower bound of the derived port range.
const PORT_RANGE_START: u16 = 11000;

/// Upper bound (exclusive) of the derived port range.
const PORT_RANGE_END: u16 = 22000;

/// Derive the coordination port for an identity.
///
/// Deterministic: the identity string is hashed and the hash seeds a
/// uniform draw from `11000..22000`, so every process using the same
/// identity arrives at the same port without any shared state.
pub fn derive_port(identity: &str) -> u16 {
    let mut hasher = DefaultHasher::new();
    identity.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());
    rng.gen_range(PORT_RANGE_START..PORT_RANGE_END)
}

/// Per-process cache of acquired handles, keyed by identity. The mutex is
/// the coordinator lock: concurrent acquires are serialized through it.
static REGISTRY: OnceLock<Mutex<HashMap<String, SluiceHandle>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<String, SluiceHandle>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Which end of the wire this handle is.
#[derive(Clone)]
enum Role {
    /// This process runs the engine and serves the port.
    Host(Arc<Engine>),
    /// Another process holds the port; calls proxy to it.
    Client(Arc<RpcClient>),
}

/// A logging handle for one identity, host or client.
///
/// Cheap to clone; clones share the underlying engine or proxy.
#[derive(Clone)]
pub struct SluiceHandle {
    identity: Arc<str>,
    role: Role,
}

/// Acquire the logging handle for `identity`.
///
/// Resolution order:
///
/// 1. A cached handle that still passes its liveness check is returned
///    as-is; a dead one is discarded.
/// 2. Binding the derived loopback port succeeds: this process becomes the
///    host. The engine starts from `config` and the RPC host serves it
///    until engine shutdown.
/// 3. The port is already taken: another process is the host, and a client
///    handle proxying to it is returned. `config` is ignored on this path;
///    the resident host keeps its own.
///
/// Any bind failure other than the port being taken propagates as
/// [`SluiceError::Io`].
pub async fn acquire(identity: &str, config: SluiceConfig) -> Result<SluiceHandle, SluiceError> {
    let mut cached = registry().lock().await;

    if let Some(handle) = cached.get(identity) {
        if handle.is_alive().await {
            return Ok(handle.clone());
        }
        cached.remove(identity);
        debug!(identity, "cached log handle was dead, re-acquiring");
    }

    let port = derive_port(identity);
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));

    let handle = match TcpListener::bind(addr).await {
        Ok(listener) => {
            let engine = Engine::start(config).await?;
            // Joined at engine shutdown, so the port is released before
            // shutdown returns and a re-acquire can bind it again.
            let server = tokio::spawn(rpc::serve(
                engine.clone(),
                listener,
                engine.cancel_token(),
            ));
            engine.adopt_task(server).await;
            info!(identity, port, "log host started");
            SluiceHandle {
                identity: Arc::from(identity),
                role: Role::Host(engine),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            debug!(identity, port, "port taken, proxying to resident host");
            SluiceHandle {
                identity: Arc::from(identity),
                role: Role::Client(Arc::new(RpcClient::new(port))),
            }
        }
        Err(e) => return Err(SluiceError::io(e)),
    };

    cached.insert(identity.to_string(), handle.clone());
    Ok(handle)
}

impl SluiceHandle {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// True when this process runs the engine for the identity.
    pub fn is_host(&self) -> bool {
        matches!(self.role, Role::Host(_))
    }

    /// Enqueue a message stamped with the current time.
    ///
    /// Messages are constructed locally on both roles, so the timestamp
    /// reflects enqueue time even when the append travels the wire.
    pub async fn log(
        &self,
        category: Category,
        source: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), SluiceError> {
        self.append(LogMessage::new(category, source, text)).await
    }

    /// Enqueue a web access event.
    pub async fn log_access(&self, request: AccessRequest) -> Result<(), SluiceError> {
        self.append(AccessMessage::from_request(request).into_message())
            .await
    }

    /// Enqueue a fatal-error message rendering the error and its `source()`
    /// chain.
    pub async fn log_error(
        &self,
        source: impl Into<String>,
        error: &(dyn std::error::Error + Send + Sync + 'static),
    ) -> Result<(), SluiceError> {
        self.append(LogMessage::new(
            Category::FatalError,
            source,
            format_error_chain(error),
        ))
        .await
    }

    /// Like [`log_error`](SluiceHandle::log_error), with the composed
    /// access line of the request appended for context.
    pub async fn log_error_with_request(
        &self,
        source: impl Into<String>,
        error: &(dyn std::error::Error + Send + Sync + 'static),
        request: AccessRequest,
    ) -> Result<(), SluiceError> {
        let context = AccessMessage::from_request(request).into_message();
        let text = format!("{}\n{}", format_error_chain(error), context.text);
        self.append(LogMessage::new(Category::FatalError, source, text))
            .await
    }

    /// Deliver everything queued, wherever the queue lives.
    pub async fn flush(&self) -> Result<(), SluiceError> {
        match &self.role {
            Role::Host(engine) => engine.flush().await,
            Role::Client(client) => client.flush().await,
        }
    }

    /// Release this identity.
    ///
    /// On a host handle the engine shuts down, which releases the port so a
    /// later acquire (in any process) re-runs the bind race. On a client
    /// handle only the cached proxy is evicted; the resident host keeps
    /// running.
    pub async fn shutdown(&self) -> Result<(), SluiceError> {
        registry().lock().await.remove(self.identity());

        match &self.role {
            Role::Host(engine) => engine.shutdown().await,
            Role::Client(_) => Ok(()),
        }
    }

    async fn append(&self, message: LogMessage) -> Result<(), SluiceError> {
        match &self.role {
            Role::Host(engine) => {
                engine.enqueue(message).await;
                Ok(())
            }
            Role::Client(client) => client.append(&message).await,
        }
    }

    async fn is_alive(&self) -> bool {
        match &self.role {
            Role::Host(engine) => engine.is_running(),
            Role::Client(client) => client.ping().await.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ports_are_deterministic_and_in_range() {
        let a = derive_port("MyService");
        let b = derive_port("MyService");
        assert_eq!(a, b);
        assert!((PORT_RANGE_START..PORT_RANGE_END).contains(&a));
    }

    #[test]
    fn distinct_identities_spread_across_the_range() {
        let ports: std::collections::HashSet<u16> = (0..20)
            .map(|i| derive_port(&format!("Service{i}")))
            .collect();
        // Collisions are possible over 11000 slots, but a degenerate
        // derivation would collapse everything onto one port.
        assert!(ports.len() > 1);
        assert!(ports
            .iter()
            .all(|p| (PORT_RANGE_START..PORT_RANGE_END).contains(p)));
    }
}
