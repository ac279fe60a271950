//! Test doubles and common utilities for dispatch contract tests
//!
//! The scripted transport answers per endpoint and records every call, so
//! tests can assert exactly which providers were contacted and how often.

#![allow(dead_code)]

use sms_core::config::EngineConfig;
use sms_core::error::Error;
use sms_core::store::MemoryStore;
use sms_core::traits::{OutboundSms, SmsTransport};
use sms_core::{DispatchEngine, DispatchEvent, ProviderRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const PROVIDER_1: &str = "https://provider1.example.com/send";
pub const PROVIDER_2: &str = "https://provider2.example.com/send";
pub const PROVIDER_3: &str = "https://provider3.example.com/send";

/// How the scripted transport answers for one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Accept and assign a fresh identifier
    Accept,
    /// Answer like a provider returning HTTP 500
    Fail,
    /// Never answer
    Hang,
}

/// A transport whose answers are scripted per endpoint
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, Reply>>,
    /// Endpoints called, in order
    calls: Mutex<Vec<String>>,
    /// Call counter for post_message()
    call_count: AtomicUsize,
    /// Source of assigned identifiers
    next_id: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the answer for an endpoint (unscripted endpoints accept)
    pub fn set_reply(&self, endpoint: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), reply);
    }

    /// Get the number of times post_message() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Endpoints called, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made to one endpoint
    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == endpoint)
            .count()
    }
}

#[async_trait::async_trait]
impl SmsTransport for ScriptedTransport {
    async fn post_message(&self, endpoint: &str, request: &OutboundSms) -> Result<String, Error> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(endpoint.to_string());
        assert_eq!(request.callback_url, EngineConfig::default().callback_url);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(Reply::Accept);

        match reply {
            Reply::Accept => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("msg-{}", n))
            }
            Reply::Fail => Err(Error::transport(endpoint, "status 500")),
            Reply::Hang => {
                std::future::pending::<()>().await;
                Err(Error::transport(endpoint, "unreachable"))
            }
        }
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// An engine wired to a scripted transport and a memory store
pub struct Harness {
    pub engine: DispatchEngine,
    pub registry: Arc<ProviderRegistry>,
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryStore>,
    pub events: mpsc::Receiver<DispatchEvent>,
}

impl Harness {
    /// Build a harness with providers registered in the given order
    pub fn new(providers: &[(&str, u32)]) -> Self {
        Self::with_config(providers, &EngineConfig::default())
    }

    /// Build a harness with custom engine settings
    pub fn with_config(providers: &[(&str, u32)], config: &EngineConfig) -> Self {
        let registry = Arc::new(ProviderRegistry::new());
        for (url, ratio) in providers {
            registry.register(*url, *ratio).unwrap();
        }

        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryStore::new());

        let (engine, events) = DispatchEngine::new(
            Arc::clone(&registry),
            transport.clone(),
            store.clone(),
            store.clone(),
            config,
        )
        .unwrap();

        Self {
            engine,
            registry,
            transport,
            store,
            events,
        }
    }

    /// Drain every event emitted so far
    pub fn drain_events(&mut self) -> Vec<DispatchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
