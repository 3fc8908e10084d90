//! Context provider doubles.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use hydrator_core::BoxFuture;
use hydrator_core::{ContextProvider, ProviderError};

/// Returns one fixed snippet per key and records every key it is asked for.
pub struct RecordingProvider {
    name: String,
    calls: AtomicUsize,
    keys: Mutex<Vec<String>>,
}

impl RecordingProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
        }
    }

    /// Snippet produced for `key`.
    pub fn snippet_for(&self, key: &str) -> String {
        format!("<{}>{key}</{}>", self.name, self.name)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Keys requested so far, in call order.
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().expect("keys lock poisoned").clone()
    }
}

impl ContextProvider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_context<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>, ProviderError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.keys
                .lock()
                .expect("keys lock poisoned")
                .push(key.to_string());
            Ok(vec![self.snippet_for(key)])
        })
    }
}

/// Fails every call with a network error.
pub struct FailingProvider;

impl ContextProvider for FailingProvider {
    fn name(&self) -> &str {
        "Failing"
    }

    fn get_context<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>, ProviderError>> {
        Box::pin(async move { Err(ProviderError::Network(format!("cannot reach {key}"))) })
    }
}
