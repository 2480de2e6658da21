//! Shared test helpers: a journaling resource that records release order.

#![allow(dead_code)] // not every suite uses every helper

use dispose_scope::{BoxError, Disposable};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared record of release order across resources.
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut self.entries.lock())
    }

    fn record(&self, name: &str) {
        self.entries.lock().push(name.to_string());
    }
}

/// A resource that journals its release and counts dispose calls.
pub struct Tracked {
    name: String,
    journal: Journal,
    disposed: AtomicUsize,
    fail_with: Option<String>,
}

impl Tracked {
    pub fn new(name: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            journal: journal.clone(),
            disposed: AtomicUsize::new(0),
            fail_with: None,
        })
    }

    pub fn failing(name: &str, journal: &Journal, message: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            journal: journal.clone(),
            disposed: AtomicUsize::new(0),
            fail_with: Some(message.to_string()),
        })
    }

    pub fn dispose_calls(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Disposable for Tracked {
    fn dispose(&self) -> Result<(), BoxError> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        self.journal.record(&self.name);
        match &self.fail_with {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}
