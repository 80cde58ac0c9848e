//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{PasswordError, SessionService};
use gatehouse_core::{AppConfig, Stores};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Account and revocation stores
    pub stores: Stores,
    /// Session operations
    pub sessions: SessionService,
    /// Server start time
    pub start_time: Instant,
    /// Cleared during shutdown so readiness probes fail first
    is_ready: AtomicBool,
}

impl AppState {
    pub fn new(config: AppConfig, stores: Stores) -> Result<Self, PasswordError> {
        let sessions = SessionService::new(&stores, &config)?;
        Ok(Self {
            config,
            stores,
            sessions,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("stores", &self.stores)
            .field("uptime_secs", &self.uptime_secs())
            .finish_non_exhaustive()
    }
}
