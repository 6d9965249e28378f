use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::{AppConfig, ConfigResolver};
use crate::db::KeyValueStore;
use crate::services::scheduling::Scheduler;
use crate::services::session::CallSession;

pub struct AppState {
    pub config: AppConfig,
    /// Profile config snapshot taken at startup.
    pub resolver: ConfigResolver,
    pub store: Arc<dyn KeyValueStore>,
    pub scheduler: Box<dyn Scheduler>,
    pub sessions: Mutex<HashMap<String, Arc<Mutex<CallSession>>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        resolver: ConfigResolver,
        store: Arc<dyn KeyValueStore>,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        Self {
            config,
            resolver,
            store,
            scheduler,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Fraction of the job cap in use, clamped to 1.0.
    pub async fn load(&self) -> f64 {
        let active = self.active_sessions().await as f64;
        (active / self.config.max_jobs.max(1) as f64).min(1.0)
    }
}
