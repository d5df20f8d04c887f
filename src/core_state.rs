//! Process-wide component graph.
//!
//! `CoreState` owns the event bus, the workflow engine, both stream
//! managers and the read/notification services, all wired to one store
//! and one AI client. It is built once at startup, wrapped in `Arc`, and
//! shared with the HTTP layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ai_service::{AiClient, AiServiceError, HttpAiClient};
use crate::config::AppConfig;
use crate::conversations::ConversationService;
use crate::dashboard::DashboardService;
use crate::db::{self, seed, DatabaseError, SqliteStore, Store};
use crate::events::EventBus;
use crate::notifications::NotificationService;
use crate::patients::PatientService;
use crate::streams::{AlertStreamManager, PatientStreamManager, StreamError};
use crate::workflow::DoseWorkflow;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("AI client error: {0}")]
    AiClient(#[from] AiServiceError),
    #[error("Stream setup failed: {0}")]
    Stream(#[from] StreamError),
}

/// Blocking backends: the SQLite store (seeded when configured) and the
/// HTTP AI client. Call from a blocking context.
pub fn open_backends(
    config: &AppConfig,
) -> Result<(Arc<dyn Store>, Arc<dyn AiClient>), CoreError> {
    let conn = db::open_database(&config.db_path)?;
    let store = SqliteStore::new(conn);
    if config.seed_demo_data {
        seed::seed_demo_data(&store)?;
    }
    tracing::info!(db = %config.db_path.display(), "Database ready");

    let ai = HttpAiClient::from_config(config)?;
    tracing::info!(ai_service = ai.base_url(), "AI client configured");
    Ok((Arc::new(store), Arc::new(ai)))
}

pub struct CoreState {
    pub config: AppConfig,
    store: Arc<dyn Store>,
    bus: EventBus,
    workflow: DoseWorkflow,
    alerts: AlertStreamManager,
    patient_streams: PatientStreamManager,
    notifications: NotificationService,
    conversations: ConversationService,
    dashboard: DashboardService,
    patients: PatientService,
    shut_down: AtomicBool,
}

impl CoreState {
    /// Initialize the event bus and start both stream managers. Must run
    /// inside a tokio runtime.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        ai: Arc<dyn AiClient>,
    ) -> Result<Self, CoreError> {
        let bus = EventBus::init(config.event_queue_capacity);
        let alerts = AlertStreamManager::start(Arc::clone(&store), bus.clone(), config.stream_buffer)?;
        let patient_streams = PatientStreamManager::start(&bus, config.stream_buffer)?;

        Ok(Self {
            workflow: DoseWorkflow::new(
                Arc::clone(&store),
                Arc::clone(&ai),
                bus.clone(),
                config.skip_batch_policy,
            ),
            notifications: NotificationService::new(Arc::clone(&store), Arc::clone(&ai), bus.clone()),
            conversations: ConversationService::new(Arc::clone(&store), Arc::clone(&ai)),
            dashboard: DashboardService::new(Arc::clone(&store)),
            patients: PatientService::new(Arc::clone(&store), ai),
            alerts,
            patient_streams,
            store,
            bus,
            config,
            shut_down: AtomicBool::new(false),
        })
    }

    // ── Component access ────────────────────────────────────

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn workflow(&self) -> &DoseWorkflow {
        &self.workflow
    }

    pub fn alerts(&self) -> &AlertStreamManager {
        &self.alerts
    }

    pub fn patient_streams(&self) -> &PatientStreamManager {
        &self.patient_streams
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    pub fn conversations(&self) -> &ConversationService {
        &self.conversations
    }

    pub fn dashboard(&self) -> &DashboardService {
        &self.dashboard
    }

    pub fn patients(&self) -> &PatientService {
        &self.patients
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Close the bus and every open stream. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.bus.shutdown();
        self.alerts.close();
        self.patient_streams.close();
        tracing::info!("Core state shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
