//! End-to-end admin and learner flows over every store backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pbl_application::{AdminScreen, DashboardView, LearnerScreen, SessionController};
use pbl_core::error::Result;
use pbl_core::presence::{LearnerRecord, PresenceListener, PresenceStore};
use pbl_core::session::{SessionConfig, SessionStore};
use pbl_core::step::Step;
use pbl_core::subscription::Subscription;
use pbl_infrastructure::{
    ActivatingSessionStore, InMemoryPresenceStore, InMemorySessionStore, LocalStorage,
    MemoryDocumentStore, PolledPresenceStore, PolledSessionStore, RemotePresenceStore,
    RemoteSessionStore,
};
use tempfile::TempDir;

/// Builds the store pair one device would use.
trait Backend {
    fn device(&self) -> (Arc<dyn SessionStore>, Arc<dyn PresenceStore>);
}

/// One process, one pair of stores shared by every controller.
struct MemoryBackend {
    session: Arc<dyn SessionStore>,
    presence: Arc<dyn PresenceStore>,
}

impl MemoryBackend {
    fn new() -> Self {
        let presence: Arc<dyn PresenceStore> = Arc::new(InMemoryPresenceStore::new());
        let session = Arc::new(ActivatingSessionStore::new(
            InMemorySessionStore::new(),
            presence.clone(),
        ));
        Self { session, presence }
    }
}

impl Backend for MemoryBackend {
    fn device(&self) -> (Arc<dyn SessionStore>, Arc<dyn PresenceStore>) {
        (self.session.clone(), self.presence.clone())
    }
}

/// Every device opens the storage directory on its own, like separate
/// processes on one machine.
struct LocalBackend {
    dir: TempDir,
}

impl Backend for LocalBackend {
    fn device(&self) -> (Arc<dyn SessionStore>, Arc<dyn PresenceStore>) {
        let storage = LocalStorage::open(self.dir.path().to_path_buf());
        let poll = Duration::from_millis(20);
        let presence: Arc<dyn PresenceStore> =
            Arc::new(PolledPresenceStore::with_poll_interval(storage.clone(), poll));
        let session = Arc::new(ActivatingSessionStore::new(
            PolledSessionStore::with_poll_interval(storage, poll),
            presence.clone(),
        ));
        (session, presence)
    }
}

/// Every device is its own client of one shared document store.
struct RemoteBackend {
    documents: Arc<MemoryDocumentStore>,
}

impl Backend for RemoteBackend {
    fn device(&self) -> (Arc<dyn SessionStore>, Arc<dyn PresenceStore>) {
        let presence: Arc<dyn PresenceStore> =
            Arc::new(RemotePresenceStore::new(self.documents.clone()));
        let session = Arc::new(ActivatingSessionStore::new(
            RemoteSessionStore::new(self.documents.clone()),
            presence.clone(),
        ));
        (session, presence)
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

struct Device {
    controller: SessionController,
    presence: Arc<dyn PresenceStore>,
}

async fn device(backend: &dyn Backend, visitor_id: &str) -> Device {
    let (session, presence) = backend.device();
    let controller = SessionController::start(session, presence.clone(), visitor_id).await;
    controller.wait_until_loaded().await;
    Device {
        controller,
        presence,
    }
}

fn dashboard(admin: &SessionController) -> Option<DashboardView> {
    match admin.admin_screen() {
        AdminScreen::Dashboard(view) => Some(view),
        _ => None,
    }
}

async fn open_session(admin: &SessionController, group_name: &str, total_teams: u32) {
    admin.enter_admin().await;
    admin.begin_setup();
    admin.set_setup_group_name(group_name);
    admin.set_setup_total_teams(total_teams).unwrap();
    admin.open_session().await.unwrap();
}

async fn join(learner: &SessionController, team_id: u32, name: &str) {
    assert!(
        eventually(|| matches!(
            learner.learner_screen(),
            LearnerScreen::TeamSelection { .. }
        ))
        .await
    );
    learner.select_team(team_id).unwrap();
    learner.join(name).await.unwrap();
}

async fn run_end_to_end(backend: &dyn Backend) {
    let admin = device(backend, "admin").await.controller;
    open_session(&admin, "ABC", 4).await;

    let learner = device(backend, "v1").await;
    assert!(
        eventually(|| matches!(
            learner.controller.learner_screen(),
            LearnerScreen::TeamSelection { ref choices, .. } if choices.len() == 4
        ))
        .await
    );
    join(&learner.controller, 2, "Lee").await;

    let record = learner.presence.list_all().await[0].clone();
    assert_eq!(record.visitor_id, "v1");
    assert_eq!(record.team_name, "2조");
    assert_eq!(record.current_step, Step::Situation);

    while learner.controller.current_step() != Step::Report {
        learner.controller.next().unwrap();
    }
    learner.controller.flush_presence().await;

    assert!(
        eventually(|| {
            dashboard(&admin).is_some_and(|view| {
                view.stats.total_participants == 1 && view.stats.completed == 1
            })
        })
        .await
    );
    let view = dashboard(&admin).unwrap();
    assert_eq!(view.group_name, "ABC");
    assert_eq!(view.stats.team(2).unwrap().average_progress, 100);
    for team_id in [1, 3, 4] {
        assert_eq!(view.stats.team(team_id).unwrap().average_progress, 0);
    }
}

async fn run_logout_keeps_record(backend: &dyn Backend) {
    let admin = device(backend, "admin").await.controller;
    open_session(&admin, "ABC", 4).await;

    let learner = device(backend, "v1").await;
    join(&learner.controller, 1, "Kim").await;
    while learner.controller.current_step() != Step::Solution {
        learner.controller.next().unwrap();
    }
    learner.controller.flush_presence().await;

    learner.controller.exit().await;
    learner.controller.flush_presence().await;
    assert_eq!(learner.controller.current_step(), Step::Intro);
    assert_eq!(
        learner.presence.list_all().await[0].current_step,
        Step::Solution
    );
}

async fn run_activation_edge(backend: &dyn Backend) {
    let admin = device(backend, "admin").await;
    open_session(&admin.controller, "ABC", 4).await;

    let learner = device(backend, "v1").await;
    join(&learner.controller, 1, "Kim").await;

    // Changing settings of a running session keeps the roster.
    open_session(&admin.controller, "ABC-2", 6).await;
    assert_eq!(admin.presence.list_all().await.len(), 1);

    // Closing and reopening starts from an empty roster.
    let (session, _) = backend.device();
    let mut closed = session.read().await;
    closed.is_session_active = false;
    session.write(closed).await.unwrap();
    for controller in [&admin.controller, &learner.controller] {
        assert!(
            eventually(|| controller
                .config()
                .is_some_and(|config| !config.is_session_active))
            .await
        );
    }
    assert_eq!(learner.controller.learner_screen(), LearnerScreen::Waiting);
    open_session(&admin.controller, "ABC-3", 2).await;
    assert!(admin.presence.list_all().await.is_empty());

    // The learner from the old session has to join again.
    assert!(
        eventually(|| matches!(
            learner.controller.learner_screen(),
            LearnerScreen::TeamSelection { ref group_name, .. } if group_name == "ABC-3"
        ))
        .await
    );
    assert_eq!(learner.controller.profile(), None);
    join(&learner.controller, 2, "Kim").await;
    assert!(
        eventually(|| admin
            .controller
            .watch_roster()
            .borrow()
            .iter()
            .any(|record| record.visitor_id == learner.controller.visitor_id()))
        .await
    );
}

#[tokio::test]
async fn test_end_to_end_memory() {
    run_end_to_end(&MemoryBackend::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_local() {
    let backend = LocalBackend {
        dir: TempDir::new().unwrap(),
    };
    run_end_to_end(&backend).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_remote() {
    let backend = RemoteBackend {
        documents: Arc::new(MemoryDocumentStore::new()),
    };
    run_end_to_end(&backend).await;
}

#[tokio::test]
async fn test_logout_keeps_record_memory() {
    run_logout_keeps_record(&MemoryBackend::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_logout_keeps_record_local() {
    let backend = LocalBackend {
        dir: TempDir::new().unwrap(),
    };
    run_logout_keeps_record(&backend).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_activation_edge_remote() {
    let backend = RemoteBackend {
        documents: Arc::new(MemoryDocumentStore::new()),
    };
    run_activation_edge(&backend).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_activation_edge_local() {
    let backend = LocalBackend {
        dir: TempDir::new().unwrap(),
    };
    run_activation_edge(&backend).await;
}

/// Presence store wrapper that records every step update it forwards.
struct RecordingPresence {
    inner: InMemoryPresenceStore,
    steps: Mutex<Vec<Step>>,
}

#[async_trait]
impl PresenceStore for RecordingPresence {
    async fn upsert(
        &self,
        visitor_id: &str,
        name: &str,
        team_id: u32,
        team_name: &str,
        current_step: Step,
    ) -> Result<()> {
        self.inner
            .upsert(visitor_id, name, team_id, team_name, current_step)
            .await
    }

    async fn update_step(&self, visitor_id: &str, current_step: Step) -> Result<()> {
        self.steps.lock().unwrap().push(current_step);
        self.inner.update_step(visitor_id, current_step).await
    }

    async fn subscribe_all(&self, listener: PresenceListener) -> Subscription {
        self.inner.subscribe_all(listener).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.inner.clear_all().await
    }

    async fn list_all(&self) -> Vec<LearnerRecord> {
        self.inner.list_all().await
    }
}

#[tokio::test]
async fn test_step_updates_issued_in_order() {
    let presence = Arc::new(RecordingPresence {
        inner: InMemoryPresenceStore::new(),
        steps: Mutex::new(Vec::new()),
    });
    let session = Arc::new(InMemorySessionStore::with_config(
        SessionConfig::active("ABC", 4).unwrap(),
    ));
    let learner = SessionController::start(session, presence.clone(), "v1").await;
    learner.select_team(2).unwrap();
    learner.join("Lee").await.unwrap();
    for _ in 0..4 {
        learner.next().unwrap();
    }
    learner.flush_presence().await;

    assert_eq!(
        *presence.steps.lock().unwrap(),
        vec![
            Step::ProblemDefinition,
            Step::AnalysisWhy,
            Step::Solution,
            Step::Report,
        ]
    );
    let record = presence.list_all().await[0].clone();
    assert_eq!(record.name, "Lee");
    assert_eq!(record.team_id, 2);
}

#[tokio::test]
async fn test_unreachable_presence_never_blocks_navigation() {
    let presence_documents = Arc::new(MemoryDocumentStore::new());
    presence_documents.set_offline(true);
    let presence: Arc<dyn PresenceStore> =
        Arc::new(RemotePresenceStore::new(presence_documents.clone()));
    let session = Arc::new(InMemorySessionStore::with_config(
        SessionConfig::active("ABC", 4).unwrap(),
    ));
    let learner = SessionController::start(session, presence.clone(), "v1").await;

    learner.select_team(3).unwrap();
    learner.join("Choi").await.unwrap();
    assert_eq!(learner.next().unwrap(), Step::ProblemDefinition);
    learner.flush_presence().await;

    presence_documents.set_offline(false);
    assert!(presence.list_all().await.is_empty());
    assert_eq!(learner.current_step(), Step::ProblemDefinition);
}

#[tokio::test]
async fn test_open_session_surfaces_write_failure() {
    let documents = Arc::new(MemoryDocumentStore::new());
    let presence: Arc<dyn PresenceStore> = Arc::new(InMemoryPresenceStore::new());
    let session = Arc::new(RemoteSessionStore::new(documents.clone()));
    let admin = SessionController::start(session, presence, "admin").await;
    admin.wait_until_loaded().await;
    admin.enter_admin().await;
    admin.set_setup_group_name("ABC");

    documents.set_offline(true);
    let err = admin.open_session().await.unwrap_err();
    assert!(err.is_write_failure());
    assert_eq!(admin.setup_draft().group_name, "ABC");

    documents.set_offline(false);
    admin.open_session().await.unwrap();
    assert!(
        eventually(|| admin
            .config()
            .is_some_and(|config| config.is_session_active))
        .await
    );
}
