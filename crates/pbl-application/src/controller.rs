//! Session controller: the single state machine behind both views.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use pbl_core::dashboard::{aggregate, learner_rows};
use pbl_core::error::{PblError, Result};
use pbl_core::presence::{LearnerRecord, PresenceStore, default_active_threshold};
use pbl_core::session::{SessionConfig, SessionStore, team_name};
use pbl_core::simulation::{
    CauseAnalysis, ProblemDefinition, Report, SimulationState, Solutions, UserProfile,
};
use pbl_core::step::Step;
use pbl_core::subscription::Subscription;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::beacon::PresenceBeacon;
use crate::screen::{
    AdminScreen, DashboardView, IntroDraft, LearnerScreen, SetupDraft, ViewMode, learner_screen,
};

/// What [`SessionController::exit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exit from the intro opens the admin view.
    EnteredAdmin,
    /// Exit from an exercise step logs the learner out locally.
    LoggedOut,
    /// Exit from the admin view returns to the learner view.
    LeftAdmin,
}

struct LocalState {
    view: ViewMode,
    simulation: SimulationState,
    intro: IntroDraft,
    /// Admin settings form while it is being edited.
    setup: Option<SetupDraft>,
}

fn lock(state: &Mutex<LocalState>) -> MutexGuard<'_, LocalState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Sends a learner who joined an earlier session back to team selection.
///
/// Opening a session clears the roster, so the old profile has no record
/// left to update.
fn leave_previous_session(state: &Mutex<LocalState>) {
    let mut state = lock(state);
    if state.simulation.user.is_some() {
        state.simulation.logout();
        debug!("Session reopened, learner returned to team selection");
    }
    state.intro = IntroDraft::default();
}

/// Drives one client: a learner walking through the exercise, or an admin
/// opening a session and watching progress.
///
/// The controller owns the local simulation state and a subscription to the
/// shared session config. Local navigation is applied synchronously; the
/// matching presence writes are queued to a background beacon and never
/// block it. Which backend the stores talk to is decided by whoever builds
/// the controller.
///
/// # Example
///
/// ```ignore
/// let controller = SessionController::start(session, presence, visitor_id).await;
/// controller.wait_until_loaded().await;
/// controller.select_team(2)?;
/// controller.join("Lee").await?;
/// controller.next()?;
/// ```
pub struct SessionController {
    session: Arc<dyn SessionStore>,
    presence: Arc<dyn PresenceStore>,
    visitor_id: String,
    active_threshold: Duration,
    config: watch::Receiver<Option<SessionConfig>>,
    _session_subscription: Subscription,
    roster: Arc<watch::Sender<Vec<LearnerRecord>>>,
    /// Held only while the admin view is open.
    roster_subscription: tokio::sync::Mutex<Option<Subscription>>,
    state: Arc<Mutex<LocalState>>,
    beacon: PresenceBeacon,
}

impl SessionController {
    /// Subscribes to the session config and starts the presence beacon.
    ///
    /// Returns immediately; until the first config arrives the learner view
    /// shows [`LearnerScreen::Loading`].
    pub async fn start(
        session: Arc<dyn SessionStore>,
        presence: Arc<dyn PresenceStore>,
        visitor_id: impl Into<String>,
    ) -> Self {
        let visitor_id = visitor_id.into();
        let state = Arc::new(Mutex::new(LocalState {
            view: ViewMode::Learner,
            simulation: SimulationState::new(),
            intro: IntroDraft::default(),
            setup: None,
        }));
        let (config_tx, config) = watch::channel(None);
        let config_tx = Arc::new(config_tx);
        let local = state.clone();
        let session_subscription = session
            .subscribe(Arc::new(move |latest: SessionConfig| {
                let opened = {
                    let previous = config_tx.borrow();
                    latest.activates_from(previous.as_ref())
                };
                if opened {
                    leave_previous_session(&local);
                }
                config_tx.send_replace(Some(latest));
            }))
            .await;
        let (roster, _) = watch::channel(Vec::new());
        debug!(visitor_id = %visitor_id, "Session controller started");

        Self {
            beacon: PresenceBeacon::spawn(presence.clone()),
            session,
            presence,
            visitor_id,
            active_threshold: default_active_threshold(),
            config,
            _session_subscription: session_subscription,
            roster: Arc::new(roster),
            roster_subscription: tokio::sync::Mutex::new(None),
            state,
        }
    }

    /// Overrides how recently a learner must have navigated to count as
    /// active on the dashboard.
    pub fn with_active_threshold(mut self, threshold: Duration) -> Self {
        self.active_threshold = threshold;
        self
    }

    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    // ============================================================================
    // Session config
    // ============================================================================

    /// Latest session config, or `None` while still loading.
    pub fn config(&self) -> Option<SessionConfig> {
        self.config.borrow().clone()
    }

    /// Waits for the first session config delivery.
    pub async fn wait_until_loaded(&self) -> SessionConfig {
        let mut config = self.config.clone();
        match config.wait_for(Option::is_some).await {
            Ok(loaded) => loaded.clone().unwrap_or_default(),
            Err(_) => {
                warn!("Session subscription closed before the first value");
                SessionConfig::default()
            }
        }
    }

    /// Receiver that changes with every delivered session config.
    pub fn watch_config(&self) -> watch::Receiver<Option<SessionConfig>> {
        self.config.clone()
    }

    fn active_config(&self) -> Result<SessionConfig> {
        match self.config() {
            Some(config) if config.is_session_active => Ok(config),
            _ => Err(PblError::SessionInactive),
        }
    }

    // ============================================================================
    // Learner view
    // ============================================================================

    pub fn view_mode(&self) -> ViewMode {
        lock(&self.state).view
    }

    pub fn learner_screen(&self) -> LearnerScreen {
        let config = self.config();
        let state = lock(&self.state);
        learner_screen(config.as_ref(), state.simulation.current_step, &state.intro)
    }

    pub fn current_step(&self) -> Step {
        lock(&self.state).simulation.current_step
    }

    pub fn profile(&self) -> Option<UserProfile> {
        lock(&self.state).simulation.user.clone()
    }

    /// Picks a team on the intro screen.
    pub fn select_team(&self, team_id: u32) -> Result<()> {
        let config = self.active_config()?;
        if !config.contains_team(team_id) {
            return Err(PblError::validation(format!(
                "team must be between 1 and {}, got {}",
                config.total_teams, team_id
            )));
        }
        let mut state = lock(&self.state);
        if state.simulation.current_step != Step::Intro {
            return Err(PblError::validation("already joined"));
        }
        state.intro.team_id = Some(team_id);
        Ok(())
    }

    /// Returns from name entry to team selection.
    pub fn change_team(&self) {
        lock(&self.state).intro.team_id = None;
    }

    /// Joins the open session under `name` with the selected team and moves
    /// to the situation step.
    ///
    /// The presence record is written before the step changes. If that write
    /// fails the learner still advances; the failure is only logged.
    ///
    /// # Errors
    ///
    /// - `PblError::SessionInactive` when no session is open
    /// - `PblError::Validation` for an empty name, no selected team, or a
    ///   team outside the current team count
    pub async fn join(&self, name: &str) -> Result<UserProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PblError::validation("name must not be empty"));
        }
        let config = self.active_config()?;
        let team_id = {
            let state = lock(&self.state);
            if state.simulation.current_step != Step::Intro {
                return Err(PblError::validation("already joined"));
            }
            state
                .intro
                .team_id
                .ok_or_else(|| PblError::validation("no team selected"))?
        };
        if !config.contains_team(team_id) {
            return Err(PblError::validation(format!(
                "team must be between 1 and {}, got {}",
                config.total_teams, team_id
            )));
        }

        let profile = UserProfile {
            name: name.to_string(),
            team_id,
            team_name: team_name(team_id),
            group_name: config.group_name.clone(),
        };

        if let Err(e) = self
            .beacon
            .upsert(
                &self.visitor_id,
                &profile.name,
                profile.team_id,
                &profile.team_name,
                Step::Situation,
            )
            .await
        {
            warn!(
                visitor_id = %self.visitor_id,
                team_id,
                error = %e,
                "Presence registration failed, continuing"
            );
        }

        {
            let mut state = lock(&self.state);
            state.simulation.user = Some(profile.clone());
            state.simulation.current_step = Step::Situation;
            state.intro = IntroDraft::default();
        }
        info!(
            visitor_id = %self.visitor_id,
            team_id,
            group_name = %profile.group_name,
            "Learner joined"
        );
        Ok(profile)
    }

    /// Advances to the next step.
    pub fn next(&self) -> Result<Step> {
        self.navigate(Step::next, "already at the last step")
    }

    /// Returns to the previous step. Not available from the situation step.
    pub fn back(&self) -> Result<Step> {
        self.navigate(Step::previous, "no previous step")
    }

    fn navigate(&self, target: fn(Step) -> Option<Step>, unavailable: &str) -> Result<Step> {
        self.active_config()?;
        let mut state = lock(&self.state);
        let current = state.simulation.current_step;
        if current == Step::Intro || state.simulation.user.is_none() {
            return Err(PblError::validation("join the session first"));
        }
        let step = target(current).ok_or_else(|| PblError::validation(unavailable))?;

        // Queued under the state lock so presence sees steps in local order.
        self.beacon.update_step(&self.visitor_id, step);
        state.simulation.current_step = step;
        debug!(visitor_id = %self.visitor_id, from = %current, to = %step, "Step changed");
        Ok(step)
    }

    /// The exit button.
    ///
    /// From the intro it opens the admin view. From any exercise step it
    /// logs the learner out locally: back to the intro with the profile
    /// cleared. The presence record is left as it was. From the admin view
    /// it returns to the learner view.
    pub async fn exit(&self) -> ExitOutcome {
        let outcome = {
            let mut state = lock(&self.state);
            match state.view {
                ViewMode::Admin => {
                    state.view = ViewMode::Learner;
                    state.setup = None;
                    ExitOutcome::LeftAdmin
                }
                ViewMode::Learner if state.simulation.current_step == Step::Intro => {
                    state.view = ViewMode::Admin;
                    ExitOutcome::EnteredAdmin
                }
                ViewMode::Learner => {
                    state.simulation.logout();
                    state.intro = IntroDraft::default();
                    ExitOutcome::LoggedOut
                }
            }
        };

        match outcome {
            ExitOutcome::EnteredAdmin => self.watch_roster_updates().await,
            ExitOutcome::LeftAdmin => *self.roster_subscription.lock().await = None,
            ExitOutcome::LoggedOut => {
                info!(visitor_id = %self.visitor_id, "Learner logged out")
            }
        }
        outcome
    }

    // ============================================================================
    // Simulation state
    // ============================================================================

    pub fn simulation(&self) -> SimulationState {
        lock(&self.state).simulation.clone()
    }

    pub fn set_problem_definition(&self, data: ProblemDefinition) {
        lock(&self.state).simulation.set_problem_definition(data);
    }

    pub fn set_analysis_fire(&self, data: CauseAnalysis) {
        lock(&self.state).simulation.set_analysis_fire(data);
    }

    pub fn set_analysis_injury(&self, data: CauseAnalysis) {
        lock(&self.state).simulation.set_analysis_injury(data);
    }

    pub fn set_solutions(&self, data: Solutions) {
        lock(&self.state).simulation.set_solutions(data);
    }

    pub fn report(&self) -> Report {
        lock(&self.state).simulation.report()
    }

    // ============================================================================
    // Admin view
    // ============================================================================

    /// Switches straight to the admin view.
    pub async fn enter_admin(&self) {
        lock(&self.state).view = ViewMode::Admin;
        self.watch_roster_updates().await;
    }

    async fn watch_roster_updates(&self) {
        let mut slot = self.roster_subscription.lock().await;
        if slot.is_some() {
            return;
        }
        let sink = self.roster.clone();
        let subscription = self
            .presence
            .subscribe_all(Arc::new(move |roster: Vec<LearnerRecord>| {
                sink.send_replace(roster);
            }))
            .await;
        *slot = Some(subscription);
    }

    /// Receiver that changes with every delivered roster while the admin
    /// view is open.
    pub fn watch_roster(&self) -> watch::Receiver<Vec<LearnerRecord>> {
        self.roster.subscribe()
    }

    pub fn admin_screen(&self) -> AdminScreen {
        self.admin_screen_at(Utc::now())
    }

    /// The admin screen with learner activity judged as of `now`.
    pub fn admin_screen_at(&self, now: DateTime<Utc>) -> AdminScreen {
        let Some(config) = self.config() else {
            return AdminScreen::Loading;
        };
        if let Some(draft) = lock(&self.state).setup.clone() {
            return AdminScreen::Setup(draft);
        }
        if !config.is_session_active {
            return AdminScreen::Setup(SetupDraft::from_config(&config));
        }
        AdminScreen::Dashboard(self.dashboard_view(&config, now))
    }

    fn dashboard_view(&self, config: &SessionConfig, now: DateTime<Utc>) -> DashboardView {
        let roster = self.roster.borrow().clone();
        DashboardView {
            group_name: config.group_name.clone(),
            total_teams: config.total_teams,
            stats: aggregate(config, &roster, now, self.active_threshold),
            learners: learner_rows(&roster, now, self.active_threshold),
        }
    }

    /// Current contents of the settings form.
    pub fn setup_draft(&self) -> SetupDraft {
        let config = self.config().unwrap_or_default();
        lock(&self.state)
            .setup
            .clone()
            .unwrap_or_else(|| SetupDraft::from_config(&config))
    }

    /// Reopens the settings form while a session is running.
    pub fn begin_setup(&self) {
        let draft = self.setup_draft();
        lock(&self.state).setup = Some(draft);
    }

    /// Leaves the settings form without writing.
    pub fn cancel_setup(&self) {
        lock(&self.state).setup = None;
    }

    pub fn set_setup_group_name(&self, group_name: &str) {
        let mut draft = self.setup_draft();
        draft.group_name = group_name.to_string();
        lock(&self.state).setup = Some(draft);
    }

    pub fn set_setup_total_teams(&self, total_teams: u32) -> Result<()> {
        SessionConfig::validate_total_teams(total_teams)?;
        let mut draft = self.setup_draft();
        draft.total_teams = total_teams;
        lock(&self.state).setup = Some(draft);
        Ok(())
    }

    /// Writes the settings form as an active session.
    ///
    /// Validation happens before anything is written. A failed write is
    /// returned so the admin can retry; the form keeps its contents.
    pub async fn open_session(&self) -> Result<SessionConfig> {
        let draft = self.setup_draft();
        let config = SessionConfig::active(draft.group_name.trim(), draft.total_teams)?;

        if let Err(e) = self.session.write(config.clone()).await {
            warn!(group_name = %config.group_name, error = %e, "Opening session failed");
            return Err(e);
        }

        lock(&self.state).setup = None;
        info!(
            group_name = %config.group_name,
            total_teams = config.total_teams,
            "Session settings saved"
        );
        Ok(config)
    }

    /// Resolves once every presence write issued so far has been attempted.
    pub async fn flush_presence(&self) {
        self.beacon.flush().await;
    }
}
