//! Resource naming contract.
//!
//! Every name, label, and selector the orchestrator writes or looks up is
//! derived here from the application prefix and a [`PlayerId`]. Provisioning
//! creates resources under these names and reclamation finds them again by
//! the same rules, so changing any of them orphans existing players.
//!
//! Service names, Job names (copied by the control plane into the pods'
//! `job-name` label), and label values are capped at
//! [`MAX_BOUNDED_NAME_LEN`]. [`Naming::max_player_id_len`] is the longest
//! player id for which every one of them fits under this prefix.

use std::collections::BTreeMap;

use crate::types::{MAX_PLAYER_ID_LEN, PlayerId, PlayerIdError};

/// Label holding the resource "kind" (cabinet, player-cloud, ...).
pub const LABEL_NAME: &str = "app.kubernetes.io/name";
/// Label holding the per-player instance.
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";

/// Length limit for DNS-1123 label names and label values.
pub const MAX_BOUNDED_NAME_LEN: usize = 63;

/// Which command a cloud job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudJobAction {
    /// Create (or converge) the player's cloud resources.
    Apply,
    /// Tear the player's cloud resources down.
    Destroy,
}

impl CloudJobAction {
    const ALL: [CloudJobAction; 2] = [CloudJobAction::Apply, CloudJobAction::Destroy];

    fn suffix(self) -> &'static str {
        match self {
            CloudJobAction::Apply => "cloud",
            CloudJobAction::Destroy => "cloud-cleanup",
        }
    }
}

/// Derives resource identity from an application prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    app: String,
    state_secret_prefix: String,
}

impl Naming {
    pub fn new(app: impl Into<String>, state_secret_prefix: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            state_secret_prefix: state_secret_prefix.into(),
        }
    }

    // ── Player id bounds ────────────────────────────────────────────

    /// Longest player id whose derived names all stay within
    /// [`MAX_BOUNDED_NAME_LEN`]. Zero when the prefix leaves no room.
    pub fn max_player_id_len(&self) -> usize {
        let overhead = self
            .bounded_names_for("")
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0);
        MAX_BOUNDED_NAME_LEN
            .saturating_sub(overhead)
            .min(MAX_PLAYER_ID_LEN)
    }

    /// Reject ids that would push a derived name past the limit.
    pub fn check_player(&self, player: &PlayerId) -> Result<(), PlayerIdError> {
        let max = self.max_player_id_len();
        if player.as_str().len() > max {
            return Err(PlayerIdError::TooLongForApp {
                id: player.to_string(),
                app: self.app.clone(),
                max,
            });
        }
        Ok(())
    }

    /// [`PlayerId::parse`] plus [`Naming::check_player`].
    pub fn parse_player(&self, raw: impl Into<String>) -> Result<PlayerId, PlayerIdError> {
        let player = PlayerId::parse(raw)?;
        self.check_player(&player)?;
        Ok(player)
    }

    /// Every length-bounded name and label value derived for `player`.
    pub fn bounded_names(&self, player: &PlayerId) -> Vec<String> {
        self.bounded_names_for(player.as_str())
    }

    fn bounded_names_for(&self, p: &str) -> Vec<String> {
        let mut names = vec![self.workload(p), self.service(p)];
        names.extend(self.cabinet_labels_for(p).into_values());
        for action in CloudJobAction::ALL {
            names.push(self.cloud_job(p, action));
            names.extend(self.cloud_job_labels_for(p, action).into_values());
        }
        names.extend(self.state_secret_labels().into_values());
        names
    }

    // ── Cabinet (Workload + Service) ────────────────────────────────

    /// `{app}-player-{player}`
    pub fn workload_name(&self, player: &PlayerId) -> String {
        self.workload(player.as_str())
    }

    /// `{app}-cabinet-player-{player}`
    pub fn service_name(&self, player: &PlayerId) -> String {
        self.service(player.as_str())
    }

    /// Kind + instance labels shared by the workload, its pods, and the
    /// service selector.
    pub fn cabinet_labels(&self, player: &PlayerId) -> BTreeMap<String, String> {
        self.cabinet_labels_for(player.as_str())
    }

    /// Label selector matching exactly one player's cabinet.
    pub fn cabinet_selector(&self, player: &PlayerId) -> String {
        format!("{LABEL_INSTANCE}={}", self.cabinet_instance(player.as_str()))
    }

    fn workload(&self, p: &str) -> String {
        format!("{}-player-{p}", self.app)
    }

    fn service(&self, p: &str) -> String {
        format!("{}-cabinet-player-{p}", self.app)
    }

    fn cabinet_instance(&self, p: &str) -> String {
        format!("{}-cabinet-{p}", self.app)
    }

    fn cabinet_labels_for(&self, p: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LABEL_NAME.to_string(), format!("{}-cabinet", self.app)),
            (LABEL_INSTANCE.to_string(), self.cabinet_instance(p)),
        ])
    }

    // ── Cloud jobs ──────────────────────────────────────────────────

    /// `{app}-player-{player}-cloud` or `{app}-player-{player}-cloud-cleanup`
    pub fn cloud_job_name(&self, player: &PlayerId, action: CloudJobAction) -> String {
        self.cloud_job(player.as_str(), action)
    }

    pub fn cloud_job_labels(
        &self,
        player: &PlayerId,
        action: CloudJobAction,
    ) -> BTreeMap<String, String> {
        self.cloud_job_labels_for(player.as_str(), action)
    }

    fn cloud_job(&self, p: &str, action: CloudJobAction) -> String {
        format!("{}-player-{p}-{}", self.app, action.suffix())
    }

    fn cloud_job_labels_for(&self, p: &str, action: CloudJobAction) -> BTreeMap<String, String> {
        let kind = format!("{}-player-{}", self.app, action.suffix());
        BTreeMap::from([
            (LABEL_NAME.to_string(), kind.clone()),
            (LABEL_INSTANCE.to_string(), format!("{kind}-{p}")),
        ])
    }

    /// Default service account for cloud jobs; it may read and write the
    /// tool's state secrets.
    pub fn cloud_service_account(&self) -> String {
        format!("{}-service-account", self.app)
    }

    // ── Cloud state secrets ─────────────────────────────────────────

    /// `{prefix}{player}`
    pub fn state_secret_name(&self, player: &PlayerId) -> String {
        format!("{}{player}", self.state_secret_prefix)
    }

    /// Label every cloud state secret carries.
    pub fn state_secret_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            LABEL_NAME.to_string(),
            format!("{}-player-cloud-state", self.app),
        )])
    }

    /// Selector listing all cloud state secrets.
    pub fn state_secret_selector(&self) -> String {
        format!("{LABEL_NAME}={}-player-cloud-state", self.app)
    }

    /// Recover the player id from a state secret name.
    ///
    /// Returns `None` when the prefix is missing or the remainder is not a
    /// player id this prefix can provision.
    pub fn player_from_state_secret(&self, secret_name: &str) -> Option<PlayerId> {
        let raw = secret_name.strip_prefix(self.state_secret_prefix.as_str())?;
        self.parse_player(raw).ok()
    }
}
