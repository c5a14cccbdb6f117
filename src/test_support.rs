//! Test support utilities shared across unit and integration tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::api::{
    ApiFuture, ImageSummary, PowerAction, ServerApi, ServerRecord, ServerSpec, ServerState,
    VolumeRef,
};

/// Records a single call made through [`ScriptedApi`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiCall {
    /// The server listing was fetched.
    ListServers,
    /// A server create was issued.
    CreateServer {
        /// Hostname from the spec.
        name: String,
    },
    /// A server delete was issued.
    DeleteServer {
        /// Server identifier.
        id: String,
    },
    /// The advertised action list was fetched.
    ServerActions {
        /// Server identifier.
        id: String,
    },
    /// A power action was issued.
    PerformAction {
        /// Server identifier.
        id: String,
        /// Action that was posted.
        action: PowerAction,
    },
    /// A volume delete was issued.
    DeleteVolume {
        /// Volume identifier.
        id: String,
    },
    /// The image listing was fetched.
    ListImages,
}

/// Error produced by [`ScriptedApi`] when a failure has been scripted.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted failure: {0}")]
pub struct ScriptedApiError(pub String);

#[derive(Debug, Default)]
struct ScriptedState {
    servers: Vec<ServerRecord>,
    snapshots: VecDeque<Vec<ServerRecord>>,
    actions: HashMap<String, Vec<String>>,
    images: Vec<ImageSummary>,
    calls: Vec<ApiCall>,
    fail_list: bool,
    fail_create: HashSet<String>,
    fail_delete_server: HashSet<String>,
    fail_delete_volume: HashSet<String>,
    fail_action: HashSet<String>,
}

/// In-memory [`ServerApi`] double that records calls and serves seeded state.
///
/// Listings return the seeded servers, or the next queued snapshot when one
/// has been pushed, which lets polling tests script an evolving remote.
/// Failures are injected per target; unscripted calls succeed.
#[derive(Clone, Debug, Default)]
pub struct ScriptedApi {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedApi {
    /// Creates a double with an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seeds a server into the current inventory.
    pub fn add_server(&self, record: ServerRecord) {
        self.state().servers.push(record);
    }

    /// Sets the advertised action list for a server id.
    pub fn set_actions(&self, id: impl Into<String>, actions: &[&str]) {
        self.state()
            .actions
            .insert(id.into(), actions.iter().map(|&a| a.to_owned()).collect());
    }

    /// Seeds the image listing.
    pub fn set_images(&self, images: Vec<ImageSummary>) {
        self.state().images = images;
    }

    /// Queues an inventory snapshot; each listing consumes one and the last
    /// consumed snapshot becomes the current inventory.
    pub fn push_snapshot(&self, servers: Vec<ServerRecord>) {
        self.state().snapshots.push_back(servers);
    }

    /// Makes the next listing fail.
    pub fn fail_next_list(&self) {
        self.state().fail_list = true;
    }

    /// Makes creates for the given hostname fail.
    pub fn fail_create_for(&self, name: impl Into<String>) {
        self.state().fail_create.insert(name.into());
    }

    /// Makes server deletes for the given id fail.
    pub fn fail_delete_server_for(&self, id: impl Into<String>) {
        self.state().fail_delete_server.insert(id.into());
    }

    /// Makes volume deletes for the given id fail.
    pub fn fail_delete_volume_for(&self, id: impl Into<String>) {
        self.state().fail_delete_volume.insert(id.into());
    }

    /// Makes power actions for the given server id fail.
    pub fn fail_action_for(&self, id: impl Into<String>) {
        self.state().fail_action.insert(id.into());
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// Returns how many recorded calls satisfy the filter.
    #[must_use]
    pub fn count_calls(&self, filter: impl Fn(&ApiCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| filter(call)).count()
    }

    fn scripted_list(&self) -> Result<Vec<ServerRecord>, ScriptedApiError> {
        let mut state = self.state();
        state.calls.push(ApiCall::ListServers);
        if state.fail_list {
            state.fail_list = false;
            return Err(ScriptedApiError(String::from("list servers")));
        }
        if let Some(snapshot) = state.snapshots.pop_front() {
            state.servers = snapshot;
        }
        Ok(state.servers.clone())
    }

    fn scripted_create(&self, spec: &ServerSpec) -> Result<ServerRecord, ScriptedApiError> {
        let mut state = self.state();
        state.calls.push(ApiCall::CreateServer {
            name: spec.name.clone(),
        });
        if state.fail_create.contains(&spec.name) {
            return Err(ScriptedApiError(format!("create {}", spec.name)));
        }
        let record = ServerRecord {
            id: format!("id-{}", spec.name),
            name: spec.name.clone(),
            state: ServerState::Stopped,
            volumes: Vec::new(),
        };
        state.servers.push(record.clone());
        Ok(record)
    }

    fn scripted_delete_server(&self, id: &str) -> Result<(), ScriptedApiError> {
        let mut state = self.state();
        state.calls.push(ApiCall::DeleteServer { id: id.to_owned() });
        if state.fail_delete_server.contains(id) {
            return Err(ScriptedApiError(format!("delete server {id}")));
        }
        state.servers.retain(|server| server.id != id);
        Ok(())
    }

    fn scripted_actions(&self, id: &str) -> Result<Vec<String>, ScriptedApiError> {
        let mut state = self.state();
        state.calls.push(ApiCall::ServerActions { id: id.to_owned() });
        Ok(state.actions.get(id).cloned().unwrap_or_default())
    }

    fn scripted_perform(&self, id: &str, action: PowerAction) -> Result<(), ScriptedApiError> {
        let mut state = self.state();
        state.calls.push(ApiCall::PerformAction {
            id: id.to_owned(),
            action,
        });
        if state.fail_action.contains(id) {
            return Err(ScriptedApiError(format!("action {action} on {id}")));
        }
        Ok(())
    }

    fn scripted_delete_volume(&self, id: &str) -> Result<(), ScriptedApiError> {
        let mut state = self.state();
        state.calls.push(ApiCall::DeleteVolume { id: id.to_owned() });
        if state.fail_delete_volume.contains(id) {
            return Err(ScriptedApiError(format!("delete volume {id}")));
        }
        Ok(())
    }

    fn scripted_images(&self) -> Result<Vec<ImageSummary>, ScriptedApiError> {
        let mut state = self.state();
        state.calls.push(ApiCall::ListImages);
        Ok(state.images.clone())
    }
}

impl ServerApi for ScriptedApi {
    type Error = ScriptedApiError;

    fn list_servers(&self) -> ApiFuture<'_, Vec<ServerRecord>, Self::Error> {
        let result = self.scripted_list();
        Box::pin(async move { result })
    }

    fn create_server<'a>(
        &'a self,
        spec: &'a ServerSpec,
    ) -> ApiFuture<'a, ServerRecord, Self::Error> {
        let result = self.scripted_create(spec);
        Box::pin(async move { result })
    }

    fn delete_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, (), Self::Error> {
        let result = self.scripted_delete_server(id);
        Box::pin(async move { result })
    }

    fn server_actions<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Vec<String>, Self::Error> {
        let result = self.scripted_actions(id);
        Box::pin(async move { result })
    }

    fn perform_action<'a>(
        &'a self,
        id: &'a str,
        action: PowerAction,
    ) -> ApiFuture<'a, (), Self::Error> {
        let result = self.scripted_perform(id, action);
        Box::pin(async move { result })
    }

    fn delete_volume<'a>(&'a self, id: &'a str) -> ApiFuture<'a, (), Self::Error> {
        let result = self.scripted_delete_volume(id);
        Box::pin(async move { result })
    }

    fn list_images(&self) -> ApiFuture<'_, Vec<ImageSummary>, Self::Error> {
        let result = self.scripted_images();
        Box::pin(async move { result })
    }
}

/// Builds a server record for tests.
#[must_use]
pub fn server(
    id: impl Into<String>,
    name: impl Into<String>,
    state: ServerState,
    volume_ids: &[&str],
) -> ServerRecord {
    ServerRecord {
        id: id.into(),
        name: name.into(),
        state,
        volumes: volume_ids
            .iter()
            .map(|&vol| VolumeRef { id: vol.to_owned() })
            .collect(),
    }
}
