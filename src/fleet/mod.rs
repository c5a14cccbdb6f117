//! Fleet reconciliation over a server-management API.
//!
//! Every operation fetches a fresh inventory snapshot, fans per-target work
//! out concurrently under a configurable bound, and collects one report per
//! target so callers can tell exactly which items succeeded, were skipped,
//! or failed. Nothing is cached between operations.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures_util::{StreamExt, stream};
use thiserror::Error;
use tokio::time::sleep;

use crate::api::{ImageSummary, PowerAction, ServerApi, ServerRecord, ServerSpec, ServerState};

const DEFAULT_FAN_OUT: usize = 8;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Point-in-time mapping from server name to remote server record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Inventory {
    by_name: HashMap<String, ServerRecord>,
}

impl Inventory {
    /// Indexes records by name. Duplicate hostnames are rejected rather than
    /// silently overwritten; the returned error carries the offending name.
    fn try_from_records(records: Vec<ServerRecord>) -> Result<Self, String> {
        let mut by_name = HashMap::with_capacity(records.len());
        for record in records {
            let name = record.name.clone();
            if by_name.insert(name.clone(), record).is_some() {
                return Err(name);
            }
        }
        Ok(Self { by_name })
    }

    /// Looks up a server by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServerRecord> {
        self.by_name.get(name)
    }

    /// Returns whether a server with the given name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of servers in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterates over the records in the snapshot in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ServerRecord> {
        self.by_name.values()
    }
}

/// Errors that abort a whole fleet operation.
///
/// Per-target problems (missing server, wrong state, a single failed call)
/// are reported in the operation's per-item reports instead.
#[derive(Debug, Error)]
pub enum FleetError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the server listing could not be fetched.
    #[error("failed to fetch server inventory: {0}")]
    Inventory(#[source] E),
    /// Raised when the remote listing reports the same hostname twice.
    #[error("duplicate hostname in remote inventory: {name}")]
    DuplicateName {
        /// Hostname that appeared more than once.
        name: String,
    },
    /// Raised when the image listing could not be fetched.
    #[error("failed to list images: {0}")]
    Images(#[source] E),
    /// Raised when polling did not complete before the caller's deadline.
    #[error("poll deadline exceeded after {} seconds", waited.as_secs())]
    DeadlineExceeded {
        /// Total time spent polling before giving up.
        waited: Duration,
    },
}

/// Per-target outcome of [`Fleet::ensure_created`].
#[derive(Debug)]
pub struct CreateReport<E> {
    /// Hostname of the desired server.
    pub name: String,
    /// What happened for this target.
    pub outcome: CreateOutcome<E>,
}

/// Disposition of a single create target.
#[derive(Debug)]
pub enum CreateOutcome<E> {
    /// A create call was issued and accepted.
    Created,
    /// A server with this name already exists; no call was issued.
    AlreadyExists,
    /// The create call failed.
    Failed(E),
}

impl<E> CreateOutcome<E> {
    /// Returns whether this outcome represents a hard failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-target outcome of [`Fleet::ensure_deleted`].
#[derive(Debug)]
pub struct DeleteReport<E> {
    /// Hostname of the targeted server.
    pub name: String,
    /// What happened for this target.
    pub outcome: DeleteOutcome<E>,
}

/// Disposition of a single delete target.
#[derive(Debug)]
pub enum DeleteOutcome<E> {
    /// The server and all its attached volumes were deleted.
    Deleted {
        /// Number of volumes deleted after the server.
        volumes_deleted: usize,
    },
    /// No server with this name exists; treated as already deleted.
    Missing,
    /// The server was not in the `stopped` state; nothing was issued.
    WrongState(ServerState),
    /// The server was deleted but at least one volume delete failed.
    VolumeCleanupFailed {
        /// Volumes successfully deleted before or alongside the failure.
        volumes_deleted: usize,
        /// First volume-delete error observed.
        error: E,
    },
    /// The server delete call itself failed; volumes were left untouched.
    Failed(E),
}

impl<E> DeleteOutcome<E> {
    /// Returns whether this outcome represents a hard failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::VolumeCleanupFailed { .. })
    }
}

/// Per-target outcome of [`Fleet::ensure_started`] and
/// [`Fleet::ensure_terminated`].
#[derive(Debug)]
pub struct ActionReport<E> {
    /// Hostname of the targeted server.
    pub name: String,
    /// What happened for this target.
    pub outcome: ActionOutcome<E>,
}

/// Disposition of a single power-transition target.
#[derive(Debug)]
pub enum ActionOutcome<E> {
    /// The action was issued and accepted.
    Done,
    /// No server with this name exists.
    Missing,
    /// The server was not in the state the transition requires.
    WrongState(ServerState),
    /// The provider does not currently permit the action for this server.
    ActionUnavailable {
        /// Actions the provider advertised instead.
        available: Vec<String>,
    },
    /// The action fetch or the action call failed.
    Failed(E),
}

impl<E> ActionOutcome<E> {
    /// Returns whether this outcome represents a hard failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Presence report for a single expected server, from [`Fleet::describe`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerReport {
    /// Hostname that was expected.
    pub name: String,
    /// The matching record, when one exists.
    pub info: Option<ServerRecord>,
}

impl ServerReport {
    /// Returns whether the expected server is present.
    #[must_use]
    pub const fn present(&self) -> bool {
        self.info.is_some()
    }
}

/// Per-target snapshot handed to the `on_tick` callback of
/// [`Fleet::poll_until`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollStatus {
    /// Hostname being watched.
    pub name: String,
    /// The record from the latest inventory fetch, when present.
    pub info: Option<ServerRecord>,
    /// Time elapsed since polling started.
    pub waiting_for: Duration,
}

impl PollStatus {
    /// Returns whether the watched server is present.
    #[must_use]
    pub const fn present(&self) -> bool {
        self.info.is_some()
    }
}

/// Reconciles a declared set of servers against remote state.
#[derive(Clone, Debug)]
pub struct Fleet<A> {
    api: A,
    fan_out: usize,
    poll_interval: Duration,
}

impl<A: ServerApi> Fleet<A> {
    /// Creates a fleet over the given API with default fan-out and polling
    /// interval.
    #[must_use]
    pub const fn new(api: A) -> Self {
        Self {
            api,
            fan_out: DEFAULT_FAN_OUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the number of provider calls allowed in flight at once.
    ///
    /// Values below one are raised to one.
    #[must_use]
    pub const fn with_fan_out(mut self, limit: usize) -> Self {
        self.fan_out = if limit == 0 { 1 } else { limit };
        self
    }

    /// Overrides the polling interval used by [`Fleet::poll_until`].
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns the underlying API value.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Fetches the current remote inventory, indexed by hostname.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Inventory`] when the listing fails and
    /// [`FleetError::DuplicateName`] when the remote listing reports the
    /// same hostname twice.
    pub async fn inventory(&self) -> Result<Inventory, FleetError<A::Error>> {
        let records = self
            .api
            .list_servers()
            .await
            .map_err(FleetError::Inventory)?;
        Inventory::try_from_records(records).map_err(|name| FleetError::DuplicateName { name })
    }

    /// Creates every desired server whose name is absent from the current
    /// inventory. Present names are reported as [`CreateOutcome::AlreadyExists`]
    /// without issuing a call, making creation idempotent by name.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError`] only when the inventory fetch fails; individual
    /// create failures appear in the per-item reports.
    pub async fn ensure_created(
        &self,
        desired: &[ServerSpec],
    ) -> Result<Vec<CreateReport<A::Error>>, FleetError<A::Error>> {
        let inventory = self.inventory().await?;
        let reports = stream::iter(desired.iter().map(|spec| self.create_one(&inventory, spec)))
            .buffered(self.fan_out)
            .collect()
            .await;
        Ok(reports)
    }

    async fn create_one(&self, inventory: &Inventory, spec: &ServerSpec) -> CreateReport<A::Error> {
        let outcome = if inventory.contains(&spec.name) {
            CreateOutcome::AlreadyExists
        } else {
            match self.api.create_server(spec).await {
                Ok(_) => CreateOutcome::Created,
                Err(error) => CreateOutcome::Failed(error),
            }
        };
        CreateReport {
            name: spec.name.clone(),
            outcome,
        }
    }

    /// Deletes every stopped target server along with its attached volumes.
    ///
    /// Deletion only proceeds from the `stopped` state; anything else is
    /// reported as [`DeleteOutcome::WrongState`] without issuing a call.
    /// Volume deletes are issued only after the owning server's delete has
    /// completed, using the volume list captured in the inventory snapshot.
    /// Absent targets report [`DeleteOutcome::Missing`]. Released IP
    /// addresses are not reclaimed.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError`] only when the inventory fetch fails; individual
    /// delete failures appear in the per-item reports.
    pub async fn ensure_deleted(
        &self,
        targets: &[String],
    ) -> Result<Vec<DeleteReport<A::Error>>, FleetError<A::Error>> {
        let inventory = self.inventory().await?;
        let reports = stream::iter(targets.iter().map(|name| self.delete_one(&inventory, name)))
            .buffered(self.fan_out)
            .collect()
            .await;
        Ok(reports)
    }

    async fn delete_one(&self, inventory: &Inventory, name: &str) -> DeleteReport<A::Error> {
        let Some(server) = inventory.get(name) else {
            return DeleteReport {
                name: name.to_owned(),
                outcome: DeleteOutcome::Missing,
            };
        };

        if server.state != ServerState::Stopped {
            return DeleteReport {
                name: name.to_owned(),
                outcome: DeleteOutcome::WrongState(server.state.clone()),
            };
        }

        if let Err(error) = self.api.delete_server(&server.id).await {
            return DeleteReport {
                name: name.to_owned(),
                outcome: DeleteOutcome::Failed(error),
            };
        }

        let results: Vec<Result<(), A::Error>> =
            stream::iter(server.volumes.iter().map(|vol| self.api.delete_volume(&vol.id)))
                .buffered(self.fan_out)
                .collect()
                .await;

        let mut volumes_deleted = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(()) => volumes_deleted += 1,
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        let outcome = match first_error {
            None => DeleteOutcome::Deleted { volumes_deleted },
            Some(error) => DeleteOutcome::VolumeCleanupFailed {
                volumes_deleted,
                error,
            },
        };
        DeleteReport {
            name: name.to_owned(),
            outcome,
        }
    }

    /// Reports presence and detail for each expected server name.
    ///
    /// This is a pure read: exactly one listing is fetched and nothing is
    /// mutated.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError`] when the inventory fetch fails.
    pub async fn describe(
        &self,
        expected: &[String],
    ) -> Result<Vec<ServerReport>, FleetError<A::Error>> {
        let inventory = self.inventory().await?;
        Ok(expected
            .iter()
            .map(|name| ServerReport {
                name: name.clone(),
                info: inventory.get(name).cloned(),
            })
            .collect())
    }

    /// Powers on every target currently in the `stopped` state, provided the
    /// provider advertises the `poweron` action for it.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError`] only when the inventory fetch fails; individual
    /// action failures appear in the per-item reports.
    pub async fn ensure_started(
        &self,
        targets: &[String],
    ) -> Result<Vec<ActionReport<A::Error>>, FleetError<A::Error>> {
        self.power_transition(targets, &ServerState::Stopped, PowerAction::PowerOn)
            .await
    }

    /// Terminates every target currently in the `running` state, provided the
    /// provider advertises the `terminate` action for it.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError`] only when the inventory fetch fails; individual
    /// action failures appear in the per-item reports.
    pub async fn ensure_terminated(
        &self,
        targets: &[String],
    ) -> Result<Vec<ActionReport<A::Error>>, FleetError<A::Error>> {
        self.power_transition(targets, &ServerState::Running, PowerAction::Terminate)
            .await
    }

    async fn power_transition(
        &self,
        targets: &[String],
        required: &ServerState,
        action: PowerAction,
    ) -> Result<Vec<ActionReport<A::Error>>, FleetError<A::Error>> {
        let inventory = self.inventory().await?;
        let reports = stream::iter(
            targets
                .iter()
                .map(|name| self.transition_one(&inventory, name, required, action)),
        )
        .buffered(self.fan_out)
        .collect()
        .await;
        Ok(reports)
    }

    async fn transition_one(
        &self,
        inventory: &Inventory,
        name: &str,
        required: &ServerState,
        action: PowerAction,
    ) -> ActionReport<A::Error> {
        let Some(server) = inventory.get(name) else {
            return ActionReport {
                name: name.to_owned(),
                outcome: ActionOutcome::Missing,
            };
        };

        if server.state != *required {
            return ActionReport {
                name: name.to_owned(),
                outcome: ActionOutcome::WrongState(server.state.clone()),
            };
        }

        let available = match self.api.server_actions(&server.id).await {
            Ok(actions) => actions,
            Err(error) => {
                return ActionReport {
                    name: name.to_owned(),
                    outcome: ActionOutcome::Failed(error),
                };
            }
        };

        if !available.iter().any(|candidate| candidate == action.as_str()) {
            return ActionReport {
                name: name.to_owned(),
                outcome: ActionOutcome::ActionUnavailable { available },
            };
        }

        let outcome = match self.api.perform_action(&server.id, action).await {
            Ok(()) => ActionOutcome::Done,
            Err(error) => ActionOutcome::Failed(error),
        };
        ActionReport {
            name: name.to_owned(),
            outcome,
        }
    }

    /// Polls the inventory until every target satisfies the predicate.
    ///
    /// Each iteration fetches a fresh inventory, evaluates the predicate
    /// against each target's record (or `None` when absent), and hands the
    /// per-target snapshots to `on_tick`. When every target satisfies the
    /// predicate the call returns; otherwise it sleeps for the configured
    /// interval and repeats. A `timeout` of `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::DeadlineExceeded`] when `timeout` elapses before
    /// every target satisfies the predicate, and propagates inventory fetch
    /// failures.
    pub async fn poll_until<P, F>(
        &self,
        targets: &[String],
        mut predicate: P,
        mut on_tick: F,
        timeout: Option<Duration>,
    ) -> Result<(), FleetError<A::Error>>
    where
        P: FnMut(Option<&ServerRecord>) -> bool,
        F: FnMut(&[PollStatus]),
    {
        let started = Instant::now();
        loop {
            let inventory = self.inventory().await?;
            let waited = started.elapsed();
            let statuses: Vec<PollStatus> = targets
                .iter()
                .map(|name| PollStatus {
                    name: name.clone(),
                    info: inventory.get(name).cloned(),
                    waiting_for: waited,
                })
                .collect();

            let satisfied = statuses
                .iter()
                .all(|status| predicate(status.info.as_ref()));
            on_tick(&statuses);

            if satisfied {
                return Ok(());
            }

            if let Some(limit) = timeout
                && started.elapsed() >= limit
            {
                return Err(FleetError::DeadlineExceeded {
                    waited: started.elapsed(),
                });
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Lists the bootable images visible to the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Images`] when the listing fails.
    pub async fn images(&self) -> Result<Vec<ImageSummary>, FleetError<A::Error>> {
        self.api.list_images().await.map_err(FleetError::Images)
    }
}

#[cfg(test)]
mod tests;
