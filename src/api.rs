//! Provider-operation abstraction for managing a fleet of servers.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Power state reported by the provider for a server.
///
/// The provider may introduce states this crate does not know about; those
/// are preserved verbatim in [`ServerState::Other`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServerState {
    /// The server is powered off.
    Stopped,
    /// The server is running.
    Running,
    /// The server is booting.
    Starting,
    /// The server is shutting down.
    Stopping,
    /// Any state this crate does not model explicitly.
    Other(String),
}

impl ServerState {
    /// Parses the provider's wire string into a state.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "stopped" => Self::Stopped,
            "running" => Self::Running,
            "starting" => Self::Starting,
            "stopping" => Self::Stopping,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the wire representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ServerState {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// Reference to a volume attached to a server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeRef {
    /// Provider-specific volume identifier.
    pub id: String,
}

/// Point-in-time snapshot of a remote server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerRecord {
    /// Provider-specific server identifier.
    pub id: String,
    /// Hostname the server was created with; unique within a fleet.
    pub name: String,
    /// Power state at the time of the listing.
    pub state: ServerState,
    /// Attached volumes in provider slot order.
    pub volumes: Vec<VolumeRef>,
}

/// Power actions this crate issues against a server.
///
/// The provider advertises the currently permitted actions per server as
/// plain strings; [`PowerAction::as_str`] is the value matched against that
/// list and posted in the action request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerAction {
    /// Boot a stopped server.
    PowerOn,
    /// Hard-stop a running server.
    Terminate,
}

impl PowerAction {
    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PowerOn => "poweron",
            Self::Terminate => "terminate",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a bootable image offered by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageSummary {
    /// Provider-specific image identifier.
    pub id: String,
    /// Human readable image name.
    pub name: String,
    /// CPU architecture the image targets.
    pub arch: String,
}

/// Caller-declared server the fleet should ensure exists.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSpec {
    /// Hostname for the new server; the fleet's idempotence key.
    pub name: String,
    /// Commercial type to request (for example `DEV1-S`).
    pub commercial_type: String,
    /// Identifier of the boot image.
    pub image_id: String,
    /// Tags applied at creation, in order.
    pub tags: Vec<String>,
}

impl ServerSpec {
    /// Starts a builder for a [`ServerSpec`].
    #[must_use]
    pub fn builder() -> ServerSpecBuilder {
        ServerSpecBuilder::new()
    }

    /// Validates the spec, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::MissingField`] when any required string field is
    /// empty.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.is_empty() {
            return Err(SpecError::MissingField("name".to_owned()));
        }
        if self.commercial_type.is_empty() {
            return Err(SpecError::MissingField("commercial_type".to_owned()));
        }
        if self.image_id.is_empty() {
            return Err(SpecError::MissingField("image_id".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`ServerSpec`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerSpecBuilder {
    name: String,
    commercial_type: String,
    image_id: String,
    tags: Vec<String>,
}

impl ServerSpecBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server hostname.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the commercial type.
    #[must_use]
    pub fn commercial_type(mut self, value: impl Into<String>) -> Self {
        self.commercial_type = value.into();
        self
    }

    /// Sets the boot image identifier.
    #[must_use]
    pub fn image_id(mut self, value: impl Into<String>) -> Self {
        self.image_id = value.into();
        self
    }

    /// Sets the creation tags.
    #[must_use]
    pub fn tags(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = values.into_iter().map(Into::into).collect();
        self
    }

    /// Builds and validates the [`ServerSpec`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::MissingField`] when any required field is empty.
    pub fn build(self) -> Result<ServerSpec, SpecError> {
        let spec = ServerSpec {
            name: self.name.trim().to_owned(),
            commercial_type: self.commercial_type.trim().to_owned(),
            image_id: self.image_id.trim().to_owned(),
            tags: self
                .tags
                .into_iter()
                .map(|tag| tag.trim().to_owned())
                .collect(),
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Errors raised while constructing a [`ServerSpec`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SpecError {
    /// Raised when a required field is missing or empty.
    #[error("missing or empty field: {0}")]
    MissingField(String),
}

/// Future returned by [`ServerApi`] operations.
pub type ApiFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal interface a server-management API must implement.
///
/// All calls are independent reads or writes against remote state; no call
/// caches anything locally.
pub trait ServerApi {
    /// Provider specific error type returned by the API.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists every server visible to the credentials in use.
    fn list_servers(&self) -> ApiFuture<'_, Vec<ServerRecord>, Self::Error>;

    /// Creates a server from the given spec and returns its initial record.
    fn create_server<'a>(&'a self, spec: &'a ServerSpec)
    -> ApiFuture<'a, ServerRecord, Self::Error>;

    /// Deletes a server by identifier.
    fn delete_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, (), Self::Error>;

    /// Fetches the actions the provider currently permits for a server.
    fn server_actions<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Vec<String>, Self::Error>;

    /// Issues a power action against a server.
    fn perform_action<'a>(
        &'a self,
        id: &'a str,
        action: PowerAction,
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Deletes a volume by identifier.
    fn delete_volume<'a>(&'a self, id: &'a str) -> ApiFuture<'a, (), Self::Error>;

    /// Lists the bootable images visible to the credentials in use.
    fn list_images(&self) -> ApiFuture<'_, Vec<ImageSummary>, Self::Error>;
}
