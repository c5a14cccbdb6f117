//! Serde shapes for the Scaleway Instances REST API.
//!
//! Only the fields this crate consumes are modelled; unknown fields are
//! ignored on deserialisation. Attached volumes arrive as a map keyed by
//! slot index (`"0"`, `"1"`, …); an ordered map keeps the exposed list in
//! slot order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::{ImageSummary, ServerRecord, ServerState, VolumeRef};

#[derive(Deserialize)]
pub(super) struct ListServersResponse {
    pub(super) servers: Vec<WireServer>,
}

#[derive(Deserialize)]
pub(super) struct CreateServerResponse {
    pub(super) server: WireServer,
}

#[derive(Deserialize)]
pub(super) struct WireServer {
    pub(super) id: String,
    pub(super) hostname: String,
    pub(super) state: String,
    #[serde(default)]
    pub(super) volumes: BTreeMap<String, WireVolume>,
}

#[derive(Deserialize)]
pub(super) struct WireVolume {
    pub(super) id: String,
}

impl From<WireServer> for ServerRecord {
    fn from(wire: WireServer) -> Self {
        Self {
            id: wire.id,
            name: wire.hostname,
            state: ServerState::parse(&wire.state),
            volumes: wire
                .volumes
                .into_values()
                .map(|volume| VolumeRef { id: volume.id })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub(super) struct CreateServerRequest {
    pub(super) name: String,
    pub(super) commercial_type: String,
    pub(super) image: String,
    pub(super) project: String,
    pub(super) tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) organization: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct ActionsResponse {
    pub(super) actions: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct ActionRequest {
    pub(super) action: &'static str,
}

#[derive(Deserialize)]
pub(super) struct ListImagesResponse {
    pub(super) images: Vec<WireImage>,
}

#[derive(Deserialize)]
pub(super) struct WireImage {
    pub(super) id: String,
    pub(super) name: String,
    #[serde(default)]
    pub(super) arch: String,
}

impl From<WireImage> for ImageSummary {
    fn from(wire: WireImage) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            arch: wire.arch,
        }
    }
}
