//! Scaleway implementation of the [`ServerApi`] seam.
//!
//! Every operation issues a plain REST call against the Instances API and
//! decodes the JSON body into the crate's data model. Authentication uses
//! the `X-Auth-Token` header.

mod error;
mod wire;

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::api::{ApiFuture, ImageSummary, PowerAction, ServerApi, ServerRecord, ServerSpec};
use crate::config::FleetConfig;
use wire::{
    ActionRequest, ActionsResponse, CreateServerRequest, CreateServerResponse, ListImagesResponse,
    ListServersResponse,
};

pub use error::ScalewayApiError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Scaleway Instances REST API.
#[derive(Clone, Debug)]
pub struct ScalewayApi {
    http: reqwest::Client,
    config: FleetConfig,
}

impl ScalewayApi {
    /// Constructs a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayApiError::Config`] when the provided configuration
    /// fails validation.
    pub fn new(config: FleetConfig) -> Result<Self, ScalewayApiError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self { http, config })
    }

    /// Returns the configuration the client was built with.
    #[must_use]
    pub const fn config(&self) -> &FleetConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/zones/{}{path}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.default_zone
        )
    }

    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
        endpoint: &'static str,
    ) -> Result<Vec<u8>, ScalewayApiError> {
        let response = builder
            .header("X-Auth-Token", &self.config.secret_key)
            .send()
            .await
            .map_err(|err| ScalewayApiError::Transport {
                endpoint,
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ScalewayApiError::Transport {
                endpoint,
                message: err.to_string(),
            })?;

        if !status.is_success() {
            return Err(ScalewayApiError::Status {
                endpoint,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body.to_vec())
    }

    fn decode<T: DeserializeOwned>(
        body: &[u8],
        endpoint: &'static str,
    ) -> Result<T, ScalewayApiError> {
        serde_json::from_slice(body).map_err(|err| ScalewayApiError::Decode {
            endpoint,
            message: err.to_string(),
        })
    }
}

impl ServerApi for ScalewayApi {
    type Error = ScalewayApiError;

    fn list_servers(&self) -> ApiFuture<'_, Vec<ServerRecord>, Self::Error> {
        Box::pin(async move {
            let endpoint = "list servers";
            let body = self.execute(self.http.get(self.url("/servers")), endpoint).await?;
            let parsed: ListServersResponse = Self::decode(&body, endpoint)?;
            Ok(parsed.servers.into_iter().map(ServerRecord::from).collect())
        })
    }

    fn create_server<'a>(
        &'a self,
        spec: &'a ServerSpec,
    ) -> ApiFuture<'a, ServerRecord, Self::Error> {
        Box::pin(async move {
            let endpoint = "create server";
            let payload = CreateServerRequest {
                name: spec.name.clone(),
                commercial_type: spec.commercial_type.clone(),
                image: spec.image_id.clone(),
                project: self.config.default_project_id.clone(),
                tags: spec.tags.clone(),
                organization: self.config.default_organization_id.clone(),
            };
            let body = self
                .execute(self.http.post(self.url("/servers")).json(&payload), endpoint)
                .await?;
            let parsed: CreateServerResponse = Self::decode(&body, endpoint)?;
            Ok(ServerRecord::from(parsed.server))
        })
    }

    fn delete_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = format!("/servers/{id}");
            self.execute(self.http.delete(self.url(&path)), "delete server")
                .await?;
            Ok(())
        })
    }

    fn server_actions<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Vec<String>, Self::Error> {
        Box::pin(async move {
            let endpoint = "list server actions";
            let path = format!("/servers/{id}/action");
            let body = self.execute(self.http.get(self.url(&path)), endpoint).await?;
            let parsed: ActionsResponse = Self::decode(&body, endpoint)?;
            Ok(parsed.actions)
        })
    }

    fn perform_action<'a>(
        &'a self,
        id: &'a str,
        action: PowerAction,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = format!("/servers/{id}/action");
            let payload = ActionRequest {
                action: action.as_str(),
            };
            self.execute(
                self.http.post(self.url(&path)).json(&payload),
                "perform server action",
            )
            .await?;
            Ok(())
        })
    }

    fn delete_volume<'a>(&'a self, id: &'a str) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = format!("/volumes/{id}");
            self.execute(self.http.delete(self.url(&path)), "delete volume")
                .await?;
            Ok(())
        })
    }

    fn list_images(&self) -> ApiFuture<'_, Vec<ImageSummary>, Self::Error> {
        Box::pin(async move {
            let endpoint = "list images";
            let body = self.execute(self.http.get(self.url("/images")), endpoint).await?;
            let parsed: ListImagesResponse = Self::decode(&body, endpoint)?;
            Ok(parsed.images.into_iter().map(ImageSummary::from).collect())
        })
    }
}
