//! HTTP client for the Zun container API.
//!
//! Responses are classified by status code: 404 becomes [`Error::NotFound`],
//! 400 becomes [`Error::BadRequest`], any other non-success status becomes
//! [`Error::Api`]. Connection failures surface as [`Error::Transport`].

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::models::{
    AttachOpts, Container, CreateOpts, DeleteMode, DetachOpts, Interface, InterfaceList,
};

const API_VERSION_HEADER: &str = "OpenStack-API-Version";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Client for one Zun endpoint. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct ZunClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    microversion: String,
}

impl ZunClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            microversion: config.microversion.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.endpoint.clone();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(API_VERSION_HEADER, format!("container {}", self.microversion));
        if let Some(token) = &self.token {
            req = req.header(AUTH_TOKEN_HEADER, token);
        }
        req
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = format!("{}: {}", what, error_message(&body));
        debug!(status = status.as_u16(), %message, "Zun request failed");
        Err(match status {
            StatusCode::NOT_FOUND => Error::NotFound(message),
            StatusCode::BAD_REQUEST => Error::BadRequest(message),
            other => Error::Api {
                status: other.as_u16(),
                message,
            },
        })
    }

    async fn json<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    // =========================================================================
    // Containers
    // =========================================================================

    pub async fn create_container(&self, opts: &CreateOpts) -> Result<Container> {
        debug!(image = %opts.image, "Creating container");
        let req = self.request(Method::POST, &self.url(&["containers"])).json(opts);
        let resp = self.send(req, "create container").await?;
        Self::json(resp).await
    }

    pub async fn get_container(&self, id: &str) -> Result<Container> {
        let req = self.request(Method::GET, &self.url(&["containers", id]));
        let resp = self.send(req, &format!("container {}", id)).await?;
        Self::json(resp).await
    }

    pub async fn delete_container(&self, id: &str, mode: DeleteMode) -> Result<()> {
        debug!(container_id = %id, ?mode, "Deleting container");
        let req = self
            .request(Method::DELETE, &self.url(&["containers", id]))
            .query(mode.query());
        self.send(req, &format!("delete container {}", id)).await?;
        Ok(())
    }

    // =========================================================================
    // Interface attachments
    // =========================================================================

    pub async fn list_interfaces(&self, container_id: &str) -> Result<Vec<Interface>> {
        let req = self.request(
            Method::GET,
            &self.url(&["containers", container_id, "network_list"]),
        );
        let resp = self
            .send(req, &format!("interfaces of container {}", container_id))
            .await?;
        let list: InterfaceList = Self::json(resp).await?;
        Ok(list.networks)
    }

    /// Look up the interface backed by `port_id`.
    ///
    /// The API has no single-interface endpoint; a port missing from the
    /// container's network list is reported as not found.
    pub async fn get_interface(&self, container_id: &str, port_id: &str) -> Result<Interface> {
        self.list_interfaces(container_id)
            .await?
            .into_iter()
            .find(|iface| iface.port_id == port_id)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "port {} on container {}",
                    port_id, container_id
                ))
            })
    }

    pub async fn attach_interface(&self, container_id: &str, opts: &AttachOpts) -> Result<()> {
        debug!(container_id = %container_id, ?opts, "Attaching interface");
        let req = self
            .request(
                Method::POST,
                &self.url(&["containers", container_id, "network_attach"]),
            )
            .query(opts);
        self.send(req, &format!("attach interface to container {}", container_id))
            .await?;
        Ok(())
    }

    pub async fn detach_interface(&self, container_id: &str, opts: &DetachOpts) -> Result<()> {
        debug!(container_id = %container_id, ?opts, "Detaching interface");
        let req = self
            .request(
                Method::POST,
                &self.url(&["containers", container_id, "network_detach"]),
            )
            .query(opts);
        self.send(
            req,
            &format!("detach interface from container {}", container_id),
        )
        .await?;
        Ok(())
    }
}

/// Pull a readable message out of an OpenStack error body.
fn error_message(body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        let first = v.get("errors")?.get(0)?;
        first
            .get("detail")
            .or_else(|| first.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    detail.unwrap_or_else(|| body.trim().to_string())
}
