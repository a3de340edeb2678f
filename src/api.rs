// API client module: a small blocking HTTP layer over the Apigee
// management API.
//
// `Transport` is the seam: the real implementation wraps a reqwest blocking
// client, tests plug in an in-memory double. `ApiClient` knows the endpoint
// layout and turns resource descriptors into URLs.

use crate::error::ApiError;
use crate::resource::{ListShape, Payload, ResourceSpec};
use crate::ui;
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "https://apigee.googleapis.com/v1";
pub const API_URL_ENV_VAR: &str = "APIGEE_API_URL";

/// Bearer token for one side of the migration. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The four HTTP exchanges the migration needs. Every call completes before
/// the next one starts.
pub trait Transport {
    fn get(&self, url: &str, credential: &Credential) -> Result<Vec<u8>, ApiError>;

    /// Stream a response body into `sink`, returning the number of bytes
    /// written.
    fn download(
        &self,
        url: &str,
        credential: &Credential,
        sink: &mut dyn Write,
    ) -> Result<u64, ApiError>;

    fn post_json(&self, url: &str, credential: &Credential, body: &Value)
        -> Result<Vec<u8>, ApiError>;

    /// Upload `file` as the single multipart field `file`.
    fn post_multipart(
        &self,
        url: &str,
        credential: &Credential,
        file: &Path,
    ) -> Result<Vec<u8>, ApiError>;
}

/// Real transport backed by a reqwest blocking client.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        // no request timeout: bundle downloads can be large
        let client = Client::builder()
            .timeout(Option::<Duration>::None)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;
        Ok(ReqwestTransport { client })
    }

    fn authorized(
        &self,
        builder: RequestBuilder,
        credential: &Credential,
    ) -> Result<RequestBuilder, ApiError> {
        let value = HeaderValue::from_str(&credential.bearer()).map_err(|e| ApiError::Request {
            message: format!("invalid auth token: {e}"),
        })?;
        Ok(builder.header(AUTHORIZATION, value))
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let res = builder.send().map_err(classify)?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(res)
    }

    fn body(res: Response) -> Result<Vec<u8>, ApiError> {
        res.bytes().map(|b| b.to_vec()).map_err(classify)
    }
}

/// Sort a reqwest failure into "never built" vs "no response".
fn classify(err: reqwest::Error) -> ApiError {
    if err.is_builder() {
        ApiError::Request {
            message: err.to_string(),
        }
    } else {
        ApiError::NoResponse {
            message: err.to_string(),
        }
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, credential: &Credential) -> Result<Vec<u8>, ApiError> {
        debug!(%url, "GET");
        let req = self.authorized(self.client.get(url), credential)?;
        Self::body(self.send(req)?)
    }

    fn download(
        &self,
        url: &str,
        credential: &Credential,
        sink: &mut dyn Write,
    ) -> Result<u64, ApiError> {
        debug!(%url, "GET (stream)");
        let req = self.authorized(self.client.get(url), credential)?;
        let res = self.send(req)?;
        let bar = ui::download_bar(res.content_length());
        let mut reader = bar.wrap_read(res);
        let written = std::io::copy(&mut reader, sink).map_err(|e| ApiError::NoResponse {
            message: format!("bundle stream interrupted: {e}"),
        });
        ui::finish(&bar);
        written
    }

    fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &Value,
    ) -> Result<Vec<u8>, ApiError> {
        debug!(%url, "POST json");
        let req = self.authorized(self.client.post(url).json(body), credential)?;
        Self::body(self.send(req)?)
    }

    fn post_multipart(
        &self,
        url: &str,
        credential: &Credential,
        file: &Path,
    ) -> Result<Vec<u8>, ApiError> {
        debug!(%url, file = %file.display(), "POST multipart");
        let form = multipart::Form::new()
            .file("file", file)
            .map_err(|e| ApiError::Request {
                message: format!("cannot read {}: {e}", file.display()),
            })?;
        let req = self.authorized(self.client.post(url).multipart(form), credential)?;
        Self::body(self.send(req)?)
    }
}

#[derive(Deserialize)]
struct NamedItem {
    name: String,
}

/// Typed client for the management API endpoints used by the migration.
pub struct ApiClient<T: Transport = ReqwestTransport> {
    transport: T,
    base_url: String,
}

impl ApiClient<ReqwestTransport> {
    /// Create a client for the URL in `APIGEE_API_URL`, falling back to
    /// the public Apigee endpoint.
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url =
            std::env::var(API_URL_ENV_VAR).unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());
        Ok(ApiClient::with_transport(ReqwestTransport::new()?, base_url))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(transport: T, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        ApiClient {
            transport,
            base_url,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn collection_url(&self, spec: &ResourceSpec, org: &str, env: &str) -> String {
        if spec.environment_scoped {
            format!(
                "{}/organizations/{org}/environments/{env}/{}",
                self.base_url, spec.collection
            )
        } else {
            format!("{}/organizations/{org}/{}", self.base_url, spec.collection)
        }
    }

    fn revisions_url(&self, spec: &ResourceSpec, org: &str, name: &str) -> String {
        format!(
            "{}/organizations/{org}/{}/{name}/revisions",
            self.base_url, spec.collection
        )
    }

    /// List the names of every resource of this type.
    pub fn list_names(
        &self,
        spec: &ResourceSpec,
        org: &str,
        env: &str,
        credential: &Credential,
    ) -> Result<Vec<String>, ApiError> {
        let url = self.collection_url(spec, org, env);
        let body = self.transport.get(&url, credential)?;
        match spec.list_shape {
            ListShape::Names => decode(&body),
            ListShape::Objects(key) => {
                let mut doc: Value = decode(&body)?;
                match doc.get_mut(key).map(Value::take) {
                    None | Some(Value::Null) => Ok(Vec::new()),
                    Some(items) => {
                        let items: Vec<NamedItem> =
                            serde_json::from_value(items).map_err(|e| ApiError::Decode {
                                message: format!("\"{key}\": {e}"),
                            })?;
                        Ok(items.into_iter().map(|i| i.name).collect())
                    }
                }
            }
        }
    }

    /// Revision numbers of a bundle resource, as returned (strings).
    pub fn list_revisions(
        &self,
        spec: &ResourceSpec,
        org: &str,
        name: &str,
        credential: &Credential,
    ) -> Result<Vec<String>, ApiError> {
        debug_assert_eq!(spec.payload, Payload::Bundle);
        let body = self
            .transport
            .get(&self.revisions_url(spec, org, name), credential)?;
        decode(&body)
    }

    /// Fetch the JSON definition of a definition-type resource.
    pub fn get_definition(
        &self,
        spec: &ResourceSpec,
        org: &str,
        env: &str,
        name: &str,
        credential: &Credential,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/{name}", self.collection_url(spec, org, env));
        decode(&self.transport.get(&url, credential)?)
    }

    /// Stream the zip bundle of `name` at `revision` into `sink`.
    pub fn download_bundle(
        &self,
        spec: &ResourceSpec,
        org: &str,
        name: &str,
        revision: u64,
        credential: &Credential,
        sink: &mut dyn Write,
    ) -> Result<u64, ApiError> {
        let url = format!(
            "{}/{revision}?format=bundle",
            self.revisions_url(spec, org, name)
        );
        self.transport.download(&url, credential, sink)
    }

    /// Create a definition-type resource from its JSON body.
    pub fn create_definition(
        &self,
        spec: &ResourceSpec,
        org: &str,
        env: &str,
        definition: &Value,
        credential: &Credential,
    ) -> Result<(), ApiError> {
        let url = self.collection_url(spec, org, env);
        self.transport.post_json(&url, credential, definition)?;
        Ok(())
    }

    /// Upload a bundle as a new revision of `name`.
    pub fn import_bundle(
        &self,
        spec: &ResourceSpec,
        org: &str,
        name: &str,
        bundle: &Path,
        credential: &Credential,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/organizations/{org}/{}?action=import&name={name}&validate=true",
            self.base_url, spec.collection
        );
        self.transport.post_multipart(&url, credential, bundle)?;
        Ok(())
    }

    /// Deploy `revision` of `name` to `env`, replacing whatever is deployed.
    pub fn deploy(
        &self,
        spec: &ResourceSpec,
        org: &str,
        env: &str,
        name: &str,
        revision: u64,
        credential: &Credential,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/organizations/{org}/environments/{env}/{}/{name}/revisions/{revision}/deployments?override=true",
            self.base_url, spec.collection
        );
        self.transport
            .post_json(&url, credential, &Value::Object(Default::default()))?;
        Ok(())
    }
}

fn decode<D: serde::de::DeserializeOwned>(body: &[u8]) -> Result<D, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode {
        message: e.to_string(),
    })
}
