// In-memory test doubles shared by the unit tests.

use crate::api::{ApiClient, Credential, Transport};
use crate::error::ApiError;
use crate::migrate::CredentialPrompt;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Method {
    Get,
    Post,
}

/// One recorded exchange.
#[derive(Clone, Debug)]
pub struct Call {
    pub method: &'static str,
    pub url: String,
    pub token: String,
    pub json: Option<Value>,
    pub upload: Option<(PathBuf, Vec<u8>)>,
}

/// Transport that answers from a table keyed by method and URL and records
/// every call. Unknown GETs answer 404, unknown POSTs answer `{}`.
#[derive(Default)]
pub struct FakeTransport {
    responses: HashMap<(Method, String), Result<Vec<u8>, ApiError>>,
    one_shot: RefCell<HashMap<(Method, String), ApiError>>,
    calls: RefCell<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_json(self, url: &str, body: Value) -> Self {
        self.respond_bytes(url, body.to_string().into_bytes())
    }

    pub fn respond_bytes(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert((Method::Get, url.to_string()), Ok(body));
        self
    }

    pub fn fail(mut self, url: &str, err: ApiError) -> Self {
        self.responses.insert((Method::Get, url.to_string()), Err(err));
        self
    }

    pub fn fail_post(mut self, url: &str, err: ApiError) -> Self {
        self.responses.insert((Method::Post, url.to_string()), Err(err));
        self
    }

    /// Fail only the first POST to `url`; later POSTs fall through.
    pub fn fail_post_once(self, url: &str, err: ApiError) -> Self {
        self.one_shot
            .borrow_mut()
            .insert((Method::Post, url.to_string()), err);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// URLs of every call whose URL contains `needle`.
    pub fn urls_containing(&self, needle: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.url.contains(needle))
            .map(|c| c.url.clone())
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn answer(&self, method: Method, url: &str) -> Result<Vec<u8>, ApiError> {
        let key = (method, url.to_string());
        if let Some(err) = self.one_shot.borrow_mut().remove(&key) {
            return Err(err);
        }
        match self.responses.get(&key) {
            Some(res) => res.clone(),
            None if method == Method::Get => Err(ApiError::Status {
                status: 404,
                body: format!("no fake response for {url}"),
            }),
            None => Ok(b"{}".to_vec()),
        }
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str, credential: &Credential) -> Result<Vec<u8>, ApiError> {
        self.record(Call {
            method: "GET",
            url: url.to_string(),
            token: credential.bearer(),
            json: None,
            upload: None,
        });
        self.answer(Method::Get, url)
    }

    fn download(
        &self,
        url: &str,
        credential: &Credential,
        sink: &mut dyn Write,
    ) -> Result<u64, ApiError> {
        let body = self.get(url, credential)?;
        sink.write_all(&body).map_err(|e| ApiError::NoResponse {
            message: e.to_string(),
        })?;
        Ok(body.len() as u64)
    }

    fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &Value,
    ) -> Result<Vec<u8>, ApiError> {
        self.record(Call {
            method: "POST json",
            url: url.to_string(),
            token: credential.bearer(),
            json: Some(body.clone()),
            upload: None,
        });
        self.answer(Method::Post, url)
    }

    fn post_multipart(
        &self,
        url: &str,
        credential: &Credential,
        file: &Path,
    ) -> Result<Vec<u8>, ApiError> {
        let bytes = std::fs::read(file).map_err(|e| ApiError::Request {
            message: e.to_string(),
        })?;
        self.record(Call {
            method: "POST multipart",
            url: url.to_string(),
            token: credential.bearer(),
            json: None,
            upload: Some((file.to_path_buf(), bytes)),
        });
        self.answer(Method::Post, url)
    }
}

pub const BASE: &str = "https://mgmt.test/v1";

pub fn fake_client(fake: FakeTransport) -> ApiClient<FakeTransport> {
    ApiClient::with_transport(fake, BASE)
}

/// Prompt double that hands out queued tokens and remembers the questions.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: RefCell<VecDeque<String>>,
    pub asked: RefCell<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        ScriptedPrompt {
            answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }
}

impl CredentialPrompt for ScriptedPrompt {
    fn ask(&self, message: &str) -> anyhow::Result<Credential> {
        self.asked.borrow_mut().push(message.to_string());
        let token = self
            .answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted answer for {message}"))?;
        Ok(Credential::new(token))
    }
}
