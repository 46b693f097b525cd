// gitvault-core/src/test_utils/mod.rs
//
// Hand-rolled doubles shared by unit and integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gitvault_common::error::Error;

use crate::auth::helper::HelperRunner;
use crate::auth::oauth2::BrowserLauncher;
use crate::auth::terminal::Terminal;
use crate::cache::TextMapStore;
use crate::http::{HttpClient, HttpResponse};

/// Scripted HTTP client: responses are served FIFO, requests are recorded.
#[derive(Default)]
pub struct TestHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, Error>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub form: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl TestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn enqueue_error(&self, error: Error) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn enqueue_json(&self, status: u16, body: &str) {
        self.enqueue(HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        });
    }

    pub fn enqueue_with_headers(&self, status: u16, headers: &[(&str, &str)], body: &str) {
        self.enqueue(HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn record_and_pop(&self, request: RecordedRequest) -> Result<HttpResponse, Error> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(Error::Auth(
                    "TestHttpClient has no scripted response left".to_string(),
                ))
            })
    }
}

#[async_trait]
impl HttpClient for TestHttpClient {
    type Error = Error;

    async fn get(
        &self,
        url: String,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Self::Error> {
        self.record_and_pop(RecordedRequest {
            method: "GET".to_string(),
            url,
            form: Vec::new(),
            headers,
            body: String::new(),
        })
    }

    async fn head(&self, url: String) -> Result<HttpResponse, Self::Error> {
        self.record_and_pop(RecordedRequest {
            method: "HEAD".to_string(),
            url,
            form: Vec::new(),
            headers: HashMap::new(),
            body: String::new(),
        })
    }

    async fn post_form(
        &self,
        url: String,
        params: Vec<(String, String)>,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Self::Error> {
        self.record_and_pop(RecordedRequest {
            method: "POST".to_string(),
            url,
            form: params,
            headers,
            body: String::new(),
        })
    }

    async fn post_json(
        &self,
        url: String,
        body: String,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Self::Error> {
        self.record_and_pop(RecordedRequest {
            method: "POST".to_string(),
            url,
            form: Vec::new(),
            headers,
            body,
        })
    }
}

/// Terminal double: prompt answers are queued per label, output lines are
/// recorded in order (prompt labels are recorded too, so tests can assert
/// prompt ordering).
#[derive(Default)]
pub struct TestTerminal {
    prompts: Mutex<HashMap<String, VecDeque<String>>>,
    secret_prompts: Mutex<HashMap<String, VecDeque<String>>>,
    messages: Mutex<Vec<String>>,
    prompt_log: Mutex<Vec<String>>,
}

impl TestTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_prompt(&self, label: &str, answer: &str) {
        self.prompts
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push_back(answer.to_string());
    }

    pub fn queue_secret(&self, label: &str, answer: &str) {
        self.secret_prompts
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push_back(answer.to_string());
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Labels of every prompt (secret or not) in the order they happened.
    pub fn prompt_log(&self) -> Vec<String> {
        self.prompt_log.lock().unwrap().clone()
    }
}

impl Terminal for TestTerminal {
    fn write_line(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn prompt(&self, label: &str) -> Result<String, Error> {
        self.prompt_log.lock().unwrap().push(label.to_string());
        self.prompts
            .lock()
            .unwrap()
            .get_mut(label)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| Error::Auth(format!("no scripted answer for prompt '{}'", label)))
    }

    fn prompt_secret(&self, label: &str) -> Result<String, Error> {
        self.prompt_log.lock().unwrap().push(label.to_string());
        self.secret_prompts
            .lock()
            .unwrap()
            .get_mut(label)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| Error::Auth(format!("no scripted answer for secret prompt '{}'", label)))
    }
}

/// Helper-runner double recording invocations and serving scripted blocks.
#[derive(Default)]
pub struct TestHelperRunner {
    responses: Mutex<VecDeque<Result<HashMap<String, String>, Error>>>,
    invocations: Mutex<Vec<(String, Vec<String>)>>,
}

impl TestHelperRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, pairs: &[(&str, &str)]) {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.responses.lock().unwrap().push_back(Ok(map));
    }

    pub fn enqueue_error(&self, error: Error) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn invocations(&self) -> Vec<(String, Vec<String>)> {
        self.invocations.lock().unwrap().clone()
    }

    /// The args of invocation `i`, joined the way a command line reads.
    pub fn command_line(&self, i: usize) -> String {
        let invocations = self.invocations.lock().unwrap();
        invocations[i].1.join(" ")
    }
}

#[async_trait]
impl HelperRunner for TestHelperRunner {
    async fn invoke(
        &self,
        path: &str,
        args: &[String],
        _stdin_block: Option<&[(String, String)]>,
        _cancel: &CancellationToken,
    ) -> Result<HashMap<String, String>, Error> {
        self.invocations
            .lock()
            .unwrap()
            .push((path.to_string(), args.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(Error::Helper(
                    "TestHelperRunner has no scripted response left".to_string(),
                ))
            })
    }
}

/// Browser double: records the URL instead of opening anything.
#[derive(Default)]
pub struct TestBrowser {
    pub urls: Mutex<Vec<String>>,
}

impl TestBrowser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BrowserLauncher for TestBrowser {
    fn open(&self, url: &str) -> Result<(), Error> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Text-map store with an inspectable "persisted" layer, so tests can
/// mutate the backing store behind the cache's in-memory copy.
#[derive(Default)]
pub struct InMemoryTextStore {
    persisted: Arc<Mutex<HashMap<String, String>>>,
    memory: HashMap<String, String>,
}

impl InMemoryTextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle onto the persisted layer; writes through it simulate another
    /// process mutating the shared cache file.
    pub fn persisted(&self) -> Arc<Mutex<HashMap<String, String>>> {
        Arc::clone(&self.persisted)
    }
}

impl TextMapStore for InMemoryTextStore {
    fn reload(&mut self) -> Result<(), Error> {
        self.memory = self.persisted.lock().unwrap().clone();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        *self.persisted.lock().unwrap() = self.memory.clone();
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.memory.get(&key.to_lowercase()).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.memory.insert(key.to_lowercase(), value.to_string());
    }

    fn remove(&mut self, key: &str) -> bool {
        self.memory.remove(&key.to_lowercase()).is_some()
    }

    fn clear(&mut self) {
        self.memory.clear();
    }
}
