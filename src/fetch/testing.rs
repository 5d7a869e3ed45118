//! In-memory transport for tests.

use super::{Response, Transport, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

type Scripted = Result<(u16, String), String>;

#[derive(Default)]
struct Route {
    queue: VecDeque<Scripted>,
    fallback: Option<Scripted>,
    delay: Option<Duration>,
    calls: usize,
}

/// Serves scripted responses by exact URL and counts calls per URL.
/// Unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct FakeTransport {
    routes: Mutex<HashMap<String, Route>>,
    posts: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: impl Into<String>) {
        let mut routes = self.routes.lock().unwrap();
        routes.entry(url.to_string()).or_default().fallback = Some(Ok((status, body.into())));
    }

    pub(crate) fn respond_sequence(&self, url: &str, responses: Vec<Scripted>) {
        let mut routes = self.routes.lock().unwrap();
        routes.entry(url.to_string()).or_default().queue = responses.into();
    }

    pub(crate) fn fail(&self, url: &str, message: &str) {
        let mut routes = self.routes.lock().unwrap();
        routes.entry(url.to_string()).or_default().fallback = Some(Err(message.to_string()));
    }

    /// Delay every answer for `url` (uses tokio time, so paused clocks apply).
    pub(crate) fn delay(&self, url: &str, delay: Duration) {
        let mut routes = self.routes.lock().unwrap();
        routes.entry(url.to_string()).or_default().delay = Some(delay);
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .map(|r| r.calls)
            .unwrap_or(0)
    }

    pub(crate) fn posts(&self) -> Vec<(String, serde_json::Value)> {
        self.posts.lock().unwrap().clone()
    }

    fn answer(&self, url: &str) -> (Option<Duration>, Scripted) {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.entry(url.to_string()).or_default();
        route.calls += 1;
        let scripted = route
            .queue
            .pop_front()
            .or_else(|| route.fallback.clone())
            .unwrap_or_else(|| Ok((404, String::new())));
        (route.delay, scripted)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> Result<Response, TransportError> {
        let (delay, scripted) = self.answer(url);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        scripted
            .map(|(status, body)| Response { status, body })
            .map_err(TransportError::Connect)
    }

    async fn post_json(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<Response, TransportError> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        self.get(url).await
    }
}
