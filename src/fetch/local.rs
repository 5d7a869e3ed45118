use super::{Response, Transport, TransportError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Serves a catalog mirrored to a local directory.
///
/// URLs are treated as paths relative to `root`; a leading `/` is ignored.
/// Missing files answer 404 so the retry policy treats them like a CDN miss.
/// POST requests are not supported and answer 405.
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> Option<PathBuf> {
        let relative = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .trim_start_matches('/');
        let path = Path::new(relative);
        // Keep lookups inside the mirror.
        if path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(path))
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn get(&self, url: &str) -> Result<Response, TransportError> {
        let Some(path) = self.resolve(url) else {
            return Ok(Response {
                status: 400,
                body: String::new(),
            });
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(Response { status: 200, body }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Response {
                status: 404,
                body: String::new(),
            }),
            Err(e) => Err(TransportError::Body(format!("{}: {}", path.display(), e))),
        }
    }

    async fn post_json(
        &self,
        _url: &str,
        _headers: &[(&str, &str)],
        _body: &serde_json::Value,
    ) -> Result<Response, TransportError> {
        Ok(Response {
            status: 405,
            body: String::new(),
        })
    }
}
