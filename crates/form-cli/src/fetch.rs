use std::time::Duration;

use form_spec::{FetchError, SchemaFetcher};
use tracing::debug;

/// Blocking HTTP fetcher with a request timeout.
pub struct HttpSchemaFetcher {
    client: reqwest::blocking::Client,
}

impl HttpSchemaFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

impl SchemaFetcher for HttpSchemaFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!(%url, "fetching schema");
        let response = self.client.get(url).send().map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response.text().map_err(classify)
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_body_on_success() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/schema.json")
            .with_status(200)
            .with_body(r#"{"version":"1","title":"Remote","fields":[]}"#)
            .create();

        let fetcher = HttpSchemaFetcher::new(Duration::from_secs(5)).expect("client");
        let body = fetcher
            .fetch(&format!("{}/schema.json", server.url()))
            .expect("fetch");
        assert!(body.contains("Remote"));
    }

    #[test]
    fn maps_http_errors_to_status() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing").with_status(404).create();

        let fetcher = HttpSchemaFetcher::new(Duration::from_secs(5)).expect("client");
        let err = fetcher
            .fetch(&format!("{}/missing", server.url()))
            .expect_err("404");
        assert!(matches!(err, FetchError::Status(404)));
    }
}
