//! Convenience operations built on `prepare`/`run`.

use crate::client::core::FetchClient;
use crate::client::options::RequestOptions;
use crate::{Error, Result};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

impl FetchClient {
    /// Whether `uri` answers a HEAD request with a 2xx status.
    ///
    /// Redirects are followed by the transport up to `max_redirects`. HTTP-level
    /// failures mean "does not exist"; transport failures still raise.
    pub async fn exists(&self, uri: &str) -> Result<bool> {
        let envelope = self
            .fetch(Method::HEAD, uri, RequestOptions::new().suppress_errors(true))
            .await?;
        let status = envelope.status()?;
        let found = (200..300).contains(&status);
        debug!(uri = %envelope.uri(), http_status = status, found, "existence check");
        Ok(found)
    }

    /// Run a GraphQL query and return its `data` member.
    ///
    /// A response carrying a non-empty `errors` array fails with
    /// [`Error::GraphQl`]. POST is only cached when listed in `cacheable_methods`;
    /// the query and variables are part of the cache key.
    pub async fn graphql(&self, uri: &str, query: &str, variables: Option<Value>) -> Result<Value> {
        let mut payload = json!({ "query": query });
        if let Some(vars) = variables {
            payload["variables"] = vars;
        }
        let envelope = self
            .post_json(uri, payload, RequestOptions::new().with_decoder("json"))
            .await?;
        let mut response = self.decode(&envelope, None)?;

        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages = errors
                    .iter()
                    .map(|e| match e.get("message").and_then(Value::as_str) {
                        Some(m) => m.to_string(),
                        None => e.to_string(),
                    })
                    .collect();
                return Err(Error::GraphQl { messages });
            }
        }
        Ok(response
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}
