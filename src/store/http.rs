use super::{CoordinationStore, PrevExist, RequestOptions, StoreResponse};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use awc::{Client, ClientRequest, SendClientRequest};
use log::trace;

/// The etcd v2 keys API over HTTP.
///
/// Requests are form encoded, responses are JSON whatever the HTTP status: a refused
/// precondition arrives as a 4xx carrying a normal error body.
#[derive(Clone)]
pub struct HttpStore {
    base_url: String,
    client: Client,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::default())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { base_url, client }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/v2/keys/{}", self.base_url, key)
    }

    async fn exchange(request: SendClientRequest) -> Result<StoreResponse> {
        let mut response = request.await?;
        let body = response.body().await?;
        trace!("<- {} {}", response.status(), String::from_utf8_lossy(&body));
        Ok(serde_json::from_slice(&body)?)
    }
}

fn with_query(request: ClientRequest, params: &[(&'static str, String)]) -> Result<ClientRequest> {
    if params.is_empty() {
        return Ok(request);
    }
    request
        .query(&params)
        .map_err(|err| StoreError::Encode(err.to_string()))
}

/// Precondition directives shared by writes and deletes. Unset directives are omitted.
fn preconditions(options: &RequestOptions) -> Vec<(&'static str, String)> {
    let mut params = vec![];
    match options.prev_exist {
        PrevExist::MustExist => params.push(("prevExist", "true".to_owned())),
        PrevExist::MustNotExist => params.push(("prevExist", "false".to_owned())),
        PrevExist::Unspecified => {}
    }
    if options.prev_index != 0 {
        params.push(("prevIndex", options.prev_index.to_string()));
    }
    params
}

/// Form body of a write. The TTL is sent in whole seconds, never less than one so a short lease
/// still expires.
fn put_form(value: &str, options: &RequestOptions) -> Vec<(&'static str, String)> {
    let mut form = vec![("value", value.to_owned())];
    if !options.ttl.is_zero() {
        form.push(("ttl", options.ttl.as_secs().max(1).to_string()));
    }
    form.extend(preconditions(options));
    form
}

fn get_query(options: &RequestOptions) -> Vec<(&'static str, String)> {
    if options.wait {
        vec![("wait", "true".to_owned())]
    } else {
        vec![]
    }
}

#[async_trait(?Send)]
impl CoordinationStore for HttpStore {
    async fn get(&self, key: &str, options: RequestOptions) -> Result<StoreResponse> {
        let request = with_query(self.client.get(self.url(key)), &get_query(&options))?;
        Self::exchange(request.send()).await
    }

    async fn put(&self, key: &str, value: &str, options: RequestOptions) -> Result<StoreResponse> {
        let form = put_form(value, &options);
        trace!("-> PUT {} {:?}", key, form);
        Self::exchange(self.client.put(self.url(key)).send_form(&form)).await
    }

    async fn delete(&self, key: &str, options: RequestOptions) -> Result<StoreResponse> {
        let request = with_query(self.client.delete(self.url(key)), &preconditions(&options))?;
        Self::exchange(request.send()).await
    }
}
