//! `SessionStore` over the session server's REST API.

use crate::error::StoreError;
use crate::store::{PresetFields, PresetPatch, SessionStore, StoreResult};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::json;
use tc_core::stroke::Stroke;
use tc_core::{PresetId, Session, TokenFields, TokenId, TokenPatch, ViewWindow, WarpQuad};
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base: Url,
}

/// Parse a server base URL so that relative joins append to its path.
pub fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

impl HttpStore {
    pub fn new(server: &str) -> Result<Self, StoreError> {
        Ok(Self::with_client(Client::new(), base_url(server)?))
    }

    pub fn with_client(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.base.join(path)?)
    }

    fn session_path(session: &str, rest: &str) -> String {
        let id = session.trim().to_uppercase();
        if rest.is_empty() {
            format!("api/sessions/{id}")
        } else {
            format!("api/sessions/{id}/{rest}")
        }
    }

    fn request(&self, method: Method, session: &str, rest: &str) -> Result<RequestBuilder, StoreError> {
        let url = self.endpoint(&Self::session_path(session, rest))?;
        Ok(self.client.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult {
        let resp = request.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::NotFound(message));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            log::warn!("session server answered {status}: {message}");
            return Err(StoreError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json::<Session>().await?)
    }

    async fn post<B: Serialize + ?Sized>(&self, session: &str, rest: &str, body: &B) -> StoreResult {
        self.send(self.request(Method::POST, session, rest)?.json(body))
            .await
    }
}

impl SessionStore for HttpStore {
    async fn create_session(&self, name: Option<&str>, requested_id: Option<&str>) -> StoreResult {
        let url = self.endpoint("api/sessions")?;
        let body = json!({ "name": name, "session_id": requested_id });
        self.send(self.client.post(url).json(&body)).await
    }

    async fn session(&self, session: &str) -> StoreResult {
        self.send(self.request(Method::GET, session, "")?).await
    }

    async fn set_map_image(&self, session: &str, url: Option<&str>) -> StoreResult {
        self.post(session, "map/url", &json!({ "url": url.unwrap_or_default() }))
            .await
    }

    async fn set_warp(&self, session: &str, warp: &WarpQuad) -> StoreResult {
        self.post(session, "warp", &json!({ "warp": warp })).await
    }

    async fn set_view(&self, session: &str, view: &ViewWindow) -> StoreResult {
        self.post(session, "map/view", &json!({ "view": view })).await
    }

    async fn set_strokes(&self, session: &str, strokes: &[Stroke]) -> StoreResult {
        self.post(session, "map/strokes", &json!({ "strokes": strokes }))
            .await
    }

    async fn add_token(&self, session: &str, fields: &TokenFields) -> StoreResult {
        self.post(session, "tokens", fields).await
    }

    async fn update_token(&self, session: &str, id: TokenId, patch: &TokenPatch) -> StoreResult {
        let rest = format!("tokens/{id}");
        self.send(self.request(Method::PUT, session, &rest)?.json(patch))
            .await
    }

    async fn remove_token(&self, session: &str, id: TokenId) -> StoreResult {
        let rest = format!("tokens/{id}");
        self.send(self.request(Method::DELETE, session, &rest)?).await
    }

    async fn set_token_order(&self, session: &str, order: &[TokenId]) -> StoreResult {
        self.post(session, "tokens/order", &json!({ "order": order }))
            .await
    }

    async fn add_preset(&self, session: &str, fields: &PresetFields) -> StoreResult {
        self.post(session, "presets", fields).await
    }

    async fn update_preset(&self, session: &str, id: PresetId, patch: &PresetPatch) -> StoreResult {
        let rest = format!("presets/{id}");
        self.send(self.request(Method::PUT, session, &rest)?.json(patch))
            .await
    }

    async fn remove_preset(&self, session: &str, id: PresetId) -> StoreResult {
        let rest = format!("presets/{id}");
        self.send(self.request(Method::DELETE, session, &rest)?).await
    }
}
