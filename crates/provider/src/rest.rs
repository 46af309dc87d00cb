//! REST provider backed by reqwest.

use crate::auth::public_key_from_token;
use crate::MarketplaceApi;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use sawbuck_core::error::{MarketError, MarketResult};
use sawbuck_core::{
    AcceptOfferRequest, Account, AccountUpdate, Asset, AuthResponse, Credentials, Holding,
    NewAccount, NewAsset, NewHolding, NewOffer, Offer,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`RestClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub token: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> MarketResult<Self> {
        if base_url.is_empty() {
            return Err(MarketError::invalid("API URL must not be empty"));
        }
        let base_url = Url::parse(base_url)
            .map_err(|e| MarketError::invalid(format!("bad API URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MarketError::invalid(format!(
                "API URL {base_url} cannot carry a path"
            )));
        }
        Ok(Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            token: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Blank tokens count as logged out.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }
}

/// Talks to the marketplace REST API.
///
/// ```ignore
/// let config = ClientConfig::new("http://localhost:8000/api/")?.with_token(token);
/// let client = RestClient::connect(config)?;
/// let offers = client.list_offers().await?;
/// ```
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    public_key: Option<String>,
}

impl RestClient {
    pub fn connect(config: ClientConfig) -> MarketResult<Self> {
        let public_key = config
            .token
            .as_deref()
            .map(public_key_from_token)
            .transpose()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketError::Transport(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            api_url = %config.base_url,
            signed_in = public_key.is_some(),
            "marketplace client ready"
        );

        Ok(Self {
            http,
            base_url: config.base_url,
            token: config.token,
            public_key,
        })
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> MarketResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MarketError::invalid(format!("API URL {} has no path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> MarketResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%method, %url, "request");
        let builder = self.http.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, token),
            None => builder,
        })
    }

    /// Like [`request`](Self::request) but refuses to go out without a token.
    fn authorized(&self, method: Method, segments: &[&str]) -> MarketResult<RequestBuilder> {
        if self.token.is_none() {
            return Err(MarketError::Unauthorized(
                "this action needs an authorization token".into(),
            ));
        }
        self.request(method, segments)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> MarketResult<T> {
        let text = self.send_raw(builder).await?;
        serde_json::from_str(&text)
            .map_err(|e| MarketError::Decode(format!("unexpected response body: {e}")))
    }

    async fn send_unit(&self, builder: RequestBuilder) -> MarketResult<()> {
        self.send_raw(builder).await.map(|_| ())
    }

    async fn send_raw(&self, builder: RequestBuilder) -> MarketResult<String> {
        let response = builder
            .send()
            .await
            .map_err(|e| MarketError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MarketError::Transport(format!("failed to read response: {e}")))?;

        if status.is_success() {
            return Ok(text);
        }

        let message = error_message(&text).unwrap_or_else(|| status.to_string());
        tracing::debug!(status = status.as_u16(), %message, "request failed");
        Err(match status {
            StatusCode::NOT_FOUND => MarketError::NotFound(message),
            StatusCode::UNAUTHORIZED => MarketError::Unauthorized(message),
            _ => MarketError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> MarketResult<T> {
        self.send(self.authorized(Method::POST, segments)?.json(body))
            .await
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Pulls the `error` field out of a failure body, falling back to the raw
/// text when it is not the API's JSON shape.
fn error_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return Some(parsed.error);
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl MarketplaceApi for RestClient {
    fn session_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    async fn create_account(&self, account: &NewAccount) -> MarketResult<AuthResponse> {
        let auth: AuthResponse = self
            .send(self.request(Method::POST, &["accounts"])?.json(account))
            .await?;
        tracing::info!(email = %account.email, "account created");
        Ok(auth)
    }

    async fn authorize(&self, credentials: &Credentials) -> MarketResult<AuthResponse> {
        self.send(
            self.request(Method::POST, &["authorization"])?
                .json(credentials),
        )
        .await
    }

    async fn list_accounts(&self) -> MarketResult<Vec<Account>> {
        self.send(self.request(Method::GET, &["accounts"])?).await
    }

    async fn get_account(&self, public_key: &str) -> MarketResult<Account> {
        self.send(self.request(Method::GET, &["accounts", public_key])?)
            .await
    }

    async fn update_account(&self, update: &AccountUpdate) -> MarketResult<()> {
        self.send_unit(self.authorized(Method::PATCH, &["accounts"])?.json(update))
            .await
    }

    async fn list_assets(&self) -> MarketResult<Vec<Asset>> {
        self.send(self.request(Method::GET, &["assets"])?).await
    }

    async fn get_asset(&self, name: &str) -> MarketResult<Asset> {
        self.send(self.request(Method::GET, &["assets", name])?).await
    }

    async fn create_asset(&self, asset: &NewAsset) -> MarketResult<Asset> {
        let created: Asset = self.post(&["assets"], asset).await?;
        tracing::info!(asset = %created.name, "asset created");
        Ok(created)
    }

    async fn create_holding(&self, holding: &NewHolding) -> MarketResult<Holding> {
        let created: Holding = self.post(&["holdings"], holding).await?;
        tracing::info!(holding = %created.id, asset = %created.asset, "holding created");
        Ok(created)
    }

    async fn list_offers(&self) -> MarketResult<Vec<Offer>> {
        self.send(self.request(Method::GET, &["offers"])?).await
    }

    async fn get_offer(&self, id: &str) -> MarketResult<Offer> {
        self.send(self.request(Method::GET, &["offers", id])?).await
    }

    async fn create_offer(&self, offer: &NewOffer) -> MarketResult<Offer> {
        let created: Offer = self.post(&["offers"], offer).await?;
        tracing::info!(offer = %created.id, "offer created");
        Ok(created)
    }

    async fn accept_offer(&self, id: &str, acceptance: &AcceptOfferRequest) -> MarketResult<()> {
        self.send_unit(
            self.authorized(Method::PATCH, &["offers", id, "accept"])?
                .json(acceptance),
        )
        .await?;
        tracing::info!(offer = id, count = acceptance.count, "offer accepted");
        Ok(())
    }

    async fn close_offer(&self, id: &str) -> MarketResult<()> {
        self.send_unit(self.authorized(Method::PATCH, &["offers", id, "close"])?)
            .await?;
        tracing::info!(offer = id, "offer closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RestClient {
        RestClient::connect(ClientConfig::new(base).unwrap()).unwrap()
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(matches!(
            ClientConfig::new(""),
            Err(MarketError::InvalidInput(_))
        ));
    }

    #[test]
    fn endpoint_joins_and_encodes_segments() {
        let c = client("http://localhost:8000/api/");
        assert_eq!(
            c.endpoint(&["assets", "Gold Bar"]).unwrap().as_str(),
            "http://localhost:8000/api/assets/Gold%20Bar"
        );
        assert_eq!(
            c.endpoint(&["offers", "o1", "accept"]).unwrap().as_str(),
            "http://localhost:8000/api/offers/o1/accept"
        );
    }

    #[test]
    fn endpoint_without_trailing_slash() {
        let c = client("http://localhost:8000/api");
        assert_eq!(
            c.endpoint(&["offers"]).unwrap().as_str(),
            "http://localhost:8000/api/offers"
        );
    }

    #[test]
    fn blank_token_means_logged_out() {
        let config = ClientConfig::new(DEFAULT_API_URL)
            .unwrap()
            .with_token(Some("  ".into()));
        let c = RestClient::connect(config).unwrap();
        assert!(c.session_key().is_none());
    }

    #[tokio::test]
    async fn mutation_without_token_fails_before_sending() {
        let c = client(DEFAULT_API_URL);
        let err = c.close_offer("o1").await.unwrap_err();
        assert!(matches!(err, MarketError::Unauthorized(_)));
    }

    #[test]
    fn error_message_prefers_api_shape() {
        assert_eq!(
            error_message(r#"{"error":"Offer o1 is not open"}"#).as_deref(),
            Some("Offer o1 is not open")
        );
        assert_eq!(error_message("gateway down").as_deref(), Some("gateway down"));
        assert_eq!(error_message("  "), None);
    }
}
