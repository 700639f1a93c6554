//! Exchange-backed implementations of the session, event and stream seams.

use async_trait::async_trait;
use exchange_api::GameLocation;
use reqwest::Client;
use serde_json::Value;
use tracing::instrument;

use crate::config::ExchangeConfig;
use crate::events::EventFeed;
use crate::session::{AuthToken, LoginOutcome, SessionCookie, SessionError, SessionProvider};
use crate::stream::StreamLocator;

/// Talks to the exchange endpoints configured in [`ExchangeConfig`].
pub struct ExchangeUpstream {
    client: Client,
    /// Redirects disabled, for the cookie exchange.
    session_client: Client,
    config: ExchangeConfig,
}

impl ExchangeUpstream {
    pub fn new(config: ExchangeConfig) -> crate::Result<Self> {
        Ok(Self {
            client: exchange_api::create_client()?,
            session_client: exchange_api::create_session_client()?,
            config,
        })
    }
}

#[async_trait]
impl SessionProvider for ExchangeUpstream {
    #[instrument(skip(self))]
    async fn login(&self) -> Result<LoginOutcome, SessionError> {
        let grant = exchange_api::login(
            &self.client,
            &self.config.login_url,
            &self.config.site_origin,
            &self.config.account,
        )
        .await
        .map_err(|e| SessionError::Auth(e.to_string()))?;

        let token = AuthToken::new(&grant.token)
            .ok_or_else(|| SessionError::Auth("login returned a blank token".to_string()))?;
        Ok(LoginOutcome {
            token,
            raw: grant.raw,
        })
    }

    async fn locate_game(&self, token: &AuthToken) -> Result<GameLocation, SessionError> {
        Ok(exchange_api::locate_game(
            &self.client,
            &self.config.game_url,
            &self.config.site_origin,
            token.as_str(),
        )
        .await?)
    }

    async fn open_session(&self, location: &GameLocation) -> Result<SessionCookie, SessionError> {
        let id = exchange_api::open_session(&self.session_client, location).await?;
        SessionCookie::new(&id).ok_or(SessionError::InvalidSessionValue)
    }
}

#[async_trait]
impl EventFeed for ExchangeUpstream {
    async fn query_live_events(&self, cookie: &SessionCookie) -> Result<Value, SessionError> {
        Ok(exchange_api::query_events(
            &self.client,
            &self.config.inplay_url,
            &cookie.header_value(),
            cookie.id(),
        )
        .await?)
    }
}

#[async_trait]
impl StreamLocator for ExchangeUpstream {
    async fn locate_stream(&self, cookie: &SessionCookie, id: &str) -> Result<Value, SessionError> {
        Ok(exchange_api::fetch_stream(
            &self.client,
            &self.config.stream_url,
            id,
            &cookie.header_value(),
            cookie.id(),
        )
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{CredentialKey, SessionManager};
    use crate::session::testing::MemoryStore;
    use crate::stream::StreamResolver;
    use exchange_api::Account;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ExchangeConfig {
        let base = server.uri();
        ExchangeConfig {
            account: Account {
                account_id: "user1".to_string(),
                password: "secret".to_string(),
                country_code: "91".to_string(),
            },
            login_url: format!("{base}/api/login"),
            game_url: format!("{base}/api/game"),
            stream_url: format!("{base}/api/stream"),
            inplay_url: format!("{base}/exchange/member/playerService/queryEvents"),
            site_origin: "https://www.example".to_string(),
        }
    }

    async fn mount_session_flow(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T1", "uid": 9})))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/game"))
            .and(header("authorization", "T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "url": format!("{}/game/login", server.uri()),
                    "params": {"token": "T1", "lang": "en"}
                }
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/game/login"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "/exchange/member")
                    .insert_header("set-cookie", "JSESSIONID=ABC123.node1; Path=/; HttpOnly"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_session_flow_against_exchange() {
        let server = MockServer::start().await;
        mount_session_flow(&server).await;

        let upstream = Arc::new(ExchangeUpstream::new(config(&server)).unwrap());
        let store = Arc::new(MemoryStore::default());
        let session = SessionManager::new(upstream, store.clone());

        let cookie = session.reauthenticate().await.unwrap();
        assert_eq!(cookie.id(), "ABC123.node1");
        assert_eq!(session.token().unwrap().as_str(), "T1");

        let records = store.records.lock();
        assert_eq!(records[&CredentialKey::AuthToken], json!({"token": "T1", "uid": 9}));
        assert_eq!(records[&CredentialKey::Cookie], json!({"value": "ABC123.node1"}));
    }

    #[tokio::test]
    async fn test_login_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "bad password"})))
            .mount(&server)
            .await;

        let upstream = ExchangeUpstream::new(config(&server)).unwrap();
        assert!(matches!(upstream.login().await, Err(SessionError::Auth(_))));
    }

    #[tokio::test]
    async fn test_stream_self_heal_against_exchange() {
        let server = MockServer::start().await;
        mount_session_flow(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/stream"))
            .and(header("authorization", "STALE"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "1001", "status_msg": "Not Authorized"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/stream"))
            .and(header("authorization", "ABC123.node1"))
            .and(body_string_contains("matchId=42"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"streamingUrl": "https://cdn.example/42.m3u8"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let upstream = Arc::new(ExchangeUpstream::new(config(&server)).unwrap());
        let store = Arc::new(MemoryStore::default());
        store
            .records
            .lock()
            .insert(CredentialKey::Cookie, json!({"value": "STALE"}));
        let session = Arc::new(SessionManager::new(upstream.clone(), store));
        session.load_from_store().await;

        let resolver = StreamResolver::new(session, upstream);
        let payload = resolver.resolve_stream("42", true).await.unwrap();
        assert_eq!(payload.streaming_url(), Some("https://cdn.example/42.m3u8"));
    }

    #[tokio::test]
    async fn test_forbidden_stream_is_not_authorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/stream"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let upstream = ExchangeUpstream::new(config(&server)).unwrap();
        let cookie = SessionCookie::new("S1").unwrap();
        let err = upstream.locate_stream(&cookie, "42").await.unwrap_err();
        assert_eq!(err, SessionError::NotAuthorized);
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_query_live_events_uses_session_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exchange/member/playerService/queryEvents"))
            .and(header("cookie", "JSESSIONID=S1"))
            .and(body_string_contains("queryPass=S1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"events": []})))
            .expect(1)
            .mount(&server)
            .await;

        let upstream = ExchangeUpstream::new(config(&server)).unwrap();
        let cookie = SessionCookie::new("S1").unwrap();
        let body = upstream.query_live_events(&cookie).await.unwrap();
        assert_eq!(body, json!({"events": []}));
    }
}
