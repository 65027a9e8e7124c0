use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::{
    bucket::{BucketRegistry, Consume, DiscoveryLock, Resolution},
    headers::{remote_seconds, RateLimitHeaders},
    outcome::{ErrorKind, NetworkErrorKind, Outcome, RateLimitScope},
    route::{Method, RouteKey, Service},
    transport::{HttpRequest, HttpResponse, Transport, TransportError},
};
use crate::server::error::store::StoreError;

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/tornsync/tornsync, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);
const TORN_COMMENT: &str = "tornsync";
/// Game-API "too many requests" error code.
const TORN_RATE_LIMITED: i64 = 5;

/// Credential a call is made with; its kind selects the remote service.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Chat-platform bot token.
    Bot(String),
    /// Game-API key.
    ApiKey(String),
}

impl Credential {
    pub fn service(&self) -> Service {
        match self {
            Credential::Bot(_) => Service::Discord,
            Credential::ApiKey(_) => Service::Torn,
        }
    }

    fn secret(&self) -> &str {
        match self {
            Credential::Bot(token) => token,
            Credential::ApiKey(key) => key,
        }
    }

    /// Short, log-safe rendering of the credential.
    pub fn masked(&self) -> String {
        let secret = self.secret();
        let visible: String = secret.chars().take(4).collect();
        format!("{visible}…")
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self.service(), self.masked())
    }
}

/// Discord error body: `{"code": 50013, "message": "Missing Permissions"}`.
#[derive(Deserialize)]
struct DiscordErrorBody {
    code: i64,
    message: String,
}

/// Discord 429 body.
#[derive(Deserialize)]
struct DiscordRateLimitBody {
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

/// Game-API error envelope: `{"error": {"code": 2, "error": "Incorrect key"}}`.
#[derive(Deserialize)]
struct TornErrorEnvelope {
    error: TornErrorBody,
}

#[derive(Deserialize)]
struct TornErrorBody {
    code: i64,
    error: String,
}

/// Rate-limit compliant caller for both remote services.
///
/// Cheap to clone; clones share the transport and the registry's store.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    registry: BucketRegistry,
    discord_api_url: String,
    torn_api_url: String,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: BucketRegistry,
        discord_api_url: impl Into<String>,
        torn_api_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            registry,
            discord_api_url: discord_api_url.into().trim_end_matches('/').to_string(),
            torn_api_url: torn_api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }

    /// Performs exactly one rate-limit compliant call.
    ///
    /// # Arguments
    /// - `method` - HTTP method
    /// - `route` - Route relative to the service's API root, query string included
    /// - `credential` - Bot token or API key; selects the remote service
    /// - `payload` - Optional JSON body
    ///
    /// # Returns
    /// - `Ok(Some(json))` - Successful call with a body
    /// - `Ok(None)` - Successful call without a body
    /// - `Err(ErrorKind)` - Classified failure; nothing is retried at this layer
    pub async fn call(
        &self,
        method: Method,
        route: &str,
        credential: &Credential,
        payload: Option<&Value>,
    ) -> Outcome {
        let outcome = if credential.secret().trim().is_empty() {
            Err(ErrorKind::MissingCredential)
        } else {
            match credential {
                Credential::Bot(token) => self.call_discord(method, route, token, payload).await,
                Credential::ApiKey(key) => self.call_torn(method, route, key, payload).await,
            }
        };

        if let Err(kind) = &outcome {
            log_failure(method, route, credential, kind);
        }

        outcome
    }

    async fn call_discord(
        &self,
        method: Method,
        route: &str,
        token: &str,
        payload: Option<&Value>,
    ) -> Outcome {
        let route_key = RouteKey::new(method, route);

        let discovering = match self.registry.resolve(&route_key).await.map_err(store_error)? {
            Resolution::Resolved(bucket) => {
                permit(self.registry.try_consume(&bucket.id).await)?;
                false
            }
            Resolution::Unresolved => {
                match self
                    .registry
                    .acquire_discovery_lock(&route_key)
                    .await
                    .map_err(store_error)?
                {
                    DiscoveryLock::Denied => return Err(ErrorKind::DiscoveryInProgress),
                    DiscoveryLock::Granted => {}
                }
                if let Err(kind) = permit(self.registry.try_consume_global().await) {
                    self.release_lock(&route_key).await;
                    return Err(kind);
                }
                true
            }
        };

        let request = HttpRequest {
            method,
            url: format!("{}/{}", self.discord_api_url, route.trim_start_matches('/')),
            headers: vec![
                ("Authorization".to_string(), format!("Bot {token}")),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
            ],
            body: payload.cloned(),
        };

        let result = self.transport.send(request).await;
        let outcome = self.classify_discord(&route_key, result).await;

        if discovering {
            self.release_lock(&route_key).await;
        }

        outcome
    }

    async fn classify_discord(
        &self,
        route_key: &RouteKey,
        result: Result<HttpResponse, TransportError>,
    ) -> Outcome {
        let response = result.map_err(network_error)?;
        let headers = RateLimitHeaders::parse(&response.headers);

        // A 429 still carries authoritative bucket state.
        if response.is_success() || response.status == 429 {
            if let Err(e) = self.registry.record_response(route_key, &headers).await {
                tracing::error!("Failed to record bucket state for {}: {}", route_key, e);
            }
        }

        if response.status == 429 {
            let body: Option<DiscordRateLimitBody> = serde_json::from_str(&response.body).ok();
            let retry_after = body
                .as_ref()
                .and_then(|b| b.retry_after)
                .and_then(remote_seconds)
                .or_else(|| headers.wait());
            let global = headers.global || body.is_some_and(|b| b.global);

            if global {
                let block = retry_after.unwrap_or(Duration::from_secs(1));
                if let Err(e) = self.registry.block_global(block).await {
                    tracing::error!("Failed to record global rate limit: {}", e);
                }
            }

            return Err(ErrorKind::RateLimited {
                scope: if global {
                    RateLimitScope::Global
                } else {
                    RateLimitScope::Remote
                },
                retry_after,
            });
        }

        if response.is_success() {
            return decode_body(&response);
        }

        match serde_json::from_str::<DiscordErrorBody>(&response.body) {
            Ok(body) => Err(ErrorKind::Remote {
                code: body.code,
                message: body.message,
            }),
            Err(_) => Err(ErrorKind::Network(NetworkErrorKind::Status(response.status))),
        }
    }

    async fn call_torn(
        &self,
        method: Method,
        route: &str,
        key: &str,
        payload: Option<&Value>,
    ) -> Outcome {
        permit(self.registry.try_consume_key(key).await)?;

        let route = route.trim_start_matches('/');
        let separator = if route.contains('?') { '&' } else { '?' };
        let request = HttpRequest {
            method,
            url: format!(
                "{}/{}{}key={}&comment={}",
                self.torn_api_url, route, separator, key, TORN_COMMENT
            ),
            headers: Vec::new(),
            body: payload.cloned(),
        };

        let response = self.transport.send(request).await.map_err(network_error)?;

        if response.status == 429 {
            return Err(ErrorKind::RateLimited {
                scope: RateLimitScope::Remote,
                retry_after: RateLimitHeaders::parse(&response.headers).wait(),
            });
        }
        if !response.is_success() {
            return Err(ErrorKind::Network(NetworkErrorKind::Status(response.status)));
        }

        // Domain errors arrive with status 200.
        if let Ok(envelope) = serde_json::from_str::<TornErrorEnvelope>(&response.body) {
            return Err(if envelope.error.code == TORN_RATE_LIMITED {
                ErrorKind::RateLimited {
                    scope: RateLimitScope::Remote,
                    retry_after: None,
                }
            } else {
                ErrorKind::Remote {
                    code: envelope.error.code,
                    message: envelope.error.error,
                }
            });
        }

        decode_body(&response)
    }

    async fn release_lock(&self, route_key: &RouteKey) {
        if let Err(e) = self.registry.release_discovery_lock(route_key).await {
            tracing::warn!("Failed to release discovery lock for {}: {}", route_key, e);
        }
    }
}

fn permit(result: Result<Consume, StoreError>) -> Result<(), ErrorKind> {
    match result.map_err(store_error)? {
        Consume::Allowed => Ok(()),
        Consume::Denied { scope, retry_after } => Err(ErrorKind::RateLimited { scope, retry_after }),
    }
}

fn store_error(err: StoreError) -> ErrorKind {
    ErrorKind::Store(err.to_string())
}

fn network_error(err: TransportError) -> ErrorKind {
    match err {
        TransportError::Timeout => ErrorKind::Network(NetworkErrorKind::Timeout),
        TransportError::Connection(_) => ErrorKind::Network(NetworkErrorKind::Connection),
    }
}

fn decode_body(response: &HttpResponse) -> Outcome {
    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&response.body)
        .map(Some)
        .map_err(|e| ErrorKind::Decode(e.to_string()))
}

/// Logs a failed call once, at the level its kind deserves.
fn log_failure(method: Method, route: &str, credential: &Credential, kind: &ErrorKind) {
    let route = route.split('?').next().unwrap_or(route);
    match kind {
        ErrorKind::RateLimited { .. } | ErrorKind::DiscoveryInProgress => {
            tracing::debug!("{} {} deferred: {}", method, route, kind)
        }
        ErrorKind::Remote { .. } | ErrorKind::MissingCredential => {
            tracing::warn!("{} {} with {:?} failed: {}", method, route, credential, kind)
        }
        ErrorKind::Network(_) | ErrorKind::Decode(_) | ErrorKind::Store(_) => {
            tracing::error!("{} {} failed: {}", method, route, kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::gateway::{
        bucket::RateLimits,
        headers,
        transport::mock::{bucket_headers, json_response, ScriptedTransport},
    };
    use crate::server::store::{now_ms, MemoryStore};
    use serde_json::json;

    fn gateway(transport: Arc<ScriptedTransport>) -> Gateway {
        let registry = BucketRegistry::new(
            Arc::new(MemoryStore::new()),
            RateLimits {
                discord_global_per_second: 50,
                torn_key_limit: 2,
                torn_window: Duration::from_secs(60),
            },
        );
        Gateway::new(transport, registry, "https://discord.test/api", "https://torn.test")
    }

    fn bot() -> Credential {
        Credential::Bot("token".to_string())
    }

    #[tokio::test]
    async fn empty_credential_makes_no_call() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(200, json!({}), &[]))
        }));
        let gateway = gateway(transport.clone());

        let outcome = gateway
            .call(Method::Get, "users/@me", &Credential::Bot(String::new()), None)
            .await;

        assert_eq!(outcome, Err(ErrorKind::MissingCredential));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn discovery_maps_routes_to_shared_bucket() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(200, json!({"id": "1"}), &bucket_headers("abcd", "5", "4")))
        }));
        let gateway = gateway(transport.clone());
        let post = RouteKey::new(Method::Post, "channels/{id}/messages");
        let patch = RouteKey::new(Method::Patch, "channels/{id}/messages");

        gateway
            .call(Method::Post, "channels/1/messages", &bot(), Some(&json!({"content": "hi"})))
            .await
            .unwrap();
        gateway
            .call(Method::Patch, "channels/1/messages", &bot(), None)
            .await
            .unwrap();

        let Resolution::Resolved(a) = gateway.registry().resolve(&post).await.unwrap() else {
            panic!("POST route should be discovered");
        };
        let Resolution::Resolved(b) = gateway.registry().resolve(&patch).await.unwrap() else {
            panic!("PATCH route should be discovered");
        };
        assert_eq!(a.id, "abcd");
        assert_eq!(b.id, "abcd");
        assert_eq!(a.remaining, b.remaining);

        let sent = transport.requests();
        assert_eq!(sent[0].url, "https://discord.test/api/channels/1/messages");
        assert!(sent[0]
            .headers
            .contains(&("Authorization".to_string(), "Bot token".to_string())));
    }

    #[tokio::test]
    async fn headers_round_trip_through_registry() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(200, json!([]), &bucket_headers("B", "5", "3")))
        }));
        let gateway = gateway(transport);

        gateway
            .call(Method::Get, "guilds/9/members", &bot(), None)
            .await
            .unwrap();

        let route = RouteKey::new(Method::Get, "guilds/9/members");
        let Resolution::Resolved(bucket) = gateway.registry().resolve(&route).await.unwrap()
        else {
            panic!("route should resolve");
        };
        assert_eq!(bucket.id, "B");
        assert!(bucket.remaining.unwrap() <= 3);
    }

    #[tokio::test]
    async fn held_discovery_lock_fails_fast() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(200, json!({}), &[]))
        }));
        let gateway = gateway(transport.clone());
        let route = RouteKey::new(Method::Get, "guilds/1");
        gateway.registry().acquire_discovery_lock(&route).await.unwrap();

        let outcome = gateway.call(Method::Get, "guilds/1", &bot(), None).await;

        assert_eq!(outcome, Err(ErrorKind::DiscoveryInProgress));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn exhausted_bucket_is_not_sent() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(200, json!({}), &bucket_headers("B", "1", "0")))
        }));
        let gateway = gateway(transport.clone());

        gateway.call(Method::Get, "guilds/1", &bot(), None).await.unwrap();
        let outcome = gateway.call(Method::Get, "guilds/2", &bot(), None).await;

        assert!(matches!(
            outcome,
            Err(ErrorKind::RateLimited {
                scope: RateLimitScope::Local,
                ..
            })
        ));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn global_429_blocks_other_routes() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(
                429,
                json!({"message": "You are being rate limited.", "retry_after": 2.5, "global": true}),
                &[(headers::GLOBAL, "true")],
            ))
        }));
        let gateway = gateway(transport.clone());

        let first = gateway.call(Method::Get, "guilds/1", &bot(), None).await;
        let second = gateway.call(Method::Get, "users/@me", &bot(), None).await;

        assert_eq!(
            first,
            Err(ErrorKind::RateLimited {
                scope: RateLimitScope::Global,
                retry_after: Some(Duration::from_secs_f64(2.5)),
            })
        );
        assert!(matches!(
            second,
            Err(ErrorKind::RateLimited {
                scope: RateLimitScope::Global,
                ..
            })
        ));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn oversized_remote_waits_are_clamped() {
        let transport = Arc::new(ScriptedTransport::new(|request| {
            if request.url.ends_with("guilds/1") {
                Ok(json_response(
                    200,
                    json!({}),
                    &[
                        (headers::BUCKET, "B"),
                        (headers::LIMIT, "5"),
                        (headers::REMAINING, "4"),
                        (headers::RESET_AFTER, "1e20"),
                    ],
                ))
            } else {
                Ok(json_response(429, json!({"retry_after": 1e20}), &[]))
            }
        }));
        let gateway = gateway(transport);

        gateway.call(Method::Get, "guilds/1", &bot(), None).await.unwrap();
        let limited = gateway.call(Method::Get, "users/@me", &bot(), None).await;

        let route = RouteKey::new(Method::Get, "guilds/1");
        let Resolution::Resolved(bucket) = gateway.registry().resolve(&route).await.unwrap()
        else {
            panic!("route should resolve");
        };
        assert_eq!(bucket.id, "B");
        assert!(bucket.reset_at_ms.unwrap() <= now_ms() + 86_400_000);
        assert_eq!(
            limited,
            Err(ErrorKind::RateLimited {
                scope: RateLimitScope::Remote,
                retry_after: Some(headers::MAX_REMOTE_WAIT),
            })
        );
    }

    #[tokio::test]
    async fn classifies_discord_error_body() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(
                403,
                json!({"code": 50013, "message": "Missing Permissions"}),
                &[],
            ))
        }));
        let gateway = gateway(transport);

        let outcome = gateway
            .call(Method::Post, "channels/5/messages", &bot(), None)
            .await;

        assert_eq!(
            outcome,
            Err(ErrorKind::Remote {
                code: 50013,
                message: "Missing Permissions".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn maps_transport_failures() {
        let transport = Arc::new(ScriptedTransport::new(|_| Err(TransportError::Timeout)));
        let gateway = gateway(transport);

        let outcome = gateway.call(Method::Get, "guilds/1", &bot(), None).await;

        assert_eq!(outcome, Err(ErrorKind::Network(NetworkErrorKind::Timeout)));
    }

    #[tokio::test]
    async fn no_content_is_empty_payload() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(HttpResponse {
                status: 204,
                headers: Default::default(),
                body: String::new(),
            })
        }));
        let gateway = gateway(transport);

        let outcome = gateway
            .call(Method::Patch, "guilds/1/members/2", &bot(), Some(&json!({"nick": "x"})))
            .await;

        assert_eq!(outcome, Ok(None));
    }

    #[tokio::test]
    async fn torn_error_envelope_is_remote_error() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(
                200,
                json!({"error": {"code": 2, "error": "Incorrect key"}}),
                &[],
            ))
        }));
        let gateway = gateway(transport.clone());

        let outcome = gateway
            .call(
                Method::Get,
                "user/1?selections=profile",
                &Credential::ApiKey("abcdefghijklmnop".to_string()),
                None,
            )
            .await;

        assert_eq!(outcome.unwrap_err().remote_code(), Some(2));
        assert_eq!(
            transport.requests()[0].url,
            "https://torn.test/user/1?selections=profile&key=abcdefghijklmnop&comment=tornsync"
        );
    }

    #[tokio::test]
    async fn torn_key_quota_is_enforced_locally() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(200, json!({"player_id": 1}), &[]))
        }));
        let gateway = gateway(transport.clone());
        let key = Credential::ApiKey("abcdefghijklmnop".to_string());

        gateway.call(Method::Get, "user/1", &key, None).await.unwrap();
        gateway.call(Method::Get, "user/2", &key, None).await.unwrap();
        let third = gateway.call(Method::Get, "user/3", &key, None).await;

        assert!(matches!(
            third,
            Err(ErrorKind::RateLimited {
                scope: RateLimitScope::Local,
                ..
            })
        ));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn torn_too_many_requests_is_rate_limit() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(json_response(
                200,
                json!({"error": {"code": 5, "error": "Too many requests"}}),
                &[],
            ))
        }));
        let gateway = gateway(transport);

        let outcome = gateway
            .call(Method::Get, "user/1", &Credential::ApiKey("k".repeat(16)), None)
            .await;

        assert!(outcome.unwrap_err().is_rate_limit());
    }
}
