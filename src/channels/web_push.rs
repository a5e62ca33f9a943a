//! Browser push delivery: VAPID (RFC 8292) authentication and aes128gcm
//! payload encryption (RFC 8291), one subscription at a time.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit};
use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePrivateKey;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use super::{truncate_chars, PushChannel, PushMessage, PushOutcome};
use crate::config::VapidConfig;
use crate::domain::push_subscription::PushSubscription;

const PUBLIC_KEY_LEN: usize = 65;
const AUTH_SECRET_LEN: usize = 16;
const SALT_LEN: usize = 16;
const RECORD_SIZE: u32 = 4096;
/// Seconds a push service may hold an undelivered message (12 hours).
pub const PUSH_TTL_SECONDS: u32 = 43_200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const VAPID_JWT_EXP_SECS: i64 = 12 * 60 * 60;
const NOTIFICATION_ICON: &str = "/pwa-192x192.png";
const NOTIFICATION_BADGE: &str = "/pwa-64x64.png";

const IKM_INFO_PREFIX: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("VAPID_PRIVATE_KEY não configurada")]
    MissingPrivateKey,
    #[error("Chave VAPID inválida: {0}")]
    InvalidVapidKey(String),
    #[error("invalid push endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("invalid subscription keys: {0}")]
    InvalidSubscriptionKeys(String),
    #[error("payload encryption failed: {0}")]
    Encryption(String),
    #[error("push request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("push service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// What a failed delivery means for the subscription that received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// 404/410: the browser dropped the subscription.
    EndpointGone,
    /// 403: the subscription was created for another VAPID key.
    KeyMismatch,
    Transient,
}

impl DeliveryFailure {
    pub fn classify(error: &PushError) -> Self {
        match error {
            PushError::Status { status: 404 | 410, .. } => Self::EndpointGone,
            PushError::Status { status: 403, .. } => Self::KeyMismatch,
            _ => Self::Transient,
        }
    }
}

/// Persistence the push channel needs to prune dead subscriptions.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn active_subscriptions(&self) -> Result<Vec<PushSubscription>>;
    async fn deactivate(&self, id: Uuid) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[derive(Clone)]
pub struct VapidKeys {
    signing_key: SigningKey,
    public_key_b64: String,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key_b64", &self.public_key_b64)
            .finish_non_exhaustive()
    }
}

impl VapidKeys {
    /// Accepts a PEM private key (PKCS#8 or SEC1) or a base64url raw scalar.
    /// When a public key is configured it must match the private key, since a
    /// mismatch makes every push service answer 403.
    pub fn from_config(config: &VapidConfig) -> Result<Self, PushError> {
        let private_key = config
            .private_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(PushError::MissingPrivateKey)?;

        let secret = parse_private_key(private_key)?;
        let public_raw = secret.public_key().to_encoded_point(false);
        let public_key_b64 = URL_SAFE_NO_PAD.encode(public_raw.as_bytes());

        if let Some(configured) = config.public_key.as_deref() {
            if configured.trim() != public_key_b64 {
                return Err(PushError::InvalidVapidKey(
                    "VAPID_PUBLIC_KEY não corresponde à chave privada".to_string(),
                ));
            }
        }

        Ok(Self {
            signing_key: SigningKey::from(secret),
            public_key_b64,
        })
    }

    pub fn public_key_b64(&self) -> &str {
        &self.public_key_b64
    }
}

fn parse_private_key(input: &str) -> Result<SecretKey, PushError> {
    if input.starts_with("-----BEGIN") {
        // Environment variables often carry escaped newlines.
        let pem = input.replace("\\n", "\n");
        return SecretKey::from_pkcs8_pem(&pem)
            .or_else(|_| SecretKey::from_sec1_pem(&pem))
            .map_err(|err| PushError::InvalidVapidKey(err.to_string()));
    }

    let raw = URL_SAFE_NO_PAD
        .decode(input.trim_end_matches('=').as_bytes())
        .map_err(|err| PushError::InvalidVapidKey(err.to_string()))?;
    SecretKey::from_slice(&raw).map_err(|_| {
        PushError::InvalidVapidKey("a chave privada deve ter 32 bytes".to_string())
    })
}

#[derive(Serialize)]
struct PushPayload<'a> {
    title: String,
    body: String,
    icon: &'a str,
    badge: &'a str,
    data: &'a serde_json::Value,
}

impl<'a> PushPayload<'a> {
    fn new(message: &'a PushMessage) -> Self {
        Self {
            title: truncate_chars(&message.title, 120),
            body: truncate_chars(&message.body, 600),
            icon: NOTIFICATION_ICON,
            badge: NOTIFICATION_BADGE,
            data: &message.data,
        }
    }
}

pub struct WebPushSender {
    store: Arc<dyn SubscriptionStore>,
    keys: Result<VapidKeys, String>,
    subject: String,
    client: reqwest::Client,
}

impl WebPushSender {
    pub fn new(store: Arc<dyn SubscriptionStore>, config: &VapidConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(store, config, client))
    }

    pub fn with_client(
        store: Arc<dyn SubscriptionStore>,
        config: &VapidConfig,
        client: reqwest::Client,
    ) -> Self {
        let keys = VapidKeys::from_config(config).map_err(|err| err.to_string());
        if let Err(err) = &keys {
            warn!(error = %err, "web push disabled");
        }
        Self {
            store,
            keys,
            subject: config.subject.clone(),
            client,
        }
    }

    pub fn vapid_public_key(&self) -> Option<&str> {
        self.keys.as_ref().ok().map(VapidKeys::public_key_b64)
    }

    /// Error preventing any delivery, if the VAPID key is unusable.
    pub fn key_error(&self) -> Option<&str> {
        self.keys.as_ref().err().map(String::as_str)
    }

    async fn send_to(
        &self,
        keys: &VapidKeys,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), PushError> {
        let audience = push_service_audience(&subscription.endpoint)?;
        let jwt = build_vapid_jwt(&keys.signing_key, &audience, &self.subject)?;

        let client_public = decode_b64url(&subscription.p256dh)?;
        let client_public: [u8; PUBLIC_KEY_LEN] = client_public.try_into().map_err(|_| {
            PushError::InvalidSubscriptionKeys("p256dh must be 65 bytes".to_string())
        })?;
        let client_auth = decode_b64url(&subscription.auth)?;
        let client_auth: [u8; AUTH_SECRET_LEN] = client_auth.try_into().map_err(|_| {
            PushError::InvalidSubscriptionKeys("auth must be 16 bytes".to_string())
        })?;

        let body = encrypt_aes128gcm(payload, &client_public, &client_auth)?;

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", PUSH_TTL_SECONDS.to_string())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header(
                "Authorization",
                format!("vapid t={}, k={}", jwt, keys.public_key_b64),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(PushError::Status {
            status: status.as_u16(),
            body: truncate_chars(&body, 300),
        })
    }

    async fn handle_failure(&self, subscription: &PushSubscription, err: &PushError) {
        match DeliveryFailure::classify(err) {
            DeliveryFailure::EndpointGone => {
                match self.store.deactivate(subscription.id).await {
                    Ok(()) => info!(
                        subscription_id = %subscription.id,
                        "push endpoint gone, subscription deactivated"
                    ),
                    Err(store_err) => error!(
                        error = ?store_err,
                        subscription_id = %subscription.id,
                        "failed to deactivate subscription"
                    ),
                }
            }
            DeliveryFailure::KeyMismatch => match self.store.delete(subscription.id).await {
                Ok(()) => warn!(
                    subscription_id = %subscription.id,
                    "push service rejected VAPID credentials, subscription deleted"
                ),
                Err(store_err) => error!(
                    error = ?store_err,
                    subscription_id = %subscription.id,
                    "failed to delete subscription"
                ),
            },
            DeliveryFailure::Transient => {}
        }
    }
}

#[async_trait]
impl PushChannel for WebPushSender {
    async fn broadcast(&self, message: &PushMessage) -> PushOutcome {
        let subscriptions = match self.store.active_subscriptions().await {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                error!(error = ?err, "failed to load push subscriptions");
                return PushOutcome {
                    error: Some(format!("falha ao carregar subscriptions: {}", err)),
                    ..PushOutcome::default()
                };
            }
        };

        if subscriptions.is_empty() {
            info!("no active push subscriptions");
            return PushOutcome::default();
        }

        let keys = match &self.keys {
            Ok(keys) => keys,
            Err(err) => {
                error!(error = %err, "cannot send push notifications");
                return PushOutcome {
                    sent: 0,
                    failed: subscriptions.len(),
                    error: Some(err.clone()),
                };
            }
        };

        let payload = match serde_json::to_vec(&PushPayload::new(message)) {
            Ok(payload) => payload,
            Err(err) => {
                return PushOutcome {
                    sent: 0,
                    failed: subscriptions.len(),
                    error: Some(err.to_string()),
                }
            }
        };

        let mut outcome = PushOutcome::default();
        for subscription in &subscriptions {
            match self.send_to(keys, subscription, &payload).await {
                Ok(()) => {
                    outcome.sent += 1;
                    debug!(subscription_id = %subscription.id, "push notification delivered");
                }
                Err(err) => {
                    outcome.failed += 1;
                    warn!(
                        error = %err,
                        subscription_id = %subscription.id,
                        "push delivery failed"
                    );
                    self.handle_failure(subscription, &err).await;
                }
            }
        }

        info!(sent = outcome.sent, failed = outcome.failed, "push broadcast finished");
        outcome
    }
}

/// The `aud` claim: scheme, host and explicit port of the endpoint.
fn push_service_audience(endpoint: &str) -> Result<String, PushError> {
    let url = Url::parse(endpoint).map_err(|err| PushError::InvalidEndpoint(err.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| PushError::InvalidEndpoint("missing host".to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

fn build_vapid_jwt(signing_key: &SigningKey, audience: &str, subject: &str) -> Result<String, PushError> {
    #[derive(Serialize)]
    struct Claims<'a> {
        aud: &'a str,
        exp: i64,
        sub: &'a str,
    }

    let claims = Claims {
        aud: audience,
        exp: OffsetDateTime::now_utc().unix_timestamp() + VAPID_JWT_EXP_SECS,
        sub: subject,
    };
    let header = serde_json::json!({ "typ": "JWT", "alg": "ES256" });

    let header = serde_json::to_vec(&header).map_err(|err| PushError::Encryption(err.to_string()))?;
    let claims = serde_json::to_vec(&claims).map_err(|err| PushError::Encryption(err.to_string()))?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(claims)
    );

    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

fn decode_b64url(input: &str) -> Result<Vec<u8>, PushError> {
    URL_SAFE_NO_PAD
        .decode(input.trim().trim_end_matches('=').as_bytes())
        .map_err(|err| PushError::InvalidSubscriptionKeys(err.to_string()))
}

fn hkdf_sha256(salt: &[u8], ikm: &[u8], info: &[u8], out: &mut [u8]) -> Result<(), PushError> {
    Hkdf::<Sha256>::new(Some(salt), ikm)
        .expand(info, out)
        .map_err(|_| PushError::Encryption("HKDF expand failed".to_string()))
}

/// Single-record aes128gcm body: salt | record size | key id length | sender
/// public key | ciphertext.
fn encrypt_aes128gcm(
    plaintext: &[u8],
    client_public: &[u8; PUBLIC_KEY_LEN],
    client_auth: &[u8; AUTH_SECRET_LEN],
) -> Result<Vec<u8>, PushError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let client_key = PublicKey::from_sec1_bytes(client_public)
        .map_err(|_| PushError::InvalidSubscriptionKeys("p256dh is not a P-256 point".to_string()))?;

    let server_secret = EphemeralSecret::random(&mut OsRng);
    let server_public = server_secret.public_key().to_encoded_point(false);
    let server_public = server_public.as_bytes();
    let shared = server_secret.diffie_hellman(&client_key);

    let mut ikm_info = Vec::with_capacity(IKM_INFO_PREFIX.len() + PUBLIC_KEY_LEN * 2);
    ikm_info.extend_from_slice(IKM_INFO_PREFIX);
    ikm_info.extend_from_slice(client_public);
    ikm_info.extend_from_slice(server_public);

    let mut ikm = [0u8; 32];
    hkdf_sha256(client_auth, shared.raw_secret_bytes().as_slice(), &ikm_info, &mut ikm)?;
    let mut cek = [0u8; 16];
    hkdf_sha256(&salt, &ikm, CEK_INFO, &mut cek)?;
    let mut nonce = [0u8; 12];
    hkdf_sha256(&salt, &ikm, NONCE_INFO, &mut nonce)?;

    let cipher = Aes128Gcm::new_from_slice(&cek)
        .map_err(|_| PushError::Encryption("invalid content key".to_string()))?;

    let mut padded = Vec::with_capacity(plaintext.len() + 1);
    padded.extend_from_slice(plaintext);
    padded.push(2);

    let ciphertext = cipher
        .encrypt((&nonce).into(), padded.as_slice())
        .map_err(|_| PushError::Encryption("AES-GCM encryption failed".to_string()))?;

    let mut body = Vec::with_capacity(SALT_LEN + 5 + server_public.len() + ciphertext.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(server_public.len() as u8);
    body.extend_from_slice(server_public);
    body.extend_from_slice(&ciphertext);
    Ok(body)
}
