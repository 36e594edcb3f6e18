//! Account registration through the storefront's form endpoint.
//!
//! Registration is a bounded mutate-and-resubmit loop: each reply is assessed
//! into an [`Attempt`], an email collision on the first attempt rotates the
//! identity's email and resubmits, and every terminal branch maps to its own
//! [`HarnessError`] variant.

use crate::result::{HarnessError, HarnessResult};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{header, Client, Url};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Registration form route, relative to the storefront base URL
pub const REGISTER_ROUTE: &str = "index.php?route=account/register";

/// Substring of the redirect target that signals success
pub const SUCCESS_ROUTE_MARKER: &str = "route=account/success";

/// Body text that signals an email collision
pub const ALREADY_REGISTERED_MARKER: &str = "E-Mail Address is already registered";

/// Upper bound on submissions per registration
pub const MAX_ATTEMPTS: u32 = 2;

/// Request timeout for the HTTP transport
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Account data submitted to the registration form
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrationIdentity {
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email; rotated by the registrar on collision
    pub email: String,
    /// Telephone, digits only
    pub telephone: String,
    /// Password
    pub password: String,
}

impl fmt::Debug for RegistrationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationIdentity")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("telephone", &self.telephone)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RegistrationIdentity {
    /// Create an identity
    #[must_use]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        telephone: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            telephone: telephone.into(),
            password: password.into(),
        }
    }

    /// Fresh identity with a uuid-derived email and a 10-digit telephone
    #[must_use]
    pub fn generate() -> Self {
        let id = Uuid::new_v4();
        let simple = id.simple().to_string();
        let telephone: String = id
            .as_u128()
            .to_string()
            .chars()
            .rev()
            .take(10)
            .collect();
        Self {
            first_name: "Journey".to_string(),
            last_name: format!("Shopper{}", &simple[..6]),
            email: format!("shopper.{}@example.com", &simple[..16]),
            telephone,
            password: format!("Pw!{}A9", &simple[16..28]),
        }
    }

    /// Form fields in submission order
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("firstname", self.first_name.clone()),
            ("lastname", self.last_name.clone()),
            ("email", self.email.clone()),
            ("telephone", self.telephone.clone()),
            ("password", self.password.clone()),
            ("confirm", self.password.clone()),
            ("agree", "1".to_string()),
        ]
    }

    /// Same identity with `_<token>` inserted before the `@` of the email
    #[must_use]
    pub fn with_rotated_email(&self, token: &str) -> Self {
        let email = if self.email.contains('@') {
            self.email.replacen('@', &format!("_{token}@"), 1)
        } else {
            format!("{}_{token}", self.email)
        };
        Self {
            email,
            ..self.clone()
        }
    }
}

/// Uniqueness token derived from the current time
#[must_use]
pub fn collision_token() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// Raw reply of the registration endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Status code
    pub status: u16,
    /// `Location` header, if any
    pub location: Option<String>,
    /// Response body
    pub body: String,
}

impl HttpReply {
    /// Check for a 3xx status
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        self.status >= 300 && self.status < 400
    }
}

/// Posts form-encoded payloads without following redirects
#[async_trait]
pub trait FormTransport: Send + Sync {
    /// POST `fields` to `route` and return the unfollowed reply
    async fn post_form(&self, route: &str, fields: &[(&'static str, String)]) -> HarnessResult<HttpReply>;
}

/// `reqwest` transport against the storefront base URL
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Create a transport for `base_url`
    pub fn new(base_url: &str) -> HarnessResult<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| HarnessError::config(format!("invalid base URL {base_url}: {e}")))?;
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Base URL requests are resolved against
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl FormTransport for ReqwestTransport {
    async fn post_form(&self, route: &str, fields: &[(&'static str, String)]) -> HarnessResult<HttpReply> {
        let url = self
            .base_url
            .join(route)
            .map_err(|e| HarnessError::config(format!("invalid route {route}: {e}")))?;
        tracing::debug!(%url, "posting registration form");

        let response = self.client.post(url).form(fields).send().await?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        Ok(HttpReply {
            status,
            location,
            body,
        })
    }
}

/// Assessment of one submission
#[derive(Debug)]
pub enum Attempt {
    /// Account created
    Success,
    /// Email collision; resubmit with this identity
    Retry(RegistrationIdentity),
    /// Terminal failure
    Fatal(HarnessError),
}

/// Classify the reply to submission number `attempt` (1-based)
#[must_use]
pub fn assess(reply: &HttpReply, attempt: u32, identity: &RegistrationIdentity, token: &str) -> Attempt {
    if reply.is_redirect() {
        return match reply.location.as_deref() {
            Some(location) if location.contains(SUCCESS_ROUTE_MARKER) => Attempt::Success,
            other => Attempt::Fatal(HarnessError::UnexpectedRedirect {
                location: other.unwrap_or("<none>").to_string(),
            }),
        };
    }
    if reply.status != 200 {
        return Attempt::Fatal(HarnessError::RegistrationHttp {
            status: reply.status,
            body: reply.body.clone(),
        });
    }
    if reply.body.contains(ALREADY_REGISTERED_MARKER) {
        if attempt < MAX_ATTEMPTS {
            return Attempt::Retry(identity.with_rotated_email(token));
        }
        return Attempt::Fatal(HarnessError::RegistrationExhausted {
            attempts: attempt,
            email: identity.email.clone(),
        });
    }
    Attempt::Fatal(HarnessError::RegistrationRejected {
        body: reply.body.clone(),
    })
}

/// Successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReceipt {
    /// Submissions made
    pub attempts: u32,
    /// Email the account was created with
    pub email: String,
}

/// Create-or-retry registration client
#[derive(Debug)]
pub struct ResilientRegistrar<T> {
    transport: T,
}

impl ResilientRegistrar<ReqwestTransport> {
    /// Registrar posting to `base_url` over HTTP
    pub fn http(base_url: &str) -> HarnessResult<Self> {
        Ok(Self::new(ReqwestTransport::new(base_url)?))
    }
}

impl<T: FormTransport> ResilientRegistrar<T> {
    /// Create a registrar over a transport
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Register `identity`, rotating its email once on collision.
    ///
    /// The rotated email is written back into `identity` so later steps log
    /// in with the address that was actually registered.
    pub async fn register(&self, identity: &mut RegistrationIdentity) -> HarnessResult<RegistrationReceipt> {
        for attempt in 1..=MAX_ATTEMPTS {
            tracing::info!(attempt, email = %identity.email, "registering user");
            let reply = self
                .transport
                .post_form(REGISTER_ROUTE, &identity.form_fields())
                .await?;

            match assess(&reply, attempt, identity, &collision_token()) {
                Attempt::Success => {
                    tracing::info!(attempt, email = %identity.email, "user registered");
                    return Ok(RegistrationReceipt {
                        attempts: attempt,
                        email: identity.email.clone(),
                    });
                }
                Attempt::Retry(next) => {
                    tracing::warn!(
                        old = %identity.email,
                        new = %next.email,
                        "email already registered, retrying with rotated email"
                    );
                    *identity = next;
                }
                Attempt::Fatal(e) => return Err(e),
            }
        }
        Err(HarnessError::RegistrationExhausted {
            attempts: MAX_ATTEMPTS,
            email: identity.email.clone(),
        })
    }
}
