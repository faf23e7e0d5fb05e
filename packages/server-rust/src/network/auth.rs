//! HTTP Basic authentication and the route access policy.
//!
//! The policy is consulted before any handler runs. Denials are answered
//! here with a bare 401/403 and never reach the error intercepts.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fluxdemo_core::{Principal, Role};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Challenge sent with every 401.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"fluxdemo\"";

// ---------------------------------------------------------------------------
// AccessPolicy
// ---------------------------------------------------------------------------

/// What a caller needs to reach a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("authentication required")]
    Unauthenticated,
    #[error("missing role {0:?}")]
    Forbidden(Role),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

#[derive(Debug, Clone)]
struct Rule {
    segments: Vec<Segment>,
    access: Access,
}

impl Rule {
    fn parse(pattern: &str, access: Access) -> Self {
        let segments = split(pattern)
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') {
                    Segment::Param
                } else {
                    Segment::Literal(segment.to_owned())
                }
            })
            .collect();
        Self { segments, access }
    }

    fn params(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| **segment == Segment::Param)
            .count()
    }

    fn matches(&self, path: &[&str]) -> bool {
        self.segments.len() == path.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(segment, part)| match segment {
                    Segment::Param => true,
                    Segment::Literal(literal) => literal == part,
                })
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Ordered route table mapping path patterns to required [`Access`].
///
/// `{name}` matches exactly one segment. Among matching rules the one with
/// the fewest parameters wins, then table order. Unmatched paths fall back to
/// [`Access::Authenticated`].
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<Rule>,
    fallback: Access,
}

impl AccessPolicy {
    #[must_use]
    pub fn new(fallback: Access) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    #[must_use]
    pub fn rule(mut self, pattern: &str, access: Access) -> Self {
        self.rules.push(Rule::parse(pattern, access));
        self
    }

    /// The route table of the demo service.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(Access::Authenticated)
            .rule("/api/auth/public", Access::Public)
            .rule("/api/users", Access::Role(Role::User))
            .rule("/api/users/{id}", Access::Role(Role::User))
            .rule("/api/users/test-error", Access::Role(Role::Admin))
            .rule("/api/users/test-bad-request", Access::Role(Role::Admin))
            .rule("/api/auth/protected", Access::Role(Role::User))
            .rule("/api/auth/admin", Access::Role(Role::Admin))
            .rule("/api/auth/me", Access::Role(Role::User))
            .rule("/health", Access::Public)
            .rule("/health/live", Access::Public)
            .rule("/health/ready", Access::Public)
    }

    /// Access required for `path`.
    #[must_use]
    pub fn required(&self, path: &str) -> Access {
        let parts: Vec<&str> = split(path).collect();
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.matches(&parts))
            .min_by_key(|(index, rule)| (rule.params(), *index))
            .map_or(self.fallback, |(_, rule)| rule.access)
    }

    /// Checks whether `principal` (or an anonymous caller) may reach `path`.
    ///
    /// # Errors
    ///
    /// [`AccessDenied::Unauthenticated`] when the route needs a caller and
    /// there is none; [`AccessDenied::Forbidden`] when the caller lacks the role.
    pub fn check(&self, path: &str, principal: Option<&Principal>) -> Result<(), AccessDenied> {
        match (self.required(path), principal) {
            (Access::Public, _) => Ok(()),
            (Access::Authenticated | Access::Role(_), None) => Err(AccessDenied::Unauthenticated),
            (Access::Authenticated, Some(_)) => Ok(()),
            (Access::Role(role), Some(principal)) if principal.has_role(role) => Ok(()),
            (Access::Role(role), Some(_)) => Err(AccessDenied::Forbidden(role)),
        }
    }

    #[must_use]
    pub fn authorize(&self, path: &str, principal: Option<&Principal>) -> bool {
        self.check(path, principal).is_ok()
    }
}

// ---------------------------------------------------------------------------
// CredentialStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("authorization header is not Basic")]
    NotBasic,
    #[error("malformed Basic credentials")]
    Malformed,
    #[error("invalid username or password")]
    Invalid,
}

#[derive(Debug, Clone)]
struct StoredUser {
    digest: [u8; 32],
    roles: Vec<Role>,
}

/// In-memory users with SHA-256 password digests.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, StoredUser>,
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

impl CredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `user`/`password` with USER, `admin`/`admin` with USER and ADMIN.
    #[must_use]
    pub fn demo() -> Self {
        Self::new()
            .with_user("user", "password", vec![Role::User])
            .with_user("admin", "admin", vec![Role::User, Role::Admin])
    }

    #[must_use]
    pub fn with_user(mut self, username: &str, password: &str, roles: Vec<Role>) -> Self {
        self.users.insert(
            username.to_owned(),
            StoredUser {
                digest: digest(password),
                roles,
            },
        );
        self
    }

    /// Verifies a username and password.
    ///
    /// # Errors
    ///
    /// [`CredentialError::Invalid`] for an unknown user or wrong password.
    pub fn verify(&self, username: &str, password: &str) -> Result<Principal, CredentialError> {
        let offered = digest(password);
        let Some(user) = self.users.get(username) else {
            // Keep the comparison cost independent of whether the user exists.
            let _ = offered[..].ct_eq(&[0u8; 32][..]);
            return Err(CredentialError::Invalid);
        };
        if bool::from(offered[..].ct_eq(&user.digest[..])) {
            Ok(Principal::new(username, user.roles.clone()))
        } else {
            Err(CredentialError::Invalid)
        }
    }

    /// Decodes an `Authorization: Basic ...` header and verifies it.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] describing why the header was refused.
    pub fn authenticate(&self, value: &HeaderValue) -> Result<Principal, CredentialError> {
        let value = value.to_str().map_err(|_| CredentialError::Malformed)?;
        let (scheme, encoded) = value.split_once(' ').ok_or(CredentialError::NotBasic)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(CredentialError::NotBasic);
        }
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CredentialError::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| CredentialError::Malformed)?;
        let (username, password) = decoded.split_once(':').ok_or(CredentialError::Malformed)?;
        self.verify(username, password)
    }
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Shared state of the [`require_access`] middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub enabled: bool,
    pub policy: AccessPolicy,
    pub credentials: CredentialStore,
}

impl AuthState {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            policy: AccessPolicy::standard(),
            credentials: CredentialStore::demo(),
        }
    }
}

/// Authenticates the caller and enforces the access policy.
///
/// On success the [`Principal`] is inserted as a request extension. With
/// security disabled every request passes and no principal is attached.
pub async fn require_access(
    State(auth): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    let principal = match req.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => match auth.credentials.authenticate(value) {
            Ok(principal) => Some(principal),
            Err(err) => {
                warn!(error = %err, "rejected credentials");
                return unauthorized();
            }
        },
    };

    let path = req.uri().path();
    match auth.policy.check(path, principal.as_ref()) {
        Ok(()) => {}
        Err(AccessDenied::Unauthenticated) => {
            debug!(path, "authentication required");
            return unauthorized();
        }
        Err(denied @ AccessDenied::Forbidden(_)) => {
            warn!(
                path,
                user = principal.as_ref().map_or("-", |p| p.username.as_str()),
                reason = %denied,
                "access denied"
            );
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    if let Some(principal) = principal {
        req.extensions_mut().insert(principal);
    }
    next.run(req).await
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(BASIC_CHALLENGE),
        )],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, password: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(format!("{user}:{password}"))))
            .unwrap()
    }

    fn user() -> Principal {
        Principal::new("user", vec![Role::User])
    }

    fn admin() -> Principal {
        Principal::new("admin", vec![Role::User, Role::Admin])
    }

    #[test]
    fn literal_segments_outrank_parameters() {
        let policy = AccessPolicy::standard();
        assert_eq!(policy.required("/api/users/test-error"), Access::Role(Role::Admin));
        assert_eq!(policy.required("/api/users/test-bad-request"), Access::Role(Role::Admin));
        assert_eq!(policy.required("/api/users/7"), Access::Role(Role::User));
    }

    #[test]
    fn unlisted_paths_need_authentication() {
        let policy = AccessPolicy::standard();
        assert_eq!(policy.required("/api/users/export/1"), Access::Authenticated);
        assert_eq!(policy.required("/nowhere"), Access::Authenticated);
        assert!(policy.authorize("/api/users/export/1", Some(&user())));
        assert!(!policy.authorize("/api/users/export/1", None));
    }

    #[test]
    fn public_and_role_checks() {
        let policy = AccessPolicy::standard();
        assert!(policy.authorize("/api/auth/public", None));
        assert!(policy.authorize("/health/ready", None));
        assert_eq!(
            policy.check("/api/auth/protected", None),
            Err(AccessDenied::Unauthenticated)
        );
        assert!(policy.authorize("/api/auth/protected", Some(&user())));
        assert_eq!(
            policy.check("/api/auth/admin", Some(&user())),
            Err(AccessDenied::Forbidden(Role::Admin))
        );
        assert!(policy.authorize("/api/auth/admin", Some(&admin())));
    }

    #[test]
    fn trailing_slash_matches() {
        let policy = AccessPolicy::standard();
        assert_eq!(policy.required("/api/users/"), Access::Role(Role::User));
    }

    #[test]
    fn demo_credentials() {
        let store = CredentialStore::demo();
        assert_eq!(store.authenticate(&basic("user", "password")).unwrap(), user());
        assert_eq!(store.authenticate(&basic("admin", "admin")).unwrap(), admin());
        assert_eq!(
            store.authenticate(&basic("user", "wrong")),
            Err(CredentialError::Invalid)
        );
        assert_eq!(
            store.authenticate(&basic("ghost", "password")),
            Err(CredentialError::Invalid)
        );
    }

    #[test]
    fn malformed_headers() {
        let store = CredentialStore::demo();
        assert_eq!(
            store.authenticate(&HeaderValue::from_static("Bearer abc")),
            Err(CredentialError::NotBasic)
        );
        assert_eq!(
            store.authenticate(&HeaderValue::from_static("Basic !!!")),
            Err(CredentialError::Malformed)
        );
        let no_colon = format!("Basic {}", STANDARD.encode("userpassword"));
        assert_eq!(
            store.authenticate(&HeaderValue::from_str(&no_colon).unwrap()),
            Err(CredentialError::Malformed)
        );
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let store = CredentialStore::demo();
        let header = format!("basic {}", STANDARD.encode("user:password"));
        assert!(store.authenticate(&HeaderValue::from_str(&header).unwrap()).is_ok());
    }
}
