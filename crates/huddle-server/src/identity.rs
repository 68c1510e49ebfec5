//! Credential extraction and identity resolution.

use axum_extra::extract::cookie::CookieJar;
use huddle_core::arena::User;
use huddle_core::errors::StateError;
use huddle_core::services::IdentityResolver;

/// Credential presented by a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
    /// Login session ID.
    Session(String),
    /// Guest user ID.
    Guest(String),
    /// Neither cookie was present.
    Missing,
}

impl Credential {
    /// Read the credential from request cookies.
    ///
    /// A non-empty session cookie takes precedence; the guest cookie is used
    /// only when no session cookie is present.
    pub fn from_jar(jar: &CookieJar, session_cookie: &str, guest_cookie: &str) -> Self {
        let value = |name: &str| {
            jar.get(name)
                .map(|c| c.value().to_owned())
                .filter(|v| !v.is_empty())
        };
        if let Some(session_id) = value(session_cookie) {
            Self::Session(session_id)
        } else if let Some(user_id) = value(guest_cookie) {
            Self::Guest(user_id)
        } else {
            Self::Missing
        }
    }
}

/// Resolve `credential` to a user. Any failure is [`StateError::Unauthorized`].
pub async fn resolve(resolver: &dyn IdentityResolver, credential: &Credential) -> Result<User, StateError> {
    let result = match credential {
        Credential::Session(session_id) => resolver.resolve_session(session_id).await,
        Credential::Guest(user_id) => resolver.resolve_guest(user_id).await,
        Credential::Missing => return Err(StateError::Unauthorized),
    };
    result.map_err(|e| {
        tracing::debug!(error = %e, "credential rejected");
        StateError::Unauthorized
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockIdentity;
    use assert_matches::assert_matches;
    use axum_extra::extract::cookie::Cookie;
    use huddle_core::arena::UserKind;

    fn jar(cookies: &[(&'static str, &'static str)]) -> CookieJar {
        cookies
            .iter()
            .fold(CookieJar::new(), |jar, (name, value)| jar.add(Cookie::new(*name, *value)))
    }

    fn user(id: &str, kind: UserKind) -> User {
        User {
            id: id.into(),
            name: id.to_owned(),
            kind,
        }
    }

    #[test]
    fn session_cookie_wins() {
        let jar = jar(&[("session_id", "s1"), ("user_id", "g1")]);
        assert_eq!(
            Credential::from_jar(&jar, "session_id", "user_id"),
            Credential::Session("s1".into())
        );
    }

    #[test]
    fn guest_cookie_when_no_session() {
        let jar = jar(&[("user_id", "g1")]);
        assert_eq!(
            Credential::from_jar(&jar, "session_id", "user_id"),
            Credential::Guest("g1".into())
        );
    }

    #[test]
    fn empty_cookie_counts_as_missing() {
        let jar = jar(&[("session_id", ""), ("user_id", "")]);
        assert_eq!(Credential::from_jar(&jar, "session_id", "user_id"), Credential::Missing);
        assert_eq!(
            Credential::from_jar(&CookieJar::new(), "session_id", "user_id"),
            Credential::Missing
        );
    }

    #[tokio::test]
    async fn resolves_session() {
        let mut identity = MockIdentity::new();
        let _ = identity
            .expect_resolve_session()
            .withf(|id| id == "s1")
            .returning(|_| Ok(user("u1", UserKind::Registered)));

        let resolved = resolve(&identity, &Credential::Session("s1".into())).await.unwrap();
        assert_eq!(resolved.id.as_str(), "u1");
    }

    #[tokio::test]
    async fn resolver_errors_become_unauthorized() {
        let mut identity = MockIdentity::new();
        let _ = identity
            .expect_resolve_guest()
            .returning(|_| Err(StateError::Internal("db down".into())));

        let result = resolve(&identity, &Credential::Guest("g1".into())).await;
        assert_matches!(result, Err(StateError::Unauthorized));
    }

    #[tokio::test]
    async fn missing_credential_is_unauthorized() {
        let identity = MockIdentity::new();
        assert_matches!(
            resolve(&identity, &Credential::Missing).await,
            Err(StateError::Unauthorized)
        );
    }
}
