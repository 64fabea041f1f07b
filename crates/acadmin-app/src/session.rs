// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::ids::UserId;
use crate::model::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub const ADMIN: &'static str = "admin";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.0.trim().eq_ignore_ascii_case(Self::ADMIN)
    }
}

/// What the login endpoints return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

/// Everything persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub tokens: TokenPair,
    pub role: Role,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { role: Role },
    ProfileLoaded(UserProfile),
    SignedOut,
}

pub trait SessionStore {
    fn load(&self) -> Result<Option<AuthSession>>;
    fn save(&self, session: &AuthSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// The signed-in user, shared with whatever needs tokens or the role.
pub struct SessionContext<S> {
    store: S,
    current: Option<AuthSession>,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl<S: SessionStore> SessionContext<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            current: None,
            subscribers: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Restores a saved session. Returns whether one was found.
    pub fn load(&mut self) -> Result<bool> {
        self.current = self.store.load().context("load saved session")?;
        if let Some(session) = &self.current {
            tracing::debug!(role = session.role.as_str(), "restored saved session");
        }
        Ok(self.current.is_some())
    }

    pub fn sign_in(&mut self, grant: AuthGrant) -> Result<()> {
        let session = AuthSession {
            tokens: grant.tokens,
            role: grant.role,
            profile: None,
        };
        self.store.save(&session).context("save session")?;
        tracing::info!(role = session.role.as_str(), "signed in");
        let role = session.role.clone();
        self.current = Some(session);
        self.notify(SessionEvent::SignedIn { role });
        Ok(())
    }

    pub fn set_profile(&mut self, profile: UserProfile) -> Result<()> {
        let Some(session) = self.current.as_mut() else {
            anyhow::bail!("no active session -- sign in with --login and retry");
        };
        session.role = profile.role.clone();
        session.profile = Some(profile.clone());
        self.store.save(session).context("save session")?;
        self.notify(SessionEvent::ProfileLoaded(profile));
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.clear().context("remove saved session")?;
        if self.current.take().is_some() {
            tracing::info!("signed out");
        }
        self.notify(SessionEvent::SignedOut);
        Ok(())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.current
            .as_ref()
            .map(|session| session.tokens.access_token.as_str())
    }

    pub fn role(&self) -> Option<&Role> {
        self.current.as_ref().map(|session| &session.role)
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.current.as_ref().and_then(|session| session.profile.as_ref())
    }

    pub fn is_admin(&self) -> bool {
        self.role().is_some_and(Role::is_admin)
    }

    pub fn can_open(&self, kind: EntityKind) -> bool {
        !kind.requires_admin() || self.is_admin()
    }

    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthGrant, AuthSession, Role, SessionContext, SessionEvent, SessionStore, TokenPair, UserProfile};
    use crate::{EntityKind, UserId};
    use anyhow::Result;
    use std::cell::RefCell;

    #[derive(Default)]
    struct CellStore(RefCell<Option<AuthSession>>);

    impl SessionStore for CellStore {
        fn load(&self) -> Result<Option<AuthSession>> {
            Ok(self.0.borrow().clone())
        }

        fn save(&self, session: &AuthSession) -> Result<()> {
            *self.0.borrow_mut() = Some(session.clone());
            Ok(())
        }

        fn clear(&self) -> Result<()> {
            *self.0.borrow_mut() = None;
            Ok(())
        }
    }

    fn grant(role: &str) -> AuthGrant {
        AuthGrant {
            tokens: TokenPair {
                access_token: "access".to_owned(),
                refresh_token: "refresh".to_owned(),
            },
            role: Role::new(role),
        }
    }

    #[test]
    fn role_check_ignores_case() {
        assert!(Role::new("Admin").is_admin());
        assert!(!Role::new("student").is_admin());
    }

    #[test]
    fn grant_decodes_flat_login_payload() -> Result<()> {
        let grant: AuthGrant = serde_json::from_str(
            r#"{"accessToken":"a","refreshToken":"r","role":"admin"}"#,
        )?;
        assert_eq!(grant.tokens.access_token, "a");
        assert!(grant.role.is_admin());
        Ok(())
    }

    #[test]
    fn sign_in_persists_and_notifies() -> Result<()> {
        let mut context = SessionContext::new(CellStore::default());
        let events = context.subscribe();
        context.sign_in(grant("admin"))?;

        assert_eq!(context.access_token(), Some("access"));
        assert!(context.store().load()?.is_some());
        assert_eq!(
            events.try_recv()?,
            SessionEvent::SignedIn {
                role: Role::new("admin")
            }
        );
        Ok(())
    }

    #[test]
    fn load_restores_saved_session() -> Result<()> {
        let mut first = SessionContext::new(CellStore::default());
        first.sign_in(grant("student"))?;
        let saved = first.store().load()?;

        let store = CellStore(RefCell::new(saved));
        let mut second = SessionContext::new(store);
        assert!(second.load()?);
        assert_eq!(second.role().map(Role::as_str), Some("student"));
        Ok(())
    }

    #[test]
    fn non_admins_only_open_the_student_directory() -> Result<()> {
        let mut context = SessionContext::new(CellStore::default());
        assert!(context.can_open(EntityKind::Students));
        assert!(!context.can_open(EntityKind::Majors));
        context.sign_in(grant("student"))?;
        assert!(context.can_open(EntityKind::Students));
        assert!(!context.can_open(EntityKind::Majors));

        context.sign_in(grant("admin"))?;
        assert!(EntityKind::ALL.into_iter().all(|kind| context.can_open(kind)));
        Ok(())
    }

    #[test]
    fn profile_updates_role_and_clear_signs_out() -> Result<()> {
        let mut context = SessionContext::new(CellStore::default());
        assert!(
            context
                .set_profile(UserProfile {
                    id: UserId::new("u-1"),
                    email: "a@example.com".to_owned(),
                    full_name: None,
                    role: Role::new("admin"),
                })
                .is_err()
        );

        context.sign_in(grant("student"))?;
        let events = context.subscribe();
        context.set_profile(UserProfile {
            id: UserId::new("u-1"),
            email: "a@example.com".to_owned(),
            full_name: Some("Avery".to_owned()),
            role: Role::new("admin"),
        })?;
        assert!(context.is_admin());
        assert_eq!(context.profile().map(UserProfile::display_name), Some("Avery"));

        context.clear()?;
        assert!(!context.is_signed_in());
        assert!(context.store().load()?.is_none());
        assert!(matches!(events.try_recv()?, SessionEvent::ProfileLoaded(_)));
        assert_eq!(events.try_recv()?, SessionEvent::SignedOut);
        Ok(())
    }
}
