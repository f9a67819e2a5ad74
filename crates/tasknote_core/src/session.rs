//! Authenticated session context.
//!
//! # Responsibility
//! - Track the signed-in user reported by an [`AuthStateSource`].
//! - Turn raw auth events into de-duplicated session transitions.
//!
//! # Invariants
//! - The context is an explicit value owned by the workspace service;
//!   there is no process-wide session.
//! - After `teardown` no further events are consumed.

use log::info;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(User),
    SignedOut,
}

/// Source of authentication state (hosted auth client).
pub trait AuthStateSource {
    /// User of the restored session, if any.
    fn current_user(&self) -> Option<User>;
    /// Events since the previous call, oldest first.
    fn poll_events(&mut self) -> Vec<AuthEvent>;
    /// Stops delivering events.
    fn unsubscribe(&mut self) {}
}

#[derive(Debug, Default)]
struct ManualAuthState {
    user: Option<User>,
    events: VecDeque<AuthEvent>,
    subscribed: bool,
}

/// Scriptable auth source. Clones share state.
#[derive(Debug, Clone)]
pub struct ManualAuthSource {
    state: Rc<RefCell<ManualAuthState>>,
}

impl Default for ManualAuthSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualAuthSource {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ManualAuthState {
                subscribed: true,
                ..ManualAuthState::default()
            })),
        }
    }

    /// Starts with a restored session and no pending events.
    pub fn signed_in(user: User) -> Self {
        let source = Self::new();
        source.state.borrow_mut().user = Some(user);
        source
    }

    pub fn sign_in(&self, user: User) {
        let mut state = self.state.borrow_mut();
        state.user = Some(user.clone());
        if state.subscribed {
            state.events.push_back(AuthEvent::SignedIn(user));
        }
    }

    pub fn sign_out(&self) {
        let mut state = self.state.borrow_mut();
        state.user = None;
        if state.subscribed {
            state.events.push_back(AuthEvent::SignedOut);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.borrow().subscribed
    }
}

impl AuthStateSource for ManualAuthSource {
    fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    fn poll_events(&mut self) -> Vec<AuthEvent> {
        self.state.borrow_mut().events.drain(..).collect()
    }

    fn unsubscribe(&mut self) {
        let mut state = self.state.borrow_mut();
        state.subscribed = false;
        state.events.clear();
    }
}

/// Session transition observed by [`SessionContext::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    SignedIn(User),
    SignedOut,
}

pub struct SessionContext {
    source: Box<dyn AuthStateSource>,
    user: Option<User>,
    active: bool,
}

impl SessionContext {
    pub fn new(source: Box<dyn AuthStateSource>) -> Self {
        Self {
            source,
            user: None,
            active: false,
        }
    }

    /// Reads the restored session. Returns the signed-in user, if any.
    pub fn init(&mut self) -> Option<&User> {
        self.active = true;
        self.user = self.source.current_user();
        info!(
            "event=session_init module=session status=ok signed_in={}",
            self.user.is_some()
        );
        self.user.as_ref()
    }

    /// Consumes pending auth events. Repeated sign-ins of the current user
    /// and sign-outs while signed out are dropped.
    pub fn poll(&mut self) -> Vec<SessionChange> {
        if !self.active {
            return Vec::new();
        }
        let mut changes = Vec::new();
        for event in self.source.poll_events() {
            match event {
                AuthEvent::SignedIn(user) => {
                    if self.user.as_ref() == Some(&user) {
                        continue;
                    }
                    info!("event=session_change module=session status=signed_in");
                    self.user = Some(user.clone());
                    changes.push(SessionChange::SignedIn(user));
                }
                AuthEvent::SignedOut => {
                    if self.user.take().is_some() {
                        info!("event=session_change module=session status=signed_out");
                        changes.push(SessionChange::SignedOut);
                    }
                }
            }
        }
        changes
    }

    /// Unsubscribes from the source. The last known user stays readable.
    pub fn teardown(&mut self) {
        if self.active {
            self.source.unsubscribe();
            self.active = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{ManualAuthSource, SessionChange, SessionContext, User};

    #[test]
    fn init_reads_restored_session() {
        let source = ManualAuthSource::signed_in(User::new("u1"));
        let mut session = SessionContext::new(Box::new(source));
        assert!(session.current_user().is_none());
        assert_eq!(session.init().map(|user| user.id.as_str()), Some("u1"));
        assert!(session.poll().is_empty());
    }

    #[test]
    fn poll_deduplicates_transitions() {
        let source = ManualAuthSource::new();
        let mut session = SessionContext::new(Box::new(source.clone()));
        session.init();

        source.sign_out();
        source.sign_in(User::new("u1"));
        source.sign_in(User::new("u1"));
        assert_eq!(
            session.poll(),
            vec![SessionChange::SignedIn(User::new("u1"))]
        );
        source.sign_out();
        assert_eq!(session.poll(), vec![SessionChange::SignedOut]);
        assert_eq!(session.user_id(), None);
    }

    #[test]
    fn teardown_stops_consuming_events() {
        let source = ManualAuthSource::new();
        let mut session = SessionContext::new(Box::new(source.clone()));
        session.init();
        session.teardown();
        assert!(!source.is_subscribed());
        source.sign_in(User::new("u2"));
        assert!(session.poll().is_empty());
        assert!(!session.is_active());
    }
}
