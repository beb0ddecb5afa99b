//! Auth session flag and the listener that reacts to its transitions.
//!
//! The session flag is owned by the auth layer ([`AuthSession`]); the cart
//! only ever reads it through a [`SessionWatch`]. [`follow_session`] turns
//! flag changes into cart lifecycle calls:
//!
//! - inactive → active: merge-on-login, exactly once per transition
//! - active → inactive: discard the authenticated mirror

use tokio::sync::watch;
use tracing::{debug, info};

use crate::container::CartContainer;

/// Writable side of the session flag, held by the auth layer.
#[derive(Debug)]
pub struct AuthSession {
    tx: watch::Sender<bool>,
}

impl AuthSession {
    /// Create a session flag with an initial state.
    #[must_use]
    pub fn new(active: bool) -> Self {
        let (tx, _rx) = watch::channel(active);
        Self { tx }
    }

    /// Whether a server session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.tx.borrow()
    }

    /// Mark the session as authenticated (login or registration).
    pub fn sign_in(&self) {
        self.tx.send_replace(true);
    }

    /// Mark the session as ended.
    pub fn sign_out(&self) {
        self.tx.send_replace(false);
    }

    /// Read-only view of the flag.
    #[must_use]
    pub fn watch(&self) -> SessionWatch {
        SessionWatch {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Read-only view of the session flag.
#[derive(Debug, Clone)]
pub struct SessionWatch {
    rx: watch::Receiver<bool>,
}

impl SessionWatch {
    /// Whether a server session is active right now.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.rx.borrow()
    }

    /// A flag that never changes, for hosts without an auth layer.
    #[must_use]
    pub fn fixed(active: bool) -> Self {
        let (_tx, rx) = watch::channel(active);
        Self { rx }
    }
}

/// Drive cart lifecycle from session transitions until the session is dropped.
///
/// Rapid flips that the watch channel coalesces are judged by their net
/// effect: a sign-in followed by a sign-out before the listener wakes up is
/// no transition at all.
pub async fn follow_session(cart: CartContainer, session: SessionWatch) {
    let mut rx = session.rx;
    let mut last = *rx.borrow_and_update();

    while rx.changed().await.is_ok() {
        let now = *rx.borrow_and_update();
        if now == last {
            debug!(active = now, "Session flag unchanged");
            continue;
        }
        last = now;

        if now {
            info!("Session became active, merging anonymous cart");
            cart.handle_login().await;
        } else {
            info!("Session ended, discarding authenticated cart");
            cart.handle_logout().await;
        }
    }

    debug!("Session closed, listener stopping");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let session = AuthSession::default();
        let watch = session.watch();
        assert!(!watch.is_active());

        session.sign_in();
        assert!(session.is_active());
        assert!(watch.is_active());

        session.sign_out();
        assert!(!watch.is_active());
    }

    #[test]
    fn test_fixed_watch() {
        assert!(SessionWatch::fixed(true).is_active());
        assert!(!SessionWatch::fixed(false).is_active());
    }
}
