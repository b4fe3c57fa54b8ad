//! Client routes and the session guard.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// A screen of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Personalized feed and composer.
    Home,
    /// User directory with follow buttons.
    AllUsers,
    /// The signed-in user's own profile.
    Profile,
    Login,
    Signup,
}

impl Route {
    /// Every route, in menu order.
    pub const ALL: [Self; 5] = [
        Self::Home,
        Self::AllUsers,
        Self::Profile,
        Self::Login,
        Self::Signup,
    ];

    /// Parse a route from its path.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    /// The path this route is served under.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::AllUsers => "/allUsers",
            Self::Profile => "/profile",
            Self::Login => "/login",
            Self::Signup => "/signup",
        }
    }

    /// Whether the route may only be shown with a session.
    #[must_use]
    pub const fn requires_session(self) -> bool {
        matches!(self, Self::Home | Self::AllUsers | Self::Profile)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Current route, observable.
#[derive(Clone)]
pub struct Navigator {
    current: Arc<watch::Sender<Route>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Login)
    }
}

impl Navigator {
    /// Start at `initial`.
    #[must_use]
    pub fn new(initial: Route) -> Self {
        let (current, _) = watch::channel(initial);
        Self {
            current: Arc::new(current),
        }
    }

    /// Switch to `route`.
    pub fn navigate(&self, route: Route) {
        let previous = self.current.send_replace(route);
        if previous != route {
            tracing::debug!(from = %previous, to = %route, "Navigated");
        }
    }

    /// Try to switch to `route`, redirecting signed-out users to login.
    ///
    /// Returns the route actually shown.
    pub fn guard(&self, route: Route, signed_in: bool) -> Route {
        let effective = if route.requires_session() && !signed_in {
            Route::Login
        } else {
            route
        };
        self.navigate(effective);
        effective
    }

    /// The route currently shown.
    #[must_use]
    pub fn current(&self) -> Route {
        *self.current.borrow()
    }

    /// Receive every future route change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Route> {
        self.current.subscribe()
    }
}
