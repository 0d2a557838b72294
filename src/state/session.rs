use super::fetch::{lock, TaskScope};
use crate::account::AccountStore;
use crate::context::AppContext;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info};

/// A navigation destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Splash,
    Welcome,
    Login,
    Register,
    Home,
    Explore,
    Favorites,
    Account,
    RecipeDetail(i64),
    RecipeWheel,
}

impl Route {
    /// Routes that need a signed-in user.
    pub fn requires_login(self) -> bool {
        matches!(self, Route::Account | Route::Favorites)
    }
}

/// Decides which route is actually shown.
///
/// Asking for a protected route while signed out lands on `Login` and
/// remembers the destination for [`after_login`](SessionGate::after_login).
/// Signing out while on a protected route does the same.
pub struct SessionGate {
    account: Arc<AccountStore>,
    current: Arc<watch::Sender<Route>>,
    intended: Arc<Mutex<Option<Route>>>,
    _listener: TaskScope,
}

impl SessionGate {
    pub fn new(ctx: &AppContext) -> Self {
        let account = ctx.account();
        let (current, _) = watch::channel(Route::Splash);
        let current = Arc::new(current);
        let intended = Arc::new(Mutex::new(None));

        let listener = ctx.task_scope();
        let mut session = account.subscribe_session();
        let route = Arc::clone(&current);
        let remembered = Arc::clone(&intended);
        listener.spawn(async move {
            while session.changed().await.is_ok() {
                let logged_in = *session.borrow_and_update();
                info!(logged_in, "session changed");
                if logged_in {
                    continue;
                }
                let shown = *route.borrow();
                if shown.requires_login() {
                    *lock(&remembered) = Some(shown);
                    route.send_replace(Route::Login);
                }
            }
        });

        SessionGate {
            account,
            current,
            intended,
            _listener: listener,
        }
    }

    /// Navigates to `route`, or to `Login` if it is protected and nobody is
    /// signed in. Returns the route actually shown.
    pub fn navigate(&self, route: Route) -> Route {
        let shown = if route.requires_login() && !self.account.is_logged_in() {
            debug!(?route, "protected route, redirecting to login");
            *lock(&self.intended) = Some(route);
            Route::Login
        } else {
            route
        };
        self.current.send_replace(shown);
        shown
    }

    /// Where to go once login succeeds: the remembered destination, or
    /// `Home`.
    pub fn after_login(&self) -> Route {
        let target = lock(&self.intended).take().unwrap_or(Route::Home);
        self.navigate(target)
    }

    pub fn is_logged_in(&self) -> bool {
        self.account.is_logged_in()
    }

    pub fn current(&self) -> Route {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.current.subscribe()
    }
}
