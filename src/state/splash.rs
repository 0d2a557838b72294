use super::session::Route;
use crate::account::AccountStore;
use crate::context::AppContext;
use crate::prefs::{Preferences, PrefsError};
use std::sync::Arc;
use tracing::warn;

/// Chooses where the app goes after the splash screen.
pub struct SplashScreen {
    preferences: Preferences,
    account: Arc<AccountStore>,
}

impl SplashScreen {
    pub fn new(ctx: &AppContext) -> Self {
        SplashScreen {
            preferences: ctx.preferences().clone(),
            account: ctx.account(),
        }
    }

    /// `true` until [`finish_welcome`](Self::finish_welcome) has been
    /// called on this device. An unreadable preferences file counts as a
    /// first launch.
    pub fn is_first_launch(&self) -> bool {
        match self.preferences.first_launch_seen() {
            Ok(seen) => !seen,
            Err(e) => {
                warn!(error = %e, "preferences unreadable, showing welcome");
                true
            }
        }
    }

    pub fn finish_welcome(&self) -> Result<(), PrefsError> {
        self.preferences.mark_first_launch_seen()
    }

    /// The welcome flow on first launch, then home for signed-in users and
    /// login for everyone else.
    pub fn next_route(&self) -> Route {
        if self.is_first_launch() {
            Route::Welcome
        } else if self.account.is_logged_in() {
            Route::Home
        } else {
            Route::Login
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::testing::{FakeQa, FakeSource};
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::TempDir;
    use tokio::runtime::Handle;

    fn context_in(dir: &TempDir) -> AppContext {
        let config = AppConfig {
            preferences_path: Utf8PathBuf::from_path_buf(dir.path().join("prefs.json")).unwrap(),
            ..Default::default()
        };
        AppContext::from_parts(
            config,
            Arc::new(FakeSource::default()),
            Arc::new(FakeQa::answering("ok")),
            Arc::new(AccountStore::in_memory()),
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn test_first_launch_then_login_then_home() {
        let dir = TempDir::new().unwrap();
        let ctx = context_in(&dir);
        let splash = SplashScreen::new(&ctx);
        assert!(splash.is_first_launch());
        assert_eq!(splash.next_route(), Route::Welcome);

        splash.finish_welcome().unwrap();
        assert_eq!(splash.next_route(), Route::Login);

        ctx.account()
            .sign_up("cook", "cook@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(SplashScreen::new(&ctx).next_route(), Route::Home);
    }

    #[tokio::test]
    async fn test_corrupt_preferences_show_welcome() {
        let dir = TempDir::new().unwrap();
        let ctx = context_in(&dir);
        fs::write(ctx.preferences().path(), "][").unwrap();
        assert!(SplashScreen::new(&ctx).is_first_launch());
    }
}
