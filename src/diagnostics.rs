//! Injected logging collaborator.
//!
//! The pipeline never installs a global subscriber. Instead a
//! [`Diagnostics`] value is handed to the pipeline and every worker thread
//! runs its body with that dispatcher as its thread-local default.

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// A `tracing` dispatcher shared by all stage workers
#[derive(Clone, Debug)]
pub struct Diagnostics {
    dispatch: Dispatch,
}

impl Diagnostics {
    /// Diagnostics that discard every event
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Human-readable output on stdout, filtered by `RUST_LOG` or
    /// `default_directive` when the variable is unset or invalid
    pub fn from_env(default_directive: &str) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .finish();
        Self::from_dispatch(Dispatch::new(subscriber))
    }

    /// Wrap an already configured dispatcher
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Run `f` with this dispatcher as the current thread's default
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::disabled()
    }
}
