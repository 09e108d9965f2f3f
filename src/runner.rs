use serenity::all::HttpError;
use std::{fmt, future::Future, time::Duration};
use tokio::sync::watch;

/// Why a gateway run ended without a clean disconnect.
#[derive(Debug)]
pub enum GatewayFailure {
    /// The platform answered an HTTP request with an error status.
    Http { status: u16 },
    Unexpected(crate::error::Error),
}

impl fmt::Display for GatewayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayFailure::Http { status } => write!(f, "HTTP error {status}"),
            GatewayFailure::Unexpected(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for GatewayFailure {}

impl From<serenity::Error> for GatewayFailure {
    fn from(error: serenity::Error) -> Self {
        match error {
            serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => GatewayFailure::Http {
                status: response.status_code.as_u16(),
            },
            other => GatewayFailure::Unexpected(Box::new(other)),
        }
    }
}

impl From<anyhow::Error> for GatewayFailure {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<serenity::Error>() {
            Ok(error) => error.into(),
            Err(error) => GatewayFailure::Unexpected(error.into()),
        }
    }
}

/// Process-wide stop request. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct Shutdown {
    requested: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn request(&self) {
        self.sender.send_replace(true);
    }
}

impl Shutdown {
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (sender, requested) = watch::channel(false);
        (ShutdownTrigger { sender }, Shutdown { requested })
    }

    /// Installs the only Ctrl-C listener of the process. The first Ctrl-C
    /// requests a graceful stop; a second one exits immediately.
    pub fn on_ctrl_c() -> Shutdown {
        let (trigger, shutdown) = Shutdown::channel();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("Could not listen for Ctrl-C");
                return;
            }
            tracing::info!("Shutdown requested");
            trigger.request();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Second Ctrl-C, exiting now");
                std::process::exit(130);
            }
        });
        shutdown
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.borrow()
    }

    /// Resolves once a stop was requested. Never resolves if the trigger is
    /// dropped without requesting one.
    pub async fn requested(&mut self) {
        if self.requested.wait_for(|&requested| requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Calls `connect` until it returns `Ok` or a shutdown is requested, sleeping
/// `delay` after every failure. There is no attempt limit and the delay never
/// grows.
pub async fn run_with_retry<F, Fut>(mut connect: F, delay: Duration, mut shutdown: Shutdown)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), GatewayFailure>>,
{
    loop {
        if shutdown.is_requested() {
            tracing::info!("Shutdown requested, leaving run loop");
            return;
        }

        match connect().await {
            Ok(()) => {
                tracing::info!("Disconnected cleanly, leaving run loop");
                return;
            }
            Err(GatewayFailure::Http { status }) => {
                tracing::warn!(
                    status,
                    "HTTP error {status}, retrying in {} seconds...",
                    delay.as_secs()
                );
            }
            Err(GatewayFailure::Unexpected(error)) => {
                tracing::error!(error = %error, "Unexpected error: {error}");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.requested() => {
                tracing::info!("Shutdown requested during backoff, leaving run loop");
                return;
            }
        }
    }
}
