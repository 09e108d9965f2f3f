use serenity::all::{FullEvent, HttpError};
use std::fmt;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, crate::bot::Data, Error>;
pub type Result<T> = std::result::Result<T, Error>;

/// Discord JSON error code for "Unknown interaction": the interaction token
/// expired before the bot answered.
pub const UNKNOWN_INTERACTION: isize = 10062;

#[derive(Debug)]
pub struct BotError {
    message: String,
}

impl BotError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BotError {}

pub fn bot_error(message: impl Into<String>) -> Error {
    Box::new(BotError::new(message))
}

/// Where an error surfaced; decides whether a stale interaction is noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Interaction,
    Event,
    Command,
}

impl ErrorSource {
    pub fn of_event(event: &FullEvent) -> Self {
        match event {
            FullEvent::InteractionCreate { .. } => ErrorSource::Interaction,
            _ => ErrorSource::Event,
        }
    }
}

pub fn is_stale_interaction_response(status: u16, code: isize) -> bool {
    status == 404 && code == UNKNOWN_INTERACTION
}

pub fn is_stale_interaction(error: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
    match error.downcast_ref::<serenity::Error>() {
        Some(serenity::Error::Http(HttpError::UnsuccessfulRequest(response))) => {
            is_stale_interaction_response(response.status_code.as_u16(), response.error.code)
        }
        _ => false,
    }
}

/// Stale interactions are dropped on the interaction and command paths only.
pub fn is_suppressed(
    source: ErrorSource,
    error: &(dyn std::error::Error + Send + Sync + 'static),
) -> bool {
    match source {
        ErrorSource::Interaction | ErrorSource::Command => is_stale_interaction(error),
        ErrorSource::Event => false,
    }
}

pub fn report_event_error(event: &FullEvent, extension: Option<&str>, error: &Error) {
    if is_suppressed(ErrorSource::of_event(event), error.as_ref()) {
        return;
    }

    tracing::error!(
        event = event.snake_case_name(),
        extension = ?extension,
        error = %error,
        "Event handler error"
    );
}

#[tracing::instrument]
pub async fn handle_error(error: poise::FrameworkError<'_, crate::bot::Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            if is_suppressed(ErrorSource::Command, error.as_ref()) {
                return;
            }

            tracing::error!(
                command = %ctx.command().name,
                user_id = %ctx.author().id,
                guild_id = ?ctx.guild_id(),
                channel_id = %ctx.channel_id(),
                error = %error,
                "Command execution error"
            );

            let response = "An error occurred while processing your command.";
            if let Err(e) = ctx.say(response).await {
                tracing::error!(error = %e, "Failed to send error message");
            }
        }
        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
            tracing::warn!(
                command = %ctx.command().name,
                user_id = %ctx.author().id,
                error = %error,
                "Argument parse error"
            );
        }
        poise::FrameworkError::Setup { error, .. } => {
            tracing::error!(error = %error, "Framework setup error");
        }
        other => {
            tracing::warn!(error = ?other, "Unhandled framework error");
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!(error = %e, "Error in error handler");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serenity::http::ErrorResponse;

    /// The error serenity produces when Discord rejects a request.
    pub(crate) async fn platform_error(status: u16, code: isize) -> Error {
        let body = format!(r#"{{"code":{code},"message":"Unknown interaction"}}"#);
        let response = http::Response::builder()
            .status(status)
            .body(body)
            .expect("valid response");
        let response =
            ErrorResponse::from_response(reqwest::Response::from(response), reqwest::Method::POST)
                .await;

        Box::new(serenity::Error::Http(HttpError::UnsuccessfulRequest(
            response,
        )))
    }

    #[tokio::test]
    async fn expired_interaction_is_dropped_on_interaction_and_command_paths() {
        let error = platform_error(404, UNKNOWN_INTERACTION).await;

        assert!(is_stale_interaction(error.as_ref()));
        assert!(is_suppressed(ErrorSource::Interaction, error.as_ref()));
        assert!(is_suppressed(ErrorSource::Command, error.as_ref()));
    }

    #[tokio::test]
    async fn expired_interaction_still_logs_on_other_events() {
        let error = platform_error(404, UNKNOWN_INTERACTION).await;
        assert!(!is_suppressed(ErrorSource::Event, error.as_ref()));
    }

    #[tokio::test]
    async fn other_not_found_errors_are_reported() {
        let unknown_message = platform_error(404, 10008).await;
        assert!(!is_suppressed(ErrorSource::Interaction, unknown_message.as_ref()));
        assert!(!is_suppressed(ErrorSource::Command, unknown_message.as_ref()));

        let server_error = platform_error(500, UNKNOWN_INTERACTION).await;
        assert!(!is_suppressed(ErrorSource::Interaction, server_error.as_ref()));
    }

    #[test]
    fn unknown_interaction_is_stale() {
        assert!(is_stale_interaction_response(404, UNKNOWN_INTERACTION));
    }

    #[test]
    fn other_not_found_codes_are_not_stale() {
        assert!(!is_stale_interaction_response(404, 10008));
        assert!(!is_stale_interaction_response(404, 10003));
    }

    #[test]
    fn stale_code_needs_not_found_status() {
        assert!(!is_stale_interaction_response(400, UNKNOWN_INTERACTION));
        assert!(!is_stale_interaction_response(500, UNKNOWN_INTERACTION));
    }

    #[test]
    fn non_platform_errors_are_never_suppressed() {
        let error = bot_error("Unknown interaction");
        assert!(!is_suppressed(ErrorSource::Interaction, error.as_ref()));
        assert!(!is_suppressed(ErrorSource::Command, error.as_ref()));
        assert!(!is_suppressed(ErrorSource::Event, error.as_ref()));
    }

    #[test]
    fn non_http_platform_errors_are_not_stale() {
        let error: Error = Box::new(serenity::Error::Other("gateway closed"));
        assert!(!is_stale_interaction(error.as_ref()));
    }

    #[test]
    fn bot_error_displays_message() {
        assert_eq!(bot_error("nope").to_string(), "nope");
    }
}
