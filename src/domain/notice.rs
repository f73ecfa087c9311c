use std::fmt;
use std::time::{Duration, Instant};

/// How long an error stays on screen before it clears itself.
pub const ERROR_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMessage {
    UnableToLoad,
    TitleShouldNotBeEmpty,
    UnableToAdd,
    UnableToDelete,
    UnableToUpdate,
}

impl ErrorMessage {
    pub fn text(self) -> &'static str {
        match self {
            ErrorMessage::UnableToLoad => "Unable to load todos",
            ErrorMessage::TitleShouldNotBeEmpty => "Title should not be empty",
            ErrorMessage::UnableToAdd => "Unable to add a todo",
            ErrorMessage::UnableToDelete => "Unable to delete a todo",
            ErrorMessage::UnableToUpdate => "Unable to update a todo",
        }
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// The error banner. Each raise restarts the timer, so an older deadline
/// never hides a newer message.
#[derive(Debug, Default)]
pub struct ErrorBanner {
    current: Option<(ErrorMessage, Instant)>,
}

impl ErrorBanner {
    pub fn raise(&mut self, message: ErrorMessage, now: Instant) {
        self.current = Some((message, now + ERROR_TTL));
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    pub fn message(&self) -> Option<ErrorMessage> {
        self.current.map(|(m, _)| m)
    }

    /// Clears the banner once its deadline has passed.
    pub fn expire(&mut self, now: Instant) {
        if let Some((_, deadline)) = self.current
            && now >= deadline
        {
            self.current = None;
        }
    }
}
