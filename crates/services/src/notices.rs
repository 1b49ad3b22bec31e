use crate::error::UserError;

/// Transient, dismissable messages: at most one success/info line and one error.
///
/// A new message of either kind replaces the previous one of that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notices {
    success: Option<String>,
    error: Option<UserError>,
}

impl Notices {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.success = Some(message.into());
    }

    pub fn error(&mut self, error: UserError) {
        self.error = Some(error);
    }

    pub fn dismiss_success(&mut self) {
        self.success = None;
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    #[must_use]
    pub fn current_success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    #[must_use]
    pub fn current_error(&self) -> Option<&UserError> {
        self.error.as_ref()
    }
}
