//! Failure-kind classification (spec.md §7 error taxonomy), remapped from
//! the teacher's `crawl_types::FailureKind` (Network/Browser/ContentExtraction/
//! RateLimited/Unknown) onto the spec's own names.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection reset, DNS failure, TLS handshake timeout.
    NetworkTransient,
    /// HTTP status in the configured blocked set, or response content
    /// matches an anti-bot signature.
    Blocked,
    /// Navigation exceeded its deadline.
    NavigationTimeout,
    /// User `requestHandler` raised an error.
    HandlerError,
    /// Response content-type is not one the handler supports.
    ContentTypeUnsupported,
    /// Invalid configuration or missing required collaborator.
    ConfigurationError,
    /// Storage backend refused a read or write.
    StorageError,
}

impl FailureKind {
    /// Classifies an opaque error by message content, the fallback used
    /// when a handler returns a plain [`anyhow::Error`] instead of
    /// signalling its failure kind directly.
    #[must_use]
    pub fn classify(error: &anyhow::Error) -> Self {
        let msg = error.to_string().to_lowercase();

        if msg.contains("429") || msg.contains("blocked") || msg.contains("captcha") {
            return Self::Blocked;
        }
        if msg.contains("navigation") && msg.contains("timeout") {
            return Self::NavigationTimeout;
        }
        if msg.contains("timeout")
            || msg.contains("timed out")
            || msg.contains("connection reset")
            || msg.contains("connection refused")
            || msg.contains("dns")
            || msg.contains("unreachable")
        {
            return Self::NetworkTransient;
        }
        if msg.contains("content-type") || msg.contains("unsupported") {
            return Self::ContentTypeUnsupported;
        }
        if msg.contains("config") || msg.contains("missing required") {
            return Self::ConfigurationError;
        }
        if msg.contains("storage") {
            return Self::StorageError;
        }
        Self::HandlerError
    }

    /// Whether this failure kind is retried by default, per spec.md §7.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTransient | Self::Blocked | Self::NavigationTimeout | Self::HandlerError | Self::StorageError => true,
            Self::ContentTypeUnsupported | Self::ConfigurationError => false,
        }
    }

    /// Whether the session attributable to this failure should be marked
    /// bad (blamed) rather than left alone.
    #[must_use]
    pub const fn blames_session(&self) -> bool {
        matches!(self, Self::Blocked | Self::NetworkTransient)
    }

    /// Whether this failure should retire the session outright (rather
    /// than just incrementing its error score).
    #[must_use]
    pub const fn retires_session(&self) -> bool {
        matches!(self, Self::Blocked)
    }

    #[must_use]
    pub const fn delay_multiplier(&self) -> f64 {
        match self {
            Self::NetworkTransient => 1.0,
            Self::HandlerError => 1.0,
            Self::NavigationTimeout => 1.5,
            Self::Blocked => 3.0,
            Self::StorageError => 2.0,
            Self::ContentTypeUnsupported | Self::ConfigurationError => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limited_message_as_blocked() {
        let err = anyhow::anyhow!("received HTTP 429 too many requests");
        assert_eq!(FailureKind::classify(&err), FailureKind::Blocked);
    }

    #[test]
    fn classifies_timeout_as_network_transient() {
        let err = anyhow::anyhow!("connection timed out after 30s");
        assert_eq!(FailureKind::classify(&err), FailureKind::NetworkTransient);
    }

    #[test]
    fn content_type_unsupported_is_not_retryable() {
        assert!(!FailureKind::ContentTypeUnsupported.is_retryable());
        assert!(FailureKind::Blocked.is_retryable());
    }
}
