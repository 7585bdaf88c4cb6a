// ── Error classification ─────────────────────────────────────────────────────
//
// Two passes: the structured kind first, then lowercase substring matching
// over the message. Local I/O failures skip the text pass. Anything
// unmatched degrades to ServerUnreachable.

use crate::error::{FailureDetail, ProviderError, SftpError, SftpErrorKind};

/// One classification rule: a detail plus the kinds and message fragments
/// that select it.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    pub detail: FailureDetail,
    pub kinds: Vec<SftpErrorKind>,
    pub needles: Vec<String>,
}

impl ClassifierRule {
    pub fn new(detail: FailureDetail, kinds: &[SftpErrorKind], needles: &[&str]) -> Self {
        Self {
            detail,
            kinds: kinds.to_vec(),
            needles: needles.iter().map(|n| n.to_lowercase()).collect(),
        }
    }

    fn matches_text(&self, lower: &str) -> bool {
        self.needles.iter().any(|n| lower.contains(n.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassifierRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        use FailureDetail as D;
        use SftpErrorKind as K;
        Self {
            rules: vec![
                ClassifierRule::new(
                    D::AuthenticationFailed,
                    &[K::AuthFailed],
                    &[
                        "authentication failed",
                        "auth fail",
                        "permission denied (publickey",
                        "unable to authenticate",
                        "no authentication method",
                    ],
                ),
                ClassifierRule::new(
                    D::DnsFailure,
                    &[K::DnsFailed],
                    &[
                        "could not resolve",
                        "failed to lookup address",
                        "name or service not known",
                        "nodename nor servname",
                        "temporary failure in name resolution",
                        "no such host",
                    ],
                ),
                ClassifierRule::new(D::Timeout, &[K::Timeout], &["timed out", "timeout"]),
                ClassifierRule::new(
                    D::ConnectionRefused,
                    &[K::ConnectionFailed],
                    &["connection refused", "handshake failed"],
                ),
                ClassifierRule::new(
                    D::NetworkUnreachable,
                    &[],
                    &["network is unreachable", "no route to host", "host is down"],
                ),
                ClassifierRule::new(
                    D::ConnectionClosed,
                    &[K::Disconnected],
                    &[
                        "connection reset",
                        "connection closed",
                        "connection lost",
                        "broken pipe",
                        "socket disconnect",
                        "unexpected eof",
                    ],
                ),
                ClassifierRule::new(
                    D::DirectoryNotEmpty,
                    &[K::DirectoryNotEmpty],
                    &["directory not empty", "dir not empty"],
                ),
                ClassifierRule::new(D::PermissionDenied, &[K::PermissionDenied], &["permission denied"]),
                ClassifierRule::new(
                    D::NotFound,
                    &[K::NotFound],
                    &["no such file", "not found", "does not exist"],
                ),
                ClassifierRule::new(
                    D::Interrupted,
                    &[K::Cancelled],
                    &["interrupted", "cancelled", "canceled"],
                ),
            ],
        }
    }
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule that is consulted before the built-in ones.
    pub fn with_rule(mut self, rule: ClassifierRule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    pub fn detail_for(&self, err: &SftpError) -> FailureDetail {
        if let Some(rule) = self.rules.iter().find(|r| r.kinds.contains(&err.kind)) {
            return rule.detail;
        }
        if err.kind == SftpErrorKind::Io {
            return FailureDetail::Unrecognized;
        }
        self.detail_for_message(&err.message)
    }

    pub fn detail_for_message(&self, message: &str) -> FailureDetail {
        let lower = message.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.matches_text(&lower))
            .map(|r| r.detail)
            .unwrap_or(FailureDetail::Unrecognized)
    }

    pub fn classify(&self, err: &SftpError) -> ProviderError {
        ProviderError::from_detail(self.detail_for(err))
    }

    /// Classify an arbitrary error by its text alone.
    pub fn classify_message(&self, message: &str) -> ProviderError {
        ProviderError::from_detail(self.detail_for_message(message))
    }

    pub fn user_message(&self, err: &SftpError) -> &'static str {
        self.detail_for(err).user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;

    fn classify(kind: SftpErrorKind, msg: &str) -> ProviderError {
        ErrorClassifier::new().classify(&SftpError::new(kind, msg))
    }

    #[test]
    fn test_kind_pass() {
        assert_eq!(classify(SftpErrorKind::AuthFailed, "x").kind, ProviderErrorKind::NotAuthenticated);
        assert_eq!(classify(SftpErrorKind::NotFound, "x").kind, ProviderErrorKind::NoSuchItem);
        assert_eq!(
            classify(SftpErrorKind::DirectoryNotEmpty, "x").kind,
            ProviderErrorKind::DirectoryNotEmpty
        );
        assert_eq!(classify(SftpErrorKind::DnsFailed, "x").detail, FailureDetail::DnsFailure);
    }

    #[test]
    fn test_message_pass_for_unstructured_errors() {
        let e = classify(SftpErrorKind::Unknown, "Permission denied (publickey,password).");
        assert_eq!(e.kind, ProviderErrorKind::NotAuthenticated);

        let e = classify(SftpErrorKind::Protocol, "SFTP: No such file");
        assert_eq!(e.kind, ProviderErrorKind::NoSuchItem);

        let e = classify(SftpErrorKind::Unknown, "Operation TIMED OUT");
        assert_eq!(e.detail, FailureDetail::Timeout);
        assert_eq!(e.message, "Connection timed out. The server may be unreachable.");

        let e = classify(SftpErrorKind::Unknown, "connect: Network is unreachable");
        assert_eq!(e.detail, FailureDetail::NetworkUnreachable);
    }

    #[test]
    fn test_permission_denied_is_not_auth() {
        let e = classify(SftpErrorKind::Protocol, "permission denied");
        assert_eq!(e.detail, FailureDetail::PermissionDenied);
        assert_eq!(e.kind, ProviderErrorKind::ServerUnreachable);
        assert_eq!(e.message, "Permission denied. Please check your access rights.");
    }

    #[test]
    fn test_local_io_is_not_a_missing_remote_item() {
        let err = SftpError::local_io(
            "Cannot read upload source",
            std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        );
        let e = ErrorClassifier::new().classify(&err);
        assert_eq!(e.kind, ProviderErrorKind::ServerUnreachable);
        assert_eq!(e.detail, FailureDetail::Unrecognized);
    }

    #[test]
    fn test_unrecognized_degrades_to_unreachable() {
        let e = classify(SftpErrorKind::Unknown, "the flux capacitor overheated");
        assert_eq!(e.kind, ProviderErrorKind::ServerUnreachable);
        assert_eq!(e.detail, FailureDetail::Unrecognized);
        assert_eq!(e.message, "An unexpected error occurred. Please try again.");
        assert!(!e.message.contains("flux"));
    }

    #[test]
    fn test_custom_rule_takes_precedence() {
        let classifier = ErrorClassifier::new().with_rule(ClassifierRule::new(
            FailureDetail::AuthenticationFailed,
            &[],
            &["account locked"],
        ));
        let e = classifier.classify_message("Account LOCKED by administrator");
        assert_eq!(e.kind, ProviderErrorKind::NotAuthenticated);
    }

    #[test]
    fn test_user_message() {
        let c = ErrorClassifier::new();
        let e = SftpError::dns_failed("lookup failed for nas.local");
        assert_eq!(c.user_message(&e), "Could not resolve hostname. Please check the host address.");
        let e = SftpError::cancelled("Transfer cancelled");
        assert_eq!(c.user_message(&e), "The connection was interrupted. Please try again.");
    }
}
