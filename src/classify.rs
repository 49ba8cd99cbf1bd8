use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Status some proxy providers return when their pool is saturated.
pub const PROXY_SATURATED_STATUS: u16 = 599;

/// Characters of visible text scanned by the content tier.
const CONTENT_SCAN_CHARS: usize = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Forbidden,
    AuthRequired,
    SessionExpired,
    ServerError,
    ServiceUnavailable,
    Maintenance,
    JobClosed,
    RateLimited,
    ProxyRateLimited,
    HttpError,
    TransportTimeout,
    ConnectionRefused,
    DnsError,
    TlsError,
    GenericRequestFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::ServerError => "server_error",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Maintenance => "maintenance",
            ErrorKind::JobClosed => "job_closed",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ProxyRateLimited => "proxy_rate_limited",
            ErrorKind::HttpError => "http_error",
            ErrorKind::TransportTimeout => "transport_timeout",
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::DnsError => "dns_error",
            ErrorKind::TlsError => "tls_error",
            ErrorKind::GenericRequestFailure => "request_failed",
        }
    }

    /// Worth another attempt within the engine's retry budget.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::TransportTimeout
                | ErrorKind::ConnectionRefused
                | ErrorKind::GenericRequestFailure
                | ErrorKind::RateLimited
                | ErrorKind::ProxyRateLimited
                | ErrorKind::ServerError
                | ErrorKind::ServiceUnavailable
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "Page not found",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Access denied",
            ErrorKind::AuthRequired => "Sign-in required",
            ErrorKind::SessionExpired => "Session expired",
            ErrorKind::ServerError => "Server error",
            ErrorKind::ServiceUnavailable => "Service unavailable",
            ErrorKind::Maintenance => "Site under maintenance",
            ErrorKind::JobClosed => "Job closed or no longer available",
            ErrorKind::RateLimited => "Rate limited",
            ErrorKind::ProxyRateLimited => "Proxy pool saturated",
            ErrorKind::HttpError => "HTTP error",
            ErrorKind::TransportTimeout => "Request timed out",
            ErrorKind::ConnectionRefused => "Connection refused",
            ErrorKind::DnsError => "DNS resolution failed",
            ErrorKind::TlsError => "TLS handshake failed",
            ErrorKind::GenericRequestFailure => "Request failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content signatures, scanned in order. More specific phrases come first.
static SIGNATURES: LazyLock<Vec<(ErrorKind, Regex)>> = LazyLock::new(|| {
    [
        (
            ErrorKind::NotFound,
            r"(?im)page (?:was )?not found|404 (?:-|error|not found)|^\s*not found\s*$|the page you (?:are looking for|requested) (?:does not|doesn't|could not|cannot)|(?:job|posting|requisition) (?:could not be|was not) found",
        ),
        (
            ErrorKind::Forbidden,
            r"(?im)access (?:is )?denied|you (?:do not|don't) have permission to (?:access|view)|403 forbidden|^\s*forbidden\s*$",
        ),
        (
            ErrorKind::Unauthorized,
            r"(?im)401 unauthori[sz]ed|unauthori[sz]ed access|you are not authori[sz]ed|^\s*unauthori[sz]ed\s*$",
        ),
        (
            ErrorKind::AuthRequired,
            r"(?i)please (?:sign|log) ?in to (?:continue|view|access)|(?:sign|log) ?in required|you (?:must|need to) (?:be )?(?:signed|logged) ?in|authentication required",
        ),
        (
            ErrorKind::SessionExpired,
            r"(?i)(?:your|the) session (?:has )?(?:expired|timed out)|session (?:has )?expired[.,!]? (?:please )?(?:sign|log) ?in",
        ),
        (
            ErrorKind::ServerError,
            r"(?i)internal server error|500 (?:-|error|internal)|an unexpected error (?:has )?occurred|server error in",
        ),
        (
            ErrorKind::ServiceUnavailable,
            r"(?i)service (?:is )?(?:temporarily )?unavailable|503 service|502 bad gateway|gateway time-?out",
        ),
        (
            ErrorKind::Maintenance,
            r"(?i)(?:site|system|website|portal|page|service) is (?:currently )?(?:under|down for) (?:scheduled )?maintenance|(?:currently|temporarily) (?:down|offline|unavailable) for (?:scheduled )?maintenance|maintenance mode|we(?:'ll| will) be back (?:soon|shortly)",
        ),
        (
            ErrorKind::JobClosed,
            r"(?i)(?:job|position|posting|vacancy|requisition) (?:is )?no longer (?:available|active|open|accepting)|(?:job|position|posting|vacancy) has (?:been )?(?:closed|filled|expired|removed)|no longer accepting applications|applications for this (?:job|position|role|vacancy) (?:have|are) (?:now )?closed",
        ),
        (
            ErrorKind::RateLimited,
            r"(?i)too many requests|rate limit(?:ed| exceeded)|you have been (?:rate )?limited|request limit reached",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).unwrap()))
    .collect()
});

/// Map an HTTP status to an error kind. `None` below 400.
pub fn classify_status(status: u16) -> Option<ErrorKind> {
    if status < 400 {
        return None;
    }
    Some(match status {
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        429 => ErrorKind::RateLimited,
        PROXY_SATURATED_STATUS => ErrorKind::ProxyRateLimited,
        s if s >= 500 => ErrorKind::ServerError,
        _ => ErrorKind::HttpError,
    })
}

/// Scan the page title and the head of its visible text for failure signatures.
pub fn classify_content(title: &str, text: &str) -> Option<ErrorKind> {
    let head: String = text.chars().take(CONTENT_SCAN_CHARS).collect();
    let haystack = format!("{}\n{}", title.trim(), head);
    SIGNATURES
        .iter()
        .find(|(_, re)| re.is_match(&haystack))
        .map(|(kind, _)| *kind)
}

/// Status tier first; the content tier is only consulted for status < 400.
pub fn classify(status: u16, title: &str, text: &str) -> Option<ErrorKind> {
    match classify_status(status) {
        Some(kind) => Some(kind),
        None => classify_content(title, text),
    }
}

/// Transport failure kind from what the HTTP client reports.
pub fn classify_transport(is_timeout: bool, is_connect: bool, message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if is_timeout || lower.contains("timed out") || lower.contains("timeout") {
        ErrorKind::TransportTimeout
    } else if lower.contains("dns")
        || lower.contains("failed to lookup")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
    {
        ErrorKind::DnsError
    } else if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
        ErrorKind::TlsError
    } else if lower.contains("refused") || (is_connect && lower.contains("connect")) {
        ErrorKind::ConnectionRefused
    } else {
        ErrorKind::GenericRequestFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tier() {
        assert_eq!(classify_status(200), None);
        assert_eq!(classify_status(302), None);
        assert_eq!(classify_status(401), Some(ErrorKind::Unauthorized));
        assert_eq!(classify_status(403), Some(ErrorKind::Forbidden));
        assert_eq!(classify_status(404), Some(ErrorKind::NotFound));
        assert_eq!(classify_status(429), Some(ErrorKind::RateLimited));
        assert_eq!(classify_status(599), Some(ErrorKind::ProxyRateLimited));
        assert_eq!(classify_status(502), Some(ErrorKind::ServerError));
        assert_eq!(classify_status(418), Some(ErrorKind::HttpError));
    }

    #[test]
    fn status_wins_over_content() {
        assert_eq!(
            classify(404, "Careers", "Please sign in to continue"),
            Some(ErrorKind::NotFound)
        );
    }

    #[test]
    fn sign_in_page() {
        assert_eq!(
            classify(200, "Careers", "Welcome\nPlease sign in to continue"),
            Some(ErrorKind::AuthRequired)
        );
    }

    #[test]
    fn content_signatures() {
        let cases = [
            ("Page Not Found", "", ErrorKind::NotFound),
            ("Careers", "Access Denied. Contact the administrator.", ErrorKind::Forbidden),
            ("Forbidden", "", ErrorKind::Forbidden),
            ("Careers", "Your session has expired, start again.", ErrorKind::SessionExpired),
            ("Error", "Internal Server Error", ErrorKind::ServerError),
            ("Careers", "Service Temporarily Unavailable", ErrorKind::ServiceUnavailable),
            ("Careers", "The site is down for maintenance.", ErrorKind::Maintenance),
            ("Nurse", "This job is no longer available.", ErrorKind::JobClosed),
            ("Careers", "Too many requests. Try later.", ErrorKind::RateLimited),
        ];
        for (title, text, kind) in cases {
            assert_eq!(classify(200, title, text), Some(kind), "{} / {}", title, text);
        }
    }

    #[test]
    fn access_denied_precedes_generic_forbidden() {
        assert_eq!(
            classify_content("Forbidden", "Access denied"),
            Some(ErrorKind::Forbidden)
        );
        assert_eq!(
            classify_content("", "Access denied. Please sign in to continue."),
            Some(ErrorKind::Forbidden)
        );
    }

    #[test]
    fn ordinary_job_text_is_processable() {
        let text = "Registered Nurse\nLocation: Sydney\nDiscrimination of any kind is forbidden here. \
                    You will be responsible for patient care.";
        assert_eq!(classify(200, "Registered Nurse | Acme Health", text), None);
    }

    #[test]
    fn duty_text_mentioning_maintenance_is_processable() {
        let text = "Biomedical Technician\nDuties\nPerform scheduled maintenance on sterilisers\n\
                    Keep equipment under maintenance contracts up to date\n\
                    Configure session timeout policies on clinical workstations\n\
                    Applications are closed on 28 Feb 2026 at 5pm.";
        assert_eq!(classify(200, "Biomedical Technician | Acme Health", text), None);
        assert_eq!(
            classify(200, "Careers", "Our website is currently under maintenance. We'll be back soon."),
            Some(ErrorKind::Maintenance)
        );
        assert_eq!(
            classify(200, "Careers", "Applications for this position have closed."),
            Some(ErrorKind::JobClosed)
        );
    }

    #[test]
    fn only_head_of_text_is_scanned() {
        let mut text = "a".repeat(CONTENT_SCAN_CHARS + 10);
        text.push_str(" Too many requests");
        assert_eq!(classify_content("Job", &text), None);
    }

    #[test]
    fn transport_kinds() {
        assert_eq!(classify_transport(true, false, "operation"), ErrorKind::TransportTimeout);
        assert_eq!(
            classify_transport(false, true, "error trying to connect: dns error: failed to lookup address"),
            ErrorKind::DnsError
        );
        assert_eq!(
            classify_transport(false, true, "error trying to connect: invalid peer certificate"),
            ErrorKind::TlsError
        );
        assert_eq!(
            classify_transport(false, true, "error trying to connect: Connection refused (os error 111)"),
            ErrorKind::ConnectionRefused
        );
        assert_eq!(classify_transport(false, false, "body error"), ErrorKind::GenericRequestFailure);
    }
}
