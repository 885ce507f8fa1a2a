//! Classify operation failures into retry error kinds.
//!
//! Operations fail with an opaque `anyhow::Error`; classification walks the
//! error chain looking for typed signals (I/O kinds, curl codes, JSON decode
//! errors, [`StageError`] statuses) and falls back to message patterns.

use std::io;

use super::error::{unix_millis, ClassifiedError, ErrorKind, Stage, StageError};

/// Where and when a failure happened, as seen by the retry engine.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// Circuit key the operation ran under.
    pub key: &'a str,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Free-form label for the operation (e.g. "processing", "extraction").
    pub operation: &'a str,
}

impl ClassifyContext<'_> {
    fn stage(&self) -> Option<Stage> {
        if self.operation.to_ascii_lowercase().contains("extract") {
            Some(Stage::Extraction)
        } else {
            None
        }
    }
}

/// Classify a failed attempt. Pure: no I/O, no shared state.
pub fn classify(err: &anyhow::Error, ctx: &ClassifyContext<'_>) -> ClassifiedError {
    if let Some(done) = err.chain().find_map(|e| e.downcast_ref::<ClassifiedError>()) {
        return done.clone();
    }

    let stage_err = err.chain().find_map(|e| e.downcast_ref::<StageError>());
    let status = stage_err
        .and_then(|s| s.status)
        .or_else(|| err.chain().find_map(|e| status_in_message(&e.to_string())));
    let stage = stage_err.map(|s| s.stage).or_else(|| ctx.stage());

    let (kind, mut retryable) = classify_kind(err, stage, status);
    if matches!(status, Some(401 | 403 | 404)) {
        retryable = false;
    }

    let message = format!("{err:#}");
    let cause = (err.chain().count() > 1).then(|| err.root_cause().to_string());

    ClassifiedError {
        kind,
        message,
        cause,
        attempt: ctx.attempt,
        key: ctx.key.to_string(),
        occurred_at: unix_millis(),
        retryable,
    }
}

fn classify_kind(err: &anyhow::Error, stage: Option<Stage>, status: Option<u16>) -> (ErrorKind, bool) {
    if stage == Some(Stage::Extraction) {
        match status {
            Some(429 | 500..=599) => return (ErrorKind::ExtractionService, true),
            Some(400..=499) => return (ErrorKind::ExtractionService, false),
            _ => {}
        }
    }
    if is_timeout(err) {
        return (ErrorKind::Timeout, true);
    }
    if is_network(err) {
        return (ErrorKind::Network, true);
    }
    if is_parse(err) {
        return (ErrorKind::Parsing, true);
    }
    match stage {
        Some(Stage::Fetch) => (ErrorKind::Automation, true),
        Some(Stage::Extraction) => (ErrorKind::ExtractionService, true),
        None => (ErrorKind::Unknown, true),
    }
}

fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|e| {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::TimedOut {
                return true;
            }
        }
        if e.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
            return true;
        }
        if let Some(ce) = e.downcast_ref::<curl::Error>() {
            if ce.is_operation_timedout() {
                return true;
            }
        }
        let msg = e.to_string().to_ascii_lowercase();
        msg.contains("timed out") || msg.contains("timeout") || msg.contains("etimedout")
    })
}

fn is_network(err: &anyhow::Error) -> bool {
    err.chain().any(|e| {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::AddrNotAvailable
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        if let Some(ce) = e.downcast_ref::<curl::Error>() {
            if ce.is_couldnt_connect()
                || ce.is_couldnt_resolve_host()
                || ce.is_couldnt_resolve_proxy()
                || ce.is_read_error()
                || ce.is_recv_error()
                || ce.is_send_error()
                || ce.is_got_nothing()
            {
                return true;
            }
        }
        let msg = e.to_string().to_ascii_lowercase();
        ["econnrefused", "enotfound", "econnreset", "eai_again", "connection refused", "connection reset", "dns error"]
            .iter()
            .any(|p| msg.contains(p))
    })
}

fn is_parse(err: &anyhow::Error) -> bool {
    err.chain().any(|e| {
        if e.downcast_ref::<serde_json::Error>().is_some() {
            return true;
        }
        let msg = e.to_string().to_ascii_lowercase();
        ["invalid json", "unexpected token", "failed to parse", "malformed"]
            .iter()
            .any(|p| msg.contains(p))
    })
}

/// Finds an HTTP status in messages such as "HTTP 503", "status: 429" or
/// "status code 404". URLs never match: the keyword must be a whole word.
fn status_in_message(msg: &str) -> Option<u16> {
    let lower = msg.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == '=')
        .map(|w| w.trim_matches(|c: char| matches!(c, ':' | ',' | ';' | '(' | ')' | '.')))
        .filter(|w| !w.is_empty())
        .collect();
    words.windows(2).find_map(|w| match w[0] {
        "http" | "status" | "code" => parse_status(w[1]),
        _ => None,
    })
}

fn parse_status(token: &str) -> Option<u16> {
    if token.len() != 3 {
        return None;
    }
    token.parse::<u16>().ok().filter(|c| (100..=599).contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn ctx() -> ClassifyContext<'static> {
        ClassifyContext {
            key: "a.example",
            attempt: 2,
            operation: "processing",
        }
    }

    fn extraction_status(code: u16) -> anyhow::Error {
        anyhow::Error::new(StageError::status(Stage::Extraction, code, "inference call"))
    }

    #[test]
    fn connection_refused_is_retryable_network() {
        let err = anyhow::Error::new(io::Error::from(io::ErrorKind::ConnectionRefused));
        let c = classify(&err, &ctx());
        assert_eq!(c.kind, ErrorKind::Network);
        assert!(c.retryable);
        assert_eq!(c.attempt, 2);
        assert_eq!(c.key, "a.example");
    }

    #[test]
    fn curl_connect_and_timeout_codes() {
        // CURLE_COULDNT_CONNECT
        let err = anyhow::Error::new(curl::Error::new(7)).context("GET page");
        assert_eq!(classify(&err, &ctx()).kind, ErrorKind::Network);
        // CURLE_OPERATION_TIMEDOUT
        let err = anyhow::Error::new(curl::Error::new(28)).context("GET page");
        assert_eq!(classify(&err, &ctx()).kind, ErrorKind::Timeout);
    }

    #[test]
    fn timeout_wording_is_retryable_timeout() {
        let err = anyhow::anyhow!("navigation timeout of 30000 ms exceeded");
        let c = classify(&err, &ctx());
        assert_eq!(c.kind, ErrorKind::Timeout);
        assert!(c.retryable);
    }

    #[test]
    fn dns_code_in_message_is_network() {
        let err = anyhow::anyhow!("getaddrinfo ENOTFOUND shop.example");
        assert_eq!(classify(&err, &ctx()).kind, ErrorKind::Network);
    }

    #[test]
    fn json_decode_error_is_retryable_parsing() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = anyhow::Error::new(json_err).context("decode extraction response");
        let c = classify(&err, &ctx());
        assert_eq!(c.kind, ErrorKind::Parsing);
        assert!(c.retryable);
        assert!(c.cause.is_some());
    }

    #[test]
    fn extraction_server_errors_and_rate_limit_retry() {
        for code in [500, 502, 503, 429] {
            let c = classify(&extraction_status(code), &ctx());
            assert_eq!(c.kind, ErrorKind::ExtractionService, "status {code}");
            assert!(c.retryable, "status {code}");
        }
    }

    #[test]
    fn extraction_client_errors_do_not_retry() {
        for code in [400, 401, 422] {
            let c = classify(&extraction_status(code), &ctx());
            assert_eq!(c.kind, ErrorKind::ExtractionService, "status {code}");
            assert!(!c.retryable, "status {code}");
        }
    }

    #[test]
    fn extraction_context_label_counts_as_extraction_origin() {
        let err = anyhow::anyhow!("inference request rejected: status code 503");
        let extraction_ctx = ClassifyContext {
            operation: "field-extraction",
            ..ctx()
        };
        let c = classify(&err, &extraction_ctx);
        assert_eq!(c.kind, ErrorKind::ExtractionService);
        assert!(c.retryable);
    }

    #[test]
    fn not_found_overrides_retryability() {
        let err = anyhow::Error::new(StageError::status(Stage::Fetch, 404, "GET /gone"));
        let c = classify(&err, &ctx());
        assert_eq!(c.kind, ErrorKind::Automation);
        assert!(!c.retryable);

        let err = anyhow::anyhow!("upstream replied HTTP 403 while loading page");
        let c = classify(&err, &ctx());
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(!c.retryable);
    }

    #[test]
    fn fetch_server_error_is_retryable_automation() {
        let err = anyhow::Error::new(StageError::status(Stage::Fetch, 502, "GET /"));
        let c = classify(&err, &ctx());
        assert_eq!(c.kind, ErrorKind::Automation);
        assert!(c.retryable);
    }

    #[test]
    fn unmatched_errors_are_retryable_unknown() {
        let err = anyhow::anyhow!("something odd happened");
        let c = classify(&err, &ctx());
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(c.retryable);
        assert!(c.cause.is_none());
    }

    #[test]
    fn already_classified_errors_pass_through() {
        let original = classify(&extraction_status(400), &ctx());
        let wrapped = anyhow::Error::new(original.clone()).context("outer layer");
        let other_ctx = ClassifyContext {
            key: "b.example",
            attempt: 3,
            operation: "processing",
        };
        assert_eq!(classify(&wrapped, &other_ctx), original);
    }

    #[test]
    fn classification_is_deterministic() {
        let err = Err::<(), _>(io::Error::from(io::ErrorKind::ConnectionReset))
            .context("fetch page")
            .unwrap_err();
        let a = classify(&err, &ctx());
        let b = classify(&err, &ctx());
        assert_eq!((a.kind, a.retryable), (b.kind, b.retryable));
    }

    #[test]
    fn status_parsing_from_messages() {
        assert_eq!(status_in_message("HTTP 503 Service Unavailable"), Some(503));
        assert_eq!(status_in_message("request failed with status code 404"), Some(404));
        assert_eq!(status_in_message("status: 429"), Some(429));
        assert_eq!(status_in_message("read 1024 bytes"), None);
        assert_eq!(status_in_message("http 99999"), None);
        assert_eq!(status_in_message("GET http://127.0.0.1:8080/x failed"), None);
        assert_eq!(status_in_message("upstream status=502"), Some(502));
    }
}
