// crawl-protocol: Dispatcher wire protocol types and serialization.
//
// Every frame on the dispatcher socket is one JSON object terminated by a
// newline.  Requests use a top-level `action` field for discriminated
// deserialization; responses use a top-level `status` field.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Shared sub-types
// ---------------------------------------------------------------------------

/// Network-level failure classes a fetcher can report.
///
/// `Dns` is treated as deterministic (the host is disabled immediately);
/// the other kinds only disable a host once the retry budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Dns,
    Timeout,
    Connection,
    Other,
}

/// One claimed row in a `get_fetched_url` batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedUrl {
    pub id: i64,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Worker -> Dispatcher requests
// ---------------------------------------------------------------------------

/// Fetch outcome for a previously claimed URL.
///
/// A successful fetch carries `http_status` in [200, 400) and no
/// `error_type`.  `document` is base64 (the payload crosses a JSON frame);
/// an empty string means "no body stored" -- disallowed MIME types are
/// submitted this way so the row is still marked processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub url_id: i64,
    pub size_bytes: i64,
    pub mime_type: String,
    /// Base64-encoded document body; empty when nothing is stored.
    #[serde(default)]
    pub document: String,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub error_type: Option<FetchErrorKind>,
}

/// Parse outcome for one URL of a `get_fetched_url` batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitParsedResult {
    pub url_id: i64,
    pub has_abc: bool,
}

/// Indexing outcome for a previously claimed tunebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitIndexedResult {
    pub tunebook_id: i64,
    pub success: bool,
}

/// All request kinds accepted by the dispatcher.
///
/// ```json
/// { "action": "get_url" }
/// { "action": "submit_result", "url_id": 7, ... }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
#[serde(rename_all = "snake_case")]
pub enum Request {
    /// Fetcher: claim one URL.
    GetUrl,
    /// Fetcher: commit a fetch outcome.
    SubmitResult(SubmitResult),
    /// Parser: claim a batch of fetched URLs.
    GetFetchedUrl,
    /// Parser: commit one parse outcome (repeated per batch entry).
    SubmitParsedResult(SubmitParsedResult),
    /// Indexer: claim one tunebook.
    GetTunebook,
    /// Indexer: commit an indexing outcome.
    SubmitIndexedResult(SubmitIndexedResult),
}

// ---------------------------------------------------------------------------
// Dispatcher -> Worker responses
// ---------------------------------------------------------------------------

/// Response to `get_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
#[serde(rename_all = "snake_case")]
pub enum UrlAssignment {
    Ok {
        url_id: i64,
        url: String,
        link_distance: i64,
    },
    /// Nothing claimable right now -- retry after a short sleep.
    NoUrls,
    Error {
        message: String,
    },
}

/// Response to `get_fetched_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
#[serde(rename_all = "snake_case")]
pub enum FetchedBatch {
    Ok { urls: Vec<FetchedUrl> },
    NoUrls,
    Error { message: String },
}

/// Response to `get_tunebook`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
#[serde(rename_all = "snake_case")]
pub enum TunebookAssignment {
    Ok { tunebook_id: i64 },
    /// No tunebook needs indexing.
    Empty,
    Error { message: String },
}

/// Acknowledgement for every `submit_*` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
#[serde(rename_all = "snake_case")]
pub enum Ack {
    Ok,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_action_tags_are_snake_case() {
        let json = serde_json::to_string(&Request::GetUrl).unwrap();
        assert_eq!(json, r#"{"action":"get_url"}"#);

        let json = serde_json::to_string(&Request::GetFetchedUrl).unwrap();
        assert_eq!(json, r#"{"action":"get_fetched_url"}"#);
    }

    #[test]
    fn submit_result_round_trips_with_optional_fields_absent() {
        let frame = r#"{"action":"submit_result","url_id":42,"size_bytes":0,"mime_type":""}"#;
        let req: Request = serde_json::from_str(frame).unwrap();
        match req {
            Request::SubmitResult(r) => {
                assert_eq!(r.url_id, 42);
                assert!(r.document.is_empty());
                assert_eq!(r.http_status, None);
                assert_eq!(r.error_type, None);
            }
            other => panic!("expected SubmitResult, got {other:?}"),
        }
    }

    #[test]
    fn error_kind_serializes_as_bare_word() {
        let r = SubmitResult {
            url_id: 1,
            size_bytes: 0,
            mime_type: String::new(),
            document: String::new(),
            http_status: None,
            error_type: Some(FetchErrorKind::Dns),
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(r#""error_type":"dns""#), "json: {json}");
    }

    #[test]
    fn url_assignment_status_tags() {
        let ok = UrlAssignment::Ok {
            url_id: 3,
            url: "http://example.com/a.abc".to_owned(),
            link_distance: 0,
        };
        let json = serde_json::to_string(&ok).unwrap();
        assert!(json.starts_with(r#"{"status":"ok""#), "json: {json}");

        let none: UrlAssignment = serde_json::from_str(r#"{"status":"no_urls"}"#).unwrap();
        assert_eq!(none, UrlAssignment::NoUrls);
    }

    #[test]
    fn tunebook_assignment_empty_round_trips() {
        let v: TunebookAssignment = serde_json::from_str(r#"{"status":"empty"}"#).unwrap();
        assert_eq!(v, TunebookAssignment::Empty);
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            r#"{"status":"empty"}"#
        );
    }

    #[test]
    fn ack_error_carries_message() {
        let v: Ack =
            serde_json::from_str(r#"{"status":"error","message":"missing tunebook_id"}"#).unwrap();
        match v {
            Ack::Error { message } => assert_eq!(message, "missing tunebook_id"),
            Ack::Ok => panic!("expected error ack"),
        }
    }
}
