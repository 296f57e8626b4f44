//! Integration tests for the `fillform serve` HTTP surface.
//!
//! Each test starts the router in-process on an ephemeral port, backed by a
//! `MemoryStore` and a recording mailer, and talks to it over raw TCP.

use std::io::Read;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fillform_cli::config::{FormConfig, GristSettings};
use fillform_cli::serve::{
    router, AppState, MSG_AMBIGUOUS, MSG_BAD_REQUEST, MSG_INTERNAL_ERROR, MSG_NOTIFY_FAILED,
    MSG_NOT_FOUND,
};
use fillform_core::submission::{MSG_PREVIOUSLY_RECORDED, MSG_PREVIOUSLY_SUBMITTED, MSG_THANK_YOU};
use fillform_core::validate::MSG_REQUIRED;
use fillform_core::{
    Fields, FixedClock, FormDefinition, MailTransport, NotificationSpec, OutgoingMail, RecordId,
    RecordSnapshot, TransportError, WidgetKind, WidgetSpec,
};
use fillform_storage::MemoryStore;
use serde_json::json;

const TABLE: &str = "Guests";
const NOW: f64 = 1_700_000_000.5;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl MailTransport for RecordingMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::new("relay unavailable"));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

struct TestServer {
    port: u16,
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
    ids: Vec<RecordId>,
    rt: tokio::runtime::Runtime,
}

impl TestServer {
    fn record(&self, index: usize) -> RecordSnapshot {
        self.rt
            .block_on(self.store.get(TABLE, self.ids[index]))
            .expect("record exists")
    }

    fn mails(&self) -> Vec<OutgoingMail> {
        self.mailer.sent.lock().unwrap().clone()
    }
}

fn rsvp_form() -> FormConfig {
    let definition = FormDefinition::new(
        "# Hello {{ Name }}\n\nPlease reply by {{ Deadline | format_date_timestamp }}.",
        "Responded_At",
        vec![
            WidgetSpec::new("attend", WidgetKind::YesNo).with_label("Will you attend?"),
            WidgetSpec::new("comment", WidgetKind::Text).optional(),
        ],
    )
    .with_notification(NotificationSpec {
        from: Some("forms@example.org".to_string()),
        to: Some("team@example.org".to_string()),
        subject_template: Some("RSVP\n   from {{ Name }}".to_string()),
        body_template: Some("{{ Name }} will attend. Note: {{ comment }}".to_string()),
        predicate: Some("attend".to_string()),
    });

    FormConfig {
        name: "rsvp".to_string(),
        table: TABLE.to_string(),
        key_column: "Key".to_string(),
        timezone: Some(chrono_tz::UTC),
        definition,
        grist: GristSettings {
            root_url: "http://grist.invalid".to_string(),
            api_key: "unused".to_string(),
            doc_id: "unused".to_string(),
        },
    }
}

fn row(key: &str, name: &str, responded: serde_json::Value) -> Fields {
    let mut fields = Fields::new();
    fields.insert("Key".to_string(), json!(key));
    fields.insert("Name".to_string(), json!(name));
    fields.insert("Deadline".to_string(), json!(1_700_006_400));
    fields.insert("Responded_At".to_string(), responded);
    fields.insert("attend".to_string(), json!(null));
    fields.insert("comment".to_string(), json!(null));
    fields
}

/// Rows: 0 = open "abc", 1 = answered "done", 2 and 3 share key "dup".
fn start_server_with(mailer: RecordingMailer) -> TestServer {
    start_server_for(rsvp_form(), mailer)
}

fn start_server_for(form: FormConfig, mailer: RecordingMailer) -> TestServer {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime");
    let store = Arc::new(MemoryStore::new());
    let ids = rt.block_on(async {
        let mut ids = Vec::new();
        for fields in [
            row("abc", "Ada", json!(null)),
            row("done", "Grace", json!(1_600_000_000.0)),
            row("dup", "Alan", json!(null)),
            row("dup", "Alan", json!(null)),
        ] {
            ids.push(store.insert(TABLE, fields).await);
        }
        ids
    });

    let mailer = Arc::new(mailer);
    let state = AppState::new(mailer.clone(), Arc::new(FixedClock(NOW)))
        .expect("page templates")
        .with_form(Arc::new(form), store.clone())
        .expect("form templates");
    let listener = rt
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    rt.spawn(async move {
        axum::serve(listener, router(Arc::new(state)))
            .await
            .expect("server");
    });

    TestServer {
        port,
        store,
        mailer,
        ids,
        rt,
    }
}

fn start_server() -> TestServer {
    start_server_with(RecordingMailer::default())
}

/// Helper: send a raw request and return (status, body).
fn send(port: u16, request: String) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
    parse_http_response(&response)
}

fn http_get(port: u16, path: &str) -> (u16, String) {
    send(
        port,
        format!(
            "GET {} HTTP/1.1\r\nHost: localhost:{}\r\nConnection: close\r\n\r\n",
            path, port
        ),
    )
}

fn http_post_form(port: u16, path: &str, body: &str) -> (u16, String) {
    send(
        port,
        format!(
            "POST {} HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            path, port, body.len(), body
        ),
    )
}

/// Parse an HTTP response into (status_code, body).
fn parse_http_response(response: &str) -> (u16, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status = headers
        .lines()
        .next()
        .unwrap_or("")
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    let chunked = headers
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked");
    let body = if chunked { decode_chunked(&body) } else { body };
    (status, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;
    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(0) | Err(_) => break,
            Ok(s) => s,
        };
        let chunk_start = line_end + 2;
        let chunk_end = (chunk_start + size).min(remaining.len());
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }
    result
}

// ──────────────────────────────────────────────
// Routing and lookup
// ──────────────────────────────────────────────

#[test]
fn health_returns_ok() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/health");
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[test]
fn unknown_form_is_404() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/form/nope/abc");
    assert_eq!(status, 404);
    assert!(body.contains(MSG_NOT_FOUND));
    assert!(body.contains("alert-danger"));
}

#[test]
fn unknown_key_is_404() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/form/rsvp/zzz");
    assert_eq!(status, 404);
    assert!(body.contains(MSG_NOT_FOUND));

    let (status, _) = http_post_form(server.port, "/form/rsvp/zzz", "attend=1");
    assert_eq!(status, 404);
}

#[test]
fn duplicate_key_is_500() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/form/rsvp/dup");
    assert_eq!(status, 500);
    assert!(body.contains(MSG_AMBIGUOUS));
}

#[test]
fn unmatched_route_is_404() {
    let server = start_server();
    let (status, _) = http_get(server.port, "/elsewhere");
    assert_eq!(status, 404);
}

// ──────────────────────────────────────────────
// Display
// ──────────────────────────────────────────────

#[test]
fn get_open_record_shows_form() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/form/rsvp/abc");
    assert_eq!(status, 200);
    assert!(body.contains("<h1>Hello Ada</h1>"), "{body}");
    assert!(body.contains("Please reply by 2023-11-15."));
    assert!(body.contains("Will you attend?"));
    assert!(body.contains("name=\"attend\""));
    assert!(body.contains("name=\"comment\""));
    assert!(!body.contains("is-invalid"));
}

#[test]
fn get_answered_record_shows_message() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/form/rsvp/done");
    assert_eq!(status, 200);
    assert!(body.contains(MSG_PREVIOUSLY_RECORDED));
    assert!(!body.contains("<form"));
}

// ──────────────────────────────────────────────
// Submission
// ──────────────────────────────────────────────

#[test]
fn invalid_post_is_400_and_records_nothing() {
    let server = start_server();
    let (status, body) = http_post_form(server.port, "/form/rsvp/abc", "comment=hi");
    assert_eq!(status, 400);
    assert!(body.contains(MSG_REQUIRED));
    assert!(body.contains("was-validated"));
    assert!(body.contains("value=\"hi\""));

    let record = server.record(0);
    assert!(record.fields["Responded_At"].is_null());
    assert!(server.mails().is_empty());
}

#[test]
fn valid_post_records_and_notifies() {
    let server = start_server();
    let (status, body) =
        http_post_form(server.port, "/form/rsvp/abc", "attend=1&comment=Vegetarian");
    assert_eq!(status, 200);
    assert!(body.contains(MSG_THANK_YOU));
    assert!(body.contains("alert-primary"));

    let record = server.record(0);
    assert_eq!(record.fields["Responded_At"], json!(NOW));
    assert_eq!(record.fields["attend"], json!(true));
    assert_eq!(record.fields["comment"], json!("Vegetarian"));

    let mails = server.mails();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "team@example.org");
    assert_eq!(mails[0].subject, "RSVP from Ada");
    assert_eq!(mails[0].body, "Ada will attend. Note: Vegetarian");
}

#[test]
fn second_post_is_not_recorded() {
    let server = start_server();
    let (status, _) = http_post_form(server.port, "/form/rsvp/abc", "attend=1");
    assert_eq!(status, 200);
    let (status, body) = http_post_form(server.port, "/form/rsvp/abc", "attend=0&comment=changed");
    assert_eq!(status, 200);
    assert!(body.contains(MSG_PREVIOUSLY_SUBMITTED));

    let record = server.record(0);
    assert_eq!(record.fields["attend"], json!(true));
    assert_eq!(record.fields["comment"], json!(""));
    assert_eq!(server.mails().len(), 1);
}

#[test]
fn post_to_answered_record_is_refused() {
    let server = start_server();
    let (status, body) = http_post_form(server.port, "/form/rsvp/done", "attend=1");
    assert_eq!(status, 200);
    assert!(body.contains(MSG_PREVIOUSLY_SUBMITTED));
    assert!(server.record(1).fields["attend"].is_null());
}

#[test]
fn falsy_predicate_records_without_mail() {
    let server = start_server();
    let (status, body) = http_post_form(server.port, "/form/rsvp/abc", "attend=0");
    assert_eq!(status, 200);
    assert!(body.contains(MSG_THANK_YOU));
    assert_eq!(server.record(0).fields["attend"], json!(false));
    assert!(server.mails().is_empty());
}

#[test]
fn mail_failure_keeps_the_response() {
    let server = start_server_with(RecordingMailer {
        fail: true,
        ..Default::default()
    });
    let (status, body) = http_post_form(server.port, "/form/rsvp/abc", "attend=1");
    assert_eq!(status, 500);
    assert!(body.contains(MSG_NOTIFY_FAILED));
    assert_eq!(server.record(0).fields["Responded_At"], json!(NOW));
}

#[test]
fn malformed_body_is_400_page() {
    let server = start_server();
    let body = "attend=1";
    let (status, page) = send(
        server.port,
        format!(
            "POST /form/rsvp/abc HTTP/1.1\r\nHost: localhost:{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            server.port,
            body.len(),
            body
        ),
    );
    assert_eq!(status, 400);
    assert!(page.contains(MSG_BAD_REQUEST), "{page}");
    assert!(page.contains("alert-danger"));
    assert!(server.record(0).fields["Responded_At"].is_null());
    assert!(server.mails().is_empty());
}

#[test]
fn misnamed_response_column_is_500() {
    let mut form = rsvp_form();
    form.definition.response_time_column = "Responded_At_typo".to_string();
    let server = start_server_for(form, RecordingMailer::default());

    let (status, body) = http_get(server.port, "/form/rsvp/done");
    assert_eq!(status, 500);
    assert!(body.contains(MSG_INTERNAL_ERROR));
    assert!(!body.contains("<form"));

    let (status, _) = http_post_form(server.port, "/form/rsvp/abc", "attend=1");
    assert_eq!(status, 500);
    let record = server.record(0);
    assert!(record.fields["Responded_At"].is_null());
    assert!(!record.fields.contains_key("Responded_At_typo"));
    assert!(server.mails().is_empty());
}

#[test]
fn concurrent_posts_record_and_notify_once() {
    let server = start_server();
    let port = server.port;
    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                http_post_form(port, "/form/rsvp/abc", &format!("attend=1&comment=try{i}"))
            })
        })
        .collect();
    let results: Vec<(u16, String)> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let thanked = results
        .iter()
        .filter(|(_, body)| body.contains(MSG_THANK_YOU))
        .count();
    let refused = results
        .iter()
        .filter(|(_, body)| body.contains(MSG_PREVIOUSLY_SUBMITTED))
        .count();
    assert_eq!(thanked, 1);
    assert_eq!(refused, 7);
    assert_eq!(server.mails().len(), 1);
}
