use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ocrtex::config::{Config, Credential, UploadMode};
use ocrtex::error::OcrError;
use ocrtex::ocr::OcrProvider;
use ocrtex::ocr::mistral::MistralOcr;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread::JoinHandle;

const OCR_BODY: &str = r##"{
  "pages": [
    {"index": 0, "markdown": "# Paper\n\n![img-0.jpeg](img-0.jpeg)", "images": [
      {"id": "img-0.jpeg", "image_base64": "data:image/jpeg;base64,/9j/4AAQ"}
    ]},
    {"index": 1, "markdown": "Second page.", "images": []}
  ],
  "model": "mistral-ocr-2505",
  "usage_info": {"pages_processed": 2, "doc_size_bytes": 13}
}"##;

const PDF_BYTES: &[u8] = b"%PDF-1.4 test";

#[derive(Debug)]
struct Request {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Answers one connection per scripted response, in order, and hands back
/// what the client sent.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Request>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            seen.push(read_request(&stream));
            write!(
                stream,
                "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
        }
        seen
    });
    (base_url, handle)
}

fn read_request(stream: &TcpStream) -> Request {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut h = String::new();
        reader.read_line(&mut h).unwrap();
        let h = h.trim_end();
        if h.is_empty() {
            break;
        }
        if let Some((k, v)) = h.split_once(':') {
            headers.push((k.trim().to_ascii_lowercase(), v.trim().to_string()));
        }
    }

    let mut body = Vec::new();
    let chunked = headers
        .iter()
        .any(|(k, v)| k == "transfer-encoding" && v.contains("chunked"));
    if chunked {
        loop {
            let mut size = String::new();
            reader.read_line(&mut size).unwrap();
            let n = usize::from_str_radix(size.trim(), 16).unwrap();
            let mut chunk = vec![0; n + 2];
            reader.read_exact(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    } else if let Some((_, len)) = headers.iter().find(|(k, _)| k == "content-length") {
        body = vec![0; len.parse().unwrap()];
        reader.read_exact(&mut body).unwrap();
    }

    Request {
        method,
        target,
        headers,
        body,
    }
}

fn client(base_url: &str, mode: UploadMode) -> MistralOcr {
    let mut cfg = Config::default();
    cfg.ocr.base_url = format!("{base_url}/");
    cfg.ocr.upload_mode = mode;
    cfg.ocr.request_timeout_seconds = 30;
    MistralOcr::new(&cfg, Credential::new("test-key")).unwrap()
}

fn pdf(dir: &tempfile::TempDir) -> PathBuf {
    let p = dir.path().join("paper.pdf");
    std::fs::write(&p, PDF_BYTES).unwrap();
    p
}

#[test]
fn signed_url_mode_uploads_then_signs_then_runs_ocr() {
    let tmp = tempfile::tempdir().unwrap();
    let (base_url, server) = serve(vec![
        (200, r#"{"id": "file-123", "object": "file", "purpose": "ocr"}"#),
        (200, r#"{"url": "https://files.example/signed/paper.pdf"}"#),
        (200, OCR_BODY),
    ]);

    let result = client(&base_url, UploadMode::SignedUrl)
        .process(&pdf(&tmp))
        .unwrap();
    let seen = server.join().unwrap();

    assert_eq!(result.pages.len(), 2);
    assert_eq!(result.image_count(), 1);
    assert_eq!(result.model.as_deref(), Some("mistral-ocr-2505"));

    assert_eq!(seen.len(), 3);
    for req in &seen {
        assert_eq!(req.header("authorization"), Some("Bearer test-key"));
    }

    let upload = &seen[0];
    assert_eq!((upload.method.as_str(), upload.target.as_str()), ("POST", "/v1/files"));
    assert!(
        upload
            .header("content-type")
            .unwrap()
            .starts_with("multipart/form-data")
    );
    let form = String::from_utf8_lossy(&upload.body);
    assert!(form.contains("name=\"purpose\""));
    assert!(form.contains("filename=\"paper.pdf\""));
    assert!(form.contains("%PDF-1.4 test"));

    let sign = &seen[1];
    assert_eq!(
        (sign.method.as_str(), sign.target.as_str()),
        ("GET", "/v1/files/file-123/url?expiry=1")
    );

    let ocr = &seen[2];
    assert_eq!((ocr.method.as_str(), ocr.target.as_str()), ("POST", "/v1/ocr"));
    let body = ocr.json();
    assert_eq!(body["model"], "mistral-ocr-latest");
    assert_eq!(body["document"]["type"], "document_url");
    assert_eq!(
        body["document"]["document_url"],
        "https://files.example/signed/paper.pdf"
    );
    assert_eq!(body["include_image_base64"], true);
}

#[test]
fn inline_mode_sends_a_data_url_in_one_request() {
    let tmp = tempfile::tempdir().unwrap();
    let (base_url, server) = serve(vec![(200, OCR_BODY)]);

    client(&base_url, UploadMode::Inline)
        .process(&pdf(&tmp))
        .unwrap();
    let seen = server.join().unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].target, "/v1/ocr");
    let expected = format!("data:application/pdf;base64,{}", STANDARD.encode(PDF_BYTES));
    assert_eq!(seen[0].json()["document"]["document_url"], expected);
}

#[test]
fn rejected_key_stops_at_upload() {
    let tmp = tempfile::tempdir().unwrap();
    let (base_url, server) = serve(vec![(401, r#"{"message": "Unauthorized"}"#)]);

    let err = client(&base_url, UploadMode::SignedUrl)
        .process(&pdf(&tmp))
        .unwrap_err();
    assert_eq!(server.join().unwrap().len(), 1);
    match err {
        OcrError::Auth { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Unauthorized"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn server_error_on_ocr_call_is_classified() {
    let tmp = tempfile::tempdir().unwrap();
    let (base_url, server) = serve(vec![(503, r#"{"message": "overloaded"}"#)]);

    let err = client(&base_url, UploadMode::Inline)
        .process(&pdf(&tmp))
        .unwrap_err();
    server.join().unwrap();
    assert!(matches!(err, OcrError::Server { status: 503, .. }));
}

#[test]
fn non_json_success_body_is_malformed() {
    let tmp = tempfile::tempdir().unwrap();
    let (base_url, server) = serve(vec![(200, "<html>gateway</html>")]);

    let err = client(&base_url, UploadMode::Inline)
        .process(&pdf(&tmp))
        .unwrap_err();
    server.join().unwrap();
    assert!(matches!(err, OcrError::MalformedResponse(_)));
}

#[test]
fn unreadable_pdf_never_reaches_the_network() {
    let tmp = tempfile::tempdir().unwrap();
    let (base_url, _server) = serve(vec![]);
    let err = client(&base_url, UploadMode::SignedUrl)
        .process(&tmp.path().join("missing.pdf"))
        .unwrap_err();
    assert!(matches!(err, OcrError::ReadInput { .. }));
}
