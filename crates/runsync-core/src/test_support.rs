use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;

use crate::models::{CanonicalStatus, LaboratoryRun};

pub(crate) fn sample_run(
    run_id: &str,
    platform: &str,
    status: &str,
    external_run_id: Option<&str>,
) -> LaboratoryRun {
    LaboratoryRun {
        run_id: run_id.to_string(),
        laboratory_id: "lab-1".to_string(),
        organization_id: "org-1".to_string(),
        platform: platform.to_string(),
        external_run_id: external_run_id.map(ToString::to_string),
        workspace_id: None,
        status: status.to_string(),
        canonical_status: CanonicalStatus::Unknown,
        workflow_name: "nf-core/rnaseq".to_string(),
        owner: "owner@lab.example".to_string(),
        settings: serde_json::json!({"genome": "GRCh38"}),
        created_at: "2026-01-01T00:00:00.000000Z".to_string(),
        created_by: "owner@lab.example".to_string(),
        modified_at: "2026-01-01T00:00:00.000000Z".to_string(),
        modified_by: "owner@lab.example".to_string(),
        version: 1,
    }
}

/// Request line plus lowercase headers as seen by the stub server.
#[derive(Debug, Clone)]
pub(crate) struct CapturedRequest {
    pub(crate) request_line: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: String,
}

impl CapturedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Answers one request per canned response, in order, then stops.
pub(crate) fn spawn_stub_server(
    responses: Vec<(u16, String)>,
) -> (String, JoinHandle<Vec<CapturedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
    let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
    let handle = std::thread::spawn(move || {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("request line");
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("header line");
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
                }
            }
            let content_length = headers
                .iter()
                .find(|(name, _)| name == "content-length")
                .and_then(|(_, value)| value.parse::<usize>().ok())
                .unwrap_or(0);
            let mut request_body = vec![0_u8; content_length];
            reader.read_exact(&mut request_body).expect("request body");

            let response = format!(
                "HTTP/1.1 {status} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write response");
            stream.flush().expect("flush");
            captured.push(CapturedRequest {
                request_line: request_line.trim_end().to_string(),
                headers,
                body: String::from_utf8_lossy(&request_body).into_owned(),
            });
        }
        captured
    });
    (base_url, handle)
}
