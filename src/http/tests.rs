use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::*;
use crate::config::{AuthScheme, TargetConfig};
use crate::error::{AppError, AppResult};

/// One-shot HTTP server that captures the raw request text and answers
/// with a canned 200.
fn spawn_capture_server() -> AppResult<(String, mpsc::Receiver<String>)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let (capture_tx, capture_rx) = mpsc::channel();

    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buffer = [0u8; 4096];
            let read = stream.read(&mut buffer).unwrap_or(0);
            let request = String::from_utf8_lossy(buffer.get(..read).unwrap_or(&[])).into_owned();
            drop(capture_tx.send(request));
            drop(stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/scim+json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
            ));
            drop(stream.flush());
        }
    });

    Ok((format!("http://{}", addr), capture_rx))
}

fn target(base_url: &str, auth: AuthScheme) -> TargetConfig {
    TargetConfig {
        name: "test".to_owned(),
        base_url: base_url.to_owned(),
        auth,
        timeout: Duration::from_secs(2),
        insecure: false,
    }
}

fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: std::future::Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

fn received_request(capture_rx: &mpsc::Receiver<String>) -> AppResult<String> {
    capture_rx
        .recv_timeout(Duration::from_secs(2))
        .map_err(|err| AppError::http(format!("No request captured: {}", err)))
}

#[test]
fn sends_bearer_auth_and_scim_media_types() -> AppResult<()> {
    run_async_test(async {
        let (url, capture_rx) = spawn_capture_server()?;
        let client = ScimClient::new(&target(
            &url,
            AuthScheme::Bearer {
                token: "sekrit".to_owned(),
            },
        ))?;

        let response = client
            .execute(&ApiRequest::get("/Users"))
            .await
            .map_err(|err| AppError::http(err.to_string()))?;
        if response.status != 200 {
            return Err(AppError::http(format!("Expected 200, got {}", response.status)));
        }

        let request = received_request(&capture_rx)?;
        if !request.starts_with("GET /Users HTTP/1.1") {
            return Err(AppError::http(format!("Unexpected request line: {}", request)));
        }
        if !request.contains("authorization: Bearer sekrit")
            && !request.contains("Authorization: Bearer sekrit")
        {
            return Err(AppError::http("Missing bearer header"));
        }
        if !request.to_ascii_lowercase().contains("content-type: application/scim+json") {
            return Err(AppError::http("Missing SCIM content type"));
        }
        Ok(())
    })
}

#[test]
fn sends_basic_auth_base64() -> AppResult<()> {
    run_async_test(async {
        let (url, capture_rx) = spawn_capture_server()?;
        let client = ScimClient::new(&target(
            &url,
            AuthScheme::Basic {
                username: "admin".to_owned(),
                password: "hunter2".to_owned(),
            },
        ))?;

        client
            .execute(&ApiRequest::get("/ServiceProviderConfig"))
            .await
            .map_err(|err| AppError::http(err.to_string()))?;

        // "admin:hunter2"
        let request = received_request(&capture_rx)?;
        if !request.contains("Basic YWRtaW46aHVudGVyMg==") {
            return Err(AppError::http(format!("Missing basic header in: {}", request)));
        }
        Ok(())
    })
}

#[test]
fn sends_api_key_header() -> AppResult<()> {
    run_async_test(async {
        let (url, capture_rx) = spawn_capture_server()?;
        let client = ScimClient::new(&target(
            &url,
            AuthScheme::ApiKey {
                header: "X-Api-Key".to_owned(),
                value: "k-123".to_owned(),
            },
        ))?;

        client
            .execute(&ApiRequest::get("/Schemas"))
            .await
            .map_err(|err| AppError::http(err.to_string()))?;

        let request = received_request(&capture_rx)?.to_ascii_lowercase();
        if !request.contains("x-api-key: k-123") {
            return Err(AppError::http("Missing api key header"));
        }
        Ok(())
    })
}

#[test]
fn query_pairs_are_appended() -> AppResult<()> {
    run_async_test(async {
        let (url, capture_rx) = spawn_capture_server()?;
        let client = ScimClient::new(&target(&url, AuthScheme::None))?;

        let request = ApiRequest::get("/Users")
            .with_query("startIndex", "1")
            .with_query("count", "2");
        client
            .execute(&request)
            .await
            .map_err(|err| AppError::http(err.to_string()))?;

        let raw = received_request(&capture_rx)?;
        if !raw.starts_with("GET /Users?startIndex=1&count=2") {
            return Err(AppError::http(format!("Unexpected request line: {}", raw)));
        }
        Ok(())
    })
}

#[test]
fn unreachable_target_is_a_transport_error() -> AppResult<()> {
    run_async_test(async {
        // Bind then drop a listener so the port is closed.
        let closed_port = {
            let listener = TcpListener::bind("127.0.0.1:0")?;
            listener.local_addr()?.port()
        };
        let url = format!("http://127.0.0.1:{}", closed_port);
        let client = ScimClient::new(&target(&url, AuthScheme::None))?;

        match client.execute(&ApiRequest::get("/Users")).await {
            Err(err) if err.message.contains("Request failed") => Ok(()),
            Err(err) => Err(AppError::http(format!("Unexpected message: {}", err))),
            Ok(response) => Err(AppError::http(format!(
                "Expected transport error, got {}",
                response.status
            ))),
        }
    })
}

#[test]
fn display_url_includes_query() -> AppResult<()> {
    let request = ApiRequest::get("/Users").with_query("count", "10");
    if request.display_url() != "/Users?count=10" {
        return Err(AppError::http(format!("Got {}", request.display_url())));
    }
    if ApiRequest::delete("/Users/9").display_url() != "/Users/9" {
        return Err(AppError::http("Plain path should round-trip"));
    }
    Ok(())
}
