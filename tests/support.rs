use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

/// Shared user store so tests can inspect what survived a run.
pub type UserStore = Arc<Mutex<HashMap<String, serde_json::Value>>>;

pub struct ServerHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawns a minimal SCIM server on a real socket: enough of the
/// protocol for the discovery and CRUD categories plus the
/// create-style load scenarios.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub fn spawn_scim_server() -> Result<(String, UserStore, ServerHandle), String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let users: UserStore = Arc::new(Mutex::new(HashMap::new()));
    let next_id = Arc::new(AtomicU64::new(1));
    let (shutdown_tx, shutdown_rx) = mpsc::channel();

    let users_for_thread = Arc::clone(&users);
    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            match listener.accept() {
                Ok((stream, _)) => {
                    let users = Arc::clone(&users_for_thread);
                    let next_id = Arc::clone(&next_id);
                    thread::spawn(move || handle_client(stream, &users, &next_id));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok((
        format!("http://{}", addr),
        users,
        ServerHandle {
            shutdown: shutdown_tx,
            thread: Some(handle),
        },
    ))
}

fn handle_client(stream: TcpStream, users: &UserStore, next_id: &AtomicU64) {
    let mut reader = BufReader::new(stream);
    loop {
        let Some((method, path, body)) = read_request(&mut reader) else {
            return;
        };
        let (status, response_body) = route(&method, &path, body.as_deref(), users, next_id);
        let response = format!(
            "HTTP/1.1 {} X\r\nContent-Type: application/scim+json\r\nContent-Length: {}\r\n\r\n{}",
            status,
            response_body.len(),
            response_body
        );
        if reader.get_mut().write_all(response.as_bytes()).is_err() {
            return;
        }
        if reader.get_mut().flush().is_err() {
            return;
        }
    }
}

fn read_request(reader: &mut BufReader<TcpStream>) -> Option<(String, String, Option<String>)> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).ok()? == 0 {
        return None;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_owned();
    let path = parts.next()?.to_owned();

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }

    let body = if content_length > 0 {
        let mut buffer = vec![0u8; content_length];
        reader.read_exact(&mut buffer).ok()?;
        Some(String::from_utf8_lossy(&buffer).into_owned())
    } else {
        None
    };
    Some((method, path, body))
}

fn route(
    method: &str,
    path: &str,
    body: Option<&str>,
    users: &UserStore,
    next_id: &AtomicU64,
) -> (u16, String) {
    let (path, _query) = path.split_once('?').unwrap_or((path, ""));

    match (method, path) {
        ("GET", "/ServiceProviderConfig") => (
            200,
            r#"{"schemas":["urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig"],"patch":{"supported":true}}"#.to_owned(),
        ),
        ("GET", "/Schemas") | ("GET", "/ResourceTypes") => (
            200,
            r#"{"schemas":["urn:ietf:params:scim:api:messages:2.0:ListResponse"],"totalResults":0,"Resources":[]}"#.to_owned(),
        ),
        ("POST", "/Users") => {
            let Some(mut user) = body.and_then(|body| serde_json::from_str::<serde_json::Value>(body).ok())
            else {
                return (400, String::new());
            };
            let id = format!("u{}", next_id.fetch_add(1, Ordering::Relaxed));
            if let Some(object) = user.as_object_mut() {
                object.insert("id".to_owned(), serde_json::Value::String(id.clone()));
            }
            if let Ok(mut store) = users.lock() {
                store.insert(id, user.clone());
            }
            (201, user.to_string())
        }
        ("GET", "/Users") => {
            let resources: Vec<serde_json::Value> = users
                .lock()
                .map(|store| store.values().cloned().collect())
                .unwrap_or_default();
            let listing = serde_json::json!({
                "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
                "totalResults": resources.len(),
                "itemsPerPage": resources.len(),
                "Resources": resources,
            });
            (200, listing.to_string())
        }
        _ => by_id(method, path, body, users),
    }
}

fn by_id(method: &str, path: &str, body: Option<&str>, users: &UserStore) -> (u16, String) {
    let Some(id) = path.strip_prefix("/Users/") else {
        return (404, String::new());
    };
    match method {
        "GET" => users
            .lock()
            .ok()
            .and_then(|store| store.get(id).cloned())
            .map_or((404, String::new()), |user| (200, user.to_string())),
        "PUT" => {
            let Some(mut user) =
                body.and_then(|body| serde_json::from_str::<serde_json::Value>(body).ok())
            else {
                return (400, String::new());
            };
            if let Some(object) = user.as_object_mut() {
                object.insert("id".to_owned(), serde_json::Value::String(id.to_owned()));
            }
            match users.lock() {
                Ok(mut store) if store.contains_key(id) => {
                    store.insert(id.to_owned(), user.clone());
                    (200, user.to_string())
                }
                Ok(_) | Err(_) => (404, String::new()),
            }
        }
        "DELETE" => match users.lock() {
            Ok(mut store) => {
                if store.remove(id).is_some() {
                    (204, String::new())
                } else {
                    (404, String::new())
                }
            }
            Err(_) => (404, String::new()),
        },
        _ => (405, String::new()),
    }
}

/// Runs the `scimstress` binary and captures output.
///
/// # Errors
///
/// Returns an error if the binary cannot be executed.
pub fn run_scimstress<I, S>(args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = scimstress_bin()?;
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .map_err(|err| format!("run scimstress failed: {}", err))
}

fn scimstress_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_scimstress").map_or_else(
        || Err("CARGO_BIN_EXE_scimstress missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}
