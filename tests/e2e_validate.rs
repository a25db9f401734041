mod support;

use support::{run_scimstress, spawn_scim_server};

#[test]
fn e2e_validate_discovery_and_crud() -> Result<(), String> {
    let (url, users, _server) = spawn_scim_server()?;

    let output = run_scimstress([
        "validate",
        "--base-url",
        &url,
        "--categories",
        "schema_discovery,users_crud",
        "--timeout",
        "5",
    ])?;

    if !output.status.success() {
        return Err(format!(
            "stdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.contains("compliance score: 100.0%") {
        return Err(format!("Expected a perfect score, got:\n{}", stdout));
    }
    if !stdout.contains("cases: 9 total, 9 passed, 0 failed, 0 skipped") {
        return Err(format!("Unexpected case counts:\n{}", stdout));
    }

    // The run's own delete plus cleanup leave nothing behind.
    let leftover = users
        .lock()
        .map(|store| store.len())
        .map_err(|_| "users store poisoned".to_owned())?;
    if leftover != 0 {
        return Err(format!("{} users leaked", leftover));
    }
    Ok(())
}

#[test]
fn e2e_validate_unreachable_target_still_completes() -> Result<(), String> {
    // Bind then drop a listener so the port is closed.
    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")
            .map_err(|err| format!("bind failed: {}", err))?;
        listener
            .local_addr()
            .map_err(|err| format!("addr failed: {}", err))?
            .port()
    };
    let url = format!("http://127.0.0.1:{}", closed_port);

    let output = run_scimstress([
        "validate",
        "--base-url",
        &url,
        "--categories",
        "schema_discovery",
        "--timeout",
        "2",
    ])?;

    // Transport failures are failing cases, not an engine failure.
    if !output.status.success() {
        return Err(format!(
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.contains("compliance score: 0.0%") {
        return Err(format!("Expected a zero score, got:\n{}", stdout));
    }
    Ok(())
}

#[test]
fn e2e_validate_rejects_empty_selection() -> Result<(), String> {
    let output = run_scimstress([
        "validate",
        "--base-url",
        "http://127.0.0.1:1/",
        "--categories",
        "not_a_category",
    ])?;
    if output.status.success() {
        return Err("Unknown category should fail the start".to_owned());
    }
    Ok(())
}
