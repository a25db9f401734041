mod support;

use support::{run_scimstress, spawn_scim_server};

#[test]
fn e2e_load_create_users_cleans_up() -> Result<(), String> {
    let (url, users, _server) = spawn_scim_server()?;

    let output = run_scimstress([
        "load",
        "--base-url",
        &url,
        "--scenarios",
        "create_users",
        "--units",
        "5",
        "--concurrency",
        "2",
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
    if !stdout.contains("requests: 5 total, 5 ok, 0 failed") {
        return Err(format!("Unexpected billable counts:\n{}", stdout));
    }
    if !stdout.contains("status codes: 201x5") {
        return Err(format!("Unexpected status histogram:\n{}", stdout));
    }

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
fn e2e_load_persists_results_to_sqlite() -> Result<(), String> {
    let (url, _users, _server) = spawn_scim_server()?;
    let dir = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let db_path = dir.path().join("results.sqlite");

    let output = run_scimstress([
        "load",
        "--base-url",
        &url,
        "--scenarios",
        "user_lifecycle",
        "--units",
        "3",
        "--concurrency",
        "3",
        "--db",
        &db_path.to_string_lossy(),
    ])?;

    if !output.status.success() {
        return Err(format!(
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let conn = rusqlite::Connection::open(&db_path)
        .map_err(|err| format!("open db failed: {}", err))?;
    let runs: i64 = conn
        .query_row("SELECT COUNT(*) FROM runs WHERE status = 'completed'", [], |row| {
            row.get(0)
        })
        .map_err(|err| format!("query runs failed: {}", err))?;
    if runs != 1 {
        return Err(format!("Expected 1 completed run, got {}", runs));
    }
    // 3 lifecycle units = 9 primary calls, all deleted in-chain.
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM load_results WHERE disposition = 'primary'",
            [],
            |row| row.get(0),
        )
        .map_err(|err| format!("query rows failed: {}", err))?;
    if rows != 9 {
        return Err(format!("Expected 9 primary rows, got {}", rows));
    }
    Ok(())
}

#[test]
fn e2e_load_rejects_zero_units() -> Result<(), String> {
    let output = run_scimstress([
        "load",
        "--base-url",
        "http://127.0.0.1:1/",
        "--units",
        "0",
    ])?;
    if output.status.success() {
        return Err("Zero units should fail the start".to_owned());
    }
    Ok(())
}
