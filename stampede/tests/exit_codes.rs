use std::process::Command;

use anyhow::Context as _;
use stampede_testserver::TestServer;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[test]
fn invalid_duration_exits_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_stampede");

    let out = Command::new(exe)
        .arg("run")
        .arg("--base-url")
        .arg("http://localhost:1")
        .arg("--duration")
        .arg("10x")
        .output()
        .context("run stampede binary")?;

    anyhow::ensure!(
        status_code(out.status) == 30,
        "expected exit code 30, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[test]
fn missing_base_url_exits_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_stampede");

    let out = Command::new(exe)
        .arg("run")
        .arg("--vus")
        .arg("2")
        .output()
        .context("run stampede binary")?;

    anyhow::ensure!(status_code(out.status) == 30, "expected exit code 30");
    Ok(())
}

#[test]
fn malformed_threshold_exits_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_stampede");

    let out = Command::new(exe)
        .arg("run")
        .arg("--base-url")
        .arg("http://localhost:1")
        .arg("--threshold")
        .arg("login:rate==1")
        .output()
        .context("run stampede binary")?;

    anyhow::ensure!(status_code(out.status) == 30, "expected exit code 30");
    Ok(())
}

#[tokio::test]
async fn thresholds_failed_exit_11() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.api_base_url();
    let exe = env!("CARGO_BIN_EXE_stampede");

    let out = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--vus")
            .arg("2")
            .arg("--duration")
            .arg("30s")
            .arg("--iterations")
            .arg("4")
            .arg("--pause")
            .arg("0s")
            .arg("--threshold")
            .arg("login:rate>100000")
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run stampede binary")?;

    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 11,
        "expected exit code 11, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[tokio::test]
async fn passing_thresholds_exit_0() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.api_base_url();
    let exe = env!("CARGO_BIN_EXE_stampede");

    let out = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--vus")
            .arg("2")
            .arg("--duration")
            .arg("30s")
            .arg("--iterations")
            .arg("4")
            .arg("--pause")
            .arg("0s")
            .arg("--threshold")
            .arg("login:count>0")
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run stampede binary")?;

    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 0,
        "expected exit code 0, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}
