use std::process::Command;

fn producer_tool() -> Command {
    Command::new(env!("CARGO_BIN_EXE_producer-tool"))
}

fn consumer_tool() -> Command {
    Command::new(env!("CARGO_BIN_EXE_consumer-tool"))
}

#[test]
fn test_producer_tool_prints_report() {
    let output = producer_tool()
        .args(["-m", "3", "-n", "CLI.QUEUE", "-x", "cli-group"])
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Producer Results"), "{stdout}");
    assert!(stdout.contains("Messages Handled: 3"), "{stdout}");
}

#[test]
fn test_consumer_tool_with_preloaded_queue() {
    let output = consumer_tool()
        .args(["-q", "-m", "4", "-a", "client", "-z", "2", "--preload-messages", "4"])
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Consumer Results"), "{stdout}");
    assert!(stdout.contains("Messages Handled: 4"), "{stdout}");
}

#[test]
fn test_failed_worker_still_exits_zero() {
    let output = consumer_tool()
        .args(["-q", "-n", "SHARED.ID", "-g", "2", "-c", "same-id", "-m", "1"])
        .args(["--preload-messages", "1"])
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Failed Workers: 1"), "{stdout}");
    assert!(stdout.contains("Messages Handled: 1"), "{stdout}");
}

#[test]
fn test_help_exits_zero() {
    let output = consumer_tool().arg("-h").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--acknowledgement-mode"));
    assert!(stdout.contains("--receive-timeout-ms"));
}

#[test]
fn test_invalid_value_exits_with_usage() {
    let output = producer_tool().args(["-a", "sometimes"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid acknowledgement mode"), "{stderr}");
}

#[test]
fn test_validation_failure_exits_with_usage() {
    let output = consumer_tool().args(["-g", "0"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("number of threads"), "{stderr}");
    assert!(stderr.contains("Usage"), "{stderr}");
}
