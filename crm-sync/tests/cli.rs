use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{read_to_string, write};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A bare command running in an empty working directory with no inherited secrets.
fn crm_sync(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("crm-sync").expect("Binary exists");
    cmd.current_dir(workdir.path())
        .env_remove("SQUARE_API_TOKEN")
        .env_remove("GOOGLE_SHEET_ID")
        .env_remove("GOOGLE_SHEET_INDEX")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn help_lists_every_step() {
    let workdir = TempDir::new().unwrap();
    crm_sync(&workdir).arg("--help").assert().success().stdout(
        predicate::str::contains("fetch-customers")
            .and(predicate::str::contains("fetch-bookings"))
            .and(predicate::str::contains("fetch-payments"))
            .and(predicate::str::contains("write-sheet"))
            .and(predicate::str::contains("run")),
    );
}

#[test]
fn fetch_without_token_fails_with_hint() {
    let workdir = TempDir::new().unwrap();
    crm_sync(&workdir)
        .arg("fetch-customers")
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("SQUARE_API_TOKEN")
                .and(predicate::str::contains(".env.example")),
        );
    assert!(!workdir.path().join(".tmp").exists());
}

#[test]
fn write_sheet_without_sheet_id_fails() {
    let workdir = TempDir::new().unwrap();
    crm_sync(&workdir)
        .arg("write-sheet")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GOOGLE_SHEET_ID"));
}

#[test]
fn write_sheet_without_client_secrets_fails() {
    let workdir = TempDir::new().unwrap();
    crm_sync(&workdir)
        .arg("write-sheet")
        .env("GOOGLE_SHEET_ID", "sheet-123")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("credentials.json"));
}

#[test]
fn pipeline_stops_at_first_failing_step() {
    let workdir = TempDir::new().unwrap();
    crm_sync(&workdir)
        .arg("run")
        .assert()
        .code(1)
        .stdout(
            predicate::str::contains("[Step 1/4]")
                .and(predicate::str::contains("[Step 2/4]").not()),
        )
        .stderr(predicate::str::contains("Pipeline stopped at step 1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_customers_writes_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "customers": [
                {"id": "C1", "given_name": "Ada"},
                {"id": "C2", "given_name": "Grace"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let workdir = TempDir::new().unwrap();
    let config = workdir.path().join("crm-sync.yaml");
    write(&config, format!("square:\n  base_url: {}/v2\n", server.uri())).unwrap();

    let mut cmd = crm_sync(&workdir);
    cmd.arg("fetch-customers")
        .arg("--config")
        .arg(&config)
        .env("SQUARE_API_TOKEN", "sq-token");
    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert
        .success()
        .stdout(predicate::str::contains("Fetched 2 customers"));

    let snapshot = read_to_string(workdir.path().join(".tmp/customers.json")).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["given_name"], "Grace");
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use crm_sync::cli::{run, Cli, Commands};

    // A config path that does not exist: run fails after emitting the event.
    let cli = Cli {
        config: Some(std::path::PathBuf::from("dummy.yaml")),
        command: Commands::FetchCustomers,
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
