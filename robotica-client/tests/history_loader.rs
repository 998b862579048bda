use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use robotica_client::{DataAccessService, HistoryLoader, LoadOutcome, Transport, TransportError};
use robotica_core::TimeWindow;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Answers `/respuestas` after a scripted delay, one script entry per call.
/// Calls past the end of the script are unreachable.
#[derive(Clone, Default)]
struct DelayedTransport {
    script: Arc<Mutex<VecDeque<(Duration, Value)>>>,
}

impl DelayedTransport {
    fn then(self, delay: Duration, body: Value) -> Self {
        self.script.lock().unwrap().push_back((delay, body));
        self
    }
}

#[async_trait]
impl Transport for DelayedTransport {
    async fn get(&self, path: &str, _query: &[(&str, String)]) -> Result<Value, TransportError> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some((delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            }
            None => Err(TransportError::NoResponse {
                path: path.to_owned(),
                reason: "connection refused".to_owned(),
            }),
        }
    }

    async fn post(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
        self.get(path, query).await
    }
}

fn history(count: i64) -> Value {
    Value::Array(
        (1..=count)
            .map(|n| json!({ "id": n, "response": format!("# Analysis {n}\nbody") }))
            .collect(),
    )
}

fn loader(transport: DelayedTransport) -> HistoryLoader<DelayedTransport> {
    HistoryLoader::with_deadline(DataAccessService::new(transport), Duration::from_secs(15))
}

#[tokio::test(start_paused = true)]
async fn fast_response_is_published() {
    let loader = loader(DelayedTransport::default().then(Duration::from_secs(2), history(4)));

    let outcome = loader.load(30, TimeWindow::Recent, &CancellationToken::new()).await;

    assert_eq!(outcome, LoadOutcome::Loaded { count: 4 });
    let view = loader.view().await;
    assert_eq!(view.items.len(), 4);
    assert!(!view.loading);
    assert_eq!(view.error, None);
}

#[tokio::test(start_paused = true)]
async fn deadline_wins_and_late_result_is_discarded() {
    let loader = loader(DelayedTransport::default().then(Duration::from_secs(20), history(4)));

    let outcome = loader.load(30, TimeWindow::Recent, &CancellationToken::new()).await;
    assert_eq!(outcome, LoadOutcome::TimedOut);

    let view = loader.view().await;
    assert!(view.items.is_empty());
    assert!(view.error.is_some());
    assert!(!view.loading);

    // Let the abandoned request finish.
    tokio::time::sleep(Duration::from_secs(10)).await;

    let view = loader.view().await;
    assert!(view.items.is_empty());
    assert!(view.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn newer_load_supersedes_older_one() {
    let loader = loader(
        DelayedTransport::default()
            .then(Duration::from_secs(10), history(3))
            .then(Duration::from_secs(1), history(2)),
    );
    let cancel = CancellationToken::new();

    let older = loader.load(30, TimeWindow::Recent, &cancel);
    let newer = async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        loader.load(30, TimeWindow::Recent, &cancel).await
    };
    let (older, newer) = tokio::join!(older, newer);

    assert_eq!(newer, LoadOutcome::Loaded { count: 2 });
    assert_eq!(older, LoadOutcome::Superseded);
    assert_eq!(loader.view().await.items.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn items_without_content_are_hidden() {
    let body = json!([
        { "id": 1, "response": "# Kept" },
        { "id": 2, "response": "" },
        { "id": 3, "message": "processing finished" }
    ]);
    let loader = loader(DelayedTransport::default().then(Duration::from_millis(50), body));

    let outcome = loader.load(30, TimeWindow::All, &CancellationToken::new()).await;

    assert_eq!(outcome, LoadOutcome::Loaded { count: 2 });
    let ids: Vec<_> = loader
        .view()
        .await
        .items
        .iter()
        .filter_map(|item| item.response_id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_load_keeps_previous_items() {
    let loader = loader(
        DelayedTransport::default()
            .then(Duration::from_secs(1), history(2))
            .then(Duration::from_secs(10), history(5)),
    );

    loader.load(30, TimeWindow::All, &CancellationToken::new()).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let outcome = loader.load(30, TimeWindow::All, &cancel).await;

    assert_eq!(outcome, LoadOutcome::Cancelled);
    let view = loader.view().await;
    assert_eq!(view.items.len(), 2);
    assert!(!view.loading);
}

#[tokio::test(start_paused = true)]
async fn unreachable_service_loads_mock_history() {
    let loader = loader(DelayedTransport::default());

    let outcome = loader.load(30, TimeWindow::All, &CancellationToken::new()).await;

    assert_eq!(outcome, LoadOutcome::Loaded { count: 5 });
}
