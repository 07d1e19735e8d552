use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use herald_db::{Database, NotificationStore, SqliteStore};
use herald_dispatch::{
    DispatchStats, GatewayError, Pipeline, PipelineConfig, PushGateway, PushMessage,
    SchedulerConfig, SendReport, TokenOutcome,
};
use herald_types::NewNotification;

/// Fails every token listed in `reject`, records everything it sees.
#[derive(Default)]
struct MockGateway {
    reject: Vec<String>,
    seen: Mutex<Vec<PushMessage>>,
    delay: Duration,
}

#[async_trait]
impl PushGateway for MockGateway {
    async fn send_each(&self, messages: &[PushMessage]) -> Result<SendReport, GatewayError> {
        tokio::time::sleep(self.delay).await;
        self.seen.lock().unwrap().extend_from_slice(messages);
        let outcomes = messages
            .iter()
            .map(|m| {
                if self.reject.contains(&m.token) {
                    TokenOutcome::failed(&m.token, "not registered")
                } else {
                    TokenOutcome::delivered(&m.token)
                }
            })
            .collect();
        Ok(SendReport { outcomes })
    }
}

fn config(worker_count: usize) -> PipelineConfig {
    PipelineConfig {
        worker_count,
        scheduler: SchedulerConfig {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn wait_until_processed(store: &dyn NotificationStore, ids: &[i64]) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let mut done = true;
            for id in ids {
                let row = store.get(*id).await.unwrap().unwrap();
                done &= row.processed;
            }
            if done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("notifications were not processed in time");
}

#[tokio::test]
async fn notification_is_dispatched_and_marked_processed() {
    let store: Arc<dyn NotificationStore> =
        Arc::new(SqliteStore::new(Database::open_in_memory().unwrap()));
    let gateway = Arc::new(MockGateway {
        reject: vec!["tok-3".into()],
        ..Default::default()
    });
    let stats = Arc::new(DispatchStats::new());

    let pipeline = Pipeline::start(config(2), store.clone(), gateway.clone(), stats.clone());

    let id = store
        .insert(&NewNotification::new("Hello", "World", ["tok-1", "tok-2", "tok-3"]))
        .await
        .unwrap();
    wait_until_processed(store.as_ref(), &[id]).await;
    pipeline.shutdown().await;

    let seen: Vec<String> = gateway
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|m| m.token.clone())
        .collect();
    assert_eq!(seen, vec!["tok-1", "tok-2", "tok-3"]);

    let row = store.get(id).await.unwrap().unwrap();
    assert!(row.processed);
    assert!(!row.processing);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.processed, 1);
    assert_eq!(snapshot.tokens_succeeded, 2);
    assert_eq!(snapshot.tokens_failed, 1);
}

#[tokio::test]
async fn single_worker_eventually_handles_a_backlog() {
    let store: Arc<dyn NotificationStore> =
        Arc::new(SqliteStore::new(Database::open_in_memory().unwrap()));
    let gateway = Arc::new(MockGateway {
        delay: Duration::from_millis(15),
        ..Default::default()
    });

    let mut ids = Vec::new();
    for i in 0..5 {
        let n = NewNotification::new(format!("n{i}"), "", [format!("tok-{i}")]);
        ids.push(store.insert(&n).await.unwrap());
    }

    let stats = Arc::new(DispatchStats::new());
    let pipeline = Pipeline::start(config(1), store.clone(), gateway.clone(), stats.clone());
    wait_until_processed(store.as_ref(), &ids).await;
    pipeline.shutdown().await;

    assert_eq!(gateway.seen.lock().unwrap().len(), 5);
    assert_eq!(stats.snapshot().processed, 5);
    assert!(stats.snapshot().deferred > 0);
}

#[tokio::test]
async fn shutdown_is_prompt_when_idle() {
    let store: Arc<dyn NotificationStore> =
        Arc::new(SqliteStore::new(Database::open_in_memory().unwrap()));
    let pipeline = Pipeline::start(
        config(3),
        store,
        Arc::new(MockGateway::default()),
        Arc::new(DispatchStats::new()),
    );

    tokio::time::timeout(Duration::from_secs(2), pipeline.shutdown())
        .await
        .expect("pipeline did not stop");
}

#[tokio::test]
async fn zero_poll_interval_still_dispatches() {
    let store: Arc<dyn NotificationStore> =
        Arc::new(SqliteStore::new(Database::open_in_memory().unwrap()));
    let mut config = config(2);
    config.scheduler.poll_interval = Duration::ZERO;
    let pipeline = Pipeline::start(
        config,
        store.clone(),
        Arc::new(MockGateway::default()),
        Arc::new(DispatchStats::new()),
    );

    let id = store
        .insert(&NewNotification::new("Now", "", ["tok"]))
        .await
        .unwrap();
    wait_until_processed(store.as_ref(), &[id]).await;
    pipeline.shutdown().await;
}
