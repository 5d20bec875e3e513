use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::sync::Arc;
use tokio::time::{Duration, Instant, sleep};
use tracing::info;

use launchpad_core::app::{EngineConfig, TaskCounts, TaskEngine};
use launchpad_core::domain::{
    DistributeType, GameId, GameStatus, MediaKind, NewGame, TaskStatus, TaskType, UserId,
};
use launchpad_core::impls::{InMemoryStore, LogSink};
use launchpad_core::lifecycle::{
    GameLifecycle, LifecycleConfig, NotifyReservedUsersHandler, register_handlers,
};
use launchpad_core::observability::init_tracing;
use launchpad_core::ports::{Clock, SystemClock, TaskStore};

#[derive(Debug, Serialize)]
struct Summary {
    game_id: GameId,
    status: String,
    version: i64,
    publish_time: Option<DateTime<Utc>>,
    tasks: TaskCounts,
}

/// 環境変数が無ければデモ向けの短いタイミングを使う
fn demo_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().or_else(|| match key {
        "LAUNCHPAD_INIT_DELAY_SECS" => Some("0".to_string()),
        "LAUNCHPAD_IDLE_POLL_SECS" => Some("1".to_string()),
        _ => None,
    })
}

async fn wait_until_notified(store: &InMemoryStore, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(tasks) = store.list_tasks(TaskType::GameNotifyReservedUsers).await {
            if tasks.iter().any(|t| t.status == TaskStatus::Success) {
                return true;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    // (A) ストア・時計・エンジン・ライフサイクルを組み立てる
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = InMemoryStore::new(clock.clone());
    let engine = TaskEngine::new(
        Arc::new(store.clone()),
        clock.clone(),
        EngineConfig::from_lookup(demo_lookup)?,
    );
    let lifecycle = Arc::new(GameLifecycle::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        engine.clone(),
        clock.clone(),
    ));

    // (B) handler を登録してワーカーを起動
    let notifier = NotifyReservedUsersHandler::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(LogSink),
        LifecycleConfig::from_env(),
    );
    register_handlers(&engine, lifecycle.clone(), notifier)?;
    let workers = engine.start()?;
    info!(workers = ?workers.names(), "workers running");

    // (C) 審査を通して 2 秒後に予約公開
    let game = store
        .insert_game(NewGame {
            name: "Star Courier".into(),
            developer: "Nightjar Studio".into(),
            publisher: "Nightjar Publishing".into(),
            distribute_type: DistributeType::H5Link,
        })
        .await;
    store
        .attach_media(
            game.id,
            &[
                MediaKind::Icon,
                MediaKind::Screenshot,
                MediaKind::Video,
                MediaKind::H5Link,
            ],
        )
        .await;
    store
        .add_reservations(game.id, &[UserId::new(101), UserId::new(102)])
        .await;

    lifecycle.submit_for_review(game.id).await?;
    lifecycle.approve(game.id).await?;
    let publish_time = clock.now() + chrono::TimeDelta::seconds(2);
    lifecycle.pre_register(game.id, publish_time).await?;
    println!("pre-registered {} for {publish_time}", game.id);

    // (D) 自動公開と通知を待つ
    let notified = wait_until_notified(&store, Duration::from_secs(15)).await;

    let current = lifecycle.current(game.id).await?;
    let summary = Summary {
        game_id: current.id,
        status: current.status.to_string(),
        version: current.version,
        publish_time: current.publish_time,
        tasks: engine.counts().await?,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !notified || current.status != GameStatus::Published {
        println!("game was not published in time");
    }

    // (E) ワーカーを止めて終了
    workers.shutdown_and_join().await;
    Ok(())
}
