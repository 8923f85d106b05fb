mod support;

use std::sync::{Arc, Mutex};

use freightdesk_client::queue::{DEAD_LETTER_KEY, QUEUE_KEY};
use freightdesk_client::{
    AppContext, BufferedNotifier, KeyValueStore, Level, Method, RequestBody, SendOutcome,
    WriteOutcome, WriteRequest,
};
use freightdesk_core::{Credential, EntityId, Role, UserProfile};
use serde_json::{Value, json};
use support::{MockBackend, Reply, client_json, config, context, eventually, page, unreachable_url};

/// Backend that keeps created clients in memory.
async fn clients_backend() -> (MockBackend, Arc<Mutex<Vec<Value>>>) {
    let rows = Arc::new(Mutex::new(Vec::<Value>::new()));
    let server_side = rows.clone();
    let srv = MockBackend::spawn(move |req| {
        let mut rows = server_side.lock().unwrap();
        match (req.method.as_str(), req.path.as_str()) {
            ("POST", "/clients") => {
                let mut row = req.json.clone().unwrap_or(json!({}));
                row["id"] = json!(rows.len() + 1);
                rows.push(row.clone());
                Reply::json(201, json!({"data": row})).delayed(30)
            }
            ("PUT", path) if path.starts_with("/clients/") => {
                let patch = req.json.clone().unwrap_or(json!({}));
                let id: u64 = path.trim_start_matches("/clients/").parse().unwrap();
                match rows.iter_mut().find(|r| r["id"] == json!(id)) {
                    Some(row) => {
                        if let (Some(row), Some(patch)) = (row.as_object_mut(), patch.as_object()) {
                            for (k, v) in patch {
                                row.insert(k.clone(), v.clone());
                            }
                        }
                        Reply::ok(json!({"data": row.clone()})).delayed(30)
                    }
                    None => Reply::json(404, json!({"message": "Client not found"})),
                }
            }
            ("GET", "/clients") => {
                let total = rows.len() as u64;
                Reply::ok(page(rows.clone(), 1, 1, 10, total))
            }
            _ => Reply::json(404, json!({"message": "no route"})),
        }
    })
    .await;
    (srv, rows)
}

#[tokio::test]
async fn offline_add_is_queued_and_replayed_on_reconnect() {
    let (srv, _) = clients_backend().await;
    let (ctx, notifier) = context(&srv.base_url).await;
    let monitor = ctx.start_monitor();

    ctx.connectivity.set_offline();
    let outcome = ctx
        .clients
        .add(&json!({"name": "Acme", "email": "a@x.com"}))
        .await;

    assert!(matches!(outcome, WriteOutcome::Queued(_)));
    assert!(outcome.accepted());
    assert_eq!(ctx.queue.len().await, 1);
    assert!(srv.requests().is_empty());
    assert!(ctx.clients.items().await.is_empty());
    assert_eq!(notifier.drain()[0].level, Level::Info);

    ctx.connectivity.set_online();
    let synced = eventually(|| async { ctx.clients.items().await.len() == 1 }).await;
    assert!(synced, "queued add never reached the cache");

    let posts = srv.requests_to("POST", "/clients");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].json, Some(json!({"name": "Acme", "email": "a@x.com"})));
    assert_eq!(ctx.clients.items().await[0].name, "Acme");
    assert_eq!(ctx.queue.len().await, 0);
    assert!(ctx.storage.get(QUEUE_KEY).await.unwrap().is_none());

    // The refetch came after the replayed POST.
    let order: Vec<String> = srv
        .requests()
        .iter()
        .map(|r| format!("{} {}", r.method, r.path))
        .collect();
    assert_eq!(order, vec!["POST /clients", "GET /clients"]);

    monitor.shutdown().await;
}

#[tokio::test]
async fn replay_waits_for_each_response_before_the_next_write() {
    let (srv, _) = clients_backend().await;
    let (ctx, _) = context(&srv.base_url).await;

    ctx.connectivity.set_offline();
    ctx.clients.add(&json!({"name": "Xeno"})).await;
    ctx.clients
        .edit(EntityId::new(1), &json!({"name": "Xeno Logistics"}))
        .await;
    assert_eq!(ctx.queue.len().await, 2);

    ctx.connectivity.set_online();
    let report = ctx.queue.replay().await.unwrap();
    assert_eq!(report.synced.len(), 2);
    assert!(!report.halted);

    let events = srv.events();
    assert_eq!(
        &events[..4],
        &[
            "start POST /clients",
            "end POST /clients",
            "start PUT /clients/1",
            "end PUT /clients/1",
        ]
    );

    // Both writes hint the same store; it is refetched once.
    assert_eq!(srv.requests_to("GET", "/clients").len(), 1);
    let items = ctx.clients.items().await;
    assert_eq!(items[0].name, "Xeno Logistics");
}

#[tokio::test]
async fn replay_of_empty_queue_issues_no_requests() {
    let srv = MockBackend::spawn(|_| Reply::ok(json!({}))).await;
    let (ctx, _) = context(&srv.base_url).await;

    let report = ctx.queue.replay().await.unwrap();
    assert!(report.is_empty());
    assert!(srv.requests().is_empty());
}

#[tokio::test]
async fn failed_replays_are_retained_or_dead_lettered() {
    let srv = MockBackend::spawn(|req| match req.path.as_str() {
        "/cargo/1" => Reply::json(500, json!({"message": "Server Error"})),
        "/cargo/2" => Reply::json(
            422,
            json!({"message": "invalid", "errors": {"weight": ["Weight must be positive"]}}),
        ),
        _ => Reply::empty(204),
    })
    .await;
    let (ctx, notifier) = context(&srv.base_url).await;

    ctx.connectivity.set_offline();
    for id in 1..=3 {
        ctx.queue
            .enqueue_or_send(WriteRequest::delete(format!("/cargo/{id}")))
            .await
            .unwrap();
    }
    notifier.drain();

    ctx.connectivity.set_online();
    let report = ctx.queue.replay().await.unwrap();
    assert_eq!(report.synced.len(), 1);
    assert_eq!(report.retained.len(), 1);
    assert_eq!(report.dead_lettered.len(), 1);
    assert!(!report.halted);

    let pending = ctx.queue.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].path, "/cargo/1");
    assert_eq!(pending[0].attempts, 1);
    assert!(pending[0].last_error.as_deref().is_some_and(|e| e.contains("500")));

    let dead = ctx.queue.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].write.path, "/cargo/2");
    assert!(dead[0].reason.contains("Weight must be positive"));
    assert!(ctx.storage.get(DEAD_LETTER_KEY).await.unwrap().is_some());

    let notices = notifier.drain();
    assert!(notices.iter().any(|n| n.level == Level::Success));
    assert!(
        notices
            .iter()
            .any(|n| n.level == Level::Error && n.message.contains("/cargo/2"))
    );
}

#[tokio::test]
async fn retryable_failures_dead_letter_after_max_attempts() {
    let srv = MockBackend::spawn(|_| Reply::json(503, json!({"message": "Maintenance"}))).await;
    let mut cfg = config(&srv.base_url);
    cfg.max_replay_attempts = 2;
    let (ctx, _) = support::context_with(cfg).await;

    ctx.connectivity.set_offline();
    let body = RequestBody::json(json!({"name": "Acme"}));
    ctx.queue
        .enqueue_or_send(WriteRequest::post("/clients", body))
        .await
        .unwrap();
    ctx.connectivity.set_online();

    let first = ctx.queue.replay().await.unwrap();
    assert_eq!(first.retained.len(), 1);
    let second = ctx.queue.replay().await.unwrap();
    assert_eq!(second.dead_lettered.len(), 1);
    assert!(ctx.queue.is_empty().await);

    let dead = ctx.queue.dead_letters().await;
    assert_eq!(dead[0].write.attempts, 2);

    // Requeue with a fresh budget.
    ctx.queue.retry_dead_letter(dead[0].write.id).await.unwrap();
    assert_eq!(ctx.queue.len().await, 1);
    assert_eq!(ctx.queue.pending().await[0].attempts, 0);
    assert!(ctx.queue.dead_letters().await.is_empty());
}

#[tokio::test]
async fn transport_failure_halts_the_pass_and_keeps_order() {
    let url = unreachable_url().await;
    let (ctx, _) = context(&url).await;

    ctx.connectivity.set_offline();
    let first = ctx.queue.enqueue(WriteRequest::delete("/clients/1")).await.unwrap();
    let second = ctx.queue.enqueue(WriteRequest::delete("/clients/2")).await.unwrap();

    ctx.connectivity.set_online();
    let report = ctx.queue.replay().await.unwrap();
    assert!(report.halted);
    assert!(report.synced.is_empty());
    assert_eq!(report.retained, vec![first, second]);
    assert!(ctx.connectivity.is_offline());

    let pending = ctx.queue.pending().await;
    assert_eq!(pending.iter().map(|w| w.id).collect::<Vec<_>>(), vec![first, second]);
    assert_eq!(pending[0].attempts, 0);
}

#[tokio::test]
async fn live_send_without_response_is_queued() {
    let url = unreachable_url().await;
    let (ctx, notifier) = context(&url).await;
    assert!(ctx.connectivity.is_online());

    let outcome = ctx
        .queue
        .enqueue_or_send(WriteRequest::post(
            "/clients",
            RequestBody::json(json!({"name": "Acme"})),
        ))
        .await
        .unwrap();

    assert!(matches!(outcome, SendOutcome::Queued(_)));
    assert!(ctx.connectivity.is_offline());
    assert_eq!(ctx.queue.len().await, 1);
    assert_eq!(ctx.queue.pending().await[0].method, Method::Post);
    assert!(notifier.drain().iter().any(|n| n.level == Level::Info));
}

#[tokio::test]
async fn expired_session_halts_replay() {
    let srv = MockBackend::spawn(|_| Reply::json(401, json!({"message": "Unauthenticated."}))).await;
    let (ctx, notifier) = context(&srv.base_url).await;
    ctx.credentials
        .store(Credential::new(
            "stale",
            UserProfile {
                id: EntityId::new(1),
                name: None,
                email: None,
                role: Role::Employee,
                location: None,
            },
        ))
        .await
        .unwrap();

    ctx.connectivity.set_offline();
    ctx.queue.enqueue(WriteRequest::delete("/clients/1")).await.unwrap();
    ctx.queue.enqueue(WriteRequest::delete("/clients/2")).await.unwrap();
    notifier.drain();

    ctx.connectivity.set_online();
    let report = ctx.queue.replay().await.unwrap();
    assert!(report.halted);
    assert_eq!(report.retained.len(), 2);
    assert_eq!(srv.requests().len(), 1);
    assert!(ctx.connectivity.is_online());
    assert!(!ctx.credentials.is_authenticated());
    assert!(ctx.queue.dead_letters().await.is_empty());
    assert!(notifier.drain().iter().any(|n| n.level == Level::Warning));
}

#[tokio::test]
async fn queue_and_session_survive_reopening_the_state_store() {
    let state_path = std::env::temp_dir()
        .join("freightdesk-tests")
        .join(format!("{}.db", uuid::Uuid::now_v7()));
    let url = unreachable_url().await;
    let mut cfg = config(&url);
    cfg.state_path = Some(state_path.clone());

    {
        let ctx = AppContext::open(cfg.clone(), Arc::new(BufferedNotifier::new()))
            .await
            .unwrap();
        ctx.credentials
            .store(Credential::new(
                "persisted",
                UserProfile {
                    id: EntityId::new(8),
                    name: Some("Wanjiru".into()),
                    email: None,
                    role: Role::Admin,
                    location: None,
                },
            ))
            .await
            .unwrap();
        ctx.connectivity.set_offline();
        ctx.clients.add(&json!({"name": "Acme"})).await;
        ctx.clients.delete(EntityId::new(3)).await;
        assert_eq!(ctx.queue.len().await, 2);
    }

    let ctx = AppContext::open(cfg, Arc::new(BufferedNotifier::new()))
        .await
        .unwrap();
    assert_eq!(ctx.credentials.token().as_deref(), Some("persisted"));
    assert!(ctx.credentials.has_role(Role::Admin));

    let pending = ctx.queue.pending().await;
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].method, Method::Post);
    assert_eq!(pending[0].body, Some(RequestBody::json(json!({"name": "Acme"}))));
    assert_eq!(pending[1].path, "/clients/3");

    let _ = std::fs::remove_file(state_path);
}

#[tokio::test]
async fn monitor_replays_restored_queue_at_start() {
    let (srv, rows) = clients_backend().await;
    let (ctx, _) = context(&srv.base_url).await;

    ctx.connectivity.set_offline();
    ctx.clients.add(&client_json(0, "Restored")).await;
    ctx.connectivity.set_online();
    assert_eq!(ctx.queue.len().await, 1);

    let monitor = ctx.start_monitor();
    let drained = eventually(|| async { ctx.queue.is_empty().await }).await;
    assert!(drained);
    assert_eq!(rows.lock().unwrap().len(), 1);

    monitor.shutdown().await;
}

#[tokio::test]
async fn live_edit_waits_behind_a_retained_write() {
    let name = Arc::new(Mutex::new("Acme".to_string()));
    let puts = Arc::new(Mutex::new(Vec::<String>::new()));
    let (server_name, server_puts) = (name.clone(), puts.clone());
    let srv = MockBackend::spawn(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("PUT", "/clients/1") => {
            let sent = req.json.as_ref().and_then(|b| b["name"].as_str()).unwrap_or_default().to_string();
            let mut puts = server_puts.lock().unwrap();
            puts.push(sent.clone());
            if puts.len() == 1 {
                return Reply::json(503, json!({"message": "Maintenance"}));
            }
            *server_name.lock().unwrap() = sent.clone();
            Reply::ok(json!({"data": client_json(1, &sent)}))
        }
        ("GET", "/clients") => {
            let current = server_name.lock().unwrap().clone();
            Reply::ok(page(vec![client_json(1, &current)], 1, 1, 10, 1))
        }
        _ => Reply::json(404, json!({"message": "no route"})),
    })
    .await;
    let (ctx, _) = context(&srv.base_url).await;

    ctx.connectivity.set_offline();
    ctx.clients.edit(EntityId::new(1), &json!({"name": "OLD"})).await;
    ctx.connectivity.set_online();
    let first = ctx.queue.replay().await.unwrap();
    assert_eq!(first.retained.len(), 1);

    let outcome = ctx.clients.edit(EntityId::new(1), &json!({"name": "NEW"})).await;
    assert!(matches!(outcome, WriteOutcome::Queued(_)));
    let pending = ctx.queue.pending().await;
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[1].body, Some(RequestBody::json(json!({"name": "NEW"}))));

    let second = ctx.queue.replay().await.unwrap();
    assert_eq!(second.synced.len(), 2);
    assert_eq!(*puts.lock().unwrap(), vec!["OLD", "OLD", "NEW"]);
    assert_eq!(name.lock().unwrap().as_str(), "NEW");
    assert_eq!(ctx.clients.items().await[0].name, "NEW");
}

#[tokio::test]
async fn signing_in_again_resumes_a_halted_replay() {
    let srv = MockBackend::spawn(|req| match (req.method.as_str(), req.path.as_str()) {
        ("POST", "/auth/login") => Reply::ok(json!({
            "token": "fresh",
            "user": {"id": 1, "name": "Otieno", "email": "o@example.com", "role": "employee"}
        })),
        ("DELETE", "/clients/1") if req.authorization.as_deref() == Some("Bearer fresh") => {
            Reply::empty(204)
        }
        ("DELETE", "/clients/1") => Reply::json(401, json!({"message": "Unauthenticated."})),
        _ => Reply::ok(page(vec![], 1, 1, 10, 0)),
    })
    .await;
    let (ctx, _) = context(&srv.base_url).await;
    ctx.credentials
        .store(Credential::new(
            "stale",
            UserProfile {
                id: EntityId::new(1),
                name: None,
                email: None,
                role: Role::Employee,
                location: None,
            },
        ))
        .await
        .unwrap();

    ctx.connectivity.set_offline();
    ctx.queue.enqueue(WriteRequest::delete("/clients/1")).await.unwrap();
    let monitor = ctx.start_monitor();

    ctx.connectivity.set_online();
    let halted = eventually(|| async { !ctx.credentials.is_authenticated() }).await;
    assert!(halted, "the stale session was never rejected");
    assert_eq!(ctx.queue.len().await, 1);

    ctx.client.login("o@example.com", "pw").await.unwrap();
    let drained = eventually(|| async { ctx.queue.is_empty().await }).await;
    assert!(drained, "queued delete was not replayed after signing in");

    let deletes = srv.requests_to("DELETE", "/clients/1");
    assert_eq!(deletes.len(), 2);
    assert_eq!(deletes[1].authorization.as_deref(), Some("Bearer fresh"));
    assert!(ctx.queue.dead_letters().await.is_empty());

    monitor.shutdown().await;
}

#[tokio::test]
async fn monitor_retries_writes_kept_after_a_server_error() {
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let srv = MockBackend::spawn(move |_| {
        let mut n = counter.lock().unwrap();
        *n += 1;
        if *n == 1 {
            Reply::json(503, json!({"message": "Maintenance"}))
        } else {
            Reply::empty(204)
        }
    })
    .await;
    let mut cfg = config(&srv.base_url);
    cfg.replay_retry_interval = std::time::Duration::from_millis(50);
    let (ctx, _) = support::context_with(cfg).await;

    ctx.connectivity.set_offline();
    ctx.queue.enqueue(WriteRequest::delete("/cargo/5")).await.unwrap();
    let monitor = ctx.start_monitor();
    ctx.connectivity.set_online();

    let drained = eventually(|| async { ctx.queue.is_empty().await }).await;
    assert!(drained, "retained write was never retried");
    assert_eq!(srv.requests_to("DELETE", "/cargo/5").len(), 2);
    assert!(ctx.queue.dead_letters().await.is_empty());

    monitor.shutdown().await;
}

#[tokio::test]
async fn replayed_delete_of_a_missing_entity_counts_as_synced() {
    let srv = MockBackend::spawn(|_| Reply::json(404, json!({"message": "Client not found"}))).await;
    let (ctx, notifier) = context(&srv.base_url).await;

    ctx.connectivity.set_offline();
    ctx.queue.enqueue(WriteRequest::delete("/clients/9")).await.unwrap();
    notifier.drain();
    ctx.connectivity.set_online();

    let report = ctx.queue.replay().await.unwrap();
    assert_eq!(report.synced.len(), 1);
    assert!(report.dead_lettered.is_empty());
    assert!(ctx.queue.is_empty().await);
    assert!(ctx.queue.dead_letters().await.is_empty());
    assert!(notifier.drain().iter().all(|n| n.level != Level::Error));
}
