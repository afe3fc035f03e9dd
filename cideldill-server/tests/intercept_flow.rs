//! End-to-end runs of the interception protocol: a live server on an
//! ephemeral loopback port, the real client attached to it, and an
//! operator driven over the HTTP surface.
//!
//! The client's attach state is process-wide, so every test takes the
//! guard below and detaches on its way out.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use cideldill_proto::{
    actions::Action,
    calls::{CallId, CallStatus},
    codec,
    endpoints::operator::{Breakpoint, BreakpointRequest, DeliverRequest},
    value::ValueRef,
};
use cideldill_server::{config::Config, context::Context, methods};

static GUARD: Mutex<()> = Mutex::new(());

async fn boot() -> (String, Arc<Context>) {
    let context = Arc::new(Context::new(Config::default()));

    let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap())
        .serve(methods::router(context.clone()).into_make_service());
    let url = format!("http://{}", server.local_addr());

    tokio::spawn(server);

    (url, context)
}

async fn set_breakpoint(url: &str, breakpoint: Breakpoint) {
    reqwest::Client::new()
        .post(format!("{url}/api/breakpoint"))
        .json(&BreakpointRequest { breakpoint })
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
}

async fn wait_for_paused(context: &Context) -> CallId {
    for _ in 0..500 {
        if let Some(record) = context
            .calls
            .list()
            .into_iter()
            .find(|record| record.status == CallStatus::Paused)
        {
            return record.call_id;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("no call paused in time");
}

async fn deliver(url: &str, call_id: CallId, action: Action) {
    reqwest::Client::new()
        .post(format!("{url}/api/action/deliver"))
        .json(&DeliverRequest { call_id, action })
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
}

fn decoded_result(context: &Context, record: &cideldill_proto::calls::CallRecord) -> i64 {
    let cid = record.result_cid.clone().expect("record carries a result");
    let bytes = context.store.get(&cid).expect("result bytes in the store");

    codec::decode(bytes.as_bytes()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unbreakpointed_call_continues_and_reports() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    let client_url = url.clone();
    let sum = tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();
        cideldill_client::debug_call_as("add", |(a, b): (i64, i64)| a + b, (2, 3))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(sum, 5);

    let calls = context.calls.list();
    assert_eq!(calls.len(), 1);

    let record = &calls[0];
    assert_eq!(record.method_name, "add");
    assert_eq!(record.status, CallStatus::Completed);
    assert_eq!(record.args.len(), 2);
    assert_eq!(decoded_result(&context, record), 5);

    // argument bytes made it into the content store
    for cid in &record.args {
        assert!(context.store.contains(cid));
    }

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn paused_call_resumes_on_continue() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    set_breakpoint(&url, Breakpoint::Callable { name: "add".into() }).await;

    let client_url = url.clone();
    let host = tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();
        cideldill_client::debug_call_as("add", |(a, b): (i64, i64)| a + b, (2, 3))
    });

    let call_id = wait_for_paused(&context).await;
    deliver(&url, call_id, Action::Continue).await;

    assert_eq!(host.await.unwrap().unwrap(), 5);

    let calls = context.calls.list();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, CallStatus::Completed);
    assert_eq!(decoded_result(&context, &calls[0]), 5);

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn modified_arguments_reach_the_target() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    set_breakpoint(&url, Breakpoint::Callable { name: "add".into() }).await;

    let client_url = url.clone();
    let host = tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();
        cideldill_client::debug_call_as("add", |(a, b): (i64, i64)| a + b, (2, 3))
    });

    let call_id = wait_for_paused(&context).await;
    deliver(
        &url,
        call_id,
        Action::Modify {
            modified_args: vec![
                ValueRef::encoded(&10_i64).unwrap(),
                ValueRef::encoded(&20_i64).unwrap(),
            ],
            modified_kwargs: HashMap::new(),
        },
    )
    .await;

    assert_eq!(host.await.unwrap().unwrap(), 30);
    assert_eq!(decoded_result(&context, &context.calls.list()[0]), 30);

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn skipped_call_returns_the_fake_result() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    set_breakpoint(&url, Breakpoint::Callable { name: "add".into() }).await;

    let client_url = url.clone();
    let host = tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();
        cideldill_client::debug_call_as(
            "add",
            |(a, b): (i64, i64)| -> i64 { panic!("the target must not run when skipped: {a} {b}") },
            (2, 3),
        )
    });

    let call_id = wait_for_paused(&context).await;
    deliver(
        &url,
        call_id,
        Action::Skip {
            fake_result: ValueRef::encoded(&99_i64).unwrap(),
        },
    )
    .await;

    let result: i64 = host.await.unwrap().unwrap();
    assert_eq!(result, 99);
    assert_eq!(decoded_result(&context, &context.calls.list()[0]), 99);

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raise_injects_a_failure_without_running_the_target() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    set_breakpoint(&url, Breakpoint::Callable { name: "add".into() }).await;

    let client_url = url.clone();
    let host = tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();
        cideldill_client::debug_call_as(
            "add",
            |(a, b): (i64, i64)| -> i64 {
                panic!("the target must not run when raised over: {a} {b}")
            },
            (2, 3),
        )
    });

    let call_id = wait_for_paused(&context).await;
    deliver(
        &url,
        call_id,
        Action::Raise {
            exception_type: "ValueError".into(),
            exception_message: "no".into(),
        },
    )
    .await;

    let outcome: Result<i64, _> = host.await.unwrap();
    let error = outcome.unwrap_err();
    assert!(matches!(error, cideldill_client::DebugError::Injected(_)));
    assert_eq!(error.to_string(), "injected: ValueError: no");

    let calls = context.calls.list();
    assert_eq!(calls[0].status, CallStatus::Failed);

    let exception = calls[0].exception.clone().unwrap();
    assert_eq!(exception.type_, "ValueError");
    assert_eq!(exception.message, "no");

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replace_runs_the_registered_substitute() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    set_breakpoint(&url, Breakpoint::Callable { name: "add".into() }).await;

    let client_url = url.clone();
    let host = tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();
        cideldill_client::register_replacement("multiply", |(a, b): (i64, i64)| a * b).unwrap();
        cideldill_client::debug_call_as("add", |(a, b): (i64, i64)| a + b, (6, 7))
    });

    let call_id = wait_for_paused(&context).await;
    deliver(
        &url,
        call_id,
        Action::Replace {
            function_name: "multiply".into(),
        },
    )
    .await;

    assert_eq!(host.await.unwrap().unwrap(), 42);
    assert_eq!(decoded_result(&context, &context.calls.list()[0]), 42);

    // the substitute was announced through callable/register
    assert!(context.callables.get("multiply").is_some());

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restarted_server_triggers_resend_with_bytes() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());

    // pick a port we can bind twice
    let addr: SocketAddr = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    };
    let url = format!("http://{addr}");

    let first = Arc::new(Context::new(Config::default()));
    let serving = tokio::spawn(
        axum::Server::bind(&addr).serve(methods::router(first.clone()).into_make_service()),
    );

    let client_url = url.clone();
    let warmup = tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();
        cideldill_client::debug_call_as("add", |(a, b): (i64, i64)| a + b, (7, 8))
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(warmup, 15);

    // "restart": same address, empty stores, while the client keeps its
    // CID cache and so sends bare references first
    serving.abort();
    let _ = serving.await;

    let second = Arc::new(Context::new(Config::default()));
    let mut builder = None;
    for _ in 0..50 {
        match axum::Server::try_bind(&addr) {
            Ok(bound) => {
                builder = Some(bound);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let builder = builder.expect("address rebindable after shutdown");
    tokio::spawn(builder.serve(methods::router(second.clone()).into_make_service()));

    let replay = tokio::task::spawn_blocking(move || {
        // the first request after a restart may land on a dead pooled
        // connection; one retry gets a fresh one
        cideldill_client::debug_call_as("add", |(a, b): (i64, i64)| a + b, (7, 8)).or_else(|_| {
            cideldill_client::debug_call_as("add", |(a, b): (i64, i64)| a + b, (7, 8))
        })
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(replay, 15);

    // the second store was empty; the call only succeeded because the
    // client evicted and resent bytes after cid_not_found
    let calls = second.calls.list();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, CallStatus::Completed);
    for cid in &calls[0].args {
        assert!(second.store.contains(cid));
    }

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_get_distinct_ids_and_progress_independently() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    let client_url = url.clone();
    tokio::task::spawn_blocking(move || cideldill_client::attach_to(&client_url).unwrap())
        .await
        .unwrap();

    let mut hosts = Vec::new();
    for i in 0..8_i64 {
        hosts.push(tokio::task::spawn_blocking(move || {
            cideldill_client::debug_call_as("add", |(a, b): (i64, i64)| a + b, (i, i))
        }));
    }

    for (i, host) in hosts.into_iter().enumerate() {
        assert_eq!(host.await.unwrap().unwrap(), 2 * i as i64);
    }

    let calls = context.calls.list();
    assert_eq!(calls.len(), 8);
    assert!(calls
        .iter()
        .all(|record| record.status == CallStatus::Completed));

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_calls_follow_the_same_protocol() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    set_breakpoint(&url, Breakpoint::All).await;

    let client_url = url.clone();
    tokio::task::spawn_blocking(move || cideldill_client::attach_to(&client_url).unwrap())
        .await
        .unwrap();

    let host = tokio::spawn(async {
        cideldill_client::debug_call_as_async(
            "double",
            |(x,): (i64,)| async move { x * 2 },
            (21,),
        )
        .await
    });

    let call_id = wait_for_paused(&context).await;
    deliver(&url, call_id, Action::Continue).await;

    assert_eq!(host.await.unwrap().unwrap(), 42);
    assert_eq!(context.calls.list()[0].status, CallStatus::Completed);

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_inline_calls_register_once() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    let client_url = url.clone();
    tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();

        for _ in 0..3 {
            let sum =
                cideldill_client::debug_call_as("add", |(a, b): (i64, i64)| a + b, (1, 1)).unwrap();
            assert_eq!(sum, 2);
        }
    })
    .await
    .unwrap();

    assert_eq!(context.callables.list().len(), 1);
    assert_eq!(context.calls.list().len(), 3);

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wrapped_target_methods_round_trip() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Counter {
        count: i64,
    }

    let client_url = url.clone();
    let total = tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();

        let counter = cideldill_client::wrap(Counter { count: 40 });
        assert!(counter.is_intercepting());

        counter.call("bump", (2_i64,), |target, (by,)| target.count + by)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(total, 42);

    let calls = context.calls.list();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method_name, "bump");
    assert_eq!(
        calls[0].call_type,
        cideldill_proto::calls::CallType::Proxy
    );
    assert!(context.store.contains(&calls[0].target_cid));

    cideldill_client::detach();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exceptional_completion_holds_when_break_on_exception_is_armed() {
    let _guard = GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let (url, context) = boot().await;

    set_breakpoint(&url, Breakpoint::OnException).await;

    #[derive(Debug, thiserror::Error)]
    #[error("spilled: {0}")]
    struct Spill(i64);

    let client_url = url.clone();
    let host = tokio::task::spawn_blocking(move || {
        cideldill_client::attach_to(&client_url).unwrap();

        let bucket = cideldill_client::wrap(7_i64);
        bucket.try_call("pour", (9_i64,), |capacity, (amount,)| {
            if amount <= *capacity {
                Ok::<i64, Spill>(capacity - amount)
            } else {
                Err(Spill(amount - capacity))
            }
        })
    });

    // the outcome is recorded before the hold, and the hold has a live
    // rendezvous the operator can deliver into
    let call_id = 'held: {
        for _ in 0..500 {
            if let Some(record) = context
                .calls
                .list()
                .into_iter()
                .find(|record| record.status == CallStatus::Failed)
            {
                if context.pauses.is_paused(&record.call_id) {
                    break 'held record.call_id;
                }
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        panic!("no held exceptional completion in time");
    };

    deliver(&url, call_id, Action::Continue).await;

    let outcome = host.await.unwrap();
    match outcome {
        Err(cideldill_client::CallError::Host(error)) => {
            assert_eq!(error.to_string(), "spilled: 2");
        }
        other => panic!("expected the host error back, got {other:?}"),
    }

    let record = &context.calls.list()[0];
    assert_eq!(record.status, CallStatus::Failed);

    let exception = record.exception.clone().unwrap();
    assert_eq!(exception.type_, "Spill");
    assert_eq!(exception.message, "spilled: 2");

    cideldill_client::detach();
}
