//! End-to-end timeout behavior over real sockets.
//!
//! Delays and deadlines are scaled down from the stock endpoint table so the
//! suite runs in a few seconds; the ratios between them are kept.

use bytes::Bytes;
use std::time::{Duration, Instant};

use deadline_server::config::{
    default_endpoints, DeadlineConfig, EndpointConfig, HttpMethod, Shape,
};
use deadline_server::exchange::{LifecycleEvent, TimeoutKind};
use deadline_server::Phase;

mod common;

use common::{fresh_client, start_server};

const WAIT: Duration = Duration::from_secs(5);

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test]
async fn root_answers_without_any_deadline() {
    let server = start_server(vec![
        EndpointConfig::new(HttpMethod::Get, "/", Shape::Immediate).reply(200, "Hello World!")
    ])
    .await;

    let res = fresh_client().get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Hello World!");

    let released = server.wait_for_released(1, WAIT).await;
    assert_eq!(released[0].1, Phase::Completed);
    assert!(server.recorder.timeouts(TimeoutKind::Read).is_empty());
    assert!(server.recorder.timeouts(TimeoutKind::Write).is_empty());
}

#[tokio::test]
async fn immediate_reply_beats_both_deadlines() {
    let server = start_server(vec![EndpointConfig::new(HttpMethod::Post, "/data2", Shape::Immediate)
        .reply(200, "Sent our response immediately.")
        .read_deadline(DeadlineConfig::log(300))
        .write_deadline(DeadlineConfig::log(300))])
    .await;

    let res = fresh_client()
        .post(server.url("/data2"))
        .body("some payload")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Sent our response immediately.");

    let released = server.wait_for_released(1, WAIT).await;
    assert_eq!(released[0].1, Phase::Completed);

    tokio::time::sleep(ms(500)).await;
    assert!(server.recorder.timeouts(TimeoutKind::Read).is_empty());
    assert!(server.recorder.timeouts(TimeoutKind::Write).is_empty());
}

#[tokio::test]
async fn respond_deadline_sends_503_before_the_handler_finishes() {
    let server = start_server(vec![EndpointConfig::new(HttpMethod::Get, "/three", Shape::Delayed)
        .delay(1_500)
        .reply(200, "Took 3 seconds to load")
        .write_deadline(DeadlineConfig::respond(300, 503))])
    .await;

    let started = Instant::now();
    let res = fresh_client().get(server.url("/three")).send().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(res.status(), 503);
    assert!(elapsed >= ms(300), "answered too early: {elapsed:?}");
    assert!(elapsed < ms(1_500), "handler delay was not cut short: {elapsed:?}");
    assert!(!res.text().await.unwrap().is_empty());

    let released = server.wait_for_released(1, WAIT).await;
    assert_eq!(released[0].1, Phase::WriteTimedOut);
    assert_eq!(server.recorder.timeouts(TimeoutKind::Write).len(), 1);
}

#[tokio::test]
async fn no_deadline_lets_a_slow_handler_finish() {
    let server = start_server(vec![EndpointConfig::new(HttpMethod::Get, "/ten", Shape::Delayed)
        .delay(400)
        .reply(200, "Took 10 seconds to load")])
    .await;

    let started = Instant::now();
    let res = fresh_client().get(server.url("/ten")).send().await.unwrap();
    assert!(started.elapsed() >= ms(400));
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Took 10 seconds to load");

    let released = server.wait_for_released(1, WAIT).await;
    assert_eq!(released[0].1, Phase::Completed);
    assert!(server.recorder.timeouts(TimeoutKind::Write).is_empty());
}

#[tokio::test]
async fn abort_deadline_closes_the_connection_without_a_response() {
    let server = start_server(vec![EndpointConfig::new(HttpMethod::Get, "/five", Shape::Delayed)
        .delay(1_500)
        .reply(200, "Took 5 seconds to load")
        .write_deadline(DeadlineConfig::abort(300))])
    .await;

    let started = Instant::now();
    let result = fresh_client().get(server.url("/five")).send().await;
    assert!(result.is_err(), "expected a transport error, got {result:?}");
    assert!(started.elapsed() < ms(1_500));

    let released = server.wait_for_released(1, WAIT).await;
    let (id, phase) = released[0];
    assert_eq!(phase, Phase::WriteTimedOut);
    let events = server.recorder.events_for(id);
    assert!(events.contains(&LifecycleEvent::Aborted));
    assert!(events.iter().all(|event| !matches!(
        event,
        LifecycleEvent::Released { response_sent: true, .. }
    )));
}

#[tokio::test]
async fn unread_body_and_slow_reply_log_both_timeouts() {
    let server = start_server(vec![EndpointConfig::new(HttpMethod::Post, "/data1", Shape::Delayed)
        .delay(800)
        .reply(201, "Took 2 seconds to send our response.")
        .read_deadline(DeadlineConfig::log(200))
        .write_deadline(DeadlineConfig::log(200))])
    .await;

    let res = fresh_client()
        .post(server.url("/data1"))
        .body("never read")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(res.text().await.unwrap(), "Took 2 seconds to send our response.");

    let released = server.wait_for_released(1, WAIT).await;
    let id = released[0].0;
    assert_eq!(server.recorder.timeouts(TimeoutKind::Read).len(), 1);
    assert_eq!(server.recorder.timeouts(TimeoutKind::Write).len(), 1);

    let terminals = server.recorder.terminal_phases(id);
    assert_eq!(terminals.len(), 1);
    assert!(matches!(
        terminals[0],
        Phase::ReadTimedOut | Phase::WriteTimedOut
    ));
}

#[tokio::test]
async fn slow_upload_trips_the_read_deadline_exactly_once() {
    let server = start_server(vec![EndpointConfig::new(HttpMethod::Post, "/data3", Shape::StreamingRead)
        .reply(201, "Received the file!")
        .read_deadline(DeadlineConfig::log(200))
        .write_deadline(DeadlineConfig::log(200))])
    .await;

    // Five chunks, 100ms apart: each gap is under the deadline, the total is not.
    let chunks = futures_util::stream::unfold(0u8, |sent| async move {
        if sent == 5 {
            return None;
        }
        tokio::time::sleep(ms(100)).await;
        Some((Ok::<_, std::io::Error>(Bytes::from_static(b"chunk")), sent + 1))
    });

    let res = fresh_client()
        .post(server.url("/data3"))
        .body(reqwest::Body::wrap_stream(chunks))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(res.text().await.unwrap(), "Received the file!");

    let released = server.wait_for_released(1, WAIT).await;
    assert_eq!(released[0].1, Phase::ReadTimedOut);
    assert_eq!(server.recorder.timeouts(TimeoutKind::Read).len(), 1);
    assert!(server.recorder.timeouts(TimeoutKind::Write).is_empty());
}

#[tokio::test]
async fn delayed_upload_reply_trips_the_write_deadline() {
    let server = start_server(vec![EndpointConfig::new(HttpMethod::Post, "/data4", Shape::StreamingRead)
        .delay(600)
        .reply(201, "Received the file!")
        .read_deadline(DeadlineConfig::log(2_000))
        .write_deadline(DeadlineConfig::log(200))])
    .await;

    let res = fresh_client()
        .post(server.url("/data4"))
        .body("small file")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    let released = server.wait_for_released(1, WAIT).await;
    assert_eq!(released[0].1, Phase::WriteTimedOut);
    assert!(server.recorder.timeouts(TimeoutKind::Read).is_empty());
    let writes = server.recorder.timeouts(TimeoutKind::Write);
    assert_eq!(writes.len(), 1);
    assert!(writes[0].1 >= ms(200));
}

#[tokio::test]
async fn keep_alive_exchanges_share_a_connection() {
    let server = start_server(vec![
        EndpointConfig::new(HttpMethod::Get, "/", Shape::Immediate).reply(200, "Hello World!")
    ])
    .await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    for _ in 0..2 {
        let res = client.get(server.url("/")).send().await.unwrap();
        assert_eq!(res.text().await.unwrap(), "Hello World!");
    }

    let released = server.wait_for_released(2, WAIT).await;
    let (first, second) = (released[0].0, released[1].0);
    assert_eq!(first.connection(), second.connection());
    assert_eq!((first.sequence(), second.sequence()), (1, 2));
}

#[tokio::test]
async fn unknown_path_opens_no_exchange() {
    let server = start_server(vec![
        EndpointConfig::new(HttpMethod::Get, "/", Shape::Immediate).reply(200, "Hello World!")
    ])
    .await;

    let res = fresh_client().get(server.url("/missing")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    tokio::time::sleep(ms(100)).await;
    assert!(server.recorder.events().is_empty());
}

#[tokio::test]
async fn head_request_completes_its_exchange() {
    let server = start_server(vec![
        EndpointConfig::new(HttpMethod::Get, "/", Shape::Immediate).reply(200, "Hello World!")
    ])
    .await;

    let res = fresh_client().head(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let released = server.wait_for_released(1, WAIT).await;
    assert_eq!(released[0].1, Phase::Completed);
    assert_eq!(
        server.recorder.terminal_phases(released[0].0),
        vec![Phase::Completed]
    );
}

#[tokio::test]
async fn client_hanging_up_mid_exchange_aborts_it() {
    let server = start_server(vec![EndpointConfig::new(HttpMethod::Get, "/ten", Shape::Delayed)
        .delay(2_000)
        .reply(200, "Took 10 seconds to load")])
    .await;

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(ms(200))
        .build()
        .unwrap();
    let started = Instant::now();
    assert!(client.get(server.url("/ten")).send().await.is_err());

    let released = server.wait_for_released(1, WAIT).await;
    assert!(started.elapsed() < ms(2_000), "handler was not dropped early");
    let (id, phase) = released[0];
    assert_eq!(phase, Phase::Aborted);
    assert_eq!(server.recorder.terminal_phases(id), vec![Phase::Aborted]);
    assert!(server.recorder.timeouts(TimeoutKind::Write).is_empty());
}

#[tokio::test]
async fn one_millisecond_read_deadline_on_a_slow_upload_logs_both_timeouts() {
    let server = start_server(vec![EndpointConfig::new(HttpMethod::Post, "/data4", Shape::StreamingRead)
        .delay(600)
        .reply(201, "Received the file!")
        .read_deadline(DeadlineConfig::log(1))
        .write_deadline(DeadlineConfig::log(200))])
    .await;

    let chunks = futures_util::stream::unfold(0u8, |sent| async move {
        if sent == 3 {
            return None;
        }
        tokio::time::sleep(ms(50)).await;
        Some((Ok::<_, std::io::Error>(Bytes::from_static(b"chunk")), sent + 1))
    });
    let res = fresh_client()
        .post(server.url("/data4"))
        .body(reqwest::Body::wrap_stream(chunks))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(res.text().await.unwrap(), "Received the file!");

    let released = server.wait_for_released(1, WAIT).await;
    let (id, phase) = released[0];
    assert_eq!(phase, Phase::ReadTimedOut);
    assert_eq!(server.recorder.terminal_phases(id), vec![Phase::ReadTimedOut]);
    assert_eq!(server.recorder.timeouts(TimeoutKind::Read).len(), 1);
    assert_eq!(server.recorder.timeouts(TimeoutKind::Write).len(), 1);
}

#[tokio::test]
async fn stock_endpoint_table_behaves_as_configured() {
    let server = start_server(default_endpoints()).await;
    let client = fresh_client();

    let root = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(root.text().await.unwrap(), "Hello World!");
    let released = server.wait_for_released(1, WAIT).await;
    assert_eq!(released[0].1, Phase::Completed);

    let three = client.get(server.url("/three")).send().await.unwrap();
    assert_eq!(three.status(), 503);
    let released = server.wait_for_released(2, WAIT).await;
    assert_eq!(released[1].1, Phase::WriteTimedOut);

    let data4 = client
        .post(server.url("/data4"))
        .body("small file")
        .send()
        .await
        .unwrap();
    assert_eq!(data4.status(), 201);
    assert_eq!(data4.text().await.unwrap(), "Received the file!");
    let released = server.wait_for_released(3, WAIT).await;
    let (id, phase) = released[2];

    // The body arrives with the head, so it is normally drained inside the 1ms
    // read deadline and the write deadline decides the outcome.
    let read_fired = server
        .recorder
        .timeouts(TimeoutKind::Read)
        .iter()
        .any(|(timed_out, _)| *timed_out == id);
    let expected = if read_fired {
        Phase::ReadTimedOut
    } else {
        Phase::WriteTimedOut
    };
    assert_eq!(phase, expected);
    assert_eq!(server.recorder.terminal_phases(id), vec![expected]);
    let writes: Vec<_> = server
        .recorder
        .timeouts(TimeoutKind::Write)
        .into_iter()
        .filter(|(timed_out, _)| *timed_out == id)
        .collect();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].1 >= ms(500));
}
