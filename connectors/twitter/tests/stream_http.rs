//! Stream variants against a mock streaming endpoint.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use birdwire_oauth::Token;
use birdwire_streaming::StreamError;
use birdwire_testkit::{MockStreamServer, init_test_tracing};
use birdwire_twitter::{
    FILTER_PATH, FilteredStream, Flow, SAMPLE_PATH, SimpleStream, StreamState, TweetStream,
    TwitterConfig, TwitterError,
};

const TWEET_ONE: &str =
    r#"{"id":1,"id_str":"1","text":"one","user":{"id":10,"screen_name":"alice"}}"#;
const TWEET_TWO: &str =
    r#"{"id":2,"id_str":"2","text":"two","user":{"id":11,"screen_name":"bob"}}"#;
const DELETION: &str =
    r#"{"delete":{"status":{"id":1,"id_str":"1","user_id":10,"user_id_str":"10"}}}"#;

fn config_for(mock: &MockStreamServer) -> TwitterConfig {
    TwitterConfig {
        consumer_key: "ck".into(),
        consumer_secret: "cs".into(),
        access_token: "at".into(),
        access_token_secret: "ats".into(),
        ..TwitterConfig::default()
    }
    .with_base_url(mock.base_url())
}

fn token_for(config: &TwitterConfig) -> Token {
    config.token().unwrap()
}

#[tokio::test]
async fn sample_stream_skips_deletions_until_processor_stops() {
    init_test_tracing();
    let mock = MockStreamServer::start().await;
    mock.stream_lines("GET", SAMPLE_PATH, &[TWEET_ONE, DELETION, "", TWEET_TWO])
        .await;

    let config = config_for(&mock);
    let stream = SimpleStream::from_config(&config);

    let mut seen = Vec::new();
    stream
        .start_stream(&token_for(&config), |tweet| {
            seen.push(tweet.text);
            Flow::from_continue(seen.len() < 2)
        })
        .await
        .unwrap();

    assert_eq!(seen, vec!["one", "two"]);
    assert_eq!(stream.state(), StreamState::Stop);

    let requests = mock.requests_to(SAMPLE_PATH).await;
    assert_eq!(requests.len(), 1);
    let auth = requests[0]
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(auth.starts_with("OAuth "));
    assert!(auth.contains(r#"oauth_consumer_key="ck""#));
    assert!(auth.contains(r#"oauth_token="at""#));
    assert!(auth.contains(r#"oauth_signature_method="HMAC-SHA1""#));
    assert!(!auth.contains("oauth_consumer_secret"));
    assert!(!auth.contains("oauth_token_secret"));
}

#[tokio::test]
async fn filtered_stream_posts_sorted_tracks() {
    init_test_tracing();
    let mock = MockStreamServer::start().await;
    mock.stream_lines_for_body("POST", FILTER_PATH, "track=rust%2Ctokio", &[DELETION, TWEET_ONE])
        .await;

    let config = config_for(&mock);
    let stream = FilteredStream::from_config(&config);
    stream.add_track("tokio");
    stream.add_track("rust");
    stream.add_track("rust");

    let mut seen = Vec::new();
    stream
        .start_stream(&token_for(&config), |tweet| {
            seen.push(tweet.id);
            Flow::Stop
        })
        .await
        .unwrap();

    assert_eq!(seen, vec![1]);

    let requests = mock.requests_to(FILTER_PATH).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, b"track=rust%2Ctokio");
    assert_eq!(
        requests[0]
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/x-www-form-urlencoded")
    );
}

#[tokio::test]
async fn rejected_credentials_fail_start_and_release_engine() {
    init_test_tracing();
    let mock = MockStreamServer::start().await;
    mock.expect_error(SAMPLE_PATH, 401, "Unauthorized").await;

    let config = config_for(&mock);
    let token = token_for(&config);
    let stream = SimpleStream::from_config(&config);

    for _ in 0..2 {
        let err = stream.start_stream_with(&token, |_| {}).await.unwrap_err();
        assert!(
            matches!(
                err,
                TwitterError::Stream(StreamError::HttpError { status: 401, .. })
            ),
            "unexpected error: {err}"
        );
        assert_eq!(stream.state(), StreamState::Stop);
    }
}

#[tokio::test]
async fn silent_endpoint_escalates_then_gives_up() {
    init_test_tracing();
    let mock = MockStreamServer::start().await;
    mock.stream_empty("GET", SAMPLE_PATH).await;

    let config = config_for(&mock);
    let stream = SimpleStream::from_config(&config);

    let mut calls = 0;
    tokio::time::timeout(
        Duration::from_secs(5),
        stream.start_stream_with(&token_for(&config), |_| calls += 1),
    )
    .await
    .expect("stream should give up on its own")
    .unwrap();

    assert_eq!(calls, 0);
    // initial open, reader reopen at the second silence, new connection at the third
    let requests = mock.requests_to(SAMPLE_PATH).await;
    assert_eq!(requests.len(), 3);
    assert_eq!(stream.state(), StreamState::Stop);

    // every open is signed afresh, so no nonce is replayed
    let signatures: HashSet<&str> = requests
        .iter()
        .filter_map(|r| r.headers.get("authorization"))
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert_eq!(signatures.len(), 3);
}

#[tokio::test]
async fn stop_from_another_task_ends_stream() {
    init_test_tracing();
    let mock = MockStreamServer::start().await;
    mock.stream_lines("GET", SAMPLE_PATH, &[TWEET_ONE]).await;

    let config = config_for(&mock);
    let token = token_for(&config);
    let stream = Arc::new(SimpleStream::from_config(&config));
    let delivered = Arc::new(AtomicUsize::new(0));

    let stopper = {
        let stream = Arc::clone(&stream);
        let delivered = Arc::clone(&delivered);
        tokio::spawn(async move {
            while delivered.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            stream.stop_stream();
        })
    };

    let counter = Arc::clone(&delivered);
    tokio::time::timeout(
        Duration::from_secs(5),
        stream.start_stream_with(&token, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .await
    .expect("stop should end the stream")
    .unwrap();

    stopper.await.unwrap();
    assert!(delivered.load(Ordering::SeqCst) >= 3);
    assert_eq!(stream.state(), StreamState::Stop);
}
