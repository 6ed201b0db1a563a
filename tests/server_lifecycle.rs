//! Real listener, real client, graceful shutdown.

use std::time::Duration;

use admission_gate::backend::Backends;
use admission_gate::http::HttpServer;
use admission_gate::lifecycle::Shutdown;

mod common;

#[tokio::test]
async fn test_serves_and_shuts_down_gracefully() {
    let upstream = common::start_echo_upstream().await;
    let config = common::test_config(upstream);
    let backends = Backends::from_shared(common::memory_backend(&config));

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, backends).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gate_addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    let res = client
        .get(format!("http://{gate_addr}/products"))
        .header("x-vercel-ip-country", "MR")
        .send()
        .await
        .expect("gate unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-ratelimit-limit"], "100");
    assert!(res.headers().get("x-request-id").is_some());

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Bind and drop to get a port nothing listens on.
    let dead = {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let config = common::test_config(dead);
    let app = common::app_with(config.clone(), Backends::from_shared(common::memory_backend(&config)));

    let res = common::send(
        &app,
        common::local_request("GET", "/products")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), 502);
}
