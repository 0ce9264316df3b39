//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载 -> Dispatcher 构造 -> 真实 HTTP 投递
//! - 轮询切换与重试上限在真实连接上的行为
//! - 并发投递共享游标

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::{
        create_dispatcher, AttemptError, DispatcherBuilder, DispatcherError, RoundRobin,
    };
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use mockito::Matcher;
    use observability::{DeliveryOutcome, DeliveryStatsAggregator};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn unused_addr() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    fn starting_at(hosts: usize, start: usize) -> RoundRobin {
        RoundRobin::starting_at(NonZeroUsize::new(hosts).unwrap(), start)
    }

    /// Config text -> ConfigLoader -> create_dispatcher -> wire
    ///
    /// 验证请求方法、路径、查询、请求头与解压后的请求体
    #[tokio::test]
    async fn test_e2e_config_to_wire() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/v1/ingest")
            .match_query(Matcher::UrlEncoded("source".into(), "relay".into()))
            .match_header("content-type", "application/json")
            .match_header("x-source", "gzrelay")
            .match_header("content-encoding", Matcher::Missing)
            .match_body(r#"{"events":[1,2,3]}"#)
            .with_status(202)
            .expect(1)
            .create_async()
            .await;

        let config = format!(
            r#"
[target]
hosts = ["{host}"]
context_path = "/api/v1/ingest?source=relay"
method = "PUT"
success_codes = [200, 202]

[target.headers]
Content-Type = ["application/json"]
X-Source = ["gzrelay"]

[retry]
max_attempts = 3
"#,
            host = server.host_with_port()
        );

        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();
        let dispatcher = create_dispatcher(&blueprint).unwrap();

        let payload = gzip(br#"{"events":[1,2,3]}"#);
        let report = dispatcher.deliver(&mut payload.as_slice()).await.unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(report.status.as_u16(), 202);
        assert_eq!(report.bytes, 18);
        mock.assert_async().await;
    }

    /// hosts = [A, B, C]；A、B 返回 500，C 返回 200
    #[tokio::test]
    async fn test_e2e_round_robin_failover() {
        let mut a = mockito::Server::new_async().await;
        let mut b = mockito::Server::new_async().await;
        let mut c = mockito::Server::new_async().await;

        let mock_a = a.mock("POST", "/ingest").with_status(500).expect(1).create_async().await;
        let mock_b = b.mock("POST", "/ingest").with_status(500).expect(1).create_async().await;
        let mock_c = c.mock("POST", "/ingest").with_status(200).expect(1).create_async().await;

        let mut target = contracts::TargetConfig::new(
            vec![a.host_with_port(), b.host_with_port(), c.host_with_port()],
            "/ingest",
        );
        target.success_codes = vec![200, 204];

        let dispatcher = DispatcherBuilder::new(target)
            .selector(starting_at(3, 0))
            .build()
            .unwrap();

        let payload = gzip(b"payload");
        let report = dispatcher.deliver(&mut payload.as_slice()).await.unwrap();

        assert_eq!(report.attempts, 3);
        assert_eq!(report.host, c.host_with_port());
        assert_eq!(dispatcher.cursor(), 2);
        mock_a.assert_async().await;
        mock_b.assert_async().await;
        mock_c.assert_async().await;
    }

    /// 连接被拒绝与非成功状态码同样触发切换
    #[tokio::test]
    async fn test_e2e_connection_refused_fails_over() {
        let mut live = mockito::Server::new_async().await;
        let mock = live.mock("POST", "/ingest").with_status(200).expect(1).create_async().await;

        let target =
            contracts::TargetConfig::new(vec![unused_addr(), live.host_with_port()], "/ingest");
        let dispatcher = DispatcherBuilder::new(target)
            .selector(starting_at(2, 0))
            .build()
            .unwrap();

        let payload = gzip(b"x");
        let report = dispatcher.deliver(&mut payload.as_slice()).await.unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(report.host_index, 1);
        assert_eq!(dispatcher.metrics().failures, 1);
        mock.assert_async().await;
    }

    /// 配置了 max_attempts 时返回 GaveUp
    #[tokio::test]
    async fn test_e2e_give_up_after_max_attempts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/ingest")
            .with_status(503)
            .expect(4)
            .create_async()
            .await;

        let json = format!(
            r#"{{
                "target": {{ "hosts": ["{}"], "context_path": "/ingest" }},
                "retry": {{ "max_attempts": 4 }}
            }}"#,
            server.host_with_port()
        );
        let blueprint = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        let dispatcher = create_dispatcher(&blueprint).unwrap();

        let payload = gzip(b"x");
        let err = dispatcher
            .deliver(&mut payload.as_slice())
            .await
            .unwrap_err();

        match err {
            DispatcherError::GaveUp {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert!(matches!(
                    last_error,
                    AttemptError::UnexpectedStatus { status: 503, .. }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        mock.assert_async().await;
    }

    /// 非 gzip 输入不产生任何请求
    #[tokio::test]
    async fn test_e2e_malformed_payload_sends_nothing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/ingest").expect(0).create_async().await;

        let target = contracts::TargetConfig::new(vec![server.host_with_port()], "/ingest");
        let dispatcher = DispatcherBuilder::new(target).build().unwrap();

        let err = dispatcher
            .deliver(&mut &b"{\"plain\":true}"[..])
            .await
            .unwrap_err();

        assert!(matches!(err, DispatcherError::MalformedPayload { .. }));
        mock.assert_async().await;
    }

    /// 多个任务共享同一个 Dispatcher
    #[tokio::test]
    async fn test_e2e_concurrent_deliveries() {
        let mut a = mockito::Server::new_async().await;
        let mut b = mockito::Server::new_async().await;
        let mock_a = a.mock("POST", "/ingest").with_status(200).expect_at_least(1).create_async().await;
        let _mock_b = b.mock("POST", "/ingest").with_status(500).create_async().await;

        let target =
            contracts::TargetConfig::new(vec![b.host_with_port(), a.host_with_port()], "/ingest");
        let dispatcher = Arc::new(
            DispatcherBuilder::new(target)
                .selector(starting_at(2, 0))
                .build()
                .unwrap(),
        );

        let payload = Arc::new(gzip(b"shared"));
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                let payload = Arc::clone(&payload);
                tokio::spawn(async move { dispatcher.deliver(&mut payload.as_slice()).await })
            })
            .collect();

        let mut aggregator = DeliveryStatsAggregator::new();
        for task in tasks {
            let report = task.await.unwrap().unwrap();
            assert_eq!(report.host, a.host_with_port());
            aggregator.update(&DeliveryOutcome::Delivered {
                host: &report.host,
                attempts: report.attempts,
                latency: report.elapsed,
                bytes: report.bytes,
            });
        }

        // Concurrent failures on host 0 advance the cursor once
        assert_eq!(dispatcher.cursor(), 1);
        assert_eq!(aggregator.delivered, 16);
        assert_eq!(aggregator.accepted_by_host.get(&a.host_with_port()), Some(&16));
        mock_a.assert_async().await;
    }
}
