//! # Integration Tests
//!
//! Cross-crate scenarios.
//!
//! Covers:
//! - Configuration text to running components
//! - Tailer -> queue -> dispatcher hand-off with a recording sink
//! - Full pipeline against a mocked Loki endpoint and the health server

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};

    use contracts::{ContractError, DataSink, LogEntry};

    /// Sink keeping every delivered entry in memory
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub entries: Arc<Mutex<Vec<LogEntry>>>,
        pub closed: Arc<Mutex<u32>>,
    }

    impl RecordingSink {
        pub fn messages(&self) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.message().to_string())
                .collect()
        }
    }

    impl DataSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn write(&mut self, entry: &LogEntry) -> Result<(), ContractError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            *self.closed.lock().unwrap() += 1;
            Ok(())
        }
    }

    pub fn append(path: &std::path::Path, text: &str) {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    /// Poll `condition` every 10ms for up to 5s
    pub async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("condition not met within 5s");
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::SinkConfig;
    use tailer::TailerConfig;

    #[test]
    fn test_config_text_drives_component_settings() {
        let text = r#"
[agent]
node_name = "worker-7"

[collection]
log_paths = ["/var/log/app/*.log", "/var/log/app/["]
interval_ms = 250
batch_size = 10
max_line_length = 64

[dispatch]
delivery_timeout_ms = 1500

[sink]
type = "loki"
url = "http://loki:3100/loki/api/v1/push"
tenant_id = "team-a"
"#;
        let config = ConfigLoader::load_from_str(text, ConfigFormat::Toml).unwrap();
        assert_eq!(ConfigLoader::malformed_patterns(&config).len(), 1);

        let tailer = TailerConfig::from(&config.collection);
        assert_eq!(tailer.batch_size, 10);
        assert_eq!(tailer.max_line_length, 64);
        assert_eq!(tailer.interval.as_millis(), 250);

        let dispatch = dispatcher::DispatcherConfig::from(&config.dispatch);
        assert_eq!(dispatch.delivery_timeout.as_millis(), 1500);

        match config.sink {
            SinkConfig::Loki(loki) => assert_eq!(loki.tenant_id.as_deref(), Some("team-a")),
            other => panic!("unexpected sink: {other:?}"),
        }
    }
}

#[cfg(test)]
mod handoff_tests {
    use contracts::LogEntry;
    use dispatcher::{Dispatcher, DispatcherConfig};
    use observability::AgentMetrics;
    use tailer::{Tailer, TailerConfig};
    use tokio_util::sync::CancellationToken;

    use crate::support::{append, eventually, RecordingSink};

    /// Tailer -> bounded queue -> Dispatcher -> sink, in file order
    #[tokio::test]
    async fn test_lines_flow_to_sink_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        append(&log, "one\ntwo\n");

        let config = TailerConfig {
            // A malformed pattern is skipped, the valid one keeps working
            patterns: vec![
                dir.path().join("[").display().to_string(),
                dir.path().join("*.log").display().to_string(),
            ],
            interval: std::time::Duration::from_millis(20),
            batch_size: 1,
            max_line_length: 8,
            ..Default::default()
        };
        let metrics = AgentMetrics::new("node-1");
        // Capacity 1 forces the tailer to wait on the dispatcher
        let (tx, rx) = async_channel::bounded::<LogEntry>(1);
        let tailer = Tailer::new(config, "node-1", tx, metrics.clone()).unwrap();

        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(sink.clone(), rx, DispatcherConfig::default(), metrics);

        let cancel = CancellationToken::new();
        let tailer_task = tokio::spawn(tailer.run(cancel.clone()));
        let dispatcher_task = tokio::spawn(dispatcher.run(cancel.clone()));

        eventually(|| sink.messages().len() == 2).await;
        append(&log, "three\nthis line is long\n");
        eventually(|| sink.messages().len() == 4).await;

        cancel.cancel();
        let stats = tailer_task.await.unwrap().unwrap();
        let snapshot = dispatcher_task.await.unwrap().unwrap();

        assert_eq!(sink.messages(), vec!["one", "two", "three", "this lin"]);
        let entries = sink.entries.lock().unwrap();
        assert!(entries[3].is_truncated());
        assert!(entries.iter().all(|e| e.node_name() == "node-1"));
        assert!(entries.iter().all(|e| e.source() == log.display().to_string()));
        assert_eq!(stats.lines_emitted, 4);
        assert_eq!(snapshot.write_count, 4);
        assert_eq!(*sink.closed.lock().unwrap(), 1);
    }
}

#[cfg(test)]
mod pipeline_tests {
    use std::time::Duration;

    use contracts::{AgentConfig, LokiConfig, SinkConfig};
    use logship_cli::{Pipeline, PipelineState};
    use mockito::{Matcher, Server};

    use crate::support::{append, eventually};

    fn loki_config(dir: &tempfile::TempDir, server: &Server) -> AgentConfig {
        let pattern = dir.path().join("*.log").display().to_string();
        let mut config = AgentConfig::for_paths("node-1", vec![pattern]);
        config.collection.interval_ms = 20;
        config.http_server.address = "127.0.0.1:0".to_string();
        config.agent.app_name = "logging-agent".to_string();

        let mut loki = LokiConfig::new(format!("{}/loki/api/v1/push", server.url()));
        loki.batch_wait_ms = 50;
        loki.tenant_id = Some("team-a".to_string());
        config.sink = SinkConfig::Loki(loki);
        config
    }

    /// File lines reach Loki with agent labels; health reports readiness
    #[tokio::test]
    async fn test_pipeline_ships_to_loki() {
        let mut server = Server::new_async().await;
        let ready = server
            .mock("GET", "/ready")
            .with_status(200)
            .create_async()
            .await;
        let push = server
            .mock("POST", "/loki/api/v1/push")
            .match_header("x-scope-orgid", "team-a")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""app":"logging-agent""#.to_string()),
                Matcher::Regex(r#""node":"node-1""#.to_string()),
                Matcher::Regex(r#""level":"info""#.to_string()),
                Matcher::Regex("hello loki".to_string()),
            ]))
            .with_status(204)
            .expect_at_least(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        append(&dir.path().join("app.log"), "hello loki\n");

        let pipeline = Pipeline::build(
            loki_config(&dir, &server),
            observability::init_metrics().unwrap(),
        )
        .await
        .unwrap();
        ready.assert_async().await;

        let health = format!("http://{}", pipeline.health_addr());
        let mut state = pipeline.state();
        let stop = pipeline.stop_handle();
        let run = tokio::spawn(pipeline.run_until(std::future::pending()));

        state
            .wait_for(|s| *s == PipelineState::Running)
            .await
            .unwrap();
        let status = reqwest::get(format!("{health}/status")).await.unwrap();
        assert_eq!(status.status().as_u16(), 200);

        let mut matched = false;
        for _ in 0..500 {
            if push.matched_async().await {
                matched = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matched, "no push received");

        stop.stop();
        let stats = run.await.unwrap().unwrap();
        assert_eq!(stats.lines_read, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(*state.borrow(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn test_unready_loki_prevents_start() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/ready")
            .with_status(503)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = Pipeline::build(
            loki_config(&dir, &server),
            observability::init_metrics().unwrap(),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_health_endpoints_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.log").display().to_string();
        let mut config = AgentConfig::for_paths("node-1", vec![pattern]);
        config.http_server.address = "127.0.0.1:0".to_string();

        let pipeline = Pipeline::build(config, observability::init_metrics().unwrap())
            .await
            .unwrap();
        let health = format!("http://{}", pipeline.health_addr());
        let mut state = pipeline.state();
        let stop = pipeline.stop_handle();
        let run = tokio::spawn(pipeline.run_until(std::future::pending()));

        state
            .wait_for(|s| *s == PipelineState::Running)
            .await
            .unwrap();

        let healthz = reqwest::get(format!("{health}/healthz")).await.unwrap();
        assert_eq!(healthz.status().as_u16(), 200);
        let metrics = reqwest::get(format!("{health}/metrics")).await.unwrap();
        assert_eq!(metrics.status().as_u16(), 200);

        stop.stop();
        run.await.unwrap().unwrap();
        eventually(|| *state.borrow() == PipelineState::Stopped).await;
    }
}
