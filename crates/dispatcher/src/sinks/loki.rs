//! LokiSink - maps entries to labeled lines for the Loki client

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{ContractError, DataSink, LogEntry, LokiConfig};
use tracing::{debug, instrument};

use crate::loki::{LabelSet, LokiClient, LokiEntry, LokiError};

/// Sink forwarding entries into the Loki client's ingestion channel
pub struct LokiSink {
    name: String,
    client: LokiClient,
    app_name: String,
    external_labels: BTreeMap<String, String>,
}

impl LokiSink {
    /// Connect the client and build the sink
    ///
    /// # Errors
    /// Propagates client construction failures.
    pub async fn connect(config: LokiConfig, app_name: impl Into<String>) -> Result<Self, LokiError> {
        let external_labels = config.external_labels.clone();
        let client = LokiClient::connect(config).await?;
        Ok(Self {
            name: "loki".to_string(),
            client,
            app_name: app_name.into(),
            external_labels,
        })
    }

    pub fn client(&self) -> &LokiClient {
        &self.client
    }

    /// Stream labels of an entry
    ///
    /// Entry labels win over external labels with the same key.
    pub fn labels_for(&self, entry: &LogEntry) -> LabelSet {
        let mut labels = self.external_labels.clone();
        labels.insert("app".to_string(), self.app_name.clone());
        labels.insert("node".to_string(), entry.node_name().to_string());
        labels.insert("source".to_string(), entry.source().to_string());
        labels.insert("level".to_string(), entry.level().to_string());
        labels
    }
}

impl DataSink for LokiSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, entry: &LogEntry) -> Result<(), ContractError> {
        let line = LokiEntry::new(
            Arc::new(self.labels_for(entry)),
            entry.timestamp(),
            entry.display_message(),
        );
        self.client.send(line).await.map_err(|e| match e {
            LokiError::Closed => ContractError::sink_broken(&self.name, e.to_string()),
            other => ContractError::sink_write(&self.name, other.to_string()),
        })
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Batches flush on size or age inside the client
        Ok(())
    }

    #[instrument(name = "loki_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.client
            .stop()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        debug!("LokiSink closed");
        Ok(())
    }
}
