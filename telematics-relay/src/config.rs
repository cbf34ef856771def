use serde::{Deserialize, Serialize};
use telematics_sim::config::{load_yaml_or_default, override_parsed, MqttConf, DEFAULT_TOPIC};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub mqtt: MqttConf,
    pub topic: String,
    pub http_port: u16,
    /// Events a client may fall behind before it starts skipping.
    pub client_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf { client_id: "telematics-relay".into(), ..MqttConf::default() },
            topic: DEFAULT_TOPIC.into(),
            http_port: 5005,
            client_buffer: 256,
        }
    }
}

impl RelayConfig {
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.mqtt.apply_env_overrides(&lookup);
        if let Some(topic) = lookup("TELEMATICS_TOPIC") {
            self.topic = topic;
        }
        override_parsed(&lookup, "TELEMATICS_RELAY_HTTP_PORT", &mut self.http_port);
        override_parsed(&lookup, "TELEMATICS_RELAY_CLIENT_BUFFER", &mut self.client_buffer);
    }
}

pub async fn load_config() -> RelayConfig {
    let path = std::env::var("TELEMATICS_RELAY_CONFIG").unwrap_or_else(|_| "telematics-relay.yaml".into());
    let mut cfg: RelayConfig = load_yaml_or_default(&path).await;
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    cfg
}
