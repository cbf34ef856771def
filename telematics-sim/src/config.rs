use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    pub mqtt: MqttConf,
    pub topic: String,
    pub tick_period_ms: u64,
    pub message_expiry_secs: u32,
    pub publish_timeout_ms: u64,
    pub vehicle_count: usize,
    pub geofence: Geofence,
    pub http_port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

/// Square area (in degrees) vehicles are placed in: `center ± radius` on
/// each axis.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Geofence {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

pub const DEFAULT_TOPIC: &str = "telematics/data";

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf::default(),
            topic: DEFAULT_TOPIC.into(),
            tick_period_ms: 1000,
            message_expiry_secs: 60,
            publish_timeout_ms: 1000,
            vehicle_count: 10,
            geofence: Geofence::default(),
            http_port: 5008,
        }
    }
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "telematics-sim".into(),
            keep_alive_secs: 60,
        }
    }
}

// Paris
impl Default for Geofence {
    fn default() -> Self {
        Self { latitude: 48.8566, longitude: 2.3522, radius: 0.1 }
    }
}

impl Geofence {
    /// Uniform point inside the fence, rounded to 6 decimals.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        let r = if self.radius.is_finite() { self.radius.abs() } else { 0.0 };
        let lat = self.latitude + rng.gen_range(-r..=r);
        let lon = self.longitude + rng.gen_range(-r..=r);
        (round6(lat), round6(lon))
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        // rounding to 6 decimals can push a point by half a micro-degree
        let r = self.radius.abs() + 1e-6;
        (latitude - self.latitude).abs() <= r && (longitude - self.longitude).abs() <= r
    }

    /// Replaces non-finite coordinates or radius with the default value,
    /// logging each rejected field.
    pub fn sanitize(&mut self) {
        let fallback = Geofence::default();
        let fields = [
            ("latitude", &mut self.latitude, fallback.latitude),
            ("longitude", &mut self.longitude, fallback.longitude),
            ("radius", &mut self.radius, fallback.radius),
        ];
        for (name, value, default) in fields {
            if !value.is_finite() {
                warn!("ignoring geofence {name}={value}: not a finite number");
                *value = default;
            }
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

impl SimulatorConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }

    pub fn message_expiry(&self) -> Duration {
        Duration::from_secs(u64::from(self.message_expiry_secs))
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms.max(1))
    }

    /// Applies `TELEMATICS_*` overrides obtained through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.mqtt.apply_env_overrides(&lookup);
        if let Some(topic) = lookup("TELEMATICS_TOPIC") {
            self.topic = topic;
        }
        override_parsed(&lookup, "TELEMATICS_TICK_MS", &mut self.tick_period_ms);
        override_parsed(&lookup, "TELEMATICS_MESSAGE_EXPIRY_SECS", &mut self.message_expiry_secs);
        override_parsed(&lookup, "TELEMATICS_PUBLISH_TIMEOUT_MS", &mut self.publish_timeout_ms);
        override_parsed(&lookup, "TELEMATICS_VEHICLE_COUNT", &mut self.vehicle_count);
        override_parsed(&lookup, "TELEMATICS_GEOFENCE_LAT", &mut self.geofence.latitude);
        override_parsed(&lookup, "TELEMATICS_GEOFENCE_LON", &mut self.geofence.longitude);
        override_parsed(&lookup, "TELEMATICS_GEOFENCE_RADIUS", &mut self.geofence.radius);
        self.geofence.sanitize();
        override_parsed(&lookup, "TELEMATICS_HTTP_PORT", &mut self.http_port);
    }
}

impl MqttConf {
    pub fn apply_env_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TELEMATICS_MQTT_HOST") {
            self.host = host;
        }
        override_parsed(lookup, "TELEMATICS_MQTT_PORT", &mut self.port);
        if let Some(client_id) = lookup("TELEMATICS_MQTT_CLIENT_ID") {
            self.client_id = client_id;
        }
    }
}

/// Replaces `target` with the parsed env value; unparsable values are
/// logged and ignored.
pub fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("ignoring {key}={raw:?}: not a valid value"),
        }
    }
}

/// Reads a YAML file, falling back to `T::default()` when it is missing,
/// empty or invalid.
pub async fn load_yaml_or_default<T>(path: &str) -> T
where
    T: DeserializeOwned + Default,
{
    if !Path::new(path).exists() {
        warn!("no {path}, using default configuration");
        return T::default();
    }
    let txt = fs::read_to_string(path).await.unwrap_or_default();
    if txt.trim().is_empty() {
        return T::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!("invalid configuration in {path}: {e}");
        T::default()
    })
}

pub async fn load_config() -> SimulatorConfig {
    let path = std::env::var("TELEMATICS_SIM_CONFIG").unwrap_or_else(|_| "telematics-sim.yaml".into());
    let mut cfg: SimulatorConfig = load_yaml_or_default(&path).await;
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SimulatorConfig::default();
        assert_eq!(cfg.mqtt.host, "localhost");
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.topic, "telematics/data");
        assert_eq!(cfg.tick_period(), Duration::from_secs(1));
        assert_eq!(cfg.message_expiry(), Duration::from_secs(60));
        assert_eq!(cfg.vehicle_count, 10);
        assert_eq!(cfg.geofence.radius, 0.1);
    }

    #[test]
    fn env_overrides_replace_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TELEMATICS_MQTT_HOST", "broker.local"),
            ("TELEMATICS_MQTT_PORT", "1884"),
            ("TELEMATICS_TOPIC", "fleet/readings"),
            ("TELEMATICS_TICK_MS", "250"),
            ("TELEMATICS_VEHICLE_COUNT", "3"),
            ("TELEMATICS_GEOFENCE_RADIUS", "0.5"),
        ]);
        let mut cfg = SimulatorConfig::default();
        cfg.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.mqtt.host, "broker.local");
        assert_eq!(cfg.mqtt.port, 1884);
        assert_eq!(cfg.topic, "fleet/readings");
        assert_eq!(cfg.tick_period_ms, 250);
        assert_eq!(cfg.vehicle_count, 3);
        assert_eq!(cfg.geofence.radius, 0.5);
        assert_eq!(cfg.message_expiry_secs, 60);
    }

    #[test]
    fn invalid_env_value_is_ignored() {
        let mut cfg = SimulatorConfig::default();
        cfg.apply_env_overrides(|k| (k == "TELEMATICS_MQTT_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(cfg.mqtt.port, 1883);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: SimulatorConfig = serde_yaml::from_str("vehicle_count: 3\nmqtt:\n  host: mosquitto\n").unwrap();
        assert_eq!(cfg.vehicle_count, 3);
        assert_eq!(cfg.mqtt.host, "mosquitto");
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.topic, DEFAULT_TOPIC);
    }

    #[test]
    fn non_finite_geofence_falls_back_to_default() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TELEMATICS_GEOFENCE_LAT", "inf"),
            ("TELEMATICS_GEOFENCE_LON", "2.0"),
            ("TELEMATICS_GEOFENCE_RADIUS", "NaN"),
        ]);
        let mut cfg = SimulatorConfig::default();
        cfg.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.geofence.latitude, 48.8566);
        assert_eq!(cfg.geofence.longitude, 2.0);
        assert_eq!(cfg.geofence.radius, 0.1);

        let (lat, lon) = cfg.geofence.sample(&mut StdRng::seed_from_u64(5));
        assert!(cfg.geofence.contains(lat, lon));
    }

    #[test]
    fn non_finite_geofence_from_yaml_is_rejected() {
        let mut cfg: SimulatorConfig = serde_yaml::from_str("geofence:\n  radius: .inf\n  latitude: .nan\n").unwrap();
        cfg.apply_env_overrides(|_| None);
        assert_eq!(cfg.geofence, Geofence::default());
    }

    #[test]
    fn sampling_never_panics_on_unbounded_radius() {
        let fence = Geofence { latitude: 10.0, longitude: 20.0, radius: f64::INFINITY };
        assert_eq!(fence.sample(&mut StdRng::seed_from_u64(1)), (10.0, 20.0));
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_default() {
        let cfg: SimulatorConfig = load_yaml_or_default("/nonexistent/telematics-sim.yaml").await;
        assert_eq!(cfg, SimulatorConfig::default());
    }
}
