/*!
# Telematics DevKit - broker stubs and fixtures for tests

- `MockBroker`: in-memory stand-in for the MQTT broker, usable as both the
  simulator's publisher and the relay's subscriber
- `TestHarness`: a small fleet wired to a `PublishLoop` over the mock broker
- fixture builders for readings and rosters
*/

pub mod mock_broker;
pub mod test_utils;

pub use mock_broker::{MockBroker, MockMessage};
pub use test_utils::{fixed_registry, init_test_logging, sample_reading, TestHarness};
