//! Pre-configured engine setups for integration tests.

use crate::recording_sink::RecordingSink;
use crate::test_client::TestClient;

use match_engine::actors::{ActionOutcome, ActorMetrics, MatchCoordinatorHandle};
use match_engine::config::EngineSettings;
use match_engine::outcome::OutcomeSink;
use match_engine::registry::ConnectionRegistry;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Settings matching production defaults, with a fixed engine id.
#[must_use]
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        engine_id: "engine-test".to_string(),
        ..EngineSettings::default()
    }
}

/// Random player id, for tests that need many distinct players.
#[must_use]
pub fn random_player_id() -> String {
    format!("player-{}", Uuid::new_v4())
}

/// A running coordinator plus the collaborators tests inspect.
pub struct TestEngine {
    pub coordinator: MatchCoordinatorHandle,
    pub registry: Arc<ConnectionRegistry>,
    pub sink: Arc<RecordingSink>,
    pub metrics: Arc<ActorMetrics>,
}

impl TestEngine {
    /// Spawn a coordinator with [`test_settings`].
    #[must_use]
    pub fn start() -> Self {
        Self::with_settings(test_settings())
    }

    #[must_use]
    pub fn with_settings(settings: EngineSettings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let sink = Arc::new(RecordingSink::new());
        let metrics = ActorMetrics::new();
        let coordinator = MatchCoordinatorHandle::new(
            settings,
            Arc::clone(&registry),
            Arc::clone(&sink) as Arc<dyn OutcomeSink>,
            Arc::clone(&metrics),
        );

        Self {
            coordinator,
            registry,
            sink,
            metrics,
        }
    }

    pub async fn client(&self, id: &str) -> TestClient {
        TestClient::connect(&self.coordinator, id).await
    }

    /// Connect two players and pair them. `x` joins first and plays X.
    ///
    /// Both clients have consumed their `Paired` event and the opening
    /// `StateUpdate`.
    ///
    /// # Panics
    ///
    /// Panics if the pairing does not happen as described.
    pub async fn paired_clients(&self, x: &str, o: &str) -> (TestClient, TestClient) {
        let mut x_client = self.client(x).await;
        let mut o_client = self.client(o).await;

        assert_eq!(x_client.join().await.unwrap(), ActionOutcome::Waiting);
        assert!(matches!(
            o_client.join().await.unwrap(),
            ActionOutcome::Paired { .. }
        ));

        x_client.expect_paired().await;
        o_client.expect_paired().await;
        x_client.next_state().await.expect("opening state for X");
        o_client.next_state().await.expect("opening state for O");

        (x_client, o_client)
    }
}

/// Short sleep that lets spawned actors run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
