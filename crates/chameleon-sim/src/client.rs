//! One simulated stranger: match, chat, leave, repeat.

use std::sync::Arc;
use std::time::Duration;

use chameleon_social::{
    ClientIdentity, ConnectionStatus, Delivery, MemoryConnection, MemoryStore, SessionCoordinator,
    StatusKind,
};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::settings::SimSettings;

/// Chance that a client ends a conversation by vanishing instead of leaving.
const ABRUPT_DROP_PROBABILITY: f64 = 0.25;
const GREETINGS_PER_ROUND: usize = 3;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientReport {
    pub client: String,
    pub rounds: u32,
    pub matches: u32,
    pub messages_sent: u32,
    pub messages_received: usize,
    pub partner_left: u32,
    pub dropped: u32,
    pub errors: u32,
}

/// A coordinator plus the store connection and heartbeat it runs on.
struct SimClient {
    conn: MemoryConnection,
    coordinator: SessionCoordinator,
    heartbeat: JoinHandle<()>,
}

impl SimClient {
    async fn open(store: &MemoryStore, identity: ClientIdentity, settings: &SimSettings) -> Self {
        let conn = store.connect().await;
        let heartbeat = spawn_heartbeat(conn.clone(), settings.lease / 3);
        let coordinator = SessionCoordinator::new(
            Arc::new(conn.clone()),
            Some(identity),
            settings.coordinator.clone(),
        );
        Self {
            conn,
            coordinator,
            heartbeat,
        }
    }

    /// Lose the network without leaving: armed actions fire in the store.
    async fn vanish(self) {
        self.heartbeat.abort();
        self.conn.drop_connection().await;
    }
}

fn spawn_heartbeat(conn: MemoryConnection, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(100)));
        loop {
            ticker.tick().await;
            if conn.heartbeat().await.is_err() {
                break;
            }
        }
    })
}

/// Apply events until `done` holds for the status or `deadline` passes.
async fn wait_for(
    coordinator: &mut SessionCoordinator,
    deadline: Instant,
    done: impl Fn(&ConnectionStatus) -> bool,
) -> bool {
    while !done(coordinator.status()) {
        match tokio::time::timeout_at(deadline, coordinator.next_event()).await {
            Ok(Some(event)) => {
                coordinator.apply_event(event).await;
            }
            Ok(None) | Err(_) => return false,
        }
    }
    true
}

fn random_pause() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(50..250))
}

pub async fn run_client(
    store: MemoryStore,
    identity: ClientIdentity,
    rounds: u32,
    settings: SimSettings,
    cancel: CancellationToken,
) -> ClientReport {
    let mut report = ClientReport {
        client: identity.id.to_string(),
        ..ClientReport::default()
    };
    let mut client = SimClient::open(&store, identity.clone(), &settings).await;

    for round in 0..rounds {
        if cancel.is_cancelled() {
            break;
        }
        report.rounds += 1;

        let status = client.coordinator.connect().await.clone();
        tracing::info!(client = %report.client, round, %status, "Match requested");
        if status.kind() == StatusKind::Error {
            report.errors += 1;
            continue;
        }

        let deadline = Instant::now() + settings.match_timeout;
        if !wait_for(&mut client.coordinator, deadline, ConnectionStatus::is_connected).await {
            tracing::info!(client = %report.client, round, "No partner found this round");
            client.coordinator.leave().await;
            continue;
        }
        report.matches += 1;

        for n in 0..GREETINGS_PER_ROUND {
            client.coordinator.notify_typing().await;
            tokio::time::sleep(random_pause()).await;
            let alias = client
                .coordinator
                .identity()
                .map(|i| i.alias.clone())
                .unwrap_or_default();
            match client
                .coordinator
                .send_message(&format!("hello #{n} from {alias}"))
                .await
            {
                Ok(Delivery::Sent(_)) => report.messages_sent += 1,
                Ok(Delivery::Rejected) => break,
                Err(e) => {
                    tracing::warn!(client = %report.client, error = %e, "Send failed");
                    report.errors += 1;
                }
            }
        }

        // Give the partner's greetings time to arrive.
        let linger = Instant::now() + Duration::from_secs(1);
        wait_for(&mut client.coordinator, linger, |s| {
            s.kind() == StatusKind::PartnerLeft
        })
        .await;

        let me = identity.id.clone();
        report.messages_received += client
            .coordinator
            .messages()
            .iter()
            .filter(|m| !m.is_from(&me))
            .count();

        let vanish = rand::thread_rng().gen_bool(ABRUPT_DROP_PROBABILITY);
        match client.coordinator.status().kind() {
            StatusKind::PartnerLeft => {
                report.partner_left += 1;
                client.coordinator.leave().await;
            }
            _ if vanish => {
                tracing::info!(client = %report.client, round, "Dropping connection abruptly");
                report.dropped += 1;
                client.vanish().await;
                client = SimClient::open(&store, identity.clone(), &settings).await;
            }
            _ => client.coordinator.leave().await,
        }
    }

    client.coordinator.shutdown().await;
    client.heartbeat.abort();
    tracing::info!(client = %report.client, ?report, "Client finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chameleon_config::ChameleonConfig;

    #[tokio::test]
    async fn two_clients_complete_a_round() {
        let store = MemoryStore::new();
        let mut settings = SimSettings::from_config(&ChameleonConfig::default());
        settings.match_timeout = Duration::from_secs(5);
        let cancel = CancellationToken::new();

        let a = tokio::spawn(run_client(
            store.clone(),
            ClientIdentity::generate(),
            1,
            settings.clone(),
            cancel.clone(),
        ));
        // Let the first client publish its waiting session.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let b = tokio::spawn(run_client(
            store.clone(),
            ClientIdentity::generate(),
            1,
            settings,
            cancel,
        ));
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a.matches, 1);
        assert_eq!(b.matches, 1);
        assert!(a.messages_sent + b.messages_sent > 0);
        assert_eq!(a.errors + b.errors, 0);
    }
}
