//! Infrastructure wiring for the API process.
//!
//! In-memory store/bus/projections, matching the dev/test path; a persistent
//! backend would plug in behind the same `EventStore`/`ReadStore` traits.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use parceltrace_core::{AccountId, ShipmentId};
use parceltrace_events::{EventBus, EventEnvelope, InMemoryEventBus};
use parceltrace_identity::{Account, BcryptPasswordHasher, Hs256TokenCodec};
use parceltrace_infra::{
    command_dispatcher::CommandDispatcher,
    event_store::InMemoryEventStore,
    projections::{accounts::AccountDirectory, shipments::ShipmentDirectory},
    read_model::InMemoryReadStore,
    services::{IdentityService, ShipmentService},
};
use parceltrace_shipments::{Shipment, TrackingNumberGenerator};

pub type Store = Arc<InMemoryEventStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type AccountsDirectory = AccountDirectory<Arc<InMemoryReadStore<AccountId, Account>>>;
pub type ShipmentsDirectory = ShipmentDirectory<Arc<InMemoryReadStore<ShipmentId, Shipment>>>;
pub type AppIdentityService =
    IdentityService<Store, Bus, Arc<InMemoryReadStore<AccountId, Account>>>;
pub type AppShipmentService =
    ShipmentService<Store, Bus, Arc<InMemoryReadStore<ShipmentId, Shipment>>>;

pub struct AppServices {
    pub identity: AppIdentityService,
    pub shipments: AppShipmentService,
    pub accounts: Arc<AccountsDirectory>,
    pub directory: Arc<ShipmentsDirectory>,
    pub tokens: Arc<Hs256TokenCodec>,
}

pub fn build_services(
    jwt_secret: &str,
    tracking_prefix: &str,
) -> anyhow::Result<AppServices> {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let accounts: Arc<AccountsDirectory> =
        Arc::new(AccountDirectory::new(Arc::new(InMemoryReadStore::new())));
    let directory: Arc<ShipmentsDirectory> =
        Arc::new(ShipmentDirectory::new(Arc::new(InMemoryReadStore::new())));

    // Background subscriber: bus -> projections.
    {
        let sub = bus.subscribe();
        let accounts = accounts.clone();
        let directory = directory.clone();
        tokio::task::spawn_blocking(move || loop {
            match sub.recv() {
                Ok(env) => {
                    if let Err(e) = accounts.apply_envelope(&env) {
                        tracing::warn!("account projection apply failed: {e}");
                    }
                    if let Err(e) = directory.apply_envelope(&env) {
                        tracing::warn!("shipment projection apply failed: {e}");
                    }
                }
                Err(_) => break,
            }
        });
    }

    let dispatcher = Arc::new(CommandDispatcher::new(store, bus));

    let identity = IdentityService::new(
        dispatcher.clone(),
        accounts.clone(),
        Arc::new(BcryptPasswordHasher::new()),
    );
    let shipments = ShipmentService::new(
        dispatcher,
        directory.clone(),
        TrackingNumberGenerator::new(tracking_prefix)
            .map_err(|e| anyhow::anyhow!("invalid tracking prefix: {e}"))?,
    );

    let tokens = Arc::new(Hs256TokenCodec::new(jwt_secret.as_bytes()));

    Ok(AppServices {
        identity,
        shipments,
        accounts,
        directory,
        tokens,
    })
}
