use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{validate_name, validate_quantity, InventoryItem},
    protocol::{CreateItemRequest, Recipe},
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

pub mod error;
pub mod transport;

pub use error::{Operation, StoreError, StoreResult};
pub use transport::HttpInventoryService;

/// Folder the backend scans when a simulation is started without one.
pub const DEFAULT_IMAGE_FOLDER: &str = "src/camera/images";

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Remote inventory API as seen by [`InventoryStore`].
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<InventoryItem>>;
    async fn create(&self, request: CreateItemRequest) -> StoreResult<InventoryItem>;
    async fn delete(&self, name: &str) -> StoreResult<()>;
    /// Returns the quantity echoed by the service, if it sent one.
    async fn update_quantity(&self, name: &str, quantity: i64) -> StoreResult<Option<i64>>;
    async fn suggest_recipes(&self) -> StoreResult<Vec<String>>;
    async fn recipe(&self) -> StoreResult<Recipe>;
    async fn simulate(&self, image_folder: &str) -> StoreResult<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorePhase {
    #[default]
    Uninitialized,
    Populated,
}

/// Pending "new item" input. Reset to its defaults once an add built from it
/// is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItemDraft {
    pub name: String,
    pub quantity: i64,
}

impl Default for NewItemDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            quantity: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Loaded { items: Vec<InventoryItem> },
    ItemAdded { item: InventoryItem },
    ItemRemoved { name: String },
    QuantityUpdated { item: InventoryItem },
    SimulationCompleted { detected_items: Vec<String> },
    OperationFailed { operation: Operation, error: StoreError },
}

#[derive(Default)]
struct StoreState {
    phase: StorePhase,
    items: Vec<InventoryItem>,
    draft: NewItemDraft,
}

/// Local cache of the remote inventory.
///
/// The cache only changes after the service confirms an operation. The lock
/// is never held across a request, so concurrent mutations of the same item
/// race and the last response to arrive wins.
pub struct InventoryStore {
    service: Arc<dyn InventoryService>,
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl InventoryStore {
    pub fn new(service: Arc<dyn InventoryService>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            service,
            state: RwLock::new(StoreState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> StorePhase {
        self.state.read().await.phase
    }

    pub async fn items(&self) -> Vec<InventoryItem> {
        self.state.read().await.items.clone()
    }

    pub async fn get(&self, name: &str) -> Option<InventoryItem> {
        let guard = self.state.read().await;
        guard.items.iter().find(|item| item.name == name).cloned()
    }

    pub async fn draft(&self) -> NewItemDraft {
        self.state.read().await.draft.clone()
    }

    pub async fn set_draft_name(&self, name: impl Into<String>) {
        self.state.write().await.draft.name = name.into();
    }

    pub async fn set_draft_quantity(&self, quantity: i64) {
        self.state.write().await.draft.quantity = quantity;
    }

    /// Replaces the cache with the service's current inventory.
    pub async fn load(&self) -> StoreResult<Vec<InventoryItem>> {
        self.load_impl()
            .await
            .map_err(|err| self.report(Operation::Load, err))
    }

    pub async fn add(&self, name: &str, quantity: i64) -> StoreResult<InventoryItem> {
        self.add_impl(name, quantity)
            .await
            .map_err(|err| self.report(Operation::Add, err))
    }

    /// Adds the draft item and resets the draft once the add is confirmed.
    pub async fn submit_draft(&self) -> StoreResult<InventoryItem> {
        let draft = self.draft().await;
        let item = self.add(&draft.name, draft.quantity).await?;
        self.state.write().await.draft = NewItemDraft::default();
        Ok(item)
    }

    pub async fn remove(&self, name: &str) -> StoreResult<()> {
        self.remove_impl(name)
            .await
            .map_err(|err| self.report(Operation::Remove, err))
    }

    pub async fn set_quantity(&self, name: &str, quantity: i64) -> StoreResult<InventoryItem> {
        self.set_quantity_impl(name, quantity)
            .await
            .map_err(|err| self.report(Operation::SetQuantity, err))
    }

    pub async fn increment(&self, name: &str) -> StoreResult<InventoryItem> {
        let current = self.cached_quantity(name).await?;
        self.set_quantity(name, current.saturating_add(1)).await
    }

    /// Lowers the quantity by one. Returns `None` without contacting the
    /// service when the item is already at the minimum.
    pub async fn decrement(&self, name: &str) -> StoreResult<Option<InventoryItem>> {
        let current = self.cached_quantity(name).await?;
        if current <= 1 {
            debug!(item = name, "decrement ignored at minimum quantity");
            return Ok(None);
        }
        self.set_quantity(name, current - 1).await.map(Some)
    }

    pub async fn suggest_recipes(&self) -> StoreResult<Vec<String>> {
        self.service
            .suggest_recipes()
            .await
            .map_err(|err| self.report(Operation::SuggestRecipes, err))
    }

    pub async fn recipe(&self) -> StoreResult<Recipe> {
        self.service
            .recipe()
            .await
            .map_err(|err| self.report(Operation::Recipe, err))
    }

    /// Asks the backend to detect items from images and reloads the cache
    /// afterwards. A failed reload is reported as a `load` failure and does
    /// not fail the simulation.
    pub async fn run_simulation(&self, image_folder: &str) -> StoreResult<Vec<String>> {
        let detected_items = self
            .simulate_impl(image_folder)
            .await
            .map_err(|err| self.report(Operation::Simulate, err))?;

        info!(detected = detected_items.len(), "simulation completed");
        let _ = self.events.send(StoreEvent::SimulationCompleted {
            detected_items: detected_items.clone(),
        });

        let _ = self.load().await;
        Ok(detected_items)
    }

    async fn load_impl(&self) -> StoreResult<Vec<InventoryItem>> {
        let items = self.service.list().await?;
        {
            let mut guard = self.state.write().await;
            guard.items = items.clone();
            guard.phase = StorePhase::Populated;
        }

        info!(count = items.len(), "inventory loaded");
        let _ = self.events.send(StoreEvent::Loaded {
            items: items.clone(),
        });
        Ok(items)
    }

    async fn add_impl(&self, name: &str, quantity: i64) -> StoreResult<InventoryItem> {
        let name = validate_name(name)?;
        let quantity = validate_quantity(quantity)?;

        let created = self
            .service
            .create(CreateItemRequest {
                item_name: name.to_string(),
                quantity,
            })
            .await?;

        // The service merges into an existing row but only echoes the
        // requested quantity, so a cached entry is bumped locally.
        let added = {
            let mut guard = self.state.write().await;
            match guard.items.iter_mut().find(|item| item.name == created.name) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(quantity);
                    existing.clone()
                }
                None => {
                    guard.items.push(created.clone());
                    created
                }
            }
        };

        info!(item = %added.name, quantity = added.quantity, "item added");
        let _ = self.events.send(StoreEvent::ItemAdded {
            item: added.clone(),
        });
        Ok(added)
    }

    async fn remove_impl(&self, name: &str) -> StoreResult<()> {
        let name = name.trim();
        if self.get(name).await.is_none() {
            return Err(StoreError::unknown_item(name));
        }

        self.service.delete(name).await?;

        {
            let mut guard = self.state.write().await;
            if let Some(index) = guard.items.iter().position(|item| item.name == name) {
                guard.items.remove(index);
            }
        }

        info!(item = name, "item removed");
        let _ = self.events.send(StoreEvent::ItemRemoved {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn set_quantity_impl(&self, name: &str, quantity: i64) -> StoreResult<InventoryItem> {
        let name = name.trim();
        let quantity = validate_quantity(quantity)?;
        if self.get(name).await.is_none() {
            return Err(StoreError::unknown_item(name));
        }

        let confirmed = self
            .service
            .update_quantity(name, quantity)
            .await?
            .unwrap_or(quantity);

        let updated = {
            let mut guard = self.state.write().await;
            guard
                .items
                .iter_mut()
                .find(|item| item.name == name)
                .map(|item| {
                    item.quantity = confirmed;
                    item.clone()
                })
        };

        // Removed while the update was in flight; do not resurrect it.
        let Some(updated) = updated else {
            debug!(item = name, "quantity confirmed for an item no longer cached");
            return Ok(InventoryItem::new(name, confirmed));
        };

        info!(item = name, quantity = confirmed, "quantity updated");
        let _ = self.events.send(StoreEvent::QuantityUpdated {
            item: updated.clone(),
        });
        Ok(updated)
    }

    async fn simulate_impl(&self, image_folder: &str) -> StoreResult<Vec<String>> {
        let image_folder = image_folder.trim();
        if image_folder.is_empty() {
            return Err(StoreError::Validation(
                "image folder must not be empty".to_string(),
            ));
        }
        self.service.simulate(image_folder).await
    }

    async fn cached_quantity(&self, name: &str) -> StoreResult<i64> {
        match self.get(name.trim()).await {
            Some(item) => Ok(item.quantity),
            None => Err(self.report(Operation::SetQuantity, StoreError::unknown_item(name))),
        }
    }

    fn report(&self, operation: Operation, error: StoreError) -> StoreError {
        warn!(%operation, %error, "inventory operation failed");
        let _ = self.events.send(StoreEvent::OperationFailed {
            operation,
            error: error.clone(),
        });
        error
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod transport_tests;
