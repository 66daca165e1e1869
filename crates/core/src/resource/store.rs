//! Observable store of resource and response records.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use tracing::warn;

use crate::{
    events::{EventBus, StoreEvent},
    models::{
        Resource, ResourceCategory, ResourceDraft, ResourceOrigin, ResourceResponse,
        ResourceStatus, ResourceType, ResponseDraft, ResponseUpdate,
    },
    storage::{Storage, KEY_RESOURCES, KEY_RESOURCE_REQUESTS, RESPONSES_PREFIX},
};

use super::watch::PartitionChange;

/// In-memory cache of resource and response records backed by the durable
/// partition store.
///
/// The resource collection is normalized: one durable partition, ids unique,
/// provenance kept per record. The legacy split-partition layout is folded in
/// once on load. Mutations write through to disk before the cache commits, so
/// the cache never reflects state that was not persisted.
pub struct ResourceStore {
    storage: Storage,
    events: EventBus,
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    /// Most-recent-first display order.
    resources: Vec<Resource>,
    /// Responses grouped by owning user partition.
    responses: BTreeMap<String, Vec<ResourceResponse>>,
    /// Last issued epoch-millis id, for monotonic assignment.
    last_id: i64,
}

impl ResourceStore {
    /// Open the store, running the load sequence: read the normalized
    /// collection, fold in the legacy partition, seed when empty, and scan
    /// the per-user response partitions.
    pub fn open(storage: Storage, events: EventBus) -> Self {
        let resources = load_resources(&storage);
        let responses = load_responses(&storage);
        Self {
            storage,
            events,
            inner: Arc::new(RwLock::new(Inner {
                resources,
                responses,
                last_id: 0,
            })),
        }
    }

    /// All resource records, most recent first.
    pub fn resources(&self) -> Vec<Resource> {
        self.inner.read().resources.clone()
    }

    /// Look up one resource by id.
    pub fn find_resource(&self, id: &str) -> Option<Resource> {
        self.inner
            .read()
            .resources
            .iter()
            .find(|resource| resource.id == id)
            .cloned()
    }

    /// All response records across every user partition.
    pub fn responses(&self) -> Vec<ResourceResponse> {
        self.inner
            .read()
            .responses
            .values()
            .flat_map(|partition| partition.iter().cloned())
            .collect()
    }

    /// Responses belonging to one user.
    pub fn responses_for(&self, user_id: &str) -> Vec<ResourceResponse> {
        self.inner
            .read()
            .responses
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Create a resource from a draft. Assigns a monotonic time-derived id
    /// and creation timestamp, derives provenance from the owning user id,
    /// persists, and emits [`StoreEvent::ResourceCreated`].
    pub fn add_resource(&self, draft: ResourceDraft) -> Result<Resource> {
        let mut inner = self.inner.write();
        let (id, created_at) = issue_id(&mut inner);
        let origin = if draft.user_id.is_some() {
            ResourceOrigin::Request
        } else {
            ResourceOrigin::Board
        };
        let record = draft.into_resource(id, created_at, origin);

        let mut next = Vec::with_capacity(inner.resources.len() + 1);
        next.push(record.clone());
        next.extend(inner.resources.iter().cloned());
        self.storage.write_list(KEY_RESOURCES, &next)?;
        inner.resources = next;
        drop(inner);

        self.events.emit(StoreEvent::ResourceCreated {
            id: record.id.clone(),
        });
        Ok(record)
    }

    /// Create a response from a draft in the given user's partition.
    pub fn add_response(&self, user_id: &str, draft: ResponseDraft) -> Result<ResourceResponse> {
        let mut inner = self.inner.write();
        let (id, created_at) = issue_id(&mut inner);
        let record = draft.into_response(id, created_at);

        let key = format!("{RESPONSES_PREFIX}{user_id}");
        let mut partition = inner
            .responses
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        partition.insert(0, record.clone());
        self.storage.write_list(&key, &partition)?;
        inner.responses.insert(user_id.to_string(), partition);
        drop(inner);

        self.events.emit(StoreEvent::ResponseCreated {
            user_id: user_id.to_string(),
            id: record.id.clone(),
        });
        Ok(record)
    }

    /// Patch one response in the given user's partition. Returns `None`
    /// without writing or emitting when no record matches; untouched fields
    /// and non-matching records are preserved.
    pub fn update_response(
        &self,
        user_id: &str,
        response_id: &str,
        update: &ResponseUpdate,
    ) -> Result<Option<ResourceResponse>> {
        let mut inner = self.inner.write();
        let Some(partition) = inner.responses.get(user_id) else {
            return Ok(None);
        };
        let Some(pos) = partition.iter().position(|r| r.id == response_id) else {
            return Ok(None);
        };

        let mut next = partition.clone();
        update.apply(&mut next[pos]);
        let updated = next[pos].clone();

        let key = format!("{RESPONSES_PREFIX}{user_id}");
        self.storage.write_list(&key, &next)?;
        inner.responses.insert(user_id.to_string(), next);
        drop(inner);

        self.events.emit(StoreEvent::ResponseUpdated {
            user_id: user_id.to_string(),
            id: updated.id.clone(),
        });
        Ok(Some(updated))
    }

    /// Set the status of one resource. Returns `None` without touching any
    /// state when the id is unknown.
    pub fn update_resource_status(
        &self,
        resource_id: &str,
        status: ResourceStatus,
    ) -> Result<Option<Resource>> {
        let mut inner = self.inner.write();
        let Some(pos) = inner.resources.iter().position(|r| r.id == resource_id) else {
            return Ok(None);
        };

        let mut next = inner.resources.clone();
        next[pos].status = Some(status);
        let updated = next[pos].clone();
        self.storage.write_list(KEY_RESOURCES, &next)?;
        inner.resources = next;
        drop(inner);

        self.events.emit(StoreEvent::ResourceUpdated {
            id: updated.id.clone(),
        });
        Ok(Some(updated))
    }

    /// Re-read the resource collection from disk after an external change.
    pub fn reload_resources(&self) {
        let resources = load_resources(&self.storage);
        self.inner.write().resources = resources;
    }

    /// Re-read one user's response partition after an external change.
    pub fn reload_responses_for(&self, user_id: &str) {
        let key = format!("{RESPONSES_PREFIX}{user_id}");
        let partition: Vec<ResourceResponse> = self.storage.read_list(&key);
        let mut inner = self.inner.write();
        if partition.is_empty() {
            inner.responses.remove(user_id);
        } else {
            inner.responses.insert(user_id.to_string(), partition);
        }
    }

    /// Apply an externally observed partition change, reloading only the
    /// affected collection. Changes to partitions this store does not own are
    /// ignored.
    pub fn apply_change(&self, change: &PartitionChange) {
        match change {
            PartitionChange::Resources => self.reload_resources(),
            PartitionChange::Responses { user_id } => self.reload_responses_for(user_id),
            PartitionChange::Session | PartitionChange::Users | PartitionChange::Chat { .. } => {}
        }
    }
}

/// Issue the next record id. Ids are derived from the current epoch-millis
/// value and bumped past the last issued one, so rapid sequential calls never
/// collide.
fn issue_id(inner: &mut Inner) -> (String, DateTime<Utc>) {
    let mut millis = Utc::now().timestamp_millis();
    if millis <= inner.last_id {
        millis = inner.last_id + 1;
    }
    inner.last_id = millis;
    let created_at = Utc
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now);
    (millis.to_string(), created_at)
}

fn load_resources(storage: &Storage) -> Vec<Resource> {
    let mut legacy: Vec<Resource> = storage.read_list(KEY_RESOURCE_REQUESTS);
    let had_legacy = !legacy.is_empty();
    for record in &mut legacy {
        record.origin = if record.user_id.is_some() {
            ResourceOrigin::Request
        } else {
            ResourceOrigin::Board
        };
    }

    // Legacy records come first and win id ties, preserving the historical
    // first-writer-wins merge as a one-time migration.
    let mut merged = legacy;
    for record in storage.read_list::<Resource>(KEY_RESOURCES) {
        if !merged.iter().any(|existing| existing.id == record.id) {
            merged.push(record);
        }
    }

    if merged.is_empty() {
        merged = bootstrap_resources();
        if let Err(err) = storage.write_list(KEY_RESOURCES, &merged) {
            warn!("failed to persist bootstrap resources: {err:#}");
        }
    } else if had_legacy {
        match storage.write_list(KEY_RESOURCES, &merged) {
            Ok(()) => {
                if let Err(err) = storage.remove(KEY_RESOURCE_REQUESTS) {
                    warn!("failed to remove migrated legacy partition: {err:#}");
                }
            }
            Err(err) => warn!("failed to fold legacy partition: {err:#}"),
        }
    }

    merged
}

fn load_responses(storage: &Storage) -> BTreeMap<String, Vec<ResourceResponse>> {
    let mut responses = BTreeMap::new();
    for key in storage.keys() {
        let Some(user_id) = key.strip_prefix(RESPONSES_PREFIX) else {
            continue;
        };
        let partition: Vec<ResourceResponse> = storage.read_list(&key);
        if !partition.is_empty() {
            responses.insert(user_id.to_string(), partition);
        }
    }
    responses
}

/// The two records every fresh store starts with, so the board is never
/// empty on first run.
fn bootstrap_resources() -> Vec<Resource> {
    let seeded_at = Utc::now();
    vec![
        Resource {
            id: "1".to_string(),
            kind: ResourceType::Need,
            category: ResourceCategory::Water,
            title: "Clean Drinking Water".to_string(),
            description: "Bottled water needed for a family of four after the flood."
                .to_string(),
            location: "East District".to_string(),
            location_detail: None,
            contact: None,
            urgent: Some(true),
            created_at: seeded_at,
            status: Some(ResourceStatus::Pending),
            assigned_to: None,
            people_affected: Some(4),
            user_id: None,
            username: None,
            items: None,
            origin: ResourceOrigin::Board,
        },
        Resource {
            id: "2".to_string(),
            kind: ResourceType::Offer,
            category: ResourceCategory::Shelter,
            title: "Temporary Housing Available".to_string(),
            description: "Spare room with two beds, available for up to a month.".to_string(),
            location: "North Side Community Center".to_string(),
            location_detail: None,
            contact: Some("Front desk, ask for the relief coordinator".to_string()),
            urgent: None,
            created_at: seeded_at,
            status: None,
            assigned_to: None,
            people_affected: None,
            user_id: None,
            username: None,
            items: None,
            origin: ResourceOrigin::Board,
        },
    ]
}
