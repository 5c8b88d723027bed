//! Entity/relation graph store
//!
//! A lightweight property graph: entities are nodes, relations are
//! directed weighted edges. No general graph engine — just the
//! traversals the recall and consolidation pipelines need: bounded
//! neighbor lookup, shortest path, and deterministic community detection.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Entity, ProjectId, Relation};
use crate::storage::{Namespace, Record, ScanFilter, StorageBackend};

/// Which way to walk edges from the start entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphDirection {
    Outgoing,
    Incoming,
    Both,
}

/// Iteration cap for label propagation — the algorithm is expected to
/// converge well before this on any realistic project graph; the cap just
/// guarantees termination.
const COMMUNITY_MAX_ROUNDS: usize = 20;

pub struct GraphStore {
    backend: Arc<dyn StorageBackend>,
}

impl GraphStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub async fn upsert_entity(&self, project_id: ProjectId, name: String, entity_type: String, attributes: serde_json::Value) -> Result<Entity> {
        let existing = self.list_entities(project_id, 10_000).await?;
        if let Some(found) = existing.into_iter().find(|e| e.name == name && e.entity_type == entity_type) {
            return Ok(found);
        }
        let entity = Entity { id: Uuid::new_v4(), project_id, name, entity_type, attributes, observations: vec![], created_at: Utc::now() };
        let body = serde_json::to_value(&entity).unwrap_or(json!({}));
        self.backend
            .put(Record { id: entity.id, project_id, namespace: Namespace::GraphEntity.as_str(), body, embedding: None, lexical_text: Some(entity.name.clone()) })
            .await?;
        Ok(entity)
    }

    pub async fn relate(&self, project_id: ProjectId, source_entity_id: Uuid, target_entity_id: Uuid, relation_type: String, weight: f64) -> Result<Relation> {
        let relation = Relation { id: Uuid::new_v4(), project_id, source_entity_id, target_entity_id, relation_type, weight, created_at: Utc::now() };
        let body = serde_json::to_value(&relation).unwrap_or(json!({}));
        self.backend
            .put(Record { id: relation.id, project_id, namespace: Namespace::GraphRelation.as_str(), body, embedding: None, lexical_text: None })
            .await?;
        Ok(relation)
    }

    pub async fn list_entities(&self, project_id: ProjectId, limit: usize) -> Result<Vec<Entity>> {
        let records = self.backend.scan(Namespace::GraphEntity.as_str(), project_id, ScanFilter { tag: None, limit: Some(limit) }).await?;
        Ok(records.into_iter().filter_map(|r| serde_json::from_value(r.body).ok()).collect())
    }

    pub async fn list_relations(&self, project_id: ProjectId, limit: usize) -> Result<Vec<Relation>> {
        let records = self.backend.scan(Namespace::GraphRelation.as_str(), project_id, ScanFilter { tag: None, limit: Some(limit) }).await?;
        Ok(records.into_iter().filter_map(|r| serde_json::from_value(r.body).ok()).collect())
    }

    /// Entities within `depth` hops of `entity_id`, walked per
    /// `direction`, returned in BFS discovery order. `depth` is expected to
    /// be small (§4.3's `depth ≤ K`) — callers are responsible for
    /// bounding it before calling.
    pub async fn neighbors(&self, project_id: ProjectId, entity_id: Uuid, direction: GraphDirection, depth: usize) -> Result<Vec<Entity>> {
        if depth == 0 {
            return Ok(vec![]);
        }
        let relations = self.list_relations(project_id, 10_000).await?;
        let adjacency = build_adjacency(&relations, direction);

        let mut visited: HashSet<Uuid> = HashSet::from([entity_id]);
        let mut order: Vec<Uuid> = Vec::new();
        let mut frontier: VecDeque<(Uuid, usize)> = VecDeque::from([(entity_id, 0)]);

        while let Some((current, current_depth)) = frontier.pop_front() {
            if current_depth >= depth {
                continue;
            }
            if let Some(next_ids) = adjacency.get(&current) {
                for &next in next_ids {
                    if visited.insert(next) {
                        order.push(next);
                        frontier.push_back((next, current_depth + 1));
                    }
                }
            }
        }

        let entities = self.list_entities(project_id, 10_000).await?;
        let by_id: HashMap<Uuid, Entity> = entities.into_iter().map(|e| (e.id, e)).collect();
        Ok(order.into_iter().filter_map(|id| by_id.get(&id).cloned()).collect())
    }

    /// Shortest path (fewest hops, direction-agnostic) from `from_id` to
    /// `to_id`, bounded to `max_depth` hops. `None` if unreachable within
    /// the bound.
    pub async fn path(&self, project_id: ProjectId, from_id: Uuid, to_id: Uuid, max_depth: usize) -> Result<Option<Vec<Uuid>>> {
        if from_id == to_id {
            return Ok(Some(vec![from_id]));
        }
        let relations = self.list_relations(project_id, 10_000).await?;
        let adjacency = build_adjacency(&relations, GraphDirection::Both);

        let mut visited: HashSet<Uuid> = HashSet::from([from_id]);
        let mut predecessor: HashMap<Uuid, Uuid> = HashMap::new();
        let mut frontier: VecDeque<(Uuid, usize)> = VecDeque::from([(from_id, 0)]);

        while let Some((current, current_depth)) = frontier.pop_front() {
            if current == to_id {
                return Ok(Some(reconstruct_path(&predecessor, from_id, to_id)));
            }
            if current_depth >= max_depth {
                continue;
            }
            if let Some(next_ids) = adjacency.get(&current) {
                for &next in next_ids {
                    if visited.insert(next) {
                        predecessor.insert(next, current);
                        frontier.push_back((next, current_depth + 1));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Deterministic label-propagation communities: every entity starts as
    /// its own label, then repeatedly adopts the most common label among
    /// its neighbors (ties broken by smallest label id, entities processed
    /// in sorted-id order each round for reproducibility) until no entity
    /// changes or `COMMUNITY_MAX_ROUNDS` is reached.
    pub async fn communities(&self, project_id: ProjectId) -> Result<Vec<Vec<Uuid>>> {
        let entities = self.list_entities(project_id, 10_000).await?;
        let relations = self.list_relations(project_id, 10_000).await?;
        let adjacency = build_adjacency(&relations, GraphDirection::Both);

        let mut ids: Vec<Uuid> = entities.iter().map(|e| e.id).collect();
        ids.sort();
        let mut labels: HashMap<Uuid, Uuid> = ids.iter().map(|&id| (id, id)).collect();

        for _ in 0..COMMUNITY_MAX_ROUNDS {
            let mut changed = false;
            for &id in &ids {
                let Some(neighbor_ids) = adjacency.get(&id) else { continue };
                if neighbor_ids.is_empty() {
                    continue;
                }
                let mut counts: HashMap<Uuid, usize> = HashMap::new();
                for neighbor in neighbor_ids {
                    *counts.entry(labels[neighbor]).or_insert(0) += 1;
                }
                let max_count = *counts.values().max().unwrap();
                let winner = counts.into_iter().filter(|(_, c)| *c == max_count).map(|(label, _)| label).min().unwrap();
                if labels[&id] != winner {
                    labels.insert(id, winner);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut grouped: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for &id in &ids {
            grouped.entry(labels[&id]).or_default().push(id);
        }
        let mut communities: Vec<Vec<Uuid>> = grouped.into_values().collect();
        for community in &mut communities {
            community.sort();
        }
        communities.sort_by_key(|c| c[0]);
        Ok(communities)
    }
}

fn build_adjacency(relations: &[Relation], direction: GraphDirection) -> HashMap<Uuid, Vec<Uuid>> {
    let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for relation in relations {
        match direction {
            GraphDirection::Outgoing => {
                adjacency.entry(relation.source_entity_id).or_default().push(relation.target_entity_id);
            }
            GraphDirection::Incoming => {
                adjacency.entry(relation.target_entity_id).or_default().push(relation.source_entity_id);
            }
            GraphDirection::Both => {
                adjacency.entry(relation.source_entity_id).or_default().push(relation.target_entity_id);
                adjacency.entry(relation.target_entity_id).or_default().push(relation.source_entity_id);
            }
        }
    }
    adjacency
}

fn reconstruct_path(predecessor: &HashMap<Uuid, Uuid>, from_id: Uuid, to_id: Uuid) -> Vec<Uuid> {
    let mut path = vec![to_id];
    let mut current = to_id;
    while current != from_id {
        current = predecessor[&current];
        path.push(current);
    }
    path.reverse();
    path
}
