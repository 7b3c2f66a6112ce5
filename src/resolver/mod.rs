//! Target resolution: abstract targets to ordered agent ids

mod condition;

use std::{cmp::Ordering, collections::HashSet};

use rand::seq::SliceRandom;

use crate::{
    directory::DirectorySnapshot,
    protocol::{
        agent::{AgentDirectoryEntry, AgentRole},
        error::{A2AError, A2AResult},
        target::{AgentCondition, AgentFilter, AgentTarget, SelectionStrategy},
    },
};

/// Resolves targets against one directory snapshot
///
/// The snapshot is borrowed for the resolver's lifetime, so it cannot change
/// while a target is being resolved.
#[derive(Debug, Clone, Copy)]
pub struct TargetResolver<'a> {
    snapshot: &'a DirectorySnapshot,
    source: Option<&'a str>,
}

impl<'a> TargetResolver<'a> {
    pub fn new(snapshot: &'a DirectorySnapshot) -> Self {
        Self {
            snapshot,
            source: None,
        }
    }

    /// Agent id of the sender, removed from broadcasts that exclude the source
    pub fn with_source(mut self, source: Option<&'a str>) -> Self {
        self.source = source;
        self
    }

    /// Resolve `target` into an ordered, duplicate-free list of agent ids
    ///
    /// # Errors
    ///
    /// * `TargetNotFound` - a single target is not in the snapshot
    /// * `NoAgentsMatched` - a group target matched nobody
    /// * `Validation` - a multiple target lists no agents
    pub fn resolve(&self, target: &AgentTarget) -> A2AResult<Vec<String>> {
        let resolved = match target {
            AgentTarget::Single { agent_id } => self.resolve_single(agent_id)?,
            AgentTarget::Multiple { agent_ids, .. } => Self::resolve_multiple(agent_ids)?,
            AgentTarget::Group {
                role,
                capabilities,
                max_agents,
                selection_strategy,
            } => self.resolve_group(
                role,
                capabilities.as_deref().unwrap_or_default(),
                *max_agents,
                *selection_strategy,
            )?,
            AgentTarget::Broadcast {
                filter,
                exclude_source,
            } => self.resolve_broadcast(filter.as_ref(), *exclude_source),
            AgentTarget::Conditional {
                conditions,
                fallback,
            } => return self.resolve_conditional(conditions, fallback.as_deref()),
        };

        tracing::debug!(target = target.kind(), agents = resolved.len(), "resolved target");
        Ok(resolved)
    }

    fn resolve_single(&self, agent_id: &str) -> A2AResult<Vec<String>> {
        if !self.snapshot.contains(agent_id) {
            return Err(A2AError::TargetNotFound {
                agent_id: agent_id.to_string(),
            });
        }
        Ok(vec![agent_id.to_string()])
    }

    fn resolve_multiple(agent_ids: &[String]) -> A2AResult<Vec<String>> {
        let mut seen = HashSet::new();
        let resolved: Vec<String> = agent_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        if resolved.is_empty() {
            return Err(A2AError::Validation(vec![
                "multiple target must list at least one agent".to_string(),
            ]));
        }
        Ok(resolved)
    }

    fn resolve_group(
        &self,
        role: &AgentRole,
        capabilities: &[String],
        max_agents: Option<usize>,
        strategy: SelectionStrategy,
    ) -> A2AResult<Vec<String>> {
        let mut candidates: Vec<&AgentDirectoryEntry> = self
            .snapshot
            .iter()
            .filter(|entry| &entry.role == role && entry.status.is_available())
            .filter(|entry| match strategy {
                // Partial matches are admitted and ranked below fuller ones
                SelectionStrategy::CapabilityMatched if !capabilities.is_empty() => {
                    entry.capability_overlap(capabilities) > 0
                }
                _ => entry.has_capabilities(capabilities),
            })
            .collect();

        if candidates.is_empty() {
            return Err(A2AError::NoAgentsMatched {
                role: role.to_string(),
            });
        }

        match strategy {
            SelectionStrategy::Random => candidates.shuffle(&mut rand::thread_rng()),
            SelectionStrategy::LoadBalanced => {
                candidates.sort_by(|a, b| a.load.total_cmp(&b.load));
            }
            SelectionStrategy::CapabilityMatched => candidates.sort_by(|a, b| {
                match b
                    .capability_overlap(capabilities)
                    .cmp(&a.capability_overlap(capabilities))
                {
                    Ordering::Equal => a.load.total_cmp(&b.load),
                    other => other,
                }
            }),
        }

        let limit = max_agents.unwrap_or(candidates.len());
        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|entry| entry.agent_id.clone())
            .collect())
    }

    fn resolve_broadcast(&self, filter: Option<&AgentFilter>, exclude_source: bool) -> Vec<String> {
        self.snapshot
            .iter()
            .filter(|entry| filter.map_or(true, |filter| filter.matches(entry)))
            .filter(|entry| !(exclude_source && Some(entry.agent_id.as_str()) == self.source))
            .map(|entry| entry.agent_id.clone())
            .collect()
    }

    fn resolve_conditional(
        &self,
        conditions: &[AgentCondition],
        fallback: Option<&AgentTarget>,
    ) -> A2AResult<Vec<String>> {
        let qualified: Vec<String> = self
            .snapshot
            .iter()
            .filter(|entry| conditions.iter().all(|c| condition::evaluate(c, entry)))
            .map(|entry| entry.agent_id.clone())
            .collect();

        match fallback {
            Some(fallback) if qualified.is_empty() => {
                tracing::debug!(fallback = fallback.kind(), "no agent met the conditions, using fallback");
                self.resolve(fallback)
            }
            _ => Ok(qualified),
        }
    }
}
