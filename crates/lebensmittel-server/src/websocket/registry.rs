//! Connection registry and group index.
//!
//! Owned exclusively by the dispatcher task, so plain maps suffice. The two
//! maps are only mutated together and always satisfy
//! `c ∈ groups[g] ⟺ g ∈ clients[c].groups`; empty buckets are removed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use lebensmittel_core::{ConnectionId, GroupId};

use super::connection::Connection;

/// A registered client: its connection plus the groups it listens to.
#[derive(Debug)]
pub struct Client {
    /// Shared write path.
    pub connection: Arc<Connection>,
    /// Subscribed groups.
    pub groups: HashSet<GroupId>,
}

/// Live clients and the reverse group → connections index.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<ConnectionId, Client>,
    groups: HashMap<GroupId, HashSet<ConnectionId>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client with its initial groups.
    ///
    /// Returns `false` (and changes nothing) if the handle is already registered.
    pub fn register(
        &mut self,
        connection: Arc<Connection>,
        groups: impl IntoIterator<Item = GroupId>,
    ) -> bool {
        let id = connection.id.clone();
        if self.clients.contains_key(&id) {
            return false;
        }
        let _ = self.clients.insert(
            id.clone(),
            Client {
                connection,
                groups: HashSet::new(),
            },
        );
        let _ = self.subscribe(&id, groups);
        true
    }

    /// Add groups to a registered client.
    ///
    /// Returns `false` for an unknown handle, which is otherwise ignored.
    pub fn subscribe(
        &mut self,
        id: &ConnectionId,
        groups: impl IntoIterator<Item = GroupId>,
    ) -> bool {
        let Some(client) = self.clients.get_mut(id) else {
            return false;
        };
        for group in groups {
            let _ = self
                .groups
                .entry(group.clone())
                .or_default()
                .insert(id.clone());
            let _ = client.groups.insert(group);
        }
        true
    }

    /// Remove a client from every bucket, dropping buckets left empty.
    ///
    /// Returns the removed client, or `None` if it was not registered.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Client> {
        let client = self.clients.remove(id)?;
        for group in &client.groups {
            if let Some(members) = self.groups.get_mut(group) {
                let _ = members.remove(id);
                if members.is_empty() {
                    let _ = self.groups.remove(group);
                }
            }
        }
        Some(client)
    }

    /// Remove every client.
    pub fn drain(&mut self) -> Vec<Client> {
        self.groups.clear();
        self.clients.drain().map(|(_, client)| client).collect()
    }

    /// Recipients of an event: every client when `groups` is empty, else the
    /// deduplicated union of the named buckets.
    pub fn resolve(&self, groups: &[GroupId]) -> Vec<Arc<Connection>> {
        if groups.is_empty() {
            return self
                .clients
                .values()
                .map(|client| client.connection.clone())
                .collect();
        }
        let targets: HashSet<&ConnectionId> = groups
            .iter()
            .filter_map(|group| self.groups.get(group))
            .flatten()
            .collect();
        targets
            .into_iter()
            .filter_map(|id| self.clients.get(id))
            .map(|client| client.connection.clone())
            .collect()
    }

    /// Number of registered clients.
    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    /// Subscriber count per non-empty group, ordered by group id.
    pub fn group_members(&self) -> BTreeMap<GroupId, usize> {
        self.groups
            .iter()
            .map(|(group, members)| (group.clone(), members.len()))
            .collect()
    }

    #[cfg(test)]
    fn get(&self, id: &ConnectionId) -> Option<&Client> {
        self.clients.get(id)
    }

    #[cfg(test)]
    fn group_count(&self) -> usize {
        self.groups.len()
    }

    #[cfg(test)]
    fn members(&self, group: &GroupId) -> usize {
        self.groups.get(group).map_or(0, HashSet::len)
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (id, client) in &self.clients {
            for group in &client.groups {
                assert!(
                    self.groups.get(group).is_some_and(|m| m.contains(id)),
                    "{id} lists {group} but is missing from its bucket"
                );
            }
        }
        for (group, members) in &self.groups {
            assert!(!members.is_empty(), "empty bucket {group} left behind");
            for id in members {
                assert!(
                    self.clients.get(id).is_some_and(|c| c.groups.contains(group)),
                    "bucket {group} holds {id} which does not list it"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::connection::testing::{RecordingSink, connection};
    use super::*;

    fn g(id: &str) -> GroupId {
        GroupId::from(id)
    }

    fn ids(conns: &[Arc<Connection>]) -> Vec<String> {
        let mut ids: Vec<String> = conns.iter().map(|c| c.id.to_string()).collect();
        ids.sort();
        ids
    }

    fn conn(id: &str) -> Arc<Connection> {
        connection(id, "alice", RecordingSink::new())
    }

    #[test]
    fn register_populates_both_maps() {
        let mut reg = Registry::new();
        assert!(reg.register(conn("c1"), [g("g1"), g("g2")]));
        reg.assert_consistent();
        assert_eq!(reg.connection_count(), 1);
        assert_eq!(reg.group_count(), 2);
        assert_eq!(reg.members(&g("g1")), 1);
    }

    #[test]
    fn duplicate_register_rejected() {
        let mut reg = Registry::new();
        assert!(reg.register(conn("c1"), [g("g1")]));
        assert!(!reg.register(conn("c1"), [g("g2")]));
        reg.assert_consistent();
        assert_eq!(reg.group_count(), 1);
    }

    #[test]
    fn subscribe_unknown_connection_ignored() {
        let mut reg = Registry::new();
        assert!(!reg.subscribe(&ConnectionId::from("ghost"), [g("g1")]));
        assert_eq!(reg.group_count(), 0);
    }

    #[test]
    fn subscribe_is_additive_and_idempotent() {
        let mut reg = Registry::new();
        let _ = reg.register(conn("c1"), [g("g1")]);
        assert!(reg.subscribe(&ConnectionId::from("c1"), [g("g1"), g("g2")]));
        reg.assert_consistent();
        let client = reg.get(&ConnectionId::from("c1")).unwrap();
        assert_eq!(client.groups.len(), 2);
        assert_eq!(reg.members(&g("g1")), 1);
    }

    #[test]
    fn unregister_removes_from_all_buckets_and_is_idempotent() {
        let mut reg = Registry::new();
        let _ = reg.register(conn("c1"), [g("g1"), g("g2")]);
        let _ = reg.register(conn("c2"), [g("g2")]);

        assert!(reg.unregister(&ConnectionId::from("c1")).is_some());
        reg.assert_consistent();
        assert_eq!(reg.members(&g("g1")), 0);
        assert_eq!(reg.group_count(), 1);
        assert_eq!(reg.members(&g("g2")), 1);

        assert!(reg.unregister(&ConnectionId::from("c1")).is_none());
        reg.assert_consistent();
        assert_eq!(reg.connection_count(), 1);
    }

    #[test]
    fn resolve_dedups_across_groups() {
        let mut reg = Registry::new();
        let _ = reg.register(conn("c1"), [g("g1"), g("g2")]);
        let _ = reg.register(conn("c2"), [g("g2")]);
        let _ = reg.register(conn("c3"), [g("g3")]);

        assert_eq!(ids(&reg.resolve(&[g("g1"), g("g2")])), ["c1", "c2"]);
        assert_eq!(ids(&reg.resolve(&[g("g2"), g("g2")])), ["c1", "c2"]);
        assert!(reg.resolve(&[g("nobody")]).is_empty());
    }

    #[test]
    fn resolve_without_groups_targets_everyone() {
        let mut reg = Registry::new();
        let _ = reg.register(conn("c1"), [g("g1")]);
        let _ = reg.register(conn("c2"), []);
        assert_eq!(ids(&reg.resolve(&[])), ["c1", "c2"]);
    }

    #[test]
    fn drain_empties_everything() {
        let mut reg = Registry::new();
        let _ = reg.register(conn("c1"), [g("g1")]);
        let _ = reg.register(conn("c2"), [g("g2")]);
        assert_eq!(reg.drain().len(), 2);
        assert_eq!(reg.connection_count(), 0);
        assert_eq!(reg.group_count(), 0);
    }

    #[test]
    fn consistency_holds_over_mixed_sequence() {
        let mut reg = Registry::new();
        let groups = ["g1", "g2", "g3", "g4"];
        for step in 0..60usize {
            let id = ConnectionId::from(format!("c{}", step % 7));
            match step % 3 {
                0 => {
                    let _ = reg.register(conn(id.as_str()), [g(groups[step % 4])]);
                }
                1 => {
                    let _ = reg.subscribe(&id, [g(groups[(step + 1) % 4]), g(groups[(step + 2) % 4])]);
                }
                _ => {
                    let _ = reg.unregister(&ConnectionId::from(format!("c{}", (step * 5) % 7)));
                }
            }
            reg.assert_consistent();
        }
    }
}
