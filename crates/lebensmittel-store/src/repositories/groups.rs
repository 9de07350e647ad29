//! Group repository: the `groups` and `user_groups` tables.

use lebensmittel_core::{GroupId, UserId};
use rusqlite::{Connection, OptionalExtension, params};

use super::require_non_empty;
use crate::errors::Result;
use crate::models::Group;

/// Group repository.
pub struct GroupRepo;

impl GroupRepo {
    /// Create a group and make `creator` its first member.
    pub fn create(conn: &Connection, name: &str, creator: &UserId) -> Result<Group> {
        require_non_empty("name", name)?;
        let group = Group {
            id: GroupId::generate(),
            name: name.trim().to_string(),
        };
        let tx = conn.unchecked_transaction()?;
        let _ = tx.execute(
            "INSERT INTO groups (id, name) VALUES (?1, ?2)",
            params![group.id.as_str(), group.name],
        )?;
        let _ = Self::add_member(&tx, creator, &group.id)?;
        tx.commit()?;
        Ok(group)
    }

    /// Get a group by id.
    pub fn get(conn: &Connection, id: &GroupId) -> Result<Option<Group>> {
        let row = conn
            .query_row(
                "SELECT id, name FROM groups WHERE id = ?1",
                params![id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Groups `user` belongs to, oldest membership first.
    pub fn list_for_user(conn: &Connection, user: &UserId) -> Result<Vec<Group>> {
        let mut stmt = conn.prepare(
            "SELECT g.id, g.name
             FROM groups g
             JOIN user_groups ug ON g.id = ug.group_id
             WHERE ug.user_id = ?1
             ORDER BY ug.joined_at, ug.rowid",
        )?;
        let rows = stmt
            .query_map(params![user.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Ids of the groups `user` belongs to, in the same order as [`Self::list_for_user`].
    pub fn group_ids_for_user(conn: &Connection, user: &UserId) -> Result<Vec<GroupId>> {
        let mut stmt = conn.prepare(
            "SELECT group_id FROM user_groups
             WHERE user_id = ?1
             ORDER BY joined_at, rowid",
        )?;
        let rows = stmt
            .query_map(params![user.as_str()], |row| {
                row.get::<_, String>(0).map(GroupId::from)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Add `user` to `group`. Returns `false` if already a member.
    pub fn add_member(conn: &Connection, user: &UserId, group: &GroupId) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO user_groups (user_id, group_id, joined_at) VALUES (?1, ?2, ?3)",
            params![user.as_str(), group.as_str(), now],
        )?;
        Ok(changed > 0)
    }

    /// Whether `user` belongs to `group`.
    pub fn is_member(conn: &Connection, user: &UserId, group: &GroupId) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM user_groups WHERE user_id = ?1 AND group_id = ?2",
                params![user.as_str(), group.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
        Ok(Group {
            id: GroupId::from(row.get::<_, String>(0)?),
            name: row.get(1)?,
        })
    }
}
