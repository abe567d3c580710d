use murmur_types::api::Nickname;
use murmur_types::block::{self, BlockList};
use rusqlite::params;
use uuid::Uuid;

use crate::models::{NicknameRow, parse_uuid};
use crate::{Database, StoreError, StoreResult};

impl Database {
    // -- Blocks --

    pub fn block_user(&self, user_id: Uuid, target_id: Uuid) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO blocks (user_id, blocked_id) VALUES (?1, ?2)",
                params![user_id.to_string(), target_id.to_string()],
            )?;
            Ok(())
        })
    }

    pub fn unblock_user(&self, user_id: Uuid, target_id: Uuid) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM blocks WHERE user_id = ?1 AND blocked_id = ?2",
                params![user_id.to_string(), target_id.to_string()],
            )?;
            Ok(())
        })
    }

    pub fn block_list(&self, user_id: Uuid) -> StoreResult<BlockList> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT blocked_id FROM blocks WHERE user_id = ?1")?;
            let raw = stmt
                .query_map([user_id.to_string()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            let blocked = raw
                .iter()
                .map(|id| parse_uuid(id, "blocked_id"))
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(BlockList::new(user_id, blocked))
        })
    }

    /// Whether either user has blocked the other, read fresh from the store.
    pub fn is_blocked(&self, a: Uuid, b: Uuid) -> StoreResult<bool> {
        let a = self.block_list(a)?;
        let b = self.block_list(b)?;
        Ok(block::is_blocked(&a, &b))
    }

    // -- Nicknames --

    pub fn set_nickname(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
        nickname: &str,
    ) -> StoreResult<Nickname> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(StoreError::Validation("nickname must not be empty"));
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO nicknames (user_id, contact_id, nickname) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, contact_id) DO UPDATE SET nickname = excluded.nickname",
                params![user_id.to_string(), contact_id.to_string(), nickname],
            )?;
            Ok(Nickname {
                contact_id,
                nickname: nickname.to_string(),
            })
        })
    }

    pub fn nicknames(&self, user_id: Uuid) -> StoreResult<Vec<Nickname>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT contact_id, nickname FROM nicknames WHERE user_id = ?1 ORDER BY contact_id",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(NicknameRow {
                        contact_id: row.get(0)?,
                        nickname: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|row| {
                    Ok(Nickname {
                        contact_id: parse_uuid(&row.contact_id, "contact_id")?,
                        nickname: row.nickname,
                    })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_and_unblock() {
        let db = Database::open_in_memory().unwrap();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();

        assert!(!db.is_blocked(x, y).unwrap());

        db.block_user(x, y).unwrap();
        db.block_user(x, y).unwrap();
        assert!(db.is_blocked(x, y).unwrap());
        assert!(db.is_blocked(y, x).unwrap());
        assert_eq!(db.block_list(x).unwrap().blocked.len(), 1);

        db.unblock_user(x, y).unwrap();
        assert!(!db.is_blocked(y, x).unwrap());
    }

    #[test]
    fn nickname_replaces_previous() {
        let db = Database::open_in_memory().unwrap();
        let me = Uuid::new_v4();
        let friend = Uuid::new_v4();

        db.set_nickname(me, friend, "Bob").unwrap();
        db.set_nickname(me, friend, "Bobby").unwrap();

        let names = db.nicknames(me).unwrap();
        assert_eq!(
            names,
            vec![Nickname { contact_id: friend, nickname: "Bobby".into() }]
        );
        assert!(matches!(
            db.set_nickname(me, friend, "  "),
            Err(StoreError::Validation(_))
        ));
    }
}
