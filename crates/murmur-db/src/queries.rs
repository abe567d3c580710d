use std::collections::HashMap;

use murmur_types::models::{ConversationPair, Message, Reaction, TOMBSTONE};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::models::{HiddenRow, MESSAGE_COLUMNS, MessageRow, ReactionRow, parse_uuid};
use crate::{Database, StoreError, StoreResult};

/// Ids bound per `IN (...)` lookup. SQLite caps bound variables per statement.
const ID_BATCH: usize = 500;

impl Database {
    // -- Appends --

    /// Store a new user message. The sender must be one of the participants.
    pub fn append(
        &self,
        participants: ConversationPair,
        sender_id: Uuid,
        text: &str,
    ) -> StoreResult<Message> {
        self.insert_message(participants, sender_id, text, false)
    }

    /// Store a system notice. Never subject to block checks.
    pub fn system_append(
        &self,
        participants: ConversationPair,
        sender_id: Uuid,
        text: &str,
    ) -> StoreResult<Message> {
        self.insert_message(participants, sender_id, text, true)
    }

    fn insert_message(
        &self,
        participants: ConversationPair,
        sender_id: Uuid,
        text: &str,
        is_system: bool,
    ) -> StoreResult<Message> {
        require_text(text)?;
        if !participants.contains(sender_id) {
            return Err(StoreError::Validation("sender is not a participant"));
        }

        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            let now = self.next_stamp();
            conn.execute(
                "INSERT INTO messages (id, user_low, user_high, sender_id, body, is_system, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id.to_string(),
                    participants.low().to_string(),
                    participants.high().to_string(),
                    sender_id.to_string(),
                    text,
                    is_system,
                    now
                ],
            )?;
            load_message(conn, id)
        })
    }

    // -- Reads --

    /// Every message of the pair still visible to `viewer`, oldest update first.
    ///
    /// Ordering is by last update, so an edited message moves to the position
    /// of its edit.
    pub fn fetch(&self, participants: ConversationPair, viewer: Uuid) -> StoreResult<Vec<Message>> {
        if !participants.contains(viewer) {
            return Err(StoreError::Validation("viewer is not a participant"));
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 WHERE m.user_low = ?1 AND m.user_high = ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM message_hidden h
                       WHERE h.message_id = m.id AND h.user_id = ?3
                   )
                 ORDER BY m.updated_at ASC, m.id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        participants.low().to_string(),
                        participants.high().to_string(),
                        viewer.to_string()
                    ],
                    MessageRow::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;

            assemble(conn, rows)
        })
    }

    pub fn get_message(&self, id: Uuid) -> StoreResult<Message> {
        self.with_conn(|conn| load_message(conn, id))
    }

    // -- Mutations --

    /// Replace the body in place. Any caller holding the id may edit.
    pub fn edit(&self, id: Uuid, new_text: &str) -> StoreResult<Message> {
        require_text(new_text)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE messages SET body = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_text, self.next_stamp(), id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            let message = load_message(&tx, id)?;
            tx.commit()?;
            Ok(message)
        })
    }

    /// Hide the message from `viewer` only. Idempotent, and the update time
    /// is left alone so the other participant's ordering does not move.
    pub fn delete_for_user(&self, id: Uuid, viewer: Uuid) -> StoreResult<()> {
        self.with_conn(|conn| {
            let participants = load_participants(conn, id)?;
            if !participants.contains(viewer) {
                return Err(StoreError::Validation("viewer is not a participant"));
            }
            conn.execute(
                "INSERT OR IGNORE INTO message_hidden (message_id, user_id) VALUES (?1, ?2)",
                params![id.to_string(), viewer.to_string()],
            )?;
            Ok(())
        })
    }

    /// Tombstone the body for both participants. Reactions, the system flag
    /// and per-viewer hiding are untouched.
    pub fn delete_for_everyone(&self, id: Uuid) -> StoreResult<Message> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE messages SET body = ?1, updated_at = ?2 WHERE id = ?3",
                params![TOMBSTONE, self.next_stamp(), id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            let message = load_message(&tx, id)?;
            tx.commit()?;
            Ok(message)
        })
    }

    /// Set `reactor`'s reaction, replacing any earlier one. Returns the full
    /// reaction list afterwards, the replaced entry moved to the end.
    pub fn react(&self, id: Uuid, reactor: Uuid, emoji: &str) -> StoreResult<Vec<Reaction>> {
        if emoji.trim().is_empty() {
            return Err(StoreError::Validation("emoji must not be empty"));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = self.next_stamp();
            let changed = tx.execute(
                "UPDATE messages SET updated_at = ?1 WHERE id = ?2",
                params![now, id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }

            tx.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2",
                params![id.to_string(), reactor.to_string()],
            )?;
            tx.execute(
                "INSERT INTO reactions (message_id, user_id, emoji, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), reactor.to_string(), emoji, now],
            )?;

            let reactions = query_reactions(&tx, &[id.to_string()])?
                .into_iter()
                .map(ReactionRow::into_reaction)
                .collect::<StoreResult<Vec<_>>>()?;
            tx.commit()?;
            Ok(reactions)
        })
    }

    /// Hide every message of the pair from `user_id`. Returns how many
    /// messages were newly hidden.
    pub fn clear_chat(&self, participants: ConversationPair, user_id: Uuid) -> StoreResult<usize> {
        if !participants.contains(user_id) {
            return Err(StoreError::Validation("user is not a participant"));
        }

        self.with_conn(|conn| {
            let hidden = conn.execute(
                "INSERT OR IGNORE INTO message_hidden (message_id, user_id)
                 SELECT id, ?3 FROM messages WHERE user_low = ?1 AND user_high = ?2",
                params![
                    participants.low().to_string(),
                    participants.high().to_string(),
                    user_id.to_string()
                ],
            )?;
            Ok(hidden)
        })
    }
}

fn require_text(text: &str) -> StoreResult<()> {
    if text.is_empty() {
        return Err(StoreError::Validation("message text must not be empty"));
    }
    Ok(())
}

fn load_participants(conn: &Connection, id: Uuid) -> StoreResult<ConversationPair> {
    let pair: Option<(String, String)> = conn
        .query_row(
            "SELECT user_low, user_high FROM messages WHERE id = ?1",
            [id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (low, high) = pair.ok_or(StoreError::NotFound(id))?;
    ConversationPair::new(parse_uuid(&low, "user_low")?, parse_uuid(&high, "user_high")?)
        .map_err(|_| StoreError::Corrupt(format!("message {id} has one participant")))
}

fn load_message(conn: &Connection, id: Uuid) -> StoreResult<Message> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id.to_string()], MessageRow::from_row)
        .optional()?
        .ok_or(StoreError::NotFound(id))?;

    assemble(conn, vec![row])?
        .pop()
        .ok_or(StoreError::NotFound(id))
}

/// Attach reactions and per-viewer hiding to a batch of rows, keeping order.
fn assemble(conn: &Connection, rows: Vec<MessageRow>) -> StoreResult<Vec<Message>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut reactions: HashMap<String, Vec<Reaction>> = HashMap::new();
    let mut hidden: HashMap<String, Vec<Uuid>> = HashMap::new();
    for batch in ids.chunks(ID_BATCH) {
        for row in query_reactions(conn, batch)? {
            let key = row.message_id.clone();
            reactions.entry(key).or_default().push(row.into_reaction()?);
        }
        for row in query_hidden(conn, batch)? {
            let user_id = parse_uuid(&row.user_id, "hidden user_id")?;
            hidden.entry(row.message_id).or_default().push(user_id);
        }
    }

    rows.into_iter()
        .map(|row| {
            let deleted_for = hidden.remove(&row.id).unwrap_or_default();
            let reactions = reactions.remove(&row.id).unwrap_or_default();
            row.into_message(deleted_for, reactions)
        })
        .collect()
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn query_reactions(conn: &Connection, message_ids: &[String]) -> StoreResult<Vec<ReactionRow>> {
    if message_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT message_id, user_id, emoji FROM reactions
         WHERE message_id IN ({})
         ORDER BY created_at ASC",
        placeholders(message_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(message_ids), |row| {
            Ok(ReactionRow {
                message_id: row.get(0)?,
                user_id: row.get(1)?,
                emoji: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_hidden(conn: &Connection, message_ids: &[String]) -> StoreResult<Vec<HiddenRow>> {
    if message_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT message_id, user_id FROM message_hidden WHERE message_id IN ({})",
        placeholders(message_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(message_ids), |row| {
            Ok(HiddenRow {
                message_id: row.get(0)?,
                user_id: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, Uuid, Uuid, ConversationPair) {
        let db = Database::open_in_memory().unwrap();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let pair = ConversationPair::new(x, y).unwrap();
        (db, x, y, pair)
    }

    fn texts(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn append_then_fetch_from_either_side() {
        let (db, x, y, pair) = setup();
        let sent = db.append(pair, x, "hi").unwrap();

        let seen_by_y = db.fetch(pair, y).unwrap();
        assert_eq!(seen_by_y.len(), 1);
        assert_eq!(seen_by_y[0].id, sent.id);
        assert_eq!(seen_by_y[0].text, "hi");
        assert_eq!(seen_by_y[0].sender_id, x);
        assert!(!seen_by_y[0].is_system);
        assert!(seen_by_y[0].reactions.is_empty());
        assert!(seen_by_y[0].deleted_for.is_empty());

        let reversed = ConversationPair::new(y, x).unwrap();
        assert_eq!(db.fetch(reversed, x).unwrap().len(), 1);
    }

    #[test]
    fn append_rejects_empty_text_and_outside_sender() {
        let (db, _, y, pair) = setup();
        assert!(matches!(db.append(pair, y, ""), Err(StoreError::Validation(_))));
        assert!(matches!(
            db.append(pair, Uuid::new_v4(), "hi"),
            Err(StoreError::Validation(_))
        ));
        assert!(db.fetch(pair, y).unwrap().is_empty());
    }

    #[test]
    fn conversations_are_isolated() {
        let (db, x, y, pair) = setup();
        let z = Uuid::new_v4();
        let other = ConversationPair::new(x, z).unwrap();
        db.append(pair, x, "to y").unwrap();
        db.append(other, x, "to z").unwrap();

        assert_eq!(texts(&db.fetch(pair, y).unwrap()), vec!["to y"]);
        assert_eq!(texts(&db.fetch(other, z).unwrap()), vec!["to z"]);
    }

    #[test]
    fn fetch_requires_a_participant_viewer() {
        let (db, _, _, pair) = setup();
        assert!(matches!(
            db.fetch(pair, Uuid::new_v4()),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn edit_moves_message_to_its_edit_position() {
        let (db, x, y, pair) = setup();
        let first = db.append(pair, x, "first").unwrap();
        db.append(pair, y, "second").unwrap();

        let edited = db.edit(first.id, "first, edited").unwrap();
        assert_eq!(edited.text, "first, edited");
        assert!(edited.updated_at > first.updated_at);
        assert_eq!(edited.created_at, first.created_at);

        assert_eq!(
            texts(&db.fetch(pair, x).unwrap()),
            vec!["second", "first, edited"]
        );
    }

    #[test]
    fn edit_unknown_or_empty() {
        let (db, x, _, pair) = setup();
        let missing = Uuid::new_v4();
        assert!(matches!(db.edit(missing, "x"), Err(StoreError::NotFound(id)) if id == missing));

        let m = db.append(pair, x, "hi").unwrap();
        assert!(matches!(db.edit(m.id, ""), Err(StoreError::Validation(_))));
        assert_eq!(db.get_message(m.id).unwrap().text, "hi");
    }

    #[test]
    fn delete_for_user_hides_only_from_that_viewer() {
        let (db, x, y, pair) = setup();
        let m = db.append(pair, x, "oops").unwrap();

        db.delete_for_user(m.id, x).unwrap();
        assert!(db.fetch(pair, x).unwrap().is_empty());
        assert_eq!(texts(&db.fetch(pair, y).unwrap()), vec!["oops"]);
        assert_eq!(db.get_message(m.id).unwrap().deleted_for, vec![x]);
    }

    #[test]
    fn delete_for_user_is_idempotent() {
        let (db, x, y, pair) = setup();
        let m = db.append(pair, x, "oops").unwrap();
        db.append(pair, y, "later").unwrap();
        let before_y = db.fetch(pair, y).unwrap();

        db.delete_for_user(m.id, x).unwrap();
        // The other side's view, order and timestamps included, does not move.
        let after_y = db.fetch(pair, y).unwrap();
        assert_eq!(texts(&after_y), vec!["oops", "later"]);
        assert_eq!(after_y[0].updated_at, before_y[0].updated_at);
        assert_eq!(db.get_message(m.id).unwrap().updated_at, m.updated_at);
        let once_x = db.fetch(pair, x).unwrap();
        let once_y = db.fetch(pair, y).unwrap();

        db.delete_for_user(m.id, x).unwrap();
        assert_eq!(db.fetch(pair, x).unwrap(), once_x);
        assert_eq!(db.fetch(pair, y).unwrap(), once_y);
        assert_eq!(db.get_message(m.id).unwrap().deleted_for, vec![x]);
    }

    #[test]
    fn delete_for_user_rejects_outsiders_and_unknown_ids() {
        let (db, x, _, pair) = setup();
        let m = db.append(pair, x, "hi").unwrap();
        assert!(matches!(
            db.delete_for_user(m.id, Uuid::new_v4()),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.delete_for_user(Uuid::new_v4(), x),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_for_everyone_tombstones_for_both() {
        let (db, x, y, pair) = setup();
        let m = db.append(pair, x, "regret").unwrap();
        db.react(m.id, y, "😮").unwrap();

        let deleted = db.delete_for_everyone(m.id).unwrap();
        assert_eq!(deleted.text, TOMBSTONE);
        assert!(deleted.deleted_for.is_empty());
        assert_eq!(deleted.reactions.len(), 1);
        assert!(!deleted.is_system);

        for viewer in [x, y] {
            let seen = db.fetch(pair, viewer).unwrap();
            assert_eq!(texts(&seen), vec![TOMBSTONE]);
        }
    }

    #[test]
    fn delete_for_everyone_unknown_id() {
        let (db, _, _, _) = setup();
        assert!(matches!(
            db.delete_for_everyone(Uuid::new_v4()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn react_keeps_one_reaction_per_reactor() {
        let (db, x, y, pair) = setup();
        let m = db.append(pair, x, "news").unwrap();

        db.react(m.id, x, "👍").unwrap();
        db.react(m.id, y, "😂").unwrap();
        let reactions = db.react(m.id, x, "❤️").unwrap();

        assert_eq!(
            reactions,
            vec![
                Reaction { user_id: y, emoji: "😂".into() },
                Reaction { user_id: x, emoji: "❤️".into() },
            ]
        );
        assert_eq!(db.get_message(m.id).unwrap().reactions, reactions);
    }

    #[test]
    fn react_unknown_or_empty() {
        let (db, x, _, pair) = setup();
        assert!(matches!(
            db.react(Uuid::new_v4(), x, "👍"),
            Err(StoreError::NotFound(_))
        ));
        let m = db.append(pair, x, "hi").unwrap();
        assert!(matches!(db.react(m.id, x, " "), Err(StoreError::Validation(_))));
    }

    #[test]
    fn system_append_sets_flag() {
        let (db, x, y, pair) = setup();
        let m = db.system_append(pair, x, "x changed y's nickname").unwrap();
        assert!(m.is_system);

        let seen = db.fetch(pair, y).unwrap();
        assert!(seen[0].is_system);
    }

    #[test]
    fn clear_chat_hides_everything_for_one_side() {
        let (db, x, y, pair) = setup();
        db.append(pair, x, "a").unwrap();
        let b = db.append(pair, y, "b").unwrap();
        db.delete_for_user(b.id, x).unwrap();

        assert_eq!(db.clear_chat(pair, x).unwrap(), 1);
        assert!(db.fetch(pair, x).unwrap().is_empty());
        assert_eq!(db.fetch(pair, y).unwrap().len(), 2);

        // Messages arriving after the clear are visible again.
        db.append(pair, y, "c").unwrap();
        assert_eq!(texts(&db.fetch(pair, x).unwrap()), vec!["c"]);
    }

    #[test]
    fn fetch_matches_per_viewer_visibility() {
        let (db, x, y, pair) = setup();
        let a = db.append(pair, x, "a").unwrap();
        let b = db.append(pair, y, "b").unwrap();
        db.delete_for_user(a.id, y).unwrap();
        db.delete_for_user(b.id, x).unwrap();

        let all = [db.get_message(a.id).unwrap(), db.get_message(b.id).unwrap()];
        for viewer in [x, y] {
            let expected: Vec<Uuid> = all
                .iter()
                .filter(|m| m.is_visible_to(viewer))
                .map(|m| m.id)
                .collect();
            let seen: Vec<Uuid> = db.fetch(pair, viewer).unwrap().iter().map(|m| m.id).collect();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn fetch_handles_conversations_past_the_bind_limit() {
        let (db, x, y, pair) = setup();
        let total = 33_000;
        let ids: Vec<String> = (0..total).map(|_| Uuid::new_v4().to_string()).collect();

        db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO messages (id, user_low, user_high, sender_id, body, is_system, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 'bulk', 0, ?5, ?5)",
                )?;
                for id in &ids {
                    stmt.execute(params![
                        id,
                        pair.low().to_string(),
                        pair.high().to_string(),
                        x.to_string(),
                        db.next_stamp()
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .unwrap();

        let first: Uuid = ids[0].parse().unwrap();
        let last: Uuid = ids[total - 1].parse().unwrap();
        db.react(last, y, "👍").unwrap();
        db.delete_for_user(first, y).unwrap();

        let seen = db.fetch(pair, y).unwrap();
        assert_eq!(seen.len(), total - 1);
        // The reaction bumped `last` to the end.
        let tail = seen.last().unwrap();
        assert_eq!(tail.id, last);
        assert_eq!(tail.reactions, vec![Reaction { user_id: y, emoji: "👍".into() }]);

        let seen_by_x = db.fetch(pair, x).unwrap();
        assert_eq!(seen_by_x.len(), total);
        assert_eq!(seen_by_x[0].deleted_for, vec![y]);
    }

    #[test]
    fn timestamps_are_strictly_increasing() {
        let (db, x, _, pair) = setup();
        let stamps: Vec<_> = (0..50)
            .map(|i| db.append(pair, x, &format!("m{i}")).unwrap().updated_at)
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }
}
