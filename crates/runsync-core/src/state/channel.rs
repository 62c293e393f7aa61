use chrono::{Duration, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, Row, params};

use crate::channel::RequeueChannel;
use crate::error::{Result, RunSyncError};
use crate::models::{
    ChannelCounts, ChannelMessage, ChannelMessageStatus, DeadLetterRate, Delivery,
    PublishReceipt, PublishRequest, ReconciliationMessage,
};

use super::{
    SqliteStateStore, i64_to_u32_saturating, i64_to_u64_saturating, timestamp_after,
    timestamp_now, usize_to_i64_saturating,
};

const DEAD_LETTER_KEY_PREFIX: &str = "dead-letter";

impl SqliteStateStore {
    fn publish_message(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        if request.topic.trim().is_empty() {
            return Err(RunSyncError::Validation("topic must not be empty".to_string()));
        }
        if request.ordering_group.trim().is_empty() {
            return Err(RunSyncError::Validation(
                "ordering group must not be empty".to_string(),
            ));
        }
        let body_json = serde_json::to_string(&request.message)?;
        let now = timestamp_now();
        let window_start = (Utc::now() - Duration::seconds(request.dedup_window_seconds.max(0)))
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        let visible_at = timestamp_after(request.delay_seconds.max(0));

        self.with_tx(|tx| {
            let existing = tx
                .query_row(
                    r"
                    SELECT id
                    FROM channel_messages
                    WHERE topic = ?1
                      AND dedup_key = ?2
                      AND created_at >= ?3
                      AND status <> 'dead_letter'
                    ORDER BY id DESC
                    LIMIT 1
                    ",
                    params![request.topic, request.dedup_key, window_start],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            if let Some(existing_message_id) = existing {
                return Ok(PublishReceipt::Deduplicated {
                    existing_message_id,
                });
            }

            tx.execute(
                r"
                INSERT INTO channel_messages(
                    topic, ordering_group, dedup_key, body_json, status,
                    receive_count, created_at, visible_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, 'new', 0, ?5, ?6, ?5)
                ",
                params![
                    request.topic,
                    request.ordering_group,
                    request.dedup_key,
                    body_json,
                    now,
                    visible_at
                ],
            )?;
            Ok(PublishReceipt::Published {
                message_id: tx.last_insert_rowid(),
            })
        })
    }

    fn lease_group_heads(
        &self,
        topic: &str,
        limit: usize,
        visibility_timeout_seconds: i64,
    ) -> Result<Vec<Delivery>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let now = timestamp_now();
        let lease_expires_at = timestamp_after(visibility_timeout_seconds.max(1));

        self.with_tx(|tx| {
            let mut stmt = tx.prepare(
                r"
                SELECT m.id, m.topic, m.ordering_group, m.dedup_key, m.receive_count, m.body_json
                FROM channel_messages m
                WHERE m.topic = ?1
                  AND m.status = 'new'
                  AND m.visible_at <= ?2
                  AND m.id = (
                      SELECT MIN(h.id)
                      FROM channel_messages h
                      WHERE h.topic = m.topic
                        AND h.ordering_group = m.ordering_group
                        AND h.status IN ('new', 'processing')
                  )
                ORDER BY m.visible_at ASC, m.id ASC
                LIMIT ?3
                ",
            )?;
            let rows = stmt.query_map(
                params![topic, now, usize_to_i64_saturating(limit)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )?;
            let mut heads = Vec::new();
            for row in rows {
                heads.push(row?);
            }
            drop(stmt);

            let mut deliveries = Vec::with_capacity(heads.len());
            for (message_id, topic, ordering_group, dedup_key, receive_count, body_json) in heads {
                tx.execute(
                    r"
                    UPDATE channel_messages
                    SET status = 'processing',
                        receive_count = receive_count + 1,
                        lease_expires_at = ?2,
                        updated_at = ?3
                    WHERE id = ?1
                    ",
                    params![message_id, lease_expires_at, now],
                )?;
                let body = serde_json::from_str(&body_json)
                    .unwrap_or(serde_json::Value::String(body_json));
                deliveries.push(Delivery {
                    message_id,
                    topic,
                    ordering_group,
                    dedup_key,
                    receive_count: i64_to_u32_saturating(receive_count).saturating_add(1),
                    body,
                });
            }
            Ok(deliveries)
        })
    }

    fn finish_lease(&self, message_id: i64) -> Result<()> {
        let now = timestamp_now();
        self.with_conn(|conn| {
            let affected = conn.execute(
                r"
                UPDATE channel_messages
                SET status = 'done', lease_expires_at = NULL, updated_at = ?2
                WHERE id = ?1 AND status = 'processing'
                ",
                params![message_id, now],
            )?;
            if affected == 0 {
                return Err(RunSyncError::Channel(format!(
                    "message {message_id} is not leased"
                )));
            }
            Ok(())
        })
    }

    fn release_lease(&self, message_id: i64, delay_seconds: i64, error: Option<&str>) -> Result<()> {
        let now = timestamp_now();
        let visible_at = timestamp_after(delay_seconds.max(0));
        self.with_conn(|conn| {
            let affected = conn.execute(
                r"
                UPDATE channel_messages
                SET status = 'new',
                    visible_at = ?2,
                    lease_expires_at = NULL,
                    last_error = COALESCE(?3, last_error),
                    updated_at = ?4
                WHERE id = ?1 AND status = 'processing'
                ",
                params![message_id, visible_at, error, now],
            )?;
            if affected == 0 {
                return Err(RunSyncError::Channel(format!(
                    "message {message_id} is not leased"
                )));
            }
            Ok(())
        })
    }

    fn recover_leases(&self, topic: &str) -> Result<u64> {
        let now = timestamp_now();
        self.with_conn(|conn| {
            let affected = conn.execute(
                r"
                UPDATE channel_messages
                SET status = 'new',
                    visible_at = ?2,
                    lease_expires_at = NULL,
                    updated_at = ?2
                WHERE topic = ?1
                  AND status = 'processing'
                  AND COALESCE(lease_expires_at, updated_at) <= ?2
                ",
                params![topic, now],
            )?;
            Ok(u64::try_from(affected).unwrap_or(u64::MAX))
        })
    }

    /// Parks `message` once per `(group, sequence, attempt)`. A repeat for
    /// the same key, parked or already redriven, returns the existing row.
    fn insert_dead_letter(
        &self,
        topic: &str,
        ordering_group: &str,
        message: &ReconciliationMessage,
        reason: &str,
    ) -> Result<i64> {
        let body_json = serde_json::to_string(message)?;
        let now = timestamp_now();
        let dedup_key = format!(
            "{DEAD_LETTER_KEY_PREFIX}:{ordering_group}:{}:{}",
            message.sequence, message.attempt
        );
        self.with_tx(|tx| {
            let existing = tx
                .query_row(
                    r"
                    SELECT id
                    FROM channel_messages
                    WHERE topic = ?1
                      AND dedup_key = ?2
                      AND status IN ('dead_letter', 'redriven')
                    ORDER BY id ASC
                    LIMIT 1
                    ",
                    params![topic, dedup_key],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok(id);
            }
            tx.execute(
                r"
                INSERT INTO channel_messages(
                    topic, ordering_group, dedup_key, body_json, status,
                    receive_count, created_at, visible_at, updated_at, last_error
                )
                VALUES (?1, ?2, ?3, ?4, 'dead_letter', 0, ?5, ?5, ?5, ?6)
                ",
                params![topic, ordering_group, dedup_key, body_json, now, reason],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    pub fn get_channel_message(&self, id: i64) -> Result<Option<ChannelMessage>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    r"
                    SELECT id, topic, ordering_group, dedup_key, status, receive_count,
                           body_json, created_at, visible_at, last_error
                    FROM channel_messages
                    WHERE id = ?1
                    ",
                    params![id],
                    channel_message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_channel_messages(
        &self,
        topic: &str,
        status: ChannelMessageStatus,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT id, topic, ordering_group, dedup_key, status, receive_count,
                       body_json, created_at, visible_at, last_error
                FROM channel_messages
                WHERE topic = ?1 AND status = ?2
                ORDER BY id ASC
                LIMIT ?3
                ",
            )?;
            let rows = stmt.query_map(
                params![topic, status.as_str(), usize_to_i64_saturating(limit)],
                channel_message_from_row,
            )?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Flips a dead-letter row to `redriven`. Returns false when the row is
    /// missing or was already redriven.
    pub fn mark_dead_letter_redriven(&self, id: i64) -> Result<bool> {
        let now = timestamp_now();
        self.with_conn(|conn| {
            let affected = conn.execute(
                r"
                UPDATE channel_messages
                SET status = 'redriven', updated_at = ?2
                WHERE id = ?1 AND status = 'dead_letter'
                ",
                params![id, now],
            )?;
            Ok(affected == 1)
        })
    }

    pub fn channel_counts(&self, topic: &str) -> Result<ChannelCounts> {
        let now = timestamp_now();
        self.with_conn(|conn| {
            let row = conn.query_row(
                r"
                SELECT
                    COALESCE(SUM(CASE WHEN status = 'new' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'new' AND visible_at <= ?2 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'dead_letter' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'redriven' THEN 1 ELSE 0 END), 0),
                    MIN(CASE WHEN status = 'new' THEN visible_at ELSE NULL END)
                FROM channel_messages
                WHERE topic = ?1
                ",
                params![topic, now],
                |row| {
                    Ok(ChannelCounts {
                        new_total: i64_to_u64_saturating(row.get(0)?),
                        new_due: i64_to_u64_saturating(row.get(1)?),
                        processing: i64_to_u64_saturating(row.get(2)?),
                        done: i64_to_u64_saturating(row.get(3)?),
                        dead_letter: i64_to_u64_saturating(row.get(4)?),
                        redriven: i64_to_u64_saturating(row.get(5)?),
                        earliest_visible_at: row.get(6)?,
                    })
                },
            )?;
            Ok(row)
        })
    }

    pub fn dead_letter_rates_by_topic(&self) -> Result<Vec<DeadLetterRate>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT
                    topic,
                    COUNT(*) AS total,
                    SUM(CASE WHEN status IN ('dead_letter', 'redriven') THEN 1 ELSE 0 END) AS dead_letter
                FROM channel_messages
                GROUP BY topic
                ORDER BY topic ASC
                ",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (topic, total_raw, dead_letter_raw) = row?;
                let total = i64_to_u64_saturating(total_raw);
                let dead_letter = i64_to_u64_saturating(dead_letter_raw);
                let dead_letter_rate = if total == 0 {
                    0.0
                } else {
                    ratio_u64(dead_letter, total)
                };
                out.push(DeadLetterRate {
                    topic,
                    total,
                    dead_letter,
                    dead_letter_rate,
                });
            }
            Ok(out)
        })
    }

    #[cfg(test)]
    pub(crate) fn force_channel_visible_now(&self, id: i64) -> Result<()> {
        let now = timestamp_now();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE channel_messages SET visible_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
    }

    #[cfg(test)]
    pub(crate) fn expire_channel_lease_for_test(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE channel_messages SET lease_expires_at = '1970-01-01T00:00:00.000000Z' WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
    }

    #[cfg(test)]
    pub(crate) fn age_channel_message_for_test(&self, id: i64, created_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE channel_messages SET created_at = ?1 WHERE id = ?2",
                params![created_at, id],
            )?;
            Ok(())
        })
    }
}

impl RequeueChannel for SqliteStateStore {
    fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        self.publish_message(request)
    }

    fn receive(
        &self,
        topic: &str,
        limit: usize,
        visibility_timeout_seconds: i64,
    ) -> Result<Vec<Delivery>> {
        self.lease_group_heads(topic, limit, visibility_timeout_seconds)
    }

    fn acknowledge(&self, message_id: i64) -> Result<()> {
        self.finish_lease(message_id)
    }

    fn release(&self, message_id: i64, delay_seconds: i64, error: Option<&str>) -> Result<()> {
        self.release_lease(message_id, delay_seconds, error)
    }

    fn recover_expired_leases(&self, topic: &str) -> Result<u64> {
        self.recover_leases(topic)
    }

    fn dead_letter(
        &self,
        topic: &str,
        ordering_group: &str,
        message: &ReconciliationMessage,
        reason: &str,
    ) -> Result<i64> {
        self.insert_dead_letter(topic, ordering_group, message, reason)
    }
}

fn channel_message_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelMessage> {
    let body_json: String = row.get(6)?;
    let receive_count: i64 = row.get(5)?;
    Ok(ChannelMessage {
        id: row.get(0)?,
        topic: row.get(1)?,
        ordering_group: row.get(2)?,
        dedup_key: row.get(3)?,
        status: row.get(4)?,
        receive_count: i64_to_u32_saturating(receive_count),
        body: serde_json::from_str(&body_json).unwrap_or(serde_json::Value::String(body_json)),
        created_at: row.get(7)?,
        visible_at: row.get(8)?,
        last_error: row.get(9)?,
    })
}

fn ratio_u64(numerator: u64, denominator: u64) -> f64 {
    #[allow(
        clippy::cast_precision_loss,
        reason = "dead-letter ratios are reported as approximate floats"
    )]
    {
        numerator as f64 / denominator as f64
    }
}
