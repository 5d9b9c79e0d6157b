//! Vocabulary flashcards and their review cards.

use super::Database;
use crate::error::Result;
use crate::types::{CardUpdate, NewVocabulary, ReviewCard, ReviewSaveOutcome, VocabularyEntry};
use rusqlite::{OptionalExtension, TransactionBehavior, params};

const ENTRY_COLUMNS: &str = "e.id, e.user_id, e.text, e.definition, e.example, e.example_trans,
     e.real_life_def, e.surrounding_text, e.video_title, e.created_at,
     c.difficulty, c.stability, c.due_at, c.state, c.last_review_at, c.reps";

impl Database {
    /// Save a vocabulary entry with a fresh card that is due immediately
    pub fn save_vocabulary(
        &self,
        user_id: &str,
        input: &NewVocabulary,
        now: i64,
    ) -> Result<VocabularyEntry> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = uuid::Uuid::new_v4().to_string();

        tx.execute(
            "INSERT INTO vocabulary_entries
             (id, user_id, text, definition, example, example_trans, real_life_def,
              surrounding_text, video_title, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                user_id,
                input.text,
                input.definition,
                input.example.as_deref().unwrap_or(""),
                input.example_trans.as_deref().unwrap_or(""),
                input.real_life_def.as_deref().unwrap_or(""),
                input.surrounding_text.as_deref().unwrap_or(""),
                input.video_title.as_deref().unwrap_or(""),
                now,
            ],
        )?;

        tx.execute(
            "INSERT INTO vocabulary_cards
             (vocabulary_id, user_id, difficulty, stability, due_at, state, last_review_at, reps)
             VALUES (?1, ?2, 5.0, 1.0, ?3, 0, ?3, 0)",
            params![id, user_id, now],
        )?;

        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM vocabulary_entries e
             JOIN vocabulary_cards c ON c.vocabulary_id = e.id
             WHERE e.id = ?1"
        );
        let entry = tx
            .query_row(&sql, params![id], Self::map_vocabulary)
            .optional()?;
        tx.commit()?;

        entry.ok_or(crate::error::Error::VocabularyNotFound(id))
    }

    /// Cards due at or before `now`, earliest first
    pub fn list_due_vocabulary(&self, user_id: &str, now: i64) -> Result<Vec<VocabularyEntry>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM vocabulary_entries e
             JOIN vocabulary_cards c ON c.vocabulary_id = e.id
             WHERE e.user_id = ?1 AND c.due_at <= ?2
             ORDER BY c.due_at ASC, e.created_at ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![user_id, now], Self::map_vocabulary)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Apply partial card updates. Unknown or foreign ids are skipped.
    pub fn save_review_updates(
        &self,
        user_id: &str,
        updates: &[CardUpdate],
    ) -> Result<ReviewSaveOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut saved_count = 0;

        for update in updates {
            saved_count += tx.execute(
                "UPDATE vocabulary_cards SET
                   difficulty = COALESCE(?3, difficulty),
                   stability = COALESCE(?4, stability),
                   due_at = COALESCE(?5, due_at),
                   state = COALESCE(?6, state),
                   last_review_at = COALESCE(?7, last_review_at),
                   reps = COALESCE(?8, reps)
                 WHERE vocabulary_id = ?1 AND user_id = ?2",
                params![
                    update.vocabulary_id,
                    user_id,
                    update.difficulty,
                    update.stability,
                    update.due_at,
                    update.state,
                    update.last_review_at,
                    update.reps,
                ],
            )?;
        }

        tx.commit()?;

        Ok(ReviewSaveOutcome {
            success: true,
            saved_count,
            message: format!("Saved {} update(s)", saved_count),
        })
    }

    fn map_vocabulary(row: &rusqlite::Row) -> rusqlite::Result<VocabularyEntry> {
        Ok(VocabularyEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            text: row.get(2)?,
            definition: row.get(3)?,
            example: row.get(4)?,
            example_trans: row.get(5)?,
            real_life_def: row.get(6)?,
            surrounding_text: row.get(7)?,
            video_title: row.get(8)?,
            created_at: row.get(9)?,
            card: ReviewCard {
                difficulty: row.get(10)?,
                stability: row.get(11)?,
                due_at: row.get(12)?,
                state: row.get(13)?,
                last_review_at: row.get(14)?,
                reps: row.get(15)?,
            },
        })
    }
}
