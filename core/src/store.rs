//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! Services call store methods; they never execute SQL directly.
//! The store persists results as they were computed and never alters
//! a numeric output.

use crate::{
    customer::{ChargeField, LabeledCustomer, RawCustomerRecord},
    error::ChurnResult,
    population::Population,
    prediction::PredictionResult,
    types::{CustomerId, PredictionId},
};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

pub struct ChurnStore {
    conn: Connection,
}

/// A persisted prediction, as listed by `recent_predictions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub prediction_id:     PredictionId,
    pub customer_id:       Option<CustomerId>,
    pub churn_probability: f64,
    pub prediction:        String,
    pub risk_level:        String,
    pub confidence:        f64,
    pub model_version:     String,
    pub created_at:        String,
}

impl ChurnStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> ChurnResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ChurnResult<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ChurnResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Customers ──────────────────────────────────────────────

    /// A customer id already present is a Database error, never an
    /// overwrite.
    pub fn insert_customer(&self, customer: &LabeledCustomer) -> ChurnResult<()> {
        let r = customer.record.to_raw();
        self.conn.execute(
            "INSERT INTO customer (
                customer_id, gender, senior_citizen, partner, dependents, tenure,
                phone_service, multiple_lines, internet_service, online_security,
                online_backup, device_protection, tech_support, streaming_tv,
                streaming_movies, contract, paperless_billing, payment_method,
                monthly_charges, total_charges, churned
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                       ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                customer.customer_id,
                r.gender,
                r.senior_citizen,
                r.partner,
                r.dependents,
                r.tenure,
                r.phone_service,
                r.multiple_lines,
                r.internet_service,
                r.online_security,
                r.online_backup,
                r.device_protection,
                r.tech_support,
                r.streaming_tv,
                r.streaming_movies,
                r.contract,
                r.paperless_billing,
                r.payment_method,
                r.monthly_charges,
                customer.record.total_charges,
                customer.churned,
            ],
        )?;
        Ok(())
    }

    /// Insert every customer in one transaction. Nothing is written if
    /// any insert fails.
    pub fn insert_population(&self, population: &Population) -> ChurnResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for c in population.customers() {
            self.insert_customer(c)?;
        }
        tx.commit()?;
        log::info!("stored {} customers", population.len());
        Ok(())
    }

    /// Swap the stored snapshot for `population` in one transaction.
    /// On failure the previous snapshot stays in place.
    pub fn replace_population(&self, population: &Population) -> ChurnResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = self.conn.execute("DELETE FROM customer", [])?;
        for c in population.customers() {
            self.insert_customer(c)?;
        }
        tx.commit()?;
        log::info!("replaced {removed} stored customers with {}", population.len());
        Ok(())
    }

    pub fn customer_count(&self) -> ChurnResult<i64> {
        let n = self.conn.query_row("SELECT COUNT(*) FROM customer", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Load every stored customer, re-validating each row.
    pub fn load_population(&self) -> ChurnResult<Population> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, gender, senior_citizen, partner, dependents, tenure,
                    phone_service, multiple_lines, internet_service, online_security,
                    online_backup, device_protection, tech_support, streaming_tv,
                    streaming_movies, contract, paperless_billing, payment_method,
                    monthly_charges, total_charges, churned
             FROM customer ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let raw = RawCustomerRecord {
                    gender:            row.get(1)?,
                    senior_citizen:    row.get(2)?,
                    partner:           row.get(3)?,
                    dependents:        row.get(4)?,
                    tenure:            row.get(5)?,
                    phone_service:     row.get(6)?,
                    multiple_lines:    row.get(7)?,
                    internet_service:  row.get(8)?,
                    online_security:   row.get(9)?,
                    online_backup:     row.get(10)?,
                    device_protection: row.get(11)?,
                    tech_support:      row.get(12)?,
                    streaming_tv:      row.get(13)?,
                    streaming_movies:  row.get(14)?,
                    contract:          row.get(15)?,
                    paperless_billing: row.get(16)?,
                    payment_method:    row.get(17)?,
                    monthly_charges:   row.get(18)?,
                    total_charges:     Some(ChargeField::Number(row.get(19)?)),
                };
                Ok((row.get::<_, String>(0)?, raw, row.get::<_, bool>(20)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let customers = rows
            .into_iter()
            .map(|(customer_id, raw, churned)| -> ChurnResult<LabeledCustomer> {
                Ok(LabeledCustomer { customer_id, record: raw.validate()?, churned })
            })
            .collect::<ChurnResult<Vec<_>>>()?;
        Ok(Population::new(customers))
    }

    // ── Prediction history ─────────────────────────────────────

    pub fn record_prediction(
        &self,
        customer_id: Option<&str>,
        result: &PredictionResult,
    ) -> ChurnResult<PredictionId> {
        let prediction_id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO prediction_history (
                prediction_id, customer_id, churn_probability, prediction, risk_level,
                confidence, risk_factors, suggestions, model_version, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                prediction_id,
                customer_id,
                result.churn_probability,
                result.prediction.as_str(),
                result.risk_level.as_str(),
                result.confidence,
                serde_json::to_string(&result.risk_factors)?,
                serde_json::to_string(&result.suggestions)?,
                result.model_version,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(prediction_id)
    }

    pub fn prediction_count(&self) -> ChurnResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM prediction_history", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Most recent first.
    pub fn recent_predictions(&self, limit: usize) -> ChurnResult<Vec<PredictionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT prediction_id, customer_id, churn_probability, prediction, risk_level,
                    confidence, model_version, created_at
             FROM prediction_history
             ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let records = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok(PredictionRecord {
                    prediction_id:     row.get(0)?,
                    customer_id:       row.get(1)?,
                    churn_probability: row.get(2)?,
                    prediction:        row.get(3)?,
                    risk_level:        row.get(4)?,
                    confidence:        row.get(5)?,
                    model_version:     row.get(6)?,
                    created_at:        row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
