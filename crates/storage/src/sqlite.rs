use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::debug;

use vistaar_core::{
    ids::{AreaId, OverrideId, ProductId},
    level::AreaLevel,
    payload::OverridePayload,
    scope::{EntityRef, Scope, Variant},
};

use crate::error::StorageError;
use crate::traits::{AreaRow, OrderRow, OverrideRow, OverrideStore, ProductRow};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339()
}

fn parse_stamp(raw: &str, label: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("invalid {label} timestamp: {e}")))
}

fn parse_decimal(raw: &str, label: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(raw)
        .map_err(|e| StorageError::Serialization(format!("invalid {label} decimal: {e}")))
}

type RawArea = (i64, String, String, Option<i64>, bool, String, String);

fn area_from_raw(raw: RawArea) -> Result<AreaRow, StorageError> {
    let (id, name, level, parent_id, active, created_at, updated_at) = raw;
    Ok(AreaRow {
        id: AreaId::new(id),
        name,
        level: AreaLevel::parse(&level),
        parent_id: parent_id.map(AreaId::new),
        active,
        created_at: parse_stamp(&created_at, "created_at")?,
        updated_at: parse_stamp(&updated_at, "updated_at")?,
    })
}

type RawOverride = (i64, String, i64, String, Option<i64>, String, bool, String, String);

fn override_from_raw(raw: RawOverride) -> Result<OverrideRow, StorageError> {
    let (id, entity_kind, entity_id, variant, area_id, payload, active, created_at, updated_at) =
        raw;
    let variant = Variant::parse(&variant)?;
    let payload = OverridePayload::from_json(&payload)?;
    if payload.variant() != variant {
        return Err(StorageError::Serialization(format!(
            "override {id}: payload tag {} does not match row variant {variant}",
            payload.variant()
        )));
    }
    Ok(OverrideRow {
        id: OverrideId::new(id),
        entity: EntityRef::from_parts(&entity_kind, entity_id)?,
        variant,
        scope: match area_id {
            Some(a) => Scope::Area(AreaId::new(a)),
            None => Scope::Global,
        },
        payload,
        active,
        created_at: parse_stamp(&created_at, "created_at")?,
        updated_at: parse_stamp(&updated_at, "updated_at")?,
    })
}

const OVERRIDE_COLS: &str =
    "id, entity_kind, entity_id, variant, area_id, payload, active, created_at, updated_at";

fn read_override_raw(row: &rusqlite::Row) -> Result<RawOverride, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

impl OverrideStore for SqliteStore {
    fn load_active_areas(&self) -> Result<Vec<AreaRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, level, parent_id, active, created_at, updated_at
             FROM areas WHERE active = 1 ORDER BY id",
        )?;
        let raws: Vec<RawArea> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(area_from_raw).collect()
    }

    fn active_overrides_at(
        &self,
        entity: EntityRef,
        variant: Variant,
        scope: Scope,
    ) -> Result<Vec<OverrideRow>, StorageError> {
        let raws: Vec<RawOverride> = match scope {
            Scope::Area(area_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {OVERRIDE_COLS} FROM overrides
                     WHERE entity_kind = ?1 AND entity_id = ?2 AND variant = ?3
                       AND area_id = ?4 AND active = 1"
                ))?;
                stmt.query_map(
                    rusqlite::params![
                        entity.kind_str(),
                        entity.raw_id(),
                        variant.as_str(),
                        area_id.raw()
                    ],
                    read_override_raw,
                )?
                .collect::<Result<Vec<_>, _>>()?
            }
            Scope::Global => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {OVERRIDE_COLS} FROM overrides
                     WHERE entity_kind = ?1 AND entity_id = ?2 AND variant = ?3
                       AND area_id IS NULL AND active = 1"
                ))?;
                stmt.query_map(
                    rusqlite::params![entity.kind_str(), entity.raw_id(), variant.as_str()],
                    read_override_raw,
                )?
                .collect::<Result<Vec<_>, _>>()?
            }
        };
        raws.into_iter().map(override_from_raw).collect()
    }

    fn override_history(
        &self,
        entity: EntityRef,
        variant: Variant,
    ) -> Result<Vec<OverrideRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OVERRIDE_COLS} FROM overrides
             WHERE entity_kind = ?1 AND entity_id = ?2 AND variant = ?3
             ORDER BY id DESC"
        ))?;
        let raws: Vec<RawOverride> = stmt
            .query_map(
                rusqlite::params![entity.kind_str(), entity.raw_id(), variant.as_str()],
                read_override_raw,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(override_from_raw).collect()
    }

    fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRow>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, code, gst_rate, active FROM products WHERE id = ?1")?;
        let mut rows = stmt.query_map(rusqlite::params![product_id.raw()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
            ))
        })?;
        match rows.next() {
            Some(raw) => {
                let (id, name, code, gst_rate, active) = raw?;
                Ok(Some(ProductRow {
                    id: ProductId::new(id),
                    name,
                    code,
                    gst_rate: parse_decimal(&gst_rate, "gst_rate")?,
                    active,
                }))
            }
            None => Ok(None),
        }
    }

    fn insert_area(
        &mut self,
        name: &str,
        level: AreaLevel,
        parent_id: Option<AreaId>,
    ) -> Result<AreaId, StorageError> {
        let now = now_stamp();
        self.conn.execute(
            "INSERT INTO areas (name, level, parent_id, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)",
            rusqlite::params![name, level.as_str(), parent_id.map(|p| p.raw()), now],
        )?;
        Ok(AreaId::new(self.conn.last_insert_rowid()))
    }

    fn set_area_active(&mut self, area_id: AreaId, active: bool) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE areas SET active = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![active, now_stamp(), area_id.raw()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("area {area_id}")));
        }
        Ok(())
    }

    fn insert_product(
        &mut self,
        name: &str,
        code: &str,
        gst_rate: Decimal,
    ) -> Result<ProductId, StorageError> {
        let now = now_stamp();
        self.conn.execute(
            "INSERT INTO products (name, code, gst_rate, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)",
            rusqlite::params![name, code, gst_rate.to_string(), now],
        )?;
        Ok(ProductId::new(self.conn.last_insert_rowid()))
    }

    fn put_override(
        &mut self,
        entity: EntityRef,
        scope: Scope,
        payload: &OverridePayload,
    ) -> Result<OverrideId, StorageError> {
        let variant = payload.variant();
        let payload_json = payload.to_json()?;
        let now = now_stamp();

        let tx = self.conn.transaction()?;
        deactivate_in_tx(&tx, entity, variant, scope, &now)?;
        let result = tx.execute(
            "INSERT INTO overrides
                 (entity_kind, entity_id, variant, area_id, payload, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
            rusqlite::params![
                entity.kind_str(),
                entity.raw_id(),
                variant.as_str(),
                scope.area_id().map(|a| a.raw()),
                payload_json,
                now,
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StorageError::ConstraintViolation(format!(
                    "active override already exists for {entity} {variant} at {scope}"
                )));
            }
            Err(e) => return Err(StorageError::Sqlite(e)),
        }
        let id = OverrideId::new(tx.last_insert_rowid());
        tx.commit()?;

        debug!(%entity, %variant, %scope, override_id = %id, "override replaced");
        Ok(id)
    }

    fn deactivate_override(
        &mut self,
        entity: EntityRef,
        variant: Variant,
        scope: Scope,
    ) -> Result<bool, StorageError> {
        let now = now_stamp();
        let tx = self.conn.transaction()?;
        let changed = deactivate_in_tx(&tx, entity, variant, scope, &now)?;
        tx.commit()?;
        Ok(changed > 0)
    }

    fn insert_order(&mut self, order: &OrderRow) -> Result<(), StorageError> {
        let now = now_stamp();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO orders
                 (id, area_id, base_amount, discount_amount, net_amount,
                  igst_amount, cgst_amount, sgst_amount, total_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                order.id.to_string(),
                order.area_id.raw(),
                order.base_amount.to_string(),
                order.discount_amount.to_string(),
                order.net_amount.to_string(),
                order.igst_amount.to_string(),
                order.cgst_amount.to_string(),
                order.sgst_amount.to_string(),
                order.total_amount.to_string(),
                now,
            ],
        )?;
        for (product_id, quantity) in &order.items {
            tx.execute(
                "INSERT INTO order_items (order_id, product_id, quantity) VALUES (?1, ?2, ?3)",
                rusqlite::params![order.id.to_string(), product_id.raw(), quantity],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn deactivate_in_tx(
    tx: &rusqlite::Transaction,
    entity: EntityRef,
    variant: Variant,
    scope: Scope,
    now: &str,
) -> Result<usize, StorageError> {
    let changed = match scope {
        Scope::Area(area_id) => tx.execute(
            "UPDATE overrides SET active = 0, updated_at = ?1
             WHERE entity_kind = ?2 AND entity_id = ?3 AND variant = ?4
               AND area_id = ?5 AND active = 1",
            rusqlite::params![
                now,
                entity.kind_str(),
                entity.raw_id(),
                variant.as_str(),
                area_id.raw()
            ],
        )?,
        Scope::Global => tx.execute(
            "UPDATE overrides SET active = 0, updated_at = ?1
             WHERE entity_kind = ?2 AND entity_id = ?3 AND variant = ?4
               AND area_id IS NULL AND active = 1",
            rusqlite::params![now, entity.kind_str(), entity.raw_id(), variant.as_str()],
        )?,
    };
    Ok(changed)
}
