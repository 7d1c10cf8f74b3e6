//! Queue snapshot persistence
//!
//! Write-through storage for per-tenant queues. Every queue mutation persists
//! its snapshot before the mutation is reported as committed, so a crash
//! loses at most the in-flight mutation. An empty queue deletes the row to
//! keep the table clean.

use crate::error::Result;
use cadence_common::{StoredItem, TenantId};
use sqlx::{Pool, Sqlite};

/// Persist a tenant's queue snapshot. Empty queues delete the row.
pub async fn save_queue(db: &Pool<Sqlite>, tenant: TenantId, items: &[StoredItem]) -> Result<()> {
    if items.is_empty() {
        sqlx::query("DELETE FROM queues WHERE tenant_id = ?")
            .bind(tenant.get() as i64)
            .execute(db)
            .await?;
        return Ok(());
    }

    let blob = serde_json::to_string(items)?;
    sqlx::query(
        r#"
        INSERT INTO queues (tenant_id, queue_blob)
        VALUES (?, ?)
        ON CONFLICT(tenant_id) DO UPDATE SET queue_blob = excluded.queue_blob
        "#,
    )
    .bind(tenant.get() as i64)
    .bind(blob)
    .execute(db)
    .await?;

    Ok(())
}

/// Load a tenant's queue snapshot. Missing row means an empty queue.
pub async fn load_queue(db: &Pool<Sqlite>, tenant: TenantId) -> Result<Vec<StoredItem>> {
    let blob: Option<String> = sqlx::query_scalar("SELECT queue_blob FROM queues WHERE tenant_id = ?")
        .bind(tenant.get() as i64)
        .fetch_optional(db)
        .await?;

    match blob {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

/// Load every persisted queue, for startup session preloading.
pub async fn load_all(db: &Pool<Sqlite>) -> Result<Vec<(TenantId, Vec<StoredItem>)>> {
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT tenant_id, queue_blob FROM queues")
        .fetch_all(db)
        .await?;

    let mut queues = Vec::with_capacity(rows.len());
    for (tenant_id, json) in rows {
        let items: Vec<StoredItem> = serde_json::from_str(&json)?;
        queues.push((TenantId::new(tenant_id as u64), items));
    }
    Ok(queues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use cadence_common::PrincipalId;

    fn item(n: u64) -> StoredItem {
        StoredItem {
            stable_id: Some(format!("https://example.com/watch?v={n}")),
            title: format!("Track {n}"),
            thumbnail: None,
            duration: Some(180 + n),
            uploader: Some("Uploader".into()),
            requester_id: PrincipalId::new(n),
        }
    }

    #[tokio::test]
    async fn roundtrip_preserves_items() {
        let db = test_pool().await;
        let tenant = TenantId::new(1);
        let items: Vec<StoredItem> = (1..=5).map(item).collect();

        save_queue(&db, tenant, &items).await.unwrap();
        let loaded = load_queue(&db, tenant).await.unwrap();
        assert_eq!(loaded, items);
    }

    #[tokio::test]
    async fn missing_tenant_loads_empty() {
        let db = test_pool().await;
        let loaded = load_queue(&db, TenantId::new(404)).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn empty_save_deletes_row() {
        let db = test_pool().await;
        let tenant = TenantId::new(2);

        save_queue(&db, tenant, &[item(1)]).await.unwrap();
        save_queue(&db, tenant, &[]).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queues WHERE tenant_id = ?")
            .bind(tenant.get() as i64)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let db = test_pool().await;
        let tenant = TenantId::new(3);

        save_queue(&db, tenant, &[item(1), item(2)]).await.unwrap();
        save_queue(&db, tenant, &[item(3)]).await.unwrap();

        let loaded = load_queue(&db, tenant).await.unwrap();
        assert_eq!(loaded, vec![item(3)]);
    }

    #[tokio::test]
    async fn load_all_returns_every_tenant() {
        let db = test_pool().await;
        save_queue(&db, TenantId::new(1), &[item(1)]).await.unwrap();
        save_queue(&db, TenantId::new(2), &[item(2), item(3)])
            .await
            .unwrap();

        let mut all = load_all(&db).await.unwrap();
        all.sort_by_key(|(tenant, _)| *tenant);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].1.len(), 1);
        assert_eq!(all[1].1.len(), 2);
    }
}
