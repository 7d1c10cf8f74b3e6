//! Per-tenant settings
//!
//! Currently just the playback volume (0-200 percent). Reads are
//! self-initializing: a missing row writes the configured default back,
//! matching how the rest of the module treats the database as the source of
//! truth.

use crate::error::Result;
use cadence_common::TenantId;
use sqlx::{Pool, Sqlite};

/// Get a tenant's volume (percent), initializing `default_volume` when unset.
pub async fn get_volume(db: &Pool<Sqlite>, tenant: TenantId, default_volume: u16) -> Result<u16> {
    let volume: Option<i64> =
        sqlx::query_scalar("SELECT volume FROM guild_settings WHERE tenant_id = ?")
            .bind(tenant.get() as i64)
            .fetch_optional(db)
            .await?;

    match volume {
        Some(v) => Ok(v.clamp(0, 200) as u16),
        None => {
            set_volume(db, tenant, default_volume).await?;
            Ok(default_volume)
        }
    }
}

/// Set a tenant's volume (percent). Callers validate the 0-200 range.
pub async fn set_volume(db: &Pool<Sqlite>, tenant: TenantId, volume: u16) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO guild_settings (tenant_id, volume)
        VALUES (?, ?)
        ON CONFLICT(tenant_id) DO UPDATE SET volume = excluded.volume
        "#,
    )
    .bind(tenant.get() as i64)
    .bind(volume as i64)
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn configured_default_initializes() {
        let db = test_pool().await;
        let tenant = TenantId::new(1);

        let volume = get_volume(&db, tenant, 80).await.unwrap();
        assert_eq!(volume, 80);

        // The default was written back.
        let stored: i64 = sqlx::query_scalar("SELECT volume FROM guild_settings WHERE tenant_id = ?")
            .bind(tenant.get() as i64)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(stored, 80);
    }

    #[tokio::test]
    async fn set_then_get() {
        let db = test_pool().await;
        let tenant = TenantId::new(2);

        set_volume(&db, tenant, 175).await.unwrap();
        assert_eq!(get_volume(&db, tenant, 50).await.unwrap(), 175);

        set_volume(&db, tenant, 0).await.unwrap();
        assert_eq!(get_volume(&db, tenant, 50).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn volumes_are_per_tenant() {
        let db = test_pool().await;
        set_volume(&db, TenantId::new(1), 30).await.unwrap();
        set_volume(&db, TenantId::new(2), 90).await.unwrap();

        assert_eq!(get_volume(&db, TenantId::new(1), 50).await.unwrap(), 30);
        assert_eq!(get_volume(&db, TenantId::new(2), 50).await.unwrap(), 90);
    }
}
