use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::OnceCell;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::model::leave_type::LeaveType;

/// Leave types are read on every leave write but change rarely.
static LEAVE_TYPE_CACHE: OnceCell<Cache<u64, LeaveType>> = OnceCell::new();

const DEFAULT_TTL_SECS: u64 = 3600;

fn cache() -> &'static Cache<u64, LeaveType> {
    LEAVE_TYPE_CACHE.get_or_init(|| build(DEFAULT_TTL_SECS))
}

fn build(ttl_secs: u64) -> Cache<u64, LeaveType> {
    Cache::builder()
        .max_capacity(1_000)
        .time_to_live(Duration::from_secs(ttl_secs))
        .build()
}

/// Sets the TTL; only effective before the first lookup.
pub fn init(ttl_secs: u64) {
    let _ = LEAVE_TYPE_CACHE.set(build(ttl_secs));
}

/// Cached lookup falling back to the database.
pub async fn get(pool: &MySqlPool, id: u64) -> Result<Option<LeaveType>, sqlx::Error> {
    if let Some(hit) = cache().get(&id).await {
        return Ok(Some(hit));
    }

    let row = sqlx::query_as::<_, LeaveType>(
        r#"
        SELECT id, name, code, default_quota, requires_balance, allow_half_day
        FROM leave_types
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    if let Some(leave_type) = &row {
        cache().insert(id, leave_type.clone()).await;
    }
    Ok(row)
}

pub async fn put(leave_type: LeaveType) {
    cache().insert(leave_type.id, leave_type).await;
}

/// Load every leave type into the cache (batched)
pub async fn warmup_leave_type_cache(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, LeaveType>(
        "SELECT id, name, code, default_quota, requires_balance, allow_half_day FROM leave_types",
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(row?);
        total += 1;

        if batch.len() >= batch_size {
            insert_batch(std::mem::take(&mut batch)).await;
        }
    }

    if !batch.is_empty() {
        insert_batch(batch).await;
    }

    log::info!("Leave type cache warmup complete: {} types", total);
    Ok(())
}

async fn insert_batch(types: Vec<LeaveType>) {
    let futures: Vec<_> = types
        .into_iter()
        .map(|t| cache().insert(t.id, t))
        .collect();

    futures::future::join_all(futures).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn put_then_cached_lookup_skips_the_database() {
        let pool = MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        put(LeaveType {
            id: 9_001,
            name: "Annual Leave".into(),
            code: "AL".into(),
            default_quota: 12.0,
            requires_balance: true,
            allow_half_day: true,
        })
        .await;

        let hit = get(&pool, 9_001).await.unwrap().unwrap();
        assert_eq!(hit.code, "AL");
        assert_eq!(hit.default_quota, 12.0);
    }
}
