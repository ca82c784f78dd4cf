//! Liveness probe with a DB ping.

use axum::{Extension, Json};
use sqlx::PgPool;

pub async fn health(Extension(pool): Extension<PgPool>) -> Json<serde_json::Value> {
    let db_ok = sqlx::query("SELECT 1").execute(&pool).await.is_ok();
    Json(serde_json::json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": db_ok,
    }))
}
