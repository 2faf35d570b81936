//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/api/accounts/*` - 가입, 운영 계정, 삭제
//! - `/api/users/:id/*` - 지갑, 커미션, 작업, StopPoint, 충전/출금
//! - `/api/products/*` - 상품 관리
//! - `/api/recharges/*`, `/api/withdrawals/*` - 관리자 심사
//!
//! 요청 주체는 상위 세션 계층이 설정한 `x-actor-id` 헤더로 전달됨

pub mod accounts;
pub mod catalog;
pub mod health;
pub mod recharge;
pub mod stop_points;
pub mod tasks;
pub mod wallet;
pub mod withdrawal;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, patch, post, put},
    Router,
};

use crate::db::{Account, LedgerStore};
use crate::error::{ApiError, LedgerError};
use crate::AppState;

/// 요청 주체 헤더
pub const ACTOR_HEADER: &str = "x-actor-id";

/// 요청 주체 (활성 계정)
///
/// 헤더가 없거나 계정이 없으면 401
pub struct Actor(pub Account);

#[async_trait]
impl<S: LedgerStore> FromRequestParts<AppState<S>> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let actor_id = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or(ApiError::Unauthorized)?;

        match state.ledger.accounts.active_account(actor_id).await {
            Ok(account) => Ok(Actor(account)),
            Err(LedgerError::NotFound(_)) => Err(ApiError::Unauthorized),
            Err(err) => Err(err.into()),
        }
    }
}

/// API 라우터 (미들웨어 제외)
///
/// # Route Structure
///
/// ```text
/// GET    /health
///
/// POST   /api/accounts/register
/// POST   /api/accounts/staff
/// GET    /api/accounts/:id
/// POST   /api/accounts/:id/anonymize
/// DELETE /api/accounts/:id
///
/// GET    /api/users/:id/wallet
/// POST   /api/users/:id/wallet/credit | debit
/// GET    /api/users/:id/commissions[/total | /summary]
/// GET    /api/users/:id/commission-setting
/// PUT    /api/users/:id/commission-setting
///
/// POST   /api/users/:id/tasks/next
/// POST   /api/users/:id/tasks/:product_id/complete
/// GET    /api/users/:id/tasks/progress
/// GET    /api/users/:id/gate?next=N
///
/// GET    /api/users/:id/stop-points
/// POST   /api/users/:id/stop-points
/// POST   /api/users/:id/stop-points/reset
/// PATCH  /api/users/:id/stop-points/:sp_id
/// POST   /api/users/:id/stop-points/:sp_id/approve | reject
///
/// POST   /api/products
/// GET    /api/products/:id
/// PATCH  /api/products/:id
///
/// POST   /api/users/:id/recharges
/// GET    /api/users/:id/recharges/history
/// PUT    /api/recharges/:id/voucher
/// PATCH  /api/recharges/:id
/// POST   /api/recharges/:id/approve | reject
///
/// PUT    /api/users/:id/payout-address
/// GET    /api/users/:id/payout-address
/// POST   /api/users/:id/withdrawals
/// GET    /api/users/:id/withdrawals
/// POST   /api/withdrawals/:id/approve | reject
/// ```
pub fn api_router<S: LedgerStore>(state: AppState<S>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check::<S>))

        // Accounts
        .route("/api/accounts/register", post(accounts::register::<S>))
        .route("/api/accounts/staff", post(accounts::create_staff::<S>))
        .route(
            "/api/accounts/:id",
            get(accounts::get_account::<S>).delete(accounts::remove_account::<S>),
        )
        .route("/api/accounts/:id/anonymize", post(accounts::anonymize_account::<S>))

        // Wallet & commission
        .route("/api/users/:id/wallet", get(wallet::get_wallet::<S>))
        .route("/api/users/:id/wallet/credit", post(wallet::credit::<S>))
        .route("/api/users/:id/wallet/debit", post(wallet::debit::<S>))
        .route("/api/users/:id/commissions", get(wallet::commissions::<S>))
        .route("/api/users/:id/commissions/total", get(wallet::total_commission::<S>))
        .route("/api/users/:id/commissions/summary", get(wallet::commission_summary::<S>))
        .route(
            "/api/users/:id/commission-setting",
            get(wallet::get_commission_setting::<S>).put(wallet::update_commission_setting::<S>),
        )

        // Tasks
        .route("/api/users/:id/tasks/next", post(tasks::next_task::<S>))
        .route("/api/users/:id/tasks/progress", get(tasks::task_progress::<S>))
        .route(
            "/api/users/:id/tasks/:product_id/complete",
            post(tasks::complete_task::<S>),
        )
        .route("/api/users/:id/gate", get(tasks::gate_check::<S>))

        // Stop points
        .route(
            "/api/users/:id/stop-points",
            get(stop_points::list::<S>).post(stop_points::add::<S>),
        )
        .route("/api/users/:id/stop-points/reset", post(stop_points::reset::<S>))
        .route("/api/users/:id/stop-points/:sp_id", patch(stop_points::update::<S>))
        .route("/api/users/:id/stop-points/:sp_id/approve", post(stop_points::approve::<S>))
        .route("/api/users/:id/stop-points/:sp_id/reject", post(stop_points::reject::<S>))

        // Catalog
        .route("/api/products", post(catalog::add_product::<S>))
        .route(
            "/api/products/:id",
            get(catalog::get_product::<S>).patch(catalog::set_availability::<S>),
        )

        // Recharge
        .route("/api/users/:id/recharges", post(recharge::create::<S>))
        .route("/api/users/:id/recharges/history", get(recharge::history::<S>))
        .route("/api/recharges/:id", patch(recharge::update_amount::<S>))
        .route("/api/recharges/:id/voucher", put(recharge::attach_voucher::<S>))
        .route("/api/recharges/:id/approve", post(recharge::approve::<S>))
        .route("/api/recharges/:id/reject", post(recharge::reject::<S>))

        // Withdrawal
        .route(
            "/api/users/:id/payout-address",
            get(withdrawal::get_address::<S>).put(withdrawal::bind_address::<S>),
        )
        .route(
            "/api/users/:id/withdrawals",
            get(withdrawal::list::<S>).post(withdrawal::request::<S>),
        )
        .route("/api/withdrawals/:id/approve", post(withdrawal::approve::<S>))
        .route("/api/withdrawals/:id/reject", post(withdrawal::reject::<S>))

        // 상태 주입
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::{Config, Environment, LedgerPolicy};
    use crate::db::memory::MemoryStore;

    fn test_config() -> Config {
        Config {
            port: 0,
            database_url: String::new(),
            policy: LedgerPolicy::default(),
            bootstrap_superadmin: None,
            environment: Environment::Development,
        }
    }

    async fn setup() -> (Router, AppState<MemoryStore>, Account) {
        let state = AppState::new(Arc::new(MemoryStore::new()), test_config());
        let root = state
            .ledger
            .accounts
            .bootstrap_superadmin("rootadmin")
            .await
            .unwrap()
            .unwrap();
        (api_router(state.clone()), state, root)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        actor: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = actor {
            builder = builder.header(ACTOR_HEADER, id.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = setup().await;
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"]["connected"], true);
    }

    #[tokio::test]
    async fn test_actor_header_required() {
        let (app, _, root) = setup().await;

        let (status, body) = send(&app, Method::GET, "/api/users/1/wallet", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) = send(&app, Method::GET, "/api/users/1/wallet", Some(9999), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let uri = format!("/api/users/{}/wallet", root.id);
        let (status, _) = send(&app, Method::GET, &uri, Some(root.id), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_task_flow_over_http() {
        let (app, _, root) = setup().await;

        // 운영 계정 + 가입
        let (status, admin) = send(
            &app,
            Method::POST,
            "/api/accounts/staff",
            Some(root.id),
            Some(json!({ "username": "adminone", "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let admin_id = admin["id"].as_i64().unwrap();
        let code = admin["referral_code"].as_str().unwrap().to_string();

        let (status, user) = send(
            &app,
            Method::POST,
            "/api/accounts/register",
            None,
            Some(json!({ "username": "alice01", "phone": "+100200300", "referral_code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let user_id = user["id"].as_i64().unwrap();

        // 상품 + 커미션 설정
        let (status, product) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(admin_id),
            Some(json!({ "name": "Desk Lamp", "price": "10.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let product_id = product["id"].as_i64().unwrap();

        let (status, setting) = send(
            &app,
            Method::PUT,
            &format!("/api/users/{}/commission-setting", user_id),
            Some(admin_id),
            Some(json!({ "product_rate": "10", "daily_task_limit": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(setting["daily_task_limit"], 5);

        // 충전 → 승인
        let (status, recharge) = send(
            &app,
            Method::POST,
            &format!("/api/users/{}/recharges", user_id),
            Some(user_id),
            Some(json!({ "amount": "50" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let approve_uri = format!("/api/recharges/{}/approve", recharge["id"]);

        let (status, _) = send(&app, Method::POST, &approve_uri, Some(user_id), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, Method::POST, &approve_uri, Some(admin_id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, Method::POST, &approve_uri, Some(admin_id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Recharge already processed");

        // 작업 배정 → 완료
        let (status, next) = send(
            &app,
            Method::POST,
            &format!("/api/users/{}/tasks/next", user_id),
            Some(user_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(next["status"], "assigned");
        assert_eq!(next["product"]["id"].as_i64(), Some(product_id));

        let complete_uri = format!("/api/users/{}/tasks/{}/complete", user_id, product_id);
        let (status, outcome) = send(&app, Method::POST, &complete_uri, Some(user_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["status"], "completed");
        assert_eq!(outcome["product_commission"], "1.00");
        // admin 추천인은 추천 커미션 대상 아님
        assert_eq!(outcome["referral_commission"], "0");

        let (status, _) = send(&app, Method::POST, &complete_uri, Some(user_id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // 배정할 상품 없음 → 200 + exhausted
        let (_, next) = send(
            &app,
            Method::POST,
            &format!("/api/users/{}/tasks/next", user_id),
            Some(user_id),
            None,
        )
        .await;
        assert_eq!(next["status"], "unavailable");
        assert_eq!(next["reason"], "exhausted");

        let (status, wallet) = send(
            &app,
            Method::GET,
            &format!("/api/users/{}/wallet", user_id),
            Some(user_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wallet["current_balance"], "40.00");
        assert_eq!(wallet["product_commission"], "1.00");
        assert_eq!(wallet["available_total"], "41.00");
    }

    #[tokio::test]
    async fn test_invalid_setting_update_changes_nothing() {
        let (app, state, root) = setup().await;
        let admin = state
            .ledger
            .accounts
            .create_staff(&root, "adminone", crate::types::Role::Admin)
            .await
            .unwrap();
        let member = state
            .ledger
            .accounts
            .register_user(crate::services::Registration {
                username: "member01".to_string(),
                phone: "+5550001".to_string(),
                referral_code: admin.referral_code.clone().unwrap(),
            })
            .await
            .unwrap();
        let uri = format!("/api/users/{}/commission-setting", member.id);

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(admin.id),
            Some(json!({ "product_rate": "10", "referral_rate": "150" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, setting) = send(&app, Method::GET, &uri, Some(admin.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(setting["product_rate"], "0");
        assert_eq!(setting["referral_rate"], "0");
    }

    #[tokio::test]
    async fn test_stop_point_gate_over_http() {
        let (app, state, root) = setup().await;
        let admin = state
            .ledger
            .accounts
            .create_staff(&root, "adminone", crate::types::Role::Admin)
            .await
            .unwrap();
        let admin_id = admin.id;
        let member = state
            .ledger
            .accounts
            .register_user(crate::services::Registration {
                username: "member01".to_string(),
                phone: "+5550001".to_string(),
                referral_code: admin.referral_code.clone().unwrap(),
            })
            .await
            .unwrap();

        let (status, batch) = send(
            &app,
            Method::POST,
            &format!("/api/users/{}/stop-points", member.id),
            Some(admin_id),
            Some(json!({ "entries": [
                { "point": 1, "required_balance": "30" },
                { "point": 99, "required_balance": "1" }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(batch["added"].as_array().unwrap().len(), 1);
        assert_eq!(batch["skipped"][0]["point"], 99);

        let gate_uri = format!("/api/users/{}/gate?next=1", member.id);
        let (status, gate) = send(&app, Method::GET, &gate_uri, Some(member.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(gate["allowed"], false);
        assert_eq!(gate["message"], "StopPoint at task 1 requires approval or recharge.");

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/users/{}/stop-points/reset", member.id),
            Some(member.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/users/{}/stop-points/reset", member.id),
            Some(admin_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, gate) = send(&app, Method::GET, &gate_uri, Some(member.id), None).await;
        assert_eq!(gate["allowed"], true);
    }
}
