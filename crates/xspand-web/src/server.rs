//! Web服务器

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use xspand_admin::ServiceMetrics;
use xspand_workflow::WorkflowEngine;

use crate::handlers::{diseases, health, metrics, patients, users, xrays};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub metrics: ServiceMetrics,
}

impl AppState {
    pub fn new(engine: Arc<WorkflowEngine>, metrics: ServiceMetrics) -> Self {
        Self { engine, metrics }
    }
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            app: create_router(state),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start web server: {}", e))?;

        Ok(())
    }
}

/// 完整路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        // API路由
        .nest("/api/v1", api_routes())
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

/// API v1 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        // 医生
        .route("/register/doctor", post(users::register_doctor))
        .route("/update/doctor/:doctor_id", put(users::update_doctor))
        .route("/delete/doctor/:doctor_id", delete(users::delete_doctor))
        .route("/doctors", get(users::list_doctors))
        .route("/doctors/:doctor_id", get(users::get_doctor))
        // 放射科医生
        .route("/register/radiologist", post(users::register_radiologist))
        .route("/update/radiologist/:radiologist_id", put(users::update_radiologist))
        .route("/delete/radiologist/:radiologist_id", delete(users::delete_radiologist))
        .route("/radiologists", get(users::list_radiologists))
        .route("/radiologists/:radiologist_id", get(users::get_radiologist))
        // 疾病
        .route("/diseases", post(diseases::add_disease).get(diseases::list_diseases))
        .route(
            "/diseases/:disease_id",
            get(diseases::get_disease)
                .put(diseases::update_disease)
                .delete(diseases::delete_disease),
        )
        .route("/diseases/counts/all_patients", get(diseases::all_patient_counts))
        .route("/diseases/counts/current_patients", get(diseases::current_patient_counts))
        // 患者
        .route("/patients", get(patients::list_patients))
        .route("/patients/register", post(patients::register_patient))
        .route("/patients/register/complete", post(patients::register_complete_patient))
        .route("/patients/status", get(patients::patients_status))
        .route(
            "/patients/:patient_id",
            get(patients::get_patient)
                .put(patients::update_patient)
                .delete(patients::delete_patient),
        )
        .route("/patients/:patient_id/complete", get(patients::patient_complete_details))
        .route("/patients/:patient_id/scans", get(patients::patient_scans))
        .route("/patients/:patient_id/treatment-status", put(patients::update_treatment_status))
        .route("/patients/:patient_id/treatment/:doctor_id", put(patients::update_treatment))
        .route("/patients/doctor/:doctor_id", get(patients::doctor_patients))
        .route(
            "/patients/doctor/current_patients/:doctor_id",
            get(patients::doctor_current_patients),
        )
        // X 光检查
        .route("/xrays", post(xrays::add_scan).get(xrays::list_scans))
        .route("/xrays/classify", post(xrays::add_scan_classified))
        .route("/xrays/unverified", get(xrays::unverified_scans))
        .route("/xrays/classify/:scan_id", get(xrays::classify_scan))
        .route("/xrays/classify_url", get(xrays::classify_url))
        .route("/xrays/by_patient/:patient_id", get(xrays::scans_by_patient))
        .route("/xrays/delete/:scan_id", delete(xrays::delete_scan))
        .route("/xrays/:scan_id", put(xrays::update_scan))
}

/// 按方法和状态码统计请求
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    state
        .metrics
        .record_http_request(&method, response.status().as_u16());
    response
}
