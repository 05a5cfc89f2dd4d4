use actix_web::{HttpResponse, Responder, delete, get, patch, post, put, web};
use serde::Deserialize;

use crate::app::services::{
    RecordCommandHandler, RecordQueryHandler, ServiceError, SqliteRecordService,
};
use crate::domain::models::{EnergyRecordPatch, NewEnergyRecord};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct ApiState {
    pub records: SqliteRecordService,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(list_records_endpoint)
        .service(create_record_endpoint)
        .service(get_record_endpoint)
        .service(replace_record_endpoint)
        .service(patch_record_endpoint)
        .service(delete_record_endpoint);
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/api/v1/enphase")]
async fn list_records_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let page = query.page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match state.records.list_records(page, limit) {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(error) => service_error_response(error),
    }
}

#[post("/api/v1/enphase")]
async fn create_record_endpoint(
    state: web::Data<ApiState>,
    payload: web::Json<NewEnergyRecord>,
) -> impl Responder {
    match state.records.create_record(&payload) {
        Ok(record) => {
            tracing::info!(id = record.id, system_id = record.system_id, "record created");
            HttpResponse::Created().json(record)
        }
        Err(error) => service_error_response(error),
    }
}

#[get("/api/v1/enphase/{id}")]
async fn get_record_endpoint(state: web::Data<ApiState>, id: web::Path<i64>) -> impl Responder {
    match state.records.get_record(*id) {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(error) => service_error_response(error),
    }
}

#[put("/api/v1/enphase/{id}")]
async fn replace_record_endpoint(
    state: web::Data<ApiState>,
    id: web::Path<i64>,
    payload: web::Json<NewEnergyRecord>,
) -> impl Responder {
    match state.records.replace_record(*id, &payload) {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(error) => service_error_response(error),
    }
}

#[patch("/api/v1/enphase/{id}")]
async fn patch_record_endpoint(
    state: web::Data<ApiState>,
    id: web::Path<i64>,
    payload: web::Json<EnergyRecordPatch>,
) -> impl Responder {
    match state.records.patch_record(*id, &payload) {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(error) => service_error_response(error),
    }
}

#[delete("/api/v1/enphase/{id}")]
async fn delete_record_endpoint(state: web::Data<ApiState>, id: web::Path<i64>) -> impl Responder {
    let id = id.into_inner();
    match state.records.delete_record(id) {
        Ok(()) => {
            tracing::info!(id, "record deleted");
            HttpResponse::Ok().json(serde_json::json!({
                "detail": format!("enphase with id {id} deleted successfully")
            }))
        }
        Err(error) => service_error_response(error),
    }
}

fn service_error_response(error: ServiceError) -> HttpResponse {
    match &error {
        ServiceError::NotFound { .. } => HttpResponse::NotFound().json(serde_json::json!({
            "detail": error.to_string()
        })),
        ServiceError::Conflict { .. } => HttpResponse::Conflict().json(serde_json::json!({
            "detail": error.to_string()
        })),
        ServiceError::DbLockPoisoned | ServiceError::Database(_) => {
            tracing::error!(error = %error, "record operation failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "detail": format!("internal server error: {error}")
            }))
        }
    }
}
