use actix_web::{web, HttpRequest, HttpResponse};
use mockable::Clock;
use serde_json::json;

use crate::{
    db::Store,
    dto::{CourseUpsertDto, EnrollmentRequest, PageQuery},
    errors::AppError,
    models::Permissions,
    service::{
        self,
        auth::{auth_data, AuthMiddleware},
    },
};

pub async fn get_all<S: Store>(
    query: web::Query<PageQuery>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let page = service::course::list_page(query.page(), store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_by_id<S: Store>(id: web::Path<i64>, store: web::Data<S>) -> Result<HttpResponse, AppError> {
    let course = service::course::get(id.into_inner(), store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(course))
}

pub async fn get_registrations<S: Store>(
    id: web::Path<i64>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let rows = service::enrollment::list_registrations(id.into_inner(), store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(rows))
}

pub async fn register<S: Store>(
    req: HttpRequest,
    body: web::Json<EnrollmentRequest>,
    store: web::Data<S>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, AppError> {
    let identity = auth_data(&req)?;
    identity.require(Permissions::ENROLL)?;
    let enrollment =
        service::enrollment::register(identity.user_id, body.course_id, store.get_ref(), clock.get_ref()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Registered successfully",
        "enrollment": enrollment,
    })))
}

pub async fn drop<S: Store>(
    req: HttpRequest,
    body: web::Json<EnrollmentRequest>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let identity = auth_data(&req)?;
    identity.require(Permissions::ENROLL)?;
    service::enrollment::drop(identity.user_id, body.course_id, store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Dropped successfully" })))
}

pub async fn create<S: Store>(
    req: HttpRequest,
    body: web::Json<CourseUpsertDto>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    auth_data(&req)?.require(Permissions::MANAGE_COURSES)?;
    let course = service::course::create(body.into_inner().into_new_course()?, store.get_ref()).await?;
    Ok(HttpResponse::Created().json(course))
}

pub async fn update<S: Store>(
    req: HttpRequest,
    id: web::Path<i64>,
    body: web::Json<CourseUpsertDto>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    auth_data(&req)?.require(Permissions::MANAGE_COURSES)?;
    let course =
        service::course::update(id.into_inner(), body.into_inner().into_new_course()?, store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(course))
}

pub async fn delete<S: Store>(
    req: HttpRequest,
    id: web::Path<i64>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    auth_data(&req)?.require(Permissions::MANAGE_COURSES)?;
    service::course::delete(id.into_inner(), store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Class deleted" })))
}

/// Literal segments go first so `/register` is never parsed as an id.
pub fn init_routes<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::get().to(get_all::<S>))
            .route(web::post().to(create::<S>).wrap(AuthMiddleware)),
    )
    .service(web::resource("/register").route(web::post().to(register::<S>).wrap(AuthMiddleware)))
    .service(web::resource("/drop").route(web::post().to(drop::<S>).wrap(AuthMiddleware)))
    .service(web::resource("/{id}/registrations").route(web::get().to(get_registrations::<S>)))
    .service(
        web::resource("/{id}")
            .route(web::get().to(get_by_id::<S>))
            .route(web::put().to(update::<S>).wrap(AuthMiddleware))
            .route(web::delete().to(delete::<S>).wrap(AuthMiddleware)),
    );
}
