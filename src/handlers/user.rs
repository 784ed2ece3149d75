use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::{
    db::Store,
    errors::AppError,
    service::{
        self,
        auth::{auth_data, AuthMiddleware},
    },
};

pub async fn get_enrollments<S: Store>(
    id: web::Path<i64>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let courses = service::user::enrolled_courses(id.into_inner(), store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(courses))
}

pub async fn delete<S: Store>(
    req: HttpRequest,
    id: web::Path<i64>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let identity = auth_data(&req)?;
    service::user::delete(&identity, id.into_inner(), store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "User deleted" })))
}

pub fn init_routes<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/{id}/enrollments").route(web::get().to(get_enrollments::<S>)))
        .service(web::resource("/{id}").route(web::delete().to(delete::<S>).wrap(AuthMiddleware)));
}
