use actix_web::{web, HttpRequest, HttpResponse};
use mockable::Clock;
use serde_json::json;

use crate::{
    db::Store,
    dto::{
        CreateInviteDto, InviteCreatedResponse, LoginUserRequest, ManagerRegisterDto, NewUserDto, UpdateProfileDto,
    },
    errors::AppError,
    models::Permissions,
    service::{
        self,
        auth::{auth_data, jwt::TokenService, AuthMiddleware},
    },
};

pub async fn register<S: Store>(
    dto: web::Json<NewUserDto>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let user = service::user::register_student(dto.into_inner(), store.get_ref()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user": user,
    })))
}

pub async fn login<S: Store>(
    dto: web::Json<LoginUserRequest>,
    tokens: web::Data<TokenService>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let res = service::auth::jwt::login(tokens.get_ref(), dto.into_inner(), store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(res))
}

pub async fn manager_register<S: Store>(
    dto: web::Json<ManagerRegisterDto>,
    store: web::Data<S>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, AppError> {
    let user = service::invite::redeem(dto.into_inner(), store.get_ref(), clock.get_ref()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Manager registered successfully",
        "user": user,
    })))
}

pub async fn create_invite<S: Store>(
    req: HttpRequest,
    dto: web::Json<CreateInviteDto>,
    store: web::Data<S>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, AppError> {
    let identity = auth_data(&req)?;
    identity.require(Permissions::ISSUE_INVITES)?;
    let code = service::invite::issue(identity.user_id, dto.into_inner(), store.get_ref(), clock.get_ref()).await?;
    Ok(HttpResponse::Created().json(InviteCreatedResponse {
        message: "Invite code created",
        code,
    }))
}

pub async fn get_profile<S: Store>(req: HttpRequest, store: web::Data<S>) -> Result<HttpResponse, AppError> {
    let identity = auth_data(&req)?;
    let user = service::user::profile(identity.user_id, store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn update_profile<S: Store>(
    req: HttpRequest,
    dto: web::Json<UpdateProfileDto>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let identity = auth_data(&req)?;
    let user = service::user::update_profile(identity.user_id, dto.into_inner(), store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully",
        "user": user,
    })))
}

pub fn init_routes<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(register::<S>))
        .route("/login", web::post().to(login::<S>))
        .route("/manager/register", web::post().to(manager_register::<S>))
        .route(
            "/manager/invite-codes",
            web::post().to(create_invite::<S>).wrap(AuthMiddleware),
        )
        .service(
            web::resource("/profile")
                .route(web::get().to(get_profile::<S>).wrap(AuthMiddleware))
                .route(web::put().to(update_profile::<S>).wrap(AuthMiddleware)),
        );
}
