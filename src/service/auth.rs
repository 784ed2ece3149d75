use std::future::{ready, Ready};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use log::{debug, error, warn};

use crate::{
    errors::{AppError, AuthFailure, ForbiddenKind},
    models::Permissions,
};

use self::jwt::TokenService;

/// Identity resolved from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthData {
    pub user_id: i64,
    pub email: String,
    pub role_id: i64,
}

impl UserAuthData {
    pub fn permissions(&self) -> Permissions {
        Permissions::for_role(self.role_id)
    }

    pub fn require(&self, needed: Permissions) -> Result<(), AppError> {
        if self.permissions().contains(needed) {
            Ok(())
        } else {
            warn!(
                "user {} (role {}) lacks permissions {:?}",
                self.user_id, self.role_id, needed
            );
            Err(AppError::Forbidden(ForbiddenKind::InsufficientRole))
        }
    }
}

/// Fetches the identity `AuthMiddleware` attached to the request.
pub fn auth_data(req: &HttpRequest) -> Result<UserAuthData, AppError> {
    req.extensions()
        .get::<UserAuthData>()
        .cloned()
        .ok_or(AppError::Unauthorized(AuthFailure::MissingHeader))
}

/// Rejects the request unless it carries a valid bearer token. On success the
/// resolved `UserAuthData` is stored in the request extensions.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let verdict = match req.app_data::<web::Data<TokenService>>() {
            Some(tokens) => jwt::parse_request(&req, "Bearer")
                .and_then(|token| tokens.verify(&token).map_err(AuthFailure::from))
                .map_err(AppError::Unauthorized),
            None => {
                error!("TokenService is not registered as app data");
                Err(AppError::InternalError)
            }
        };
        match verdict {
            Ok(identity) => {
                debug!("authenticated user {} for {}", identity.user_id, req.path());
                req.extensions_mut().insert(identity);
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res)
                })
            }
            Err(err) => {
                warn!("rejected {} {}: {}", req.method(), req.path(), err);
                Box::pin(async move { Err::<ServiceResponse<B>, _>(err.into()) })
            }
        }
    }
}

pub mod jwt {
    use std::sync::Arc;

    use actix_web::dev::ServiceRequest;
    use chrono::Duration;
    use derive_more::{Display, Error};
    use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
    use log::{error, info, warn};
    use mockable::Clock;

    use super::UserAuthData;
    use crate::{
        config::JwtSecret,
        db::Store,
        dto::{normalize_email, Claims, LoginResponse, LoginUserRequest},
        errors::{AppError, AuthFailure},
        service::crypto,
    };

    #[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
    pub enum TokenError {
        #[display(fmt = "token expired")]
        Expired,
        #[display(fmt = "token invalid")]
        Invalid,
    }

    impl From<TokenError> for AuthFailure {
        fn from(err: TokenError) -> Self {
            match err {
                TokenError::Expired => AuthFailure::Expired,
                TokenError::Invalid => AuthFailure::InvalidToken,
            }
        }
    }

    /// Issues and verifies HS256 bearer tokens. Holds no per-session state:
    /// a token stays valid until its `exp` no matter what happens to the
    /// account afterwards.
    #[derive(Clone)]
    pub struct TokenService {
        secret: JwtSecret,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    }

    impl TokenService {
        pub fn new(secret: JwtSecret, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
            Self { secret, ttl, clock }
        }

        pub fn issue(&self, user_id: i64, email: &str, role_id: i64) -> Result<String, AppError> {
            self.issue_with_ttl(user_id, email, role_id, self.ttl)
        }

        pub fn issue_with_ttl(
            &self,
            user_id: i64,
            email: &str,
            role_id: i64,
            ttl: Duration,
        ) -> Result<String, AppError> {
            let exp = self.clock.utc().checked_add_signed(ttl).ok_or_else(|| {
                error!("token lifetime {} is out of range", ttl);
                AppError::InternalError
            })?;
            let claims = Claims {
                id: user_id,
                email: email.to_string(),
                role_id,
                exp: exp.timestamp(),
            };
            encode(
                &Header::new(Algorithm::HS256),
                &claims,
                &EncodingKey::from_secret(self.secret.as_bytes()),
            )
            .map_err(|err| {
                error!("failed to sign token for user {}: {}", user_id, err);
                AppError::InternalError
            })
        }

        /// Signature, payload shape and required claims are checked first; a
        /// token failing any of those is `Invalid` even if it is also stale.
        pub fn verify(&self, token: &str) -> Result<UserAuthData, TokenError> {
            let mut validation = Validation::new(Algorithm::HS256);
            // expiry is judged against the injected clock below
            validation.validate_exp = false;
            validation.set_required_spec_claims(&["exp"]);
            let data = decode::<Claims>(
                token,
                &DecodingKey::from_secret(self.secret.as_bytes()),
                &validation,
            )
            .map_err(|_| TokenError::Invalid)?;
            if data.claims.exp <= self.clock.utc().timestamp() {
                return Err(TokenError::Expired);
            }
            Ok(UserAuthData {
                user_id: data.claims.id,
                email: data.claims.email,
                role_id: data.claims.role_id,
            })
        }
    }

    /// Unknown email and wrong password are reported identically.
    pub async fn login<S: Store>(
        tokens: &TokenService,
        req: LoginUserRequest,
        store: &S,
    ) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&req.email);
        let user = match store.find_user_by_email(&email).await? {
            Some(user) if crypto::verify_password(&req.password, &user.password_hash) => user,
            _ => {
                warn!("failed login attempt for {}", email);
                return Err(AppError::Unauthorized(AuthFailure::BadCredentials));
            }
        };
        let token = tokens.issue(user.id, &user.email, user.role_id)?;
        info!("user {} logged in", user.id);
        Ok(LoginResponse {
            message: "Login successful",
            token,
            role_id: user.role_id,
        })
    }

    pub fn parse_request(req: &ServiceRequest, prefix: &str) -> Result<String, AuthFailure> {
        parse_header(
            req.headers()
                .get(actix_web::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            prefix,
        )
    }

    /// Splits `"<prefix> <token>"`.
    pub fn parse_header(header: Option<&str>, prefix: &str) -> Result<String, AuthFailure> {
        let auth_value = match header.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => return Err(AuthFailure::MissingHeader),
        };
        match auth_value.strip_prefix(prefix) {
            Some(rest) if rest.starts_with(' ') && !rest.trim().is_empty() => {
                Ok(rest.trim().to_string())
            }
            _ => Err(AuthFailure::MalformedHeader),
        }
    }
}
