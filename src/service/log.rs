use env_logger::Builder;
use log::{Level, info, warn};
use std::io::Write;
use std::future::{ready, Ready};
use std::time::Instant;
use actix_web::{
   dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
   Error,
};
use colored::Colorize;
use futures_util::future::LocalBoxFuture;

pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
   S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
   S::Future: 'static,
   B: 'static,
{
   type Response = ServiceResponse<B>;
   type Error = Error;
   type InitError = ();
   type Transform = LoggerMiddlewareService<S>;
   type Future = Ready<Result<Self::Transform, Self::InitError>>;

   fn new_transform(&self, service: S) -> Self::Future {
      ready(Ok(LoggerMiddlewareService { service }))
   }
}

pub struct LoggerMiddlewareService<S> {
   service: S
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
   type Response = ServiceResponse<B>;
   type Error = Error;
   type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

   forward_ready!(service);

   fn call(&self, req: ServiceRequest) -> Self::Future {
      let started = Instant::now();
      let line = format!("{} {}", req.method(), req.uri());
      info!("server request: {}", line);
      let fut = self.service.call(req);

      Box::pin(async move {
         match fut.await {
            Ok(res) => {
               info!("server response: {} {} in {:?}", line, res.status(), started.elapsed());
               Ok(res)
            }
            Err(err) => {
               // errors raised by inner middleware (auth) never reach a handler
               warn!("server response: {} {} in {:?}", line, err.as_response_error().status_code(), started.elapsed());
               Err(err)
            }
         }
      })
   }
}

pub fn init_logger() {
   Builder::from_default_env()
   .parse_default_env()
   .format(|buf, record| {
      let level = record.level();
      let label = match level {
         Level::Error => level.as_str().red().bold(),
         Level::Warn => level.as_str().yellow().bold(),
         Level::Info => level.as_str().green().bold(),
         Level::Debug => level.as_str().blue().bold(),
         Level::Trace => level.as_str().magenta().bold(),
      };
      writeln!(buf, "{} [{}] - {}", label, record.target(), record.args())
   })
   .init()
}
