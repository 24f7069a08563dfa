use std::future::{ready, Future, Ready};
use std::pin::Pin;

use actix_web::dev::{Service, ServiceRequest, Transform};
use actix_web::error::ErrorUnauthorized;
use actix_web::{Error, HttpMessage};

use crate::context::UserInfo;
use crate::core::tokener::{Claim, Payload, Tokener};
use crate::impls::tokener::jwt::JWT;

pub static JWT_SECRET: &str = "JWT_SECRET";

/// Gate for protected routes: expects `Authorization: Bearer <token>`,
/// verifies the token and stores the subject as `UserInfo`.
pub struct Jwt {
    secret: Vec<u8>,
}

impl Jwt {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl<S> Transform<S, ServiceRequest> for Jwt
where
    S: Service<ServiceRequest> + 'static,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Response = S::Response;
    type Error = Error;
    type Transform = JwtService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtService {
            tokener: JWT::new(self.secret.clone()),
            next_service: service,
        }))
    }
}

pub struct JwtService<S> {
    tokener: JWT,
    next_service: S,
}

impl<S> Service<ServiceRequest> for JwtService<S>
where
    S: Service<ServiceRequest>,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Response = S::Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.next_service.poll_ready(ctx).map_err(|e| e.into())
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header = match req.headers().get("Authorization") {
            None => return Box::pin(async move { Err(ErrorUnauthorized("no token in header")) }),
            Some(h) => h.to_owned(),
        };
        let token = match header.to_str() {
            Err(e) => return Box::pin(async move { Err(ErrorUnauthorized(e)) }),
            Ok(v) => match v.strip_prefix("Bearer ") {
                None => return Box::pin(async move { Err(ErrorUnauthorized("malformed authorization header")) }),
                Some(t) => t.trim().to_owned(),
            },
        };
        match <JWT as Tokener<Claim>>::verify_token(&self.tokener, &token) {
            Err(e) => return Box::pin(async move { Err(ErrorUnauthorized(e)) }),
            Ok(claim) => match claim.user().parse::<i64>() {
                Err(e) => return Box::pin(async move { Err(ErrorUnauthorized(e)) }),
                Ok(id) => {
                    req.extensions_mut().insert(UserInfo { id });
                }
            },
        }

        let res_fut = self.next_service.call(req);
        Box::pin(async move { res_fut.await.map_err(|e| e.into()) })
    }
}
