//! `/users/*` route registration.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use utilisync_core::{DomainResult, RequestContext, TokenVerifier};
use utilisync_server::{
    empty_decoder, encode_error_html, endpoint, json_decoder, LoggingMiddleware,
    MetricsMiddleware, RouteHandler, RouteOptions, Server,
};

use super::pages::RESET_FAILED_PAGE;
use super::service::UserService;

/// Path of the reset link target, relative to the API prefix.
pub const RESET_PASSWORD_PATH: &str = "/users/resetpassword";

fn json_route<Req, Res, F, Fut>(
    service: &Arc<UserService>,
    verifier: &Arc<dyn TokenVerifier>,
    options: RouteOptions,
    decode_message: &str,
    call: F,
) -> RouteHandler<Req, Res>
where
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
    F: Fn(Arc<UserService>, RequestContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DomainResult<Res>> + Send + 'static,
{
    let service = Arc::clone(service);
    RouteHandler::builder(
        json_decoder::<Req>(decode_message),
        endpoint(move |ctx: RequestContext, req: Req| call(Arc::clone(&service), ctx, req)),
    )
    .options(options)
    .verifier(Arc::clone(verifier))
    .middleware(LoggingMiddleware)
    .middleware(MetricsMiddleware)
    .build()
}

/// Mounts the user routes on `server`.
pub fn register_user_routes(
    server: &mut Server,
    service: Arc<UserService>,
    verifier: Arc<dyn TokenVerifier>,
) {
    server.handle(
        "/users/create",
        json_route(
            &service,
            &verifier,
            RouteOptions::anonymous(),
            "invalid create user request",
            |svc, ctx, req| async move { svc.create_new_user(&ctx, req).await },
        ),
    );

    server.handle(
        "/users/get",
        json_route(
            &service,
            &verifier,
            RouteOptions::authenticated(),
            "invalid get user request",
            |svc, ctx, req| async move { svc.get(&ctx, req).await },
        ),
    );

    server.handle(
        "/users/login",
        json_route(
            &service,
            &verifier,
            RouteOptions::anonymous(),
            "invalid login request",
            |svc, ctx, req| async move { svc.login(&ctx, req).await },
        ),
    );

    server.handle(
        "/users/put",
        json_route(
            &service,
            &verifier,
            RouteOptions::authenticated(),
            "invalid put user request",
            |svc, ctx, req| async move { svc.put(&ctx, req).await },
        ),
    );

    server.handle(
        "/users/requestpasswordreset",
        json_route(
            &service,
            &verifier,
            RouteOptions::anonymous(),
            "invalid password reset request",
            |svc, ctx, req| async move { svc.request_password_reset(&ctx, req).await },
        ),
    );

    let svc = Arc::clone(&service);
    server.handle(
        RESET_PASSWORD_PATH,
        RouteHandler::html_builder(
            empty_decoder::<()>(),
            endpoint(move |ctx: RequestContext, (): ()| {
                let svc = Arc::clone(&svc);
                async move { svc.reset_password(&ctx).await }
            }),
        )
        .options(RouteOptions::confirmed())
        .verifier(Arc::clone(&verifier))
        .error_encoder(|ctx, _data, err| encode_error_html(ctx, RESET_FAILED_PAGE, err))
        .middleware(LoggingMiddleware)
        .middleware(MetricsMiddleware)
        .build(),
    );

    server.handle(
        "/users/listusers",
        json_route(
            &service,
            &verifier,
            RouteOptions::authenticated(),
            "invalid list users request",
            |svc, ctx, req| async move { svc.list_users(&ctx, req).await },
        ),
    );
}
