use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use micro_router::middleware::middleware_fn;
use micro_router::router::{delete, get, post};
use micro_router::{handler_fn, Router, Signal};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Clone, Debug)]
struct User(String);

fn build_router() -> Router {
    // access log for every request, whatever happens to it
    let access_log = middleware_fn(|ctx, next| {
        ctx.after(middleware_fn(|ctx, _next| {
            Box::pin(async move {
                let status = ctx.decided_response().map(|response| response.status().as_u16());
                info!(method = %ctx.method(), path = ctx.path(), ?status, elapsed = ?ctx.elapsed(), "access");
                micro_router::Flow::Continue
            })
        }));
        Box::pin(async move { next.run(ctx).await })
    });

    let authenticate = middleware_fn(|ctx, next| {
        Box::pin(async move {
            let Some(token) = ctx.header(http::header::AUTHORIZATION).map(str::to_owned) else {
                return ctx.halt(StatusCode::UNAUTHORIZED, "missing credentials").into();
            };
            ctx.locals_mut().insert(User(token.trim_start_matches("Bearer ").to_owned()));
            next.run(ctx).await
        })
    });

    let audit = middleware_fn(|ctx, _next| {
        Box::pin(async move {
            let user = ctx.locals().get::<User>().map(|user| user.0.clone());
            info!(?user, path = ctx.path(), "audit");
            micro_router::Flow::Continue
        })
    });

    let result = Router::builder()
        .before(access_log)
        .route("/", get(handler_fn(|_ctx, _params| Box::pin(async { Ok::<_, Signal>("welcome\r\n") }))))
        .group("/api", |api| {
            api.before(authenticate);
            api.after(audit);
            api.group("/v1", |v1| {
                v1.route(
                    "/users/:id",
                    get(handler_fn(|ctx, params| {
                        let body = format!(
                            "user {} requested by {:?}\r\n",
                            params.get("id").unwrap_or_default(),
                            ctx.locals().get::<User>().map(|user| user.0.as_str())
                        );
                        Box::pin(async move { Ok::<_, Signal>(body) })
                    })),
                );
                v1.route(
                    "/users",
                    post(handler_fn(|ctx, _params| {
                        Box::pin(async move {
                            let body = match ctx.take_body() {
                                Some(body) => body.collect().await.map_err(Signal::fault)?,
                                None => Bytes::new(),
                            };
                            ctx.set_status(StatusCode::CREATED);
                            Ok::<_, Signal>(format!("created {}\r\n", String::from_utf8_lossy(&body)))
                        })
                    })),
                );
                v1.route(
                    "/users/:id",
                    delete(handler_fn(|ctx, _params| {
                        Box::pin(async move {
                            ctx.set_status(StatusCode::NO_CONTENT);
                            Ok::<_, Signal>(())
                        })
                    })),
                );
            });
        })
        .route("/static/*path", get(handler_fn(|_ctx, params| {
            let body = format!("serving {}\r\n", params.get("path").unwrap_or_default());
            Box::pin(async move { Ok::<_, Signal>(body) })
        })))
        .default_handler(handler_fn(|_ctx, _params| Box::pin(async { Ok::<_, Signal>("404 not found\r\n") })))
        .build();

    match result {
        Ok(router) => router,
        Err(e) => panic!("invalid route table: {e}"),
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = build_router();
    for route in router.routes() {
        info!(method = %route.method(), pattern = route.pattern().as_str(), "route");
    }

    let requests = vec![
        Request::builder().method(Method::GET).uri("/").body(Full::new(Bytes::new())),
        Request::builder().method(Method::GET).uri("/api/v1/users/42").body(Full::new(Bytes::new())),
        Request::builder()
            .method(Method::GET)
            .uri("/api/v1/users/42/")
            .header(http::header::AUTHORIZATION, "Bearer ada")
            .body(Full::new(Bytes::new())),
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/users")
            .header(http::header::AUTHORIZATION, "Bearer ada")
            .body(Full::new(Bytes::from_static(b"grace"))),
        Request::builder().method(Method::GET).uri("/static/css/site.css").body(Full::new(Bytes::new())),
        Request::builder().method(Method::GET).uri("/nowhere").body(Full::new(Bytes::new())),
    ];

    for request in requests {
        let request = request.expect("request should be valid");
        let line = format!("{} {}", request.method(), request.uri());

        let response = router.dispatch(request).await;
        let status = response.status();
        let body = response.into_body().collect().await.map(|collected| collected.to_bytes()).unwrap_or_default();
        print!("{line} -> {status}: {}", String::from_utf8_lossy(&body));
    }
}
