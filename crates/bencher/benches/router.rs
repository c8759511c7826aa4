use bencher::{API_ROUTES, RouteTable, STATIC_ROUTES, TestCase};
use bytes::Bytes;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use http::{Method, Request};
use http_body_util::Empty;
use micro_router::router::get;
use micro_router::{Router, Signal, handler_fn};
use std::hint::black_box;

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("static_hit", STATIC_ROUTES, &["/", "/pricing", "/logout"]),
        TestCase::small("static_miss", STATIC_ROUTES, &["/missing", "/about/team"]),
        TestCase::normal("named_params", API_ROUTES, &["/api/v1/users/42", "/api/v1/users/42/posts/7"]),
        TestCase::normal("optional_params", API_ROUTES, &["/api/v1/search", "/api/v1/orgs/acme/repos/web/issues"]),
        TestCase::large("wildcards", API_ROUTES, &["/v1/acme/east/shop/tools/saw", "/assets/css/site/main.css"]),
    ]
}

fn build_router(table: &RouteTable) -> Router {
    table
        .patterns()
        .iter()
        .fold(Router::builder(), |builder, pattern| {
            builder.route(pattern, get(handler_fn(|_ctx, _params| Box::pin(async { Ok::<_, Signal>("ok") }))))
        })
        .build()
        .expect("route table should compile")
}

fn benchmark_route_matching(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("route_matching");

    for case in create_test_cases() {
        let router = build_router(case.table());
        group.throughput(Throughput::Elements(case.paths().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                for path in case.paths() {
                    black_box(router.at(&Method::GET, black_box(path)).map(|matched| matched.params().len()));
                }
            });
        });
    }

    group.finish();
}

fn benchmark_dispatch(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime should start");
    let mut group = criterion.benchmark_group("dispatch");

    for case in create_test_cases() {
        let router = build_router(case.table());
        group.throughput(Throughput::Elements(case.paths().len() as u64));
        group.bench_with_input(BenchmarkId::new(case.table().name(), case.name()), &case, |b, case| {
            b.iter_batched(
                || {
                    case.paths()
                        .iter()
                        .map(|path| Request::get(*path).body(Empty::<Bytes>::new()).expect("request should be valid"))
                        .collect::<Vec<_>>()
                },
                |requests| {
                    runtime.block_on(async {
                        for request in requests {
                            black_box(router.dispatch(request).await);
                        }
                    });
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(router, benchmark_route_matching, benchmark_dispatch);
criterion_main!(router);
