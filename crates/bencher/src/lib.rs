#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    table: RouteTable,
    paths: &'static [&'static str],
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, table: RouteTable, paths: &'static [&'static str]) -> Self {
        Self { name, group, table, paths }
    }

    pub fn small(name: &'static str, table: RouteTable, paths: &'static [&'static str]) -> Self {
        Self::new(name, TestGroup::Small, table, paths)
    }

    pub fn normal(name: &'static str, table: RouteTable, paths: &'static [&'static str]) -> Self {
        Self::new(name, TestGroup::Normal, table, paths)
    }

    pub fn large(name: &'static str, table: RouteTable, paths: &'static [&'static str]) -> Self {
        Self::new(name, TestGroup::Large, table, paths)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Request paths looked up on every iteration.
    pub fn paths(&self) -> &'static [&'static str] {
        self.paths
    }
}

/// A set of `GET` route patterns, registered in order.
#[derive(Debug, Copy, Clone)]
pub struct RouteTable {
    name: &'static str,
    patterns: &'static [&'static str],
}

impl RouteTable {
    pub const fn new(name: &'static str, patterns: &'static [&'static str]) -> Self {
        Self { name, patterns }
    }

    pub fn patterns(&self) -> &'static [&'static str] {
        self.patterns
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

pub static STATIC_ROUTES: RouteTable =
    RouteTable::new("static", &["/", "/about", "/contact", "/blog", "/pricing", "/docs", "/login", "/logout"]);

pub static API_ROUTES: RouteTable = RouteTable::new(
    "api",
    &[
        "/api/v1/users",
        "/api/v1/users/:id",
        "/api/v1/users/:id/posts",
        "/api/v1/users/:id/posts/:post",
        "/api/v1/orgs/:org/repos/:repo",
        "/api/v1/orgs/:org/repos/:repo/issues/:number?",
        "/api/v1/search/:kind?",
        "/v1/*brand/shop/*name",
        "/assets/*path",
    ],
);
