use self::Arg::{Field, Literal};

/// Identity of one fixed tool mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    VerifyList,
    DeploymentList,
    DeploymentShow,
    DeploymentShowCustom,
    DeploymentUse,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One slot of the argument template that follows the tool name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Literal(&'static str),
    Field(&'static str),
}

/// How the captured stdout is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// stdout bytes are the body.
    Raw,
    /// stdout wrapped as `{"out": "..."}`.
    JsonOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDefinition {
    pub id: RouteId,
    pub path: &'static str,
    pub methods: &'static [Method],
    /// Checked in order; may name fields the template never reads.
    pub required: &'static [&'static str],
    pub template: &'static [Arg],
    pub response: ResponseShape,
}

static ROUTES: [RouteDefinition; 6] = [
    RouteDefinition {
        id: RouteId::VerifyList,
        path: "/list",
        methods: &[Method::Get],
        required: &[],
        template: &[Literal("verify"), Literal("list")],
        response: ResponseShape::JsonOut,
    },
    RouteDefinition {
        id: RouteId::DeploymentList,
        path: "/dlist",
        methods: &[Method::Get],
        required: &[],
        template: &[Literal("deployment"), Literal("list")],
        response: ResponseShape::Raw,
    },
    RouteDefinition {
        id: RouteId::DeploymentShow,
        path: "/dshow",
        methods: &[Method::Get],
        required: &[],
        template: &[Literal("deployment"), Literal("show")],
        response: ResponseShape::Raw,
    },
    RouteDefinition {
        id: RouteId::DeploymentShowCustom,
        path: "/deploymentshow",
        methods: &[Method::Get, Method::Post],
        required: &["name", "action", "cloud"],
        template: &[Field("name"), Field("action"), Field("cloud")],
        response: ResponseShape::Raw,
    },
    RouteDefinition {
        id: RouteId::DeploymentUse,
        path: "/deploymentuse",
        methods: &[Method::Post],
        // username is validated but the tool never sees it
        required: &["cloud_name", "username"],
        template: &[Literal("deployment"), Literal("use"), Field("cloud_name")],
        response: ResponseShape::Raw,
    },
    RouteDefinition {
        id: RouteId::Generic,
        path: "/generic",
        methods: &[Method::Post],
        required: &["action1", "action2", "cloud_name"],
        template: &[Field("action1"), Field("action2"), Field("cloud_name")],
        response: ResponseShape::Raw,
    },
];

/// The read-only route table handed to the HTTP router at startup.
pub struct Registry;

impl Registry {
    pub fn routes() -> &'static [RouteDefinition] {
        &ROUTES
    }

    pub fn get(id: RouteId) -> &'static RouteDefinition {
        ROUTES
            .iter()
            .find(|route| route.id == id)
            .unwrap_or_else(|| unreachable!("every RouteId has a table entry"))
    }
}
