use std::collections::HashMap;
use std::fmt;

use crate::error::FieldError;
use crate::registry::{Arg, RouteDefinition};

/// Decoded request body: field name to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(HashMap<String, String>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object whose values are all strings. An empty (or
    /// whitespace-only) body is an empty payload.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        serde_json::from_slice(body).map(Self)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The literal command line of one child process. The first element is the
/// program, the rest are positional arguments passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentVector(Vec<String>);

impl ArgumentVector {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![program.into()];
        argv.extend(args.into_iter().map(Into::into));
        Self(argv)
    }

    pub fn program(&self) -> &str {
        &self.0[0]
    }

    pub fn args(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ArgumentVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Builds the argv for `route`, checking every required field first.
///
/// Values are copied verbatim into single argv slots; nothing here quotes,
/// escapes or joins them, and the result is never handed to a shell.
pub fn build(
    route: &RouteDefinition,
    tool: &str,
    payload: &Payload,
) -> Result<ArgumentVector, FieldError> {
    if let Some(field) = route
        .required
        .iter()
        .find(|field| payload.get(field).is_none())
    {
        return Err(FieldError::Missing { field: *field });
    }

    let args = route.template.iter().map(|arg| match arg {
        Arg::Literal(text) => *text,
        // presence checked above
        Arg::Field(name) => payload.get(name).unwrap_or_default(),
    });

    Ok(ArgumentVector::new(tool, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, RouteId};

    fn argv(route: RouteId, payload: &Payload) -> Result<Vec<String>, FieldError> {
        build(Registry::get(route), "rally", payload).map(ArgumentVector::into_vec)
    }

    #[test]
    fn fixed_routes_ignore_payload() {
        let noisy = Payload::new()
            .with("name", "x")
            .with("action1", "task")
            .with("cloud_name", "c");

        for payload in [Payload::new(), noisy] {
            assert_eq!(
                argv(RouteId::VerifyList, &payload).unwrap(),
                ["rally", "verify", "list"]
            );
            assert_eq!(
                argv(RouteId::DeploymentList, &payload).unwrap(),
                ["rally", "deployment", "list"]
            );
            assert_eq!(
                argv(RouteId::DeploymentShow, &payload).unwrap(),
                ["rally", "deployment", "show"]
            );
        }
    }

    #[test]
    fn deploymentshow_uses_fields_positionally() {
        let payload = Payload::new()
            .with("name", "deployment")
            .with("action", "use")
            .with("cloud", "mycloud");
        assert_eq!(
            argv(RouteId::DeploymentShowCustom, &payload).unwrap(),
            ["rally", "deployment", "use", "mycloud"]
        );
    }

    #[test]
    fn deploymentuse_reads_but_drops_username() {
        let payload = Payload::new()
            .with("cloud_name", "prod")
            .with("username", "admin");
        assert_eq!(
            argv(RouteId::DeploymentUse, &payload).unwrap(),
            ["rally", "deployment", "use", "prod"]
        );
    }

    #[test]
    fn generic_maps_actions_then_cloud() {
        let payload = Payload::new()
            .with("action1", "task")
            .with("action2", "start")
            .with("cloud_name", "x");
        assert_eq!(
            argv(RouteId::Generic, &payload).unwrap(),
            ["rally", "task", "start", "x"]
        );
    }

    #[test]
    fn missing_fields_are_named() {
        let cases = [
            (
                RouteId::DeploymentShowCustom,
                Payload::new().with("name", "a").with("cloud", "c"),
                "action",
            ),
            (RouteId::DeploymentShowCustom, Payload::new(), "name"),
            (
                RouteId::DeploymentUse,
                Payload::new().with("cloud_name", "c"),
                "username",
            ),
            (
                RouteId::DeploymentUse,
                Payload::new().with("username", "u"),
                "cloud_name",
            ),
            (
                RouteId::Generic,
                Payload::new().with("action1", "a").with("action2", "b"),
                "cloud_name",
            ),
            (
                RouteId::Generic,
                Payload::new().with("action2", "b").with("cloud_name", "c"),
                "action1",
            ),
        ];

        for (route, payload, field) in cases {
            assert_eq!(
                argv(route, &payload),
                Err(FieldError::Missing { field }),
                "{:?}",
                route
            );
        }
    }

    #[test]
    fn shell_metacharacters_stay_one_argument() {
        let payload = Payload::new()
            .with("action1", "task; rm -rf /")
            .with("action2", "$(whoami)")
            .with("cloud_name", "a b");
        let built = argv(RouteId::Generic, &payload).unwrap();
        assert_eq!(built, ["rally", "task; rm -rf /", "$(whoami)", "a b"]);
    }

    #[test]
    fn empty_values_count_as_present() {
        let payload = Payload::new()
            .with("action1", "")
            .with("action2", "")
            .with("cloud_name", "");
        assert_eq!(
            argv(RouteId::Generic, &payload).unwrap(),
            ["rally", "", "", ""]
        );
    }

    #[test]
    fn payload_from_json() {
        let payload = Payload::from_json_slice(br#"{"name":"a","cloud":"b"}"#).unwrap();
        assert_eq!(payload.get("name"), Some("a"));
        assert_eq!(payload.len(), 2);

        assert!(Payload::from_json_slice(b"").unwrap().is_empty());
        assert!(Payload::from_json_slice(b" \n").unwrap().is_empty());
        assert!(Payload::from_json_slice(b"{not json").is_err());
        assert!(Payload::from_json_slice(br#"{"name": 3}"#).is_err());
        assert!(Payload::from_json_slice(br#"["name"]"#).is_err());
    }

    #[test]
    fn argument_vector_splits_program_and_args() {
        let argv = ArgumentVector::new("rally", ["deployment", "list"]);
        assert_eq!(argv.program(), "rally");
        assert_eq!(argv.args(), ["deployment", "list"]);
        assert_eq!(argv.to_string(), r#"["rally", "deployment", "list"]"#);
    }
}
