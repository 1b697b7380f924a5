use polaris_mcp_core::{
    ApiRoot, BodyShape, Method, OperationEntry, OperationTable, OperationTableError,
    RequestDescriptor, ToolArguments, ValidationError,
};
use serde_json::{json, Value};

use super::{finish, name_property, schema, Prepared, ResourceTool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    List,
    Get,
    Create,
    Update,
    Delete,
    RotateCredentials,
    ResetCredentials,
    ListPrincipalRoles,
    AssignPrincipalRole,
    RevokePrincipalRole,
}

const OPERATIONS: OperationTable<Op> = OperationTable::new(
    "polaris-principal-request",
    &[
        OperationEntry { operation: Op::List, canonical: "list", synonyms: &["ls"] },
        OperationEntry { operation: Op::Get, canonical: "get", synonyms: &["load", "fetch"] },
        OperationEntry { operation: Op::Create, canonical: "create", synonyms: &[] },
        OperationEntry { operation: Op::Update, canonical: "update", synonyms: &[] },
        OperationEntry { operation: Op::Delete, canonical: "delete", synonyms: &["drop", "remove"] },
        OperationEntry {
            operation: Op::RotateCredentials,
            canonical: "rotate-credentials",
            synonyms: &["rotate"],
        },
        OperationEntry {
            operation: Op::ResetCredentials,
            canonical: "reset-credentials",
            synonyms: &["reset"],
        },
        OperationEntry {
            operation: Op::ListPrincipalRoles,
            canonical: "list-principal-roles",
            synonyms: &["list-roles", "roles"],
        },
        OperationEntry {
            operation: Op::AssignPrincipalRole,
            canonical: "assign-principal-role",
            synonyms: &["assign-role", "grant-role"],
        },
        OperationEntry {
            operation: Op::RevokePrincipalRole,
            canonical: "revoke-principal-role",
            synonyms: &["revoke-role"],
        },
    ],
);

const CREATE: BodyShape = BodyShape::new("Create", "CreatePrincipalRequest");
const UPDATE: BodyShape = BodyShape::new("Update", "UpdatePrincipalRequest");
const RESET: BodyShape = BodyShape::new("Reset", "ResetPrincipalRequest");
const ASSIGN: BodyShape = BodyShape::new("Assign", "GrantPrincipalRoleRequest");

const CREATE_HINT: &str =
    "Create requests must match CreatePrincipalRequest: a `principal` object with at least `name`.";
const UPDATE_HINT: &str =
    "Update requests must match UpdatePrincipalRequest, and currentEntityVersion must match the latest principal version.";
const ASSIGN_HINT: &str =
    "Assignments must match GrantPrincipalRoleRequest: a `principalRole` object with `name`.";

pub struct PrincipalTool;

impl ResourceTool for PrincipalTool {
    fn name(&self) -> &'static str {
        OPERATIONS.tool()
    }

    fn description(&self) -> &'static str {
        "Manage Polaris principals, their credentials and principal-role assignments."
    }

    fn input_schema(&self) -> Value {
        schema(
            OPERATIONS.canonical_names(),
            json!({
                "principal": name_property("Principal name. Required for every operation except list and create."),
                "principalRole": name_property("Principal role name. Required for revoke-principal-role."),
            }),
            "CreatePrincipalRequest, UpdatePrincipalRequest, ResetPrincipalRequest (optional) or GrantPrincipalRoleRequest.",
        )
    }

    fn api(&self) -> ApiRoot {
        ApiRoot::Management
    }

    fn check_operations(&self) -> Result<(), OperationTableError> {
        OPERATIONS.validate()
    }

    fn prepare(&self, args: ToolArguments<'_>) -> Result<Prepared, ValidationError> {
        let op = OPERATIONS.resolve(args.operation()?)?;
        let principal = || args.segment("principal").map(|p| format!("principals/{}", p));

        let (operation, request, hint) = match op {
            Op::List => ("list", RequestDescriptor::new(Method::Get, "principals"), None),
            Op::Get => ("get", RequestDescriptor::new(Method::Get, principal()?), None),
            Op::Create => (
                "create",
                RequestDescriptor::new(Method::Post, "principals").with_body(args.body(CREATE)?),
                Some(CREATE_HINT),
            ),
            Op::Update => {
                let path = principal()?;
                (
                    "update",
                    RequestDescriptor::new(Method::Put, path).with_body(args.body(UPDATE)?),
                    Some(UPDATE_HINT),
                )
            }
            Op::Delete => ("delete", RequestDescriptor::new(Method::Delete, principal()?), None),
            Op::RotateCredentials => (
                "rotate-credentials",
                RequestDescriptor::new(Method::Post, format!("{}/rotate", principal()?)),
                None,
            ),
            Op::ResetCredentials => {
                let path = format!("{}/reset", principal()?);
                (
                    "reset-credentials",
                    RequestDescriptor::new(Method::Post, path)
                        .with_optional_body(args.optional_body(RESET)?),
                    None,
                )
            }
            Op::ListPrincipalRoles => (
                "list-principal-roles",
                RequestDescriptor::new(Method::Get, format!("{}/principal-roles", principal()?)),
                None,
            ),
            Op::AssignPrincipalRole => {
                let path = format!("{}/principal-roles", principal()?);
                (
                    "assign-principal-role",
                    RequestDescriptor::new(Method::Put, path).with_body(args.body(ASSIGN)?),
                    Some(ASSIGN_HINT),
                )
            }
            Op::RevokePrincipalRole => {
                let path = format!(
                    "{}/principal-roles/{}",
                    principal()?,
                    args.segment("principalRole")?
                );
                ("revoke-principal-role", RequestDescriptor::new(Method::Delete, path), None)
            }
        };

        Ok(Prepared {
            operation,
            request: finish(args, request)?,
            hint,
        })
    }
}
