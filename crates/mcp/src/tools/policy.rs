use polaris_mcp_core::{
    ApiRoot, BodyShape, Method, OperationEntry, OperationTable, OperationTableError,
    RequestDescriptor, ToolArguments, ValidationError,
};
use serde_json::{json, Value};

use super::{finish, name_property, namespace_property, schema, Prepared, ResourceTool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    List,
    Get,
    Create,
    Update,
    Delete,
    Attach,
    Detach,
    Applicable,
}

const OPERATIONS: OperationTable<Op> = OperationTable::new(
    "polaris-policy",
    &[
        OperationEntry { operation: Op::List, canonical: "list", synonyms: &["ls"] },
        OperationEntry { operation: Op::Get, canonical: "get", synonyms: &["load", "fetch"] },
        OperationEntry { operation: Op::Create, canonical: "create", synonyms: &[] },
        OperationEntry { operation: Op::Update, canonical: "update", synonyms: &[] },
        OperationEntry { operation: Op::Delete, canonical: "delete", synonyms: &["drop", "remove"] },
        OperationEntry { operation: Op::Attach, canonical: "attach", synonyms: &["map"] },
        OperationEntry { operation: Op::Detach, canonical: "detach", synonyms: &["unmap"] },
        OperationEntry {
            operation: Op::Applicable,
            canonical: "applicable",
            synonyms: &["applicable-policies", "effective"],
        },
    ],
);

const CREATE: BodyShape = BodyShape::new("Create", "CreatePolicyRequest");
const UPDATE: BodyShape = BodyShape::new("Update", "UpdatePolicyRequest");
const ATTACH: BodyShape = BodyShape::new("Attach", "AttachPolicyRequest");
const DETACH: BodyShape = BodyShape::new("Detach", "DetachPolicyRequest");

const POLICY_REQUIRED: &str = "Policy name is required.";

const CREATE_HINT: &str = "Create requests must match CreatePolicyRequest: `name`, `type` and a `content` string.";
const UPDATE_HINT: &str =
    "Update requests must match UpdatePolicyRequest, and current-policy-version must match the latest policy version.";
const ATTACH_HINT: &str =
    "Attach requests must match AttachPolicyRequest: a `target` with `type` and `path`, plus optional `parameters`.";
const DETACH_HINT: &str = "Detach requests must match DetachPolicyRequest: a `target` with `type` and `path`.";

/// Polaris policy API.
pub struct PolicyTool;

impl ResourceTool for PolicyTool {
    fn name(&self) -> &'static str {
        OPERATIONS.tool()
    }

    fn description(&self) -> &'static str {
        "Manage Polaris policies and their attachments (list, get, create, update, delete, attach, detach, applicable)."
    }

    fn input_schema(&self) -> Value {
        schema(
            OPERATIONS.canonical_names(),
            json!({
                "catalog": name_property("Catalog name."),
                "namespace": namespace_property(),
                "policy": name_property("Policy name. Required for get, update, delete, attach and detach."),
                "table": name_property("Optional table name; narrows applicable policies to one target."),
            }),
            "CreatePolicyRequest, UpdatePolicyRequest, AttachPolicyRequest or DetachPolicyRequest.",
        )
    }

    fn api(&self) -> ApiRoot {
        ApiRoot::Policy
    }

    fn check_operations(&self) -> Result<(), OperationTableError> {
        OPERATIONS.validate()
    }

    fn prepare(&self, args: ToolArguments<'_>) -> Result<Prepared, ValidationError> {
        let op = OPERATIONS.resolve(args.operation()?)?;

        let (operation, request, hint) = match op {
            Op::List => ("list", RequestDescriptor::new(Method::Get, policies_path(args)?), None),
            Op::Get => ("get", RequestDescriptor::new(Method::Get, policy_path(args)?), None),
            Op::Create => {
                let path = policies_path(args)?;
                (
                    "create",
                    RequestDescriptor::new(Method::Post, path).with_body(args.body(CREATE)?),
                    Some(CREATE_HINT),
                )
            }
            Op::Update => {
                let path = policy_path(args)?;
                (
                    "update",
                    RequestDescriptor::new(Method::Put, path).with_body(args.body(UPDATE)?),
                    Some(UPDATE_HINT),
                )
            }
            Op::Delete => ("delete", RequestDescriptor::new(Method::Delete, policy_path(args)?), None),
            Op::Attach => {
                let path = format!("{}/mappings", policy_path(args)?);
                (
                    "attach",
                    RequestDescriptor::new(Method::Put, path).with_body(args.body(ATTACH)?),
                    Some(ATTACH_HINT),
                )
            }
            Op::Detach => {
                let path = format!("{}/mappings", policy_path(args)?);
                (
                    "detach",
                    RequestDescriptor::new(Method::Post, path).with_body(args.body(DETACH)?),
                    Some(DETACH_HINT),
                )
            }
            Op::Applicable => ("applicable", applicable_request(args)?, None),
        };

        Ok(Prepared {
            operation,
            request: finish(args, request)?,
            hint,
        })
    }
}

/// `{catalog}/namespaces/{ns}/policies`, validating the namespace first.
/// A string namespace is used as one level; dots are not split here.
fn policies_path(args: ToolArguments<'_>) -> Result<String, ValidationError> {
    let namespace = args.unsplit_namespace_segment()?;
    Ok(format!("{}/namespaces/{}/policies", args.segment("catalog")?, namespace))
}

fn policy_path(args: ToolArguments<'_>) -> Result<String, ValidationError> {
    let policies = policies_path(args)?;
    Ok(format!("{}/{}", policies, args.segment_or("policy", POLICY_REQUIRED)?))
}

/// Namespace and table narrow the lookup; both travel as query parameters.
fn applicable_request(args: ToolArguments<'_>) -> Result<RequestDescriptor, ValidationError> {
    let namespace = args
        .optional_namespace()?
        .map(|ns| ns.joined_unsplit())
        .transpose()?;
    let catalog = args.segment("catalog")?;
    let mut request = RequestDescriptor::new(Method::Get, format!("{}/applicable-policies", catalog));
    if let Some(namespace) = namespace {
        request.query.push(("namespace".to_string(), namespace));
    }
    if let Some(table) = args.optional_text("table") {
        request.query.push(("target-name".to_string(), table.to_string()));
    }
    Ok(request)
}
