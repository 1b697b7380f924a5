use polaris_mcp_core::{
    encode_namespace, ApiRoot, BodyShape, Method, OperationEntry, OperationTable,
    OperationTableError, RequestDescriptor, ToolArguments, ValidationError,
};
use serde_json::{json, Map, Value};

use super::{finish, name_property, namespace_property, schema, Prepared, ResourceTool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    List,
    Get,
    Exists,
    Create,
    UpdateProperties,
    Delete,
}

const OPERATIONS: OperationTable<Op> = OperationTable::new(
    "polaris-namespace-request",
    &[
        OperationEntry { operation: Op::List, canonical: "list", synonyms: &["ls"] },
        OperationEntry { operation: Op::Get, canonical: "get", synonyms: &["load", "fetch"] },
        OperationEntry { operation: Op::Exists, canonical: "exists", synonyms: &["head", "check"] },
        OperationEntry { operation: Op::Create, canonical: "create", synonyms: &[] },
        OperationEntry {
            operation: Op::UpdateProperties,
            canonical: "update-properties",
            synonyms: &["update", "properties", "set-properties"],
        },
        OperationEntry { operation: Op::Delete, canonical: "delete", synonyms: &["drop", "remove"] },
    ],
);

const CREATE: BodyShape = BodyShape::new("Create", "CreateNamespaceRequest");
const UPDATE_PROPERTIES: BodyShape = BodyShape::new("Update", "UpdateNamespacePropertiesRequest");

const CREATE_HINT: &str =
    "Create requests accept an optional CreateNamespaceRequest body; the namespace levels come from the `namespace` argument.";
const UPDATE_PROPERTIES_HINT: &str =
    "Property updates must match UpdateNamespacePropertiesRequest: `removals` (array of keys) and/or `updates` (object).";

/// Iceberg REST namespaces.
pub struct NamespaceTool;

impl ResourceTool for NamespaceTool {
    fn name(&self) -> &'static str {
        OPERATIONS.tool()
    }

    fn description(&self) -> &'static str {
        "Manage Iceberg namespaces in a Polaris catalog (list, get, exists, create, update-properties, delete)."
    }

    fn input_schema(&self) -> Value {
        schema(
            OPERATIONS.canonical_names(),
            json!({
                "catalog": name_property("Catalog name."),
                "namespace": namespace_property(),
            }),
            "CreateNamespaceRequest for create (optional), UpdateNamespacePropertiesRequest for update-properties.",
        )
    }

    fn api(&self) -> ApiRoot {
        ApiRoot::Catalog
    }

    fn check_operations(&self) -> Result<(), OperationTableError> {
        OPERATIONS.validate()
    }

    fn prepare(&self, args: ToolArguments<'_>) -> Result<Prepared, ValidationError> {
        let op = OPERATIONS.resolve(args.operation()?)?;

        let prepared = match op {
            Op::List => {
                let parent = args.optional_namespace()?.map(|ns| ns.joined()).transpose()?;
                let catalog = args.segment("catalog")?;
                let mut request = RequestDescriptor::new(Method::Get, format!("{}/namespaces", catalog));
                if let Some(parent) = parent {
                    request.query.push(("parent".to_string(), parent));
                }
                Prepared { operation: "list", request, hint: None }
            }
            Op::Get => Prepared {
                operation: "get",
                request: RequestDescriptor::new(Method::Get, namespace_path(args)?),
                hint: None,
            },
            Op::Exists => Prepared {
                operation: "exists",
                request: RequestDescriptor::new(Method::Head, namespace_path(args)?),
                hint: None,
            },
            Op::Create => {
                let levels = args.namespace()?.levels()?;
                let catalog = args.segment("catalog")?;
                let mut body = match args.optional_body(CREATE)? {
                    Some(Value::Object(body)) => body,
                    _ => Map::new(),
                };
                body.insert("namespace".to_string(), json!(levels));
                Prepared {
                    operation: "create",
                    request: RequestDescriptor::new(Method::Post, format!("{}/namespaces", catalog))
                        .with_body(Value::Object(body)),
                    hint: Some(CREATE_HINT),
                }
            }
            Op::UpdateProperties => {
                let path = format!("{}/properties", namespace_path(args)?);
                Prepared {
                    operation: "update-properties",
                    request: RequestDescriptor::new(Method::Post, path)
                        .with_body(args.body(UPDATE_PROPERTIES)?),
                    hint: Some(UPDATE_PROPERTIES_HINT),
                }
            }
            Op::Delete => Prepared {
                operation: "delete",
                request: RequestDescriptor::new(Method::Delete, namespace_path(args)?),
                hint: None,
            },
        };

        Ok(Prepared {
            request: finish(args, prepared.request)?,
            ..prepared
        })
    }
}

/// `{catalog}/namespaces/{ns}`, validating the namespace first.
fn namespace_path(args: ToolArguments<'_>) -> Result<String, ValidationError> {
    let namespace = encode_namespace(&args.namespace()?)?;
    let catalog = args.segment("catalog")?;
    Ok(format!("{}/namespaces/{}", catalog, namespace))
}
