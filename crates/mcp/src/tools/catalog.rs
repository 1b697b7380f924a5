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
}

const OPERATIONS: OperationTable<Op> = OperationTable::new(
    "polaris-catalog-request",
    &[
        OperationEntry { operation: Op::List, canonical: "list", synonyms: &["ls"] },
        OperationEntry { operation: Op::Get, canonical: "get", synonyms: &["load", "fetch"] },
        OperationEntry { operation: Op::Create, canonical: "create", synonyms: &[] },
        OperationEntry { operation: Op::Update, canonical: "update", synonyms: &[] },
        OperationEntry { operation: Op::Delete, canonical: "delete", synonyms: &["drop", "remove"] },
    ],
);

const CREATE: BodyShape = BodyShape::new("Create", "CreateCatalogRequest");
const UPDATE: BodyShape = BodyShape::new("Update", "UpdateCatalogRequest");

const CREATE_HINT: &str = "Create requests must match CreateCatalogRequest: a `catalog` object with name, type, \
properties.default-base-location and storageConfigInfo.";
const UPDATE_HINT: &str = "Update requests must match UpdateCatalogRequest, and currentEntityVersion must match \
the latest catalog version. Fetch the catalog first to read it.";

/// Management API catalogs.
pub struct CatalogTool;

impl ResourceTool for CatalogTool {
    fn name(&self) -> &'static str {
        OPERATIONS.tool()
    }

    fn description(&self) -> &'static str {
        "Manage Polaris catalogs (list, get, create, update, delete) through the management API."
    }

    fn input_schema(&self) -> Value {
        schema(
            OPERATIONS.canonical_names(),
            json!({"catalog": name_property("Catalog name. Required for get, update and delete.")}),
            "CreateCatalogRequest for create, UpdateCatalogRequest for update.",
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

        let (operation, request, hint) = match op {
            Op::List => ("list", RequestDescriptor::new(Method::Get, "catalogs"), None),
            Op::Get => (
                "get",
                RequestDescriptor::new(Method::Get, format!("catalogs/{}", args.segment("catalog")?)),
                None,
            ),
            Op::Create => (
                "create",
                RequestDescriptor::new(Method::Post, "catalogs").with_body(args.body(CREATE)?),
                Some(CREATE_HINT),
            ),
            Op::Update => {
                let catalog = args.segment("catalog")?;
                (
                    "update",
                    RequestDescriptor::new(Method::Put, format!("catalogs/{}", catalog))
                        .with_body(args.body(UPDATE)?),
                    Some(UPDATE_HINT),
                )
            }
            Op::Delete => (
                "delete",
                RequestDescriptor::new(Method::Delete, format!("catalogs/{}", args.segment("catalog")?)),
                None,
            ),
        };

        Ok(Prepared {
            operation,
            request: finish(args, request)?,
            hint,
        })
    }
}
