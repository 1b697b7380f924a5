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
    ListPrincipalRoles,
    ListGrants,
    AddGrant,
    RevokeGrant,
}

const OPERATIONS: OperationTable<Op> = OperationTable::new(
    "polaris-catalog-role-request",
    &[
        OperationEntry { operation: Op::List, canonical: "list", synonyms: &["ls"] },
        OperationEntry { operation: Op::Get, canonical: "get", synonyms: &["load", "fetch"] },
        OperationEntry { operation: Op::Create, canonical: "create", synonyms: &[] },
        OperationEntry { operation: Op::Update, canonical: "update", synonyms: &[] },
        OperationEntry { operation: Op::Delete, canonical: "delete", synonyms: &["drop", "remove"] },
        OperationEntry {
            operation: Op::ListPrincipalRoles,
            canonical: "list-principal-roles",
            synonyms: &["principal-roles"],
        },
        OperationEntry { operation: Op::ListGrants, canonical: "list-grants", synonyms: &["grants"] },
        OperationEntry { operation: Op::AddGrant, canonical: "add-grant", synonyms: &["grant"] },
        OperationEntry { operation: Op::RevokeGrant, canonical: "revoke-grant", synonyms: &["revoke"] },
    ],
);

const CREATE: BodyShape = BodyShape::new("Create", "CreateCatalogRoleRequest");
const UPDATE: BodyShape = BodyShape::new("Update", "UpdateCatalogRoleRequest");
const ADD_GRANT: BodyShape = BodyShape::new("Add-grant", "AddGrantRequest");
const REVOKE_GRANT: BodyShape = BodyShape::new("Revoke-grant", "RevokeGrantRequest");

const CREATE_HINT: &str =
    "Create requests must match CreateCatalogRoleRequest: a `catalogRole` object with at least `name`.";
const UPDATE_HINT: &str = "Update requests must match UpdateCatalogRoleRequest, and currentEntityVersion must \
match the latest catalog role version.";
const GRANT_HINT: &str = "Grant payloads need a `grant` object with `type` (catalog, namespace, table or view) \
and a `privilege` valid for that type.";

pub struct CatalogRoleTool;

impl ResourceTool for CatalogRoleTool {
    fn name(&self) -> &'static str {
        OPERATIONS.tool()
    }

    fn description(&self) -> &'static str {
        "Manage catalog roles in a Polaris catalog, their grants and the principal roles holding them."
    }

    fn input_schema(&self) -> Value {
        schema(
            OPERATIONS.canonical_names(),
            json!({
                "catalog": name_property("Catalog name."),
                "catalogRole": name_property("Catalog role name. Required for every operation except list and create."),
            }),
            "CreateCatalogRoleRequest, UpdateCatalogRoleRequest, AddGrantRequest or RevokeGrantRequest.",
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
        let roles = format!("catalogs/{}/catalog-roles", args.segment("catalog")?);
        let role = || -> Result<String, ValidationError> {
            Ok(format!("{}/{}", roles, args.segment("catalogRole")?))
        };

        let (operation, request, hint) = match op {
            Op::List => ("list", RequestDescriptor::new(Method::Get, roles.clone()), None),
            Op::Get => ("get", RequestDescriptor::new(Method::Get, role()?), None),
            Op::Create => (
                "create",
                RequestDescriptor::new(Method::Post, roles.clone()).with_body(args.body(CREATE)?),
                Some(CREATE_HINT),
            ),
            Op::Update => {
                let path = role()?;
                (
                    "update",
                    RequestDescriptor::new(Method::Put, path).with_body(args.body(UPDATE)?),
                    Some(UPDATE_HINT),
                )
            }
            Op::Delete => ("delete", RequestDescriptor::new(Method::Delete, role()?), None),
            Op::ListPrincipalRoles => (
                "list-principal-roles",
                RequestDescriptor::new(Method::Get, format!("{}/principal-roles", role()?)),
                None,
            ),
            Op::ListGrants => (
                "list-grants",
                RequestDescriptor::new(Method::Get, format!("{}/grants", role()?)),
                None,
            ),
            Op::AddGrant => {
                let path = format!("{}/grants", role()?);
                (
                    "add-grant",
                    RequestDescriptor::new(Method::Put, path).with_body(args.body(ADD_GRANT)?),
                    Some(GRANT_HINT),
                )
            }
            Op::RevokeGrant => {
                let path = format!("{}/grants", role()?);
                (
                    "revoke-grant",
                    RequestDescriptor::new(Method::Post, path).with_body(args.body(REVOKE_GRANT)?),
                    Some(GRANT_HINT),
                )
            }
        };

        Ok(Prepared {
            operation,
            request: finish(args, request)?,
            hint,
        })
    }
}
