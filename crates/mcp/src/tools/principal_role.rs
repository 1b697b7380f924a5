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
    ListPrincipals,
    ListCatalogRoles,
    AssignCatalogRole,
    RevokeCatalogRole,
}

const OPERATIONS: OperationTable<Op> = OperationTable::new(
    "polaris-principal-role-request",
    &[
        OperationEntry { operation: Op::List, canonical: "list", synonyms: &["ls"] },
        OperationEntry { operation: Op::Get, canonical: "get", synonyms: &["load", "fetch"] },
        OperationEntry { operation: Op::Create, canonical: "create", synonyms: &[] },
        OperationEntry { operation: Op::Update, canonical: "update", synonyms: &[] },
        OperationEntry { operation: Op::Delete, canonical: "delete", synonyms: &["drop", "remove"] },
        OperationEntry {
            operation: Op::ListPrincipals,
            canonical: "list-principals",
            synonyms: &["principals"],
        },
        OperationEntry {
            operation: Op::ListCatalogRoles,
            canonical: "list-catalog-roles",
            synonyms: &["catalog-roles"],
        },
        OperationEntry {
            operation: Op::AssignCatalogRole,
            canonical: "assign-catalog-role",
            synonyms: &["grant-catalog-role"],
        },
        OperationEntry {
            operation: Op::RevokeCatalogRole,
            canonical: "revoke-catalog-role",
            synonyms: &[],
        },
    ],
);

const CREATE: BodyShape = BodyShape::new("Create", "CreatePrincipalRoleRequest");
const UPDATE: BodyShape = BodyShape::new("Update", "UpdatePrincipalRoleRequest");
const ASSIGN: BodyShape = BodyShape::new("Assign", "GrantCatalogRoleRequest");

const CREATE_HINT: &str =
    "Create requests must match CreatePrincipalRoleRequest: a `principalRole` object with at least `name`.";
const UPDATE_HINT: &str = "Update requests must match UpdatePrincipalRoleRequest, and currentEntityVersion must \
match the latest principal role version.";
const ASSIGN_HINT: &str =
    "Assignments must match GrantCatalogRoleRequest: a `catalogRole` object with `name`.";

pub struct PrincipalRoleTool;

impl ResourceTool for PrincipalRoleTool {
    fn name(&self) -> &'static str {
        OPERATIONS.tool()
    }

    fn description(&self) -> &'static str {
        "Manage Polaris principal roles, their principals and the catalog roles granted to them."
    }

    fn input_schema(&self) -> Value {
        schema(
            OPERATIONS.canonical_names(),
            json!({
                "principalRole": name_property("Principal role name. Required for every operation except list and create."),
                "catalog": name_property("Catalog name. Required for catalog-role operations."),
                "catalogRole": name_property("Catalog role name. Required for revoke-catalog-role."),
            }),
            "CreatePrincipalRoleRequest, UpdatePrincipalRoleRequest or GrantCatalogRoleRequest.",
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
            Op::List => ("list", RequestDescriptor::new(Method::Get, "principal-roles"), None),
            Op::Get => ("get", RequestDescriptor::new(Method::Get, role_path(args)?), None),
            Op::Create => (
                "create",
                RequestDescriptor::new(Method::Post, "principal-roles").with_body(args.body(CREATE)?),
                Some(CREATE_HINT),
            ),
            Op::Update => {
                let path = role_path(args)?;
                (
                    "update",
                    RequestDescriptor::new(Method::Put, path).with_body(args.body(UPDATE)?),
                    Some(UPDATE_HINT),
                )
            }
            Op::Delete => ("delete", RequestDescriptor::new(Method::Delete, role_path(args)?), None),
            Op::ListPrincipals => (
                "list-principals",
                RequestDescriptor::new(Method::Get, format!("{}/principals", role_path(args)?)),
                None,
            ),
            Op::ListCatalogRoles => (
                "list-catalog-roles",
                RequestDescriptor::new(Method::Get, catalog_roles_path(args)?),
                None,
            ),
            Op::AssignCatalogRole => {
                let path = catalog_roles_path(args)?;
                (
                    "assign-catalog-role",
                    RequestDescriptor::new(Method::Put, path).with_body(args.body(ASSIGN)?),
                    Some(ASSIGN_HINT),
                )
            }
            Op::RevokeCatalogRole => {
                let path = format!(
                    "{}/{}",
                    catalog_roles_path(args)?,
                    args.segment("catalogRole")?
                );
                ("revoke-catalog-role", RequestDescriptor::new(Method::Delete, path), None)
            }
        };

        Ok(Prepared {
            operation,
            request: finish(args, request)?,
            hint,
        })
    }
}

fn role_path(args: ToolArguments<'_>) -> Result<String, ValidationError> {
    Ok(format!("principal-roles/{}", args.segment("principalRole")?))
}

/// `principal-roles/{principalRole}/catalog-roles/{catalog}`
fn catalog_roles_path(args: ToolArguments<'_>) -> Result<String, ValidationError> {
    let role = role_path(args)?;
    Ok(format!("{}/catalog-roles/{}", role, args.segment("catalog")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepare(value: Value) -> Result<Prepared, ValidationError> {
        PrincipalRoleTool.prepare(ToolArguments::from_value(&value).unwrap())
    }

    #[test]
    fn table_is_consistent() {
        assert!(PrincipalRoleTool.check_operations().is_ok());
    }

    #[test]
    fn lists_principals_of_role() {
        let prepared = prepare(json!({"operation": "principals", "principalRole": "data engineer"})).unwrap();
        assert_eq!(prepared.operation, "list-principals");
        assert_eq!(prepared.request.path, "principal-roles/data%20engineer/principals");
    }

    #[test]
    fn catalog_role_operations_need_catalog() {
        let err = prepare(json!({"operation": "catalog-roles", "principalRole": "eng"})).unwrap_err();
        assert_eq!(err.message(), "Missing required field: catalog");

        let prepared = prepare(json!({
            "operation": "grant-catalog-role",
            "principalRole": "eng",
            "catalog": "prod",
            "body": {"catalogRole": {"name": "reader"}}
        }))
        .unwrap();
        assert_eq!(prepared.request.method, Method::Put);
        assert_eq!(prepared.request.path, "principal-roles/eng/catalog-roles/prod");
    }

    #[test]
    fn revoke_catalog_role_path() {
        let err = prepare(json!({"operation": "revoke-catalog-role", "principalRole": "eng", "catalog": "prod"}))
            .unwrap_err();
        assert_eq!(err.field(), "catalogRole");

        let prepared = prepare(json!({
            "operation": "revoke-catalog-role",
            "principalRole": "eng",
            "catalog": "prod",
            "catalogRole": "reader"
        }))
        .unwrap();
        assert_eq!(prepared.request.method, Method::Delete);
        assert_eq!(prepared.request.path, "principal-roles/eng/catalog-roles/prod/reader");
    }

    #[test]
    fn update_carries_hint() {
        let prepared = prepare(json!({"operation": "update", "principalRole": "eng", "body": {"currentEntityVersion": 2}}))
            .unwrap();
        assert!(prepared.hint.unwrap().contains("UpdatePrincipalRoleRequest"));
    }
}
