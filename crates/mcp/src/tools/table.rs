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
    Commit,
    Delete,
}

const OPERATIONS: OperationTable<Op> = OperationTable::new(
    "polaris-iceberg-table",
    &[
        OperationEntry { operation: Op::List, canonical: "list", synonyms: &["ls"] },
        OperationEntry { operation: Op::Get, canonical: "get", synonyms: &["load", "fetch"] },
        OperationEntry { operation: Op::Create, canonical: "create", synonyms: &[] },
        OperationEntry { operation: Op::Commit, canonical: "commit", synonyms: &["update"] },
        OperationEntry { operation: Op::Delete, canonical: "delete", synonyms: &["drop", "remove"] },
    ],
);

const CREATE: BodyShape = BodyShape::new("Create", "CreateTableRequest");
const COMMIT: BodyShape = BodyShape::new("Commit", "CommitTableRequest");

const TABLE_REQUIRED: &str = "Table name is required.";

const CREATE_HINT: &str =
    "Create requests must match CreateTableRequest: at least `name` and an Iceberg `schema`.";
const COMMIT_HINT: &str = "Commits must match CommitTableRequest: `requirements` and `updates` arrays. \
A 409 usually means a requirement such as assert-current-schema-id no longer holds; reload the table and retry.";

/// Iceberg REST tables.
pub struct TableTool;

impl ResourceTool for TableTool {
    fn name(&self) -> &'static str {
        OPERATIONS.tool()
    }

    fn description(&self) -> &'static str {
        "Work with Iceberg tables in a Polaris catalog (list, get, create, commit, delete)."
    }

    fn input_schema(&self) -> Value {
        schema(
            OPERATIONS.canonical_names(),
            json!({
                "catalog": name_property("Catalog name."),
                "namespace": namespace_property(),
                "table": name_property("Table name. Required for get, commit and delete."),
            }),
            "CreateTableRequest for create, CommitTableRequest for commit.",
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
        let namespace = args.namespace_segment()?;
        let tables = format!("{}/namespaces/{}/tables", args.segment("catalog")?, namespace);
        let table = || -> Result<String, ValidationError> {
            Ok(format!("{}/{}", tables, args.segment_or("table", TABLE_REQUIRED)?))
        };

        let prepared = match op {
            Op::List => Prepared {
                operation: "list",
                request: RequestDescriptor::new(Method::Get, tables.clone()),
                hint: None,
            },
            Op::Get => Prepared {
                operation: "get",
                request: RequestDescriptor::new(Method::Get, table()?),
                hint: None,
            },
            Op::Create => Prepared {
                operation: "create",
                request: RequestDescriptor::new(Method::Post, tables.clone())
                    .with_body(args.body(CREATE)?),
                hint: Some(CREATE_HINT),
            },
            Op::Commit => {
                let path = table()?;
                Prepared {
                    operation: "commit",
                    request: RequestDescriptor::new(Method::Post, path).with_body(args.body(COMMIT)?),
                    hint: Some(COMMIT_HINT),
                }
            }
            Op::Delete => Prepared {
                operation: "delete",
                request: RequestDescriptor::new(Method::Delete, table()?),
                hint: None,
            },
        };

        Ok(Prepared {
            request: finish(args, prepared.request)?,
            ..prepared
        })
    }
}
