//! API contract derivation: CRUD endpoints per entity and an OpenAPI 3.1 document.

use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

use super::client::{DART_CLIENT_DIR, write_dart_client};
use super::entities::{Entity, FieldKind};
use super::pascal_case;
use crate::config::ContractConfig;
use crate::errors::PackagingError;

pub const OPENAPI_FILE: &str = "openapi.yaml";
const SYSTEM_TAG: &str = "system";
const JSON_MEDIA: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Health,
    List,
    Create,
    Get,
    Update,
    Delete,
}

impl Operation {
    pub fn method(&self) -> &'static str {
        match self {
            Operation::Health | Operation::List | Operation::Get => "GET",
            Operation::Create => "POST",
            Operation::Update => "PUT",
            Operation::Delete => "DELETE",
        }
    }

    fn has_id(&self) -> bool {
        matches!(self, Operation::Get | Operation::Update | Operation::Delete)
    }

    fn has_body(&self) -> bool {
        matches!(self, Operation::Create | Operation::Update)
    }
}

/// One HTTP operation of the derived API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    pub operation: Operation,
    pub summary: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl Endpoint {
    fn new(operation: Operation, path: String, summary: String, tag: &str, entity: Option<&str>) -> Self {
        Self {
            method: operation.method().to_string(),
            path,
            operation,
            summary,
            tags: vec![tag.to_string()],
            entity: entity.map(str::to_string),
        }
    }

    pub fn operation_id(&self) -> String {
        let Some(entity) = &self.entity else {
            return "health".to_string();
        };
        let name = pascal_case(entity);
        match self.operation {
            Operation::Health => "health".to_string(),
            Operation::List => format!("list{}s", name),
            Operation::Create => format!("create{}", name),
            Operation::Get => format!("get{}", name),
            Operation::Update => format!("update{}", name),
            Operation::Delete => format!("delete{}", name),
        }
    }
}

/// `GET /health` followed by five CRUD endpoints per entity, in declaration order.
pub fn derive_endpoints(entities: &[Entity]) -> Vec<Endpoint> {
    let mut endpoints = vec![Endpoint::new(
        Operation::Health,
        "/health".to_string(),
        "Health check".to_string(),
        SYSTEM_TAG,
        None,
    )];

    for entity in entities {
        let collection = format!("/{}", entity.collection());
        let item = format!("{}/{{id}}", collection);
        let tag = entity.table_name.as_str();
        let name = Some(entity.name.as_str());
        endpoints.extend([
            Endpoint::new(Operation::List, collection.clone(), format!("List {}s", entity.name), tag, name),
            Endpoint::new(Operation::Create, collection, format!("Create a {}", entity.name), tag, name),
            Endpoint::new(Operation::Get, item.clone(), format!("Get a {} by id", entity.name), tag, name),
            Endpoint::new(Operation::Update, item.clone(), format!("Update a {}", entity.name), tag, name),
            Endpoint::new(Operation::Delete, item, format!("Delete a {}", entity.name), tag, name),
        ]);
    }

    endpoints
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaObject {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl SchemaObject {
    fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("#/components/schemas/{}", name)),
            ..Default::default()
        }
    }

    fn object(properties: IndexMap<String, SchemaObject>, required: Vec<String>) -> Self {
        Self {
            schema_type: Some("object".to_string()),
            properties: Some(properties),
            required: Some(required),
            ..Default::default()
        }
    }

    fn for_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Integer => Self::typed("integer"),
            FieldKind::Real => Self::typed("number"),
            FieldKind::Boolean => Self::typed("boolean"),
            FieldKind::DateTime => Self {
                format: Some("date-time".to_string()),
                ..Self::typed("string")
            },
            FieldKind::Text => Self::typed("string"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaType {
    pub schema: SchemaObject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub description: String,
    pub schema: SchemaObject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationObject {
    pub operation_id: String,
    pub summary: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, Response>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    pub title: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Server {
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Components {
    pub schemas: IndexMap<String, SchemaObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub name: String,
    pub description: String,
}

/// OpenAPI 3.1 document. Maps serialize in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractDocument {
    pub openapi: String,
    pub info: Info,
    pub servers: Vec<Server>,
    pub paths: IndexMap<String, IndexMap<String, OperationObject>>,
    pub components: Components,
    pub tags: Vec<Tag>,
}

impl ContractDocument {
    pub fn base_url(&self) -> &str {
        self.servers.first().map(|s| s.url.as_str()).unwrap_or("http://localhost:8000")
    }

    pub fn to_yaml(&self) -> Result<String, PackagingError> {
        serde_yaml::to_string(self).map_err(|e| PackagingError::Serialize {
            what: "OpenAPI document".to_string(),
            message: e.to_string(),
        })
    }
}

fn json_content(schema: SchemaObject) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    content.insert(JSON_MEDIA.to_string(), MediaType { schema });
    content
}

fn error_response(description: &str) -> Response {
    Response {
        description: description.to_string(),
        content: Some(json_content(SchemaObject::reference("Error"))),
    }
}

fn base_schemas() -> IndexMap<String, SchemaObject> {
    let mut schemas = IndexMap::new();

    let mut error = IndexMap::new();
    error.insert("error".to_string(), SchemaObject::typed("string"));
    error.insert("message".to_string(), SchemaObject::typed("string"));
    error.insert("status".to_string(), SchemaObject::typed("integer"));
    schemas.insert(
        "Error".to_string(),
        SchemaObject::object(error, vec!["error".into(), "message".into(), "status".into()]),
    );

    let mut health = IndexMap::new();
    health.insert(
        "status".to_string(),
        SchemaObject {
            example: Some("ok".to_string()),
            ..SchemaObject::typed("string")
        },
    );
    health.insert(
        "timestamp".to_string(),
        SchemaObject {
            format: Some("date-time".to_string()),
            ..SchemaObject::typed("string")
        },
    );
    schemas.insert(
        "HealthResponse".to_string(),
        SchemaObject::object(health, vec!["status".into(), "timestamp".into()]),
    );

    schemas
}

fn entity_schema(entity: &Entity) -> SchemaObject {
    let mut properties = IndexMap::new();
    let mut required = Vec::new();
    for field in &entity.fields {
        properties.insert(field.name.clone(), SchemaObject::for_kind(field.kind()));
        if field.required {
            required.push(field.name.clone());
        }
    }
    SchemaObject::object(properties, required)
}

fn list_schema(component: &str) -> SchemaObject {
    let mut properties = IndexMap::new();
    properties.insert(
        "data".to_string(),
        SchemaObject {
            items: Some(Box::new(SchemaObject::reference(component))),
            ..SchemaObject::typed("array")
        },
    );
    properties.insert("total".to_string(), SchemaObject::typed("integer"));
    properties.insert("page".to_string(), SchemaObject::typed("integer"));
    properties.insert("limit".to_string(), SchemaObject::typed("integer"));
    SchemaObject::object(properties, vec!["data".into(), "total".into()])
}

fn operation_object(endpoint: &Endpoint) -> OperationObject {
    let success_schema = match (endpoint.operation, endpoint.entity.as_deref()) {
        (Operation::Health, _) | (_, None) => Some(SchemaObject::reference("HealthResponse")),
        (Operation::List, Some(entity)) => {
            Some(SchemaObject::reference(&format!("{}List", pascal_case(entity))))
        }
        (Operation::Delete, Some(_)) => None,
        (_, Some(entity)) => Some(SchemaObject::reference(&pascal_case(entity))),
    };

    let mut responses = IndexMap::new();
    responses.insert(
        "200".to_string(),
        Response {
            description: "Successful response".to_string(),
            content: success_schema.map(json_content),
        },
    );
    responses.insert("400".to_string(), error_response("Invalid request"));
    responses.insert("404".to_string(), error_response("Resource not found"));
    responses.insert("500".to_string(), error_response("Internal server error"));

    let parameters = if endpoint.operation.has_id() {
        vec![Parameter {
            name: "id".to_string(),
            location: "path".to_string(),
            required: true,
            description: "Unique identifier".to_string(),
            schema: SchemaObject::typed("string"),
        }]
    } else {
        Vec::new()
    };

    let request_body = match endpoint.entity.as_deref() {
        Some(entity) if endpoint.operation.has_body() => Some(RequestBody {
            required: true,
            content: json_content(SchemaObject::reference(&pascal_case(entity))),
        }),
        _ => None,
    };

    OperationObject {
        operation_id: endpoint.operation_id(),
        summary: endpoint.summary.clone(),
        tags: endpoint.tags.clone(),
        parameters,
        request_body,
        responses,
    }
}

/// Build the OpenAPI document for the derived endpoints.
pub fn render_openapi(
    endpoints: &[Endpoint],
    entities: &[Entity],
    config: &ContractConfig,
) -> ContractDocument {
    let mut schemas = base_schemas();
    for entity in entities {
        let component = pascal_case(&entity.name);
        schemas.insert(component.clone(), entity_schema(entity));
        schemas.insert(format!("{}List", component), list_schema(&component));
    }

    let mut paths: IndexMap<String, IndexMap<String, OperationObject>> = IndexMap::new();
    for endpoint in endpoints {
        paths
            .entry(endpoint.path.clone())
            .or_default()
            .insert(endpoint.method.to_lowercase(), operation_object(endpoint));
    }

    let mut tags = vec![Tag {
        name: SYSTEM_TAG.to_string(),
        description: "System endpoints".to_string(),
    }];
    for entity in entities {
        if tags.iter().all(|t| t.name != entity.table_name) {
            tags.push(Tag {
                name: entity.table_name.clone(),
                description: format!("Operations on {}", entity.collection()),
            });
        }
    }

    ContractDocument {
        openapi: "3.1.0".to_string(),
        info: Info {
            title: config.title.clone(),
            description: "API contract derived from the application spec".to_string(),
            version: config.version.clone(),
        },
        servers: vec![Server {
            url: config.base_url.clone(),
            description: "Development server".to_string(),
        }],
        paths,
        components: Components { schemas },
        tags,
    }
}

/// Summary of the contract derivation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractReport {
    pub endpoints_detected: usize,
    pub entities_supported: Vec<String>,
    pub models_generated: usize,
    pub openapi_files: Vec<String>,
    pub dart_client_files: Vec<String>,
}

/// Derive endpoints, write `openapi.yaml` and the Dart client stub.
pub fn write_contract_artifacts(
    artifacts_dir: &Path,
    entities: &[Entity],
    config: &ContractConfig,
) -> Result<ContractReport, PackagingError> {
    std::fs::create_dir_all(artifacts_dir).map_err(|e| PackagingError::io(artifacts_dir, e))?;

    let endpoints = derive_endpoints(entities);
    let document = render_openapi(&endpoints, entities, config);
    let openapi_path = artifacts_dir.join(OPENAPI_FILE);
    std::fs::write(&openapi_path, document.to_yaml()?)
        .map_err(|e| PackagingError::io(&openapi_path, e))?;

    let client_dir = artifacts_dir.join(DART_CLIENT_DIR);
    let client_files = write_dart_client(&client_dir, entities, document.base_url())?;

    Ok(ContractReport {
        endpoints_detected: endpoints.len(),
        entities_supported: entities.iter().map(|e| e.name.clone()).collect(),
        models_generated: entities.len(),
        openapi_files: vec![OPENAPI_FILE.to_string()],
        dart_client_files: client_files
            .iter()
            .map(|f| format!("{}/{}", DART_CLIENT_DIR, f))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::entities::Field;
    use tempfile::tempdir;

    fn field(name: &str, ty: &str, required: bool) -> Field {
        Field {
            name: name.to_string(),
            column_name: crate::util::normalize_identifier(name),
            field_type: ty.to_string(),
            required,
            primary_key: false,
            foreign: None,
        }
    }

    fn user() -> Entity {
        Entity {
            name: "User".to_string(),
            table_name: "user".to_string(),
            fields: vec![field("email", "string", true), field("born", "date", false)],
        }
    }

    fn to_json(doc: &ContractDocument) -> serde_json::Value {
        serde_json::to_value(doc).unwrap()
    }

    #[test]
    fn test_endpoints_for_one_entity() {
        let endpoints = derive_endpoints(&[user()]);
        let pairs: Vec<(&str, &str)> = endpoints
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("GET", "/health"),
                ("GET", "/users"),
                ("POST", "/users"),
                ("GET", "/users/{id}"),
                ("PUT", "/users/{id}"),
                ("DELETE", "/users/{id}"),
            ]
        );
        assert_eq!(endpoints[1].operation_id(), "listUsers");
        assert_eq!(endpoints[5].operation_id(), "deleteUser");
    }

    #[test]
    fn test_no_entities_only_health() {
        let endpoints = derive_endpoints(&[]);
        assert_eq!(endpoints.len(), 1);
        let doc = render_openapi(&endpoints, &[], &ContractConfig::default());
        assert_eq!(doc.paths.len(), 1);
        assert_eq!(doc.components.schemas.len(), 2);
    }

    #[test]
    fn test_entity_schemas() {
        let entities = [user()];
        let doc = render_openapi(&derive_endpoints(&entities), &entities, &ContractConfig::default());
        let json = to_json(&doc);
        let schema = &json["components"]["schemas"]["User"];
        assert_eq!(schema["properties"]["email"]["type"], "string");
        assert_eq!(schema["properties"]["born"]["format"], "date-time");
        assert_eq!(schema["required"], serde_json::json!(["email"]));

        let list = &json["components"]["schemas"]["UserList"];
        assert_eq!(list["properties"]["data"]["items"]["$ref"], "#/components/schemas/User");
        assert_eq!(list["required"], serde_json::json!(["data", "total"]));
    }

    #[test]
    fn test_operations() {
        let entities = [user()];
        let doc = render_openapi(&derive_endpoints(&entities), &entities, &ContractConfig::default());
        let json = to_json(&doc);
        let paths = &json["paths"];

        assert_eq!(
            paths["/users"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/UserList"
        );
        assert_eq!(
            paths["/users"]["post"]["requestBody"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/User"
        );
        assert!(paths["/users/{id}"]["put"]["requestBody"]["required"].as_bool().unwrap());
        assert_eq!(paths["/users/{id}"]["get"]["parameters"][0]["in"], "path");
        assert!(paths["/users/{id}"]["delete"]["responses"]["200"].get("content").is_none());
        assert!(paths["/users"]["get"].get("parameters").is_none());
        for code in ["200", "400", "404", "500"] {
            assert!(paths["/health"]["get"]["responses"].get(code).is_some());
        }
    }

    #[test]
    fn test_component_keys_are_pascal_case() {
        let entities = [Entity {
            name: "Order Item".to_string(),
            table_name: "order_item".to_string(),
            fields: vec![field("qty", "int", true)],
        }];
        let doc = render_openapi(&derive_endpoints(&entities), &entities, &ContractConfig::default());
        let keys: Vec<&str> = doc.components.schemas.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Error", "HealthResponse", "OrderItem", "OrderItemList"]);
        let key_pattern = regex::Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap();
        assert!(keys.iter().all(|k| key_pattern.is_match(k)));

        let json = to_json(&doc);
        assert_eq!(
            json["paths"]["/order_items"]["post"]["requestBody"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/OrderItem"
        );
        assert_eq!(
            json["components"]["schemas"]["OrderItemList"]["properties"]["data"]["items"]["$ref"],
            "#/components/schemas/OrderItem"
        );
    }

    #[test]
    fn test_yaml_preserves_declaration_order() {
        let entities = [
            Entity {
                name: "Zebra".to_string(),
                table_name: "zebra".to_string(),
                fields: vec![field("name", "string", true)],
            },
            user(),
        ];
        let doc = render_openapi(&derive_endpoints(&entities), &entities, &ContractConfig::default());
        let yaml = doc.to_yaml().unwrap();
        let openapi = yaml.find("openapi:").unwrap();
        let info = yaml.find("info:").unwrap();
        let zebras = yaml.find("/zebras:").unwrap();
        let users = yaml.find("/users:").unwrap();
        assert!(openapi < info);
        assert!(zebras < users);
        assert!(yaml.contains("title: Forge API"));
    }

    #[test]
    fn test_write_contract_artifacts() {
        let dir = tempdir().unwrap();
        let report = write_contract_artifacts(dir.path(), &[user()], &ContractConfig::default()).unwrap();
        assert_eq!(report.endpoints_detected, 6);
        assert_eq!(report.entities_supported, vec!["User"]);
        assert!(dir.path().join(OPENAPI_FILE).is_file());
        for file in &report.dart_client_files {
            assert!(dir.path().join(file).is_file(), "{file}");
        }
    }
}
