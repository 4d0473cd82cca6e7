//! Template construction: intrinsic functions, cross-stack values, and the
//! builder every stack declares its resources through.
//!
//! The builder owns the Name-tag invariant: each taggable resource gets
//! `Name = {logical_id}_{env}` at declaration time.

use super::environment::Environment;
use super::types::*;
use crate::error::{Result, StackError};
use indexmap::IndexMap;
use serde_json::{json, Value};

/// `{"Ref": id}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::ImportValue": name}`
pub fn import_value(export_name: &str) -> Value {
    json!({ "Fn::ImportValue": export_name })
}

/// `{"Fn::Join": ["", parts]}`
pub fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

/// Name tag for a logical id in an environment.
pub fn name_tag(logical_id: &str, env: Environment) -> Tag {
    Tag {
        key: "Name".to_string(),
        value: format!("{}_{}", logical_id, env),
    }
}

/// A value that may only be known once another stack is provisioned.
#[derive(Debug, Clone, PartialEq)]
pub enum StackValue {
    /// Known at synthesis time
    Literal(String),
    /// Resolved by the provisioning engine from a named export
    Import(String),
    /// Any other provider intrinsic (`Ref`, `Fn::GetAtt`, ...)
    Token(Value),
    /// Concatenation
    Join(Vec<StackValue>),
}

impl StackValue {
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Append a literal suffix, collapsing literals where possible.
    pub fn concat(self, suffix: &str) -> Self {
        match self {
            Self::Literal(mut s) => {
                s.push_str(suffix);
                Self::Literal(s)
            }
            Self::Join(mut parts) => {
                match parts.last_mut() {
                    Some(Self::Literal(last)) => last.push_str(suffix),
                    _ => parts.push(Self::literal(suffix)),
                }
                Self::Join(parts)
            }
            other => Self::Join(vec![other, Self::literal(suffix)]),
        }
    }

    /// Concrete string, if every part is a literal.
    pub fn as_literal(&self) -> Option<String> {
        match self {
            Self::Literal(s) => Some(s.clone()),
            Self::Join(parts) => parts.iter().map(Self::as_literal).collect(),
            Self::Import(_) | Self::Token(_) => None,
        }
    }

    /// Render into template JSON.
    pub fn to_template(&self) -> Value {
        if let Some(s) = self.as_literal() {
            return Value::String(s);
        }
        match self {
            Self::Literal(s) => Value::String(s.clone()),
            Self::Import(name) => import_value(name),
            Self::Token(v) => v.clone(),
            Self::Join(parts) => join(parts.iter().map(Self::to_template).collect()),
        }
    }
}

/// Declares resources and outputs into a [`Template`].
#[derive(Debug)]
pub struct TemplateBuilder {
    env: Environment,
    template: Template,
}

impl TemplateBuilder {
    pub fn new(env: Environment, description: Option<String>) -> Self {
        Self {
            env,
            template: Template {
                format_version: TEMPLATE_FORMAT_VERSION.to_string(),
                description,
                resources: IndexMap::new(),
                outputs: IndexMap::new(),
            },
        }
    }

    /// Declare a resource. `properties` must be a JSON object.
    pub fn declare(&mut self, logical_id: &str, kind: ResourceKind, properties: Value) -> Result<()> {
        self.declare_with_deps(logical_id, kind, properties, Vec::new())
    }

    /// Declare a resource with explicit `DependsOn` edges.
    pub fn declare_with_deps(
        &mut self,
        logical_id: &str,
        kind: ResourceKind,
        properties: Value,
        depends_on: Vec<String>,
    ) -> Result<()> {
        if self.template.resources.contains_key(logical_id) {
            return Err(StackError::DuplicateResource(logical_id.to_string()));
        }
        let mut properties = match properties {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(StackError::InvalidConfig(format!(
                    "properties of '{}' must be an object, got {}",
                    logical_id, other
                )))
            }
        };
        if kind.supports_tags() {
            let tag = name_tag(logical_id, self.env);
            properties.insert("Tags".to_string(), serde_json::to_value(vec![tag])?);
        }
        tracing::debug!(logical_id, kind = %kind, "declared resource");
        self.template.resources.insert(
            logical_id.to_string(),
            ResourceDecl {
                kind,
                properties,
                depends_on,
            },
        );
        Ok(())
    }

    /// Add an output, optionally exported.
    pub fn output(
        &mut self,
        logical_id: &str,
        value: Value,
        export_name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        if self.template.outputs.contains_key(logical_id) {
            return Err(StackError::DuplicateOutput(logical_id.to_string()));
        }
        self.template.outputs.insert(
            logical_id.to_string(),
            OutputDecl {
                description: description.map(str::to_string),
                value,
                export: export_name.map(|name| ExportDecl {
                    name: name.to_string(),
                }),
            },
        );
        Ok(())
    }

    pub fn build(self) -> Template {
        self.template
    }
}

/// Name tag value declared on a resource, if any.
pub fn declared_name_tag(decl: &ResourceDecl) -> Option<&str> {
    decl.properties
        .get("Tags")?
        .as_array()?
        .iter()
        .find(|t| t.get("Key").and_then(Value::as_str) == Some("Name"))?
        .get("Value")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsics() {
        assert_eq!(reference("Vpc"), json!({"Ref": "Vpc"}));
        assert_eq!(get_att("Role", "Arn"), json!({"Fn::GetAtt": ["Role", "Arn"]}));
        assert_eq!(import_value("X-Output"), json!({"Fn::ImportValue": "X-Output"}));
    }

    #[test]
    fn test_name_tag() {
        let tag = name_tag("IdrissVPC", Environment::Qa);
        assert_eq!(tag.key, "Name");
        assert_eq!(tag.value, "IdrissVPC_qa");
    }

    #[test]
    fn test_concat_literal_collapses() {
        let v = StackValue::literal("s3://bucket").concat("/models/m.tar.gz");
        assert_eq!(v, StackValue::literal("s3://bucket/models/m.tar.gz"));
        assert_eq!(v.to_template(), json!("s3://bucket/models/m.tar.gz"));
    }

    #[test]
    fn test_concat_import_joins() {
        let v = StackValue::Import("Uri-Output".into()).concat("/a").concat("/b");
        assert_eq!(v.as_literal(), None);
        assert_eq!(
            v.to_template(),
            json!({"Fn::Join": ["", [{"Fn::ImportValue": "Uri-Output"}, "/a/b"]]})
        );
    }

    #[test]
    fn test_join_of_literals_is_literal() {
        let v = StackValue::Join(vec![StackValue::literal("a"), StackValue::literal("b")]);
        assert_eq!(v.as_literal(), Some("ab".to_string()));
        assert_eq!(v.to_template(), json!("ab"));
    }

    #[test]
    fn test_builder_tags_taggable_only() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("Vpc", ResourceKind::Vpc, json!({"CidrBlock": "10.0.0.0/16"}))
            .unwrap();
        b.declare("Route", ResourceKind::Route, json!({"RouteTableId": reference("Rt")}))
            .unwrap();
        let t = b.build();
        assert_eq!(declared_name_tag(&t.resources["Vpc"]), Some("Vpc_dev"));
        assert!(t.resources["Route"].properties.get("Tags").is_none());
    }

    #[test]
    fn test_builder_rejects_duplicate() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("A", ResourceKind::Vpc, json!({})).unwrap();
        let err = b.declare("A", ResourceKind::Vpc, json!({})).unwrap_err();
        assert!(matches!(err, StackError::DuplicateResource(id) if id == "A"));
    }

    #[test]
    fn test_builder_rejects_duplicate_output() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.output("UriOutput", json!("s3://x"), None, None).unwrap();
        let err = b.output("UriOutput", json!("s3://y"), None, None).unwrap_err();
        assert!(matches!(err, StackError::DuplicateOutput(ref id) if id == "UriOutput"));
        assert!(err.to_string().contains("output"));
    }

    #[test]
    fn test_builder_rejects_non_object_properties() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        assert!(b.declare("A", ResourceKind::Vpc, json!([1, 2])).is_err());
    }

    #[test]
    fn test_output_export() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.output("UriOutput", json!("s3://x"), Some("P-S3-URI-Output"), None)
            .unwrap();
        let t = b.build();
        assert_eq!(t.outputs["UriOutput"].export.as_ref().unwrap().name, "P-S3-URI-Output");
    }
}
