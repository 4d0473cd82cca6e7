//! Dependency DAG construction and topological ordering.
//!
//! Inside a stack, edges come from `Ref`, `Fn::GetAtt` and explicit
//! `DependsOn`. Across stacks, a stack importing an export depends on the
//! stack publishing it. Both orders use Kahn's algorithm with deterministic
//! (alphabetical) tie-breaking.

use super::types::Template;
use crate::error::{Result, StackError};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

/// Logical ids referenced by `Ref` / `Fn::GetAtt` anywhere inside a value.
/// Pseudo parameters (`AWS::Region`, ...) are skipped.
pub fn references(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_references(value, &mut out);
    out.sort();
    out.dedup();
    out
}

fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    if !target.starts_with("AWS::") {
                        out.push(target.clone());
                    }
                    return;
                }
                match map.get("Fn::GetAtt") {
                    Some(Value::Array(parts)) => {
                        if let Some(Value::String(target)) = parts.first() {
                            out.push(target.clone());
                        }
                        return;
                    }
                    Some(Value::String(dotted)) => {
                        if let Some((target, _)) = dotted.split_once('.') {
                            out.push(target.to_string());
                        }
                        return;
                    }
                    _ => {}
                }
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}

/// Export names consumed through `Fn::ImportValue` inside a value.
pub fn imports(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_imports(value, &mut out);
    out.sort();
    out.dedup();
    out
}

fn collect_imports(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("Fn::ImportValue") {
                out.push(name.clone());
                return;
            }
            for v in map.values() {
                collect_imports(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_imports(v, out);
            }
        }
        _ => {}
    }
}

/// All imports of a template, resources and outputs included.
pub fn template_imports(template: &Template) -> Vec<String> {
    let mut out = Vec::new();
    for decl in template.resources.values() {
        for prop in decl.properties.values() {
            collect_imports(prop, &mut out);
        }
    }
    for output in template.outputs.values() {
        collect_imports(&output.value, &mut out);
    }
    out.sort();
    out.dedup();
    out
}

/// Build the provisioning order of a stack's resources.
pub fn build_resource_order(template: &Template) -> Result<Vec<String>> {
    let ids: Vec<String> = template.resources.keys().cloned().collect();
    let mut edges: Vec<(String, String)> = Vec::new();

    for (id, decl) in &template.resources {
        let mut deps: Vec<String> = decl.depends_on.clone();
        for prop in decl.properties.values() {
            deps.extend(references(prop));
        }
        deps.sort();
        deps.dedup();
        for dep in deps {
            if !template.resources.contains_key(&dep) {
                return Err(StackError::UnknownReference {
                    from: id.clone(),
                    target: dep,
                });
            }
            edges.push((dep, id.clone()));
        }
    }

    // Outputs may only point at declared resources
    for (id, output) in &template.outputs {
        for target in references(&output.value) {
            if !template.resources.contains_key(&target) {
                return Err(StackError::UnknownReference {
                    from: id.clone(),
                    target,
                });
            }
        }
    }

    topo_sort(&ids, &edges)
}

/// Stack-level dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StackGraph {
    /// Deployment order
    pub order: Vec<String>,
    /// (exporter, importer, export name)
    pub edges: Vec<(String, String, String)>,
    /// (importer, export name) with no exporter among the given stacks
    pub external_imports: Vec<(String, String)>,
}

/// Order stacks by their export/import edges.
pub fn build_stack_order(stacks: &[(&str, &Template)]) -> Result<StackGraph> {
    let mut exporters: HashMap<String, String> = HashMap::new();
    for (stack, template) in stacks {
        for output in template.outputs.values() {
            if let Some(export) = &output.export {
                if let Some(first) = exporters.insert(export.name.clone(), stack.to_string()) {
                    return Err(StackError::DuplicateExport {
                        name: export.name.clone(),
                        first,
                        second: stack.to_string(),
                    });
                }
            }
        }
    }

    let mut edges = Vec::new();
    let mut external_imports = Vec::new();
    for (stack, template) in stacks {
        for name in template_imports(template) {
            match exporters.get(&name) {
                Some(exporter) if exporter == stack => {
                    return Err(StackError::Validation(vec![format!(
                        "stack '{}' imports its own export '{}'",
                        stack, name
                    )]));
                }
                Some(exporter) => edges.push((exporter.clone(), stack.to_string(), name)),
                None => external_imports.push((stack.to_string(), name)),
            }
        }
    }

    let names: Vec<String> = stacks.iter().map(|(name, _)| name.to_string()).collect();
    let pairs: Vec<(String, String)> = edges
        .iter()
        .map(|(from, to, _)| (from.clone(), to.clone()))
        .collect();
    let order = topo_sort(&names, &pairs)?;

    Ok(StackGraph {
        order,
        edges,
        external_imports,
    })
}

/// Kahn's algorithm; `edges` are (dependency, dependent).
fn topo_sort(nodes: &[String], edges: &[(String, String)]) -> Result<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

    for id in nodes {
        in_degree.insert(id.as_str(), 0);
        adjacency.insert(id.as_str(), Vec::new());
    }

    for (dep, dependent) in edges {
        if let Some(neighbors) = adjacency.get_mut(dep.as_str()) {
            neighbors.push(dependent.as_str());
        }
        if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
            *degree += 1;
        }
    }

    // Sorted tie-breaking
    let mut zero_degree: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(id, _)| *id)
        .collect();
    zero_degree.sort();
    let mut queue: VecDeque<&str> = zero_degree.into_iter().collect();

    let mut order = Vec::new();
    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());

        let mut next_ready: Vec<&str> = Vec::new();
        if let Some(neighbors) = adjacency.get(current) {
            for neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        next_ready.push(*neighbor);
                    }
                }
            }
        }
        next_ready.sort();
        queue.extend(next_ready);
    }

    if order.len() != nodes.len() {
        let ordered: HashSet<&str> = order.iter().map(String::as_str).collect();
        let mut cycle_members: Vec<String> = nodes
            .iter()
            .filter(|id| !ordered.contains(id.as_str()))
            .cloned()
            .collect();
        cycle_members.sort();
        return Err(StackError::DependencyCycle(cycle_members));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::environment::Environment;
    use crate::core::template::{get_att, import_value, reference, TemplateBuilder};
    use crate::core::types::ResourceKind;
    use serde_json::json;

    #[test]
    fn test_references_ref_and_getatt() {
        let v = json!({
            "VpcId": {"Ref": "Vpc"},
            "Role": {"Fn::GetAtt": ["Role", "Arn"]},
            "Short": {"Fn::GetAtt": "Bucket.Arn"},
            "Region": {"Ref": "AWS::Region"},
            "Nested": [{"Fn::Join": ["", [{"Ref": "Subnet"}, "/x"]]}]
        });
        assert_eq!(references(&v), vec!["Bucket", "Role", "Subnet", "Vpc"]);
    }

    #[test]
    fn test_imports() {
        let v = json!({"Fn::Join": ["", [import_value("A-Output"), "/x", import_value("B-Output")]]});
        assert_eq!(imports(&v), vec!["A-Output", "B-Output"]);
    }

    #[test]
    fn test_resource_order_linear() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("c", ResourceKind::Endpoint, json!({"Cfg": get_att("b", "Name")}))
            .unwrap();
        b.declare("b", ResourceKind::EndpointConfig, json!({"Model": get_att("a", "Name")}))
            .unwrap();
        b.declare("a", ResourceKind::Model, json!({})).unwrap();
        let order = build_resource_order(&b.build()).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_resource_order_alphabetical_ties() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("beta", ResourceKind::Vpc, json!({})).unwrap();
        b.declare("alpha", ResourceKind::Vpc, json!({})).unwrap();
        let order = build_resource_order(&b.build()).unwrap();
        assert_eq!(order, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_resource_order_diamond_with_depends_on() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("top", ResourceKind::Vpc, json!({})).unwrap();
        b.declare("left", ResourceKind::Subnet, json!({"VpcId": reference("top")}))
            .unwrap();
        b.declare("right", ResourceKind::Subnet, json!({"VpcId": reference("top")}))
            .unwrap();
        b.declare_with_deps(
            "bottom",
            ResourceKind::Route,
            json!({}),
            vec!["left".into(), "right".into()],
        )
        .unwrap();
        let order = build_resource_order(&b.build()).unwrap();
        assert_eq!(order, vec!["top", "left", "right", "bottom"]);
    }

    #[test]
    fn test_resource_order_unknown_reference() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("a", ResourceKind::Subnet, json!({"VpcId": reference("ghost")}))
            .unwrap();
        let err = build_resource_order(&b.build()).unwrap_err();
        assert!(matches!(err, StackError::UnknownReference { target, .. } if target == "ghost"));
    }

    #[test]
    fn test_resource_order_output_unknown_reference() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("a", ResourceKind::Vpc, json!({})).unwrap();
        b.output("Out", get_att("missing", "Arn"), None, None).unwrap();
        assert!(build_resource_order(&b.build()).is_err());
    }

    #[test]
    fn test_resource_order_cycle() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("a", ResourceKind::Vpc, json!({"X": reference("b")})).unwrap();
        b.declare("b", ResourceKind::Vpc, json!({"X": reference("a")})).unwrap();
        let err = build_resource_order(&b.build()).unwrap_err();
        assert!(err.to_string().contains("cycle"));
        assert!(err.to_string().contains("a, b"));
    }

    fn exporter() -> Template {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("Bucket", ResourceKind::Bucket, json!({})).unwrap();
        b.output("UriOut", json!("s3://b"), Some("P-S3-URI-Output"), None)
            .unwrap();
        b.build()
    }

    fn importer() -> Template {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare(
            "Model",
            ResourceKind::Model,
            json!({"Url": import_value("P-S3-URI-Output"), "Role": import_value("Elsewhere")}),
        )
        .unwrap();
        b.build()
    }

    #[test]
    fn test_stack_order_exporter_first() {
        let (e, i) = (exporter(), importer());
        // Alphabetically "Alpha" would come first; the import edge wins
        let graph = build_stack_order(&[("Alpha", &i), ("Zulu", &e)]).unwrap();
        assert_eq!(graph.order, vec!["Zulu", "Alpha"]);
        assert_eq!(
            graph.edges,
            vec![("Zulu".into(), "Alpha".into(), "P-S3-URI-Output".into())]
        );
        assert_eq!(graph.external_imports, vec![("Alpha".into(), "Elsewhere".into())]);
    }

    #[test]
    fn test_stack_order_duplicate_export() {
        let (a, b) = (exporter(), exporter());
        let err = build_stack_order(&[("A", &a), ("B", &b)]).unwrap_err();
        assert!(matches!(err, StackError::DuplicateExport { .. }));
    }

    #[test]
    fn test_stack_order_self_import() {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("M", ResourceKind::Model, json!({"U": import_value("Self-Out")}))
            .unwrap();
        b.output("O", json!("x"), Some("Self-Out"), None).unwrap();
        let t = b.build();
        assert!(build_stack_order(&[("S", &t)]).is_err());
    }
}
