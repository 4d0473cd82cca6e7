//! Project configuration, template, lock, plan and provenance types.
//!
//! Everything that is read from or written to disk derives
//! Serialize/Deserialize. Template types use the provider's PascalCase keys.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Top-level stackwright.yaml
// ============================================================================

/// Project configuration. Every field has a default, so an absent or empty
/// file describes the reference deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Schema version (must be "1.0")
    #[serde(default = "default_version")]
    pub version: String,

    /// Alphanumeric prefix for logical ids, resource names and export names
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Optional description copied into each template
    #[serde(default)]
    pub description: Option<String>,

    /// Provider region
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket name stem; the environment tag is appended
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,

    /// Model artifact file stem under `models/`
    #[serde(default = "default_model_artifact_prefix")]
    pub model_artifact_prefix: String,

    /// Serving container image
    #[serde(default = "default_image")]
    pub image: String,

    /// Endpoint instance type
    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    /// Endpoint instance count
    #[serde(default = "default_instance_count")]
    pub instance_count: u32,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub stacks: StackNames,

    /// Declare the Studio domain and user profile
    #[serde(default = "default_true")]
    pub studio: bool,

    /// Reproduce the wide-open bucket policy (any principal, any action,
    /// public access block disabled)
    #[serde(default)]
    pub public_bucket: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            prefix: default_prefix(),
            description: None,
            region: default_region(),
            bucket_prefix: default_bucket_prefix(),
            model_artifact_prefix: default_model_artifact_prefix(),
            image: default_image(),
            instance_type: default_instance_type(),
            instance_count: default_instance_count(),
            network: NetworkConfig::default(),
            stacks: StackNames::default(),
            studio: true,
            public_bucket: false,
        }
    }
}

/// Address plan for the foundation network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_vpc_cidr")]
    pub vpc_cidr: String,

    /// One subnet per availability zone, suffixed a, b, ...
    #[serde(default = "default_subnet_cidrs")]
    pub subnet_cidrs: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vpc_cidr: default_vpc_cidr(),
            subnet_cidrs: default_subnet_cidrs(),
        }
    }
}

/// Stack names as registered with the provisioning engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackNames {
    #[serde(default = "default_foundation_name")]
    pub foundation: String,

    #[serde(default = "default_workload_name")]
    pub workload: String,
}

impl Default for StackNames {
    fn default() -> Self {
        Self {
            foundation: default_foundation_name(),
            workload: default_workload_name(),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_prefix() -> String {
    "Idriss".to_string()
}

fn default_region() -> String {
    "eu-central-1".to_string()
}

fn default_bucket_prefix() -> String {
    "idriss-s3-bucket-swisscom-challenge".to_string()
}

fn default_model_artifact_prefix() -> String {
    "idriss-model".to_string()
}

fn default_image() -> String {
    "605134434340.dkr.ecr.eu-central-1.amazonaws.com/cdk-hnb659fds-container-assets-605134434340-eu-central-1:latest"
        .to_string()
}

fn default_instance_type() -> String {
    "ml.t2.medium".to_string()
}

fn default_instance_count() -> u32 {
    1
}

fn default_vpc_cidr() -> String {
    "172.30.255.0/24".to_string()
}

fn default_subnet_cidrs() -> Vec<String> {
    vec!["172.30.255.0/25".to_string(), "172.30.255.128/25".to_string()]
}

fn default_foundation_name() -> String {
    "InfraStack".to_string()
}

fn default_workload_name() -> String {
    "ModelStack".to_string()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Templates
// ============================================================================

/// Provider template format version.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A synthesized stack template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Resource declarations (order-preserving)
    #[serde(rename = "Resources")]
    pub resources: IndexMap<String, ResourceDecl>,

    #[serde(rename = "Outputs", default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, OutputDecl>,
}

/// A single resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDecl {
    #[serde(rename = "Type")]
    pub kind: ResourceKind,

    #[serde(rename = "Properties", default)]
    pub properties: serde_json::Map<String, serde_json::Value>,

    /// Explicit ordering edges not implied by property references
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Resource types this crate declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "AWS::EC2::VPC")]
    Vpc,
    #[serde(rename = "AWS::EC2::Subnet")]
    Subnet,
    #[serde(rename = "AWS::EC2::NetworkAcl")]
    NetworkAcl,
    #[serde(rename = "AWS::EC2::NetworkAclEntry")]
    NetworkAclEntry,
    #[serde(rename = "AWS::EC2::SubnetNetworkAclAssociation")]
    SubnetNetworkAclAssociation,
    #[serde(rename = "AWS::EC2::InternetGateway")]
    InternetGateway,
    #[serde(rename = "AWS::EC2::VPCGatewayAttachment")]
    VpcGatewayAttachment,
    #[serde(rename = "AWS::EC2::RouteTable")]
    RouteTable,
    #[serde(rename = "AWS::EC2::Route")]
    Route,
    #[serde(rename = "AWS::EC2::SubnetRouteTableAssociation")]
    SubnetRouteTableAssociation,
    #[serde(rename = "AWS::EC2::DHCPOptions")]
    DhcpOptions,
    #[serde(rename = "AWS::EC2::VPCEndpoint")]
    VpcEndpoint,
    #[serde(rename = "AWS::EC2::SecurityGroup")]
    SecurityGroup,
    #[serde(rename = "AWS::EC2::SecurityGroupIngress")]
    SecurityGroupIngress,
    #[serde(rename = "AWS::S3::Bucket")]
    Bucket,
    #[serde(rename = "AWS::S3::BucketPolicy")]
    BucketPolicy,
    #[serde(rename = "AWS::IAM::Role")]
    Role,
    #[serde(rename = "AWS::SageMaker::Domain")]
    StudioDomain,
    #[serde(rename = "AWS::SageMaker::UserProfile")]
    UserProfile,
    #[serde(rename = "AWS::SageMaker::Model")]
    Model,
    #[serde(rename = "AWS::SageMaker::EndpointConfig")]
    EndpointConfig,
    #[serde(rename = "AWS::SageMaker::Endpoint")]
    Endpoint,
}

impl ResourceKind {
    /// Provider type string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Vpc => "AWS::EC2::VPC",
            Self::Subnet => "AWS::EC2::Subnet",
            Self::NetworkAcl => "AWS::EC2::NetworkAcl",
            Self::NetworkAclEntry => "AWS::EC2::NetworkAclEntry",
            Self::SubnetNetworkAclAssociation => "AWS::EC2::SubnetNetworkAclAssociation",
            Self::InternetGateway => "AWS::EC2::InternetGateway",
            Self::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            Self::RouteTable => "AWS::EC2::RouteTable",
            Self::Route => "AWS::EC2::Route",
            Self::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            Self::DhcpOptions => "AWS::EC2::DHCPOptions",
            Self::VpcEndpoint => "AWS::EC2::VPCEndpoint",
            Self::SecurityGroup => "AWS::EC2::SecurityGroup",
            Self::SecurityGroupIngress => "AWS::EC2::SecurityGroupIngress",
            Self::Bucket => "AWS::S3::Bucket",
            Self::BucketPolicy => "AWS::S3::BucketPolicy",
            Self::Role => "AWS::IAM::Role",
            Self::StudioDomain => "AWS::SageMaker::Domain",
            Self::UserProfile => "AWS::SageMaker::UserProfile",
            Self::Model => "AWS::SageMaker::Model",
            Self::EndpointConfig => "AWS::SageMaker::EndpointConfig",
            Self::Endpoint => "AWS::SageMaker::Endpoint",
        }
    }

    /// Whether the provider accepts a `Tags` property on this type.
    pub fn supports_tags(&self) -> bool {
        !matches!(
            self,
            Self::NetworkAclEntry
                | Self::SubnetNetworkAclAssociation
                | Self::VpcGatewayAttachment
                | Self::Route
                | Self::SubnetRouteTableAssociation
                | Self::SecurityGroupIngress
                | Self::BucketPolicy
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A template output, optionally exported under a stable name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDecl {
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "Value")]
    pub value: serde_json::Value,

    #[serde(rename = "Export", default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDecl {
    #[serde(rename = "Name")]
    pub name: String,
}

/// Resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Role a stack plays in the composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackRole {
    /// Shared network, IAM and storage; publishes exports
    Foundation,
    /// Model hosting; imports the foundation exports
    Workload,
}

impl fmt::Display for StackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Foundation => write!(f, "foundation"),
            Self::Workload => write!(f, "workload"),
        }
    }
}

/// A stack after synthesis, with its resources in provisioning order.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedStack {
    pub name: String,
    pub role: StackRole,
    pub template: Template,
    pub resource_order: Vec<String>,
}

// ============================================================================
// State / Lock file
// ============================================================================

/// Per-stack lock file, written after every synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLock {
    /// Schema version
    pub schema: String,

    /// Stack name
    pub stack: String,

    /// Environment tag the stack was synthesized for
    pub environment: String,

    /// When the lock was generated
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// BLAKE3 version
    pub blake3_version: String,

    /// Written template file, if any
    #[serde(default)]
    pub template: Option<TemplateLock>,

    /// Per-resource declaration hashes, in topological order
    pub resources: IndexMap<String, ResourceLock>,

    /// Exports this stack publishes (name → value)
    #[serde(default)]
    pub exports: IndexMap<String, String>,
}

/// Template file written for a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLock {
    pub path: String,
    pub hash: String,
}

/// Per-resource lock entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLock {
    #[serde(rename = "type")]
    pub resource_type: ResourceKind,

    /// BLAKE3 hash of the canonical declaration
    pub hash: String,
}

// ============================================================================
// Plan
// ============================================================================

/// Action the provisioning engine would take on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Delete,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::NoOp => write!(f, "NO-OP"),
        }
    }
}

/// A single planned change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub stack: String,
    pub resource_id: String,
    pub resource_type: ResourceKind,
    pub action: PlanAction,
    pub description: String,
}

/// Full plan across stacks.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub environment: String,

    /// Changes in stack order, then resource order
    pub changes: Vec<PlannedChange>,

    /// Stack deployment order
    pub stack_order: Vec<String>,

    pub to_create: u32,
    pub to_update: u32,
    pub to_delete: u32,
    pub unchanged: u32,
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    SynthStarted {
        stack: String,
        run_id: String,
        environment: String,
        stackwright_version: String,
    },
    StackSynthesized {
        stack: String,
        resources: u32,
        outputs: u32,
        template_hash: String,
    },
    SynthCompleted {
        stack: String,
        run_id: String,
        total_seconds: f64,
    },
    DriftDetected {
        stack: String,
        path: String,
        expected_hash: String,
        actual_hash: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_defaults_from_empty_yaml() {
        let config: ProjectConfig = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.prefix, "Idriss");
        assert_eq!(config.region, "eu-central-1");
        assert_eq!(config.network.subnet_cidrs.len(), 2);
        assert_eq!(config.stacks.foundation, "InfraStack");
        assert_eq!(config.stacks.workload, "ModelStack");
        assert!(config.studio);
        assert!(!config.public_bucket);
    }

    #[test]
    fn test_project_partial_override() {
        let yaml = r#"
prefix: Acme
instance_count: 2
network:
  vpc_cidr: 10.0.0.0/16
"#;
        let config: ProjectConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.prefix, "Acme");
        assert_eq!(config.instance_count, 2);
        assert_eq!(config.network.vpc_cidr, "10.0.0.0/16");
        // Untouched nested defaults survive
        assert_eq!(config.network.subnet_cidrs[0], "172.30.255.0/25");
        assert_eq!(config.instance_type, "ml.t2.medium");
    }

    #[test]
    fn test_resource_kind_serializes_as_type_name() {
        let json = serde_json::to_string(&ResourceKind::VpcEndpoint).unwrap();
        assert_eq!(json, "\"AWS::EC2::VPCEndpoint\"");
        assert_eq!(ResourceKind::VpcEndpoint.to_string(), "AWS::EC2::VPCEndpoint");
        let back: ResourceKind = serde_json::from_str("\"AWS::SageMaker::Endpoint\"").unwrap();
        assert_eq!(back, ResourceKind::Endpoint);
    }

    #[test]
    fn test_supports_tags() {
        assert!(ResourceKind::Vpc.supports_tags());
        assert!(ResourceKind::Endpoint.supports_tags());
        assert!(!ResourceKind::Route.supports_tags());
        assert!(!ResourceKind::BucketPolicy.supports_tags());
    }

    #[test]
    fn test_template_skips_empty_outputs() {
        let template = Template {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
        };
        let json = serde_json::to_value(&template).unwrap();
        assert!(json.get("Outputs").is_none());
        assert!(json.get("Description").is_none());
        assert_eq!(json["AWSTemplateFormatVersion"], "2010-09-09");
    }

    #[test]
    fn test_plan_action_display() {
        assert_eq!(PlanAction::Create.to_string(), "CREATE");
        assert_eq!(PlanAction::NoOp.to_string(), "NO-OP");
    }

    #[test]
    fn test_provenance_event_serde() {
        let event = ProvenanceEvent::SynthStarted {
            stack: "InfraStack".to_string(),
            run_id: "r-abc".to_string(),
            environment: "qa".to_string(),
            stackwright_version: "0.3.0".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"synth_started\""));
        assert!(json.contains("\"run_id\":\"r-abc\""));
    }
}
