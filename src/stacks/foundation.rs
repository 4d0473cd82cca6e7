//! Foundation stack: network, IAM, storage and the Studio domain.
//!
//! Publishes the storage URI and the execution role ARN under the names the
//! [`ExportContract`] defines.

use super::Synthesized;
use crate::core::environment::Settings;
use crate::core::exports::{ExportContract, FoundationOutputs};
use crate::core::template::{get_att, reference, StackValue, TemplateBuilder};
use crate::core::types::ResourceKind;
use crate::error::Result;
use serde_json::{json, Value};

const ANYWHERE: &str = "0.0.0.0/0";

const MANAGED_POLICIES: [&str; 2] = [
    "arn:aws:iam::aws:policy/AmazonS3FullAccess",
    "arn:aws:iam::aws:policy/AmazonSageMakerFullAccess",
];

/// Interface endpoints placed in every subnet: (logical id suffix, service).
const INTERFACE_ENDPOINTS: [(&str, &str); 3] = [
    ("SageMakerAPIEndpoint", "sagemaker.api"),
    ("SageMakerRuntimeEndpoint", "sagemaker.runtime"),
    ("STSEndpoint", "sts"),
];

/// Declares the shared infrastructure every workload depends on.
#[derive(Debug, Clone)]
pub struct FoundationStack {
    settings: Settings,
    contract: ExportContract,
}

impl FoundationStack {
    pub fn new(settings: Settings) -> Self {
        let contract = ExportContract::new(settings.project.prefix.clone());
        Self { settings, contract }
    }

    /// `<bucket_prefix>-<env>`
    pub fn bucket_name(&self) -> String {
        format!(
            "{}-{}",
            self.settings.project.bucket_prefix, self.settings.environment
        )
    }

    fn id(&self, suffix: &str) -> String {
        format!("{}{}", self.settings.project.prefix, suffix)
    }

    pub fn synth(&self) -> Result<Synthesized<FoundationOutputs>> {
        let project = &self.settings.project;
        let mut b = TemplateBuilder::new(self.settings.environment, project.description.clone());

        let vpc = self.declare_network(&mut b)?;
        let role = self.declare_storage_and_iam(&mut b)?;

        if project.studio {
            self.declare_studio(&mut b, &vpc, &role)?;
        }

        let outputs = FoundationOutputs {
            storage_uri: StackValue::literal(format!("s3://{}", self.bucket_name())),
            execution_role_arn: StackValue::Token(get_att(&role, "Arn")),
        };

        b.output(
            &self.contract.storage_uri_output_id(),
            outputs.storage_uri.to_template(),
            Some(&self.contract.storage_uri()),
            Some("URI of the model artifact bucket"),
        )?;
        b.output(
            &self.contract.execution_role_arn_output_id(),
            outputs.execution_role_arn.to_template(),
            Some(&self.contract.execution_role_arn()),
            Some("ARN of the hosting execution role"),
        )?;

        let template = b.build();
        tracing::info!(
            environment = %self.settings.environment,
            resources = template.resources.len(),
            "synthesized foundation stack"
        );
        Ok(Synthesized { template, outputs })
    }

    /// VPC, subnets, ACL, gateway, routing, DHCP, endpoints and security
    /// group. Returns the VPC logical id.
    fn declare_network(&self, b: &mut TemplateBuilder) -> Result<String> {
        let project = &self.settings.project;
        let region = &project.region;

        let vpc = self.id("VPC");
        b.declare(
            &vpc,
            ResourceKind::Vpc,
            json!({
                "CidrBlock": project.network.vpc_cidr,
                "EnableDnsSupport": true,
                "EnableDnsHostnames": true,
            }),
        )?;

        let mut subnets = Vec::new();
        for (i, (cidr, zone)) in project
            .network
            .subnet_cidrs
            .iter()
            .zip('a'..='z')
            .enumerate()
        {
            let subnet = self.id(&format!("Subnet{}", i + 1));
            b.declare(
                &subnet,
                ResourceKind::Subnet,
                json!({
                    "VpcId": reference(&vpc),
                    "CidrBlock": cidr,
                    "AvailabilityZone": format!("{}{}", region, zone),
                    "MapPublicIpOnLaunch": true,
                }),
            )?;
            subnets.push(subnet);
        }
        let subnet_refs: Vec<Value> = subnets.iter().map(|s| reference(s)).collect();

        let acl = self.id("NetworkACL");
        b.declare(&acl, ResourceKind::NetworkAcl, json!({ "VpcId": reference(&vpc) }))?;
        for (suffix, egress) in [("InboundAllowAll", false), ("OutboundAllowAll", true)] {
            b.declare(
                &self.id(suffix),
                ResourceKind::NetworkAclEntry,
                json!({
                    "NetworkAclId": reference(&acl),
                    "RuleNumber": 100,
                    "Protocol": -1,
                    "RuleAction": "allow",
                    "Egress": egress,
                    "CidrBlock": ANYWHERE,
                }),
            )?;
        }
        for (i, subnet) in subnets.iter().enumerate() {
            b.declare(
                &self.id(&format!("Subnet{}NetworkACLAssociation", i + 1)),
                ResourceKind::SubnetNetworkAclAssociation,
                json!({
                    "SubnetId": reference(subnet),
                    "NetworkAclId": reference(&acl),
                }),
            )?;
        }

        let igw = self.id("InternetGateway");
        b.declare(&igw, ResourceKind::InternetGateway, json!({}))?;
        let attachment = self.id("VPCGatewayAttachment");
        b.declare(
            &attachment,
            ResourceKind::VpcGatewayAttachment,
            json!({
                "VpcId": reference(&vpc),
                "InternetGatewayId": reference(&igw),
            }),
        )?;

        let route_table = self.id("RouteTable");
        b.declare(&route_table, ResourceKind::RouteTable, json!({ "VpcId": reference(&vpc) }))?;
        // A gateway route fails until the gateway is attached to the VPC
        b.declare_with_deps(
            &self.id("InternetRoute"),
            ResourceKind::Route,
            json!({
                "RouteTableId": reference(&route_table),
                "DestinationCidrBlock": ANYWHERE,
                "GatewayId": reference(&igw),
            }),
            vec![attachment],
        )?;
        for (i, subnet) in subnets.iter().enumerate() {
            b.declare(
                &self.id(&format!("Subnet{}RouteTableAssociation", i + 1)),
                ResourceKind::SubnetRouteTableAssociation,
                json!({
                    "SubnetId": reference(subnet),
                    "RouteTableId": reference(&route_table),
                }),
            )?;
        }

        b.declare(
            &self.id("DHCPOptions"),
            ResourceKind::DhcpOptions,
            json!({
                "DomainName": format!("{}.compute.internal", region),
                "DomainNameServers": ["AmazonProvidedDNS"],
            }),
        )?;

        for (suffix, service) in INTERFACE_ENDPOINTS {
            b.declare(
                &self.id(suffix),
                ResourceKind::VpcEndpoint,
                json!({
                    "VpcId": reference(&vpc),
                    "ServiceName": format!("com.amazonaws.{}.{}", region, service),
                    "VpcEndpointType": "Interface",
                    "SubnetIds": subnet_refs,
                    "PrivateDnsEnabled": true,
                }),
            )?;
        }
        b.declare(
            &self.id("S3GatewayEndpoint"),
            ResourceKind::VpcEndpoint,
            json!({
                "VpcId": reference(&vpc),
                "ServiceName": format!("com.amazonaws.{}.s3", region),
                "VpcEndpointType": "Gateway",
                "RouteTableIds": [reference(&route_table)],
            }),
        )?;

        let nsg = self.id("NSG");
        b.declare(
            &nsg,
            ResourceKind::SecurityGroup,
            json!({
                "GroupDescription": "Allow all access",
                "VpcId": reference(&vpc),
            }),
        )?;
        b.declare(
            &self.id("AllowAll"),
            ResourceKind::SecurityGroupIngress,
            json!({
                "GroupId": reference(&nsg),
                "IpProtocol": "tcp",
                "FromPort": 0,
                "ToPort": 65535,
                "CidrIp": ANYWHERE,
                "Description": "Allow all inbound",
            }),
        )?;

        Ok(vpc)
    }

    /// Bucket, bucket policy and execution role. Returns the role logical id.
    fn declare_storage_and_iam(&self, b: &mut TemplateBuilder) -> Result<String> {
        let public = self.settings.project.public_bucket;
        let role = self.id("ExecutionRole");
        b.declare(
            &role,
            ResourceKind::Role,
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "sagemaker.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                },
                "ManagedPolicyArns": MANAGED_POLICIES,
            }),
        )?;

        let bucket = self.id("S3Bucket");
        let block = !public;
        b.declare(
            &bucket,
            ResourceKind::Bucket,
            json!({
                "BucketName": self.bucket_name(),
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": block,
                    "BlockPublicPolicy": block,
                    "IgnorePublicAcls": block,
                    "RestrictPublicBuckets": block,
                },
            }),
        )?;

        let bucket_arn = StackValue::Token(get_att(&bucket, "Arn"));
        let resources = json!([
            bucket_arn.to_template(),
            bucket_arn.clone().concat("/*").to_template(),
        ]);
        let statement = if public {
            tracing::warn!(
                bucket = %self.bucket_name(),
                "public_bucket is set: bucket policy allows any principal every action"
            );
            json!({
                "Effect": "Allow",
                "Principal": "*",
                "Action": "s3:*",
                "Resource": resources,
            })
        } else {
            json!({
                "Effect": "Allow",
                "Principal": { "AWS": get_att(&role, "Arn") },
                "Action": ["s3:GetObject", "s3:PutObject", "s3:ListBucket"],
                "Resource": resources,
            })
        };
        b.declare(
            &self.id("S3BucketPolicy"),
            ResourceKind::BucketPolicy,
            json!({
                "Bucket": reference(&bucket),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [statement],
                },
            }),
        )?;

        Ok(role)
    }

    fn declare_studio(&self, b: &mut TemplateBuilder, vpc: &str, role: &str) -> Result<()> {
        let prefix = &self.settings.project.prefix;
        let subnet_refs: Vec<Value> = (1..=self.settings.project.network.subnet_cidrs.len())
            .map(|i| reference(&self.id(&format!("Subnet{}", i))))
            .collect();

        let domain = self.id("SagemakerStudioDomain");
        b.declare(
            &domain,
            ResourceKind::StudioDomain,
            json!({
                "AuthMode": "IAM",
                "DomainName": format!("{}-SagemakerStudio-Domain", prefix),
                "DefaultUserSettings": {
                    "ExecutionRole": get_att(role, "Arn"),
                    "JupyterServerAppSettings": {
                        "DefaultResourceSpec": { "InstanceType": "system" },
                    },
                },
                "SubnetIds": subnet_refs,
                "VpcId": reference(vpc),
                "AppNetworkAccessType": "VpcOnly",
                "TagPropagation": "ENABLED",
            }),
        )?;
        b.declare(
            &self.id("UserProfile"),
            ResourceKind::UserProfile,
            json!({
                "DomainId": get_att(&domain, "DomainId"),
                "UserProfileName": format!("{}-User", prefix),
                "UserSettings": { "ExecutionRole": get_att(role, "Arn") },
            }),
        )?;
        Ok(())
    }
}
