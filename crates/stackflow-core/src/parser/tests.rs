use super::*;
use serde_json::json;
use stackflow_engine::{InputValue, Reference};

#[test]
fn test_parse_simple_resource() {
    let kdl = r#"
        resource "my-key" type="ssh_key" {
            name "deployment-key"
            public_key "ssh-ed25519 AAAA"
        }
    "#;

    let stack = parse_stack_string(kdl, "test".to_string()).unwrap();
    assert_eq!(stack.name, "test");
    assert_eq!(stack.declarations.len(), 1);

    let key = stack.declaration("my-key").unwrap();
    assert_eq!(key.resource_type, "ssh_key");
    assert_eq!(
        key.inputs["name"],
        InputValue::Literal(json!("deployment-key"))
    );
}

#[test]
fn test_parse_stack_name() {
    let kdl = r#"
        stack "production"
    "#;

    let stack = parse_stack_string(kdl, "fallback".to_string()).unwrap();
    assert_eq!(stack.name, "production");
    assert!(stack.declarations.is_empty());
}

#[test]
fn test_parse_literal_shapes() {
    let kdl = r#"
        resource "web" type="vps" {
            cpu_cores 2
            memory_gb 4.5
            enable_backups #true
            description #null
            allowed_ports 22 80 443
            tags {
                env "production"
                tier "web"
            }
        }
    "#;

    let stack = parse_stack_string(kdl, "test".to_string()).unwrap();
    let web = stack.declaration("web").unwrap();

    assert_eq!(web.inputs["cpu_cores"], InputValue::Literal(json!(2)));
    assert_eq!(web.inputs["memory_gb"], InputValue::Literal(json!(4.5)));
    assert_eq!(web.inputs["enable_backups"], InputValue::Literal(json!(true)));
    assert_eq!(web.inputs["description"], InputValue::Literal(json!(null)));
    assert_eq!(
        web.inputs["allowed_ports"],
        InputValue::Literal(json!([22, 80, 443]))
    );
    assert_eq!(
        web.inputs["tags"],
        InputValue::Literal(json!({"env": "production", "tier": "web"}))
    );
}

#[test]
fn test_parse_reference() {
    let kdl = r#"
        resource "web-server" type="vps" {
            image "ubuntu-24.04"
            ssh_key_id ref="my-key.id"
        }
    "#;

    let stack = parse_stack_string(kdl, "test".to_string()).unwrap();
    let web = stack.declaration("web-server").unwrap();
    assert_eq!(
        web.inputs["ssh_key_id"],
        InputValue::Reference(Reference::new("my-key", "id"))
    );
}

#[test]
fn test_parse_invalid_reference_error() {
    let kdl = r#"
        resource "web" type="vps" {
            ssh_key_id ref="my-key"
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    match err {
        StackError::InvalidReference { context, reference } => {
            assert_eq!(context, "web.ssh_key_id");
            assert_eq!(reference, "my-key");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_parse_nested_reference_error() {
    let kdl = r#"
        resource "web" type="vps" {
            network {
                firewall_id ref="fw.id"
            }
        }
    "#;

    let result = parse_stack_string(kdl, "test".to_string());
    assert!(matches!(result, Err(StackError::InvalidConfig(_))));
}

#[test]
fn test_parse_resource_without_type_error() {
    let kdl = r#"
        resource "web" {
            image "ubuntu-24.04"
        }
    "#;

    let result = parse_stack_string(kdl, "test".to_string());
    assert!(matches!(result, Err(StackError::InvalidConfig(_))));
}

#[test]
fn test_parse_duplicate_property_error() {
    let kdl = r#"
        resource "web" type="vps" {
            image "ubuntu-24.04"
            image "debian-12"
        }
    "#;

    let result = parse_stack_string(kdl, "test".to_string());
    assert!(matches!(result, Err(StackError::InvalidConfig(_))));
}

#[test]
fn test_parse_schema() {
    let kdl = r#"
        schema "cache" {
            outputs "endpoint" "port"
        }
        schema "cache" {
            outputs "id"
        }
    "#;

    let stack = parse_stack_string(kdl, "test".to_string()).unwrap();
    let outputs = stack.schema.outputs_of("cache").unwrap();
    assert_eq!(outputs.len(), 3);
    assert!(outputs.contains("endpoint"));
    assert!(outputs.contains("id"));
}

#[test]
fn test_parse_exports() {
    let kdl = r#"
        export "vps_public_ip" ref="web-server.public_ip"
        export "cache_port" ref="session-cache.port"
    "#;

    let stack = parse_stack_string(kdl, "test".to_string()).unwrap();
    assert_eq!(stack.exports.len(), 2);
    assert_eq!(
        stack.export("vps_public_ip").unwrap().reference,
        Reference::new("web-server", "public_ip")
    );
}

#[test]
fn test_parse_duplicate_export_error() {
    let kdl = r#"
        export "ip" ref="web.public_ip"
        export "ip" ref="db.endpoint"
    "#;

    let result = parse_stack_string(kdl, "test".to_string());
    assert!(matches!(result, Err(StackError::DuplicateExport(name)) if name == "ip"));
}

#[test]
fn test_parse_keeps_declaration_order() {
    let kdl = r#"
        resource "c" type="cache"
        resource "a" type="vps"
        resource "b" type="database"
    "#;

    let stack = parse_stack_string(kdl, "test".to_string()).unwrap();
    let names: Vec<_> = stack
        .declarations
        .iter()
        .map(|d| d.logical_name.as_str())
        .collect();
    assert_eq!(names, vec!["c", "a", "b"]);
}

#[test]
fn test_parse_ignores_unknown_nodes() {
    let kdl = r#"
        comment "not part of the stack"
        resource "a" type="vps"
    "#;

    let stack = parse_stack_string(kdl, "test".to_string()).unwrap();
    assert_eq!(stack.declarations.len(), 1);
}

#[test]
fn test_parse_syntax_error() {
    let result = parse_stack_string("resource \"a\" {", "test".to_string());
    assert!(matches!(result, Err(StackError::KdlParse(_))));
}

#[test]
fn test_parse_argument_with_child_block_error() {
    let kdl = r#"
        resource "db" type="database" {
            settings "primary" {
                replicas 2
            }
        }
    "#;

    let result = parse_stack_string(kdl, "test".to_string());
    assert!(matches!(result, Err(StackError::InvalidConfig(_))));
}

#[test]
fn test_parse_reference_with_value_error() {
    let kdl = r#"
        resource "web" type="vps" {
            ssh_key_id "key-1" ref="my-key.id"
        }
    "#;

    let result = parse_stack_string(kdl, "test".to_string());
    assert!(matches!(result, Err(StackError::InvalidConfig(_))));
}
