//! Tests for the server creation payload.

use serde_json::Value;

use crate::backend::{NetworkPlacement, ResourceSpec};
use crate::scaleway::authorized_key_tag;

use super::super::create::CreateServerRequest;

fn payload(spec: &ResourceSpec) -> Value {
    serde_json::to_value(CreateServerRequest::from_spec(spec, "img-1")).expect("serialise payload")
}

#[test]
fn payload_carries_machine_class_image_and_root_volume() {
    let spec = super::base_spec();
    let json = payload(&spec);

    assert_eq!(json["commercial_type"], "POP2-HC-16C-32G");
    assert_eq!(json["image"], "img-1");
    assert_eq!(json["project"], "proj");
    assert_eq!(json["volumes"]["0"]["size"], 200_000_000_000_u64);
    assert_eq!(json["volumes"]["0"]["volume_type"], "sbs_volume");
    assert!(
        json["name"]
            .as_str()
            .is_some_and(|name| name.starts_with("benchferry-"))
    );
    assert!(json.get("security_group").is_none());
    assert!(json.get("organization").is_none());
}

#[test]
fn payload_includes_security_group_and_authorised_key() {
    let spec = ResourceSpec {
        credential_ref: Some(String::from("ssh-ed25519 AAAA bench@host")),
        network: NetworkPlacement {
            subnet_id: None,
            security_group_id: Some(String::from("sg-1")),
        },
        ..super::base_spec()
    };
    let json = payload(&spec);

    assert_eq!(json["security_group"], "sg-1");
    let tags: Vec<&str> = json["tags"]
        .as_array()
        .expect("tags array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(
        tags,
        [
            "benchferry",
            "ephemeral",
            "AUTHORIZED_KEY=ssh-ed25519_AAAA_bench@host"
        ]
    );
}

#[test]
fn authorised_key_tag_collapses_whitespace() {
    assert_eq!(
        authorized_key_tag("  ssh-rsa   AAAAB3\tuser@laptop \n"),
        "AUTHORIZED_KEY=ssh-rsa_AAAAB3_user@laptop"
    );
}
