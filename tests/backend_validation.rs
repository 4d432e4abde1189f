//! Unit tests for resource spec construction and validation.

#[path = "common/test_constants.rs"]
mod test_constants;

use test_constants::CPU_INSTANCE_TYPE;

use benchferry::{BackendError, ResourceSpec, ResourceSpecBuilder};
use rstest::rstest;

fn base_builder() -> ResourceSpecBuilder {
    ResourceSpec::builder()
        .image_label("Ubuntu 22.04 Jammy Jellyfish")
        .machine_class(CPU_INSTANCE_TYPE)
        .zone("fr-par-2")
        .project_id("project-id")
        .architecture("x86_64")
        .storage(200, "sbs_volume")
}

#[test]
fn validate_rejects_empty_builder() {
    let error = ResourceSpec::builder()
        .build()
        .expect_err("validation should fail");
    assert_eq!(error, BackendError::Validation(String::from("image_label")));
}

#[rstest]
#[case(base_builder().image_label("  "), "image_label")]
#[case(base_builder().machine_class(""), "machine_class")]
#[case(base_builder().zone(" "), "zone")]
#[case(base_builder().project_id(""), "project_id")]
#[case(base_builder().architecture(""), "architecture")]
#[case(base_builder().storage(200, " "), "storage.volume_type")]
#[case(base_builder().storage(0, "sbs_volume"), "storage.size_gb")]
#[case(base_builder().security_group_id(Some(String::new())), "network.security_group_id")]
#[case(base_builder().credential_ref(Some(String::from("\n"))), "credential_ref")]
fn validate_names_the_missing_field(#[case] builder: ResourceSpecBuilder, #[case] field: &str) {
    let error = builder.build().expect_err("validation should fail");
    assert_eq!(error, BackendError::Validation(field.to_owned()));
}

#[test]
fn build_keeps_optional_placement() {
    let spec = base_builder()
        .organisation_id(Some(String::from(" org ")))
        .subnet_id(Some(String::from("pn-1")))
        .security_group_id(Some(String::from("sg-1")))
        .build()
        .expect("spec should build");

    assert_eq!(spec.organisation_id.as_deref(), Some("org"));
    assert_eq!(spec.network.subnet_id.as_deref(), Some("pn-1"));
    assert_eq!(spec.network.security_group_id.as_deref(), Some("sg-1"));
    assert!(spec.credential_ref.is_none());
}
