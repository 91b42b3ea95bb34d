mod common;

use common::*;
use octofhir_normalize::model::{Primitive, PrimitiveKind};
use octofhir_normalize::*;

fn gender_identity(resource: &Node) -> Option<&Node> {
    resource
        .child("extension")
        .and_then(|extensions| extensions.child_at(0))
        .and_then(|extension| extension.child("genderIdentity"))
}

#[test]
fn test_gender_copied_into_new_extension() {
    let engine = NormalizationEngine::r4();
    let patient = patient_with_gender("female");
    let copy = Operation::from(CopyOperation::new(
        "patient.gender",
        "patient.extension[0].genderIdentity",
    ));

    let result = engine.apply(&copy, &patient);

    assert_eq!(result.status, OperationStatus::Success, "{:?}", result.error_message);
    let updated = result.resource.unwrap();
    assert_eq!(
        gender_identity(&updated).and_then(Node::as_scalar),
        Some(&Scalar::from("female"))
    );
    assert!(patient.child("extension").is_none());
}

#[test]
fn test_repeated_copy_is_idempotent() {
    let engine = NormalizationEngine::r4();
    let copy = Operation::from(CopyOperation::new(
        "Patient.gender",
        "Patient.extension[0].genderIdentity",
    ));

    let once = engine.apply(&copy, &patient_with_gender("male")).resource.unwrap();
    let twice = engine.apply(&copy, &once).resource.unwrap();

    assert_eq!(once, twice);
    assert_eq!(twice.child("extension").and_then(Node::as_list).map(<[Node]>::len), Some(1));
}

#[test]
fn test_date_converted_for_string_target() {
    let engine = NormalizationEngine::r4();
    let patient = Node::from(Element::resource("Patient").with(
        "birthDate",
        Primitive::new(
            PrimitiveKind::DateTime,
            Scalar::DateTime(model::parse_date_time("1990-05-01").unwrap()),
        ),
    ));

    let result = engine.apply(
        &Operation::from(CopyOperation::new("Patient.birthDate", "Patient.name[0].text")),
        &patient,
    );

    let updated = result.resource.unwrap();
    let text = updated
        .child("name")
        .and_then(|names| names.child_at(0))
        .and_then(Node::as_element)
        .and_then(|name| name.string("text"))
        .map(str::to_string);
    assert_eq!(text.as_deref(), Some("1990-05-01T00:00:00Z"));
}

#[test]
fn test_missing_source_reports_path() {
    let engine = NormalizationEngine::r4();
    let patient = patient_with_gender("female");

    let result = engine.apply(
        &Operation::from(CopyOperation::new("Patient.birthDate", "Patient.name[0].text")),
        &patient,
    );

    assert!(!result.is_success());
    assert_eq!(
        result.error_message.as_deref(),
        Some("No values found at source path 'Patient.birthDate' for resource type Patient")
    );
    assert_eq!(result.resource.as_ref(), Some(&patient));
}

#[test]
fn test_structured_value_needs_matching_target() {
    let engine = NormalizationEngine::r4();
    let patient = Node::from(Element::resource("Patient").with(
        "maritalStatus",
        Element::new("CodeableConcept")
            .with("text", Primitive::new(PrimitiveKind::String, "Married")),
    ));

    let result = engine.apply(
        &Operation::from(CopyOperation::new("Patient.maritalStatus", "Patient.name[0]")),
        &patient,
    );

    assert!(!result.is_success());
    assert!(result.error_message.unwrap().contains("cannot accept"));
}

#[test]
fn test_copy_between_list_items() {
    let engine = NormalizationEngine::r4();
    let patient = Node::from(Element::resource("Patient").with(
        "name",
        Node::List(vec![
            Element::new("HumanName")
                .with("family", Primitive::new(PrimitiveKind::String, "Doe"))
                .into(),
        ]),
    ));

    let result = engine.apply(
        &Operation::from(CopyOperation::new("Patient.name[0].family", "Patient.name[1].family")),
        &patient,
    );

    let updated = result.resource.unwrap();
    let families: Vec<_> = updated
        .child("name")
        .and_then(Node::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Node::as_element)
        .filter_map(|name| name.string("family"))
        .collect();
    assert_eq!(families, vec!["Doe", "Doe"]);
}

#[test]
fn test_copy_into_choice_alternative_outside_suffix_table() {
    let engine = NormalizationEngine::r4();
    let observation = observation_with_code("http://loinc.org", "8867-4");

    let result = engine.apply(
        &Operation::from(CopyOperation::new(
            "Observation.code",
            "Observation.valueCodeableConcept",
        )),
        &observation,
    );

    assert!(result.is_success(), "{:?}", result.error_message);
    let updated = result.resource.unwrap();
    assert_eq!(updated.child("value").map(Node::type_name), Some("CodeableConcept"));
    assert_eq!(first_coding(&updated, "value").1, "8867-4");
}

#[test]
fn test_concurrent_copies_share_engine_caches() {
    let engine = NormalizationEngine::r4();
    let copy = Operation::from(CopyOperation::new(
        "patient.gender",
        "patient.extension[0].genderIdentity",
    ));

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let engine = &engine;
            let copy = &copy;
            scope.spawn(move || {
                let gender = if worker % 2 == 0 { "female" } else { "male" };
                for _ in 0..50 {
                    let result = engine.apply(copy, &patient_with_gender(gender));
                    let updated = result.resource.unwrap();
                    assert_eq!(
                        gender_identity(&updated).and_then(Node::as_scalar),
                        Some(&Scalar::from(gender))
                    );
                }
            });
        }
    });
}
