use octofhir_normalize::*;
use serde_json::{Value, json};

fn apply_json(operation: Value, resource: Value) -> (OperationResult, Option<Value>) {
    let format = JsonFormat::r4();
    let engine = NormalizationEngine::r4();
    let operation: Operation = serde_json::from_value(operation).unwrap();
    let resource = format.parse(&resource).unwrap();

    let result = engine.apply(&operation, &resource);
    let output = result.resource.as_ref().map(|node| format.to_value(node));
    (result, output)
}

#[test]
fn test_choice_keys_survive_round_trip() {
    let format = JsonFormat::r4();
    let input = json!({
        "resourceType": "Condition",
        "code": { "coding": [{ "system": "http://snomed.info/sct", "code": "38341003" }] },
        "onsetPeriod": { "start": "2023-01-01T00:00:00Z" },
        "recordedDate": "2023-01-02T09:30:00Z"
    });

    let node = format.parse(&input).unwrap();
    assert_eq!(node.child("onset").map(Node::type_name), Some("Period"));
    assert_eq!(format.to_value(&node), input);

    let text = format.to_string(&node, false).unwrap();
    assert_eq!(format.parse_str(&text).unwrap(), node);
}

#[test]
fn test_copy_descriptor_from_json() {
    let (result, output) = apply_json(
        json!({
            "operationType": "CopyProperty",
            "name": "gender-identity",
            "sourcePath": "patient.gender",
            "targetPath": "patient.extension[0].genderIdentity"
        }),
        json!({ "resourceType": "Patient", "gender": "female" }),
    );

    assert!(result.is_success(), "{:?}", result.error_message);
    assert_eq!(
        output.unwrap(),
        json!({
            "resourceType": "Patient",
            "gender": "female",
            "extension": [{ "genderIdentity": "female" }]
        })
    );
}

#[test]
fn test_code_map_descriptor_from_json() {
    let (result, output) = apply_json(
        json!({
            "operationType": "CodeMap",
            "path": "observation.code",
            "codeSystemMaps": [{
                "sourceSystem": "http://old-system",
                "targetSystem": "http://new-system",
                "codeMaps": { "A1": { "code": "B1", "display": "Positive" } }
            }]
        }),
        json!({
            "resourceType": "Observation",
            "status": "final",
            "code": { "coding": [{ "system": "http://old-system", "code": "A1" }] }
        }),
    );

    assert!(result.is_success());
    assert_eq!(
        output.unwrap()["code"]["coding"][0],
        json!({ "system": "http://new-system", "code": "B1", "display": "Positive" })
    );
}

#[test]
fn test_copy_location_descriptor_from_json() {
    let (result, output) = apply_json(
        json!({ "operationType": "CopyLocation" }),
        json!({
            "resourceType": "Location",
            "name": "Ward 3",
            "identifier": [
                { "system": "http://hospital/units", "value": "W3" },
                { "system": "http://hospital/units", "value": "W3" }
            ],
            "type": [{ "coding": [{ "system": "http://hospital/units", "code": "ICU" }] }]
        }),
    );

    assert!(result.is_success());
    assert_eq!(
        output.unwrap()["type"],
        json!([
            { "coding": [{ "system": "http://hospital/units", "code": "ICU" }] },
            { "coding": [{ "system": "http://hospital/units", "code": "W3" }] }
        ])
    );
}

#[test]
fn test_unknown_operation_type_is_rejected() {
    let err =
        serde_json::from_value::<Operation>(json!({ "operationType": "Delete", "path": "x" }));
    assert!(err.is_err());
}

#[test]
fn test_resource_base_elements_survive_round_trip() {
    let format = JsonFormat::r4();
    let input = json!({
        "resourceType": "Patient",
        "id": "p1",
        "meta": {
            "versionId": "3",
            "lastUpdated": "2023-01-02T09:30:00Z",
            "profile": ["http://example.org/StructureDefinition/patient"],
            "tag": [{ "system": "http://example.org/tags", "code": "imported" }]
        },
        "implicitRules": "http://example.org/rules",
        "text": {
            "status": "generated",
            "div": "<div xmlns=\"http://www.w3.org/1999/xhtml\">Jane</div>"
        },
        "contained": [{ "resourceType": "Location", "id": "ward", "name": "Ward 3" }],
        "modifierExtension": [{ "url": "http://example.org/confidential", "valueBoolean": true }],
        "gender": "female"
    });

    let node = format.parse(&input).unwrap();
    assert_eq!(
        node.child("contained").and_then(|c| c.child_at(0)).map(Node::type_name),
        Some("Location")
    );
    assert_eq!(format.to_value(&node), input);

    let (result, output) = apply_json(
        json!({
            "operationType": "Copy",
            "sourcePath": "Patient.gender",
            "targetPath": "Patient.extension[0].genderIdentity"
        }),
        input.clone(),
    );
    assert!(result.is_success(), "{:?}", result.error_message);
    let output = output.unwrap();
    assert_eq!(output["meta"], input["meta"]);
    assert_eq!(output["extension"], json!([{ "genderIdentity": "female" }]));
}

#[test]
fn test_contained_resource_errors_name_the_path() {
    let err = JsonFormat::r4()
        .parse(&json!({
            "resourceType": "Patient",
            "contained": [{ "resourceType": "Spaceship" }]
        }))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Patient.contained[0]"), "{message}");
    assert!(message.contains("Spaceship"), "{message}");
}
