mod common;

use octofhir_normalize::*;
use serde_json::json;

fn blood_pressure(systolic: f64) -> Node {
    JsonFormat::r4()
        .parse(&json!({
            "resourceType": "Observation",
            "status": "final",
            "valueQuantity": { "value": systolic, "unit": "mmHg" }
        }))
        .unwrap()
}

fn flag_high(condition: Condition) -> Operation {
    Operation::from(
        ConditionalTransformOperation::new("Observation.interpretation[0].text", "High")
            .with_name("flag-high")
            .with_condition(condition),
    )
}

fn interpretation(resource: &Node) -> Option<String> {
    resource
        .child("interpretation")
        .and_then(|list| list.child_at(0))
        .and_then(Node::as_element)
        .and_then(|concept| concept.string("text"))
        .map(str::to_string)
}

#[test]
fn test_operators_against_quantity_value() {
    let engine = NormalizationEngine::r4();
    let cases = [
        (ConditionOperator::GreaterThan, json!(140), true),
        (ConditionOperator::GreaterThan, json!(150), false),
        (ConditionOperator::GreaterThanOrEqual, json!(150), true),
        (ConditionOperator::LessThan, json!(150.5), true),
        (ConditionOperator::LessThanOrEqual, json!(149.9), false),
        (ConditionOperator::Equal, json!("150"), true),
        (ConditionOperator::NotEqual, json!(150), false),
    ];

    for (operator, value, expect_write) in cases {
        let operation = flag_high(Condition::new(
            "Observation.valueQuantity.value",
            operator,
            Some(value.clone()),
        ));
        let result = engine.apply(&operation, &blood_pressure(150.0));

        assert!(result.is_success(), "{operator:?} {value}: {:?}", result.error_message);
        let written = interpretation(result.resource.as_ref().unwrap());
        assert_eq!(
            written.is_some(),
            expect_write,
            "{operator:?} {value} wrote {written:?}"
        );
    }
}

#[test]
fn test_string_equality_ignores_case() {
    let engine = NormalizationEngine::r4();
    let operation = flag_high(Condition::new(
        "Observation.status",
        ConditionOperator::Equal,
        Some(json!("FINAL")),
    ));

    let result = engine.apply(&operation, &blood_pressure(120.0));

    assert_eq!(interpretation(&result.resource.unwrap()).as_deref(), Some("High"));
}

#[test]
fn test_existence_operators() {
    let engine = NormalizationEngine::r4();
    let resource = blood_pressure(120.0);

    let exists = flag_high(Condition::new("Observation.status", ConditionOperator::Exists, None));
    assert!(interpretation(&engine.apply(&exists, &resource).resource.unwrap()).is_some());

    let missing = flag_high(Condition::new(
        "Observation.issued",
        ConditionOperator::NotExists,
        None,
    ));
    assert!(interpretation(&engine.apply(&missing, &resource).resource.unwrap()).is_some());

    let absent = flag_high(Condition::new("Observation.issued", ConditionOperator::Exists, None));
    let result = engine.apply(&absent, &resource);
    assert!(result.is_success());
    assert_eq!(result.resource.as_ref(), Some(&resource));
}

#[test]
fn test_every_condition_must_hold() {
    let engine = NormalizationEngine::r4();
    let operation = Operation::from(
        ConditionalTransformOperation::new("Observation.interpretation[0].text", "High")
            .with_condition(Condition::new(
                "Observation.status",
                ConditionOperator::Equal,
                Some(json!("final")),
            ))
            .with_condition(Condition::new(
                "Observation.valueQuantity.value",
                ConditionOperator::GreaterThan,
                Some(json!(140)),
            )),
    );

    let high = engine.apply(&operation, &blood_pressure(160.0));
    assert!(interpretation(&high.resource.unwrap()).is_some());
    let normal = engine.apply(&operation, &blood_pressure(130.0));
    assert!(interpretation(&normal.resource.unwrap()).is_none());
}

#[test]
fn test_missing_source_fails_comparison() {
    let engine = NormalizationEngine::r4();
    let operation = flag_high(Condition::new(
        "Observation.issued",
        ConditionOperator::GreaterThan,
        Some(json!("2024-01-01")),
    ));

    let result = engine.apply(&operation, &blood_pressure(120.0));

    assert!(!result.is_success());
    assert!(result.error_message.unwrap().contains("Observation.issued"));
}

#[test]
fn test_status_overwritten_when_condition_holds() {
    let engine = NormalizationEngine::r4();
    let operation = Operation::from(
        ConditionalTransformOperation::new("Observation.status", "amended").with_condition(
            Condition::new(
                "Observation.valueQuantity.value",
                ConditionOperator::GreaterThan,
                Some(json!(100)),
            ),
        ),
    );

    let result = engine.apply(&operation, &blood_pressure(120.0));

    let status = result
        .resource
        .as_ref()
        .and_then(Node::as_element)
        .and_then(|observation| observation.string("status"))
        .map(str::to_string);
    assert_eq!(status.as_deref(), Some("amended"));
}
