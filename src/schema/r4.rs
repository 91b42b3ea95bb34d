use crate::model::{PrimitiveKind, ScalarKind};

use super::{ANY_RESOURCE, DeclaredKind, PropertyDefinition, TypeCategory, TypeDefinition};

fn prim(name: &str, kind: PrimitiveKind) -> PropertyDefinition {
    PropertyDefinition::new(name, DeclaredKind::Primitive(kind))
}

fn prims(name: &str, kind: PrimitiveKind) -> PropertyDefinition {
    prim(name, kind).repeating()
}

fn complex(name: &str, type_name: &str) -> PropertyDefinition {
    PropertyDefinition::new(name, DeclaredKind::complex(type_name))
}

fn complexes(name: &str, type_name: &str) -> PropertyDefinition {
    complex(name, type_name).repeating()
}

fn choice(name: &str, alternatives: Vec<DeclaredKind>) -> PropertyDefinition {
    PropertyDefinition::new(name, DeclaredKind::Choice(alternatives))
}

fn p(kind: PrimitiveKind) -> DeclaredKind {
    DeclaredKind::Primitive(kind)
}

fn c(type_name: &str) -> DeclaredKind {
    DeclaredKind::complex(type_name)
}

fn datatype(name: &str) -> TypeDefinition {
    TypeDefinition::new(name, TypeCategory::Complex).with_properties([
        PropertyDefinition::new("id", DeclaredKind::Scalar(ScalarKind::String)),
        complexes("extension", "Extension"),
    ])
}

/// Resource and DomainResource elements shared by every resource
fn resource(name: &str) -> TypeDefinition {
    TypeDefinition::new(name, TypeCategory::Resource).with_properties([
        prim("id", PrimitiveKind::Id),
        complex("meta", "Meta"),
        prim("implicitRules", PrimitiveKind::Uri),
        prim("language", PrimitiveKind::Code),
        complex("text", "Narrative"),
        complexes("contained", ANY_RESOURCE),
        complexes("extension", "Extension"),
        complexes("modifierExtension", "Extension"),
        complexes("identifier", "Identifier"),
    ])
}

pub(super) fn definitions() -> Vec<TypeDefinition> {
    use PrimitiveKind::*;

    vec![
        // Datatypes
        datatype("Extension")
            .open()
            .with_property(PropertyDefinition::new(
                "url",
                DeclaredKind::Scalar(ScalarKind::String),
            ))
            .with_property(choice(
                "value",
                vec![
                    p(String),
                    p(Code),
                    p(Uri),
                    p(Integer),
                    p(Boolean),
                    p(Decimal),
                    p(DateTime),
                    c("Coding"),
                    c("CodeableConcept"),
                    c("Reference"),
                    c("Period"),
                    c("Quantity"),
                    c("Identifier"),
                ],
            )),
        datatype("Meta").with_properties([
            prim("versionId", Id),
            prim("lastUpdated", DateTime),
            prim("source", Uri),
            prims("profile", Uri),
            complexes("security", "Coding"),
            complexes("tag", "Coding"),
        ]),
        datatype("Narrative").with_properties([prim("status", Code), prim("div", String)]),
        datatype("Coding").with_properties([
            prim("system", Uri),
            prim("version", String),
            prim("code", Code),
            prim("display", String),
            prim("userSelected", Boolean),
        ]),
        datatype("CodeableConcept")
            .with_properties([complexes("coding", "Coding"), prim("text", String)]),
        datatype("Reference").with_properties([
            prim("reference", String),
            prim("type", Uri),
            complex("identifier", "Identifier"),
            prim("display", String),
        ]),
        datatype("Period").with_properties([prim("start", DateTime), prim("end", DateTime)]),
        datatype("Quantity").with_properties([
            prim("value", Decimal),
            prim("comparator", Code),
            prim("unit", String),
            prim("system", Uri),
            prim("code", Code),
        ]),
        datatype("Identifier").with_properties([
            prim("use", Code),
            complex("type", "CodeableConcept"),
            prim("system", Uri),
            prim("value", String),
            complex("period", "Period"),
            complex("assigner", "Reference"),
        ]),
        datatype("HumanName").with_properties([
            prim("use", Code),
            prim("text", String),
            prim("family", String),
            prims("given", String),
            prims("prefix", String),
            prims("suffix", String),
            complex("period", "Period"),
        ]),
        datatype("ContactPoint").with_properties([
            prim("system", Code),
            prim("value", String),
            prim("use", Code),
            prim("rank", Integer),
            complex("period", "Period"),
        ]),
        datatype("Address").with_properties([
            prim("use", Code),
            prim("type", Code),
            prim("text", String),
            prims("line", String),
            prim("city", String),
            prim("district", String),
            prim("state", String),
            prim("postalCode", String),
            prim("country", String),
            complex("period", "Period"),
        ]),
        // Resources
        resource("Patient").with_properties([
            prim("active", Boolean),
            complexes("name", "HumanName"),
            complexes("telecom", "ContactPoint"),
            prim("gender", Code),
            prim("birthDate", DateTime),
            choice("deceased", vec![p(Boolean), p(DateTime)]),
            complexes("address", "Address"),
            complex("maritalStatus", "CodeableConcept"),
            complexes("generalPractitioner", "Reference"),
            complex("managingOrganization", "Reference"),
        ]),
        resource("Observation").with_properties([
            prim("status", Code),
            complexes("category", "CodeableConcept"),
            complex("code", "CodeableConcept"),
            complex("subject", "Reference"),
            complex("encounter", "Reference"),
            choice("effective", vec![p(DateTime), c("Period")]),
            prim("issued", DateTime),
            choice(
                "value",
                vec![
                    c("Quantity"),
                    c("CodeableConcept"),
                    p(String),
                    p(Boolean),
                    p(Integer),
                    p(DateTime),
                    c("Period"),
                ],
            ),
            complexes("interpretation", "CodeableConcept"),
            complex("bodySite", "CodeableConcept"),
            complex("method", "CodeableConcept"),
        ]),
        resource("Encounter").with_properties([
            prim("status", Code),
            complex("class", "Coding"),
            complexes("type", "CodeableConcept"),
            complex("serviceType", "CodeableConcept"),
            complex("subject", "Reference"),
            complex("period", "Period"),
            complexes("reasonCode", "CodeableConcept"),
            complex("serviceProvider", "Reference"),
        ]),
        resource("Condition").with_properties([
            complex("clinicalStatus", "CodeableConcept"),
            complex("verificationStatus", "CodeableConcept"),
            complexes("category", "CodeableConcept"),
            complex("severity", "CodeableConcept"),
            complex("code", "CodeableConcept"),
            complex("subject", "Reference"),
            complex("encounter", "Reference"),
            choice("onset", vec![p(DateTime), c("Period"), p(String)]),
            prim("recordedDate", DateTime),
        ]),
        resource("Location").with_properties([
            prim("status", Code),
            prim("name", String),
            prim("description", String),
            prim("mode", Code),
            complexes("type", "CodeableConcept"),
            complexes("telecom", "ContactPoint"),
            complex("address", "Address"),
            complex("managingOrganization", "Reference"),
        ]),
        resource("MedicationRequest").with_properties([
            prim("status", Code),
            prim("intent", Code),
            complexes("category", "CodeableConcept"),
            choice("medication", vec![c("CodeableConcept"), c("Reference")]),
            complex("subject", "Reference"),
            complex("encounter", "Reference"),
            prim("authoredOn", DateTime),
            complex("requester", "Reference"),
        ]),
    ]
}
