//! # Model-Derived Constraints
//!
//! Checks that follow from the model alone, registered by default for every
//! model. Callers extend or replace them with their own domain predicates.
//!
//! | Layer | Tag | Holds when |
//! |-------|-----|------------|
//! | Semantic | `core_concept_present` | the value mentions a core concept, or the model declares none |
//! | Structural | `required_fields` | every required field is present with a compatible kind |
//! | Contextual | `verb_noun_pair` | the value carries no task, or its task is a valid pair |

use sema_core::{ConstraintLayer, ConstraintSet, Representation, SemanticModel};

use crate::verb_noun::validate_pair;

/// Tag of the semantic concept-presence check.
pub const CORE_CONCEPT_PRESENT: &str = "core_concept_present";
/// Tag of the structural required-field check.
pub const REQUIRED_FIELDS: &str = "required_fields";
/// Tag of the contextual verb-noun check.
pub const VERB_NOUN_PAIR: &str = "verb_noun_pair";

/// The standard constraint set.
pub fn standard_constraints() -> ConstraintSet {
    ConstraintSet::new()
        .with_predicate(ConstraintLayer::Semantic, CORE_CONCEPT_PRESENT, mentions_core_concept)
        .with_predicate(ConstraintLayer::Structural, REQUIRED_FIELDS, has_required_fields)
        .with_predicate(ConstraintLayer::Contextual, VERB_NOUN_PAIR, task_is_valid)
}

fn mentions_core_concept(value: &Representation, model: &SemanticModel) -> bool {
    model.core_concepts().is_empty() || !value.concepts(model).is_empty()
}

fn has_required_fields(value: &Representation, model: &SemanticModel) -> bool {
    model
        .required_fields()
        .iter()
        .all(|f| f.is_satisfied_by(&value.payload))
}

fn task_is_valid(value: &Representation, model: &SemanticModel) -> bool {
    value
        .task
        .as_ref()
        .map_or(true, |task| validate_pair(task, model).is_valid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{validate, ValidationMode};
    use sema_core::{Checkpoint, FieldKind, FormatId, VerbNounPair};
    use serde_json::json;

    fn model() -> SemanticModel {
        SemanticModel::builder("transportation")
            .concepts(["vehicle", "speed"])
            .allow("speeding", "car", "ground")
            .require_field("vehicle.wheels", FieldKind::Integer)
            .build()
            .unwrap()
    }

    fn check(payload: serde_json::Value, task: Option<VerbNounPair>) -> Vec<String> {
        let mut value = Representation::new(FormatId::new("json").unwrap(), payload);
        value.task = task;
        let report = validate(
            &standard_constraints(),
            &value,
            &model(),
            ValidationMode::FullReport,
            Checkpoint::InputValidation,
        )
        .unwrap();
        report.layers.into_iter().flat_map(|l| l.failed).collect()
    }

    #[test]
    fn well_formed_value_passes() {
        let failed = check(
            json!({"vehicle": {"wheels": 4}}),
            Some(VerbNounPair::new("speeding", "car", "ground")),
        );
        assert!(failed.is_empty(), "{failed:?}");
    }

    #[test]
    fn each_layer_reports_its_tag() {
        let failed = check(json!({"other": 1}), Some(VerbNounPair::new("flying", "car", "ground")));
        assert_eq!(failed, vec![CORE_CONCEPT_PRESENT, REQUIRED_FIELDS, VERB_NOUN_PAIR]);
    }

    #[test]
    fn conceptless_model_accepts_any_value() {
        let m = SemanticModel::builder("bare").build().unwrap();
        let v = Representation::new(FormatId::new("raw").unwrap(), json!(7));
        assert!(mentions_core_concept(&v, &m));
        assert!(has_required_fields(&v, &m));
        assert!(task_is_valid(&v, &m));
    }
}
