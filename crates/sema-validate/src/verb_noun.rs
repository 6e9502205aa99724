//! # Verb-Noun Constraint Checker
//!
//! Closed-world membership test for task descriptors. A pair is valid only
//! if a rule declared in the model permits it; the absence of a rule is a
//! rejection, never a warning.
//!
//! ## Algorithm
//!
//! 1. Exact lookup: `domain → noun → {verb}` built from literal rules.
//!    O(1) average.
//! 2. Pattern scan: the domain's non-literal rules (`*`, `@category`,
//!    `prefix*`). O(k) for k pattern rules in that domain.
//! 3. Otherwise classify the rejection:
//!    - `DomainMismatch` if the domain is not declared by the model, if the
//!      exact `(verb, noun)` is declared only under other domains, or if the
//!      noun is known in the domain but no rule there permits the verb;
//!    - `UnknownVerbNounCombination` otherwise.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sema_core::{SemanticModel, VerbNounPair};

/// Why a verb-noun pair was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairRejection {
    /// The pair is out of place in the claimed domain.
    #[error("domain mismatch for {pair}: {detail}")]
    DomainMismatch {
        /// The rejected pair.
        pair: VerbNounPair,
        /// Which mismatch was detected.
        detail: String,
    },
    /// No rule in the domain mentions the pair's noun, and no rule permits it.
    #[error("unknown verb-noun combination {pair}")]
    UnknownVerbNounCombination {
        /// The rejected pair.
        pair: VerbNounPair,
    },
}

impl PairRejection {
    /// Short machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DomainMismatch { .. } => "domain_mismatch",
            Self::UnknownVerbNounCombination { .. } => "unknown_verb_noun_combination",
        }
    }
}

/// Result of checking a pair against a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairVerdict {
    /// A declared rule permits the pair.
    Valid,
    /// No declared rule permits the pair.
    Invalid(PairRejection),
}

impl PairVerdict {
    /// Whether the pair was accepted.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validate `pair` against the rules declared in `model`.
pub fn validate_pair(pair: &VerbNounPair, model: &SemanticModel) -> PairVerdict {
    if model
        .exact_verbs(&pair.domain, &pair.noun)
        .is_some_and(|verbs| verbs.contains(&pair.verb))
    {
        return PairVerdict::Valid;
    }

    let categories = model.noun_categories();
    if model
        .pattern_rules(&pair.domain)
        .iter()
        .any(|rule| rule.permits(pair, categories))
    {
        return PairVerdict::Valid;
    }

    let rejection = classify_rejection(pair, model);
    tracing::debug!(
        model = model.domain(),
        %pair,
        reason = rejection.code(),
        "verb-noun pair rejected"
    );
    PairVerdict::Invalid(rejection)
}

fn classify_rejection(pair: &VerbNounPair, model: &SemanticModel) -> PairRejection {
    if !model.declares_domain(&pair.domain) {
        return PairRejection::DomainMismatch {
            pair: pair.clone(),
            detail: format!("domain {:?} is not declared by the model", pair.domain),
        };
    }

    let elsewhere = model.domains_declaring(pair);
    if !elsewhere.is_empty() {
        return PairRejection::DomainMismatch {
            pair: pair.clone(),
            detail: format!("pair is declared only in: {}", elsewhere.join(", ")),
        };
    }

    if model.knows_noun_in(&pair.domain, &pair.noun) {
        return PairRejection::DomainMismatch {
            pair: pair.clone(),
            detail: format!(
                "verb {:?} is not permitted for noun {:?} in domain {:?}",
                pair.verb, pair.noun, pair.domain
            ),
        };
    }

    PairRejection::UnknownVerbNounCombination { pair: pair.clone() }
}
