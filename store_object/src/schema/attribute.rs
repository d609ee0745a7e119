use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use type_mapping::AttributeType;

/// Whether a relation holds at most one entity or an ordered list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    /// Cardinality of the owning side for a relation kind name (`manyToOne`, `morphToMany`, ...)
    pub fn from_relation_name(relation: &str) -> Option<Self> {
        match relation {
            "oneToOne" | "manyToOne" | "morphToOne" | "oneWay" => Some(Cardinality::One),
            "oneToMany" | "manyToMany" | "morphToMany" | "manyWay" => Some(Cardinality::Many),
            _ => None,
        }
    }
}

/// Value constraints carried by a scalar attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarConstraints {
    pub required: bool,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<String>>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

/// Declared shape of one attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeDefinition {
    Scalar {
        ty: AttributeType,
        constraints: ScalarConstraints,
    },
    Relation {
        target: String,
        cardinality: Cardinality,
    },
    MorphRelation {
        targets: BTreeSet<String>,
        cardinality: Cardinality,
    },
}

impl AttributeDefinition {
    pub fn scalar(ty: AttributeType) -> Self {
        Self::Scalar {
            ty,
            constraints: ScalarConstraints::default(),
        }
    }

    pub fn relation(target: impl Into<String>, cardinality: Cardinality) -> Self {
        Self::Relation {
            target: target.into(),
            cardinality,
        }
    }

    pub fn morph<I, S>(targets: I, cardinality: Cardinality) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MorphRelation {
            targets: targets.into_iter().map(Into::into).collect(),
            cardinality,
        }
    }

    /// Mark a scalar attribute as required; no-op for relations
    pub fn required(mut self) -> Self {
        if let Self::Scalar { constraints, .. } = &mut self {
            constraints.required = true;
        }
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        if let Self::Scalar { constraints, .. } = &mut self {
            constraints.default = Some(value);
        }
        self
    }

    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Self::Scalar { constraints, .. } = &mut self {
            constraints.enum_values = Some(values.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        if let Self::Scalar { constraints, .. } = &mut self {
            constraints.min_length = min;
            constraints.max_length = max;
        }
        self
    }

    pub fn is_relation(&self) -> bool {
        !matches!(self, Self::Scalar { .. })
    }

    pub fn is_morph(&self) -> bool {
        matches!(self, Self::MorphRelation { .. })
    }

    pub fn scalar_type(&self) -> Option<AttributeType> {
        match self {
            Self::Scalar { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    pub fn constraints(&self) -> Option<&ScalarConstraints> {
        match self {
            Self::Scalar { constraints, .. } => Some(constraints),
            _ => None,
        }
    }

    pub fn cardinality(&self) -> Option<Cardinality> {
        match self {
            Self::Scalar { .. } => None,
            Self::Relation { cardinality, .. } | Self::MorphRelation { cardinality, .. } => {
                Some(*cardinality)
            }
        }
    }
}
