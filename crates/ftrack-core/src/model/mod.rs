//! Feature records and their derived lifecycle.

pub mod feature;

pub use feature::{
    BRANCH_KEY, CrossBranchFeature, Feature, FeatureState, FeatureVersion, Relationship,
};
