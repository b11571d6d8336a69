//! shell-vault
//!
//! Institutional vault covenants: hierarchical time-locked spending
//! policies with compliance gating. A vault template carries four tiers
//! (hot / warm / cold / emergency) of threshold-multisig policies with
//! increasing block delays, an optional boolean composition tree, an
//! optional inheritance schedule, and compliance hooks that gate large
//! spends behind an injectable attestation oracle.

pub mod composition;
pub mod policy;
pub mod template;

pub use composition::PolicyComposition;
pub use policy::{PolicyDecision, SpendContext, TimeHierarchy, TimePolicy, VaultTier};
pub use template::{
    ComplianceHooks, ComplianceOracle, EmergencyRecovery, EnhancedVaultTemplate,
    InheritanceTransition, StaticComplianceOracle,
};
