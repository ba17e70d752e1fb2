//! PIN-gated access control.
//!
//! - **gate**: the session state machine and its expiry sweep
//! - **pin**: PIN and emergency-code formats and hashing
//! - **vault**: the secret vault seam
//! - **interaction**: the user interaction seam

pub mod gate;
pub mod interaction;
pub mod pin;
pub mod vault;

pub use gate::{AccessDecision, AccessGate, AccessSession, GateConfig, GateState};
pub use interaction::{
    InputValidator, Interaction, InteractionLog, NoticeLevel, ScriptedInteraction, SecretKind,
    SecretPrompt,
};
pub use pin::{validate_emergency_code_format, validate_pin_format, HashCost};
pub use vault::{MemoryVault, SecretVault};
