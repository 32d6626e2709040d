//! Error types for the Lamina VM
//!
//! A single [`Error`] enum covers the whole system. Variants group into five
//! kinds, each with a classification predicate:
//!
//! - **Configuration**: invalid instruction or model definitions, duplicate
//!   opcodes/mnemonics (`is_configuration`)
//! - **Call-site**: wrong arity or argument kind, writing a read-only field,
//!   constructing without a required attribute (`is_call_site`)
//! - **State**: destroyed instances, reverting past the base layer, workspace
//!   protocol misuse (`is_state`)
//! - **Domain**: constraint violations (`is_domain`)
//! - **Serialization**: malformed mnemonic forms (`is_serialization`)

use thiserror::Error;

/// Result type alias for Lamina operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the Lamina VM
#[derive(Debug, Error)]
pub enum Error {
    /// Instruction class failed registration-time validation
    #[error("invalid instruction: {reason}")]
    InvalidInstruction {
        /// Why the definition was rejected
        reason: String,
    },

    /// Opcode already registered
    #[error("duplicate opcode {opcode}")]
    DuplicateOpcode {
        /// The conflicting opcode
        opcode: u32,
    },

    /// Mnemonic already registered
    #[error("duplicate mnemonic '{mnemonic}'")]
    DuplicateMnemonic {
        /// The conflicting mnemonic
        mnemonic: String,
    },

    /// Model schema failed registration-time validation
    #[error("invalid model '{model}': {reason}")]
    InvalidModel {
        /// Model name
        model: String,
        /// Why the schema was rejected
        reason: String,
    },

    /// Instruction invoked with wrong arity or argument kinds
    #[error("bad call to {instruction}: {reason}")]
    BadInstructionCall {
        /// Instruction name or mnemonic
        instruction: String,
        /// What was wrong with the call
        reason: String,
    },

    /// Construction omitted a required attribute
    #[error("cannot instantiate {model}: value for {attribute} is required.")]
    MissingAttribute {
        /// Model being constructed
        model: String,
        /// The attribute with no value, no default, and no null permission
        attribute: String,
    },

    /// Direct assignment outside instruction execution
    #[error("cannot set {model}.{attribute} after construction; build a new instance or use an instruction")]
    ReadOnlyAttribute {
        /// Model name
        model: String,
        /// Attribute name
        attribute: String,
    },

    /// Attribute not declared on the model
    #[error("unknown attribute '{attribute}' on model '{model}'")]
    UnknownAttribute {
        /// Model name
        model: String,
        /// Attribute name
        attribute: String,
    },

    /// Model not registered with the VM
    #[error("unknown model '{name}'")]
    UnknownModel {
        /// Model name
        name: String,
    },

    /// Instruction not registered with the VM
    #[error("unknown instruction '{name}'")]
    UnknownInstruction {
        /// Instruction name or mnemonic
        name: String,
    },

    /// Read or write on a destroyed instance
    #[error("{model} instance {id} has been destroyed")]
    ModelDestroyed {
        /// Model name
        model: String,
        /// Instance id
        id: i64,
    },

    /// Revert attempted with only the base layer on the stack
    #[error("cannot revert heap, no checkpoints found")]
    NoCheckpoint,

    /// Transaction begun while a workspace is already open
    #[error("cannot begin transaction with an uncommitted workspace")]
    WorkspaceOpen,

    /// Operation requires an open workspace
    #[error("no open workspace")]
    NoWorkspace,

    /// Operation requires at least one closed commit in the log
    #[error("commit log is empty")]
    NoCommits,

    /// A constraint rejected a user-mode write
    #[error("constraint violated: {constraint} on {attribute}")]
    ConstraintViolation {
        /// Constraint name
        constraint: String,
        /// Target attribute
        attribute: String,
    },

    /// Mnemonic form could not be encoded or decoded
    #[error("serialization error: {message}")]
    Serialization {
        /// What went wrong
        message: String,
    },
}

impl Error {
    /// Create an `InvalidInstruction` error
    pub fn invalid_instruction(reason: impl Into<String>) -> Self {
        Error::InvalidInstruction {
            reason: reason.into(),
        }
    }

    /// Create an `InvalidModel` error
    pub fn invalid_model(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidModel {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Create a `BadInstructionCall` error
    pub fn bad_call(instruction: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::BadInstructionCall {
            instruction: instruction.into(),
            reason: reason.into(),
        }
    }

    /// Create a `MissingAttribute` error
    pub fn missing_attribute(model: impl Into<String>, attribute: impl Into<String>) -> Self {
        Error::MissingAttribute {
            model: model.into(),
            attribute: attribute.into(),
        }
    }

    /// Create a `ReadOnlyAttribute` error
    pub fn read_only(model: impl Into<String>, attribute: impl Into<String>) -> Self {
        Error::ReadOnlyAttribute {
            model: model.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an `UnknownAttribute` error
    pub fn unknown_attribute(model: impl Into<String>, attribute: impl Into<String>) -> Self {
        Error::UnknownAttribute {
            model: model.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an `UnknownModel` error
    pub fn unknown_model(name: impl Into<String>) -> Self {
        Error::UnknownModel { name: name.into() }
    }

    /// Create an `UnknownInstruction` error
    pub fn unknown_instruction(name: impl Into<String>) -> Self {
        Error::UnknownInstruction { name: name.into() }
    }

    /// Create a `ModelDestroyed` error
    pub fn destroyed(model: impl Into<String>, id: i64) -> Self {
        Error::ModelDestroyed {
            model: model.into(),
            id,
        }
    }

    /// Create a `ConstraintViolation` error
    pub fn constraint_violation(
        constraint: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Error::ConstraintViolation {
            constraint: constraint.into(),
            attribute: attribute.into(),
        }
    }

    /// Create a `Serialization` error
    pub fn serialization(message: impl Into<String>) -> Self {
        Error::Serialization {
            message: message.into(),
        }
    }

    /// Check if this is a configuration error (bad definitions)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidInstruction { .. }
                | Error::DuplicateOpcode { .. }
                | Error::DuplicateMnemonic { .. }
                | Error::InvalidModel { .. }
        )
    }

    /// Check if this is a call-site error (bad input at a call)
    pub fn is_call_site(&self) -> bool {
        matches!(
            self,
            Error::BadInstructionCall { .. }
                | Error::MissingAttribute { .. }
                | Error::ReadOnlyAttribute { .. }
                | Error::UnknownAttribute { .. }
                | Error::UnknownModel { .. }
                | Error::UnknownInstruction { .. }
        )
    }

    /// Check if this is a state error (operation invalid in the current state)
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            Error::ModelDestroyed { .. }
                | Error::NoCheckpoint
                | Error::WorkspaceOpen
                | Error::NoWorkspace
                | Error::NoCommits
        )
    }

    /// Check if this is a domain error (constraint violation)
    pub fn is_domain(&self) -> bool {
        matches!(self, Error::ConstraintViolation { .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Error::Serialization { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization {
            message: e.to_string(),
        }
    }
}
