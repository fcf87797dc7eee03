//! Core data model for call sequences.
//!
//! Inputs and commands have positional identity only: their index in
//! insertion order is how arguments refer to them. A finalized session
//! yields exactly one [`InstructionGroup`].

use serde::{Deserialize, Serialize};

use crate::address::ObjectAddr;
use crate::error::{ResolveError, Result};
use crate::lookup::LookupEvent;

/// One input slot of a call sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Input {
    /// Canonical bytes plus the declared type they encode.
    Pure { bytes: Vec<u8>, type_name: String },
    OwnedObject(ObjectAddr),
    SharedObject(ObjectAddr),
    ReceivingObject(ObjectAddr),
}

impl Input {
    /// Address of the referenced ledger object, if this is an object input.
    pub fn object_address(&self) -> Option<ObjectAddr> {
        match self {
            Input::Pure { .. } => None,
            Input::OwnedObject(addr)
            | Input::SharedObject(addr)
            | Input::ReceivingObject(addr) => Some(*addr),
        }
    }
}

/// Positional reference used inside a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Argument {
    /// The gas coin of the enclosing transaction.
    Gas,
    /// An input slot, by insertion index.
    Input(u16),
    /// The (single) result of an earlier command.
    Result(u16),
    /// One value of an earlier multi-result command.
    NestedResult(u16, u16),
}

/// Fully-qualified call target: `package::module::function`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTarget {
    pub package: ObjectAddr,
    pub module: String,
    pub function: String,
}

impl MoveTarget {
    pub fn new(package: ObjectAddr, module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            package,
            module: module.into(),
            function: function.into(),
        }
    }

    /// Parse `0xADDR::module::function`.
    pub fn parse(target: &str) -> Result<Self> {
        let mut parts = target.split("::");
        let (package, module, function) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(m), Some(f)) if parts.next().is_none() => (p, m, f),
            _ => {
                return Err(ResolveError::Validation(format!(
                    "invalid call target `{target}`: expected `0xADDR::module::function`"
                )))
            }
        };
        if module.is_empty() || function.is_empty() {
            return Err(ResolveError::Validation(format!(
                "invalid call target `{target}`: empty module or function"
            )));
        }
        Ok(Self {
            package: ObjectAddr::from_hex(package)?,
            module: module.to_string(),
            function: function.to_string(),
        })
    }
}

impl std::fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}::{}::{}",
            self.package.to_hex_short(),
            self.module,
            self.function
        )
    }
}

/// One step of a call sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    MoveCall {
        target: MoveTarget,
        type_args: Vec<String>,
        args: Vec<Argument>,
        /// Number of values this call returns. Defaults to 1; explicit for
        /// multi-result calls so nested references can be bounds-checked.
        result_arity: u16,
    },
    TransferObjects {
        objects: Vec<Argument>,
        recipient: Argument,
    },
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
    MergeCoins {
        destination: Argument,
        sources: Vec<Argument>,
    },
    MakeVector {
        element_type: Option<String>,
        elements: Vec<Argument>,
    },
}

impl Command {
    /// Declared number of result values for this command.
    pub fn result_arity(&self) -> u16 {
        match self {
            Command::MoveCall { result_arity, .. } => *result_arity,
            Command::SplitCoins { amounts, .. } => amounts.len() as u16,
            Command::MakeVector { .. } => 1,
            Command::TransferObjects { .. } | Command::MergeCoins { .. } => 0,
        }
    }
}

/// The finalized bundle a resolved session hands to the reconstructor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstructionGroup {
    pub inputs: Vec<Input>,
    pub commands: Vec<Command>,
    /// Ledger objects the sequence touches, deduplicated, insertion order.
    pub required_objects: Vec<ObjectAddr>,
    /// Type strings the sequence instantiates, deduplicated, insertion order.
    pub required_types: Vec<String>,
}

/// Packed object handle: `id(32) ++ version(u64 LE) ++ digest(variable)`.
///
/// This is the value shape a `RawObjectRefField` lookup produces. It names
/// an object, not a scalar; consumers must not treat the bytes as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: ObjectAddr,
    pub version: u64,
    pub digest: Vec<u8>,
}

impl ObjectRef {
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(40 + self.digest.len());
        out.extend_from_slice(self.id.as_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.digest);
        out
    }

    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 40 {
            return Err(ResolveError::MalformedEncoding(format!(
                "object reference needs at least 40 bytes, got {}",
                bytes.len()
            )));
        }
        let id = ObjectAddr::from_bytes(&bytes[..32])?;
        let mut version_bytes = [0u8; 8];
        version_bytes.copy_from_slice(&bytes[32..40]);
        Ok(Self {
            id,
            version: u64::from_le_bytes(version_bytes),
            digest: bytes[40..].to_vec(),
        })
    }
}

/// Result of one trial pass, as carried across the trust boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionOutcome {
    /// Every requested datum was present; the sequence is complete.
    Resolved(InstructionGroup),
    /// At least one datum is missing. The emission step surfaces one
    /// representative descriptor per round.
    NeedsData(Vec<LookupEvent>),
    /// The trial pass failed for a reason data cannot fix.
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_target() {
        let t = MoveTarget::parse("0x2::coin::mint").unwrap();
        assert_eq!(t.module, "coin");
        assert_eq!(t.function, "mint");
        assert_eq!(t.to_string(), "0x2::coin::mint");
    }

    #[test]
    fn rejects_malformed_targets() {
        assert!(MoveTarget::parse("0x2::coin").is_err());
        assert!(MoveTarget::parse("0x2::coin::mint::extra").is_err());
        assert!(MoveTarget::parse("nothex::coin::mint").is_err());
    }

    #[test]
    fn split_coins_arity_tracks_amounts() {
        let cmd = Command::SplitCoins {
            coin: Argument::Gas,
            amounts: vec![Argument::Input(0), Argument::Input(1)],
        };
        assert_eq!(cmd.result_arity(), 2);
    }

    #[test]
    fn object_ref_pack_round_trips() {
        let r = ObjectRef {
            id: ObjectAddr::from_hex("0xabc").unwrap(),
            version: 17,
            digest: vec![1, 2, 3, 0xff, 4],
        };
        let packed = r.pack();
        assert_eq!(packed.len(), 40 + 5);
        assert_eq!(ObjectRef::unpack(&packed).unwrap(), r);
    }

    #[test]
    fn object_ref_unpack_rejects_short_buffer() {
        assert!(matches!(
            ObjectRef::unpack(&[0u8; 39]),
            Err(ResolveError::MalformedEncoding(_))
        ));
    }
}
