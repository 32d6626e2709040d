//! Commits
//!
//! A commit is an ordered sequence of instructions framed by the
//! `VM_BEGINTRANS` / `VM_ENDTRANS` markers, identified by a SHA-256 content
//! hash over the newline-joined mnemonic forms of its instructions. The hash
//! is cached and invalidated by any append, so it depends only on the final
//! ordered content.

use lamina_core::{Error, Result};
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::fmt;
use std::ops::Index;

use crate::instruction::Instruction;
use crate::vm::Vm;

/// SHA-256 content hash of a commit
///
/// The byte array is the big-endian encoding of the 256-bit hash integer;
/// the derived ordering is therefore numeric ordering of that integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitHash([u8; 32]);

impl CommitHash {
    /// Raw big-endian bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl From<[u8; 32]> for CommitHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// An ordered, hash-identified group of instructions
#[derive(Debug, Clone, Default)]
pub struct Commit {
    instructions: Vec<Instruction>,
    cached: Cell<Option<CommitHash>>,
}

impl Commit {
    /// Create an empty commit
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one instruction, invalidating the cached hash
    pub fn append(&mut self, instruction: Instruction) {
        self.cached.set(None);
        self.instructions.push(instruction);
    }

    /// Append a sequence of instructions
    pub fn extend(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        self.cached.set(None);
        self.instructions.extend(instructions);
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check whether the commit holds no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Look up one instruction
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// The instructions in submission order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Iterate over the instructions
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Content hash: SHA-256 over the newline-joined mnemonic forms
    ///
    /// Cached; recomputed after any append. Two commits with identical
    /// ordered mnemonic forms hash identically.
    pub fn hash(&self) -> Result<CommitHash> {
        if let Some(cached) = self.cached.get() {
            return Ok(cached);
        }
        let hash = CommitHash(Sha256::digest(self.hash_input()?.as_bytes()).into());
        self.cached.set(Some(hash));
        Ok(hash)
    }

    /// Chained hash: the previous commit's hash prefixed to the input
    ///
    /// For callers maintaining a true hash chain over the log; the log
    /// itself stores per-commit content hashes.
    pub fn chained_hash(&self, prev: &CommitHash) -> Result<CommitHash> {
        let input = format!("{}\n{}", prev.to_hex(), self.hash_input()?);
        Ok(CommitHash(Sha256::digest(input.as_bytes()).into()))
    }

    fn hash_input(&self) -> Result<String> {
        let mut lines = Vec::with_capacity(self.instructions.len());
        for instruction in &self.instructions {
            lines.push(instruction.mnemonize_string()?);
        }
        Ok(lines.join("\n"))
    }

    /// Serialize to JSON: an array of mnemonic forms
    pub fn dumps(&self) -> Result<String> {
        let forms = self
            .instructions
            .iter()
            .map(Instruction::mnemonize)
            .collect::<Result<Vec<_>>>()?;
        serde_json::to_string(&forms).map_err(Error::from)
    }

    /// Reconstruct a commit from its JSON dump, against a VM's registry
    pub fn loads(vm: &Vm, text: &str) -> Result<Commit> {
        let forms: Vec<serde_json::Value> = serde_json::from_str(text)?;
        let mut commit = Commit::new();
        for form in &forms {
            commit.append(Instruction::load(vm, form)?);
        }
        Ok(commit)
    }
}

impl Index<usize> for Commit {
    type Output = Instruction;

    fn index(&self, index: usize) -> &Instruction {
        &self.instructions[index]
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Commit with {} instructions: [", self.len())?;
        for (i, instruction) in self.instructions.iter().take(10).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", instruction.mnemonic())?;
        }
        write!(f, "]>")
    }
}
