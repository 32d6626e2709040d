//! VM facade
//!
//! The [`Vm`] owns the heap, the schema and instruction registries, the open
//! workspace, and the commit log. Registration happens once at startup
//! (`&mut self`); everything after that goes through `&self`, with the
//! workspace and log behind locks so instruction bodies can re-enter the VM
//! (for example to instantiate a model mid-instruction).
//!
//! Workspace protocol: any `execute` with no open workspace implicitly
//! begins a transaction, which opens a commit with a `VM_BEGINTRANS` marker
//! and pushes a heap checkpoint. `commit` seals the workspace with
//! `VM_ENDTRANS` and appends it to the log; the checkpoint stays on the
//! stack as the next revertible boundary. `rollback` reverts the heap one
//! checkpoint and reopens the last closed commit as the workspace,
//! discarding any workspace that was open.

use lamina_core::{Error, Result, Value};
use lamina_heap::Heap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use crate::builtins;
use crate::commit::Commit;
use crate::config::VmConfig;
use crate::instruction::{Instruction, InstructionDef, Operand};
use crate::model::instance::{Kwargs, ModelInstance};
use crate::model::lifecycle::Lifecycle;
use crate::model::schema::ModelSchema;

/// The virtual machine
///
/// # Example
///
/// ```
/// use lamina_engine::{AttrDescriptor, Kwargs, ModelSchema, Vm};
///
/// let mut vm = Vm::new();
/// let schema = ModelSchema::builder("Board")
///     .attr(AttrDescriptor::int("width"))
///     .attr(AttrDescriptor::int("height"))
///     .build()
///     .unwrap();
/// vm.register_model(schema).unwrap();
///
/// let board = vm
///     .instantiate("Board", Kwargs::new().set("width", 20).set("height", 20))
///     .unwrap();
/// vm.commit().unwrap();
/// assert_eq!(board.id(), 1);
/// ```
pub struct Vm {
    config: VmConfig,
    heap: Heap,
    models: FxHashMap<String, Arc<ModelSchema>>,
    opcodes: FxHashMap<u32, Arc<InstructionDef>>,
    mnemonics: FxHashMap<String, Arc<InstructionDef>>,
    workspace: Mutex<Option<Commit>>,
    commits: Mutex<Vec<Commit>>,
}

impl Vm {
    /// Create a VM with the default configuration
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a VM with an explicit configuration
    pub fn with_config(config: VmConfig) -> Self {
        let mut vm = Self {
            heap: Heap::new(config.heap_size),
            config,
            models: FxHashMap::default(),
            opcodes: FxHashMap::default(),
            mnemonics: FxHashMap::default(),
            workspace: Mutex::new(None),
            commits: Mutex::new(Vec::new()),
        };
        for def in builtins::defs() {
            vm.insert_instruction(def)
                .expect("built-in instruction table is statically valid");
        }
        vm
    }

    /// The active configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Number of live heap entries
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a model schema and its member instructions
    ///
    /// # Errors
    ///
    /// Configuration errors for a duplicate model name or any member
    /// instruction failing opcode/mnemonic validation.
    pub fn register_model(&mut self, schema: ModelSchema) -> Result<Arc<ModelSchema>> {
        if self.models.contains_key(schema.name()) {
            return Err(Error::invalid_model(
                schema.name(),
                "model is already registered",
            ));
        }
        for member in schema.members() {
            self.register_instruction(member.to_def())?;
        }
        let name = schema.name().to_string();
        let schema = Arc::new(schema);
        self.models.insert(name.clone(), schema.clone());
        debug!(model = %name, "registered model");
        Ok(schema)
    }

    /// Register a user-defined instruction
    ///
    /// # Errors
    ///
    /// Configuration errors for an opcode in the reserved range `1..=100`,
    /// an empty mnemonic, or a duplicate opcode/mnemonic.
    pub fn register_instruction(&mut self, def: InstructionDef) -> Result<Arc<InstructionDef>> {
        if def.opcode() <= builtins::RESERVED_OPCODE_MAX {
            return Err(Error::invalid_instruction(format!(
                "opcode {} is reserved; user opcodes must be > {}",
                def.opcode(),
                builtins::RESERVED_OPCODE_MAX
            )));
        }
        self.insert_instruction(def)
    }

    fn insert_instruction(&mut self, def: InstructionDef) -> Result<Arc<InstructionDef>> {
        if def.mnemonic().is_empty() {
            return Err(Error::invalid_instruction(format!(
                "empty mnemonic for opcode {}",
                def.opcode()
            )));
        }
        if self.opcodes.contains_key(&def.opcode()) {
            return Err(Error::DuplicateOpcode {
                opcode: def.opcode(),
            });
        }
        if self.mnemonics.contains_key(def.mnemonic()) {
            return Err(Error::DuplicateMnemonic {
                mnemonic: def.mnemonic().to_string(),
            });
        }
        let def = Arc::new(def);
        self.opcodes.insert(def.opcode(), def.clone());
        self.mnemonics.insert(def.mnemonic().to_string(), def.clone());
        debug!(opcode = def.opcode(), mnemonic = %def.mnemonic(), "registered instruction");
        Ok(def)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Look up a registered model schema
    pub fn model(&self, name: &str) -> Result<Arc<ModelSchema>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_model(name))
    }

    /// Look up an instruction by mnemonic
    pub fn instruction(&self, mnemonic: &str) -> Result<Arc<InstructionDef>> {
        self.mnemonics
            .get(mnemonic)
            .cloned()
            .ok_or_else(|| Error::unknown_instruction(mnemonic))
    }

    /// Look up an instruction by opcode
    pub fn instruction_by_opcode(&self, opcode: u32) -> Result<Arc<InstructionDef>> {
        self.opcodes
            .get(&opcode)
            .cloned()
            .ok_or_else(|| Error::unknown_instruction(format!("opcode {}", opcode)))
    }

    /// Materialize a handle for an existing instance
    ///
    /// The handle is in the `Normal` state and reads its attributes directly
    /// from the heap; no existence check is performed.
    pub fn get_by_id(&self, model: &str, id: i64) -> Result<ModelInstance> {
        if !self.models.contains_key(model) {
            return Err(Error::unknown_model(model));
        }
        Ok(ModelInstance::new(model, id, Lifecycle::Normal))
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Instantiate a model
    ///
    /// Allocates a fresh id, writes `_id`, then assigns each declared
    /// attribute from `kwargs`, the `<attr>_id` foreign form, null
    /// permission, or the declared default, in that order. A missing
    /// required attribute fails with the lifecycle already restored. On
    /// success an `INST` instruction bearing the flattened attribute
    /// snapshot is recorded.
    pub fn instantiate(&self, model: &str, kwargs: Kwargs) -> Result<ModelInstance> {
        let schema = self.model(model)?;
        let id = schema.next_id(&self.heap);
        let handle = ModelInstance::new(model, id, Lifecycle::EngineChanging);
        schema.attr("_id")?.write(&self.heap, id, Value::Int(id));

        let assigned = self.assign_attributes(&schema, &handle, &kwargs);
        handle.set_state(Lifecycle::Normal);
        assigned?;

        let snapshot = schema.snapshot(&self.heap, id);
        let def = self.instruction_by_opcode(builtins::INST_OPCODE)?;
        let instruction = Instruction::new(
            def,
            vec![
                Operand::Class(model.to_string()),
                Operand::Value(Value::Map(snapshot)),
            ],
        )?;
        self.execute(vec![instruction])?;
        debug!(model = %model, id, "instantiated");
        Ok(handle)
    }

    fn assign_attributes(
        &self,
        schema: &ModelSchema,
        handle: &ModelInstance,
        kwargs: &Kwargs,
    ) -> Result<()> {
        for desc in schema.attrs() {
            let name = desc.name();
            if name == "_id" {
                continue;
            }
            match kwargs.get(name) {
                Some(value) if !value.is_null() => {
                    handle.set(self, name, value.clone())?;
                    continue;
                }
                _ => {}
            }
            if let Some(target) = desc.foreign_model() {
                let id_key = format!("{}_id", name);
                if let Some(fid) = kwargs.get(&id_key).and_then(Value::as_int) {
                    let referent = self.get_by_id(target, fid)?;
                    handle.set(self, name, Value::Int(referent.id()))?;
                    continue;
                }
            }
            if desc.is_nullable() {
                handle.set(self, name, Value::Null)?;
            } else if let Some(default) = desc.default() {
                handle.set(self, name, default.clone())?;
            } else {
                return Err(Error::missing_attribute(schema.name(), name));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Execute instructions, recording them into the workspace
    ///
    /// Opens a workspace implicitly when none is open. Instructions run in
    /// submission order; the batch is appended to the workspace only after
    /// every instruction succeeded. On error the workspace is left as it
    /// was; the caller decides whether to `rollback`.
    pub fn execute(&self, instructions: Vec<Instruction>) -> Result<()> {
        self.ensure_workspace()?;
        for instruction in &instructions {
            instruction.run(self)?;
        }
        let mut workspace = self.workspace.lock();
        if let Some(commit) = workspace.as_mut() {
            commit.extend(instructions);
        }
        Ok(())
    }

    /// Execute instructions given in mnemonic form
    pub fn execute_from_mnemonic(&self, forms: &[serde_json::Value]) -> Result<()> {
        let instructions = forms
            .iter()
            .map(|form| Instruction::load(self, form))
            .collect::<Result<Vec<_>>>()?;
        self.execute(instructions)
    }

    /// Execute a member instruction against `(model, id)`
    ///
    /// The dispatch surface used by remote facades: the target instance is
    /// re-materialized by reference, so callers never need a live handle.
    pub fn execute_member_instruction(
        &self,
        mnemonic: &str,
        target: (&str, i64),
        args: Vec<Operand>,
    ) -> Result<()> {
        let def = self.instruction(mnemonic)?;
        let handle = self.get_by_id(target.0, target.1)?;
        let mut operands = vec![Operand::Instance(handle)];
        operands.extend(args);
        self.execute(vec![Instruction::new(def, operands)?])
    }

    fn ensure_workspace(&self) -> Result<()> {
        let open = self.workspace.lock().is_some();
        if !open {
            self.begin_transaction()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Open a workspace
    ///
    /// Creates an empty commit, appends the `VM_BEGINTRANS` marker, and
    /// pushes a heap checkpoint paired with the workspace.
    ///
    /// # Errors
    ///
    /// [`Error::WorkspaceOpen`] if a workspace is already open.
    pub fn begin_transaction(&self) -> Result<()> {
        {
            let mut workspace = self.workspace.lock();
            if workspace.is_some() {
                return Err(Error::WorkspaceOpen);
            }
            let def = self.instruction_by_opcode(builtins::BEGIN_TRANS_OPCODE)?;
            let mut commit = Commit::new();
            commit.append(Instruction::new(def, vec![])?);
            *workspace = Some(commit);
        }
        self.heap.checkpoint();
        debug!("transaction begun");
        Ok(())
    }

    /// Seal the workspace and append it to the commit log
    ///
    /// Appends the `VM_ENDTRANS` marker, finalizes the content hash, and
    /// closes the workspace. The heap checkpoint opened at begin stays on
    /// the stack as the next revertible boundary. A no-op when no workspace
    /// is open.
    pub fn commit(&self) -> Result<()> {
        let mut workspace = self.workspace.lock();
        let Some(open) = workspace.as_mut() else {
            return Ok(());
        };
        let def = self.instruction_by_opcode(builtins::END_TRANS_OPCODE)?;
        open.append(Instruction::new(def, vec![])?);
        let hash = open.hash()?;
        let sealed = workspace.take().expect("workspace checked above");
        self.commits.lock().push(sealed);
        debug!(%hash, "commit sealed");
        Ok(())
    }

    /// Undo the most recent closed commit
    ///
    /// Reverts the heap one checkpoint and pops the last closed commit back
    /// into the workspace, where it is editable again. Any workspace that
    /// was open is discarded along with its heap layer.
    ///
    /// # Errors
    ///
    /// [`Error::NoCommits`] when the log is empty, before any heap
    /// mutation, so a stray rollback cannot unbalance the checkpoint
    /// pairing.
    pub fn rollback(&self) -> Result<()> {
        let mut workspace = self.workspace.lock();
        let mut commits = self.commits.lock();
        if commits.is_empty() {
            return Err(Error::NoCommits);
        }
        self.heap.revert()?;
        *workspace = commits.pop();
        debug!("rolled back last commit into workspace");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Commit access
    // ------------------------------------------------------------------

    /// The most recently closed commit
    pub fn get_last_commit(&self) -> Result<Commit> {
        self.commits
            .lock()
            .last()
            .cloned()
            .ok_or(Error::NoCommits)
    }

    /// JSON dump of the most recently closed commit
    pub fn get_last_commit_dump(&self) -> Result<String> {
        self.get_last_commit()?.dumps()
    }

    /// The open workspace commit
    pub fn get_current_commit(&self) -> Result<Commit> {
        self.workspace.lock().clone().ok_or(Error::NoWorkspace)
    }

    /// JSON dump of the open workspace commit
    pub fn get_current_commit_dump(&self) -> Result<String> {
        self.get_current_commit()?.dumps()
    }

    /// Number of closed commits in the log
    pub fn commit_log_len(&self) -> usize {
        self.commits.lock().len()
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
