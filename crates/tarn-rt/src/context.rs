use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap as CellMap;
use tarn_core::{AllocId, TarnError, Value};

use crate::gc::{GcMetrics, MajorGcState};
use crate::heap::MemoryCell;

/// Identifier of a variable-table entry.
pub type VarId = i64;
/// Identifier of a function-table entry.
pub type FunId = i64;

/// A native function the embedder registers in the function table.
///
/// The context only stores and hands these back; it never invokes them.
/// Function-table entries are not GC roots and hold no heap references.
pub struct NativeFn {
    pub name: String,
    pub func: Box<dyn Fn(&[Value]) -> Result<Value, TarnError>>,
}

impl NativeFn {
    pub fn simple(
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, TarnError> + 'static,
    ) -> Self {
        NativeFn {
            name: name.into(),
            func: Box::new(f),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native-fn {}>", self.name)
    }
}

/// The process-local execution context of a tarn program: the variable
/// and function tables plus the handle-addressed heap, with reference
/// counts maintained on every mutation and reclamation split between a
/// cheap candidate-driven minor collector and a resumable mark-and-sweep
/// major collector (see [`crate::gc`]).
///
/// Single-threaded and single-owner; every operation restores the
/// refcount invariant before returning. Not thread safe.
pub struct Context {
    alloc_counter: AllocId,
    pub(crate) variables: HashMap<VarId, Value>,
    functions: HashMap<FunId, Rc<NativeFn>>,
    pub(crate) heap: CellMap<AllocId, MemoryCell>,
    /// Identifiers whose refcount was driven to zero or below; a multiset
    /// of hints revalidated by the next minor collection.
    pub(crate) gc_candidates: Vec<AllocId>,
    pub(crate) major: MajorGcState,
    pub(crate) metrics: GcMetrics,
}

impl Context {
    pub fn new() -> Self {
        Context {
            alloc_counter: 1,
            variables: HashMap::new(),
            functions: HashMap::new(),
            heap: CellMap::new(),
            gc_candidates: Vec::new(),
            major: MajorGcState::default(),
            metrics: GcMetrics::default(),
        }
    }

    // ── Reference counting ────────────────────────────────────────────

    pub(crate) fn incref(&mut self, value: Value) {
        if let Value::Handle(id) = value {
            if let Some(cell) = self.heap.get_mut(&id) {
                cell.ref_count += 1;
            }
        }
    }

    /// Drop one reference; a zero-crossing deposits the identifier on the
    /// candidate list for the next minor collection. Nothing is freed
    /// here, so transient zero-crossings stay cheap to reverse.
    pub(crate) fn decref(&mut self, value: Value) {
        if let Value::Handle(id) = value {
            if let Some(cell) = self.heap.get_mut(&id) {
                cell.ref_count -= 1;
                if cell.ref_count <= 0 {
                    self.gc_candidates.push(id);
                }
            }
        }
    }

    /// Resolve a handle to its live allocation id, or `InvalidHandle`.
    fn live_handle(&self, value: Value) -> Result<AllocId, TarnError> {
        match value {
            Value::Handle(id) if self.heap.contains_key(&id) => Ok(id),
            _ => Err(TarnError::InvalidHandle),
        }
    }

    /// `write`/`push` reject a dangling handle *argument* up front, so a
    /// failure never happens after a refcount has changed.
    fn check_storable(&self, value: Value) -> Result<(), TarnError> {
        if value.is_handle() {
            self.live_handle(value)?;
        }
        Ok(())
    }

    fn slot(index: i64, len: usize) -> Result<usize, TarnError> {
        if index < 0 || index as usize >= len {
            return Err(TarnError::out_of_bounds(index, len));
        }
        Ok(index as usize)
    }

    // ── Heap operations ───────────────────────────────────────────────

    /// Allocate a cell of `size` slots, each `Int(0)`. The returned
    /// handle carries zero inbound references; install it into a variable
    /// or a cell before the next collection if it must survive one.
    pub fn alloc(&mut self, size: i64) -> Result<Value, TarnError> {
        if size < 0 {
            return Err(TarnError::BadSize(size));
        }
        let id = self.alloc_counter;
        self.alloc_counter += 1;
        self.heap.insert(id, MemoryCell::new(size as usize));
        Ok(Value::Handle(id))
    }

    /// Read a slot. The returned value is a transient view: no refcount
    /// is taken on its behalf.
    pub fn read(&self, array: Value, index: i64) -> Result<Value, TarnError> {
        let id = self.live_handle(array)?;
        let cell = &self.heap[&id];
        let slot = Self::slot(index, cell.data.len())?;
        Ok(cell.data[slot])
    }

    /// Overwrite a slot, retaining the new value and releasing the old.
    /// The new value is retained *before* the old one is released, so
    /// storing a handle over itself never reaches a zero refcount.
    pub fn write(&mut self, array: Value, index: i64, value: Value) -> Result<(), TarnError> {
        let id = self.live_handle(array)?;
        let len = self.heap[&id].data.len();
        let slot = Self::slot(index, len)?;
        self.check_storable(value)?;
        self.incref(value);
        let old = match self.heap.get_mut(&id) {
            Some(cell) => std::mem::replace(&mut cell.data[slot], value),
            None => return Err(TarnError::InvalidHandle),
        };
        self.decref(old);
        Ok(())
    }

    /// Append a value, retaining it if it is a handle.
    pub fn push(&mut self, array: Value, value: Value) -> Result<(), TarnError> {
        let id = self.live_handle(array)?;
        self.check_storable(value)?;
        self.incref(value);
        if let Some(cell) = self.heap.get_mut(&id) {
            cell.data.push(value);
        }
        Ok(())
    }

    /// Remove and return the last element. Like `read`, the returned
    /// value is handed back without an implicit retain.
    pub fn pop(&mut self, array: Value) -> Result<Value, TarnError> {
        let id = self.live_handle(array)?;
        let value = match self.heap.get_mut(&id) {
            Some(cell) => cell.data.pop().ok_or(TarnError::EmptyPop)?,
            None => return Err(TarnError::InvalidHandle),
        };
        self.decref(value);
        Ok(value)
    }

    // ── Variable table (the GC root set) ──────────────────────────────

    /// Bind a variable, releasing whatever it previously held. Assigning
    /// never fails; a handle that no longer resolves is simply stored
    /// without a retain and skipped by the collectors.
    pub fn assign(&mut self, var: VarId, value: Value) {
        self.incref(value);
        if let Some(old) = self.variables.insert(var, value) {
            self.decref(old);
        }
    }

    pub fn erase(&mut self, var: VarId) -> Result<(), TarnError> {
        let value = self
            .variables
            .remove(&var)
            .ok_or(TarnError::Undefined(var))?;
        self.decref(value);
        Ok(())
    }

    pub fn var(&self, var: VarId) -> Option<Value> {
        self.variables.get(&var).copied()
    }

    pub fn var_is_defined(&self, var: VarId) -> bool {
        self.variables.contains_key(&var)
    }

    // ── Function table ────────────────────────────────────────────────

    pub fn define_function(&mut self, fun: FunId, exec: Rc<NativeFn>) {
        self.functions.insert(fun, exec);
    }

    pub fn erase_function(&mut self, fun: FunId) -> Result<(), TarnError> {
        self.functions
            .remove(&fun)
            .map(|_| ())
            .ok_or(TarnError::Undefined(fun))
    }

    pub fn function(&self, fun: FunId) -> Option<Rc<NativeFn>> {
        self.functions.get(&fun).cloned()
    }

    pub fn fun_is_defined(&self, fun: FunId) -> bool {
        self.functions.contains_key(&fun)
    }

    // ── Introspection ─────────────────────────────────────────────────

    /// Number of live heap cells.
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    /// Current inbound-reference count of an allocation, if still live.
    pub fn ref_count(&self, id: AllocId) -> Option<i32> {
        self.heap.get(&id).map(|cell| cell.ref_count)
    }

    /// Whether `value` is a handle naming a live cell.
    pub fn is_valid_handle(&self, value: Value) -> bool {
        self.live_handle(value).is_ok()
    }

    /// Cumulative collector counters.
    pub fn metrics(&self) -> GcMetrics {
        self.metrics
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
