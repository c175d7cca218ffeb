//! Tree-walking interpreter for guest code
//!
//! Every method takes `&self`: host callables invoked from guest code may
//! call straight back into the same context, so all mutable state lives in
//! cells. The lexical environment, `this` and the source unit travel in an
//! explicit [`Scope`].

pub mod builtins;

use std::cell::{Cell, RefCell};
use std::cmp::Ordering as CmpOrdering;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::ast::{
    AssignmentExpression, AssignmentTarget, BinaryExpression, BinaryOp, CallExpression,
    Expression, ForInit, ForOfStatement, ForStatement, FunctionBody, FunctionNode,
    LogicalExpression, LogicalOp, MemberExpression, MemberProperty, NewExpression,
    ObjectExpression, Program, PropertyName, Statement, TryStatement, UnaryExpression, UnaryOp,
    UpdateExpression, UpdateOp, VariableDeclaration, VariableKind,
};
use crate::bridge::{Mirror, SiteKey};
use crate::config::ContextConfig;
use crate::context::Context;
use crate::error::{JsError, TerminationReason};
use crate::frame::{self, FrameKind, Side, SyntheticFrame};
use crate::handles::{HandleId, HandleTable};
use crate::lexer::Span;
use crate::marshal::ForeignWrapper;
use crate::parser::Parser;
use crate::platform::ConsoleProvider;
use crate::prelude::FxHashMap;
use crate::proxy::GuestHandle;
use crate::registry::{self, ScriptSource};
use crate::string_dict::StringDict;
use crate::value::{
    Assignment, CheapClone, EnvRef, Environment, ExoticObject, InterpretedFunction, JsFunction,
    JsObject, JsObjectRef, JsString, JsValue, NativeCall, NativeFn, NativeFunction, ScopeKind,
};

/// Allocations between two prunes of the allocation list.
const PRUNE_INTERVAL: usize = 4096;

/// Operations between two checks of the deadline and the interrupt flag.
const CLOCK_INTERVAL: u64 = 64;

/// Deepest native recursion through statements, expressions and
/// serialization, across guest calls.
const MAX_NESTING_DEPTH: usize = 512;

/// An evaluated unit of source. Function objects keep their unit alive so
/// their text stays available for display.
pub struct SourceUnit {
    script: Arc<ScriptSource>,
}

impl SourceUnit {
    pub(crate) fn new(script: Arc<ScriptSource>) -> Self {
        Self { script }
    }

    pub fn text(&self) -> &str {
        self.script.text()
    }

    pub fn script(&self) -> &Arc<ScriptSource> {
        &self.script
    }
}

/// Lexical state of the code being executed
#[derive(Clone)]
pub(crate) struct Scope {
    pub env: EnvRef,
    pub this: JsValue,
    pub unit: Rc<SourceUnit>,
}

impl Scope {
    fn with_env(&self, env: EnvRef) -> Scope {
        Scope {
            env,
            this: self.this.clone(),
            unit: self.unit.cheap_clone(),
        }
    }
}

/// The source text a host crossing was made from.
#[derive(Clone, Copy)]
pub(crate) struct Site<'a> {
    pub unit: &'a SourceUnit,
    pub span: Span,
}

impl<'a> Site<'a> {
    pub fn text(&self) -> &'a str {
        self.span.slice(self.unit.text())
    }
}

/// Completion record for control flow
#[derive(Debug)]
pub enum Completion {
    /// Carries the value of the last expression statement, if any
    Normal(Option<JsValue>),
    Return(JsValue),
    Break,
    Continue,
}

/// Well-known objects of a context
pub(crate) struct Realm {
    pub global: JsObjectRef,
    pub object_prototype: JsObjectRef,
    pub function_prototype: JsObjectRef,
    pub array_prototype: JsObjectRef,
    pub string_prototype: JsObjectRef,
    pub error_prototype: JsObjectRef,
    pub type_error_prototype: JsObjectRef,
    pub reference_error_prototype: JsObjectRef,
    pub range_error_prototype: JsObjectRef,
    pub syntax_error_prototype: JsObjectRef,
}

impl Realm {
    fn new(objects: &mut Vec<Weak<RefCell<JsObject>>>) -> Self {
        let mut make = |prototype: Option<&JsObjectRef>| {
            let obj = Rc::new(RefCell::new(JsObject::with_prototype(
                prototype.cloned(),
                ExoticObject::Ordinary,
            )));
            objects.push(Rc::downgrade(&obj));
            obj
        };
        let object_prototype = make(None);
        let function_prototype = make(Some(&object_prototype));
        let array_prototype = make(Some(&object_prototype));
        let string_prototype = make(Some(&object_prototype));
        let error_prototype = make(Some(&object_prototype));
        let type_error_prototype = make(Some(&error_prototype));
        let reference_error_prototype = make(Some(&error_prototype));
        let range_error_prototype = make(Some(&error_prototype));
        let syntax_error_prototype = make(Some(&error_prototype));
        let global = make(Some(&object_prototype));
        Realm {
            global,
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            error_prototype,
            type_error_prototype,
            reference_error_prototype,
            range_error_prototype,
            syntax_error_prototype,
        }
    }

    /// Prototype of the builtin error constructor `name`.
    pub fn error_prototype_for(&self, name: &str) -> &JsObjectRef {
        match name {
            "TypeError" => &self.type_error_prototype,
            "ReferenceError" => &self.reference_error_prototype,
            "RangeError" => &self.range_error_prototype,
            "SyntaxError" => &self.syntax_error_prototype,
            _ => &self.error_prototype,
        }
    }
}

/// The guest engine of one context
pub struct Interpreter {
    pub(crate) id: u64,
    pub(crate) weak_self: Weak<Interpreter>,
    pub(crate) config: ContextConfig,
    pub(crate) console: Box<dyn ConsoleProvider>,
    pub(crate) realm: Realm,
    /// Script-level `let`/`const` bindings, shared by every eval
    pub(crate) script_env: EnvRef,
    string_dict: RefCell<StringDict>,
    pub(crate) handles: RefCell<HandleTable>,
    /// Guest wrappers of host values, keyed by host allocation
    pub(crate) wrappers: RefCell<FxHashMap<usize, ForeignWrapper>>,
    /// Host handles of guest objects, keyed by guest allocation
    pub(crate) proxies: RefCell<FxHashMap<usize, Weak<GuestHandle>>>,
    /// Guest error objects of host exceptions, keyed by exception
    pub(crate) error_objects: RefCell<FxHashMap<usize, Weak<RefCell<JsObject>>>>,
    pub(crate) mirrors: RefCell<Vec<Mirror>>,
    pub(crate) sites: RefCell<FxHashMap<SiteKey, Arc<ScriptSource>>>,
    pub(crate) scripts: RefCell<Vec<Arc<ScriptSource>>>,
    objects: RefCell<Vec<Weak<RefCell<JsObject>>>>,
    allocations: Cell<usize>,
    call_depth: Cell<usize>,
    nesting: Cell<usize>,
    entry_depth: Cell<usize>,
    operations: Cell<u64>,
    deadline: Cell<Option<Instant>>,
    pub(crate) interrupt: Arc<AtomicBool>,
    closed: Cell<bool>,
}

/// Leaves a host entry when dropped.
pub(crate) struct EntryGuard<'a> {
    interp: &'a Interpreter,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        let depth = self.interp.entry_depth.get();
        self.interp.entry_depth.set(depth.saturating_sub(1));
    }
}

pub(crate) struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// What a callable object dispatches to
enum Callee {
    Function(JsFunction),
    Foreign(HandleId),
}

/// A resolved assignment target
enum Reference<'a> {
    Binding(&'a JsString),
    Property(JsValue, JsString),
}

impl Interpreter {
    pub(crate) fn new(
        id: u64,
        config: ContextConfig,
        console: Box<dyn ConsoleProvider>,
        interrupt: Arc<AtomicBool>,
    ) -> Rc<Self> {
        let interp = Rc::new_cyclic(|weak_self| {
            let mut objects = Vec::new();
            let realm = Realm::new(&mut objects);
            Interpreter {
                id,
                weak_self: weak_self.clone(),
                config,
                console,
                realm,
                script_env: Environment::new_global(),
                string_dict: RefCell::new(StringDict::with_builtin_names()),
                handles: RefCell::new(HandleTable::new()),
                wrappers: RefCell::new(FxHashMap::default()),
                proxies: RefCell::new(FxHashMap::default()),
                error_objects: RefCell::new(FxHashMap::default()),
                mirrors: RefCell::new(Vec::new()),
                sites: RefCell::new(FxHashMap::default()),
                scripts: RefCell::new(Vec::new()),
                objects: RefCell::new(objects),
                allocations: Cell::new(0),
                call_depth: Cell::new(0),
                nesting: Cell::new(0),
                entry_depth: Cell::new(0),
                operations: Cell::new(0),
                deadline: Cell::new(None),
                interrupt,
                closed: Cell::new(false),
            }
        });
        builtins::install(&interp);
        interp
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// A strong handle on the owning context, for host callables.
    pub(crate) fn context(&self) -> Option<Context> {
        self.weak_self.upgrade().map(Context::from_interpreter)
    }

    pub fn intern(&self, s: &str) -> JsString {
        self.string_dict.borrow_mut().get_or_insert(s)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Allocation
    // ═══════════════════════════════════════════════════════════════════════

    /// Allocate an object owned by this context. Every object is tracked so
    /// teardown can break reference cycles.
    pub(crate) fn alloc(&self, prototype: Option<JsObjectRef>, exotic: ExoticObject) -> JsObjectRef {
        let obj = Rc::new(RefCell::new(JsObject::with_prototype(prototype, exotic)));
        self.objects.borrow_mut().push(Rc::downgrade(&obj));
        let count = self.allocations.get().wrapping_add(1);
        self.allocations.set(count);
        if count % PRUNE_INTERVAL == 0 {
            self.objects
                .borrow_mut()
                .retain(|weak| weak.strong_count() > 0);
            self.prune_bridges();
        }
        obj
    }

    pub fn create_object(&self) -> JsObjectRef {
        self.alloc(
            Some(self.realm.object_prototype.cheap_clone()),
            ExoticObject::Ordinary,
        )
    }

    pub fn create_array(&self, elements: Vec<JsValue>) -> JsObjectRef {
        self.alloc(
            Some(self.realm.array_prototype.cheap_clone()),
            ExoticObject::Array(elements),
        )
    }

    pub fn create_function(&self, function: JsFunction) -> JsObjectRef {
        self.alloc(
            Some(self.realm.function_prototype.cheap_clone()),
            ExoticObject::Function(function),
        )
    }

    pub fn create_native_function(&self, name: &str, func: NativeFn, arity: usize) -> JsObjectRef {
        self.create_function(JsFunction::Native(NativeFunction {
            name: self.intern(name),
            func,
            arity,
            constructor: false,
        }))
    }

    /// A native constructor linked both ways with `prototype`.
    pub fn create_constructor(
        &self,
        name: &str,
        func: NativeFn,
        arity: usize,
        prototype: &JsObjectRef,
    ) -> JsObjectRef {
        let constructor = self.create_function(JsFunction::Native(NativeFunction {
            name: self.intern(name),
            func,
            arity,
            constructor: true,
        }));
        constructor.borrow_mut().set_property(
            self.intern("prototype"),
            JsValue::Object(prototype.cheap_clone()),
        );
        prototype.borrow_mut().set_property(
            self.intern("constructor"),
            JsValue::Object(constructor.cheap_clone()),
        );
        constructor
    }

    pub fn register_method(&self, target: &JsObjectRef, name: &str, func: NativeFn, arity: usize) {
        let function = self.create_native_function(name, func, arity);
        target
            .borrow_mut()
            .set_property(self.intern(name), JsValue::Object(function));
    }

    pub(crate) fn set_global_value(&self, name: &str, value: JsValue) {
        self.realm
            .global
            .borrow_mut()
            .set_property(self.intern(name), value);
    }

    /// Break every reference cycle of this context and invalidate its
    /// handles. Idempotent.
    pub(crate) fn teardown(&self) {
        if self.closed.replace(true) {
            return;
        }
        let entries = self.handles.borrow_mut().clear();
        drop(entries);
        let wrappers = std::mem::take(&mut *self.wrappers.borrow_mut());
        drop(wrappers);
        self.proxies.borrow_mut().clear();
        self.error_objects.borrow_mut().clear();
        let mirrors = std::mem::take(&mut *self.mirrors.borrow_mut());
        drop(mirrors);

        // Hold every object until all of them are emptied.
        let objects: Vec<JsObjectRef> = std::mem::take(&mut *self.objects.borrow_mut())
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for obj in &objects {
            let contents = match obj.try_borrow_mut() {
                Ok(mut o) => std::mem::take(&mut *o),
                Err(_) => continue,
            };
            drop(contents);
        }
        drop(objects);
        self.script_env.clear();

        self.sites.borrow_mut().clear();
        self.scripts.borrow_mut().clear();
        registry::purge();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Resource limits
    // ═══════════════════════════════════════════════════════════════════════

    /// Enter from the host. The outermost entry starts a fresh operation
    /// budget and deadline.
    pub(crate) fn enter(&self) -> Result<EntryGuard<'_>, JsError> {
        if self.interrupt.load(Ordering::Relaxed) {
            return Err(JsError::terminated(TerminationReason::Interrupted));
        }
        if self.entry_depth.get() == 0 {
            self.operations.set(0);
            self.deadline.set(self.config.deadline());
        }
        self.entry_depth.set(self.entry_depth.get().saturating_add(1));
        Ok(EntryGuard { interp: self })
    }

    /// Count one unit of work against the limits.
    pub(crate) fn tick(&self) -> Result<(), JsError> {
        let operations = self.operations.get().saturating_add(1);
        self.operations.set(operations);
        if self.config.max_operations > 0 && operations > self.config.max_operations {
            return Err(JsError::terminated(TerminationReason::OutOfFuel));
        }
        if operations % CLOCK_INTERVAL == 0 {
            if self.interrupt.load(Ordering::Relaxed) {
                return Err(JsError::terminated(TerminationReason::Interrupted));
            }
            if self
                .deadline
                .get()
                .is_some_and(|deadline| Instant::now() >= deadline)
            {
                return Err(JsError::terminated(TerminationReason::DeadlineExceeded));
            }
        }
        Ok(())
    }

    /// Go one level deeper into native recursion.
    pub(crate) fn nest(&self) -> Result<DepthGuard<'_>, JsError> {
        let depth = self.nesting.get();
        if depth >= MAX_NESTING_DEPTH {
            return Err(JsError::terminated(TerminationReason::StackOverflow));
        }
        self.nesting.set(depth + 1);
        Ok(DepthGuard {
            depth: &self.nesting,
        })
    }

    fn enter_call(&self) -> Result<DepthGuard<'_>, JsError> {
        let depth = self.call_depth.get();
        if self.config.max_call_depth > 0 && depth >= self.config.max_call_depth {
            return Err(JsError::terminated(TerminationReason::StackOverflow));
        }
        self.call_depth.set(depth + 1);
        self.tick()?;
        Ok(DepthGuard {
            depth: &self.call_depth,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Programs and statements
    // ═══════════════════════════════════════════════════════════════════════

    pub(crate) fn parse(&self, source: &str) -> Result<Program, JsError> {
        let mut dict = self.string_dict.borrow_mut();
        Parser::new(source, &mut dict).parse_program()
    }

    /// Run a parsed unit at script level and return its completion value.
    pub(crate) fn execute_program(
        &self,
        program: &Program,
        unit: Rc<SourceUnit>,
    ) -> Result<JsValue, JsError> {
        let scope = Scope {
            env: self.script_env.cheap_clone(),
            this: JsValue::Object(self.realm.global.cheap_clone()),
            unit,
        };
        self.hoist_declarations(&program.body, &scope);

        let mut result = JsValue::Undefined;
        for stmt in program.body.iter() {
            match self.execute_statement(stmt, &scope)? {
                Completion::Normal(Some(value)) => result = value,
                Completion::Normal(None) => {}
                Completion::Return(value) => return Ok(value),
                Completion::Break => {
                    return Err(JsError::syntax_error("Illegal break statement", 0, 0));
                }
                Completion::Continue => {
                    return Err(JsError::syntax_error("Illegal continue statement", 0, 0));
                }
            }
        }
        Ok(result)
    }

    pub(crate) fn execute_statement(&self, stmt: &Statement, scope: &Scope) -> Result<Completion, JsError> {
        self.tick()?;
        let _nesting = self.nest()?;
        match stmt {
            Statement::Expression(expr) => {
                let value = self.evaluate(&expr.expression, scope)?;
                Ok(Completion::Normal(Some(value)))
            }

            Statement::VariableDeclaration(decl) => {
                self.execute_variable_declaration(decl, scope)?;
                Ok(Completion::Normal(None))
            }

            // Bound when the enclosing body was entered
            Statement::FunctionDeclaration(_) => Ok(Completion::Normal(None)),

            Statement::Block(block) => self.execute_block(&block.body, scope),

            Statement::If(if_stmt) => {
                if self.evaluate(&if_stmt.test, scope)?.to_boolean() {
                    self.execute_statement(&if_stmt.consequent, scope)
                } else if let Some(alternate) = &if_stmt.alternate {
                    self.execute_statement(alternate, scope)
                } else {
                    Ok(Completion::Normal(None))
                }
            }

            Statement::While(while_stmt) => {
                let mut last = None;
                loop {
                    self.tick()?;
                    if !self.evaluate(&while_stmt.test, scope)?.to_boolean() {
                        break;
                    }
                    match self.execute_statement(&while_stmt.body, scope)? {
                        Completion::Break => break,
                        Completion::Continue => {}
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal(value) => last = value.or(last),
                    }
                }
                Ok(Completion::Normal(last))
            }

            Statement::DoWhile(do_while) => {
                let mut last = None;
                loop {
                    self.tick()?;
                    match self.execute_statement(&do_while.body, scope)? {
                        Completion::Break => break,
                        Completion::Continue => {}
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal(value) => last = value.or(last),
                    }
                    if !self.evaluate(&do_while.test, scope)?.to_boolean() {
                        break;
                    }
                }
                Ok(Completion::Normal(last))
            }

            Statement::For(for_stmt) => self.execute_for(for_stmt, scope),

            Statement::ForOf(for_of) => self.execute_for_of(for_of, scope),

            Statement::Return(ret) => {
                let value = match &ret.argument {
                    Some(argument) => self.evaluate(argument, scope)?,
                    None => JsValue::Undefined,
                };
                Ok(Completion::Return(value))
            }

            Statement::Break(_) => Ok(Completion::Break),
            Statement::Continue(_) => Ok(Completion::Continue),

            Statement::Throw(throw) => {
                let value = self.evaluate(&throw.argument, scope)?;
                Err(self.throw_value(value))
            }

            Statement::Try(try_stmt) => self.execute_try(try_stmt, scope),

            Statement::Empty => Ok(Completion::Normal(None)),
        }
    }

    fn execute_statements(&self, stmts: &[Statement], scope: &Scope) -> Result<Completion, JsError> {
        let mut last = None;
        for stmt in stmts {
            match self.execute_statement(stmt, scope)? {
                Completion::Normal(Some(value)) => last = Some(value),
                Completion::Normal(None) => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    fn execute_block(&self, stmts: &[Statement], scope: &Scope) -> Result<Completion, JsError> {
        let inner = scope.with_env(Environment::child(&scope.env, ScopeKind::Block));
        self.hoist_functions(stmts, &inner);
        self.execute_statements(stmts, &inner)
    }

    fn execute_variable_declaration(
        &self,
        decl: &VariableDeclaration,
        scope: &Scope,
    ) -> Result<(), JsError> {
        for declarator in &decl.declarations {
            match decl.kind {
                VariableKind::Var => {
                    if let Some(init) = &declarator.init {
                        let value = self.evaluate(init, scope)?;
                        self.assign_identifier(&declarator.name, value, scope)?;
                    }
                }
                VariableKind::Let | VariableKind::Const => {
                    if scope.env.has_own(&declarator.name) {
                        return Err(JsError::syntax_error(
                            format!("Identifier '{}' has already been declared", declarator.name),
                            declarator.span.line,
                            declarator.span.column,
                        ));
                    }
                    let value = match &declarator.init {
                        Some(init) => self.evaluate(init, scope)?,
                        None => JsValue::Undefined,
                    };
                    scope.env.declare(
                        declarator.name.cheap_clone(),
                        value,
                        decl.kind == VariableKind::Let,
                    );
                }
            }
        }
        Ok(())
    }

    fn execute_for(&self, for_stmt: &ForStatement, scope: &Scope) -> Result<Completion, JsError> {
        let inner = scope.with_env(Environment::child(&scope.env, ScopeKind::Block));
        match &for_stmt.init {
            Some(ForInit::Variable(decl)) => self.execute_variable_declaration(decl, &inner)?,
            Some(ForInit::Expression(expr)) => {
                self.evaluate(expr, &inner)?;
            }
            None => {}
        }

        let mut last = None;
        loop {
            self.tick()?;
            if let Some(test) = &for_stmt.test
                && !self.evaluate(test, &inner)?.to_boolean()
            {
                break;
            }
            match self.execute_statement(&for_stmt.body, &inner)? {
                Completion::Break => break,
                Completion::Continue => {}
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal(value) => last = value.or(last),
            }
            if let Some(update) = &for_stmt.update {
                self.evaluate(update, &inner)?;
            }
        }
        Ok(Completion::Normal(last))
    }

    fn execute_for_of(&self, for_of: &ForOfStatement, scope: &Scope) -> Result<Completion, JsError> {
        let iterable = self.evaluate(&for_of.iterable, scope)?;
        let items = self.iterate(&iterable, &for_of.iterable, scope)?;

        let mut last = None;
        for item in items {
            self.tick()?;
            let iteration = match for_of.kind {
                Some(VariableKind::Let) | Some(VariableKind::Const) => {
                    let env = Environment::child(&scope.env, ScopeKind::Block);
                    env.declare(
                        for_of.binding.cheap_clone(),
                        item,
                        for_of.kind == Some(VariableKind::Let),
                    );
                    scope.with_env(env)
                }
                Some(VariableKind::Var) | None => {
                    self.assign_identifier(&for_of.binding, item, scope)?;
                    scope.clone()
                }
            };
            match self.execute_statement(&for_of.body, &iteration)? {
                Completion::Break => break,
                Completion::Continue => {}
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal(value) => last = value.or(last),
            }
        }
        Ok(Completion::Normal(last))
    }

    /// Items of a `for…of` iterable: array elements or string characters.
    fn iterate(
        &self,
        iterable: &JsValue,
        expr: &Expression,
        scope: &Scope,
    ) -> Result<Vec<JsValue>, JsError> {
        match iterable {
            JsValue::String(s) => Ok(s
                .as_str()
                .chars()
                .map(|c| JsValue::from(c.to_string()))
                .collect()),
            JsValue::Object(obj) => match &obj.borrow().exotic {
                ExoticObject::Array(elements) => Ok(elements.clone()),
                _ => Err(JsError::type_error(format!(
                    "{} is not iterable",
                    self.describe(expr, scope)
                ))),
            },
            _ => Err(JsError::type_error(format!(
                "{} is not iterable",
                self.describe(expr, scope)
            ))),
        }
    }

    fn execute_try(&self, try_stmt: &TryStatement, scope: &Scope) -> Result<Completion, JsError> {
        let mut result = self.execute_block(&try_stmt.block.body, scope);

        if let Some(handler) = &try_stmt.handler {
            result = match result {
                Err(err) if err.is_catchable() => {
                    let value = self.error_to_value(err);
                    let env = Environment::child(&scope.env, ScopeKind::Block);
                    if let Some(param) = &handler.param {
                        env.declare(param.cheap_clone(), value, true);
                    }
                    self.execute_block(&handler.body.body, &scope.with_env(env))
                }
                other => other,
            };
        }

        if let Some(finalizer) = &try_stmt.finalizer {
            if matches!(&result, Err(err) if !err.is_catchable()) {
                return result;
            }
            match self.execute_block(&finalizer.body, scope)? {
                Completion::Normal(_) => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    /// The guest value a caught error binds to.
    pub(crate) fn error_to_value(&self, err: JsError) -> JsValue {
        if let Some((name, message)) = err.engine_error_parts() {
            let prototype = self.realm.error_prototype_for(name).cheap_clone();
            return JsValue::Object(builtins::error::create_error(self, prototype, Some(message)));
        }
        match err {
            JsError::Thrown { value, .. } => value,
            _ => JsValue::Undefined,
        }
    }

    /// Throw `value`. A value carrying a host exception rethrows that
    /// exception.
    pub(crate) fn throw_value(&self, value: JsValue) -> JsError {
        let origin = host_exception_of(&value);
        if let Some(exception) = &origin {
            exception.mark_rethrown();
        }
        JsError::Thrown {
            value,
            trace: frame::capture(),
            origin,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Declarations and bindings
    // ═══════════════════════════════════════════════════════════════════════

    /// Declare `var` names and bind function declarations of a body.
    fn hoist_declarations(&self, stmts: &[Statement], scope: &Scope) {
        let mut names = Vec::new();
        for stmt in stmts {
            collect_var_names(stmt, &mut names);
        }
        let target = scope.env.var_scope();
        for name in names {
            if target.kind() == ScopeKind::Global {
                let mut global = self.realm.global.borrow_mut();
                if !global.has_own_property(&name) {
                    global.set_property(name, JsValue::Undefined);
                }
            } else if !target.has_own(&name) {
                target.declare(name, JsValue::Undefined, true);
            }
        }
        self.hoist_functions(stmts, scope);
    }

    fn hoist_functions(&self, stmts: &[Statement], scope: &Scope) {
        for stmt in stmts {
            let Statement::FunctionDeclaration(node) = stmt else {
                continue;
            };
            let Some(name) = &node.name else {
                continue;
            };
            let function = JsValue::Object(self.instantiate_function(node, scope));
            if scope.env.kind() == ScopeKind::Global {
                self.realm
                    .global
                    .borrow_mut()
                    .set_property(name.cheap_clone(), function);
            } else {
                scope.env.declare(name.cheap_clone(), function, true);
            }
        }
    }

    pub(crate) fn lookup_identifier(&self, name: &JsString, scope: &Scope) -> Result<JsValue, JsError> {
        if let Some(value) = scope.env.lookup(name) {
            return Ok(value);
        }
        let global = self.realm.global.borrow().get_property(name);
        global.ok_or_else(|| JsError::reference_error(name.as_str()))
    }

    fn assign_identifier(&self, name: &JsString, value: JsValue, scope: &Scope) -> Result<(), JsError> {
        match scope.env.assign(name, value.clone()) {
            Assignment::Done => Ok(()),
            Assignment::Constant => Err(JsError::type_error("Assignment to constant variable.")),
            Assignment::Unbound => {
                self.realm
                    .global
                    .borrow_mut()
                    .set_property(name.cheap_clone(), value);
                Ok(())
            }
        }
    }

    fn instantiate_function(&self, node: &Rc<FunctionNode>, scope: &Scope) -> JsObjectRef {
        let function = InterpretedFunction {
            node: node.cheap_clone(),
            closure: scope.env.cheap_clone(),
            captured_this: node.is_arrow.then(|| scope.this.clone()),
            unit: scope.unit.cheap_clone(),
        };
        let obj = self.create_function(JsFunction::Interpreted(Rc::new(function)));
        if !node.is_arrow {
            let prototype = self.create_object();
            prototype
                .borrow_mut()
                .set_property(self.intern("constructor"), JsValue::Object(obj.cheap_clone()));
            obj.borrow_mut()
                .set_property(self.intern("prototype"), JsValue::Object(prototype));
        }
        obj
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════════

    pub(crate) fn evaluate(&self, expr: &Expression, scope: &Scope) -> Result<JsValue, JsError> {
        let _nesting = self.nest()?;
        match expr {
            Expression::Number(n) => Ok(JsValue::Number(*n)),
            Expression::String(s) => Ok(JsValue::String(s.cheap_clone())),
            Expression::Boolean(b) => Ok(JsValue::Boolean(*b)),
            Expression::Null => Ok(JsValue::Null),
            Expression::Identifier(id) => self.lookup_identifier(&id.name, scope),
            Expression::This(_) => Ok(scope.this.clone()),

            Expression::Array(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    elements.push(self.evaluate(element, scope)?);
                }
                Ok(JsValue::Object(self.create_array(elements)))
            }

            Expression::Object(object) => self.evaluate_object(object, scope),

            Expression::Function(node) => {
                Ok(JsValue::Object(self.instantiate_function(node, scope)))
            }

            Expression::Unary(unary) => self.evaluate_unary(unary, scope),
            Expression::Update(update) => self.evaluate_update(update, scope),
            Expression::Binary(binary) => self.evaluate_binary(binary, scope),
            Expression::Logical(logical) => self.evaluate_logical(logical, scope),

            Expression::Conditional(cond) => {
                if self.evaluate(&cond.test, scope)?.to_boolean() {
                    self.evaluate(&cond.consequent, scope)
                } else {
                    self.evaluate(&cond.alternate, scope)
                }
            }

            Expression::Assignment(assign) => self.evaluate_assignment(assign, scope),
            Expression::Member(member) => self.evaluate_member(member, scope),
            Expression::Call(call) => self.evaluate_call(call, scope),
            Expression::New(new_expr) => self.evaluate_new(new_expr, scope),

            Expression::Sequence(exprs) => {
                let mut result = JsValue::Undefined;
                for expr in exprs {
                    result = self.evaluate(expr, scope)?;
                }
                Ok(result)
            }
        }
    }

    fn evaluate_object(&self, object: &ObjectExpression, scope: &Scope) -> Result<JsValue, JsError> {
        let obj = self.create_object();
        for property in &object.properties {
            let key = match &property.key {
                PropertyName::Static(name) => name.cheap_clone(),
                PropertyName::Computed(expr) => {
                    let key = self.evaluate(expr, scope)?;
                    self.to_property_key(&key)?
                }
            };
            let value = self.evaluate(&property.value, scope)?;
            obj.borrow_mut().set_property(key, value);
        }
        Ok(JsValue::Object(obj))
    }

    fn evaluate_unary(&self, unary: &UnaryExpression, scope: &Scope) -> Result<JsValue, JsError> {
        match unary.operator {
            UnaryOp::Typeof => {
                let value = match &unary.argument {
                    // typeof tolerates unresolvable names
                    Expression::Identifier(id) => self
                        .lookup_identifier(&id.name, scope)
                        .unwrap_or(JsValue::Undefined),
                    other => self.evaluate(other, scope)?,
                };
                Ok(JsValue::from(value.type_of()))
            }
            UnaryOp::Delete => match &unary.argument {
                Expression::Member(member) => {
                    let object = self.evaluate(&member.object, scope)?;
                    let key = self.member_key(&member.property, scope)?;
                    self.delete_property(&object, &key).map(JsValue::Boolean)
                }
                other => {
                    self.evaluate(other, scope)?;
                    Ok(JsValue::Boolean(true))
                }
            },
            UnaryOp::Void => {
                self.evaluate(&unary.argument, scope)?;
                Ok(JsValue::Undefined)
            }
            UnaryOp::Not => {
                let value = self.evaluate(&unary.argument, scope)?;
                Ok(JsValue::Boolean(!value.to_boolean()))
            }
            UnaryOp::Minus => {
                let value = self.evaluate(&unary.argument, scope)?;
                Ok(JsValue::Number(-self.to_number(&value)?))
            }
            UnaryOp::Plus => {
                let value = self.evaluate(&unary.argument, scope)?;
                Ok(JsValue::Number(self.to_number(&value)?))
            }
            UnaryOp::BitNot => {
                let value = self.evaluate(&unary.argument, scope)?;
                Ok(JsValue::Number(f64::from(!to_int32(self.to_number(&value)?))))
            }
        }
    }

    fn evaluate_update(&self, update: &UpdateExpression, scope: &Scope) -> Result<JsValue, JsError> {
        let reference = self.resolve_target(&update.argument, scope)?;
        let old = self.to_number(&self.read_reference(&reference, update.span, scope)?)?;
        let new = match update.operator {
            UpdateOp::Increment => old + 1.0,
            UpdateOp::Decrement => old - 1.0,
        };
        self.write_reference(reference, JsValue::Number(new), update.span, scope)?;
        Ok(JsValue::Number(if update.prefix { new } else { old }))
    }

    fn evaluate_binary(&self, binary: &BinaryExpression, scope: &Scope) -> Result<JsValue, JsError> {
        let left = self.evaluate(&binary.left, scope)?;
        let right = self.evaluate(&binary.right, scope)?;
        if binary.operator == BinaryOp::Instanceof && !right.is_callable() {
            return Err(JsError::type_error(format!(
                "Right-hand side of 'instanceof' is not callable: {}",
                self.describe(&binary.right, scope)
            )));
        }
        self.apply_binary(binary.operator, &left, &right)
    }

    fn evaluate_logical(&self, logical: &LogicalExpression, scope: &Scope) -> Result<JsValue, JsError> {
        let left = self.evaluate(&logical.left, scope)?;
        let short_circuit = match logical.operator {
            LogicalOp::And => !left.to_boolean(),
            LogicalOp::Or => left.to_boolean(),
            LogicalOp::NullishCoalescing => !left.is_null_or_undefined(),
        };
        if short_circuit {
            Ok(left)
        } else {
            self.evaluate(&logical.right, scope)
        }
    }

    fn evaluate_assignment(&self, assign: &AssignmentExpression, scope: &Scope) -> Result<JsValue, JsError> {
        let reference = self.resolve_target(&assign.left, scope)?;
        let value = match assign.operator.binary_op() {
            None => self.evaluate(&assign.right, scope)?,
            Some(op) => {
                let current = self.read_reference(&reference, assign.span, scope)?;
                let right = self.evaluate(&assign.right, scope)?;
                self.apply_binary(op, &current, &right)?
            }
        };
        self.write_reference(reference, value.clone(), assign.span, scope)?;
        Ok(value)
    }

    fn resolve_target<'a>(
        &self,
        target: &'a AssignmentTarget,
        scope: &Scope,
    ) -> Result<Reference<'a>, JsError> {
        match target {
            AssignmentTarget::Identifier(id) => Ok(Reference::Binding(&id.name)),
            AssignmentTarget::Member(member) => {
                let object = self.evaluate(&member.object, scope)?;
                let key = self.member_key(&member.property, scope)?;
                Ok(Reference::Property(object, key))
            }
        }
    }

    fn read_reference(&self, reference: &Reference<'_>, span: Span, scope: &Scope) -> Result<JsValue, JsError> {
        match reference {
            Reference::Binding(name) => self.lookup_identifier(name, scope),
            Reference::Property(object, key) => self.get_property(
                object,
                key,
                Some(Site {
                    unit: &scope.unit,
                    span,
                }),
            ),
        }
    }

    fn write_reference(
        &self,
        reference: Reference<'_>,
        value: JsValue,
        span: Span,
        scope: &Scope,
    ) -> Result<(), JsError> {
        match reference {
            Reference::Binding(name) => self.assign_identifier(name, value, scope),
            Reference::Property(object, key) => self.set_property(
                &object,
                key,
                value,
                Some(Site {
                    unit: &scope.unit,
                    span,
                }),
            ),
        }
    }

    fn member_key(&self, property: &MemberProperty, scope: &Scope) -> Result<JsString, JsError> {
        match property {
            MemberProperty::Identifier(name) => Ok(name.cheap_clone()),
            MemberProperty::Computed(expr) => {
                let key = self.evaluate(expr, scope)?;
                self.to_property_key(&key)
            }
        }
    }

    fn evaluate_member(&self, member: &MemberExpression, scope: &Scope) -> Result<JsValue, JsError> {
        let object = self.evaluate(&member.object, scope)?;
        let key = self.member_key(&member.property, scope)?;
        self.get_property(
            &object,
            &key,
            Some(Site {
                unit: &scope.unit,
                span: member.span,
            }),
        )
    }

    fn evaluate_arguments(&self, arguments: &[Expression], scope: &Scope) -> Result<Vec<JsValue>, JsError> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument, scope)?);
        }
        Ok(args)
    }

    fn evaluate_call(&self, call: &CallExpression, scope: &Scope) -> Result<JsValue, JsError> {
        let (callee, this) = match &call.callee {
            Expression::Member(member) => {
                let object = self.evaluate(&member.object, scope)?;
                let key = self.member_key(&member.property, scope)?;
                let site = Site {
                    unit: &scope.unit,
                    span: member.span,
                };
                (self.get_property(&object, &key, Some(site))?, object)
            }
            other => (self.evaluate(other, scope)?, JsValue::Undefined),
        };
        let args = self.evaluate_arguments(&call.arguments, scope)?;

        if !callee.is_callable() {
            return Err(JsError::type_error(format!(
                "{} is not a function",
                self.describe(&call.callee, scope)
            )));
        }
        let site = Site {
            unit: &scope.unit,
            span: call.span,
        };
        self.call_function(&callee, this, &args, Some(site), Side::Guest)
    }

    fn evaluate_new(&self, new_expr: &NewExpression, scope: &Scope) -> Result<JsValue, JsError> {
        let callee = self.evaluate(&new_expr.callee, scope)?;
        let args = self.evaluate_arguments(&new_expr.arguments, scope)?;
        let site = Site {
            unit: &scope.unit,
            span: new_expr.span,
        };
        self.construct(&callee, &args, Some(site), &|| self.describe(&new_expr.callee, scope))
    }

    /// Literal text of `expr`, for error messages.
    fn describe(&self, expr: &Expression, scope: &Scope) -> String {
        match expr.span() {
            Some(span) => span.slice(scope.unit.text()).to_string(),
            None => "expression".to_string(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════

    fn classify(&self, callee: &JsValue) -> Option<(JsObjectRef, Callee)> {
        let JsValue::Object(obj) = callee else {
            return None;
        };
        let target = match &obj.borrow().exotic {
            ExoticObject::Function(function) => Callee::Function(function.clone()),
            ExoticObject::Foreign {
                handle,
                callable: true,
            } => Callee::Foreign(*handle),
            _ => return None,
        };
        Some((obj.cheap_clone(), target))
    }

    /// Call `callee`. `caller` is the side making the call; `site` is the
    /// call expression when the call comes from guest source.
    pub(crate) fn call_function(
        &self,
        callee: &JsValue,
        this: JsValue,
        args: &[JsValue],
        site: Option<Site<'_>>,
        caller: Side,
    ) -> Result<JsValue, JsError> {
        let Some((obj, target)) = self.classify(callee) else {
            return Err(JsError::type_error(format!(
                "{} is not a function",
                self.display_string(callee)
            )));
        };
        let _depth = self.enter_call()?;
        match target {
            Callee::Function(JsFunction::Interpreted(function)) => {
                self.call_interpreted(&function, this, args, caller)
            }
            Callee::Function(JsFunction::Native(native)) => (native.func)(
                self,
                &NativeCall {
                    this: &this,
                    args,
                    callee: &obj,
                    constructing: false,
                },
            ),
            Callee::Foreign(handle) => self.call_foreign(handle, this, args, site),
        }
    }

    fn call_interpreted(
        &self,
        function: &Rc<InterpretedFunction>,
        this: JsValue,
        args: &[JsValue],
        caller: Side,
    ) -> Result<JsValue, JsError> {
        let source = self.function_source(function);
        let name = function.node.name.as_ref().map(|name| name.to_string());
        let _frame = frame::push(SyntheticFrame::new(caller, FrameKind::Function, name, source));

        let env = Environment::child(&function.closure, ScopeKind::Function);
        for (i, param) in function.node.params.iter().enumerate() {
            env.declare(
                param.cheap_clone(),
                args.get(i).cloned().unwrap_or_default(),
                true,
            );
        }
        let this = match &function.captured_this {
            Some(captured) => captured.clone(),
            None if this.is_null_or_undefined() => JsValue::Object(self.realm.global.cheap_clone()),
            None => this,
        };
        let scope = Scope {
            env,
            this,
            unit: function.unit.cheap_clone(),
        };

        match &function.node.body {
            FunctionBody::Expression(expr) => self.evaluate(expr, &scope),
            FunctionBody::Block(stmts) => {
                self.hoist_declarations(stmts, &scope);
                match self.execute_statements(stmts, &scope)? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(JsValue::Undefined),
                }
            }
        }
    }

    /// `new callee(...args)`. `describe` names the callee in errors.
    pub(crate) fn construct(
        &self,
        callee: &JsValue,
        args: &[JsValue],
        site: Option<Site<'_>>,
        describe: &dyn Fn() -> String,
    ) -> Result<JsValue, JsError> {
        let not_a_constructor = || JsError::type_error(format!("{} is not a constructor", describe()));
        let Some((obj, target)) = self.classify(callee) else {
            return Err(not_a_constructor());
        };
        let _depth = self.enter_call()?;
        match target {
            Callee::Function(JsFunction::Interpreted(function)) => {
                if function.node.is_arrow {
                    return Err(not_a_constructor());
                }
                let prototype = match obj.borrow().get_property("prototype") {
                    Some(JsValue::Object(prototype)) => prototype,
                    _ => self.realm.object_prototype.cheap_clone(),
                };
                let instance = self.alloc(Some(prototype), ExoticObject::Ordinary);
                let result = self.call_interpreted(
                    &function,
                    JsValue::Object(instance.cheap_clone()),
                    args,
                    Side::Guest,
                )?;
                Ok(match result {
                    JsValue::Object(_) => result,
                    _ => JsValue::Object(instance),
                })
            }
            Callee::Function(JsFunction::Native(native)) if native.constructor => (native.func)(
                self,
                &NativeCall {
                    this: &JsValue::Undefined,
                    args,
                    callee: &obj,
                    constructing: true,
                },
            ),
            Callee::Function(JsFunction::Native(_)) => Err(not_a_constructor()),
            Callee::Foreign(handle) => self.construct_foreign(handle, args, site, describe),
        }
    }

    /// `value instanceof constructor`
    pub(crate) fn instance_of(&self, value: &JsValue, constructor: &JsValue) -> Result<bool, JsError> {
        let Some((ctor, target)) = self.classify(constructor) else {
            return Err(JsError::type_error(
                "Right-hand side of 'instanceof' is not callable",
            ));
        };
        if let Callee::Foreign(handle) = target {
            return Ok(self.foreign_instance_of(handle, value));
        }
        let JsValue::Object(obj) = value else {
            return Ok(false);
        };
        let prototype = match ctor.borrow().get_property("prototype") {
            Some(JsValue::Object(prototype)) => prototype,
            _ => {
                return Err(JsError::type_error(
                    "Function has non-object prototype in instanceof check",
                ));
            }
        };
        let mut current = obj.borrow().prototype.clone();
        while let Some(proto) = current {
            if Rc::ptr_eq(&proto, &prototype) {
                return Ok(true);
            }
            current = proto.borrow().prototype.clone();
        }
        Ok(false)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Properties
    // ═══════════════════════════════════════════════════════════════════════

    pub(crate) fn get_property(
        &self,
        target: &JsValue,
        key: &JsString,
        site: Option<Site<'_>>,
    ) -> Result<JsValue, JsError> {
        match target {
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                target.to_js_string(),
                key
            ))),
            JsValue::String(s) => {
                if key == "length" {
                    return Ok(JsValue::from(s.utf16_len()));
                }
                if let Some(index) = key.as_index() {
                    return Ok(s
                        .as_str()
                        .encode_utf16()
                        .nth(index)
                        .map_or(JsValue::Undefined, |unit| {
                            JsValue::from(String::from_utf16_lossy(&[unit]))
                        }));
                }
                Ok(self
                    .realm
                    .string_prototype
                    .borrow()
                    .get_property(key)
                    .unwrap_or_default())
            }
            JsValue::Boolean(_) | JsValue::Number(_) => Ok(self
                .realm
                .object_prototype
                .borrow()
                .get_property(key)
                .unwrap_or_default()),
            JsValue::Object(obj) => self.get_object_property(obj, key, site),
        }
    }

    fn get_object_property(
        &self,
        obj: &JsObjectRef,
        key: &JsString,
        site: Option<Site<'_>>,
    ) -> Result<JsValue, JsError> {
        if let Some(handle) = foreign_handle(obj) {
            return self.get_foreign(handle, key, site);
        }
        let o = obj.borrow();
        match &o.exotic {
            ExoticObject::Array(elements) => {
                if key == "length" {
                    return Ok(JsValue::from(elements.len()));
                }
                if let Some(value) = key.as_index().and_then(|index| elements.get(index)) {
                    return Ok(value.clone());
                }
            }
            ExoticObject::Function(function) if !o.properties.contains_key(key) => {
                if key == "name" {
                    return Ok(JsValue::from(function.name().unwrap_or("")));
                }
                if key == "length" {
                    return Ok(JsValue::from(match function {
                        JsFunction::Interpreted(f) => f.node.params.len(),
                        JsFunction::Native(f) => f.arity,
                    }));
                }
            }
            _ => {}
        }
        Ok(o.get_property(key).unwrap_or_default())
    }

    pub(crate) fn set_property(
        &self,
        target: &JsValue,
        key: JsString,
        value: JsValue,
        site: Option<Site<'_>>,
    ) -> Result<(), JsError> {
        let obj = match target {
            JsValue::Undefined | JsValue::Null => {
                return Err(JsError::type_error(format!(
                    "Cannot set properties of {} (setting '{}')",
                    target.to_js_string(),
                    key
                )));
            }
            JsValue::Object(obj) => obj,
            // Writes to primitives are dropped
            _ => return Ok(()),
        };
        if let Some(handle) = foreign_handle(obj) {
            return self.set_foreign(handle, &key, value, site);
        }

        let mut o = obj.borrow_mut();
        if let ExoticObject::Array(elements) = &mut o.exotic {
            if key == "length" {
                let length = array_length(value.to_number(), elements.len())?;
                elements.resize(length, JsValue::Undefined);
                return Ok(());
            }
            if let Some(index) = key.as_index() {
                if let Some(slot) = elements.get_mut(index) {
                    *slot = value;
                    return Ok(());
                }
                if index <= elements.len().saturating_add(MAX_ARRAY_GAP) {
                    elements.resize(index, JsValue::Undefined);
                    elements.push(value);
                    return Ok(());
                }
            }
        }
        o.set_property(key, value);
        Ok(())
    }

    pub(crate) fn delete_property(&self, target: &JsValue, key: &JsString) -> Result<bool, JsError> {
        let JsValue::Object(obj) = target else {
            return Ok(true);
        };
        if foreign_handle(obj).is_some() {
            return Ok(false);
        }
        let mut o = obj.borrow_mut();
        if let ExoticObject::Array(elements) = &mut o.exotic
            && let Some(slot) = key.as_index().and_then(|index| elements.get_mut(index))
        {
            *slot = JsValue::Undefined;
            return Ok(true);
        }
        let removed = o.properties.shift_remove(key);
        drop(o);
        drop(removed);
        Ok(true)
    }

    /// The `in` operator.
    pub(crate) fn has_property(&self, obj: &JsObjectRef, key: &JsString) -> Result<bool, JsError> {
        if let Some(handle) = foreign_handle(obj) {
            return self.has_foreign(handle, key);
        }
        if obj.borrow().has_own_property(key) {
            return Ok(true);
        }
        let mut current = obj.borrow().prototype.clone();
        while let Some(proto) = current {
            if proto.borrow().has_own_property(key) {
                return Ok(true);
            }
            current = proto.borrow().prototype.clone();
        }
        Ok(false)
    }

    pub(crate) fn own_keys(&self, obj: &JsObjectRef) -> Result<Vec<JsString>, JsError> {
        if let Some(handle) = foreign_handle(obj) {
            return self.foreign_keys(handle);
        }
        Ok(obj.borrow().own_keys())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Conversions
    // ═══════════════════════════════════════════════════════════════════════

    /// ToPrimitive. Objects go through their `toString` method.
    pub(crate) fn to_primitive(&self, value: &JsValue) -> Result<JsValue, JsError> {
        let JsValue::Object(obj) = value else {
            return Ok(value.clone());
        };
        if foreign_handle(obj).is_some() {
            return Ok(JsValue::from(self.display_string(value)));
        }
        let to_string = self.get_object_property(obj, &self.intern("toString"), None)?;
        if to_string.is_callable() {
            let result = self.call_function(&to_string, value.clone(), &[], None, Side::Guest)?;
            if !matches!(result, JsValue::Object(_)) {
                return Ok(result);
            }
        }
        Ok(JsValue::from("[object Object]"))
    }

    pub(crate) fn to_number(&self, value: &JsValue) -> Result<f64, JsError> {
        Ok(self.to_primitive(value)?.to_number())
    }

    pub(crate) fn to_string(&self, value: &JsValue) -> Result<JsString, JsError> {
        Ok(self.to_primitive(value)?.to_js_string())
    }

    pub(crate) fn to_property_key(&self, value: &JsValue) -> Result<JsString, JsError> {
        match value {
            JsValue::String(s) => Ok(s.cheap_clone()),
            other => self.to_string(other),
        }
    }

    pub(crate) fn apply_binary(&self, op: BinaryOp, left: &JsValue, right: &JsValue) -> Result<JsValue, JsError> {
        Ok(match op {
            BinaryOp::Add => {
                let left = self.to_primitive(left)?;
                let right = self.to_primitive(right)?;
                if left.is_string() || right.is_string() {
                    JsValue::String(left.to_js_string() + &right.to_js_string())
                } else {
                    JsValue::Number(left.to_number() + right.to_number())
                }
            }
            BinaryOp::Sub => JsValue::Number(self.to_number(left)? - self.to_number(right)?),
            BinaryOp::Mul => JsValue::Number(self.to_number(left)? * self.to_number(right)?),
            BinaryOp::Div => JsValue::Number(self.to_number(left)? / self.to_number(right)?),
            BinaryOp::Mod => JsValue::Number(self.to_number(left)? % self.to_number(right)?),
            BinaryOp::Exp => JsValue::Number(self.to_number(left)?.powf(self.to_number(right)?)),

            BinaryOp::Eq => JsValue::Boolean(self.loose_equals(left, right)?),
            BinaryOp::NotEq => JsValue::Boolean(!self.loose_equals(left, right)?),
            BinaryOp::StrictEq => JsValue::Boolean(left.strict_equals(right)),
            BinaryOp::StrictNotEq => JsValue::Boolean(!left.strict_equals(right)),

            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                JsValue::Boolean(self.compare(op, left, right)?)
            }

            BinaryOp::BitAnd => int32_op(self, left, right, |a, b| a & b)?,
            BinaryOp::BitOr => int32_op(self, left, right, |a, b| a | b)?,
            BinaryOp::BitXor => int32_op(self, left, right, |a, b| a ^ b)?,
            BinaryOp::LShift => int32_op(self, left, right, |a, b| a.wrapping_shl(b as u32 & 31))?,
            BinaryOp::RShift => int32_op(self, left, right, |a, b| a.wrapping_shr(b as u32 & 31))?,
            BinaryOp::URShift => {
                let a = to_uint32(self.to_number(left)?);
                let b = to_uint32(self.to_number(right)?);
                JsValue::Number(f64::from(a.wrapping_shr(b & 31)))
            }

            BinaryOp::In => {
                let JsValue::Object(obj) = right else {
                    return Err(JsError::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        left.to_js_string(),
                        right.to_js_string()
                    )));
                };
                let key = self.to_property_key(left)?;
                JsValue::Boolean(self.has_property(obj, &key)?)
            }
            BinaryOp::Instanceof => JsValue::Boolean(self.instance_of(left, right)?),
        })
    }

    fn compare(&self, op: BinaryOp, left: &JsValue, right: &JsValue) -> Result<bool, JsError> {
        let left = self.to_primitive(left)?;
        let right = self.to_primitive(right)?;
        let ordering = match (&left, &right) {
            (JsValue::String(a), JsValue::String(b)) => Some(a.as_str().cmp(b.as_str())),
            _ => left.to_number().partial_cmp(&right.to_number()),
        };
        Ok(match (op, ordering) {
            (_, None) => false,
            (BinaryOp::Lt, Some(o)) => o == CmpOrdering::Less,
            (BinaryOp::LtEq, Some(o)) => o != CmpOrdering::Greater,
            (BinaryOp::Gt, Some(o)) => o == CmpOrdering::Greater,
            (BinaryOp::GtEq, Some(o)) => o != CmpOrdering::Less,
            _ => false,
        })
    }

    /// Abstract equality (`==`)
    pub(crate) fn loose_equals(&self, left: &JsValue, right: &JsValue) -> Result<bool, JsError> {
        Ok(match (left, right) {
            (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => true,
            (JsValue::Undefined | JsValue::Null, _) | (_, JsValue::Undefined | JsValue::Null) => false,
            (JsValue::Number(a), JsValue::String(_)) => *a == right.to_number(),
            (JsValue::String(_), JsValue::Number(b)) => left.to_number() == *b,
            (JsValue::Boolean(b), _) => {
                return self.loose_equals(&JsValue::Number(f64::from(u8::from(*b))), right);
            }
            (_, JsValue::Boolean(b)) => {
                return self.loose_equals(left, &JsValue::Number(f64::from(u8::from(*b))));
            }
            (JsValue::Object(_), JsValue::Object(_)) => left.strict_equals(right),
            (JsValue::Object(_), _) => return self.loose_equals(&self.to_primitive(left)?, right),
            (_, JsValue::Object(_)) => return self.loose_equals(left, &self.to_primitive(right)?),
            _ => left.strict_equals(right),
        })
    }

    /// Human-readable form of a value that never runs guest code.
    pub(crate) fn display_string(&self, value: &JsValue) -> String {
        let JsValue::Object(obj) = value else {
            return value.to_js_string().to_string();
        };
        if let Some(handle) = foreign_handle(obj) {
            return self.describe_foreign(handle);
        }
        let o = obj.borrow();
        match &o.exotic {
            ExoticObject::Function(function) => {
                format!("function {}() {{ [native code] }}", function.name().unwrap_or(""))
            }
            ExoticObject::Array(_) => "[object Array]".to_string(),
            ExoticObject::Error { .. } => {
                let name = o.get_property("name").map(|v| v.to_js_string());
                let message = o.get_property("message").map(|v| v.to_js_string());
                match (name, message) {
                    (Some(name), Some(message)) if !message.is_empty() => {
                        format!("{}: {}", name, message)
                    }
                    (Some(name), _) => name.to_string(),
                    (None, _) => "Error".to_string(),
                }
            }
            _ => "[object Object]".to_string(),
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Array writes further than this past the end are stored as plain
/// properties.
const MAX_ARRAY_GAP: usize = 1 << 20;

/// Check a new length for an array of `current` elements. Arrays are dense,
/// so growth is bounded like index writes.
pub(crate) fn array_length(length: f64, current: usize) -> Result<usize, JsError> {
    if length < 0.0 || length.fract() != 0.0 || length > f64::from(u32::MAX) {
        return Err(JsError::range_error("Invalid array length"));
    }
    let length = length as usize;
    if length > current.saturating_add(MAX_ARRAY_GAP) {
        return Err(JsError::range_error("Invalid array length"));
    }
    Ok(length)
}

fn foreign_handle(obj: &JsObjectRef) -> Option<HandleId> {
    match &obj.borrow().exotic {
        ExoticObject::Foreign { handle, .. } => Some(*handle),
        _ => None,
    }
}

/// The host exception a guest value stands for, if any.
pub(crate) fn host_exception_of(value: &JsValue) -> Option<crate::exception::Exception> {
    let JsValue::Object(obj) = value else {
        return None;
    };
    match &obj.borrow().exotic {
        ExoticObject::Error { host } => host.clone(),
        _ => None,
    }
}

fn collect_var_names(stmt: &Statement, names: &mut Vec<JsString>) {
    match stmt {
        Statement::VariableDeclaration(decl) if decl.kind == VariableKind::Var => {
            names.extend(decl.declarations.iter().map(|d| d.name.cheap_clone()));
        }
        Statement::Block(block) => {
            for stmt in block.body.iter() {
                collect_var_names(stmt, names);
            }
        }
        Statement::If(if_stmt) => {
            collect_var_names(&if_stmt.consequent, names);
            if let Some(alternate) = &if_stmt.alternate {
                collect_var_names(alternate, names);
            }
        }
        Statement::While(while_stmt) => collect_var_names(&while_stmt.body, names),
        Statement::DoWhile(do_while) => collect_var_names(&do_while.body, names),
        Statement::For(for_stmt) => {
            if let Some(ForInit::Variable(decl)) = &for_stmt.init
                && decl.kind == VariableKind::Var
            {
                names.extend(decl.declarations.iter().map(|d| d.name.cheap_clone()));
            }
            collect_var_names(&for_stmt.body, names);
        }
        Statement::ForOf(for_of) => {
            if for_of.kind == Some(VariableKind::Var) {
                names.push(for_of.binding.cheap_clone());
            }
            collect_var_names(&for_of.body, names);
        }
        Statement::Try(try_stmt) => {
            for stmt in try_stmt.block.body.iter() {
                collect_var_names(stmt, names);
            }
            if let Some(handler) = &try_stmt.handler {
                for stmt in handler.body.body.iter() {
                    collect_var_names(stmt, names);
                }
            }
            if let Some(finalizer) = &try_stmt.finalizer {
                for stmt in finalizer.body.iter() {
                    collect_var_names(stmt, names);
                }
            }
        }
        _ => {}
    }
}

pub(crate) fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

pub(crate) fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

fn int32_op(
    interp: &Interpreter,
    left: &JsValue,
    right: &JsValue,
    op: fn(i32, i32) -> i32,
) -> Result<JsValue, JsError> {
    let a = to_int32(interp.to_number(left)?);
    let b = to_int32(interp.to_number(right)?);
    Ok(JsValue::Number(f64::from(op(a, b))))
}
