//! Tree-walking evaluator.
//!
//! A [`Context`] plays the part of the document's "main object": it owns the
//! methods defined at the top level, the top-level locals and the captured
//! output of one snippet. Nothing is global, so dropping the context is the
//! whole teardown.

use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
    time::{Duration, Instant},
};

use super::ast::*;
use super::fault::{Fault, FaultKind};
use super::value::{lookup_class, Value};

type ScopeRef = Rc<RefCell<Scope>>;

/// Longest string a snippet may build by repetition, in bytes.
const MAX_STRING_LEN: usize = 1 << 24;

#[derive(Debug, Default)]
struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<ScopeRef>,
}

fn child_scope(parent: Option<ScopeRef>) -> ScopeRef {
    Rc::new(RefCell::new(Scope {
        vars: HashMap::new(),
        parent,
    }))
}

fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let mut cur = Some(scope.clone());
    while let Some(s) = cur {
        let s = s.borrow();
        if let Some(v) = s.vars.get(name) {
            return Some(v.clone());
        }
        cur = s.parent.clone();
    }
    None
}

/// Update the nearest scope that already binds `name`, else bind it in `scope`.
fn assign(scope: &ScopeRef, name: &str, value: Value) {
    let mut cur = Some(scope.clone());
    while let Some(s) = cur {
        if s.borrow().vars.contains_key(name) {
            s.borrow_mut().vars.insert(name.to_owned(), value);
            return;
        }
        cur = s.borrow().parent.clone();
    }
    scope.borrow_mut().vars.insert(name.to_owned(), value);
}

/// A block together with the scope it closes over.
#[derive(Debug)]
struct Closure {
    def: Rc<BlockDef>,
    scope: ScopeRef,
    /// The block of the method the closure was written in, for `yield`.
    outer_block: Option<Rc<Closure>>,
}

#[derive(Debug, Clone)]
struct Env {
    scope: ScopeRef,
    block: Option<Rc<Closure>>,
}

/// Non-local control flow, threaded through `Err`.
#[derive(Debug)]
enum Unwind {
    Return(Value),
    Break(Value),
    Next(Value),
    Fault(Fault),
}

impl From<Fault> for Unwind {
    fn from(f: Fault) -> Self {
        Unwind::Fault(f)
    }
}

impl Unwind {
    fn at(self, line: usize) -> Self {
        match self {
            Unwind::Fault(f) => Unwind::Fault(f.at(line)),
            other => other,
        }
    }
}

type Eval<T = Value> = Result<T, Unwind>;

enum Step {
    Continue(Value),
    Stop(Value),
}

pub struct Context {
    methods: HashMap<String, Rc<MethodDef>>,
    main_scope: ScopeRef,
    out: String,
    deadline: Option<(Instant, Duration)>,
    max_call_depth: usize,
    depth: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            main_scope: child_scope(None),
            out: String::new(),
            deadline: None,
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            depth: 0,
        }
    }

    /// Faults with `Timeout` once `limit` has elapsed from now.
    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.deadline = Some((Instant::now() + limit, limit));
        self
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.out)
    }

    pub fn run(&mut self, program: &Program) -> Result<Value, Fault> {
        let env = Env {
            scope: self.main_scope.clone(),
            block: None,
        };
        match self.eval_body(&program.body, &env) {
            Ok(v) | Err(Unwind::Return(v)) => Ok(v),
            Err(Unwind::Break(_)) => Err(Fault::new(FaultKind::LocalJumpError, "break from proc-closure")),
            Err(Unwind::Next(_)) => Err(Fault::new(FaultKind::LocalJumpError, "next used outside of a block")),
            Err(Unwind::Fault(f)) => Err(f),
        }
    }

    /// Call a method defined on the main object, without arguments.
    pub fn invoke(&mut self, name: &str) -> Result<Value, Fault> {
        let Some(def) = self.methods.get(name).cloned() else {
            return Err(Fault::name_error(name));
        };
        match self.invoke_method(&def, Vec::new(), None) {
            Ok(v) | Err(Unwind::Return(v)) | Err(Unwind::Break(v)) | Err(Unwind::Next(v)) => Ok(v),
            Err(Unwind::Fault(f)) => Err(f),
        }
    }

    fn tick(&self) -> Result<(), Fault> {
        match self.deadline {
            Some((deadline, limit)) if Instant::now() >= deadline => Err(Fault::timeout(limit)),
            _ => Ok(()),
        }
    }

    fn eval_body(&mut self, body: &[Expr], env: &Env) -> Eval {
        let mut last = Value::Nil;
        for expr in body {
            self.tick().map_err(|f| f.at(expr.line))?;
            last = self.eval(expr, env)?;
        }
        Ok(last)
    }

    fn eval(&mut self, expr: &Expr, env: &Env) -> Eval {
        self.eval_kind(&expr.kind, env).map_err(|u| u.at(expr.line))
    }

    fn eval_kind(&mut self, kind: &ExprKind, env: &Env) -> Eval {
        let v = match kind {
            ExprKind::Nil => Value::Nil,
            ExprKind::True => Value::Bool(true),
            ExprKind::False => Value::Bool(false),
            ExprKind::SelfRef => Value::Main,
            ExprKind::Int(n) => Value::Int(*n),
            ExprKind::Float(f) => Value::Float(*f),
            ExprKind::Symbol(s) => Value::Symbol(s.clone()),
            ExprKind::Str(parts) => {
                let mut s = String::new();
                for part in parts {
                    match part {
                        StrPart::Text(t) => s.push_str(t),
                        StrPart::Interp(body) => s += &self.eval_body(body, env)?.to_s(),
                    }
                }
                Value::Str(s)
            }
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, env)?);
                }
                Value::Array(values)
            }
            ExprKind::Const(name) => match lookup_class(name) {
                Some(class) => Value::Class(class),
                None => {
                    return Err(Fault::new(
                        FaultKind::NameError,
                        format!("uninitialized constant {}", name),
                    )
                    .into())
                }
            },
            ExprKind::Var(name) => lookup(&env.scope, name).unwrap_or(Value::Nil),
            ExprKind::Assign(name, rhs) => {
                let v = self.eval(rhs, env)?;
                assign(&env.scope, name, v.clone());
                v
            }
            ExprKind::OpAssign(name, op, rhs) => {
                let cur = lookup(&env.scope, name).unwrap_or(Value::Nil);
                let rhs = self.eval(rhs, env)?;
                let v = binary_op(*op, cur, rhs)?;
                assign(&env.scope, name, v.clone());
                v
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs, env)?;
                let r = self.eval(rhs, env)?;
                binary_op(*op, l, r)?
            }
            ExprKind::And(lhs, rhs) => {
                let l = self.eval(lhs, env)?;
                if l.is_truthy() {
                    self.eval(rhs, env)?
                } else {
                    l
                }
            }
            ExprKind::Or(lhs, rhs) => {
                let l = self.eval(lhs, env)?;
                if l.is_truthy() {
                    l
                } else {
                    self.eval(rhs, env)?
                }
            }
            ExprKind::Not(operand) => Value::Bool(!self.eval(operand, env)?.is_truthy()),
            ExprKind::Neg(operand) => match self.eval(operand, env)? {
                Value::Int(n) => Value::Int(n.wrapping_neg()),
                Value::Float(f) => Value::Float(-f),
                other => return Err(Fault::no_method("-@", &receiver_desc(&other)).into()),
            },
            ExprKind::Index(recv, index) => {
                let recv = self.eval(recv, env)?;
                let index = self.eval(index, env)?;
                self.call_method(recv, "[]", vec![index], None, env)?
            }
            ExprKind::Call(call) => self.eval_call(call, env)?,
            ExprKind::Yield(args) => {
                let Some(block) = env.block.clone() else {
                    return Err(Fault::new(FaultKind::LocalJumpError, "no block given (yield)").into());
                };
                let args = self.eval_args(args, env)?;
                self.invoke_block(&block, args)?
            }
            ExprKind::If {
                cond,
                then_body,
                else_body,
            } => {
                if self.eval(cond, env)?.is_truthy() {
                    self.eval_body(then_body, env)?
                } else if let Some(else_body) = else_body {
                    self.eval_body(else_body, env)?
                } else {
                    Value::Nil
                }
            }
            ExprKind::While { cond, body, negate } => {
                loop {
                    self.tick()?;
                    if self.eval(cond, env)?.is_truthy() == *negate {
                        break;
                    }
                    match self.eval_body(body, env) {
                        Ok(_) | Err(Unwind::Next(_)) => (),
                        Err(Unwind::Break(v)) => return Ok(v),
                        Err(e) => return Err(e),
                    }
                }
                Value::Nil
            }
            ExprKind::Begin(body) => self.eval_body(body, env)?,
            ExprKind::Def(def) => {
                self.methods.insert(def.name.clone(), def.clone());
                Value::Symbol(def.name.clone())
            }
            ExprKind::Return(v) => return Err(Unwind::Return(self.eval_opt(v, env)?)),
            ExprKind::Break(v) => return Err(Unwind::Break(self.eval_opt(v, env)?)),
            ExprKind::Next(v) => return Err(Unwind::Next(self.eval_opt(v, env)?)),
        };
        Ok(v)
    }

    fn eval_opt(&mut self, expr: &Option<Box<Expr>>, env: &Env) -> Eval {
        match expr {
            Some(e) => self.eval(e, env),
            None => Ok(Value::Nil),
        }
    }

    fn eval_args(&mut self, args: &[Expr], env: &Env) -> Eval<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, call: &Call, env: &Env) -> Eval {
        if call.bare {
            if let Some(v) = lookup(&env.scope, &call.name) {
                return Ok(v);
            }
        }
        let receiver = match &call.receiver {
            Some(r) => Some(self.eval(r, env)?),
            None => None,
        };
        let args = self.eval_args(&call.args, env)?;
        let block = call.block.as_ref().map(|def| {
            Rc::new(Closure {
                def: def.clone(),
                scope: env.scope.clone(),
                outer_block: env.block.clone(),
            })
        });

        match receiver {
            Some(recv) => self.call_method(recv, &call.name, args, block, env),
            None => {
                if let Some(def) = self.methods.get(&call.name).cloned() {
                    return self.invoke_method(&def, args, block);
                }
                match self.call_kernel(&call.name, &args, block.as_ref(), env)? {
                    Some(v) => Ok(v),
                    None if call.bare => Err(Fault::name_error(&call.name).into()),
                    None => Err(Fault::no_method(&call.name, "main:Object").into()),
                }
            }
        }
    }

    fn enter(&mut self) -> Result<(), Fault> {
        if self.depth >= self.max_call_depth {
            return Err(Fault::new(FaultKind::SystemStackError, "stack level too deep"));
        }
        self.depth += 1;
        Ok(())
    }

    fn invoke_method(
        &mut self,
        def: &MethodDef,
        args: Vec<Value>,
        block: Option<Rc<Closure>>,
    ) -> Eval {
        let (min, max) = (def.required_arity(), def.params.len());
        if args.len() < min || args.len() > max {
            return Err(Fault::argument_count(args.len(), min, max).at(def.line).into());
        }

        let env = Env {
            scope: child_scope(None),
            block,
        };
        self.enter()?;
        let res = self.invoke_method_body(def, args, &env);
        self.depth -= 1;

        match res {
            Ok(v) | Err(Unwind::Return(v)) => Ok(v),
            Err(Unwind::Break(_)) | Err(Unwind::Next(_)) => Err(Fault::new(
                FaultKind::SyntaxError,
                format!("Invalid break/next in method '{}'", def.name),
            )
            .into()),
            Err(e) => Err(e),
        }
    }

    fn invoke_method_body(&mut self, def: &MethodDef, args: Vec<Value>, env: &Env) -> Eval {
        let mut args = args.into_iter();
        for param in &def.params {
            let value = match (args.next(), &param.default) {
                (Some(v), _) => v,
                (None, Some(default)) => self.eval(default, env)?,
                (None, None) => Value::Nil,
            };
            env.scope.borrow_mut().vars.insert(param.name.clone(), value);
        }
        self.eval_body(&def.body, env)
    }

    fn invoke_block(&mut self, closure: &Closure, args: Vec<Value>) -> Eval {
        let scope = child_scope(Some(closure.scope.clone()));
        {
            let params = &closure.def.params;
            // a single array argument spreads over several block parameters
            let args = match args.as_slice() {
                [Value::Array(items)] if params.len() > 1 => items.clone(),
                _ => args,
            };
            let mut args = args.into_iter();
            let mut s = scope.borrow_mut();
            for p in params {
                s.vars.insert(p.clone(), args.next().unwrap_or(Value::Nil));
            }
        }
        let env = Env {
            scope,
            block: closure.outer_block.clone(),
        };

        self.enter()?;
        let res = self.eval_body(&closure.def.body, &env);
        self.depth -= 1;

        match res {
            Err(Unwind::Next(v)) => Ok(v),
            other => other,
        }
    }

    fn call_block(&mut self, block: &Closure, args: Vec<Value>) -> Eval<Step> {
        self.tick()?;
        match self.invoke_block(block, args) {
            Ok(v) => Ok(Step::Continue(v)),
            Err(Unwind::Break(v)) => Ok(Step::Stop(v)),
            Err(e) => Err(e),
        }
    }

    fn write_puts(&mut self, v: &Value) {
        match v {
            Value::Array(items) if !items.is_empty() => {
                for item in items {
                    self.write_puts(item);
                }
            }
            Value::Array(_) => self.out.push('\n'),
            other => {
                let s = other.to_s();
                self.out.push_str(&s);
                if !s.ends_with('\n') {
                    self.out.push('\n');
                }
            }
        }
    }

    /// Methods callable without a receiver. `None` if `name` is not one.
    fn call_kernel(
        &mut self,
        name: &str,
        args: &[Value],
        block: Option<&Rc<Closure>>,
        env: &Env,
    ) -> Eval<Option<Value>> {
        let v = match name {
            "puts" => {
                if args.is_empty() {
                    self.out.push('\n');
                }
                for arg in args {
                    self.write_puts(arg);
                }
                Value::Nil
            }
            "print" => {
                for arg in args {
                    self.out.push_str(&arg.to_s());
                }
                Value::Nil
            }
            "p" => {
                for arg in args {
                    self.out.push_str(&arg.inspect());
                    self.out.push('\n');
                }
                match args {
                    [] => Value::Nil,
                    [one] => one.clone(),
                    many => Value::Array(many.to_vec()),
                }
            }
            "raise" => {
                let fault = match args {
                    [] => Fault::new(FaultKind::RuntimeError, "unhandled exception"),
                    [Value::Str(msg)] => Fault::new(FaultKind::RuntimeError, msg.clone()),
                    [Value::Class(class)] => Fault::new(class.parse().unwrap_or(FaultKind::RuntimeError), *class),
                    [Value::Class(class), msg, ..] => {
                        Fault::new(class.parse().unwrap_or(FaultKind::RuntimeError), msg.to_s())
                    }
                    _ => Fault::type_error("exception class/object expected"),
                };
                return Err(fault.into());
            }
            "loop" => {
                let Some(block) = block else {
                    return Err(Fault::new(FaultKind::LocalJumpError, "no block given (loop)").into());
                };
                loop {
                    if let Step::Stop(v) = self.call_block(block, vec![])? {
                        break v;
                    }
                }
            }
            "block_given?" => Value::Bool(env.block.is_some()),
            "sleep" => {
                let secs = match args {
                    [Value::Int(n)] if *n >= 0 => *n as f64,
                    [Value::Float(f)] if *f >= 0.0 => *f,
                    _ => return Err(Fault::type_error("can't convert into time interval").into()),
                };
                let mut wanted = Duration::from_secs_f64(secs);
                if let Some((deadline, _)) = self.deadline {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    wanted = wanted.min(remaining + Duration::from_millis(1));
                }
                std::thread::sleep(wanted);
                self.tick()?;
                Value::Int(secs.round() as i64)
            }
            _ => return Ok(None),
        };
        Ok(Some(v))
    }

    fn call_method(
        &mut self,
        recv: Value,
        name: &str,
        args: Vec<Value>,
        block: Option<Rc<Closure>>,
        env: &Env,
    ) -> Eval {
        if let Some(op) = operator_method(name) {
            let [rhs] = expect_args::<1>(args)?;
            return Ok(binary_op(op, recv, rhs)?);
        }

        if recv == Value::Main {
            if let Some(def) = self.methods.get(name).cloned() {
                return self.invoke_method(&def, args, block);
            }
            if let Some(v) = self.call_kernel(name, &args, block.as_ref(), env)? {
                return Ok(v);
            }
        }

        let specific = match &recv {
            Value::Int(n) => self.int_method(*n, name, &args, block.as_deref())?,
            Value::Float(f) => float_method(*f, name, &args)?,
            Value::Str(s) => str_method(s, name, &args)?,
            Value::Symbol(s) => symbol_method(s, name, &args)?,
            Value::Array(items) => self.array_method(items, name, &args, block.as_deref())?,
            Value::Nil => nil_method(name, &args)?,
            Value::Class(class) => class_method(class, name, &args)?,
            _ => None,
        };
        if let Some(v) = specific {
            return Ok(v);
        }

        let v = match name {
            "class" => Value::Class(recv.class_name()),
            "inspect" => Value::Str(recv.inspect()),
            "to_s" => Value::Str(recv.to_s()),
            "nil?" => Value::Bool(recv.is_nil()),
            "itself" | "dup" | "freeze" => recv,
            "frozen?" => Value::Bool(!matches!(recv, Value::Array(_))),
            "is_a?" | "kind_of?" | "instance_of?" => {
                let [class] = expect_args::<1>(args)?;
                match class {
                    Value::Class(c) => Value::Bool(
                        c == recv.class_name() || (name != "instance_of?" && c == "Object"),
                    ),
                    _ => return Err(Fault::type_error("class or module required").into()),
                }
            }
            _ => return Err(Fault::no_method(name, &receiver_desc(&recv)).into()),
        };
        Ok(v)
    }

    fn int_method(
        &mut self,
        n: i64,
        name: &str,
        args: &[Value],
        block: Option<&Closure>,
    ) -> Eval<Option<Value>> {
        let v = match (name, args) {
            ("times", []) => {
                let Some(block) = block else {
                    return Err(Fault::new(FaultKind::LocalJumpError, "no block given (yield)").into());
                };
                for i in 0..n.max(0) {
                    if let Step::Stop(v) = self.call_block(block, vec![Value::Int(i)])? {
                        return Ok(Some(v));
                    }
                }
                Value::Nil
            }
            ("to_i" | "floor" | "ceil" | "round", []) => Value::Int(n),
            ("to_f", []) => Value::Float(n as f64),
            ("even?", []) => Value::Bool(n % 2 == 0),
            ("odd?", []) => Value::Bool(n % 2 != 0),
            ("zero?", []) => Value::Bool(n == 0),
            ("abs", []) => Value::Int(n.wrapping_abs()),
            ("succ" | "next", []) => Value::Int(n.wrapping_add(1)),
            ("pred", []) => Value::Int(n.wrapping_sub(1)),
            _ => return Ok(None),
        };
        Ok(Some(v))
    }

    fn array_method(
        &mut self,
        items: &[Value],
        name: &str,
        args: &[Value],
        block: Option<&Closure>,
    ) -> Eval<Option<Value>> {
        let need_block = || -> Unwind {
            Fault::new(FaultKind::LocalJumpError, "no block given (yield)").into()
        };
        let v = match (name, args) {
            ("each", []) => {
                let block = block.ok_or_else(need_block)?;
                for item in items {
                    if let Step::Stop(v) = self.call_block(block, vec![item.clone()])? {
                        return Ok(Some(v));
                    }
                }
                Value::Nil
            }
            ("each_with_index", []) => {
                let block = block.ok_or_else(need_block)?;
                for (i, item) in items.iter().enumerate() {
                    let args = vec![item.clone(), Value::Int(i as i64)];
                    if let Step::Stop(v) = self.call_block(block, args)? {
                        return Ok(Some(v));
                    }
                }
                Value::Nil
            }
            ("map" | "collect", []) => {
                let block = block.ok_or_else(need_block)?;
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    match self.call_block(block, vec![item.clone()])? {
                        Step::Continue(v) => mapped.push(v),
                        Step::Stop(v) => return Ok(Some(v)),
                    }
                }
                Value::Array(mapped)
            }
            ("select" | "filter" | "reject", []) => {
                let block = block.ok_or_else(need_block)?;
                let keep_truthy = name != "reject";
                let mut kept = Vec::new();
                for item in items {
                    match self.call_block(block, vec![item.clone()])? {
                        Step::Continue(v) if v.is_truthy() == keep_truthy => kept.push(item.clone()),
                        Step::Continue(_) => (),
                        Step::Stop(v) => return Ok(Some(v)),
                    }
                }
                Value::Array(kept)
            }
            ("sum", []) => {
                let mut acc = Value::Int(0);
                for item in items {
                    acc = binary_op(BinOp::Add, acc, item.clone())?;
                }
                acc
            }
            ("length" | "size" | "count", []) => Value::Int(items.len() as i64),
            ("first", []) => items.first().cloned().unwrap_or(Value::Nil),
            ("last", []) => items.last().cloned().unwrap_or(Value::Nil),
            ("empty?", []) => Value::Bool(items.is_empty()),
            ("reverse", []) => Value::Array(items.iter().rev().cloned().collect()),
            ("include?", [x]) => Value::Bool(items.iter().any(|i| i.loose_eq(x))),
            ("join", []) => Value::Str(join_values(items, "")),
            ("join", [Value::Str(sep)]) => Value::Str(join_values(items, sep)),
            ("[]", [Value::Int(i)]) => index_of(items.len(), *i)
                .map(|i| items[i].clone())
                .unwrap_or(Value::Nil),
            ("uniq", []) => {
                let mut seen: Vec<Value> = Vec::new();
                for item in items {
                    if !seen.contains(item) {
                        seen.push(item.clone());
                    }
                }
                Value::Array(seen)
            }
            ("sort", []) => {
                let mut sorted = items.to_vec();
                let mut failure = None;
                sorted.sort_by(|a, b| {
                    compare(a, b).unwrap_or_else(|f| {
                        failure.get_or_insert(f);
                        std::cmp::Ordering::Equal
                    })
                });
                if let Some(f) = failure {
                    return Err(f.into());
                }
                Value::Array(sorted)
            }
            ("min" | "max", []) => {
                let mut best: Option<&Value> = None;
                for item in items {
                    best = match best {
                        None => Some(item),
                        Some(b) => {
                            let ord = compare(item, b)?;
                            let better = if name == "min" { ord.is_lt() } else { ord.is_gt() };
                            Some(if better { item } else { b })
                        }
                    };
                }
                best.cloned().unwrap_or(Value::Nil)
            }
            _ => return Ok(None),
        };
        Ok(Some(v))
    }
}

fn receiver_desc(v: &Value) -> String {
    match v {
        Value::Nil => "nil".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Main => "main:Object".to_owned(),
        Value::Class(name) => format!("class {}", name),
        other => format!("an instance of {}", other.class_name()),
    }
}

fn operator_method(name: &str) -> Option<BinOp> {
    use BinOp::*;
    Some(match name {
        "+" => Add,
        "-" => Sub,
        "*" => Mul,
        "/" => Div,
        "%" => Rem,
        "==" => Eq,
        "!=" => NotEq,
        "<" => Lt,
        "<=" => LtEq,
        ">" => Gt,
        ">=" => GtEq,
        _ => return None,
    })
}

fn expect_args<const N: usize>(args: Vec<Value>) -> Result<[Value; N], Fault> {
    let given = args.len();
    args.try_into()
        .map_err(|_| Fault::argument_count(given, N, N))
}

fn index_of(len: usize, i: i64) -> Option<usize> {
    let idx = if i < 0 { len as i64 + i } else { i };
    (0..len as i64).contains(&idx).then_some(idx as usize)
}

fn join_values(items: &[Value], sep: &str) -> String {
    items
        .iter()
        .map(|v| match v {
            Value::Array(inner) => join_values(inner, sep),
            other => other.to_s(),
        })
        .collect::<Vec<_>>()
        .join(sep)
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, Fault> {
    use Value::*;
    let ord = match (a, b) {
        (Int(x), Int(y)) => Some(x.cmp(y)),
        (Int(x), Float(y)) => (*x as f64).partial_cmp(y),
        (Float(x), Int(y)) => x.partial_cmp(&(*y as f64)),
        (Float(x), Float(y)) => x.partial_cmp(y),
        (Str(x), Str(y)) => Some(x.cmp(y)),
        _ => None,
    };
    ord.ok_or_else(|| {
        Fault::new(
            FaultKind::ArgumentError,
            format!("comparison of {} with {} failed", a.class_name(), b.inspect()),
        )
    })
}

fn coerce_name(v: &Value) -> String {
    match v {
        Value::Nil => "nil".to_owned(),
        other => other.class_name().to_owned(),
    }
}

fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn floor_rem(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

fn overflow() -> Fault {
    Fault::new(FaultKind::Other("RangeError".to_owned()), "integer overflow")
}

pub(crate) fn binary_op(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, Fault> {
    use Value::*;
    match op {
        BinOp::Eq => return Ok(Bool(lhs.loose_eq(&rhs))),
        BinOp::NotEq => return Ok(Bool(!lhs.loose_eq(&rhs))),
        BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            if !matches!(lhs, Int(_) | Float(_) | Str(_)) {
                return Err(Fault::no_method(op.method_name(), &receiver_desc(&lhs)));
            }
            let ord = compare(&lhs, &rhs)?;
            let res = match op {
                BinOp::Lt => ord.is_lt(),
                BinOp::LtEq => ord.is_le(),
                BinOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            };
            return Ok(Bool(res));
        }
        _ => (),
    }

    match (lhs, rhs) {
        (Int(a), Int(b)) => {
            let v = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                BinOp::Div | BinOp::Rem if b == 0 => {
                    return Err(Fault::new(FaultKind::ZeroDivisionError, "divided by 0"))
                }
                BinOp::Div => Some(floor_div(a, b)),
                BinOp::Rem => Some(floor_rem(a, b)),
                _ => unreachable!("comparison handled above"),
            };
            v.map(Int).ok_or_else(overflow)
        }
        (lhs @ (Int(_) | Float(_)), rhs @ (Int(_) | Float(_))) => {
            let as_f = |v: &Value| match v {
                Int(n) => *n as f64,
                Float(f) => *f,
                _ => f64::NAN,
            };
            let (a, b) = (as_f(&lhs), as_f(&rhs));
            Ok(Float(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Rem => a - b * (a / b).floor(),
                _ => unreachable!("comparison handled above"),
            }))
        }
        (lhs @ (Int(_) | Float(_)), rhs) => Err(Fault::type_error(format!(
            "{} can't be coerced into {}",
            coerce_name(&rhs),
            lhs.class_name()
        ))),
        (Str(a), Str(b)) if op == BinOp::Add => Ok(Str(a + &b)),
        (Str(a), Int(n)) if op == BinOp::Mul => {
            if n < 0 {
                return Err(Fault::new(FaultKind::ArgumentError, "negative argument"));
            }
            match usize::try_from(n).ok().and_then(|n| a.len().checked_mul(n)) {
                Some(len) if len <= MAX_STRING_LEN => Ok(Str(a.repeat(n as usize))),
                _ => Err(Fault::new(FaultKind::ArgumentError, "argument too big")),
            }
        }
        (Str(_), rhs) if op == BinOp::Add => Err(Fault::type_error(format!(
            "no implicit conversion of {} into String",
            coerce_name(&rhs)
        ))),
        (Array(mut a), Array(b)) if op == BinOp::Add => {
            a.extend(b);
            Ok(Array(a))
        }
        (Array(a), Array(b)) if op == BinOp::Sub => {
            Ok(Array(a.into_iter().filter(|x| !b.contains(x)).collect()))
        }
        (lhs, _) => Err(Fault::no_method(op.method_name(), &receiver_desc(&lhs))),
    }
}

fn float_method(f: f64, name: &str, args: &[Value]) -> Result<Option<Value>, Fault> {
    let v = match (name, args) {
        ("to_f", []) => Value::Float(f),
        ("to_i", []) => Value::Int(f.trunc() as i64),
        ("round", []) => Value::Int(f.round() as i64),
        ("floor", []) => Value::Int(f.floor() as i64),
        ("ceil", []) => Value::Int(f.ceil() as i64),
        ("abs", []) => Value::Float(f.abs()),
        ("zero?", []) => Value::Bool(f == 0.0),
        _ => return Ok(None),
    };
    Ok(Some(v))
}

fn str_method(s: &str, name: &str, args: &[Value]) -> Result<Option<Value>, Fault> {
    let v = match (name, args) {
        ("length" | "size", []) => Value::Int(s.chars().count() as i64),
        ("upcase", []) => Value::Str(s.to_uppercase()),
        ("downcase", []) => Value::Str(s.to_lowercase()),
        ("capitalize", []) => {
            let mut chars = s.chars();
            Value::Str(match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            })
        }
        ("reverse", []) => Value::Str(s.chars().rev().collect()),
        ("strip", []) => Value::Str(s.trim().to_owned()),
        ("empty?", []) => Value::Bool(s.is_empty()),
        ("to_sym", []) => Value::Symbol(s.to_owned()),
        ("to_i", []) => Value::Int(leading_int(s)),
        ("chars", []) => Value::Array(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        ("split", []) => Value::Array(
            s.split_whitespace()
                .map(|w| Value::Str(w.to_owned()))
                .collect(),
        ),
        ("split", [Value::Str(sep)]) => Value::Array(
            s.split(sep.as_str())
                .map(|w| Value::Str(w.to_owned()))
                .collect(),
        ),
        ("include?", [Value::Str(x)]) => Value::Bool(s.contains(x.as_str())),
        ("start_with?", [Value::Str(x)]) => Value::Bool(s.starts_with(x.as_str())),
        ("end_with?", [Value::Str(x)]) => Value::Bool(s.ends_with(x.as_str())),
        ("include?" | "start_with?" | "end_with?", [other]) => {
            return Err(Fault::type_error(format!(
                "no implicit conversion of {} into String",
                coerce_name(other)
            )))
        }
        ("[]", [Value::Int(i)]) => {
            let chars: Vec<char> = s.chars().collect();
            index_of(chars.len(), *i)
                .map(|i| Value::Str(chars[i].to_string()))
                .unwrap_or(Value::Nil)
        }
        _ => return Ok(None),
    };
    Ok(Some(v))
}

fn leading_int(s: &str) -> i64 {
    let t = s.trim_start();
    let (sign, digits) = match t.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, t.strip_prefix('+').unwrap_or(t)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit() && c != '_')
        .unwrap_or(digits.len());
    digits[..end]
        .replace('_', "")
        .parse::<i64>()
        .map(|n| sign * n)
        .unwrap_or(0)
}

fn symbol_method(s: &str, name: &str, args: &[Value]) -> Result<Option<Value>, Fault> {
    let v = match (name, args) {
        ("to_s" | "id2name" | "name", []) => Value::Str(s.to_owned()),
        ("to_sym", []) => Value::Symbol(s.to_owned()),
        ("length" | "size", []) => Value::Int(s.chars().count() as i64),
        _ => return Ok(None),
    };
    Ok(Some(v))
}

fn nil_method(name: &str, args: &[Value]) -> Result<Option<Value>, Fault> {
    let v = match (name, args) {
        ("to_a", []) => Value::Array(vec![]),
        ("to_i", []) => Value::Int(0),
        _ => return Ok(None),
    };
    Ok(Some(v))
}

fn class_method(class: &str, name: &str, args: &[Value]) -> Result<Option<Value>, Fault> {
    let v = match (class, name, args) {
        (_, "name" | "to_s", []) => Value::Str(class.to_owned()),
        ("String", "new", []) => Value::Str(String::new()),
        ("String", "new", [Value::Str(s)]) => Value::Str(s.clone()),
        ("Array", "new", []) => Value::Array(vec![]),
        _ => return Ok(None),
    };
    Ok(Some(v))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lang::parser::parse_program;

    fn run(src: &str) -> (String, Result<Value, Fault>) {
        let program = parse_program(src).unwrap();
        let mut cx = Context::new().time_limit(Duration::from_millis(500));
        let res = cx.run(&program);
        (cx.take_output(), res)
    }

    #[test]
    fn each_prints_and_returns_no_value() {
        let (out, res) = run("[1, 2, 3].each do |n|\n  puts n\nend");
        assert_eq!(out, "1\n2\n3\n");
        assert_eq!(res.unwrap(), Value::Nil);
    }

    #[test]
    fn each_with_index_interpolates() {
        let (out, _) = run("[1, 2, 3].each_with_index do |n, i|\n  puts \"Index: #{i}, Value: #{n}\"\nend");
        assert_eq!(out, "Index: 0, Value: 1\nIndex: 1, Value: 2\nIndex: 2, Value: 3\n");
    }

    #[test]
    fn default_argument() {
        let src = "def say_hi(name = \"Rubyist\")\n  puts \"Hi there, #{name}!\"\nend\nsay_hi\nsay_hi \"Sunny\"";
        let (out, res) = run(src);
        assert_eq!(out, "Hi there, Rubyist!\nHi there, Sunny!\n");
        assert_eq!(res.unwrap(), Value::Nil);
    }

    #[test]
    fn side_effect_versus_return_value() {
        let src = "def add_and_log(a, b)\n  puts a + b\nend\ndef add_and_return(a, b)\n  return a + b\nend\nsum1 = add_and_log(2, 2)\nsum2 = add_and_return(2, 2)\n[sum1, sum2]";
        let (out, res) = run(src);
        assert_eq!(out, "4\n");
        assert_eq!(res.unwrap(), Value::Array(vec![Value::Nil, Value::Int(4)]));
    }

    #[test]
    fn explicit_return_skips_the_rest() {
        let src = "def stylish_painter\n  best_hairstyle = \"Bob Ross\"\n  return \"Jean-Michel Basquiat\"\n  puts best_hairstyle\nend\nstylish_painter";
        let (out, res) = run(src);
        assert_eq!(out, "");
        assert_eq!(res.unwrap(), Value::Str("Jean-Michel Basquiat".into()));
    }

    #[test]
    fn guard_clause() {
        let src = "def reverse_name(name)\n  if name.class != String\n    return nil\n  end\n\n  name.reverse\nend\n[reverse_name(\"Bob Ross\"), reverse_name(123)]";
        let (_, res) = run(src);
        assert_eq!(
            res.unwrap(),
            Value::Array(vec![Value::Str("ssoR boB".into()), Value::Nil])
        );
    }

    #[test]
    fn method_scope_does_not_see_top_level_locals() {
        let (_, res) = run("my_var = 1\ndef f\n  my_var\nend\nf");
        let fault = res.unwrap_err();
        assert_eq!(fault.kind, FaultKind::NameError);
        assert_eq!(
            fault.message,
            "undefined local variable or method 'my_var' for main:Object"
        );
        assert_eq!(fault.line, Some(3));
    }

    #[test]
    fn blocks_close_over_locals() {
        let (_, res) = run("total = 0\n[1, 2, 3].each { |n| total += n }\ntotal");
        assert_eq!(res.unwrap(), Value::Int(6));
    }

    #[test]
    fn yield_and_block_given() {
        let src = "def twice\n  return :none unless block_given?\n  yield 1\n  yield 2\nend\nacc = []\ntwice { |x| acc = acc + [x * 10] }\n[acc, twice]";
        let (_, res) = run(src);
        assert_eq!(
            res.unwrap(),
            Value::Array(vec![
                Value::Array(vec![Value::Int(10), Value::Int(20)]),
                Value::Symbol("none".into())
            ])
        );
    }

    #[test]
    fn break_and_next() {
        let (out, res) = run("i = 0\nwhile true\n  i += 1\n  next if i == 2\n  break if i > 3\n  puts i\nend\nloop do\n  break 42\nend");
        assert_eq!(out, "1\n3\n");
        assert_eq!(res.unwrap(), Value::Int(42));
    }

    #[test]
    fn runtime_faults() {
        let cases = [
            ("1 + \"a\"", FaultKind::TypeError, "String can't be coerced into Integer"),
            ("\"a\" + 1", FaultKind::TypeError, "no implicit conversion of Integer into String"),
            ("nil.upcase", FaultKind::NoMethodError, "undefined method 'upcase' for nil"),
            ("1 / 0", FaultKind::ZeroDivisionError, "divided by 0"),
            ("raise \"boom\"", FaultKind::RuntimeError, "boom"),
            ("raise ArgumentError, \"bad\"", FaultKind::ArgumentError, "bad"),
            ("def f(a)\nend\nf(1, 2)", FaultKind::ArgumentError, "wrong number of arguments (given 2, expected 1)"),
            ("raise TypeError", FaultKind::TypeError, "TypeError"),
            ("\"ab\" * 9000000000000000000", FaultKind::ArgumentError, "argument too big"),
            ("\"ab\" * -1", FaultKind::ArgumentError, "negative argument"),
            ("Foo", FaultKind::NameError, "uninitialized constant Foo"),
            ("frobnicate(1)", FaultKind::NoMethodError, "undefined method 'frobnicate' for main:Object"),
        ];
        for (src, kind, message) in cases {
            let (_, res) = run(src);
            let fault = res.unwrap_err();
            assert_eq!(fault.kind, kind, "{}", src);
            assert_eq!(fault.message, message, "{}", src);
        }
    }

    #[test]
    fn infinite_loop_times_out() {
        let program = parse_program("loop do\nend").unwrap();
        let mut cx = Context::new().time_limit(Duration::from_millis(50));
        let fault = cx.run(&program).unwrap_err();
        assert_eq!(fault.kind, FaultKind::Timeout);
    }

    #[test]
    fn unbounded_recursion_is_a_fault() {
        let program = parse_program("def f(n)\n  f(n + 1)\nend\nf(0)").unwrap();
        let mut cx = Context::new().max_call_depth(64);
        let fault = cx.run(&program).unwrap_err();
        assert_eq!(fault.kind, FaultKind::SystemStackError);
    }

    #[test]
    fn integer_arithmetic_floors() {
        let (_, res) = run("[-7 / 2, 7 % -3, 2 * 3 + 1, 7.0 / 2]");
        assert_eq!(
            res.unwrap(),
            Value::Array(vec![Value::Int(-4), Value::Int(-2), Value::Int(7), Value::Float(3.5)])
        );
    }

    #[test]
    fn def_returns_symbol_and_puts_returns_nil() {
        assert_eq!(run("def f\nend").1.unwrap(), Value::Symbol("f".into()));
        assert_eq!(run("puts \"Bob Ross\"").1.unwrap(), Value::Nil);
        assert_eq!(run("\"Bob Ross\"\nputs \"Bob Ross\"").0, "Bob Ross\n");
    }

    #[test]
    fn context_keeps_state_between_programs() {
        let mut cx = Context::new();
        let setup = parse_program("def greet(n)\n  \"hi #{n}\"\nend\nx = 2").unwrap();
        cx.run(&setup).unwrap();
        let body = crate::lang::parser::parse_program_with_locals("greet(x)", &setup.top_level_locals).unwrap();
        assert_eq!(cx.run(&body).unwrap(), Value::Str("hi 2".into()));
    }
}
