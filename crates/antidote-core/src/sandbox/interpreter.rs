//! Tree-walking interpreter over the predicate AST.
//!
//! Recursion is bounded by the compiler's height limit, so walking the tree
//! cannot exhaust the stack regardless of the file being evaluated.

use std::time::Instant;

use crate::domain::FileRecord;
use crate::predicate::ast::{BoolOp, Builtin, Comprehension, Expr, ExprKind, Literal, Var};

use super::budget::{Budget, Meter};
use super::builtins::{self, EvalResult};
use super::error::Fault;
use super::value::Value;

pub(crate) fn run(root: &Expr, file: &FileRecord, budget: &Budget, started: Instant) -> EvalResult {
    let mut interp = Interpreter {
        name: Value::Str(file.name.clone()),
        content: Value::Str(file.content.clone()),
        locals: Vec::new(),
        meter: Meter::new(budget, file.content.len() as u64, started),
    };
    interp.eval(root)
}

struct Interpreter {
    name: Value,
    content: Value,
    locals: Vec<Value>,
    meter: Meter,
}

impl Interpreter {
    fn eval(&mut self, expr: &Expr) -> EvalResult {
        self.meter.step()?;
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal(lit)),
            ExprKind::Var(Var::Name) => Ok(self.name.clone()),
            ExprKind::Var(Var::Content) => Ok(self.content.clone()),
            ExprKind::Var(Var::Local(slot)) => self
                .locals
                .get(*slot)
                .cloned()
                .ok_or_else(|| Fault::runtime("loop variable used outside its comprehension")),
            ExprKind::List(items) => {
                let values = self.eval_all(items)?;
                self.meter.allocate(16 * values.len() as u64)?;
                Ok(Value::list(values))
            }
            ExprKind::Unary { op, operand } => {
                let v = self.eval(operand)?;
                builtins::unary(*op, v)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                builtins::binary(*op, a, b, &mut self.meter)
            }
            ExprKind::BoolChain { op, operands } => {
                let mut last = Value::None;
                for operand in operands {
                    last = self.eval(operand)?;
                    let stop = match op {
                        BoolOp::And => !last.truthy(),
                        BoolOp::Or => last.truthy(),
                    };
                    if stop {
                        break;
                    }
                }
                Ok(last)
            }
            ExprKind::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                for (op, rhs) in rest {
                    let right = self.eval(rhs)?;
                    if !builtins::compare(*op, &left, &right, &mut self.meter)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::IfElse {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            ExprKind::Index { target, index } => {
                let t = self.eval(target)?;
                let i = self.eval(index)?;
                builtins::index(&t, &i, &mut self.meter)
            }
            ExprKind::Slice {
                target,
                start,
                stop,
            } => {
                let t = self.eval(target)?;
                let start = start.as_deref().map(|e| self.eval(e)).transpose()?;
                let stop = stop.as_deref().map(|e| self.eval(e)).transpose()?;
                builtins::slice(&t, start.as_ref(), stop.as_ref(), &mut self.meter)
            }
            ExprKind::Call { func, args } => self.call(*func, args),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let recv = self.eval(receiver)?;
                let args = self.eval_all(args)?;
                builtins::method(*method, &recv, &args, &mut self.meter)
            }
            ExprKind::Regex {
                op,
                pattern,
                subject,
            } => {
                let s = self.eval(subject)?;
                builtins::regex(*op, pattern, &s, &mut self.meter)
            }
            ExprKind::Comprehension(comp) => self.collect(comp),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, Fault> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn call(&mut self, func: Builtin, args: &[Expr]) -> EvalResult {
        // any/all over a comprehension short-circuit without materializing it.
        if let (Builtin::Any | Builtin::All, [arg]) = (func, args) {
            if let ExprKind::Comprehension(comp) = &arg.kind {
                return self.any_all(func == Builtin::Any, comp);
            }
        }
        let values = self.eval_all(args)?;
        builtins::call(func, values, &mut self.meter)
    }

    fn collect(&mut self, comp: &Comprehension) -> EvalResult {
        let mut out = Vec::new();
        self.iterate(comp, |this, v| {
            this.meter.allocate(v.footprint())?;
            out.push(v);
            Ok(true)
        })?;
        Ok(Value::list(out))
    }

    fn any_all(&mut self, any: bool, comp: &Comprehension) -> EvalResult {
        // any: stop at the first truthy element; all: at the first falsy one.
        let mut result = !any;
        self.iterate(comp, |_, v| {
            if v.truthy() == any {
                result = any;
                return Ok(false);
            }
            Ok(true)
        })?;
        Ok(Value::Bool(result))
    }

    /// Drive a comprehension, handing each produced element to `sink`.
    /// The sink returns `false` to stop early.
    fn iterate(
        &mut self,
        comp: &Comprehension,
        mut sink: impl FnMut(&mut Self, Value) -> Result<bool, Fault>,
    ) -> Result<(), Fault> {
        let source = self.eval(&comp.iter)?;
        match source {
            Value::Str(s) => {
                for c in s.chars() {
                    if !self.visit(comp, builtins::char_value(c), &mut sink)? {
                        break;
                    }
                }
            }
            Value::List(items) => {
                for item in items.iter() {
                    if !self.visit(comp, item.clone(), &mut sink)? {
                        break;
                    }
                }
            }
            other => {
                return Err(Fault::runtime(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
        }
        self.locals.truncate(comp.slot);
        Ok(())
    }

    fn visit(
        &mut self,
        comp: &Comprehension,
        item: Value,
        sink: &mut impl FnMut(&mut Self, Value) -> Result<bool, Fault>,
    ) -> Result<bool, Fault> {
        self.meter.step()?;
        self.locals.truncate(comp.slot);
        self.locals.push(item);
        if let Some(cond) = &comp.condition {
            if !self.eval(cond)?.truthy() {
                return Ok(true);
            }
        }
        let element = self.eval(&comp.element)?;
        sink(self, element)
    }
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(x) => Value::Float(*x),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}
