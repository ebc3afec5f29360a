//! Template execution.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::dot::Object;
use super::text::{Command, Operand, Pipeline, Program, TNode};
use super::TemplateError;

/// A value flowing through template pipelines.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Object),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "slice",
            Value::Map(_) => "map",
            Value::Object(object) => object.type_name(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map_or(Value::Nil, Value::Str)
    }
}

/// Provides the fields and methods of [`Object`] values.
pub(crate) trait Host {
    fn call(&mut self, receiver: &Object, name: &str, args: Vec<Value>)
        -> Result<Value, TemplateError>;

    /// Text an object prints as.
    fn render(&mut self, object: &Object) -> Result<String, TemplateError>;
}

fn exec_error(message: impl Into<String>) -> TemplateError {
    TemplateError::Exec {
        message: message.into(),
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
}

struct Executor<'h> {
    host: &'h mut dyn Host,
    vars: Vec<(String, Value)>,
    out: String,
}

/// Runs `program` with `dot` as the initial value of `.` and `$`.
pub(crate) fn execute(
    program: &Program,
    dot: Value,
    host: &mut dyn Host,
) -> Result<String, TemplateError> {
    let mut executor = Executor {
        host,
        vars: vec![("$".to_string(), dot.clone())],
        out: String::new(),
    };
    executor.list(&program.nodes, &dot)?;
    Ok(executor.out)
}

impl Executor<'_> {
    fn list(&mut self, nodes: &[TNode], dot: &Value) -> Result<Flow, TemplateError> {
        for node in nodes {
            match node {
                TNode::Text(text) => self.out.push_str(text),
                TNode::Action(pipe) => {
                    let value = self.pipeline(pipe, dot)?;
                    if pipe.vars.is_empty() {
                        let text = self.print(&value)?;
                        self.out.push_str(&text);
                    }
                }
                TNode::If(cond) | TNode::With(cond) => {
                    let with = matches!(node, TNode::With(_));
                    let mark = self.vars.len();
                    let mut taken = false;
                    let mut flow = Flow::Normal;
                    for (pipe, body) in &cond.branches {
                        let value = self.pipeline(pipe, dot)?;
                        if self.truth(&value) {
                            let inner = if with { value } else { dot.clone() };
                            flow = self.list(body, &inner)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(otherwise) = &cond.otherwise {
                            flow = self.list(otherwise, dot)?;
                        }
                    }
                    self.vars.truncate(mark);
                    if !matches!(flow, Flow::Normal) {
                        return Ok(flow);
                    }
                }
                TNode::Range(range) => {
                    let mark = self.vars.len();
                    let vars = range.pipeline.vars.clone();
                    let collection = self.pipeline(
                        &Pipeline {
                            vars: Vec::new(),
                            declare: false,
                            commands: range.pipeline.commands.clone(),
                        },
                        dot,
                    )?;
                    let entries = Self::entries(collection)?;
                    if entries.is_empty() {
                        if let Some(otherwise) = &range.otherwise {
                            self.list(otherwise, dot)?;
                        }
                    }
                    for (key, element) in entries {
                        let inner_mark = self.vars.len();
                        match vars.as_slice() {
                            [] => {}
                            [single] => self.vars.push((single.clone(), element.clone())),
                            [k, v, ..] => {
                                self.vars.push((k.clone(), key));
                                self.vars.push((v.clone(), element.clone()));
                            }
                        }
                        let flow = self.list(&range.body, &element)?;
                        self.vars.truncate(inner_mark);
                        if matches!(flow, Flow::Break) {
                            break;
                        }
                    }
                    self.vars.truncate(mark);
                }
                TNode::Break => return Ok(Flow::Break),
                TNode::Continue => return Ok(Flow::Continue),
            }
        }
        Ok(Flow::Normal)
    }

    /// Key and element pairs a range iterates over.
    fn entries(collection: Value) -> Result<Vec<(Value, Value)>, TemplateError> {
        Ok(match collection {
            Value::Nil => Vec::new(),
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::Int(i as i64), item))
                .collect(),
            Value::Map(map) => map
                .into_iter()
                .map(|(key, item)| (Value::Str(key), item))
                .collect(),
            Value::Int(n) => (0..n.max(0)).map(|i| (Value::Int(i), Value::Int(i))).collect(),
            other => {
                return Err(exec_error(format!(
                    "range can't iterate over {}",
                    other.type_name()
                )))
            }
        })
    }

    fn pipeline(&mut self, pipe: &Pipeline, dot: &Value) -> Result<Value, TemplateError> {
        let mut value: Option<Value> = None;
        for command in &pipe.commands {
            value = Some(self.command(command, dot, value)?);
        }
        let value = value.unwrap_or(Value::Nil);
        if let Some(name) = pipe.vars.first() {
            if pipe.declare {
                self.vars.push((name.clone(), value.clone()));
            } else {
                let slot = self
                    .vars
                    .iter_mut()
                    .rev()
                    .find(|(var, _)| var == name)
                    .ok_or_else(|| exec_error(format!("undefined variable: {name}")))?;
                slot.1 = value.clone();
            }
        }
        Ok(value)
    }

    fn variable(&self, name: &str) -> Result<Value, TemplateError> {
        self.vars
            .iter()
            .rev()
            .find(|(var, _)| var == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| exec_error(format!("undefined variable: {name}")))
    }

    fn command(
        &mut self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        let Some((head, rest)) = command.operands.split_first() else {
            return Err(exec_error("empty command"));
        };
        match head {
            Operand::Func(name) if name == "and" || name == "or" => {
                self.logical(name == "and", rest, dot, piped)
            }
            Operand::Func(name) => {
                let mut args = self.arguments(rest, dot)?;
                args.extend(piped);
                self.builtin(name, args)
            }
            Operand::Field(chain) => {
                let mut args = self.arguments(rest, dot)?;
                args.extend(piped);
                self.chain(dot.clone(), chain, args)
            }
            Operand::Chain(base, chain) => {
                let base = self.operand(base, dot)?;
                let mut args = self.arguments(rest, dot)?;
                args.extend(piped);
                self.chain(base, chain, args)
            }
            other => {
                if !rest.is_empty() || piped.is_some() {
                    return Err(exec_error(format!("can't give argument to non-function {other:?}")));
                }
                self.operand(other, dot)
            }
        }
    }

    fn arguments(&mut self, operands: &[Operand], dot: &Value) -> Result<Vec<Value>, TemplateError> {
        operands.iter().map(|operand| self.operand(operand, dot)).collect()
    }

    fn operand(&mut self, operand: &Operand, dot: &Value) -> Result<Value, TemplateError> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Field(chain) => self.chain(dot.clone(), chain, Vec::new()),
            Operand::Var(name) => self.variable(name),
            Operand::Chain(base, chain) => {
                let base = self.operand(base, dot)?;
                self.chain(base, chain, Vec::new())
            }
            Operand::Func(name) => self.builtin(name, Vec::new()),
            Operand::Pipe(pipe) => {
                let mark = self.vars.len();
                let value = self.pipeline(pipe, dot);
                self.vars.truncate(mark);
                value
            }
            Operand::Str(s) => Ok(Value::Str(s.clone())),
            Operand::Int(i) => Ok(Value::Int(*i)),
            Operand::Bool(b) => Ok(Value::Bool(*b)),
            Operand::Nil => Ok(Value::Nil),
        }
    }

    /// Evaluates `.A.B.C args...`; only the last element receives arguments.
    fn chain(&mut self, base: Value, chain: &[String], mut args: Vec<Value>) -> Result<Value, TemplateError> {
        let mut current = base;
        for (i, name) in chain.iter().enumerate() {
            let call_args = if i + 1 == chain.len() {
                std::mem::take(&mut args)
            } else {
                Vec::new()
            };
            current = self.field(&current, name, call_args)?;
        }
        Ok(current)
    }

    fn field(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
        match receiver {
            Value::Object(object) => self.host.call(object, name, args),
            Value::Map(map) => {
                if !args.is_empty() {
                    return Err(exec_error(format!("{name} is not a method but has arguments")));
                }
                Ok(map.get(name).cloned().unwrap_or(Value::Nil))
            }
            Value::Nil => Err(exec_error(format!("nil pointer evaluating .{name}"))),
            other => Err(exec_error(format!(
                "can't evaluate field {name} in type {}",
                other.type_name()
            ))),
        }
    }

    fn logical(
        &mut self,
        and: bool,
        operands: &[Operand],
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        if operands.is_empty() && piped.is_none() {
            return Err(exec_error("wrong number of args: want at least 1 got 0"));
        }
        let mut last = Value::Nil;
        for operand in operands {
            last = self.operand(operand, dot)?;
            if self.truth(&last) != and {
                return Ok(last);
            }
        }
        if let Some(piped) = piped {
            last = piped;
        }
        Ok(last)
    }

    fn truth(&self, value: &Value) -> bool {
        match value {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(_) => true,
        }
    }

    fn print(&mut self, value: &Value) -> Result<String, TemplateError> {
        Ok(match value {
            Value::Nil => "<no value>".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let parts = items
                    .iter()
                    .map(|item| self.print(item))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("[{}]", parts.join(" "))
            }
            Value::Map(map) => {
                let mut parts = Vec::with_capacity(map.len());
                for (key, item) in map {
                    parts.push(format!("{key}:{}", self.print(item)?));
                }
                format!("map[{}]", parts.join(" "))
            }
            Value::Object(object) => self.host.render(object)?,
        })
    }

    fn builtin(&mut self, name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
        let arity = |want: usize| -> Result<(), TemplateError> {
            if args.len() == want {
                Ok(())
            } else {
                Err(exec_error(format!(
                    "wrong number of args for {name}: want {want} got {}",
                    args.len()
                )))
            }
        };
        match name {
            "not" => {
                arity(1)?;
                Ok(Value::Bool(!self.truth(&args[0])))
            }
            "len" => {
                arity(1)?;
                match &args[0] {
                    Value::Str(s) => Ok(Value::Int(s.len() as i64)),
                    Value::List(items) => Ok(Value::Int(items.len() as i64)),
                    Value::Map(map) => Ok(Value::Int(map.len() as i64)),
                    other => Err(exec_error(format!("len of type {}", other.type_name()))),
                }
            }
            "index" => {
                let Some((first, keys)) = args.split_first() else {
                    return Err(exec_error("wrong number of args for index: want at least 1 got 0"));
                };
                let mut current = first.clone();
                for key in keys {
                    current = match (&current, key) {
                        (Value::List(items), Value::Int(i)) => usize::try_from(*i)
                            .ok()
                            .and_then(|i| items.get(i).cloned())
                            .ok_or_else(|| exec_error(format!("index out of range: {i}")))?,
                        (Value::Map(map), Value::Str(k)) => map.get(k).cloned().unwrap_or(Value::Nil),
                        (other, key) => {
                            return Err(exec_error(format!(
                                "can't index item of type {} with {}",
                                other.type_name(),
                                key.type_name()
                            )))
                        }
                    };
                }
                Ok(current)
            }
            "eq" => {
                let Some((first, rest)) = args.split_first() else {
                    return Err(exec_error("missing argument for comparison"));
                };
                if rest.is_empty() {
                    return Err(exec_error("missing argument for comparison"));
                }
                for other in rest {
                    if Self::compare(first, other)? == std::cmp::Ordering::Equal {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            "ne" | "lt" | "le" | "gt" | "ge" => {
                arity(2)?;
                let ordering = Self::compare(&args[0], &args[1])?;
                use std::cmp::Ordering::*;
                Ok(Value::Bool(match name {
                    "ne" => ordering != Equal,
                    "lt" => ordering == Less,
                    "le" => ordering != Greater,
                    "gt" => ordering == Greater,
                    _ => ordering != Less,
                }))
            }
            "print" => {
                let mut out = String::new();
                for (i, arg) in args.iter().enumerate() {
                    let is_str = matches!(arg, Value::Str(_));
                    let prev_str = i > 0 && matches!(args[i - 1], Value::Str(_));
                    if i > 0 && !is_str && !prev_str {
                        out.push(' ');
                    }
                    out.push_str(&self.print(arg)?);
                }
                Ok(Value::Str(out))
            }
            "println" => {
                let parts = args
                    .iter()
                    .map(|arg| self.print(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Str(format!("{}\n", parts.join(" "))))
            }
            "printf" => {
                let Some((Value::Str(format), rest)) = args.split_first() else {
                    return Err(exec_error("printf requires a format string"));
                };
                self.sprintf(format, rest).map(Value::Str)
            }
            other => Err(exec_error(format!("function {other:?} not defined"))),
        }
    }

    fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, TemplateError> {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
            (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
            (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
            (Value::Nil, Value::Nil) => Ok(std::cmp::Ordering::Equal),
            (x, y) => Err(exec_error(format!(
                "incompatible types for comparison: {} and {}",
                x.type_name(),
                y.type_name()
            ))),
        }
    }

    fn sprintf(&mut self, format: &str, args: &[Value]) -> Result<String, TemplateError> {
        let mut out = String::new();
        let mut args = args.iter();
        let mut chars = format.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let Some(verb) = chars.next() else {
                out.push_str("%!(NOVERB)");
                break;
            };
            if verb == '%' {
                out.push('%');
                continue;
            }
            let Some(arg) = args.next() else {
                let _ = write!(out, "%!{verb}(MISSING)");
                continue;
            };
            match (verb, arg) {
                ('d', Value::Int(i)) => {
                    let _ = write!(out, "{i}");
                }
                ('q', Value::Str(s)) => out.push_str(&super::quote(s)),
                ('t', Value::Bool(b)) => {
                    let _ = write!(out, "{b}");
                }
                ('s' | 'v', arg) => out.push_str(&self.print(arg)?),
                (verb, arg) => {
                    let _ = write!(out, "%!{verb}({}={})", arg.type_name(), self.print(arg)?);
                }
            }
        }
        let extra = args.collect::<Vec<_>>();
        if !extra.is_empty() {
            out.push_str("%!(EXTRA ");
            let parts = extra
                .into_iter()
                .map(|arg| Ok(format!("{}={}", arg.type_name(), self.print(arg)?)))
                .collect::<Result<Vec<_>, TemplateError>>()?;
            out.push_str(&parts.join(", "));
            out.push(')');
        }
        Ok(out)
    }
}
