// parse textual IR into a module
use super::*;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl std::error::Error for ParseError {}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.line > 0 {
            write!(f, "line {}: {}", self.line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

enum Header<'a> {
    Global {
        init: Option<&'a str>,
    },
    Declare,
    Define {
        params: Vec<String>,
        body: Vec<(usize, &'a str)>,
    },
}

struct Item<'a> {
    line: usize,
    id: SymbolId,
    header: Header<'a>,
}

pub fn parse_module(name: &str, text: &str) -> ParseResult<Module> {
    let mut module = Module::new(name);
    let mut items = vec![];

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, strip_comment(l).trim()))
        .filter(|(_, l)| !l.is_empty());

    // first pass: targets and symbol headers, so that bodies can refer forward
    while let Some((line, l)) = lines.next() {
        if let Some(rest) = l.strip_prefix("target ") {
            parse_target(&mut module.target, line, rest)?;
        } else if l.starts_with('@') {
            items.push(parse_global_header(&mut module, line, l)?);
        } else if let Some(rest) = l.strip_prefix("declare ") {
            let (linkage, sig, name, _) = parse_function_header(line, rest, false)?;
            let id = add(&mut module, line, &name, linkage, Function::declare(sig))?;
            items.push(Item {
                line,
                id,
                header: Header::Declare,
            });
        } else if let Some(rest) = l.strip_prefix("define ") {
            let (linkage, sig, name, params) = parse_function_header(line, rest, true)?;
            let mut body = vec![];
            loop {
                match lines.next() {
                    Some((_, "}")) => break,
                    Some(b) => body.push(b),
                    None => return Err(ParseError::new(line, format!("unterminated body of @{}", name))),
                }
            }
            let id = add(&mut module, line, &name, linkage, Function::declare(sig))?;
            items.push(Item {
                line,
                id,
                header: Header::Define { params, body },
            });
        } else {
            return Err(ParseError::new(line, format!("unexpected input: {}", l)));
        }
    }

    // second pass: initializers and bodies
    for item in items {
        match item.header {
            Header::Global { init: Some(init) } => {
                let value = parse_value(&module, item.line, init)?;
                if !matches!(value, Value::Int(_) | Value::Global(_)) {
                    return Err(ParseError::new(item.line, format!("invalid initializer: {}", init)));
                }
                if let SymbolKind::Global(g) = &mut module.symbol_mut(item.id).kind {
                    g.init = Some(value);
                }
            }
            Header::Global { init: None } | Header::Declare => (),
            Header::Define { params, body } => {
                let blocks = parse_body(&module, item.line, &params, &body)?;
                if let Some(f) = module.function_mut(item.id) {
                    f.params = params;
                    f.blocks = Some(blocks);
                }
            }
        }
    }

    log::debug!("parsed module {}: {} symbols", module.name(), module.len());
    Ok(module)
}

fn add(
    module: &mut Module,
    line: usize,
    name: &str,
    linkage: Linkage,
    f: Function,
) -> ParseResult<SymbolId> {
    module
        .add_symbol(name, linkage, SymbolKind::Function(f))
        .map_err(|e| ParseError::new(line, e.to_string()))
}

fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => return &line[..i],
            _ => (),
        }
    }
    line
}

fn parse_target(target: &mut TargetMetadata, line: usize, rest: &str) -> ParseResult<()> {
    let (key, value) = rest
        .split_once('=')
        .ok_or_else(|| ParseError::new(line, "expected '=' in target directive"))?;
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(|| ParseError::new(line, "expected quoted string"))?;
    match key.trim() {
        "datalayout" => target.data_layout = value.to_string(),
        "triple" => target.triple = value.to_string(),
        other => return Err(ParseError::new(line, format!("unknown target directive: {}", other))),
    }
    Ok(())
}

fn parse_symbol_name(line: usize, s: &str) -> ParseResult<String> {
    match s.strip_prefix('@') {
        Some(name) if is_identifier(name) => Ok(name.to_string()),
        _ => Err(ParseError::new(line, format!("expected symbol name, found '{}'", s))),
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}

fn parse_type(line: usize, s: &str) -> ParseResult<Type> {
    Type::parse(s).ok_or_else(|| ParseError::new(line, format!("unknown type '{}'", s)))
}

// @name = [internal|external] (global|constant) <ty> [init]
fn parse_global_header<'a>(module: &mut Module, line: usize, l: &'a str) -> ParseResult<Item<'a>> {
    let (lhs, rhs) = l
        .split_once('=')
        .ok_or_else(|| ParseError::new(line, "expected '=' after global name"))?;
    let name = parse_symbol_name(line, lhs.trim())?;

    let mut tokens = rhs.split_whitespace().peekable();
    let mut linkage = Linkage::External;
    let mut external = false;
    match tokens.peek() {
        Some(&"internal") => {
            linkage = Linkage::Internal;
            tokens.next();
        }
        Some(&"external") => {
            external = true;
            tokens.next();
        }
        _ => (),
    }
    let constant = match tokens.next() {
        Some("global") => false,
        Some("constant") => true,
        _ => return Err(ParseError::new(line, "expected 'global' or 'constant'")),
    };
    let ty = parse_type(line, tokens.next().unwrap_or(""))?;
    if ty.is_void() {
        return Err(ParseError::new(line, "global of void type"));
    }
    let init = tokens.next();
    if tokens.next().is_some() {
        return Err(ParseError::new(line, "trailing input after initializer"));
    }
    match (external, init) {
        (true, Some(_)) => return Err(ParseError::new(line, "external global with initializer")),
        (false, None) => return Err(ParseError::new(line, "global requires an initializer")),
        _ => (),
    }

    let id = module
        .add_symbol(
            &name,
            linkage,
            SymbolKind::Global(GlobalVariable::new(ty, constant, None)),
        )
        .map_err(|e| ParseError::new(line, e.to_string()))?;
    Ok(Item {
        line,
        id,
        header: Header::Global { init },
    })
}

// [internal] <ret> @name(<ty> [%param], ...) [{]
fn parse_function_header(
    line: usize,
    rest: &str,
    define: bool,
) -> ParseResult<(Linkage, Signature, String, Vec<String>)> {
    let open = rest
        .find('(')
        .ok_or_else(|| ParseError::new(line, "expected '(' in function header"))?;
    let close = rest
        .rfind(')')
        .ok_or_else(|| ParseError::new(line, "expected ')' in function header"))?;
    if close < open {
        return Err(ParseError::new(line, "malformed parameter list"));
    }

    let mut head: Vec<&str> = rest[..open].split_whitespace().collect();
    let name = parse_symbol_name(line, head.pop().unwrap_or(""))?;
    let ret = parse_type(line, head.pop().unwrap_or(""))?;
    let linkage = match head.as_slice() {
        [] => Linkage::External,
        ["internal"] => Linkage::Internal,
        _ => return Err(ParseError::new(line, format!("unexpected tokens in header of @{}", name))),
    };

    let tail = rest[close + 1..].trim();
    match (define, tail) {
        (true, "{") | (false, "") => (),
        (true, _) => return Err(ParseError::new(line, "expected '{' after definition header")),
        (false, _) => return Err(ParseError::new(line, "unexpected input after declaration")),
    }

    let mut params = vec![];
    let mut names = vec![];
    for p in rest[open + 1..close].split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let mut parts = p.split_whitespace();
        let ty = parse_type(line, parts.next().unwrap_or(""))?;
        if ty.is_void() {
            return Err(ParseError::new(line, "void parameter"));
        }
        params.push(ty);
        match parts.next().and_then(|n| n.strip_prefix('%')) {
            Some(n) => names.push(n.to_string()),
            None if define => {
                return Err(ParseError::new(line, format!("unnamed parameter in definition of @{}", name)))
            }
            None => (),
        }
    }
    Ok((linkage, Signature::new(ret, params), name, names))
}

fn parse_value(module: &Module, line: usize, s: &str) -> ParseResult<Value> {
    if let Some(name) = s.strip_prefix('%') {
        if is_identifier(name) {
            return Ok(Value::Local(name.to_string()));
        }
    } else if s.starts_with('@') {
        let name = parse_symbol_name(line, s)?;
        return module
            .lookup(&name)
            .map(Value::Global)
            .ok_or_else(|| ParseError::new(line, format!("use of undefined symbol @{}", name)));
    } else if let Some(name) = s.strip_prefix('$') {
        if is_identifier(name) {
            return Ok(Value::Register(name.to_string()));
        }
    } else if let Some(v) = parse_int(s) {
        return Ok(Value::Int(v));
    } else if is_identifier(s) {
        return Ok(Value::Label(s.to_string()));
    }
    Err(ParseError::new(line, format!("invalid operand '{}'", s)))
}

fn parse_int(s: &str) -> Option<i64> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, s),
    };
    let v = if let Some(hex) = digits.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()? as i64
    } else if digits.starts_with(|c: char| c.is_ascii_digit()) {
        digits.parse::<i64>().ok()?
    } else {
        return None;
    };
    Some(if neg { v.wrapping_neg() } else { v })
}

fn parse_body(
    module: &Module,
    line: usize,
    params: &[String],
    body: &[(usize, &str)],
) -> ParseResult<Vec<Block>> {
    let mut blocks: Vec<Block> = vec![];
    let mut defined: HashSet<String> = params.iter().cloned().collect();
    let mut uses = vec![];

    for (line, l) in body.iter().copied() {
        if let Some(label) = l.strip_suffix(':') {
            if !is_identifier(label) {
                return Err(ParseError::new(line, format!("invalid label '{}'", label)));
            }
            if blocks.iter().any(|b| b.label == label) {
                return Err(ParseError::new(line, format!("duplicate label '{}'", label)));
            }
            blocks.push(Block::new(label));
            continue;
        }
        let block = blocks
            .last_mut()
            .ok_or_else(|| ParseError::new(line, "instruction outside of a block"))?;
        let inst = parse_instruction(module, line, l)?;
        if let Some(r) = &inst.result {
            if !defined.insert(r.clone()) {
                return Err(ParseError::new(line, format!("redefinition of %{}", r)));
            }
        }
        for op in inst.operands.iter() {
            uses.push((line, op.clone()));
        }
        block.instructions.push(inst);
    }

    if blocks.is_empty() {
        return Err(ParseError::new(line, "function body has no blocks"));
    }
    for b in blocks.iter() {
        match b.instructions.last() {
            Some(i) if i.opcode.is_terminator() => (),
            _ => {
                return Err(ParseError::new(
                    line,
                    format!("block '{}' does not end with a terminator", b.label),
                ))
            }
        }
    }

    let labels: HashSet<&str> = blocks.iter().map(|b| b.label.as_str()).collect();
    for (line, op) in uses {
        match op {
            Value::Local(name) if !defined.contains(&name) => {
                return Err(ParseError::new(line, format!("use of undefined value %{}", name)))
            }
            Value::Label(name) if !labels.contains(name.as_str()) => {
                return Err(ParseError::new(line, format!("branch to unknown block '{}'", name)))
            }
            _ => (),
        }
    }
    Ok(blocks)
}

fn parse_instruction(module: &Module, line: usize, l: &str) -> ParseResult<Instruction> {
    let (result, rest) = match l.split_once('=') {
        Some((lhs, rhs)) if lhs.trim().starts_with('%') => {
            let name = &lhs.trim()[1..];
            if !is_identifier(name) {
                return Err(ParseError::new(line, format!("invalid result name '{}'", lhs.trim())));
            }
            (Some(name.to_string()), rhs.trim())
        }
        _ => (None, l),
    };

    let (op, rest) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let opcode =
        Opcode::parse(op).ok_or_else(|| ParseError::new(line, format!("unknown opcode '{}'", op)))?;
    let rest = rest.trim();
    let (ty, rest) = if opcode.has_type() {
        let (t, rest) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        (parse_type(line, t)?, rest.trim())
    } else {
        (Type::Void, rest)
    };

    let operands = rest
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_value(module, line, s))
        .collect::<ParseResult<Vec<_>>>()?;

    let inst = Instruction {
        result,
        opcode,
        ty,
        operands,
    };
    check_instruction(module, line, &inst)?;
    Ok(inst)
}

fn check_instruction(module: &Module, line: usize, inst: &Instruction) -> ParseResult<()> {
    let n = inst.operands.len();
    let has_result = inst.result.is_some();
    let err = |m: String| Err(ParseError::new(line, m));
    let name = inst.opcode.name();

    match inst.opcode {
        op if op.is_binary() && (n != 2 || !has_result) => {
            err(format!("{} takes two operands and a result", name))
        }
        Opcode::Load | Opcode::Addr if !has_result => err(format!("{} requires a result", name)),
        Opcode::Load if n != 1 => err("load takes one operand".into()),
        Opcode::Addr if n != 4 => err("addr takes base, index, scale and displacement".into()),
        Opcode::Store if n != 2 || has_result => err("store takes a value and a pointer".into()),
        Opcode::Ret if has_result => err("ret has no result".into()),
        Opcode::Ret if inst.ty.is_void() != (n == 0) || n > 1 => {
            err("ret takes one operand, or none for void".into())
        }
        Opcode::Br if n != 1 || !matches!(inst.operands[0], Value::Label(_)) => {
            err("br takes a block label".into())
        }
        Opcode::Call => {
            let callee = match inst.callee() {
                Some(id) => id,
                None => return err("call requires a symbol as its first operand".into()),
            };
            let f = match module.function(callee) {
                Some(f) => f,
                None => return err(format!("@{} is not a function", module.name_of(callee))),
            };
            if f.signature.ret != inst.ty {
                return err(format!(
                    "call of @{} returns {}, not {}",
                    module.name_of(callee),
                    f.signature.ret,
                    inst.ty
                ));
            }
            if f.signature.params.len() != n - 1 {
                return err(format!(
                    "call of @{} passes {} arguments, expected {}",
                    module.name_of(callee),
                    n - 1,
                    f.signature.params.len()
                ));
            }
            if inst.ty.is_void() && has_result {
                return err("void call cannot have a result".into());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
