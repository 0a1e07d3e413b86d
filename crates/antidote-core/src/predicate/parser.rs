//! Recursive-descent parser from tokens to the typed AST.
//!
//! Name resolution happens here: every identifier is either a bound
//! variable, a comprehension local, an allow-listed function or a
//! `DisallowedConstruct` error. Nothing unresolved reaches the evaluator.

use regex::RegexBuilder;

use super::ast::*;
use super::error::{CompileError, CompileResult};
use super::lexer::{tokenize, Token, TokenKind};
use super::MAX_DEPTH;

/// Upper bound on compiled regex program size, in bytes.
const REGEX_SIZE_LIMIT: usize = 1 << 20;
const REGEX_NEST_LIMIT: u32 = 64;

/// Words that are syntax, not values.
const KEYWORDS: &[&str] = &["and", "or", "not", "in", "is", "if", "else", "for"];

pub fn parse(source: &str) -> CompileResult<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        locals: Vec::new(),
    };
    if *parser.peek() == TokenKind::Eof {
        return Err(CompileError::syntax(0, "empty predicate"));
    }
    let expr = parser.expression()?;
    parser.finish()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Current recursion depth of `expression` and unary operators.
    depth: usize,
    /// Comprehension variables in scope; index is the slot.
    locals: Vec<String>,
}

impl Parser {
    // ---- token helpers ----

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn here(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn keyword_at(&self, n: usize, kw: &str) -> bool {
        matches!(self.peek_at(n), TokenKind::Ident(s) if s == kw)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        self.keyword_at(0, kw)
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        let found = self.is_keyword(kw);
        if found {
            self.advance();
        }
        found
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        let found = self.peek() == kind;
        if found {
            self.advance();
        }
        found
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> CompileResult<()> {
        if self.eat(kind) {
            return Ok(());
        }
        Err(self.unexpected(what))
    }

    fn unexpected(&self, what: &str) -> CompileError {
        match self.peek() {
            TokenKind::Assign | TokenKind::Walrus => {
                CompileError::disallowed(self.here(), "assignment is not allowed")
            }
            other => CompileError::syntax(
                self.here(),
                format!("expected {what}, found {}", other.describe()),
            ),
        }
    }

    fn ident(&mut self, what: &str) -> CompileResult<(String, usize)> {
        let token = self.tokens[self.pos].clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, token.pos))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn finish(&self) -> CompileResult<()> {
        match self.peek() {
            TokenKind::Eof => Ok(()),
            TokenKind::Ident(s) if s == "for" => Err(CompileError::syntax(
                self.here(),
                "a comprehension must be enclosed in brackets or call parentheses",
            )),
            _ => Err(self.unexpected("end of input")),
        }
    }

    /// Build a node, rejecting trees taller than [`MAX_DEPTH`].
    fn node(&self, kind: ExprKind, pos: usize) -> CompileResult<Expr> {
        let expr = Expr::new(kind, pos);
        if expr.height > MAX_DEPTH {
            return Err(CompileError::depth(pos, MAX_DEPTH));
        }
        Ok(expr)
    }

    fn descend(&mut self) -> CompileResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CompileError::depth(self.here(), MAX_DEPTH));
        }
        Ok(())
    }

    // ---- grammar ----

    fn expression(&mut self) -> CompileResult<Expr> {
        self.descend()?;
        let result = self.ternary();
        self.depth -= 1;
        result
    }

    fn ternary(&mut self) -> CompileResult<Expr> {
        if self.is_keyword("lambda") {
            return Err(CompileError::disallowed(
                self.here(),
                "lambda expressions are not allowed",
            ));
        }
        let pos = self.here();
        let then = self.or_expr()?;
        if !self.eat_keyword("if") {
            return Ok(then);
        }
        let condition = self.or_expr()?;
        if !self.eat_keyword("else") {
            return Err(self.unexpected("`else`"));
        }
        let otherwise = self.expression()?;
        self.node(
            ExprKind::IfElse {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            pos,
        )
    }

    fn or_expr(&mut self) -> CompileResult<Expr> {
        self.bool_chain(BoolOp::Or)
    }

    fn bool_chain(&mut self, op: BoolOp) -> CompileResult<Expr> {
        let keyword = match op {
            BoolOp::Or => "or",
            BoolOp::And => "and",
        };
        let pos = self.here();
        let mut operands = vec![self.bool_operand(op)?];
        while self.eat_keyword(keyword) {
            operands.push(self.bool_operand(op)?);
        }
        if operands.len() == 1 {
            return Ok(operands.remove(0));
        }
        self.node(ExprKind::BoolChain { op, operands }, pos)
    }

    fn bool_operand(&mut self, op: BoolOp) -> CompileResult<Expr> {
        match op {
            BoolOp::Or => self.bool_chain(BoolOp::And),
            BoolOp::And => self.not_expr(),
        }
    }

    fn not_expr(&mut self) -> CompileResult<Expr> {
        if !self.is_keyword("not") {
            return self.comparison();
        }
        let pos = self.here();
        self.advance();
        self.descend()?;
        let operand = self.not_expr();
        self.depth -= 1;
        self.node(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            },
            pos,
        )
    }

    fn comparison(&mut self) -> CompileResult<Expr> {
        let pos = self.here();
        let first = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            let rhs_pos = self.here();
            let rhs = self.arith()?;
            if matches!(op, CmpOp::Is | CmpOp::IsNot)
                && !matches!(
                    rhs.kind,
                    ExprKind::Literal(Literal::None | Literal::Bool(_))
                )
            {
                return Err(CompileError::disallowed(
                    rhs_pos,
                    "`is` may only compare against None, True or False",
                ));
            }
            rest.push((op, rhs));
        }
        if rest.is_empty() {
            return Ok(first);
        }
        self.node(
            ExprKind::Compare {
                first: Box::new(first),
                rest,
            },
            pos,
        )
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let (op, width) = match self.peek() {
            TokenKind::EqEq => (CmpOp::Eq, 1),
            TokenKind::NotEq => (CmpOp::NotEq, 1),
            TokenKind::Lt => (CmpOp::Lt, 1),
            TokenKind::Le => (CmpOp::Le, 1),
            TokenKind::Gt => (CmpOp::Gt, 1),
            TokenKind::Ge => (CmpOp::Ge, 1),
            TokenKind::Ident(s) if s == "in" => (CmpOp::In, 1),
            TokenKind::Ident(s) if s == "not" && self.keyword_at(1, "in") => (CmpOp::NotIn, 2),
            TokenKind::Ident(s) if s == "is" => {
                if self.keyword_at(1, "not") {
                    (CmpOp::IsNot, 2)
                } else {
                    (CmpOp::Is, 1)
                }
            }
            _ => return None,
        };
        for _ in 0..width {
            self.advance();
        }
        Some(op)
    }

    fn arith(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            let pos = self.here();
            self.advance();
            let rhs = self.term()?;
            lhs = self.node(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            )?;
        }
    }

    fn term(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            let pos = self.here();
            self.advance();
            let rhs = self.factor()?;
            lhs = self.node(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            )?;
        }
    }

    fn factor(&mut self) -> CompileResult<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.power(),
        };
        let pos = self.here();
        self.advance();
        self.descend()?;
        let operand = self.factor();
        self.depth -= 1;
        self.node(
            ExprKind::Unary {
                op,
                operand: Box::new(operand?),
            },
            pos,
        )
    }

    fn power(&mut self) -> CompileResult<Expr> {
        let base = self.postfix()?;
        if *self.peek() == TokenKind::DoubleStar {
            return Err(CompileError::disallowed(
                self.here(),
                "exponentiation is not allowed",
            ));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> CompileResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            expr = match self.peek() {
                TokenKind::LBracket => self.subscript(expr)?,
                TokenKind::Dot => self.method_call(expr)?,
                TokenKind::LParen => {
                    return Err(CompileError::disallowed(
                        self.here(),
                        "only allow-listed functions can be called",
                    ))
                }
                _ => return Ok(expr),
            };
        }
    }

    fn subscript(&mut self, target: Expr) -> CompileResult<Expr> {
        let pos = self.here();
        self.advance();
        let start = if *self.peek() == TokenKind::Colon {
            None
        } else {
            Some(self.expression()?)
        };
        match (start, self.eat(&TokenKind::Colon)) {
            (Some(index), false) => {
                self.expect(&TokenKind::RBracket, "`]`")?;
                self.node(
                    ExprKind::Index {
                        target: Box::new(target),
                        index: Box::new(index),
                    },
                    pos,
                )
            }
            (start, true) => {
                let stop = if matches!(self.peek(), TokenKind::RBracket | TokenKind::Colon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                if *self.peek() == TokenKind::Colon {
                    return Err(CompileError::disallowed(
                        self.here(),
                        "slice steps are not allowed",
                    ));
                }
                self.expect(&TokenKind::RBracket, "`]`")?;
                self.node(
                    ExprKind::Slice {
                        target: Box::new(target),
                        start: start.map(Box::new),
                        stop: stop.map(Box::new),
                    },
                    pos,
                )
            }
            (None, false) => Err(self.unexpected("an index")),
        }
    }

    fn method_call(&mut self, receiver: Expr) -> CompileResult<Expr> {
        let pos = self.here();
        self.advance();
        let (name, name_pos) = self.ident("a method name")?;
        if name.starts_with("__") {
            return Err(CompileError::disallowed(
                name_pos,
                format!("dunder attribute `{name}` is not allowed"),
            ));
        }
        let Some(method) = Method::lookup(&name) else {
            return Err(CompileError::disallowed(
                name_pos,
                format!("attribute `{name}` is not an allow-listed string method"),
            ));
        };
        if *self.peek() != TokenKind::LParen {
            return Err(CompileError::disallowed(
                self.here(),
                format!("method `{name}` must be called"),
            ));
        }
        let args = self.call_args()?;
        check_arity(method.name(), method.arity(), args.len(), name_pos)?;
        self.node(
            ExprKind::MethodCall {
                receiver: Box::new(receiver),
                method,
                args,
            },
            pos,
        )
    }

    /// Parenthesized argument list. A lone generator expression is accepted
    /// as the only argument.
    fn call_args(&mut self) -> CompileResult<Vec<Expr>> {
        let open = self.here();
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        loop {
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            match self.peek() {
                TokenKind::Star | TokenKind::DoubleStar => {
                    return Err(CompileError::disallowed(
                        self.here(),
                        "argument unpacking is not allowed",
                    ))
                }
                TokenKind::Ident(_) if *self.peek_at(1) == TokenKind::Assign => {
                    return Err(CompileError::disallowed(
                        self.here(),
                        "keyword arguments are not allowed",
                    ))
                }
                _ => {}
            }
            if let Some((target, target_pos)) = self.comprehension_target() {
                if !args.is_empty() {
                    return Err(CompileError::syntax(
                        self.here(),
                        "a generator expression must be the only argument",
                    ));
                }
                let comp = self.comprehension(target, target_pos, open)?;
                self.expect(&TokenKind::RParen, "`)`")?;
                return Ok(vec![comp]);
            }
            args.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen, "`,` or `)`")?;
                return Ok(args);
            }
        }
    }

    /// Look ahead for `element for <var> in ...` at the current bracket
    /// level and return the loop variable, so the element can be parsed
    /// with it in scope.
    fn comprehension_target(&self) -> Option<(String, usize)> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(self.pos) {
            match &token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return None;
                    }
                    depth -= 1;
                }
                TokenKind::Comma if depth == 0 => return None,
                TokenKind::Ident(s) if depth == 0 && s == "for" => {
                    return match self.tokens.get(i + 1) {
                        Some(Token {
                            kind: TokenKind::Ident(var),
                            pos,
                        }) => Some((var.clone(), *pos)),
                        _ => None,
                    };
                }
                TokenKind::Eof => return None,
                _ => {}
            }
        }
        None
    }

    fn comprehension(&mut self, var: String, var_pos: usize, pos: usize) -> CompileResult<Expr> {
        self.check_loop_variable(&var, var_pos)?;
        let slot = self.locals.len();

        self.locals.push(var.clone());
        let element = self.expression();
        self.locals.pop();
        let element = element?;

        if !self.eat_keyword("for") {
            return Err(self.unexpected("`for`"));
        }
        self.advance();
        if *self.peek() == TokenKind::Comma {
            return Err(CompileError::disallowed(
                self.here(),
                "tuple unpacking in comprehensions is not allowed",
            ));
        }
        if !self.eat_keyword("in") {
            return Err(self.unexpected("`in`"));
        }
        // The iterable is evaluated in the enclosing scope.
        let iter = self.or_expr()?;

        let condition = if self.eat_keyword("if") {
            self.locals.push(var);
            let cond = self.or_expr();
            self.locals.pop();
            Some(cond?)
        } else {
            None
        };
        if self.is_keyword("for") || self.is_keyword("if") {
            return Err(CompileError::disallowed(
                self.here(),
                "comprehensions take a single `for` and at most one `if`",
            ));
        }
        self.node(
            ExprKind::Comprehension(Box::new(Comprehension {
                element,
                slot,
                iter,
                condition,
            })),
            pos,
        )
    }

    fn check_loop_variable(&self, var: &str, pos: usize) -> CompileResult<()> {
        let reserved = matches!(
            var,
            "name" | "content" | "True" | "False" | "None" | "re" | "matches" | "lambda"
        ) || KEYWORDS.contains(&var)
            || Builtin::lookup(var).is_some();
        if reserved || var.starts_with("__") {
            return Err(CompileError::disallowed(
                pos,
                format!("`{var}` cannot be used as a loop variable"),
            ));
        }
        if self.locals.iter().any(|l| l == var) {
            return Err(CompileError::disallowed(
                pos,
                format!("loop variable `{var}` shadows an enclosing one"),
            ));
        }
        Ok(())
    }

    fn atom(&mut self) -> CompileResult<Expr> {
        let token = self.tokens[self.pos].clone();
        let pos = token.pos;
        match token.kind {
            TokenKind::Int(i) => {
                self.advance();
                self.node(ExprKind::Literal(Literal::Int(i)), pos)
            }
            TokenKind::Float(x) => {
                self.advance();
                self.node(ExprKind::Literal(Literal::Float(x)), pos)
            }
            TokenKind::Str(_) => {
                let s = self.string_literal();
                self.node(ExprKind::Literal(Literal::Str(s.into())), pos)
            }
            TokenKind::LParen => self.parenthesized(),
            TokenKind::LBracket => self.list_display(),
            TokenKind::LBrace => Err(CompileError::disallowed(
                pos,
                "dict and set literals are not allowed",
            )),
            TokenKind::Ident(name) => {
                self.advance();
                self.identifier(name, pos)
            }
            TokenKind::Eof => Err(CompileError::syntax(pos, "unexpected end of input")),
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// One or more adjacent string tokens, concatenated.
    fn string_literal(&mut self) -> String {
        let mut out = String::new();
        while let TokenKind::Str(part) = self.peek() {
            out.push_str(part);
            self.advance();
        }
        out
    }

    fn parenthesized(&mut self) -> CompileResult<Expr> {
        let pos = self.here();
        self.advance();
        if self.eat(&TokenKind::RParen) {
            return self.node(ExprKind::List(Vec::new()), pos);
        }
        if let Some((var, var_pos)) = self.comprehension_target() {
            let comp = self.comprehension(var, var_pos, pos)?;
            self.expect(&TokenKind::RParen, "`)`")?;
            return Ok(comp);
        }
        let first = self.expression()?;
        if self.eat(&TokenKind::RParen) {
            return Ok(first);
        }
        self.expect(&TokenKind::Comma, "`,` or `)`")?;
        let items = self.sequence_tail(first, &TokenKind::RParen)?;
        self.node(ExprKind::List(items), pos)
    }

    fn list_display(&mut self) -> CompileResult<Expr> {
        let pos = self.here();
        self.advance();
        if self.eat(&TokenKind::RBracket) {
            return self.node(ExprKind::List(Vec::new()), pos);
        }
        if let Some((var, var_pos)) = self.comprehension_target() {
            let comp = self.comprehension(var, var_pos, pos)?;
            self.expect(&TokenKind::RBracket, "`]`")?;
            return Ok(comp);
        }
        let first = self.expression()?;
        if self.eat(&TokenKind::RBracket) {
            return self.node(ExprKind::List(vec![first]), pos);
        }
        self.expect(&TokenKind::Comma, "`,` or `]`")?;
        let items = self.sequence_tail(first, &TokenKind::RBracket)?;
        self.node(ExprKind::List(items), pos)
    }

    /// Remaining items of a tuple or list display after the first comma.
    fn sequence_tail(&mut self, first: Expr, close: &TokenKind) -> CompileResult<Vec<Expr>> {
        let mut items = vec![first];
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close, &close.describe())?;
                return Ok(items);
            }
        }
    }

    fn identifier(&mut self, name: String, pos: usize) -> CompileResult<Expr> {
        let kind = match name.as_str() {
            "True" => ExprKind::Literal(Literal::Bool(true)),
            "False" => ExprKind::Literal(Literal::Bool(false)),
            "None" => ExprKind::Literal(Literal::None),
            "name" => ExprKind::Var(Var::Name),
            "content" => ExprKind::Var(Var::Content),
            "re" => return self.regex_module(pos),
            "matches" => return self.regex_call(RegexOp::Matches, pos),
            "lambda" => {
                return Err(CompileError::disallowed(
                    pos,
                    "lambda expressions are not allowed",
                ))
            }
            word if KEYWORDS.contains(&word) => {
                return Err(CompileError::syntax(
                    pos,
                    format!("unexpected keyword `{word}`"),
                ))
            }
            _ => {
                if let Some(slot) = self.locals.iter().position(|l| *l == name) {
                    ExprKind::Var(Var::Local(slot))
                } else if let Some(func) = Builtin::lookup(&name) {
                    return self.builtin_call(func, pos);
                } else if name.starts_with("__") {
                    return Err(CompileError::disallowed(
                        pos,
                        format!("dunder name `{name}` is not allowed"),
                    ));
                } else {
                    return Err(CompileError::disallowed(
                        pos,
                        format!("unknown identifier `{name}`"),
                    ));
                }
            }
        };
        self.node(kind, pos)
    }

    fn builtin_call(&mut self, func: Builtin, pos: usize) -> CompileResult<Expr> {
        if *self.peek() != TokenKind::LParen {
            return Err(CompileError::disallowed(
                pos,
                format!("function `{}` must be called", func.name()),
            ));
        }
        let args = self.call_args()?;
        check_arity(func.name(), func.arity(), args.len(), pos)?;
        self.node(ExprKind::Call { func, args }, pos)
    }

    /// `re.<op>(...)`. The `re.` prefix is a fixed spelling.
    fn regex_module(&mut self, pos: usize) -> CompileResult<Expr> {
        if *self.peek() != TokenKind::Dot {
            return Err(CompileError::disallowed(
                pos,
                "`re` can only be used as `re.search`, `re.match`, `re.fullmatch` or `re.findall`",
            ));
        }
        self.advance();
        let (func, func_pos) = self.ident("a regex function")?;
        let op = match func.as_str() {
            "search" => RegexOp::Search,
            "match" => RegexOp::Match,
            "fullmatch" => RegexOp::Fullmatch,
            "findall" => RegexOp::Findall,
            other => {
                return Err(CompileError::disallowed(
                    func_pos,
                    format!("`re.{other}` is not allowed"),
                ))
            }
        };
        self.regex_call(op, pos)
    }

    fn regex_call(&mut self, op: RegexOp, pos: usize) -> CompileResult<Expr> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let pattern_pos = self.here();
        if !matches!(self.peek(), TokenKind::Str(_)) {
            return Err(CompileError::disallowed(
                pattern_pos,
                "regex patterns must be string literals",
            ));
        }
        let pattern = self.string_literal();
        if *self.peek() != TokenKind::Comma {
            return Err(if *self.peek() == TokenKind::RParen {
                CompileError::syntax(self.here(), format!("`{}` takes a subject", op.name()))
            } else {
                CompileError::disallowed(pattern_pos, "regex patterns must be string literals")
            });
        }
        self.advance();
        let subject = self.expression()?;

        let mut flags = RegexFlags::default();
        if self.eat(&TokenKind::Comma) && *self.peek() != TokenKind::RParen {
            if op == RegexOp::Matches {
                return Err(CompileError::disallowed(
                    self.here(),
                    "`matches` takes no flags",
                ));
            }
            if self.is_keyword("flags") && *self.peek_at(1) == TokenKind::Assign {
                self.advance();
                self.advance();
            }
            flags = self.regex_flags()?;
            self.eat(&TokenKind::Comma);
        }
        self.expect(&TokenKind::RParen, "`)`")?;

        let literal = compile_regex(op, pattern, flags, pattern_pos)?;
        self.node(
            ExprKind::Regex {
                op,
                pattern: literal,
                subject: Box::new(subject),
            },
            pos,
        )
    }

    /// `re.X` or several joined with `|`, e.g. `re.I | re.M`.
    fn regex_flags(&mut self) -> CompileResult<RegexFlags> {
        let mut flags = RegexFlags::default();
        loop {
            let pos = self.here();
            if !(self.eat_keyword("re") && self.eat(&TokenKind::Dot)) {
                return Err(CompileError::disallowed(
                    pos,
                    "regex flags must be written as `re.<FLAG>`",
                ));
            }
            let (flag, flag_pos) = self.ident("a regex flag")?;
            match flag.as_str() {
                "I" | "IGNORECASE" => flags.ignore_case = true,
                "M" | "MULTILINE" => flags.multi_line = true,
                "S" | "DOTALL" => flags.dot_all = true,
                other => {
                    return Err(CompileError::disallowed(
                        flag_pos,
                        format!("unsupported regex flag `re.{other}`"),
                    ))
                }
            }
            if !self.eat(&TokenKind::Pipe) {
                return Ok(flags);
            }
        }
    }
}

fn check_arity(name: &str, (min, max): (usize, usize), got: usize, pos: usize) -> CompileResult<()> {
    if got >= min && got <= max {
        return Ok(());
    }
    let expected = if min == max {
        format!("{min}")
    } else if max == usize::MAX {
        format!("at least {min}")
    } else {
        format!("{min} to {max}")
    };
    Err(CompileError::disallowed(
        pos,
        format!("`{name}` takes {expected} argument(s), got {got}"),
    ))
}

fn compile_regex(
    op: RegexOp,
    source: String,
    flags: RegexFlags,
    pos: usize,
) -> CompileResult<RegexLiteral> {
    let program = match op {
        RegexOp::Match => format!(r"\A(?:{source})"),
        RegexOp::Fullmatch => format!(r"\A(?:{source})\z"),
        _ => source.clone(),
    };
    let regex = RegexBuilder::new(&program)
        .case_insensitive(flags.ignore_case)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_all)
        .size_limit(REGEX_SIZE_LIMIT)
        .dfa_size_limit(REGEX_SIZE_LIMIT)
        .nest_limit(REGEX_NEST_LIMIT)
        .build()
        .map_err(|e| match e {
            regex::Error::CompiledTooBig(_) => {
                CompileError::disallowed(pos, format!("regex pattern is too large: {e}"))
            }
            _ => CompileError::syntax(pos, format!("invalid regex pattern: {e}")),
        })?;
    Ok(RegexLiteral {
        source,
        flags,
        regex,
    })
}
