//! Canonical rendering of a compiled predicate.
//!
//! Two sources that differ only in whitespace, quoting, redundant
//! parentheses, loop variable names, operand order of `and`/`or`, or the
//! sides of `==`/`!=` render to the same string. The rendering is fed to
//! SHA-256 to produce the hypothesis fingerprint.

use sha2::{Digest, Sha256};

use super::ast::*;

pub fn render(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(expr, &mut out);
    out
}

/// Hex SHA-256 of the canonical form.
pub fn fingerprint(canonical: &str) -> String {
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn write_expr(expr: &Expr, out: &mut String) {
    match &expr.kind {
        ExprKind::Literal(lit) => write_literal(lit, out),
        ExprKind::Var(Var::Name) => out.push_str("name"),
        ExprKind::Var(Var::Content) => out.push_str("content"),
        ExprKind::Var(Var::Local(slot)) => {
            out.push('_');
            out.push_str(&slot.to_string());
        }
        ExprKind::List(items) => {
            out.push('[');
            write_list(items, out);
            out.push(']');
        }
        ExprKind::Unary { op, operand } => {
            out.push('(');
            out.push_str(match op {
                UnaryOp::Not => "not ",
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
            });
            write_expr(operand, out);
            out.push(')');
        }
        ExprKind::Binary { op, lhs, rhs } => {
            out.push('(');
            write_expr(lhs, out);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            write_expr(rhs, out);
            out.push(')');
        }
        ExprKind::BoolChain { op, operands } => {
            let mut parts = Vec::new();
            flatten(*op, operands, &mut parts);
            parts.sort();
            parts.dedup();
            let sep = match op {
                BoolOp::And => " and ",
                BoolOp::Or => " or ",
            };
            out.push('(');
            out.push_str(&parts.join(sep));
            out.push(')');
        }
        ExprKind::Compare { first, rest } => {
            out.push('(');
            if let [(op @ (CmpOp::Eq | CmpOp::NotEq), rhs)] = rest.as_slice() {
                let mut sides = [render(first), render(rhs)];
                sides.sort();
                out.push_str(&sides[0]);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                out.push_str(&sides[1]);
            } else {
                write_expr(first, out);
                for (op, rhs) in rest {
                    out.push(' ');
                    out.push_str(op.symbol());
                    out.push(' ');
                    write_expr(rhs, out);
                }
            }
            out.push(')');
        }
        ExprKind::IfElse {
            condition,
            then,
            otherwise,
        } => {
            out.push('(');
            write_expr(then, out);
            out.push_str(" if ");
            write_expr(condition, out);
            out.push_str(" else ");
            write_expr(otherwise, out);
            out.push(')');
        }
        ExprKind::Index { target, index } => {
            write_expr(target, out);
            out.push('[');
            write_expr(index, out);
            out.push(']');
        }
        ExprKind::Slice {
            target,
            start,
            stop,
        } => {
            write_expr(target, out);
            out.push('[');
            if let Some(start) = start {
                write_expr(start, out);
            }
            out.push(':');
            if let Some(stop) = stop {
                write_expr(stop, out);
            }
            out.push(']');
        }
        ExprKind::Call { func, args } => {
            out.push_str(func.name());
            out.push('(');
            write_list(args, out);
            out.push(')');
        }
        ExprKind::MethodCall {
            receiver,
            method,
            args,
        } => {
            write_expr(receiver, out);
            out.push('.');
            out.push_str(method.name());
            out.push('(');
            write_list(args, out);
            out.push(')');
        }
        ExprKind::Regex {
            op,
            pattern,
            subject,
        } => {
            out.push_str(op.name());
            out.push('(');
            write_str_literal(&pattern.source, out);
            out.push_str(", ");
            write_expr(subject, out);
            let flags = pattern.flags;
            if !flags.is_empty() {
                let mut names = Vec::new();
                if flags.ignore_case {
                    names.push("re.I");
                }
                if flags.multi_line {
                    names.push("re.M");
                }
                if flags.dot_all {
                    names.push("re.S");
                }
                out.push_str(", ");
                out.push_str(&names.join("|"));
            }
            out.push(')');
        }
        ExprKind::Comprehension(comp) => {
            out.push('[');
            write_expr(&comp.element, out);
            out.push_str(" for _");
            out.push_str(&comp.slot.to_string());
            out.push_str(" in ");
            write_expr(&comp.iter, out);
            if let Some(cond) = &comp.condition {
                out.push_str(" if ");
                write_expr(cond, out);
            }
            out.push(']');
        }
    }
}

/// Collect the rendered operands of nested chains with the same operator.
fn flatten(op: BoolOp, operands: &[Expr], parts: &mut Vec<String>) {
    for operand in operands {
        match &operand.kind {
            ExprKind::BoolChain {
                op: inner,
                operands: nested,
            } if *inner == op => flatten(op, nested, parts),
            _ => parts.push(render(operand)),
        }
    }
}

fn write_list(items: &[Expr], out: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(item, out);
    }
}

fn write_literal(lit: &Literal, out: &mut String) {
    match lit {
        Literal::None => out.push_str("None"),
        Literal::Bool(true) => out.push_str("True"),
        Literal::Bool(false) => out.push_str("False"),
        Literal::Int(i) => out.push_str(&i.to_string()),
        Literal::Float(x) => out.push_str(&format!("{x:?}")),
        Literal::Str(s) => write_str_literal(s, out),
    }
}

fn write_str_literal(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() || !c.is_ascii() => {
                out.push_str(&format!("\\u{{{:x}}}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;

    fn canon(src: &str) -> String {
        render(&parse(src).unwrap())
    }

    #[test]
    fn combined_regex_flags_render_back_to_source() {
        let rendered = canon("re.search('a', content, re.M | re.IGNORECASE)");
        assert_eq!(rendered, r#"re.search("a", content, re.I|re.M)"#);
        assert_eq!(canon(&rendered), rendered);
    }

    #[test]
    fn ignores_whitespace_and_quotes() {
        assert_eq!(canon("len(content)==0"), canon("len( content ) == 0"));
        assert_eq!(canon("name == 'a'"), canon("name == \"a\""));
    }

    #[test]
    fn sorts_boolean_and_equality_operands() {
        assert_eq!(
            canon("name == 'x' and len(content) > 3"),
            canon("len(content) > 3 and 'x' == name")
        );
        assert_eq!(
            canon("(name or content) or 'a' in name"),
            canon("'a' in name or content or name")
        );
    }

    #[test]
    fn keeps_ordering_comparisons_directional() {
        assert_ne!(canon("len(name) < 3"), canon("3 < len(name)"));
    }

    #[test]
    fn renames_loop_variables() {
        assert_eq!(
            canon("any(c.isupper() for c in content)"),
            canon("any([ch.isupper() for ch in content])")
        );
    }

    #[test]
    fn escapes_invisible_characters() {
        let c = canon(r"'\u200b' in content");
        assert!(c.contains(r"\u{200b}"), "{c}");
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint("(len(content) == 0)");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
