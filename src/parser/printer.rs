//! Renders syntax trees back to scene source.
//!
//! Output for a parsed program parses back to the same tree: one statement
//! per line, blocks indented by four spaces, parentheses only where the
//! tree has a `Paren` node or precedence needs them.

use std::fmt::{self, Write};

use super::ast::{Expr, Program, Statement};

const INDENT: &str = "    ";

struct Args<'a>(&'a [Expr]);

impl fmt::Display for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        Ok(())
    }
}

fn write_indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

/// Body lines one level deeper, then `end` at the opener's depth.
fn write_block(f: &mut fmt::Formatter<'_>, body: &[Statement], depth: usize) -> fmt::Result {
    for statement in body {
        write_indent(f, depth + 1)?;
        write_statement(f, statement, depth + 1)?;
        f.write_char('\n')?;
    }
    write_indent(f, depth)?;
    f.write_str("end")
}

/// Writes one statement starting at the current column. `depth` is only
/// used for the lines of nested blocks.
fn write_statement(f: &mut fmt::Formatter<'_>, statement: &Statement, depth: usize) -> fmt::Result {
    match statement {
        Statement::Assignment { is_local, name, value } => {
            if *is_local {
                f.write_str("local ")?;
            }
            write!(f, "{} = {}", name, value)
        }
        Statement::Transformation { kind, args, body } => {
            write!(f, "{}({}) ", kind, Args(&args[..]))?;
            write_statement(f, body, depth)
        }
        Statement::FunctionDef { name, params, body } => {
            writeln!(f, "function {}({})", name, params.join(", "))?;
            write_block(f, body, depth)
        }
        Statement::FunctionCall { name, args } => write!(f, "call {}({})", name, Args(args)),
        Statement::If { condition, body } => {
            writeln!(f, "if {} then", condition)?;
            write_block(f, body, depth)
        }
        Statement::While { condition, body } => {
            writeln!(f, "while {} do", condition)?;
            write_block(f, body, depth)
        }
        Statement::Do { body } => {
            writeln!(f, "do")?;
            write_block(f, body, depth)
        }
        Statement::Command { name, args } => write!(f, "{}({})", name, Args(args)),
        Statement::AppendLight { args } => write!(f, "append light({})", Args(args)),
        Statement::SetCamera { value } => write!(f, "set camera({})", value),
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write_statement(f, statement, 0)?;
            f.write_char('\n')?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_statement(f, self, 0)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    // Literals are never negative; a hand-built negative prints as a negation
    if n.is_sign_negative() && n != 0.0 {
        write!(f, "(-{})", -n)
    } else {
        write!(f, "{}", n)
    }
}

/// Operand of a binary operator, parenthesized when it would otherwise
/// re-associate. Comparisons do not chain, so a comparison inside another
/// always gets parentheses.
fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expr, parent: u8, is_right: bool) -> fmt::Result {
    let needs_parens = match operand {
        Expr::BinaryOp { op, .. } => {
            let precedence = op.precedence();
            precedence < parent || (precedence == parent && (is_right || op.is_comparison()))
        }
        _ => false,
    };
    if needs_parens {
        write!(f, "({})", operand)
    } else {
        write!(f, "{}", operand)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write_number(f, *n),
            Expr::Color(color) => write!(f, "{}", color),
            Expr::Rgb { r, g, b } => write!(f, "rgb({}, {}, {})", r, g, b),
            Expr::Vector { x, y, z } => write!(f, "<{}, {}, {}>", x, y, z),
            Expr::Texture { path } => write!(f, "texture({})", path),
            Expr::Object { kind, args } => write!(f, "{}({})", kind, Args(args)),
            Expr::Paren(inner) => write!(f, "({})", inner),
            Expr::StringLit(text) if text.contains('\'') => write!(f, "\"{}\"", text),
            Expr::StringLit(text) => write!(f, "'{}'", text),
            Expr::Identifier(name) => f.write_str(name),
            Expr::Negate(inner) => match inner.as_ref() {
                Expr::Negate(_) | Expr::BinaryOp { .. } => write!(f, "-({})", inner),
                Expr::Number(n) if n.is_sign_negative() && *n != 0.0 => write!(f, "-({})", inner),
                _ => write!(f, "-{}", inner),
            },
            Expr::BinaryOp { left, op, right } => {
                write_operand(f, left, op.precedence(), false)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, op.precedence(), true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{BinaryOperator, ColorName, CommandName, ObjectKind};
    use crate::parser::parse;

    fn num(n: f64) -> Expr {
        Expr::Number(n)
    }

    fn round_trip(source: &str) {
        let program = parse(source).unwrap();
        let printed = program.to_string();
        let reparsed = parse(&printed)
            .unwrap_or_else(|e| panic!("printed source failed to parse: {}\n{}", e, printed));
        assert_eq!(program, reparsed, "printed as:\n{}", printed);
    }

    #[test]
    fn test_print_expressions() {
        let sum = Expr::binary(num(1.0), BinaryOperator::Add, num(2.0));
        assert_eq!(Expr::binary(sum.clone(), BinaryOperator::Multiply, num(3.0)).to_string(), "(1 + 2) * 3");
        assert_eq!(Expr::binary(num(3.0), BinaryOperator::Subtract, sum.clone()).to_string(), "3 - (1 + 2)");
        assert_eq!(Expr::binary(sum, BinaryOperator::Subtract, num(3.0)).to_string(), "1 + 2 - 3");
        assert_eq!(Expr::Negate(Box::new(num(0.5))).to_string(), "-0.5");
        assert_eq!(num(-2.0).to_string(), "(-2)");
        assert_eq!(Expr::Color(ColorName::White).to_string(), "white");
        assert_eq!(Expr::StringLit("it's".to_string()).to_string(), "\"it's\"");
    }

    #[test]
    fn test_print_program_layout() {
        let program = Program::new(vec![
            Statement::Assignment {
                is_local: true,
                name: "a".to_string(),
                value: Expr::Object { kind: ObjectKind::Cube, args: vec![num(1.0), num(2.5)] },
            },
            Statement::Do {
                body: vec![Statement::Command {
                    name: CommandName::Draw,
                    args: vec![Expr::Identifier("a".to_string())],
                }],
            },
        ]);
        assert_eq!(program.to_string(), "local a = cube(1, 2.5)\ndo\n    draw(a)\nend\n");
    }

    #[test]
    fn test_round_trip_expressions() {
        round_trip("a = 2 + 3 * 4 - (5 - 6) % 7\nb = -a * -(1 + 2)\nc = 10 - (4 - 3)");
        round_trip("v = <1, -2, 0.25> + <a, b, c> * 2");
        round_trip("s = csg(a, b, 'difference', rgb(0.0, 1.0, 1.0), 0.0, 0.8)");
        round_trip("t = texture(\"it's.png\")\nu = red * 0.5");
    }

    #[test]
    fn test_round_trip_large_numbers() {
        let large = format!("x = {}", "9".repeat(300));
        round_trip(&large);
        assert_eq!(parse(&large).unwrap().to_string(), format!("x = 1{}\n", "0".repeat(300)));

        // A literal never overflows to infinity, so `inf` cannot be printed
        let err = parse(&format!("x = {}", "9".repeat(400))).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::errors::ErrorKind::Lexical(crate::lexer::LexError::MalformedNumber { .. })
        ));
        assert_eq!(err.position.column, 5);
    }

    #[test]
    fn test_round_trip_statements() {
        round_trip(
            "set camera(<0, 10, -50>)\n\
             append light(<0, 0, -35>, white * 0.5, 100)\n\
             function ring(r n)\n  i = 0\n  while i < n do\n    rotate(0, i * 30, 0) translate(r, 0, 0) draw(cube(1))\n    i = i + 1\n  end\nend\n\
             if 1 > 0 then call ring(10, 12) end\n\
             do end\n\
             display(sphere(<0, 0, 0>, 5))",
        );
    }
}
