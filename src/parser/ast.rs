use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorName {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Black,
    White,
}

impl ColorName {
    pub const ALL: [ColorName; 8] = [
        ColorName::Red,
        ColorName::Orange,
        ColorName::Yellow,
        ColorName::Green,
        ColorName::Blue,
        ColorName::Purple,
        ColorName::Black,
        ColorName::White,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ColorName::Red => "red",
            ColorName::Orange => "orange",
            ColorName::Yellow => "yellow",
            ColorName::Green => "green",
            ColorName::Blue => "blue",
            ColorName::Purple => "purple",
            ColorName::Black => "black",
            ColorName::White => "white",
        }
    }

    /// The constant an evaluator substitutes for the name, as (r, g, b).
    pub fn rgb(self) -> (f64, f64, f64) {
        match self {
            ColorName::Red => (1.0, 0.0, 0.0),
            ColorName::Orange => (1.0, 0.5, 0.0),
            ColorName::Yellow => (1.0, 1.0, 0.0),
            ColorName::Green => (0.0, 1.0, 0.0),
            ColorName::Blue => (0.0, 0.0, 1.0),
            ColorName::Purple => (1.0, 0.0, 1.0),
            ColorName::Black => (0.0, 0.0, 0.0),
            ColorName::White => (1.0, 1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Sphere,
    Plane,
    Csg,
    Cube,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 4] = [
        ObjectKind::Sphere,
        ObjectKind::Plane,
        ObjectKind::Csg,
        ObjectKind::Cube,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Sphere => "sphere",
            ObjectKind::Plane => "plane",
            ObjectKind::Csg => "csg",
            ObjectKind::Cube => "cube",
        }
    }
}

/// Boolean operation of a `csg(...)` object, passed as a string argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CsgOperator {
    Union,
    Intersection,
    Difference,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown CSG operator '{0}', expected 'union', 'intersection' or 'difference'")]
pub struct UnknownCsgOperator(pub String);

impl FromStr for CsgOperator {
    type Err = UnknownCsgOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "union" => Ok(CsgOperator::Union),
            "intersection" => Ok(CsgOperator::Intersection),
            "difference" => Ok(CsgOperator::Difference),
            other => Err(UnknownCsgOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    LessThan,
    GreaterThan,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::LessThan | BinaryOperator::GreaterThan => 1,
            BinaryOperator::Add | BinaryOperator::Subtract => 2,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 3,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Number(f64),
    Color(ColorName),
    Rgb {
        r: Box<Expr>,
        g: Box<Expr>,
        b: Box<Expr>,
    },
    Vector {
        x: Box<Expr>,
        y: Box<Expr>,
        z: Box<Expr>,
    },
    Texture {
        path: Box<Expr>,
    },
    Object {
        kind: ObjectKind,
        args: Vec<Expr>,
    },
    Paren(Box<Expr>),
    StringLit(String),
    Identifier(String),
    Negate(Box<Expr>),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Scale,
    Rotate,
    Translate,
}

impl TransformKind {
    pub const ALL: [TransformKind; 3] = [
        TransformKind::Scale,
        TransformKind::Rotate,
        TransformKind::Translate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransformKind::Scale => "scale",
            TransformKind::Rotate => "rotate",
            TransformKind::Translate => "translate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    Draw,
    Display,
    Append,
}

impl CommandName {
    pub const ALL: [CommandName; 3] = [
        CommandName::Draw,
        CommandName::Display,
        CommandName::Append,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::Draw => "draw",
            CommandName::Display => "display",
            CommandName::Append => "append",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Assignment {
        is_local: bool,
        name: String,
        value: Expr,
    },

    // Applies to exactly one statement; use `do ... end` for several
    Transformation {
        kind: TransformKind,
        args: [Expr; 3],
        body: Box<Statement>,
    },

    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Statement>,
    },

    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },

    If {
        condition: Expr,
        body: Vec<Statement>,
    },

    While {
        condition: Expr,
        body: Vec<Statement>,
    },

    Do {
        body: Vec<Statement>,
    },

    Command {
        name: CommandName,
        args: Vec<Expr>,
    },

    AppendLight {
        args: Vec<Expr>,
    },

    SetCamera {
        value: Expr,
    },
}

/// A parsed scene. Statement order is execution and draw order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Program { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.statements.iter()
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Statement;
    type IntoIter = std::slice::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

impl fmt::Display for ColorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csg_operator_tags() {
        assert_eq!("union".parse::<CsgOperator>(), Ok(CsgOperator::Union));
        assert_eq!("difference".parse::<CsgOperator>(), Ok(CsgOperator::Difference));
        let err = "xor".parse::<CsgOperator>().unwrap_err();
        assert!(err.to_string().contains("'xor'"));
    }

    #[test]
    fn test_color_constants() {
        assert_eq!(ColorName::Orange.rgb(), (1.0, 0.5, 0.0));
        assert_eq!(ColorName::Purple.rgb(), (1.0, 0.0, 1.0));
        assert!(ColorName::ALL.iter().all(|c| crate::lexer::COLOR_NAMES.contains(&c.as_str())));
    }

    #[test]
    fn test_keyword_enums_are_reserved() {
        for kind in ObjectKind::ALL {
            assert!(crate::lexer::is_reserved(kind.as_str()));
        }
        for kind in TransformKind::ALL {
            assert!(crate::lexer::is_reserved(kind.as_str()));
        }
        for name in CommandName::ALL {
            assert!(crate::lexer::is_reserved(name.as_str()));
        }
    }

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOperator::Multiply.precedence() > BinaryOperator::Add.precedence());
        assert!(BinaryOperator::Add.precedence() > BinaryOperator::LessThan.precedence());
        assert!(BinaryOperator::GreaterThan.is_comparison());
        assert!(!BinaryOperator::Modulo.is_comparison());
    }
}
