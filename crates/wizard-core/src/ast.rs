//! Syntax tree for wizard scripts.
//!
//! Blocks are shared slices so the engine can keep a cursor into a block
//! across a suspension without borrowing from the [`Script`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::requirements::RequirementSpec;

/// A sequence of statements executed in order.
pub type Block = Arc<[Statement]>;

/// A parsed wizard script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub source: Arc<str>,
    pub statements: Block,
    /// Every `RequireVersions` clause in the script, in declaration order.
    pub requirements: Vec<RequirementSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatementKind {
    Assign {
        variable: String,
        op: AssignOp,
        value: Expression,
    },
    If {
        branches: Vec<Branch>,
        else_block: Option<Block>,
    },
    Select(Arc<Select>),
    RequireVersions(Vec<RequirementSpec>),
    Directive(Directive),
    Cancel(Option<Expression>),
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

/// One `If`/`ElseIf` arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expression,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// `SelectOne`: exactly one option.
    ExactlyOne,
    /// `SelectAtLeastOne`: a non-empty subset.
    AtLeastOne,
    /// `SelectMany`: any subset, including none.
    Any,
}

impl SelectionMode {
    pub fn allows_empty(&self) -> bool {
        matches!(self, SelectionMode::Any)
    }
}

/// A `Select*` ... `EndSelect` statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Select {
    pub mode: SelectionMode,
    pub description: Expression,
    pub options: Vec<OptionDecl>,
    /// Runs when none of the chosen options has a `Case` block.
    pub default_block: Option<Block>,
}

/// An option declared by a `Select*` statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDecl {
    pub label: String,
    pub description: Expression,
    pub image: Option<String>,
    /// Declared with a leading `|`.
    pub is_default: bool,
    /// The matching `Case` block, if the script declared one.
    pub body: Option<Block>,
}

/// Statements that feed the installation plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Directive {
    SelectSubPackage(Expression),
    DeSelectSubPackage(Expression),
    SelectAll,
    DeSelectAll,
    SelectPlugin(Expression),
    DeSelectPlugin(Expression),
    RenamePlugin {
        from: Expression,
        to: Expression,
    },
    EditIni {
        file: Expression,
        section: Expression,
        key: Expression,
        value: Expression,
    },
    Note(Expression),
}

impl Directive {
    pub fn name(&self) -> &'static str {
        match self {
            Directive::SelectSubPackage(_) => "SelectSubPackage",
            Directive::DeSelectSubPackage(_) => "DeSelectSubPackage",
            Directive::SelectAll => "SelectAll",
            Directive::DeSelectAll => "DeSelectAll",
            Directive::SelectPlugin(_) => "SelectPlugin",
            Directive::DeSelectPlugin(_) => "DeSelectPlugin",
            Directive::RenamePlugin { .. } => "RenameEspm",
            Directive::EditIni { .. } => "EditINI",
            Directive::Note(_) => "Note",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expression {
    Bool(bool),
    Int(i64),
    String(String),
    /// A string literal containing `%name%` markers.
    Interpolated(Vec<Segment>),
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        function: Builtin,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn string(s: impl Into<String>) -> Self {
        Expression::String(s.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Literal(String),
    Variable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

/// Functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Builtin {
    CompareGameVersion,
    CompareScriptExtenderVersion,
    CompareGraphicsExtenderVersion,
    CompareWryeBashVersion,
    DataFileExists,
    GetPluginLoadOrder,
    GetPluginStatus,
    GetFilename,
    GetFolder,
    Version,
    Len,
    Str,
    Int,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "CompareGameVersion" => Some(Builtin::CompareGameVersion),
            "CompareScriptExtenderVersion" | "CompareSEVersion" => {
                Some(Builtin::CompareScriptExtenderVersion)
            }
            "CompareGraphicsExtenderVersion" | "CompareGEVersion" => {
                Some(Builtin::CompareGraphicsExtenderVersion)
            }
            "CompareWryeBashVersion" | "CompareWBVersion" => Some(Builtin::CompareWryeBashVersion),
            "DataFileExists" => Some(Builtin::DataFileExists),
            "GetPluginLoadOrder" => Some(Builtin::GetPluginLoadOrder),
            "GetPluginStatus" | "GetEspmStatus" => Some(Builtin::GetPluginStatus),
            "GetFilename" => Some(Builtin::GetFilename),
            "GetFolder" => Some(Builtin::GetFolder),
            "Version" => Some(Builtin::Version),
            "len" => Some(Builtin::Len),
            "str" => Some(Builtin::Str),
            "int" => Some(Builtin::Int),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::CompareGameVersion => "CompareGameVersion",
            Builtin::CompareScriptExtenderVersion => "CompareScriptExtenderVersion",
            Builtin::CompareGraphicsExtenderVersion => "CompareGraphicsExtenderVersion",
            Builtin::CompareWryeBashVersion => "CompareWryeBashVersion",
            Builtin::DataFileExists => "DataFileExists",
            Builtin::GetPluginLoadOrder => "GetPluginLoadOrder",
            Builtin::GetPluginStatus => "GetPluginStatus",
            Builtin::GetFilename => "GetFilename",
            Builtin::GetFolder => "GetFolder",
            Builtin::Version => "Version",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
        }
    }

    /// Accepted argument counts as `(min, max)`; `max` of `None` is variadic.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Builtin::DataFileExists => (1, None),
            Builtin::GetPluginLoadOrder => (1, Some(2)),
            _ => (1, Some(1)),
        }
    }
}
