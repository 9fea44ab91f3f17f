//! Recursive-descent parser for wizard scripts.
//!
//! Scripts are line oriented: every statement ends at a newline (a trailing
//! `\` continues it on the next line). Block statements are closed by
//! keywords rather than braces:
//!
//! ```text
//! RequireVersions "1.5.0", "", "", "294"
//!
//! SelectOne "Choose a texture size", \
//!     "|2K", "Recommended for most systems", "Wizard Images\\2k.jpg", \
//!     "4K", "Needs 4 GB of VRAM", ""
//!     Case "2K"
//!         SelectSubPackage "10 Textures 2K"
//!         Break
//!     Case "4K"
//!         SelectSubPackage "10 Textures 4K"
//!         Break
//! EndSelect
//!
//! If DataFileExists("SkyUI_SE.esp")
//!     SelectPlugin "MyMod - SkyUI Patch.esp"
//! EndIf
//! ```

use std::sync::Arc;

use crate::ast::*;
use crate::error::ParseError;
use crate::host::Component;
use crate::lexer::{tokenize, Located, Token};
use crate::requirements::RequirementSpec;
use crate::version::Version;

const IF_TERMINATORS: &[&str] = &["ElseIf", "Elif", "Else", "EndIf"];
const ELSE_TERMINATORS: &[&str] = &["EndIf"];
const CASE_TERMINATORS: &[&str] = &["Case", "Default", "Break", "EndSelect"];

/// Deepest block or expression nesting accepted before parsing gives up.
pub const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Located>,
    pos: usize,
    depth: usize,
    requirements: Vec<RequirementSpec>,
}

impl Parser {
    fn new(tokens: Vec<Located>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            requirements: Vec::new(),
        }
    }

    fn position(&self) -> (usize, usize) {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or((1, 1), |t| (t.line, t.column))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let (line, column) = self.position();
        ParseError::new(line, column, message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn peek_keyword(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|t| t.token.clone());
        self.pos += 1;
        t
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if t == expected => {
                self.advance();
                Ok(())
            }
            Some(t) => Err(self.error(format!("Expected {}, got {}", what, describe(t)))),
            None => Err(self.error(format!("Expected {}, got end of input", what))),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.peek_keyword() == Some(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}'", keyword)))
        }
    }

    fn end_statement(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(Token::Newline) => {
                self.advance();
                Ok(())
            }
            Some(t) => Err(self.error(format!("Expected end of line, got {}", describe(t)))),
        }
    }

    /// Counts one level of nesting; fails once it exceeds [`MAX_NESTING`].
    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(format!(
                "Nesting is too deep (more than {} levels)",
                MAX_NESTING
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Token::Newline) {
            self.advance();
        }
    }

    fn parse_script(&mut self, source: &str) -> Result<Script, ParseError> {
        let statements = self.parse_statements(&[])?;
        if self.pos < self.tokens.len() {
            return Err(self.error("Unexpected token after end of script"));
        }
        Ok(Script {
            source: Arc::from(source),
            statements: statements.into(),
            requirements: std::mem::take(&mut self.requirements),
        })
    }

    /// Parses statements until end of input or a keyword in `terminators`,
    /// which is left unconsumed for the caller.
    fn parse_statements(&mut self, terminators: &[&str]) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek_keyword() {
                None if self.peek().is_none() => break,
                Some(word) if terminators.contains(&word) => break,
                _ => {}
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let (line, _) = self.position();
        let keyword = match self.peek() {
            Some(Token::Ident(name)) => name.clone(),
            Some(other) => {
                let message = format!("Unexpected {} at start of statement", describe(other));
                return Err(self.error(message));
            }
            None => return Err(self.error("Unexpected end of input")),
        };

        let kind = match keyword.as_str() {
            "If" => self.parse_if()?,
            "SelectOne" | "SelectMany" | "SelectAtLeastOne" => self.parse_select()?,
            "RequireVersions" => self.parse_require_versions()?,
            "Cancel" => {
                self.advance();
                let reason = if matches!(self.peek(), Some(Token::Newline) | None) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.end_statement()?;
                StatementKind::Cancel(reason)
            }
            "Return" => {
                self.advance();
                self.end_statement()?;
                StatementKind::Return
            }
            "ElseIf" | "Elif" | "Else" | "EndIf" => {
                return Err(self.error(format!("'{}' without matching 'If'", keyword)))
            }
            "Case" | "Default" | "Break" | "EndSelect" => {
                return Err(self.error(format!("'{}' outside of a Select block", keyword)))
            }
            _ => {
                if let Some(directive) = self.parse_directive(&keyword)? {
                    StatementKind::Directive(directive)
                } else if matches!(
                    self.peek_at(1),
                    Some(Token::Assign | Token::PlusAssign | Token::MinusAssign)
                ) {
                    self.parse_assignment()?
                } else {
                    return Err(self.error(format!("Unknown statement: {}", keyword)));
                }
            }
        };

        Ok(Statement { kind, line })
    }

    fn parse_assignment(&mut self) -> Result<StatementKind, ParseError> {
        let variable = match self.advance() {
            Some(Token::Ident(name)) => name,
            _ => return Err(self.error("Expected variable name")),
        };
        if is_reserved(&variable) {
            return Err(self.error(format!("Cannot assign to reserved word '{}'", variable)));
        }
        let op = match self.advance() {
            Some(Token::Assign) => AssignOp::Set,
            Some(Token::PlusAssign) => AssignOp::Add,
            Some(Token::MinusAssign) => AssignOp::Sub,
            _ => return Err(self.error("Expected '=', '+=' or '-='")),
        };
        let value = self.parse_expression()?;
        self.end_statement()?;
        Ok(StatementKind::Assign { variable, op, value })
    }

    fn parse_if(&mut self) -> Result<StatementKind, ParseError> {
        let (if_line, if_column) = self.position();
        let unclosed = || ParseError::new(if_line, if_column, "Unclosed 'If', expected 'EndIf'");
        self.enter()?;
        self.expect_keyword("If")?;
        let condition = self.parse_expression()?;
        self.end_statement()?;
        let body = self.parse_statements(IF_TERMINATORS)?;

        let mut branches = vec![Branch {
            condition,
            body: body.into(),
        }];
        let mut else_block = None;

        loop {
            match self.peek_keyword() {
                Some("ElseIf") | Some("Elif") => {
                    self.advance();
                    let condition = self.parse_expression()?;
                    self.end_statement()?;
                    let body = self.parse_statements(IF_TERMINATORS)?;
                    branches.push(Branch {
                        condition,
                        body: body.into(),
                    });
                }
                Some("Else") => {
                    self.advance();
                    self.end_statement()?;
                    else_block = Some(self.parse_statements(ELSE_TERMINATORS)?.into());
                    if self.peek_keyword() != Some("EndIf") {
                        return Err(unclosed());
                    }
                }
                Some("EndIf") => {
                    self.advance();
                    self.end_statement()?;
                    break;
                }
                _ => return Err(unclosed()),
            }
        }

        self.leave();
        Ok(StatementKind::If { branches, else_block })
    }

    fn parse_select(&mut self) -> Result<StatementKind, ParseError> {
        let (select_line, select_column) = self.position();
        let at_select = |message: &str| ParseError::new(select_line, select_column, message);
        self.enter()?;
        let mode = match self.advance() {
            Some(Token::Ident(word)) => match word.as_str() {
                "SelectOne" => SelectionMode::ExactlyOne,
                "SelectAtLeastOne" => SelectionMode::AtLeastOne,
                _ => SelectionMode::Any,
            },
            _ => return Err(self.error("Expected Select statement")),
        };
        let description = self.parse_string_expression("select description")?;

        let mut items = Vec::new();
        while self.peek() == Some(&Token::Comma) {
            self.advance();
            let (line, column) = self.position();
            items.push((self.parse_string_expression("option text")?, line, column));
        }
        if items.len() % 3 != 0 {
            return Err(self.error(
                "Options must be given as (name, description, image) triples",
            ));
        }
        self.end_statement()?;

        let mut options: Vec<OptionDecl> = Vec::new();
        for triple in items.chunks(3) {
            let (label_expr, line, column) = &triple[0];
            let raw = match label_expr {
                Expression::String(s) => s.clone(),
                _ => {
                    let message = "Option names cannot contain %variables%";
                    return Err(ParseError::new(*line, *column, message));
                }
            };
            let (label, is_default) = match raw.strip_prefix('|') {
                Some(rest) => (rest.to_string(), true),
                None => (raw, false),
            };
            if options.iter().any(|o| o.label == label) {
                let message = format!("Duplicate option '{}'", label);
                return Err(ParseError::new(*line, *column, message));
            }
            let image = match &triple[2].0 {
                Expression::String(s) if s.is_empty() => None,
                Expression::String(s) => Some(s.clone()),
                _ => {
                    let message = "Image paths cannot contain %variables%";
                    return Err(ParseError::new(triple[2].1, triple[2].2, message));
                }
            };
            options.push(OptionDecl {
                label,
                description: triple[1].0.clone(),
                image,
                is_default,
                body: None,
            });
        }

        if mode != SelectionMode::Any && options.is_empty() {
            return Err(at_select("Select statement requires at least one option"));
        }
        let defaults = options.iter().filter(|o| o.is_default).count();
        if mode == SelectionMode::ExactlyOne && defaults > 1 {
            return Err(at_select("SelectOne allows at most one default option"));
        }

        let mut default_block = None;
        loop {
            self.skip_newlines();
            match self.peek_keyword() {
                Some("Case") => {
                    self.advance();
                    let (line, column) = self.position();
                    let at_case = |message: String| ParseError::new(line, column, message);
                    let label = match self.advance() {
                        Some(Token::String(s)) => s,
                        _ => return Err(at_case("Expected option name after 'Case'".into())),
                    };
                    self.end_statement()?;
                    let index = options
                        .iter()
                        .position(|o| o.label == label)
                        .ok_or_else(|| {
                            at_case(format!("Case '{}' does not match any option", label))
                        })?;
                    if options[index].body.is_some() {
                        return Err(at_case(format!("Duplicate Case '{}'", label)));
                    }
                    let body = self.parse_case_body()?;
                    options[index].body = Some(body);
                }
                Some("Default") => {
                    if default_block.is_some() {
                        return Err(self.error("Duplicate 'Default' block"));
                    }
                    self.advance();
                    self.end_statement()?;
                    default_block = Some(self.parse_case_body()?);
                }
                Some("EndSelect") => {
                    self.advance();
                    self.end_statement()?;
                    break;
                }
                None if self.peek().is_none() => {
                    return Err(at_select("Unclosed Select, expected 'EndSelect'"));
                }
                _ => return Err(self.error("Expected 'Case', 'Default' or 'EndSelect'")),
            }
        }

        self.leave();
        Ok(StatementKind::Select(Arc::new(Select {
            mode,
            description,
            options,
            default_block,
        })))
    }

    fn parse_case_body(&mut self) -> Result<Block, ParseError> {
        let body = self.parse_statements(CASE_TERMINATORS)?;
        if self.peek_keyword() == Some("Break") {
            self.advance();
            self.end_statement()?;
        }
        Ok(body.into())
    }

    fn parse_require_versions(&mut self) -> Result<StatementKind, ParseError> {
        self.expect_keyword("RequireVersions")?;
        let mut specs = Vec::new();

        if matches!(self.peek(), Some(Token::Ident(_))) {
            // Named form: Game >= "1.5.0", SE >= "0.2"
            loop {
                let component = match self.peek() {
                    Some(Token::Ident(word)) => Component::from_keyword(word),
                    _ => None,
                };
                let Some(component) = component else {
                    return Err(
                        self.error("Expected Game, ScriptExtender, GraphicsExtender or WryeBash")
                    );
                };
                self.advance();
                self.expect(&Token::GreaterEquals, "'>='")?;
                let minimum = self.parse_version_literal()?;
                specs.push(RequirementSpec { component, minimum });
                if self.peek() != Some(&Token::Comma) {
                    break;
                }
                self.advance();
            }
        } else {
            // Positional form: "game", "script extender", "graphics extender", "wrye bash"
            for (i, component) in Component::ALL.iter().enumerate() {
                if i > 0 {
                    if self.peek() != Some(&Token::Comma) {
                        break;
                    }
                    self.advance();
                }
                let minimum = self.parse_version_literal()?;
                if !minimum.is_empty() {
                    specs.push(RequirementSpec {
                        component: *component,
                        minimum,
                    });
                }
            }
        }
        self.end_statement()?;

        self.requirements.extend(specs.iter().cloned());
        Ok(StatementKind::RequireVersions(specs))
    }

    /// A quoted version, or an empty string meaning "no requirement".
    fn parse_version_literal(&mut self) -> Result<String, ParseError> {
        let (line, column) = self.position();
        match self.advance() {
            Some(Token::String(s)) => {
                let s = s.trim().to_string();
                if s.is_empty() || Version::parse(&s).is_some() {
                    Ok(s)
                } else {
                    Err(ParseError::new(line, column, format!("Invalid version: '{}'", s)))
                }
            }
            _ => Err(ParseError::new(line, column, "Expected a quoted version")),
        }
    }

    fn parse_directive(&mut self, keyword: &str) -> Result<Option<Directive>, ParseError> {
        let arity = match keyword {
            "SelectAll" | "DeSelectAll" => 0,
            "SelectSubPackage" | "DeSelectSubPackage" | "SelectPlugin" | "SelectEspm"
            | "DeSelectPlugin" | "DeSelectEspm" | "Note" => 1,
            "RenameEspm" | "RenamePlugin" => 2,
            "EditINI" => 4,
            _ => return Ok(None),
        };
        self.advance();

        let mut args = Vec::with_capacity(arity);
        for i in 0..arity {
            if i > 0 {
                self.expect(&Token::Comma, "','")?;
            }
            args.push(self.parse_expression()?);
        }
        self.end_statement()?;

        let mut args = args.into_iter();
        let mut next = || args.next().unwrap_or(Expression::String(String::new()));
        let directive = match keyword {
            "SelectAll" => Directive::SelectAll,
            "DeSelectAll" => Directive::DeSelectAll,
            "SelectSubPackage" => Directive::SelectSubPackage(next()),
            "DeSelectSubPackage" => Directive::DeSelectSubPackage(next()),
            "SelectPlugin" | "SelectEspm" => Directive::SelectPlugin(next()),
            "DeSelectPlugin" | "DeSelectEspm" => Directive::DeSelectPlugin(next()),
            "Note" => Directive::Note(next()),
            "RenameEspm" | "RenamePlugin" => Directive::RenamePlugin {
                from: next(),
                to: next(),
            },
            _ => Directive::EditIni {
                file: next(),
                section: next(),
                key: next(),
                value: next(),
            },
        };
        Ok(Some(directive))
    }

    fn parse_string_expression(&mut self, what: &str) -> Result<Expression, ParseError> {
        let expr = match self.peek() {
            Some(Token::String(s)) => Expression::String(s.clone()),
            Some(Token::InterpolatedString(segments)) => Expression::Interpolated(segments.clone()),
            _ => return Err(self.error(format!("Expected a quoted {}", what))),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_or()
    }

    // Each chained operator deepens the left-nested tree, so it counts as a level.
    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Pipe)) || self.peek_keyword() == Some("or") {
            self.advance();
            self.enter()?;
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Some(Token::Amp)) || self.peek_keyword() == Some("and") {
            self.advance();
            self.enter()?;
            let right = self.parse_not()?;
            left = binary(BinOp::And, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        if matches!(self.peek(), Some(Token::Bang)) || self.peek_keyword() == Some("not") {
            self.advance();
            self.enter()?;
            let operand = self.parse_not()?;
            self.leave();
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_additive()?;
        let Some(op) = self.peek().and_then(comparison_op) else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;
        if self.peek().and_then(comparison_op).is_some() {
            return Err(self.error("Comparisons cannot be chained; combine them with 'and'"));
        }
        Ok(binary(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            self.enter()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            self.enter()?;
            let operand = self.parse_unary()?;
            self.leave();
            return Ok(Expression::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let (line, column) = self.position();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expression::Int(n)),
            Some(Token::String(s)) => Ok(Expression::String(s)),
            Some(Token::InterpolatedString(segments)) => Ok(Expression::Interpolated(segments)),
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.parse_expression()?;
                self.expect(&Token::RParen, "')'")?;
                self.leave();
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "True" => Ok(Expression::Bool(true)),
                "False" => Ok(Expression::Bool(false)),
                _ if self.peek() == Some(&Token::LParen) => self.parse_call(name, line, column),
                _ if is_reserved(&name) => Err(ParseError::new(
                    line,
                    column,
                    format!("Unexpected keyword '{}' in expression", name),
                )),
                _ => Ok(Expression::Variable(name)),
            },
            Some(other) => Err(ParseError::new(
                line,
                column,
                format!("Unexpected {} in expression", describe(&other)),
            )),
            None => Err(ParseError::new(line, column, "Unexpected end of input in expression")),
        }
    }

    fn parse_call(
        &mut self,
        name: String,
        line: usize,
        column: usize,
    ) -> Result<Expression, ParseError> {
        let function = Builtin::from_name(&name)
            .ok_or_else(|| ParseError::new(line, column, format!("Unknown function: {}", name)))?;
        self.expect(&Token::LParen, "'('")?;
        self.enter()?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            args.push(self.parse_expression()?);
            while self.peek() == Some(&Token::Comma) {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        self.expect(&Token::RParen, "')'")?;
        self.leave();

        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(ParseError::new(
                line,
                column,
                format!("{} takes {} argument(s), got {}", name, arity_text(min, max), args.len()),
            ));
        }
        Ok(Expression::Call { function, args })
    }
}

fn binary(op: BinOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn comparison_op(token: &Token) -> Option<BinOp> {
    match token {
        Token::DoubleEquals => Some(BinOp::Eq),
        Token::NotEquals => Some(BinOp::NotEq),
        Token::Less => Some(BinOp::Lt),
        Token::LessEquals => Some(BinOp::LtEq),
        Token::Greater => Some(BinOp::Gt),
        Token::GreaterEquals => Some(BinOp::GtEq),
        _ => None,
    }
}

fn arity_text(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{}-{}", min, max),
        None => format!("at least {}", min),
    }
}

fn is_reserved(word: &str) -> bool {
    matches!(
        word,
        "and" | "or" | "not" | "True" | "False" | "If" | "ElseIf" | "Elif" | "Else" | "EndIf"
            | "SelectOne" | "SelectMany" | "SelectAtLeastOne" | "Case" | "Default" | "Break"
            | "EndSelect" | "RequireVersions" | "Cancel" | "Return"
    )
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("'{}'", name),
        Token::String(_) | Token::InterpolatedString(_) => "string".to_string(),
        Token::Number(n) => format!("number {}", n),
        Token::Newline => "end of line".to_string(),
        other => format!("{:?}", other),
    }
}

/// Parses a wizard script.
///
/// Parsing is all-or-nothing: any error aborts and no partial tree is
/// returned.
pub fn parse(source: &str) -> Result<Script, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    parser.parse_script(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(source: &str) -> StatementKind {
        parse(source).unwrap().statements[0].kind.clone()
    }

    #[test]
    fn test_parse_assignment() {
        match first("Flag = True") {
            StatementKind::Assign { variable, op, value } => {
                assert_eq!(variable, "Flag");
                assert_eq!(op, AssignOp::Set);
                assert!(matches!(value, Expression::Bool(true)));
            }
            other => panic!("Expected Assign, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_compound_assignment() {
        match first("count += 2") {
            StatementKind::Assign { op, .. } => assert_eq!(op, AssignOp::Add),
            other => panic!("Expected Assign, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_if_elseif_else() {
        let kind = first(
            r#"
If CompareGameVersion("1.5") >= 0
    Note "new"
ElseIf x == 1
    Note "one"
Elif x == 2
Else
    Note "old"
EndIf
"#,
        );
        match kind {
            StatementKind::If { branches, else_block } => {
                assert_eq!(branches.len(), 3);
                assert_eq!(branches[0].body.len(), 1);
                assert!(branches[2].body.is_empty());
                assert_eq!(else_block.unwrap().len(), 1);
            }
            other => panic!("Expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_select_one_with_cases() {
        let kind = first(
            r#"
SelectOne "Pick a version", \
    "|Full", "Everything", "Wizard Images\\full.jpg", \
    "Minimal", "Core files only", ""
    Case "Full"
        SelectSubPackage "00 Core"
        SelectSubPackage "01 Extras"
        Break
    Case "Minimal"
        SelectSubPackage "00 Core"
        Break
EndSelect
"#,
        );
        let StatementKind::Select(select) = kind else {
            panic!("Expected Select");
        };
        assert_eq!(select.mode, SelectionMode::ExactlyOne);
        assert_eq!(select.options.len(), 2);
        assert_eq!(select.options[0].label, "Full");
        assert!(select.options[0].is_default);
        assert_eq!(select.options[0].image.as_deref(), Some("Wizard Images\\full.jpg"));
        assert!(select.options[1].image.is_none());
        assert_eq!(select.options[0].body.as_ref().unwrap().len(), 2);
        assert_eq!(select.options[1].body.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_select_many_with_default_block_and_fallthrough() {
        let kind = first(
            r#"
SelectMany "Extras", "A", "", "", "B", "", ""
    Case "A"
        Note "a"
    Default
        Note "none"
EndSelect
"#,
        );
        let StatementKind::Select(select) = kind else {
            panic!("Expected Select");
        };
        assert_eq!(select.mode, SelectionMode::Any);
        assert!(select.options[1].body.is_none());
        assert_eq!(select.default_block.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_nested_select_inside_case() {
        let script = parse(
            r#"
SelectOne "Outer", "A", "", "", "B", "", ""
    Case "A"
        SelectMany "Inner", "X", "", ""
            Case "X"
                Note "x"
                Break
        EndSelect
        Break
EndSelect
Note "after"
"#,
        )
        .unwrap();
        assert_eq!(script.statements.len(), 2);
    }

    #[test]
    fn test_parse_require_versions_positional() {
        let script = parse(r#"RequireVersions "1.5.0", "", "", "294""#).unwrap();
        assert_eq!(
            script.requirements,
            vec![
                RequirementSpec { component: Component::Game, minimum: "1.5.0".into() },
                RequirementSpec { component: Component::WryeBash, minimum: "294".into() },
            ]
        );
    }

    #[test]
    fn test_parse_require_versions_named() {
        let script = parse(r#"RequireVersions Game >= "1.5.0", SE >= "0.2.0.12""#).unwrap();
        assert_eq!(script.requirements.len(), 2);
        assert_eq!(script.requirements[1].component, Component::ScriptExtender);
    }

    #[test]
    fn test_parse_require_versions_rejects_bad_version() {
        let err = parse(r#"RequireVersions Game >= "latest""#).unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("Invalid version"));
    }

    #[test]
    fn test_parse_directives() {
        let script = parse(
            r#"
SelectEspm "Foo.esp"
DeSelectPlugin "Bar.esp"
RenameEspm "Old.esp", "New.esp"
EditINI "Skyrim.ini", "Display", "fGamma", "1.0"
Note "Installed %mode% textures"
SelectAll
DeSelectAll
"#,
        )
        .unwrap();
        let names: Vec<_> = script
            .statements
            .iter()
            .map(|s| match &s.kind {
                StatementKind::Directive(d) => d.name(),
                _ => "other",
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "SelectPlugin",
                "DeSelectPlugin",
                "RenameEspm",
                "EditINI",
                "Note",
                "SelectAll",
                "DeSelectAll"
            ]
        );
    }

    #[test]
    fn test_parse_precedence() {
        match first("x = not a or b and c == 1 + 2") {
            StatementKind::Assign { value, .. } => match value {
                Expression::Binary { op: BinOp::Or, left, right } => {
                    assert!(matches!(*left, Expression::Unary { op: UnaryOp::Not, .. }));
                    assert!(matches!(*right, Expression::Binary { op: BinOp::And, .. }));
                }
                other => panic!("Expected Or at the root, got {:?}", other),
            },
            other => panic!("Expected Assign, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_cancel_with_and_without_reason() {
        assert!(matches!(first("Cancel"), StatementKind::Cancel(None)));
        assert!(matches!(first(r#"Cancel "No game""#), StatementKind::Cancel(Some(_))));
        assert!(matches!(first("Return"), StatementKind::Return));
    }

    #[test]
    fn test_line_numbers_tracked() {
        let script = parse("x = 1\n\nNote \"a\"\n").unwrap();
        assert_eq!(script.statements[1].line, 3);
    }

    #[test]
    fn test_error_unclosed_if() {
        let err = parse("If True\n  Note \"x\"\n").unwrap_err();
        assert_eq!((err.line, err.column), (1, 1));
        assert!(err.message.contains("EndIf"));
    }

    #[test]
    fn test_error_unclosed_select() {
        let err = parse("SelectOne \"d\", \"A\", \"\", \"\"\n Case \"A\"\n").unwrap_err();
        assert!(err.message.contains("EndSelect"));
    }

    #[test]
    fn test_error_stray_terminators() {
        assert!(parse("EndIf").is_err());
        assert!(parse("Break").is_err());
        assert!(parse("If True\nElse\nElse\nEndIf").is_err());
    }

    #[test]
    fn test_error_unknown_case_label() {
        let err = parse("SelectOne \"d\", \"A\", \"\", \"\"\nCase \"B\"\nEndSelect").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("'B'"));
    }

    #[test]
    fn test_error_option_triples() {
        let err = parse(r#"SelectOne "d", "A", """#).unwrap_err();
        assert!(err.message.contains("triples"));
    }

    #[test]
    fn test_error_select_one_needs_options() {
        assert!(parse("SelectOne \"d\"\nEndSelect").is_err());
        assert!(parse("SelectMany \"d\"\nEndSelect").is_ok());
    }

    #[test]
    fn test_error_unknown_statement_and_function() {
        let err = parse("Frobnicate \"x\"").unwrap_err();
        assert!(err.message.contains("Unknown statement"));
        let err = parse("x = Frobnicate(1)").unwrap_err();
        assert!(err.message.contains("Unknown function"));
    }

    #[test]
    fn test_error_builtin_arity() {
        let err = parse("x = CompareGameVersion()").unwrap_err();
        assert!(err.message.contains("takes 1 argument"));
        assert!(parse(r#"x = DataFileExists("a.esp", "b.esp")"#).is_ok());
    }

    #[test]
    fn test_error_chained_comparison() {
        assert!(parse("x = 1 < 2 < 3").is_err());
    }

    #[test]
    fn test_error_trailing_tokens_on_line() {
        let err = parse("Note \"a\" \"b\"").unwrap_err();
        assert!(err.message.contains("end of line"));
    }

    #[test]
    fn test_reserved_words_cannot_be_assigned() {
        assert!(parse("not = 1").is_err());
    }

    #[test]
    fn test_host_query_functions_parse() {
        assert!(parse(r#"x = GetPluginLoadOrder("a.esp", 0)"#).is_ok());
        assert!(parse(r#"x = GetEspmStatus("a.esp") == 2"#).is_ok());
        assert!(parse(r#"x = GetFilename("a.esp") + GetFolder("textures")"#).is_ok());
        let err = parse(r#"x = GetPluginLoadOrder("a.esp", 0, 1)"#).unwrap_err();
        assert!(err.message.contains("takes 1-2 argument"));
    }

    #[test]
    fn test_deep_parentheses_are_rejected() {
        let depth = 200_000;
        let source = format!("x = {}1{}", "(".repeat(depth), ")".repeat(depth));
        let err = parse(&source).unwrap_err();
        assert!(err.message.contains("Nesting is too deep"));
        assert_eq!(err.line, 1);

        let ok = format!("x = {}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn test_deep_unary_and_long_chains_are_rejected() {
        assert!(parse(&format!("x = {}True", "not ".repeat(100_000))).is_err());
        assert!(parse(&format!("x = {}1", "-".repeat(100_000))).is_err());
        assert!(parse(&format!("x = 1{}", " + 1".repeat(100_000))).is_err());
        assert!(parse(&format!("x = True{}", " and True".repeat(100_000))).is_err());
        assert!(parse(&format!("x = 1{}", " + 1".repeat(20))).is_ok());
    }

    #[test]
    fn test_deep_blocks_are_rejected() {
        let depth = 10_000;
        let nested_ifs = |n: usize| {
            format!("{}Note \"x\"\n{}", "If True\n".repeat(n), "EndIf\n".repeat(n))
        };
        let err = parse(&nested_ifs(depth)).unwrap_err();
        assert!(err.message.contains("Nesting is too deep"));
        assert!(parse(&nested_ifs(20)).is_ok());

        let select = "SelectMany \"x\", \"A\", \"\", \"\"\nCase \"A\"\n";
        let source = format!("{}{}", select.repeat(depth), "EndSelect\n".repeat(depth));
        assert!(parse(&source).unwrap_err().message.contains("Nesting is too deep"));
    }
}
