//! Parser for guest source code
//!
//! Uses recursive descent with Pratt parsing for binary expressions.

use std::rc::Rc;

use crate::ast::*;
use crate::error::JsError;
use crate::lexer::{Lexer, LexerCheckpoint, Span, Token, TokenKind};
use crate::string_dict::StringDict;
use crate::value::JsString;

/// Deepest syntax tree the parser builds. Left-associative chains count one
/// level per operator.
const MAX_NESTING_DEPTH: usize = 128;

/// Parser for guest source code
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
    /// Whether a line terminator preceded `current`
    newline_before: bool,
    depth: usize,
}

/// Parser state saved for speculative parsing of arrow parameters
struct ParserCheckpoint {
    lexer: LexerCheckpoint,
    current: Token,
    previous: Token,
    newline_before: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, string_dict: &'a mut StringDict) -> Self {
        let mut lexer = Lexer::new(source, string_dict);
        let current = lexer.next_token();
        let newline_before = lexer.had_newline_before();
        Self {
            lexer,
            current,
            previous: Token::eof(0, 1, 1),
            newline_before,
            depth: 0,
        }
    }

    #[inline]
    fn intern(&mut self, s: &str) -> JsString {
        self.lexer.string_dict().get_or_insert(s)
    }

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program, JsError> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program { body: body.into() })
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, JsError>,
    ) -> Result<T, JsError> {
        self.descend()?;
        let result = parse(self);
        self.depth = self.depth.saturating_sub(1);
        result
    }

    fn descend(&mut self) -> Result<(), JsError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("Code is nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    // ============ STATEMENTS ============

    fn parse_statement(&mut self) -> Result<Statement, JsError> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> Result<Statement, JsError> {
        match &self.current.kind {
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let decl = self.parse_variable_declaration()?;
                self.expect_semicolon()?;
                Ok(Statement::VariableDeclaration(decl))
            }
            TokenKind::Function => Ok(Statement::FunctionDeclaration(
                self.parse_function(true)?,
            )),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => {
                let span = self.current.span;
                self.advance();
                self.expect_semicolon()?;
                Ok(Statement::Break(span))
            }
            TokenKind::Continue => {
                let span = self.current.span;
                self.advance();
                self.expect_semicolon()?;
                Ok(Statement::Continue(span))
            }
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block_statement()?)),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_variable_declaration(&mut self) -> Result<VariableDeclaration, JsError> {
        let start = self.current.span;
        let kind = match self.current.kind {
            TokenKind::Let => VariableKind::Let,
            TokenKind::Const => VariableKind::Const,
            _ => VariableKind::Var,
        };
        self.advance();

        let mut declarations = vec![];
        loop {
            let decl_start = self.current.span;
            let name = self.parse_binding_identifier()?;
            let init = if self.match_token(&TokenKind::Eq) {
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            if kind == VariableKind::Const && init.is_none() && !self.check_keyword("of") {
                return Err(self.error("Missing initializer in const declaration"));
            }
            declarations.push(VariableDeclarator {
                name,
                init,
                span: self.span_from(decl_start),
            });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(VariableDeclaration {
            kind,
            declarations,
            span: self.span_from(start),
        })
    }

    /// Parse a function declaration (`declaration == true`) or expression.
    fn parse_function(&mut self, declaration: bool) -> Result<Rc<FunctionNode>, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Function)?;

        let name = if self.check_identifier() {
            Some(self.parse_binding_identifier()?)
        } else if declaration {
            return Err(self.unexpected_token("function name"));
        } else {
            None
        };

        self.parse_function_rest(name, start)
    }

    /// Parameters and body, shared by functions and object methods.
    fn parse_function_rest(
        &mut self,
        name: Option<JsString>,
        start: Span,
    ) -> Result<Rc<FunctionNode>, JsError> {
        self.require_token(&TokenKind::LParen)?;
        let params = self.parse_parameter_list()?;
        let body = self.parse_function_body()?;

        Ok(Rc::new(FunctionNode {
            name,
            params: params.into(),
            body: FunctionBody::Block(body),
            is_arrow: false,
            span: self.span_from(start),
        }))
    }

    /// Parse parameter names up to and including the closing `)`.
    fn parse_parameter_list(&mut self) -> Result<Vec<JsString>, JsError> {
        let mut params = vec![];
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            let name = self.parse_binding_identifier()?;
            if params.contains(&name) {
                return Err(self.error(&format!("Duplicate parameter name '{}'", name)));
            }
            params.push(name);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.require_token(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_function_body(&mut self) -> Result<Rc<[Statement]>, JsError> {
        self.require_token(&TokenKind::LBrace)?;
        let mut body = vec![];
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.require_token(&TokenKind::RBrace)?;
        Ok(body.into())
    }

    fn parse_block_statement(&mut self) -> Result<BlockStatement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let mut body = vec![];
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.require_token(&TokenKind::RBrace)?;
        Ok(BlockStatement {
            body: body.into(),
            span: self.span_from(start),
        })
    }

    fn parse_if_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::If)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        let consequent = self.parse_statement()?;
        let alternate = if self.match_token(&TokenKind::Else) {
            Some(self.parse_statement()?)
        } else {
            None
        };
        Ok(Statement::If(Box::new(IfStatement {
            test,
            consequent,
            alternate,
            span: self.span_from(start),
        })))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        let body = self.parse_statement()?;
        Ok(Statement::While(Box::new(WhileStatement {
            test,
            body,
            span: self.span_from(start),
        })))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Do)?;
        let body = self.parse_statement()?;
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        // The semicolon after do-while is always optional
        self.match_token(&TokenKind::Semicolon);
        Ok(Statement::DoWhile(Box::new(DoWhileStatement {
            body,
            test,
            span: self.span_from(start),
        })))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::For)?;
        self.require_token(&TokenKind::LParen)?;

        // for (<decl> x of ...) / for (x of ...)
        let of_binding = match self.current.kind.clone() {
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let checkpoint = self.checkpoint();
                let kind = match self.current.kind {
                    TokenKind::Let => VariableKind::Let,
                    TokenKind::Const => VariableKind::Const,
                    _ => VariableKind::Var,
                };
                self.advance();
                match self.current.kind.clone() {
                    TokenKind::Identifier(name) if self.peek_is_keyword("of") => {
                        self.advance();
                        Some((Some(kind), name))
                    }
                    _ => {
                        self.restore(checkpoint);
                        None
                    }
                }
            }
            TokenKind::Identifier(name) if self.peek_is_keyword("of") => {
                self.advance();
                Some((None, name))
            }
            _ => None,
        };

        if let Some((kind, binding)) = of_binding {
            // current is `of`
            self.advance();
            let iterable = self.parse_assignment_expression()?;
            self.require_token(&TokenKind::RParen)?;
            let body = self.parse_statement()?;
            return Ok(Statement::ForOf(Box::new(ForOfStatement {
                kind,
                binding,
                iterable,
                body,
                span: self.span_from(start),
            })));
        }

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if matches!(
            self.current.kind,
            TokenKind::Let | TokenKind::Const | TokenKind::Var
        ) {
            Some(ForInit::Variable(self.parse_variable_declaration()?))
        } else {
            Some(ForInit::Expression(self.parse_expression()?))
        };
        self.require_token(&TokenKind::Semicolon)?;

        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::RParen)?;

        let body = self.parse_statement()?;
        Ok(Statement::For(Box::new(ForStatement {
            init,
            test,
            update,
            body,
            span: self.span_from(start),
        })))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Return)?;

        let argument = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
            || self.newline_before
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon()?;

        Ok(Statement::Return(ReturnStatement {
            argument,
            span: self.span_from(start),
        }))
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Throw)?;
        if self.newline_before {
            return Err(self.error("Illegal newline after throw"));
        }
        let argument = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(Statement::Throw(ThrowStatement {
            argument,
            span: self.span_from(start),
        }))
    }

    fn parse_try_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Try)?;
        let block = self.parse_block_statement()?;

        let handler = if self.match_token(&TokenKind::Catch) {
            let param = if self.match_token(&TokenKind::LParen) {
                let name = self.parse_binding_identifier()?;
                self.require_token(&TokenKind::RParen)?;
                Some(name)
            } else {
                None
            };
            let body = self.parse_block_statement()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }

        Ok(Statement::Try(Box::new(TryStatement {
            block,
            handler,
            finalizer,
            span: self.span_from(start),
        })))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        let expression = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(Statement::Expression(ExpressionStatement {
            expression,
            span: self.span_from(start),
        }))
    }

    // ============ EXPRESSIONS ============

    pub fn parse_expression(&mut self) -> Result<Expression, JsError> {
        let expr = self.parse_assignment_expression()?;

        if self.check(&TokenKind::Comma) {
            let mut expressions = vec![expr];
            while self.match_token(&TokenKind::Comma) {
                expressions.push(self.parse_assignment_expression()?);
            }
            return Ok(Expression::Sequence(expressions));
        }

        Ok(expr)
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression, JsError> {
        self.nested(Self::parse_assignment_or_arrow)
    }

    fn parse_assignment_or_arrow(&mut self) -> Result<Expression, JsError> {
        if let Some(arrow) = self.try_parse_arrow_function()? {
            return Ok(arrow);
        }

        let start = self.current.span;
        let expr = self.parse_conditional_expression()?;

        if let Some(op) = self.current_assignment_op() {
            self.advance();
            let right = self.parse_assignment_expression()?;
            let left = self.expression_to_assignment_target(expr)?;
            let span = self.span_from(start);
            return Ok(Expression::Assignment(Box::new(AssignmentExpression {
                operator: op,
                left,
                right,
                span,
            })));
        }

        Ok(expr)
    }

    /// Recognise `x => ...` and `(a, b) => ...`, restoring the parser
    /// if what follows the parenthesis turns out not to be an arrow.
    fn try_parse_arrow_function(&mut self) -> Result<Option<Expression>, JsError> {
        let start = self.current.span;

        if let TokenKind::Identifier(param) = self.current.kind.clone() {
            if !self.peek_is(&TokenKind::Arrow) {
                return Ok(None);
            }
            self.advance();
            return self.parse_arrow_body(vec![param], start).map(Some);
        }

        if !self.check(&TokenKind::LParen) {
            return Ok(None);
        }

        let checkpoint = self.checkpoint();
        self.advance();
        let params = match self.parse_parameter_list() {
            Ok(params) if self.check(&TokenKind::Arrow) && !self.newline_before => params,
            _ => {
                self.restore(checkpoint);
                return Ok(None);
            }
        };
        self.parse_arrow_body(params, start).map(Some)
    }

    fn parse_arrow_body(
        &mut self,
        params: Vec<JsString>,
        start: Span,
    ) -> Result<Expression, JsError> {
        self.require_token(&TokenKind::Arrow)?;

        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.parse_function_body()?)
        } else {
            FunctionBody::Expression(Rc::new(self.parse_assignment_expression()?))
        };

        Ok(Expression::Function(Rc::new(FunctionNode {
            name: None,
            params: params.into(),
            body,
            is_arrow: true,
            span: self.span_from(start),
        })))
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let test = self.parse_binary_expression(0)?;

        if self.match_token(&TokenKind::Question) {
            let consequent = self.parse_assignment_expression()?;
            self.require_token(&TokenKind::Colon)?;
            let alternate = self.parse_assignment_expression()?;
            let span = self.span_from(start);
            return Ok(Expression::Conditional(Box::new(ConditionalExpression {
                test,
                consequent,
                alternate,
                span,
            })));
        }

        Ok(test)
    }

    /// Pratt parser for binary and logical expressions
    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expression, JsError> {
        let start = self.current.span;
        let base = self.depth;
        let mut left = self.parse_unary_expression()?;

        while let Some((op, prec)) = self.current_binary_op() {
            if prec < min_prec {
                break;
            }
            self.descend()?;
            self.advance();

            // ** is right associative
            let next_prec = if op == BinOrLogical::Binary(BinaryOp::Exp) {
                prec
            } else {
                prec + 1
            };
            let right = self.parse_binary_expression(next_prec)?;
            let span = self.span_from(start);

            left = match op {
                BinOrLogical::Binary(operator) => Expression::Binary(Box::new(BinaryExpression {
                    operator,
                    left,
                    right,
                    span,
                })),
                BinOrLogical::Logical(operator) => {
                    Expression::Logical(Box::new(LogicalExpression {
                        operator,
                        left,
                        right,
                        span,
                    }))
                }
            };
        }

        self.depth = base;
        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;

        if let Some(operator) = self.current_unary_op() {
            self.advance();
            let argument = self.nested(Self::parse_unary_expression)?;
            if operator == UnaryOp::Delete && matches!(argument, Expression::Identifier(_)) {
                return Err(self.error("Delete of an unqualified identifier"));
            }
            let span = self.span_from(start);
            return Ok(Expression::Unary(Box::new(UnaryExpression {
                operator,
                argument,
                span,
            })));
        }

        let prefix_op = match self.current.kind {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(operator) = prefix_op {
            self.advance();
            let target = self.nested(Self::parse_unary_expression)?;
            let argument = self.expression_to_assignment_target(target)?;
            let span = self.span_from(start);
            return Ok(Expression::Update(Box::new(UpdateExpression {
                operator,
                prefix: true,
                argument,
                span,
            })));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let expr = self.parse_left_hand_side_expression()?;

        if self.newline_before {
            return Ok(expr);
        }

        let operator = match self.current.kind {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        self.advance();
        let argument = self.expression_to_assignment_target(expr)?;
        let span = self.span_from(start);
        Ok(Expression::Update(Box::new(UpdateExpression {
            operator,
            prefix: false,
            argument,
            span,
        })))
    }

    /// Member accesses and calls, including `new`.
    fn parse_left_hand_side_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let base = self.depth;
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };

        loop {
            if self.check(&TokenKind::Dot) || self.check(&TokenKind::LBracket) {
                self.descend()?;
                expr = self.parse_member_suffix(expr, start)?;
            } else if self.check(&TokenKind::LParen) {
                self.descend()?;
                self.advance();
                let arguments = self.parse_arguments()?;
                expr = Expression::Call(Box::new(CallExpression {
                    callee: expr,
                    arguments,
                    span: self.span_from(start),
                }));
            } else {
                break;
            }
        }

        self.depth = base;
        Ok(expr)
    }

    fn parse_new_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::New)?;

        let base = self.depth;
        let mut callee = if self.check(&TokenKind::New) {
            self.nested(Self::parse_new_expression)?
        } else {
            self.parse_primary_expression()?
        };
        while self.check(&TokenKind::Dot) || self.check(&TokenKind::LBracket) {
            self.descend()?;
            callee = self.parse_member_suffix(callee, start)?;
        }
        self.depth = base;

        let arguments = if self.match_token(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            vec![]
        };

        Ok(Expression::New(Box::new(NewExpression {
            callee,
            arguments,
            span: self.span_from(start),
        })))
    }

    fn parse_member_suffix(&mut self, object: Expression, start: Span) -> Result<Expression, JsError> {
        let property = if self.match_token(&TokenKind::Dot) {
            let name = self.parse_property_name_token()?;
            MemberProperty::Identifier(name)
        } else {
            self.require_token(&TokenKind::LBracket)?;
            let expr = self.parse_expression()?;
            self.require_token(&TokenKind::RBracket)?;
            MemberProperty::Computed(expr)
        };

        Ok(Expression::Member(Box::new(MemberExpression {
            object,
            property,
            span: self.span_from(start),
        })))
    }

    /// Parse call arguments after the opening `(`.
    fn parse_arguments(&mut self) -> Result<Vec<Expression>, JsError> {
        let mut arguments = vec![];
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            arguments.push(self.parse_assignment_expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.require_token(&TokenKind::RParen)?;
        Ok(arguments)
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let expr = match self.current.kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Expression::Number(n)
            }
            TokenKind::String(s) => {
                self.advance();
                Expression::String(s)
            }
            TokenKind::True => {
                self.advance();
                Expression::Boolean(true)
            }
            TokenKind::False => {
                self.advance();
                Expression::Boolean(false)
            }
            TokenKind::Null => {
                self.advance();
                Expression::Null
            }
            TokenKind::This => {
                self.advance();
                Expression::This(start)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Expression::Identifier(Identifier { name, span: start })
            }
            TokenKind::Function => Expression::Function(self.parse_function(false)?),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.require_token(&TokenKind::RParen)?;
                expr
            }
            TokenKind::LBracket => self.parse_array_literal()?,
            TokenKind::LBrace => self.parse_object_literal()?,
            TokenKind::Invalid(c) => {
                return Err(self.error(&format!("Invalid or unexpected token '{}'", c)));
            }
            _ => return Err(self.unexpected_token("expression")),
        };
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBracket)?;
        let mut elements = vec![];
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            elements.push(self.parse_assignment_expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.require_token(&TokenKind::RBracket)?;
        Ok(Expression::Array(ArrayExpression {
            elements,
            span: self.span_from(start),
        }))
    }

    fn parse_object_literal(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let mut properties = vec![];

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let key_start = self.current.span;
            let shorthand_name = match &self.current.kind {
                TokenKind::Identifier(name) => Some(name.clone()),
                _ => None,
            };

            let key = if self.match_token(&TokenKind::LBracket) {
                let expr = self.parse_assignment_expression()?;
                self.require_token(&TokenKind::RBracket)?;
                PropertyName::Computed(expr)
            } else {
                PropertyName::Static(self.parse_property_name_token()?)
            };

            let value = if self.match_token(&TokenKind::Colon) {
                self.parse_assignment_expression()?
            } else if self.check(&TokenKind::LParen) {
                let name = match &key {
                    PropertyName::Static(name) => Some(name.clone()),
                    PropertyName::Computed(_) => None,
                };
                Expression::Function(self.parse_function_rest(name, key_start)?)
            } else if let Some(name) = shorthand_name {
                Expression::Identifier(Identifier {
                    name,
                    span: key_start,
                })
            } else {
                return Err(self.unexpected_token("':'"));
            };

            properties.push(ObjectProperty { key, value });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RBrace)?;
        Ok(Expression::Object(ObjectExpression {
            properties,
            span: self.span_from(start),
        }))
    }

    /// A property name after `.` or as an object literal key. Keywords are
    /// allowed here.
    fn parse_property_name_token(&mut self) -> Result<JsString, JsError> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) | TokenKind::String(name) => name.clone(),
            TokenKind::Number(n) => {
                let text = crate::value::number_to_string(*n);
                self.intern(&text)
            }
            kind => match keyword_text(kind) {
                Some(text) => self.intern(text),
                None => return Err(self.unexpected_token("property name")),
            },
        };
        self.advance();
        Ok(name)
    }

    fn parse_binding_identifier(&mut self) -> Result<JsString, JsError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected_token("identifier")),
        }
    }

    fn expression_to_assignment_target(
        &self,
        expr: Expression,
    ) -> Result<AssignmentTarget, JsError> {
        match expr {
            Expression::Identifier(id) => Ok(AssignmentTarget::Identifier(id)),
            Expression::Member(member) => Ok(AssignmentTarget::Member(*member)),
            _ => Err(self.error("Invalid left-hand side in assignment")),
        }
    }

    // ============ HELPERS ============

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
        self.newline_before = self.lexer.had_newline_before();
    }

    fn checkpoint(&self) -> ParserCheckpoint {
        ParserCheckpoint {
            lexer: self.lexer.checkpoint(),
            current: self.current.clone(),
            previous: self.previous.clone(),
            newline_before: self.newline_before,
            depth: self.depth,
        }
    }

    fn restore(&mut self, checkpoint: ParserCheckpoint) {
        self.lexer.restore(checkpoint.lexer);
        self.current = checkpoint.current;
        self.previous = checkpoint.previous;
        self.newline_before = checkpoint.newline_before;
        self.depth = checkpoint.depth;
    }

    fn require_token(&mut self, kind: &TokenKind) -> Result<(), JsError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(&format!("{:?}", kind)))
        }
    }

    fn expect_semicolon(&mut self) -> Result<(), JsError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(());
        }

        // ASI: accept if at end, before }, or after newline
        if self.is_at_end() || self.check(&TokenKind::RBrace) || self.newline_before {
            return Ok(());
        }

        Err(self.unexpected_token("';'"))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    /// Check if the next token (after current) is of the given kind
    fn peek_is(&mut self, kind: &TokenKind) -> bool {
        let checkpoint = self.lexer.checkpoint();
        let next = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        std::mem::discriminant(&next.kind) == std::mem::discriminant(kind)
    }

    fn peek_is_keyword(&mut self, keyword: &str) -> bool {
        let checkpoint = self.lexer.checkpoint();
        let next = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        matches!(&next.kind, TokenKind::Identifier(s) if s == keyword)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.current.kind, TokenKind::Identifier(_))
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(s) if s == keyword)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(
            start.start,
            self.previous.span.end,
            start.line,
            start.column,
        )
    }

    fn error(&self, message: &str) -> JsError {
        JsError::syntax_error(message, self.current.span.line, self.current.span.column)
    }

    fn unexpected_token(&self, expected: &str) -> JsError {
        let found = match &self.current.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Identifier(name) => format!("identifier '{}'", name),
            TokenKind::String(_) => "string".to_string(),
            TokenKind::Number(_) => "number".to_string(),
            kind => format!("token {:?}", kind),
        };
        JsError::syntax_error(
            format!("Unexpected {}, expected {}", found, expected),
            self.current.span.line,
            self.current.span.column,
        )
    }

    fn current_binary_op(&self) -> Option<(BinOrLogical, u8)> {
        use BinOrLogical::{Binary, Logical};
        let op = match &self.current.kind {
            TokenKind::QuestionQuestion => (Logical(LogicalOp::NullishCoalescing), 1),
            TokenKind::PipePipe => (Logical(LogicalOp::Or), 2),
            TokenKind::AmpAmp => (Logical(LogicalOp::And), 3),
            TokenKind::Pipe => (Binary(BinaryOp::BitOr), 4),
            TokenKind::Caret => (Binary(BinaryOp::BitXor), 5),
            TokenKind::Amp => (Binary(BinaryOp::BitAnd), 6),
            TokenKind::EqEq => (Binary(BinaryOp::Eq), 7),
            TokenKind::BangEq => (Binary(BinaryOp::NotEq), 7),
            TokenKind::EqEqEq => (Binary(BinaryOp::StrictEq), 7),
            TokenKind::BangEqEq => (Binary(BinaryOp::StrictNotEq), 7),
            TokenKind::Lt => (Binary(BinaryOp::Lt), 8),
            TokenKind::LtEq => (Binary(BinaryOp::LtEq), 8),
            TokenKind::Gt => (Binary(BinaryOp::Gt), 8),
            TokenKind::GtEq => (Binary(BinaryOp::GtEq), 8),
            TokenKind::In => (Binary(BinaryOp::In), 8),
            TokenKind::Instanceof => (Binary(BinaryOp::Instanceof), 8),
            TokenKind::LtLt => (Binary(BinaryOp::LShift), 9),
            TokenKind::GtGt => (Binary(BinaryOp::RShift), 9),
            TokenKind::GtGtGt => (Binary(BinaryOp::URShift), 9),
            TokenKind::Plus => (Binary(BinaryOp::Add), 10),
            TokenKind::Minus => (Binary(BinaryOp::Sub), 10),
            TokenKind::Star => (Binary(BinaryOp::Mul), 11),
            TokenKind::Slash => (Binary(BinaryOp::Div), 11),
            TokenKind::Percent => (Binary(BinaryOp::Mod), 11),
            TokenKind::StarStar => (Binary(BinaryOp::Exp), 12),
            _ => return None,
        };
        Some(op)
    }

    fn current_unary_op(&self) -> Option<UnaryOp> {
        match self.current.kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        }
    }

    fn current_assignment_op(&self) -> Option<AssignmentOp> {
        match self.current.kind {
            TokenKind::Eq => Some(AssignmentOp::Assign),
            TokenKind::PlusEq => Some(AssignmentOp::AddAssign),
            TokenKind::MinusEq => Some(AssignmentOp::SubAssign),
            TokenKind::StarEq => Some(AssignmentOp::MulAssign),
            TokenKind::SlashEq => Some(AssignmentOp::DivAssign),
            TokenKind::PercentEq => Some(AssignmentOp::ModAssign),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Source text of keyword tokens that may still appear as property names.
fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    let text = match kind {
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Null => "null",
        TokenKind::Let => "let",
        TokenKind::Const => "const",
        TokenKind::Var => "var",
        TokenKind::Function => "function",
        TokenKind::Return => "return",
        TokenKind::If => "if",
        TokenKind::Else => "else",
        TokenKind::For => "for",
        TokenKind::While => "while",
        TokenKind::Do => "do",
        TokenKind::Break => "break",
        TokenKind::Continue => "continue",
        TokenKind::Try => "try",
        TokenKind::Catch => "catch",
        TokenKind::Finally => "finally",
        TokenKind::Throw => "throw",
        TokenKind::New => "new",
        TokenKind::This => "this",
        TokenKind::Typeof => "typeof",
        TokenKind::Instanceof => "instanceof",
        TokenKind::In => "in",
        TokenKind::Void => "void",
        TokenKind::Delete => "delete",
        _ => return None,
    };
    Some(text)
}
