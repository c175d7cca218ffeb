//! Abstract Syntax Tree types for the guest language
//!
//! Every node that the bridge may need to show in a traceback (function
//! literals, calls, member accesses and assignments) carries the [`Span`] of
//! its full source text.

use std::rc::Rc;

use crate::lexer::Span;
use crate::value::JsString;

/// A parsed unit of source
#[derive(Debug)]
pub struct Program {
    pub body: Rc<[Statement]>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statements
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum Statement {
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(Rc<FunctionNode>),
    Expression(ExpressionStatement),
    Block(BlockStatement),
    If(Box<IfStatement>),
    While(Box<WhileStatement>),
    DoWhile(Box<DoWhileStatement>),
    For(Box<ForStatement>),
    ForOf(Box<ForOfStatement>),
    Return(ReturnStatement),
    Break(Span),
    Continue(Span),
    Throw(ThrowStatement),
    Try(Box<TryStatement>),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

#[derive(Debug)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    pub span: Span,
}

#[derive(Debug)]
pub struct VariableDeclarator {
    pub name: JsString,
    pub init: Option<Expression>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub span: Span,
}

#[derive(Debug)]
pub struct BlockStatement {
    pub body: Rc<[Statement]>,
    pub span: Span,
}

#[derive(Debug)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Statement,
    pub alternate: Option<Statement>,
    pub span: Span,
}

#[derive(Debug)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Statement,
    pub span: Span,
}

#[derive(Debug)]
pub struct DoWhileStatement {
    pub body: Statement,
    pub test: Expression,
    pub span: Span,
}

#[derive(Debug)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Expression),
}

#[derive(Debug)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Statement,
    pub span: Span,
}

/// `for (<kind> <binding> of <iterable>)`. `kind` is `None` for a bare
/// identifier target.
#[derive(Debug)]
pub struct ForOfStatement {
    pub kind: Option<VariableKind>,
    pub binding: JsString,
    pub iterable: Expression,
    pub body: Statement,
    pub span: Span,
}

#[derive(Debug)]
pub struct ReturnStatement {
    pub argument: Option<Expression>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ThrowStatement {
    pub argument: Expression,
    pub span: Span,
}

#[derive(Debug)]
pub struct TryStatement {
    pub block: BlockStatement,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<BlockStatement>,
    pub span: Span,
}

#[derive(Debug)]
pub struct CatchClause {
    pub param: Option<JsString>,
    pub body: BlockStatement,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════════════

/// A function declaration, function expression, method or arrow function.
#[derive(Debug)]
pub struct FunctionNode {
    pub name: Option<JsString>,
    pub params: Rc<[JsString]>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    /// Covers the whole function text, from `function` (or the first
    /// parameter of an arrow) to the closing brace.
    pub span: Span,
}

#[derive(Debug)]
pub enum FunctionBody {
    Block(Rc<[Statement]>),
    Expression(Rc<Expression>),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Expressions
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum Expression {
    Number(f64),
    String(JsString),
    Boolean(bool),
    Null,
    Identifier(Identifier),
    This(Span),
    Array(ArrayExpression),
    Object(ObjectExpression),
    Function(Rc<FunctionNode>),
    Unary(Box<UnaryExpression>),
    Update(Box<UpdateExpression>),
    Binary(Box<BinaryExpression>),
    Logical(Box<LogicalExpression>),
    Conditional(Box<ConditionalExpression>),
    Assignment(Box<AssignmentExpression>),
    Member(Box<MemberExpression>),
    Call(Box<CallExpression>),
    New(Box<NewExpression>),
    Sequence(Vec<Expression>),
}

#[derive(Debug, Clone)]
pub struct Identifier {
    pub name: JsString,
    pub span: Span,
}

#[derive(Debug)]
pub struct ArrayExpression {
    pub elements: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ObjectExpression {
    pub properties: Vec<ObjectProperty>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ObjectProperty {
    pub key: PropertyName,
    pub value: Expression,
}

#[derive(Debug)]
pub enum PropertyName {
    Static(JsString),
    Computed(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,  // -
    Plus,   // +
    Not,    // !
    BitNot, // ~
    Typeof,
    Void,
    Delete,
}

#[derive(Debug)]
pub struct UnaryExpression {
    pub operator: UnaryOp,
    pub argument: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug)]
pub struct UpdateExpression {
    pub operator: UpdateOp,
    pub prefix: bool,
    pub argument: AssignmentTarget,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
    URShift,
    In,
    Instanceof,
}

#[derive(Debug)]
pub struct BinaryExpression {
    pub operator: BinaryOp,
    pub left: Expression,
    pub right: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    NullishCoalescing,
}

#[derive(Debug)]
pub struct LogicalExpression {
    pub operator: LogicalOp,
    pub left: Expression,
    pub right: Expression,
    pub span: Span,
}

#[derive(Debug)]
pub struct ConditionalExpression {
    pub test: Expression,
    pub consequent: Expression,
    pub alternate: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
}

impl AssignmentOp {
    /// The binary operator a compound assignment applies.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignmentOp::Assign => None,
            AssignmentOp::AddAssign => Some(BinaryOp::Add),
            AssignmentOp::SubAssign => Some(BinaryOp::Sub),
            AssignmentOp::MulAssign => Some(BinaryOp::Mul),
            AssignmentOp::DivAssign => Some(BinaryOp::Div),
            AssignmentOp::ModAssign => Some(BinaryOp::Mod),
        }
    }
}

#[derive(Debug)]
pub enum AssignmentTarget {
    Identifier(Identifier),
    Member(MemberExpression),
}

#[derive(Debug)]
pub struct AssignmentExpression {
    pub operator: AssignmentOp,
    pub left: AssignmentTarget,
    pub right: Expression,
    pub span: Span,
}

#[derive(Debug)]
pub enum MemberProperty {
    Identifier(JsString),
    Computed(Expression),
}

#[derive(Debug)]
pub struct MemberExpression {
    pub object: Expression,
    pub property: MemberProperty,
    pub span: Span,
}

#[derive(Debug)]
pub struct CallExpression {
    pub callee: Expression,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug)]
pub struct NewExpression {
    pub callee: Expression,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

impl Expression {
    /// Source span of the expression, when the node records one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Expression::Identifier(id) => Some(id.span),
            Expression::This(span) => Some(*span),
            Expression::Array(a) => Some(a.span),
            Expression::Object(o) => Some(o.span),
            Expression::Function(f) => Some(f.span),
            Expression::Unary(u) => Some(u.span),
            Expression::Update(u) => Some(u.span),
            Expression::Binary(b) => Some(b.span),
            Expression::Logical(l) => Some(l.span),
            Expression::Conditional(c) => Some(c.span),
            Expression::Assignment(a) => Some(a.span),
            Expression::Member(m) => Some(m.span),
            Expression::Call(c) => Some(c.span),
            Expression::New(n) => Some(n.span),
            Expression::Number(_)
            | Expression::String(_)
            | Expression::Boolean(_)
            | Expression::Null
            | Expression::Sequence(_) => None,
        }
    }
}
