//! Uniform syntax tree node.
//!
//! Every syntactic form shares one record type; each kind uses only the
//! fields it needs. The JSON shape (field names, omitted defaults) is an
//! external contract consumed by tooling.

use serde::Serialize;

use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    #[serde(rename = "assign")]
    Assignment,
    #[serde(rename = "attr")]
    AttrDef,
    Binary,
    Bool,
    Break,
    #[serde(rename = "classdef")]
    ClassDef,
    Cleanup,
    Do,
    #[serde(rename = "forin")]
    ForIn,
    #[serde(rename = "fornum")]
    ForNum,
    #[serde(rename = "funccall")]
    FuncCall,
    #[serde(rename = "funcdef")]
    FuncDef,
    Identifier,
    If,
    #[serde(rename = "ifclause")]
    IfClause,
    Index,
    Member,
    Next,
    Nil,
    Number,
    Range,
    Return,
    Spread,
    String,
    Table,
    #[serde(rename = "tablekey")]
    TableKey,
    #[serde(rename = "tablevalue")]
    TableValue,
    Ternary,
    Unary,
    While,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parent: String,
    #[serde(rename = "number", skip_serializing_if = "is_zero")]
    pub number_value: f64,
    #[serde(rename = "string", skip_serializing_if = "String::is_empty")]
    pub string_value: String,
    #[serde(rename = "bool", skip_serializing_if = "is_false")]
    pub bool_value: bool,
    #[serde(rename = "condition", skip_serializing_if = "Option::is_none")]
    pub cond: Option<Box<Node>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<Box<Node>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<Node>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<Node>>,
    #[serde(rename = "variables", skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<Node>,
    #[serde(rename = "values", skip_serializing_if = "Vec::is_empty")]
    pub vals: Vec<Node>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub block: Vec<Node>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub catches: Vec<Node>,
    #[serde(skip_serializing_if = "is_false")]
    pub private: bool,
    #[serde(rename = "static", skip_serializing_if = "is_false")]
    pub static_: bool,
    #[serde(rename = "position")]
    pub pos: Span,
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: String::new(),
            parent: String::new(),
            number_value: 0.0,
            string_value: String::new(),
            bool_value: false,
            cond: None,
            step: None,
            key: None,
            value: None,
            vars: Vec::new(),
            vals: Vec::new(),
            block: Vec::new(),
            catches: Vec::new(),
            private: false,
            static_: false,
            pos: Span::default(),
        }
    }

    pub fn at(kind: NodeKind, pos: Span) -> Self {
        let mut node = Self::new(kind);
        node.pos = pos;
        node
    }
}
