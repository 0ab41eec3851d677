#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    OpenBlock,
    CloseBlock,
    Ident(String),
    StringLit(String),
    NumLit(String),
    RangeLit(String, String),
    Eq,
    Ne,
    RegexMatch,
    RegexNoMatch,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
    ContainsNot,
    Between,
    And,
    Or,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}
