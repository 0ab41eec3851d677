use thiserror::Error;

/// Mirrors the numbered grammar-error taxonomy of the original scanner/parser
/// pair: each variant corresponds to one terminal the parser expected but
/// did not find.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("openblock expected")]
    OpenBlockExpected,
    #[error("closeblock expected")]
    CloseBlockExpected,
    #[error("ident expected")]
    IdentExpected,
    #[error("stringliteral expected")]
    StringLiteralExpected,
    #[error("numliteral expected")]
    NumLiteralExpected,
    #[error("rangeliteral expected")]
    RangeLiteralExpected,
    #[error("matchop expected")]
    MatchOpExpected,
    #[error("logop expected")]
    LogOpExpected,
    #[error("invalid expr")]
    InvalidExpr,
    #[error("EOF expected")]
    EofExpected,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("filter: parse error at offset {offset}: {kind}")]
pub struct ParseError {
    pub offset: usize,
    pub kind: ParseErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("filter: attribute \"{0}\" unavailable")]
    AttributeUnavailable(String),
    #[error("filter: invalid regex \"{0}\"")]
    InvalidRegex(String),
}
