/// Tokens of the expression language.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Declaration keywords
    Vector,
    Matrix,
    Scalar,
    Host,

    // Symbols
    LParen,    // (
    RParen,    // )
    Comma,     // ,
    Semicolon, // ;
    Lt,        // <
    Gt,        // >
    Eq,        // =
    PlusEq,    // +=
    MinusEq,   // -=
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    DotStar,   // .*
    DotSlash,  // ./

    // Literals
    Integer(u64),
    Ident(String),

    Eof,
}

impl Lexeme {
    pub fn from_keyword(s: &str) -> Option<Lexeme> {
        match s {
            "vector" => Some(Lexeme::Vector),
            "matrix" => Some(Lexeme::Matrix),
            "scalar" => Some(Lexeme::Scalar),
            "host" => Some(Lexeme::Host),
            _ => None,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn description(&self) -> &'static str {
        match self {
            Lexeme::Vector => "'vector'",
            Lexeme::Matrix => "'matrix'",
            Lexeme::Scalar => "'scalar'",
            Lexeme::Host => "'host'",
            Lexeme::LParen => "'('",
            Lexeme::RParen => "')'",
            Lexeme::Comma => "','",
            Lexeme::Semicolon => "';'",
            Lexeme::Lt => "'<'",
            Lexeme::Gt => "'>'",
            Lexeme::Eq => "'='",
            Lexeme::PlusEq => "'+='",
            Lexeme::MinusEq => "'-='",
            Lexeme::Plus => "'+'",
            Lexeme::Minus => "'-'",
            Lexeme::Star => "'*'",
            Lexeme::Slash => "'/'",
            Lexeme::DotStar => "'.*'",
            Lexeme::DotSlash => "'./'",
            Lexeme::Integer(_) => "integer literal",
            Lexeme::Ident(_) => "identifier",
            Lexeme::Eof => "end of file",
        }
    }

    /// Whether the token starts a declaration.
    pub fn is_decl_keyword(&self) -> bool {
        matches!(
            self,
            Lexeme::Vector | Lexeme::Matrix | Lexeme::Scalar | Lexeme::Host
        )
    }
}
