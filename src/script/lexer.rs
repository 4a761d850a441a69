//! Tokenizer and block structure for MSL source text.
//!
//! Turns raw text into line-numbered statements and nests `FUNC`/`LOOP`
//! bodies, in both brace (`LOOP(3){ ... }`) and keyword (`LOOP 3 ... ENDLOOP`)
//! form.

use crate::error::{CompileError, CompileErrorKind};

/// Lexical unit of MSL source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// Statement text, trimmed, without its terminator.
    Statement { text: String, line: usize },
    /// `{` at parenthesis depth 0.
    Open { line: usize },
    /// `}` at parenthesis depth 0.
    Close { line: usize },
}

/// Split source into statement and brace tokens.
///
/// Statements end at `;`, newline, `{` or `}` when not inside parentheses, so
/// a `GROUP(...)` argument list may span several lines. Comments (`//`, `#`)
/// run to end of line.
pub(crate) fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut start_line = 0;
    let mut depth: i32 = 0;

    let flush = |buf: &mut String, start_line: usize, tokens: &mut Vec<Token>| {
        let text = buf.trim();
        if !text.is_empty() {
            tokens.push(Token::Statement {
                text: text.to_string(),
                line: start_line,
            });
        }
        buf.clear();
    };

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;

        for c in strip_comment(raw).chars() {
            match c {
                ';' | '{' | '}' if depth <= 0 => {
                    flush(&mut buf, start_line, &mut tokens);
                    depth = 0;
                    match c {
                        '{' => tokens.push(Token::Open { line }),
                        '}' => tokens.push(Token::Close { line }),
                        _ => {}
                    }
                }
                _ => {
                    if c.is_whitespace() {
                        if !buf.is_empty() && !buf.ends_with(' ') {
                            buf.push(' ');
                        }
                        continue;
                    }
                    if buf.is_empty() {
                        start_line = line;
                    }
                    match c {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    buf.push(c);
                }
            }
        }

        if depth <= 0 {
            flush(&mut buf, start_line, &mut tokens);
            depth = 0;
        } else if !buf.ends_with(' ') {
            buf.push(' ');
        }
    }
    flush(&mut buf, start_line, &mut tokens);

    tokens
}

fn strip_comment(line: &str) -> &str {
    let cut = [line.find("//"), line.find('#')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..cut]
}

/// Split a statement into its leading keyword and the remainder.
///
/// The keyword is the run of ASCII letters and underscores at the start,
/// upper-cased. For `X100` this gives `("X", "100")`.
pub(crate) fn split_keyword(text: &str) -> (String, &str) {
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphabetic() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    (text[..end].to_ascii_uppercase(), text[end..].trim())
}

/// Kind of a structured block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    Func,
    Loop,
}

impl BlockKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "FUNC" => Some(BlockKind::Func),
            "LOOP" => Some(BlockKind::Loop),
            _ => None,
        }
    }

    fn end_keyword(self) -> &'static str {
        match self {
            BlockKind::Func => "ENDFUNC",
            BlockKind::Loop => "ENDLOOP",
        }
    }
}

/// Statement tree produced from the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Statement {
        text: String,
        line: usize,
    },
    Block {
        kind: BlockKind,
        /// Header argument text, e.g. `PICK` or `3`.
        argument: String,
        line: usize,
        end_line: usize,
        body: Vec<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Eof,
    Brace,
    Keyword(&'static str),
}

/// Nest blocks; structural problems are pushed to `errors`.
pub(crate) fn structure(tokens: Vec<Token>, errors: &mut Vec<CompileError>) -> Vec<Node> {
    let mut builder = TreeBuilder {
        tokens,
        pos: 0,
        errors,
    };
    let (nodes, _) = builder.parse_nodes(Terminator::Eof);
    nodes
}

struct TreeBuilder<'e> {
    tokens: Vec<Token>,
    pos: usize,
    errors: &'e mut Vec<CompileError>,
}

impl TreeBuilder<'_> {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_is_open(&self) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Open { .. }))
    }

    /// Parse until `terminator`; returns the nodes and the closing line if the
    /// terminator was found.
    fn parse_nodes(&mut self, terminator: Terminator) -> (Vec<Node>, Option<usize>) {
        let mut nodes = Vec::new();

        while let Some(token) = self.next() {
            match token {
                Token::Close { line } => {
                    if terminator == Terminator::Brace {
                        return (nodes, Some(line));
                    }
                    self.error(line, CompileErrorKind::UnknownToken, "unexpected '}'");
                }
                Token::Open { line } => {
                    self.error(
                        line,
                        CompileErrorKind::UnknownToken,
                        "unexpected '{' without FUNC or LOOP header",
                    );
                    let (body, _) = self.parse_nodes(Terminator::Brace);
                    nodes.extend(body);
                }
                Token::Statement { text, line } => {
                    let (keyword, rest) = split_keyword(&text);

                    if keyword == "ENDFUNC" || keyword == "ENDLOOP" {
                        if let Terminator::Keyword(end) = terminator {
                            if end == keyword && rest.is_empty() {
                                return (nodes, Some(line));
                            }
                        }
                        self.error(
                            line,
                            CompileErrorKind::UnknownToken,
                            format!("unexpected {}", keyword),
                        );
                        continue;
                    }

                    // The keyword is the whole leading letter run, so `FUNCX` never
                    // matches here.
                    match BlockKind::from_keyword(&keyword) {
                        Some(kind) => nodes.push(self.parse_block(kind, rest, line)),
                        None => nodes.push(Node::Statement { text, line }),
                    }
                }
            }
        }

        (nodes, None)
    }

    fn parse_block(&mut self, kind: BlockKind, rest: &str, line: usize) -> Node {
        let argument = header_argument(rest).to_string();
        let terminator = if self.peek_is_open() {
            self.pos += 1;
            Terminator::Brace
        } else {
            Terminator::Keyword(kind.end_keyword())
        };

        let (body, end_line) = self.parse_nodes(terminator);
        let end_line = match end_line {
            Some(end) => end,
            None => {
                let expected = match terminator {
                    Terminator::Brace => "'}'",
                    _ => kind.end_keyword(),
                };
                self.error(
                    line,
                    CompileErrorKind::UnterminatedBlock,
                    format!("block opened here is missing {}", expected),
                );
                body.last().map(node_line).unwrap_or(line)
            }
        };

        Node::Block {
            kind,
            argument,
            line,
            end_line,
            body,
        }
    }

    fn error(&mut self, line: usize, kind: CompileErrorKind, message: impl Into<String>) {
        self.errors.push(CompileError::new(line, kind, message));
    }
}

fn node_line(node: &Node) -> usize {
    match node {
        Node::Statement { line, .. } => *line,
        Node::Block { end_line, .. } => *end_line,
    }
}

fn header_argument(rest: &str) -> &str {
    let rest = rest.trim();
    match rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => inner.trim(),
        None => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Statement { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_tokenize_semicolons_and_comments() {
        let tokens = tokenize("X(100); Y(50); // trailing\n# full line\nZ(10);");
        assert_eq!(statements(&tokens), vec!["X(100)", "Y(50)", "Z(10)"]);
        assert!(matches!(tokens[2], Token::Statement { line: 3, .. }));
    }

    #[test]
    fn test_tokenize_braces() {
        let tokens = tokenize("FUNC(PICK){Z(100);G(1);} CALL(PICK);");
        assert_eq!(tokens.len(), 6);
        assert!(matches!(tokens[1], Token::Open { line: 1 }));
        assert!(matches!(tokens[4], Token::Close { line: 1 }));
    }

    #[test]
    fn test_statement_spanning_lines_inside_parens() {
        let tokens = tokenize("GROUP(X(100),\n      Y(50))\nZ(1)");
        assert_eq!(statements(&tokens), vec!["GROUP(X(100), Y(50))", "Z(1)"]);
        assert!(matches!(tokens[1], Token::Statement { line: 3, .. }));
    }

    #[test]
    fn test_split_keyword() {
        assert_eq!(split_keyword("X100 F1500"), ("X".to_string(), "100 F1500"));
        assert_eq!(split_keyword("groupsync(X(1))"), ("GROUPSYNC".to_string(), "(X(1))"));
        assert_eq!(split_keyword("HOME"), ("HOME".to_string(), ""));
    }

    #[test]
    fn test_structure_brace_and_keyword_blocks() {
        let mut errors = Vec::new();
        let source = "FUNC PLACE\nZ(0)\nENDFUNC\nLOOP(2){\nCALL(PLACE)\n}";
        let nodes = structure(tokenize(source), &mut errors);

        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(nodes.len(), 2);
        match &nodes[0] {
            Node::Block {
                kind,
                argument,
                line,
                end_line,
                body,
            } => {
                assert_eq!(*kind, BlockKind::Func);
                assert_eq!(argument, "PLACE");
                assert_eq!((*line, *end_line), (1, 3));
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_block() {
        let mut errors = Vec::new();
        structure(tokenize("LOOP(3){\nX(10);\n"), &mut errors);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, CompileErrorKind::UnterminatedBlock);
        assert_eq!(errors[0].line, 1);
    }

    #[test]
    fn test_stray_close_brace() {
        let mut errors = Vec::new();
        structure(tokenize("X(1)\n}"), &mut errors);
        assert_eq!(errors[0].kind, CompileErrorKind::UnknownToken);
        assert_eq!(errors[0].line, 2);
    }
}
