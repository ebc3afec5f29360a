//! Lexer and parser for the `text/template` subset used by code templates.
//!
//! ```ebnf
//! pipeline = [ decl ], command, { "|", command } ;
//! decl     = variable, [ ",", variable ], ( ":=" | "=" ) ;
//! command  = operand, { space, operand } ;
//! operand  = term, { "." , identifier } ;
//! term     = "(" pipeline ")" | string | raw | char | integer
//!          | "true" | "false" | "nil" | variable | field | "." | identifier ;
//! field    = ( ".", identifier )+ ;
//! variable = "$", [ identifier ] ;
//! ```

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, none_of, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::{many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::TemplateError;

/// A template parsed into a tree of nodes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Program {
    pub(crate) nodes: Vec<TNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TNode {
    Text(String),
    Action(Pipeline),
    If(Conditional),
    With(Conditional),
    Range(RangeNode),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Conditional {
    pub(crate) branches: Vec<(Pipeline, Vec<TNode>)>,
    pub(crate) otherwise: Option<Vec<TNode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RangeNode {
    pub(crate) pipeline: Pipeline,
    pub(crate) body: Vec<TNode>,
    pub(crate) otherwise: Option<Vec<TNode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    /// Variables declared (`:=`) or assigned (`=`) by the pipeline.
    pub(crate) vars: Vec<String>,
    pub(crate) declare: bool,
    pub(crate) commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub(crate) operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Dot,
    /// `.A.B` evaluated on dot.
    Field(Vec<String>),
    /// `$x`; `$` is the initial dot.
    Var(String),
    /// Field chain on another operand: `$x.A`, `(pipeline).A`.
    Chain(Box<Operand>, Vec<String>),
    Func(String),
    Pipe(Box<Pipeline>),
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
}

/// Raw lexical item.
#[derive(Debug)]
enum Item<'s> {
    Text(String),
    Action { body: &'s str, line: usize },
}

fn line_of(src: &str, offset: usize) -> usize {
    src[..offset].matches('\n').count() + 1
}

/// Finds the `}}` closing an action whose body starts at `from`, skipping
/// string literals.
fn find_close(src: &str, from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = from;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' && q != b'`' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'`' || b == b'\'' {
                    quote = Some(b);
                } else if b == b'}' && bytes.get(i + 1) == Some(&b'}') {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

fn lex(src: &str) -> Result<Vec<Item<'_>>, TemplateError> {
    let mut items = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;
    while let Some(found) = src[pos..].find("{{") {
        let open = pos + found;
        let mut text = &src[pos..open];
        if trim_next {
            text = text.trim_start();
        }
        let mut body_start = open + 2;
        let rest = &src[body_start..];
        if rest.starts_with('-') && rest[1..].starts_with(char::is_whitespace) {
            text = text.trim_end();
            body_start += 1;
        }
        if !text.is_empty() {
            items.push(Item::Text(text.to_string()));
        }

        let close = find_close(src, body_start).ok_or_else(|| TemplateError::Syntax {
            line: line_of(src, open),
            message: "unclosed action".to_string(),
        })?;
        let mut body = &src[body_start..close];
        trim_next = false;
        if body.ends_with('-') && body[..body.len() - 1].ends_with(char::is_whitespace) {
            body = &body[..body.len() - 1];
            trim_next = true;
        }
        let trimmed = body.trim();
        let is_comment = trimmed.starts_with("/*") && trimmed.ends_with("*/") && trimmed.len() >= 4;
        if !is_comment {
            items.push(Item::Action {
                body: trimmed,
                line: line_of(src, open),
            });
        }
        pos = close + 2;
    }
    let mut text = &src[pos..];
    if trim_next {
        text = text.trim_start();
    }
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
    Ok(items)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn variable(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(char('$'), take_while(|c: char| c.is_alphanumeric() || c == '_'))),
        str::to_string,
    )(input)
}

fn fields(input: &str) -> IResult<&str, Vec<String>> {
    many1(map(preceded(char('.'), identifier), str::to_string))(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        value(String::new(), tag("\"\"")),
        delimited(
            char('"'),
            escaped_transform(
                is_not("\\\""),
                '\\',
                alt((
                    value("\\", char('\\')),
                    value("\"", char('"')),
                    value("'", char('\'')),
                    value("\n", char('n')),
                    value("\t", char('t')),
                    value("\r", char('r')),
                )),
            ),
            char('"'),
        ),
        map(delimited(char('`'), take_while(|c| c != '`'), char('`')), str::to_string),
    ))(input)
}

fn char_literal(input: &str) -> IResult<&str, i64> {
    alt((
        map(delimited(char('\''), preceded(char('\\'), one_of("nt\\'")), char('\'')), |c| {
            match c {
                'n' => '\n' as i64,
                't' => '\t' as i64,
                other => other as i64,
            }
        }),
        map(delimited(char('\''), none_of("\\'"), char('\'')), |c| c as i64),
    ))(input)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse)(input)
}

fn term(input: &str) -> IResult<&str, Operand> {
    alt((
        map(
            delimited(
                terminated(char('('), multispace0),
                pipeline,
                preceded(multispace0, char(')')),
            ),
            |pipe| Operand::Pipe(Box::new(pipe)),
        ),
        map(string_literal, Operand::Str),
        map(char_literal, Operand::Int),
        map(integer, Operand::Int),
        map(variable, Operand::Var),
        map(fields, Operand::Field),
        value(Operand::Dot, char('.')),
        map(identifier, |word| match word {
            "true" => Operand::Bool(true),
            "false" => Operand::Bool(false),
            "nil" => Operand::Nil,
            name => Operand::Func(name.to_string()),
        }),
    ))(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    let (rest, base) = term(input)?;
    let (rest, chain) = opt(fields)(rest)?;
    Ok(match (base, chain) {
        (Operand::Var(name), Some(chain)) => (rest, Operand::Chain(Box::new(Operand::Var(name)), chain)),
        (base @ Operand::Pipe(_), Some(chain)) => (rest, Operand::Chain(Box::new(base), chain)),
        (base, None) => (rest, base),
        (_, Some(_)) => {
            return Err(nom::Err::Error(nom::error::Error::new(
                rest,
                nom::error::ErrorKind::Verify,
            )))
        }
    })
}

fn command(input: &str) -> IResult<&str, Command> {
    map(separated_list1(multispace1, operand), |operands| Command { operands })(input)
}

fn declaration(input: &str) -> IResult<&str, (Vec<String>, bool)> {
    let (rest, first) = variable(input)?;
    let (rest, second) = opt(preceded(
        tuple((multispace0, char(','), multispace0)),
        variable,
    ))(rest)?;
    let (rest, declare) = preceded(
        multispace0,
        alt((value(true, tag(":=")), value(false, char('=')))),
    )(rest)?;
    let (rest, _) = multispace0(rest)?;
    let mut vars = vec![first];
    vars.extend(second);
    Ok((rest, (vars, declare)))
}

fn pipeline(input: &str) -> IResult<&str, Pipeline> {
    let (rest, decl) = opt(declaration)(input)?;
    let (rest, commands) = separated_list1(
        tuple((multispace0, char('|'), multispace0)),
        command,
    )(rest)?;
    let (vars, declare) = decl.unwrap_or_default();
    Ok((
        rest,
        Pipeline {
            vars,
            declare,
            commands,
        },
    ))
}

/// What an action introduces.
#[derive(Debug, Clone)]
enum Keyword {
    If(Pipeline),
    With(Pipeline),
    Range(Pipeline),
    ElseIf(Pipeline),
    ElseWith(Pipeline),
    Else,
    End,
    Break,
    Continue,
    Pipeline(Pipeline),
}

fn keyword(input: &str) -> IResult<&str, Keyword> {
    let kw = |word: &'static str| terminated(tag(word), multispace1);
    alt((
        all_consuming(map(preceded(kw("if"), pipeline), Keyword::If)),
        all_consuming(map(preceded(kw("with"), pipeline), Keyword::With)),
        all_consuming(map(preceded(kw("range"), pipeline), Keyword::Range)),
        all_consuming(map(
            preceded(pair(kw("else"), kw("if")), pipeline),
            Keyword::ElseIf,
        )),
        all_consuming(map(
            preceded(pair(kw("else"), kw("with")), pipeline),
            Keyword::ElseWith,
        )),
        all_consuming(value(Keyword::Else, tag("else"))),
        all_consuming(value(Keyword::End, tag("end"))),
        all_consuming(value(Keyword::Break, tag("break"))),
        all_consuming(value(Keyword::Continue, tag("continue"))),
        all_consuming(map(pipeline, Keyword::Pipeline)),
    ))(input)
}

/// How a list of nodes ended.
enum Terminator {
    Eof,
    End,
    Else,
    ElseIf(Pipeline),
    ElseWith(Pipeline),
}

struct Parser<'s> {
    items: std::vec::IntoIter<Item<'s>>,
    loops: usize,
    line: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn list(&mut self) -> Result<(Vec<TNode>, Terminator), TemplateError> {
        let mut nodes = Vec::new();
        while let Some(item) = self.items.next() {
            let (body, line) = match item {
                Item::Text(text) => {
                    nodes.push(TNode::Text(text));
                    continue;
                }
                Item::Action { body, line } => (body, line),
            };
            self.line = line;
            let (_, kw) = keyword(body)
                .map_err(|_| self.error(format!("malformed action {{{{{body}}}}}")))?;
            match kw {
                Keyword::Pipeline(pipe) => nodes.push(TNode::Action(pipe)),
                Keyword::If(pipe) => nodes.push(TNode::If(self.conditional(pipe, false)?)),
                Keyword::With(pipe) => nodes.push(TNode::With(self.conditional(pipe, true)?)),
                Keyword::Range(pipe) => {
                    if pipe.vars.len() > 2 || (!pipe.vars.is_empty() && !pipe.declare) {
                        return Err(self.error("range only declares up to two variables"));
                    }
                    self.loops += 1;
                    let (body, end) = self.list()?;
                    let otherwise = match end {
                        Terminator::End => None,
                        Terminator::Else => {
                            self.loops -= 1;
                            let (otherwise, end) = self.list()?;
                            self.loops += 1;
                            self.expect_end(end)?;
                            Some(otherwise)
                        }
                        _ => return Err(self.error("unexpected else in range")),
                    };
                    self.loops -= 1;
                    nodes.push(TNode::Range(RangeNode {
                        pipeline: pipe,
                        body,
                        otherwise,
                    }));
                }
                Keyword::Break | Keyword::Continue if self.loops == 0 => {
                    return Err(self.error("break or continue outside of range"));
                }
                Keyword::Break => nodes.push(TNode::Break),
                Keyword::Continue => nodes.push(TNode::Continue),
                Keyword::End => return Ok((nodes, Terminator::End)),
                Keyword::Else => return Ok((nodes, Terminator::Else)),
                Keyword::ElseIf(pipe) => return Ok((nodes, Terminator::ElseIf(pipe))),
                Keyword::ElseWith(pipe) => return Ok((nodes, Terminator::ElseWith(pipe))),
            }
        }
        Ok((nodes, Terminator::Eof))
    }

    fn expect_end(&self, end: Terminator) -> Result<(), TemplateError> {
        match end {
            Terminator::End => Ok(()),
            Terminator::Eof => Err(self.error("unexpected end of template, missing {{end}}")),
            _ => Err(self.error("unexpected else")),
        }
    }

    fn conditional(&mut self, first: Pipeline, with: bool) -> Result<Conditional, TemplateError> {
        let mut branches = Vec::new();
        let mut pipe = first;
        loop {
            let (body, end) = self.list()?;
            branches.push((pipe, body));
            match end {
                Terminator::End => {
                    return Ok(Conditional {
                        branches,
                        otherwise: None,
                    })
                }
                Terminator::Else => {
                    let (otherwise, end) = self.list()?;
                    self.expect_end(end)?;
                    return Ok(Conditional {
                        branches,
                        otherwise: Some(otherwise),
                    });
                }
                Terminator::ElseIf(next) if !with => pipe = next,
                Terminator::ElseWith(next) if with => pipe = next,
                Terminator::ElseIf(_) | Terminator::ElseWith(_) => {
                    return Err(self.error("mismatched else branch"))
                }
                Terminator::Eof => {
                    return Err(self.error("unexpected end of template, missing {{end}}"))
                }
            }
        }
    }
}

/// Parses template source.
pub(crate) fn parse(src: &str) -> Result<Program, TemplateError> {
    let mut parser = Parser {
        items: lex(src)?.into_iter(),
        loops: 0,
        line: 1,
    };
    let (nodes, end) = parser.list()?;
    match end {
        Terminator::Eof => Ok(Program { nodes }),
        Terminator::End => Err(parser.error("unexpected {{end}}")),
        _ => Err(parser.error("unexpected {{else}}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(src: &str) -> Pipeline {
        match parse(src).unwrap().nodes.as_slice() {
            [TNode::Action(pipe)] => pipe.clone(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_text_and_trim_markers() {
        let program = parse("a  {{- .X -}}  b\n{{/* comment */}}c").unwrap();
        assert_eq!(
            program.nodes,
            vec![
                TNode::Text("a".to_string()),
                TNode::Action(Pipeline {
                    vars: vec![],
                    declare: false,
                    commands: vec![Command {
                        operands: vec![Operand::Field(vec!["X".to_string()])]
                    }],
                }),
                TNode::Text("b\n".to_string()),
                TNode::Text("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_field_chain_with_arguments() {
        let pipe = action(r#"{{ .Function.Argument 0 }}"#);
        assert_eq!(
            pipe.commands[0].operands,
            vec![
                Operand::Field(vec!["Function".to_string(), "Argument".to_string()]),
                Operand::Int(0),
            ]
        );
    }

    #[test]
    fn test_declaration_and_pipes() {
        let pipe = action(r#"{{ $name := .Config "service" | printf "%s-%d" 3 }}"#);
        assert_eq!(pipe.vars, vec!["$name".to_string()]);
        assert!(pipe.declare);
        assert_eq!(pipe.commands.len(), 2);
        assert_eq!(pipe.commands[1].operands[0], Operand::Func("printf".to_string()));
        assert_eq!(pipe.commands[1].operands[1], Operand::Str("%s-%d".to_string()));
    }

    #[test]
    fn test_parenthesised_pipeline_with_field() {
        let pipe = action(r#"{{ (index .List 0).Key }}"#);
        match &pipe.commands[0].operands[0] {
            Operand::Chain(base, chain) => {
                assert!(matches!(base.as_ref(), Operand::Pipe(_)));
                assert_eq!(chain, &vec!["Key".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_string_escapes_and_close_in_string() {
        let pipe = action(r#"{{ print "a\"}}b\n" `raw\n` 'x' }}"#);
        assert_eq!(
            pipe.commands[0].operands[1..],
            [
                Operand::Str("a\"}}b\n".to_string()),
                Operand::Str("raw\\n".to_string()),
                Operand::Int('x' as i64),
            ]
        );
    }

    #[test]
    fn test_control_structures() {
        let program =
            parse("{{ if .A }}a{{ else if .B }}b{{ else }}c{{ end }}{{ range $i, $v := .L }}{{ if $v }}{{ break }}{{ end }}{{ else }}none{{ end }}")
                .unwrap();
        match &program.nodes[0] {
            TNode::If(cond) => {
                assert_eq!(cond.branches.len(), 2);
                assert!(cond.otherwise.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        match &program.nodes[1] {
            TNode::Range(range) => {
                assert_eq!(range.pipeline.vars, vec!["$i".to_string(), "$v".to_string()]);
                assert_eq!(range.otherwise, Some(vec![TNode::Text("none".to_string())]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_syntax_errors() {
        for src in [
            "{{ if .A }}",
            "{{ end }}",
            "{{ .A ",
            "{{ break }}",
            "{{ with .A }}{{ else if .B }}{{ end }}",
            "{{ .A | }}",
        ] {
            assert!(
                matches!(parse(src), Err(TemplateError::Syntax { .. })),
                "{src:?} should not parse"
            );
        }
    }
}
