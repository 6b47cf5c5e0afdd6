//! Whitelist based clean-up of the inline markup SRT files carry.
//!
//! A line is tokenised, built into a small tree and written back out. Only
//! `<b>`, `<i>`, `<u>`, `<font>` and `<br>` survive, and of their attributes
//! only `color` and `size`. Any other element is replaced by the text it
//! contains.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while, take_while1};
use nom::character::complete::{alpha1, char, multispace0};
use nom::combinator::{map, opt, recognize};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const ALLOWED_TAGS: &[&str] = &["b", "i", "u", "font", "br"];
const ALLOWED_ATTRIBUTES: &[&str] = &["color", "size"];
/// Start tags nested deeper than this are dropped, keeping their content.
const MAX_DEPTH: usize = 128;
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

static CHARACTER_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    // Numeric and a few legacy named references are also read without the ';'.
    Regex::new(r"&(?:#([0-9]{1,7});?|#[xX]([0-9a-fA-F]{1,6});?|([a-zA-Z]+);|(amp|lt|gt|quot|nbsp))")
        .expect("character reference pattern is valid")
});

/// Sanitises one line of subtitle text.
pub fn sanitise(line: &str) -> String {
    let tree = build_tree(tokenise(line));
    let mut out = String::with_capacity(line.len());
    for node in &tree {
        write_node(node, &mut out);
    }
    out
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Open {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Comment,
}

#[derive(Debug, PartialEq)]
enum Node {
    Text(String),
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    },
}

fn tokenise(mut input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    while !input.is_empty() {
        match token(input) {
            Ok((rest, token)) => {
                tokens.push(token);
                input = rest;
            }
            Err(_) => {
                tokens.push(Token::Text(input));
                break;
            }
        }
    }
    tokens
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        comment,
        end_tag,
        start_tag,
        map(take_while1(|c: char| c != '<'), Token::Text),
        // A '<' that does not open a tag is just text.
        map(tag("<"), Token::Text),
    ))(input)
}

fn comment(input: &str) -> IResult<&str, Token<'_>> {
    map(
        alt((
            delimited(tag("<!--"), take_until("-->"), tag("-->")),
            delimited(alt((tag("<!"), tag("<?"))), take_until(">"), char('>')),
        )),
        |_| Token::Comment,
    )(input)
}

fn end_tag(input: &str) -> IResult<&str, Token<'_>> {
    map(
        delimited(tag("</"), tag_name, pair(multispace0, char('>'))),
        Token::Close,
    )(input)
}

fn start_tag(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('<')(input)?;
    let (input, name) = tag_name(input)?;
    let (input, attributes) = many0(preceded(multispace0, attribute))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, self_closing) = map(opt(char('/')), |slash| slash.is_some())(input)?;
    let (input, _) = char('>')(input)?;

    Ok((
        input,
        Token::Open {
            name,
            attributes,
            self_closing,
        },
    ))
}

fn tag_name(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alpha1,
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '-'),
        )),
        |name: &str| name.to_ascii_lowercase(),
    )(input)
}

fn attribute(input: &str) -> IResult<&str, (String, String)> {
    let (input, name) = take_while1(|c: char| {
        !c.is_whitespace() && !matches!(c, '/' | '>' | '=' | '"' | '\'')
    })(input)?;
    let (input, value) = opt(preceded(
        tuple((multispace0, char('='), multispace0)),
        attribute_value,
    ))(input)?;

    Ok((
        input,
        (
            name.to_ascii_lowercase(),
            value.map(decode_references).unwrap_or_default(),
        ),
    ))
}

fn attribute_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        take_while1(|c: char| !c.is_whitespace() && c != '>'),
    ))(input)
}

struct OpenElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl OpenElement {
    fn into_node(self) -> Node {
        Node::Element {
            name: self.name,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

/// Builds a tree the way a forgiving HTML parser would: unclosed elements are
/// closed at the end, stray end tags are dropped.
///
/// Nesting is capped at [`MAX_DEPTH`] so writing and dropping the tree cannot
/// exhaust the stack.
fn build_tree(tokens: Vec<Token<'_>>) -> Vec<Node> {
    let mut root: Vec<Node> = Vec::new();
    let mut open: Vec<OpenElement> = Vec::new();

    for token in tokens {
        match token {
            Token::Text(text) => {
                let node = Node::Text(decode_references(text));
                current_children(&mut root, &mut open).push(node);
            }
            Token::Open {
                name,
                attributes,
                self_closing,
            } => {
                if self_closing || VOID_TAGS.contains(&name.as_str()) {
                    let node = Node::Element {
                        name,
                        attributes,
                        children: Vec::new(),
                    };
                    current_children(&mut root, &mut open).push(node);
                } else if open.len() < MAX_DEPTH {
                    open.push(OpenElement {
                        name,
                        attributes,
                        children: Vec::new(),
                    });
                }
            }
            Token::Close(name) => {
                if let Some(depth) = open.iter().rposition(|e| e.name == name) {
                    while open.len() > depth {
                        close_innermost(&mut root, &mut open);
                    }
                }
            }
            Token::Comment => (),
        }
    }

    while !open.is_empty() {
        close_innermost(&mut root, &mut open);
    }
    root
}

fn current_children<'t>(root: &'t mut Vec<Node>, open: &'t mut [OpenElement]) -> &'t mut Vec<Node> {
    match open.last_mut() {
        Some(element) => &mut element.children,
        None => root,
    }
}

fn close_innermost(root: &mut Vec<Node>, open: &mut Vec<OpenElement>) {
    if let Some(element) = open.pop() {
        current_children(root, open).push(element.into_node());
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => escape_text(text, out),
        Node::Element {
            name,
            attributes,
            children,
        } if ALLOWED_TAGS.contains(&name.as_str()) => {
            out.push('<');
            out.push_str(name);
            for (key, value) in attributes {
                if ALLOWED_ATTRIBUTES.contains(&key.as_str()) {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    escape_attribute(value, out);
                    out.push('"');
                }
            }
            out.push('>');
            if VOID_TAGS.contains(&name.as_str()) {
                return;
            }
            for child in children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::Element { children, .. } => {
            let mut text = String::new();
            flatten(children, &mut text);
            escape_text(&text, out);
        }
    }
}

fn flatten(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element { children, .. } => flatten(children, out),
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{A0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{A0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn decode_references(text: &str) -> String {
    CHARACTER_REFERENCE
        .replace_all(text, |caps: &Captures| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
            } else {
                caps.get(3)
                    .or_else(|| caps.get(4))
                    .and_then(|name| named_reference(name.as_str()))
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{A0}'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_sanitise {
        ($($name:ident: $value:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let (input, expected) = $value;

                assert_eq!(sanitise(input), expected);
            }
        )*
        }
    }

    test_sanitise! {
        test_sanitise_plain: ("Just words", "Just words"),
        test_sanitise_allowed: ("<b>bold</b> <i>italic</i> <u>under</u>", "<b>bold</b> <i>italic</i> <u>under</u>"),
        test_sanitise_script: ("<script>alert(1)</script>ok<b>bold</b>", "alert(1)ok<b>bold</b>"),
        test_sanitise_font_attributes: ("<font color=\"#ff0000\" size=3 face='Arial'>red</font>", "<font color=\"#ff0000\" size=\"3\">red</font>"),
        test_sanitise_event_handler: ("<b onmouseover=\"steal()\">x</b>", "<b>x</b>"),
        test_sanitise_style: ("<font style=\"position:fixed\" color=red>x</font>", "<font color=\"red\">x</font>"),
        test_sanitise_nested_disallowed: ("<i>a <span class=\"c\">b <b>c</b></span> d</i>", "<i>a b c d</i>"),
        test_sanitise_disallowed_inside_allowed: ("<b><img src=x onerror=alert(1)>hi</b>", "<b>hi</b>"),
        test_sanitise_uppercase: ("<B>Loud</B><I>slanted</I>", "<b>Loud</b><i>slanted</i>"),
        test_sanitise_unclosed: ("<i>never closed", "<i>never closed</i>"),
        test_sanitise_stray_close: ("oops</b> there", "oops there"),
        test_sanitise_line_break: ("one<br>two<br/>three", "one<br>two<br>three"),
        test_sanitise_comment: ("a<!-- hidden -->b", "ab"),
        test_sanitise_lone_angle: ("1 < 2 and 3 > 2", "1 &lt; 2 and 3 &gt; 2"),
        test_sanitise_entities: ("Tom &amp; Jerry &lt;3 &copy;", "Tom &amp; Jerry &lt;3 &amp;copy;"),
        test_sanitise_encoded_tag_stays_text: ("&lt;script&gt;", "&lt;script&gt;"),
        test_sanitise_numeric_reference: ("caf&#233; &#x263A;", "café ☺"),
        test_sanitise_nbsp: ("a&nbsp;b", "a&nbsp;b"),
        test_sanitise_attribute_quote: ("<font color='a\"b'>x</font>", "<font color=\"a&quot;b\">x</font>"),
        test_sanitise_misnested: ("<b><i>x</b>y</i>", "<b><i>x</i></b>y"),
        test_sanitise_attributes_without_space: ("<font color=\"red\"size=\"2\">x</font>", "<font color=\"red\" size=\"2\">x</font>"),
        test_sanitise_references_without_semicolon: ("caf&#233 &amp Jerry &lt3 &#x41", "café &amp; Jerry &lt;3 A"),
        test_sanitise_unknown_reference_without_semicolon: ("&copy 2024", "&amp;copy 2024"),
    }

    #[test]
    fn deep_nesting_is_capped() {
        let input = format!("{}x", "<b>".repeat(100_000));

        let out = sanitise(&input);

        assert_eq!(out, format!("{}x{}", "<b>".repeat(MAX_DEPTH), "</b>".repeat(MAX_DEPTH)));
    }

    #[test]
    fn deep_disallowed_nesting_is_flattened() {
        let input = format!("{}secret{}ok", "<span>".repeat(200_000), "</span>".repeat(200_000));
        assert_eq!(sanitise(&input), "secretok");
    }

    #[test]
    fn closing_tags_past_the_cap_are_harmless() {
        let input = format!("{}a{}b", "<i>".repeat(MAX_DEPTH + 10), "</i>".repeat(MAX_DEPTH + 10));

        let out = sanitise(&input);

        assert_eq!(out, format!("{}a{}b", "<i>".repeat(MAX_DEPTH), "</i>".repeat(MAX_DEPTH)));
    }

    #[test]
    fn many_stray_end_tags_are_dropped() {
        let input = format!("<b>a</b>{}b", "</i></font>".repeat(50_000));
        assert_eq!(sanitise(&input), "<b>a</b>b");
    }

    #[test]
    fn script_is_removed() {
        let out = sanitise("<script>alert(1)</script>ok<b>bold</b>");
        assert!(!out.contains("<script"));
        assert!(out.contains("<b>bold</b>"));
    }

    #[test]
    fn tokenises_start_tag_attributes() {
        let tokens = tokenise("<font color=\"red\" size=2>");
        assert_eq!(
            tokens,
            vec![Token::Open {
                name: "font".to_string(),
                attributes: vec![
                    ("color".to_string(), "red".to_string()),
                    ("size".to_string(), "2".to_string()),
                ],
                self_closing: false,
            }]
        );
    }

    #[test]
    fn builds_tree_for_nested_markup() {
        let tree = build_tree(tokenise("<b>a<i>b</i></b>c"));
        assert_eq!(
            tree,
            vec![
                Node::Element {
                    name: "b".to_string(),
                    attributes: vec![],
                    children: vec![
                        Node::Text("a".to_string()),
                        Node::Element {
                            name: "i".to_string(),
                            attributes: vec![],
                            children: vec![Node::Text("b".to_string())],
                        },
                    ],
                },
                Node::Text("c".to_string()),
            ]
        );
    }
}
