//! Recursive-descent parser for the ECMAScript regex dialect.
//!
//! Produces the arena AST of [`super::types`]. Capture groups are counted in
//! a prescan so that forward backreferences (`/\1(a)/`) resolve; the actual
//! resolution is patched in after the main parse.
//!
//! Annex-B leniencies are implemented where real-world patterns need them
//! (literal `{`/`}`/`]`, legacy octal escapes, `\k` without named groups,
//! quantified lookaheads). The `v` flag (unicode-sets mode) is not supported.

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::types::{
    AssertionKind, CharSetKind, ClassMember, Flags, Node, NodeId, NodeKind, PatternAst, Span,
};
use crate::chars::property_class;

/// Error for syntactically invalid pattern text or flags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid flags: {0}")]
    InvalidFlags(String),
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
}

/// Parses a flag string such as `"imu"`.
pub fn parse_flags(raw: &str) -> Result<Flags, ParseError> {
    let mut flags = Flags {
        raw: raw.to_string(),
        ..Flags::default()
    };
    for ch in raw.chars() {
        let target = match ch {
            'd' => &mut flags.has_indices,
            'g' => &mut flags.global,
            'i' => &mut flags.ignore_case,
            'm' => &mut flags.multiline,
            's' => &mut flags.dot_all,
            'u' => &mut flags.unicode,
            'y' => &mut flags.sticky,
            'v' => {
                return Err(ParseError::InvalidFlags(
                    "the v flag is not supported".to_string(),
                ))
            }
            _ => return Err(ParseError::InvalidFlags(format!("unknown flag '{ch}'"))),
        };
        if *target {
            return Err(ParseError::InvalidFlags(format!("duplicate flag '{ch}'")));
        }
        *target = true;
    }
    Ok(flags)
}

/// Parses pattern source text into an arena AST.
pub fn parse_pattern(source: &str, flags: &Flags) -> Result<PatternAst, ParseError> {
    Parser::new(source, flags).parse()
}

/// How an atom may be quantified.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Quantifiable {
    Always,
    /// Lookaheads: quantifiable only without the `u` flag.
    NonUnicodeOnly,
    Never,
}

enum BackrefTarget {
    Index(u32),
    Name(String),
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    byte_of: Vec<usize>,
    pos: usize,
    flags: &'a Flags,
    nodes: Vec<Node>,
    capture_count: u32,
    has_named_groups: bool,
    next_capture: u32,
    groups_by_index: Vec<Option<NodeId>>,
    groups_by_name: FxHashMap<String, NodeId>,
    pending_refs: Vec<(NodeId, usize, BackrefTarget)>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, flags: &'a Flags) -> Self {
        let mut chars = Vec::new();
        let mut byte_of = Vec::new();
        for (idx, ch) in source.char_indices() {
            chars.push(ch);
            byte_of.push(idx);
        }
        byte_of.push(source.len());
        let (capture_count, has_named_groups) = prescan(&chars);
        Parser {
            source,
            chars,
            byte_of,
            pos: 0,
            flags,
            nodes: Vec::new(),
            capture_count,
            has_named_groups,
            next_capture: 0,
            groups_by_index: vec![None; capture_count as usize + 1],
            groups_by_name: FxHashMap::default(),
            pending_refs: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<PatternAst, ParseError> {
        let root = self.alloc(None);
        let alternatives = self.parse_disjunction(root)?;
        if !self.at_end() {
            return Err(self.err("unmatched ')'"));
        }
        let end = self.offset();
        self.finish(root, NodeKind::Pattern { alternatives }, 0, end);
        self.resolve_backreferences()?;
        Ok(PatternAst {
            source: self.source.to_string(),
            nodes: self.nodes,
            root,
        })
    }

    // ---- node arena ----

    fn alloc(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            // Placeholder; overwritten by `finish`.
            kind: NodeKind::Alternative { elements: Vec::new() },
            parent,
            span: Span { start: 0, end: 0 },
        });
        id
    }

    fn finish(&mut self, id: NodeId, kind: NodeKind, start: u32, end: u32) {
        let node = &mut self.nodes[id.index()];
        node.kind = kind;
        node.span = Span { start, end };
    }

    // ---- cursor ----

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn offset(&self) -> u32 {
        self.byte_of[self.pos] as u32
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            offset: self.byte_of[self.pos.min(self.chars.len())],
            message: message.into(),
        }
    }

    // ---- grammar ----

    fn parse_disjunction(&mut self, parent: NodeId) -> Result<Vec<NodeId>, ParseError> {
        let mut alternatives = vec![self.parse_alternative(parent)?];
        while self.eat('|') {
            alternatives.push(self.parse_alternative(parent)?);
        }
        Ok(alternatives)
    }

    fn parse_alternative(&mut self, parent: NodeId) -> Result<NodeId, ParseError> {
        let alt = self.alloc(Some(parent));
        let start = self.offset();
        let mut elements = Vec::new();
        while let Some(ch) = self.peek() {
            if ch == '|' || ch == ')' {
                break;
            }
            elements.push(self.parse_term(alt)?);
        }
        let end = self.offset();
        self.finish(alt, NodeKind::Alternative { elements }, start, end);
        Ok(alt)
    }

    fn parse_term(&mut self, parent: NodeId) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let (atom, quantifiable) = self.parse_atom(parent)?;
        if let Some((min, max, greedy)) = self.try_parse_quantifier()? {
            match quantifiable {
                Quantifiable::Always => {}
                Quantifiable::NonUnicodeOnly if !self.flags.unicode => {}
                _ => return Err(self.err("nothing to repeat")),
            }
            let quant = self.alloc(Some(parent));
            self.nodes[atom.index()].parent = Some(quant);
            let end = self.offset();
            self.finish(
                quant,
                NodeKind::Quantifier {
                    min,
                    max,
                    greedy,
                    element: atom,
                },
                start,
                end,
            );
            return Ok(quant);
        }
        Ok(atom)
    }

    /// Parses `* + ? {n} {n,} {n,m}` with an optional lazy `?`.
    ///
    /// A malformed `{..}` is a quantifier-shaped error only with the `u`
    /// flag; otherwise the brace is left for the caller as a literal.
    fn try_parse_quantifier(&mut self) -> Result<Option<(u32, Option<u32>, bool)>, ParseError> {
        let (min, max) = match self.peek() {
            Some('*') => {
                self.pos += 1;
                (0, None)
            }
            Some('+') => {
                self.pos += 1;
                (1, None)
            }
            Some('?') => {
                self.pos += 1;
                (0, Some(1))
            }
            Some('{') => {
                let saved = self.pos;
                match self.parse_braced_quantifier() {
                    Some(bounds) => bounds,
                    None => {
                        self.pos = saved;
                        if self.flags.unicode {
                            return Err(self.err("incomplete quantifier"));
                        }
                        return Ok(None);
                    }
                }
            }
            _ => return Ok(None),
        };
        if let Some(max) = max {
            if min > max {
                return Err(self.err("numbers out of order in {} quantifier"));
            }
        }
        let greedy = !self.eat('?');
        Ok(Some((min, max, greedy)))
    }

    fn parse_braced_quantifier(&mut self) -> Option<(u32, Option<u32>)> {
        debug_assert_eq!(self.peek(), Some('{'));
        self.pos += 1;
        let min = self.parse_decimal()?;
        if self.eat('}') {
            return Some((min, Some(min)));
        }
        if !self.eat(',') {
            return None;
        }
        if self.eat('}') {
            return Some((min, None));
        }
        let max = self.parse_decimal()?;
        if self.eat('}') {
            return Some((min, Some(max)));
        }
        None
    }

    fn parse_decimal(&mut self) -> Option<u32> {
        let mut value: u64 = 0;
        let mut digits = 0;
        while let Some(ch) = self.peek() {
            let Some(digit) = ch.to_digit(10) else { break };
            self.pos += 1;
            digits += 1;
            value = (value * 10 + u64::from(digit)).min(u64::from(u32::MAX));
        }
        if digits == 0 {
            None
        } else {
            Some(value as u32)
        }
    }

    fn parse_atom(&mut self, parent: NodeId) -> Result<(NodeId, Quantifiable), ParseError> {
        let start = self.offset();
        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Err(self.err("unexpected end of pattern")),
        };
        match ch {
            '^' | '$' => {
                self.pos += 1;
                let kind = if ch == '^' {
                    AssertionKind::Start
                } else {
                    AssertionKind::End
                };
                let id = self.alloc(Some(parent));
                let end = self.offset();
                self.finish(id, NodeKind::Assertion { kind }, start, end);
                Ok((id, Quantifiable::Never))
            }
            '(' => self.parse_group(parent),
            '[' => {
                let id = self.parse_character_class(parent)?;
                Ok((id, Quantifiable::Always))
            }
            '\\' => self.parse_escape(parent),
            '.' => {
                self.pos += 1;
                let id = self.alloc(Some(parent));
                let end = self.offset();
                self.finish(
                    id,
                    NodeKind::CharacterSet {
                        kind: CharSetKind::Dot,
                        negate: false,
                    },
                    start,
                    end,
                );
                Ok((id, Quantifiable::Always))
            }
            '*' | '+' | '?' => Err(self.err("nothing to repeat")),
            '{' => {
                let saved = self.pos;
                if self.parse_braced_quantifier().is_some() {
                    self.pos = saved;
                    return Err(self.err("nothing to repeat"));
                }
                self.pos = saved;
                if self.flags.unicode {
                    return Err(self.err("lone quantifier brackets"));
                }
                Ok((self.literal_character(parent)?, Quantifiable::Always))
            }
            ']' | '}' => {
                if self.flags.unicode {
                    return Err(self.err("lone quantifier brackets"));
                }
                Ok((self.literal_character(parent)?, Quantifiable::Always))
            }
            _ => Ok((self.literal_character(parent)?, Quantifiable::Always)),
        }
    }

    fn literal_character(&mut self, parent: NodeId) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let ch = self.bump().ok_or_else(|| self.err("unexpected end"))?;
        let id = self.alloc(Some(parent));
        let end = self.offset();
        self.finish(
            id,
            NodeKind::Character { value: ch as u32 },
            start,
            end,
        );
        Ok(id)
    }

    fn parse_group(&mut self, parent: NodeId) -> Result<(NodeId, Quantifiable), ParseError> {
        let start = self.offset();
        debug_assert_eq!(self.peek(), Some('('));
        self.pos += 1;

        enum Head {
            Capture(Option<String>),
            NonCapture,
            Lookahead(bool),
            Lookbehind(bool),
        }

        let head = if self.eat('?') {
            match self.peek() {
                Some(':') => {
                    self.pos += 1;
                    Head::NonCapture
                }
                Some('=') => {
                    self.pos += 1;
                    Head::Lookahead(false)
                }
                Some('!') => {
                    self.pos += 1;
                    Head::Lookahead(true)
                }
                Some('<') => match self.peek_at(1) {
                    Some('=') => {
                        self.pos += 2;
                        Head::Lookbehind(false)
                    }
                    Some('!') => {
                        self.pos += 2;
                        Head::Lookbehind(true)
                    }
                    _ => {
                        self.pos += 1;
                        let name = self.parse_group_name()?;
                        Head::Capture(Some(name))
                    }
                },
                _ => return Err(self.err("invalid group")),
            }
        } else {
            Head::Capture(None)
        };

        let id = self.alloc(Some(parent));
        if let Head::Capture(name) = &head {
            self.next_capture += 1;
            self.groups_by_index[self.next_capture as usize] = Some(id);
            if let Some(name) = name {
                if self.groups_by_name.insert(name.clone(), id).is_some() {
                    return Err(self.err(format!("duplicate capture group name '{name}'")));
                }
            }
        }

        let alternatives = self.parse_disjunction(id)?;
        if !self.eat(')') {
            return Err(self.err("unterminated group"));
        }
        let end = self.offset();

        let (kind, quantifiable) = match head {
            Head::Capture(name) => (
                NodeKind::Group {
                    capturing: true,
                    name,
                    alternatives,
                },
                Quantifiable::Always,
            ),
            Head::NonCapture => (
                NodeKind::Group {
                    capturing: false,
                    name: None,
                    alternatives,
                },
                Quantifiable::Always,
            ),
            Head::Lookahead(negate) => (
                NodeKind::Assertion {
                    kind: AssertionKind::Lookahead {
                        negate,
                        alternatives,
                    },
                },
                Quantifiable::NonUnicodeOnly,
            ),
            Head::Lookbehind(negate) => (
                NodeKind::Assertion {
                    kind: AssertionKind::Lookbehind {
                        negate,
                        alternatives,
                    },
                },
                Quantifiable::Never,
            ),
        };
        self.finish(id, kind, start, end);
        Ok((id, quantifiable))
    }

    fn parse_group_name(&mut self) -> Result<String, ParseError> {
        let mut name = String::new();
        match self.peek() {
            Some(ch) if ch == '_' || ch == '$' || ch.is_alphabetic() => {
                name.push(ch);
                self.pos += 1;
            }
            _ => return Err(self.err("invalid capture group name")),
        }
        while let Some(ch) = self.peek() {
            if ch == '_' || ch == '$' || ch.is_alphanumeric() {
                name.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }
        if !self.eat('>') {
            return Err(self.err("invalid capture group name"));
        }
        Ok(name)
    }

    // ---- escapes ----

    fn parse_escape(&mut self, parent: NodeId) -> Result<(NodeId, Quantifiable), ParseError> {
        let start = self.offset();
        debug_assert_eq!(self.peek(), Some('\\'));
        self.pos += 1;
        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Err(self.err("\\ at end of pattern")),
        };

        let character = |p: &mut Self, value: u32| -> Result<(NodeId, Quantifiable), ParseError> {
            let id = p.alloc(Some(parent));
            let end = p.offset();
            p.finish(id, NodeKind::Character { value }, start, end);
            Ok((id, Quantifiable::Always))
        };

        match ch {
            'b' | 'B' => {
                self.pos += 1;
                let id = self.alloc(Some(parent));
                let end = self.offset();
                self.finish(
                    id,
                    NodeKind::Assertion {
                        kind: AssertionKind::Word { negate: ch == 'B' },
                    },
                    start,
                    end,
                );
                Ok((id, Quantifiable::Never))
            }
            'd' | 'D' | 's' | 'S' | 'w' | 'W' => {
                self.pos += 1;
                let kind = match ch.to_ascii_lowercase() {
                    'd' => CharSetKind::Digit,
                    's' => CharSetKind::Space,
                    _ => CharSetKind::Word,
                };
                let id = self.alloc(Some(parent));
                let end = self.offset();
                self.finish(
                    id,
                    NodeKind::CharacterSet {
                        kind,
                        negate: ch.is_ascii_uppercase(),
                    },
                    start,
                    end,
                );
                Ok((id, Quantifiable::Always))
            }
            'p' | 'P' if self.flags.unicode => {
                self.pos += 1;
                let kind = self.parse_property()?;
                let id = self.alloc(Some(parent));
                let end = self.offset();
                self.finish(
                    id,
                    NodeKind::CharacterSet {
                        kind,
                        negate: ch == 'P',
                    },
                    start,
                    end,
                );
                Ok((id, Quantifiable::Always))
            }
            '1'..='9' => {
                let saved = self.pos;
                let number = self
                    .parse_decimal()
                    .unwrap_or_else(|| unreachable!("peeked a digit"));
                if number <= self.capture_count {
                    let id = self.alloc(Some(parent));
                    let end = self.offset();
                    self.finish(
                        id,
                        NodeKind::Backreference {
                            resolved: NodeId(u32::MAX),
                        },
                        start,
                        end,
                    );
                    self.pending_refs
                        .push((id, start as usize, BackrefTarget::Index(number)));
                    Ok((id, Quantifiable::Always))
                } else if self.flags.unicode {
                    Err(self.err("invalid backreference"))
                } else {
                    // Annex B: legacy octal / identity digit escape.
                    self.pos = saved;
                    let value = self.parse_legacy_octal();
                    character(self, value)
                }
            }
            'k' => {
                self.pos += 1;
                if !self.has_named_groups && !self.flags.unicode {
                    // Annex B: \k without named groups is an identity escape.
                    return character(self, 'k' as u32);
                }
                if !self.eat('<') {
                    return Err(self.err("invalid named reference"));
                }
                let mut name = String::new();
                while let Some(ch) = self.peek() {
                    if ch == '>' {
                        break;
                    }
                    name.push(ch);
                    self.pos += 1;
                }
                if !self.eat('>') || name.is_empty() {
                    return Err(self.err("invalid named reference"));
                }
                let id = self.alloc(Some(parent));
                let end = self.offset();
                self.finish(
                    id,
                    NodeKind::Backreference {
                        resolved: NodeId(u32::MAX),
                    },
                    start,
                    end,
                );
                self.pending_refs
                    .push((id, start as usize, BackrefTarget::Name(name)));
                Ok((id, Quantifiable::Always))
            }
            _ => {
                let value = self.parse_character_escape()?;
                character(self, value)
            }
        }
    }

    fn parse_property(&mut self) -> Result<CharSetKind, ParseError> {
        if !self.eat('{') {
            return Err(self.err("invalid property escape"));
        }
        let mut name = String::new();
        let mut value = None;
        loop {
            match self.bump() {
                Some('}') => break,
                Some('=') if value.is_none() => value = Some(String::new()),
                Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' => match &mut value {
                    Some(value) => value.push(ch),
                    None => name.push(ch),
                },
                _ => return Err(self.err("invalid property escape")),
            }
        }
        if property_class(&name, value.as_deref()).is_none() {
            return Err(self.err(format!("unknown property '{name}'")));
        }
        Ok(CharSetKind::Property { name, value })
    }

    /// Character escapes valid both inside and outside classes. The leading
    /// `\` has been consumed; the cursor is on the escape character.
    fn parse_character_escape(&mut self) -> Result<u32, ParseError> {
        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Err(self.err("\\ at end of pattern")),
        };
        match ch {
            'f' => {
                self.pos += 1;
                Ok(0x0C)
            }
            'n' => {
                self.pos += 1;
                Ok(0x0A)
            }
            'r' => {
                self.pos += 1;
                Ok(0x0D)
            }
            't' => {
                self.pos += 1;
                Ok(0x09)
            }
            'v' => {
                self.pos += 1;
                Ok(0x0B)
            }
            'c' => {
                match self.peek_at(1) {
                    Some(control) if control.is_ascii_alphabetic() => {
                        self.pos += 2;
                        Ok((control as u32) % 32)
                    }
                    _ => Err(self.err("invalid control escape")),
                }
            }
            '0'..='9' => {
                if self.flags.unicode && ch != '0' {
                    return Err(self.err("invalid escape"));
                }
                if ch == '0' && !matches!(self.peek_at(1), Some('0'..='9')) {
                    self.pos += 1;
                    return Ok(0);
                }
                if self.flags.unicode {
                    return Err(self.err("invalid escape"));
                }
                Ok(self.parse_legacy_octal())
            }
            'x' => {
                self.pos += 1;
                match self.parse_hex(2) {
                    Some(value) => Ok(value),
                    None if self.flags.unicode => Err(self.err("invalid escape")),
                    None => Ok('x' as u32),
                }
            }
            'u' => {
                self.pos += 1;
                self.parse_unicode_escape()
            }
            _ => {
                if self.flags.unicode && !r"^$\.*+?()[]{}|/-".contains(ch) {
                    return Err(self.err("invalid escape"));
                }
                self.pos += 1;
                Ok(ch as u32)
            }
        }
    }

    /// Annex B legacy octal: up to three octal digits, value at most 0xFF;
    /// a leading 8 or 9 falls back to an identity digit escape.
    fn parse_legacy_octal(&mut self) -> u32 {
        let first = match self.peek() {
            Some(ch @ '0'..='7') => ch,
            Some(ch) => {
                self.pos += 1;
                return ch as u32;
            }
            None => return 0,
        };
        self.pos += 1;
        let mut value = first as u32 - '0' as u32;
        for _ in 0..2 {
            match self.peek() {
                Some(ch @ '0'..='7') if value * 8 + (ch as u32 - '0' as u32) <= 0xFF => {
                    value = value * 8 + (ch as u32 - '0' as u32);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        value
    }

    fn parse_hex(&mut self, digits: usize) -> Option<u32> {
        let mut value = 0;
        for ahead in 0..digits {
            let digit = self.peek_at(ahead)?.to_digit(16)?;
            value = value * 16 + digit;
        }
        self.pos += digits;
        Some(value)
    }

    fn parse_unicode_escape(&mut self) -> Result<u32, ParseError> {
        if self.flags.unicode && self.eat('{') {
            let mut value: u32 = 0;
            let mut digits = 0;
            while let Some(digit) = self.peek().and_then(|ch| ch.to_digit(16)) {
                self.pos += 1;
                digits += 1;
                value = value.saturating_mul(16).saturating_add(digit);
                if value > 0x10FFFF {
                    return Err(self.err("invalid unicode escape"));
                }
            }
            if digits == 0 || !self.eat('}') {
                return Err(self.err("invalid unicode escape"));
            }
            return Ok(value);
        }
        let Some(value) = self.parse_hex(4) else {
            if self.flags.unicode {
                return Err(self.err("invalid unicode escape"));
            }
            return Ok('u' as u32);
        };
        // Combine a surrogate pair in unicode mode.
        if self.flags.unicode && (0xD800..=0xDBFF).contains(&value) {
            let saved = self.pos;
            if self.eat('\\') && self.eat('u') {
                if let Some(trail) = self.parse_hex(4) {
                    if (0xDC00..=0xDFFF).contains(&trail) {
                        return Ok(0x10000 + ((value - 0xD800) << 10) + (trail - 0xDC00));
                    }
                }
            }
            self.pos = saved;
        }
        Ok(value)
    }

    // ---- character classes ----

    fn parse_character_class(&mut self, parent: NodeId) -> Result<NodeId, ParseError> {
        let start = self.offset();
        debug_assert_eq!(self.peek(), Some('['));
        self.pos += 1;
        let negate = self.eat('^');
        let mut members = Vec::new();

        loop {
            if self.eat(']') {
                break;
            }
            if self.at_end() {
                return Err(self.err("unterminated character class"));
            }
            let first = self.parse_class_atom()?;
            // `x-y` is a range unless `-` is the last class character.
            if self.peek() == Some('-') && !matches!(self.peek_at(1), Some(']') | None) {
                self.pos += 1;
                let second = self.parse_class_atom()?;
                match (&first, &second) {
                    (ClassMember::Single(lo), ClassMember::Single(hi)) => {
                        if lo > hi {
                            return Err(self.err("range out of order in character class"));
                        }
                        members.push(ClassMember::Range(*lo, *hi));
                    }
                    _ => {
                        if self.flags.unicode {
                            return Err(self.err("invalid character class"));
                        }
                        // Annex B: `[\d-x]` is the set, a literal `-` and `x`.
                        members.push(first);
                        members.push(ClassMember::Single('-' as u32));
                        members.push(second);
                    }
                }
            } else {
                members.push(first);
            }
        }
        let id = self.alloc(Some(parent));
        let end = self.offset();
        self.finish(
            id,
            NodeKind::CharacterClass { negate, members },
            start,
            end,
        );
        Ok(id)
    }

    fn parse_class_atom(&mut self) -> Result<ClassMember, ParseError> {
        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Err(self.err("unterminated character class")),
        };
        if ch != '\\' {
            self.pos += 1;
            return Ok(ClassMember::Single(ch as u32));
        }
        self.pos += 1;
        let escaped = match self.peek() {
            Some(ch) => ch,
            None => return Err(self.err("\\ at end of pattern")),
        };
        match escaped {
            'b' => {
                self.pos += 1;
                Ok(ClassMember::Single(0x08))
            }
            'd' | 'D' | 's' | 'S' | 'w' | 'W' => {
                self.pos += 1;
                let kind = match escaped.to_ascii_lowercase() {
                    'd' => CharSetKind::Digit,
                    's' => CharSetKind::Space,
                    _ => CharSetKind::Word,
                };
                Ok(ClassMember::Set {
                    kind,
                    negate: escaped.is_ascii_uppercase(),
                })
            }
            'p' | 'P' if self.flags.unicode => {
                self.pos += 1;
                let kind = self.parse_property()?;
                Ok(ClassMember::Set {
                    kind,
                    negate: escaped == 'P',
                })
            }
            _ => Ok(ClassMember::Single(self.parse_character_escape()?)),
        }
    }

    // ---- backreference resolution ----

    fn resolve_backreferences(&mut self) -> Result<(), ParseError> {
        let pending = std::mem::take(&mut self.pending_refs);
        for (id, offset, target) in pending {
            let group = match &target {
                BackrefTarget::Index(number) => self.groups_by_index[*number as usize],
                BackrefTarget::Name(name) => self.groups_by_name.get(name).copied(),
            };
            let Some(group) = group else {
                return Err(ParseError::Syntax {
                    offset,
                    message: "invalid named reference".to_string(),
                });
            };
            self.nodes[id.index()].kind = NodeKind::Backreference { resolved: group };
        }
        Ok(())
    }
}

/// Counts capture groups and detects named groups without parsing, so that
/// forward backreferences can be classified during the main parse.
fn prescan(chars: &[char]) -> (u32, bool) {
    let mut count = 0;
    let mut has_named = false;
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            ']' if in_class => in_class = false,
            '[' if !in_class => in_class = true,
            '(' if !in_class => {
                if chars.get(i + 1) != Some(&'?') {
                    count += 1;
                } else if chars.get(i + 2) == Some(&'<')
                    && !matches!(chars.get(i + 3), Some('=') | Some('!'))
                {
                    count += 1;
                    has_named = true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    (count, has_named)
}
