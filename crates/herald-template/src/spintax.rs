// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Option-group ("spintax") parsing and resolution.
//!
//! `{a|b|c}` resolves to one option chosen uniformly at random. Groups may
//! nest: `{Hi|Hello {there|friend}}` first picks an outer option, then
//! resolves any group inside it.
//!
//! Braces that do not form a group are kept verbatim: an unmatched `{` or
//! `}`, an empty `{}`, and any `{{placeholder}}` left over from substitution.

use std::ops::Range;

use rand::Rng;

use crate::substitution::PLACEHOLDER;

/// A parsed template fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    /// One entry per option; each option is itself a sequence of nodes.
    Group(Vec<Vec<Node>>),
}

/// Parse `text` into a node sequence. Never fails.
pub fn parse(text: &str) -> Vec<Node> {
    Parser::new(text).parse_range(0..text.len())
}

/// Parse and resolve every group in one step.
pub fn resolve<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut out = String::with_capacity(text.len());
    render(&parse(text), rng, &mut out);
    out
}

/// Append a random resolution of `nodes` to `out`.
pub fn render<R: Rng + ?Sized>(nodes: &[Node], rng: &mut R, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(s) => out.push_str(s),
            Node::Group(options) => {
                let pick = rng.gen_range(0..options.len());
                render(&options[pick], rng, out);
            }
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    /// Byte index of the matching `}` for every `{` that opens a group.
    closer: Vec<Option<usize>>,
    /// Byte end of a verbatim `{{placeholder}}` starting at this index.
    verbatim_end: Vec<Option<usize>>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let len = text.len();
        let mut verbatim_end = vec![None; len];
        for m in PLACEHOLDER.find_iter(text) {
            verbatim_end[m.start()] = Some(m.end());
        }

        // Braces are ASCII, so byte positions are always char boundaries.
        let bytes = text.as_bytes();
        let mut closer = vec![None; len];
        let mut open = Vec::new();
        let mut i = 0;
        while i < len {
            if let Some(end) = verbatim_end[i] {
                i = end;
                continue;
            }
            match bytes[i] {
                b'{' => open.push(i),
                b'}' => {
                    if let Some(start) = open.pop()
                        && i > start + 1
                    {
                        closer[start] = Some(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            text,
            closer,
            verbatim_end,
        }
    }

    fn parse_range(&self, range: Range<usize>) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut run_start = range.start;
        let mut i = range.start;
        while i < range.end {
            if let Some(end) = self.verbatim_end[i] {
                i = end;
                continue;
            }
            let Some(close) = self.closer[i].filter(|c| *c < range.end) else {
                i += 1;
                continue;
            };
            if run_start < i {
                push_text(&mut nodes, &self.text[run_start..i]);
            }
            let options = self
                .split_options(i + 1..close)
                .into_iter()
                .map(|r| self.parse_range(r))
                .collect();
            nodes.push(Node::Group(options));
            i = close + 1;
            run_start = i;
        }
        if run_start < range.end {
            push_text(&mut nodes, &self.text[run_start..range.end]);
        }
        nodes
    }

    /// Split a group body on `|` that are not inside a nested group.
    fn split_options(&self, body: Range<usize>) -> Vec<Range<usize>> {
        let bytes = self.text.as_bytes();
        let mut options = Vec::new();
        let mut start = body.start;
        let mut i = body.start;
        while i < body.end {
            if let Some(end) = self.verbatim_end[i] {
                i = end;
            } else if let Some(close) = self.closer[i] {
                i = close + 1;
            } else {
                if bytes[i] == b'|' {
                    options.push(start..i);
                    start = i + 1;
                }
                i += 1;
            }
        }
        options.push(start..body.end);
        options
    }
}

fn push_text(nodes: &mut Vec<Node>, s: &str) {
    match nodes.last_mut() {
        Some(Node::Text(prev)) => prev.push_str(s),
        _ => nodes.push(Node::Text(s.to_string())),
    }
}
