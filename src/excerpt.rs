//! Annotated source excerpts for diagnostics.
//!
//! Given a span, renders up to `LINE_PAD` lines of context around it.
//! Single-line spans get a caret underline; multi-line spans get a `->`
//! gutter on the affected lines. File-based excerpts add right-aligned line
//! numbers sized to the widest number shown.

use std::fs;

use crate::token::Span;

pub const LINE_PAD: usize = 3;

pub fn from_file(filename: &str, loc: Span) -> String {
    match fs::read_to_string(filename) {
        Ok(source) => render(&source, loc, true),
        Err(_) => String::new(),
    }
}

pub fn from_str(source: &str, loc: Span) -> String {
    render(source, loc, false)
}

struct SnippetInfo {
    first: usize,
    last: usize,
    hl_start: usize,
    col_start: usize,
    hl_end: usize,
    col_end: usize,
}

fn render(source: &str, loc: Span, line_nums: bool) -> String {
    let (code, info) = snippet(source, loc);
    let (mut code, skip) = highlight_location(code, &info);
    if line_nums {
        code = line_numbers(code, &info, skip);
    }
    code.join("\n")
}

fn snippet(source: &str, loc: Span) -> (Vec<String>, SnippetInfo) {
    let first = loc.start_line.saturating_sub(LINE_PAD).max(1);
    let end = loc.end_line + LINE_PAD - 1;
    let mut out = Vec::new();
    let mut line = 0;
    for text in source.lines() {
        if line > end {
            break;
        }
        line += 1;
        if line >= first {
            out.push(text.to_string());
        }
    }
    let info = SnippetInfo {
        first,
        last: line,
        hl_start: loc.start_line.saturating_sub(first),
        col_start: loc.start_col,
        hl_end: loc.end_line.saturating_sub(first),
        col_end: loc.end_col,
    };
    (out, info)
}

fn highlight_location(mut code: Vec<String>, info: &SnippetInfo) -> (Vec<String>, Option<usize>) {
    if info.hl_start == info.hl_end {
        let width = 1 + info.col_end.saturating_sub(info.col_start);
        let underline = left_pad(&"^".repeat(width), info.col_end);
        let at = (info.hl_start + 1).min(code.len());
        code.insert(at, underline);
        return (code, Some(at));
    }
    for (i, text) in code.iter_mut().enumerate() {
        if i >= info.hl_start && i <= info.hl_end {
            *text = format!("->{text}");
        } else if !text.is_empty() {
            *text = format!("  {text}");
        }
    }
    (code, None)
}

fn line_numbers(code: Vec<String>, info: &SnippetInfo, skip: Option<usize>) -> Vec<String> {
    let width = digits(info.last);
    code.into_iter()
        .enumerate()
        .map(|(i, text)| {
            if skip == Some(i) {
                return format!("{}{text}", " ".repeat(width + 2));
            }
            let mut num = i + info.first;
            if let Some(skip) = skip {
                if i > skip {
                    num -= 1;
                }
            }
            if text.is_empty() {
                left_pad(&num.to_string(), width)
            } else {
                format!("{}  {text}", left_pad(&num.to_string(), width))
            }
        })
        .collect()
}

fn left_pad(text: &str, width: usize) -> String {
    if text.len() >= width {
        return text.to_string();
    }
    format!("{}{text}", " ".repeat(width - text.len()))
}

fn digits(mut n: usize) -> usize {
    let mut count = 0;
    while n > 0 {
        n /= 10;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "a = 0\n\na = 1\n\nfunc test(param)\n  print(param)\nend\n\na = 42\n\n";

    fn span(sl: usize, sc: usize, el: usize, ec: usize) -> Span {
        Span {
            start_line: sl,
            start_col: sc,
            end_line: el,
            end_col: ec,
        }
    }

    #[test]
    fn underlines_single_line_span() {
        let expected = "a = 1\n\nfunc test(param)\n  print(param)\n  ^^^^^^^^^^^^\nend\n\na = 42";
        assert_eq!(from_str(SOURCE, span(6, 3, 6, 14)), expected);
    }

    #[test]
    fn marks_multi_line_span_with_gutter() {
        let expected =
            "\n  a = 1\n\n->func test(param)\n->  print(param)\n->end\n\n  a = 42\n";
        assert_eq!(from_str(SOURCE, span(5, 3, 7, 14)), expected);
    }

    #[test]
    fn numbers_lines_for_single_line_span() {
        let expected = "3  a = 1\n4\n5  func test(param)\n6    print(param)\n     ^^^^^^^^^^^^\n7  end\n8\n9  a = 42";
        assert_eq!(render(SOURCE, span(6, 3, 6, 14), true), expected);
    }

    #[test]
    fn numbers_lines_for_multi_line_span() {
        let expected = " 2\n 3    a = 1\n 4\n 5  ->func test(param)\n 6  ->  print(param)\n 7  ->end\n 8\n 9    a = 42\n10";
        assert_eq!(render(SOURCE, span(5, 3, 7, 14), true), expected);
    }

    #[test]
    fn clamps_context_at_start_of_source() {
        let out = from_str("x = 1\ny = 2\n", span(1, 1, 1, 5));
        assert_eq!(out, "x = 1\n^^^^^\ny = 2");
    }
}
