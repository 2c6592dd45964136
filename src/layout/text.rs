use crate::text_metrics::WidthEstimator;

use super::{Script, TextBlock, TextLine, TextRun};

/// Parses and measures a level label at `font_size`.
///
/// Script runs are measured at `font_size * script_scale`; the block is as
/// wide as its widest line.
pub(crate) fn measure_label(
    text: &str,
    font_size: f32,
    script_scale: f32,
    estimator: &dyn WidthEstimator,
) -> TextBlock {
    let lines: Vec<TextLine> = split_lines(text)
        .iter()
        .map(|line| {
            let runs = parse_markup(line);
            let width = runs
                .iter()
                .map(|run| {
                    let size = match run.script {
                        Script::Normal => font_size,
                        Script::Sub | Script::Super => font_size * script_scale,
                    };
                    estimator.measure(&run.text, size)
                })
                .sum();
            TextLine { runs, width }
        })
        .collect();
    let width = lines.iter().map(|line| line.width).fold(0.0, f32::max);

    TextBlock {
        lines,
        width,
        font_size,
    }
}

pub(super) fn split_lines(text: &str) -> Vec<String> {
    text.replace("\\n", "\n")
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

/// Splits one line of mathtext-style markup into runs.
///
/// Outside `$...$` everything is literal except `\$`. Inside, `_`/`^` take a
/// single character, a command, or a braced group as their argument.
pub(super) fn parse_markup(line: &str) -> Vec<TextRun> {
    let chars: Vec<char> = line.chars().collect();
    let mut runs = Vec::new();
    let mut in_math = false;
    let mut idx = 0;

    while idx < chars.len() {
        let ch = chars[idx];
        match ch {
            '\\' if chars.get(idx + 1) == Some(&'$') => {
                push_text(&mut runs, "$", Script::Normal);
                idx += 2;
            }
            '$' => {
                in_math = !in_math;
                idx += 1;
            }
            '\\' if in_math => {
                let (text, next) = read_command(&chars, idx);
                push_text(&mut runs, &text, Script::Normal);
                idx = next;
            }
            '_' | '^' if in_math => {
                let script = if ch == '_' { Script::Sub } else { Script::Super };
                let (text, next) = read_script_argument(&chars, idx + 1);
                push_text(&mut runs, &text, script);
                idx = next;
            }
            '{' | '}' if in_math => idx += 1,
            _ => {
                push_text(&mut runs, ch.encode_utf8(&mut [0; 4]), Script::Normal);
                idx += 1;
            }
        }
    }

    runs
}

fn push_text(runs: &mut Vec<TextRun>, text: &str, script: Script) {
    if text.is_empty() {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.script == script => last.text.push_str(text),
        _ => runs.push(TextRun {
            text: text.to_string(),
            script,
        }),
    }
}

/// Reads `\name` starting at the backslash; returns its glyph and the next index.
fn read_command(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start + 1;
    while end < chars.len() && chars[end].is_ascii_alphabetic() {
        end += 1;
    }
    if end == start + 1 {
        // Escaped punctuation such as `\{`.
        return match chars.get(start + 1) {
            Some(ch) => (ch.to_string(), start + 2),
            None => (String::new(), start + 1),
        };
    }
    let name: String = chars[start + 1..end].iter().collect();
    let text = symbol(&name).map(str::to_string).unwrap_or(name);
    (text, end)
}

fn read_script_argument(chars: &[char], start: usize) -> (String, usize) {
    match chars.get(start) {
        Some('{') => {
            let mut depth = 0usize;
            let mut text = String::new();
            let mut idx = start;
            while idx < chars.len() {
                match chars[idx] {
                    '{' => {
                        depth += 1;
                        idx += 1;
                    }
                    '}' => {
                        depth -= 1;
                        idx += 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    '\\' => {
                        let (glyph, next) = read_command(chars, idx);
                        text.push_str(&glyph);
                        idx = next;
                    }
                    ch => {
                        text.push(ch);
                        idx += 1;
                    }
                }
            }
            (text, idx)
        }
        Some('\\') => read_command(chars, start),
        Some(ch) => (ch.to_string(), start + 1),
        None => (String::new(), start),
    }
}

fn symbol(name: &str) -> Option<&'static str> {
    let glyph = match name {
        "Delta" => "\u{0394}",
        "alpha" => "\u{03B1}",
        "beta" => "\u{03B2}",
        "gamma" => "\u{03B3}",
        "delta" => "\u{03B4}",
        "mu" => "\u{03BC}",
        "pi" => "\u{03C0}",
        "dagger" => "\u{2020}",
        "ddagger" => "\u{2021}",
        "cdot" => "\u{00B7}",
        "pm" => "\u{00B1}",
        "rightarrow" | "to" => "\u{2192}",
        "leftrightarrow" => "\u{2194}",
        _ => return None,
    };
    Some(glyph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_metrics::CharWidthEstimator;

    fn run(text: &str, script: Script) -> TextRun {
        TextRun {
            text: text.to_string(),
            script,
        }
    }

    #[test]
    fn split_lines_handles_escaped_and_real_newlines() {
        assert_eq!(split_lines("a\\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("  hello  \n  world  "), vec!["hello", "world"]);
    }

    #[test]
    fn plain_text_is_a_single_run() {
        assert_eq!(parse_markup("product 1"), vec![run("product 1", Script::Normal)]);
    }

    #[test]
    fn scripts_inside_math() {
        assert_eq!(
            parse_markup("$[ZX_2]_5^{+}$"),
            vec![
                run("[ZX", Script::Normal),
                run("2", Script::Sub),
                run("]", Script::Normal),
                run("5", Script::Sub),
                run("+", Script::Super),
            ]
        );
    }

    #[test]
    fn scripts_outside_math_are_literal() {
        assert_eq!(parse_markup("H_2O"), vec![run("H_2O", Script::Normal)]);
    }

    #[test]
    fn commands_resolve_to_glyphs() {
        assert_eq!(
            parse_markup("$\\Delta$E"),
            vec![run("\u{0394}E", Script::Normal)]
        );
        assert_eq!(
            parse_markup("TS$^\\ddagger$"),
            vec![run("TS", Script::Normal), run("\u{2021}", Script::Super)]
        );
        assert_eq!(parse_markup("$\\unknown$"), vec![run("unknown", Script::Normal)]);
    }

    #[test]
    fn escaped_dollar_is_literal() {
        assert_eq!(parse_markup("\\$5"), vec![run("$5", Script::Normal)]);
    }

    #[test]
    fn scripts_measure_smaller() {
        let plain = measure_label("AB2", 10.0, 0.7, &CharWidthEstimator);
        let scripted = measure_label("$AB_2$", 10.0, 0.7, &CharWidthEstimator);
        assert!(scripted.width < plain.width);
        assert!(scripted.width > 0.0);
    }

    #[test]
    fn multi_line_label_uses_widest_line() {
        let block = measure_label("short\\na considerably longer line", 10.0, 0.7, &CharWidthEstimator);
        assert_eq!(block.lines.len(), 2);
        assert_eq!(block.width, block.lines[1].width);
        assert_eq!(block.lines[0].plain_text(), "short");
    }

    #[test]
    fn empty_label_has_one_empty_line() {
        let block = measure_label("", 10.0, 0.7, &CharWidthEstimator);
        assert_eq!(block.lines.len(), 1);
        assert_eq!(block.width, 0.0);
    }
}
