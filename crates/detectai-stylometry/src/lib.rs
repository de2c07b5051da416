//! Stylometric feature extraction for source code.
//!
//! Computes a fixed-length vector of surface-syntactic statistics (line and
//! token counts, comment and keyword ratios, indentation shape) used as an
//! authorship-style signal alongside a semantic code embedding. The extractor
//! is a pure function: no shared state, no I/O, and it never fails — degenerate
//! input degrades to an all-zero vector.

use std::sync::LazyLock;

use ahash::HashSet;
use regex::Regex;
use tracing::trace;

/// Number of stylometric features produced by [`extract`].
pub const FEATURE_COUNT: usize = 17;

/// Fixed-order stylometric feature vector.
///
/// The ordering is a training-time contract shared with the classifier
/// artifact; reordering or resizing it silently breaks inference.
pub type StylometricVector = [f32; FEATURE_COUNT];

/// Control-flow and declaration keywords across Python and Java.
const KEYWORDS: &[&str] = &[
    "def", "return", "if", "else", "elif", "while", "for", "break", "continue", "try", "except",
    "import", "from", "as", "class", "pass", "with", "yield", "lambda", "global", "nonlocal",
    "assert", "public", "private", "protected", "static", "final", "void", "int", "double",
    "float", "char", "boolean", "new", "catch", "finally", "throws", "throw", "switch", "case",
    "package", "interface", "implements", "extends",
];

static KEYWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| KEYWORDS.iter().copied().collect());

/// Maximal runs of word characters.
static WORD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid token pattern"));

/// Identifier followed by one or more `=` (assignments and comparisons both
/// count, matching the trained feature definition).
static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\s*=+").expect("valid assignment pattern"));

/// `def`, `void`, or an access modifier eventually followed by `(` on the
/// same line.
static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(def|void|public\s+|private\s+|protected\s+).*?\(").expect("valid def pattern")
});

fn is_comment_line(trimmed: &str) -> bool {
    trimmed.starts_with('#')
        || trimmed.starts_with("//")
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
}

fn leading_whitespace_len(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn mean(values: impl Iterator<Item = usize>) -> f64 {
    let mut sum = 0usize;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Extract the 17 stylometric features from `code`, in fixed order.
///
/// Empty or whitespace-only input yields all zeros. Every value is finite:
/// ratios fall back to 0 when their denominator is empty.
#[must_use]
pub fn extract(code: &str) -> StylometricVector {
    if code.trim().is_empty() {
        return [0.0; FEATURE_COUNT];
    }

    let lines: Vec<&str> = code.lines().collect();
    let num_lines = lines.len();
    let avg_line_length = mean(lines.iter().map(|line| line.chars().count()));
    let blank_lines = lines.iter().filter(|line| line.trim().is_empty()).count();

    let tokens: Vec<&str> = WORD_TOKEN.find_iter(code).map(|m| m.as_str()).collect();
    let num_tokens = tokens.len();
    let avg_token_length = mean(tokens.iter().map(|tok| tok.chars().count()));
    let num_keywords = tokens
        .iter()
        .filter(|tok| KEYWORD_SET.contains(*tok))
        .count();
    let keyword_ratio = if num_tokens == 0 {
        0.0
    } else {
        num_keywords as f64 / num_tokens as f64
    };

    let comment_lines = lines
        .iter()
        .filter(|line| is_comment_line(line.trim()))
        .count();
    let comment_ratio = if num_lines == 0 {
        0.0
    } else {
        comment_lines as f64 / num_lines as f64
    };

    let num_assignments = ASSIGNMENT.find_iter(code).count();
    let num_function_defs = FUNCTION_DEF.find_iter(code).count();

    let total_chars = code.chars().count();
    let whitespace_chars = code.chars().filter(|c| c.is_whitespace()).count();
    let whitespace_ratio = if total_chars == 0 {
        0.0
    } else {
        whitespace_chars as f64 / total_chars as f64
    };
    let uses_tabs = code.contains('\t');

    // Indentation shape over non-blank lines only.
    let indent_levels: Vec<usize> = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| leading_whitespace_len(line))
        .collect();
    let (indent_variance, max_indent) = if indent_levels.is_empty() {
        (0.0, 0)
    } else {
        let mean_indent =
            indent_levels.iter().sum::<usize>() as f64 / indent_levels.len() as f64;
        let variance = indent_levels
            .iter()
            .map(|&level| {
                let d = level as f64 - mean_indent;
                d * d
            })
            .sum::<f64>()
            / indent_levels.len() as f64;
        (variance, indent_levels.iter().copied().max().unwrap_or(0))
    };

    let num_brackets = code
        .chars()
        .filter(|c| matches!(c, '{' | '}' | '(' | ')' | '[' | ']'))
        .count();

    trace!(num_lines, num_tokens, total_chars, "extracted stylometric features");

    [
        num_lines as f32,
        avg_line_length as f32,
        blank_lines as f32,
        num_tokens as f32,
        avg_token_length as f32,
        num_keywords as f32,
        keyword_ratio as f32,
        comment_lines as f32,
        comment_ratio as f32,
        num_assignments as f32,
        num_function_defs as f32,
        whitespace_ratio as f32,
        f32::from(u8::from(uses_tabs)),
        indent_variance as f32,
        max_indent as f32,
        num_brackets as f32,
        total_chars as f32,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON_SNIPPET: &str = "def foo():\n    pass\n";

    #[test]
    fn empty_input_is_all_zeros() {
        assert_eq!(extract(""), [0.0; FEATURE_COUNT]);
    }

    #[test]
    fn whitespace_only_input_is_all_zeros() {
        assert_eq!(extract("   \n\t  \n"), [0.0; FEATURE_COUNT]);
        assert_eq!(extract("\n\n\n"), [0.0; FEATURE_COUNT]);
    }

    #[test]
    fn python_function_scenario() {
        let features = extract(PYTHON_SNIPPET);

        // line count
        assert_eq!(features[0], 2.0);
        // blank lines
        assert_eq!(features[2], 0.0);
        // keyword count includes `def` and `pass`
        assert!(features[5] >= 1.0);
        // comment lines / ratio
        assert_eq!(features[7], 0.0);
        assert_eq!(features[8], 0.0);
        // one function definition
        assert_eq!(features[10], 1.0);
        // total characters
        assert_eq!(features[16], PYTHON_SNIPPET.chars().count() as f32);
    }

    #[test]
    fn ratios_stay_in_unit_interval() {
        let samples = [
            PYTHON_SNIPPET,
            "x",
            "if if if",
            "# only a comment\n// another\n",
            "public static void main(String[] args) {}\n",
            "{{{{}}}}",
        ];
        for code in samples {
            let features = extract(code);
            assert!((0.0..=1.0).contains(&features[6]), "keyword ratio for {code:?}");
            assert!((0.0..=1.0).contains(&features[8]), "comment ratio for {code:?}");
            assert!((0.0..=1.0).contains(&features[11]), "whitespace ratio for {code:?}");
            assert!(features.iter().all(|v| v.is_finite()), "finite for {code:?}");
        }
    }

    #[test]
    fn comment_lines_counted_by_stripped_prefix() {
        let code = "# hash\n  // slashes\n/* block\n * continuation\nx = 1\n";
        let features = extract(code);
        assert_eq!(features[7], 4.0);
        assert_eq!(features[8], 4.0 / 5.0);
    }

    #[test]
    fn assignments_counted() {
        let code = "a = 1\nb  = 2\nc == 3\n";
        let features = extract(code);
        assert_eq!(features[9], 3.0);
    }

    #[test]
    fn java_definitions_counted() {
        let code = "public void run() {\n}\nprivate int add(int a) {\n}\n";
        let features = extract(code);
        assert_eq!(features[10], 2.0);
        // two parens and one brace pair per method
        assert_eq!(features[15], 8.0);
    }

    #[test]
    fn tab_flag_is_binary() {
        assert_eq!(extract("a = 1\n\tb = 2\n")[12], 1.0);
        assert_eq!(extract("a = 1\n    b = 2\n")[12], 0.0);
    }

    #[test]
    fn indentation_statistics_skip_blank_lines() {
        let code = "def f():\n    x = 1\n\n        y = 2\n";
        let features = extract(code);
        // indents: [0, 4, 8] over non-blank lines
        assert_eq!(features[14], 8.0);
        let expected_variance = {
            let mean = (0.0 + 4.0 + 8.0) / 3.0f64;
            ((0.0 - mean).powi(2) + (4.0 - mean).powi(2) + (8.0 - mean).powi(2)) / 3.0
        };
        assert!((f64::from(features[13]) - expected_variance).abs() < 1e-5);
    }

    #[test]
    fn uniform_indentation_has_zero_variance() {
        let features = extract("x = 1\ny = 2\nz = 3\n");
        assert_eq!(features[13], 0.0);
        assert_eq!(features[14], 0.0);
    }

    #[test]
    fn keyword_counting_spans_both_languages() {
        let python = extract("for i in range(10):\n    continue\n");
        assert!(python[5] >= 2.0);

        let java = extract("public final class Foo implements Bar {}\n");
        assert!(java[5] >= 4.0);
    }

    #[test]
    fn vector_length_is_fixed() {
        assert_eq!(extract("x").len(), FEATURE_COUNT);
        assert_eq!(extract(PYTHON_SNIPPET).len(), FEATURE_COUNT);
    }
}
