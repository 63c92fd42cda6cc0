//! Prometheus 텍스트 포맷 (0.0.4) 파서
//!
//! ```text
//! # HELP <metric_name> <help_text>
//! # TYPE <metric_name> <type>
//! <metric_name>{<label1>="<value1>",<label2>="<value2>"} <value> [<timestamp>]
//! ```
//!
//! Families are returned in order of first appearance. Samples named
//! `<family>_bucket`, `<family>_sum` or `<family>_count` are attached to a
//! declared histogram or summary family; a sample with no preceding
//! `# TYPE` line starts an untyped family.

use std::collections::{HashMap, HashSet};

use super::{CollectResult, MetricFamily, MetricKind, Sample};
use crate::error::CollectorError;

const AGGREGATE_SUFFIXES: &[&str] = &["_bucket", "_sum", "_count"];

/// Parse a complete text exposition body
pub fn parse_text(input: &str) -> CollectResult<Vec<MetricFamily>> {
    let mut builder = FamilyBuilder::default();

    for (i, raw) in input.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            builder.comment(comment, line_no)?;
            continue;
        }

        let (name, sample) = parse_sample_line(line, line_no)?;
        builder.push_sample(&name, sample);
    }

    Ok(builder.finish())
}

/// Accumulates families while preserving first-appearance order
#[derive(Default)]
struct FamilyBuilder {
    families: Vec<MetricFamily>,
    index: HashMap<String, usize>,
    typed: HashSet<String>,
}

impl FamilyBuilder {
    fn family_mut(&mut self, name: &str) -> &mut MetricFamily {
        let existing = self.index.get(name).copied();
        let idx = match existing {
            Some(idx) => idx,
            None => {
                self.families.push(MetricFamily::new(name, MetricKind::Untyped));
                self.index.insert(name.to_string(), self.families.len() - 1);
                self.families.len() - 1
            }
        };
        &mut self.families[idx]
    }

    fn comment(&mut self, comment: &str, line_no: usize) -> CollectResult<()> {
        let comment = comment.trim_start();
        let (keyword, rest) = split_token(comment);

        match keyword {
            "HELP" => {
                let (name, help) = split_token(rest);
                if name.is_empty() {
                    return Err(CollectorError::text_parse(line_no, "HELP line without metric name"));
                }
                self.family_mut(name).help = unescape_help(help, line_no)?;
            }
            "TYPE" => {
                let (name, kind) = split_token(rest);
                if name.is_empty() {
                    return Err(CollectorError::text_parse(line_no, "TYPE line without metric name"));
                }
                let kind = MetricKind::from_type_token(kind.trim()).ok_or_else(|| {
                    CollectorError::text_parse(line_no, format!("unknown metric type '{}'", kind.trim()))
                })?;
                if !self.typed.insert(name.to_string()) {
                    return Err(CollectorError::text_parse(
                        line_no,
                        format!("second TYPE line for metric name '{}'", name),
                    ));
                }
                let family = self.family_mut(name);
                if !family.samples.is_empty() {
                    return Err(CollectorError::text_parse(
                        line_no,
                        format!("TYPE line for '{}' after its samples", name),
                    ));
                }
                family.kind = kind;
            }
            // Plain comments are ignored
            _ => {}
        }

        Ok(())
    }

    fn push_sample(&mut self, name: &str, sample: Sample) {
        let family_name = self.resolve_family(name);
        self.family_mut(family_name).samples.push(sample);
    }

    fn resolve_family<'a>(&self, name: &'a str) -> &'a str {
        if self.index.contains_key(name) {
            return name;
        }

        for suffix in AGGREGATE_SUFFIXES {
            if let Some(base) = name.strip_suffix(suffix) {
                if let Some(idx) = self.index.get(base) {
                    if matches!(
                        self.families[*idx].kind,
                        MetricKind::Histogram | MetricKind::Summary | MetricKind::GaugeHistogram
                    ) {
                        return base;
                    }
                }
            }
        }

        name
    }

    fn finish(self) -> Vec<MetricFamily> {
        self.families
    }
}

/// Split off the first whitespace-delimited token
fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// HELP text only allows the `\\` and `\n` escapes
fn unescape_help(help: &str, line_no: usize) -> CollectResult<String> {
    let mut out = String::with_capacity(help.len());
    let mut chars = help.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    return Err(CollectorError::text_parse(
                        line_no,
                        format!("invalid escape sequence '\\{}' in HELP", other),
                    ))
                }
                None => return Err(CollectorError::text_parse(line_no, "unterminated escape in HELP")),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Parse `name{labels} value [timestamp]`
fn parse_sample_line(line: &str, line_no: usize) -> CollectResult<(String, Sample)> {
    let mut cursor = Cursor::new(line);

    let name = cursor.take_while(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b':');
    if name.is_empty() || name.as_bytes()[0].is_ascii_digit() {
        return Err(CollectorError::text_parse(line_no, "invalid metric name"));
    }
    let name = name.to_string();

    cursor.skip_whitespace();
    let mut labels = HashMap::new();
    if cursor.peek() == Some(b'{') {
        cursor.bump();
        parse_labels(&mut cursor, &mut labels, line_no)?;
    }

    let mut tokens = cursor.rest().split_whitespace();
    let value = tokens
        .next()
        .ok_or_else(|| CollectorError::text_parse(line_no, "missing sample value"))?;
    let value = parse_float(value)
        .ok_or_else(|| CollectorError::text_parse(line_no, format!("invalid sample value '{}'", value)))?;

    if let Some(timestamp) = tokens.next() {
        if timestamp.parse::<i64>().is_err() {
            return Err(CollectorError::text_parse(
                line_no,
                format!("invalid timestamp '{}'", timestamp),
            ));
        }
    }
    if tokens.next().is_some() {
        return Err(CollectorError::text_parse(line_no, "unexpected trailing data"));
    }

    Ok((name, Sample { value, labels }))
}

fn parse_labels(
    cursor: &mut Cursor<'_>,
    labels: &mut HashMap<String, String>,
    line_no: usize,
) -> CollectResult<()> {
    loop {
        cursor.skip_whitespace();
        match cursor.peek() {
            Some(b'}') => {
                cursor.bump();
                return Ok(());
            }
            None => return Err(CollectorError::text_parse(line_no, "unterminated label set")),
            _ => {}
        }

        let key = cursor
            .take_while(|b| b.is_ascii_alphanumeric() || b == b'_')
            .to_string();
        if key.is_empty() {
            return Err(CollectorError::text_parse(line_no, "invalid label name"));
        }

        cursor.skip_whitespace();
        cursor.expect(b'=', line_no)?;
        cursor.skip_whitespace();
        cursor.expect(b'"', line_no)?;
        let value = parse_label_value(cursor, line_no)?;

        if labels.insert(key.clone(), value).is_some() {
            return Err(CollectorError::text_parse(
                line_no,
                format!("duplicate label name '{}'", key),
            ));
        }

        cursor.skip_whitespace();
        match cursor.peek() {
            Some(b',') => cursor.bump(),
            Some(b'}') => {}
            _ => return Err(CollectorError::text_parse(line_no, "expected ',' or '}' after label")),
        }
    }
}

/// Read a quoted label value; the opening quote is already consumed
fn parse_label_value(cursor: &mut Cursor<'_>, line_no: usize) -> CollectResult<String> {
    let mut bytes = Vec::new();
    loop {
        match cursor.next_byte() {
            Some(b'"') => break,
            Some(b'\\') => match cursor.next_byte() {
                Some(b'n') => bytes.push(b'\n'),
                Some(b'\\') => bytes.push(b'\\'),
                Some(b'"') => bytes.push(b'"'),
                Some(other) => {
                    return Err(CollectorError::text_parse(
                        line_no,
                        format!("invalid escape sequence '\\{}'", other as char),
                    ))
                }
                None => return Err(CollectorError::text_parse(line_no, "unterminated label value")),
            },
            Some(b) => bytes.push(b),
            None => return Err(CollectorError::text_parse(line_no, "unterminated label value")),
        }
    }
    String::from_utf8(bytes).map_err(|_| CollectorError::text_parse(line_no, "label value is not UTF-8"))
}

fn parse_float(token: &str) -> Option<f64> {
    match token {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => token.parse().ok(),
    }
}

/// Byte cursor over one line; splits only at ASCII bytes
struct Cursor<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.line.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !pred(b) {
                break;
            }
            self.pos += 1;
        }
        &self.line[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(|b| b == b' ' || b == b'\t');
    }

    fn expect(&mut self, expected: u8, line_no: usize) -> CollectResult<()> {
        match self.next_byte() {
            Some(b) if b == expected => Ok(()),
            _ => Err(CollectorError::text_parse(
                line_no,
                format!("expected '{}'", expected as char),
            )),
        }
    }

    fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gauge_family() {
        let input = r#"
# HELP kube_pod_status_phase The pods current phase.
# TYPE kube_pod_status_phase gauge
kube_pod_status_phase{namespace="default",pod="web-1",phase="Pending"} 0
kube_pod_status_phase{namespace="default",pod="web-1",phase="Running"} 1
"#;
        let families = parse_text(input).unwrap();
        assert_eq!(families.len(), 1);

        let family = &families[0];
        assert_eq!(family.name, "kube_pod_status_phase");
        assert_eq!(family.kind, MetricKind::Gauge);
        assert_eq!(family.help, "The pods current phase.");
        assert_eq!(family.samples.len(), 2);
        assert_eq!(family.samples[1].value, 1.0);
        assert_eq!(family.samples[1].labels["phase"], "Running");
    }

    #[test]
    fn test_untyped_without_type_line() {
        let families = parse_text("kube_node_created{node=\"n1\"} 1.5e9 1609459200000\n").unwrap();
        assert_eq!(families[0].kind, MetricKind::Untyped);
        assert_eq!(families[0].samples[0].value, 1.5e9);
    }

    #[test]
    fn test_label_escapes() {
        let line = r#"kube_pod_labels{label_note="a \"quoted\" \\ value\nnext"} 1"#;
        let families = parse_text(line).unwrap();
        assert_eq!(
            families[0].samples[0].labels["label_note"],
            "a \"quoted\" \\ value\nnext"
        );
    }

    #[test]
    fn test_help_escapes() {
        let families = parse_text("# HELP m line one\\nline two \\\\ done\n").unwrap();
        assert_eq!(families[0].help, "line one\nline two \\ done");

        let err = parse_text("# TYPE m gauge\n# HELP m bad \\q escape\n").unwrap_err();
        assert!(matches!(err, CollectorError::TextParse { line: 2, .. }));
    }

    #[test]
    fn test_special_values_and_empty_labels() {
        let input = "# TYPE m gauge\nm{} +Inf\nm{a=\"1\",} -Inf\nm NaN\n";
        let families = parse_text(input).unwrap();
        let samples = &families[0].samples;
        assert_eq!(samples[0].value, f64::INFINITY);
        assert_eq!(samples[1].value, f64::NEG_INFINITY);
        assert_eq!(samples[1].labels["a"], "1");
        assert!(samples[2].value.is_nan());
    }

    #[test]
    fn test_histogram_suffixes_attach_to_family() {
        let input = r#"# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_bucket{le="0.1"} 3
http_request_duration_seconds_bucket{le="+Inf"} 5
http_request_duration_seconds_sum 1.2
http_request_duration_seconds_count 5
# TYPE kube_node_info gauge
kube_node_info{node="n1"} 1
"#;
        let families = parse_text(input).unwrap();
        assert_eq!(families.len(), 2);
        assert_eq!(families[0].kind, MetricKind::Histogram);
        assert_eq!(families[0].samples.len(), 4);
        assert_eq!(families[1].name, "kube_node_info");
    }

    #[test]
    fn test_count_suffix_on_gauge_is_its_own_family() {
        let input = "# TYPE jobs gauge\njobs 1\njobs_count 2\n";
        let families = parse_text(input).unwrap();
        assert_eq!(families.len(), 2);
        assert_eq!(families[1].name, "jobs_count");
    }

    #[test]
    fn test_plain_comments_ignored() {
        let input = "# scraped from kube-state-metrics\n#\n# TYPE m gauge\nm 1\n";
        let families = parse_text(input).unwrap();
        assert_eq!(families.len(), 1);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_text("m 1\nm{a=\"1\" 2\n").unwrap_err();
        match err {
            CollectorError::TextParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        assert!(parse_text("m abc").is_err());
        assert!(parse_text("m{a=\"1\",a=\"2\"} 1").is_err());
        assert!(parse_text("# TYPE m sometype").is_err());
        assert!(parse_text("m 1\n# TYPE m gauge").is_err());
        assert!(parse_text("m 1 notatimestamp").is_err());
    }
}
